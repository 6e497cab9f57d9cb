use super::AuthServiceProvider;
use crate::config::{ApiConfig, AuthConfig, DispatcherKind, MicroservicesConfig, TimeConfig};
use crate::container::provider::ServiceProvider;
use crate::context::ApplicationContext;
use crate::error::FrameworkError;
use crate::middleware::builtin::{
    Authenticate, Authorize, BeforeResponse, CheckForMaintenanceMode, ClientPlatform,
    ConvertEmptyStringsToNull, LanguageCode, TrimStrings, Unacceptable, Unsupported, Versioning,
};
use crate::services::auth::{Authenticator, Gate};
use crate::services::dispatcher::{DirectDispatcher, MicroserviceDispatcher, ScheduledDispatcher};
use crate::services::http_client::{HttpClient, ReqwestClient};
use std::path::PathBuf;
use std::sync::Arc;

/// Embedded `logging` defaults, also read before any provider registers
pub const LOGGING_BUNDLE: &str = include_str!("../../config/logging.json");

/// Default bundles shipped with the crate, as `(namespace, contents)`
pub const BUNDLES: [(&str, &str); 8] = [
    ("time", include_str!("../../config/time.json")),
    ("microservices", include_str!("../../config/microservices.json")),
    ("auth", include_str!("../../config/auth.json")),
    ("logging", LOGGING_BUNDLE),
    ("filesystems", include_str!("../../config/filesystems.json")),
    ("external", include_str!("../../config/external.json")),
    ("vote", include_str!("../../config/vote.json")),
    ("api", include_str!("../../config/api.json")),
];

/// The base service provider every application registers first
///
/// Register phase:
/// 1. merge the default config bundles under existing application config
/// 2. bind `dyn HttpClient` (transient, built from an options map)
/// 3. register [`AuthServiceProvider`]
/// 4. bind `dyn MicroserviceDispatcher` (singleton, per `microservices.dispatcher`)
/// 5. prepend the global middleware
///
/// Boot phase: alias `versioning`, `auth` and `authorize`.
#[derive(Debug, Default)]
pub struct BaseServiceProvider {
    bundle_dir: Option<PathBuf>,
}

impl BaseServiceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the default bundles from `dir/<namespace>.json` instead of the
    /// copies embedded in the binary
    pub fn with_bundle_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            bundle_dir: Some(dir.into()),
        }
    }

    fn merge_bundles(&self, ctx: &mut ApplicationContext) -> Result<(), FrameworkError> {
        for (namespace, contents) in BUNDLES {
            match &self.bundle_dir {
                Some(dir) => ctx.merge_config_from(&dir.join(format!("{}.json", namespace)), namespace)?,
                None => ctx
                    .config_mut()
                    .merge_str(&format!("{}.json", namespace), contents, namespace)?,
            }
        }
        Ok(())
    }

    fn bind_dispatcher(&self, ctx: &mut ApplicationContext) -> Result<(), FrameworkError> {
        let config: MicroservicesConfig = ctx.section("microservices")?;
        tracing::debug!(dispatcher = ?config.dispatcher, services = config.services.len(), "binding microservice dispatcher");

        ctx.container_mut()
            .singleton::<dyn MicroserviceDispatcher, _>(move |container, _| {
                let direct = DirectDispatcher::from_config(container, &config)?;
                let dispatcher: Arc<dyn MicroserviceDispatcher> = match config.dispatcher {
                    DispatcherKind::Direct => Arc::new(direct),
                    DispatcherKind::Scheduled => Arc::new(ScheduledDispatcher::new(
                        Arc::new(direct),
                        config.queue.max_attempts,
                    )),
                };
                Ok(dispatcher)
            });
        Ok(())
    }

    fn install_pipeline(&self, ctx: &mut ApplicationContext) -> Result<(), FrameworkError> {
        let api: ApiConfig = ctx.section("api")?;
        let time: TimeConfig = ctx.section("time")?;
        time.offset()?;

        // Each prepend lands in front, so this runs bottom to top
        ctx.middleware_mut()
            .prepend(TrimStrings::new(&api.trim))
            .prepend(CheckForMaintenanceMode::new(&api.maintenance))
            .prepend(ConvertEmptyStringsToNull)
            .prepend(LanguageCode::new(&api))
            .prepend(ClientPlatform::new(&api))
            .prepend(Unsupported::new(&api))
            .prepend(Unacceptable::new(&api))
            .prepend(BeforeResponse::new(&time, &api));
        Ok(())
    }
}

impl ServiceProvider for BaseServiceProvider {
    fn name(&self) -> &'static str {
        "BaseServiceProvider"
    }

    fn register(&self, ctx: &mut ApplicationContext) -> Result<(), FrameworkError> {
        self.merge_bundles(ctx)?;

        ctx.container_mut()
            .transient::<dyn HttpClient, _>(|_, options| {
                Ok(Arc::new(ReqwestClient::from_options(options)?) as Arc<dyn HttpClient>)
            });

        ctx.register(AuthServiceProvider)?;
        self.bind_dispatcher(ctx)?;
        self.install_pipeline(ctx)
    }

    fn boot(&self, ctx: &mut ApplicationContext) -> Result<(), FrameworkError> {
        let api: ApiConfig = ctx.section("api")?;
        let auth: AuthConfig = ctx.section("auth")?;
        let authenticator = ctx.container().make::<dyn Authenticator>()?;
        let gate = ctx.container().make::<dyn Gate>()?;

        ctx.middleware_mut()
            .alias("versioning", Versioning::new(&api))
            .alias("auth", Authenticate::new(authenticator, auth.header))
            .alias("authorize", Authorize::new(gate));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FilesystemsConfig, VoteConfig};
    use crate::container::Lifetime;
    use crate::context::testing::context;
    use crate::http::ResponseExt;
    use crate::middleware::testing::{ok, with_headers};
    use crate::middleware::MiddlewareChain;
    use crate::services::ServiceMessage;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn booted(configure: impl FnOnce(&mut ApplicationContext)) -> ApplicationContext {
        let mut ctx = context();
        configure(&mut ctx);
        ctx.register(BaseServiceProvider::new()).unwrap();
        ctx.boot().unwrap();
        ctx
    }

    #[test]
    fn global_pipeline_runs_in_reverse_prepend_order() {
        let ctx = booted(|_| {});
        assert_eq!(
            ctx.middleware().global_names(),
            vec![
                "BeforeResponse",
                "Unacceptable",
                "Unsupported",
                "ClientPlatform",
                "LanguageCode",
                "ConvertEmptyStringsToNull",
                "CheckForMaintenanceMode",
                "TrimStrings",
            ]
        );
    }

    #[test]
    fn aliases_are_registered_at_boot() {
        let ctx = booted(|_| {});
        let aliases: Vec<_> = ctx.middleware().aliases().collect();
        assert_eq!(
            aliases,
            vec![("auth", "Authenticate"), ("authorize", "Authorize"), ("versioning", "Versioning")]
        );
        assert_eq!(ctx.providers(), vec!["AuthServiceProvider", "BaseServiceProvider"]);
    }

    #[test]
    fn every_namespace_is_merged_under_overrides() {
        let ctx = booted(|ctx| {
            ctx.config_mut().set("vote.max_stake", json!(50));
        });

        for (namespace, _) in BUNDLES {
            assert!(ctx.config().namespace(namespace).is_some(), "missing {}", namespace);
        }
        let vote: VoteConfig = ctx.section("vote").unwrap();
        assert_eq!(vote.max_stake, 50);
        assert_eq!(vote.currency, "POINT");

        let filesystems: FilesystemsConfig = ctx.section("filesystems").unwrap();
        assert_eq!(filesystems.default_disk().unwrap().driver, "local");
    }

    #[test]
    fn capabilities_are_bound() {
        let ctx = booted(|_| {});
        let container = ctx.container();
        assert_eq!(container.lifetime::<dyn HttpClient>(), Some(Lifetime::Transient));
        assert_eq!(container.lifetime::<dyn MicroserviceDispatcher>(), Some(Lifetime::Singleton));
        assert!(container.has::<dyn Authenticator>());
        assert!(container.has::<dyn Gate>());

        let first = container.make::<dyn MicroserviceDispatcher>().unwrap();
        let second = container.make::<dyn MicroserviceDispatcher>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn scheduled_dispatcher_is_the_default() {
        let ctx = booted(|_| {});
        let dispatcher = ctx.container().make::<dyn MicroserviceDispatcher>().unwrap();
        dispatcher
            .dispatch(ServiceMessage::new("ledger", "/stakes", Value::Null))
            .await
            .unwrap();
        assert_eq!(dispatcher.pending(), 1);
    }

    #[tokio::test]
    async fn direct_dispatcher_when_configured() {
        let ctx = booted(|ctx| {
            ctx.config_mut().set("microservices.dispatcher", json!("direct"));
        });
        let dispatcher = ctx.container().make::<dyn MicroserviceDispatcher>().unwrap();
        let err = dispatcher
            .dispatch(ServiceMessage::new("ledger", "/stakes", Value::Null))
            .await
            .unwrap_err();
        assert!(matches!(err, FrameworkError::Dispatch { .. }));
    }

    #[test]
    fn registering_twice_changes_nothing() {
        let mut ctx = booted(|_| {});
        let config = ctx.config().all().clone();
        ctx.register(BaseServiceProvider::new()).unwrap();

        assert_eq!(ctx.middleware().global_names().len(), 8);
        assert_eq!(ctx.config().all(), &config);
    }

    #[test]
    fn bundle_dir_must_exist() {
        let mut ctx = context();
        let err = ctx
            .register(BaseServiceProvider::with_bundle_dir("/nowhere"))
            .unwrap_err();
        assert!(matches!(err, FrameworkError::ConfigLoad { .. }));
    }

    #[tokio::test]
    async fn unsupported_version_through_the_global_pipeline() {
        let ctx = booted(|ctx| {
            ctx.config_mut().set("api.versions", json!([1, 2]));
        });
        let mut chain = MiddlewareChain::new();
        chain.extend(ctx.middleware().global_middleware());

        let rejected = chain
            .execute(with_headers("/ballots", &[("version", "999")]), ok())
            .await
            .unwrap_err();
        assert_eq!(rejected.status_code(), 400);
        assert_eq!(rejected.json_body().unwrap()["error"], "unsupported_version");
        assert!(rejected.header_value("x-server-time").is_some());

        let accepted = chain
            .execute(with_headers("/ballots", &[("version", "2")]), ok())
            .await
            .into_response();
        assert_eq!(accepted.status_code(), 200);
        assert_eq!(accepted.header_value("x-api-version"), Some("2"));
    }
}
