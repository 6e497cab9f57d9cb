use crate::config::AuthConfig;
use crate::container::provider::ServiceProvider;
use crate::context::ApplicationContext;
use crate::error::FrameworkError;
use crate::services::auth::{Authenticator, Gate, JwtAuthenticator, PermissionGate};
use std::sync::Arc;

/// Binds `dyn Authenticator` and `dyn Gate` from the `auth` namespace
#[derive(Debug, Default)]
pub struct AuthServiceProvider;

impl ServiceProvider for AuthServiceProvider {
    fn name(&self) -> &'static str {
        "AuthServiceProvider"
    }

    fn register(&self, ctx: &mut ApplicationContext) -> Result<(), FrameworkError> {
        let auth: AuthConfig = ctx.section("auth")?;
        let jwt = auth.jwt.clone();

        ctx.container_mut()
            .singleton::<dyn Authenticator, _>(move |_, _| {
                Ok(Arc::new(JwtAuthenticator::new(&jwt)?) as Arc<dyn Authenticator>)
            })
            .singleton::<dyn Gate, _>(move |_, _| {
                Ok(Arc::new(PermissionGate::from_config(&auth)) as Arc<dyn Gate>)
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::context;
    use crate::services::auth::testing::{mint, SECRET};
    use crate::services::Principal;
    use serde_json::json;

    #[test]
    fn binds_jwt_authenticator_and_gate() {
        let mut ctx = context();
        ctx.config_mut().set("auth.jwt.secret", json!(SECRET));
        ctx.config_mut().set("auth.super_roles", json!(["root"]));
        ctx.register(AuthServiceProvider).unwrap();

        let authenticator = ctx.container().make::<dyn Authenticator>().unwrap();
        let principal = authenticator.authenticate(&mint("7", &["root"], &[])).unwrap();

        let gate = ctx.container().make::<dyn Gate>().unwrap();
        assert!(gate.allows(&principal, &["votes.close".to_string()]));
        assert!(!gate.allows(&Principal::new("8"), &["votes.close".to_string()]));
    }

    #[test]
    fn bad_algorithm_fails_on_resolution() {
        let mut ctx = context();
        ctx.config_mut().set("auth.jwt.algorithm", json!("none"));
        ctx.register(AuthServiceProvider).unwrap();

        let err = ctx.container().make::<dyn Authenticator>().err().unwrap();
        assert!(matches!(err, FrameworkError::ConfigParse { .. }));
    }
}
