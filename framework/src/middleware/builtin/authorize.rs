use crate::error::FrameworkError;
use crate::http::{Request, Response};
use crate::middleware::{Middleware, MiddlewareParameters, Next};
use crate::services::auth::{Gate, Principal};
use async_trait::async_trait;
use std::sync::Arc;

/// Route alias `authorize`: the principal must hold the listed permissions
///
/// Permissions come from the alias parameters, e.g.
/// `.middleware("authorize:votes.close")`. Must run after `auth`. A bare
/// `authorize` names no permission and refuses every request.
pub struct Authorize {
    gate: Arc<dyn Gate>,
}

impl Authorize {
    pub fn new(gate: Arc<dyn Gate>) -> Self {
        Self { gate }
    }
}

#[async_trait]
impl Middleware for Authorize {
    async fn handle(&self, request: Request, next: Next) -> Response {
        let principal = request
            .get::<Principal>()
            .ok_or_else(|| FrameworkError::unauthenticated("Authentication required"))?;
        let required = request
            .get::<MiddlewareParameters>()
            .map(|p| p.as_slice())
            .unwrap_or_default();

        if required.is_empty() {
            tracing::warn!(principal = %principal.id, "authorize used without permissions");
            return Err(FrameworkError::Unauthorized.into());
        }
        if !self.gate.allows(principal, required) {
            tracing::info!(principal = %principal.id, ?required, "authorization refused");
            return Err(FrameworkError::Unauthorized.into());
        }
        next.run(request).await
    }

    fn name(&self) -> &'static str {
        "Authorize"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::testing::{get, ok, Trace};
    use crate::middleware::{into_boxed, MiddlewareChain, MiddlewareRegistry};
    use crate::services::PermissionGate;
    use std::sync::Mutex;

    fn as_principal(principal: Principal, mut request: Request) -> Request {
        request.extensions_mut().insert(principal);
        request
    }

    fn chain(spec: &str) -> MiddlewareChain {
        let mut registry = MiddlewareRegistry::new();
        registry.alias("authorize", Authorize::new(Arc::new(PermissionGate::new(vec!["admin".into()]))));
        let mut chain = MiddlewareChain::new();
        chain.push(registry.route_middleware(spec).unwrap());
        chain
    }

    #[tokio::test]
    async fn parameters_name_required_permissions() {
        let closer = Principal::new("1").with_permissions(["votes.close"]);
        let reader = Principal::new("2").with_permissions(["votes.read"]);

        let allowed = chain("authorize:votes.close")
            .execute(as_principal(closer, get("/ballots/1/close")), ok())
            .await;
        assert!(allowed.is_ok());

        let refused = chain("authorize:votes.close")
            .execute(as_principal(reader, get("/ballots/1/close")), ok())
            .await
            .unwrap_err();
        assert_eq!(refused.status_code(), 403);
        assert_eq!(refused.json_body().unwrap()["error"], "forbidden");
    }

    #[tokio::test]
    async fn super_roles_pass_and_anonymous_is_401() {
        let admin = Principal::new("1").with_roles(["admin"]);
        assert!(chain("authorize:anything")
            .execute(as_principal(admin, get("/")), ok())
            .await
            .is_ok());

        let anonymous = chain("authorize:votes.read").execute(get("/"), ok()).await.unwrap_err();
        assert_eq!(anonymous.status_code(), 401);
    }

    #[tokio::test]
    async fn alias_wins_over_a_global_with_the_same_name() {
        struct Imposter;

        #[async_trait]
        impl Middleware for Imposter {
            async fn handle(&self, _request: Request, _next: Next) -> Response {
                crate::middleware::abort(418, "imposter", "wrong unit")
            }

            fn name(&self) -> &'static str {
                "Authorize"
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = MiddlewareRegistry::new();
        registry.prepend(Imposter);
        registry.alias("authorize", Authorize::new(Arc::new(PermissionGate::default())));

        let mut chain = MiddlewareChain::new();
        chain.push(into_boxed(Trace { label: "outer", log }));
        chain.push(registry.route_middleware("authorize:votes.read").unwrap());

        let reader = Principal::new("1").with_permissions(["votes.read"]);
        let response = chain
            .execute(as_principal(reader, get("/")), ok())
            .await
            .unwrap();
        assert_eq!(response.body(), "handled");
    }

    #[tokio::test]
    async fn bare_alias_refuses_everyone() {
        let member = Principal::new("1").with_permissions(["votes.close"]);
        let refused = chain("authorize")
            .execute(as_principal(member, get("/")), ok())
            .await
            .unwrap_err();
        assert_eq!(refused.status_code(), 403);

        let admin = Principal::new("2").with_roles(["admin"]);
        let refused = chain("authorize:")
            .execute(as_principal(admin, get("/")), ok())
            .await
            .unwrap_err();
        assert_eq!(refused.status_code(), 403);
    }
}
