use crate::error::FrameworkError;
use crate::http::{Request, Response};
use crate::middleware::{Middleware, Next};
use crate::services::auth::{bearer_token, Authenticator};
use async_trait::async_trait;
use std::sync::Arc;

/// Route alias `auth`: requires a valid bearer token
///
/// Stores the resulting [`Principal`](crate::services::Principal) on the request.
pub struct Authenticate {
    authenticator: Arc<dyn Authenticator>,
    header: String,
}

impl Authenticate {
    pub fn new(authenticator: Arc<dyn Authenticator>, header: impl Into<String>) -> Self {
        Self {
            authenticator,
            header: header.into().to_ascii_lowercase(),
        }
    }
}

#[async_trait]
impl Middleware for Authenticate {
    async fn handle(&self, mut request: Request, next: Next) -> Response {
        let token = request
            .header(&self.header)
            .and_then(bearer_token)
            .ok_or_else(|| FrameworkError::unauthenticated("Missing bearer token"))?;
        let principal = self.authenticator.authenticate(token)?;

        tracing::debug!(principal = %principal.id, "authenticated request");
        request.extensions_mut().insert(principal);
        next.run(request).await
    }

    fn name(&self) -> &'static str {
        "Authenticate"
    }
}
