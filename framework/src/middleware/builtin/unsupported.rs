use crate::config::ApiConfig;
use crate::error::FrameworkError;
use crate::http::{Request, Response};
use crate::middleware::{Middleware, Next};
use async_trait::async_trait;
use std::collections::BTreeSet;

/// The API version a request targets, stored on the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ApiVersion(pub u32);

/// Rejects requests for API versions this deployment does not serve
///
/// Reads `api.version_header` (`version` by default). Accepts `2` or `v2`.
/// Requests without the header get `api.default_version`.
pub struct Unsupported {
    header: String,
    versions: BTreeSet<u32>,
    default: u32,
}

impl Unsupported {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            header: config.version_header.to_ascii_lowercase(),
            versions: config.versions.iter().copied().collect(),
            default: config.default_version,
        }
    }

    /// Resolve the requested version, or the abort describing why it is refused
    pub fn negotiate(&self, request: &Request) -> Result<ApiVersion, FrameworkError> {
        let Some(raw) = request.header(&self.header) else {
            return Ok(ApiVersion(self.default));
        };
        let trimmed = raw.trim();
        let digits = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);

        match digits.parse::<u32>() {
            Ok(version) if self.versions.contains(&version) => Ok(ApiVersion(version)),
            _ => Err(FrameworkError::abort(
                400,
                "unsupported_version",
                format!("API version {} is not supported", trimmed),
            )),
        }
    }
}

#[async_trait]
impl Middleware for Unsupported {
    async fn handle(&self, mut request: Request, next: Next) -> Response {
        let version = self.negotiate(&request)?;
        request.extensions_mut().insert(version);
        next.run(request).await
    }

    fn name(&self) -> &'static str {
        "Unsupported"
    }
}
