use crate::config::ApiConfig;
use crate::http::{Request, Response, ResponseExt};
use crate::middleware::{abort, Middleware, Next};
use async_trait::async_trait;

/// Route alias `versioning`: the route only answers explicitly versioned requests
///
/// The global `Unsupported` middleware already validated the value; this
/// one refuses to fall back to the default version and marks the response
/// as varying by the version header for caches.
pub struct Versioning {
    header: String,
}

impl Versioning {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            header: config.version_header.to_ascii_lowercase(),
        }
    }
}

#[async_trait]
impl Middleware for Versioning {
    async fn handle(&self, request: Request, next: Next) -> Response {
        if request.header(&self.header).is_none() {
            return abort(
                400,
                "version_required",
                format!("The '{}' header is required", self.header),
            )
            .header("Vary", self.header.clone());
        }
        next.run(request).await.header("Vary", self.header.clone())
    }

    fn name(&self) -> &'static str {
        "Versioning"
    }
}
