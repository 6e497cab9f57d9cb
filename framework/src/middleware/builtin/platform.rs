use crate::config::ApiConfig;
use crate::http::{Request, Response};
use crate::middleware::{Middleware, Next};
use async_trait::async_trait;

/// Client platform from the `platform` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Ios,
    Android,
    Web,
    Unknown,
}

impl Platform {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ios" => Self::Ios,
            "android" => Self::Android,
            "web" => Self::Web,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ios => "ios",
            Self::Android => "android",
            Self::Web => "web",
            Self::Unknown => "unknown",
        }
    }
}

/// Records the client platform; never rejects
///
/// Platforms missing from `api.platforms` are treated as unknown.
pub struct ClientPlatform {
    allowed: Vec<String>,
}

impl ClientPlatform {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            allowed: config.platforms.iter().map(|p| p.to_ascii_lowercase()).collect(),
        }
    }

    pub fn detect(&self, request: &Request) -> Platform {
        let platform = request.header("platform").map(Platform::parse).unwrap_or(Platform::Unknown);
        if self.allowed.iter().any(|p| p == platform.as_str()) {
            platform
        } else {
            Platform::Unknown
        }
    }
}

#[async_trait]
impl Middleware for ClientPlatform {
    async fn handle(&self, mut request: Request, next: Next) -> Response {
        let platform = self.detect(&request);
        request.extensions_mut().insert(platform);
        next.run(request).await
    }

    fn name(&self) -> &'static str {
        "ClientPlatform"
    }
}
