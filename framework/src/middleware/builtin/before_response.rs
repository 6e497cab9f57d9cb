use super::{LanguageCode, Unsupported};
use crate::config::{ApiConfig, TimeConfig};
use crate::http::{Request, Response, ResponseExt};
use crate::middleware::{Middleware, Next};
use async_trait::async_trait;
use chrono::Utc;

/// Stamps common headers on every response, rejections included
///
/// - `X-Server-Time`: now, per `time.timezone` and `time.format`
/// - `X-Api-Version`: the negotiated version, when supported
/// - `Content-Language`: the negotiated language
///
/// Runs outermost, so it negotiates from the request headers itself rather
/// than reading what inner middleware stored.
pub struct BeforeResponse {
    time: TimeConfig,
    version: Unsupported,
    language: LanguageCode,
}

impl BeforeResponse {
    pub fn new(time: &TimeConfig, api: &ApiConfig) -> Self {
        Self {
            time: time.clone(),
            version: Unsupported::new(api),
            language: LanguageCode::new(api),
        }
    }
}

#[async_trait]
impl Middleware for BeforeResponse {
    async fn handle(&self, request: Request, next: Next) -> Response {
        let version = self.version.negotiate(&request).ok();
        let locale = self.language.negotiate(&request);

        let mut response = next
            .run(request)
            .await
            .header("X-Server-Time", self.time.format(Utc::now()))
            .header("Content-Language", locale.0);
        if let Some(version) = version {
            response = response.header("X-Api-Version", version.0.to_string());
        }
        response
    }

    fn name(&self) -> &'static str {
        "BeforeResponse"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::testing::{ok, with_headers};
    use crate::middleware::{abort, handler, into_boxed, MiddlewareChain};

    fn chain() -> MiddlewareChain {
        let api = ApiConfig {
            versions: vec![1, 2],
            languages: vec!["en".into(), "vi".into()],
            ..ApiConfig::default()
        };
        let time = TimeConfig {
            timezone: "+07:00".into(),
            format: "%z".into(),
        };
        let mut chain = MiddlewareChain::new();
        chain.push(into_boxed(BeforeResponse::new(&time, &api)));
        chain
    }

    #[tokio::test]
    async fn stamps_successful_responses() {
        let response = chain()
            .execute(with_headers("/", &[("version", "2"), ("language", "vi")]), ok())
            .await
            .unwrap();

        assert_eq!(response.header_value("x-server-time"), Some("+0700"));
        assert_eq!(response.header_value("x-api-version"), Some("2"));
        assert_eq!(response.header_value("content-language"), Some("vi"));
    }

    #[tokio::test]
    async fn stamps_rejections_too() {
        let response = chain()
            .execute(
                with_headers("/", &[("version", "999")]),
                handler(|_req| async { abort(400, "unsupported_version", "nope") }),
            )
            .await
            .unwrap_err();

        assert!(response.header_value("x-server-time").is_some());
        assert_eq!(response.header_value("x-api-version"), None);
        assert_eq!(response.header_value("content-language"), Some("en"));
    }
}
