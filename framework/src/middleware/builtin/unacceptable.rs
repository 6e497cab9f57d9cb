use crate::config::ApiConfig;
use crate::http::{Request, Response};
use crate::middleware::{abort, Middleware, Next};
use async_trait::async_trait;

/// Rejects requests whose `Accept` header excludes every media type we produce
pub struct Unacceptable {
    produces: Vec<String>,
}

impl Unacceptable {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            produces: config.accept.iter().map(|m| m.to_ascii_lowercase()).collect(),
        }
    }

    pub fn accepts(&self, header: &str) -> bool {
        header
            .split(',')
            .filter_map(|range| range.split(';').next())
            .map(|range| range.trim().to_ascii_lowercase())
            .filter(|range| !range.is_empty())
            .any(|range| self.produces.iter().any(|media| media_matches(&range, media)))
    }
}

fn media_matches(range: &str, media: &str) -> bool {
    if range == "*/*" || range == media {
        return true;
    }
    match range.strip_suffix("/*") {
        Some(kind) => media.split('/').next() == Some(kind),
        None => false,
    }
}

#[async_trait]
impl Middleware for Unacceptable {
    async fn handle(&self, request: Request, next: Next) -> Response {
        if let Some(accept) = request.header("accept") {
            if !self.accepts(accept) {
                return abort(
                    406,
                    "not_acceptable",
                    format!("Cannot produce a response matching '{}'", accept),
                );
            }
        }
        next.run(request).await
    }

    fn name(&self) -> &'static str {
        "Unacceptable"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::testing::{ok, with_headers};
    use crate::middleware::{into_boxed, MiddlewareChain};

    #[test]
    fn media_ranges() {
        let unacceptable = Unacceptable::new(&ApiConfig::default());
        assert!(unacceptable.accepts("application/json"));
        assert!(unacceptable.accepts("text/html, application/*;q=0.8"));
        assert!(unacceptable.accepts("*/*"));
        assert!(!unacceptable.accepts("text/html"));
        assert!(!unacceptable.accepts("image/*"));
    }

    #[tokio::test]
    async fn rejects_with_406() {
        let mut chain = MiddlewareChain::new();
        chain.push(into_boxed(Unacceptable::new(&ApiConfig::default())));

        let rejected = chain
            .execute(with_headers("/", &[("accept", "text/html")]), ok())
            .await
            .unwrap_err();
        assert_eq!(rejected.status_code(), 406);
        assert_eq!(rejected.json_body().unwrap()["error"], "not_acceptable");

        assert!(chain.execute(with_headers("/", &[]), ok()).await.is_ok());
    }
}
