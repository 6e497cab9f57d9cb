use crate::config::MaintenanceConfig;
use crate::http::{Request, Response, ResponseExt};
use crate::middleware::{abort, Middleware, Next};
use async_trait::async_trait;

/// Rejects requests with 503 while `api.maintenance.enabled` is set
///
/// Paths in `api.maintenance.except` stay reachable; an entry ending in `*`
/// matches by prefix.
pub struct CheckForMaintenanceMode {
    config: MaintenanceConfig,
}

impl CheckForMaintenanceMode {
    pub fn new(config: &MaintenanceConfig) -> Self {
        Self { config: config.clone() }
    }

    fn is_excepted(&self, path: &str) -> bool {
        self.config.except.iter().any(|pattern| match pattern.strip_suffix('*') {
            Some(prefix) => path.starts_with(prefix),
            None => path == pattern,
        })
    }
}

#[async_trait]
impl Middleware for CheckForMaintenanceMode {
    async fn handle(&self, request: Request, next: Next) -> Response {
        if self.config.enabled && !self.is_excepted(request.path()) {
            return abort(503, "maintenance", "Service is down for maintenance")
                .header("Retry-After", self.config.retry_after.to_string());
        }
        next.run(request).await
    }

    fn name(&self) -> &'static str {
        "CheckForMaintenanceMode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::testing::{get, ok};
    use crate::middleware::{into_boxed, MiddlewareChain};

    fn chain(config: MaintenanceConfig) -> MiddlewareChain {
        let mut chain = MiddlewareChain::new();
        chain.push(into_boxed(CheckForMaintenanceMode::new(&config)));
        chain
    }

    #[tokio::test]
    async fn down_except_for_listed_paths() {
        let chain = chain(MaintenanceConfig {
            enabled: true,
            retry_after: 120,
            except: vec!["/health".into(), "/status/*".into()],
        });

        let rejected = chain.execute(get("/ballots"), ok()).await.unwrap_err();
        assert_eq!(rejected.status_code(), 503);
        assert_eq!(rejected.header_value("retry-after"), Some("120"));
        assert_eq!(rejected.json_body().unwrap()["error"], "maintenance");

        assert!(chain.execute(get("/health"), ok()).await.is_ok());
        assert!(chain.execute(get("/status/db"), ok()).await.is_ok());
    }

    #[tokio::test]
    async fn passes_through_when_disabled() {
        let chain = chain(MaintenanceConfig::default());
        assert!(chain.execute(get("/ballots"), ok()).await.is_ok());
    }
}
