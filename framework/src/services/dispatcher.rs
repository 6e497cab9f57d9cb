//! Microservice dispatch
//!
//! `DirectDispatcher` posts a message to the target service right away.
//! `ScheduledDispatcher` queues it and delivers from a background worker,
//! retrying failed deliveries up to `microservices.queue.max_attempts`.

use super::http_client::{HttpClient, OutgoingRequest};
use crate::config::MicroservicesConfig;
use crate::container::Container;
use crate::error::FrameworkError;
use async_trait::async_trait;
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

/// A message for another service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceMessage {
    /// Key of `microservices.services`
    pub service: String,
    /// HTTP method, `POST` unless set
    pub method: String,
    /// Path on the target service
    pub action: String,
    pub payload: Value,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ServiceMessage {
    pub fn new(service: impl Into<String>, action: impl Into<String>, payload: Value) -> Self {
        Self {
            service: service.into(),
            method: Method::POST.to_string(),
            action: action.into(),
            payload,
            headers: BTreeMap::new(),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method.to_string();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// What happened to a dispatched message
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The service answered with a success status
    Delivered { status: u16, body: Value },
    /// Accepted for background delivery
    Queued { id: u64 },
}

/// Sends messages to other services
#[async_trait]
pub trait MicroserviceDispatcher: Send + Sync {
    async fn dispatch(&self, message: ServiceMessage) -> Result<DispatchOutcome, FrameworkError>;

    /// Deliver queued messages now. Immediate dispatchers have nothing to do.
    async fn run_pending(&self) -> DrainReport {
        DrainReport::default()
    }

    /// Messages waiting for delivery
    fn pending(&self) -> usize {
        0
    }

    /// Start background delivery for dispatchers that queue
    ///
    /// The worker lives in this process; abort the handle on shutdown.
    fn start_worker(self: Arc<Self>, _interval: Duration) -> Option<JoinHandle<()>> {
        None
    }
}

/// Posts each message to its service immediately
#[derive(Default)]
pub struct DirectDispatcher {
    clients: BTreeMap<String, Arc<dyn HttpClient>>,
}

impl DirectDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `client` for messages to `service`
    pub fn with_client(mut self, service: impl Into<String>, client: Arc<dyn HttpClient>) -> Self {
        self.clients.insert(service.into(), client);
        self
    }

    /// One client per configured service, resolved from the container
    pub fn from_config(container: &Container, config: &MicroservicesConfig) -> Result<Self, FrameworkError> {
        let mut dispatcher = Self::new();
        for service in config.services.keys() {
            let options = config.client_options(service).unwrap_or_default();
            let client = container.resolve::<dyn HttpClient>(&options)?;
            dispatcher = dispatcher.with_client(service.clone(), client);
        }
        Ok(dispatcher)
    }

    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }
}

#[async_trait]
impl MicroserviceDispatcher for DirectDispatcher {
    async fn dispatch(&self, message: ServiceMessage) -> Result<DispatchOutcome, FrameworkError> {
        let client = self
            .clients
            .get(&message.service)
            .ok_or_else(|| FrameworkError::dispatch(&message.service, "service is not configured"))?;
        let method = Method::from_bytes(message.method.as_bytes())
            .map_err(|_| FrameworkError::dispatch(&message.service, format!("invalid method '{}'", message.method)))?;

        let mut request = OutgoingRequest::new(method, message.action.clone()).json(message.payload);
        request.headers = message.headers;

        let response = client
            .send(request)
            .await
            .map_err(|e| FrameworkError::dispatch(&message.service, e.to_string()))?;
        if !response.is_success() {
            return Err(FrameworkError::dispatch(
                &message.service,
                format!("{} responded with status {}", message.action, response.status),
            ));
        }

        let body = if response.body.is_empty() {
            Value::Null
        } else {
            response
                .json::<Value>()
                .unwrap_or_else(|_| Value::String(response.text()))
        };
        tracing::debug!(service = %message.service, action = %message.action, status = response.status, "message delivered");
        Ok(DispatchOutcome::Delivered {
            status: response.status,
            body,
        })
    }
}

/// Result of one queue drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub delivered: usize,
    pub retried: usize,
    pub dropped: usize,
}

struct Queued {
    id: u64,
    message: ServiceMessage,
    attempts: u32,
}

/// Queues messages and delivers them through an inner dispatcher
pub struct ScheduledDispatcher {
    inner: Arc<dyn MicroserviceDispatcher>,
    queue: Mutex<VecDeque<Queued>>,
    next_id: AtomicU64,
    max_attempts: u32,
}

impl ScheduledDispatcher {
    pub fn new(inner: Arc<dyn MicroserviceDispatcher>, max_attempts: u32) -> Self {
        Self {
            inner,
            queue: Mutex::new(VecDeque::new()),
            next_id: AtomicU64::new(1),
            max_attempts: max_attempts.max(1),
        }
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, VecDeque<Queued>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drain the queue every `interval` until the handle is aborted
    pub fn spawn_worker(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let report = self.run_pending().await;
                if report != DrainReport::default() {
                    tracing::info!(
                        delivered = report.delivered,
                        retried = report.retried,
                        dropped = report.dropped,
                        "drained dispatch queue"
                    );
                }
            }
        })
    }
}

#[async_trait]
impl MicroserviceDispatcher for ScheduledDispatcher {
    async fn dispatch(&self, message: ServiceMessage) -> Result<DispatchOutcome, FrameworkError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(id, service = %message.service, action = %message.action, "queued message");
        self.queue().push_back(Queued {
            id,
            message,
            attempts: 0,
        });
        Ok(DispatchOutcome::Queued { id })
    }

    /// Deliver everything queued so far
    ///
    /// Messages queued while draining wait for the next run.
    async fn run_pending(&self) -> DrainReport {
        let batch: Vec<Queued> = self.queue().drain(..).collect();
        let mut report = DrainReport::default();

        for mut queued in batch {
            match self.inner.dispatch(queued.message.clone()).await {
                Ok(_) => report.delivered += 1,
                Err(e) => {
                    queued.attempts += 1;
                    if queued.attempts >= self.max_attempts {
                        tracing::error!(id = queued.id, attempts = queued.attempts, error = %e, "dropping undeliverable message");
                        report.dropped += 1;
                    } else {
                        tracing::warn!(id = queued.id, attempts = queued.attempts, error = %e, "delivery failed, will retry");
                        report.retried += 1;
                        self.queue().push_back(queued);
                    }
                }
            }
        }
        report
    }

    fn pending(&self) -> usize {
        self.queue().len()
    }

    fn start_worker(self: Arc<Self>, interval: Duration) -> Option<JoinHandle<()>> {
        Some(ScheduledDispatcher::spawn_worker(self, interval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceEndpoint;
    use crate::container::Options;
    use crate::services::http_client::OutgoingResponse;
    use bytes::Bytes;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    /// Answers every request with a fixed status and records the paths
    struct FakeClient {
        status: u16,
        seen: Mutex<Vec<String>>,
    }

    impl FakeClient {
        fn new(status: u16) -> Arc<Self> {
            Arc::new(Self {
                status,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl HttpClient for FakeClient {
        async fn send(&self, request: OutgoingRequest) -> Result<OutgoingResponse, FrameworkError> {
            self.seen.lock().unwrap().push(format!("{} {}", request.method, request.path));
            Ok(OutgoingResponse {
                status: self.status,
                headers: BTreeMap::new(),
                body: Bytes::from(json!({ "echo": request.json }).to_string()),
            })
        }
    }

    #[tokio::test]
    async fn direct_dispatch_posts_to_the_service() {
        let client = FakeClient::new(200);
        let dispatcher = DirectDispatcher::new().with_client("ledger", client.clone());

        let outcome = dispatcher
            .dispatch(ServiceMessage::new("ledger", "/stakes", json!({ "amount": 5 })))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Delivered {
                status: 200,
                body: json!({ "echo": { "amount": 5 } })
            }
        );
        assert_eq!(*client.seen.lock().unwrap(), vec!["POST /stakes"]);
    }

    #[tokio::test]
    async fn unknown_services_and_failures_are_dispatch_errors() {
        let dispatcher = DirectDispatcher::new().with_client("ledger", FakeClient::new(500));

        let unknown = dispatcher
            .dispatch(ServiceMessage::new("billing", "/x", Value::Null))
            .await
            .unwrap_err();
        assert!(matches!(unknown, FrameworkError::Dispatch { ref service, .. } if service == "billing"));

        let failed = dispatcher
            .dispatch(ServiceMessage::new("ledger", "/x", Value::Null))
            .await
            .unwrap_err();
        assert_eq!(failed.status_code(), 502);
    }

    #[test]
    fn from_config_resolves_one_client_per_service() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let mut container = Container::new();
        container.transient::<dyn HttpClient, _>(move |_, options: &Options| {
            assert!(options.contains_key("base_uri"));
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(FakeClient::new(200) as Arc<dyn HttpClient>)
        });

        let mut config = MicroservicesConfig::default();
        for name in ["ledger", "wallet"] {
            config.services.insert(
                name.to_string(),
                ServiceEndpoint {
                    base_uri: format!("http://{}", name),
                    timeout: None,
                    headers: BTreeMap::new(),
                },
            );
        }

        let dispatcher = DirectDispatcher::from_config(&container, &config).unwrap();
        assert_eq!(dispatcher.services().collect::<Vec<_>>(), vec!["ledger", "wallet"]);
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    /// Fails a configurable number of times before succeeding
    struct Flaky {
        failures_left: AtomicUsize,
        delivered: AtomicUsize,
    }

    #[async_trait]
    impl MicroserviceDispatcher for Flaky {
        async fn dispatch(&self, message: ServiceMessage) -> Result<DispatchOutcome, FrameworkError> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(FrameworkError::dispatch(message.service, "unavailable"));
            }
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(DispatchOutcome::Delivered {
                status: 200,
                body: Value::Null,
            })
        }
    }

    fn flaky(failures: usize) -> Arc<Flaky> {
        Arc::new(Flaky {
            failures_left: AtomicUsize::new(failures),
            delivered: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn scheduled_dispatch_queues_then_delivers() {
        let inner = flaky(0);
        let dispatcher = ScheduledDispatcher::new(inner.clone(), 3);

        let first = dispatcher.dispatch(ServiceMessage::new("ledger", "/a", Value::Null)).await.unwrap();
        let second = dispatcher.dispatch(ServiceMessage::new("ledger", "/b", Value::Null)).await.unwrap();
        assert_eq!(first, DispatchOutcome::Queued { id: 1 });
        assert_eq!(second, DispatchOutcome::Queued { id: 2 });
        assert_eq!(dispatcher.pending(), 2);
        assert_eq!(inner.delivered.load(Ordering::SeqCst), 0);

        let report = dispatcher.run_pending().await;
        assert_eq!(report, DrainReport { delivered: 2, retried: 0, dropped: 0 });
        assert_eq!(dispatcher.pending(), 0);
    }

    #[tokio::test]
    async fn failed_deliveries_retry_until_max_attempts() {
        let dispatcher = ScheduledDispatcher::new(flaky(usize::MAX), 2);
        dispatcher.dispatch(ServiceMessage::new("ledger", "/a", Value::Null)).await.unwrap();

        assert_eq!(dispatcher.run_pending().await.retried, 1);
        assert_eq!(dispatcher.pending(), 1);
        assert_eq!(dispatcher.run_pending().await.dropped, 1);
        assert_eq!(dispatcher.pending(), 0);
    }

    #[tokio::test]
    async fn worker_drains_in_the_background() {
        let inner = flaky(1);
        let dispatcher = Arc::new(ScheduledDispatcher::new(inner.clone(), 3));
        dispatcher.dispatch(ServiceMessage::new("ledger", "/a", Value::Null)).await.unwrap();

        let worker = dispatcher.clone().spawn_worker(Duration::from_millis(5));
        for _ in 0..100 {
            if inner.delivered.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        worker.abort();

        assert_eq!(inner.delivered.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.pending(), 0);
    }

    #[tokio::test]
    async fn only_queueing_dispatchers_start_a_worker() {
        let direct: Arc<dyn MicroserviceDispatcher> = Arc::new(DirectDispatcher::new());
        assert!(direct.start_worker(Duration::from_millis(5)).is_none());

        let inner = flaky(0);
        let scheduled: Arc<dyn MicroserviceDispatcher> = Arc::new(ScheduledDispatcher::new(inner.clone(), 3));
        scheduled.dispatch(ServiceMessage::new("ledger", "/a", Value::Null)).await.unwrap();

        let worker = scheduled.clone().start_worker(Duration::from_millis(5)).unwrap();
        for _ in 0..100 {
            if scheduled.pending() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        worker.abort();

        assert_eq!(inner.delivered.load(Ordering::SeqCst), 1);
        assert_eq!(scheduled.pending(), 0);
    }
}
