//! Middleware pipeline
//!
//! A middleware wraps the rest of the pipeline (onion model): it may inspect
//! or rewrite the request, short-circuit with its own response, or call
//! `next.run(request)` and post-process whatever comes back.
//!
//! # Example
//!
//! ```rust,ignore
//! use kit::{async_trait, Middleware, Next, Request, Response};
//!
//! pub struct RequireJson;
//!
//! #[async_trait]
//! impl Middleware for RequireJson {
//!     async fn handle(&self, request: Request, next: Next) -> Response {
//!         if !request.is_json() {
//!             return kit::middleware::abort(415, "unsupported_media_type", "JSON only");
//!         }
//!         next.run(request).await
//!     }
//! }
//! ```

pub mod builtin;
pub mod registry;

pub use registry::{MiddlewareRegistry, MiddlewareParameters};

use crate::error::FrameworkError;
use crate::http::{Request, Response};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A composable request-processing step
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Process the request, optionally delegating to `next`
    async fn handle(&self, request: Request, next: Next) -> Response;

    /// Identifier shown by `middleware:list` and in logs
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Shared, type-erased middleware
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Terminal handler at the center of the onion
pub type BoxedHandler =
    Box<dyn Fn(Request) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync>;

/// Box a middleware for storage in registries and chains
pub fn into_boxed<M: Middleware + 'static>(middleware: M) -> BoxedMiddleware {
    Arc::new(middleware)
}

/// Short-circuit with a structured error response
pub fn abort(status: u16, code: &'static str, message: impl Into<String>) -> Response {
    Err(FrameworkError::abort(status, code, message).into())
}

/// The remainder of the pipeline, handed to each middleware
pub struct Next {
    chain: Arc<[BoxedMiddleware]>,
    index: usize,
    handler: Arc<BoxedHandler>,
}

impl Next {
    /// Run the next middleware, or the handler once the chain is exhausted
    pub async fn run(self, request: Request) -> Response {
        match self.chain.get(self.index).cloned() {
            Some(middleware) => {
                let next = Next {
                    chain: self.chain,
                    index: self.index + 1,
                    handler: self.handler,
                };
                middleware.handle(request, next).await
            }
            None => (self.handler)(request).await,
        }
    }
}

/// An ordered list of middleware ready to run around a handler
#[derive(Default, Clone)]
pub struct MiddlewareChain {
    middleware: Vec<BoxedMiddleware>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, middleware: BoxedMiddleware) {
        self.middleware.push(middleware);
    }

    pub fn extend(&mut self, middleware: impl IntoIterator<Item = BoxedMiddleware>) {
        self.middleware.extend(middleware);
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Run the chain in order with `handler` at the center
    pub async fn execute(&self, request: Request, handler: Arc<BoxedHandler>) -> Response {
        let next = Next {
            chain: self.middleware.clone().into(),
            index: 0,
            handler,
        };
        next.run(request).await
    }
}

/// Box an async closure as a terminal handler
pub fn handler<H, Fut>(handler: H) -> Arc<BoxedHandler>
where
    H: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    let boxed: BoxedHandler = Box::new(move |req| Box::pin(handler(req)));
    Arc::new(boxed)
}
