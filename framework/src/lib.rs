pub mod app;
pub mod config;
pub mod container;
pub mod context;
pub mod error;
pub mod http;
pub mod kernel;
pub mod logging;
pub mod middleware;
pub mod providers;
pub mod routing;
pub mod server;
pub mod services;

pub use app::Application;
pub use config::{Config, ConfigRepository};
pub use container::provider::ServiceProvider;
pub use container::{Container, Lifetime, Options};
pub use context::{ApplicationContext, Phase};
pub use error::{AppError, FrameworkError};
pub use http::{json, text, HttpResponse, Request, Response, ResponseExt};
pub use kernel::HttpKernel;
pub use middleware::{Middleware, MiddlewareRegistry, Next};
pub use providers::{AuthServiceProvider, BaseServiceProvider};
pub use routing::Router;
pub use server::Server;
pub use services::{
    Authenticator, DispatchOutcome, Gate, HttpClient, MicroserviceDispatcher, OutgoingRequest,
    Principal, ServiceMessage,
};

// Re-exported for `#[kit::async_trait]` middleware and capability impls
pub use async_trait::async_trait;

#[doc(hidden)]
pub use inventory;
