//! Application builder for Kit framework
//!
//! Provides a fluent builder API to configure, bootstrap and run a Kit
//! application.
//!
//! # Example
//!
//! ```rust,ignore
//! use kit::Application;
//!
//! #[tokio::main]
//! async fn main() {
//!     Application::new()
//!         .provider(VoteServiceProvider)
//!         .discover()
//!         .routes(routes::register)
//!         .run()
//!         .await;
//! }
//! ```

use crate::config::{Config, ConfigRepository, LoggingConfig, MicroservicesConfig};
use crate::container::provider::{self, ServiceProvider};
use crate::context::ApplicationContext;
use crate::error::FrameworkError;
use crate::kernel::HttpKernel;
use crate::providers::{BaseServiceProvider, LOGGING_BUNDLE};
use crate::routing::Router;
use crate::server::{shutdown_signal, Server};
use crate::services::MicroserviceDispatcher;
use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;

/// CLI structure for Kit applications
#[derive(Parser)]
#[command(name = "app")]
#[command(about = "Kit application server and utilities")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the web server (default command)
    Serve,
    /// Print the merged configuration
    #[command(name = "config:show")]
    ConfigShow {
        /// Only show this namespace
        namespace: Option<String>,
    },
    /// List the global pipeline and route aliases
    #[command(name = "middleware:list")]
    MiddlewareList,
}

/// Application builder for Kit framework
///
/// Use this to configure and run your Kit application with a fluent API.
pub struct Application {
    root: PathBuf,
    config_dir: Option<PathBuf>,
    providers: Vec<Box<dyn ServiceProvider>>,
    routes_fn: Option<Box<dyn FnOnce(&ApplicationContext) -> Result<Router, FrameworkError> + Send>>,
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Application {
    /// Create a new application builder rooted at the working directory
    pub fn new() -> Self {
        Application {
            root: PathBuf::from("."),
            config_dir: None,
            providers: Vec::new(),
            routes_fn: None,
        }
    }

    /// Project root holding the `.env` files and the `config/` directory
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Override directory, relative to the root
    ///
    /// Defaults to `APP_CONFIG_DIR`, then `config`.
    pub fn config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    /// Register an application provider; it runs after the base provider
    pub fn provider<P: ServiceProvider + 'static>(mut self, provider: P) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Add every provider submitted with `submit_provider!`
    pub fn discover(mut self) -> Self {
        self.providers.extend(provider::discovered());
        self
    }

    /// Register a routes function
    ///
    /// It runs after boot, so handlers can capture resolved capabilities.
    /// Resolution errors abort bootstrap.
    ///
    /// ```rust,ignore
    /// Application::new()
    ///     .routes(routes::register)
    /// ```
    pub fn routes<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&ApplicationContext) -> Result<Router, FrameworkError> + Send + 'static,
    {
        self.routes_fn = Some(Box::new(f));
        self
    }

    /// Build the context and the kernel
    ///
    /// Loads the environment and application overrides, initialises logging
    /// from them, registers the base provider then the application providers,
    /// boots every provider and resolves the routes' middleware aliases.
    pub fn bootstrap(self) -> Result<(ApplicationContext, HttpKernel), FrameworkError> {
        let Application {
            root,
            config_dir,
            providers,
            routes_fn,
        } = self;

        let env = Config::init(&root);
        let dir = override_dir(&root, config_dir, &env);
        let mut overrides = ConfigRepository::new();
        overrides.load_directory(&dir)?;
        crate::logging::init(&startup_logging(&overrides)?);
        tracing::debug!(dir = %dir.display(), "configuration overrides loaded");

        let mut ctx = ApplicationContext::with_config(env, overrides);
        ctx.register(BaseServiceProvider::new())?;
        for provider in providers {
            ctx.register_boxed(provider)?;
        }

        tracing::info!(
            environment = %ctx.env().environment,
            providers = ?ctx.providers(),
            "service providers registered"
        );

        ctx.boot()?;

        let router = match routes_fn {
            Some(f) => f(&ctx)?,
            None => Router::new(),
        };
        let kernel = HttpKernel::new(&ctx, router)?;
        tracing::info!("application booted");
        Ok((ctx, kernel))
    }

    /// Run the application
    ///
    /// This parses CLI arguments and executes the appropriate command:
    /// - `serve` (default): Run the web server
    /// - `config:show [namespace]`: Print merged configuration
    /// - `middleware:list`: Show the pipeline and aliases
    ///
    /// Any bootstrap or runtime error is logged and the process exits with
    /// status 1.
    pub async fn run(self) {
        let cli = Cli::parse();
        if let Err(e) = self.execute(cli.command.unwrap_or(Commands::Serve)).await {
            tracing::error!(error = %e, "fatal error");
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }

    async fn execute(self, command: Commands) -> Result<(), FrameworkError> {
        let (ctx, kernel) = self.bootstrap()?;

        match command {
            Commands::Serve => {
                let server = Server::new(kernel, &ctx.env().server)?;
                let listener = server.bind().await?;
                serve(&ctx, server, listener, shutdown_signal()).await
            }
            Commands::ConfigShow { namespace } => {
                println!("{}", show_config(&ctx, namespace.as_deref())?);
                Ok(())
            }
            Commands::MiddlewareList => {
                print!("{}", list_middleware(&ctx));
                Ok(())
            }
        }
    }
}

fn show_config(ctx: &ApplicationContext, namespace: Option<&str>) -> Result<String, FrameworkError> {
    let value = match namespace {
        Some(name) => ctx
            .config()
            .namespace(name)
            .cloned()
            .ok_or_else(|| FrameworkError::config_parse(name, "unknown config namespace"))?,
        None => serde_json::Value::Object(ctx.config().all().clone()),
    };
    serde_json::to_string_pretty(&value).map_err(|e| FrameworkError::internal(e.to_string()))
}

fn list_middleware(ctx: &ApplicationContext) -> String {
    let mut out = String::from("Global (execution order):\n");
    for (i, name) in ctx.middleware().global_names().iter().enumerate() {
        out.push_str(&format!("  {}. {}\n", i + 1, name));
    }
    out.push_str("Aliases:\n");
    let mut aliases: Vec<_> = ctx.middleware().aliases().collect();
    aliases.sort();
    for (alias, name) in aliases {
        out.push_str(&format!("  {:<12} {}\n", alias, name));
    }
    out
}

/// Serve HTTP with the dispatch worker running beside it
///
/// Queued messages are delivered by this process only; the worker stops
/// with the server.
async fn serve(
    ctx: &ApplicationContext,
    server: Server,
    listener: TcpListener,
    shutdown: impl Future<Output = ()>,
) -> Result<(), FrameworkError> {
    let config: MicroservicesConfig = ctx.section("microservices")?;
    let dispatcher = ctx.container().make::<dyn MicroserviceDispatcher>()?;
    let every = Duration::from_millis(config.queue.interval.max(1));
    let worker = dispatcher.clone().start_worker(every);
    if worker.is_some() {
        tracing::info!(interval_ms = every.as_millis() as u64, "dispatch worker started");
    }

    let served = server.serve(listener, shutdown).await;

    if let Some(worker) = worker {
        worker.abort();
        tracing::info!(pending = dispatcher.pending(), "dispatch worker stopped");
    }
    served
}

fn override_dir(root: &std::path::Path, explicit: Option<PathBuf>, env: &Config) -> PathBuf {
    root.join(explicit.unwrap_or_else(|| PathBuf::from(&env.app.config_dir)))
}

/// Logging settings known before any provider runs: application overrides
/// over the embedded defaults
fn startup_logging(overrides: &ConfigRepository) -> Result<LoggingConfig, FrameworkError> {
    let mut logging = ConfigRepository::new();
    if let Some(value) = overrides.namespace("logging") {
        logging.merge_defaults("logging", value);
    }
    logging.merge_str("logging.json", LOGGING_BUNDLE, "logging")?;
    logging.section("logging")
}
