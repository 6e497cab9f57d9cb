//! Configuration for Kit applications
//!
//! Two layers:
//! - environment: `.env` loading with environment-based precedence and the
//!   typed [`AppConfig`] / [`ServerConfig`] read from it
//! - namespaces: JSON bundles (`auth`, `logging`, ...) in a
//!   [`ConfigRepository`], where application overrides win over the defaults
//!   providers merge in
//!
//! # Example
//!
//! ```rust,no_run
//! use kit::config::{Config, ConfigRepository, LoggingConfig};
//!
//! let env = Config::init(std::path::Path::new("."));
//! println!("Running in {} environment on port {}", env.environment, env.server.port);
//!
//! let mut repo = ConfigRepository::new();
//! repo.merge_str("logging.json", r#"{"level": "debug"}"#, "logging").unwrap();
//! let logging: LoggingConfig = repo.section("logging").unwrap();
//! ```

pub mod env;
pub mod loader;
pub mod merge;
pub mod providers;
pub mod repository;
pub mod sections;

pub use env::{env, env_optional, load_dotenv, Environment};
pub use merge::merge;
pub use providers::{AppConfig, AppConfigBuilder, ServerConfig, ServerConfigBuilder};
pub use repository::ConfigRepository;
pub use sections::{
    ApiConfig, AuthConfig, DiskConfig, DispatcherKind, ExternalConfig, ExternalService,
    FilesystemsConfig, JwtConfig, LogFormat, LoggingConfig, MaintenanceConfig,
    MicroservicesConfig, QueueConfig, ServiceEndpoint, TimeConfig, TrimConfig, VoteConfig,
};

use std::path::Path;

/// Environment-derived configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub app: AppConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Load `.env` files from `project_root` and read the typed configs
    pub fn init(project_root: &Path) -> Self {
        let environment = env::load_dotenv(project_root);
        Self {
            environment,
            app: AppConfig::from_env(),
            server: ServerConfig::from_env(),
        }
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.is_production()
    }

    /// Check if debug mode is enabled
    pub fn is_debug(&self) -> bool {
        self.app.debug
    }
}
