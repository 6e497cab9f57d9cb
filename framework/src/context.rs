//! Application context
//!
//! Holds the process-wide state that the host framework would otherwise keep
//! in globals: the config repository, the capability container and the
//! middleware registry. It is built once during bootstrap, mutated only by
//! service providers, then frozen behind an `Arc` while requests are served.

use crate::config::{Config, ConfigRepository};
use crate::container::provider::ServiceProvider;
use crate::container::Container;
use crate::error::FrameworkError;
use crate::middleware::MiddlewareRegistry;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

/// Bootstrap progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Providers are registering
    Registering,
    /// Every registered provider has booted
    Booted,
}

/// Everything providers and the HTTP kernel share
pub struct ApplicationContext {
    env: Config,
    config: ConfigRepository,
    container: Container,
    middleware: MiddlewareRegistry,
    providers: Vec<Arc<dyn ServiceProvider>>,
    phase: Phase,
}

impl ApplicationContext {
    pub fn new(env: Config) -> Self {
        Self::with_config(env, ConfigRepository::new())
    }

    /// Start from an already populated config repository (e.g. app overrides)
    pub fn with_config(env: Config, config: ConfigRepository) -> Self {
        Self {
            env,
            config,
            container: Container::new(),
            middleware: MiddlewareRegistry::new(),
            providers: Vec::new(),
            phase: Phase::Registering,
        }
    }

    /// Environment-derived settings
    pub fn env(&self) -> &Config {
        &self.env
    }

    pub fn config(&self) -> &ConfigRepository {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConfigRepository {
        &mut self.config
    }

    /// Typed view of a config namespace
    pub fn section<T: DeserializeOwned>(&self, namespace: &str) -> Result<T, FrameworkError> {
        self.config.section(namespace)
    }

    /// Merge a bundle file under `namespace`; existing keys win
    pub fn merge_config_from(&mut self, path: &Path, namespace: &str) -> Result<(), FrameworkError> {
        self.config.merge_from(path, namespace)
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut Container {
        &mut self.container
    }

    pub fn middleware(&self) -> &MiddlewareRegistry {
        &self.middleware
    }

    pub fn middleware_mut(&mut self) -> &mut MiddlewareRegistry {
        &mut self.middleware
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Names of registered providers, in registration order
    pub fn providers(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Run a provider's register phase and remember it for boot
    ///
    /// Providers may register nested providers from their own `register`.
    /// Registering after boot boots the provider immediately.
    pub fn register<P: ServiceProvider + 'static>(&mut self, provider: P) -> Result<(), FrameworkError> {
        self.register_arc(Arc::new(provider))
    }

    /// Register a boxed provider (used for discovered providers)
    pub fn register_boxed(&mut self, provider: Box<dyn ServiceProvider>) -> Result<(), FrameworkError> {
        self.register_arc(Arc::from(provider))
    }

    fn register_arc(&mut self, provider: Arc<dyn ServiceProvider>) -> Result<(), FrameworkError> {
        tracing::info!(provider = provider.name(), "registering service provider");
        provider.register(self)?;
        self.providers.push(provider.clone());

        if self.phase == Phase::Booted {
            tracing::info!(provider = provider.name(), "booting late provider");
            provider.boot(self)?;
        }
        Ok(())
    }

    /// Boot every registered provider once, in registration order
    pub fn boot(&mut self) -> Result<(), FrameworkError> {
        if self.phase == Phase::Booted {
            return Ok(());
        }
        let providers = self.providers.clone();
        for provider in providers {
            tracing::info!(provider = provider.name(), "booting service provider");
            provider.boot(self)?;
        }
        self.phase = Phase::Booted;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::config::{AppConfig, Environment, ServerConfig};

    /// A fresh context that ignores the process environment
    pub fn context() -> ApplicationContext {
        ApplicationContext::new(Config {
            environment: Environment::Testing,
            app: AppConfig::builder().environment(Environment::Testing).build(),
            server: ServerConfig::builder().host("127.0.0.1").port(0).build(),
        })
    }
}
