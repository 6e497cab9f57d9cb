//! Service providers: the register/boot lifecycle
//!
//! A provider groups a related family of config bundles, bindings and
//! middleware. `register` runs first for every provider and may only rely on
//! what it sets up itself (or what earlier providers registered); `boot` runs
//! after every provider has registered, so it can resolve any binding.
//!
//! # Example
//!
//! ```rust,ignore
//! use kit::{ApplicationContext, FrameworkError, ServiceProvider};
//!
//! pub struct LedgerServiceProvider;
//!
//! impl ServiceProvider for LedgerServiceProvider {
//!     fn register(&self, ctx: &mut ApplicationContext) -> Result<(), FrameworkError> {
//!         ctx.config_mut().merge_str("ledger.json", include_str!("../config/ledger.json"), "ledger")?;
//!         ctx.container_mut().singleton::<dyn Ledger, _>(|_, _| Ok(Arc::new(MemoryLedger::default()) as Arc<dyn Ledger>));
//!         Ok(())
//!     }
//! }
//!
//! // Optional: let `Application::discover()` find it
//! kit::submit_provider!(LedgerServiceProvider);
//! ```

use crate::context::ApplicationContext;
use crate::error::FrameworkError;

/// A bundle of registrations with a two-phase lifecycle
pub trait ServiceProvider: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Merge config, bind capabilities, install global middleware
    fn register(&self, ctx: &mut ApplicationContext) -> Result<(), FrameworkError>;

    /// Work that needs every provider registered (route aliases, eager resolution)
    fn boot(&self, _ctx: &mut ApplicationContext) -> Result<(), FrameworkError> {
        Ok(())
    }
}

/// Entry for inventory-collected providers
///
/// Used by the `submit_provider!` macro so packages can ship providers that
/// applications pick up with `Application::discover()`.
pub struct ProviderEntry {
    /// Build the provider
    pub build: fn() -> Box<dyn ServiceProvider>,
    /// Provider name for debugging/logging
    pub name: &'static str,
}

inventory::collect!(ProviderEntry);

/// Construct a provider through `Default`
pub fn build_default<P: ServiceProvider + Default + 'static>() -> Box<dyn ServiceProvider> {
    Box::new(P::default())
}

/// All providers submitted with `submit_provider!`
pub fn discovered() -> Vec<Box<dyn ServiceProvider>> {
    inventory::iter::<ProviderEntry>
        .into_iter()
        .map(|entry| {
            tracing::debug!(provider = entry.name, "discovered service provider");
            (entry.build)()
        })
        .collect()
}

/// Submit a provider for discovery
///
/// The provider type must implement `Default`.
#[macro_export]
macro_rules! submit_provider {
    ($provider:ty) => {
        $crate::inventory::submit! {
            $crate::container::provider::ProviderEntry {
                build: $crate::container::provider::build_default::<$provider>,
                name: ::std::stringify!($provider),
            }
        }
    };
}
