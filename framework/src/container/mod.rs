//! Service container for capability bindings
//!
//! Capabilities are keyed by type: binding `dyn HttpClient` stores a factory
//! under `TypeId::of::<Arc<dyn HttpClient>>()`, and resolving the same type
//! runs (or reuses) that factory. Every factory has the same signature: it
//! receives the container, for nested resolution, and the per-call options.
//!
//! - Singletons: built on first resolution, shared afterwards
//! - Transient: built on every resolution with the caller's options
//! - Last binding wins: re-binding a capability replaces the factory
//!
//! # Example
//!
//! ```rust,ignore
//! use kit::{Container, Lifetime, Options};
//!
//! let mut container = Container::new();
//! container.bind::<dyn HttpClient, _>(Lifetime::Transient, |_, options| {
//!     Ok(Arc::new(ReqwestClient::from_options(options)?) as Arc<dyn HttpClient>)
//! });
//!
//! let mut options = Options::new();
//! options.insert("base_uri".into(), json!("http://ledger.internal"));
//! let client = container.resolve::<dyn HttpClient>(&options)?;
//! ```

pub mod provider;

use crate::error::FrameworkError;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Construction options passed to factories (e.g. HTTP client options)
pub type Options = serde_json::Map<String, serde_json::Value>;

type Erased = Arc<dyn Any + Send + Sync>;

type ErasedFactory = Arc<dyn Fn(&Container, &Options) -> Result<Erased, FrameworkError> + Send + Sync>;

/// How often a binding's factory runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// One shared instance, created on first resolution
    Singleton,
    /// A fresh instance per resolution
    Transient,
}

struct Binding {
    type_name: &'static str,
    lifetime: Lifetime,
    factory: ErasedFactory,
    /// Lock-guarded lazy instance for singletons
    instance: Mutex<Option<Erased>>,
}

impl Binding {
    fn new(type_name: &'static str, lifetime: Lifetime, factory: ErasedFactory) -> Self {
        Self {
            type_name,
            lifetime,
            factory,
            instance: Mutex::new(None),
        }
    }

    fn prebuilt(type_name: &'static str, instance: Erased) -> Self {
        let shared = instance.clone();
        Self {
            type_name,
            lifetime: Lifetime::Singleton,
            factory: Arc::new(move |_, _| Ok(shared.clone())),
            instance: Mutex::new(Some(instance)),
        }
    }

    fn produce(&self, container: &Container, options: &Options) -> Result<Erased, FrameworkError> {
        match self.lifetime {
            Lifetime::Transient => (self.factory)(container, options),
            Lifetime::Singleton => {
                // Held across the factory call so concurrent first resolutions
                // build exactly one instance.
                let mut slot = self.instance.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(instance) = slot.as_ref() {
                    return Ok(instance.clone());
                }
                let instance = (self.factory)(container, options)?;
                *slot = Some(instance.clone());
                Ok(instance)
            }
        }
    }
}

/// The capability binding table
#[derive(Default)]
pub struct Container {
    /// Bindings: TypeId of `Arc<T>` -> Binding
    bindings: HashMap<TypeId, Binding>,
}

impl Container {
    /// Create a new empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a capability to a factory
    ///
    /// Replaces any existing binding for `T`.
    pub fn bind<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Container, &Options) -> Result<Arc<T>, FrameworkError> + Send + Sync + 'static,
    {
        let erased: ErasedFactory = Arc::new(move |container: &Container, options: &Options| {
            factory(container, options).map(|instance| Arc::new(instance) as Erased)
        });
        self.insert::<T>(Binding::new(std::any::type_name::<T>(), lifetime, erased));
        self
    }

    /// Bind a capability to a shared singleton factory
    pub fn singleton<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Container, &Options) -> Result<Arc<T>, FrameworkError> + Send + Sync + 'static,
    {
        self.bind::<T, F>(Lifetime::Singleton, factory)
    }

    /// Bind a capability to a per-resolution factory
    pub fn transient<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Container, &Options) -> Result<Arc<T>, FrameworkError> + Send + Sync + 'static,
    {
        self.bind::<T, F>(Lifetime::Transient, factory)
    }

    /// Bind a prebuilt instance
    ///
    /// # Example
    /// ```rust,ignore
    /// container.instance::<dyn Gate>(Arc::new(PermissionGate::new(vec!["admin".into()])));
    /// ```
    pub fn instance<T: ?Sized + Send + Sync + 'static>(&mut self, instance: Arc<T>) -> &mut Self {
        let erased: Erased = Arc::new(instance);
        self.insert::<T>(Binding::prebuilt(std::any::type_name::<T>(), erased));
        self
    }

    fn insert<T: ?Sized + 'static>(&mut self, binding: Binding) {
        let type_name = binding.type_name;
        let lifetime = binding.lifetime;
        if self.bindings.insert(TypeId::of::<Arc<T>>(), binding).is_some() {
            tracing::debug!(capability = type_name, ?lifetime, "replacing existing binding");
        } else {
            tracing::debug!(capability = type_name, ?lifetime, "bound capability");
        }
    }

    /// Resolve a capability with construction options
    ///
    /// Singletons ignore `options` once built.
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(
        &self,
        options: &Options,
    ) -> Result<Arc<T>, FrameworkError> {
        let binding = self
            .bindings
            .get(&TypeId::of::<Arc<T>>())
            .ok_or_else(FrameworkError::capability_not_found::<T>)?;

        let erased = binding.produce(self, options)?;
        erased.downcast_ref::<Arc<T>>().cloned().ok_or_else(|| {
            FrameworkError::internal(format!(
                "binding for '{}' produced a value of the wrong type",
                binding.type_name
            ))
        })
    }

    /// Resolve a capability without options
    pub fn make<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, FrameworkError> {
        self.resolve::<T>(&Options::new())
    }

    /// Check if a capability is bound
    pub fn has<T: ?Sized + 'static>(&self) -> bool {
        self.bindings.contains_key(&TypeId::of::<Arc<T>>())
    }

    /// Lifetime of a bound capability
    pub fn lifetime<T: ?Sized + 'static>(&self) -> Option<Lifetime> {
        self.bindings.get(&TypeId::of::<Arc<T>>()).map(|b| b.lifetime)
    }

    /// Names of all bound capabilities (sorted, for diagnostics)
    pub fn bound(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.bindings.values().map(|b| b.type_name).collect();
        names.sort_unstable();
        names
    }
}
