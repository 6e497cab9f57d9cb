//! Middleware registry: the global pipeline and route-level aliases
//!
//! Providers fill the registry during bootstrap. The global list runs on
//! every request; aliases only run on routes that opt in by name.
//!
//! ```rust,ignore
//! // register phase
//! ctx.middleware_mut()
//!     .prepend(TrimStrings::new(&api))
//!     .prepend(BeforeResponse::new(&time));
//!
//! // boot phase
//! ctx.middleware_mut().alias("auth", Authenticate::new(authenticator, "authorization"));
//!
//! // routes
//! Router::new().get("/me", me).middleware("auth");
//! ```

use super::{into_boxed, BoxedMiddleware, Middleware, Next};
use crate::error::FrameworkError;
use crate::http::{Request, Response};
use async_trait::async_trait;
use std::any::TypeId;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One slot of the global pipeline
#[derive(Clone)]
struct Entry {
    type_id: TypeId,
    middleware: BoxedMiddleware,
}

/// Registry for global middleware and route aliases
#[derive(Default)]
pub struct MiddlewareRegistry {
    /// Middleware that runs on every request (in order)
    global: Vec<Entry>,
    /// Opt-in middleware by alias name
    aliases: BTreeMap<String, BoxedMiddleware>,
}

impl MiddlewareRegistry {
    /// Create a new empty middleware registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert global middleware at the front of the pipeline
    ///
    /// Each prepend becomes the new first entry, so a sequence of prepends
    /// runs in reverse call order. A middleware type already present in the
    /// pipeline is not added twice.
    pub fn prepend<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        let type_id = TypeId::of::<M>();
        if self.contains_type(type_id) {
            tracing::debug!(middleware = middleware.name(), "already in global pipeline, skipping prepend");
            return self;
        }
        tracing::debug!(middleware = middleware.name(), "prepending global middleware");
        self.global.insert(
            0,
            Entry {
                type_id,
                middleware: into_boxed(middleware),
            },
        );
        self
    }

    /// Append global middleware to the end of the pipeline
    pub fn append<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        let type_id = TypeId::of::<M>();
        if self.contains_type(type_id) {
            tracing::debug!(middleware = middleware.name(), "already in global pipeline, skipping append");
            return self;
        }
        tracing::debug!(middleware = middleware.name(), "appending global middleware");
        self.global.push(Entry {
            type_id,
            middleware: into_boxed(middleware),
        });
        self
    }

    /// Register middleware under a route alias
    ///
    /// Aliases are independent of the global pipeline; registering the same
    /// name again replaces the previous unit.
    pub fn alias<M: Middleware + 'static>(&mut self, name: impl Into<String>, middleware: M) -> &mut Self {
        self.alias_boxed(name, into_boxed(middleware))
    }

    /// Register an already boxed middleware under a route alias
    pub fn alias_boxed(&mut self, name: impl Into<String>, middleware: BoxedMiddleware) -> &mut Self {
        let name = name.into();
        if self.aliases.insert(name.clone(), middleware).is_some() {
            tracing::debug!(alias = %name, "replacing middleware alias");
        } else {
            tracing::debug!(alias = %name, "registered middleware alias");
        }
        self
    }

    /// Whether a middleware type is part of the global pipeline
    pub fn contains<M: Middleware + 'static>(&self) -> bool {
        self.contains_type(TypeId::of::<M>())
    }

    fn contains_type(&self, type_id: TypeId) -> bool {
        self.global.iter().any(|entry| entry.type_id == type_id)
    }

    /// Look up an alias. Only aliases are searched, never the global list.
    pub fn resolve_alias(&self, name: &str) -> Option<BoxedMiddleware> {
        self.aliases.get(name).cloned()
    }

    /// Resolve a route middleware reference such as `auth` or
    /// `authorize:votes.read,votes.write`
    ///
    /// Parameters after the colon are handed to the middleware through
    /// [`MiddlewareParameters`] on the request. Every resolved alias sets
    /// its own list, empty when none were given.
    pub fn route_middleware(&self, reference: &str) -> Result<BoxedMiddleware, FrameworkError> {
        let (name, params) = match reference.split_once(':') {
            Some((name, params)) => (name.trim(), parse_parameters(params)),
            None => (reference.trim(), Vec::new()),
        };

        let middleware = self
            .resolve_alias(name)
            .ok_or_else(|| FrameworkError::middleware_not_found(name))?;

        Ok(Arc::new(Parameterized {
            inner: middleware,
            params: MiddlewareParameters(params),
        }))
    }

    /// Get the list of global middleware, in execution order
    pub fn global_middleware(&self) -> Vec<BoxedMiddleware> {
        self.global.iter().map(|entry| entry.middleware.clone()).collect()
    }

    /// Names of the global middleware, in execution order
    pub fn global_names(&self) -> Vec<&'static str> {
        self.global.iter().map(|entry| entry.middleware.name()).collect()
    }

    /// Registered aliases and the middleware they point to
    pub fn aliases(&self) -> impl Iterator<Item = (&str, &'static str)> {
        self.aliases
            .iter()
            .map(|(alias, middleware)| (alias.as_str(), middleware.name()))
    }
}

fn parse_parameters(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parameters attached to a route middleware reference (`name:a,b`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MiddlewareParameters(pub Vec<String>);

impl MiddlewareParameters {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Alias bound to route-specific parameters
struct Parameterized {
    inner: BoxedMiddleware,
    params: MiddlewareParameters,
}

#[async_trait]
impl Middleware for Parameterized {
    async fn handle(&self, mut request: Request, next: Next) -> Response {
        request.extensions_mut().insert(self.params.clone());
        self.inner.handle(request, next).await
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
