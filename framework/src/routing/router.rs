use crate::error::FrameworkError;
use crate::http::{Request, Response};
use crate::middleware::{BoxedHandler, BoxedMiddleware, MiddlewareRegistry};
use http::Method;
use matchit::Router as MatchitRouter;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// A registered route, before its middleware aliases are resolved
pub struct RouteDef {
    pub method: Method,
    pub path: String,
    pub name: Option<String>,
    /// Alias references such as `auth` or `authorize:votes.close`
    pub middleware: Vec<String>,
    handler: Arc<BoxedHandler>,
}

/// HTTP Router with Laravel-like route registration
///
/// Routes name their middleware by alias; the aliases are resolved against
/// the [`MiddlewareRegistry`] once every provider has booted.
///
/// ```rust,ignore
/// Router::new()
///     .get("/ballots/{id}", ballots::show).name("ballots.show")
///     .post("/ballots/{id}/close", ballots::close)
///         .middleware("auth")
///         .middleware("authorize:votes.close")
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<RouteDef>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    fn add<H, Fut>(mut self, method: Method, path: &str, handler: H) -> RouteBuilder
    where
        H: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.routes.push(RouteDef {
            method,
            path: path.to_string(),
            name: None,
            middleware: Vec::new(),
            handler: crate::middleware::handler(handler),
        });
        RouteBuilder { router: self }
    }

    /// Register a GET route
    pub fn get<H, Fut>(self, path: &str, handler: H) -> RouteBuilder
    where
        H: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.add(Method::GET, path, handler)
    }

    /// Register a POST route
    pub fn post<H, Fut>(self, path: &str, handler: H) -> RouteBuilder
    where
        H: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.add(Method::POST, path, handler)
    }

    /// Register a PUT route
    pub fn put<H, Fut>(self, path: &str, handler: H) -> RouteBuilder
    where
        H: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.add(Method::PUT, path, handler)
    }

    /// Register a PATCH route
    pub fn patch<H, Fut>(self, path: &str, handler: H) -> RouteBuilder
    where
        H: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.add(Method::PATCH, path, handler)
    }

    /// Register a DELETE route
    pub fn delete<H, Fut>(self, path: &str, handler: H) -> RouteBuilder
    where
        H: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.add(Method::DELETE, path, handler)
    }

    /// Registered routes, in registration order
    pub fn routes(&self) -> &[RouteDef] {
        &self.routes
    }

    /// Generate a URL for a named route
    ///
    /// ```rust,ignore
    /// assert_eq!(router.url("ballots.show", &[("id", "7")]), Some("/ballots/7".into()));
    /// ```
    pub fn url(&self, name: &str, params: &[(&str, &str)]) -> Option<String> {
        let route = self.routes.iter().find(|r| r.name.as_deref() == Some(name))?;
        let mut url = route.path.clone();
        for (key, value) in params {
            url = url.replace(&format!("{{{}}}", key), value);
        }
        Some(url)
    }

    /// Resolve every alias reference and build the matchers
    ///
    /// Fails on the first unknown alias or conflicting path.
    pub fn compile(self, registry: &MiddlewareRegistry) -> Result<CompiledRouter, FrameworkError> {
        let mut methods: HashMap<Method, MatchitRouter<Arc<CompiledRoute>>> = HashMap::new();

        for route in self.routes {
            let middleware = route
                .middleware
                .iter()
                .map(|reference| registry.route_middleware(reference))
                .collect::<Result<Vec<_>, _>>()?;

            let compiled = Arc::new(CompiledRoute {
                path: route.path.clone(),
                handler: route.handler,
                middleware,
            });
            methods
                .entry(route.method.clone())
                .or_default()
                .insert(route.path.as_str(), compiled)
                .map_err(|e| {
                    FrameworkError::internal(format!("invalid route {} {}: {}", route.method, route.path, e))
                })?;
        }

        Ok(CompiledRouter { methods })
    }
}

/// Builder returned after registering a route, enabling `.name()` and
/// `.middleware()` chaining
pub struct RouteBuilder {
    pub(crate) router: Router,
}

impl RouteBuilder {
    fn last(&mut self) -> Option<&mut RouteDef> {
        self.router.routes.last_mut()
    }

    /// Name the most recently registered route
    pub fn name(mut self, name: &str) -> RouteBuilder {
        if let Some(route) = self.last() {
            route.name = Some(name.to_string());
        }
        self
    }

    /// Apply an aliased middleware to the most recently registered route
    ///
    /// Parameters follow a colon: `.middleware("authorize:votes.read,votes.write")`.
    pub fn middleware(mut self, alias: &str) -> RouteBuilder {
        if let Some(route) = self.last() {
            route.middleware.push(alias.to_string());
        }
        self
    }

    /// Register a GET route (for chaining)
    pub fn get<H, Fut>(self, path: &str, handler: H) -> RouteBuilder
    where
        H: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.router.get(path, handler)
    }

    /// Register a POST route (for chaining)
    pub fn post<H, Fut>(self, path: &str, handler: H) -> RouteBuilder
    where
        H: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.router.post(path, handler)
    }

    /// Register a PUT route (for chaining)
    pub fn put<H, Fut>(self, path: &str, handler: H) -> RouteBuilder
    where
        H: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.router.put(path, handler)
    }

    /// Register a PATCH route (for chaining)
    pub fn patch<H, Fut>(self, path: &str, handler: H) -> RouteBuilder
    where
        H: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.router.patch(path, handler)
    }

    /// Register a DELETE route (for chaining)
    pub fn delete<H, Fut>(self, path: &str, handler: H) -> RouteBuilder
    where
        H: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.router.delete(path, handler)
    }
}

impl From<RouteBuilder> for Router {
    fn from(builder: RouteBuilder) -> Self {
        builder.router
    }
}

/// A route with its middleware resolved
pub struct CompiledRoute {
    pub path: String,
    pub handler: Arc<BoxedHandler>,
    pub middleware: Vec<BoxedMiddleware>,
}

/// Route matchers, one per method
pub struct CompiledRouter {
    methods: HashMap<Method, MatchitRouter<Arc<CompiledRoute>>>,
}

/// Outcome of matching a request against the routes
pub enum RouteMatch {
    Found(Arc<CompiledRoute>, HashMap<String, String>),
    /// The path exists under other methods
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

impl CompiledRouter {
    /// Match a request and return the route with extracted params
    pub fn match_route(&self, method: &Method, path: &str) -> RouteMatch {
        if let Some(matched) = self.methods.get(method).and_then(|r| r.at(path).ok()) {
            let params = matched
                .params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            return RouteMatch::Found(matched.value.clone(), params);
        }

        let mut allowed: Vec<Method> = self
            .methods
            .iter()
            .filter(|(_, router)| router.at(path).is_ok())
            .map(|(method, _)| method.clone())
            .collect();
        if allowed.is_empty() {
            return RouteMatch::NotFound;
        }
        allowed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        RouteMatch::MethodNotAllowed(allowed)
    }
}
