//! HTTP kernel: the global pipeline wrapped around route dispatch
//!
//! Every request runs through the global middleware first, then the matched
//! route's aliased middleware, then its handler. Unmatched requests still go
//! through the global pipeline and end in a JSON 404 (or 405).

use crate::context::ApplicationContext;
use crate::error::FrameworkError;
use crate::http::{HttpResponse, Request, Response, ResponseExt};
use crate::middleware::{handler, BoxedHandler, MiddlewareChain};
use crate::routing::{CompiledRouter, RouteMatch, Router};
use std::sync::Arc;
use std::time::Instant;

pub struct HttpKernel {
    global: MiddlewareChain,
    dispatch: Arc<BoxedHandler>,
}

impl HttpKernel {
    /// Resolve the router's alias references against the booted context
    pub fn new(ctx: &ApplicationContext, router: Router) -> Result<Self, FrameworkError> {
        let routes = Arc::new(router.compile(ctx.middleware())?);

        let mut global = MiddlewareChain::new();
        global.extend(ctx.middleware().global_middleware());

        Ok(Self {
            global,
            dispatch: handler(move |request| dispatch(routes.clone(), request)),
        })
    }

    /// Run a request through the whole pipeline
    ///
    /// The pipeline runs on its own task; a panic anywhere inside it becomes
    /// a generic 500 instead of tearing down the connection.
    pub async fn handle(&self, request: Request) -> HttpResponse {
        let started = Instant::now();
        let method = request.method().clone();
        let path = request.path().to_string();

        let global = self.global.clone();
        let dispatch = self.dispatch.clone();
        let outcome = tokio::spawn(async move { global.execute(request, dispatch).await }).await;

        let response = match outcome {
            Ok(response) => response.into_response(),
            Err(e) => {
                tracing::error!(%method, %path, error = %e, "request pipeline panicked");
                HttpResponse::json(serde_json::json!({
                    "error": "server_error",
                    "message": "Server Error",
                }))
                .status(500)
            }
        };

        let status = response.status_code();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if status >= 500 {
            tracing::warn!(%method, %path, status, elapsed_ms, "request failed");
        } else {
            tracing::info!(%method, %path, status, elapsed_ms, "request handled");
        }
        response
    }
}

async fn dispatch(routes: Arc<CompiledRouter>, request: Request) -> Response {
    match routes.match_route(request.method(), request.path()) {
        RouteMatch::Found(route, params) => {
            let mut chain = MiddlewareChain::new();
            chain.extend(route.middleware.iter().cloned());
            chain
                .execute(request.with_params(params), route.handler.clone())
                .await
        }
        RouteMatch::MethodNotAllowed(allowed) => {
            let allow = allowed.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
            Err(HttpResponse::from(FrameworkError::abort(
                405,
                "method_not_allowed",
                format!("Method {} is not allowed here", request.method()),
            ))
            .header("Allow", allow))
        }
        RouteMatch::NotFound => Err(FrameworkError::abort(
            404,
            "not_found",
            format!("No route for {}", request.path()),
        )
        .into()),
    }
}
