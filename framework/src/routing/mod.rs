mod router;

pub use router::{CompiledRoute, CompiledRouter, RouteBuilder, RouteDef, RouteMatch, Router};
