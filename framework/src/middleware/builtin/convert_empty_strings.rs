use super::rewrite_json_body;
use crate::http::{Request, Response};
use crate::middleware::{Middleware, Next};
use async_trait::async_trait;
use serde_json::Value;

/// Turns every `""` in a JSON body into `null`
pub struct ConvertEmptyStringsToNull;

fn convert(value: &mut Value) {
    if value.as_str() == Some("") {
        *value = Value::Null;
        return;
    }
    match value {
        Value::Array(items) => items.iter_mut().for_each(convert),
        Value::Object(map) => map.values_mut().for_each(convert),
        _ => {}
    }
}

#[async_trait]
impl Middleware for ConvertEmptyStringsToNull {
    async fn handle(&self, mut request: Request, next: Next) -> Response {
        rewrite_json_body(&mut request, convert);
        next.run(request).await
    }

    fn name(&self) -> &'static str {
        "ConvertEmptyStringsToNull"
    }
}
