use super::rewrite_json_body;
use crate::config::TrimConfig;
use crate::http::{Request, Response};
use crate::middleware::{Middleware, Next};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;

/// Trims whitespace around every string in a JSON body
///
/// Keys listed in `api.trim.except` (passwords by default) are left alone.
pub struct TrimStrings {
    except: BTreeSet<String>,
}

impl TrimStrings {
    pub fn new(config: &TrimConfig) -> Self {
        Self {
            except: config.except.iter().cloned().collect(),
        }
    }

    fn trim(&self, value: &mut Value) {
        match value {
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.len() != s.len() {
                    *s = trimmed.to_string();
                }
            }
            Value::Array(items) => items.iter_mut().for_each(|item| self.trim(item)),
            Value::Object(map) => {
                for (key, item) in map.iter_mut() {
                    if !self.except.contains(key) {
                        self.trim(item);
                    }
                }
            }
            _ => {}
        }
    }
}

#[async_trait]
impl Middleware for TrimStrings {
    async fn handle(&self, mut request: Request, next: Next) -> Response {
        rewrite_json_body(&mut request, |body| self.trim(body));
        next.run(request).await
    }

    fn name(&self) -> &'static str {
        "TrimStrings"
    }
}
