//! Reading config bundles from disk or embedded strings
//!
//! Bundles are JSON objects. String values may reference the environment:
//! `"${APP_KEY}"` or `"${APP_KEY:-fallback}"`. Resolved values stay strings,
//! except for a whole-string reference whose default is itself a JSON scalar
//! (`"${APP_MAINTENANCE:-false}"`, `"${PORT:-8080}"`): that one is read as a
//! scalar when the resolved value parses as one.

use crate::config::env::env_optional;
use crate::error::FrameworkError;
use serde_json::Value;
use std::path::Path;

/// Load a bundle file
pub fn load_file(path: &Path) -> Result<Value, FrameworkError> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| FrameworkError::config_load(path, e.to_string()))?;
    parse(&path.display().to_string(), &contents)
}

/// Parse bundle contents; `origin` only appears in error messages
pub fn parse(origin: &str, contents: &str) -> Result<Value, FrameworkError> {
    let value: Value = serde_json::from_str(contents)
        .map_err(|e| FrameworkError::config_parse(origin, e.to_string()))?;
    if !value.is_object() {
        return Err(FrameworkError::config_parse(
            origin,
            "bundle root must be a JSON object",
        ));
    }
    Ok(interpolate(value))
}

fn interpolate(value: Value) -> Value {
    match value {
        Value::String(s) => expand(&s),
        Value::Array(items) => Value::Array(items.into_iter().map(interpolate).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, interpolate(v))).collect()),
        other => other,
    }
}

/// Expand `${VAR}` / `${VAR:-default}` references in a string
fn expand(raw: &str) -> Value {
    if let Some(inner) = whole_reference(raw) {
        let resolved = lookup(inner);
        let typed = inner
            .split_once(":-")
            .is_some_and(|(_, default)| scalar(default).is_some());
        return match scalar(&resolved) {
            Some(value) if typed => value,
            _ => Value::String(resolved),
        };
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        out.push_str(&lookup(&rest[start + 2..start + len]));
        rest = &rest[start + len + 1..];
    }
    out.push_str(rest);
    Value::String(out)
}

fn scalar(raw: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(value @ (Value::Bool(_) | Value::Number(_) | Value::Null)) => Some(value),
        _ => None,
    }
}

fn whole_reference(raw: &str) -> Option<&str> {
    let inner = raw.strip_prefix("${")?.strip_suffix('}')?;
    (!inner.contains('}')).then_some(inner)
}

fn lookup(reference: &str) -> String {
    let (name, default) = match reference.split_once(":-") {
        Some((name, default)) => (name, default),
        None => (reference, ""),
    };
    env_optional::<String>(name.trim()).unwrap_or_else(|| default.to_string())
}
