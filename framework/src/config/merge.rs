//! Pure configuration merge

use serde_json::Value;

/// Merge `overrides` on top of `defaults`, returning the effective value
///
/// Objects merge key by key, recursively; any other value in `overrides`
/// (including arrays and `null`) replaces the default wholesale. Neither
/// input is modified.
pub fn merge(defaults: &Value, overrides: &Value) -> Value {
    match (defaults, overrides) {
        (Value::Object(base), Value::Object(top)) => {
            let mut merged = base.clone();
            for (key, value) in top {
                let effective = match base.get(key) {
                    Some(existing) => merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), effective);
            }
            Value::Object(merged)
        }
        (_, top) => top.clone(),
    }
}
