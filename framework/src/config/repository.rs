use super::{loader, merge::merge};
use crate::error::FrameworkError;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::Path;

/// Repository of configuration namespaces
///
/// Each namespace (`auth`, `logging`, ...) holds a JSON object. Values are
/// addressed with dot paths: `auth.jwt.secret`.
#[derive(Debug, Clone, Default)]
pub struct ConfigRepository {
    items: Map<String, Value>,
}

impl ConfigRepository {
    /// Create a new empty config repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `<namespace>.json` in `dir` as that namespace's value
    ///
    /// These are application overrides: they are loaded before providers
    /// merge their defaults underneath. A missing directory loads nothing.
    pub fn load_directory(&mut self, dir: &Path) -> Result<usize, FrameworkError> {
        if !dir.is_dir() {
            tracing::debug!(dir = %dir.display(), "no config directory, skipping overrides");
            return Ok(0);
        }

        let entries = std::fs::read_dir(dir).map_err(|e| FrameworkError::config_load(dir, e.to_string()))?;
        let mut paths: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        paths.sort();

        for path in &paths {
            let Some(namespace) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let value = loader::load_file(path)?;
            let effective = match self.items.get(namespace) {
                Some(existing) => merge(existing, &value),
                None => value,
            };
            self.items.insert(namespace.to_string(), effective);
            tracing::debug!(namespace, path = %path.display(), "loaded config overrides");
        }
        Ok(paths.len())
    }

    /// Merge a bundle file under `namespace`; keys already present win
    pub fn merge_from(&mut self, path: &Path, namespace: &str) -> Result<(), FrameworkError> {
        let defaults = loader::load_file(path)?;
        self.merge_defaults(namespace, &defaults);
        Ok(())
    }

    /// Merge embedded bundle contents under `namespace`; keys already present win
    pub fn merge_str(&mut self, origin: &str, contents: &str, namespace: &str) -> Result<(), FrameworkError> {
        let defaults = loader::parse(origin, contents)?;
        self.merge_defaults(namespace, &defaults);
        Ok(())
    }

    /// Merge an in-memory default value under `namespace`
    pub fn merge_defaults(&mut self, namespace: &str, defaults: &Value) {
        let effective = match self.items.get(namespace) {
            Some(existing) => merge(defaults, existing),
            None => defaults.clone(),
        };
        self.items.insert(namespace.to_string(), effective);
        tracing::debug!(namespace, "merged config defaults");
    }

    /// Get a value by dot path
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let mut current = self.items.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Get a value by dot path, deserialized
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, FrameworkError> {
        self.get(key)
            .map(|value| {
                T::deserialize(value).map_err(|e| FrameworkError::config_parse(key, e.to_string()))
            })
            .transpose()
    }

    /// Check if a dot path is present
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Set a value by dot path, creating intermediate objects
    pub fn set(&mut self, key: &str, value: Value) {
        let mut parts: Vec<&str> = key.split('.').collect();
        let Some(last) = parts.pop() else {
            return;
        };

        let mut current = &mut self.items;
        for part in parts {
            let slot = current
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            let Value::Object(map) = slot else {
                return;
            };
            current = map;
        }
        current.insert(last.to_string(), value);
    }

    /// The raw value of a namespace
    pub fn namespace(&self, name: &str) -> Option<&Value> {
        self.items.get(name)
    }

    /// Names of all loaded namespaces
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    /// Deserialize a whole namespace into a typed section
    ///
    /// A missing namespace deserializes from an empty object, so sections
    /// with `#[serde(default)]` still produce their defaults.
    pub fn section<T: DeserializeOwned>(&self, namespace: &str) -> Result<T, FrameworkError> {
        let empty = Value::Object(Map::new());
        let value = self.items.get(namespace).unwrap_or(&empty);
        T::deserialize(value).map_err(|e| FrameworkError::config_parse(namespace, e.to_string()))
    }

    /// Every namespace as one JSON object
    pub fn all(&self) -> &Map<String, Value> {
        &self.items
    }
}
