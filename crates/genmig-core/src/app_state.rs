//! # App-State Mapping
//!
//! `AppStateMap` holds each module's still-serialized state keyed by module
//! name. Migration transforms re-parse the modules they understand through
//! [`AppStateMap::module()`] and write them back with
//! [`AppStateMap::set_module()`]; every other module is carried through
//! untouched.
//!
//! Storage is a `BTreeMap`, so iteration order is the sorted module order
//! regardless of how the exporter laid the object out.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GenesisError;

/// Module name → raw module state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppStateMap(BTreeMap<String, Value>);

impl AppStateMap {
    /// An empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a JSON object into per-module entries.
    ///
    /// # Errors
    ///
    /// Returns [`GenesisError::MalformedDocument`] if `value` is not an object.
    pub fn from_json(value: Value) -> Result<Self, GenesisError> {
        match value {
            Value::Object(map) => Ok(Self(map.into_iter().collect())),
            other => Err(GenesisError::malformed_at(
                "app_state",
                format!("expected a JSON object, found {}", json_kind(&other)),
            )),
        }
    }

    /// Reassemble the mapping into a single JSON object.
    pub fn into_json(self) -> Value {
        Value::Object(self.0.into_iter().collect())
    }

    /// Raw state of a module.
    pub fn get(&self, module: &str) -> Option<&Value> {
        self.0.get(module)
    }

    /// Mutable raw state of a module.
    pub fn get_mut(&mut self, module: &str) -> Option<&mut Value> {
        self.0.get_mut(module)
    }

    /// Whether the module is present.
    pub fn contains(&self, module: &str) -> bool {
        self.0.contains_key(module)
    }

    /// Insert or replace a module's raw state, returning the previous state.
    pub fn insert(&mut self, module: impl Into<String>, state: Value) -> Option<Value> {
        self.0.insert(module.into(), state)
    }

    /// Remove a module, returning its raw state.
    pub fn remove(&mut self, module: &str) -> Option<Value> {
        self.0.remove(module)
    }

    /// Decode a module's state into a typed view.
    ///
    /// Returns `Ok(None)` when the module is absent.
    ///
    /// # Errors
    ///
    /// Returns [`GenesisError::MalformedDocument`] if the state does not match `T`.
    pub fn module<T: DeserializeOwned>(&self, module: &str) -> Result<Option<T>, GenesisError> {
        self.0
            .get(module)
            .map(|raw| {
                serde_json::from_value(raw.clone())
                    .map_err(|e| GenesisError::malformed_at(&format!("app_state.{module}"), e))
            })
            .transpose()
    }

    /// Encode a typed module state and store it under `module`.
    ///
    /// # Errors
    ///
    /// Returns [`GenesisError::Serialization`] if `state` cannot be encoded.
    pub fn set_module<T: Serialize>(&mut self, module: &str, state: &T) -> Result<(), GenesisError> {
        let raw = serde_json::to_value(state).map_err(crate::CanonicalizationError::from)?;
        self.0.insert(module.to_string(), raw);
        Ok(())
    }

    /// Module names in sorted order.
    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterate `(module, state)` pairs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of modules.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no modules.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for AppStateMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Short JSON type name for diagnostics.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_object() {
        let map = AppStateMap::from_json(json!({"bank": {"balances": []}, "auth": {}})).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.module_names().collect::<Vec<_>>(), vec!["auth", "bank"]);
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        let err = AppStateMap::from_json(json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("found array"));
    }

    #[test]
    fn test_round_trip_preserves_modules() {
        let raw = json!({"foo": {"x": 1}, "bar": null});
        let map = AppStateMap::from_json(raw.clone()).unwrap();
        assert_eq!(map.into_json(), raw);
    }

    #[test]
    fn test_typed_module_access() {
        #[derive(Deserialize, Serialize)]
        struct Auth {
            accounts: Vec<String>,
        }

        let mut map = AppStateMap::from_json(json!({"auth": {"accounts": ["a"]}})).unwrap();
        let mut auth: Auth = map.module("auth").unwrap().unwrap();
        auth.accounts.push("b".into());
        map.set_module("auth", &auth).unwrap();
        assert_eq!(map.get("auth"), Some(&json!({"accounts": ["a", "b"]})));

        assert!(map.module::<Auth>("missing").unwrap().is_none());
    }

    #[test]
    fn test_typed_module_mismatch_is_malformed() {
        #[derive(Deserialize, Debug)]
        #[allow(dead_code)]
        struct Auth {
            accounts: Vec<String>,
        }

        let map = AppStateMap::from_json(json!({"auth": {"accounts": 7}})).unwrap();
        let err = map.module::<Auth>("auth").unwrap_err();
        assert!(err.to_string().contains("app_state.auth"));
    }

    #[test]
    fn test_insert_remove() {
        let mut map = AppStateMap::new();
        assert!(map.insert("gov", json!({})).is_none());
        assert!(map.contains("gov"));
        assert_eq!(map.remove("gov"), Some(json!({})));
        assert!(map.is_empty());
    }
}
