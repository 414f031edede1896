//! Adapters from dictionary-like containers into payload maps.
//!
//! The store accepts anything that is readable by key, has iterable keys, and
//! can nest. Each supported container type converts into the canonical
//! [`Map`] at the boundary so every entry in a history has the same shape.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use crate::types::{TemporalError, TemporalResult};
use crate::value::{Map, Value};

/// A container that can be recorded as a state or a set of changes.
pub trait Mapping {
    /// Convert into a payload map, or fail if the container is not a mapping.
    fn into_payload(self) -> TemporalResult<Map>;
}

impl<K, V> Mapping for BTreeMap<K, V>
where
    K: Into<String>,
    V: Into<Value>,
{
    fn into_payload(self) -> TemporalResult<Map> {
        Ok(self.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K, V, S> Mapping for HashMap<K, V, S>
where
    K: Into<String>,
    V: Into<Value>,
    S: BuildHasher,
{
    fn into_payload(self) -> TemporalResult<Map> {
        Ok(self.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K, V> Mapping for Vec<(K, V)>
where
    K: Into<String>,
    V: Into<Value>,
{
    fn into_payload(self) -> TemporalResult<Map> {
        Ok(self.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl Mapping for serde_json::Map<String, serde_json::Value> {
    fn into_payload(self) -> TemporalResult<Map> {
        Ok(self.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
    }
}

impl Mapping for serde_json::Value {
    fn into_payload(self) -> TemporalResult<Map> {
        match self {
            serde_json::Value::Object(obj) => obj.into_payload(),
            other => Err(TemporalError::NotAMapping(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

impl Mapping for Value {
    fn into_payload(self) -> TemporalResult<Map> {
        match self {
            Value::Map(map) => Ok(map),
            other => Err(TemporalError::NotAMapping(format!(
                "expected a map value, got {other}"
            ))),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_object_is_a_mapping() {
        let map = json!({"user": {"name": "a"}, "x": 1}).into_payload().unwrap();
        assert_eq!(map["x"], Value::Int(1));
        assert!(map["user"].as_map().is_some());
    }

    #[test]
    fn test_json_scalar_is_rejected() {
        let err = json!([1, 2]).into_payload().unwrap_err();
        assert_eq!(
            err,
            TemporalError::NotAMapping("expected a JSON object, got an array".to_string())
        );
        assert!(Value::Int(3).into_payload().is_err());
    }

    #[test]
    fn test_native_maps_convert() {
        let mut hashed: HashMap<&str, i64> = HashMap::new();
        hashed.insert("a", 1);
        hashed.insert("b", 2);
        let map = hashed.into_payload().unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);

        let ordered: BTreeMap<String, &str> = [("k".to_string(), "v")].into_iter().collect();
        assert_eq!(ordered.into_payload().unwrap()["k"], Value::from("v"));

        let pairs = vec![("x", Value::Bool(true))];
        assert_eq!(pairs.into_payload().unwrap()["x"], Value::Bool(true));
    }
}
