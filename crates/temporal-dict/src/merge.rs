//! Merge strategies combining the current state with incoming changes.

use std::sync::Arc;

use crate::value::{Map, Value};

/// A pure function `(current, changes) -> new state`.
pub type MergeFn = Arc<dyn Fn(&Map, &Map) -> Map + Send + Sync>;

/// Wrap a closure as a [`MergeFn`].
pub fn merge_fn<F>(f: F) -> MergeFn
where
    F: Fn(&Map, &Map) -> Map + Send + Sync + 'static,
{
    Arc::new(f)
}

/// New values overwrite old ones per key; maps on both sides merge recursively.
pub fn recursive_overwrite(current: &Map, changes: &Map) -> Map {
    let mut merged = current.clone();
    for (key, incoming) in changes {
        let value = match (merged.get(key), incoming) {
            (Some(Value::Map(old)), Value::Map(new)) => Value::Map(recursive_overwrite(old, new)),
            _ => incoming.clone(),
        };
        merged.insert(key.clone(), value);
    }
    merged
}

/// Like [`recursive_overwrite`], but a `Null` in `changes` removes the key.
pub fn recursive_prune(current: &Map, changes: &Map) -> Map {
    let mut merged = current.clone();
    for (key, incoming) in changes {
        match (merged.get(key), incoming) {
            (_, Value::Null) => {
                merged.remove(key);
            }
            (Some(Value::Map(old)), Value::Map(new)) => {
                let value = Value::Map(recursive_prune(old, new));
                merged.insert(key.clone(), value);
            }
            _ => {
                merged.insert(key.clone(), prune_nulls(incoming));
            }
        }
    }
    merged
}

fn prune_nulls(value: &Value) -> Value {
    match value {
        Value::Map(map) => Value::Map(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), prune_nulls(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// New values overwrite old ones per top-level key, nested maps included.
pub fn shallow_overwrite(current: &Map, changes: &Map) -> Map {
    let mut merged = current.clone();
    merged.extend(changes.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// The changes become the whole new state.
pub fn replace(_current: &Map, changes: &Map) -> Map {
    changes.clone()
}

/// The merge function used when none is configured.
pub fn default_merge() -> MergeFn {
    merge_fn(recursive_overwrite)
}
