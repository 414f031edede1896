//! Change detection between two recorded states.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::value::{KeyPath, Map, Value};

/// Old and new value at one key path. `None` means the key was absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    pub old: Option<Value>,
    pub new: Option<Value>,
}

/// Every key path whose value differs between two states.
pub type StateDiff = BTreeMap<KeyPath, Change>;

/// Compute the differences between two payloads, recursing into maps present
/// on both sides.
pub fn compute_diff(before: &Map, after: &Map) -> StateDiff {
    let mut changes = StateDiff::new();
    diff_into(&KeyPath::root(), before, after, &mut changes);
    changes
}

fn diff_into(prefix: &KeyPath, before: &Map, after: &Map, out: &mut StateDiff) {
    for (key, old) in before {
        let path = prefix.child(key);
        match (old, after.get(key)) {
            (Value::Map(old_map), Some(Value::Map(new_map))) => {
                diff_into(&path, old_map, new_map, out);
            }
            (_, Some(new)) if new == old => {}
            (_, new) => {
                out.insert(
                    path,
                    Change {
                        old: Some(old.clone()),
                        new: new.cloned(),
                    },
                );
            }
        }
    }

    for (key, new) in after {
        if !before.contains_key(key) {
            out.insert(
                prefix.child(key),
                Change {
                    old: None,
                    new: Some(new.clone()),
                },
            );
        }
    }
}
