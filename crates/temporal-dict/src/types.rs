//! Core data types for recorded states and their errors.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::query::Address;
use crate::value::{KeyPath, Map, Value};

/// Position of an entry in a store's history.
pub type Sequence = u64;

/// Externally supplied ordering key for an entry.
///
/// The store only compares timestamps; it never interprets them. The default
/// clock produces Unix milliseconds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Wall-clock time in Unix milliseconds.
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn value(self) -> i64 {
        self.0
    }
}

impl From<i64> for Timestamp {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<i32> for Timestamp {
    fn from(value: i32) -> Self {
        Self(value as i64)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One recorded state of the dictionary.
///
/// Entries are immutable once appended. The payload is the full state after
/// merging, shared between the history and any reader holding the entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    sequence: Sequence,
    timestamp: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    nested: bool,
    payload: Arc<Map>,
}

impl Entry {
    pub(crate) fn new(
        sequence: Sequence,
        timestamp: Timestamp,
        label: Option<String>,
        payload: Map,
    ) -> Self {
        let nested = payload.values().any(|v| matches!(v, Value::Map(_)));
        Self {
            sequence,
            timestamp,
            label,
            nested,
            payload: Arc::new(payload),
        }
    }

    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Whether the payload holds at least one sub-mapping.
    pub fn is_nested(&self) -> bool {
        self.nested
    }

    pub fn payload(&self) -> &Map {
        &self.payload
    }

    /// Shared handle to the payload, without copying it.
    pub fn shared_payload(&self) -> Arc<Map> {
        Arc::clone(&self.payload)
    }
}

/// Errors that can occur while recording or reading history.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TemporalError {
    #[error("History is empty")]
    EmptyHistory,

    #[error("History underflow: {address} resolves before the oldest retained entry ({oldest})")]
    HistoryUnderflow { address: Address, oldest: Sequence },

    #[error("History overflow: offset {offset} points past the most recent entry")]
    HistoryOverflow { offset: i64 },

    #[error("Entry not found: {sequence} ({})", missing_reason(.evicted))]
    EntryNotFound { sequence: Sequence, evicted: bool },

    #[error("Label not found: {0}")]
    LabelNotFound(String),

    #[error("Key not found: {path} (missing at '{missing}')")]
    KeyNotFound { path: KeyPath, missing: KeyPath },

    #[error("Ambiguous address: expected exactly one addressing mode, got {supplied}")]
    AmbiguousAddress { supplied: usize },

    #[error("Out of order timestamp: {supplied} is earlier than previous entry at {previous}")]
    OutOfOrderTimestamp {
        previous: Timestamp,
        supplied: Timestamp,
    },

    #[error("Sequence exhausted: no sequence number left after {last}")]
    SequenceExhausted { last: Sequence },

    #[error("Concurrent modification: another record is in flight")]
    ConcurrentModification,

    #[error("Not a mapping: {0}")]
    NotAMapping(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

fn missing_reason(evicted: &bool) -> &'static str {
    if *evicted {
        "evicted"
    } else {
        "never recorded"
    }
}

/// Convenience result type.
pub type TemporalResult<T> = Result<T, TemporalError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_map() -> Map {
        let mut inner = Map::new();
        inner.insert("name".to_string(), Value::from("a"));
        let mut map = Map::new();
        map.insert("user".to_string(), Value::Map(inner));
        map.insert("x".to_string(), Value::Int(1));
        map
    }

    #[test]
    fn test_entry_detects_nested_payload() {
        let entry = Entry::new(0, Timestamp(5), None, sample_map());
        assert!(entry.is_nested());

        let mut flat = Map::new();
        flat.insert("x".to_string(), Value::Int(1));
        let entry = Entry::new(1, Timestamp(6), None, flat);
        assert!(!entry.is_nested());
    }

    #[test]
    fn test_shared_payload_is_not_copied() {
        let entry = Entry::new(0, Timestamp(5), Some("first".into()), sample_map());
        let a = entry.shared_payload();
        let b = entry.shared_payload();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(entry.label(), Some("first"));
    }

    #[test]
    fn test_entry_serializes_to_json() {
        let entry = Entry::new(3, Timestamp(10), None, sample_map());
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["sequence"], 3);
        assert_eq!(json["timestamp"], 10);
        assert_eq!(json["payload"]["user"]["name"], "a");
        assert!(json.get("label").is_none());
    }

    #[test]
    fn test_error_messages_name_the_problem() {
        let err = TemporalError::EntryNotFound {
            sequence: 4,
            evicted: true,
        };
        assert_eq!(err.to_string(), "Entry not found: 4 (evicted)");

        let err = TemporalError::KeyNotFound {
            path: KeyPath::parse("user.address.city"),
            missing: KeyPath::parse("user.address"),
        };
        assert_eq!(
            err.to_string(),
            "Key not found: user.address.city (missing at 'user.address')"
        );

        let err = TemporalError::SequenceExhausted { last: 7 };
        assert_eq!(
            err.to_string(),
            "Sequence exhausted: no sequence number left after 7"
        );
    }
}
