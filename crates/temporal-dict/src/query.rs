//! Historical addressing: which entry to read and which key within it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Sequence, TemporalError, TemporalResult, Timestamp};
use crate::value::KeyPath;

/// One way of selecting an entry from history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum Address {
    /// Offset from the newest entry: 0 is current, -1 the one before.
    Relative(i64),
    /// Absolute sequence number.
    Index(Sequence),
    /// Latest entry whose timestamp is at or before the given time.
    AtTime(Timestamp),
    /// Entry currently carrying a label.
    Label(String),
}

impl Address {
    pub fn current() -> Self {
        Address::Relative(0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Relative(offset) => write!(f, "relative offset {offset}"),
            Address::Index(sequence) => write!(f, "index {sequence}"),
            Address::AtTime(time) => write!(f, "time {time}"),
            Address::Label(label) => write!(f, "label '{label}'"),
        }
    }
}

/// A read request: exactly one addressing mode plus an optional key path.
///
/// ```
/// use temporal_dict::Query;
///
/// let query = Query::new().relative(-1).key("user.name");
/// assert!(query.address().is_ok());
/// assert!(Query::new().address().is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    key: Option<KeyPath>,
    relative: Option<i64>,
    index: Option<Sequence>,
    at_time: Option<Timestamp>,
    label: Option<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for `Query::new().relative(0)`.
    pub fn current() -> Self {
        Self::new().relative(0)
    }

    pub fn key(mut self, key: impl Into<KeyPath>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn relative(mut self, offset: i64) -> Self {
        self.relative = Some(offset);
        self
    }

    pub fn index(mut self, sequence: Sequence) -> Self {
        self.index = Some(sequence);
        self
    }

    pub fn at_time(mut self, time: impl Into<Timestamp>) -> Self {
        self.at_time = Some(time.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn key_path(&self) -> Option<&KeyPath> {
        self.key.as_ref()
    }

    /// The single addressing mode of this query.
    pub fn address(&self) -> TemporalResult<Address> {
        let mut modes = Vec::with_capacity(1);
        if let Some(offset) = self.relative {
            modes.push(Address::Relative(offset));
        }
        if let Some(sequence) = self.index {
            modes.push(Address::Index(sequence));
        }
        if let Some(time) = self.at_time {
            modes.push(Address::AtTime(time));
        }
        if let Some(label) = &self.label {
            modes.push(Address::Label(label.clone()));
        }

        match modes.len() {
            1 => Ok(modes.remove(0)),
            supplied => Err(TemporalError::AmbiguousAddress { supplied }),
        }
    }
}

impl From<Address> for Query {
    fn from(address: Address) -> Self {
        let query = Query::new();
        match address {
            Address::Relative(offset) => query.relative(offset),
            Address::Index(sequence) => query.index(sequence),
            Address::AtTime(time) => query.at_time(time),
            Address::Label(label) => query.label(label),
        }
    }
}
