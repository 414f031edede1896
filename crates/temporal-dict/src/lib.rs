//! Temporal dictionary: a key-value container that records every state it has
//! been in and reads any of them back by offset, sequence, time, or label.

pub mod cursor;
pub mod diff;
pub mod mapping;
pub mod merge;
pub mod query;
pub mod store;
pub mod types;
pub mod value;

pub use cursor::Cursor;
pub use diff::{compute_diff, Change, StateDiff};
pub use mapping::Mapping;
pub use merge::{merge_fn, MergeFn};
pub use query::{Address, Query};
pub use store::{Clock, HistoryIter, StoreBuilder, StoreConfig, TemporalStore};
pub use types::*;
pub use value::{KeyPath, Map, Value};
