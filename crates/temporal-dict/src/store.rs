//! The temporal store: append-only history of dictionary states with
//! retention, merge-on-record, and lookup by offset, sequence, time, or label.
//!
//! One writer at a time appends entries; any number of readers resolve
//! entries concurrently. Appending an entry and evicting the oldest ones
//! happen under a single write lock, so a reader never sees a half-applied
//! record.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::iter::FusedIterator;
use std::num::NonZeroUsize;
use std::ops::{Bound, RangeBounds, RangeInclusive};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::cursor::Cursor;
use crate::diff::{compute_diff, StateDiff};
use crate::mapping::Mapping;
use crate::merge::{default_merge, merge_fn, MergeFn};
use crate::query::{Address, Query};
use crate::types::{Entry, Sequence, TemporalError, TemporalResult, Timestamp};
use crate::value::{lookup, Map, Value};

/// Source of timestamps for records that do not supply one.
pub type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

/// Serializable store configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum number of retained entries. `None` keeps everything.
    pub max_history: Option<usize>,
    /// Sequence number assigned to the first entry.
    pub origin_sequence: Sequence,
}

impl StoreConfig {
    /// Check the config and return the retention cap it describes.
    fn retention(&self) -> TemporalResult<Option<NonZeroUsize>> {
        if self.origin_sequence == Sequence::MAX {
            return Err(TemporalError::InvalidConfig(
                "origin_sequence leaves no room for a first entry".into(),
            ));
        }
        match self.max_history {
            None => Ok(None),
            Some(max) => NonZeroUsize::new(max).map(Some).ok_or_else(|| {
                TemporalError::InvalidConfig("max_history must retain at least 1 entry".into())
            }),
        }
    }
}

/// Retained entries and the bookkeeping needed to address them.
struct History {
    entries: VecDeque<Arc<Entry>>,
    origin: Sequence,
    next_sequence: Sequence,
    labels: HashMap<String, Sequence>,
}

impl History {
    fn new(origin: Sequence) -> Self {
        Self {
            entries: VecDeque::new(),
            origin,
            next_sequence: origin,
            labels: HashMap::new(),
        }
    }

    fn oldest(&self) -> TemporalResult<Sequence> {
        self.entries
            .front()
            .map(|e| e.sequence())
            .ok_or(TemporalError::EmptyHistory)
    }

    fn resolve(&self, address: &Address) -> TemporalResult<&Arc<Entry>> {
        let oldest = self.oldest()?;
        let underflow = || TemporalError::HistoryUnderflow {
            address: address.clone(),
            oldest,
        };

        match address {
            Address::Relative(offset) => {
                if *offset > 0 {
                    return Err(TemporalError::HistoryOverflow { offset: *offset });
                }
                let back = usize::try_from(offset.unsigned_abs()).unwrap_or(usize::MAX);
                let len = self.entries.len();
                if back >= len {
                    return Err(underflow());
                }
                Ok(&self.entries[len - 1 - back])
            }
            Address::Index(sequence) => self.by_sequence(*sequence),
            Address::AtTime(time) => {
                let after = self.entries.partition_point(|e| e.timestamp() <= *time);
                match after {
                    0 => Err(underflow()),
                    n => Ok(&self.entries[n - 1]),
                }
            }
            Address::Label(label) => {
                let sequence = self
                    .labels
                    .get(label)
                    .ok_or_else(|| TemporalError::LabelNotFound(label.clone()))?;
                self.by_sequence(*sequence)
            }
        }
    }

    fn by_sequence(&self, sequence: Sequence) -> TemporalResult<&Arc<Entry>> {
        let oldest = self.oldest()?;
        if sequence < self.origin || sequence >= self.next_sequence {
            return Err(TemporalError::EntryNotFound {
                sequence,
                evicted: false,
            });
        }
        if sequence < oldest {
            return Err(TemporalError::EntryNotFound {
                sequence,
                evicted: true,
            });
        }
        Ok(&self.entries[(sequence - oldest) as usize])
    }

    /// Append an entry and evict from the front beyond `retention`.
    /// Returns the sequences evicted.
    ///
    /// Fails without touching history when `entry` holds the last sequence
    /// number.
    fn append(
        &mut self,
        entry: Entry,
        retention: Option<NonZeroUsize>,
    ) -> TemporalResult<Vec<Sequence>> {
        let next = entry
            .sequence()
            .checked_add(1)
            .ok_or(TemporalError::SequenceExhausted {
                last: entry.sequence().saturating_sub(1),
            })?;
        if let Some(label) = entry.label() {
            self.labels.insert(label.to_string(), entry.sequence());
        }
        self.next_sequence = next;
        self.entries.push_back(Arc::new(entry));

        let mut evicted = Vec::new();
        if let Some(max) = retention {
            while self.entries.len() > max.get() {
                let Some(old) = self.entries.pop_front() else {
                    break;
                };
                if let Some(label) = old.label() {
                    if self.labels.get(label) == Some(&old.sequence()) {
                        self.labels.remove(label);
                    }
                }
                evicted.push(old.sequence());
            }
        }
        Ok(evicted)
    }

    fn range(&self) -> Option<RangeInclusive<Sequence>> {
        let first = self.entries.front()?.sequence();
        let last = self.entries.back()?.sequence();
        Some(first..=last)
    }
}

/// State only the writer touches.
struct Writer {
    merge: MergeFn,
    clock: Clock,
}

/// A dictionary that remembers every state it has been in.
///
/// ```
/// use serde_json::json;
/// use temporal_dict::{Query, TemporalStore, Value};
///
/// let store = TemporalStore::new();
/// store.record(json!({"a": 1, "b": 2}), Some(1.into())).unwrap();
/// store.record(json!({"b": 3}), Some(2.into())).unwrap();
///
/// assert_eq!(store.get(&Query::current().key("b")).unwrap(), Value::Int(3));
/// assert_eq!(store.get(&Query::new().relative(-1).key("b")).unwrap(), Value::Int(2));
/// ```
pub struct TemporalStore {
    config: StoreConfig,
    retention: Option<NonZeroUsize>,
    history: RwLock<History>,
    writer: Mutex<Writer>,
}

impl TemporalStore {
    /// Create an empty store with default configuration.
    pub fn new() -> Self {
        Self::from_parts(StoreConfig::default(), None, default_merge(), default_clock())
    }

    /// Create an empty store from a serializable config.
    pub fn with_config(config: StoreConfig) -> TemporalResult<Self> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> StoreBuilder {
        StoreBuilder::default()
    }

    fn from_parts(
        config: StoreConfig,
        retention: Option<NonZeroUsize>,
        merge: MergeFn,
        clock: Clock,
    ) -> Self {
        let history = History::new(config.origin_sequence);
        Self {
            config,
            retention,
            history: RwLock::new(history),
            writer: Mutex::new(Writer { merge, clock }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ── recording ──

    /// Merge `changes` into the current state and append the result.
    ///
    /// Waits for any in-flight record to finish first. Without a timestamp
    /// the store's clock is used. Returns the new entry's sequence.
    pub fn record(
        &self,
        changes: impl Mapping,
        timestamp: Option<Timestamp>,
    ) -> TemporalResult<Sequence> {
        let writer = self.writer.lock();
        self.append(&writer, None, changes, timestamp)
    }

    /// Like [`record`](Self::record), also tagging the entry with `label`.
    ///
    /// The label moves to the new entry if an older one carried it.
    pub fn record_labeled(
        &self,
        label: impl Into<String>,
        changes: impl Mapping,
        timestamp: Option<Timestamp>,
    ) -> TemporalResult<Sequence> {
        let writer = self.writer.lock();
        self.append(&writer, Some(label.into()), changes, timestamp)
    }

    /// Like [`record`](Self::record), but fails with `ConcurrentModification`
    /// instead of waiting when another record is in flight.
    pub fn try_record(
        &self,
        changes: impl Mapping,
        timestamp: Option<Timestamp>,
    ) -> TemporalResult<Sequence> {
        let writer = self
            .writer
            .try_lock()
            .ok_or(TemporalError::ConcurrentModification)?;
        self.append(&writer, None, changes, timestamp)
    }

    fn append(
        &self,
        writer: &Writer,
        label: Option<String>,
        changes: impl Mapping,
        timestamp: Option<Timestamp>,
    ) -> TemporalResult<Sequence> {
        let changes = changes.into_payload()?;

        // Only the writer appends, so the state read here stays current
        // until the write lock below.
        let (current, previous) = {
            let history = self.history.read();
            match history.entries.back() {
                Some(last) => (last.shared_payload(), Some(last.timestamp())),
                None => (Arc::new(Map::new()), None),
            }
        };

        let timestamp = timestamp.unwrap_or_else(|| (writer.clock)());
        if let Some(previous) = previous {
            if timestamp < previous {
                return Err(TemporalError::OutOfOrderTimestamp {
                    previous,
                    supplied: timestamp,
                });
            }
        }

        let merged = (writer.merge)(&current, &changes);

        let mut history = self.history.write();
        let sequence = history.next_sequence;
        let evicted =
            history.append(Entry::new(sequence, timestamp, label, merged), self.retention)?;
        drop(history);

        tracing::debug!("Recorded entry {sequence} at {timestamp}");
        if !evicted.is_empty() {
            tracing::debug!("Evicted {} entries: {:?}", evicted.len(), evicted);
        }
        Ok(sequence)
    }

    /// Replace the merge function for subsequent records.
    ///
    /// Entries already recorded keep their payloads.
    pub fn set_merge_function<F>(&self, merge: F)
    where
        F: Fn(&Map, &Map) -> Map + Send + Sync + 'static,
    {
        self.writer.lock().merge = merge_fn(merge);
        tracing::info!("Merge function replaced");
    }

    // ── reading ──

    /// Read the value selected by `query`.
    ///
    /// Without a key (or with the empty key path) the whole payload is
    /// returned as an owned map.
    pub fn get(&self, query: &Query) -> TemporalResult<Value> {
        let entry = self.entry(&query.address()?)?;
        match query.key_path() {
            Some(path) if !path.is_root() => lookup(entry.payload(), path).cloned(),
            _ => Ok(Value::Map(entry.payload().clone())),
        }
    }

    /// The entry selected by `address`.
    pub fn entry(&self, address: &Address) -> TemporalResult<Arc<Entry>> {
        tracing::trace!("Resolving {address}");
        let history = self.history.read();
        history.resolve(address).cloned()
    }

    /// The newest payload, shared rather than copied.
    pub fn current(&self) -> TemporalResult<Arc<Map>> {
        self.entry(&Address::current()).map(|e| e.shared_payload())
    }

    /// Key paths whose values differ between entries `a` and `b`.
    pub fn diff(&self, a: Sequence, b: Sequence) -> TemporalResult<StateDiff> {
        self.diff_addresses(&Address::Index(a), &Address::Index(b))
    }

    /// Like [`diff`](Self::diff), with any addressing mode on either side.
    pub fn diff_addresses(&self, a: &Address, b: &Address) -> TemporalResult<StateDiff> {
        let (before, after) = {
            let history = self.history.read();
            (history.resolve(a)?.clone(), history.resolve(b)?.clone())
        };
        if Arc::ptr_eq(&before, &after) {
            return Ok(StateDiff::new());
        }
        Ok(compute_diff(before.payload(), after.payload()))
    }

    /// Retained entries with sequences in `range`, oldest first.
    ///
    /// The iterator works on a snapshot taken at call time: later records
    /// and evictions do not affect it, and it holds no lock.
    pub fn history(&self, range: impl RangeBounds<Sequence>) -> HistoryIter {
        let history = self.history.read();
        let Some(retained) = history.range() else {
            return HistoryIter::empty();
        };

        let start = match range.start_bound() {
            Bound::Included(s) => *s,
            Bound::Excluded(s) => s.saturating_add(1),
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(e) => *e,
            Bound::Excluded(0) => return HistoryIter::empty(),
            Bound::Excluded(e) => e - 1,
            Bound::Unbounded => Sequence::MAX,
        };

        let lo = start.max(*retained.start());
        let hi = end.min(*retained.end());
        if lo > hi {
            return HistoryIter::empty();
        }

        let offset = *retained.start();
        let entries = history
            .entries
            .range((lo - offset) as usize..=(hi - offset) as usize)
            .cloned()
            .collect::<Vec<_>>();
        HistoryIter {
            entries: entries.into_iter(),
        }
    }

    /// The newest `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<Arc<Entry>> {
        let history = self.history.read();
        let skip = history.entries.len().saturating_sub(n);
        history.entries.iter().skip(skip).cloned().collect()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.history.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.read().entries.is_empty()
    }

    /// Sequences of the oldest and newest retained entries.
    pub fn sequence_range(&self) -> Option<RangeInclusive<Sequence>> {
        self.history.read().range()
    }

    /// Whether a retained entry carries `label`.
    pub fn contains_label(&self, label: &str) -> bool {
        self.history.read().labels.contains_key(label)
    }

    // ── navigation ──

    /// A cursor positioned at the newest entry.
    pub fn cursor(&self) -> TemporalResult<Cursor<'_>> {
        let range = self.sequence_range().ok_or(TemporalError::EmptyHistory)?;
        Ok(Cursor::new(self, *range.end()))
    }

    /// A cursor positioned at a retained entry.
    pub fn cursor_at(&self, sequence: Sequence) -> TemporalResult<Cursor<'_>> {
        self.entry(&Address::Index(sequence))?;
        Ok(Cursor::new(self, sequence))
    }
}

impl Default for TemporalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TemporalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemporalStore")
            .field("config", &self.config)
            .field("len", &self.len())
            .field("sequence_range", &self.sequence_range())
            .finish_non_exhaustive()
    }
}

fn default_clock() -> Clock {
    Arc::new(Timestamp::now)
}

/// Builder for stores that need a custom merge function or clock.
#[derive(Default)]
pub struct StoreBuilder {
    config: StoreConfig,
    merge: Option<MergeFn>,
    clock: Option<Clock>,
}

impl StoreBuilder {
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_history(mut self, max: usize) -> Self {
        self.config.max_history = Some(max);
        self
    }

    pub fn origin_sequence(mut self, origin: Sequence) -> Self {
        self.config.origin_sequence = origin;
        self
    }

    pub fn merge_function<F>(mut self, merge: F) -> Self
    where
        F: Fn(&Map, &Map) -> Map + Send + Sync + 'static,
    {
        self.merge = Some(merge_fn(merge));
        self
    }

    pub fn clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> Timestamp + Send + Sync + 'static,
    {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn build(self) -> TemporalResult<TemporalStore> {
        let retention = self.config.retention()?;
        tracing::info!(
            "Temporal store created (max_history: {}, origin: {})",
            self.config
                .max_history
                .map(|m| m.to_string())
                .unwrap_or_else(|| "unlimited".into()),
            self.config.origin_sequence
        );
        Ok(TemporalStore::from_parts(
            self.config,
            retention,
            self.merge.unwrap_or_else(default_merge),
            self.clock.unwrap_or_else(default_clock),
        ))
    }
}

/// Entries from [`TemporalStore::history`], oldest first.
#[derive(Debug, Clone)]
pub struct HistoryIter {
    entries: std::vec::IntoIter<Arc<Entry>>,
}

impl HistoryIter {
    fn empty() -> Self {
        Self {
            entries: Vec::new().into_iter(),
        }
    }
}

impl Iterator for HistoryIter {
    type Item = Arc<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl DoubleEndedIterator for HistoryIter {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.entries.next_back()
    }
}

impl ExactSizeIterator for HistoryIter {}

impl FusedIterator for HistoryIter {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge;
    use crate::value::KeyPath;
    use serde_json::json;
    use std::sync::atomic::{AtomicI64, Ordering};

    fn ticking_store(max_history: Option<usize>) -> TemporalStore {
        let tick = Arc::new(AtomicI64::new(0));
        let mut builder = TemporalStore::builder()
            .clock(move || Timestamp(tick.fetch_add(1, Ordering::SeqCst)));
        if let Some(max) = max_history {
            builder = builder.max_history(max);
        }
        builder.build().unwrap()
    }

    fn payload(value: serde_json::Value) -> Value {
        Value::from(value)
    }

    #[test]
    fn test_empty_store_reads_fail() {
        let store = TemporalStore::new();
        assert!(store.is_empty());
        assert_eq!(
            store.get(&Query::current()).unwrap_err(),
            TemporalError::EmptyHistory
        );
        assert_eq!(
            store.get(&Query::new().at_time(5)).unwrap_err(),
            TemporalError::EmptyHistory
        );
        assert_eq!(store.cursor().unwrap_err(), TemporalError::EmptyHistory);
        assert_eq!(store.history(..).count(), 0);
        assert!(store.sequence_range().is_none());
    }

    #[test]
    fn test_record_returns_dense_sequences() {
        let store = ticking_store(None);
        assert_eq!(store.record(json!({"x": 1}), None).unwrap(), 0);
        assert_eq!(store.record(json!({"x": 2}), None).unwrap(), 1);
        assert_eq!(store.record(json!({"x": 3}), None).unwrap(), 2);
        assert_eq!(store.sequence_range(), Some(0..=2));
    }

    #[test]
    fn test_origin_sequence() {
        let store = TemporalStore::builder().origin_sequence(100).build().unwrap();
        assert_eq!(store.record(json!({"x": 1}), Some(Timestamp(1))).unwrap(), 100);
        assert_eq!(store.record(json!({"x": 2}), Some(Timestamp(2))).unwrap(), 101);
        assert_eq!(
            store.get(&Query::new().index(100).key("x")).unwrap(),
            Value::Int(1)
        );
        assert_eq!(
            store.get(&Query::new().index(5)).unwrap_err(),
            TemporalError::EntryNotFound {
                sequence: 5,
                evicted: false
            }
        );
    }

    #[test]
    fn test_origin_at_last_sequence_is_rejected() {
        let err = TemporalStore::builder()
            .origin_sequence(Sequence::MAX)
            .build()
            .unwrap_err();
        assert!(matches!(err, TemporalError::InvalidConfig(_)));
    }

    #[test]
    fn test_sequence_exhaustion_leaves_history_intact() {
        let store = TemporalStore::builder()
            .origin_sequence(Sequence::MAX - 2)
            .build()
            .unwrap();
        store.record(json!({"x": 1}), Some(Timestamp(1))).unwrap();
        store.record(json!({"x": 2}), Some(Timestamp(2))).unwrap();
        assert_eq!(
            store.record(json!({"x": 3}), Some(Timestamp(3))).unwrap_err(),
            TemporalError::SequenceExhausted {
                last: Sequence::MAX - 1
            }
        );
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&Query::current().key("x")).unwrap(), Value::Int(2));
        assert_eq!(
            store.sequence_range(),
            Some(Sequence::MAX - 2..=Sequence::MAX - 1)
        );
    }

    #[test]
    fn test_default_merge_overwrites_per_key() {
        let store = ticking_store(None);
        store.record(json!({"a": 1, "b": 2}), None).unwrap();
        store.record(json!({"b": 3}), None).unwrap();
        assert_eq!(
            store.get(&Query::current()).unwrap(),
            payload(json!({"a": 1, "b": 3}))
        );
    }

    #[test]
    fn test_relative_addressing() {
        let store = ticking_store(None);
        for x in 1..=3 {
            store.record(json!({ "x": x }), None).unwrap();
        }
        assert_eq!(store.get(&Query::new().relative(0).key("x")).unwrap(), Value::Int(3));
        assert_eq!(store.get(&Query::new().relative(-2).key("x")).unwrap(), Value::Int(1));
        assert!(matches!(
            store.get(&Query::new().relative(-3)).unwrap_err(),
            TemporalError::HistoryUnderflow { oldest: 0, .. }
        ));
        assert_eq!(
            store.get(&Query::new().relative(1)).unwrap_err(),
            TemporalError::HistoryOverflow { offset: 1 }
        );
        assert!(matches!(
            store.get(&Query::new().relative(i64::MIN)).unwrap_err(),
            TemporalError::HistoryUnderflow { .. }
        ));
    }

    #[test]
    fn test_at_time_lower_bound() {
        let store = TemporalStore::new();
        store.record(json!({"t": 1}), Some(Timestamp(1))).unwrap();
        store.record(json!({"t": 5}), Some(Timestamp(5))).unwrap();
        store.record(json!({"t": 10}), Some(Timestamp(10))).unwrap();

        assert_eq!(store.get(&Query::new().at_time(7).key("t")).unwrap(), Value::Int(5));
        assert_eq!(store.get(&Query::new().at_time(5).key("t")).unwrap(), Value::Int(5));
        assert_eq!(store.get(&Query::new().at_time(99).key("t")).unwrap(), Value::Int(10));
        assert!(matches!(
            store.get(&Query::new().at_time(0)).unwrap_err(),
            TemporalError::HistoryUnderflow { .. }
        ));
    }

    #[test]
    fn test_equal_timestamps_pick_latest() {
        let store = TemporalStore::new();
        store.record(json!({"v": 1}), Some(Timestamp(3))).unwrap();
        store.record(json!({"v": 2}), Some(Timestamp(3))).unwrap();
        assert_eq!(store.get(&Query::new().at_time(3).key("v")).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_out_of_order_timestamp_rejected() {
        let store = TemporalStore::new();
        store.record(json!({"a": 1}), Some(Timestamp(10))).unwrap();
        let err = store.record(json!({"a": 2}), Some(Timestamp(5))).unwrap_err();
        assert_eq!(
            err,
            TemporalError::OutOfOrderTimestamp {
                previous: Timestamp(10),
                supplied: Timestamp(5),
            }
        );
        // The failed record left history untouched.
        assert_eq!(store.len(), 1);
        assert_eq!(store.record(json!({"a": 3}), Some(Timestamp(10))).unwrap(), 1);
    }

    #[test]
    fn test_not_a_mapping_rejected() {
        let store = TemporalStore::new();
        let err = store.record(json!(42), None).unwrap_err();
        assert!(matches!(err, TemporalError::NotAMapping(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_zero_retention_rejected() {
        let err = TemporalStore::builder().max_history(0).build().unwrap_err();
        assert!(matches!(err, TemporalError::InvalidConfig(_)));
    }

    #[test]
    fn test_eviction_distinguishes_evicted_from_unknown() {
        let store = ticking_store(Some(2));
        for x in 0..4 {
            store.record(json!({ "x": x }), None).unwrap();
        }
        assert_eq!(store.len(), 2);
        assert_eq!(store.sequence_range(), Some(2..=3));
        assert_eq!(
            store.get(&Query::new().index(1)).unwrap_err(),
            TemporalError::EntryNotFound {
                sequence: 1,
                evicted: true
            }
        );
        assert_eq!(
            store.get(&Query::new().index(4)).unwrap_err(),
            TemporalError::EntryNotFound {
                sequence: 4,
                evicted: false
            }
        );
    }

    #[test]
    fn test_labels_follow_entries() {
        let store = ticking_store(Some(3));
        store.record_labeled("id1", json!({"value": 10}), None).unwrap();
        store.record_labeled("id2", json!({"value": 20}), None).unwrap();
        store.record_labeled("id3", json!({"value": 30}), None).unwrap();
        store.record_labeled("id4", json!({"value": 40}), None).unwrap();

        assert!(!store.contains_label("id1"));
        assert_eq!(
            store.get(&Query::new().label("id1")).unwrap_err(),
            TemporalError::LabelNotFound("id1".into())
        );
        assert_eq!(
            store.get(&Query::new().label("id2").key("value")).unwrap(),
            Value::Int(20)
        );
    }

    #[test]
    fn test_relabel_moves_label_to_newest() {
        let store = ticking_store(Some(2));
        store.record_labeled("a", json!({"v": 1}), None).unwrap();
        store.record_labeled("a", json!({"v": 2}), None).unwrap();
        assert_eq!(store.get(&Query::new().label("a").key("v")).unwrap(), Value::Int(2));

        // Evicting the first "a" entry must not drop the label.
        store.record(json!({"v": 3}), None).unwrap();
        assert!(store.contains_label("a"));
        assert_eq!(store.get(&Query::new().label("a").key("v")).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_get_returns_owned_copy() {
        let store = ticking_store(None);
        store.record(json!({"a": 1}), None).unwrap();
        let mut view = store.get(&Query::current()).unwrap();
        if let Value::Map(map) = &mut view {
            map.insert("a".into(), Value::Int(99));
        }
        assert_eq!(store.get(&Query::current().key("a")).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_key_lookup_errors_name_path() {
        let store = ticking_store(None);
        store.record(json!({"user": {"name": "a"}}), None).unwrap();
        let err = store
            .get(&Query::current().key("user.address.city"))
            .unwrap_err();
        assert!(matches!(
            err,
            TemporalError::KeyNotFound { ref missing, .. } if missing.to_string() == "user.address"
        ));
        assert_eq!(
            store.get(&Query::current().key("")).unwrap(),
            payload(json!({"user": {"name": "a"}}))
        );
    }

    #[test]
    fn test_set_merge_function_applies_forward_only() {
        let store = ticking_store(None);
        store.record(json!({"a": 1, "b": 1}), None).unwrap();
        store.set_merge_function(merge::replace);
        store.record(json!({"c": 1}), None).unwrap();

        assert_eq!(store.get(&Query::new().index(0)).unwrap(), payload(json!({"a": 1, "b": 1})));
        assert_eq!(store.get(&Query::current()).unwrap(), payload(json!({"c": 1})));
    }

    #[test]
    fn test_history_ranges() {
        let store = ticking_store(None);
        for x in 0..5 {
            store.record(json!({ "x": x }), None).unwrap();
        }
        let seqs = |iter: HistoryIter| iter.map(|e| e.sequence()).collect::<Vec<_>>();
        assert_eq!(seqs(store.history(..)), vec![0, 1, 2, 3, 4]);
        assert_eq!(seqs(store.history(1..=3)), vec![1, 2, 3]);
        assert_eq!(seqs(store.history(1..3)), vec![1, 2]);
        assert_eq!(seqs(store.history(3..)), vec![3, 4]);
        assert_eq!(seqs(store.history(..0)), Vec::<Sequence>::new());
        assert_eq!(seqs(store.history(10..)), Vec::<Sequence>::new());
        assert_eq!(store.history(..).rev().next().unwrap().sequence(), 4);
        assert_eq!(store.history(2..).len(), 3);
    }

    #[test]
    fn test_history_is_a_snapshot() {
        let store = ticking_store(Some(3));
        for x in 0..3 {
            store.record(json!({ "x": x }), None).unwrap();
        }
        let snapshot = store.history(..);
        store.record(json!({"x": 3}), None).unwrap();
        assert_eq!(
            snapshot.map(|e| e.sequence()).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(
            store.history(..).map(|e| e.sequence()).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_recent() {
        let store = ticking_store(None);
        for x in 0..4 {
            store.record(json!({ "x": x }), None).unwrap();
        }
        let recent = store.recent(2);
        assert_eq!(recent.iter().map(|e| e.sequence()).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(store.recent(10).len(), 4);
        assert!(store.recent(0).is_empty());
    }

    #[test]
    fn test_diff_between_entries() {
        let store = ticking_store(None);
        store.record(json!({"a": 1, "user": {"name": "a"}}), None).unwrap();
        store.record(json!({"user": {"age": 5}}), None).unwrap();

        let diff = store.diff(0, 1).unwrap();
        assert_eq!(diff.len(), 1);
        assert!(diff.contains_key(&KeyPath::parse("user.age")));
        assert!(store.diff(1, 1).unwrap().is_empty());
        assert!(matches!(
            store.diff(0, 9).unwrap_err(),
            TemporalError::EntryNotFound { sequence: 9, .. }
        ));

        let by_offset = store
            .diff_addresses(&Address::Relative(-1), &Address::current())
            .unwrap();
        assert_eq!(by_offset, diff);
    }

    #[test]
    fn test_try_record_without_contention() {
        let store = ticking_store(None);
        assert_eq!(store.try_record(json!({"a": 1}), None).unwrap(), 0);
    }
}
