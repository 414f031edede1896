//! Step-wise navigation through a store's history.

use std::sync::Arc;

use crate::query::Address;
use crate::store::TemporalStore;
use crate::types::{Entry, Sequence, TemporalError, TemporalResult};

/// A movable position over the retained entries of a store.
///
/// The cursor only remembers a sequence number; every move re-reads the
/// store, so records made while the cursor is open are visible to it.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    store: &'a TemporalStore,
    position: Sequence,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(store: &'a TemporalStore, position: Sequence) -> Self {
        Self { store, position }
    }

    pub fn position(&self) -> Sequence {
        self.position
    }

    /// The entry under the cursor. Fails if eviction has overtaken it.
    pub fn entry(&self) -> TemporalResult<Arc<Entry>> {
        self.store.entry(&Address::Index(self.position))
    }

    /// Move one entry towards the past.
    pub fn back(&mut self) -> TemporalResult<Arc<Entry>> {
        let range = self
            .store
            .sequence_range()
            .ok_or(TemporalError::EmptyHistory)?;
        let (oldest, newest) = (*range.start(), *range.end());

        if self.position <= oldest {
            let back = newest.saturating_sub(self.position).saturating_add(1);
            let offset = i64::try_from(back).map_or(i64::MIN, |back| -back);
            return Err(TemporalError::HistoryUnderflow {
                address: Address::Relative(offset),
                oldest,
            });
        }
        self.step_to(self.position - 1)
    }

    /// Move one entry towards the present.
    pub fn forward(&mut self) -> TemporalResult<Arc<Entry>> {
        let range = self
            .store
            .sequence_range()
            .ok_or(TemporalError::EmptyHistory)?;
        let newest = *range.end();

        if self.position >= newest {
            let ahead = self.position.saturating_sub(newest).saturating_add(1);
            let offset = i64::try_from(ahead).unwrap_or(i64::MAX);
            return Err(TemporalError::HistoryOverflow { offset });
        }
        self.step_to(self.position + 1)
    }

    /// Jump to the entry selected by `address`.
    pub fn seek(&mut self, address: &Address) -> TemporalResult<Arc<Entry>> {
        let entry = self.store.entry(address)?;
        self.position = entry.sequence();
        Ok(entry)
    }

    /// Jump to the newest entry.
    pub fn latest(&mut self) -> TemporalResult<Arc<Entry>> {
        self.seek(&Address::current())
    }

    fn step_to(&mut self, target: Sequence) -> TemporalResult<Arc<Entry>> {
        let entry = self.store.entry(&Address::Index(target))?;
        self.position = target;
        Ok(entry)
    }
}
