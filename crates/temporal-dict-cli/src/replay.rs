//! Replay of JSON-lines record files into a store.
//!
//! Each non-empty line is `{"changes": {...}, "timestamp": T?, "label": L?}`.

use std::io::{BufRead, Write};

use anyhow::Context;
use serde::Deserialize;

use temporal_dict::{TemporalStore, Timestamp};

/// One line of a replay file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplayRecord {
    pub changes: serde_json::Value,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub label: Option<String>,
}

/// Record every line of `reader` into `store`. Returns the number recorded.
///
/// Stops at the first line that fails to parse or record.
pub fn replay<R: BufRead>(store: &TemporalStore, reader: R) -> anyhow::Result<usize> {
    let mut recorded = 0;
    for (number, line) in reader.lines().enumerate() {
        let line_no = number + 1;
        let line = line.with_context(|| format!("Failed to read line {line_no}"))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record: ReplayRecord = serde_json::from_str(line)
            .with_context(|| format!("Invalid record on line {line_no}"))?;
        let timestamp = record.timestamp.map(Timestamp);
        let sequence = match record.label {
            Some(label) => store.record_labeled(label, record.changes, timestamp),
            None => store.record(record.changes, timestamp),
        }
        .with_context(|| format!("Failed to record line {line_no}"))?;

        tracing::debug!("Replayed line {line_no} as entry {sequence}");
        recorded += 1;
    }
    tracing::info!("Replayed {recorded} records");
    Ok(recorded)
}

/// Write the retained history as JSON lines, oldest first.
pub fn write_history<W: Write>(store: &TemporalStore, out: &mut W) -> anyhow::Result<()> {
    for entry in store.history(..) {
        serde_json::to_writer(&mut *out, entry.as_ref())?;
        out.write_all(b"\n")?;
    }
    Ok(())
}
