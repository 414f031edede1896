//! Store commands shared by the REPL: parsing and execution.

use std::fmt::Write as _;
use std::str::FromStr;

use temporal_dict::merge;
use temporal_dict::{Entry, Query, Sequence, TemporalStore, Timestamp, Value};

/// Commands that read or change the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Record {
        changes: serde_json::Value,
        timestamp: Option<Timestamp>,
        label: Option<String>,
    },
    Get(Query),
    Diff(Sequence, Sequence),
    History {
        start: Option<Sequence>,
        end: Option<Sequence>,
    },
    Recent(usize),
    Back,
    Forward,
    Merge(MergeStrategy),
    Stats,
}

/// Stock merge functions selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    Recursive,
    Shallow,
    Replace,
    Prune,
}

impl MergeStrategy {
    pub const ALL: [MergeStrategy; 4] = [
        MergeStrategy::Recursive,
        MergeStrategy::Shallow,
        MergeStrategy::Replace,
        MergeStrategy::Prune,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MergeStrategy::Recursive => "recursive",
            MergeStrategy::Shallow => "shallow",
            MergeStrategy::Replace => "replace",
            MergeStrategy::Prune => "prune",
        }
    }

    pub fn install(self, store: &TemporalStore) {
        match self {
            MergeStrategy::Recursive => store.set_merge_function(merge::recursive_overwrite),
            MergeStrategy::Shallow => store.set_merge_function(merge::shallow_overwrite),
            MergeStrategy::Replace => store.set_merge_function(merge::replace),
            MergeStrategy::Prune => store.set_merge_function(merge::recursive_prune),
        }
    }
}

impl FromStr for MergeStrategy {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.name() == s)
            .ok_or_else(|| CommandError::UnknownStrategy(s.to_string()))
    }
}

/// Errors from parsing a command line.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("Unknown command '/{0}'. Type /help for commands.")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Invalid number '{0}'")]
    InvalidNumber(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Unknown merge strategy '{0}' (expected recursive, shallow, replace or prune)")]
    UnknownStrategy(String),
}

const RECORD_USAGE: &str = "/record [--at <time>] [--label <name>] <json>";
const GET_USAGE: &str = "/get [key] [--relative <n> | --index <seq> | --at <time> | --label <name>]";
const DIFF_USAGE: &str = "/diff <seq> <seq>";
const HISTORY_USAGE: &str = "/history [start [end]]";
const RECENT_USAGE: &str = "/recent <n>";
const MERGE_USAGE: &str = "/merge <recursive|shallow|replace|prune>";

fn number<T: FromStr>(raw: &str) -> Result<T, CommandError> {
    raw.parse()
        .map_err(|_| CommandError::InvalidNumber(raw.to_string()))
}

/// Split off `--flag value` pairs from the front of `args`.
fn take_flag<'a>(args: &'a str) -> Option<(&'a str, &'a str, &'a str)> {
    let rest = args.strip_prefix("--")?;
    let (flag, rest) = rest.split_once(char::is_whitespace)?;
    let rest = rest.trim_start();
    let (value, rest) = rest
        .split_once(char::is_whitespace)
        .unwrap_or((rest, ""));
    Some((flag, value, rest.trim_start()))
}

impl Command {
    /// Parse a command name and its argument string.
    pub fn parse(cmd: &str, args: &str) -> Result<Command, CommandError> {
        let args = args.trim();
        match cmd {
            "record" | "r" => parse_record(args),
            "get" | "g" => parse_get(args),
            "diff" => {
                let parts: Vec<&str> = args.split_whitespace().collect();
                match parts.as_slice() {
                    [a, b] => Ok(Command::Diff(number(a)?, number(b)?)),
                    _ => Err(CommandError::Usage(DIFF_USAGE)),
                }
            }
            "history" | "log" => {
                let parts: Vec<&str> = args.split_whitespace().collect();
                match parts.as_slice() {
                    [] => Ok(Command::History {
                        start: None,
                        end: None,
                    }),
                    [start] => Ok(Command::History {
                        start: Some(number(start)?),
                        end: None,
                    }),
                    [start, end] => Ok(Command::History {
                        start: Some(number(start)?),
                        end: Some(number(end)?),
                    }),
                    _ => Err(CommandError::Usage(HISTORY_USAGE)),
                }
            }
            "recent" => match args {
                "" => Err(CommandError::Usage(RECENT_USAGE)),
                n => Ok(Command::Recent(number(n)?)),
            },
            "back" | "b" => Ok(Command::Back),
            "forward" | "f" => Ok(Command::Forward),
            "merge" => match args {
                "" => Err(CommandError::Usage(MERGE_USAGE)),
                name => Ok(Command::Merge(name.parse()?)),
            },
            "stats" => Ok(Command::Stats),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn parse_record(mut args: &str) -> Result<Command, CommandError> {
    let mut timestamp = None;
    let mut label = None;
    while args.starts_with("--") {
        let (flag, value, rest) = take_flag(args).ok_or(CommandError::Usage(RECORD_USAGE))?;
        match flag {
            "at" => timestamp = Some(Timestamp(number(value)?)),
            "label" => label = Some(value.to_string()),
            _ => return Err(CommandError::Usage(RECORD_USAGE)),
        }
        args = rest;
    }

    if args.is_empty() {
        return Err(CommandError::Usage(RECORD_USAGE));
    }
    let changes =
        serde_json::from_str(args).map_err(|e| CommandError::InvalidJson(e.to_string()))?;
    Ok(Command::Record {
        changes,
        timestamp,
        label,
    })
}

fn parse_get(mut args: &str) -> Result<Command, CommandError> {
    let mut query = Query::new();
    let mut addressed = false;

    if !args.is_empty() && !args.starts_with("--") {
        let (key, rest) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
        query = query.key(key);
        args = rest.trim_start();
    }

    while !args.is_empty() {
        let (flag, value, rest) = take_flag(args).ok_or(CommandError::Usage(GET_USAGE))?;
        query = match flag {
            "relative" => query.relative(number(value)?),
            "index" => query.index(number(value)?),
            "at" => query.at_time(Timestamp(number(value)?)),
            "label" => query.label(value),
            _ => return Err(CommandError::Usage(GET_USAGE)),
        };
        addressed = true;
        args = rest;
    }

    // Interactive reads default to the current state.
    if !addressed {
        query = query.relative(0);
    }
    Ok(Command::Get(query))
}

/// A store plus the navigation position of an interactive session.
pub struct Session {
    store: TemporalStore,
    position: Option<Sequence>,
}

impl Session {
    pub fn new(store: TemporalStore) -> Self {
        Self {
            store,
            position: None,
        }
    }

    pub fn store(&self) -> &TemporalStore {
        &self.store
    }

    /// Sequence under the navigation cursor; `None` follows the newest entry.
    pub fn position(&self) -> Option<Sequence> {
        self.position
    }

    /// Run a command and return its printable output.
    pub fn execute(&mut self, command: Command) -> anyhow::Result<String> {
        match command {
            Command::Record {
                changes,
                timestamp,
                label,
            } => {
                let sequence = match label {
                    Some(label) => self.store.record_labeled(label, changes, timestamp)?,
                    None => self.store.record(changes, timestamp)?,
                };
                self.position = None;
                Ok(format!("Recorded #{sequence}"))
            }
            Command::Get(query) => {
                let value = self.store.get(&query)?;
                Ok(serde_json::to_string_pretty(&value.to_json())?)
            }
            Command::Diff(a, b) => {
                let diff = self.store.diff(a, b)?;
                if diff.is_empty() {
                    return Ok(format!("No differences between #{a} and #{b}"));
                }
                let mut out = String::new();
                for (path, change) in &diff {
                    let show = |v: &Option<Value>| {
                        v.as_ref()
                            .map(|v| v.to_string())
                            .unwrap_or_else(|| "(absent)".to_string())
                    };
                    let _ = writeln!(out, "{path}: {} -> {}", show(&change.old), show(&change.new));
                }
                Ok(out.trim_end().to_string())
            }
            Command::History { start, end } => {
                let entries: Vec<_> = match (start, end) {
                    (Some(s), Some(e)) => self.store.history(s..=e).collect(),
                    (Some(s), None) => self.store.history(s..).collect(),
                    _ => self.store.history(..).collect(),
                };
                Ok(format_entries(entries.iter().map(|e| e.as_ref())))
            }
            Command::Recent(n) => {
                let entries = self.store.recent(n);
                Ok(format_entries(entries.iter().map(|e| e.as_ref())))
            }
            Command::Back | Command::Forward => {
                let (position, entry) = {
                    let mut cursor = match self.position {
                        Some(p) => self.store.cursor_at(p)?,
                        None => self.store.cursor()?,
                    };
                    let entry = if matches!(command, Command::Back) {
                        cursor.back()?
                    } else {
                        cursor.forward()?
                    };
                    (cursor.position(), entry)
                };
                self.position = Some(position);
                Ok(format_entry(&entry))
            }
            Command::Merge(strategy) => {
                strategy.install(&self.store);
                Ok(format!("Merge function set to {}", strategy.name()))
            }
            Command::Stats => Ok(self.stats()),
        }
    }

    fn stats(&self) -> String {
        let config = self.store.config();
        let max = config
            .max_history
            .map(|m| m.to_string())
            .unwrap_or_else(|| "unlimited".to_string());
        let range = match self.store.sequence_range() {
            Some(range) => format!("#{}..=#{}", range.start(), range.end()),
            None => "(empty)".to_string(),
        };
        let position = match self.position {
            Some(p) => format!("#{p}"),
            None => "newest".to_string(),
        };
        format!(
            "Entries:     {}\nRetained:    {range}\nMax history: {max}\nCursor:      {position}",
            self.store.len()
        )
    }
}

/// One line per entry: `#seq @time [label] payload`.
pub fn format_entry(entry: &Entry) -> String {
    let label = entry
        .label()
        .map(|l| format!(" [{l}]"))
        .unwrap_or_default();
    let payload = serde_json::Value::Object(
        entry
            .payload()
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    );
    format!(
        "#{} @{}{label} {payload}",
        entry.sequence(),
        entry.timestamp()
    )
}

fn format_entries<'a>(entries: impl Iterator<Item = &'a Entry>) -> String {
    let lines: Vec<String> = entries.map(format_entry).collect();
    if lines.is_empty() {
        "(no entries)".to_string()
    } else {
        lines.join("\n")
    }
}
