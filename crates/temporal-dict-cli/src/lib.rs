//! Command-line front end for temporal-dict: an interactive REPL and a
//! JSON-lines replay tool.

pub mod commands;
pub mod config;
pub mod repl;
pub mod replay;

pub use commands::{Command, CommandError, MergeStrategy, Session};
pub use config::{open_store, resolve_config_path, Overrides};
pub use replay::{replay, write_history, ReplayRecord};
