//! tdict: entry point.

use std::io::BufReader;
use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use temporal_dict::{Query, Timestamp};
use temporal_dict_cli::commands::Session;
use temporal_dict_cli::config::{open_store, Overrides};
use temporal_dict_cli::replay::{replay, write_history};

#[derive(Parser)]
#[command(
    name = "tdict",
    about = "Temporal dictionary: a key-value store that remembers every state it has been in",
    version
)]
struct Cli {
    /// Path to a JSON store config file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Keep at most this many entries (overrides the config file).
    #[arg(long, global = true)]
    max_history: Option<usize>,

    /// Sequence number given to the first entry.
    #[arg(long, global = true)]
    origin: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch interactive REPL mode (default).
    Repl,

    /// Record every line of a JSON-lines file, then print history or one state.
    ///
    /// Each line is {"changes": {...}, "timestamp": T, "label": L}; timestamp
    /// and label are optional.
    #[command(group(ArgGroup::new("address").args(["at", "index", "relative"])))]
    Replay {
        /// JSON-lines file to replay ("-" reads stdin).
        file: PathBuf,

        /// Print the state in effect at this timestamp.
        #[arg(long)]
        at: Option<i64>,

        /// Print the state with this sequence number.
        #[arg(long)]
        index: Option<u64>,

        /// Print the state at this offset from the newest (0 or negative).
        #[arg(long, allow_hyphen_values = true)]
        relative: Option<i64>,

        /// Dotted key path to read from the addressed state.
        #[arg(long)]
        key: Option<String>,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   tdict completions bash > ~/.local/share/bash-completion/completions/tdict
    ///   tdict completions zsh > ~/.zfunc/_tdict
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let overrides = Overrides {
        max_history: cli.max_history,
        origin_sequence: cli.origin,
    };

    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Repl => {
            let store = open_store(cli.config.as_deref(), overrides)?;
            temporal_dict_cli::repl::run(Session::new(store))?;
        }

        Commands::Replay {
            file,
            at,
            index,
            relative,
            key,
        } => {
            let store = open_store(cli.config.as_deref(), overrides)?;
            if file.as_os_str() == "-" {
                replay(&store, std::io::stdin().lock())?;
            } else {
                let handle = std::fs::File::open(&file)
                    .with_context(|| format!("Failed to open {}", file.display()))?;
                replay(&store, BufReader::new(handle))?;
            }

            let query = match (at, index, relative) {
                (Some(t), _, _) => Some(Query::new().at_time(Timestamp(t))),
                (_, Some(s), _) => Some(Query::new().index(s)),
                (_, _, Some(n)) => Some(Query::new().relative(n)),
                _ if key.is_some() => Some(Query::current()),
                _ => None,
            };

            match query {
                Some(query) => {
                    let query = match key {
                        Some(key) => query.key(key.as_str()),
                        None => query,
                    };
                    let value = store.get(&query)?;
                    println!("{}", serde_json::to_string_pretty(&value.to_json())?);
                }
                None => write_history(&store, &mut std::io::stdout().lock())?,
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "tdict", &mut std::io::stdout());
        }
    }

    Ok(())
}
