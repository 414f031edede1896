//! Interactive REPL over a temporal store.
//!
//! Launch with `tdict repl` (or plain `tdict`) to enter interactive mode.
//! Type `/help` for available commands, Tab for completion.

use rustyline::completion::{Completer, Pair};
use rustyline::config::CompletionType;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{
    Cmd, ConditionalEventHandler, Config, Editor, Event, EventContext, EventHandler, Helper,
    KeyEvent, RepeatCount,
};

use crate::commands::{Command, MergeStrategy, Session};

/// Available REPL commands.
const COMMANDS: &[(&str, &str)] = &[
    ("/record", "Record changes: /record [--at T] [--label L] {json}"),
    ("/get", "Read a state or key: /get [key] [--relative N|--index S|--at T|--label L]"),
    ("/diff", "Show changes between two sequences"),
    ("/history", "List retained entries: /history [start [end]]"),
    ("/recent", "List the newest N entries"),
    ("/back", "Step the cursor one entry back"),
    ("/forward", "Step the cursor one entry forward"),
    ("/merge", "Switch merge function"),
    ("/stats", "Show store statistics"),
    ("/clear", "Clear the screen"),
    ("/help", "Show available commands"),
    ("/exit", "Quit the REPL"),
];

/// REPL helper for tab completion.
#[derive(Default)]
struct StoreHelper;

impl Completer for StoreHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let input = &line[..pos];

        if !input.contains(' ') {
            let matches: Vec<Pair> = COMMANDS
                .iter()
                .filter(|(cmd, _)| cmd.starts_with(input))
                .map(|(cmd, desc)| Pair {
                    display: format!("{cmd:<16} {desc}"),
                    replacement: format!("{cmd} "),
                })
                .collect();
            return Ok((0, matches));
        }

        // merge strategy completion
        let (cmd, args) = input.split_once(' ').unwrap_or((input, ""));
        if cmd == "/merge" {
            let prefix_start = input.len() - args.len();
            let matches: Vec<Pair> = MergeStrategy::ALL
                .iter()
                .map(|s| s.name())
                .filter(|name| name.starts_with(args.trim()))
                .map(|name| Pair {
                    display: name.to_string(),
                    replacement: format!("{name} "),
                })
                .collect();
            return Ok((prefix_start, matches));
        }

        Ok((pos, Vec::new()))
    }
}

impl Hinter for StoreHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if pos < line.len() || line.is_empty() {
            return None;
        }
        if line.starts_with('/') && !line.contains(' ') {
            for (cmd, _) in COMMANDS {
                if cmd.starts_with(line) && *cmd != line {
                    return Some(cmd[line.len()..].to_string());
                }
            }
        }
        None
    }
}

impl Highlighter for StoreHelper {}
impl Validator for StoreHelper {}
impl Helper for StoreHelper {}

struct TabCompleteOrAcceptHint;

impl ConditionalEventHandler for TabCompleteOrAcceptHint {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext<'_>,
    ) -> Option<Cmd> {
        if ctx.has_hint() {
            Some(Cmd::CompleteHint)
        } else {
            Some(Cmd::Complete)
        }
    }
}

/// What the loop should do after a line has been handled.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Exit,
}

/// Handle one input line. Output goes to stdout, diagnostics to stderr.
pub fn handle_line(session: &mut Session, line: &str) -> Outcome {
    let line = line.trim();
    if line.is_empty() {
        return Outcome::Continue;
    }

    let input = line.strip_prefix('/').unwrap_or(line);
    if input.is_empty() {
        cmd_help();
        return Outcome::Continue;
    }

    let (cmd, args) = input.split_once(' ').unwrap_or((input, ""));
    match cmd {
        "exit" | "quit" => {
            eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
            return Outcome::Exit;
        }
        "help" | "h" | "?" => cmd_help(),
        "clear" | "cls" => eprint!("\x1b[2J\x1b[H"),
        _ => match Command::parse(cmd, args) {
            Ok(command) => match session.execute(command) {
                Ok(output) => {
                    for line in output.lines() {
                        println!("  {line}");
                    }
                }
                Err(e) => eprintln!("  Error: {e}"),
            },
            Err(e) => eprintln!("  {e}"),
        },
    }
    Outcome::Continue
}

/// Run the interactive REPL.
pub fn run(mut session: Session) -> anyhow::Result<()> {
    eprintln!();
    eprintln!(
        "  \x1b[32m\u{25c9}\x1b[0m \x1b[1mtdict v{}\x1b[0m \x1b[90mtemporal dictionary\x1b[0m",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!();
    eprintln!(
        "    Press \x1b[36m/\x1b[0m to browse commands, \x1b[90mTab\x1b[0m to complete, \x1b[90m/exit\x1b[0m to quit."
    );
    eprintln!();

    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .completion_prompt_limit(20)
        .build();

    let mut rl: Editor<StoreHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(config)?;
    rl.set_helper(Some(StoreHelper));
    rl.bind_sequence(
        KeyEvent::from('\t'),
        EventHandler::Conditional(Box::new(TabCompleteOrAcceptHint)),
    );

    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    let hist_path = std::path::PathBuf::from(&home).join(".tdict_history");
    if hist_path.exists() {
        if let Err(e) = rl.load_history(&hist_path) {
            tracing::debug!("Could not load REPL history {}: {e}", hist_path.display());
        }
    }

    let prompt = " \x1b[36mtdict>\x1b[0m ";

    loop {
        match rl.readline(prompt) {
            Ok(line) => {
                if handle_line(&mut session, &line) == Outcome::Exit {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("  \x1b[90m(Ctrl+C)\x1b[0m Type \x1b[1m/exit\x1b[0m to quit.");
            }
            Err(ReadlineError::Eof) => {
                eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("  Error: {err}");
                break;
            }
        }
    }

    if let Err(e) = rl.save_history(&hist_path) {
        tracing::debug!("Could not save REPL history {}: {e}", hist_path.display());
    }
    tracing::debug!("REPL closed with {} entries retained", session.store().len());

    Ok(())
}

fn cmd_help() {
    eprintln!();
    eprintln!("  Commands:");
    eprintln!();
    for (cmd, desc) in COMMANDS {
        eprintln!("    {cmd:<18} {desc}");
    }
    eprintln!();
    eprintln!("  Tip: Tab completion works for commands and merge strategies.");
    eprintln!();
}
