//! Line-oriented terminal front end.
//!
//! Renders events from the bus as they arrive and turns typed commands into
//! calls on [`AppState`] and [`SyncEngine`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::app::AppState;
use crate::events::{AppEvent, EventBus, NotificationSlot, Severity};
use crate::quotes::Quote;
use crate::sync::{ConflictRecord, SyncEngine, SyncOutcome};

const HELP: &str = "\
commands:
  show                      show a random quote from the current category
  list                      list quotes in the current category
  categories                list categories
  filter <category>         select a category (\"All\" for everything)
  add <text> | <category>   add a quote
  export [dir]              write quotes.json (default: data directory)
  import <file>             import quotes from a JSON file
  sync                      sync with the server now
  conflicts                 list conflicts awaiting review
  keep-local <text>         restore the local category of a conflicted quote
  dismiss <text>            accept the server version of a conflicted quote
  notice                    show the current notification
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Show,
    List,
    Categories,
    Filter(String),
    Add { text: String, category: String },
    Export(Option<PathBuf>),
    Import(PathBuf),
    Sync,
    Conflicts,
    KeepLocal(String),
    Dismiss(String),
    Notice,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };

    let require = |what: &str| -> Result<String, String> {
        if rest.is_empty() {
            Err(format!("usage: {} {}", name, what))
        } else {
            Ok(rest.to_string())
        }
    };

    match name {
        "help" | "?" => Ok(Command::Help),
        "show" | "" => Ok(Command::Show),
        "list" => Ok(Command::List),
        "categories" => Ok(Command::Categories),
        "filter" => Ok(Command::Filter(rest.to_string())),
        "add" => {
            let (text, category) = rest
                .rsplit_once('|')
                .ok_or_else(|| "usage: add <text> | <category>".to_string())?;
            Ok(Command::Add {
                text: text.trim().to_string(),
                category: category.trim().to_string(),
            })
        }
        "export" => Ok(Command::Export(
            (!rest.is_empty()).then(|| PathBuf::from(rest)),
        )),
        "import" => require("<file>").map(|p| Command::Import(PathBuf::from(p))),
        "sync" => Ok(Command::Sync),
        "conflicts" => Ok(Command::Conflicts),
        "keep-local" => require("<text>").map(Command::KeepLocal),
        "dismiss" => require("<text>").map(Command::Dismiss),
        "notice" => Ok(Command::Notice),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command `{}` (try `help`)", other)),
    }
}

pub fn render_quote(quote: &Quote) -> String {
    format!("  \"{}\"\n      - {}", quote.text, quote.category)
}

fn render_conflict(conflict: &ConflictRecord) -> String {
    format!(
        "  \"{}\": local {} / server {} (applied: {:?})",
        conflict.local.text, conflict.local.category, conflict.server.category, conflict.winner
    )
}

/// Text printed for an event.
pub fn render_event(event: &AppEvent) -> String {
    match event {
        AppEvent::Notification(n) => format!("[{}] {}", n.severity, n.message),
        AppEvent::QuoteShown(quote) => render_quote(quote),
        AppEvent::QuotesChanged {
            categories,
            selected,
            visible,
        } => format!(
            "{} quote(s) in {} | categories: {}",
            visible,
            selected,
            categories.join(", ")
        ),
        AppEvent::ConflictsDetected { conflicts } => {
            let mut lines = vec!["conflicts (use keep-local <text> to revert):".to_string()];
            lines.extend(conflicts.iter().map(render_conflict));
            lines.join("\n")
        }
    }
}

/// Print bus events to stdout and keep the latest notification in `slot`.
pub fn spawn_printer(events: &EventBus, slot: Arc<Mutex<NotificationSlot>>) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let AppEvent::Notification(n) = &event {
                        slot.lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .show(n.clone());
                    }
                    println!("{}", render_event(&event));
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("Console lagged by {} events", n);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Read commands from stdin until `quit` or end of input.
pub async fn run_console(
    state: &Arc<AppState>,
    engine: &Arc<SyncEngine>,
    slot: &Arc<Mutex<NotificationSlot>>,
    data_dir: &Path,
) -> anyhow::Result<()> {
    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        execute(command, state, engine, slot, data_dir).await;
    }

    Ok(())
}

async fn execute(
    command: Command,
    state: &Arc<AppState>,
    engine: &Arc<SyncEngine>,
    slot: &Arc<Mutex<NotificationSlot>>,
    data_dir: &Path,
) {
    // Errors are already reported as notifications by the state and engine.
    match command {
        Command::Help => println!("{}", HELP),
        Command::Show => {
            state.show_random_quote();
        }
        Command::List => {
            for quote in state.filtered_quotes() {
                println!("{}", render_quote(&quote));
            }
        }
        Command::Categories => {
            let selected = state.selected_category();
            for category in state.category_options() {
                let marker = if category == selected { "*" } else { " " };
                println!("{} {}", marker, category);
            }
        }
        Command::Filter(category) => match state.set_selected_category(&category) {
            Ok(quotes) => {
                println!("{} quote(s) in {}", quotes.len(), state.selected_category());
                state.show_random_quote();
            }
            Err(e) => state
                .events()
                .notify(format!("Failed to save filter: {}", e), Severity::Error),
        },
        Command::Add { text, category } => {
            if let Ok(quote) = state.add_quote(&text, &category) {
                engine.publish_quote(quote);
            }
        }
        Command::Export(dir) => {
            let dir = dir.unwrap_or_else(|| data_dir.to_path_buf());
            let _ = state.export_quotes(&dir);
        }
        Command::Import(path) => {
            let _ = state.import_file(&path);
        }
        Command::Sync => {
            if engine.sync_now().await == SyncOutcome::Skipped {
                println!("a sync pass is already running");
            }
        }
        Command::Conflicts => {
            let pending = engine.pending_conflicts();
            if pending.is_empty() {
                println!("no pending conflicts");
            }
            for conflict in &pending {
                println!("{}", render_conflict(conflict));
            }
        }
        Command::KeepLocal(text) => {
            if let Err(e) = engine.keep_local(&text) {
                println!("{}", e);
            }
        }
        Command::Dismiss(text) => {
            if let Err(e) = engine.dismiss_conflict(&text) {
                println!("{}", e);
            }
        }
        Command::Notice => {
            let mut slot = slot.lock().unwrap_or_else(|e| e.into_inner());
            match slot.current() {
                Some(n) => println!("[{}] {}", n.severity, n.message),
                None => println!("no active notification"),
            }
        }
        Command::Quit => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Notification;
    use crate::sync::Winner;

    #[test]
    fn test_parse_add() {
        assert_eq!(
            parse_command("add Stay hungry | stay foolish | Motivation").unwrap(),
            Command::Add {
                text: "Stay hungry | stay foolish".into(),
                category: "Motivation".into(),
            }
        );
        assert!(parse_command("add no category").is_err());
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_command("  sync ").unwrap(), Command::Sync);
        assert_eq!(parse_command("").unwrap(), Command::Show);
        assert_eq!(
            parse_command("filter Life").unwrap(),
            Command::Filter("Life".into())
        );
        assert_eq!(parse_command("export").unwrap(), Command::Export(None));
        assert_eq!(
            parse_command("keep-local The best way").unwrap(),
            Command::KeepLocal("The best way".into())
        );
        assert!(parse_command("keep-local").is_err());
        assert!(parse_command("launch").is_err());
    }

    #[test]
    fn test_render_event() {
        let quote = Quote::new("A", "X").unwrap();
        assert_eq!(
            render_event(&AppEvent::QuoteShown(quote.clone())),
            "  \"A\"\n      - X"
        );

        let note = AppEvent::Notification(Notification::new("done", Severity::Success));
        assert_eq!(render_event(&note), "[success] done");

        let conflicts = AppEvent::ConflictsDetected {
            conflicts: vec![ConflictRecord {
                local: quote,
                server: Quote::new("A", "Server").unwrap(),
                winner: Winner::Server,
            }],
        };
        let text = render_event(&conflicts);
        assert!(text.contains("local X / server Server"));

        let changed = AppEvent::QuotesChanged {
            categories: vec!["All".into(), "Life".into()],
            selected: "Life".into(),
            visible: 2,
        };
        assert_eq!(
            render_event(&changed),
            "2 quote(s) in Life | categories: All, Life"
        );
    }
}
