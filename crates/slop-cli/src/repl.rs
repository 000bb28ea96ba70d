//! Interactive REPL over the orchestrator.
//!
//! Plain lines are chat messages; slash commands drive the workspace.
//! Streaming operations run in background tasks so `/stop` and repeated
//! `/optimize` or `/refine` reach the orchestrator while they run.

use std::borrow::Cow::{self, Borrowed, Owned};
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};

use slop_application::{Orchestrator, OrchestratorError, RunOutcome};
use slop_core::config::EndpointKind;
use slop_core::prompts::OptimizationMode;

use crate::app::App;
use crate::commands::sessions::print_sessions;
use crate::render::TerminalRenderer;

const COMMANDS: &[&str] = &[
    "/input", "/optimize", "/refine", "/stop", "/prev", "/next", "/show", "/new", "/sessions", "/switch",
    "/delete", "/mode", "/models", "/help", "/quit",
];

/// CLI helper for rustyline that provides completion, highlighting, and hints.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

/// One parsed line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Input(String),
    Optimize,
    Refine { include_chat: bool },
    Stop,
    Prev,
    Next,
    Show,
    New,
    Sessions,
    Switch(String),
    Delete(String),
    Mode(Option<String>),
    Models { chat: bool },
    Help,
    Quit,
    Chat(String),
    Unknown(String),
}

impl Command {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        if !line.starts_with('/') {
            return Command::Chat(line.to_string());
        }

        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (line, ""),
        };
        let arg = arg.to_string();

        match name {
            "/input" => Command::Input(arg),
            "/optimize" => Command::Optimize,
            "/refine" => Command::Refine {
                include_chat: arg == "chat",
            },
            "/stop" => Command::Stop,
            "/prev" => Command::Prev,
            "/next" => Command::Next,
            "/show" => Command::Show,
            "/new" => Command::New,
            "/sessions" => Command::Sessions,
            "/switch" => Command::Switch(arg),
            "/delete" => Command::Delete(arg),
            "/mode" => Command::Mode(if arg.is_empty() { None } else { Some(arg) }),
            "/models" => Command::Models { chat: arg == "chat" },
            "/help" => Command::Help,
            "/quit" | "/exit" => Command::Quit,
            _ => Command::Unknown(name.to_string()),
        }
    }
}

fn print_help() {
    let lines = [
        ("/input <text>", "set the prompt idea"),
        ("/optimize", "optimize the idea (again to stop)"),
        ("/refine [chat]", "refine the current result, optionally with the chat"),
        ("/stop", "stop the running request"),
        ("/prev, /next", "move through results"),
        ("/show", "print the current input and result"),
        ("/new", "start a new session"),
        ("/sessions", "list sessions"),
        ("/switch <id>, /delete <id>", "change or remove a session"),
        ("/mode [prompts|skills]", "show or set the optimization mode"),
        ("/models [chat]", "list models of an endpoint"),
        ("/quit", "exit"),
    ];
    for (command, description) in lines {
        println!("  {} {}", format!("{:<28}", command).bright_cyan(), description.bright_black());
    }
    println!("  {}", "Anything else is sent as a chat message.".bright_black());
}

fn report(error: &OrchestratorError) {
    if error.is_busy() {
        eprintln!("{}", "Another request is running. Use /stop first.".yellow());
    } else if error.is_validation() {
        eprintln!("{}", error.to_string().yellow());
    } else {
        eprintln!("{}", format!("Error: {}", error).red());
    }
}

/// Runs a streaming operation without blocking the prompt.
fn spawn_stream<F>(operation: F)
where
    F: Future<Output = slop_application::error::Result<RunOutcome>> + Send + 'static,
{
    tokio::spawn(async move {
        match operation.await {
            Ok(RunOutcome::Ignored) => {
                eprintln!("{}", "A request is running; message ignored.".yellow());
            }
            Ok(outcome) => tracing::debug!("[Repl] Stream finished: {:?}", outcome),
            Err(e) => report(&e),
        }
    });
}

struct Repl {
    app: App,
    orchestrator: Arc<Orchestrator>,
    mode: OptimizationMode,
}

impl Repl {
    /// Handles one command; returns `false` when the REPL should exit.
    async fn dispatch(&mut self, command: Command) -> bool {
        let result = match command {
            Command::Quit => return false,
            Command::Chat(message) => {
                let orchestrator = Arc::clone(&self.orchestrator);
                spawn_stream(async move { orchestrator.send_chat(&message).await });
                Ok(())
            }
            Command::Optimize => {
                let orchestrator = Arc::clone(&self.orchestrator);
                let mode = self.mode;
                spawn_stream(async move { orchestrator.optimize(mode).await });
                Ok(())
            }
            Command::Refine { include_chat } => {
                let orchestrator = Arc::clone(&self.orchestrator);
                let mode = self.mode;
                spawn_stream(async move { orchestrator.refine(include_chat, mode).await });
                Ok(())
            }
            Command::Stop => {
                if !self.orchestrator.stop() {
                    println!("{}", "Nothing to stop.".bright_black());
                }
                Ok(())
            }
            Command::Input(text) => self
                .orchestrator
                .set_prompt_input(&text)
                .await
                .map(|_| println!("{}", "Input saved.".bright_black())),
            Command::Prev => self.step(true).await,
            Command::Next => self.step(false).await,
            Command::Show => {
                self.show().await;
                Ok(())
            }
            Command::New => self.orchestrator.new_session().await.map(|_| ()),
            Command::Sessions => self.sessions().await,
            Command::Switch(id) => self.orchestrator.switch_session(&id).await.map(|_| ()),
            Command::Delete(id) => self.orchestrator.delete_session(&id).await,
            Command::Mode(mode) => {
                self.set_mode(mode).await;
                Ok(())
            }
            Command::Models { chat } => {
                let kind = if chat { EndpointKind::Chat } else { EndpointKind::Primary };
                self.orchestrator.list_models(kind).await.map(|models| {
                    for model in models {
                        println!("  {}", model.id);
                    }
                })
            }
            Command::Help => {
                print_help();
                Ok(())
            }
            Command::Unknown(name) => {
                println!("{}", format!("Unknown command {}. Type /help.", name).bright_black());
                Ok(())
            }
        };

        if let Err(e) = result {
            report(&e);
        }
        true
    }

    async fn step(&self, back: bool) -> slop_application::error::Result<()> {
        let moved = if back {
            self.orchestrator.go_prev().await?
        } else {
            self.orchestrator.go_next().await?
        };
        if !moved {
            println!("{}", "No more results in that direction.".bright_black());
        }
        Ok(())
    }

    async fn show(&self) {
        let session = self.orchestrator.current_session().await;
        let history = session.history();
        println!("{} {}", "Input:".bright_magenta(), session.prompt_input);
        match history.current() {
            Some(text) => {
                let position = history.cursor().map_or(0, |c| c + 1);
                println!("{}", format!("Result {}/{}:", position, history.len()).bright_magenta());
                println!("{}", text);
            }
            None => println!("{}", "No result yet.".bright_black()),
        }
    }

    async fn sessions(&self) -> slop_application::error::Result<()> {
        let sessions = self.orchestrator.list_sessions().await?;
        let current = self.orchestrator.current_session().await;
        print_sessions(&sessions, Some(&current.id));
        Ok(())
    }

    async fn set_mode(&mut self, mode: Option<String>) {
        let Some(mode) = mode else {
            println!("Mode: {}", self.mode.to_string().bright_cyan());
            return;
        };

        match OptimizationMode::from_str(&mode) {
            Ok(mode) => {
                self.mode = mode;
                if let Err(e) = self.app.settings.save_mode(mode).await {
                    tracing::warn!("[Repl] Failed to persist mode: {}", e);
                }
                println!("Mode: {}", mode.to_string().bright_cyan());
            }
            Err(_) => eprintln!("{}", "Mode must be 'prompts' or 'skills'.".yellow()),
        }
    }
}

/// The entry point of the interactive REPL.
pub async fn run(app: App) -> Result<()> {
    let (orchestrator, events) = app.orchestrator().await?;
    let printer = tokio::spawn(TerminalRenderer::new(true).run(events));
    let mode = app.settings.load_mode().await?;

    let mut repl = Repl {
        app,
        orchestrator,
        mode,
    };

    let mut rl = Editor::new()?;
    rl.set_helper(Some(CliHelper::new()));

    println!("{}", "=== SLOP ===".bright_magenta().bold());
    println!(
        "{}",
        "Type '/input <idea>' then '/optimize'. '/help' lists commands, '/quit' exits.".bright_black()
    );
    println!();

    loop {
        let readline = tokio::task::block_in_place(|| rl.readline(">> "));

        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if let Err(e) = rl.add_history_entry(trimmed) {
                    tracing::debug!("[Repl] History entry rejected: {}", e);
                }

                if !repl.dispatch(Command::parse(trimmed)).await {
                    println!("{}", "Goodbye!".bright_green());
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                if repl.orchestrator.stop() {
                    println!("{}", "Stopping…".yellow());
                } else {
                    println!("{}", "CTRL-C detected. Type '/quit' to exit.".yellow());
                }
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        }
    }

    repl.orchestrator.stop();
    drop(repl);
    printer.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_line_is_chat() {
        assert_eq!(Command::parse("  make it shorter "), Command::Chat("make it shorter".to_string()));
    }

    #[test]
    fn test_parse_commands_with_arguments() {
        assert_eq!(
            Command::parse("/input write a story"),
            Command::Input("write a story".to_string())
        );
        assert_eq!(Command::parse("/refine chat"), Command::Refine { include_chat: true });
        assert_eq!(Command::parse("/refine"), Command::Refine { include_chat: false });
        assert_eq!(Command::parse("/mode"), Command::Mode(None));
        assert_eq!(Command::parse("/mode skills"), Command::Mode(Some("skills".to_string())));
        assert_eq!(Command::parse("/switch abc-1"), Command::Switch("abc-1".to_string()));
        assert_eq!(Command::parse("/exit"), Command::Quit);
        assert_eq!(Command::parse("/bogus x"), Command::Unknown("/bogus".to_string()));
    }

    #[test]
    fn test_every_listed_command_parses() {
        for command in COMMANDS {
            assert!(!matches!(Command::parse(command), Command::Unknown(_)), "{}", command);
        }
    }
}
