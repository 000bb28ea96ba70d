//! Prints orchestrator events to the terminal.
//!
//! Renders arrive as the full text so far; the terminal only appends, so
//! each render prints the part not yet shown.

use colored::Colorize;
use slop_application::{StreamKind, UiEvent};
use slop_core::session::Role;
use std::io::Write;
use tokio::sync::mpsc;

/// Tracks what has been written for the output and the chat reply.
#[derive(Debug, Default)]
pub struct TerminalRenderer {
    output: String,
    reply: String,
    /// Whether an optimize or refine stream is running.
    streaming: bool,
    /// Session events are printed only in interactive mode.
    verbose: bool,
}

/// Returns the text to append so the terminal shows `text`, or `None` when
/// `text` does not extend what was already shown.
pub fn unseen<'a>(shown: &str, text: &'a str) -> Option<&'a str> {
    text.strip_prefix(shown)
}

impl TerminalRenderer {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            ..Self::default()
        }
    }

    /// Consumes events until every sender is gone.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<UiEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
    }

    pub fn handle(&mut self, event: UiEvent) {
        match event {
            UiEvent::LoadingChanged { kind, active: true } => {
                self.output.clear();
                self.reply.clear();
                if kind != StreamKind::Chat {
                    self.streaming = true;
                    println!("{}", format!("[{}…]", kind).bright_black());
                }
            }
            UiEvent::LoadingChanged { kind, active: false } => {
                if kind != StreamKind::Chat {
                    self.streaming = false;
                    println!();
                }
            }
            UiEvent::OutputRendered { text } => self.render_output(&text),
            UiEvent::ChatProgress { text } => {
                if let Some(rest) = unseen(&self.reply, &text) {
                    print!("{}", rest.bright_blue());
                    flush();
                }
                self.reply = text;
            }
            UiEvent::ChatReplyFinished { text, cancelled } => {
                if let Some(rest) = unseen(&self.reply, &text) {
                    print!("{}", rest.bright_blue());
                }
                if cancelled {
                    print!(" {}", "(stopped)".bright_black());
                }
                println!();
                self.reply.clear();
            }
            UiEvent::ChatMessageAdded { message } if message.role == Role::User => {
                self.reply.clear();
            }
            UiEvent::ChatMessageAdded { .. } => {}
            UiEvent::ChatReset { notice } => {
                if self.verbose {
                    println!("{}", notice.bright_black());
                }
            }
            UiEvent::HistoryChanged { position, len } => {
                if self.verbose && len > 0 {
                    let position = position.map_or(0, |p| p + 1);
                    println!("{}", format!("[result {}/{}]", position, len).bright_black());
                }
            }
            UiEvent::SessionLoaded { session } => {
                if self.verbose {
                    println!("{}", format!("Session: {} ({})", session.name, session.id).bright_magenta());
                }
            }
            UiEvent::Error { kind, message } => {
                // Optimize and refine failures were already rendered as output.
                if kind == StreamKind::Chat {
                    println!();
                    eprintln!("{}", message.red());
                }
            }
        }
    }

    fn render_output(&mut self, text: &str) {
        if !self.verbose && !self.streaming {
            self.output = text.to_string();
            return;
        }

        let failed = text.starts_with("Error:") || text.starts_with("Refinement Error:");
        match unseen(&self.output, text) {
            Some(rest) if !failed => {
                if !rest.is_empty() {
                    print!("{}", rest);
                    flush();
                }
            }
            // Navigation or a failure replaced the output entirely.
            _ => {
                println!();
                if failed {
                    println!("{}", text.red());
                } else {
                    println!("{}", text);
                }
            }
        }
        self.output = text.to_string();
    }
}

fn flush() {
    if let Err(e) = std::io::stdout().flush() {
        tracing::debug!("[Render] stdout flush failed: {}", e);
    }
}
