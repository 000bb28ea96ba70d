use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use slop_core::config::EndpointKind;
use slop_core::prompts::{OptimizationMode, PromptKind};
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

mod app;
mod commands;
mod render;
mod repl;

use app::App;

#[derive(Parser)]
#[command(name = "slop")]
#[command(about = "SLOP - Simple Locally Optimized Prompts", long_about = None)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Where settings and sessions are kept.
#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Path of the store file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH", conflicts_with = "memory")]
    pub store: Option<PathBuf>,

    /// Keep everything in memory; nothing survives the process
    #[arg(long, global = true)]
    pub memory: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive session: chat, optimize and refine (default)
    Repl,
    /// Optimize a prompt once and print the result
    Optimize {
        /// The rough prompt idea
        text: String,
        /// Produce a skill bundle instead of a single prompt
        #[arg(long)]
        skill: bool,
    },
    /// Manage saved sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
    /// Show or change endpoint settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List models offered by an endpoint
    Models {
        /// Query the chat endpoint instead of the primary one
        #[arg(long)]
        chat: bool,
    },
    /// Show or set the optimization mode
    Mode {
        #[arg(value_parser = OptimizationMode::from_str)]
        mode: Option<OptimizationMode>,
    },
    /// Inspect or override prompt templates
    Template {
        #[command(subcommand)]
        action: TemplateAction,
    },
}

#[derive(Subcommand)]
enum SessionsAction {
    /// List sessions, most recent first
    List,
    /// Make a session current
    Switch { id: String },
    /// Delete a session
    Delete { id: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print both endpoint configurations
    Show,
    /// Update an endpoint configuration
    Set {
        /// Configure the chat endpoint (empty fields fall back to primary)
        #[arg(long)]
        chat: bool,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
        /// Write the API key to the store
        #[arg(long)]
        save_key: bool,
    },
}

#[derive(Subcommand)]
enum TemplateAction {
    /// Print the template in effect
    Show {
        #[arg(value_parser = PromptKind::from_str)]
        kind: PromptKind,
        /// Show the skill-mode template
        #[arg(long)]
        skill: bool,
    },
    /// Override a template
    Set {
        #[arg(value_parser = PromptKind::from_str)]
        kind: PromptKind,
        /// Template text; read from --file when omitted
        text: Option<String>,
        #[arg(long, value_name = "PATH", conflicts_with = "text")]
        file: Option<PathBuf>,
    },
    /// Restore the built-in template
    Reset {
        #[arg(value_parser = PromptKind::from_str)]
        kind: PromptKind,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SLOP_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let app = App::open(&cli.store).await?;

    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Repl => repl::run(app).await?,
        Commands::Optimize { text, skill } => {
            let mode = if skill {
                OptimizationMode::Skills
            } else {
                OptimizationMode::Prompts
            };
            commands::optimize::run(app, &text, mode).await?
        }
        Commands::Sessions { action } => match action {
            SessionsAction::List => commands::sessions::list(&app).await?,
            SessionsAction::Switch { id } => commands::sessions::switch(&app, &id).await?,
            SessionsAction::Delete { id } => commands::sessions::delete(&app, &id).await?,
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(&app),
            ConfigAction::Set {
                chat,
                url,
                model,
                api_key,
                save_key,
            } => {
                let kind = if chat { EndpointKind::Chat } else { EndpointKind::Primary };
                let update = commands::config::EndpointUpdate {
                    url,
                    model,
                    api_key,
                    save_key,
                };
                commands::config::set(&app, kind, update).await?
            }
        },
        Commands::Models { chat } => {
            let kind = if chat { EndpointKind::Chat } else { EndpointKind::Primary };
            commands::models::list(&app, kind).await?
        }
        Commands::Mode { mode } => commands::mode::run(&app, mode).await?,
        Commands::Template { action } => match action {
            TemplateAction::Show { kind, skill } => {
                let mode = if skill {
                    OptimizationMode::Skills
                } else {
                    OptimizationMode::Prompts
                };
                commands::template::show(&app, kind, mode)
            }
            TemplateAction::Set { kind, text, file } => commands::template::set(&app, kind, text, file).await?,
            TemplateAction::Reset { kind } => commands::template::reset(&app, kind).await?,
        },
    }

    Ok(())
}
