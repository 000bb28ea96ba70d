use crate::app::App;
use crate::render::TerminalRenderer;
use anyhow::{Result, bail};
use colored::Colorize;
use slop_application::RunOutcome;
use slop_core::prompts::OptimizationMode;
use std::sync::Arc;

/// Optimizes `text` in a fresh session and streams the result to stdout.
///
/// Ctrl-C stops the request; the partial result is still saved.
pub async fn run(app: App, text: &str, mode: OptimizationMode) -> Result<()> {
    let (orchestrator, events) = app.orchestrator().await?;
    let printer = tokio::spawn(TerminalRenderer::new(false).run(events));

    orchestrator.new_session().await?;
    orchestrator.set_prompt_input(text).await?;

    let stopper = Arc::clone(&orchestrator);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stopper.stop();
        }
    });
    let outcome = orchestrator.optimize(mode).await;
    interrupt.abort();
    let outcome = outcome?;

    drop(orchestrator);
    if let Err(e) = printer.await {
        tracing::debug!("[Optimize] printer task ended abnormally: {}", e);
    }

    match outcome {
        RunOutcome::Completed { .. } => Ok(()),
        RunOutcome::Cancelled { .. } => {
            eprintln!("{}", "Stopped.".yellow());
            Ok(())
        }
        RunOutcome::Failed { error } => bail!(error),
        RunOutcome::Stopped | RunOutcome::Ignored => Ok(()),
    }
}
