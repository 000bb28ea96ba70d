use crate::app::App;
use anyhow::Result;
use colored::Colorize;
use slop_core::prompts::OptimizationMode;

/// Prints the persisted mode, or replaces it when `mode` is given.
pub async fn run(app: &App, mode: Option<OptimizationMode>) -> Result<()> {
    match mode {
        Some(mode) => {
            app.settings.save_mode(mode).await?;
            println!("{}", format!("Optimization mode set to {}", mode).green());
        }
        None => println!("{}", app.settings.load_mode().await?),
    }
    Ok(())
}
