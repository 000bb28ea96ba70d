use crate::app::App;
use anyhow::{Context, Result, bail};
use colored::Colorize;
use slop_core::prompts::{OptimizationMode, PromptKind};
use std::path::PathBuf;

pub fn show(app: &App, kind: PromptKind, mode: OptimizationMode) {
    if mode == OptimizationMode::Prompts && app.client.is_template_overridden(kind) {
        eprintln!("{}", format!("({} is overridden)", kind).bright_black());
    }
    println!("{}", app.client.template(mode, kind));
}

pub async fn set(app: &App, kind: PromptKind, text: Option<String>, file: Option<PathBuf>) -> Result<()> {
    let text = match (text, file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read template from {}", path.display()))?,
        (None, None) => bail!("Provide the template text or --file"),
    };

    app.client.set_template_override(kind, Some(text)).await?;
    println!("{}", format!("Template '{}' saved.", kind).green());
    Ok(())
}

pub async fn reset(app: &App, kind: PromptKind) -> Result<()> {
    app.client.set_template_override(kind, None).await?;
    println!("{}", format!("Template '{}' reset to default.", kind).green());
    Ok(())
}
