use crate::app::App;
use anyhow::Result;
use colored::Colorize;
use slop_core::config::EndpointKind;

pub async fn list(app: &App, kind: EndpointKind) -> Result<()> {
    let config = app.client.config();
    let endpoint = match kind {
        EndpointKind::Primary => config.primary,
        EndpointKind::Chat => config.chat_endpoint(),
    };

    let models = app.client.list_models(Some(&endpoint)).await?;
    if models.is_empty() {
        println!("{}", format!("No models reported by {}", endpoint.base_url).bright_black());
        return Ok(());
    }

    for model in models {
        let marker = if model.id == endpoint.model { "*" } else { " " };
        println!("{} {}", marker.bright_green(), model.id);
    }
    Ok(())
}
