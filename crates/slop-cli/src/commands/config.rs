use crate::app::App;
use anyhow::Result;
use colored::Colorize;
use slop_core::config::{EndpointConfig, EndpointKind};

/// Fields given on the command line; `None` keeps the current value.
#[derive(Debug, Default)]
pub struct EndpointUpdate {
    pub url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub save_key: bool,
}

impl EndpointUpdate {
    pub fn apply(self, current: &EndpointConfig) -> EndpointConfig {
        EndpointConfig::new(
            self.url.as_deref().unwrap_or(&current.base_url),
            self.model.unwrap_or_else(|| current.model.clone()),
            self.api_key.unwrap_or_else(|| current.api_key.clone()),
        )
        .with_persist_key(self.save_key)
    }
}

/// Masks all but the last four characters of a key.
pub fn mask_key(key: &str) -> String {
    let count = key.chars().count();
    if count == 0 {
        return "(none)".to_string();
    }
    let visible: String = key.chars().skip(count.saturating_sub(4)).collect();
    format!("{}{}", "*".repeat(count.saturating_sub(4).min(8)), visible)
}

fn or_unset(value: &str) -> &str {
    if value.is_empty() { "(primary)" } else { value }
}

pub fn show(app: &App) {
    let config = app.client.config();

    println!("{}", "Primary endpoint".bright_magenta().bold());
    println!("  url:     {}", config.primary.base_url);
    println!("  model:   {}", config.primary.model);
    println!("  api key: {}", mask_key(&config.primary.api_key));

    println!("{}", "Chat endpoint".bright_magenta().bold());
    println!("  url:     {}", or_unset(&config.chat.base_url));
    println!("  model:   {}", or_unset(&config.chat.model));
    if config.chat.api_key.is_empty() {
        println!("  api key: (primary)");
    } else {
        println!("  api key: {}", mask_key(&config.chat.api_key));
    }
}

pub async fn set(app: &App, kind: EndpointKind, update: EndpointUpdate) -> Result<()> {
    let current = app.client.config();
    let save_key = update.save_key;
    let endpoint = update.apply(current.endpoint(kind));
    let has_key = endpoint.api_key().is_some();

    app.client.update_config(kind, endpoint).await?;
    println!("{}", "Settings saved.".green());
    if has_key && !save_key {
        println!(
            "{}",
            "The API key was not stored; pass --save-key to keep it.".bright_black()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key(""), "(none)");
        assert_eq!(mask_key("abc"), "abc");
        assert_eq!(mask_key("sk-123456"), "*****3456");
    }

    #[test]
    fn test_update_keeps_unspecified_fields() {
        let current = EndpointConfig::new("http://host/v1", "m1", "key");
        let update = EndpointUpdate {
            model: Some("m2".to_string()),
            ..EndpointUpdate::default()
        };
        let next = update.apply(&current);
        assert_eq!(next.base_url, "http://host/v1");
        assert_eq!(next.model, "m2");
        assert_eq!(next.api_key, "key");
        assert!(!next.persist_key);
    }
}
