//! Endpoint configuration and persisted settings.
//!
//! Two endpoint configurations exist: the primary one used by optimize and
//! refine, and a chat-specific one whose unset fields fall back to the
//! primary configuration field by field.

use crate::error::{Result, SlopError};
use crate::prompts::{OptimizationMode, PromptKind};
use crate::storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use strum::IntoEnumIterator;

/// Base URL used when nothing has been configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:1234/v1";
/// Model used when nothing has been configured.
pub const DEFAULT_MODEL: &str = "local-model";

const MODE_KEY: &str = "slop_optimization_mode";
const LEGACY_URL_KEY: &str = "api_url";
const LEGACY_MODEL_KEY: &str = "model_name";

/// Storage keys for one endpoint configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigKeys {
    pub url: &'static str,
    pub model: &'static str,
    pub api_key: &'static str,
}

/// Which endpoint configuration an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    Primary,
    Chat,
}

impl EndpointKind {
    /// Returns the namespaced storage keys for this endpoint.
    pub fn keys(self) -> ConfigKeys {
        match self {
            EndpointKind::Primary => ConfigKeys {
                url: "slop_api_url",
                model: "slop_model_name",
                api_key: "slop_api_key",
            },
            EndpointKind::Chat => ConfigKeys {
                url: "slop_chat_api_url",
                model: "slop_chat_model_name",
                api_key: "slop_chat_api_key",
            },
        }
    }
}

/// Connection settings for one OpenAI-compatible endpoint.
///
/// Empty strings mean "unset".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    /// Whether the API key is written to persistent storage.
    pub persist_key: bool,
}

impl EndpointConfig {
    /// Creates a configuration with a normalized base URL.
    pub fn new(base_url: impl AsRef<str>, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.as_ref()),
            model: model.into(),
            api_key: api_key.into(),
            persist_key: false,
        }
    }

    pub fn with_persist_key(mut self, persist_key: bool) -> Self {
        self.persist_key = persist_key;
        self
    }

    /// Returns the API key, or `None` when no key is configured.
    pub fn api_key(&self) -> Option<&str> {
        if self.api_key.is_empty() {
            None
        } else {
            Some(&self.api_key)
        }
    }

    /// Builds `{base_url}/{path}` with trailing slashes stripped from the base.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", normalize_base_url(&self.base_url), path.trim_start_matches('/'))
    }

    /// Fills every unset field from `primary`.
    pub fn or_fallback(&self, primary: &EndpointConfig) -> EndpointConfig {
        fn pick(own: &str, fallback: &str) -> String {
            if own.is_empty() { fallback } else { own }.to_string()
        }

        EndpointConfig {
            base_url: pick(&self.base_url, &primary.base_url),
            model: pick(&self.model, &primary.model),
            api_key: pick(&self.api_key, &primary.api_key),
            persist_key: self.persist_key,
        }
    }
}

/// Strips trailing slashes from a base URL.
pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Both endpoint configurations as held by the completion client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub primary: EndpointConfig,
    /// Chat overrides; unset fields resolve to `primary`.
    pub chat: EndpointConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            primary: EndpointConfig::new(DEFAULT_BASE_URL, DEFAULT_MODEL, ""),
            chat: EndpointConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration with only the primary endpoint set.
    pub fn with_primary(primary: EndpointConfig) -> Self {
        Self {
            primary,
            chat: EndpointConfig::default(),
        }
    }

    /// Returns the configuration stored for `kind` (chat unresolved).
    pub fn endpoint(&self, kind: EndpointKind) -> &EndpointConfig {
        match kind {
            EndpointKind::Primary => &self.primary,
            EndpointKind::Chat => &self.chat,
        }
    }

    /// Returns the endpoint chat requests go to after fallback.
    pub fn chat_endpoint(&self) -> EndpointConfig {
        self.chat.or_fallback(&self.primary)
    }
}

/// Reads and writes settings through a [`KeyValueStore`].
///
/// Key names are kept stable so existing stores stay readable.
#[derive(Clone)]
pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    async fn get_non_empty(&self, key: &str) -> Result<Option<String>> {
        Ok(self.store.get(key).await?.filter(|v| !v.is_empty()))
    }

    /// Loads both endpoint configurations.
    ///
    /// The primary endpoint falls back to the legacy un-namespaced keys and
    /// then to the built-in defaults. Chat fields stay empty when unset.
    pub async fn load_client_config(&self) -> Result<ClientConfig> {
        let primary_keys = EndpointKind::Primary.keys();
        let base_url = match self.get_non_empty(primary_keys.url).await? {
            Some(url) => url,
            None => self
                .get_non_empty(LEGACY_URL_KEY)
                .await?
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        };
        let model = match self.get_non_empty(primary_keys.model).await? {
            Some(model) => model,
            None => self
                .get_non_empty(LEGACY_MODEL_KEY)
                .await?
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        };
        let primary_key = self.get_non_empty(primary_keys.api_key).await?;
        let primary = EndpointConfig::new(base_url, model, primary_key.clone().unwrap_or_default())
            .with_persist_key(primary_key.is_some());

        let chat_keys = EndpointKind::Chat.keys();
        let chat_key = self.get_non_empty(chat_keys.api_key).await?;
        let chat = EndpointConfig::new(
            self.get_non_empty(chat_keys.url).await?.unwrap_or_default(),
            self.get_non_empty(chat_keys.model).await?.unwrap_or_default(),
            chat_key.clone().unwrap_or_default(),
        )
        .with_persist_key(chat_key.is_some());

        Ok(ClientConfig { primary, chat })
    }

    /// Persists one endpoint configuration.
    ///
    /// The API key is only written when `persist_key` is set; otherwise any
    /// previously stored key is removed.
    pub async fn save_endpoint(&self, kind: EndpointKind, config: &EndpointConfig) -> Result<()> {
        let keys = kind.keys();
        self.set_or_remove(keys.url, &normalize_base_url(&config.base_url)).await?;
        self.set_or_remove(keys.model, &config.model).await?;

        if config.persist_key && !config.api_key.is_empty() {
            self.store.set(keys.api_key, &config.api_key).await?;
        } else {
            self.store.remove(keys.api_key).await?;
        }

        tracing::debug!("[SettingsStore] Saved {:?} endpoint: {}", kind, config.base_url);
        Ok(())
    }

    async fn set_or_remove(&self, key: &str, value: &str) -> Result<()> {
        if value.is_empty() {
            self.store.remove(key).await
        } else {
            self.store.set(key, value).await
        }
    }

    /// Loads every persisted template override.
    pub async fn load_template_overrides(&self) -> Result<HashMap<PromptKind, String>> {
        let mut overrides = HashMap::new();
        for kind in PromptKind::iter() {
            let Some(key) = kind.override_key() else {
                continue;
            };
            if let Some(text) = self.get_non_empty(&key).await? {
                overrides.insert(kind, text);
            }
        }
        Ok(overrides)
    }

    /// Persists (`Some`) or resets (`None`) the override for `kind`.
    pub async fn save_template_override(&self, kind: PromptKind, template: Option<&str>) -> Result<()> {
        let key = kind
            .override_key()
            .ok_or_else(|| SlopError::config(format!("Template '{}' cannot be overridden", kind)))?;

        match template.map(str::trim) {
            Some("") => Err(SlopError::validation("Template text must not be empty.")),
            Some(text) => self.store.set(&key, text).await,
            None => self.store.remove(&key).await,
        }
    }

    /// Loads the optimization mode, defaulting to prompts.
    pub async fn load_mode(&self) -> Result<OptimizationMode> {
        let stored = self.store.get(MODE_KEY).await?;
        Ok(stored
            .and_then(|value| OptimizationMode::from_str(&value).ok())
            .unwrap_or_default())
    }

    pub async fn save_mode(&self, mode: OptimizationMode) -> Result<()> {
        self.store.set(MODE_KEY, mode.as_ref()).await
    }
}
