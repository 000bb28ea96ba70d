//! Completion client for OpenAI-compatible chat-completions endpoints.

use crate::error::CompletionError;
use crate::sse::SseDecoder;
use crate::stream::CompletionStream;
use crate::transport::{HttpMethod, HttpTransport, TransportRequest};
use serde::{Deserialize, Serialize};
use slop_core::config::{ClientConfig, EndpointConfig, EndpointKind, SettingsStore};
use slop_core::error::{Result as CoreResult, SlopError};
use slop_core::prompts::{OptimizationMode, PromptKind, SkillTemplates, StandardTemplates, TemplateProvider};
use slop_core::session::{ChatMessage, Role};
use slop_core::template::render;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const TEMPERATURE: f64 = 0.7;

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    stream: bool,
}

#[derive(Deserialize)]
struct ModelListResponse {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

/// One entry of `GET /models`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    #[serde(default)]
    pub id: String,
    /// Provider-specific fields, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone)]
struct Flight {
    id: u64,
    token: CancellationToken,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Streams completions and owns the in-memory chat transcript.
///
/// At most one streaming request is outstanding per client: every streaming
/// call cancels the previous one before it starts. Streaming calls spawn
/// their producer on the current tokio runtime.
pub struct CompletionClient {
    transport: Arc<dyn HttpTransport>,
    config: RwLock<ClientConfig>,
    templates: RwLock<StandardTemplates>,
    skill_templates: SkillTemplates,
    settings: Option<SettingsStore>,
    transcript: Arc<Mutex<Vec<ChatMessage>>>,
    in_flight: Arc<Mutex<Option<Flight>>>,
    next_flight: AtomicU64,
}

impl CompletionClient {
    /// Creates a client with built-in templates and no persistence.
    pub fn new(transport: Arc<dyn HttpTransport>, config: ClientConfig) -> Self {
        Self {
            transport,
            config: RwLock::new(config),
            templates: RwLock::new(StandardTemplates::new()),
            skill_templates: SkillTemplates::new(),
            settings: None,
            transcript: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(Mutex::new(None)),
            next_flight: AtomicU64::new(1),
        }
    }

    /// Creates a client from persisted settings.
    ///
    /// Endpoint changes and template overrides made later through this
    /// client are written back to `settings`.
    pub async fn load(transport: Arc<dyn HttpTransport>, settings: SettingsStore) -> CoreResult<Self> {
        let config = settings.load_client_config().await?;
        let overrides = settings.load_template_overrides().await?;
        tracing::debug!(
            "[CompletionClient] Loaded config for {} ({} template overrides)",
            config.primary.base_url,
            overrides.len()
        );

        let mut client = Self::new(transport, config);
        client.templates = RwLock::new(StandardTemplates::with_overrides(overrides));
        client.settings = Some(settings);
        Ok(client)
    }

    // ============================================================================
    // Configuration
    // ============================================================================

    pub fn config(&self) -> ClientConfig {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replaces one endpoint configuration and persists it.
    ///
    /// The primary endpoint requires a base URL and a model. The API key is
    /// only persisted when `persist_key` is set.
    pub async fn update_config(&self, kind: EndpointKind, endpoint: EndpointConfig) -> CoreResult<()> {
        let endpoint = EndpointConfig {
            base_url: slop_core::config::normalize_base_url(&endpoint.base_url),
            ..endpoint
        };

        if kind == EndpointKind::Primary && (endpoint.base_url.is_empty() || endpoint.model.is_empty()) {
            return Err(SlopError::validation("API URL and Model Name are required."));
        }

        if let Some(settings) = &self.settings {
            settings.save_endpoint(kind, &endpoint).await?;
        }

        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        match kind {
            EndpointKind::Primary => config.primary = endpoint,
            EndpointKind::Chat => config.chat = endpoint,
        }
        tracing::info!("[CompletionClient] Updated {:?} endpoint", kind);
        Ok(())
    }

    /// Sets (`Some`) or resets (`None`) a standard template override.
    pub async fn set_template_override(&self, kind: PromptKind, template: Option<String>) -> CoreResult<()> {
        if let Some(settings) = &self.settings {
            settings.save_template_override(kind, template.as_deref()).await?;
        } else if template.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(SlopError::validation("Template text must not be empty."));
        }

        self.templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set_override(kind, template.map(|t| t.trim().to_string()));
        Ok(())
    }

    /// Returns the template text `mode` would use for `kind`.
    pub fn template(&self, mode: OptimizationMode, kind: PromptKind) -> String {
        match mode {
            OptimizationMode::Prompts => self
                .templates
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .template(kind),
            OptimizationMode::Skills => self.skill_templates.template(kind),
        }
    }

    pub fn is_template_overridden(&self, kind: PromptKind) -> bool {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_overridden(kind)
    }

    // ============================================================================
    // Transcript
    // ============================================================================

    pub fn transcript(&self) -> Vec<ChatMessage> {
        lock(&self.transcript).clone()
    }

    pub fn set_transcript(&self, messages: Vec<ChatMessage>) {
        *lock(&self.transcript) = messages;
    }

    pub fn clear_transcript(&self) {
        lock(&self.transcript).clear();
    }

    /// Appends an assistant reply, e.g. the partial text of a cancelled chat.
    pub fn push_assistant(&self, content: impl Into<String>) {
        lock(&self.transcript).push(ChatMessage::assistant(content));
    }

    // ============================================================================
    // Streaming operations
    // ============================================================================

    /// Streams a prompt built from the optimize template for `mode`.
    pub fn optimize(&self, user_text: &str, mode: OptimizationMode) -> CompletionStream {
        let template = self.template(mode, PromptKind::Optimize);
        let payload = render(
            Some(&template),
            &HashMap::from([("originalPrompt", Some(user_text))]),
            "",
        );

        let flight = self.begin_flight();
        let primary = self.config().primary;
        self.launch(flight, "optimize", primary, vec![ChatMessage::user(payload)], false)
    }

    /// Sends `user_message` with the transcript as context.
    ///
    /// The message is appended to the transcript immediately. The context
    /// block is assembled into a working copy only; the stored transcript
    /// never contains it. When the stream finishes normally the full reply
    /// is appended to the transcript before the stream ends.
    pub fn chat(
        &self,
        user_message: &str,
        original_prompt: Option<&str>,
        latest_result: Option<&str>,
    ) -> CompletionStream {
        let flight = self.begin_flight();

        let working = {
            let mut transcript = lock(&self.transcript);
            transcript.push(ChatMessage::user(user_message));
            transcript.clone()
        };

        fn non_empty(s: Option<&str>) -> Option<&str> {
            s.filter(|s| !s.trim().is_empty())
        }
        let context = match (non_empty(original_prompt), non_empty(latest_result)) {
            (Some(prompt), Some(result)) => render(
                Some(&self.template(OptimizationMode::Prompts, PromptKind::Chat)),
                &HashMap::from([("originalPrompt", Some(prompt)), ("optimizedResult", Some(result))]),
                "",
            ),
            _ => self.template(OptimizationMode::Prompts, PromptKind::ChatFallback),
        };

        let messages = assemble_chat_messages(working, &context);
        let endpoint = self.config().chat_endpoint();
        self.launch(flight, "chat", endpoint, messages, true)
    }

    /// Refines `current_result` using a flattened chat transcript.
    ///
    /// Sent as a single system-role message. The transcript is not touched.
    pub fn refine_with_history(
        &self,
        original_prompt: &str,
        current_result: &str,
        history: &[ChatMessage],
        mode: OptimizationMode,
    ) -> CompletionStream {
        let flattened = history
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");

        let template = self.template(mode, PromptKind::Refine);
        let payload = render(
            Some(&template),
            &HashMap::from([
                ("originalPrompt", Some(original_prompt)),
                ("currentResult", Some(current_result)),
                ("chatHistory", Some(flattened.as_str())),
            ]),
            "",
        );

        let flight = self.begin_flight();
        let primary = self.config().primary;
        self.launch(flight, "refine", primary, vec![ChatMessage::system(payload)], false)
    }

    /// Refines `current_result` against the original idea only.
    ///
    /// Sent as a single user-role message.
    pub fn refine_without_history(
        &self,
        original_prompt: &str,
        current_result: &str,
        mode: OptimizationMode,
    ) -> CompletionStream {
        let template = self.template(mode, PromptKind::RefineNoChat);
        let payload = render(
            Some(&template),
            &HashMap::from([
                ("originalPrompt", Some(original_prompt)),
                ("currentResult", Some(current_result)),
            ]),
            "",
        );

        let flight = self.begin_flight();
        let primary = self.config().primary;
        self.launch(flight, "refine", primary, vec![ChatMessage::user(payload)], false)
    }

    /// Aborts the in-flight streaming request, if any. Idempotent.
    pub fn cancel(&self) {
        if let Some(flight) = lock(&self.in_flight).take() {
            tracing::info!("[CompletionClient] Cancelling request #{}", flight.id);
            flight.token.cancel();
        }
    }

    pub fn is_streaming(&self) -> bool {
        lock(&self.in_flight).is_some()
    }

    /// Lists models from `endpoint`, or from the primary endpoint when `None`.
    ///
    /// # Returns
    ///
    /// - `Ok(models)`: The `data` array of the response, empty when absent
    /// - `Err(CompletionError::Http)`: Non-2xx status, with the body text
    /// - `Err(_)`: Network failure or unparsable body
    pub async fn list_models(&self, endpoint: Option<&EndpointConfig>) -> Result<Vec<ModelInfo>, CompletionError> {
        let endpoint = match endpoint {
            Some(endpoint) => endpoint.clone(),
            None => self.config().primary,
        };

        let request = TransportRequest {
            method: HttpMethod::Get,
            url: endpoint.url_for("models"),
            bearer: endpoint.api_key().map(str::to_string),
            body: None,
        };

        let response = self.transport.send(request).await?;
        let status = response.status;
        let success = response.is_success();
        let body = response.text().await?;

        if !success {
            tracing::warn!("[CompletionClient] Failed to fetch models: {}", status);
            return Err(CompletionError::http(status, body));
        }

        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        let parsed: ModelListResponse = serde_json::from_str(&body)
            .map_err(|e| CompletionError::InvalidResponse(format!("Failed to parse model list: {}", e)))?;
        Ok(parsed.data)
    }

    // ============================================================================
    // Single-flight plumbing
    // ============================================================================

    fn begin_flight(&self) -> Flight {
        let flight = Flight {
            id: self.next_flight.fetch_add(1, Ordering::Relaxed),
            token: CancellationToken::new(),
        };

        if let Some(previous) = lock(&self.in_flight).replace(flight.clone()) {
            tracing::info!(
                "[CompletionClient] Request #{} supersedes #{}",
                flight.id,
                previous.id
            );
            previous.token.cancel();
        }

        flight
    }

    fn launch(
        &self,
        flight: Flight,
        label: &'static str,
        endpoint: EndpointConfig,
        messages: Vec<ChatMessage>,
        record_reply: bool,
    ) -> CompletionStream {
        let body = ChatCompletionRequest {
            model: &endpoint.model,
            messages: &messages,
            temperature: TEMPERATURE,
            stream: true,
        };
        let body = match serde_json::to_value(&body) {
            Ok(body) => body,
            Err(e) => {
                clear_flight(&self.in_flight, flight.id);
                return CompletionStream::failed(CompletionError::InvalidResponse(format!(
                    "Failed to encode request: {}",
                    e
                )));
            }
        };

        let request = TransportRequest {
            method: HttpMethod::Post,
            url: endpoint.url_for("chat/completions"),
            bearer: endpoint.api_key().map(str::to_string),
            body: Some(body),
        };

        tracing::debug!(
            "[CompletionClient] #{} {} -> {} ({} messages)",
            flight.id,
            label,
            request.url,
            messages.len()
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::clone(&self.transport);
        let in_flight = Arc::clone(&self.in_flight);
        let transcript = record_reply.then(|| Arc::clone(&self.transcript));
        let token = flight.token.clone();
        let id = flight.id;

        tokio::spawn(async move {
            let mut text = String::new();
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => Err(CompletionError::Aborted),
                result = pump(transport.as_ref(), request, &tx, &mut text) => result,
            };

            match outcome {
                Ok(()) => {
                    if let Some(transcript) = transcript {
                        let mut transcript = lock(&transcript);
                        if !token.is_cancelled() {
                            transcript.push(ChatMessage::assistant(text));
                        }
                    }
                    tracing::debug!("[CompletionClient] #{} {} finished", id, label);
                }
                Err(e) => {
                    if e.is_aborted() {
                        tracing::info!("[CompletionClient] #{} {} aborted", id, label);
                    } else {
                        tracing::warn!("[CompletionClient] #{} {} failed: {}", id, label, e);
                    }
                    let _ = tx.send(Err(e));
                }
            }

            clear_flight(&in_flight, id);
        });

        CompletionStream::new(rx, flight.token)
    }
}

/// Sends the request and forwards every delta to `tx`.
async fn pump(
    transport: &dyn HttpTransport,
    request: TransportRequest,
    tx: &mpsc::UnboundedSender<Result<String, CompletionError>>,
    text: &mut String,
) -> Result<(), CompletionError> {
    let response = transport.send(request).await?;
    if !response.is_success() {
        let status = response.status;
        let body = response.text().await?;
        return Err(CompletionError::http(status, body));
    }

    let mut decoder = SseDecoder::new(response.body);
    while let Some(delta) = decoder.next_delta().await? {
        text.push_str(&delta);
        if tx.send(Ok(delta)).is_err() {
            // Consumer went away.
            return Err(CompletionError::Aborted);
        }
    }
    Ok(())
}

fn clear_flight(in_flight: &Mutex<Option<Flight>>, id: u64) {
    let mut slot = lock(in_flight);
    if slot.as_ref().is_some_and(|flight| flight.id == id) {
        *slot = None;
    }
}

/// Builds the message list actually sent for a chat turn.
///
/// `context` is prefixed onto the first user message (or inserted as a new
/// leading user message), system messages are dropped and adjacent user
/// messages are merged with a blank line between them.
pub fn assemble_chat_messages(history: Vec<ChatMessage>, context: &str) -> Vec<ChatMessage> {
    let mut working = history;
    match working.iter_mut().find(|m| m.role == Role::User) {
        Some(first) => first.content = format!("{}\n\n{}", context, first.content),
        None => working.insert(0, ChatMessage::user(context)),
    }

    let mut merged: Vec<ChatMessage> = Vec::with_capacity(working.len());
    for message in working.into_iter().filter(|m| m.role != Role::System) {
        match merged.last_mut() {
            Some(last) if last.role == Role::User && message.role == Role::User => {
                last.content.push_str("\n\n");
                last.content.push_str(&message.content);
            }
            _ => merged.push(message),
        }
    }
    merged
}
