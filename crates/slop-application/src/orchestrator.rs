//! Streaming state machine tying user intents to the completion client,
//! the result history and the session store.
//!
//! # States
//!
//! ```text
//! Idle ──optimize──▶ Streaming(optimize) ──done/cancel/error──▶ Idle
//! Idle ──refine────▶ Streaming(refine)   ──done/cancel/error──▶ Idle
//! Idle ──chat──────▶ Streaming(chat)     ──done/cancel/error──▶ Idle
//! ```
//!
//! Re-invoking optimize or refine while that same kind streams stops it.
//! Optimize and refine exclude each other. A chat stream never blocks them:
//! starting either supersedes the chat. A chat message sent while anything
//! streams is ignored.

use crate::error::{OrchestratorError, Result};
use crate::event::{CANCELLED_REPLY, CHAT_INTRO_NOTICE, CHAT_REFINED_NOTICE, StreamKind, UiEvent};
use crate::throttle::{DEFAULT_RENDER_INTERVAL, RenderThrottle};
use futures::StreamExt;
use slop_core::config::EndpointKind;
use slop_core::prompts::OptimizationMode;
use slop_core::session::{ChatMessage, Session, SessionStore};
use slop_interaction::{CompletionClient, CompletionError, CompletionStream, ModelInfo};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};

const EMPTY_INPUT: &str = "Please enter a prompt to optimize.";
const EMPTY_MESSAGE: &str = "Please enter a message.";
const NEEDS_RESULT: &str = "Please optimize a prompt first.";
const NEEDS_CHAT: &str = "No chat history to include. Please chat first or uncheck 'Include Chat'.";
const NO_RESULT_TO_EDIT: &str = "There is no result to edit.";

/// How a streaming operation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The stream finished; `text` is the full output.
    Completed { text: String },
    /// The stream was cancelled; `partial` is what arrived before that.
    Cancelled { partial: String },
    /// The request failed; the error has already been rendered.
    Failed { error: CompletionError },
    /// The call acted as a stop toggle for the active stream.
    Stopped,
    /// The call was dropped because a stream was active.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Streaming { kind: StreamKind, flight: u64 },
}

enum Entry {
    Started(FlightGuard),
    Stopped,
    Ignored,
}

fn lock_phase(phase: &StdMutex<Phase>) -> MutexGuard<'_, Phase> {
    phase.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the `Streaming` phase for one flight; returns to `Idle` on drop
/// unless a newer flight has taken over.
///
/// Once the loading state is announced, dropping the guard also announces
/// its end, so every exit path (including `?` and a dropped future) resets
/// the UI.
struct FlightGuard {
    phase: Arc<StdMutex<Phase>>,
    flight: u64,
    loading: Option<(StreamKind, mpsc::UnboundedSender<UiEvent>)>,
}

impl FlightGuard {
    fn is_current(&self) -> bool {
        matches!(*lock_phase(&self.phase), Phase::Streaming { flight, .. } if flight == self.flight)
    }

    fn announce_loading(&mut self, kind: StreamKind, events: &mpsc::UnboundedSender<UiEvent>) {
        send_event(events, UiEvent::LoadingChanged { kind, active: true });
        self.loading = Some((kind, events.clone()));
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        {
            let mut phase = lock_phase(&self.phase);
            if matches!(*phase, Phase::Streaming { flight, .. } if flight == self.flight) {
                *phase = Phase::Idle;
            }
        }
        if let Some((kind, events)) = self.loading.take() {
            send_event(&events, UiEvent::LoadingChanged { kind, active: false });
        }
    }
}

fn send_event(events: &mpsc::UnboundedSender<UiEvent>, event: UiEvent) {
    if events.send(event).is_err() {
        tracing::trace!("[Orchestrator] No UI listener for event");
    }
}

/// Coordinates one workspace (the current session) at a time.
///
/// All methods take `&self`; share the orchestrator behind an `Arc` to stop
/// a stream from another task while it runs.
pub struct Orchestrator {
    client: Arc<CompletionClient>,
    sessions: Arc<SessionStore>,
    workspace: Mutex<Session>,
    phase: Arc<StdMutex<Phase>>,
    next_flight: AtomicU64,
    events: mpsc::UnboundedSender<UiEvent>,
    render_interval: Duration,
}

impl Orchestrator {
    /// Creates an orchestrator over the current session, creating one if
    /// the pointer is unset or stale.
    pub async fn load(
        client: Arc<CompletionClient>,
        sessions: Arc<SessionStore>,
        events: mpsc::UnboundedSender<UiEvent>,
    ) -> Result<Self> {
        let session = Self::resolve_current(&sessions).await?;
        let orchestrator = Self {
            client,
            sessions,
            workspace: Mutex::new(session.clone()),
            phase: Arc::new(StdMutex::new(Phase::Idle)),
            next_flight: AtomicU64::new(1),
            events,
            render_interval: DEFAULT_RENDER_INTERVAL,
        };

        let mut workspace = orchestrator.workspace.lock().await;
        orchestrator.apply_session(&mut workspace, session);
        drop(workspace);

        Ok(orchestrator)
    }

    pub fn with_render_interval(mut self, interval: Duration) -> Self {
        self.render_interval = interval;
        self
    }

    pub fn client(&self) -> &Arc<CompletionClient> {
        &self.client
    }

    /// The kind of stream currently running, if any.
    pub fn streaming(&self) -> Option<StreamKind> {
        match *lock_phase(&self.phase) {
            Phase::Idle => None,
            Phase::Streaming { kind, .. } => Some(kind),
        }
    }

    /// A snapshot of the current session including the live transcript.
    pub async fn current_session(&self) -> Session {
        let mut session = self.workspace.lock().await.clone();
        session.chat_history = self.client.transcript();
        session
    }

    // ============================================================================
    // Session lifecycle
    // ============================================================================

    async fn resolve_current(sessions: &SessionStore) -> Result<Session> {
        if let Some(id) = sessions.current_id().await? {
            if let Some(session) = sessions.get(&id).await? {
                return Ok(session);
            }
            tracing::warn!("[Orchestrator] Current session {} no longer exists", id);
        }
        Ok(sessions.create_new().await?)
    }

    fn apply_session(&self, workspace: &mut Session, session: Session) {
        self.client.set_transcript(session.chat_history.clone());
        let history = session.history();
        *workspace = session.clone();

        tracing::info!("[Orchestrator] Loaded session {} ('{}')", session.id, session.name);
        self.emit(UiEvent::SessionLoaded { session: session.clone() });
        if session.chat_history.is_empty() {
            self.emit(UiEvent::ChatReset {
                notice: CHAT_INTRO_NOTICE.to_string(),
            });
        }
        self.emit(UiEvent::OutputRendered {
            text: history.current().unwrap_or_default().to_string(),
        });
        self.emit(UiEvent::HistoryChanged {
            position: history.cursor(),
            len: history.len(),
        });
    }

    fn ensure_idle(&self) -> Result<()> {
        match self.streaming() {
            None => Ok(()),
            Some(_) => Err(OrchestratorError::Busy),
        }
    }

    /// Reloads the current session from the store.
    pub async fn load_current(&self) -> Result<Session> {
        self.ensure_idle()?;
        let session = Self::resolve_current(&self.sessions).await?;
        let mut workspace = self.workspace.lock().await;
        self.apply_session(&mut workspace, session.clone());
        Ok(session)
    }

    /// Creates and switches to a fresh session.
    pub async fn new_session(&self) -> Result<Session> {
        self.ensure_idle()?;
        let session = self.sessions.create_new().await?;
        let mut workspace = self.workspace.lock().await;
        self.apply_session(&mut workspace, session.clone());
        Ok(session)
    }

    pub async fn switch_session(&self, id: &str) -> Result<Session> {
        self.ensure_idle()?;
        let session = self
            .sessions
            .get(id)
            .await?
            .ok_or_else(|| slop_core::SlopError::not_found("Session", id))?;
        self.sessions.set_current_id(id).await?;

        let mut workspace = self.workspace.lock().await;
        self.apply_session(&mut workspace, session.clone());
        Ok(session)
    }

    /// Deletes a session; deleting the current one loads a fresh session.
    pub async fn delete_session(&self, id: &str) -> Result<()> {
        self.ensure_idle()?;
        let mut workspace = self.workspace.lock().await;
        self.sessions.delete(id).await?;

        if workspace.id == id {
            let session = self.sessions.create_new().await?;
            self.apply_session(&mut workspace, session);
        }
        Ok(())
    }

    /// All sessions, most recently updated first.
    pub async fn list_sessions(&self) -> Result<Vec<Session>> {
        Ok(self.sessions.list_all().await?)
    }

    // ============================================================================
    // Workspace edits
    // ============================================================================

    /// Stores the seed text and persists it immediately.
    pub async fn set_prompt_input(&self, text: &str) -> Result<()> {
        let mut workspace = self.workspace.lock().await;
        workspace.prompt_input = text.to_string();
        self.persist(&mut workspace).await
    }

    pub async fn go_prev(&self) -> Result<bool> {
        self.navigate(|history| history.go_prev()).await
    }

    pub async fn go_next(&self) -> Result<bool> {
        self.navigate(|history| history.go_next()).await
    }

    async fn navigate<F>(&self, step: F) -> Result<bool>
    where
        F: FnOnce(&mut slop_core::session::ResultHistory) -> bool,
    {
        let mut workspace = self.workspace.lock().await;
        let mut history = workspace.history();
        if !step(&mut history) {
            return Ok(false);
        }

        self.emit_history(&history);
        workspace.set_history(history);
        self.persist(&mut workspace).await?;
        Ok(true)
    }

    /// Replaces the displayed result in place, e.g. after manual editing.
    pub async fn edit_current_result(&self, text: &str) -> Result<()> {
        let mut workspace = self.workspace.lock().await;
        let mut history = workspace.history();
        if !history.set_current(text) {
            return Err(OrchestratorError::validation(NO_RESULT_TO_EDIT));
        }
        workspace.set_history(history);
        self.persist(&mut workspace).await
    }

    async fn persist(&self, workspace: &mut Session) -> Result<()> {
        workspace.chat_history = self.client.transcript();
        self.sessions.save(workspace).await?;
        Ok(())
    }

    // ============================================================================
    // Streaming operations
    // ============================================================================

    /// Streams an optimized prompt for the current input.
    ///
    /// Clears the chat transcript first. A cancelled stream still commits
    /// whatever text arrived.
    pub async fn optimize(&self, mode: OptimizationMode) -> Result<RunOutcome> {
        let input = self.workspace.lock().await.prompt_input.trim().to_string();
        if input.is_empty() {
            return Err(OrchestratorError::validation(EMPTY_INPUT));
        }

        let guard = match self.begin(StreamKind::Optimize)? {
            Entry::Started(guard) => guard,
            Entry::Stopped => return Ok(RunOutcome::Stopped),
            Entry::Ignored => return Ok(RunOutcome::Ignored),
        };

        // The client call cancels a running chat before the transcript goes.
        let stream = self.client.optimize(&input, mode);
        self.client.clear_transcript();
        self.emit(UiEvent::ChatReset {
            notice: CHAT_INTRO_NOTICE.to_string(),
        });

        self.run_result_stream(guard, StreamKind::Optimize, stream).await
    }

    /// Streams a refined version of the current result.
    ///
    /// With `include_chat` the transcript is sent along and must not be
    /// empty. A successful refine resets the chat.
    pub async fn refine(&self, include_chat: bool, mode: OptimizationMode) -> Result<RunOutcome> {
        let (input, current) = {
            let workspace = self.workspace.lock().await;
            let current = workspace.history().current().map(str::to_string);
            (workspace.prompt_input.trim().to_string(), current)
        };
        let current = match current {
            Some(current) if !input.is_empty() && !current.trim().is_empty() => current,
            _ => return Err(OrchestratorError::validation(NEEDS_RESULT)),
        };
        let transcript = if include_chat {
            let transcript = self.client.transcript();
            if transcript.is_empty() {
                return Err(OrchestratorError::validation(NEEDS_CHAT));
            }
            Some(transcript)
        } else {
            None
        };

        let guard = match self.begin(StreamKind::Refine)? {
            Entry::Started(guard) => guard,
            Entry::Stopped => return Ok(RunOutcome::Stopped),
            Entry::Ignored => return Ok(RunOutcome::Ignored),
        };

        let stream = match transcript {
            Some(transcript) => self.client.refine_with_history(&input, &current, &transcript, mode),
            None => self.client.refine_without_history(&input, &current, mode),
        };

        self.run_result_stream(guard, StreamKind::Refine, stream).await
    }

    async fn run_result_stream(
        &self,
        mut guard: FlightGuard,
        kind: StreamKind,
        stream: CompletionStream,
    ) -> Result<RunOutcome> {
        guard.announce_loading(kind, &self.events);
        self.emit(UiEvent::OutputRendered { text: String::new() });

        let (text, error) = self
            .consume(stream, |text| UiEvent::OutputRendered { text })
            .await;

        let outcome = match error {
            None => {
                let reset_chat = kind == StreamKind::Refine;
                self.commit_result(&text, reset_chat).await?;
                RunOutcome::Completed { text }
            }
            Some(CompletionError::Aborted) => {
                if !text.is_empty() {
                    self.commit_result(&text, false).await?;
                }
                tracing::info!("[Orchestrator] {} cancelled after {} bytes", kind, text.len());
                RunOutcome::Cancelled { partial: text }
            }
            Some(error) => {
                let message = match kind {
                    StreamKind::Refine => format!("Refinement Error: {}", error),
                    _ => format!(
                        "Error: {}\n\nPlease check your API settings and ensure the local LLM is running.",
                        error
                    ),
                };
                tracing::warn!("[Orchestrator] {} failed: {}", kind, error);
                self.emit(UiEvent::OutputRendered { text: message.clone() });
                self.emit(UiEvent::Error { kind, message });
                RunOutcome::Failed { error }
            }
        };

        drop(guard);
        Ok(outcome)
    }

    async fn commit_result(&self, text: &str, reset_chat: bool) -> Result<()> {
        let mut workspace = self.workspace.lock().await;
        let mut history = workspace.history();
        history.append(text);
        self.emit_history(&history);
        workspace.set_history(history);

        if reset_chat {
            self.client.clear_transcript();
            self.emit(UiEvent::ChatReset {
                notice: CHAT_REFINED_NOTICE.to_string(),
            });
        }

        self.persist(&mut workspace).await
    }

    /// Sends a chat message about the current result.
    ///
    /// Ignored while any stream is active. A cancelled reply keeps its
    /// partial text as the assistant message.
    pub async fn send_chat(&self, message: &str) -> Result<RunOutcome> {
        let message = message.trim();
        if message.is_empty() {
            return Err(OrchestratorError::validation(EMPTY_MESSAGE));
        }

        let mut guard = match self.begin(StreamKind::Chat)? {
            Entry::Started(guard) => guard,
            Entry::Stopped => return Ok(RunOutcome::Stopped),
            Entry::Ignored => return Ok(RunOutcome::Ignored),
        };

        let (input, latest) = {
            let workspace = self.workspace.lock().await;
            let latest = workspace.history().current().map(str::to_string);
            (workspace.prompt_input.trim().to_string(), latest)
        };

        self.emit(UiEvent::ChatMessageAdded {
            message: ChatMessage::user(message),
        });
        let stream = self.client.chat(message, Some(&input), latest.as_deref());
        guard.announce_loading(StreamKind::Chat, &self.events);

        let (text, error) = self.consume(stream, |text| UiEvent::ChatProgress { text }).await;

        let outcome = match error {
            None => {
                let saved = self.save_workspace().await;
                self.emit(UiEvent::ChatReplyFinished {
                    text: text.clone(),
                    cancelled: false,
                });
                saved?;
                RunOutcome::Completed { text }
            }
            Some(CompletionError::Aborted) => {
                // A superseding optimize/refine owns the transcript now.
                let saved = if guard.is_current() {
                    if !text.is_empty() {
                        self.client.push_assistant(text.clone());
                    }
                    self.save_workspace().await
                } else {
                    Ok(())
                };
                let shown = if text.is_empty() { CANCELLED_REPLY.to_string() } else { text.clone() };
                self.emit(UiEvent::ChatReplyFinished {
                    text: shown,
                    cancelled: true,
                });
                saved?;
                RunOutcome::Cancelled { partial: text }
            }
            Some(error) => {
                tracing::warn!("[Orchestrator] chat failed: {}", error);
                let saved = self.save_workspace().await;
                self.emit(UiEvent::Error {
                    kind: StreamKind::Chat,
                    message: format!("Error: {}", error),
                });
                saved?;
                RunOutcome::Failed { error }
            }
        };

        drop(guard);
        Ok(outcome)
    }

    async fn save_workspace(&self) -> Result<()> {
        let mut workspace = self.workspace.lock().await;
        self.persist(&mut workspace).await
    }

    /// Stops a running chat reply. Returns `false` when no chat streams.
    pub fn stop_chat(&self) -> bool {
        if self.streaming() == Some(StreamKind::Chat) {
            self.client.cancel();
            return true;
        }
        false
    }

    /// Stops whatever stream is running. Returns `false` when idle.
    pub fn stop(&self) -> bool {
        if self.streaming().is_some() {
            self.client.cancel();
            return true;
        }
        false
    }

    /// Lists models of the primary or the effective chat endpoint.
    pub async fn list_models(&self, kind: EndpointKind) -> Result<Vec<ModelInfo>> {
        let config = self.client.config();
        let endpoint = match kind {
            EndpointKind::Primary => config.primary,
            EndpointKind::Chat => config.chat_endpoint(),
        };
        Ok(self.client.list_models(Some(&endpoint)).await?)
    }

    // ============================================================================
    // Internals
    // ============================================================================

    fn begin(&self, kind: StreamKind) -> Result<Entry> {
        let mut phase = lock_phase(&self.phase);
        match (*phase, kind) {
            (Phase::Streaming { .. }, StreamKind::Chat) => {
                tracing::debug!("[Orchestrator] Ignoring chat message while streaming");
                Ok(Entry::Ignored)
            }
            (Phase::Streaming { kind: active, .. }, _) if active == kind => {
                tracing::info!("[Orchestrator] Stop requested for {}", kind);
                self.client.cancel();
                Ok(Entry::Stopped)
            }
            (Phase::Streaming { kind: StreamKind::Optimize | StreamKind::Refine, .. }, _) => {
                Err(OrchestratorError::Busy)
            }
            // Idle, or a chat that the new request supersedes.
            _ => {
                let flight = self.next_flight.fetch_add(1, Ordering::Relaxed);
                *phase = Phase::Streaming { kind, flight };
                Ok(Entry::Started(FlightGuard {
                    phase: Arc::clone(&self.phase),
                    flight,
                    loading: None,
                }))
            }
        }
    }

    /// Drains `stream`, rendering through `render` at most once per interval
    /// and once more when the stream ends.
    async fn consume<F>(&self, mut stream: CompletionStream, render: F) -> (String, Option<CompletionError>)
    where
        F: Fn(String) -> UiEvent,
    {
        let mut text = String::new();
        let mut error = None;
        let mut throttle = RenderThrottle::new(self.render_interval);

        loop {
            tokio::select! {
                item = stream.next() => match item {
                    Some(Ok(delta)) => {
                        text.push_str(&delta);
                        throttle.mark_dirty();
                    }
                    Some(Err(e)) => {
                        error = Some(e);
                        break;
                    }
                    None => break,
                },
                _ = throttle.due(), if throttle.is_pending() => {
                    throttle.rendered();
                    self.emit(render(text.clone()));
                }
            }
        }

        if throttle.flush() {
            self.emit(render(text.clone()));
        }
        (text, error)
    }

    fn emit_history(&self, history: &slop_core::session::ResultHistory) {
        self.emit(UiEvent::OutputRendered {
            text: history.current().unwrap_or_default().to_string(),
        });
        self.emit(UiEvent::HistoryChanged {
            position: history.cursor(),
            len: history.len(),
        });
    }

    fn emit(&self, event: UiEvent) {
        send_event(&self.events, event);
    }
}
