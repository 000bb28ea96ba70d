#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use slop_application::{Orchestrator, UiEvent};
use slop_core::config::{ClientConfig, EndpointConfig};
use slop_core::session::SessionStore;
use slop_core::SlopError;
use slop_core::storage::{InMemoryKeyValueStore, KeyValueStore};
use slop_interaction::{CompletionClient, CompletionError, HttpTransport, TransportRequest, TransportResponse};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

struct Scripted {
    status: u16,
    chunks: Vec<String>,
    hold_open: bool,
}

/// Answers requests from a queue; unscripted requests get an empty stream.
#[derive(Default)]
pub struct ScriptedTransport {
    requests: Mutex<Vec<TransportRequest>>,
    responses: Mutex<VecDeque<Scripted>>,
}

impl ScriptedTransport {
    /// Queues a finished SSE stream carrying `parts` as separate frames.
    pub fn push_stream(&self, parts: &[&str]) {
        let mut chunks: Vec<String> = parts.iter().map(|p| frame(p)).collect();
        chunks.push("data: [DONE]\n\n".to_string());
        self.push(200, chunks, false);
    }

    /// Queues a stream that sends `parts` and then stays open.
    pub fn push_open_stream(&self, parts: &[&str]) {
        self.push(200, parts.iter().map(|p| frame(p)).collect(), true);
    }

    pub fn push_error(&self, status: u16, body: &str) {
        self.push(status, vec![body.to_string()], false);
    }

    fn push(&self, status: u16, chunks: Vec<String>, hold_open: bool) {
        self.responses.lock().unwrap().push_back(Scripted {
            status,
            chunks,
            hold_open,
        });
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> TransportRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, CompletionError> {
        self.requests.lock().unwrap().push(request);
        let scripted = self.responses.lock().unwrap().pop_front().unwrap_or(Scripted {
            status: 200,
            chunks: vec!["data: [DONE]\n\n".to_string()],
            hold_open: false,
        });

        let chunks = stream::iter(
            scripted
                .chunks
                .into_iter()
                .map(|c| Ok::<_, CompletionError>(c.into_bytes())),
        );
        let body = if scripted.hold_open {
            chunks.chain(stream::pending()).boxed()
        } else {
            chunks.boxed()
        };

        Ok(TransportResponse {
            status: scripted.status,
            body,
        })
    }
}

/// In-memory store whose writes can be switched to fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryKeyValueStore,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> slop_core::error::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SlopError::data_access("disk full"));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> slop_core::error::Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> slop_core::error::Result<()> {
        self.check()?;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> slop_core::error::Result<()> {
        self.check()?;
        self.inner.remove(key).await
    }
}

pub fn frame(content: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({"choices": [{"delta": {"content": content}}]})
    )
}

pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub transport: Arc<ScriptedTransport>,
    pub sessions: Arc<SessionStore>,
    pub store: Arc<FlakyStore>,
    pub events: mpsc::UnboundedReceiver<UiEvent>,
}

impl Harness {
    pub async fn new() -> Self {
        let transport = Arc::new(ScriptedTransport::default());
        let config = ClientConfig::with_primary(EndpointConfig::new("http://localhost:1234/v1", "local-model", ""));
        let client = Arc::new(CompletionClient::new(transport.clone(), config));
        let store = Arc::new(FlakyStore::default());
        let sessions = Arc::new(SessionStore::new(store.clone()));
        let (tx, events) = mpsc::unbounded_channel();

        let orchestrator = Orchestrator::load(client, sessions.clone(), tx)
            .await
            .unwrap()
            .with_render_interval(Duration::from_millis(5));

        Self {
            orchestrator: Arc::new(orchestrator),
            transport,
            sessions,
            store,
            events,
        }
    }

    /// Waits until an event matching `predicate` arrives.
    pub async fn wait_for<F>(&mut self, predicate: F) -> UiEvent
    where
        F: Fn(&UiEvent) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let event = self.events.recv().await.expect("event channel closed");
                if predicate(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    /// Returns every event received so far.
    pub fn drain_events(&mut self) -> Vec<UiEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// The current session as persisted in the store.
    pub async fn stored_session(&self) -> slop_core::session::Session {
        let id = self.sessions.current_id().await.unwrap().unwrap();
        self.sessions.get(&id).await.unwrap().unwrap()
    }
}
