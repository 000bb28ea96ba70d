//! Session persistence over a key-value store.

use super::model::Session;
use crate::error::{Result, SlopError};
use crate::storage::KeyValueStore;
use rand::RngCore;
use rand::rngs::OsRng;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

const SESSIONS_KEY: &str = "slop_sessions";
const CURRENT_SESSION_KEY: &str = "slop_current_session_id";

/// Upsert/query logic for sessions.
///
/// All sessions live in one JSON object (session id → record) stored under a
/// single key; the current-session pointer is a separate scalar. Saves are
/// full-record overwrites with last-write-wins semantics. Within one process,
/// read-modify-write cycles are serialized by an internal lock.
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    async fn load_all(&self) -> Result<BTreeMap<String, Session>> {
        match self.store.get(SESSIONS_KEY).await? {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(BTreeMap::new()),
        }
    }

    async fn write_all(&self, sessions: &BTreeMap<String, Session>) -> Result<()> {
        let raw = serde_json::to_string(sessions)?;
        self.store.set(SESSIONS_KEY, &raw).await
    }

    /// Creates, persists and selects a new empty session.
    pub async fn create_new(&self) -> Result<Session> {
        let _guard = self.write_lock.lock().await;
        let mut sessions = self.load_all().await?;

        let mut id = generate_id();
        while sessions.contains_key(&id) {
            id = generate_id();
        }

        let session = Session::new(id.clone(), now_ms());
        sessions.insert(id.clone(), session.clone());
        self.write_all(&sessions).await?;
        self.store.set(CURRENT_SESSION_KEY, &id).await?;

        tracing::info!("[SessionStore] Created session {}", id);
        Ok(session)
    }

    /// Finds a session by its ID.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Session))`: Session found
    /// - `Ok(None)`: Session not found
    /// - `Err(_)`: The store could not be read or the record is corrupt
    pub async fn get(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.load_all().await?.remove(id))
    }

    /// Upserts `session`.
    ///
    /// Refreshes `updated` and, while the name is still default, derives the
    /// name from the prompt input.
    pub async fn save(&self, session: &mut Session) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut sessions = self.load_all().await?;

        session.updated = now_ms().max(session.updated);
        session.derive_name();

        sessions.insert(session.id.clone(), session.clone());
        self.write_all(&sessions).await?;

        tracing::debug!("[SessionStore] Saved session {} ('{}')", session.id, session.name);
        Ok(())
    }

    /// Deletes a session, clearing the current pointer if it referenced it.
    ///
    /// Deleting an unknown id is not an error.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut sessions = self.load_all().await?;
        if sessions.remove(id).is_some() {
            self.write_all(&sessions).await?;
        }

        if self.current_id().await?.as_deref() == Some(id) {
            self.store.remove(CURRENT_SESSION_KEY).await?;
        }

        tracing::info!("[SessionStore] Deleted session {}", id);
        Ok(())
    }

    /// Lists all sessions, most recently updated first.
    pub async fn list_all(&self) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = self.load_all().await?.into_values().collect();
        sessions.sort_by(|a, b| b.updated.cmp(&a.updated));
        Ok(sessions)
    }

    /// Gets the ID of the currently active session.
    pub async fn current_id(&self) -> Result<Option<String>> {
        Ok(self.store.get(CURRENT_SESSION_KEY).await?.filter(|id| !id.is_empty()))
    }

    /// Sets the currently active session.
    ///
    /// Fails with `NotFound` when no session with `id` exists.
    pub async fn set_current_id(&self, id: &str) -> Result<()> {
        if !self.load_all().await?.contains_key(id) {
            return Err(SlopError::not_found("Session", id));
        }
        self.store.set(CURRENT_SESSION_KEY, id).await
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Builds `{millis base36}-{random u32 base36}` with OS entropy.
fn generate_id() -> String {
    let millis = u64::try_from(now_ms()).unwrap_or_default();
    format!("{}-{}", to_base36(millis), to_base36(u64::from(OsRng.next_u32())))
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
