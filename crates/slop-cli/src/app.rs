//! Composition root: wires the store, the completion client and sessions.

use crate::StoreArgs;
use anyhow::Result;
use colored::Colorize;
use slop_application::{Orchestrator, UiEvent};
use slop_core::config::SettingsStore;
use slop_core::session::SessionStore;
use slop_core::storage::{InMemoryKeyValueStore, KeyValueStore};
use slop_infrastructure::{FileKeyValueStore, SlopPaths};
use slop_interaction::{CompletionClient, ReqwestTransport};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared services for every command.
pub struct App {
    pub settings: SettingsStore,
    pub client: Arc<CompletionClient>,
    pub sessions: Arc<SessionStore>,
}

impl App {
    pub async fn open(args: &StoreArgs) -> Result<Self> {
        let store = open_store(args).await;
        let settings = SettingsStore::new(Arc::clone(&store));

        let transport = Arc::new(ReqwestTransport::with_connect_timeout(CONNECT_TIMEOUT)?);
        let client = Arc::new(CompletionClient::load(transport, settings.clone()).await?);
        let sessions = Arc::new(SessionStore::new(store));

        Ok(Self {
            settings,
            client,
            sessions,
        })
    }

    /// Creates an orchestrator over the current session and its event feed.
    pub async fn orchestrator(&self) -> Result<(Arc<Orchestrator>, mpsc::UnboundedReceiver<UiEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let orchestrator = Orchestrator::load(Arc::clone(&self.client), Arc::clone(&self.sessions), tx).await?;
        Ok((Arc::new(orchestrator), rx))
    }
}

/// Opens the configured store, falling back to memory when the file store
/// cannot be used.
async fn open_store(args: &StoreArgs) -> Arc<dyn KeyValueStore> {
    if args.memory {
        tracing::debug!("[App] Using in-memory store");
        return Arc::new(InMemoryKeyValueStore::new());
    }

    let opened = match store_path(args) {
        Ok(path) => FileKeyValueStore::open(path).await,
        Err(e) => Err(e),
    };

    match opened {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::warn!("[App] Persistent store unavailable: {}", e);
            eprintln!(
                "{}",
                format!("Storage unavailable ({}). Sessions will not be kept after exit.", e).yellow()
            );
            Arc::new(InMemoryKeyValueStore::new())
        }
    }
}

fn store_path(args: &StoreArgs) -> slop_core::error::Result<PathBuf> {
    match &args.store {
        Some(path) => Ok(path.clone()),
        None => SlopPaths::store_file(),
    }
}
