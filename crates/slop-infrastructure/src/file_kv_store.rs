//! TOML-file implementation of the key-value persistence port.

use crate::storage::AtomicTomlFile;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use slop_core::error::{Result, SlopError};
use slop_core::storage::KeyValueStore;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// On-disk layout of the store file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

/// A durable [`KeyValueStore`] backed by one TOML file.
///
/// Every `set`/`remove` is a locked read-modify-write followed by an atomic
/// rename, so the file is durable when the call returns.
#[derive(Clone)]
pub struct FileKeyValueStore {
    file: Arc<AtomicTomlFile<StoreDocument>>,
}

impl FileKeyValueStore {
    /// Opens the store at `path`, creating parent directories as needed.
    ///
    /// The existing file is parsed once so a corrupt or unreadable store is
    /// reported here rather than on first use.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            file: Arc::new(AtomicTomlFile::new(path.into())),
        };

        let entries = store.run(|file| Ok(file.load()?.entries.len())).await?;
        tracing::info!(
            "[FileKeyValueStore] Opened {} ({} entries)",
            store.path().display(),
            entries
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    async fn run<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&AtomicTomlFile<StoreDocument>) -> Result<R> + Send + 'static,
    {
        let file = Arc::clone(&self.file);
        tokio::task::spawn_blocking(move || f(&file))
            .await
            .map_err(|e| SlopError::internal(format!("Store task failed: {}", e)))?
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.run(move |file| Ok(file.load()?.entries.remove(&key))).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.run(move |file| {
            file.update(|doc| {
                let changed = doc.entries.get(&key) != Some(&value);
                if changed {
                    doc.entries.insert(key, value);
                }
                (changed, ())
            })
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.run(move |file| file.update(|doc| (doc.entries.remove(&key).is_some(), ())))
            .await
    }
}
