//! Durable storage for machine records.
//!
//! The core treats a record as an opaque byte blob keyed by [`MachineId`]. It
//! serializes into it and deserializes out of it, and never retries: retry
//! policy, if any, belongs to the store implementation.

use crate::config::CoreConfig;
use async_trait::async_trait;
use berth_plugin::MachineId;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors raised by a durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error from a file-backed store
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No record exists for the machine
    #[error("no stored record for machine {0}")]
    NotFound(MachineId),

    /// The backing store refused the operation
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence collaborator for machine records.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Persist the serialized record for `id`, replacing any previous one.
    async fn save(&self, id: MachineId, record: Vec<u8>) -> Result<(), StoreError>;

    /// Load the serialized record for `id`, if one was saved.
    async fn load(&self, id: MachineId) -> Result<Option<Vec<u8>>, StoreError>;
}

/// In-process store, mainly for tests and ephemeral projects.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<MachineId, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn save(&self, id: MachineId, record: Vec<u8>) -> Result<(), StoreError> {
        self.records.write().await.insert(id, record);
        Ok(())
    }

    async fn load(&self, id: MachineId) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }
}

/// Store that keeps one file per machine under a directory.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// crash mid-write never leaves a truncated record behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at the configured `state_dir`.
    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(config.state_dir.clone())
    }

    /// Directory records are kept in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: MachineId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn save(&self, id: MachineId, record: Vec<u8>) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.record_path(id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &record).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::trace!(machine = %id, path = %path.display(), "Record written");
        Ok(())
    }

    async fn load(&self, id: MachineId) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio::fs::read(self.record_path(id)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
