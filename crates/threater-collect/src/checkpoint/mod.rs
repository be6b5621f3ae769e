//! Checkpoint persistence
//!
//! One string value per [`CheckpointKey`]. The store overwrites
//! unconditionally; deciding whether a value is newer is the orchestrator's
//! job.

mod sqlite;

pub use sqlite::SqliteCheckpointStore;

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use threater_common::CheckpointKey;

/// File name of the checkpoint database inside the state directory.
pub const CHECKPOINT_DB_FILE: &str = "checkpoints.db";

/// Trait for checkpoint storage (dependency injection)
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Stored value, or `None` if the key has never been committed
    async fn get(&self, key: &CheckpointKey) -> Result<Option<String>>;

    /// Overwrite the stored value
    async fn set(&self, key: &CheckpointKey, value: &str) -> Result<()>;

    /// Remove the stored value; returns whether one existed
    async fn clear(&self, key: &CheckpointKey) -> Result<bool>;
}

/// Process-local store; values are lost when it is dropped
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    values: Mutex<HashMap<CheckpointKey, String>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with one value
    pub fn with_value(key: CheckpointKey, value: impl Into<String>) -> Self {
        let store = Self::default();
        store.lock().insert(key, value.into());
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CheckpointKey, String>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get(&self, key: &CheckpointKey) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    async fn set(&self, key: &CheckpointKey, value: &str) -> Result<()> {
        self.lock().insert(key.clone(), value.to_string());
        Ok(())
    }

    async fn clear(&self, key: &CheckpointKey) -> Result<bool> {
        Ok(self.lock().remove(key).is_some())
    }
}
