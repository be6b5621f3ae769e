//! SQLite checkpoint store

use super::{CheckpointStore, CHECKPOINT_DB_FILE};
use crate::error::{CollectError, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use threater_common::CheckpointKey;
use tracing::debug;

/// Stored row with its last update time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCheckpoint {
    pub connector: String,
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

/// One row per `(connector, key)` in `<state_dir>/checkpoints.db`
pub struct SqliteCheckpointStore {
    db: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteCheckpointStore {
    /// Open (creating if needed) the database inside `state_dir`.
    pub fn open(state_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_dir).map_err(|e| {
            CollectError::checkpoint(format!(
                "cannot create state directory '{}': {}",
                state_dir.display(),
                e
            ))
        })?;

        let path = state_dir.join(CHECKPOINT_DB_FILE);
        let conn = Connection::open(&path).map_err(|e| {
            CollectError::checkpoint(format!("cannot open '{}': {}", path.display(), e))
        })?;
        init_schema(&conn)?;
        debug!(path = %path.display(), "checkpoint store opened");

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            path: Some(path),
        })
    }

    /// Create an in-memory store (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CollectError::checkpoint(format!("cannot create in-memory database: {}", e)))?;
        init_schema(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Full row including `updated_at`, for operator display.
    pub fn stored(&self, key: &CheckpointKey) -> Result<Option<StoredCheckpoint>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT connector, key, value, updated_at FROM checkpoints
                 WHERE connector = ?1 AND key = ?2",
                params![key.connector, key.key],
                |row| {
                    Ok(StoredCheckpoint {
                        connector: row.get(0)?,
                        key: row.get(1)?,
                        value: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(|e| CollectError::checkpoint(format!("cannot read {}: {}", key, e)))?;
        Ok(row)
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|e| CollectError::checkpoint(format!("failed to acquire database lock: {}", e)))
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS checkpoints (
            connector TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (connector, key)
        )
        "#,
        [],
    )?;
    Ok(())
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn get(&self, key: &CheckpointKey) -> Result<Option<String>> {
        Ok(self.stored(key)?.map(|row| row.value))
    }

    async fn set(&self, key: &CheckpointKey, value: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO checkpoints (connector, key, value, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(connector, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key.connector, key.key, value, chrono::Utc::now().to_rfc3339()],
        )
        .map_err(|e| CollectError::checkpoint(format!("cannot write {}: {}", key, e)))?;
        Ok(())
    }

    async fn clear(&self, key: &CheckpointKey) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn
            .execute(
                "DELETE FROM checkpoints WHERE connector = ?1 AND key = ?2",
                params![key.connector, key.key],
            )
            .map_err(|e| CollectError::checkpoint(format!("cannot clear {}: {}", key, e)))?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key() -> CheckpointKey {
        CheckpointKey::new("threater_block_events", "block_events_last_timestamp")
    }

    #[tokio::test]
    async fn test_absent_key_is_none() {
        let store = SqliteCheckpointStore::open_in_memory().unwrap();
        assert_eq!(store.get(&key()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let store = SqliteCheckpointStore::open_in_memory().unwrap();
        store.set(&key(), "2024-01-02T00:00:00Z").await.unwrap();
        store.set(&key(), "2024-01-03T00:00:00Z").await.unwrap();
        assert_eq!(
            store.get(&key()).await.unwrap().as_deref(),
            Some("2024-01-03T00:00:00Z")
        );

        let row = store.stored(&key()).unwrap().unwrap();
        assert_eq!(row.connector, "threater_block_events");
        assert!(!row.updated_at.is_empty());
    }

    #[tokio::test]
    async fn test_keys_are_namespaced_by_connector() {
        let store = SqliteCheckpointStore::open_in_memory().unwrap();
        let a = CheckpointKey::new("threater_lists", "last_updated");
        let b = CheckpointKey::new("threater_ports", "last_updated");
        store.set(&a, "A").await.unwrap();
        assert_eq!(store.get(&b).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let state = dir.path().join("state");
        {
            let store = SqliteCheckpointStore::open(&state).unwrap();
            store.set(&key(), "2024-05-01T12:00:00Z").await.unwrap();
            assert_eq!(store.path().unwrap(), state.join(CHECKPOINT_DB_FILE));
        }
        let store = SqliteCheckpointStore::open(&state).unwrap();
        assert_eq!(
            store.get(&key()).await.unwrap().as_deref(),
            Some("2024-05-01T12:00:00Z")
        );
        assert!(store.clear(&key()).await.unwrap());
        assert_eq!(store.get(&key()).await.unwrap(), None);
    }
}
