//! Durable [`crate::state_store::StateStore`] backed by a local SQLite file,
//! for the distributed-queue execution backend where checkpoints must
//! outlive any single worker process.

use async_trait::async_trait;
use rusqlite::{params, Connection};
use tokio::sync::Mutex;

use crate::error::CoreError;
use crate::state_store::{Checkpoint, StateStore};

pub struct SqliteStateStore {
    conn: Mutex<Connection>,
}

impl SqliteStateStore {
    pub fn open(database_path: &str) -> Result<Self, CoreError> {
        let conn = Connection::open(database_path).map_err(|e| CoreError::Store(e.to_string()))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                task_id TEXT PRIMARY KEY,
                version INTEGER NOT NULL,
                payload TEXT NOT NULL
            );",
        )
        .map_err(|e| CoreError::Store(e.to_string()))?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn save(&self, checkpoint: Checkpoint, expected_version: Option<u64>) -> Result<u64, CoreError> {
        let conn = self.conn.lock().await;
        let current: Option<i64> = conn
            .query_row(
                "SELECT version FROM checkpoints WHERE task_id = ?1",
                params![checkpoint.task_id],
                |row| row.get(0),
            )
            .ok();
        if let Some(expected) = expected_version {
            let actual = current.unwrap_or(0) as u64;
            if actual != expected {
                return Err(CoreError::CheckpointConflict { expected, actual });
            }
        }
        let next_version = current.unwrap_or(0) as u64 + 1;
        let mut checkpoint = checkpoint;
        checkpoint.version = next_version;
        let payload = serde_json::to_string(&checkpoint).map_err(|e| CoreError::Store(e.to_string()))?;
        conn.execute(
            "INSERT INTO checkpoints (task_id, version, payload) VALUES (?1, ?2, ?3)
             ON CONFLICT(task_id) DO UPDATE SET version = ?2, payload = ?3",
            params![checkpoint.task_id, next_version as i64, payload],
        )
        .map_err(|e| CoreError::Store(e.to_string()))?;
        log::debug!("sqlite checkpoint saved for task {} at version {next_version}", checkpoint.task_id);
        Ok(next_version)
    }

    async fn load(&self, task_id: &str) -> Result<Option<(Checkpoint, u64)>, CoreError> {
        let conn = self.conn.lock().await;
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT version, payload FROM checkpoints WHERE task_id = ?1",
                params![task_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .ok();
        match row {
            None => Ok(None),
            Some((version, payload)) => {
                let checkpoint: Checkpoint =
                    serde_json::from_str(&payload).map_err(|e| CoreError::Store(e.to_string()))?;
                Ok(Some((checkpoint, version as u64)))
            }
        }
    }

    async fn delete(&self, task_id: &str) -> Result<(), CoreError> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM checkpoints WHERE task_id = ?1", params![task_id])
            .map_err(|e| CoreError::Store(e.to_string()))?;
        log::debug!("sqlite checkpoint deleted for task {task_id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn saved_checkpoints_embedded_version_matches_returned_version() {
        let store = SqliteStateStore::open(":memory:").unwrap();
        let checkpoint = Checkpoint::new("task-1", vec![]);
        let version = store.save(checkpoint, None).await.unwrap();
        let (loaded, loaded_version) = store.load("task-1").await.unwrap().unwrap();
        assert_eq!(loaded_version, version);
        assert_eq!(loaded.version, version, "the serialized checkpoint's own version field must agree with the stored version");
    }

    #[tokio::test]
    async fn conflicting_expected_version_is_rejected() {
        let store = SqliteStateStore::open(":memory:").unwrap();
        let checkpoint = Checkpoint::new("task-1", vec![]);
        let v1 = store.save(checkpoint.clone(), None).await.unwrap();
        assert_eq!(v1, 1);
        let err = store.save(checkpoint, Some(0)).await.unwrap_err();
        assert!(matches!(err, CoreError::CheckpointConflict { expected: 0, actual: 1 }));
    }
}
