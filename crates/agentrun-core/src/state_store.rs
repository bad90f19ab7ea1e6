use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::chat::TokenUsage;
use crate::error::CoreError;
use crate::message::Message;

/// A resumable snapshot of one task's execution, sufficient to rebuild the
/// cycle runner on another worker. `version` is a monotonic counter used for
/// optimistic-concurrency checks by [`StateStore::save`].
///
/// Deliberately does not carry the full per-cycle `CycleRecord` trace (that
/// type lives in `agentrun-runtime`, which depends on this crate, not the
/// other way around): `status`/`final_answer`/`total_usage` are the
/// minimum a distributed worker needs to report completion back to a
/// waiting submitter without replaying history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub task_id: String,
    pub cycle_index: u32,
    pub messages: Vec<Message>,
    pub pending_directive: Option<String>,
    pub version: u64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub final_answer: Option<String>,
    #[serde(default)]
    pub total_usage: TokenUsage,
}

impl Checkpoint {
    pub fn new(task_id: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            task_id: task_id.into(),
            cycle_index: 0,
            messages,
            pending_directive: None,
            version: 0,
            status: None,
            final_answer: None,
            total_usage: TokenUsage::default(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_some()
    }
}

/// Persists `(task_id -> checkpoint)`. `save` fails with
/// `CoreError::CheckpointConflict` when `expected_version` does not match
/// the stored version, so distributed callers can detect a competing
/// writer rather than silently clobbering it.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn save(&self, checkpoint: Checkpoint, expected_version: Option<u64>) -> Result<u64, CoreError>;
    async fn load(&self, task_id: &str) -> Result<Option<(Checkpoint, u64)>, CoreError>;
    async fn delete(&self, task_id: &str) -> Result<(), CoreError>;
}

/// Process-local [`StateStore`], backed by a single mutex-guarded map.
/// Grounded on the same lock-then-mutate shape used by in-process session
/// stores in the corpus; adequate for the inline and thread-pool backends,
/// never for the distributed-queue backend (no cross-process visibility).
#[derive(Default)]
pub struct InMemoryStateStore {
    checkpoints: Mutex<HashMap<String, Checkpoint>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn save(&self, checkpoint: Checkpoint, expected_version: Option<u64>) -> Result<u64, CoreError> {
        let mut guard = self.checkpoints.lock().await;
        if let Some(expected) = expected_version {
            if let Some(existing) = guard.get(&checkpoint.task_id) {
                if existing.version != expected {
                    return Err(CoreError::CheckpointConflict {
                        expected,
                        actual: existing.version,
                    });
                }
            } else if expected != 0 {
                return Err(CoreError::CheckpointConflict { expected, actual: 0 });
            }
        }
        let next_version = checkpoint.version.max(expected_version.unwrap_or(0)) + 1;
        let mut stored = checkpoint;
        stored.version = next_version;
        log::debug!("checkpoint saved for task {} at version {next_version}", stored.task_id);
        guard.insert(stored.task_id.clone(), stored);
        Ok(next_version)
    }

    async fn load(&self, task_id: &str) -> Result<Option<(Checkpoint, u64)>, CoreError> {
        let guard = self.checkpoints.lock().await;
        Ok(guard.get(task_id).map(|c| (c.clone(), c.version)))
    }

    async fn delete(&self, task_id: &str) -> Result<(), CoreError> {
        let mut guard = self.checkpoints.lock().await;
        guard.remove(task_id);
        log::debug!("checkpoint deleted for task {task_id}");
        Ok(())
    }
}

/// Shared handle alias used by runtime configuration.
pub type SharedStateStore = Arc<dyn StateStore>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = InMemoryStateStore::new();
        let checkpoint = Checkpoint::new("task-1", vec![]);
        let version = store.save(checkpoint.clone(), None).await.unwrap();
        let (loaded, loaded_version) = store.load("task-1").await.unwrap().unwrap();
        assert_eq!(loaded.task_id, "task-1");
        assert_eq!(loaded_version, version);
    }

    #[tokio::test]
    async fn conflicting_expected_version_is_rejected() {
        let store = InMemoryStateStore::new();
        let checkpoint = Checkpoint::new("task-1", vec![]);
        let v1 = store.save(checkpoint.clone(), None).await.unwrap();
        assert_eq!(v1, 1);
        let err = store.save(checkpoint, Some(99)).await.unwrap_err();
        assert_eq!(err.error_code(), "checkpoint_conflict");
    }

    #[tokio::test]
    async fn delete_removes_checkpoint() {
        let store = InMemoryStateStore::new();
        store.save(Checkpoint::new("task-1", vec![]), None).await.unwrap();
        store.delete("task-1").await.unwrap();
        assert!(store.load("task-1").await.unwrap().is_none());
    }
}
