//! Test-only fixtures shared across `builtin_tools` submodule test blocks.

use std::collections::HashMap;
use std::sync::Arc;

use agentrun_core::{CancellationToken, CoreError, FileInfo, WorkspaceBackend};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::background::BackgroundJobRegistry;
use crate::builtin_tools::todo::TodoList;
use crate::capability::CapabilityFlags;
use crate::context::ToolContext;

pub fn test_ctx() -> ToolContext {
    ToolContext {
        task_id: "t1".to_string(),
        cycle_index: 0,
        cancellation: CancellationToken::new(),
        workspace: None,
        capabilities: CapabilityFlags::all(),
        memory_usage_percentage: 0.0,
        sub_agents: None,
        background_jobs: BackgroundJobRegistry::new(),
        todos: TodoList::new(),
        metadata: HashMap::new(),
    }
}

/// A trivial in-process [`WorkspaceBackend`] for tool unit tests — no real
/// filesystem, no escape-protection, just a name-keyed map.
#[derive(Default, Clone)]
pub struct InMemoryWorkspace {
    files: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, path: &str, content: &str) {
        self.files.lock().insert(path.to_string(), content.to_string());
    }
}

#[async_trait]
impl WorkspaceBackend for InMemoryWorkspace {
    async fn list_files(&self, _base: &str, _glob: Option<&str>) -> Result<Vec<String>, CoreError> {
        Ok(self.files.lock().keys().cloned().collect())
    }

    async fn read_text(&self, path: &str) -> Result<String, CoreError> {
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(path.to_string()))
    }

    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>, CoreError> {
        self.read_text(path).await.map(String::into_bytes)
    }

    async fn write_text(&self, path: &str, content: &str, append: bool) -> Result<usize, CoreError> {
        let mut files = self.files.lock();
        let entry = files.entry(path.to_string()).or_default();
        if append {
            entry.push_str(content);
        } else {
            *entry = content.to_string();
        }
        Ok(content.len())
    }

    async fn file_info(&self, path: &str) -> Result<Option<FileInfo>, CoreError> {
        Ok(self.files.lock().get(path).map(|c| FileInfo { size: c.len() as u64, mtime_unix: 0, is_dir: false }))
    }

    async fn exists(&self, path: &str) -> Result<bool, CoreError> {
        Ok(self.files.lock().contains_key(path))
    }

    async fn is_file(&self, path: &str) -> Result<bool, CoreError> {
        self.exists(path).await
    }

    async fn mkdir(&self, _path: &str) -> Result<(), CoreError> {
        Ok(())
    }
}
