use std::collections::HashMap;
use std::sync::Arc;

use agentrun_core::{CancellationToken, CoreError, WorkspaceBackend};
use async_trait::async_trait;
use serde_json::Value;

use crate::background::BackgroundJobRegistry;
use crate::builtin_tools::todo::TodoList;
use crate::capability::CapabilityFlags;

/// Dispatches `create_sub_task` / `batch_sub_tasks` to child runtimes. The
/// runtime crate implements this over its own `AgentRuntime`; the built-in
/// tools only depend on this narrow trait so they stay decoupled from the
/// top-level state machine module.
///
/// Both methods take the calling cycle's cancellation token so a cancelled
/// parent task propagates down to any in-flight child rather than leaving
/// it running as an orphan; implementations derive a child token via
/// [`CancellationToken::child`] rather than handing the parent token to the
/// child directly.
#[async_trait]
pub trait SubAgentDispatcher: Send + Sync {
    async fn run_sub_task(&self, agent_name: &str, prompt: &str, cancellation: &CancellationToken) -> Result<String, CoreError>;

    /// Runs every `(agent_name, prompt)` pair concurrently and returns
    /// results in call order regardless of completion order.
    async fn run_batch(&self, tasks: Vec<(String, String)>, cancellation: &CancellationToken) -> Result<Vec<String>, CoreError>;
}

/// Per-call context handed to every [`crate::registry::ToolHandler`].
pub struct ToolContext {
    pub task_id: String,
    pub cycle_index: u32,
    pub cancellation: CancellationToken,
    pub workspace: Option<Arc<dyn WorkspaceBackend>>,
    pub capabilities: CapabilityFlags,
    pub memory_usage_percentage: f64,
    pub sub_agents: Option<Arc<dyn SubAgentDispatcher>>,
    pub background_jobs: BackgroundJobRegistry,
    pub todos: TodoList,
    pub metadata: HashMap<String, Value>,
}

impl ToolContext {
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    pub fn metadata_usize(&self, key: &str, default: usize) -> usize {
        self.metadata
            .get(key)
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(default)
    }

    pub fn metadata_bool(&self, key: &str, default: bool) -> bool {
        self.metadata.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
    }
}
