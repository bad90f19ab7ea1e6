use agentrun_core::CoreError;
use thiserror::Error;

/// Runtime-level error taxonomy. Organized the way the corpus organizes its
/// agent error enum: configuration, dispatch, and terminal-failure sections,
/// each with a stable `error_code` slug.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum RuntimeError {
    // -- Configuration / setup --
    #[error("no chat client configured for task {0}")]
    ChatClientMissing(String),

    #[error("unknown sub-agent: {0}")]
    UnknownSubAgent(String),

    #[error("workspace capability requested but no workspace backend configured")]
    WorkspaceMissing,

    // -- Tool dispatch (delegates to CoreError for the shared slugs) --
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("tool capability is not enabled: {0}")]
    NotEnabled(String),

    // -- Runtime / terminal --
    #[error("task exceeded max_cycles ({0})")]
    MaxCyclesExceeded(u32),

    #[error("task was cancelled")]
    Cancelled,

    #[error("chat endpoint exhausted: {0}")]
    LlmEndpointExhausted(String),

    #[error("checkpoint version conflict: expected {expected}, found {actual}")]
    CheckpointConflict { expected: u64, actual: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    pub fn error_code(&self) -> &'static str {
        match self {
            RuntimeError::ChatClientMissing(_) => "chat_client_missing",
            RuntimeError::UnknownSubAgent(_) => "unknown_sub_agent",
            RuntimeError::WorkspaceMissing => "workspace_missing",
            RuntimeError::Core(e) => e.error_code(),
            RuntimeError::ToolNotFound(_) => "tool_not_found",
            RuntimeError::ToolExecutionFailed(_) => "tool_execution_failed",
            RuntimeError::NotEnabled(_) => "not_enabled",
            RuntimeError::MaxCyclesExceeded(_) => "max_cycles_exceeded",
            RuntimeError::Cancelled => "cancelled",
            RuntimeError::LlmEndpointExhausted(_) => "llm_endpoint_exhausted",
            RuntimeError::CheckpointConflict { .. } => "checkpoint_conflict",
            RuntimeError::Internal(_) => "internal",
        }
    }
}

impl From<anyhow::Error> for RuntimeError {
    fn from(value: anyhow::Error) -> Self {
        RuntimeError::ToolExecutionFailed(value.to_string())
    }
}
