use thiserror::Error;

/// Error taxonomy shared by the dispatcher, state store, and workspace
/// backend. Organized by the same protocol/domain/capability/runtime split
/// the runtime crate's `RuntimeError` uses; this crate only needs the
/// subset that its own traits can raise directly.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum CoreError {
    #[error("tool arguments were not valid JSON: {0}")]
    InvalidArgumentsJson(String),

    #[error("tool arguments must decode to an object: {0}")]
    InvalidArgumentsPayload(String),

    #[error("workspace path escapes the workspace root: {0}")]
    PathEscape(String),

    #[error("workspace entry not found: {0}")]
    NotFound(String),

    #[error("workspace capability requested but no workspace backend is configured")]
    WorkspaceMissing,

    #[error("state store conflict: expected version {expected}, found {actual}")]
    CheckpointConflict { expected: u64, actual: u64 },

    #[error("state store has no checkpoint for task {0}")]
    CheckpointMissing(String),

    #[error("state store backend error: {0}")]
    Store(String),

    #[error("chat client error: {0}")]
    Chat(String),

    #[error("operation was cancelled")]
    Cancelled,
}

impl CoreError {
    /// Stable slug surfaced to the LLM via `ToolExecutionResult::error_code`
    /// or logged by callers; never renamed across variants once shipped.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::InvalidArgumentsJson(_) => "invalid_arguments_json",
            CoreError::InvalidArgumentsPayload(_) => "invalid_arguments_payload",
            CoreError::PathEscape(_) => "path_escape",
            CoreError::NotFound(_) => "file_not_found",
            CoreError::WorkspaceMissing => "workspace_missing",
            CoreError::CheckpointConflict { .. } => "checkpoint_conflict",
            CoreError::CheckpointMissing(_) => "checkpoint_missing",
            CoreError::Store(_) => "store_error",
            CoreError::Chat(_) => "chat_error",
            CoreError::Cancelled => "cancelled",
        }
    }
}
