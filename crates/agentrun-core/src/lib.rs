//! Value types and external-collaborator traits shared by the agentrun
//! cycle runtime: the message/tool wire model, the chat-client and
//! workspace-backend contracts the runtime is driven through, the
//! checkpoint store, and a hierarchical cancellation token.

pub mod cancel;
pub mod chat;
pub mod error;
pub mod message;
#[cfg(feature = "sqlite-store")]
pub mod sqlite_store;
pub mod state_store;
pub mod tool;
pub mod workspace;

pub use cancel::CancellationToken;
pub use chat::{ChatClient, ChatOutcome, ChatRequest, ChatStream, StreamChunk, StreamSink, TokenUsage, ToolSchema};
pub use error::CoreError;
pub use message::{ImageRef, Message, Role};
#[cfg(feature = "sqlite-store")]
pub use sqlite_store::SqliteStateStore;
pub use state_store::{Checkpoint, InMemoryStateStore, SharedStateStore, StateStore};
pub use tool::{Directive, HandlerOutcome, StatusCode, ToolCall, ToolCallAggregator, ToolExecutionResult};
pub use workspace::{FileInfo, WorkspaceBackend, LIST_FILES_DEFAULT_LIMIT};
