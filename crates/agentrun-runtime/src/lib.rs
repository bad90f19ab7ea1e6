//! The cycle-driven agent state machine: tool registry/dispatcher/planner,
//! memory compaction, the cycle and tool-call runners, pluggable execution
//! backends, sub-agent delegation, and the built-in tool set.
//!
//! Built on top of [`agentrun_core`]'s value types and external-collaborator
//! traits (chat client, workspace backend, state store, cancellation token);
//! this crate owns the state machine that drives a task through them.

pub mod backend;
pub mod background;
pub mod builtin_tools;
pub mod capability;
pub mod config;
pub mod context;
pub mod cycle;
pub mod dispatcher;
pub mod error;
pub mod hooks;
pub mod memory;
pub mod planner;
pub mod registry;
pub mod runtime;
pub mod task;
pub mod tool_runner;

pub use backend::{
    DistributedQueueBackend, ExecutionBackend, ExecutionContext, InMemoryTaskQueue, InlineBackend, RuntimeRecipe,
    TaskHandle, TaskQueue, ThreadPoolBackend,
};
pub use capability::CapabilityFlags;
pub use config::{AgentConfig, AgentConfigBuilder};
pub use context::{SubAgentDispatcher, ToolContext};
pub use cycle::{CycleRunner, CycleTurn};
pub use error::RuntimeError;
pub use hooks::{AgentEvent, Hook, HookManager, HookPoint};
pub use memory::{MemoryConfig, MemoryManager, Summarizer};
pub use planner::ToolPlanner;
pub use registry::{ToolHandler, ToolRegistry};
pub use runtime::AgentRuntime;
pub use task::{AgentResult, AgentTask, AgentTaskBuilder, CycleRecord, SubAgentSpec, TaskStatus};
