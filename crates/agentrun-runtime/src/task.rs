use std::collections::HashMap;
use std::sync::Arc;

use agentrun_core::{Message, TokenUsage, ToolCall, ToolExecutionResult, WorkspaceBackend};
use serde_json::Value;

use crate::capability::CapabilityFlags;

/// One completed turn of a task, immutable once recorded.
#[derive(Debug, Clone)]
pub struct CycleRecord {
    pub index: u32,
    pub assistant_message: Message,
    pub tool_calls: Vec<(ToolCall, ToolExecutionResult)>,
    pub usage: TokenUsage,
}

/// Terminal (or suspended) status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Completed,
    WaitUser,
    Failed,
    MaxCycles,
}

/// The outcome of running an [`AgentTask`] to a terminal or suspended state.
#[derive(Debug, Clone)]
pub struct AgentResult {
    pub task_id: String,
    pub status: TaskStatus,
    pub final_answer: Option<String>,
    pub cycles: Vec<CycleRecord>,
    pub total_usage: TokenUsage,
    pub failure_reason: Option<String>,
}

/// A named sub-agent a task may delegate to via `create_sub_task` /
/// `batch_sub_tasks`.
#[derive(Debug, Clone)]
pub struct SubAgentSpec {
    pub model: String,
    pub system_prompt: String,
    pub max_cycles: u32,
}

/// The mutable unit of work the runtime drives. Constructed via
/// [`AgentTaskBuilder`] and owned exclusively by the runtime while running.
#[derive(Clone)]
pub struct AgentTask {
    pub task_id: String,
    pub model: String,
    pub messages: Vec<Message>,
    pub max_cycles: u32,
    pub memory_compact_threshold: usize,
    pub memory_threshold_percentage: f64,
    pub capabilities: CapabilityFlags,
    pub sub_agents: HashMap<String, SubAgentSpec>,
    pub workspace: Option<Arc<dyn WorkspaceBackend>>,
    pub metadata: HashMap<String, Value>,
}

pub struct AgentTaskBuilder {
    task_id: String,
    model: String,
    system_prompt: String,
    user_prompt: String,
    max_cycles: u32,
    memory_compact_threshold: usize,
    memory_threshold_percentage: f64,
    capabilities: CapabilityFlags,
    sub_agents: HashMap<String, SubAgentSpec>,
    workspace: Option<Arc<dyn WorkspaceBackend>>,
    metadata: HashMap<String, Value>,
}

impl AgentTaskBuilder {
    pub fn new(task_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            model: model.into(),
            system_prompt: String::new(),
            user_prompt: String::new(),
            max_cycles: 20,
            memory_compact_threshold: 128_000,
            memory_threshold_percentage: 90.0,
            capabilities: CapabilityFlags::default(),
            sub_agents: HashMap::new(),
            workspace: None,
            metadata: HashMap::new(),
        }
    }

    pub fn system_prompt(mut self, text: impl Into<String>) -> Self {
        self.system_prompt = text.into();
        self
    }

    pub fn user_prompt(mut self, text: impl Into<String>) -> Self {
        self.user_prompt = text.into();
        self
    }

    pub fn max_cycles(mut self, n: u32) -> Self {
        self.max_cycles = n;
        self
    }

    pub fn memory_compact_threshold(mut self, chars: usize) -> Self {
        self.memory_compact_threshold = chars;
        self
    }

    pub fn memory_threshold_percentage(mut self, pct: f64) -> Self {
        self.memory_threshold_percentage = pct;
        self
    }

    pub fn capabilities(mut self, capabilities: CapabilityFlags) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn sub_agent(mut self, name: impl Into<String>, spec: SubAgentSpec) -> Self {
        self.sub_agents.insert(name.into(), spec);
        self
    }

    pub fn workspace(mut self, workspace: Arc<dyn WorkspaceBackend>) -> Self {
        self.workspace = Some(workspace);
        self.capabilities.use_workspace = true;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn build(self) -> AgentTask {
        let mut messages = Vec::new();
        if !self.system_prompt.is_empty() {
            messages.push(Message::system(self.system_prompt));
        }
        if !self.user_prompt.is_empty() {
            messages.push(Message::user(self.user_prompt));
        }
        AgentTask {
            task_id: self.task_id,
            model: self.model,
            messages,
            max_cycles: self.max_cycles,
            memory_compact_threshold: self.memory_compact_threshold,
            memory_threshold_percentage: self.memory_threshold_percentage,
            capabilities: self.capabilities,
            sub_agents: self.sub_agents,
            workspace: self.workspace,
            metadata: self.metadata,
        }
    }
}
