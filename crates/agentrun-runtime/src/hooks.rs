use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Sequential before/after event points the runtime fires around an LLM
/// call, a tool call, or a memory compaction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    BeforeLlm,
    AfterLlm,
    BeforeToolCall,
    AfterToolCall,
    BeforeMemoryCompact,
    AfterMemoryCompact,
}

/// Observability events published as the runtime advances a task, as a
/// tagged event enum. Ambient observability carried regardless of feature
/// scope, not a new capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    SessionCreated { task_id: String },
    CycleStarted { task_id: String, cycle_index: u32 },
    ToolCallStart { task_id: String, tool_call_id: String, name: String },
    ToolCallEnd { task_id: String, tool_call_id: String, status: String },
    MemoryCompacted { task_id: String, before_len: usize, after_len: usize },
    TaskFinished { task_id: String, status: String },
}

/// Receives hook invocations and/or published events. Implementations are
/// invoked sequentially in registration order for a given hook point —
/// never concurrently with each other for the same event.
#[async_trait]
pub trait Hook: Send + Sync {
    async fn on_hook(&self, _point: HookPoint) {}
    async fn on_event(&self, _event: &AgentEvent) {}
}

#[derive(Default)]
pub struct HookManager {
    hooks: Vec<std::sync::Arc<dyn Hook>>,
}

impl HookManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: std::sync::Arc<dyn Hook>) {
        self.hooks.push(hook);
    }

    pub async fn fire(&self, point: HookPoint) {
        for hook in &self.hooks {
            hook.on_hook(point).await;
        }
    }

    pub async fn publish(&self, event: AgentEvent) {
        for hook in &self.hooks {
            hook.on_event(&event).await;
        }
    }
}
