use std::sync::Arc;

use agentrun_core::{ChatClient, SharedStateStore};

use crate::hooks::HookManager;
use crate::memory::{MemoryConfig, Summarizer};
use crate::registry::ToolRegistry;

/// Runtime-wide settings shared by every task the runtime drives,
/// constructed via [`AgentConfigBuilder`] rather than parsed from a file —
/// file-based configuration is an explicit non-goal callers layer on top.
pub struct AgentConfig {
    pub chat_client: Arc<dyn ChatClient>,
    pub registry: Arc<ToolRegistry>,
    pub hooks: Arc<HookManager>,
    pub state_store: Option<SharedStateStore>,
    pub default_memory_config: MemoryConfig,
    pub summarizer: Arc<dyn Summarizer>,
}

pub struct AgentConfigBuilder {
    chat_client: Arc<dyn ChatClient>,
    registry: Arc<ToolRegistry>,
    hooks: HookManager,
    state_store: Option<SharedStateStore>,
    default_memory_config: MemoryConfig,
    summarizer: Arc<dyn Summarizer>,
}

impl AgentConfigBuilder {
    pub fn new(chat_client: Arc<dyn ChatClient>, registry: Arc<ToolRegistry>, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            chat_client,
            registry,
            hooks: HookManager::new(),
            state_store: None,
            default_memory_config: MemoryConfig::default(),
            summarizer,
        }
    }

    pub fn with_state_store(mut self, store: SharedStateStore) -> Self {
        self.state_store = Some(store);
        self
    }

    pub fn with_memory_config(mut self, config: MemoryConfig) -> Self {
        self.default_memory_config = config;
        self
    }

    pub fn with_hooks(mut self, hooks: HookManager) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn build(self) -> AgentConfig {
        AgentConfig {
            chat_client: self.chat_client,
            registry: self.registry,
            hooks: Arc::new(self.hooks),
            state_store: self.state_store,
            default_memory_config: self.default_memory_config,
            summarizer: self.summarizer,
        }
    }
}
