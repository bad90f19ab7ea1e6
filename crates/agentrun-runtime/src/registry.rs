use std::collections::HashMap;
use std::sync::Arc;

use agentrun_core::tool::HandlerOutcome;
use agentrun_core::{CoreError, ToolSchema};
use async_trait::async_trait;
use serde_json::Value;

use crate::ToolContext;

/// One registered tool: its schema plus the handler the dispatcher invokes.
///
/// Shaped after a `descriptor` + `call` function-tool trait; `server_name`
/// is dropped since MCP server attribution is an external-collaborator
/// concern this crate does not model.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &str;
    fn schema(&self) -> ToolSchema;
    async fn call(&self, args: HashMap<String, Value>, ctx: &ToolContext) -> Result<HandlerOutcome, CoreError>;
}

/// Read-only after construction: a name-keyed map of registered tools plus
/// the schema list the planner filters per cycle.
#[derive(Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        self.handlers.insert(handler.name().to_string(), handler);
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn list_schemas(&self) -> Vec<ToolSchema> {
        self.handlers.values().map(|h| h.schema()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }
}
