//! Placeholder tools for the document/workflow capability families.
//!
//! Capability flags gate these behind `enable_document_tools` /
//! `enable_workflow_tools`, but the planner only filters *visibility* — a
//! call that somehow reaches the dispatcher while the capability is off (a
//! stale schema cached by the client, for instance) must still fail closed
//! with the standardized `not_enabled` error rather than executing. These
//! stand in for the actual document/workflow handlers, which are registered
//! separately by embedders that opt into those capabilities; this crate
//! only owns the fail-closed default for when nothing more specific is
//! registered.

use std::collections::HashMap;

use agentrun_core::tool::HandlerOutcome;
use agentrun_core::{CoreError, ToolSchema};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::context::ToolContext;
use crate::registry::ToolHandler;

pub struct NotEnabledTool {
    name: String,
    description: String,
}

impl NotEnabledTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { name: name.into(), description: description.into() }
    }
}

#[async_trait]
impl ToolHandler for NotEnabledTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: json!({"type": "object", "properties": {}}),
        }
    }

    async fn call(&self, _args: HashMap<String, Value>, _ctx: &ToolContext) -> Result<HandlerOutcome, CoreError> {
        Ok(HandlerOutcome::error(
            "not_enabled",
            json!({ "message": format!("{} is not enabled for this task", self.name) }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin_tools::test_support::test_ctx;

    #[tokio::test]
    async fn always_returns_not_enabled() {
        let tool = NotEnabledTool::new("export_document", "stub");
        let outcome = tool.call(HashMap::new(), &test_ctx()).await.unwrap();
        assert_eq!(outcome.error_code.as_deref(), Some("not_enabled"));
    }
}
