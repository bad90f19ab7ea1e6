use std::collections::HashMap;

use agentrun_core::tool::HandlerOutcome;
use agentrun_core::{CoreError, StatusCode, ToolSchema};
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::context::ToolContext;
use crate::registry::ToolHandler;

/// Only offered by the planner once memory pressure crosses
/// `memory_threshold_percentage`; requesting it schedules compaction at
/// the start of the next cycle rather than compacting inline, so the
/// current cycle's tool results still land in the message list first.
pub struct CompressMemoryTool;

#[async_trait]
impl ToolHandler for CompressMemoryTool {
    fn name(&self) -> &str {
        "compress_memory"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: "Request memory compaction before the next cycle starts.".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        }
    }

    async fn call(&self, _args: HashMap<String, Value>, ctx: &ToolContext) -> Result<HandlerOutcome, CoreError> {
        Ok(HandlerOutcome::ok(json!({ "memory_usage_percentage": ctx.memory_usage_percentage }))
            .with_status(StatusCode::PendingCompress))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin_tools::test_support::test_ctx;

    #[tokio::test]
    async fn schedules_pending_compress() {
        let outcome = CompressMemoryTool.call(HashMap::new(), &test_ctx()).await.unwrap();
        assert_eq!(outcome.status_code, StatusCode::PendingCompress);
    }
}
