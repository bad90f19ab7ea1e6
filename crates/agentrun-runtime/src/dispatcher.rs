use agentrun_core::tool::HandlerOutcome;
use agentrun_core::{CoreError, ToolCall, ToolExecutionResult};

use crate::context::ToolContext;
use crate::registry::ToolRegistry;

/// Normalizes a [`ToolCall`] into a [`ToolExecutionResult`]: parses
/// arguments, looks up the handler, invokes it, and maps both protocol
/// failures and handler outcomes onto the shared status/directive/error_code
/// contract. Never panics or propagates a Rust error past this call — every
/// failure mode becomes an `ERROR` result the LLM can see and react to.
pub async fn dispatch(registry: &ToolRegistry, call: &ToolCall, ctx: &ToolContext) -> ToolExecutionResult {
    let args = match call.parsed_arguments() {
        Ok(args) => args,
        Err(err) => return result_for_core_error(&call.id, err),
    };

    let handler = match registry.find(&call.name) {
        Some(handler) => handler,
        None => {
            return ToolExecutionResult::error(
                &call.id,
                "tool_not_found",
                format!("no tool registered with name '{}'", call.name),
            )
        }
    };

    match handler.call(args, ctx).await {
        Ok(outcome) => result_from_outcome(&call.id, outcome),
        Err(err) => result_for_core_error(&call.id, err),
    }
}

fn result_from_outcome(tool_call_id: &str, outcome: HandlerOutcome) -> ToolExecutionResult {
    let content = serde_json::to_string(&outcome.payload).unwrap_or_else(|_| "null".to_string());
    ToolExecutionResult {
        tool_call_id: tool_call_id.to_string(),
        content,
        status_code: outcome.status_code,
        directive: outcome.directive,
        error_code: outcome.error_code,
        metadata: Default::default(),
        image_url: outcome.image_url,
        image_path: outcome.image_path,
    }
}

fn result_for_core_error(tool_call_id: &str, err: CoreError) -> ToolExecutionResult {
    ToolExecutionResult::error(tool_call_id, err.error_code(), err.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use agentrun_core::{CancellationToken, StatusCode, ToolSchema};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::capability::CapabilityFlags;
    use crate::registry::ToolHandler;
    use std::sync::Arc;

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "echo".to_string(),
                description: "echoes its input".to_string(),
                parameters: json!({"type": "object"}),
            }
        }

        async fn call(&self, args: HashMap<String, Value>, _ctx: &ToolContext) -> Result<HandlerOutcome, CoreError> {
            Ok(HandlerOutcome::ok(json!(args)))
        }
    }

    fn test_ctx() -> ToolContext {
        ToolContext {
            task_id: "t1".to_string(),
            cycle_index: 0,
            cancellation: CancellationToken::new(),
            workspace: None,
            capabilities: CapabilityFlags::default(),
            memory_usage_percentage: 0.0,
            sub_agents: None,
            background_jobs: crate::background::BackgroundJobRegistry::new(),
            todos: crate::builtin_tools::todo::TodoList::new(),
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_tool_not_found() {
        let registry = ToolRegistry::new();
        let call = ToolCall::new("1", "missing", "{}");
        let result = dispatch(&registry, &call, &test_ctx()).await;
        assert_eq!(result.status_code, StatusCode::Error);
        assert_eq!(result.error_code.as_deref(), Some("tool_not_found"));
    }

    #[tokio::test]
    async fn malformed_arguments_short_circuit_before_handler_invocation() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo));
        let call = ToolCall::new("1", "echo", "{not json");
        let result = dispatch(&registry, &call, &test_ctx()).await;
        assert_eq!(result.error_code.as_deref(), Some("invalid_arguments_json"));
    }

    #[tokio::test]
    async fn successful_dispatch_preserves_tool_call_id() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo));
        let call = ToolCall::new("call-42", "echo", r#"{"x":1}"#);
        let result = dispatch(&registry, &call, &test_ctx()).await;
        assert_eq!(result.tool_call_id, "call-42");
        assert_eq!(result.status_code, StatusCode::Success);
    }
}
