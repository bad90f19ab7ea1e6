//! Sub-agent delegation tools. Both dispatch through [`crate::context::SubAgentDispatcher`]
//! so the tools stay decoupled from [`crate::runtime::AgentRuntime`]; the
//! runtime supplies the dispatcher implementation when it builds a task's
//! [`crate::context::ToolContext`].
//!
//! One validate-then-dispatch tool per delegation kind, and a
//! `join_all`-based parallel fan-out for the batch variant.

use std::collections::HashMap;

use agentrun_core::tool::HandlerOutcome;
use agentrun_core::{CoreError, ToolSchema};
use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::context::ToolContext;
use crate::registry::ToolHandler;

pub struct CreateSubTaskTool;

#[async_trait]
impl ToolHandler for CreateSubTaskTool {
    fn name(&self) -> &str {
        "create_sub_task"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: "Delegate a prompt to a named sub-agent and block until it finishes."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "agent_name": {"type": "string"},
                    "prompt": {"type": "string"}
                },
                "required": ["agent_name", "prompt"]
            }),
        }
    }

    async fn call(&self, args: HashMap<String, Value>, ctx: &ToolContext) -> Result<HandlerOutcome, CoreError> {
        let agent_name = args
            .get("agent_name")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::InvalidArgumentsPayload("agent_name is required".to_string()))?;
        let prompt = args
            .get("prompt")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::InvalidArgumentsPayload("prompt is required".to_string()))?;

        let Some(dispatcher) = ctx.sub_agents.as_ref() else {
            return Ok(HandlerOutcome::error("not_enabled", json!({ "message": "no sub-agents configured for this task" })));
        };

        match dispatcher.run_sub_task(agent_name, prompt, &ctx.cancellation).await {
            Ok(answer) => Ok(HandlerOutcome::ok(json!({ "answer": answer }))),
            Err(err) => Ok(HandlerOutcome::error(err.error_code(), json!({ "message": err.to_string() }))),
        }
    }
}

#[derive(Deserialize)]
struct BatchEntry {
    agent_name: String,
    prompt: String,
}

pub struct BatchSubTasksTool;

#[async_trait]
impl ToolHandler for BatchSubTasksTool {
    fn name(&self) -> &str {
        "batch_sub_tasks"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: "Delegate several prompts to named sub-agents in parallel, blocking until \
                all finish. Results preserve call order regardless of completion order."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "tasks": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "agent_name": {"type": "string"},
                                "prompt": {"type": "string"}
                            },
                            "required": ["agent_name", "prompt"]
                        }
                    }
                },
                "required": ["tasks"]
            }),
        }
    }

    async fn call(&self, args: HashMap<String, Value>, ctx: &ToolContext) -> Result<HandlerOutcome, CoreError> {
        let tasks_val = args
            .get("tasks")
            .cloned()
            .ok_or_else(|| CoreError::InvalidArgumentsPayload("tasks is required".to_string()))?;
        let entries: Vec<BatchEntry> = serde_json::from_value(tasks_val)
            .map_err(|e| CoreError::InvalidArgumentsPayload(format!("invalid tasks: {e}")))?;

        let Some(dispatcher) = ctx.sub_agents.as_ref() else {
            return Ok(HandlerOutcome::error("not_enabled", json!({ "message": "no sub-agents configured for this task" })));
        };

        // A single dispatcher round-trip preserves call order internally
        // (see SubAgentDispatcher::run_batch); falling back to N independent
        // futures here would still need the same ordering guarantee, so we
        // prefer the dispatcher's own batching when it is available.
        let pairs: Vec<(String, String)> = entries.iter().map(|e| (e.agent_name.clone(), e.prompt.clone())).collect();
        match dispatcher.run_batch(pairs, &ctx.cancellation).await {
            Ok(answers) => Ok(HandlerOutcome::ok(json!({ "answers": answers }))),
            Err(err) => Ok(HandlerOutcome::error(err.error_code(), json!({ "message": err.to_string() }))),
        }
    }
}

/// Default [`crate::context::SubAgentDispatcher::run_batch`] for implementations
/// that only need to parallelize `run_sub_task` calls without a cheaper
/// batched transport. Not used directly by the tools above (which call the
/// dispatcher's own `run_batch`), but exposed for dispatcher authors.
pub async fn fan_out_sub_tasks<F, Fut>(pairs: Vec<(String, String)>, run_one: F) -> Vec<Result<String, CoreError>>
where
    F: Fn(String, String) -> Fut,
    Fut: std::future::Future<Output = Result<String, CoreError>>,
{
    join_all(pairs.into_iter().map(|(name, prompt)| run_one(name, prompt))).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin_tools::test_support::test_ctx;
    use crate::context::SubAgentDispatcher;
    use std::sync::Arc;

    struct StubDispatcher;

    #[async_trait]
    impl SubAgentDispatcher for StubDispatcher {
        async fn run_sub_task(&self, agent_name: &str, prompt: &str, _cancellation: &agentrun_core::CancellationToken) -> Result<String, CoreError> {
            Ok(format!("{agent_name}:{prompt}"))
        }

        async fn run_batch(&self, tasks: Vec<(String, String)>, _cancellation: &agentrun_core::CancellationToken) -> Result<Vec<String>, CoreError> {
            // Resolve in reverse to prove the caller preserves call order
            // rather than completion order.
            let mut results = vec![String::new(); tasks.len()];
            for (i, (name, prompt)) in tasks.into_iter().enumerate().rev() {
                results[i] = format!("{name}:{prompt}");
            }
            Ok(results)
        }
    }

    #[tokio::test]
    async fn missing_dispatcher_is_not_enabled() {
        let mut args = HashMap::new();
        args.insert("agent_name".to_string(), json!("a"));
        args.insert("prompt".to_string(), json!("p"));
        let outcome = CreateSubTaskTool.call(args, &test_ctx()).await.unwrap();
        assert_eq!(outcome.error_code.as_deref(), Some("not_enabled"));
    }

    #[tokio::test]
    async fn batch_preserves_call_order() {
        let mut ctx = test_ctx();
        ctx.sub_agents = Some(Arc::new(StubDispatcher));
        let mut args = HashMap::new();
        args.insert(
            "tasks".to_string(),
            json!([
                {"agent_name": "a", "prompt": "p1"},
                {"agent_name": "a", "prompt": "p2"},
            ]),
        );
        let outcome = BatchSubTasksTool.call(args, &ctx).await.unwrap();
        let answers = outcome.payload["answers"].as_array().unwrap();
        assert_eq!(answers[0], json!("a:p1"));
        assert_eq!(answers[1], json!("a:p2"));
    }
}
