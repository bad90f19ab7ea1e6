use std::collections::HashMap;

use agentrun_core::tool::HandlerOutcome;
use agentrun_core::{CoreError, Directive, ToolSchema};
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::context::ToolContext;
use crate::registry::ToolHandler;

/// Terminal tool: ends the task with `directive = finish` once every tracked
/// todo is completed. [`crate::runtime::AgentRuntime`] reads the `answer`
/// field back out of this call's result to populate `AgentResult::final_answer`.
pub struct TaskFinishTool;

#[async_trait]
impl ToolHandler for TaskFinishTool {
    fn name(&self) -> &str {
        "task_finish"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: "Finish the task and return the final answer to the user. Fails if any \
                tracked todo is not yet completed."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "answer": {"type": "string", "description": "The final answer for the user."}
                },
                "required": ["answer"]
            }),
        }
    }

    async fn call(&self, args: HashMap<String, Value>, ctx: &ToolContext) -> Result<HandlerOutcome, CoreError> {
        let answer = args
            .get("answer")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::InvalidArgumentsPayload("answer is required".to_string()))?;

        if !ctx.todos.all_complete() {
            return Ok(HandlerOutcome::error(
                "todo_incomplete",
                json!({ "message": "one or more todos are not yet completed" }),
            ));
        }

        Ok(HandlerOutcome::ok(json!({ "answer": answer })).with_directive(Directive::Finish))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin_tools::test_support::test_ctx;
    use agentrun_core::StatusCode;

    #[tokio::test]
    async fn finishes_when_todos_complete() {
        let ctx = test_ctx();
        let mut args = HashMap::new();
        args.insert("answer".to_string(), json!("hi"));
        let outcome = TaskFinishTool.call(args, &ctx).await.unwrap();
        assert_eq!(outcome.directive, Directive::Finish);
        assert_eq!(outcome.status_code, StatusCode::Success);
    }

    #[tokio::test]
    async fn blocks_when_todo_incomplete() {
        use crate::builtin_tools::todo::{TodoItem, TodoStatus};
        let ctx = test_ctx();
        ctx.todos
            .replace(vec![TodoItem { id: None, title: "x".to_string(), status: TodoStatus::Pending, priority: None }])
            .unwrap();
        let mut args = HashMap::new();
        args.insert("answer".to_string(), json!("hi"));
        let outcome = TaskFinishTool.call(args, &ctx).await.unwrap();
        assert_eq!(outcome.error_code.as_deref(), Some("todo_incomplete"));
        assert_eq!(outcome.directive, Directive::Continue);
    }
}
