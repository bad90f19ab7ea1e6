use std::collections::HashMap;

use agentrun_core::tool::HandlerOutcome;
use agentrun_core::{CoreError, Directive, StatusCode, ToolSchema};
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::context::ToolContext;
use crate::registry::ToolHandler;

/// Suspends the task: `directive = wait_user`, `status_code = WAIT_RESPONSE`.
/// The caller resumes by appending a user message and re-invoking the runtime.
pub struct AskUserTool;

#[async_trait]
impl ToolHandler for AskUserTool {
    fn name(&self) -> &str {
        "ask_user"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: "Ask the user a question and suspend the task until they respond."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "question": {"type": "string"},
                    "options": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["question"]
            }),
        }
    }

    async fn call(&self, args: HashMap<String, Value>, _ctx: &ToolContext) -> Result<HandlerOutcome, CoreError> {
        let question = args
            .get("question")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::InvalidArgumentsPayload("question is required".to_string()))?;
        let options = args.get("options").cloned().unwrap_or(Value::Null);

        Ok(HandlerOutcome::ok(json!({ "question": question, "options": options }))
            .with_directive(Directive::WaitUser)
            .with_status(StatusCode::WaitResponse))
    }
}
