//! Compute tools for `agent_type = computer` tasks: shell execution, polling
//! a previously-spawned background command, and reading an image.
//!
//! Split into a background-job pair, `bash` / `check_background_command`,
//! so a long-running command can report `RUNNING` / `BATCH_RUNNING` instead
//! of always blocking the cycle to completion.

use std::collections::HashMap;
use std::time::Duration;

use agentrun_core::tool::HandlerOutcome;
use agentrun_core::{CoreError, StatusCode, ToolSchema};
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::context::ToolContext;
use crate::registry::ToolHandler;

/// Commands that run longer than this are backgrounded: the tool returns
/// `RUNNING` with a `job_id` instead of blocking the cycle.
const FOREGROUND_TIMEOUT: Duration = Duration::from_secs(5);

pub struct BashTool;

#[async_trait]
impl ToolHandler for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: "Run a shell command. Commands that do not finish within a few seconds \
                are backgrounded: poll their result with check_background_command."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string"},
                    "cwd": {"type": "string"}
                },
                "required": ["command"]
            }),
        }
    }

    async fn call(&self, args: HashMap<String, Value>, ctx: &ToolContext) -> Result<HandlerOutcome, CoreError> {
        let command = args
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::InvalidArgumentsPayload("command is required".to_string()))?
            .to_string();
        let cwd = args.get("cwd").and_then(Value::as_str).map(str::to_string);

        let job_id = ctx.background_jobs.spawn(command, cwd);

        match tokio::time::timeout(FOREGROUND_TIMEOUT, ctx.background_jobs.poll(&job_id)).await {
            Ok(Some(Some(result))) => Ok(HandlerOutcome::ok(json!({
                "exit_code": result.exit_code,
                "stdout": result.stdout,
                "stderr": result.stderr,
            }))),
            // Still running once the foreground window elapses, or the poll
            // raced a not-yet-finished job: hand back the job id to poll later.
            _ => Ok(HandlerOutcome::ok(json!({ "job_id": job_id, "status": "running" }))
                .with_status(StatusCode::Running)),
        }
    }
}

pub struct CheckBackgroundCommandTool;

#[async_trait]
impl ToolHandler for CheckBackgroundCommandTool {
    fn name(&self) -> &str {
        "check_background_command"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: "Poll a bash command previously backgrounded by a RUNNING result.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"job_id": {"type": "string"}},
                "required": ["job_id"]
            }),
        }
    }

    async fn call(&self, args: HashMap<String, Value>, ctx: &ToolContext) -> Result<HandlerOutcome, CoreError> {
        let job_id = args
            .get("job_id")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::InvalidArgumentsPayload("job_id is required".to_string()))?;

        match ctx.background_jobs.poll(job_id).await {
            None => Ok(HandlerOutcome::error("job_not_found", json!({ "job_id": job_id }))),
            Some(None) => Ok(HandlerOutcome::ok(json!({ "job_id": job_id, "status": "running" }))
                .with_status(StatusCode::Running)),
            Some(Some(result)) => Ok(HandlerOutcome::ok(json!({
                "exit_code": result.exit_code,
                "stdout": result.stdout,
                "stderr": result.stderr,
            }))),
        }
    }
}

pub struct ReadImageTool;

#[async_trait]
impl ToolHandler for ReadImageTool {
    fn name(&self) -> &str {
        "read_image"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: "Load an image from the workspace so the model can see it next turn."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"path": {"type": "string"}},
                "required": ["path"]
            }),
        }
    }

    async fn call(&self, args: HashMap<String, Value>, ctx: &ToolContext) -> Result<HandlerOutcome, CoreError> {
        let path = args
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::InvalidArgumentsPayload("path is required".to_string()))?;

        let workspace = ctx.workspace.as_ref().ok_or(CoreError::WorkspaceMissing)?;

        match workspace.exists(path).await {
            Ok(true) => Ok(HandlerOutcome::ok(json!({ "path": path })).with_image_path(path.to_string())),
            Ok(false) => Ok(HandlerOutcome::error("file_not_found", json!({ "path": path }))),
            Err(err) => Ok(HandlerOutcome::error(err.error_code(), json!({ "message": err.to_string() }))),
        }
    }
}

trait HandlerOutcomeImageExt {
    fn with_image_path(self, path: String) -> HandlerOutcome;
}

impl HandlerOutcomeImageExt for HandlerOutcome {
    fn with_image_path(mut self, path: String) -> HandlerOutcome {
        self.image_path = Some(path);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin_tools::test_support::test_ctx;

    #[tokio::test]
    async fn fast_command_returns_success_inline() {
        let mut args = HashMap::new();
        args.insert("command".to_string(), json!("echo hi"));
        let outcome = BashTool.call(args, &test_ctx()).await.unwrap();
        assert_eq!(outcome.status_code, StatusCode::Success);
        assert_eq!(outcome.payload["stdout"], json!("hi\n"));
    }

    #[tokio::test]
    async fn unknown_job_id_is_not_found() {
        let mut args = HashMap::new();
        args.insert("job_id".to_string(), json!("missing"));
        let outcome = CheckBackgroundCommandTool.call(args, &test_ctx()).await.unwrap();
        assert_eq!(outcome.error_code.as_deref(), Some("job_not_found"));
    }
}
