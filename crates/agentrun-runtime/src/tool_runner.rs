use agentrun_core::{Directive, Message, StatusCode, ToolCall, ToolExecutionResult};

use crate::context::ToolContext;
use crate::dispatcher::dispatch;
use crate::registry::ToolRegistry;

/// Outcome of running every tool call of one cycle.
pub struct ToolRunOutcome {
    pub messages: Vec<Message>,
    pub results: Vec<ToolExecutionResult>,
    pub directive: Directive,
    pub pending_compress: bool,
    pub has_in_flight: bool,
}

/// Executes a cycle's tool calls sequentially, in declared order, and
/// converges their directives per the dominance rule (finish > wait_user >
/// continue). Checks cancellation before each call; the in-flight call is
/// allowed to finish but no further sibling calls are dispatched once
/// cancellation is observed.
pub async fn run_tool_calls(registry: &ToolRegistry, calls: &[ToolCall], ctx: &ToolContext) -> ToolRunOutcome {
    let mut messages = Vec::with_capacity(calls.len() * 2);
    let mut results = Vec::with_capacity(calls.len());
    let mut directive = Directive::Continue;
    let mut pending_compress = false;
    let mut has_in_flight = false;

    for call in calls {
        if ctx.cancellation.check() {
            break;
        }

        let result = dispatch(registry, call, ctx).await;

        if matches!(result.status_code, StatusCode::Running | StatusCode::BatchRunning) {
            has_in_flight = true;
        }
        if result.status_code == StatusCode::PendingCompress {
            pending_compress = true;
        }

        directive = directive.dominant(result.directive);

        messages.push(Message::tool_result(&result.tool_call_id, &result.content));
        if result.carries_image() {
            messages.push(announce_image(&result));
        }
        results.push(result);
    }

    ToolRunOutcome {
        messages,
        results,
        directive,
        pending_compress,
        has_in_flight,
    }
}

fn announce_image(result: &ToolExecutionResult) -> Message {
    let reference = result
        .image_url
        .clone()
        .or_else(|| result.image_path.clone())
        .unwrap_or_default();
    Message::user(format!("[image available from tool call {}: {}]", result.tool_call_id, reference))
}
