use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use agentrun_core::{
    CancellationToken, ChatClient, ChatOutcome, ChatRequest, CoreError, InMemoryStateStore, ToolCall,
};
use async_trait::async_trait;

use super::*;
use crate::builtin_tools::register_builtins;
use crate::config::AgentConfigBuilder;
use crate::memory::Summarizer;
use crate::registry::ToolRegistry;
use crate::task::AgentTaskBuilder;

/// Scripts one [`ChatOutcome`] per call, cycling the last entry once
/// exhausted so `max_cycles` scenarios don't need to pad the script.
struct ScriptedClient {
    outcomes: StdMutex<Vec<ChatOutcome>>,
    cursor: StdMutex<usize>,
}

impl ScriptedClient {
    fn new(outcomes: Vec<ChatOutcome>) -> Self {
        Self {
            outcomes: StdMutex::new(outcomes),
            cursor: StdMutex::new(0),
        }
    }

    fn tool_call(id: &str, name: &str, args: &str) -> ChatOutcome {
        ChatOutcome {
            content: String::new(),
            tool_calls: vec![ToolCall::new(id, name, args)],
            usage: None,
        }
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatOutcome, CoreError> {
        let outcomes = self.outcomes.lock().unwrap();
        let mut cursor = self.cursor.lock().unwrap();
        let idx = (*cursor).min(outcomes.len() - 1);
        *cursor += 1;
        Ok(outcomes[idx].clone())
    }
}

struct NoopSummarizer;

#[async_trait]
impl Summarizer for NoopSummarizer {
    async fn summarize(&self, messages: &[agentrun_core::Message]) -> Result<String, RuntimeError> {
        Ok(format!("summary of {} messages", messages.len()))
    }
}

fn config_with(client: ScriptedClient) -> Arc<AgentConfig> {
    let mut registry = ToolRegistry::new();
    register_builtins(&mut registry);
    Arc::new(
        AgentConfigBuilder::new(Arc::new(client), Arc::new(registry), Arc::new(NoopSummarizer))
            .with_state_store(Arc::new(InMemoryStateStore::new()))
            .build(),
    )
}

#[tokio::test]
async fn simple_completion_finishes_on_first_cycle() {
    let client = ScriptedClient::new(vec![ScriptedClient::tool_call("1", "task_finish", r#"{"answer":"hi"}"#)]);
    let config = config_with(client);
    let runtime = AgentRuntime::new(config);
    let task = AgentTaskBuilder::new("t1", "gpt-test")
        .system_prompt("you are helpful")
        .user_prompt("say hi then finish")
        .build();

    let result = runtime.run(task, CancellationToken::new(), None).await.unwrap();

    assert_eq!(result.status, TaskStatus::Completed);
    assert_eq!(result.final_answer.as_deref(), Some("hi"));
    assert_eq!(result.cycles.len(), 1);
}

#[tokio::test]
async fn wait_user_suspends_then_resume_completes() {
    let client = ScriptedClient::new(vec![ScriptedClient::tool_call("1", "ask_user", r#"{"question":"what is your name?"}"#)]);
    let config = config_with(client);
    let runtime = AgentRuntime::new(config);
    let task = AgentTaskBuilder::new("t2", "gpt-test").user_prompt("ask my name").build();

    let suspended = runtime.run(task, CancellationToken::new(), None).await.unwrap();
    assert_eq!(suspended.status, TaskStatus::WaitUser);
    assert_eq!(suspended.final_answer.as_deref(), Some("what is your name?"));

    let client2 = ScriptedClient::new(vec![ScriptedClient::tool_call("2", "task_finish", r#"{"answer":"hi Ada"}"#)]);
    let config2 = config_with(client2);
    let runtime2 = AgentRuntime::new(config2);
    let mut resumed_task = AgentTaskBuilder::new("t2", "gpt-test").build();
    resumed_task.messages.push(agentrun_core::Message::user("Ada"));
    let finished = runtime2.run(resumed_task, CancellationToken::new(), None).await.unwrap();
    assert_eq!(finished.status, TaskStatus::Completed);
    assert_eq!(finished.final_answer.as_deref(), Some("hi Ada"));
}

#[tokio::test]
async fn exceeding_max_cycles_yields_max_cycles_status() {
    let client = ScriptedClient::new(vec![ScriptedClient::tool_call("1", "todo_write", r#"{"todos":[]}"#)]);
    let config = config_with(client);
    let runtime = AgentRuntime::new(config);
    let task = AgentTaskBuilder::new("t3", "gpt-test").max_cycles(2).user_prompt("loop").build();

    let result = runtime.run(task, CancellationToken::new(), None).await.unwrap();
    assert_eq!(result.status, TaskStatus::MaxCycles);
    assert_eq!(result.cycles.len(), 2);
}

#[derive(Default)]
struct RecordingHook {
    compacted: StdMutex<Vec<(usize, usize)>>,
    finished: StdMutex<Vec<String>>,
}

#[async_trait]
impl crate::hooks::Hook for RecordingHook {
    async fn on_event(&self, event: &AgentEvent) {
        match event {
            AgentEvent::MemoryCompacted { before_len, after_len, .. } => {
                self.compacted.lock().unwrap().push((*before_len, *after_len));
            }
            AgentEvent::TaskFinished { status, .. } => {
                self.finished.lock().unwrap().push(status.clone());
            }
            _ => {}
        }
    }
}

fn config_with_hooks(client: ScriptedClient, hook: Arc<RecordingHook>) -> Arc<AgentConfig> {
    let mut registry = ToolRegistry::new();
    register_builtins(&mut registry);
    let mut hooks = crate::hooks::HookManager::new();
    hooks.register(hook);
    Arc::new(
        AgentConfigBuilder::new(Arc::new(client), Arc::new(registry), Arc::new(NoopSummarizer))
            .with_hooks(hooks)
            .build(),
    )
}

#[tokio::test]
async fn compress_memory_schedules_compaction_for_next_cycle() {
    let client = ScriptedClient::new(vec![
        ScriptedClient::tool_call("1", "compress_memory", "{}"),
        ScriptedClient::tool_call("2", "task_finish", r#"{"answer":"done"}"#),
    ]);
    let hook = Arc::new(RecordingHook::default());
    let config = config_with_hooks(client, hook.clone());
    let runtime = AgentRuntime::new(config);
    let task = AgentTaskBuilder::new("t5", "gpt-test").max_cycles(5).user_prompt("work").build();

    let result = runtime.run(task, CancellationToken::new(), None).await.unwrap();
    assert_eq!(result.status, TaskStatus::Completed);
    assert_eq!(
        hook.compacted.lock().unwrap().len(),
        1,
        "a PENDING_COMPRESS result must force a compaction pass at the start of the next cycle"
    );
}

#[tokio::test]
async fn per_task_memory_threshold_is_honored() {
    let client = ScriptedClient::new(vec![
        ScriptedClient::tool_call("1", "todo_write", r#"{"todos":[]}"#),
        ScriptedClient::tool_call("2", "task_finish", r#"{"answer":"done"}"#),
    ]);
    let hook = Arc::new(RecordingHook::default());
    let config = config_with_hooks(client, hook.clone());
    let runtime = AgentRuntime::new(config);
    let task = AgentTaskBuilder::new("t6", "gpt-test")
        .max_cycles(5)
        .user_prompt("work")
        .memory_compact_threshold(1)
        .build();

    let result = runtime.run(task, CancellationToken::new(), None).await.unwrap();
    assert_eq!(result.status, TaskStatus::Completed);
    assert!(
        !hook.compacted.lock().unwrap().is_empty(),
        "task.memory_compact_threshold must override the runtime-wide default"
    );
}

#[tokio::test]
async fn sub_task_cancellation_follows_parent_token() {
    let client = ScriptedClient::new(vec![ScriptedClient::tool_call("1", "todo_write", r#"{"todos":[]}"#)]);
    let hook = Arc::new(RecordingHook::default());
    let config = config_with_hooks(client, hook.clone());

    let mut sub_agents = std::collections::HashMap::new();
    sub_agents.insert(
        "kid".to_string(),
        crate::task::SubAgentSpec { model: "gpt-test".to_string(), system_prompt: String::new(), max_cycles: 5 },
    );
    let dispatcher = ChildDispatcher { config, sub_agents };

    let parent_cancel = CancellationToken::new();
    parent_cancel.cancel();
    let answer = dispatcher.run_sub_task("kid", "do it", &parent_cancel).await.unwrap();

    assert_eq!(answer, "", "a parent-cancelled child never reaches task_finish");
    assert!(
        hook.finished.lock().unwrap().iter().any(|s| s == "failed"),
        "the child must have run (and been cancelled), not been skipped entirely"
    );
}

#[tokio::test]
async fn todo_guard_blocks_finish_until_cleared() {
    let client = ScriptedClient::new(vec![
        ScriptedClient::tool_call("1", "todo_write", r#"{"todos":[{"title":"x","status":"pending"}]}"#),
        ScriptedClient::tool_call("2", "task_finish", r#"{"answer":"done"}"#),
    ]);
    let config = config_with(client);
    let runtime = AgentRuntime::new(config);
    let task = AgentTaskBuilder::new("t4", "gpt-test").max_cycles(5).user_prompt("work").build();

    let result = runtime.run(task, CancellationToken::new(), None).await.unwrap();
    assert_eq!(result.status, TaskStatus::MaxCycles);
    let first_cycle = &result.cycles[1];
    assert_eq!(first_cycle.tool_calls[0].1.error_code.as_deref(), Some("todo_incomplete"));
}
