//! Top-level task state machine: composes the memory manager, cycle runner,
//! tool call runner, and hook manager into the `pending -> running ->
//! {completed, wait_user, failed, max_cycles}` lifecycle, and implements
//! `SubAgentDispatcher` so the built-in `create_sub_task` / `batch_sub_tasks`
//! tools have somewhere to delegate to.
//!
//! Shaped as one struct driving one task's lifecycle against shared,
//! injected collaborators (chat client, registry, hooks, state store) owned
//! by `AgentConfig`, rather than any process-wide singleton.

use std::collections::HashMap;
use std::sync::Arc;

use agentrun_core::{Checkpoint, Directive, Message, StatusCode, TokenUsage};
use async_trait::async_trait;
use futures::future::join_all;

use crate::config::AgentConfig;
use crate::context::{SubAgentDispatcher, ToolContext};
use crate::cycle::CycleRunner;
use crate::error::RuntimeError;
use crate::hooks::{AgentEvent, HookPoint};
use crate::memory::MemoryManager;
use crate::planner::ToolPlanner;
use crate::task::{AgentResult, AgentTask, CycleRecord, TaskStatus};
use crate::tool_runner::run_tool_calls;

/// Drives a single [`AgentTask`] from `pending` to a terminal or suspended
/// state. Holds only a reference to the shared [`AgentConfig`]; task-local
/// mutable state (message list, cycle index, background jobs, todos) lives
/// on the task and a per-run [`ToolContext`] built fresh each cycle.
pub struct AgentRuntime {
    config: Arc<AgentConfig>,
}

impl AgentRuntime {
    pub fn new(config: Arc<AgentConfig>) -> Self {
        Self { config }
    }

    /// Runs `task` to completion, suspension, or failure. `cancellation` and
    /// `stream_sink` come from the caller's Execution Context (`backend.rs`
    /// owns aggregating those with the state store and hook manager).
    #[tracing::instrument(skip_all, fields(task_id = %task.task_id))]
    pub async fn run(
        &self,
        mut task: AgentTask,
        cancellation: agentrun_core::CancellationToken,
        stream_sink: Option<Arc<dyn agentrun_core::StreamSink>>,
    ) -> Result<AgentResult, RuntimeError> {
        self.config
            .hooks
            .publish(AgentEvent::SessionCreated { task_id: task.task_id.clone() })
            .await;

        let background_jobs = crate::background::BackgroundJobRegistry::new();
        let todos = crate::builtin_tools::todo::TodoList::new();
        let sub_agents: Option<Arc<dyn SubAgentDispatcher>> = if task.sub_agents.is_empty() {
            None
        } else {
            Some(Arc::new(self.child_dispatcher(&task)))
        };

        let mut cycles: Vec<CycleRecord> = Vec::new();
        let mut total_usage = TokenUsage::default();
        let mut prev_usage: Option<TokenUsage> = None;
        let mut memory_recent_from = 0usize;
        let mut force_compact = false;

        let memory = MemoryManager::new(self.config.default_memory_config.for_task(&task));

        loop {
            if cancellation.check() {
                let result = self.finalize(task.task_id.clone(), TaskStatus::Failed, cycles, total_usage, Some("cancelled".to_string()));
                self.config
                    .hooks
                    .publish(AgentEvent::TaskFinished { task_id: result.task_id.clone(), status: "failed".to_string() })
                    .await;
                return Ok(result);
            }

            let effective_len = memory.effective_length(&task.messages, prev_usage, memory_recent_from);
            let usage_pct = memory.usage_percentage(effective_len);

            if force_compact || memory.needs_compaction(effective_len) {
                force_compact = false;
                self.config.hooks.fire(HookPoint::BeforeMemoryCompact).await;
                let before_len = task.messages.len();
                task.messages = memory.compact(task.messages, self.config.summarizer.as_ref()).await?;
                let after_len = task.messages.len();
                memory_recent_from = task.messages.len();
                prev_usage = None;
                self.config.hooks.fire(HookPoint::AfterMemoryCompact).await;
                self.config
                    .hooks
                    .publish(AgentEvent::MemoryCompacted { task_id: task.task_id.clone(), before_len, after_len })
                    .await;
            }

            let cycle_index = cycles.len() as u32 + 1;
            self.config
                .hooks
                .publish(AgentEvent::CycleStarted { task_id: task.task_id.clone(), cycle_index })
                .await;

            let tool_ctx = ToolContext {
                task_id: task.task_id.clone(),
                cycle_index,
                cancellation: cancellation.clone(),
                workspace: task.workspace.clone(),
                capabilities: task.capabilities,
                memory_usage_percentage: usage_pct,
                sub_agents: sub_agents.clone(),
                background_jobs: background_jobs.clone(),
                todos: todos.clone(),
                metadata: task.metadata.clone(),
            };

            let tools = ToolPlanner::plan(
                &self.config.registry,
                task.capabilities,
                !task.sub_agents.is_empty(),
                usage_pct,
                task.memory_threshold_percentage,
            );

            self.config.hooks.fire(HookPoint::BeforeLlm).await;
            let mut runner = CycleRunner::new(self.config.chat_client.as_ref());
            if let Some(sink) = stream_sink.as_deref() {
                runner = runner.with_stream_sink(sink);
            }
            let turn = runner.run_turn(&task.model, task.messages.clone(), tools).await?;
            self.config.hooks.fire(HookPoint::AfterLlm).await;

            task.messages.push(turn.assistant_message.clone());

            self.config.hooks.fire(HookPoint::BeforeToolCall).await;
            for call in &turn.tool_calls {
                self.config
                    .hooks
                    .publish(AgentEvent::ToolCallStart {
                        task_id: task.task_id.clone(),
                        tool_call_id: call.id.clone(),
                        name: call.name.clone(),
                    })
                    .await;
            }
            let tool_outcome = run_tool_calls(&self.config.registry, &turn.tool_calls, &tool_ctx).await;
            for result in &tool_outcome.results {
                self.config
                    .hooks
                    .publish(AgentEvent::ToolCallEnd {
                        task_id: task.task_id.clone(),
                        tool_call_id: result.tool_call_id.clone(),
                        status: format!("{:?}", result.status_code),
                    })
                    .await;
            }
            self.config.hooks.fire(HookPoint::AfterToolCall).await;

            task.messages.extend(tool_outcome.messages);

            let cycle_usage = turn.usage.unwrap_or_default();
            total_usage.add(cycle_usage);
            prev_usage = turn.usage;

            let record = CycleRecord {
                index: cycle_index,
                assistant_message: turn.assistant_message,
                tool_calls: turn.tool_calls.into_iter().zip(tool_outcome.results.clone()).collect(),
                usage: cycle_usage,
            };
            cycles.push(record);

            self.persist_checkpoint(&task, cycle_index, None).await?;

            if tool_outcome.has_in_flight {
                // A RUNNING/BATCH_RUNNING result is outstanding; the LLM is
                // expected to poll it next cycle rather than the runtime
                // forcing a terminal state here.
            }

            if tool_outcome.pending_compress {
                force_compact = true;
            }

            match tool_outcome.directive {
                Directive::Finish => {
                    let final_answer = extract_final_answer(&cycles, Directive::Finish);
                    let mut result = self.finalize(task.task_id.clone(), TaskStatus::Completed, cycles, total_usage, None);
                    result.final_answer = final_answer;
                    self.persist_checkpoint(&task, cycle_index, Some(&result)).await?;
                    self.config
                        .hooks
                        .publish(AgentEvent::TaskFinished { task_id: result.task_id.clone(), status: "completed".to_string() })
                        .await;
                    return Ok(result);
                }
                Directive::WaitUser => {
                    let final_answer = extract_final_answer(&cycles, Directive::WaitUser);
                    let mut result = self.finalize(task.task_id.clone(), TaskStatus::WaitUser, cycles, total_usage, None);
                    result.final_answer = final_answer;
                    self.persist_checkpoint(&task, cycle_index, Some(&result)).await?;
                    self.config
                        .hooks
                        .publish(AgentEvent::TaskFinished { task_id: result.task_id.clone(), status: "wait_user".to_string() })
                        .await;
                    return Ok(result);
                }
                Directive::Continue => {
                    if cycle_index >= task.max_cycles {
                        let result = self.finalize(task.task_id.clone(), TaskStatus::MaxCycles, cycles, total_usage, Some("max_cycles_exceeded".to_string()));
                        self.persist_checkpoint(&task, cycle_index, Some(&result)).await?;
                        self.config
                            .hooks
                            .publish(AgentEvent::TaskFinished { task_id: result.task_id.clone(), status: "max_cycles".to_string() })
                            .await;
                        return Ok(result);
                    }
                }
            }
        }
    }

    fn finalize(
        &self,
        task_id: String,
        status: TaskStatus,
        cycles: Vec<CycleRecord>,
        total_usage: TokenUsage,
        failure_reason: Option<String>,
    ) -> AgentResult {
        AgentResult {
            task_id,
            status,
            final_answer: None,
            cycles,
            total_usage,
            failure_reason,
        }
    }

    async fn persist_checkpoint(&self, task: &AgentTask, cycle_index: u32, terminal: Option<&AgentResult>) -> Result<(), RuntimeError> {
        let Some(store) = self.config.state_store.as_ref() else {
            return Ok(());
        };

        let previous_version = store.load(&task.task_id).await?.map(|(_, v)| v);
        let mut checkpoint = Checkpoint::new(&task.task_id, task.messages.clone());
        checkpoint.cycle_index = cycle_index;
        if let Some(result) = terminal {
            checkpoint.status = Some(status_slug(result.status));
            checkpoint.final_answer = result.final_answer.clone();
            checkpoint.total_usage = result.total_usage;
        }

        match store.save(checkpoint, previous_version).await {
            Ok(_) => Ok(()),
            Err(agentrun_core::CoreError::CheckpointConflict { expected, actual }) => {
                Err(RuntimeError::CheckpointConflict { expected, actual })
            }
            Err(other) => Err(RuntimeError::Core(other)),
        }
    }

    /// Builds the dispatcher handed to tool context for this task's
    /// configured sub-agents. The child holds only this runtime's config and
    /// the parent's sub-agent map, never the parent's live task state.
    fn child_dispatcher(&self, task: &AgentTask) -> ChildDispatcher {
        ChildDispatcher {
            config: self.config.clone(),
            sub_agents: task.sub_agents.clone(),
        }
    }
}

fn status_slug(status: TaskStatus) -> String {
    match status {
        TaskStatus::Completed => "completed",
        TaskStatus::WaitUser => "wait_user",
        TaskStatus::Failed => "failed",
        TaskStatus::MaxCycles => "max_cycles",
    }
    .to_string()
}

/// Pulls `final_answer` from the tool argument that produced the winning
/// directive (`task_finish.answer`, or `ask_user.question` for wait_user),
/// never from raw assistant text.
fn extract_final_answer(cycles: &[CycleRecord], directive: Directive) -> Option<String> {
    for record in cycles.iter().rev() {
        for (call, result) in &record.tool_calls {
            if result.status_code == StatusCode::Error {
                continue;
            }
            let matches = match directive {
                Directive::Finish => call.name == "task_finish",
                Directive::WaitUser => call.name == "ask_user",
                Directive::Continue => false,
            };
            if !matches {
                continue;
            }
            let payload: serde_json::Value = serde_json::from_str(&result.content).ok()?;
            let key = if call.name == "task_finish" { "answer" } else { "question" };
            return payload.get(key).and_then(|v| v.as_str()).map(str::to_string);
        }
    }
    None
}

/// Dispatches `create_sub_task` / `batch_sub_tasks` by constructing a fresh
/// child [`AgentRuntime`] per call, sharing only the parent's config (chat
/// client, registry, hooks, state store) — never the parent's message list,
/// cycle index, or cancellation token itself (each child runs under a
/// [`agentrun_core::CancellationToken::child`] of whatever token the calling
/// cycle passes in, so a parent cancel reaches it without the child holding
/// a reference back to the parent's live task state).
struct ChildDispatcher {
    config: Arc<AgentConfig>,
    sub_agents: HashMap<String, crate::task::SubAgentSpec>,
}

impl ChildDispatcher {
    fn build_task(&self, agent_name: &str, prompt: &str) -> Result<AgentTask, RuntimeError> {
        let spec = self
            .sub_agents
            .get(agent_name)
            .ok_or_else(|| RuntimeError::UnknownSubAgent(agent_name.to_string()))?;
        let task_id = format!("{agent_name}-{}", uuid::Uuid::new_v4());
        Ok(crate::task::AgentTaskBuilder::new(task_id, spec.model.clone())
            .system_prompt(spec.system_prompt.clone())
            .user_prompt(prompt.to_string())
            .max_cycles(spec.max_cycles)
            .build())
    }
}

#[async_trait]
impl SubAgentDispatcher for ChildDispatcher {
    async fn run_sub_task(
        &self,
        agent_name: &str,
        prompt: &str,
        cancellation: &agentrun_core::CancellationToken,
    ) -> Result<String, agentrun_core::CoreError> {
        let task = self
            .build_task(agent_name, prompt)
            .map_err(|e| agentrun_core::CoreError::Store(e.to_string()))?;
        let child = AgentRuntime::new(self.config.clone());
        let result = child
            .run(task, cancellation.child(), None)
            .await
            .map_err(|e| agentrun_core::CoreError::Store(e.to_string()))?;
        Ok(result.final_answer.unwrap_or_default())
    }

    /// Runs every `(agent_name, prompt)` pair concurrently via `join_all`,
    /// returning answers in call order regardless of which child finishes
    /// first. Each child gets its own descendant of `cancellation` so
    /// cancelling the parent cycle cancels every in-flight child.
    async fn run_batch(
        &self,
        tasks: Vec<(String, String)>,
        cancellation: &agentrun_core::CancellationToken,
    ) -> Result<Vec<String>, agentrun_core::CoreError> {
        let futures = tasks
            .into_iter()
            .map(|(agent_name, prompt)| async move { self.run_sub_task(&agent_name, &prompt, cancellation).await });
        join_all(futures).await.into_iter().collect()
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
