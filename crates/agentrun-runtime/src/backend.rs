//! Execution Backend: schedules where a task's cycle loop actually runs.
//! Three variants share one trait — inline (caller's own task), thread-pool
//! (a dedicated worker runtime), and distributed-queue (cycle-at-a-time work
//! items dispatched through a shared queue, rehydrated from a checkpoint on
//! whichever worker picks them up).
//!
//! Follows a background-join-handle pattern for wrapping a spawned future
//! behind a typed handle, and a session-store conflict taxonomy for the
//! checkpoint-version guard that keeps two workers from running the same
//! task's cycle concurrently.

use std::collections::VecDeque;
use std::sync::Arc;

use agentrun_core::{CancellationToken, StreamSink};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::capability::CapabilityFlags;
use crate::config::AgentConfig;
use crate::error::RuntimeError;
use crate::runtime::AgentRuntime;
use crate::task::{AgentResult, AgentTask};

/// Everything a backend needs beyond the task itself: the cancellation
/// token callers observe/trigger and an optional streaming sink. A thin
/// aggregation struct, not a trait, since its collaborators (state store,
/// hook manager) already live on `AgentConfig` and don't need a second home
/// here.
#[derive(Clone, Default)]
pub struct ExecutionContext {
    pub cancellation: CancellationToken,
    pub stream_sink: Option<Arc<dyn StreamSink>>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self { cancellation, stream_sink: None }
    }

    pub fn with_stream_sink(mut self, sink: Arc<dyn StreamSink>) -> Self {
        self.stream_sink = Some(sink);
        self
    }
}

/// A future-like handle to a task submitted via [`ExecutionBackend::submit_task`].
/// Wraps whatever join primitive the backend used internally so callers
/// never depend on a specific executor's handle type.
pub struct TaskHandle {
    inner: tokio::task::JoinHandle<Result<AgentResult, RuntimeError>>,
}

impl TaskHandle {
    pub async fn join(self) -> Result<AgentResult, RuntimeError> {
        match self.inner.await {
            Ok(result) => result,
            Err(join_err) => Err(RuntimeError::Internal(format!("task panicked: {join_err}"))),
        }
    }
}

/// Schedules a task's cycle loop. Implementations MUST guarantee at most
/// one cycle in flight per `task_id` at a time.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn run_task(&self, task: AgentTask, ctx: ExecutionContext) -> Result<AgentResult, RuntimeError>;

    fn submit_task(&self, task: AgentTask, ctx: ExecutionContext) -> TaskHandle;
}

/// The caller's own async task drives the cycle loop directly; `submit_task`
/// still hands back a joinable handle (via `tokio::spawn` on the ambient
/// runtime) so callers have one uniform API across backends, but nothing
/// here isolates execution onto a separate thread pool.
pub struct InlineBackend {
    config: Arc<AgentConfig>,
}

impl InlineBackend {
    pub fn new(config: Arc<AgentConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ExecutionBackend for InlineBackend {
    async fn run_task(&self, task: AgentTask, ctx: ExecutionContext) -> Result<AgentResult, RuntimeError> {
        AgentRuntime::new(self.config.clone()).run(task, ctx.cancellation, ctx.stream_sink).await
    }

    fn submit_task(&self, task: AgentTask, ctx: ExecutionContext) -> TaskHandle {
        let config = self.config.clone();
        let inner = tokio::spawn(async move { AgentRuntime::new(config).run(task, ctx.cancellation, ctx.stream_sink).await });
        TaskHandle { inner }
    }
}

/// Runs every task's cycle loop on a dedicated, owned `tokio::runtime::Runtime`,
/// isolating the agent workload from whatever executor the caller happens to
/// be on. Cancellation still crosses the boundary freely since the token is
/// just a cloneable handle into a shared cell.
pub struct ThreadPoolBackend {
    config: Arc<AgentConfig>,
    pool: Arc<tokio::runtime::Runtime>,
}

impl ThreadPoolBackend {
    pub fn new(config: Arc<AgentConfig>, worker_threads: usize) -> Result<Self, RuntimeError> {
        let pool = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("agentrun-worker")
            .enable_all()
            .build()
            .map_err(|e| RuntimeError::Internal(e.to_string()))?;
        Ok(Self { config, pool: Arc::new(pool) })
    }
}

#[async_trait]
impl ExecutionBackend for ThreadPoolBackend {
    async fn run_task(&self, task: AgentTask, ctx: ExecutionContext) -> Result<AgentResult, RuntimeError> {
        self.submit_task(task, ctx).join().await
    }

    fn submit_task(&self, task: AgentTask, ctx: ExecutionContext) -> TaskHandle {
        let config = self.config.clone();
        let inner = self
            .pool
            .spawn(async move { AgentRuntime::new(config).run(task, ctx.cancellation, ctx.stream_sink).await });
        TaskHandle { inner }
    }
}

/// A serializable bundle letting a worker with no prior memory of a task
/// rebuild an equivalent runtime configuration for it: which backend kind
/// dispatched the work, the model to call, the capability flags, and cycle
/// bounds. Workers resolve `settings_path` (and any workspace handle) into
/// a concrete `AgentConfig`/workspace through their own local wiring — that
/// resolution is the external-collaborator boundary this crate does not
/// cross.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeRecipe {
    pub settings_path: Option<String>,
    pub backend_name: String,
    pub model: String,
    pub max_cycles: u32,
    pub memory_compact_threshold: usize,
    pub memory_threshold_percentage: f64,
    pub capabilities: CapabilityFlags,
}

impl RuntimeRecipe {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            settings_path: None,
            backend_name: "distributed-queue".to_string(),
            model: model.into(),
            max_cycles: 20,
            memory_compact_threshold: 128_000,
            memory_threshold_percentage: 90.0,
            capabilities: CapabilityFlags::default(),
        }
    }
}

/// One independent unit of dispatch: "run the next cycle of this task,
/// rebuilding it from `recipe` and whatever checkpoint is in the state
/// store".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleWorkItem {
    pub task_id: String,
    pub recipe: RuntimeRecipe,
}

/// The shared dispatch queue distributed workers pull cycle work items
/// from. An in-memory FIFO is provided for single-process testing; a real
/// deployment backs this with whatever message broker the embedder already
/// runs (SQS, Redis, Postgres `SKIP LOCKED`, ...) — wiring that in is an
/// external-collaborator concern this crate only specifies the contract for.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, item: CycleWorkItem) -> Result<(), RuntimeError>;
    async fn dequeue(&self) -> Result<Option<CycleWorkItem>, RuntimeError>;
}

#[derive(Default)]
pub struct InMemoryTaskQueue {
    items: Mutex<VecDeque<CycleWorkItem>>,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, item: CycleWorkItem) -> Result<(), RuntimeError> {
        self.items.lock().push_back(item);
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<CycleWorkItem>, RuntimeError> {
        Ok(self.items.lock().pop_front())
    }
}

/// Dispatches one cycle at a time through a [`TaskQueue`], guarding against
/// two workers racing the same `task_id` via the state store's checkpoint
/// version counter. With no queue configured, falls back to running the
/// task inline in the submitting process (the "inline fallback" sub-mode
/// for when no distributed queue wiring is present).
pub struct DistributedQueueBackend {
    config: Arc<AgentConfig>,
    queue: Option<Arc<dyn TaskQueue>>,
    recipe: RuntimeRecipe,
}

impl DistributedQueueBackend {
    /// Inline-fallback mode: no queue, cycles run in the calling process
    /// exactly like [`InlineBackend`].
    pub fn inline_fallback(config: Arc<AgentConfig>, recipe: RuntimeRecipe) -> Self {
        Self { config, queue: None, recipe }
    }

    pub fn with_queue(config: Arc<AgentConfig>, queue: Arc<dyn TaskQueue>, recipe: RuntimeRecipe) -> Self {
        Self { config, queue: Some(queue), recipe }
    }

    /// Drains one work item and drives that task to a terminal or suspended
    /// state. `AgentRuntime::run` has no single-cycle entry point, so a
    /// worker claiming a work item currently runs the whole remaining cycle
    /// loop rather than one cycle and a re-enqueue; the checkpoint it
    /// persists along the way is still what a concurrent worker's version
    /// check would catch. Workers call this in a loop; it returns `Ok(false)`
    /// when the queue is empty so the caller can back off.
    pub async fn run_one(&self) -> Result<bool, RuntimeError> {
        let Some(queue) = self.queue.as_ref() else {
            return Ok(false);
        };
        let Some(item) = queue.dequeue().await? else {
            return Ok(false);
        };

        let store = self
            .config
            .state_store
            .as_ref()
            .ok_or_else(|| RuntimeError::Internal("distributed backend requires a state store".to_string()))?;

        let (checkpoint, version) = store
            .load(&item.task_id)
            .await?
            .ok_or_else(|| RuntimeError::Internal(format!("no checkpoint for task {}", item.task_id)))?;

        if checkpoint.is_terminal() {
            return Ok(true);
        }

        let task = AgentTask {
            task_id: item.task_id.clone(),
            model: item.recipe.model.clone(),
            messages: checkpoint.messages,
            max_cycles: item.recipe.max_cycles,
            memory_compact_threshold: item.recipe.memory_compact_threshold,
            memory_threshold_percentage: item.recipe.memory_threshold_percentage,
            capabilities: item.recipe.capabilities,
            sub_agents: Default::default(),
            workspace: None,
            metadata: Default::default(),
        };

        let runtime = AgentRuntime::new(self.config.clone());
        let _ = runtime.run(task, CancellationToken::new(), None).await?;

        // `run` drives the task all the way to a terminal/suspended state and
        // persists that checkpoint itself (with its own optimistic-concurrency
        // check, surfaced above via `?`), so there is never a non-terminal
        // outcome left to re-enqueue here.
        let _ = version;

        Ok(true)
    }
}

#[async_trait]
impl ExecutionBackend for DistributedQueueBackend {
    async fn run_task(&self, task: AgentTask, ctx: ExecutionContext) -> Result<AgentResult, RuntimeError> {
        if self.queue.is_none() {
            return AgentRuntime::new(self.config.clone()).run(task, ctx.cancellation, ctx.stream_sink).await;
        }
        // Distributed mode still lets the submitter block on the result: the
        // first cycle seeds a checkpoint, enqueues it, then workers drive it
        // to completion while this call polls the state store.
        self.submit_task(task, ctx).join().await
    }

    fn submit_task(&self, task: AgentTask, ctx: ExecutionContext) -> TaskHandle {
        if self.queue.is_none() {
            let config = self.config.clone();
            let inner = tokio::spawn(async move { AgentRuntime::new(config).run(task, ctx.cancellation, ctx.stream_sink).await });
            return TaskHandle { inner };
        }

        let config = self.config.clone();
        let queue = self.queue.clone().unwrap();
        let recipe = self.recipe.clone();
        let inner = tokio::spawn(async move { seed_and_poll(config, queue, recipe, task).await });
        TaskHandle { inner }
    }
}

async fn seed_and_poll(
    config: Arc<AgentConfig>,
    queue: Arc<dyn TaskQueue>,
    recipe: RuntimeRecipe,
    task: AgentTask,
) -> Result<AgentResult, RuntimeError> {
    let store = config
        .state_store
        .as_ref()
        .ok_or_else(|| RuntimeError::Internal("distributed backend requires a state store".to_string()))?;

    let checkpoint = agentrun_core::Checkpoint::new(&task.task_id, task.messages.clone());
    store.save(checkpoint, None).await?;
    queue
        .enqueue(CycleWorkItem { task_id: task.task_id.clone(), recipe })
        .await?;

    loop {
        if let Some((checkpoint, _)) = store.load(&task.task_id).await? {
            if let Some(status) = checkpoint.status.as_deref() {
                return Ok(AgentResult {
                    task_id: task.task_id.clone(),
                    status: parse_status(status),
                    final_answer: checkpoint.final_answer,
                    cycles: Vec::new(),
                    total_usage: checkpoint.total_usage,
                    failure_reason: None,
                });
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
}

fn parse_status(slug: &str) -> crate::task::TaskStatus {
    use crate::task::TaskStatus;
    match slug {
        "completed" => TaskStatus::Completed,
        "wait_user" => TaskStatus::WaitUser,
        "max_cycles" => TaskStatus::MaxCycles,
        _ => TaskStatus::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin_tools::register_builtins;
    use crate::config::AgentConfigBuilder;
    use crate::memory::Summarizer;
    use crate::registry::ToolRegistry;
    use crate::task::AgentTaskBuilder;
    use agentrun_core::{ChatClient, ChatOutcome, ChatRequest, CoreError, InMemoryStateStore, Message, ToolCall};
    use async_trait::async_trait;

    struct FinishImmediately;

    #[async_trait]
    impl ChatClient for FinishImmediately {
        async fn chat(&self, _request: ChatRequest) -> Result<ChatOutcome, CoreError> {
            Ok(ChatOutcome {
                content: String::new(),
                tool_calls: vec![ToolCall::new("1", "task_finish", r#"{"answer":"ok"}"#)],
                usage: None,
            })
        }
    }

    struct NoopSummarizer;

    #[async_trait]
    impl Summarizer for NoopSummarizer {
        async fn summarize(&self, _messages: &[Message]) -> Result<String, crate::error::RuntimeError> {
            Ok(String::new())
        }
    }

    fn config() -> Arc<AgentConfig> {
        let mut registry = ToolRegistry::new();
        register_builtins(&mut registry);
        Arc::new(
            AgentConfigBuilder::new(Arc::new(FinishImmediately), Arc::new(registry), Arc::new(NoopSummarizer))
                .with_state_store(Arc::new(InMemoryStateStore::new()))
                .build(),
        )
    }

    #[tokio::test]
    async fn inline_backend_runs_task_to_completion() {
        let backend = InlineBackend::new(config());
        let task = AgentTaskBuilder::new("t1", "m").user_prompt("go").build();
        let result = backend.run_task(task, ExecutionContext::new()).await.unwrap();
        assert_eq!(result.status, crate::task::TaskStatus::Completed);
    }

    #[tokio::test]
    async fn inline_backend_submit_task_is_joinable() {
        let backend = InlineBackend::new(config());
        let task = AgentTaskBuilder::new("t2", "m").user_prompt("go").build();
        let handle = backend.submit_task(task, ExecutionContext::new());
        let result = handle.join().await.unwrap();
        assert_eq!(result.status, crate::task::TaskStatus::Completed);
    }

    #[tokio::test]
    async fn distributed_backend_without_queue_falls_back_to_inline() {
        let backend = DistributedQueueBackend::inline_fallback(config(), RuntimeRecipe::new("m"));
        let task = AgentTaskBuilder::new("t3", "m").user_prompt("go").build();
        let result = backend.run_task(task, ExecutionContext::new()).await.unwrap();
        assert_eq!(result.status, crate::task::TaskStatus::Completed);
    }

    #[tokio::test]
    async fn in_memory_queue_round_trips_a_work_item() {
        let queue = InMemoryTaskQueue::new();
        assert!(queue.dequeue().await.unwrap().is_none());
        queue
            .enqueue(CycleWorkItem { task_id: "t1".to_string(), recipe: RuntimeRecipe::new("m") })
            .await
            .unwrap();
        let item = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(item.task_id, "t1");
        assert!(queue.dequeue().await.unwrap().is_none());
    }
}
