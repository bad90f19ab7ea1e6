//! Small CLI driving [`agentrun_runtime::AgentRuntime`] against a scripted
//! chat client, to exercise the crate the way a host application would
//! rather than through its test suite.
//!
//! `run` drives a task to completion. `cancel` starts a task whose scripted
//! client is deliberately slow and cancels it partway through, exercising
//! [`agentrun_core::CancellationToken`] against an in-flight streaming call.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use agentrun_core::{CancellationToken, ChatClient, ChatOutcome, ChatRequest, CoreError, ToolCall};
use agentrun_runtime::{AgentConfigBuilder, AgentRuntime, AgentTaskBuilder, RuntimeError, Summarizer};
use async_trait::async_trait;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "agentrun-demo")]
#[command(about = "Drive agentrun-runtime against a scripted chat client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a short scripted task to completion and print the result.
    Run,
    /// Start a task whose chat client is slow, then cancel it partway
    /// through to show the runtime unwinding promptly.
    Cancel {
        /// How long to let the task run before cancelling, in milliseconds.
        #[arg(long, default_value_t = 150)]
        after_ms: u64,
    },
}

/// Cycles a fixed script of tool calls, sleeping `call_delay` before each
/// reply so the `cancel` demo has time to observe an in-flight call.
struct ScriptedClient {
    script: StdMutex<Vec<ChatOutcome>>,
    call_delay: Duration,
}

impl ScriptedClient {
    fn new(script: Vec<ChatOutcome>, call_delay: Duration) -> Self {
        Self { script: StdMutex::new(script), call_delay }
    }

    fn tool_call(id: &str, name: &str, args: &str) -> ChatOutcome {
        ChatOutcome { content: String::new(), tool_calls: vec![ToolCall::new(id, name, args)], usage: None }
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatOutcome, CoreError> {
        tokio::time::sleep(self.call_delay).await;
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            return Err(CoreError::Chat("demo script exhausted".to_string()));
        }
        Ok(script.remove(0))
    }
}

struct DemoSummarizer;

#[async_trait]
impl Summarizer for DemoSummarizer {
    async fn summarize(&self, messages: &[agentrun_core::Message]) -> Result<String, RuntimeError> {
        Ok(format!("[demo summary of {} messages]", messages.len()))
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("agentrun_demo=info".parse().unwrap()))
        .init();
}

fn runtime_for(client: ScriptedClient) -> AgentRuntime {
    let mut registry = agentrun_runtime::ToolRegistry::new();
    agentrun_runtime::builtin_tools::register_builtins(&mut registry);
    let config = AgentConfigBuilder::new(Arc::new(client), Arc::new(registry), Arc::new(DemoSummarizer)).build();
    AgentRuntime::new(Arc::new(config))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Run => {
            let client = ScriptedClient::new(
                vec![ScriptedClient::tool_call("1", "task_finish", r#"{"answer":"demo task complete"}"#)],
                Duration::from_millis(10),
            );
            let runtime = runtime_for(client);
            let task = AgentTaskBuilder::new("demo-run", "demo-model")
                .system_prompt("you are a scripted demo agent")
                .user_prompt("say hello then finish")
                .build();

            let result = runtime.run(task, CancellationToken::new(), None).await?;
            println!("status: {:?}", result.status);
            println!("final answer: {:?}", result.final_answer);
            println!("cycles run: {}", result.cycles.len());
        }
        Command::Cancel { after_ms } => {
            let client = ScriptedClient::new(
                vec![
                    ScriptedClient::tool_call("1", "todo_write", r#"{"todos":[{"title":"step one","status":"in_progress"}]}"#),
                    ScriptedClient::tool_call("2", "todo_write", r#"{"todos":[{"title":"step one","status":"in_progress"}]}"#),
                    ScriptedClient::tool_call("3", "todo_write", r#"{"todos":[{"title":"step one","status":"in_progress"}]}"#),
                ],
                Duration::from_millis(80),
            );
            let runtime = runtime_for(client);
            let task = AgentTaskBuilder::new("demo-cancel", "demo-model")
                .max_cycles(50)
                .user_prompt("keep working slowly")
                .build();

            let cancellation = CancellationToken::new();
            let canceller = cancellation.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(after_ms)).await;
                tracing::info!("cancelling task after {after_ms}ms");
                canceller.cancel();
            });

            let result = runtime.run(task, cancellation, None).await?;
            println!("status: {:?}", result.status);
            println!("failure reason: {:?}", result.failure_reason);
            println!("cycles run before cancellation: {}", result.cycles.len());
        }
    }

    Ok(())
}
