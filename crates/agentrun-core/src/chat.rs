use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::message::Message;
use crate::tool::ToolCall;

/// Token accounting for one chat completion. Field names follow the
/// provider-agnostic convention of aliasing whatever vocabulary a given
/// backend actually emits (`prompt_tokens`, `input_tokens`,
/// `prompt_eval_count`, ...) onto a single stable shape.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(alias = "prompt_tokens", alias = "input_tokens")]
    pub input_tokens: u32,
    #[serde(alias = "completion_tokens", alias = "output_tokens")]
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// A JSON-schema tool descriptor advertised to the chat client for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Non-streaming result of one chat turn.
#[derive(Debug, Clone, Default)]
pub struct ChatOutcome {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<TokenUsage>,
}

/// An incremental piece of a streamed chat turn. Tool-call argument
/// fragments are never pushed to a caller-supplied stream sink directly;
/// only `Text` chunks are meant for incremental display.
#[derive(Debug, Clone)]
pub enum StreamChunk {
    Text(String),
    ToolCallStart { index: usize, id: String, name: String },
    ToolCallDelta { index: usize, id: Option<String>, fragment: String },
    Usage(TokenUsage),
    Done,
}

/// Request envelope for one chat turn. `options` carries opaque
/// provider-specific knobs (temperature, reasoning effort, ...); the
/// runtime never interprets them.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
    pub options: HashMap<String, Value>,
}

pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, CoreError>> + Send>>;

/// The external LLM transport the cycle runner drives. Implementations own
/// retry/failover across endpoints; once this call returns an error the
/// cycle treats it as terminal (`llm_endpoint_exhausted`).
#[async_trait]
pub trait ChatClient: Send + Sync {
    fn supports_streaming(&self) -> bool {
        false
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatOutcome, CoreError>;

    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream, CoreError> {
        let _ = request;
        Err(CoreError::Chat("streaming not implemented by this client".to_string()))
    }
}

/// Non-blocking sink for incremental text fragments from a streaming chat
/// turn. Must not block the streaming task.
pub trait StreamSink: Send + Sync {
    fn on_text(&self, fragment: &str);
}
