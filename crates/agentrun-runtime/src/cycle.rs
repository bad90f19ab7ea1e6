use agentrun_core::tool::ToolCallAggregator;
use agentrun_core::{ChatClient, ChatRequest, Message, StreamChunk, StreamSink, TokenUsage, ToolCall, ToolSchema};
use futures::StreamExt;

use crate::error::RuntimeError;

/// The hint injected when a cycle produces neither a tool call nor a
/// terminal directive, so the model is never left silently stalled.
pub const CONTINUE_HINT: &str =
    "Continue working toward the goal, or call task_finish / ask_user if you are done.";

/// Output of one [`CycleRunner::run_turn`] call: the assistant message to
/// append and the tool calls it requested.
#[derive(Debug, Clone)]
pub struct CycleTurn {
    pub assistant_message: Message,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<TokenUsage>,
}

pub struct CycleRunner<'a> {
    pub chat_client: &'a dyn ChatClient,
    pub stream_sink: Option<&'a dyn StreamSink>,
}

impl<'a> CycleRunner<'a> {
    pub fn new(chat_client: &'a dyn ChatClient) -> Self {
        Self { chat_client, stream_sink: None }
    }

    pub fn with_stream_sink(mut self, sink: &'a dyn StreamSink) -> Self {
        self.stream_sink = Some(sink);
        self
    }

    pub async fn run_turn(&self, model: &str, messages: Vec<Message>, tools: Vec<ToolSchema>) -> Result<CycleTurn, RuntimeError> {
        let request = ChatRequest {
            model: model.to_string(),
            messages,
            tools,
            options: Default::default(),
        };

        let mut turn = if self.chat_client.supports_streaming() {
            self.run_streaming(request).await?
        } else {
            self.run_non_streaming(request).await?
        };

        if turn.tool_calls.is_empty() && turn.assistant_message.content.trim().is_empty() {
            turn.assistant_message.content = CONTINUE_HINT.to_string();
        }
        Ok(turn)
    }

    async fn run_non_streaming(&self, request: ChatRequest) -> Result<CycleTurn, RuntimeError> {
        let outcome = self
            .chat_client
            .chat(request)
            .await
            .map_err(|e| RuntimeError::LlmEndpointExhausted(e.to_string()))?;
        let assistant_message = Message::assistant_with_tool_calls(outcome.content, outcome.tool_calls.clone());
        Ok(CycleTurn {
            assistant_message,
            tool_calls: outcome.tool_calls,
            usage: outcome.usage,
        })
    }

    async fn run_streaming(&self, request: ChatRequest) -> Result<CycleTurn, RuntimeError> {
        let mut stream = self
            .chat_client
            .chat_stream(request)
            .await
            .map_err(|e| RuntimeError::LlmEndpointExhausted(e.to_string()))?;

        let mut text = String::new();
        let mut aggregator = ToolCallAggregator::new();
        let mut usage = None;

        while let Some(chunk) = stream.next().await {
            match chunk.map_err(|e| RuntimeError::LlmEndpointExhausted(e.to_string()))? {
                StreamChunk::Text(fragment) => {
                    if let Some(sink) = self.stream_sink {
                        sink.on_text(&fragment);
                    }
                    text.push_str(&fragment);
                }
                StreamChunk::ToolCallStart { index, id, name } => aggregator.start(index, id, name),
                StreamChunk::ToolCallDelta { index, id, fragment } => {
                    aggregator.push_fragment(index, id.as_deref(), &fragment);
                }
                StreamChunk::Usage(u) => usage = Some(u),
                StreamChunk::Done => break,
            }
        }

        let tool_calls = aggregator.finish();
        let assistant_message = Message::assistant_with_tool_calls(text, tool_calls.clone());
        Ok(CycleTurn { assistant_message, tool_calls, usage })
    }
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::sync::Mutex;

    use agentrun_core::{ChatOutcome, ChatStream, CoreError};
    use async_trait::async_trait;
    use futures::stream;

    use super::*;

    struct FakeClient {
        streaming: bool,
        outcome: ChatOutcome,
    }

    #[async_trait]
    impl ChatClient for FakeClient {
        fn supports_streaming(&self) -> bool {
            self.streaming
        }

        async fn chat(&self, _request: ChatRequest) -> Result<ChatOutcome, CoreError> {
            Ok(self.outcome.clone())
        }

        async fn chat_stream(&self, _request: ChatRequest) -> Result<ChatStream, CoreError> {
            let chunks = vec![
                Ok(StreamChunk::Text("hel".to_string())),
                Ok(StreamChunk::Text("lo".to_string())),
                Ok(StreamChunk::ToolCallStart { index: 0, id: "c1".to_string(), name: "task_finish".to_string() }),
                Ok(StreamChunk::ToolCallDelta { index: 0, id: None, fragment: r#"{"answer":"hi"}"#.to_string() }),
                Ok(StreamChunk::Done),
            ];
            let boxed: Pin<Box<dyn futures::Stream<Item = Result<StreamChunk, CoreError>> + Send>> =
                Box::pin(stream::iter(chunks));
            Ok(boxed)
        }
    }

    struct CapturingSink {
        captured: Mutex<String>,
    }

    impl StreamSink for CapturingSink {
        fn on_text(&self, fragment: &str) {
            self.captured.lock().unwrap().push_str(fragment);
        }
    }

    #[tokio::test]
    async fn non_streaming_turn_passes_through_outcome() {
        let client = FakeClient {
            streaming: false,
            outcome: ChatOutcome {
                content: "done".to_string(),
                tool_calls: vec![],
                usage: None,
            },
        };
        let runner = CycleRunner::new(&client);
        let turn = runner.run_turn("model", vec![Message::user("hi")], vec![]).await.unwrap();
        assert_eq!(turn.assistant_message.content, "done");
    }

    #[tokio::test]
    async fn streaming_turn_aggregates_tool_call_deltas_and_feeds_sink() {
        let client = FakeClient {
            streaming: true,
            outcome: ChatOutcome::default(),
        };
        let sink = CapturingSink { captured: Mutex::new(String::new()) };
        let runner = CycleRunner::new(&client).with_stream_sink(&sink);
        let turn = runner.run_turn("model", vec![Message::user("hi")], vec![]).await.unwrap();
        assert_eq!(turn.assistant_message.content, "hello");
        assert_eq!(turn.tool_calls.len(), 1);
        assert_eq!(turn.tool_calls[0].arguments_json, r#"{"answer":"hi"}"#);
        assert_eq!(*sink.captured.lock().unwrap(), "hello");
    }

    #[tokio::test]
    async fn empty_turn_gets_continue_hint() {
        let client = FakeClient {
            streaming: false,
            outcome: ChatOutcome::default(),
        };
        let runner = CycleRunner::new(&client);
        let turn = runner.run_turn("model", vec![], vec![]).await.unwrap();
        assert_eq!(turn.assistant_message.content, CONTINUE_HINT);
    }
}
