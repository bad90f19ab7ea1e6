use std::collections::HashMap;

use agentrun_core::{Message, Role, TokenUsage};
use async_trait::async_trait;
use serde_json::Value;

use crate::error::RuntimeError;
use crate::task::AgentTask;

/// Tunable knobs for compaction, normally read from task metadata.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    pub compact_at_chars: usize,
    pub threshold_percentage: f64,
    pub keep_recent_messages: usize,
    pub assistant_no_tool_keep_last: usize,
    pub tool_result_compact_threshold: usize,
    pub tool_result_excerpt_head: usize,
    pub tool_result_excerpt_tail: usize,
    pub include_memory_warning: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            compact_at_chars: 128_000,
            threshold_percentage: 90.0,
            keep_recent_messages: 10,
            assistant_no_tool_keep_last: 3,
            tool_result_compact_threshold: 4_000,
            tool_result_excerpt_head: 400,
            tool_result_excerpt_tail: 400,
            include_memory_warning: true,
        }
    }
}

impl MemoryConfig {
    /// Derives the effective per-task config: `compact_at_chars` and
    /// `threshold_percentage` come from the task's own
    /// `memory_compact_threshold` / `memory_threshold_percentage` (set via
    /// the builder, or rehydrated from a `RuntimeRecipe` on a distributed
    /// worker) rather than this runtime-wide default; the remaining knobs
    /// fall back to `self` unless overridden in the task's metadata map.
    pub fn for_task(&self, task: &AgentTask) -> MemoryConfig {
        Self {
            compact_at_chars: task.memory_compact_threshold,
            threshold_percentage: task.memory_threshold_percentage,
            keep_recent_messages: meta_usize(&task.metadata, "memory_keep_recent_messages", self.keep_recent_messages),
            assistant_no_tool_keep_last: meta_usize(&task.metadata, "assistant_no_tool_keep_last", self.assistant_no_tool_keep_last),
            tool_result_compact_threshold: meta_usize(&task.metadata, "tool_result_compact_threshold", self.tool_result_compact_threshold),
            tool_result_excerpt_head: meta_usize(&task.metadata, "tool_result_excerpt_head", self.tool_result_excerpt_head),
            tool_result_excerpt_tail: meta_usize(&task.metadata, "tool_result_excerpt_tail", self.tool_result_excerpt_tail),
            include_memory_warning: meta_bool(&task.metadata, "include_memory_warning", self.include_memory_warning),
        }
    }
}

fn meta_usize(metadata: &HashMap<String, Value>, key: &str, default: usize) -> usize {
    metadata.get(key).and_then(Value::as_u64).map(|v| v as usize).unwrap_or(default)
}

fn meta_bool(metadata: &HashMap<String, Value>, key: &str, default: bool) -> bool {
    metadata.get(key).and_then(Value::as_bool).unwrap_or(default)
}

/// Produces the synthesized summary message that replaces a compacted
/// middle window. Implementations typically issue a dedicated LLM call;
/// model selection (task override -> global default -> runtime default) is
/// the caller's responsibility, not this trait's.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, messages: &[Message]) -> Result<String, RuntimeError>;
}

pub struct MemoryManager {
    pub config: MemoryConfig,
}

impl MemoryManager {
    pub fn new(config: MemoryConfig) -> Self {
        Self { config }
    }

    /// Effective context length: prefers the previous cycle's reported
    /// token usage (scaled back to an approximate character budget) plus
    /// the serialized size of messages appended since, falling back to a
    /// full re-serialization when no usage has been reported yet.
    pub fn effective_length(&self, messages: &[Message], prev_usage: Option<TokenUsage>, recent_from: usize) -> usize {
        match prev_usage {
            Some(usage) => {
                let prior = usage.total() as usize * 4;
                let recent: usize = messages[recent_from.min(messages.len())..]
                    .iter()
                    .map(|m| m.approx_len())
                    .sum();
                prior + recent
            }
            None => messages.iter().skip(2).map(|m| m.approx_len()).sum(),
        }
    }

    pub fn usage_percentage(&self, effective_length: usize) -> f64 {
        (effective_length as f64 / self.config.compact_at_chars as f64) * 100.0
    }

    pub fn needs_compaction(&self, effective_length: usize) -> bool {
        effective_length > self.config.compact_at_chars
    }

    /// Runs the structural-cleanup pass only (no LLM summary call). Safe to
    /// call unconditionally before every cycle; cheap relative to a full
    /// compaction.
    pub fn structural_cleanup(&self, messages: Vec<Message>) -> Vec<Message> {
        if messages.is_empty() {
            return messages;
        }
        let head = messages[0].clone();
        let rest = &messages[1..];

        let mut cleaned: Vec<Message> = Vec::with_capacity(rest.len());
        let mut consecutive_no_tool_assistants: Vec<Message> = Vec::new();

        let flush_no_tool_run =
            |cleaned: &mut Vec<Message>, run: &mut Vec<Message>, keep_last: usize| {
                let start = run.len().saturating_sub(keep_last);
                cleaned.extend(run.drain(start..));
                run.clear();
            };

        for msg in rest {
            match msg.role {
                Role::Assistant if !msg.has_tool_calls() => {
                    consecutive_no_tool_assistants.push(msg.clone());
                }
                _ => {
                    flush_no_tool_run(&mut cleaned, &mut consecutive_no_tool_assistants, self.config.assistant_no_tool_keep_last);
                    cleaned.push(self.maybe_artifact_ize(msg.clone()));
                }
            }
        }
        flush_no_tool_run(&mut cleaned, &mut consecutive_no_tool_assistants, self.config.assistant_no_tool_keep_last);

        let cleaned = drop_orphan_tool_messages(cleaned);

        let mut result = Vec::with_capacity(cleaned.len() + 1);
        result.push(head);
        result.extend(cleaned);
        result
    }

    fn maybe_artifact_ize(&self, mut msg: Message) -> Message {
        if msg.role == Role::Tool && msg.content.len() > self.config.tool_result_compact_threshold {
            let head: String = msg.content.chars().take(self.config.tool_result_excerpt_head).collect();
            let tail_start = msg
                .content
                .len()
                .saturating_sub(self.config.tool_result_excerpt_tail);
            let tail: String = msg.content.chars().skip(tail_start).collect();
            msg.content = format!("{head}\n… [artifact: {} bytes truncated] …\n{tail}", msg.content.len());
        }
        msg
    }

    /// Full compaction pipeline: structural cleanup, then, if still over
    /// threshold, recency-preserving summarization of the middle window via
    /// `summarizer`.
    pub async fn compact(&self, messages: Vec<Message>, summarizer: &dyn Summarizer) -> Result<Vec<Message>, RuntimeError> {
        let cleaned = self.structural_cleanup(messages);
        let effective = self.effective_length(&cleaned, None, 0);
        if !self.needs_compaction(effective) {
            return Ok(cleaned);
        }
        if cleaned.len() <= self.config.keep_recent_messages + 1 {
            return Ok(cleaned);
        }

        let head = cleaned[0].clone();
        let keep_from = cleaned.len() - self.config.keep_recent_messages;
        let middle = &cleaned[1..keep_from];
        let tail = cleaned[keep_from..].to_vec();

        let summary_text = summarizer.summarize(middle).await?;
        let mut summary_message = Message::assistant(summary_text);
        if self.config.include_memory_warning {
            summary_message.content = format!("[memory compacted — summary of {} earlier messages]\n{}", middle.len(), summary_message.content);
        }

        let mut result = Vec::with_capacity(tail.len() + 2);
        result.push(head);
        result.push(summary_message);
        result.extend(tail);
        Ok(drop_orphan_tool_messages(result))
    }
}

/// Removes any tool message whose matching assistant tool-call stub was
/// dropped by an earlier pass, and any assistant tool-call stub left
/// without all of its paired tool results, preserving the pairing
/// invariant.
fn drop_orphan_tool_messages(messages: Vec<Message>) -> Vec<Message> {
    use std::collections::HashSet;

    let mut live_call_ids: HashSet<String> = HashSet::new();
    for msg in &messages {
        if msg.role == Role::Assistant {
            for call in &msg.tool_calls {
                live_call_ids.insert(call.id.clone());
            }
        }
    }

    let mut satisfied: HashSet<String> = HashSet::new();
    for msg in &messages {
        if msg.role == Role::Tool {
            if let Some(id) = &msg.tool_call_id {
                satisfied.insert(id.clone());
            }
        }
    }

    messages
        .into_iter()
        .filter_map(|mut msg| match msg.role {
            Role::Tool => {
                let keep = msg
                    .tool_call_id
                    .as_ref()
                    .is_some_and(|id| live_call_ids.contains(id));
                keep.then_some(msg)
            }
            Role::Assistant if msg.has_tool_calls() => {
                msg.tool_calls.retain(|c| satisfied.contains(&c.id));
                Some(msg)
            }
            _ => Some(msg),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrun_core::ToolCall;
    use crate::task::AgentTaskBuilder;

    #[test]
    fn for_task_overrides_compact_at_chars_and_metadata_knobs() {
        let default = MemoryConfig::default();
        let task = AgentTaskBuilder::new("t", "gpt-test")
            .memory_compact_threshold(50_000)
            .memory_threshold_percentage(75.0)
            .metadata("memory_keep_recent_messages", serde_json::json!(4))
            .build();

        let derived = default.for_task(&task);
        assert_eq!(derived.compact_at_chars, 50_000);
        assert_eq!(derived.threshold_percentage, 75.0);
        assert_eq!(derived.keep_recent_messages, 4);
        assert_eq!(derived.assistant_no_tool_keep_last, default.assistant_no_tool_keep_last);
    }

    struct StubSummarizer;

    #[async_trait]
    impl Summarizer for StubSummarizer {
        async fn summarize(&self, messages: &[Message]) -> Result<String, RuntimeError> {
            Ok(format!("summarized {} messages", messages.len()))
        }
    }

    fn pair(id: &str) -> (Message, Message) {
        (
            Message::assistant_with_tool_calls("", vec![ToolCall::new(id, "noop", "{}")]),
            Message::tool_result(id, "ok"),
        )
    }

    #[test]
    fn system_message_preserved_at_index_zero() {
        let mgr = MemoryManager::new(MemoryConfig::default());
        let mut messages = vec![Message::system("sys")];
        for i in 0..5 {
            let (a, t) = pair(&format!("c{i}"));
            messages.push(a);
            messages.push(t);
        }
        let cleaned = mgr.structural_cleanup(messages);
        assert_eq!(cleaned[0].role, Role::System);
        assert_eq!(cleaned[0].content, "sys");
    }

    #[test]
    fn pairing_invariant_holds_after_structural_cleanup() {
        let mgr = MemoryManager::new(MemoryConfig::default());
        let mut messages = vec![Message::system("sys")];
        for i in 0..20 {
            let (a, t) = pair(&format!("c{i}"));
            messages.push(a);
            messages.push(t);
        }
        let cleaned = mgr.structural_cleanup(messages);
        assert_pairing_invariant(&cleaned);
    }

    #[tokio::test]
    async fn compaction_preserves_head_and_recent_tail() {
        let mgr = MemoryManager::new(MemoryConfig {
            compact_at_chars: 10,
            keep_recent_messages: 4,
            ..Default::default()
        });
        let mut messages = vec![Message::system("sys")];
        for i in 0..50 {
            let (a, t) = pair(&format!("c{i}"));
            messages.push(a);
            messages.push(t);
        }
        let tail_before: Vec<String> = messages[messages.len() - 4..].iter().map(|m| m.content.clone()).collect();
        let compacted = mgr.compact(messages, &StubSummarizer).await.unwrap();
        assert_eq!(compacted[0].role, Role::System);
        let tail_after: Vec<String> = compacted[compacted.len() - 4..].iter().map(|m| m.content.clone()).collect();
        assert_eq!(tail_before, tail_after);
        assert_pairing_invariant(&compacted);
    }

    fn assert_pairing_invariant(messages: &[Message]) {
        use std::collections::HashSet;
        let mut pending: HashSet<String> = HashSet::new();
        for msg in messages {
            match msg.role {
                Role::Assistant => {
                    for c in &msg.tool_calls {
                        pending.insert(c.id.clone());
                    }
                }
                Role::Tool => {
                    let id = msg.tool_call_id.clone().expect("tool message must carry tool_call_id");
                    assert!(pending.remove(&id), "tool result {id} has no preceding assistant call");
                }
                _ => {}
            }
        }
    }
}
