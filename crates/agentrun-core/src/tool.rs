use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

/// A tool invocation requested by the model.
///
/// `arguments_json` mirrors the wire representation most chat providers use
/// (a JSON-encoded string rather than an already-parsed object); callers
/// that receive a parsed object from a provider should re-encode it here and
/// let [`ToolCall::parsed_arguments`] do the single normalization step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments_json: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments_json: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments_json: arguments_json.into(),
        }
    }

    /// Parses `arguments_json` into a string-keyed map, normalizing both a
    /// JSON-object-shaped string and an already-empty string (treated as
    /// `{}`). Returns `invalid_arguments_json` / `invalid_arguments_payload`
    /// per the dispatcher's error taxonomy.
    pub fn parsed_arguments(&self) -> Result<HashMap<String, Value>, CoreError> {
        let text = if self.arguments_json.trim().is_empty() {
            "{}"
        } else {
            self.arguments_json.as_str()
        };
        let value: Value = serde_json::from_str(text)
            .map_err(|e| CoreError::InvalidArgumentsJson(e.to_string()))?;
        match value {
            Value::Object(map) => Ok(map.into_iter().collect()),
            _ => Err(CoreError::InvalidArgumentsPayload(
                "tool arguments must be a JSON object".to_string(),
            )),
        }
    }
}

/// Incremental aggregator for streamed tool-call deltas, keyed by the
/// provider-assigned call id (falling back to a positional index when a
/// delta only carries an argument fragment and no id).
#[derive(Debug, Default)]
pub struct ToolCallAggregator {
    order: Vec<String>,
    names: HashMap<String, String>,
    fragments: HashMap<String, String>,
    index_to_id: HashMap<usize, String>,
}

impl ToolCallAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, index: usize, id: String, name: String) {
        if !self.names.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.names.insert(id.clone(), name);
        self.fragments.entry(id.clone()).or_default();
        self.index_to_id.insert(index, id);
    }

    /// Appends an argument fragment addressed either by call id or by the
    /// positional index of a prior `start`.
    pub fn push_fragment(&mut self, index: usize, id: Option<&str>, fragment: &str) {
        let resolved = id
            .map(|s| s.to_string())
            .or_else(|| self.index_to_id.get(&index).cloned());
        if let Some(id) = resolved {
            self.fragments.entry(id).or_default().push_str(fragment);
        }
    }

    pub fn finish(self) -> Vec<ToolCall> {
        self.order
            .into_iter()
            .map(|id| {
                let name = self.names.get(&id).cloned().unwrap_or_default();
                let args = self.fragments.get(&id).cloned().unwrap_or_default();
                let args = if args.trim().is_empty() { "{}".to_string() } else { args };
                ToolCall::new(id, name, args)
            })
            .collect()
    }
}

/// Outcome status of a tool execution, per the dispatcher's status-code
/// contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Success,
    Error,
    WaitResponse,
    Running,
    BatchRunning,
    PendingCompress,
}

/// Control-flow signal a tool result contributes to its cycle. When several
/// tool results in one cycle disagree, `Finish` dominates `WaitUser`
/// dominates `Continue` (first match wins by declared call order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Directive {
    Continue = 0,
    WaitUser = 1,
    Finish = 2,
}

impl Directive {
    pub fn dominant(self, other: Directive) -> Directive {
        self.max(other)
    }
}

/// The result of executing one [`ToolCall`], ready to become a tool
/// [`crate::message::Message`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    pub tool_call_id: String,
    pub content: String,
    pub status_code: StatusCode,
    pub directive: Directive,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

impl ToolExecutionResult {
    pub fn success(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            status_code: StatusCode::Success,
            directive: Directive::Continue,
            error_code: None,
            metadata: HashMap::new(),
            image_url: None,
            image_path: None,
        }
    }

    pub fn error(tool_call_id: impl Into<String>, error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: message.into(),
            status_code: StatusCode::Error,
            directive: Directive::Continue,
            error_code: Some(error_code.into()),
            metadata: HashMap::new(),
            image_url: None,
            image_path: None,
        }
    }

    pub fn with_directive(mut self, directive: Directive) -> Self {
        self.directive = directive;
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status_code = status;
        self
    }

    pub fn carries_image(&self) -> bool {
        self.image_url.is_some() || self.image_path.is_some()
    }
}

/// What a [`crate::handler::ToolHandler`] returns before it is normalized
/// into a [`ToolExecutionResult`] by the dispatcher.
#[derive(Debug, Clone)]
pub struct HandlerOutcome {
    pub payload: Value,
    pub status_code: StatusCode,
    pub directive: Directive,
    pub error_code: Option<String>,
    pub image_url: Option<String>,
    pub image_path: Option<String>,
}

impl HandlerOutcome {
    pub fn ok(payload: Value) -> Self {
        Self {
            payload,
            status_code: StatusCode::Success,
            directive: Directive::Continue,
            error_code: None,
            image_url: None,
            image_path: None,
        }
    }

    pub fn error(error_code: impl Into<String>, payload: Value) -> Self {
        Self {
            payload,
            status_code: StatusCode::Error,
            directive: Directive::Continue,
            error_code: Some(error_code.into()),
            image_url: None,
            image_path: None,
        }
    }

    pub fn with_directive(mut self, directive: Directive) -> Self {
        self.directive = directive;
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status_code = status;
        self
    }
}
