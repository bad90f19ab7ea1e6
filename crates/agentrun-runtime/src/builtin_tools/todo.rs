//! Shared per-task todo list backing `todo_write` and the `task_finish`
//! completion guard.
//!
//! Full-list-replacement semantics, scoped to one [`crate::context::ToolContext`]
//! rather than a process-wide session map, since each task already owns its context.

use std::sync::Arc;

use agentrun_core::tool::HandlerOutcome;
use agentrun_core::{CoreError, ToolSchema};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;

use crate::context::ToolContext;
use crate::registry::ToolHandler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItem {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    pub status: TodoStatus,
    #[serde(default)]
    pub priority: Option<String>,
}

/// The live todo list for one task. Cheaply cloned; every clone shares the
/// same backing storage so `todo_write` and `task_finish` agree on state.
#[derive(Default, Clone)]
pub struct TodoList {
    items: Arc<Mutex<Vec<TodoItem>>>,
}

impl TodoList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full-list replacement. Rejects more than one `in_progress` entry,
    /// matching the `todo_write` schema's "limit to ONE task at a time" rule.
    pub fn replace(&self, items: Vec<TodoItem>) -> Result<(), String> {
        let in_progress = items.iter().filter(|t| t.status == TodoStatus::InProgress).count();
        if in_progress > 1 {
            return Err(format!("at most one todo may be in_progress, found {in_progress}"));
        }
        *self.items.lock() = items;
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<TodoItem> {
        self.items.lock().clone()
    }

    /// `task_finish`'s completion guard: an empty list counts as complete
    /// (a task with no tracked todos has nothing left to finish).
    pub fn all_complete(&self) -> bool {
        self.items.lock().iter().all(|t| t.status == TodoStatus::Completed)
    }
}

pub struct TodoWriteTool;

#[async_trait]
impl ToolHandler for TodoWriteTool {
    fn name(&self) -> &str {
        "todo_write"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: "Replace the full todo list for this task. At most one item may be \
                in_progress at a time. Use this to track multi-step work before calling task_finish."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "todos": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "id": {"type": "string"},
                                "title": {"type": "string"},
                                "status": {"type": "string", "enum": ["pending", "in_progress", "completed"]},
                                "priority": {"type": "string"}
                            },
                            "required": ["title", "status"]
                        }
                    }
                },
                "required": ["todos"]
            }),
        }
    }

    async fn call(&self, args: HashMap<String, Value>, ctx: &ToolContext) -> Result<HandlerOutcome, CoreError> {
        let todos_val = args
            .get("todos")
            .cloned()
            .ok_or_else(|| CoreError::InvalidArgumentsPayload("todos is required".to_string()))?;
        let todos: Vec<TodoItem> = serde_json::from_value(todos_val)
            .map_err(|e| CoreError::InvalidArgumentsPayload(format!("invalid todos: {e}")))?;

        if let Err(message) = ctx.todos.replace(todos) {
            return Ok(HandlerOutcome::error("todo_multiple_in_progress", json!({ "message": message })));
        }

        let snapshot = ctx.todos.snapshot();
        Ok(HandlerOutcome::ok(json!({
            "total": snapshot.len(),
            "in_progress": snapshot.iter().filter(|t| t.status == TodoStatus::InProgress).count(),
            "completed": snapshot.iter().filter(|t| t.status == TodoStatus::Completed).count(),
        })))
    }
}
