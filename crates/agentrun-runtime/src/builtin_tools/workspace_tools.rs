//! Workspace tools: thin wrappers over [`agentrun_core::WorkspaceBackend`].
//!
//! One tool per backend operation, plus a `file_str_replace` exact-match
//! editor and a line-oriented grep, both walking files directly rather
//! than shelling out.

use std::collections::HashMap;

use agentrun_core::tool::HandlerOutcome;
use agentrun_core::{CoreError, ToolSchema};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};

use crate::context::ToolContext;
use crate::registry::ToolHandler;

fn require_workspace(ctx: &ToolContext) -> Result<&std::sync::Arc<dyn agentrun_core::WorkspaceBackend>, CoreError> {
    ctx.workspace.as_ref().ok_or(CoreError::WorkspaceMissing)
}

fn required_str<'a>(args: &'a HashMap<String, Value>, key: &str) -> Result<&'a str, CoreError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::InvalidArgumentsPayload(format!("{key} is required")))
}

pub struct ReadFileTool;

#[async_trait]
impl ToolHandler for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: "Read a UTF-8 text file from the workspace.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"path": {"type": "string"}},
                "required": ["path"]
            }),
        }
    }

    async fn call(&self, args: HashMap<String, Value>, ctx: &ToolContext) -> Result<HandlerOutcome, CoreError> {
        let path = required_str(&args, "path")?;
        let workspace = require_workspace(ctx)?;
        match workspace.read_text(path).await {
            Ok(content) => Ok(HandlerOutcome::ok(json!({ "path": path, "content": content }))),
            Err(err) => Ok(HandlerOutcome::error(err.error_code(), json!({ "message": err.to_string() }))),
        }
    }
}

pub struct WriteFileTool;

#[async_trait]
impl ToolHandler for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: "Write (or append to) a UTF-8 text file in the workspace.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "content": {"type": "string"},
                    "append": {"type": "boolean", "default": false}
                },
                "required": ["path", "content"]
            }),
        }
    }

    async fn call(&self, args: HashMap<String, Value>, ctx: &ToolContext) -> Result<HandlerOutcome, CoreError> {
        let path = required_str(&args, "path")?;
        let content = required_str(&args, "content")?;
        let append = args.get("append").and_then(Value::as_bool).unwrap_or(false);
        let workspace = require_workspace(ctx)?;
        match workspace.write_text(path, content, append).await {
            Ok(bytes_written) => Ok(HandlerOutcome::ok(json!({ "path": path, "bytes_written": bytes_written }))),
            Err(err) => Ok(HandlerOutcome::error(err.error_code(), json!({ "message": err.to_string() }))),
        }
    }
}

pub struct ListFilesTool;

#[async_trait]
impl ToolHandler for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: format!(
                "List files under a workspace directory, optionally filtered by glob. Capped at {} results.",
                agentrun_core::LIST_FILES_DEFAULT_LIMIT
            ),
            parameters: json!({
                "type": "object",
                "properties": {
                    "base": {"type": "string", "default": "."},
                    "glob": {"type": "string"}
                }
            }),
        }
    }

    async fn call(&self, args: HashMap<String, Value>, ctx: &ToolContext) -> Result<HandlerOutcome, CoreError> {
        let base = args.get("base").and_then(Value::as_str).unwrap_or(".");
        let glob = args.get("glob").and_then(Value::as_str);
        let workspace = require_workspace(ctx)?;
        match workspace.list_files(base, glob).await {
            Ok(paths) => Ok(HandlerOutcome::ok(json!({ "paths": paths, "truncated": paths_truncated(&paths) }))),
            Err(err) => Ok(HandlerOutcome::error(err.error_code(), json!({ "message": err.to_string() }))),
        }
    }
}

fn paths_truncated(paths: &[String]) -> bool {
    paths.len() >= agentrun_core::LIST_FILES_DEFAULT_LIMIT
}

pub struct FileInfoTool;

#[async_trait]
impl ToolHandler for FileInfoTool {
    fn name(&self) -> &str {
        "file_info"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: "Stat a workspace path: size, mtime, and whether it is a directory.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"path": {"type": "string"}},
                "required": ["path"]
            }),
        }
    }

    async fn call(&self, args: HashMap<String, Value>, ctx: &ToolContext) -> Result<HandlerOutcome, CoreError> {
        let path = required_str(&args, "path")?;
        let workspace = require_workspace(ctx)?;
        match workspace.file_info(path).await {
            Ok(info) => Ok(HandlerOutcome::ok(json!({ "path": path, "info": info }))),
            Err(err) => Ok(HandlerOutcome::error(err.error_code(), json!({ "message": err.to_string() }))),
        }
    }
}

pub struct FileStrReplaceTool;

#[async_trait]
impl ToolHandler for FileStrReplaceTool {
    fn name(&self) -> &str {
        "file_str_replace"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: "Replace a single exact occurrence of old_str with new_str in a workspace \
                file. Fails if old_str is missing or appears more than once."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "old_str": {"type": "string"},
                    "new_str": {"type": "string"}
                },
                "required": ["path", "old_str", "new_str"]
            }),
        }
    }

    async fn call(&self, args: HashMap<String, Value>, ctx: &ToolContext) -> Result<HandlerOutcome, CoreError> {
        let path = required_str(&args, "path")?;
        let old_str = required_str(&args, "old_str")?;
        let new_str = required_str(&args, "new_str")?;
        let workspace = require_workspace(ctx)?;

        let content = match workspace.read_text(path).await {
            Ok(content) => content,
            Err(err) => return Ok(HandlerOutcome::error(err.error_code(), json!({ "message": err.to_string() }))),
        };

        let occurrences = content.matches(old_str).count();
        if occurrences == 0 {
            return Ok(HandlerOutcome::error("string_not_found", json!({ "path": path })));
        }
        if occurrences > 1 {
            return Ok(HandlerOutcome::error("string_not_unique", json!({ "path": path, "occurrences": occurrences })));
        }

        let updated = content.replacen(old_str, new_str, 1);
        match workspace.write_text(path, &updated, false).await {
            Ok(bytes_written) => Ok(HandlerOutcome::ok(json!({ "path": path, "bytes_written": bytes_written }))),
            Err(err) => Ok(HandlerOutcome::error(err.error_code(), json!({ "message": err.to_string() }))),
        }
    }
}

pub struct WorkspaceGrepTool;

#[async_trait]
impl ToolHandler for WorkspaceGrepTool {
    fn name(&self) -> &str {
        "workspace_grep"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: "Search workspace text files for a regular expression, returning matching \
                lines with file path and line number."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "pattern": {"type": "string"},
                    "base": {"type": "string", "default": "."},
                    "glob": {"type": "string"}
                },
                "required": ["pattern"]
            }),
        }
    }

    async fn call(&self, args: HashMap<String, Value>, ctx: &ToolContext) -> Result<HandlerOutcome, CoreError> {
        let pattern = required_str(&args, "pattern")?;
        let base = args.get("base").and_then(Value::as_str).unwrap_or(".");
        let glob = args.get("glob").and_then(Value::as_str);
        let workspace = require_workspace(ctx)?;

        let regex = match Regex::new(pattern) {
            Ok(r) => r,
            Err(e) => return Ok(HandlerOutcome::error("invalid_pattern", json!({ "message": e.to_string() }))),
        };

        let paths = match workspace.list_files(base, glob).await {
            Ok(paths) => paths,
            Err(err) => return Ok(HandlerOutcome::error(err.error_code(), json!({ "message": err.to_string() }))),
        };

        const MAX_MATCHES: usize = 200;
        let mut matches = Vec::new();
        'files: for path in paths {
            let Ok(content) = workspace.read_text(&path).await else { continue };
            for (line_no, line) in content.lines().enumerate() {
                if regex.is_match(line) {
                    matches.push(json!({ "path": path, "line": line_no + 1, "text": line }));
                    if matches.len() >= MAX_MATCHES {
                        break 'files;
                    }
                }
            }
        }

        Ok(HandlerOutcome::ok(json!({ "matches": matches, "truncated": matches.len() >= MAX_MATCHES })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin_tools::test_support::{test_ctx, InMemoryWorkspace};
    use std::sync::Arc;

    fn ctx_with_fs(fs: InMemoryWorkspace) -> ToolContext {
        let mut ctx = test_ctx();
        ctx.workspace = Some(Arc::new(fs));
        ctx
    }

    #[tokio::test]
    async fn read_file_roundtrips_write_file() {
        let fs = InMemoryWorkspace::new();
        let ctx = ctx_with_fs(fs);
        let mut write_args = HashMap::new();
        write_args.insert("path".to_string(), json!("a.txt"));
        write_args.insert("content".to_string(), json!("hello"));
        WriteFileTool.call(write_args, &ctx).await.unwrap();

        let mut read_args = HashMap::new();
        read_args.insert("path".to_string(), json!("a.txt"));
        let outcome = ReadFileTool.call(read_args, &ctx).await.unwrap();
        assert_eq!(outcome.payload["content"], json!("hello"));
    }

    #[tokio::test]
    async fn str_replace_rejects_nonunique_match() {
        let fs = InMemoryWorkspace::new();
        fs.seed("a.txt", "foo foo");
        let ctx = ctx_with_fs(fs);
        let mut args = HashMap::new();
        args.insert("path".to_string(), json!("a.txt"));
        args.insert("old_str".to_string(), json!("foo"));
        args.insert("new_str".to_string(), json!("bar"));
        let outcome = FileStrReplaceTool.call(args, &ctx).await.unwrap();
        assert_eq!(outcome.error_code.as_deref(), Some("string_not_unique"));
    }

    #[tokio::test]
    async fn grep_finds_matching_lines() {
        let fs = InMemoryWorkspace::new();
        fs.seed("a.txt", "line one\nfn target() {}\nline three");
        let ctx = ctx_with_fs(fs);
        let mut args = HashMap::new();
        args.insert("pattern".to_string(), json!("fn target"));
        let outcome = WorkspaceGrepTool.call(args, &ctx).await.unwrap();
        let matches = outcome.payload["matches"].as_array().unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0]["line"], json!(2));
    }
}
