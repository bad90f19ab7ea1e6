use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Metadata about a workspace entry, as returned by `file_info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub size: u64,
    pub mtime_unix: i64,
    pub is_dir: bool,
}

/// The filesystem the runtime's workspace tools operate against. Paths are
/// always workspace-relative; implementations are responsible for rejecting
/// any path that would escape the workspace root (`CoreError::PathEscape`).
#[async_trait]
pub trait WorkspaceBackend: Send + Sync {
    async fn list_files(&self, base: &str, glob: Option<&str>) -> Result<Vec<String>, CoreError>;
    async fn read_text(&self, path: &str) -> Result<String, CoreError>;
    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>, CoreError>;
    async fn write_text(&self, path: &str, content: &str, append: bool) -> Result<usize, CoreError>;
    async fn file_info(&self, path: &str) -> Result<Option<FileInfo>, CoreError>;
    async fn exists(&self, path: &str) -> Result<bool, CoreError>;
    async fn is_file(&self, path: &str) -> Result<bool, CoreError>;
    async fn mkdir(&self, path: &str) -> Result<(), CoreError>;
}

/// Default cap on `list_files` results, matching the directory-listing tool
/// contract (large dependency/cache roots are summarized rather than
/// expanded past this cap).
pub const LIST_FILES_DEFAULT_LIMIT: usize = 500;
