//! Filesystem tools, rooted in a workspace directory.
//!
//! Every path argument is resolved against the workspace root; absolute
//! paths and `..` components are refused so a tool call cannot reach outside
//! the directory the host was started for.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Value, json};

use super::Tool;
use crate::error::ToolError;

/// Immutable workspace root shared by the filesystem tools.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path inside the workspace.
    ///
    /// Purely lexical so that targets which do not exist yet (write_file,
    /// create_directory) still resolve. Absolute paths and any `..`
    /// component are escapes.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, ToolError> {
        let rel = Path::new(path.trim_start_matches("./"));
        if rel.is_absolute() {
            return Err(ToolError::PathEscape(path.to_string()));
        }
        let mut resolved = self.root.clone();
        for component in rel.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => return Err(ToolError::PathEscape(path.to_string())),
            }
        }
        Ok(resolved)
    }
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::execution(format!("missing string argument: {key}")))
}

fn path_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "path": {"type": "string", "description": "Path relative to the workspace root"}
        },
        "required": ["path"]
    })
}

/// Read the contents of a file.
pub struct ReadFileTool {
    ws: Workspace,
}

impl ReadFileTool {
    pub fn new(ws: Workspace) -> Self {
        Self { ws }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file"
    }

    fn parameters_schema(&self) -> Value {
        path_schema()
    }

    async fn run(&self, args: Value) -> Result<Value, ToolError> {
        let path = str_arg(&args, "path")?;
        let resolved = self.ws.resolve(path)?;
        let content = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| ToolError::execution(format!("failed to read {path}: {e}")))?;
        Ok(Value::String(content))
    }
}

/// Write content to a file, creating parent directories as needed.
pub struct WriteFileTool {
    ws: Workspace,
}

impl WriteFileTool {
    pub fn new(ws: Workspace) -> Self {
        Self { ws }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating parent directories if needed"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path relative to the workspace root"},
                "content": {"type": "string", "description": "Content to write"}
            },
            "required": ["path", "content"]
        })
    }

    async fn run(&self, args: Value) -> Result<Value, ToolError> {
        let path = str_arg(&args, "path")?;
        let content = str_arg(&args, "content")?;
        let resolved = self.ws.resolve(path)?;
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::execution(format!("failed to create {path}: {e}")))?;
        }
        tokio::fs::write(&resolved, content)
            .await
            .map_err(|e| ToolError::execution(format!("failed to write {path}: {e}")))?;
        Ok(Value::String(format!(
            "wrote {} bytes to {path}",
            content.len()
        )))
    }
}

/// List directory entries, optionally filtered by a glob pattern.
pub struct ListDirectoryTool {
    ws: Workspace,
}

impl ListDirectoryTool {
    pub fn new(ws: Workspace) -> Self {
        Self { ws }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List files and directories in a directory, optionally filtered by a glob pattern"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Directory relative to the workspace root"},
                "pattern": {"type": "string", "description": "Optional glob pattern, e.g. *.rs"}
            },
            "required": ["path"]
        })
    }

    async fn run(&self, args: Value) -> Result<Value, ToolError> {
        let path = str_arg(&args, "path")?;
        let pattern = match args.get("pattern").and_then(Value::as_str) {
            Some(p) => Some(
                glob::Pattern::new(p)
                    .map_err(|e| ToolError::execution(format!("bad pattern {p}: {e}")))?,
            ),
            None => None,
        };

        let resolved = self.ws.resolve(path)?;
        let mut dir = tokio::fs::read_dir(&resolved)
            .await
            .map_err(|e| ToolError::execution(format!("failed to list {path}: {e}")))?;

        let mut names = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| ToolError::execution(format!("failed to list {path}: {e}")))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if pattern.as_ref().is_none_or(|p| p.matches(&name)) {
                names.push(name);
            }
        }
        names.sort();
        Ok(json!(names))
    }
}

/// Create a directory (and any missing parents).
pub struct CreateDirectoryTool {
    ws: Workspace,
}

impl CreateDirectoryTool {
    pub fn new(ws: Workspace) -> Self {
        Self { ws }
    }
}

#[async_trait]
impl Tool for CreateDirectoryTool {
    fn name(&self) -> &str {
        "create_directory"
    }

    fn description(&self) -> &str {
        "Create a directory, including missing parents"
    }

    fn parameters_schema(&self) -> Value {
        path_schema()
    }

    async fn run(&self, args: Value) -> Result<Value, ToolError> {
        let path = str_arg(&args, "path")?;
        let resolved = self.ws.resolve(path)?;
        tokio::fs::create_dir_all(&resolved)
            .await
            .map_err(|e| ToolError::execution(format!("failed to create {path}: {e}")))?;
        Ok(Value::String(format!("created {path}")))
    }
}

/// Delete a file.
pub struct DeleteFileTool {
    ws: Workspace,
}

impl DeleteFileTool {
    pub fn new(ws: Workspace) -> Self {
        Self { ws }
    }
}

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn description(&self) -> &str {
        "Delete a file"
    }

    fn parameters_schema(&self) -> Value {
        path_schema()
    }

    async fn run(&self, args: Value) -> Result<Value, ToolError> {
        let path = str_arg(&args, "path")?;
        let resolved = self.ws.resolve(path)?;
        tokio::fs::remove_file(&resolved)
            .await
            .map_err(|e| ToolError::execution(format!("failed to delete {path}: {e}")))?;
        Ok(Value::String(format!("deleted {path}")))
    }
}

/// Check whether a file exists.
pub struct FileExistsTool {
    ws: Workspace,
}

impl FileExistsTool {
    pub fn new(ws: Workspace) -> Self {
        Self { ws }
    }
}

#[async_trait]
impl Tool for FileExistsTool {
    fn name(&self) -> &str {
        "file_exists"
    }

    fn description(&self) -> &str {
        "Check if a file exists"
    }

    fn parameters_schema(&self) -> Value {
        path_schema()
    }

    async fn run(&self, args: Value) -> Result<Value, ToolError> {
        let path = str_arg(&args, "path")?;
        let resolved = self.ws.resolve(path)?;
        let exists = tokio::fs::metadata(&resolved)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        Ok(Value::Bool(exists))
    }
}

/// Check whether a directory exists.
pub struct DirectoryExistsTool {
    ws: Workspace,
}

impl DirectoryExistsTool {
    pub fn new(ws: Workspace) -> Self {
        Self { ws }
    }
}

#[async_trait]
impl Tool for DirectoryExistsTool {
    fn name(&self) -> &str {
        "directory_exists"
    }

    fn description(&self) -> &str {
        "Check if a directory exists"
    }

    fn parameters_schema(&self) -> Value {
        path_schema()
    }

    async fn run(&self, args: Value) -> Result<Value, ToolError> {
        let path = str_arg(&args, "path")?;
        let resolved = self.ws.resolve(path)?;
        let exists = tokio::fs::metadata(&resolved)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        Ok(Value::Bool(exists))
    }
}
