//! Hosted tools: trait, registry, and the standard tool set.

mod fs;
mod shell;

pub use fs::{
    CreateDirectoryTool, DeleteFileTool, DirectoryExistsTool, FileExistsTool, ListDirectoryTool,
    ReadFileTool, Workspace, WriteFileTool,
};
pub use shell::ExecuteCommandTool;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolError;
use wire::ToolDescriptor;

/// A tool the host can execute on request.
///
/// Implementations must not share mutable state between invocations —
/// anything scoped (workspace root, timeouts, allowlists) is captured
/// immutably at construction so concurrent requests cannot leak into each
/// other.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name, unique within the host.
    fn name(&self) -> &str;

    /// Human-readable description exposed to the decision policy.
    fn description(&self) -> &str;

    /// JSON Schema for the arguments object.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool. Arguments have already been validated against
    /// [`Tool::parameters_schema`].
    async fn run(&self, args: Value) -> Result<Value, ToolError>;
}

impl dyn Tool {
    /// Build the wire descriptor for this tool.
    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(self.name(), self.description(), self.parameters_schema())
    }
}

/// Insertion-ordered tool registry.
///
/// The order tools are registered is the order `descriptors()` reports,
/// giving discovery a stable order within one process lifetime.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A duplicate name keeps the first registration.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            tracing::warn!(tool = %name, "duplicate tool registration ignored");
            return;
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(Arc::new(tool));
    }

    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| self.tools[i].clone())
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.as_ref().descriptor()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Build the standard developer tool set rooted at `workspace_root`.
///
/// `allowed_commands` restricts the shell tool to the named commands; `None`
/// leaves it open (the destructive-pattern denylist still applies).
pub fn standard_registry(
    workspace_root: impl Into<PathBuf>,
    command_timeout: Duration,
    allowed_commands: Option<Vec<String>>,
) -> ToolRegistry {
    let ws = Workspace::new(workspace_root);
    let mut shell = ExecuteCommandTool::new(ws.clone(), command_timeout);
    if let Some(allowed) = allowed_commands {
        shell = shell.with_allowlist(allowed);
    }
    ToolRegistry::new()
        .with_tool(ReadFileTool::new(ws.clone()))
        .with_tool(WriteFileTool::new(ws.clone()))
        .with_tool(ListDirectoryTool::new(ws.clone()))
        .with_tool(CreateDirectoryTool::new(ws.clone()))
        .with_tool(DeleteFileTool::new(ws.clone()))
        .with_tool(FileExistsTool::new(ws.clone()))
        .with_tool(DirectoryExistsTool::new(ws))
        .with_tool(shell)
}
