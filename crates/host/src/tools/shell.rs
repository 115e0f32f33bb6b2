//! Shell command execution tool.
//!
//! Commands run through `sh -c` with the workspace root as working
//! directory, under a timeout. Destructive patterns are refused outright; an
//! optional allowlist restricts the command name (first token).

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::process::Command;

use super::{Tool, Workspace};
use crate::error::ToolError;

/// Refused regardless of any allowlist.
const FORBIDDEN_SUBSTRINGS: &[&str] = &[
    "rm -rf",
    "rm -fr",
    "mkfs",
    "dd if=",
    "> /dev/sd",
    ":(){ :|:& };:", // fork bomb
];

/// Run a shell command and report stdout, stderr, and the exit code.
///
/// Failures to run are not errors: the original contract is that this tool
/// always returns the `{stdout, stderr, returncode}` object, with
/// `returncode: -1` when the process could not run, was killed by a signal,
/// or timed out.
pub struct ExecuteCommandTool {
    ws: Workspace,
    timeout: Duration,
    allowed_commands: Option<HashSet<String>>,
}

impl ExecuteCommandTool {
    pub fn new(ws: Workspace, timeout: Duration) -> Self {
        Self {
            ws,
            timeout,
            allowed_commands: None,
        }
    }

    /// Restrict execution to commands whose first token is in `commands`.
    pub fn with_allowlist(mut self, commands: impl IntoIterator<Item = String>) -> Self {
        self.allowed_commands = Some(commands.into_iter().map(|c| c.to_lowercase()).collect());
        self
    }

    fn check_allowed(&self, raw: &str) -> Result<(), String> {
        let lowered = raw.to_lowercase();
        for forbidden in FORBIDDEN_SUBSTRINGS {
            if lowered.contains(forbidden) {
                return Err(format!("forbidden pattern: {forbidden}"));
            }
        }
        let name = lowered.split_whitespace().next().unwrap_or("");
        if name.is_empty() {
            return Err("empty command".to_string());
        }
        if let Some(allowed) = &self.allowed_commands {
            if !allowed.contains(name) {
                return Err(format!("command '{name}' not in allowlist"));
            }
        }
        Ok(())
    }

    fn report(stdout: String, stderr: String, returncode: i64) -> Value {
        json!({
            "stdout": stdout,
            "stderr": stderr,
            "returncode": returncode,
        })
    }
}

#[async_trait]
impl Tool for ExecuteCommandTool {
    fn name(&self) -> &str {
        "execute_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the workspace and return stdout, stderr, and the exit code"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "The shell command to execute"}
            },
            "required": ["command"]
        })
    }

    async fn run(&self, args: Value) -> Result<Value, ToolError> {
        let command = args
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::execution("missing string argument: command"))?
            .trim()
            .to_string();

        if let Err(reason) = self.check_allowed(&command) {
            return Ok(Self::report(String::new(), reason, -1));
        }

        tracing::info!(%command, "executing shell command");

        let output = tokio::time::timeout(
            self.timeout,
            Command::new("sh")
                .arg("-c")
                .arg(&command)
                .current_dir(self.ws.root())
                .kill_on_drop(true)
                .output(),
        )
        .await;

        let report = match output {
            Ok(Ok(out)) => Self::report(
                String::from_utf8_lossy(&out.stdout).into_owned(),
                String::from_utf8_lossy(&out.stderr).into_owned(),
                out.status.code().map(i64::from).unwrap_or(-1),
            ),
            Ok(Err(e)) => Self::report(String::new(), e.to_string(), -1),
            Err(_) => Self::report(
                String::new(),
                format!("command timed out after {:?}", self.timeout),
                -1,
            ),
        };

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> (tempfile::TempDir, ExecuteCommandTool) {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        (dir, ExecuteCommandTool::new(ws, Duration::from_secs(5)))
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let (_dir, tool) = tool();
        let out = tool
            .run(json!({"command": "printf hello"}))
            .await
            .unwrap();
        assert_eq!(out["stdout"], "hello");
        assert_eq!(out["returncode"], 0);
    }

    #[tokio::test]
    async fn nonzero_exit_is_data() {
        let (_dir, tool) = tool();
        let out = tool.run(json!({"command": "exit 3"})).await.unwrap();
        assert_eq!(out["returncode"], 3);
    }

    #[tokio::test]
    async fn forbidden_pattern_is_refused_without_running() {
        let (_dir, tool) = tool();
        let out = tool.run(json!({"command": "rm -rf /"})).await.unwrap();
        assert_eq!(out["returncode"], -1);
        assert!(out["stderr"].as_str().unwrap().contains("forbidden"));
    }

    #[tokio::test]
    async fn allowlist_blocks_other_commands() {
        let (_dir, tool) = tool();
        let tool = tool.with_allowlist(["printf".to_string()]);
        let ok = tool.run(json!({"command": "printf hi"})).await.unwrap();
        assert_eq!(ok["returncode"], 0);

        let blocked = tool.run(json!({"command": "ls"})).await.unwrap();
        assert_eq!(blocked["returncode"], -1);
        assert!(blocked["stderr"].as_str().unwrap().contains("allowlist"));
    }

    #[tokio::test]
    async fn timeout_reports_minus_one() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ExecuteCommandTool::new(Workspace::new(dir.path()), Duration::from_millis(100));
        let out = tool.run(json!({"command": "sleep 5"})).await.unwrap();
        assert_eq!(out["returncode"], -1);
        assert!(out["stderr"].as_str().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn runs_in_workspace_directory() {
        let (dir, tool) = tool();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let out = tool.run(json!({"command": "ls"})).await.unwrap();
        assert!(out["stdout"].as_str().unwrap().contains("marker.txt"));
    }
}
