//! Tool host — owns tool implementations and serves them over HTTP.
//!
//! The host publishes a set of [`Tool`]s through two endpoints:
//! `GET /tools` (discovery) and `POST /tools/{name}` (invocation). Tool
//! failures — bad arguments, execution errors, even panics — are converted
//! to error bodies at the HTTP boundary so one bad integration can never
//! crash the host or leak a fault into a caller's control flow.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> host::Result<()> {
//! let registry = Arc::new(host::standard_registry(".", Duration::from_secs(30), None));
//! host::serve("127.0.0.1:8731".parse().unwrap(), registry).await
//! # }
//! ```

mod error;
mod server;
mod tools;
mod validate;

pub use error::{Error, Result, ToolError};
pub use server::{router, serve};
pub use tools::{
    CreateDirectoryTool, DeleteFileTool, DirectoryExistsTool, ExecuteCommandTool, FileExistsTool,
    ListDirectoryTool, ReadFileTool, Tool, ToolRegistry, WriteFileTool, Workspace,
    standard_registry,
};
pub use validate::validate_arguments;
