//! Tool host error types.

use std::net::SocketAddr;

use thiserror::Error;

/// Errors from the host server lifecycle.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Errors from tool execution.
///
/// These never cross the HTTP boundary as faults — the server converts them
/// into error bodies so a misbehaving tool cannot take the host down.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("path escapes workspace: {0}")]
    PathEscape(String),

    #[error("{0}")]
    Execution(String),
}

impl ToolError {
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }
}
