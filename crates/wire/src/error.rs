//! Wire protocol error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("network error: {0}")]
    Network(String),

    #[error("timeout waiting for response")]
    Timeout,

    #[error("host returned {status}: {message}")]
    Host { status: u16, message: String },

    #[error("tool failed: {0}")]
    Tool(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, Error>;
