use thiserror::Error;

/// Orchestration errors.
///
/// Only conditions that make the current turn (or session start)
/// meaningless live here. A tool that is missing or fails stays out of this
/// enum on purpose: those outcomes are materialized as
/// [`ToolResult`](crate::ToolResult) data for the decision policy to react
/// to.
#[derive(Debug, Error)]
pub enum Error {
    /// The tool list could not be obtained; session start fails.
    #[error("tool discovery failed: {0}")]
    Discovery(String),

    /// The decision backend is unreachable or timed out. Fatal for the
    /// current turn; the conversation so far is preserved.
    #[error("decision backend unavailable: {0}")]
    PolicyUnavailable(String),

    /// The policy kept requesting tools past the configured round limit.
    #[error("exceeded {0} tool rounds in a single turn")]
    BoundedLoopExceeded(usize),

    /// The turn was cancelled while tool calls were in flight.
    #[error("turn cancelled")]
    Cancelled,

    #[error(transparent)]
    Storage(#[from] storage::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
