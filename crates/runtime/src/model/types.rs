use super::errors::ModelError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use wire::ToolDescriptor;

/// Outcome of one tool invocation.
///
/// Failures are data: the decision policy sees them on the next round and
/// can retry with corrected arguments, pick another tool, or answer anyway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Success { output: Value },
    Failure { error: String },
}

impl ToolResult {
    pub fn success(output: Value) -> Self {
        Self::Success { output }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// The success payload, if any.
    pub fn output(&self) -> Option<&Value> {
        match self {
            Self::Success { output } => Some(output),
            Self::Failure { .. } => None,
        }
    }
}

/// One entry in the conversation transcript.
///
/// A tool round appends `ToolCall` then `ToolCallResult` per requested
/// call, in the order the policy requested them. `id` correlates a result
/// to its call (providers that speak tool-use blocks require it).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "turn", rename_all = "snake_case")]
pub enum Turn {
    User {
        text: String,
    },
    Assistant {
        text: String,
    },
    ToolCall {
        id: String,
        name: String,
        arguments: Value,
    },
    ToolCallResult {
        id: String,
        name: String,
        result: ToolResult,
    },
}

/// Append-only transcript owned by exactly one session.
///
/// Turns are never mutated or removed; ordering is the sole record of what
/// happened when. Mutation goes through `&mut`, so the single-writer rule
/// is enforced by the borrow checker rather than a lock.
#[derive(Debug, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// One tool call requested by the decision policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// What the policy chose to do with the current conversation state.
#[derive(Debug, Clone)]
pub enum Decision {
    /// Final answer for this user turn.
    Answer(String),
    /// Invoke these tools, then decide again with their results.
    CallTools(Vec<ToolRequest>),
}

/// Everything the policy sees when deciding.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub history: &'a [Turn],
    pub tools: &'a [ToolDescriptor],
}

/// Trait for decision-policy backends.
///
/// The backend is an opaque function from conversation state to an action;
/// transport, prompting, and provider formats are its own business.
pub trait Backend: Send + Sync {
    fn decide(
        &self,
        request: ModelRequest<'_>,
    ) -> impl Future<Output = Result<Decision, ModelError>> + Send;
}
