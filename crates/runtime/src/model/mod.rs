//! Decision-policy types and backend trait.

pub mod errors;
pub mod types;

pub use errors::ModelError;
pub use types::{
    Backend, Conversation, Decision, ModelRequest, ToolRequest, ToolResult, Turn,
};
