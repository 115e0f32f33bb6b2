//! Decision-policy backends.
//!
//! Provides concrete implementations of the [`Backend`](crate::Backend)
//! trait. Anthropic is the only provider today; the trait keeps the
//! orchestrator indifferent to which one is plugged in.

mod anthropic;

pub use anthropic::{AnthropicAuth, AnthropicBackend, AnthropicBackendBuilder};
