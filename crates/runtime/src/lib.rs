//! Coxswain runtime — tool binding and session orchestration.
//!
//! This crate drives the decide → invoke → incorporate loop:
//!
//! - **Binder**: [`bind`] discovers a host's tools and produces the
//!   session's read-only [`ToolSet`] of [`BoundTool`]s.
//! - **Session**: a [`Session`] owns one append-only [`Conversation`] and
//!   one bound tool set, and processes user turns against a decision
//!   [`Backend`].
//! - **Backend**: the decision policy, abstracted as a trait; the
//!   [`AnthropicBackend`] is the provider implementation.
//!
//! # Example
//!
//! ```ignore
//! use runtime::{AnthropicAuth, AnthropicBackend, Session, SessionConfig, bind};
//! use storage::EventStore;
//! use wire::HostClient;
//!
//! # async fn example() -> runtime::Result<()> {
//! use std::time::Duration;
//!
//! let client = HostClient::new("http://127.0.0.1:8731");
//! let tools = bind(client, Duration::from_secs(60)).await?;
//!
//! let auth = AnthropicAuth::ApiKey("sk-ant-api01-...".into());
//! let backend = AnthropicBackend::builder(auth, "claude-sonnet-4-20250514").build();
//! let store = EventStore::in_memory()?;
//!
//! let mut session = Session::new(store, backend, tools, SessionConfig::default())?;
//! let answer = session.process_turn("list the files here").await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

mod backend;
mod binder;
mod error;
pub mod model;
mod session;

// Decision-policy types
pub use model::{
    Backend, Conversation, Decision, ModelError, ModelRequest, ToolRequest, ToolResult, Turn,
};

// Provider backends
pub use backend::{AnthropicAuth, AnthropicBackend, AnthropicBackendBuilder};

// Binder
pub use binder::{BoundTool, ToolSet, bind};

// Error types
pub use error::{Error, Result};

// Session management
pub use session::{CancelHandle, Session, SessionConfig};
