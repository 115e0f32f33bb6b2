//! Tool host wire protocol (HTTP/JSON binding).
//!
//! This crate defines the types spoken between a tool host and its clients,
//! plus a small HTTP client for the two protocol operations:
//!
//! - `GET <base>/tools` — discovery: the host's published [`ToolDescriptor`]s.
//! - `POST <base>/tools/<name>` — invocation: arguments in, raw return value
//!   out, with failures as non-2xx statuses or an `{"error": ...}` envelope.
//!
//! # Example
//!
//! ```no_run
//! use wire::HostClient;
//!
//! # async fn example() -> wire::Result<()> {
//! let client = HostClient::new("http://127.0.0.1:8731");
//!
//! for tool in client.list_tools().await? {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let result = client
//!     .invoke("read_file", &serde_json::json!({ "path": "README.md" }))
//!     .await?;
//! println!("{result}");
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod protocol;

pub use client::{DEFAULT_TIMEOUT, HostClient};
pub use error::{Error, Result};
pub use protocol::{ErrorBody, ToolDescriptor, as_error_envelope};
