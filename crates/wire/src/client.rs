//! HTTP client for the tool host protocol.

use std::time::Duration;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::protocol::{ErrorBody, ToolDescriptor, as_error_envelope};

/// Default per-request timeout for host operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client handle for one tool host endpoint.
///
/// Cheap to clone; every clone talks to the same host. The client is
/// stateless between calls — all session state lives on the orchestrator
/// side.
#[derive(Debug, Clone)]
pub struct HostClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HostClient {
    /// Create a client for the given base URL (e.g. `http://127.0.0.1:8731`).
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The host base URL this client targets.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the host's published tool descriptors.
    ///
    /// Idempotent and side-effect free; the host returns a stable order
    /// within one process lifetime.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let url = format!("{}/tools", self.base_url);
        let response = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            return Err(host_error(response).await);
        }

        response
            .json::<Vec<ToolDescriptor>>()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))
    }

    /// Invoke a tool with a JSON arguments object.
    ///
    /// Both a non-2xx status and a 2xx `{"error": ...}` envelope are tool
    /// failures; a successful call returns the tool's raw return value.
    pub async fn invoke(&self, name: &str, arguments: &Value) -> Result<Value> {
        let url = format!("{}/tools/{name}", self.base_url);
        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(arguments)
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            return Err(host_error(response).await);
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;

        if let Some(message) = as_error_envelope(&value) {
            return Err(Error::Tool(message.to_string()));
        }

        Ok(value)
    }
}

fn map_transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout
    } else {
        Error::Network(e.to_string())
    }
}

async fn host_error(response: reqwest::Response) -> Error {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.error)
        .unwrap_or(body);
    Error::Host { status, message }
}
