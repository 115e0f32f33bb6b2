//! Tool binder — turns discovered descriptors into callable units.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use wire::{HostClient, ToolDescriptor};

use crate::error::{Error, Result};
use crate::model::ToolResult;

/// Discovery attempts before session start fails.
const DISCOVERY_ATTEMPTS: u32 = 3;

/// Base backoff between discovery attempts (doubles each retry).
const DISCOVERY_BACKOFF: Duration = Duration::from_millis(250);

/// A callable unit produced from one [`ToolDescriptor`].
///
/// Each bound tool owns its descriptor — the name it invokes is fixed at
/// construction, never read from shared loop state. `invoke` is a pure
/// network call: every transport, host, and timeout failure comes back as
/// a failed [`ToolResult`] instead of an error.
#[derive(Debug, Clone)]
pub struct BoundTool {
    descriptor: ToolDescriptor,
    client: HostClient,
    timeout: Duration,
}

impl BoundTool {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    /// Invoke the tool with a JSON arguments object.
    pub async fn invoke(&self, arguments: Value) -> ToolResult {
        let call = self.client.invoke(&self.descriptor.name, &arguments);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(output)) => ToolResult::success(output),
            Ok(Err(wire::Error::Timeout)) | Err(_) => ToolResult::failure("timeout"),
            Ok(Err(e)) => ToolResult::failure(e.to_string()),
        }
    }
}

/// The session's bound tool set.
///
/// Read-only after [`bind`]; concurrently usable from any number of
/// in-flight invocations. If the host's capability set changes afterwards,
/// this set stays stale until an explicit re-bind creates a new one.
#[derive(Debug, Default)]
pub struct ToolSet {
    tools: Vec<BoundTool>,
    index: HashMap<String, usize>,
    descriptors: Vec<ToolDescriptor>,
    collisions: Vec<String>,
}

impl ToolSet {
    fn from_descriptors(
        descriptors: Vec<ToolDescriptor>,
        client: HostClient,
        timeout: Duration,
    ) -> Self {
        let mut set = ToolSet::default();
        for descriptor in descriptors {
            if set.index.contains_key(&descriptor.name) {
                tracing::warn!(tool = %descriptor.name, "duplicate tool name in discovery; keeping first");
                set.collisions.push(descriptor.name);
                continue;
            }
            set.index
                .insert(descriptor.name.clone(), set.tools.len());
            set.descriptors.push(descriptor.clone());
            set.tools.push(BoundTool {
                descriptor,
                client: client.clone(),
                timeout,
            });
        }
        set
    }

    pub fn get(&self, name: &str) -> Option<&BoundTool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Descriptors in discovery order, for handing to the decision policy.
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    /// Names that appeared more than once in the discovery response.
    pub fn collisions(&self) -> &[String] {
        &self.collisions
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Discover the host's tools and bind them for a session.
///
/// Retries discovery with doubling backoff; after the last attempt the
/// session start fails with [`Error::Discovery`] — an orchestrator with
/// zero tools cannot act, so there is no degraded mode. `tool_timeout`
/// becomes the per-invocation deadline of every bound tool.
pub async fn bind(client: HostClient, tool_timeout: Duration) -> Result<ToolSet> {
    let mut backoff = DISCOVERY_BACKOFF;
    let mut last_error = None;

    for attempt in 1..=DISCOVERY_ATTEMPTS {
        if attempt > 1 {
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
        match client.list_tools().await {
            Ok(descriptors) => {
                tracing::info!(
                    tools = descriptors.len(),
                    host = client.base_url(),
                    "tools bound"
                );
                return Ok(ToolSet::from_descriptors(descriptors, client, tool_timeout));
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "tool discovery failed");
                last_error = Some(e);
            }
        }
    }

    Err(Error::Discovery(
        last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no discovery attempts made".to_string()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(name: &str, description: &str) -> ToolDescriptor {
        ToolDescriptor::new(name, description, json!({"type": "object"}))
    }

    #[test]
    fn duplicate_names_keep_first_occurrence() {
        let client = HostClient::new("http://localhost:1");
        let set = ToolSet::from_descriptors(
            vec![
                descriptor("echo", "the real one"),
                descriptor("grep", "search"),
                descriptor("echo", "an impostor"),
            ],
            client,
            Duration::from_secs(1),
        );

        assert_eq!(set.len(), 2);
        assert_eq!(set.collisions(), &["echo".to_string()]);
        assert_eq!(set.get("echo").unwrap().descriptor().description, "the real one");
        assert_eq!(set.descriptors().len(), 2);
    }

    #[test]
    fn lookup_by_name() {
        let client = HostClient::new("http://localhost:1");
        let set = ToolSet::from_descriptors(
            vec![descriptor("echo", "")],
            client,
            Duration::from_secs(1),
        );
        assert!(set.get("echo").is_some());
        assert!(set.get("delete").is_none());
    }
}
