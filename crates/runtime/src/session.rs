//! Session management — the decide → invoke → incorporate loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Notify;

use crate::binder::ToolSet;
use crate::error::{Error, Result};
use crate::model::{
    Backend, Conversation, Decision, ModelError, ModelRequest, ToolRequest, ToolResult, Turn,
};
use storage::{Event, EventStore, Role, SessionId};

/// Backoff before the single retry of a failed decision call.
const POLICY_RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Per-session settings, immutable after start.
///
/// The per-invocation tool deadline is not here — it is fixed into each
/// [`BoundTool`](crate::BoundTool) at [`bind`](crate::bind) time.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Tool rounds allowed within one user turn before the turn fails.
    pub max_rounds: usize,
    /// Deadline for each decision-policy call.
    pub policy_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_rounds: 8,
            policy_timeout: Duration::from_secs(120),
        }
    }
}

/// Clonable handle that cancels the session's active turn.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    flag: AtomicBool,
    notify: Notify,
}

impl CancelHandle {
    /// Request cancellation of the turn currently in flight.
    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire)
    }

    fn reset(&self) {
        self.inner.flag.store(false, Ordering::Release);
    }

    async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// A conversation session: one bound tool set, one transcript, one
/// decision backend.
///
/// The session runs one decision round at a time; within a round,
/// independent tool calls dispatch concurrently but their turns land in the
/// transcript in the order the policy requested them.
pub struct Session<B: Backend> {
    pub id: SessionId,
    store: EventStore,
    backend: B,
    tools: ToolSet,
    conversation: Conversation,
    config: SessionConfig,
    cancel: CancelHandle,
}

impl<B: Backend> Session<B> {
    /// Create a new session over an already-bound tool set.
    pub fn new(
        store: EventStore,
        backend: B,
        tools: ToolSet,
        config: SessionConfig,
    ) -> Result<Self> {
        let id = SessionId::new();
        store.append(&Event::new(id, storage::EventKind::SessionStart))?;

        Ok(Self {
            id,
            store,
            backend,
            tools,
            conversation: Conversation::new(),
            config,
            cancel: CancelHandle::default(),
        })
    }

    /// The transcript accumulated so far.
    pub fn conversation(&self) -> &[Turn] {
        self.conversation.turns()
    }

    /// The session's bound tool set (frozen until an explicit re-bind
    /// builds a replacement session).
    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    /// Handle for interrupting the active turn from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Process one user turn to a final answer.
    ///
    /// Tool failures never abort the turn — they come back to the policy as
    /// result data. Errors returned here ([`Error::PolicyUnavailable`],
    /// [`Error::BoundedLoopExceeded`], [`Error::Cancelled`]) abort only this
    /// turn; the transcript up to the failure is preserved and the next
    /// call continues the session.
    pub async fn process_turn(&mut self, text: &str) -> Result<String> {
        self.cancel.reset();

        self.conversation.push(Turn::User {
            text: text.to_string(),
        });
        self.store
            .append(&Event::message(self.id, Role::User, text))?;

        for round in 0..self.config.max_rounds {
            let decision = self.decide().await?;

            match decision {
                Decision::Answer(answer) => {
                    self.conversation.push(Turn::Assistant {
                        text: answer.clone(),
                    });
                    self.store
                        .append(&Event::message(self.id, Role::Assistant, &answer))?;
                    return Ok(answer);
                }
                Decision::CallTools(requests) => {
                    tracing::debug!(round, calls = requests.len(), "executing tool round");
                    self.execute_round(requests).await?;
                }
            }
        }

        tracing::warn!(
            max_rounds = self.config.max_rounds,
            "policy exceeded the tool round limit"
        );
        Err(Error::BoundedLoopExceeded(self.config.max_rounds))
    }

    /// End the session, closing its event log.
    pub fn end(self) -> Result<()> {
        self.store
            .append(&Event::new(self.id, storage::EventKind::SessionEnd))?;
        Ok(())
    }

    /// One decision call: deadline, then a single retry on transport
    /// failure. A timed-out call is not retried — its deadline is spent.
    async fn decide(&self) -> Result<Decision> {
        let request = ModelRequest {
            history: self.conversation.turns(),
            tools: self.tools.descriptors(),
        };

        let first = tokio::time::timeout(self.config.policy_timeout, self.backend.decide(request));
        match first.await {
            Ok(Ok(decision)) => return Ok(decision),
            Ok(Err(ModelError::Network(e))) => {
                tracing::warn!(error = %e, "decision call failed; retrying once");
            }
            Ok(Err(e)) => return Err(Error::PolicyUnavailable(e.to_string())),
            Err(_) => {
                return Err(Error::PolicyUnavailable(format!(
                    "decision timed out after {:?}",
                    self.config.policy_timeout
                )));
            }
        }

        tokio::time::sleep(POLICY_RETRY_BACKOFF).await;

        let retry = tokio::time::timeout(self.config.policy_timeout, self.backend.decide(request));
        match retry.await {
            Ok(Ok(decision)) => Ok(decision),
            Ok(Err(e)) => Err(Error::PolicyUnavailable(e.to_string())),
            Err(_) => Err(Error::PolicyUnavailable(format!(
                "decision timed out after {:?}",
                self.config.policy_timeout
            ))),
        }
    }

    /// Execute one round of tool calls.
    ///
    /// All calls dispatch immediately; completions are awaited in request
    /// order so the transcript is deterministic regardless of network
    /// timing. A call whose name is not bound never touches the network —
    /// its failure is synthesized locally.
    async fn execute_round(&mut self, requests: Vec<ToolRequest>) -> Result<()> {
        enum Pending {
            Immediate(ToolResult),
            InFlight(tokio::task::JoinHandle<ToolResult>),
        }

        let mut pending = Vec::with_capacity(requests.len());
        for request in &requests {
            match self.tools.get(&request.name) {
                Some(tool) => {
                    let tool = tool.clone();
                    let arguments = request.arguments.clone();
                    pending.push(Pending::InFlight(tokio::spawn(async move {
                        tool.invoke(arguments).await
                    })));
                }
                None => {
                    tracing::warn!(tool = %request.name, "requested tool is not bound");
                    pending.push(Pending::Immediate(ToolResult::failure("ToolNotFound")));
                }
            }
        }

        let mut pending = pending.into_iter();
        for request in requests {
            let entry = pending.next().expect("one pending entry per request");
            let result = match entry {
                Pending::Immediate(result) => result,
                Pending::InFlight(mut handle) => {
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            handle.abort();
                            for rest in pending {
                                if let Pending::InFlight(rest) = rest {
                                    rest.abort();
                                }
                            }
                            return Err(Error::Cancelled);
                        }
                        joined = &mut handle => joined.unwrap_or_else(|e| {
                            ToolResult::failure(format!("tool task failed: {e}"))
                        }),
                    }
                }
            };

            self.append_call(&request, result)?;
        }

        Ok(())
    }

    fn append_call(&mut self, request: &ToolRequest, result: ToolResult) -> Result<()> {
        self.store.append(&Event::tool_call(
            self.id,
            &request.name,
            request.arguments.clone(),
        ))?;
        self.conversation.push(Turn::ToolCall {
            id: request.id.clone(),
            name: request.name.clone(),
            arguments: request.arguments.clone(),
        });

        let (success, output) = match &result {
            ToolResult::Success { output } => (true, output.clone()),
            ToolResult::Failure { error } => (false, Value::String(error.clone())),
        };
        self.store
            .append(&Event::tool_result(self.id, &request.name, success, output))?;
        self.conversation.push(Turn::ToolCallResult {
            id: request.id.clone(),
            name: request.name.clone(),
            result,
        });

        Ok(())
    }
}
