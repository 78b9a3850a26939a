//! Human approval for mutating tool calls.
//!
//! A pending approval is a one-shot rendezvous: the agent loop holds the
//! [`ApprovalWaiter`] and suspends on it, while whoever talks to the operator
//! holds the [`ApprovalHandle`] and resolves it exactly once. The
//! [`ApprovalBroker`] keeps handles addressable by request id so a front end
//! only needs the id to answer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use crate::error::ApprovalError;

/// What the operator is asked to approve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Request id. Equal to the tool call id it guards.
    pub id: String,
    pub tool_call_id: String,
    pub tool_name: String,

    /// Object the call is about to change.
    pub object_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_locator: Option<String>,

    /// Current content; empty when the object does not exist yet.
    pub before_text: String,

    /// Content the model proposes to write.
    pub after_text: String,

    pub created_at: DateTime<Utc>,
}

impl ApprovalRequest {
    pub fn new(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        object_name: impl Into<String>,
        before_text: impl Into<String>,
        after_text: impl Into<String>,
    ) -> Self {
        let tool_call_id = tool_call_id.into();
        Self {
            id: tool_call_id.clone(),
            tool_call_id,
            tool_name: tool_name.into(),
            object_name: object_name.into(),
            resource_locator: None,
            before_text: before_text.into(),
            after_text: after_text.into(),
            created_at: Utc::now(),
        }
    }

    pub fn with_locator(mut self, locator: Option<String>) -> Self {
        self.resource_locator = locator;
        self
    }
}

/// The operator's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "text", rename_all = "snake_case")]
pub enum ApprovalDecision {
    Accepted,
    Rejected,
    /// Accepted with operator-supplied replacement content.
    Edited(String),
}

/// How a wait on a pending approval ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Resolved(ApprovalDecision),
    /// The run was cancelled or the resolving side went away.
    Interrupted,
}

/// Constructor for the handle/waiter pair.
pub struct ApprovalGate;

impl ApprovalGate {
    pub fn open(request: ApprovalRequest) -> (ApprovalHandle, ApprovalWaiter) {
        let (tx, rx) = oneshot::channel();
        let handle = ApprovalHandle {
            request: request.clone(),
            sender: tx,
        };
        let waiter = ApprovalWaiter { request, receiver: rx };
        (handle, waiter)
    }
}

/// Resolving side. Consumed on use, so a second resolution cannot compile.
pub struct ApprovalHandle {
    request: ApprovalRequest,
    sender: oneshot::Sender<ApprovalDecision>,
}

impl ApprovalHandle {
    pub fn request(&self) -> &ApprovalRequest {
        &self.request
    }

    pub fn resolve(self, decision: ApprovalDecision) -> Result<(), ApprovalError> {
        self.sender
            .send(decision)
            .map_err(|_| ApprovalError::WaiterGone(self.request.id.clone()))
    }
}

/// Suspending side, held by the agent loop.
pub struct ApprovalWaiter {
    request: ApprovalRequest,
    receiver: oneshot::Receiver<ApprovalDecision>,
}

impl ApprovalWaiter {
    pub fn request(&self) -> &ApprovalRequest {
        &self.request
    }

    /// Wait for a decision or for `cancel` to fire, whichever is first.
    pub async fn wait(self, cancel: &CancellationToken) -> WaitOutcome {
        let Self { request, receiver } = self;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(request_id = %request.id, "Approval wait cancelled");
                WaitOutcome::Interrupted
            }
            decision = receiver => match decision {
                Ok(decision) => WaitOutcome::Resolved(decision),
                Err(_) => {
                    warn!(request_id = %request.id, "Approval handle dropped without a decision");
                    WaitOutcome::Interrupted
                }
            },
        }
    }
}

/// Receives notice that a request is waiting for the operator.
///
/// Implementations must return promptly; the answer comes back later through
/// [`ApprovalBroker::resolve`].
pub trait ApprovalHandler: Send + Sync {
    fn on_approval_needed(&self, request: ApprovalRequest);
}

impl<F> ApprovalHandler for F
where
    F: Fn(ApprovalRequest) + Send + Sync,
{
    fn on_approval_needed(&self, request: ApprovalRequest) {
        self(request)
    }
}

/// Pending approvals addressable by request id.
#[derive(Default)]
pub struct ApprovalBroker {
    pending: Mutex<HashMap<String, ApprovalHandle>>,
}

impl ApprovalBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request and return the waiter for it.
    pub fn open(&self, request: ApprovalRequest) -> ApprovalWaiter {
        let (handle, waiter) = ApprovalGate::open(request);
        let id = handle.request().id.clone();
        let mut pending = self.lock();
        if pending.insert(id.clone(), handle).is_some() {
            warn!(request_id = %id, "Replaced an approval that was still pending");
        }
        waiter
    }

    /// Deliver a decision. Each request resolves at most once; a second call
    /// for the same id fails with [`ApprovalError::UnknownRequest`].
    pub fn resolve(&self, request_id: &str, decision: ApprovalDecision) -> Result<(), ApprovalError> {
        let handle = self
            .lock()
            .remove(request_id)
            .ok_or_else(|| ApprovalError::UnknownRequest(request_id.to_string()))?;
        debug!(request_id, ?decision, "Resolving approval");
        handle.resolve(decision)
    }

    /// Drop a pending request without answering it.
    pub fn discard(&self, request_id: &str) -> bool {
        self.lock().remove(request_id).is_some()
    }

    /// Requests still waiting, oldest first.
    pub fn pending(&self) -> Vec<ApprovalRequest> {
        let mut requests: Vec<ApprovalRequest> =
            self.lock().values().map(|h| h.request().clone()).collect();
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        requests
    }

    pub fn is_pending(&self, request_id: &str) -> bool {
        self.lock().contains_key(request_id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ApprovalHandle>> {
        // A poisoned map is still a valid map.
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn request(id: &str) -> ApprovalRequest {
        ApprovalRequest::new(id, "write_source", "ZREPORT", "old", "new")
    }

    #[tokio::test]
    async fn gate_delivers_decision() {
        let (handle, waiter) = ApprovalGate::open(request("call_1"));
        assert_eq!(waiter.request().object_name, "ZREPORT");
        handle.resolve(ApprovalDecision::Accepted).unwrap();
        let outcome = waiter.wait(&CancellationToken::new()).await;
        assert_eq!(outcome, WaitOutcome::Resolved(ApprovalDecision::Accepted));
    }

    #[tokio::test]
    async fn dropped_handle_interrupts() {
        let (handle, waiter) = ApprovalGate::open(request("call_1"));
        drop(handle);
        let outcome = waiter.wait(&CancellationToken::new()).await;
        assert_eq!(outcome, WaitOutcome::Interrupted);
    }

    #[tokio::test]
    async fn cancellation_interrupts_wait() {
        let broker = ApprovalBroker::new();
        let waiter = broker.open(request("call_1"));
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        assert_eq!(waiter.wait(&cancel).await, WaitOutcome::Interrupted);
    }

    #[tokio::test]
    async fn broker_resolves_once() {
        let broker = Arc::new(ApprovalBroker::new());
        let waiter = broker.open(request("call_7"));
        assert!(broker.is_pending("call_7"));

        let resolver = broker.clone();
        tokio::spawn(async move {
            resolver
                .resolve("call_7", ApprovalDecision::Edited("fixed".into()))
                .unwrap();
        });

        let outcome = waiter.wait(&CancellationToken::new()).await;
        assert_eq!(
            outcome,
            WaitOutcome::Resolved(ApprovalDecision::Edited("fixed".into()))
        );

        let again = broker.resolve("call_7", ApprovalDecision::Rejected);
        assert_eq!(again, Err(ApprovalError::UnknownRequest("call_7".into())));
    }

    #[test]
    fn resolve_unknown_request() {
        let broker = ApprovalBroker::new();
        let err = broker.resolve("nope", ApprovalDecision::Accepted).unwrap_err();
        assert!(matches!(err, ApprovalError::UnknownRequest(_)));
    }

    #[test]
    fn resolve_after_waiter_dropped() {
        let broker = ApprovalBroker::new();
        let waiter = broker.open(request("call_2"));
        drop(waiter);
        let err = broker.resolve("call_2", ApprovalDecision::Accepted).unwrap_err();
        assert_eq!(err, ApprovalError::WaiterGone("call_2".into()));
    }

    #[test]
    fn pending_lists_open_requests() {
        let broker = ApprovalBroker::new();
        let _a = broker.open(request("a"));
        let _b = broker.open(request("b"));
        let ids: Vec<String> = broker.pending().into_iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(broker.discard("a"));
        assert!(!broker.is_pending("a"));
    }

    #[test]
    fn decision_serialization() {
        let json = serde_json::to_string(&ApprovalDecision::Edited("x".into())).unwrap();
        assert!(json.contains(r#""decision":"edited""#));
        let back: ApprovalDecision = serde_json::from_str(r#"{"decision":"accepted"}"#).unwrap();
        assert_eq!(back, ApprovalDecision::Accepted);
    }
}
