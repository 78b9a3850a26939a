//! Progress events emitted by the agent loop.
//!
//! Events are delivered synchronously, in chronological order, on the task
//! that runs the loop. Every run ends with exactly one `Completed` or
//! `Failed` event.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use crate::message::{TokenUsage, ToolCallRequest, ToolCallResult, Turn};

/// Why a run stopped without completing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The provider call failed (transport or non-2xx).
    Gateway {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
        message: String,
    },
    /// The provider reply could not be understood.
    Parse { message: String, body: String },
    /// The operator cancelled the run.
    Cancelled,
    /// Cumulative input tokens went over the configured ceiling.
    BudgetExceeded { used: u64, limit: u64 },
    /// The round ceiling was reached while the model still wanted tools.
    RoundLimit { rounds: u32 },
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gateway {
                status_code: Some(code),
                message,
            } => write!(f, "provider request failed ({code}): {message}"),
            Self::Gateway { message, .. } => write!(f, "provider request failed: {message}"),
            Self::Parse { message, .. } => write!(f, "unreadable provider reply: {message}"),
            Self::Cancelled => write!(f, "run cancelled"),
            Self::BudgetExceeded { used, limit } => {
                write!(f, "input token budget exceeded ({used} > {limit})")
            }
            Self::RoundLimit { rounds } => {
                write!(f, "stopped after {rounds} rounds, the model appears to be looping")
            }
        }
    }
}

/// Events emitted by the agent during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Text produced by the model (final answer or commentary before tool calls).
    Text { text: String },

    /// A tool call is about to run.
    ToolCallStarted { call: ToolCallRequest },

    /// A tool call produced its (id-repaired) result.
    ToolCallFinished { name: String, result: ToolCallResult },

    /// One gateway round finished.
    RoundCompleted {
        round: u32,
        duration_ms: u64,
        usage: TokenUsage,
        cumulative_input_tokens: u64,
    },

    /// The run finished with a final assistant turn.
    Completed { turn: Turn },

    /// The run stopped.
    Failed { reason: FailureReason },
}

impl AgentEvent {
    /// Event name for logs and wire protocols.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::ToolCallStarted { .. } => "tool_call_started",
            Self::ToolCallFinished { .. } => "tool_call_finished",
            Self::RoundCompleted { .. } => "round_completed",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

/// Receiver of progress events. Must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &AgentEvent);
}

impl<F> EventSink for F
where
    F: Fn(&AgentEvent) + Send + Sync,
{
    fn emit(&self, event: &AgentEvent) {
        self(event)
    }
}

impl EventSink for mpsc::UnboundedSender<AgentEvent> {
    fn emit(&self, event: &AgentEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.send(event.clone());
    }
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn emit(&self, event: &AgentEvent) {
        (**self).emit(event)
    }
}

/// Fan out to several sinks in registration order.
impl EventSink for Vec<Arc<dyn EventSink>> {
    fn emit(&self, event: &AgentEvent) {
        for sink in self {
            sink.emit(event);
        }
    }
}

/// A sink that discards everything.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &AgentEvent) {}
}
