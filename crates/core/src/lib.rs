//! # Scribe Core
//!
//! Domain types, traits, and error definitions for the Scribe agent
//! orchestration loop. This crate has **no HTTP or vendor dependencies**;
//! it defines the conversation model that every other crate speaks.
//!
//! ## Design Philosophy
//!
//! Every seam is a trait here (`Provider`, `Tool`, `ToolExecutor`,
//! `EventSink`, `ApprovalHandler`, `ResourceFetcher`). Implementations live
//! in their respective crates, which keeps the loop testable with scripted
//! stand-ins.

pub mod approval;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use approval::{
    ApprovalBroker, ApprovalDecision, ApprovalGate, ApprovalHandle, ApprovalHandler,
    ApprovalRequest, ApprovalWaiter, WaitOutcome,
};
pub use error::{ApprovalError, Error, ProviderError, Result, ToolError};
pub use event::{AgentEvent, EventSink, FailureReason, NullSink};
pub use message::{Conversation, Role, TokenUsage, ToolCallRequest, ToolCallResult, Turn};
pub use provider::{Provider, ProviderKind, ProviderRequest, ToolDefinition};
pub use session::{SessionStore, SharedConversation};
pub use tool::{ResourceFetcher, Tool, ToolExecutor, ToolRegistry};
