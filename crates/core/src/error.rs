//! Error types for the Scribe domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// The top-level error type for all Scribe operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Approval errors ---
    #[error("Approval error: {0}")]
    Approval(#[from] ApprovalError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of one gateway round trip.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The vendor answered with a non-2xx status.
    #[error("API request failed with status {status_code}: {body}")]
    Api { status_code: u16, body: String },

    /// The vendor answered 2xx but the body was not the expected shape.
    #[error("Failed to parse provider response: {reason}")]
    Parse { reason: String, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The request was abandoned because the run was cancelled.
    #[error("Request interrupted: {0}")]
    Interrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Build a parse failure that keeps the raw body for diagnostics.
    pub fn parse(reason: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
            body: body.into(),
        }
    }

    /// HTTP status carried by this failure, when there is one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Raw response body carried by this failure, when there is one.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Api { body, .. } | Self::Parse { body, .. } => Some(body),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Backend request failed with status {status_code}: {body}")]
    Backend { status_code: u16, body: String },

    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    #[error("Tool panicked: {0}")]
    Panicked(String),
}

impl ToolError {
    /// Short variant name, used as the "class" of a failure in tool results.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NotFound",
            Self::InvalidArguments(_) => "InvalidArguments",
            Self::ExecutionFailed { .. } => "ExecutionFailed",
            Self::Backend { .. } => "Backend",
            Self::Unreachable(_) => "Unreachable",
            Self::Panicked(_) => "Panicked",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApprovalError {
    #[error("No pending approval with id {0}")]
    UnknownRequest(String),

    #[error("Approval {0} has no waiter any more")]
    WaiterGone(String),
}
