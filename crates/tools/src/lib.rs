//! Built-in tools for Scribe.
//!
//! Every tool talks to the source backend through one shared
//! [`BackendClient`]:
//!
//! - `read_source` fetches an object's current text
//! - `write_source` replaces it (mutating)
//! - `create_object` creates a new object (mutating)

pub mod backend;
pub mod create_object;
pub mod read_source;
pub mod write_source;

use scribe_core::error::ToolError;
use scribe_core::tool::ToolRegistry;
use std::sync::Arc;

pub use backend::BackendClient;
pub use create_object::CreateObjectTool;
pub use read_source::ReadSourceTool;
pub use write_source::WriteSourceTool;

/// Create a registry with every built-in tool sharing `client`.
pub fn default_registry(client: Arc<BackendClient>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ReadSourceTool::new(client.clone())));
    registry.register(Box::new(WriteSourceTool::new(client.clone())));
    registry.register(Box::new(CreateObjectTool::new(client)));
    registry
}

pub(crate) fn required_str<'a>(
    arguments: &'a serde_json::Value,
    field: &str,
) -> Result<&'a str, ToolError> {
    arguments[field]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{field}' argument")))
}
