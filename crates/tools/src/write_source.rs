//! Write source tool: replace the text of an existing backend object.
//!
//! Mutating; the agent loop asks the operator before this runs.

use async_trait::async_trait;
use scribe_core::error::ToolError;
use scribe_core::message::ToolCallResult;
use scribe_core::tool::Tool;
use std::sync::Arc;
use crate::backend::BackendClient;
use crate::required_str;

pub struct WriteSourceTool {
    client: Arc<BackendClient>,
}

impl WriteSourceTool {
    pub fn new(client: Arc<BackendClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for WriteSourceTool {
    fn name(&self) -> &str {
        "write_source"
    }

    fn description(&self) -> &str {
        "Replace the full source text of an existing backend object. \
         The operator reviews the change before it is written."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "object_name": {
                    "type": "string",
                    "description": "Name of the object being changed"
                },
                "url": {
                    "type": "string",
                    "description": "URL of the object's source"
                },
                "source": {
                    "type": "string",
                    "description": "The complete new source text"
                }
            },
            "required": ["object_name", "url", "source"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolCallResult, ToolError> {
        let object_name = required_str(&arguments, "object_name")?;
        let url = required_str(&arguments, "url")?;
        let source = required_str(&arguments, "source")?;

        self.client.put_text(url, source).await?;

        Ok(ToolCallResult::success(
            "",
            format!("Saved {object_name} ({} lines).", source.lines().count()),
        ))
    }
}
