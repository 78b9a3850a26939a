//! Create object tool: create a new backend object with initial source.
//!
//! Mutating; the agent loop asks the operator before this runs.

use async_trait::async_trait;
use scribe_core::error::ToolError;
use scribe_core::message::ToolCallResult;
use scribe_core::tool::Tool;
use std::sync::Arc;
use crate::backend::BackendClient;
use crate::required_str;

pub struct CreateObjectTool {
    client: Arc<BackendClient>,
}

impl CreateObjectTool {
    pub fn new(client: Arc<BackendClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for CreateObjectTool {
    fn name(&self) -> &str {
        "create_object"
    }

    fn description(&self) -> &str {
        "Create a new backend object with the given initial source text. \
         The operator reviews the object before it is created."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "object_name": {
                    "type": "string",
                    "description": "Name of the new object"
                },
                "url": {
                    "type": "string",
                    "description": "URL the object is created at"
                },
                "source": {
                    "type": "string",
                    "description": "Initial source text"
                }
            },
            "required": ["object_name", "url", "source"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolCallResult, ToolError> {
        let object_name = required_str(&arguments, "object_name")?;
        let url = required_str(&arguments, "url")?;
        let source = required_str(&arguments, "source")?;

        let location = self.client.post_text(url, source).await?;
        let location = location.trim();

        let content = if location.is_empty() {
            format!("Created {object_name}.")
        } else {
            format!("Created {object_name}: {location}")
        };
        Ok(ToolCallResult::success("", content))
    }
}
