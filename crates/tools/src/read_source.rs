//! Read source tool: fetch the current text of a backend object.

use async_trait::async_trait;
use scribe_core::error::ToolError;
use scribe_core::message::ToolCallResult;
use scribe_core::tool::Tool;
use std::sync::Arc;
use crate::backend::BackendClient;
use crate::required_str;

pub struct ReadSourceTool {
    client: Arc<BackendClient>,
}

impl ReadSourceTool {
    pub fn new(client: Arc<BackendClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ReadSourceTool {
    fn name(&self) -> &str {
        "read_source"
    }

    fn description(&self) -> &str {
        "Read the current source text of a backend object."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "URL of the object's source"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolCallResult, ToolError> {
        let url = required_str(&arguments, "url")?;

        match self.client.get_text(url).await? {
            Some(text) => Ok(ToolCallResult::success("", text)),
            None => Ok(ToolCallResult::error(
                "",
                format!("NotFound: no object exists at {url}"),
            )),
        }
    }
}
