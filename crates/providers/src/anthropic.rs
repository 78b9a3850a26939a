//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly.
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Native tool use with `tool_use` / `tool_result` content blocks
//! - Prompt-cache usage counters

use async_trait::async_trait;
use scribe_core::error::ProviderError;
use scribe_core::message::{Role, TokenUsage, ToolCallRequest, Turn};
use scribe_core::provider::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use crate::http::{Auth, HttpTransport, parse_body};
use crate::wire::{CallIndex, call_id_or_new, join_text, orphan_text};

const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    transport: HttpTransport,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let transport = HttpTransport::new(Auth::header("x-api-key", api_key), timeout)?
            .with_header("anthropic-version", ANTHROPIC_VERSION);
        Ok(Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            transport,
        })
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Convert turns to Anthropic API format with content blocks.
    fn to_api_messages(turns: &[Turn]) -> Vec<AnthropicMessage> {
        let index = CallIndex::new(turns);
        let mut result = Vec::new();

        for turn in turns {
            match turn.role {
                Role::User => {
                    result.push(AnthropicMessage {
                        role: "user",
                        content: AnthropicContent::Text(turn.text_or_empty().to_string()),
                    });
                }
                Role::Assistant => {
                    if !turn.has_tool_calls() {
                        // Empty assistant content is rejected by the API.
                        if let Some(text) = turn.text.as_ref().filter(|t| !t.is_empty()) {
                            result.push(AnthropicMessage {
                                role: "assistant",
                                content: AnthropicContent::Text(text.clone()),
                            });
                        }
                        continue;
                    }

                    let mut blocks: Vec<ContentBlock> = Vec::new();
                    if let Some(text) = turn.text.as_ref().filter(|t| !t.is_empty()) {
                        blocks.push(ContentBlock::Text { text: text.clone() });
                    }
                    for tc in &turn.tool_calls {
                        blocks.push(ContentBlock::ToolUse {
                            id: tc.id.clone(),
                            name: tc.name.clone(),
                            input: tc.arguments.clone(),
                        });
                    }
                    result.push(AnthropicMessage {
                        role: "assistant",
                        content: AnthropicContent::Blocks(blocks),
                    });
                }
                Role::Tool => {
                    // All results of one round travel in a single user message.
                    let blocks = turn
                        .tool_results
                        .iter()
                        .map(|r| {
                            if index.name_of(&r.tool_call_id).is_some() {
                                ContentBlock::ToolResult {
                                    tool_use_id: r.tool_call_id.clone(),
                                    content: r.content.clone(),
                                    is_error: r.is_error,
                                }
                            } else {
                                ContentBlock::Text {
                                    text: orphan_text(r),
                                }
                            }
                        })
                        .collect::<Vec<_>>();
                    if !blocks.is_empty() {
                        result.push(AnthropicMessage {
                            role: "user",
                            content: AnthropicContent::Blocks(blocks),
                        });
                    }
                }
            }
        }

        result
    }

    /// Convert tool definitions to Anthropic format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<AnthropicTool> {
        tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect()
    }

    fn build_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.turns),
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "temperature": request.temperature,
        });

        if let Some(ref sys) = request.system_prompt {
            body["system"] = serde_json::json!(sys);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        body
    }

    /// Convert an Anthropic API response into an assistant turn.
    fn response_to_turn(resp: AnthropicResponse) -> Turn {
        let mut fragments = Vec::new();
        let mut tool_calls = Vec::new();

        for block in resp.content {
            match block {
                ResponseContentBlock::Text { text } => fragments.push(text),
                ResponseContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCallRequest::new(call_id_or_new(id), name, input));
                }
                ResponseContentBlock::Other => {}
            }
        }

        // Anthropic reports cached prompt tokens apart from `input_tokens`;
        // fold them in so every adapter counts the whole prompt.
        let cache_creation_tokens = resp.usage.cache_creation_input_tokens.unwrap_or(0);
        let cache_read_tokens = resp.usage.cache_read_input_tokens.unwrap_or(0);
        let usage = TokenUsage {
            input_tokens: resp.usage.input_tokens + cache_creation_tokens + cache_read_tokens,
            output_tokens: resp.usage.output_tokens,
            cache_creation_tokens,
            cache_read_tokens,
        };

        Turn::assistant(join_text(fragments), tool_calls).with_usage(usage)
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn send(&self, request: &ProviderRequest) -> std::result::Result<Turn, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = Self::build_body(request);

        debug!(provider = "anthropic", model = %request.model, turns = request.turns.len(), "Sending completion request");

        let text = self.transport.post_json(&self.name, &url, &body).await?;
        let api_resp: AnthropicResponse = parse_body(&self.name, &text)?;
        Ok(Self::response_to_turn(api_resp))
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: AnthropicContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ResponseContentBlock>,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    /// Thinking, redacted thinking and any block type added later.
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    cache_creation_input_tokens: Option<u64>,
    #[serde(default)]
    cache_read_input_tokens: Option<u64>,
}
