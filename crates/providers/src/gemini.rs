//! Google Gemini `generateContent` provider.
//!
//! Differences from the other vendors:
//! - the key travels in the query string (`?key=`)
//! - the assistant role is called `model`
//! - tool results are `functionResponse` parts, addressed by function name,
//!   so the name is recovered from the matching earlier `functionCall`
//! - function calls usually carry no id, so one is synthesized
//! - parameter schemas go through [`to_gemini_schema`]

use async_trait::async_trait;
use scribe_core::error::ProviderError;
use scribe_core::message::{Role, TokenUsage, ToolCallRequest, Turn};
use scribe_core::provider::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};
use crate::http::{Auth, HttpTransport, parse_body};
use crate::schema::{has_properties, to_gemini_schema};
use crate::wire::{CallIndex, call_id_or_new, join_text, orphan_text};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    name: String,
    base_url: String,
    transport: HttpTransport,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            name: "gemini".into(),
            base_url: DEFAULT_BASE_URL.into(),
            transport: HttpTransport::new(Auth::query("key", api_key), timeout)?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn to_contents(turns: &[Turn]) -> Vec<Content> {
        let index = CallIndex::new(turns);
        let mut contents = Vec::with_capacity(turns.len());

        for turn in turns {
            match turn.role {
                Role::User => contents.push(Content {
                    role: "user",
                    parts: vec![Part::text(turn.text_or_empty())],
                }),
                Role::Assistant => {
                    let mut parts = Vec::new();
                    if let Some(text) = turn.text.as_ref().filter(|t| !t.is_empty()) {
                        parts.push(Part::text(text));
                    }
                    for call in &turn.tool_calls {
                        parts.push(Part {
                            function_call: Some(FunctionCall {
                                name: call.name.clone(),
                                args: call.arguments.clone(),
                            }),
                            ..Part::default()
                        });
                    }
                    if !parts.is_empty() {
                        contents.push(Content {
                            role: "model",
                            parts,
                        });
                    }
                }
                Role::Tool => {
                    let parts: Vec<Part> = turn
                        .tool_results
                        .iter()
                        .map(|r| match index.name_of(&r.tool_call_id) {
                            Some(name) => {
                                let response = if r.is_error {
                                    json!({ "error": r.content })
                                } else {
                                    json!({ "output": r.content })
                                };
                                Part {
                                    function_response: Some(FunctionResponse {
                                        name: name.to_string(),
                                        response,
                                    }),
                                    ..Part::default()
                                }
                            }
                            None => Part::text(&orphan_text(r)),
                        })
                        .collect();
                    if !parts.is_empty() {
                        contents.push(Content {
                            role: "user",
                            parts,
                        });
                    }
                }
            }
        }

        contents
    }

    fn to_function_declarations(tools: &[ToolDefinition]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                let mut decl = json!({
                    "name": t.name,
                    "description": t.description,
                });
                let parameters = to_gemini_schema(&t.parameters);
                if has_properties(&parameters) {
                    decl["parameters"] = parameters;
                }
                decl
            })
            .collect()
    }

    fn build_body(request: &ProviderRequest) -> serde_json::Value {
        let mut generation_config = json!({ "temperature": request.temperature });
        if let Some(max_tokens) = request.max_tokens {
            generation_config["maxOutputTokens"] = json!(max_tokens);
        }

        let mut body = json!({
            "contents": Self::to_contents(&request.turns),
            "generationConfig": generation_config,
        });

        if let Some(ref system) = request.system_prompt {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }

        if !request.tools.is_empty() {
            body["tools"] = json!([{
                "functionDeclarations": Self::to_function_declarations(&request.tools)
            }]);
        }

        body
    }

    fn response_to_turn(resp: GenerateResponse, raw: &str) -> Result<Turn, ProviderError> {
        let candidate = resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::parse("No candidates in response", raw))?;

        let Some(content) = candidate.content else {
            let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".into());
            warn!(provider = "gemini", finish_reason = %reason, "Candidate has no content");
            return Err(ProviderError::parse(
                format!("Candidate has no content (finishReason: {reason})"),
                raw,
            ));
        };

        let mut fragments = Vec::new();
        let mut tool_calls = Vec::new();
        for part in content.parts {
            if part.thought {
                continue;
            }
            if let Some(text) = part.text {
                fragments.push(text);
            }
            if let Some(call) = part.function_call {
                tool_calls.push(ToolCallRequest::new(
                    call_id_or_new(call.id),
                    call.name,
                    call.args.unwrap_or_else(|| json!({})),
                ));
            }
        }

        let usage = resp
            .usage_metadata
            .map(|u| TokenUsage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
                cache_creation_tokens: 0,
                cache_read_tokens: u.cached_content_token_count,
            })
            .unwrap_or_default();

        Ok(Turn::assistant(join_text(fragments), tool_calls).with_usage(usage))
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn send(&self, request: &ProviderRequest) -> std::result::Result<Turn, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);
        let body = Self::build_body(request);

        debug!(provider = "gemini", model = %request.model, turns = request.turns.len(), "Sending completion request");

        let text = self.transport.post_json(&self.name, &url, &body).await?;
        let resp: GenerateResponse = parse_body(&self.name, &text)?;
        Self::response_to_turn(resp, &text)
    }
}

// --- Gemini API types ---

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize)]
struct FunctionCall {
    name: String,
    args: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct FunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    /// Thought summaries are not part of the answer.
    #[serde(default)]
    thought: bool,
    #[serde(default)]
    function_call: Option<ResponseFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct ResponseFunctionCall {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    cached_content_token_count: u64,
}
