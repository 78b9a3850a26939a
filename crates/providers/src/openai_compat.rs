//! OpenAI chat-completions provider.
//!
//! Serves both OpenAI proper (bearer auth, `{base}/chat/completions`) and
//! Azure OpenAI, which accepts the same body at
//! `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version=...`
//! with an `api-key` header.

use async_trait::async_trait;
use scribe_core::error::ProviderError;
use scribe_core::message::{Role, TokenUsage, ToolCallRequest, Turn};
use scribe_core::provider::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use crate::http::{Auth, HttpTransport, parse_body};
use crate::wire::{CallIndex, call_id_or_new, join_text, orphan_text};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const AZURE_DEFAULT_API_VERSION: &str = "2024-06-01";

/// An OpenAI-compatible chat completions provider.
pub struct OpenAiCompatProvider {
    name: String,
    kind: ProviderKind,
    endpoint: String,
    transport: HttpTransport,
}

impl OpenAiCompatProvider {
    /// Create a provider for any OpenAI-compatible base URL.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let base_url = base_url.into();
        Ok(Self {
            name: name.into(),
            kind: ProviderKind::OpenAi,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            transport: HttpTransport::new(Auth::Bearer(api_key.into()), timeout)?,
        })
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        Self::new("openai", OPENAI_BASE_URL, api_key, timeout)
    }

    /// Create an Azure OpenAI provider for one deployment.
    pub fn azure(
        endpoint: &str,
        deployment: &str,
        api_version: Option<&str>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let endpoint = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            endpoint.trim_end_matches('/'),
            deployment,
            api_version.unwrap_or(AZURE_DEFAULT_API_VERSION),
        );
        Ok(Self {
            name: "azure_openai".into(),
            kind: ProviderKind::AzureOpenAi,
            endpoint,
            transport: HttpTransport::new(Auth::header("api-key", api_key), timeout)?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Convert turns to OpenAI API format.
    fn to_api_messages(system_prompt: Option<&str>, turns: &[Turn]) -> Vec<ApiMessage> {
        let index = CallIndex::new(turns);
        let mut messages = Vec::with_capacity(turns.len() + 1);

        if let Some(system) = system_prompt {
            messages.push(ApiMessage::text("system", system));
        }

        for turn in turns {
            match turn.role {
                Role::User => messages.push(ApiMessage::text("user", turn.text_or_empty())),
                Role::Assistant if turn.text.is_none() && !turn.has_tool_calls() => {}
                Role::Assistant => messages.push(ApiMessage {
                    role: "assistant",
                    content: turn.text.clone(),
                    tool_calls: if turn.tool_calls.is_empty() {
                        None
                    } else {
                        Some(
                            turn.tool_calls
                                .iter()
                                .map(|tc| ApiToolCall {
                                    id: tc.id.clone(),
                                    r#type: "function",
                                    function: ApiFunction {
                                        name: tc.name.clone(),
                                        arguments: tc.arguments.to_string(),
                                    },
                                })
                                .collect(),
                        )
                    },
                    tool_call_id: None,
                }),
                Role::Tool => {
                    // Each result is its own `tool` message.
                    for result in &turn.tool_results {
                        if index.name_of(&result.tool_call_id).is_some() {
                            messages.push(ApiMessage {
                                role: "tool",
                                content: Some(result.content.clone()),
                                tool_calls: None,
                                tool_call_id: Some(result.tool_call_id.clone()),
                            });
                        } else {
                            messages.push(ApiMessage::text("user", &orphan_text(result)));
                        }
                    }
                }
            }
        }

        messages
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function",
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn build_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(request.system_prompt.as_deref(), &request.turns),
            "temperature": request.temperature,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        body
    }

    fn response_to_turn(&self, resp: ApiResponse, raw: &str) -> Result<Turn, ProviderError> {
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::parse("No choices in response", raw))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                let arguments = parse_arguments(&self.name, &tc.function.name, &tc.function.arguments);
                ToolCallRequest::new(call_id_or_new(tc.id), tc.function.name, arguments)
            })
            .collect();

        let text = match choice.message.content {
            Some(ApiContent::Text(text)) => Some(text),
            Some(ApiContent::Parts(parts)) => {
                join_text(parts.into_iter().filter_map(|p| p.text).collect())
            }
            None => None,
        };

        let usage = resp
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
                cache_creation_tokens: 0,
                cache_read_tokens: u
                    .prompt_tokens_details
                    .and_then(|d| d.cached_tokens)
                    .unwrap_or(0),
            })
            .unwrap_or_default();

        Ok(Turn::assistant(text, tool_calls).with_usage(usage))
    }
}

/// Arguments arrive as a JSON string. An unreadable string is kept verbatim so
/// the tool can report it rather than failing the whole round.
fn parse_arguments(provider: &str, tool: &str, raw: &str) -> serde_json::Value {
    if raw.trim().is_empty() {
        return serde_json::json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!(provider, tool, error = %e, "Tool arguments are not valid JSON");
        serde_json::Value::String(raw.to_string())
    })
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn send(&self, request: &ProviderRequest) -> std::result::Result<Turn, ProviderError> {
        let body = Self::build_body(request);

        debug!(provider = %self.name, model = %request.model, turns = request.turns.len(), "Sending completion request");

        let text = self.transport.post_json(&self.name, &self.endpoint, &body).await?;
        let api_response: ApiResponse = parse_body(&self.name, &text)?;
        self.response_to_turn(api_response, &text)
    }
}

// --- OpenAI API types ---

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn text(role: &'static str, content: &str) -> Self {
        Self {
            role,
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiToolCall {
    id: String,
    r#type: &'static str,
    function: ApiFunction,
}

#[derive(Debug, Serialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: &'static str,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<ApiContent>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiContent {
    Text(String),
    Parts(Vec<ApiContentPart>),
}

#[derive(Debug, Deserialize)]
struct ApiContentPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseToolCall {
    #[serde(default)]
    id: Option<String>,
    function: ApiResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ApiResponseFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    prompt_tokens_details: Option<ApiPromptDetails>,
}

#[derive(Debug, Deserialize)]
struct ApiPromptDetails {
    #[serde(default)]
    cached_tokens: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_core::message::ToolCallResult;
    use serde_json::json;

    fn openai() -> OpenAiCompatProvider {
        OpenAiCompatProvider::openai("sk-test", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn constructors() {
        let provider = openai();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.endpoint(), "https://api.openai.com/v1/chat/completions");

        let azure = OpenAiCompatProvider::azure(
            "https://acme.openai.azure.com/",
            "gpt4o-prod",
            None,
            "az-key",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(azure.kind(), ProviderKind::AzureOpenAi);
        assert_eq!(
            azure.endpoint(),
            "https://acme.openai.azure.com/openai/deployments/gpt4o-prod/chat/completions?api-version=2024-06-01"
        );
    }

    #[test]
    fn system_prompt_is_first_message() {
        let request = ProviderRequest::new("gpt-4o", vec![Turn::user("Hello")])
            .with_system_prompt(Some("Be brief".into()));
        let body = OpenAiCompatProvider::build_body(&request);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "Be brief");
        assert_eq!(body["messages"][1]["role"], "user");
    }

    #[test]
    fn tool_calls_and_results_conversion() {
        let turns = vec![
            Turn::user("go"),
            Turn::assistant(
                None,
                vec![
                    ToolCallRequest::new("call_1", "read_source", json!({"url": "/a"})),
                    ToolCallRequest::new("call_2", "read_source", json!({"url": "/b"})),
                ],
            ),
            Turn::tool(vec![
                ToolCallResult::success("call_1", "A"),
                ToolCallResult::success("call_2", "B"),
            ]),
        ];
        let body = serde_json::to_value(OpenAiCompatProvider::to_api_messages(None, &turns)).unwrap();
        let messages = body.as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1]["content"], serde_json::Value::Null);
        assert_eq!(messages[1]["tool_calls"][0]["function"]["name"], "read_source");
        assert_eq!(
            messages[1]["tool_calls"][0]["function"]["arguments"],
            r#"{"url":"/a"}"#
        );
        assert_eq!(messages[2]["role"], "tool");
        assert_eq!(messages[2]["tool_call_id"], "call_1");
        assert_eq!(messages[3]["tool_call_id"], "call_2");
    }

    #[test]
    fn parse_response_with_tool_calls() {
        let raw = r#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "call_9", "type": "function", "function": {"name": "read_source", "arguments": "{\"url\":\"/x\"}"}},
                        {"type": "function", "function": {"name": "read_source", "arguments": ""}}
                    ]
                }
            }],
            "usage": {"prompt_tokens": 100, "completion_tokens": 7, "prompt_tokens_details": {"cached_tokens": 64}}
        }"#;
        let resp: ApiResponse = serde_json::from_str(raw).unwrap();
        let turn = openai().response_to_turn(resp, raw).unwrap();
        assert!(turn.text.is_none());
        assert_eq!(turn.tool_calls.len(), 2);
        assert_eq!(turn.tool_calls[0].id, "call_9");
        assert_eq!(turn.tool_calls[0].arguments["url"], "/x");
        assert!(turn.tool_calls[1].id.starts_with("call_"));
        assert_eq!(turn.tool_calls[1].arguments, json!({}));
        let usage = turn.usage.unwrap();
        assert_eq!(usage.input_tokens, 100);
        assert_eq!(usage.cache_read_tokens, 64);
    }

    #[test]
    fn empty_choices_is_parse_error() {
        let raw = r#"{"choices": []}"#;
        let resp: ApiResponse = serde_json::from_str(raw).unwrap();
        let err = openai().response_to_turn(resp, raw).unwrap_err();
        assert!(matches!(err, ProviderError::Parse { .. }));
        assert_eq!(err.body(), Some(raw));
    }

    #[test]
    fn invalid_arguments_are_kept_verbatim() {
        assert_eq!(
            parse_arguments("openai", "t", "{not json"),
            serde_json::Value::String("{not json".into())
        );
    }

    #[tokio::test]
    async fn azure_sends_api_key_header() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/openai/deployments/dep/chat/completions")
            .match_query(mockito::Matcher::UrlEncoded(
                "api-version".into(),
                "2024-10-21".into(),
            ))
            .match_header("api-key", "az-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"ok"}}]}"#)
            .create_async()
            .await;

        let provider = OpenAiCompatProvider::azure(
            &server.url(),
            "dep",
            Some("2024-10-21"),
            "az-key",
            Duration::from_secs(5),
        )
        .unwrap();
        let turn = provider
            .send(&ProviderRequest::new("gpt-4o", vec![Turn::user("hi")]))
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(turn.text.as_deref(), Some("ok"));
    }
}
