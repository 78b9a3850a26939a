//! Provider trait: the abstraction over LLM vendors.
//!
//! A Provider knows how to send a conversation plus tool catalogue to one
//! vendor and translate the reply back into a single assistant [`Turn`].
//!
//! Implementations: Anthropic Messages, OpenAI chat completions, Gemini
//! generateContent, Azure OpenAI.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::Turn;

/// The closed set of supported vendor protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Anthropic,
    #[serde(alias = "openai")]
    OpenAi,
    Gemini,
    #[serde(alias = "azure", alias = "azure_openai")]
    AzureOpenAi,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Anthropic,
        ProviderKind::OpenAi,
        ProviderKind::Gemini,
        ProviderKind::AzureOpenAi,
    ];

    /// Stable identifier used in config files and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "open_ai",
            Self::Gemini => "gemini",
            Self::AzureOpenAi => "azure_open_ai",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "gemini" | "google" => Ok(Self::Gemini),
            "azure" | "azure_openai" | "azure_open_ai" => Ok(Self::AzureOpenAi),
            other => Err(format!("unknown provider kind '{other}'")),
        }
    }
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// Everything one gateway round trip needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "claude-sonnet-4-20250514", "gpt-4o")
    pub model: String,

    /// System instruction, placed wherever the vendor expects it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Conversation turns in send order
    pub turns: Vec<Turn>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.2
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, turns: Vec<Turn>) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
            turns,
            tools: Vec::new(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// The core Provider trait.
///
/// Every vendor adapter implements this trait. The agent loop calls `send()`
/// without knowing which wire protocol is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider instance.
    fn name(&self) -> &str;

    /// Which wire protocol this provider speaks.
    fn kind(&self) -> ProviderKind;

    /// Send the conversation and get back exactly one assistant turn.
    async fn send(&self, request: &ProviderRequest) -> std::result::Result<Turn, ProviderError>;
}
