//! Configuration loading, validation, and management for Scribe.
//!
//! Loads configuration from `~/.scribe/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use scribe_core::ProviderKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Instruction used when `[agent].system_prompt` is not set.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a careful software engineer working on a live \
development backend. Read the current source of an object before you change it, keep changes \
minimal, and explain what you changed. Mutating tools may be declined by the operator; when that \
happens, do not retry the same change.";

/// The root configuration structure.
///
/// Maps directly to `~/.scribe/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// The provider used when no profile is named
    #[serde(default)]
    pub provider: ProviderSettings,

    /// Alternative provider profiles, selectable by name
    #[serde(default)]
    pub profiles: HashMap<String, ProviderSettings>,

    /// Orchestration limits and approval policy
    #[serde(default)]
    pub agent: AgentSettings,

    /// The development backend the built-in tools talk to
    #[serde(default)]
    pub backend: BackendSettings,

    /// Usage accounting and pricing overrides
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

/// One LLM vendor endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_kind")]
    pub kind: ProviderKind,

    /// Model name; falls back to a per-vendor default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL override (required for Azure OpenAI)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Azure OpenAI deployment name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,

    /// Azure OpenAI `api-version` query value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_kind() -> ProviderKind {
    ProviderKind::Anthropic
}
fn default_provider_timeout() -> u64 {
    120
}
fn default_temperature() -> f32 {
    0.2
}

impl ProviderSettings {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// The configured model, or the vendor default.
    pub fn model_name(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| default_model(self.kind).to_string())
    }

    /// Vendor environment variable the API key is read from.
    pub fn env_key_var(&self) -> &'static str {
        match self.kind {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::AzureOpenAi => "AZURE_OPENAI_API_KEY",
        }
    }

    fn validate(&self, label: &str) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "{label}: temperature must be between 0.0 and 2.0"
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{label}: timeout_secs must be > 0"
            )));
        }
        if self.kind == ProviderKind::AzureOpenAi
            && (self.api_url.is_none() || self.deployment.is_none())
        {
            return Err(ConfigError::ValidationError(format!(
                "{label}: azure_open_ai needs both api_url and deployment"
            )));
        }
        Ok(())
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            model: None,
            api_key: None,
            api_url: None,
            deployment: None,
            api_version: None,
            timeout_secs: default_provider_timeout(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Default model per vendor.
pub fn default_model(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Anthropic => "claude-sonnet-4-20250514",
        ProviderKind::OpenAi | ProviderKind::AzureOpenAi => "gpt-4o",
        ProviderKind::Gemini => "gemini-2.0-flash",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Gateway rounds allowed per run
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Ceiling on cumulative input tokens per run
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: u64,

    /// Conversation window size (clamped to at least 4)
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Older tool results longer than this are truncated
    #[serde(default = "default_max_tool_result_len")]
    pub max_tool_result_len: usize,

    /// Ask the operator before running mutating tools
    #[serde(default = "default_true")]
    pub require_approval: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_max_rounds() -> u32 {
    25
}
fn default_max_input_tokens() -> u64 {
    400_000
}
fn default_max_turns() -> usize {
    40
}
fn default_max_tool_result_len() -> usize {
    4_000
}
fn default_true() -> bool {
    true
}

impl AgentSettings {
    /// The configured instruction, or [`DEFAULT_SYSTEM_PROMPT`].
    pub fn effective_system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            max_input_tokens: default_max_input_tokens(),
            max_turns: default_max_turns(),
            max_tool_result_len: default_max_tool_result_len(),
            require_approval: true,
            system_prompt: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Root URL that relative object URLs are resolved against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
}

fn default_backend_timeout() -> u64 {
    60
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            username: None,
            password: None,
            timeout_secs: default_backend_timeout(),
        }
    }
}

impl std::fmt::Debug for BackendSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSettings")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySettings {
    /// Print a usage summary after each run
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Custom model pricing overrides (model name → pricing)
    #[serde(default)]
    pub custom_pricing: HashMap<String, PricingOverride>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            custom_pricing: HashMap::new(),
        }
    }
}

/// Custom pricing for a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingOverride {
    /// Price per 1M input tokens in USD
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD
    pub output_per_m: f64,
    /// Price per 1M cache-read input tokens in USD (defaults to the input price)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_per_m: Option<f64>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.scribe/config.toml).
    ///
    /// Environment overrides, highest priority first:
    /// - `SCRIBE_PROVIDER`, `SCRIBE_MODEL`
    /// - `SCRIBE_API_KEY`, then the vendor variable (`ANTHROPIC_API_KEY`,
    ///   `OPENAI_API_KEY`, `GEMINI_API_KEY`, `AZURE_OPENAI_API_KEY`)
    /// - `SCRIBE_BACKEND_URL`, `SCRIBE_BACKEND_USER`, `SCRIBE_BACKEND_PASSWORD`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(kind) = lookup("SCRIBE_PROVIDER") {
            let kind: ProviderKind = kind.parse().map_err(ConfigError::ValidationError)?;
            if kind != self.provider.kind {
                // A key for one vendor is never valid for another.
                self.provider.api_key = None;
            }
            self.provider.kind = kind;
        }

        if let Some(model) = lookup("SCRIBE_MODEL") {
            self.provider.model = Some(model);
        }

        if self.provider.api_key.is_none() {
            let vendor_var = self.provider.env_key_var();
            self.provider.api_key = lookup("SCRIBE_API_KEY").or_else(|| lookup(vendor_var));
        }
        for profile in self.profiles.values_mut() {
            if profile.api_key.is_none() {
                let vendor_var = profile.env_key_var();
                profile.api_key = lookup(vendor_var);
            }
        }

        if let Some(url) = lookup("SCRIBE_BACKEND_URL") {
            self.backend.base_url = Some(url);
        }
        if let Some(user) = lookup("SCRIBE_BACKEND_USER") {
            self.backend.username = Some(user);
        }
        if let Some(password) = lookup("SCRIBE_BACKEND_PASSWORD") {
            self.backend.password = Some(password);
        }

        Ok(())
    }

    /// Provider settings for a named profile, or the primary provider.
    pub fn provider_settings(&self, profile: Option<&str>) -> Result<&ProviderSettings, ConfigError> {
        match profile {
            None | Some("default") => Ok(&self.provider),
            Some(name) => self
                .profiles
                .get(name)
                .ok_or_else(|| ConfigError::UnknownProfile(name.to_string())),
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".scribe")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.provider.validate("provider")?;
        for (name, profile) in &self.profiles {
            profile.validate(&format!("profiles.{name}"))?;
        }

        if self.agent.max_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_rounds must be > 0".into(),
            ));
        }
        if self.agent.max_input_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_input_tokens must be > 0".into(),
            ));
        }
        if self.agent.max_tool_result_len == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_tool_result_len must be > 0".into(),
            ));
        }

        for (model, pricing) in &self.telemetry.custom_pricing {
            if pricing.input_per_m < 0.0 || pricing.output_per_m < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "telemetry.custom_pricing.{model}: prices must be >= 0"
                )));
            }
        }

        Ok(())
    }

    /// Check if an API key is available for the primary provider.
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Copy with every secret replaced by a placeholder, for display.
    pub fn redacted(&self) -> Self {
        const PLACEHOLDER: &str = "[REDACTED]";
        let mut config = self.clone();
        let hide = |secret: &mut Option<String>| {
            if secret.is_some() {
                *secret = Some(PLACEHOLDER.to_string());
            }
        };
        hide(&mut config.provider.api_key);
        for profile in config.profiles.values_mut() {
            hide(&mut profile.api_key);
        }
        hide(&mut config.backend.password);
        config
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("No provider profile named '{0}'")]
    UnknownProfile(String),
}
