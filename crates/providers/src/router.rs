//! Provider router: builds providers from configuration and looks them up
//! by profile name.

use scribe_config::{AppConfig, ProviderSettings};
use scribe_core::error::ProviderError;
use scribe_core::provider::{Provider, ProviderKind};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use crate::anthropic::{self, AnthropicProvider};
use crate::gemini::{self, GeminiProvider};
use crate::openai_compat::{OPENAI_BASE_URL, OpenAiCompatProvider};

/// Name under which the primary `[provider]` section is registered.
pub const DEFAULT_PROFILE: &str = "default";

/// Named providers plus a default.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build one provider from its settings.
pub fn build_provider(settings: &ProviderSettings) -> Result<Arc<dyn Provider>, ProviderError> {
    let timeout = Duration::from_secs(settings.timeout_secs);
    let api_key = settings.api_key.clone().ok_or_else(|| {
        ProviderError::NotConfigured(format!("no API key for {}", settings.kind))
    })?;

    debug!(kind = %settings.kind, url = ?settings.api_url, "Building provider");

    let provider: Arc<dyn Provider> = match settings.kind {
        ProviderKind::Anthropic => {
            let mut p = AnthropicProvider::new(api_key, timeout)?;
            if let Some(url) = &settings.api_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        ProviderKind::OpenAi => {
            let base_url = settings.api_url.as_deref().unwrap_or(OPENAI_BASE_URL);
            Arc::new(OpenAiCompatProvider::new("openai", base_url, api_key, timeout)?)
        }
        ProviderKind::Gemini => {
            let mut p = GeminiProvider::new(api_key, timeout)?;
            if let Some(url) = &settings.api_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        ProviderKind::AzureOpenAi => {
            let endpoint = settings.api_url.as_deref().ok_or_else(|| {
                ProviderError::NotConfigured("azure_open_ai needs api_url".into())
            })?;
            let deployment = settings.deployment.as_deref().ok_or_else(|| {
                ProviderError::NotConfigured("azure_open_ai needs a deployment".into())
            })?;
            Arc::new(OpenAiCompatProvider::azure(
                endpoint,
                deployment,
                settings.api_version.as_deref(),
                api_key,
                timeout,
            )?)
        }
    };

    Ok(provider)
}

/// Build the primary provider and every profile that has a key.
///
/// The primary provider must build; profiles without credentials are skipped
/// so one unused profile does not block the rest.
pub fn build_from_config(config: &AppConfig) -> Result<ProviderRouter, ProviderError> {
    let mut router = ProviderRouter::new(DEFAULT_PROFILE);
    router.register(DEFAULT_PROFILE, build_provider(&config.provider)?);

    for (name, settings) in &config.profiles {
        match build_provider(settings) {
            Ok(provider) => router.register(name.clone(), provider),
            Err(e) => debug!(profile = %name, error = %e, "Skipping provider profile"),
        }
    }

    Ok(router)
}

/// Default base URL per vendor. Azure has none; every resource has its own.
pub fn default_base_url(kind: ProviderKind) -> Option<&'static str> {
    match kind {
        ProviderKind::Anthropic => Some(anthropic::DEFAULT_BASE_URL),
        ProviderKind::OpenAi => Some(OPENAI_BASE_URL),
        ProviderKind::Gemini => Some(gemini::DEFAULT_BASE_URL),
        ProviderKind::AzureOpenAi => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(kind: ProviderKind) -> ProviderSettings {
        ProviderSettings {
            api_key: Some("k".into()),
            ..ProviderSettings::new(kind)
        }
    }

    #[test]
    fn router_register_and_lookup() {
        let mut router = ProviderRouter::new("default");
        router.register("default", build_provider(&settings(ProviderKind::OpenAi)).unwrap());

        assert!(router.get("default").is_some());
        assert!(router.get("nonexistent").is_none());
        assert!(router.default().is_some());
        assert_eq!(router.list(), vec!["default"]);
    }

    #[test]
    fn factory_builds_every_kind() {
        for kind in [ProviderKind::Anthropic, ProviderKind::OpenAi, ProviderKind::Gemini] {
            let provider = build_provider(&settings(kind)).unwrap();
            assert_eq!(provider.kind(), kind);
        }

        let mut azure = settings(ProviderKind::AzureOpenAi);
        azure.api_url = Some("https://acme.openai.azure.com".into());
        azure.deployment = Some("dep".into());
        assert_eq!(
            build_provider(&azure).unwrap().kind(),
            ProviderKind::AzureOpenAi
        );
    }

    #[test]
    fn missing_key_is_not_configured() {
        let err = build_provider(&ProviderSettings::new(ProviderKind::Gemini))
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn azure_without_deployment_is_not_configured() {
        let mut azure = settings(ProviderKind::AzureOpenAi);
        azure.api_url = Some("https://acme.openai.azure.com".into());
        assert!(build_provider(&azure).is_err());
    }

    #[test]
    fn build_from_config_skips_profiles_without_keys() {
        let mut config = AppConfig::default();
        config.provider = settings(ProviderKind::Anthropic);
        config
            .profiles
            .insert("cheap".into(), settings(ProviderKind::Gemini));
        config
            .profiles
            .insert("broken".into(), ProviderSettings::new(ProviderKind::OpenAi));

        let router = build_from_config(&config).unwrap();
        assert_eq!(router.list(), vec!["cheap", "default"]);
        assert_eq!(router.default().unwrap().kind(), ProviderKind::Anthropic);
    }

    #[test]
    fn default_base_urls() {
        assert!(default_base_url(ProviderKind::Anthropic).unwrap().contains("anthropic.com"));
        assert!(default_base_url(ProviderKind::OpenAi).unwrap().contains("api.openai.com"));
        assert!(default_base_url(ProviderKind::AzureOpenAi).is_none());
    }
}
