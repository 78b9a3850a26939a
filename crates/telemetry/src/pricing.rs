//! Built-in pricing table for the supported vendors' models.
//!
//! Prices are in USD per 1 million tokens. Each model has an input, output
//! and optional cache-read price. Custom pricing comes from the
//! `[telemetry.custom_pricing]` config table.

use scribe_config::{PricingOverride, TelemetrySettings};
use scribe_core::message::TokenUsage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Per-million-token pricing for a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per 1M input tokens in USD.
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD.
    pub output_per_m: f64,
    /// Price per 1M cache-read input tokens; the input price when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_per_m: Option<f64>,
}

impl ModelPricing {
    pub fn new(input_per_m: f64, output_per_m: f64) -> Self {
        Self {
            input_per_m,
            output_per_m,
            cache_read_per_m: None,
        }
    }

    pub fn with_cache_read(mut self, cache_read_per_m: f64) -> Self {
        self.cache_read_per_m = Some(cache_read_per_m);
        self
    }

    /// Compute cost for one request's usage.
    ///
    /// `input_tokens` counts the whole prompt; the cache-read share of it is
    /// billed at the cache-read price.
    pub fn cost(&self, usage: &TokenUsage) -> f64 {
        let cached = usage.cache_read_tokens.min(usage.input_tokens);
        let uncached = usage.input_tokens - cached;
        let cache_price = self.cache_read_per_m.unwrap_or(self.input_per_m);

        (uncached as f64 * self.input_per_m
            + cached as f64 * cache_price
            + usage.output_tokens as f64 * self.output_per_m)
            / 1_000_000.0
    }
}

impl From<&PricingOverride> for ModelPricing {
    fn from(o: &PricingOverride) -> Self {
        Self {
            input_per_m: o.input_per_m,
            output_per_m: o.output_per_m,
            cache_read_per_m: o.cache_read_per_m,
        }
    }
}

/// Thread-safe pricing table with built-in defaults and custom overrides.
pub struct PricingTable {
    prices: RwLock<HashMap<String, ModelPricing>>,
}

impl PricingTable {
    /// Create a pricing table with built-in model prices.
    pub fn with_defaults() -> Self {
        let mut prices = HashMap::new();

        // ── Anthropic ──────────────────────────────────────────────
        prices.insert(
            "anthropic/claude-sonnet-4".into(),
            ModelPricing::new(3.0, 15.0).with_cache_read(0.3),
        );
        prices.insert(
            "anthropic/claude-opus-4".into(),
            ModelPricing::new(15.0, 75.0).with_cache_read(1.5),
        );
        prices.insert(
            "anthropic/claude-3-7-sonnet".into(),
            ModelPricing::new(3.0, 15.0).with_cache_read(0.3),
        );
        prices.insert(
            "anthropic/claude-3-5-haiku".into(),
            ModelPricing::new(0.8, 4.0).with_cache_read(0.08),
        );

        // ── OpenAI (also Azure deployments of the same models) ─────
        prices.insert(
            "openai/gpt-4o".into(),
            ModelPricing::new(2.5, 10.0).with_cache_read(1.25),
        );
        prices.insert(
            "openai/gpt-4o-mini".into(),
            ModelPricing::new(0.15, 0.6).with_cache_read(0.075),
        );
        prices.insert(
            "openai/gpt-4.1".into(),
            ModelPricing::new(2.0, 8.0).with_cache_read(0.5),
        );
        prices.insert(
            "openai/gpt-4.1-mini".into(),
            ModelPricing::new(0.4, 1.6).with_cache_read(0.1),
        );
        prices.insert(
            "openai/o3-mini".into(),
            ModelPricing::new(1.1, 4.4).with_cache_read(0.55),
        );

        // ── Google ─────────────────────────────────────────────────
        prices.insert(
            "google/gemini-2.0-flash".into(),
            ModelPricing::new(0.1, 0.4).with_cache_read(0.025),
        );
        prices.insert(
            "google/gemini-2.5-flash".into(),
            ModelPricing::new(0.3, 2.5).with_cache_read(0.075),
        );
        prices.insert(
            "google/gemini-2.5-pro".into(),
            ModelPricing::new(1.25, 10.0).with_cache_read(0.31),
        );
        prices.insert("google/gemini-1.5-pro".into(), ModelPricing::new(1.25, 5.0));

        Self {
            prices: RwLock::new(prices),
        }
    }

    /// Defaults plus the overrides from `[telemetry.custom_pricing]`.
    pub fn from_settings(settings: &TelemetrySettings) -> Self {
        let table = Self::with_defaults();
        for (model, pricing) in &settings.custom_pricing {
            table.set(model.clone(), ModelPricing::from(pricing));
        }
        table
    }

    /// Create an empty pricing table.
    pub fn empty() -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ModelPricing>> {
        self.prices.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ModelPricing>> {
        self.prices.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up pricing for a model by exact key.
    pub fn get(&self, model: &str) -> Option<ModelPricing> {
        self.read().get(model).copied()
    }

    /// Add or update pricing for a model.
    pub fn set(&self, model: impl Into<String>, pricing: ModelPricing) {
        self.write().insert(model.into(), pricing);
    }

    /// Resolve a model name to its pricing.
    ///
    /// Tries exact match first, then common vendor prefixes
    /// (`gpt-4o` → `openai/gpt-4o`), then the longest key whose bare name is
    /// a prefix of the model (`claude-sonnet-4-20250514` → `claude-sonnet-4`).
    pub fn lookup(&self, model: &str) -> Option<ModelPricing> {
        let prices = self.read();

        if let Some(p) = prices.get(model) {
            return Some(*p);
        }

        for vendor in ["anthropic", "openai", "google"] {
            if let Some(p) = prices.get(&format!("{vendor}/{model}")) {
                return Some(*p);
            }
        }

        let model_lower = model.to_lowercase();
        let bare_model = model_lower.rsplit('/').next().unwrap_or(&model_lower);

        prices
            .iter()
            .filter_map(|(key, pricing)| {
                let bare_key = key.rsplit('/').next().unwrap_or(key).to_lowercase();
                bare_model
                    .starts_with(&bare_key)
                    .then_some((bare_key.len(), *pricing))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, pricing)| pricing)
    }

    /// Cost of one request, or 0.0 for an unknown model.
    pub fn compute_cost(&self, model: &str, usage: &TokenUsage) -> f64 {
        self.lookup(model).map_or(0.0, |p| p.cost(usage))
    }

    /// List all known model names, sorted.
    pub fn models(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_cost() {
        let table = PricingTable::with_defaults();

        // Claude Sonnet 4: $3/M input, $15/M output
        let cost = table.compute_cost("anthropic/claude-sonnet-4", &TokenUsage::new(1000, 500));
        // (1000 * 3.0 + 500 * 15.0) / 1M = 0.0105
        assert!((cost - 0.0105).abs() < 1e-10);
    }

    #[test]
    fn dated_model_names_match_by_prefix() {
        let table = PricingTable::with_defaults();
        let dated = table.lookup("claude-sonnet-4-20250514").unwrap();
        assert_eq!(dated, table.get("anthropic/claude-sonnet-4").unwrap());

        // Longest prefix wins: gpt-4o-mini, not gpt-4o.
        let mini = table.lookup("gpt-4o-mini-2024-07-18").unwrap();
        assert_eq!(mini.input_per_m, 0.15);
    }

    #[test]
    fn unknown_model_returns_zero() {
        let table = PricingTable::with_defaults();
        assert!(table.lookup("unknown/model-xyz").is_none());
        let cost = table.compute_cost("unknown/model-xyz", &TokenUsage::new(1000, 500));
        assert_eq!(cost, 0.0);
    }

    #[test]
    fn cache_reads_are_billed_at_cache_price() {
        let pricing = ModelPricing::new(2.0, 8.0).with_cache_read(0.5);
        let usage = TokenUsage {
            input_tokens: 1_000_000,
            output_tokens: 0,
            cache_creation_tokens: 0,
            cache_read_tokens: 400_000,
        };
        // 600k * 2.0 + 400k * 0.5 = 1.2 + 0.2
        assert!((pricing.cost(&usage) - 1.4).abs() < 1e-10);

        let no_cache_price = ModelPricing::new(2.0, 8.0);
        assert!((no_cache_price.cost(&usage) - 2.0).abs() < 1e-10);
    }

    #[test]
    fn overrides_from_settings() {
        let mut settings = TelemetrySettings::default();
        settings.custom_pricing.insert(
            "openai/gpt-4o".into(),
            PricingOverride {
                input_per_m: 5.0,
                output_per_m: 20.0,
                cache_read_per_m: None,
            },
        );
        settings.custom_pricing.insert(
            "in-house-model".into(),
            PricingOverride {
                input_per_m: 1.0,
                output_per_m: 2.0,
                cache_read_per_m: Some(0.1),
            },
        );

        let table = PricingTable::from_settings(&settings);
        let cost = table.compute_cost("gpt-4o", &TokenUsage::new(1_000_000, 0));
        assert!((cost - 5.0).abs() < 1e-10);
        assert!(table.get("in-house-model").is_some());
    }

    #[test]
    fn list_models_sorted() {
        let table = PricingTable::with_defaults();
        let models = table.models();
        assert!(models.contains(&"openai/gpt-4o".to_string()));
        assert!(models.windows(2).all(|w| w[0] <= w[1]));
        assert!(PricingTable::empty().is_empty());
    }
}
