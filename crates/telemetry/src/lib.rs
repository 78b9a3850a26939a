//! Token usage tracking and cost estimates for Scribe.
//!
//! [`UsageTracker`] is an event sink: it listens to the agent loop's round
//! events and keeps per-run and lifetime counters, priced with the
//! built-in [`PricingTable`] plus any overrides from configuration.

pub mod pricing;
pub mod tracker;

pub use pricing::{ModelPricing, PricingTable};
pub use tracker::{RunTotals, UsageSnapshot, UsageTracker};
