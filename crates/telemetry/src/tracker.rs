//! Usage tracker fed by agent loop events.

use crate::pricing::PricingTable;
use scribe_core::event::{AgentEvent, EventSink};
use scribe_core::message::TokenUsage;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Counters for one run, or summed over several.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunTotals {
    pub usage: TokenUsage,
    pub rounds: u32,
    pub tool_calls: u32,
    pub tool_errors: u32,
    pub duration_ms: u64,
    /// Estimated cost in USD.
    pub cost_usd: f64,
}

impl RunTotals {
    fn absorb(&mut self, other: &RunTotals) {
        self.usage += other.usage;
        self.rounds += other.rounds;
        self.tool_calls += other.tool_calls;
        self.tool_errors += other.tool_errors;
        self.duration_ms += other.duration_ms;
        self.cost_usd += other.cost_usd;
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        format!(
            "{} rounds, {} tool calls ({} failed), {} in / {} out tokens, ~${:.4}",
            self.rounds,
            self.tool_calls,
            self.tool_errors,
            self.usage.input_tokens,
            self.usage.output_tokens,
            self.cost_usd
        )
    }
}

/// Point-in-time view of the tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub model: String,
    /// Counters of the run in progress
    pub current_run: RunTotals,
    /// Counters of the most recently finished run
    pub last_run: Option<RunTotals>,
    /// Counters over every finished run
    pub total: RunTotals,
    pub runs: u64,
}

#[derive(Default)]
struct TrackerState {
    current: RunTotals,
    last: Option<RunTotals>,
    total: RunTotals,
    runs: u64,
}

/// Accumulates token usage, tool counts and cost from round events.
///
/// Register it as (one of) the loop's event sinks. A terminal event closes
/// the current run and folds it into the totals.
pub struct UsageTracker {
    model: String,
    pricing: Arc<PricingTable>,
    state: Mutex<TrackerState>,
}

impl UsageTracker {
    pub fn new(model: impl Into<String>, pricing: Arc<PricingTable>) -> Self {
        Self {
            model: model.into(),
            pricing,
            state: Mutex::new(TrackerState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        let state = self.lock();
        UsageSnapshot {
            model: self.model.clone(),
            current_run: state.current.clone(),
            last_run: state.last.clone(),
            total: state.total.clone(),
            runs: state.runs,
        }
    }

    pub fn last_run(&self) -> Option<RunTotals> {
        self.lock().last.clone()
    }

    /// Forget everything recorded so far.
    pub fn reset(&self) {
        *self.lock() = TrackerState::default();
    }
}

impl EventSink for UsageTracker {
    fn emit(&self, event: &AgentEvent) {
        let mut state = self.lock();
        match event {
            AgentEvent::RoundCompleted {
                usage, duration_ms, ..
            } => {
                state.current.usage += *usage;
                state.current.rounds += 1;
                state.current.duration_ms += duration_ms;
                state.current.cost_usd += self.pricing.compute_cost(&self.model, usage);
            }
            AgentEvent::ToolCallFinished { result, .. } => {
                state.current.tool_calls += 1;
                if result.is_error {
                    state.current.tool_errors += 1;
                }
            }
            AgentEvent::Completed { .. } | AgentEvent::Failed { .. } => {
                let finished = std::mem::take(&mut state.current);
                state.total.absorb(&finished);
                state.runs += 1;
                debug!(model = %self.model, summary = %finished.summary(), "Run usage");
                state.last = Some(finished);
            }
            AgentEvent::Text { .. } | AgentEvent::ToolCallStarted { .. } => {}
        }
    }
}
