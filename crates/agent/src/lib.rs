//! The agent loop.
//!
//! One run follows a **Send → Act → Observe** cycle:
//!
//! 1. **Trim** the conversation (windowing + tool result compaction)
//! 2. **Send** it to the configured provider
//! 3. **If tool calls**: gate mutating calls behind operator approval,
//!    execute them in order, append the results, loop back to step 1
//! 4. **If text only**: the run is complete
//!
//! Runs are bounded by a round ceiling and a cumulative input token ceiling,
//! and every run ends with exactly one `Completed` or `Failed` event.

pub mod fault;
pub mod limits;
pub mod loop_runner;
pub mod mutating;

#[cfg(test)]
mod test_helpers;

pub use fault::compact_fault;
pub use limits::AgentLimits;
pub use loop_runner::{AgentLoop, RunOutcome};
pub use mutating::{MUTATING_TOOLS, MutatingTool};
