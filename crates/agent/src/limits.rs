//! Per-run ceilings.

use scribe_config::AgentSettings;

/// Bounds applied to a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentLimits {
    /// Maximum gateway rounds per run.
    pub max_rounds: u32,
    /// Ceiling on cumulative input tokens across rounds.
    pub max_input_tokens: u64,
    /// Window size applied before each send.
    pub max_turns: usize,
    /// Length above which older tool results are truncated.
    pub max_tool_result_len: usize,
}

impl Default for AgentLimits {
    fn default() -> Self {
        Self::from_settings(&AgentSettings::default())
    }
}

impl AgentLimits {
    pub fn from_settings(settings: &AgentSettings) -> Self {
        Self {
            max_rounds: settings.max_rounds.max(1),
            max_input_tokens: settings.max_input_tokens,
            max_turns: settings.max_turns,
            max_tool_result_len: settings.max_tool_result_len,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    pub fn with_max_input_tokens(mut self, max_input_tokens: u64) -> Self {
        self.max_input_tokens = max_input_tokens;
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }
}
