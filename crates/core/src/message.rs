//! Turn and Conversation domain types.
//!
//! These are the value objects that flow through the entire loop:
//! operator text → Conversation → Provider → assistant Turn → tool results → Conversation.
//!
//! Turns are never edited in place. Windowing and compaction build new
//! turns and swap them into the conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// The smallest window that still fits first turn + marker + one exchange.
pub const MIN_WINDOW_TURNS: usize = 4;

/// The role of a turn in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The operator
    User,
    /// The model
    Assistant,
    /// Aggregated tool results for one round
    Tool,
}

/// Token counters reported by a provider for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_tokens: u64,
    #[serde(default)]
    pub cache_read_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            ..Self::default()
        }
    }

    /// Input + output tokens.
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
        self.cache_creation_tokens += rhs.cache_creation_tokens;
        self.cache_read_tokens += rhs.cache_read_tokens;
    }
}

impl Add for TokenUsage {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Vendor-assigned or synthesized call ID
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Structured arguments
    pub arguments: serde_json::Value,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Generate an ID for vendors that do not assign one.
    pub fn synthesize_id() -> String {
        format!("call_{}", uuid::Uuid::new_v4().simple())
    }
}

/// The outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// The request this result answers
    pub tool_call_id: String,

    /// Output text handed back to the model
    pub content: String,

    /// Whether the invocation failed
    #[serde(default)]
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn success(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: true,
        }
    }

    /// Copy of this result answering `tool_call_id` instead.
    pub fn with_call_id(self, tool_call_id: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            ..self
        }
    }

    /// Copy of this result with `content` replaced.
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: self.tool_call_id.clone(),
            content: content.into(),
            is_error: self.is_error,
        }
    }
}

/// One message-equivalent unit in a conversation.
///
/// Construct through [`Turn::user`], [`Turn::assistant`] and [`Turn::tool`],
/// which keep the role invariants: user turns carry only text, tool turns
/// carry only results, and only assistant turns carry tool calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolCallResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl Turn {
    /// Create an operator turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: Some(text.into()),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            usage: None,
        }
    }

    /// Create an assistant turn. Empty text is normalized to `None`.
    pub fn assistant(text: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.filter(|t| !t.is_empty()),
            tool_calls,
            tool_results: Vec::new(),
            usage: None,
        }
    }

    /// Create a text-only assistant turn.
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::assistant(Some(text.into()), Vec::new())
    }

    /// Create a tool turn aggregating one round's results.
    pub fn tool(results: Vec<ToolCallResult>) -> Self {
        Self {
            role: Role::Tool,
            text: None,
            tool_calls: Vec::new(),
            tool_results: results,
            usage: None,
        }
    }

    /// Attach provider usage counters.
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Text content, or `""` when absent.
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    fn window_marker(dropped: usize) -> Self {
        Self::assistant_text(format!(
            "[{dropped} earlier turns were omitted to stay within the context budget]"
        ))
    }
}

/// An ordered sequence of turns plus the system instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// System instruction sent with every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    turns: Vec<Turn>,

    /// When the conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last turn was added or the history was compacted
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            system_prompt: None,
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create an empty conversation with a system instruction.
    pub fn with_system_prompt(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: Some(system_prompt.into()),
            ..Self::new()
        }
    }

    /// Append a turn to the tail.
    pub fn append(&mut self, turn: Turn) {
        self.updated_at = Utc::now();
        self.turns.push(turn);
    }

    /// Turns in send order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Drop all turns, keeping the system instruction.
    pub fn clear(&mut self) {
        self.updated_at = Utc::now();
        self.turns.clear();
    }

    /// Keep the conversation within `max_turns` turns.
    ///
    /// Turn 0 (the operator's original request) always survives, followed by a
    /// synthetic marker naming the number of dropped turns and the most recent
    /// `max_turns - 2` turns. `max_turns` is clamped to [`MIN_WINDOW_TURNS`].
    /// Returns how many turns were dropped.
    pub fn window(&mut self, max_turns: usize) -> usize {
        let max_turns = max_turns.max(MIN_WINDOW_TURNS);
        if self.turns.len() <= max_turns {
            return 0;
        }

        let keep_tail = max_turns - 2;
        let tail_start = self.turns.len() - keep_tail;
        let dropped = tail_start - 1;

        let mut windowed = Vec::with_capacity(max_turns);
        windowed.push(self.turns[0].clone());
        windowed.push(Turn::window_marker(dropped));
        windowed.extend(self.turns.drain(tail_start..));

        self.turns = windowed;
        self.updated_at = Utc::now();
        dropped
    }

    /// Truncate oversized tool output in every tool turn except the newest one.
    ///
    /// Each compacted result is at most `max_len` characters, including the
    /// note recording the original length. Returns how many results changed.
    pub fn compact_tool_results(&mut self, max_len: usize) -> usize {
        let Some(newest_tool) = self.turns.iter().rposition(|t| t.role == Role::Tool) else {
            return 0;
        };

        let mut compacted = 0;
        for turn in self.turns[..newest_tool]
            .iter_mut()
            .filter(|t| t.role == Role::Tool)
        {
            if !turn
                .tool_results
                .iter()
                .any(|r| r.content.chars().count() > max_len)
            {
                continue;
            }

            let results = turn
                .tool_results
                .iter()
                .map(|r| {
                    if r.content.chars().count() > max_len {
                        compacted += 1;
                        r.with_content(truncate_annotated(&r.content, max_len))
                    } else {
                        r.clone()
                    }
                })
                .collect();

            let mut replacement = Turn::tool(results);
            replacement.usage = turn.usage;
            *turn = replacement;
        }

        if compacted > 0 {
            self.updated_at = Utc::now();
        }
        compacted
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// Cut `content` to at most `max_len` chars, ending with a note of the original length.
fn truncate_annotated(content: &str, max_len: usize) -> String {
    let original = content.chars().count();
    let note = format!("\n…[truncated, original length {original} chars]");
    let note_len = note.chars().count();

    if note_len >= max_len {
        return content.chars().take(max_len).collect();
    }

    let mut out: String = content.chars().take(max_len - note_len).collect();
    out.push_str(&note);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> Conversation {
        let mut conv = Conversation::new();
        for i in 0..n {
            if i % 2 == 0 {
                conv.append(Turn::user(format!("user {i}")));
            } else {
                conv.append(Turn::assistant_text(format!("assistant {i}")));
            }
        }
        conv
    }

    fn tool_turn(id: &str, content: &str) -> Turn {
        Turn::tool(vec![ToolCallResult::success(id, content)])
    }

    #[test]
    fn constructors_keep_role_invariants() {
        let user = Turn::user("hi");
        assert_eq!(user.role, Role::User);
        assert!(user.tool_calls.is_empty() && user.tool_results.is_empty());

        let tool = Turn::tool(vec![ToolCallResult::success("c1", "ok")]);
        assert_eq!(tool.role, Role::Tool);
        assert!(tool.text.is_none());

        let empty = Turn::assistant(Some(String::new()), vec![]);
        assert!(empty.text.is_none());
    }

    #[test]
    fn window_noop_within_budget() {
        let mut conv = numbered(6);
        assert_eq!(conv.window(6), 0);
        assert_eq!(conv.len(), 6);
    }

    #[test]
    fn window_keeps_first_turn_and_tail() {
        for (len, max) in [(10, 4), (25, 7), (5, 4), (40, 12)] {
            let original = numbered(len);
            let mut conv = original.clone();
            let dropped = conv.window(max);

            assert_eq!(conv.len(), max, "len={len} max={max}");
            assert_eq!(dropped, len - (max - 1));
            assert_eq!(conv.turns()[0], original.turns()[0]);
            assert_eq!(
                &conv.turns()[2..],
                &original.turns()[len - (max - 2)..],
                "tail must match for len={len} max={max}"
            );
            assert!(conv.turns()[1].text_or_empty().contains(&dropped.to_string()));
        }
    }

    #[test]
    fn window_clamps_to_minimum() {
        let mut conv = numbered(10);
        conv.window(1);
        assert_eq!(conv.len(), MIN_WINDOW_TURNS);
    }

    #[test]
    fn window_is_idempotent() {
        let mut conv = numbered(30);
        conv.window(8);
        let once = conv.turns().to_vec();
        assert_eq!(conv.window(8), 0);
        assert_eq!(conv.turns(), once.as_slice());
    }

    #[test]
    fn compaction_spares_newest_tool_turn() {
        let big = "x".repeat(500);
        let mut conv = Conversation::new();
        conv.append(Turn::user("go"));
        conv.append(tool_turn("a", &big));
        conv.append(Turn::assistant_text("next"));
        conv.append(tool_turn("b", &big));
        conv.append(Turn::assistant_text("more"));
        conv.append(tool_turn("c", &big));

        let changed = conv.compact_tool_results(100);
        assert_eq!(changed, 2);

        let tool_turns: Vec<&Turn> = conv
            .turns()
            .iter()
            .filter(|t| t.role == Role::Tool)
            .collect();
        assert!(tool_turns[0].tool_results[0].content.chars().count() <= 100);
        assert!(tool_turns[1].tool_results[0].content.chars().count() <= 100);
        assert!(tool_turns[0].tool_results[0].content.contains("500"));
        assert_eq!(tool_turns[2].tool_results[0].content, big);
        assert_eq!(tool_turns[0].tool_results[0].tool_call_id, "a");
    }

    #[test]
    fn compaction_is_idempotent_and_handles_tiny_limits() {
        let mut conv = Conversation::new();
        conv.append(tool_turn("a", &"é".repeat(300)));
        conv.append(tool_turn("b", "short"));

        conv.compact_tool_results(10);
        let once = conv.turns().to_vec();
        assert!(once[0].tool_results[0].content.chars().count() <= 10);
        assert_eq!(conv.compact_tool_results(10), 0);
        assert_eq!(conv.turns(), once.as_slice());
    }

    #[test]
    fn compaction_without_tool_turns() {
        let mut conv = numbered(5);
        assert_eq!(conv.compact_tool_results(1), 0);
    }

    #[test]
    fn usage_accumulates() {
        let mut total = TokenUsage::default();
        total += TokenUsage::new(10, 5);
        total += TokenUsage {
            cache_read_tokens: 3,
            ..TokenUsage::new(1, 1)
        };
        assert_eq!(total.input_tokens, 11);
        assert_eq!(total.total(), 17);
        assert_eq!(total.cache_read_tokens, 3);
    }

    #[test]
    fn turn_serialization_roundtrip() {
        let turn = Turn::assistant(
            Some("checking".into()),
            vec![ToolCallRequest::new(
                "c1",
                "read_source",
                serde_json::json!({"url": "/x"}),
            )],
        );
        let json = serde_json::to_string(&turn).unwrap();
        assert!(json.contains(r#""role":"assistant""#));
        let back: Turn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, turn);
    }
}
