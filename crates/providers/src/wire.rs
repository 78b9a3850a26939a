//! Helpers shared by the wire-format adapters.

use scribe_core::message::{ToolCallRequest, ToolCallResult, Turn};
use std::collections::HashMap;

/// Tool-call ids announced by assistant turns, mapped to the tool name.
///
/// Windowing can drop the assistant turn that issued a call while keeping the
/// tool turn that answered it. Vendors reject such orphaned results, so
/// adapters check every result against this index first.
pub(crate) struct CallIndex<'a> {
    names: HashMap<&'a str, &'a str>,
}

impl<'a> CallIndex<'a> {
    pub(crate) fn new(turns: &'a [Turn]) -> Self {
        let names = turns
            .iter()
            .flat_map(|t| t.tool_calls.iter())
            .map(|c| (c.id.as_str(), c.name.as_str()))
            .collect();
        Self { names }
    }

    pub(crate) fn name_of(&self, tool_call_id: &str) -> Option<&'a str> {
        self.names.get(tool_call_id).copied()
    }
}

/// Plain-text rendering of a result whose originating call is gone.
pub(crate) fn orphan_text(result: &ToolCallResult) -> String {
    let label = if result.is_error { "error" } else { "output" };
    format!(
        "[tool {label} for earlier call {}]\n{}",
        result.tool_call_id, result.content
    )
}

/// Use the vendor id when present, otherwise mint one.
pub(crate) fn call_id_or_new(id: Option<String>) -> String {
    id.filter(|id| !id.is_empty())
        .unwrap_or_else(ToolCallRequest::synthesize_id)
}

/// Join text fragments the way every adapter reports them.
pub(crate) fn join_text(fragments: Vec<String>) -> Option<String> {
    let joined = fragments
        .into_iter()
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if joined.is_empty() { None } else { Some(joined) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn call_index_resolves_names() {
        let turns = vec![
            Turn::user("go"),
            Turn::assistant(
                None,
                vec![ToolCallRequest::new("call_a", "read_source", json!({}))],
            ),
        ];
        let index = CallIndex::new(&turns);
        assert_eq!(index.name_of("call_a"), Some("read_source"));
        assert_eq!(index.name_of("call_b"), None);
    }

    #[test]
    fn join_skips_empty_fragments() {
        assert_eq!(
            join_text(vec!["a".into(), String::new(), "b".into()]),
            Some("a\nb".into())
        );
        assert_eq!(join_text(vec![]), None);
    }

    #[test]
    fn missing_ids_are_synthesized() {
        assert_eq!(call_id_or_new(Some("x".into())), "x");
        assert!(call_id_or_new(Some(String::new())).starts_with("call_"));
        assert!(call_id_or_new(None).starts_with("call_"));
    }
}
