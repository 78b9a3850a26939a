//! Fault compaction for failed tool results.
//!
//! Backends answer failures with whole XML exception documents, JSON error
//! envelopes or HTML error pages. The model only needs the human-readable
//! message, so error results are reduced to it before they enter the
//! conversation.

use regex_lite::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Upper bound, in characters, for the message part of a compacted fault.
pub const MAX_FAULT_MESSAGE_LEN: usize = 500;

static XML_MESSAGE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?s)<(?:[\w-]+:)?(?:localizedMessage|message)\b[^>]*>(.*?)</").ok()
});

static HTML_TITLE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").ok());

/// Reduce a tool error result to `"<Kind>: <message>"` with a bounded message.
///
/// Content without a recognisable fault body is only whitespace-collapsed
/// and truncated.
pub fn compact_fault(content: &str) -> String {
    let (kind, detail) = split_kind(content);

    let message = match detail.find(['<', '{']) {
        Some(start) => {
            let (lead, body) = detail.split_at(start);
            match extract_message(body) {
                Some(extracted) => join_lead(lead, &extracted),
                None => collapse_whitespace(detail),
            }
        }
        None => collapse_whitespace(detail),
    };
    let message = truncate(&message, MAX_FAULT_MESSAGE_LEN);

    match kind {
        Some(kind) => format!("{kind}: {message}"),
        None => message,
    }
}

/// Pull the human-readable message out of an XML, HTML or JSON fault body.
pub fn extract_message(body: &str) -> Option<String> {
    let body = body.trim_start();
    if body.starts_with('{') {
        return json_message(body);
    }
    xml_message(body)
}

fn split_kind(content: &str) -> (Option<&str>, &str) {
    match content.split_once(": ") {
        Some((kind, rest))
            if !kind.is_empty() && kind.chars().all(|c| c.is_ascii_alphabetic()) =>
        {
            (Some(kind), rest)
        }
        _ => (None, content),
    }
}

fn join_lead(lead: &str, message: &str) -> String {
    let lead = lead.trim();
    if lead.is_empty() {
        message.to_string()
    } else {
        format!("{lead} {message}")
    }
}

fn xml_message(body: &str) -> Option<String> {
    [&XML_MESSAGE, &HTML_TITLE].into_iter().find_map(|pattern| {
        let re = (**pattern).as_ref()?;
        let text = re.captures(body)?.get(1)?.as_str();
        let text = collapse_whitespace(&decode_entities(text));
        (!text.is_empty()).then_some(text)
    })
}

fn json_message(body: &str) -> Option<String> {
    let value = serde_json::Deserializer::from_str(body)
        .into_iter::<Value>()
        .next()?
        .ok()?;

    let candidates = [
        value.pointer("/error/message"),
        value.get("error").filter(|v| v.is_string()),
        value.get("message"),
        value.get("error_description"),
        value.get("detail"),
        value.pointer("/errors/0/message"),
    ];
    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(collapse_whitespace)
        .find(|m| !m.is_empty())
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}
