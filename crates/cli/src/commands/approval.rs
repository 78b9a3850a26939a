//! Terminal approval prompt for mutating tool calls.

use scribe_core::approval::{ApprovalDecision, ApprovalRequest};
use std::io::Write;
use tokio::io::{AsyncBufRead, Lines};

/// Lines of unchanged context shown around a change.
const CONTEXT_LINES: usize = 2;

/// Show the proposed change and read the operator's answer from `input`.
///
/// End of input counts as a rejection.
pub async fn prompt<R>(
    request: &ApprovalRequest,
    input: &mut Lines<R>,
) -> std::io::Result<ApprovalDecision>
where
    R: AsyncBufRead + Unpin,
{
    eprintln!();
    eprintln!("  ┌─ Approval needed: {} ({})", request.object_name, request.tool_name);
    if let Some(locator) = &request.resource_locator {
        eprintln!("  │  {locator}");
    }
    for line in change_summary(&request.before_text, &request.after_text) {
        eprintln!("  │ {line}");
    }
    eprintln!("  └─");

    loop {
        eprint!("  [a]ccept / [r]eject / [e]dit > ");
        std::io::stderr().flush()?;

        let Some(answer) = input.next_line().await? else {
            return Ok(ApprovalDecision::Rejected);
        };
        match answer.trim().to_ascii_lowercase().as_str() {
            "a" | "accept" | "y" | "yes" => return Ok(ApprovalDecision::Accepted),
            "r" | "reject" | "n" | "no" => return Ok(ApprovalDecision::Rejected),
            "e" | "edit" => {
                eprintln!("  Enter the replacement content; finish with a line containing only '.'");
                return match read_block(input).await? {
                    Some(text) => Ok(ApprovalDecision::Edited(text)),
                    None => Ok(ApprovalDecision::Rejected),
                };
            }
            _ => eprintln!("  Please answer a, r or e."),
        }
    }
}

/// Read lines up to a lone `.`. `None` when input ends first.
async fn read_block<R>(input: &mut Lines<R>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = Vec::new();
    while let Some(line) = input.next_line().await? {
        if line == "." {
            return Ok(Some(lines.join("\n")));
        }
        lines.push(line);
    }
    Ok(None)
}

/// A compact view of what changes between `before` and `after`.
///
/// Common leading and trailing lines are trimmed; the differing middle is
/// shown as removed (`-`) and added (`+`) lines with a little context.
pub fn change_summary(before: &str, after: &str) -> Vec<String> {
    let old: Vec<&str> = before.lines().collect();
    let new: Vec<&str> = after.lines().collect();

    if old.is_empty() {
        let mut out = vec![format!("(new object, {} lines)", new.len())];
        out.extend(new.iter().map(|l| format!("+ {l}")));
        return out;
    }

    let prefix = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
    if prefix == old.len() && prefix == new.len() {
        return vec!["(no changes)".to_string()];
    }
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = Vec::new();
    let context_start = prefix.saturating_sub(CONTEXT_LINES);
    if context_start > 0 {
        out.push(format!("@@ line {} @@", context_start + 1));
    }
    out.extend(old[context_start..prefix].iter().map(|l| format!("  {l}")));
    out.extend(old[prefix..old.len() - suffix].iter().map(|l| format!("- {l}")));
    out.extend(new[prefix..new.len() - suffix].iter().map(|l| format!("+ {l}")));
    let context_end = (old.len() - suffix + CONTEXT_LINES).min(old.len());
    out.extend(old[old.len() - suffix..context_end].iter().map(|l| format!("  {l}")));
    out
}
