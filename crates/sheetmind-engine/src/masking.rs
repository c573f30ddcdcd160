//! Observation masking: keeps the most recent turns of a conversation
//! verbatim and rewrites older tool-result messages down to a short,
//! tool-specific summary so stale spreadsheet payloads don't dominate
//! the context window.

use std::collections::HashMap;

use serde_json::Value;
use sheetmind_llm::types::{Message, MessageContent, MessageRole};

/// Number of most recent user-message turns kept verbatim. Everything
/// older is a candidate for masking.
pub const FRESH_WINDOW: usize = 3;

/// Tool result bodies longer than this are summarized even within the
/// fallback (no-template) path.
const FALLBACK_CHARS: usize = 200;

/// Rewrite `messages` into a new list where tool-result messages older
/// than the most recent [`FRESH_WINDOW`] user turns are replaced with a
/// short, tool-keyed summary. User, assistant-text, and system messages
/// are never touched. Does not mutate the input.
#[must_use]
pub fn mask_messages(messages: &[Message]) -> Vec<Message> {
    let boundary = fresh_boundary(messages, FRESH_WINDOW);
    let tool_names = tool_call_names(messages);

    messages
        .iter()
        .enumerate()
        .map(|(i, msg)| {
            if i >= boundary || msg.role != MessageRole::Tool {
                return msg.clone();
            }
            let MessageContent::ToolResult(result) = &msg.content else {
                return msg.clone();
            };
            let tool_name = tool_names.get(result.call_id.as_str()).map(String::as_str);
            let summary = summarize(tool_name, &result.content);
            Message::tool_result(sheetmind_llm::types::ToolCallResult {
                call_id: result.call_id.clone(),
                content: summary,
                is_error: result.is_error,
            })
        })
        .collect()
}

/// Index of the first message that is part of the most recent
/// `fresh_window` user turns (and therefore kept verbatim). `0` if the
/// conversation has fewer than `fresh_window` user messages.
fn fresh_boundary(messages: &[Message], fresh_window: usize) -> usize {
    if fresh_window == 0 {
        return messages.len();
    }
    let mut seen = 0;
    for (i, msg) in messages.iter().enumerate().rev() {
        if msg.role == MessageRole::User {
            seen += 1;
            if seen == fresh_window {
                return i;
            }
        }
    }
    0
}

/// Map every tool call id seen in an assistant message's `tool_calls` to
/// its tool name. A tool-result message carries only the `call_id`, not
/// the name, so this joins back by id.
fn tool_call_names(messages: &[Message]) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for msg in messages {
        if let MessageContent::ToolCalls(calls) = &msg.content {
            for call in calls {
                map.insert(call.id.clone(), call.name.clone());
            }
        }
    }
    map
}

fn summarize(tool_name: Option<&str>, content: &str) -> String {
    match tool_name {
        Some("read_excel" | "read_sheet") => summarize_read(content),
        Some("run_code") => summarize_run_code(content),
        Some("inspect_excel_files") => summarize_inspect(content),
        _ => fallback_summary(content),
    }
}

fn summarize_read(content: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(content) else {
        return fallback_summary(content);
    };
    let file = value.get("file").and_then(Value::as_str).unwrap_or("?");
    let sheet = value.get("sheet").and_then(Value::as_str).unwrap_or("?");
    let rows = value.get("rows").and_then(Value::as_u64).unwrap_or(0);
    let cols = value.get("cols").and_then(Value::as_u64).unwrap_or(0);
    let headers: Vec<&str> = value
        .get("headers")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    format!("[read {file}/{sheet}, {rows}r×{cols}c, cols:[{}]]", headers.join(", "))
}

fn summarize_run_code(content: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(content) else {
        return fallback_summary(content);
    };
    let ok = value.get("ok").and_then(Value::as_bool).unwrap_or(false);
    let status = if ok { "ok" } else { "fail" };
    let stdout = value.get("stdout").and_then(Value::as_str).unwrap_or("");
    let (truncated, marker) = truncate(stdout, FALLBACK_CHARS);
    format!("[run_code {status}] {truncated}{marker}")
}

fn summarize_inspect(content: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(content) else {
        return fallback_summary(content);
    };
    let files: Vec<&str> = value
        .get("files")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(|f| f.get("name").and_then(Value::as_str)).collect())
        .unwrap_or_default();
    format!("[inspected {} files: {}]", files.len(), files.join(", "))
}

/// Open question in the original design: when content isn't parseable
/// JSON for the matched tool, fall back to the first 200 characters
/// with an ellipsis rather than attempting further structured
/// extraction.
fn fallback_summary(content: &str) -> String {
    let (truncated, marker) = truncate(content, FALLBACK_CHARS);
    format!("{truncated}{marker}")
}

fn truncate(s: &str, max_chars: usize) -> (String, &'static str) {
    let char_count = s.chars().count();
    if char_count <= max_chars {
        (s.to_string(), "")
    } else {
        (s.chars().take(max_chars).collect(), "...")
    }
}

#[cfg(test)]
mod tests {
    use sheetmind_llm::types::{Message, ToolCall, ToolCallResult};

    use super::*;

    #[test]
    fn keeps_recent_user_turns_verbatim() {
        let messages = vec![
            Message::user("first"),
            Message::assistant_with_tools(vec![ToolCall::new("c1", "read_excel")]),
            Message::tool_result(ToolCallResult::success("c1", r#"{"file":"a.xlsx","sheet":"Sheet1","rows":10,"cols":3,"headers":["a","b","c"]}"#)),
            Message::user("second"),
            Message::user("third"),
        ];
        let masked = mask_messages(&messages);
        assert_eq!(masked[0].text(), Some("first"));
        assert_eq!(masked[3].text(), Some("second"));
    }

    #[test]
    fn masks_old_tool_results_by_name() {
        let messages = vec![
            Message::user("u1"),
            Message::assistant_with_tools(vec![ToolCall::new("c1", "read_excel")]),
            Message::tool_result(ToolCallResult::success("c1", r#"{"file":"a.xlsx","sheet":"Sheet1","rows":10,"cols":3,"headers":["a","b","c"]}"#)),
            Message::user("u2"),
            Message::user("u3"),
            Message::user("u4"),
        ];
        let masked = mask_messages(&messages);
        let MessageContent::ToolResult(result) = &masked[2].content else {
            panic!("expected a tool result");
        };
        assert!(result.content.starts_with("[read a.xlsx/Sheet1"));
    }

    #[test]
    fn falls_back_to_truncation_for_unknown_tool() {
        let long = "x".repeat(400);
        let messages = vec![
            Message::user("u1"),
            Message::assistant_with_tools(vec![ToolCall::new("c1", "some_other_tool")]),
            Message::tool_result(ToolCallResult::success("c1", long.clone())),
            Message::user("u2"),
            Message::user("u3"),
            Message::user("u4"),
        ];
        let masked = mask_messages(&messages);
        let MessageContent::ToolResult(result) = &masked[2].content else {
            panic!("expected a tool result");
        };
        assert!(result.content.ends_with("..."));
        assert!(result.content.len() < long.len());
    }
}
