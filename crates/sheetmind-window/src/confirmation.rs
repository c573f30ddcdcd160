//! Tool-call confirmation records: a compact line (or small block)
//! appended to a tool result so the model can see what it just touched
//! without re-reading the window. Three render modes share one record
//! shape; [`parse_confirmation`] recovers that shape from either mode's
//! text, used by tests and by the repeat-detector's log replay.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::Window;
use crate::models::ChangeRecord;

/// One tool call's confirmation payload, independent of render mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationRecord {
    /// `"{window_id}: {file}/{sheet}"` or just the window id for explorer.
    pub window_label: String,
    /// The tool name that produced this confirmation.
    pub operation: String,
    /// The range affected, or `"-"`.
    pub range_ref: String,
    /// Row count affected.
    pub rows: i64,
    /// Column count affected.
    pub cols: i64,
    /// Short human-readable change description.
    pub change_summary: String,
    /// The window's current intent tag, as its string form.
    pub intent: String,
    /// Extra hint text (e.g. a repeat-read warning), if any.
    pub hint: String,
}

/// How a [`ConfirmationRecord`] is serialised to text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationMode {
    /// Single inline line: `[OK] label tool: range | RxC | summary | intent=x | hint=y`.
    Unified,
    /// Header line plus indented `intent:`/`hint:` lines.
    Anchored,
    /// The enriched renderer owns its own block; confirmations render
    /// the same as anchored but without the fixed boilerplate hint line.
    Enriched,
}

/// Build a confirmation record for a completed tool call.
#[must_use]
pub fn build_confirmation_record(window: &Window, tool_name: &str, repeat_warning: bool) -> ConfirmationRecord {
    let window_label = match window {
        Window::Explorer(w) => w.common.id.clone(),
        Window::Sheet(w) => format!("{}: {}/{}", w.common.id, display_or(&w.data.file_path, "?"), display_or(&w.data.sheet_name, "?")),
    };

    let (range_ref, rows, cols) = match window {
        Window::Explorer(_) => ("-".to_string(), 0, 0),
        Window::Sheet(w) => {
            let range_ref = if w.viewport_range().is_empty() { "-".to_string() } else { w.viewport_range().to_string() };
            let rows = w.total_rows().max(w.data.cache.data_buffer.len() as i64);
            let cols = w.total_cols();
            (range_ref, rows, cols)
        },
    };

    let change_summary = latest_change_summary(&window.common().audit.change_log);
    let intent = window.common().intent.tag.as_str().to_string();
    let hint = if repeat_warning { "this range has been read repeatedly; consider relying on the window above instead of re-reading.".to_string() } else { String::new() };

    ConfirmationRecord { window_label, operation: tool_name.to_string(), range_ref, rows, cols, change_summary, intent, hint }
}

/// Render `record` under `mode`.
#[must_use]
pub fn serialize_confirmation(record: &ConfirmationRecord, mode: ConfirmationMode) -> String {
    match mode {
        ConfirmationMode::Unified => {
            let mut line = format!(
                "[OK] [{}] {}: {} | {}r x {}c | {}",
                record.window_label, record.operation, record.range_ref, record.rows, record.cols, record.change_summary
            );
            line.push_str(&format!(" | intent={}", record.intent));
            if !record.hint.is_empty() {
                line.push_str(&format!(" | hint={}", record.hint));
            }
            line
        },
        ConfirmationMode::Anchored | ConfirmationMode::Enriched => {
            let mut lines = vec![format!(
                "[OK] [{}] {}: {} | {}r x {}c | {}",
                record.window_label, record.operation, record.range_ref, record.rows, record.cols, record.change_summary
            )];
            lines.push(format!("  intent: {}", record.intent));
            if matches!(mode, ConfirmationMode::Anchored) {
                lines.push("  hint: data has been merged into the window above; prefer referencing it directly.".to_string());
            }
            if !record.hint.is_empty() {
                lines.push(format!("  hint: {}", record.hint));
            }
            lines.join("\n")
        },
    }
}

static UNIFIED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[OK\] \[(?P<label>[^\]]+)\] (?P<op>[^:]+): (?P<range>\S+) \| (?P<rows>\d+)r x (?P<cols>\d+)c \| (?P<summary>[^|]*?)(?: \| intent=(?P<intent>[^|]+))?(?: \| hint=(?P<hint>.+))?$").unwrap()
});
static ANCHORED_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[OK\] \[(?P<label>[^\]]+)\] (?P<op>[^:]+): (?P<range>\S+) \| (?P<rows>\d+)r x (?P<cols>\d+)c \| (?P<summary>.+)$").unwrap());
static ANCHORED_INTENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*intent:\s*(?P<intent>.+)$").unwrap());
static ANCHORED_HINT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*hint:\s*(?P<hint>.+)$").unwrap());

/// Recover a [`ConfirmationRecord`] from rendered text, trying the
/// unified single-line form first, then the anchored multi-line form.
#[must_use]
pub fn parse_confirmation(text: &str) -> Option<ConfirmationRecord> {
    let first_line = text.lines().next()?;
    if let Some(caps) = UNIFIED_RE.captures(first_line) {
        return Some(ConfirmationRecord {
            window_label: caps["label"].to_string(),
            operation: caps["op"].trim().to_string(),
            range_ref: caps["range"].to_string(),
            rows: caps["rows"].parse().unwrap_or(0),
            cols: caps["cols"].parse().unwrap_or(0),
            change_summary: caps["summary"].trim().to_string(),
            intent: caps.name("intent").map_or_else(String::new, |m| m.as_str().to_string()),
            hint: caps.name("hint").map_or_else(String::new, |m| m.as_str().to_string()),
        });
    }

    let caps = ANCHORED_HEAD_RE.captures(first_line)?;
    let mut intent = String::new();
    let mut hint = String::new();
    for line in text.lines().skip(1) {
        if let Some(c) = ANCHORED_INTENT_RE.captures(line) {
            intent = c["intent"].trim().to_string();
        } else if let Some(c) = ANCHORED_HINT_RE.captures(line) {
            if hint.is_empty() {
                hint = c["hint"].trim().to_string();
            }
        }
    }
    Some(ConfirmationRecord {
        window_label: caps["label"].to_string(),
        operation: caps["op"].trim().to_string(),
        range_ref: caps["range"].to_string(),
        rows: caps["rows"].parse().unwrap_or(0),
        cols: caps["cols"].parse().unwrap_or(0),
        change_summary: caps["summary"].trim().to_string(),
        intent,
        hint,
    })
}

fn latest_change_summary(change_log: &[ChangeRecord]) -> String {
    let Some(last) = change_log.last() else { return "-".to_string() };
    if last.affected_range != "-" && !last.affected_range.is_empty() {
        last.affected_range.clone()
    } else if !last.change_type.is_empty() {
        last.change_type.clone()
    } else {
        last.tool_summary.clone()
    }
}

fn display_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() { fallback } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SheetWindow;

    fn sample_record() -> ConfirmationRecord {
        ConfirmationRecord {
            window_label: "w1: a.xlsx/Sheet1".into(),
            operation: "read_range".into(),
            range_ref: "A1:B10".into(),
            rows: 10,
            cols: 2,
            change_summary: "read".into(),
            intent: "aggregate".into(),
            hint: String::new(),
        }
    }

    #[test]
    fn unified_round_trips_through_serialize_and_parse() {
        let record = sample_record();
        let text = serialize_confirmation(&record, ConfirmationMode::Unified);
        let parsed = parse_confirmation(&text).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn anchored_round_trips_through_serialize_and_parse() {
        let mut record = sample_record();
        record.hint = "re-reading warning".into();
        let text = serialize_confirmation(&record, ConfirmationMode::Anchored);
        let parsed = parse_confirmation(&text).unwrap();
        assert_eq!(parsed.window_label, record.window_label);
        assert_eq!(parsed.intent, record.intent);
        assert_eq!(parsed.hint, record.hint);
    }

    #[test]
    fn build_confirmation_record_falls_back_to_change_type_when_no_range() {
        let mut w = SheetWindow::new("w1", "t", "/a.xlsx", "Sheet1");
        w.common.audit.change_log.push(ChangeRecord { operation: "style".into(), tool_summary: "bolded".into(), affected_range: "-".into(), change_type: "style".into(), iteration: 1, affected_row_indices: vec![] });
        let record = build_confirmation_record(&Window::Sheet(w), "apply_style", false);
        assert_eq!(record.change_summary, "style");
    }
}
