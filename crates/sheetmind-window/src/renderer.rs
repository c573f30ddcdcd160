//! Renders windows into the plain-ASCII text blocks injected into the
//! system prompt and appended to tool results.

use serde_json::Value;

use crate::domain::{ExplorerWindow, SheetWindow, Window};
use crate::models::WindowSnapshot;

/// Join non-blank snapshot texts into the system-notice block, or
/// return an empty string if there's nothing to show.
#[must_use]
pub fn render_system_notice(snapshots: &[WindowSnapshot]) -> String {
    let body: Vec<&str> = snapshots.iter().map(|s| s.rendered_text.trim()).filter(|s| !s.is_empty()).collect();
    if body.is_empty() {
        return String::new();
    }
    format!(
        "## Window Perception Context\n\
         The windows below reflect the live state of what you currently have open; \
         their data matches tool results exactly.\n\
         If the information you need is already shown below (column names, row counts, \
         preview data, etc.), answer directly from it instead of calling a tool again.\n\n{}",
        body.join("\n\n")
    )
}

/// Full-detail render for the active/keep tier.
#[must_use]
pub fn render_window_keep(window: &Window) -> String {
    match window {
        Window::Explorer(w) => render_explorer(w),
        Window::Sheet(w) => render_sheet(w),
    }
}

/// Structural-summary render for the background tier.
#[must_use]
pub fn render_window_background(window: &Window) -> String {
    match window {
        Window::Explorer(w) => {
            let title = if w.common.title.is_empty() { "Explorer" } else { &w.common.title };
            let summary = if w.common.summary.is_empty() { "directory view" } else { &w.common.summary };
            format!("[background: {title}] {summary}")
        },
        Window::Sheet(w) => {
            let file_name = if w.data.file_path.is_empty() { "unknown file" } else { &w.data.file_path };
            let sheet_name = if w.data.sheet_name.is_empty() { "unknown sheet" } else { &w.data.sheet_name };
            let mut lines = vec![format!("[background: {file_name} / {sheet_name}]")];

            if w.data.viewport.is_some() {
                lines.push(format!("{} rows x {} cols", w.total_rows(), w.total_cols()));
            }
            let columns = extract_columns_from_preview(&w.data.cache.preview_rows);
            if !columns.is_empty() {
                lines.push(format!("columns: {}", columns.join(", ")));
            }

            let mut parts = Vec::new();
            if let Some(viewport) = &w.data.viewport {
                parts.push(format!("viewport: {}", viewport.range_ref));
            }
            if !w.data.sheet_tabs.is_empty() {
                let mut tabs: Vec<String> = w.data.sheet_tabs.iter().take(8).map(|t| format!("[{t}]")).collect();
                if w.data.sheet_tabs.len() > 8 {
                    tabs.push("...".to_string());
                }
                parts.push(format!("tabs: {}", tabs.join(" ")));
            }
            if !parts.is_empty() {
                lines.push(parts.join(" | "));
            }
            lines.join("\n")
        },
    }
}

/// One-line render for the suspended tier.
#[must_use]
pub fn render_window_minimized(window: &Window) -> String {
    match window {
        Window::Explorer(w) => {
            let title = if w.common.title.is_empty() { "Explorer" } else { &w.common.title };
            let summary = if w.common.summary.is_empty() { "directory view" } else { &w.common.summary };
            format!("[suspended: {title}] {summary}")
        },
        Window::Sheet(w) => {
            let file_name = if w.data.file_path.is_empty() { "unknown file" } else { &w.data.file_path };
            let sheet_name = if w.data.sheet_name.is_empty() { "unknown sheet" } else { &w.data.sheet_name };
            let (rows, cols) = (w.total_rows(), w.total_cols());
            if rows > 0 && cols > 0 {
                format!("[suspended: {file_name} / {sheet_name} | {rows}x{cols}]")
            } else {
                let summary = if w.common.summary.is_empty() { "previous view compacted" } else { &w.common.summary };
                format!("[suspended: {file_name} / {sheet_name}] {summary}")
            }
        },
    }
}

/// Build the JSON payload used by [`render_tool_perception_block`].
#[must_use]
pub fn build_tool_perception_payload(window: &Window) -> Value {
    match window {
        Window::Explorer(w) => {
            let entries: Vec<Value> = w.data.entries.iter().take(12).cloned().map(Value::from).collect();
            serde_json::json!({"window_type": "explorer", "title": w.common.title, "directory": w.data.directory, "entries": entries})
        },
        Window::Sheet(w) => {
            let viewport = w.data.viewport.as_ref();
            let meta = &w.common.metadata;
            serde_json::json!({
                "window_type": "sheet",
                "file": w.data.file_path,
                "sheet": w.data.sheet_name,
                "sheet_tabs": w.data.sheet_tabs,
                "viewport": {
                    "range": viewport.map(|v| v.range_ref.clone()).unwrap_or_default(),
                    "visible_rows": viewport.map_or(0, |v| v.visible_rows),
                    "visible_cols": viewport.map_or(0, |v| v.visible_cols),
                    "total_rows": w.total_rows(),
                    "total_cols": w.total_cols(),
                },
                "freeze_panes": w.data.style.freeze_panes,
                "style_summary": w.data.style.summary,
                "scroll_position": meta.get("scroll_position").cloned().unwrap_or_else(|| Value::Object(Default::default())),
                "status_bar": meta.get("status_bar").cloned().unwrap_or_else(|| Value::Object(Default::default())),
                "column_widths": meta.get("column_widths").cloned().unwrap_or_else(|| Value::Object(Default::default())),
                "row_heights": meta.get("row_heights").cloned().unwrap_or_else(|| Value::Object(Default::default())),
                "merged_ranges": meta.get("merged_ranges").cloned().unwrap_or_else(|| Value::Array(Vec::new())),
                "conditional_effects": meta.get("conditional_effects").cloned().unwrap_or_else(|| Value::Array(Vec::new())),
            })
        },
    }
}

/// Render the tool-result perception block: a plain-ASCII banner that
/// surfaces the window's current shape alongside a tool's own output.
#[must_use]
pub fn render_tool_perception_block(payload: &Value) -> String {
    const RULE: &str = "----- perception -----";
    let Some(map) = payload.as_object() else { return String::new() };

    if map.get("window_type").and_then(Value::as_str) == Some("explorer") {
        let mut lines = vec![RULE.to_string(), format!("dir: {}", map.get("directory").and_then(Value::as_str).filter(|s| !s.is_empty()).unwrap_or("."))];
        if let Some(entries) = map.get("entries").and_then(Value::as_array) {
            for entry in entries.iter().take(8) {
                lines.push(format!("  - {}", value_to_display(entry)));
            }
        }
        lines.push(RULE.to_string());
        return lines.join("\n");
    }

    let empty_map = serde_json::Map::new();
    let viewport = map.get("viewport").and_then(Value::as_object).unwrap_or(&empty_map);
    let tab_names: Vec<String> = map.get("sheet_tabs").and_then(Value::as_array).into_iter().flatten().filter_map(|v| v.as_str().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)).collect();
    let mut current_sheet = map.get("sheet").and_then(Value::as_str).unwrap_or("").trim().to_string();
    if current_sheet.is_empty() {
        current_sheet = tab_names.first().cloned().unwrap_or_default();
    }
    if current_sheet.is_empty() {
        current_sheet = "unknown".to_string();
    }
    let other_tabs: Vec<String> = tab_names.iter().filter(|t| **t != current_sheet).map(|t| format!("[{t}]")).collect();

    let mut lines = vec![
        RULE.to_string(),
        format!("file: {}", map.get("file").and_then(Value::as_str).filter(|s| !s.is_empty()).unwrap_or("unknown")),
        if other_tabs.is_empty() { format!("sheet: {current_sheet}") } else { format!("sheet: {current_sheet} | other: {}", other_tabs.join(" ")) },
        format!("range: {} rows x {} cols", viewport.get("total_rows").and_then(Value::as_i64).unwrap_or(0), viewport.get("total_cols").and_then(Value::as_i64).unwrap_or(0)),
        format!("viewport: {}", viewport.get("range").and_then(Value::as_str).filter(|s| !s.is_empty()).unwrap_or("unknown")),
    ];

    if let Some(freeze) = map.get("freeze_panes").and_then(Value::as_str) {
        if !freeze.is_empty() {
            lines.push(format!("freeze: {freeze}"));
        }
    }

    if let Some(scroll) = map.get("scroll_position").and_then(Value::as_object) {
        if !scroll.is_empty() {
            lines.push(format!("scroll: vertical {} | horizontal {}", format_percent(scroll.get("vertical_pct")), format_percent(scroll.get("horizontal_pct"))));
            lines.push(format!("remaining: below {} | right {}", format_percent(scroll.get("remaining_rows_pct")), format_percent(scroll.get("remaining_cols_pct"))));
        }
    }

    if let Some(status_bar) = map.get("status_bar").and_then(Value::as_object) {
        if !status_bar.is_empty() {
            lines.push(format!(
                "status bar: SUM={} | COUNT={} | AVERAGE={}",
                format_number(status_bar.get("sum")),
                format_int(status_bar.get("count")),
                format_number(status_bar.get("average"))
            ));
        }
    }

    if let Some(widths) = map.get("column_widths").and_then(Value::as_object) {
        if !widths.is_empty() {
            lines.push(format!("column widths: {}", format_map_preview(widths, 8)));
        }
    }
    if let Some(heights) = map.get("row_heights").and_then(Value::as_object) {
        if !heights.is_empty() {
            lines.push(format!("row heights: {}", format_map_preview(heights, 8)));
        }
    }
    if let Some(merged) = map.get("merged_ranges").and_then(Value::as_array) {
        if !merged.is_empty() {
            lines.push(format!("merged cells: {}", preview_list(merged, 6)));
        }
    }
    if let Some(effects) = map.get("conditional_effects").and_then(Value::as_array) {
        if !effects.is_empty() {
            lines.push(format!("conditional format: {}", preview_list(effects, 4)));
        }
    }
    if let Some(style_summary) = map.get("style_summary").and_then(Value::as_str) {
        if !style_summary.is_empty() {
            lines.push(format!("style: {style_summary}"));
        }
    }
    lines.push(RULE.to_string());
    lines.join("\n")
}

fn render_explorer(window: &ExplorerWindow) -> String {
    let mut lines = vec!["[current: explorer]".to_string(), format!("dir: {}", if window.data.directory.is_empty() { "." } else { &window.data.directory })];
    if !window.data.entries.is_empty() {
        lines.extend(window.data.entries.iter().take(15).cloned());
    } else if !window.common.summary.is_empty() {
        lines.push(window.common.summary.clone());
    }
    lines.join("\n")
}

fn render_sheet(window: &SheetWindow) -> String {
    let file_name = if window.data.file_path.is_empty() { "unknown file" } else { &window.data.file_path };
    let sheet_name = if window.data.sheet_name.is_empty() { "unknown sheet" } else { &window.data.sheet_name };
    let mut lines = vec![format!("[window: {file_name} / {sheet_name}]")];

    if !window.data.sheet_tabs.is_empty() {
        let tabs: Vec<String> =
            window.data.sheet_tabs.iter().map(|t| if t == sheet_name { format!("[>{t}]") } else { format!("[{t}]") }).collect();
        lines.push(format!("sheets: {}", tabs.join(" ")));
    }

    if let Some(viewport) = &window.data.viewport {
        lines.push(format!("visible range: {} (of {} rows x {} cols)", viewport.range_ref, window.total_rows(), window.total_cols()));
    }

    if let Some(freeze) = &window.data.style.freeze_panes {
        lines.push(format!("freeze panes: {freeze}"));
    }

    if !window.data.cache.preview_rows.is_empty() {
        lines.push("preview:".to_string());
        lines.extend(render_preview(&window.data.cache.preview_rows, 8));
    }

    if !window.data.style.summary.is_empty() {
        lines.push("style:".to_string());
        lines.push(format!("  - {}", window.data.style.summary));
    }

    let meta = &window.common.metadata;
    if let Some(scroll) = meta.get("scroll_position").and_then(Value::as_object) {
        if !scroll.is_empty() {
            lines.push(format!("scroll position: vertical {} | horizontal {}", format_percent(scroll.get("vertical_pct")), format_percent(scroll.get("horizontal_pct"))));
        }
    }
    if let Some(status_bar) = meta.get("status_bar").and_then(Value::as_object) {
        if !status_bar.is_empty() {
            lines.push(format!(
                "status bar: SUM={} | COUNT={} | AVERAGE={}",
                format_number(status_bar.get("sum")),
                format_int(status_bar.get("count")),
                format_number(status_bar.get("average"))
            ));
        }
    }
    if let Some(widths) = meta.get("column_widths").and_then(Value::as_object) {
        if !widths.is_empty() {
            lines.push(format!("column widths: {}", format_map_preview(widths, 8)));
        }
    }
    if let Some(heights) = meta.get("row_heights").and_then(Value::as_object) {
        if !heights.is_empty() {
            lines.push(format!("row heights: {}", format_map_preview(heights, 8)));
        }
    }
    if let Some(merged) = meta.get("merged_ranges").and_then(Value::as_array) {
        if !merged.is_empty() {
            lines.push(format!("merged cells: {}", preview_list(merged, 6)));
        }
    }
    if let Some(effects) = meta.get("conditional_effects").and_then(Value::as_array) {
        if !effects.is_empty() {
            lines.push(format!("conditional format: {}", preview_list(effects, 4)));
        }
    }

    if !window.common.summary.is_empty() {
        lines.push(format!("summary: {}", window.common.summary));
    }

    lines.join("\n")
}

fn render_preview(rows: &[Value], max_rows: usize) -> Vec<String> {
    let mut rendered: Vec<String> = rows
        .iter()
        .take(max_rows)
        .enumerate()
        .map(|(idx, row)| {
            let body = match row {
                Value::Object(map) => map.iter().take(6).map(|(k, v)| format!("{k}={}", value_to_display(v))).collect::<Vec<_>>().join(", "),
                Value::Array(items) => items.iter().take(8).map(value_to_display).collect::<Vec<_>>().join(", "),
                other => value_to_display(other),
            };
            format!("  {}. {body}", idx + 1)
        })
        .collect();
    if rows.len() > max_rows {
        rendered.push("  ...".to_string());
    }
    rendered
}

fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_percent(value: Option<&Value>) -> String {
    format!("{:.1}%", value.and_then(Value::as_f64).unwrap_or(0.0))
}

fn format_number(value: Option<&Value>) -> String {
    let number = value.and_then(Value::as_f64).unwrap_or(0.0);
    let rounded = (number * 100.0).round() / 100.0;
    if (rounded - rounded.trunc()).abs() < 1e-9 {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded:.2}")
    }
}

fn format_int(value: Option<&Value>) -> String {
    format!("{}", value.and_then(Value::as_f64).unwrap_or(0.0) as i64)
}

fn format_map_preview(values: &serde_json::Map<String, Value>, max_items: usize) -> String {
    let mut ordered: Vec<(&String, &Value)> = values.iter().collect();
    ordered.sort_by_key(|(k, _)| k.to_string());
    let mut chunks: Vec<String> = ordered.iter().take(max_items).map(|(k, v)| format!("{k}={}", format_number(Some(v)))).collect();
    if ordered.len() > max_items {
        chunks.push(format!("...(+{})", ordered.len() - max_items));
    }
    chunks.join(", ")
}

fn preview_list(items: &[Value], max_items: usize) -> String {
    let mut preview: Vec<String> = items.iter().take(max_items).map(value_to_display).collect();
    if items.len() > max_items {
        preview.push(format!("...(+{})", items.len() - max_items));
    }
    preview.join(", ")
}

fn extract_columns_from_preview(rows: &[Value]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut columns = Vec::new();
    for row in rows {
        let Some(map) = row.as_object() else { continue };
        for key in map.keys() {
            if seen.insert(key.clone()) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SheetWindow;

    #[test]
    fn system_notice_is_empty_when_every_snapshot_is_blank() {
        let snapshots = vec![WindowSnapshot { window_id: "w1".into(), action: crate::models::WindowRenderAction::Close, rendered_text: String::new(), estimated_tokens: 0 }];
        assert_eq!(render_system_notice(&snapshots), "");
    }

    #[test]
    fn system_notice_wraps_non_blank_bodies() {
        let snapshots = vec![WindowSnapshot { window_id: "w1".into(), action: crate::models::WindowRenderAction::Keep, rendered_text: "hello".into(), estimated_tokens: 1 }];
        let notice = render_system_notice(&snapshots);
        assert!(notice.contains("hello"));
        assert!(notice.starts_with("## Window Perception Context"));
    }

    #[test]
    fn minimized_sheet_render_prefers_dimensions_over_summary() {
        let mut w = SheetWindow::new("w1", "t", "/a.xlsx", "Sheet1");
        w.data.total_rows = 10;
        w.data.total_cols = 3;
        let text = render_window_minimized(&Window::Sheet(w));
        assert!(text.contains("10x3"));
    }

    #[test]
    fn tool_perception_block_renders_explorer_dir() {
        let payload = serde_json::json!({"window_type": "explorer", "directory": "/tmp", "entries": ["a.txt"]});
        let block = render_tool_perception_block(&payload);
        assert!(block.contains("dir: /tmp"));
        assert!(block.contains("a.txt"));
    }
}
