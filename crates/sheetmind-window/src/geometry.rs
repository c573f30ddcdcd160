//! Viewport geometry, scroll position, and cell-style extraction: the
//! finer-grained detail a sheet window's confirmation/render needs
//! beyond the basic shape/rows that [`crate::extractor`] and
//! [`crate::ingest`] already cover.

use std::collections::HashMap;

use serde_json::Value;

use crate::rangeref::parse_range;

/// A parsed viewport range's row/column bounds and visible extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportGeometry {
    pub start_row: i64,
    pub end_row: i64,
    pub start_col: i64,
    pub end_col: i64,
    pub visible_rows: i64,
    pub visible_cols: i64,
}

impl ViewportGeometry {
    fn fallback(default_rows: i64, default_cols: i64) -> Self {
        let rows = default_rows.max(1);
        let cols = default_cols.max(1);
        Self { start_row: 1, end_row: rows, start_col: 1, end_col: cols, visible_rows: rows, visible_cols: cols }
    }
}

/// Parse `range_ref` into row/column bounds, falling back to a
/// `default_rows x default_cols` box anchored at `A1` when it doesn't
/// look like a valid A1 range.
#[must_use]
pub fn extract_viewport_geometry(range_ref: &str, default_rows: i64, default_cols: i64) -> ViewportGeometry {
    let Some(bounds) = parse_range(range_ref) else {
        return ViewportGeometry::fallback(default_rows, default_cols);
    };
    ViewportGeometry {
        start_row: bounds.min_row,
        end_row: bounds.max_row,
        start_col: bounds.min_col,
        end_col: bounds.max_col,
        visible_rows: (bounds.max_row - bounds.min_row + 1).max(1),
        visible_cols: (bounds.max_col - bounds.min_col + 1).max(1),
    }
}

/// How far through the sheet the current viewport sits, as percentages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollPosition {
    pub vertical_pct: f64,
    pub horizontal_pct: f64,
    pub remaining_rows_pct: f64,
    pub remaining_cols_pct: f64,
}

/// Compute scrollbar-style position and remaining-content percentages
/// for `geometry` against the sheet's full `total_rows x total_cols`.
#[must_use]
pub fn compute_scroll_position(geometry: ViewportGeometry, total_rows: i64, total_cols: i64) -> ScrollPosition {
    let visible_rows = geometry.visible_rows.max(1);
    let visible_cols = geometry.visible_cols.max(1);
    let start_row = geometry.start_row.max(1);
    let start_col = geometry.start_col.max(1);
    let end_row = geometry.end_row.max(start_row);
    let end_col = geometry.end_col.max(start_col);
    let total_rows = total_rows.max(0);
    let total_cols = total_cols.max(0);

    let vertical_pct = if total_rows > visible_rows { (start_row - 1) as f64 / (total_rows - visible_rows).max(1) as f64 * 100.0 } else { 0.0 };
    let horizontal_pct = if total_cols > visible_cols { (start_col - 1) as f64 / (total_cols - visible_cols).max(1) as f64 * 100.0 } else { 0.0 };

    let remaining_rows_pct = if total_rows > 0 { ((total_rows - end_row.min(total_rows)) as f64 / total_rows as f64 * 100.0).max(0.0) } else { 0.0 };
    let remaining_cols_pct = if total_cols > 0 { ((total_cols - end_col.min(total_cols)) as f64 / total_cols as f64 * 100.0).max(0.0) } else { 0.0 };

    ScrollPosition {
        vertical_pct: clamp_pct(vertical_pct),
        horizontal_pct: clamp_pct(horizontal_pct),
        remaining_rows_pct: clamp_pct(remaining_rows_pct),
        remaining_cols_pct: clamp_pct(remaining_cols_pct),
    }
}

fn clamp_pct(value: f64) -> f64 {
    (value.clamp(0.0, 100.0) * 10.0).round() / 10.0
}

/// Rough SUM/COUNT/AVERAGE over whatever numeric-looking values appear
/// in `preview_rows`, approximating a status bar. `None` when no
/// numeric value was found anywhere in the preview.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusBarSummary {
    pub sum: f64,
    pub count: i64,
    pub average: f64,
}

#[must_use]
pub fn extract_status_bar(preview_rows: &[Value]) -> Option<StatusBarSummary> {
    let numeric_values: Vec<f64> = preview_rows
        .iter()
        .flat_map(|row| match row {
            Value::Object(map) => map.values().collect::<Vec<_>>(),
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        })
        .filter_map(parse_numeric)
        .collect();
    if numeric_values.is_empty() {
        return None;
    }
    let count = numeric_values.len() as i64;
    let sum: f64 = numeric_values.iter().sum();
    let average = sum / count.max(1) as f64;
    Some(StatusBarSummary { sum: round4(sum), count, average: round4(average) })
}

fn parse_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            let is_percent = trimmed.ends_with('%');
            let cleaned = trimmed.trim_end_matches('%').replace(',', "").replace(' ', "");
            if cleaned.is_empty() {
                return None;
            }
            let parsed: f64 = cleaned.parse().ok()?;
            Some(if is_percent { parsed / 100.0 } else { parsed })
        },
        _ => None,
    }
}

fn round4(value: f64) -> f64 {
    (value * 10000.0).round() / 10000.0
}

/// Extract a column-letter -> width map, checking `column_widths`,
/// then `columns_adjusted`, then a matching entry under `sheets`.
#[must_use]
pub fn extract_column_widths(result_json: Option<&Value>, sheet_name: &str) -> HashMap<String, f64> {
    let Some(result) = result_json else { return HashMap::new() };
    if let Some(direct) = coerce_width_map(result.get("column_widths")) {
        if !direct.is_empty() {
            return direct;
        }
    }
    if let Some(adjusted) = coerce_width_map(result.get("columns_adjusted")) {
        if !adjusted.is_empty() {
            return adjusted;
        }
    }
    if let Some(sheets) = result.get("sheets").and_then(Value::as_array) {
        for item in sheets {
            let Some(obj) = item.as_object() else { continue };
            let name = obj.get("name").and_then(Value::as_str).unwrap_or("").trim();
            if !sheet_name.is_empty() && !name.is_empty() && name != sheet_name {
                continue;
            }
            if let Some(widths) = coerce_width_map(obj.get("column_widths")) {
                if !widths.is_empty() {
                    return widths;
                }
            }
        }
    }
    HashMap::new()
}

/// Extract a row-number -> height map, checking `row_heights` then
/// `rows_adjusted`.
#[must_use]
pub fn extract_row_heights(result_json: Option<&Value>) -> HashMap<String, f64> {
    let Some(result) = result_json else { return HashMap::new() };
    if let Some(direct) = coerce_height_map(result.get("row_heights")) {
        if !direct.is_empty() {
            return direct;
        }
    }
    coerce_height_map(result.get("rows_adjusted")).unwrap_or_default()
}

fn coerce_width_map(value: Option<&Value>) -> Option<HashMap<String, f64>> {
    coerce_numeric_map(value, str::to_uppercase)
}

fn coerce_height_map(value: Option<&Value>) -> Option<HashMap<String, f64>> {
    coerce_numeric_map(value, str::to_string)
}

fn coerce_numeric_map(value: Option<&Value>, normalize_key: impl Fn(&str) -> String) -> Option<HashMap<String, f64>> {
    let obj = value?.as_object()?;
    let mut parsed = HashMap::new();
    for (key, item) in obj {
        let key = normalize_key(key.trim());
        if key.is_empty() {
            continue;
        }
        if let Some(number) = item.as_f64() {
            parsed.insert(key, round2(number));
        }
    }
    Some(parsed)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Extract merged-cell ranges, checking `styles.merged_ranges`, then
/// `summary.merged_ranges`, then a top-level `merged_ranges`.
#[must_use]
pub fn extract_merged_ranges(result_json: Option<&Value>) -> Vec<String> {
    let Some(result) = result_json else { return Vec::new() };
    if let Some(styles) = result.get("styles").and_then(Value::as_object) {
        if let Some(ranges) = styles.get("merged_ranges").and_then(Value::as_array) {
            return normalize_range_list(ranges);
        }
    }
    if let Some(summary) = result.get("summary").and_then(Value::as_object) {
        if let Some(ranges) = summary.get("merged_ranges").and_then(Value::as_array) {
            return normalize_range_list(ranges);
        }
    }
    result.get("merged_ranges").and_then(Value::as_array).map(|ranges| normalize_range_list(ranges)).unwrap_or_default()
}

fn normalize_range_list(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| {
            let text = item.as_str()?.trim().to_uppercase();
            (!text.is_empty() && parse_range(&text).is_some()).then_some(text)
        })
        .collect()
}

/// Extract a single `(merged_range)`/`(unmerged_range)` operation's
/// before/after delta from a `merge_cells`/`unmerge_cells` result.
#[must_use]
pub fn extract_merged_range_delta(result_json: Option<&Value>) -> (Vec<String>, Vec<String>) {
    let Some(result) = result_json else { return (Vec::new(), Vec::new()) };
    let add_range = result.get("merged_range").and_then(Value::as_str).unwrap_or("").trim().to_uppercase();
    let remove_range = result.get("unmerged_range").and_then(Value::as_str).unwrap_or("").trim().to_uppercase();
    let adds = if !add_range.is_empty() && parse_range(&add_range).is_some() { vec![add_range] } else { Vec::new() };
    let removes = if !remove_range.is_empty() && parse_range(&remove_range).is_some() { vec![remove_range] } else { Vec::new() };
    (adds, removes)
}

/// Summarise conditional-formatting rules into short human-readable
/// effect descriptions, deduplicated and capped at 12 entries.
#[must_use]
pub fn extract_conditional_effects(result_json: Option<&Value>) -> Vec<String> {
    let Some(rules) = result_json.and_then(|r| r.get("conditional_formatting")).and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut effects = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for rule in rules {
        let Some(obj) = rule.as_object() else { continue };
        let range_ref = obj.get("range").and_then(Value::as_str).unwrap_or("").trim();
        let rule_type = obj.get("type").and_then(Value::as_str).unwrap_or("").trim();
        let operator = obj.get("operator").and_then(Value::as_str).unwrap_or("").trim();
        let effect = conditional_type_to_effect(rule_type);
        let text = match (range_ref.is_empty(), rule_type.is_empty(), operator.is_empty()) {
            (false, false, false) => format!("{range_ref}: {effect} ({rule_type}/{operator})"),
            (false, false, true) => format!("{range_ref}: {effect} ({rule_type})"),
            (false, true, _) => format!("{range_ref}: {effect}"),
            (true, false, _) => format!("{effect} ({rule_type})"),
            (true, true, _) => effect.to_string(),
        };
        if seen.insert(text.clone()) {
            effects.push(text);
        }
        if effects.len() >= 12 {
            break;
        }
    }
    effects
}

fn conditional_type_to_effect(rule_type: &str) -> &'static str {
    match rule_type.to_lowercase().as_str() {
        "colorscale" => "color scale",
        "databar" => "data bar",
        "iconset" => "icon set",
        "cellis" | "expression" | "containstext" | "duplicatevalues" | "top10" | "aboveaverage" | "timeperiod" => "conditional highlight",
        _ => "conditional highlight",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn viewport_geometry_falls_back_on_bad_range() {
        let geom = extract_viewport_geometry("not a range", 25, 10);
        assert_eq!(geom, ViewportGeometry { start_row: 1, end_row: 25, start_col: 1, end_col: 10, visible_rows: 25, visible_cols: 10 });
    }

    #[test]
    fn viewport_geometry_parses_valid_range() {
        let geom = extract_viewport_geometry("b2:d10", 25, 10);
        assert_eq!(geom, ViewportGeometry { start_row: 2, end_row: 10, start_col: 2, end_col: 4, visible_rows: 9, visible_cols: 3 });
    }

    #[test]
    fn scroll_position_is_zero_when_viewport_covers_everything() {
        let geom = extract_viewport_geometry("A1:J25", 25, 10);
        let pos = compute_scroll_position(geom, 25, 10);
        assert_eq!(pos.vertical_pct, 0.0);
        assert_eq!(pos.remaining_rows_pct, 0.0);
    }

    #[test]
    fn scroll_position_reports_remaining_content() {
        let geom = extract_viewport_geometry("A1:J25", 25, 10);
        let pos = compute_scroll_position(geom, 100, 10);
        assert_eq!(pos.remaining_rows_pct, 75.0);
    }

    #[test]
    fn status_bar_is_none_without_numeric_values() {
        assert!(extract_status_bar(&[json!({"a": "text"})]).is_none());
    }

    #[test]
    fn status_bar_sums_numeric_cells() {
        let rows = vec![json!({"a": 1, "b": 2}), json!({"a": 3})];
        let summary = extract_status_bar(&rows).unwrap();
        assert_eq!(summary.sum, 6.0);
        assert_eq!(summary.count, 3);
    }

    #[test]
    fn column_widths_fall_back_to_sheets_array() {
        let result = json!({"sheets": [{"name": "Sheet1", "column_widths": {"a": 12.5}}]});
        let widths = extract_column_widths(Some(&result), "Sheet1");
        assert_eq!(widths.get("A"), Some(&12.5));
    }

    #[test]
    fn merged_range_delta_rejects_malformed_refs() {
        let result = json!({"merged_range": "A1:B2", "unmerged_range": "nope"});
        let (adds, removes) = extract_merged_range_delta(Some(&result));
        assert_eq!(adds, vec!["A1:B2".to_string()]);
        assert!(removes.is_empty());
    }

    #[test]
    fn conditional_effects_dedup_and_cap() {
        let result = json!({"conditional_formatting": [
            {"range": "A1:A5", "type": "colorscale", "operator": "gt"},
            {"range": "A1:A5", "type": "colorscale", "operator": "gt"},
            {"range": "B1:B5", "type": "databar"},
        ]});
        let effects = extract_conditional_effects(Some(&result));
        assert_eq!(effects, vec!["A1:A5: color scale (colorscale/gt)".to_string(), "B1:B5: data bar (databar)".to_string()]);
    }
}
