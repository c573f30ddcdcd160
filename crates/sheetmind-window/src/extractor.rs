//! Pulls the handful of fields the manager needs (file path, sheet
//! name, directory, shape, preview rows, …) out of a tool call's
//! arguments and JSON result, trying several plausible key names in a
//! fixed order since different tools name the same concept differently.

use serde_json::Value;

/// Parse `text` as a JSON object or array; anything else (scalars,
/// invalid JSON, blank text) yields `None`.
#[must_use]
pub fn parse_json_payload(text: &str) -> Option<Value> {
    let content = text.trim();
    if content.is_empty() {
        return None;
    }
    let parsed: Value = serde_json::from_str(content).ok()?;
    matches!(parsed, Value::Object(_) | Value::Array(_)).then_some(parsed)
}

/// Normalise a path: trim, forward slashes, strip a leading `./`.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let mut normalized = path.trim().replace('\\', "/");
    while let Some(stripped) = normalized.strip_prefix("./") {
        normalized = stripped.to_string();
    }
    normalized
}

/// `true` if `path` ends in a recognised Excel file extension.
#[must_use]
pub fn is_excel_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower.ends_with(".xlsx") || lower.ends_with(".xlsm") || lower.ends_with(".xls")
}

fn arg_str<'a>(arguments: &'a Value, key: &str) -> Option<&'a str> {
    arguments.get(key).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
}

/// Extract the target file path from `arguments`, falling back to `result_json`.
#[must_use]
pub fn extract_file_path(arguments: &Value, result_json: Option<&Value>) -> String {
    const FILE_LIKE_KEYS: [&str; 5] = ["file_path", "source_file", "target_file", "fileAbsolutePath", "file"];
    for key in FILE_LIKE_KEYS {
        if let Some(raw) = arg_str(arguments, key) {
            let candidate = normalize_path(raw);
            if !candidate.is_empty() {
                return candidate;
            }
        }
    }
    if let Some(raw) = arg_str(arguments, "path") {
        let candidate = normalize_path(raw);
        if is_excel_path(&candidate) {
            return candidate;
        }
    }
    if let Some(result) = result_json {
        for key in ["file", "path"] {
            if let Some(raw) = arg_str(result, key) {
                let candidate = normalize_path(raw);
                if is_excel_path(&candidate) {
                    return candidate;
                }
            }
        }
    }
    String::new()
}

/// Extract the target sheet name from `arguments`, falling back to `result_json`.
#[must_use]
pub fn extract_sheet_name(arguments: &Value, result_json: Option<&Value>) -> String {
    for key in ["sheet_name", "source_sheet", "target_sheet", "sheet"] {
        if let Some(value) = arg_str(arguments, key) {
            return value.to_string();
        }
    }
    if let Some(result) = result_json {
        for key in ["sheet", "source_sheet", "new_sheet", "current_sheet"] {
            if let Some(value) = arg_str(result, key) {
                return value.to_string();
            }
        }
    }
    String::new()
}

/// Extract the full set of worksheet tab names from `result_json`.
#[must_use]
pub fn extract_sheet_tabs(result_json: Option<&Value>) -> Vec<String> {
    let Some(result) = result_json else { return Vec::new() };
    if let Some(items) = result.get("all_sheets").and_then(Value::as_array) {
        return items.iter().filter_map(value_as_trimmed_string).collect();
    }
    if let Some(items) = result.get("sheets").and_then(Value::as_array) {
        return items
            .iter()
            .filter_map(|item| {
                if let Some(obj) = item.as_object() {
                    obj.get("name").and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
                } else {
                    value_as_trimmed_string(item)
                }
            })
            .collect();
    }
    Vec::new()
}

fn value_as_trimmed_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// Extract `(rows, cols)` shape, checking a nested `shape` object first.
#[must_use]
pub fn extract_shape(result_json: Option<&Value>) -> (i64, i64) {
    let Some(result) = result_json else { return (0, 0) };
    if let Some(shape) = result.get("shape").and_then(Value::as_object) {
        let rows = shape.get("rows").and_then(Value::as_i64).unwrap_or(0);
        let cols = shape.get("columns").and_then(Value::as_i64).unwrap_or(0);
        if rows > 0 || cols > 0 {
            return (rows, cols);
        }
    }
    let rows = result.get("rows").and_then(Value::as_i64).unwrap_or(0);
    let cols = result.get("columns").and_then(Value::as_i64).unwrap_or(0);
    (rows.max(0), cols.max(0))
}

/// Extract up to 25 preview rows, checking `preview` then `data`.
#[must_use]
pub fn extract_preview_rows(result_json: Option<&Value>) -> Vec<Value> {
    let Some(result) = result_json else { return Vec::new() };
    for key in ["preview", "data"] {
        if let Some(rows) = result.get(key).and_then(Value::as_array) {
            return rows.iter().take(25).cloned().collect();
        }
    }
    Vec::new()
}

/// Extract the freeze-panes anchor string, if any.
#[must_use]
pub fn extract_freeze_panes(result_json: Option<&Value>) -> Option<String> {
    result_json.and_then(|r| r.get("freeze_panes")).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Build a short style summary from style-class/merge/conditional-format counts.
#[must_use]
pub fn extract_style_summary(result_json: Option<&Value>) -> String {
    let Some(result) = result_json else { return String::new() };
    let mut parts = Vec::new();
    if let Some(styles) = result.get("styles").and_then(Value::as_object) {
        if let Some(classes) = styles.get("style_classes").and_then(Value::as_object) {
            if !classes.is_empty() {
                parts.push(format!("{} style classes", classes.len()));
            }
        }
        if let Some(merged) = styles.get("merged_ranges").and_then(Value::as_array) {
            if !merged.is_empty() {
                parts.push(format!("{} merged regions", merged.len()));
            }
        }
    }
    if let Some(conditional) = result.get("conditional_formatting").and_then(Value::as_array) {
        if !conditional.is_empty() {
            parts.push(format!("{} conditional rules", conditional.len()));
        }
    }
    parts.join(" | ")
}

/// Extract the target directory for an explorer tool call.
#[must_use]
pub fn extract_directory(arguments: &Value, result_json: Option<&Value>) -> String {
    if let Some(raw) = arg_str(arguments, "directory") {
        let candidate = normalize_path(raw);
        if !candidate.is_empty() {
            return candidate;
        }
    }
    if let Some(raw) = result_json.and_then(|r| arg_str(r, "directory")) {
        let candidate = normalize_path(raw);
        if !candidate.is_empty() {
            return candidate;
        }
    }
    ".".to_string()
}

/// Render a short one-line-per-entry summary of an explorer result.
#[must_use]
pub fn extract_explorer_entries(result_json: Option<&Value>) -> Vec<String> {
    let Some(result) = result_json else { return Vec::new() };

    if let Some(files) = result.get("files").and_then(Value::as_array) {
        return files
            .iter()
            .take(12)
            .filter_map(Value::as_object)
            .filter_map(|item| {
                let file_name = item.get("file").and_then(Value::as_str).unwrap_or("").trim();
                if file_name.is_empty() {
                    return None;
                }
                let mut details = Vec::new();
                if let Some(size) = item.get("size").and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty()) {
                    details.push(size.to_string());
                }
                if let Some(modified) = item.get("modified").and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty()) {
                    details.push(modified.to_string());
                }
                if let Some(sheets) = item.get("sheets").and_then(Value::as_array) {
                    if !sheets.is_empty() {
                        details.push(format!("{} sheets", sheets.len()));
                    }
                }
                Some(if details.is_empty() { format!("[xlsx] {file_name}") } else { format!("[xlsx] {file_name} ({})", details.join(", ")) })
            })
            .collect();
    }

    if let Some(entries) = result.get("entries").and_then(Value::as_array) {
        return entries
            .iter()
            .take(20)
            .filter_map(Value::as_object)
            .filter_map(|item| {
                let name = item.get("name").and_then(Value::as_str).unwrap_or("").trim();
                if name.is_empty() {
                    return None;
                }
                let item_type = item.get("type").and_then(Value::as_str).unwrap_or("");
                let prefix = entry_prefix(name, item_type == "directory");
                let size = item.get("size").and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty());
                Some(size.map_or_else(|| format!("{prefix} {name}"), |s| format!("{prefix} {name} ({s})")))
            })
            .collect();
    }

    if let Some(matches) = result.get("matches").and_then(Value::as_array) {
        return matches
            .iter()
            .take(20)
            .filter_map(Value::as_object)
            .filter_map(|item| {
                let path = item.get("path").or_else(|| item.get("name")).and_then(Value::as_str).unwrap_or("").trim();
                if path.is_empty() {
                    return None;
                }
                let item_type = item.get("type").and_then(Value::as_str).unwrap_or("");
                Some(format!("{} {path}", entry_prefix(path, item_type == "directory")))
            })
            .collect();
    }

    Vec::new()
}

fn entry_prefix(name: &str, is_directory: bool) -> &'static str {
    if is_excel_path(name) {
        "[xlsx]"
    } else if is_directory {
        "[dir]"
    } else {
        "[file]"
    }
}

static RANGE_KEY_RE_CHARS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

fn looks_like_range(candidate: &str) -> bool {
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        return false;
    }
    let mut parts = trimmed.splitn(2, ':');
    let first = parts.next().unwrap_or("");
    let second = parts.next();
    is_cell_token(first) && second.is_none_or(is_cell_token)
}

fn is_cell_token(token: &str) -> bool {
    let mut chars = token.chars().peekable();
    let mut saw_letter = false;
    while chars.peek().is_some_and(|c| RANGE_KEY_RE_CHARS.contains(*c)) {
        chars.next();
        saw_letter = true;
    }
    if !saw_letter {
        return false;
    }
    let digits: String = chars.collect();
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Extract the viewport range from `arguments`, falling back to an
/// `A1:{default_cols}{default_rows}` default box.
#[must_use]
pub fn extract_range_ref(arguments: &Value, default_rows: i64, default_cols: i64) -> String {
    for key in ["range", "cell_range", "source_range"] {
        if let Some(value) = arg_str(arguments, key) {
            if looks_like_range(value) {
                return value.to_uppercase();
            }
        }
    }
    if let Some(cell) = arg_str(arguments, "cell") {
        if looks_like_range(cell) {
            let normalized = cell.to_uppercase();
            return if normalized.contains(':') { normalized } else { format!("{normalized}:{normalized}") };
        }
    }
    let end_col = crate::rangeref::column_index_to_letters(default_cols.max(1));
    format!("A1:{end_col}{}", default_rows.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_path_prefers_explicit_argument_key() {
        let args = json!({"file_path": "./reports/a.xlsx"});
        assert_eq!(extract_file_path(&args, None), "reports/a.xlsx");
    }

    #[test]
    fn file_path_falls_back_to_result_when_excel_like() {
        let args = json!({});
        let result = json!({"file": "b.xlsx"});
        assert_eq!(extract_file_path(&args, Some(&result)), "b.xlsx");
    }

    #[test]
    fn range_ref_defaults_to_a1_box_when_nothing_matches() {
        let args = json!({});
        assert_eq!(extract_range_ref(&args, 25, 20), "A1:T25");
    }

    #[test]
    fn range_ref_uses_explicit_cell_and_expands_to_a_range() {
        let args = json!({"cell": "b2"});
        assert_eq!(extract_range_ref(&args, 25, 20), "B2:B2");
    }

    #[test]
    fn explorer_entries_prefix_excel_files_distinctly() {
        let result = json!({"entries": [{"name": "a.xlsx", "type": "file"}, {"name": "sub", "type": "directory"}]});
        let entries = extract_explorer_entries(Some(&result));
        assert_eq!(entries[0], "[xlsx] a.xlsx");
        assert_eq!(entries[1], "[dir] sub");
    }
}
