//! Read/write/filter ingest: merges tool results into a sheet window's
//! cache, keeping `cached_ranges` a disjoint set of geometrically
//! connected blocks and `data_buffer` a flattened view over them.

use serde_json::Value;

use crate::domain::SheetWindow;
use crate::models::{CachedRange, ChangeRecord, ColumnDef};
use crate::rangeref::{self, parse_range};

/// Extract row-level data from a tool result, checking `data`,
/// `preview`, then `preview_after` in order, whichever yields rows first.
#[must_use]
pub fn extract_data_rows(result_json: Option<&Value>) -> Vec<Value> {
    let Some(Value::Object(map)) = result_json else { return Vec::new() };
    for key in ["data", "preview", "preview_after"] {
        let rows = normalize_rows(map.get(key));
        if !rows.is_empty() {
            return rows;
        }
    }
    Vec::new()
}

/// Extract and type-infer column definitions: an explicit `columns`
/// list if present, else the keys of the first row.
#[must_use]
pub fn extract_columns(result_json: Option<&Value>, rows: &[Value]) -> Vec<ColumnDef> {
    let explicit: Vec<String> = result_json
        .and_then(|v| v.as_object())
        .and_then(|m| m.get("columns"))
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).filter(|s| !s.trim().is_empty()).collect())
        .unwrap_or_default();

    let names: Vec<String> = if !explicit.is_empty() {
        explicit
    } else if let Some(Value::Object(first)) = rows.first() {
        first.keys().cloned().collect()
    } else {
        Vec::new()
    };

    names
        .into_iter()
        .map(|name| {
            let sample: Vec<&Value> = rows.iter().take(50).filter_map(|r| r.as_object()).filter_map(|m| m.get(&name)).collect();
            let inferred_type = infer_type(&sample);
            ColumnDef { name, inferred_type }
        })
        .collect()
}

/// Merge a read result into `window`'s cache, coalescing it with any
/// geometrically connected existing blocks, and return the absolute
/// `data_buffer` indices the new rows landed at.
pub fn ingest_read_result(window: &mut SheetWindow, new_range: &str, new_rows: &[Value], iteration: i64) -> Vec<usize> {
    let new_range = if new_range.is_empty() { window.viewport_range().to_string() } else { new_range.to_string() };
    let new_range = if new_range.is_empty() { "A1:A1".to_string() } else { new_range };

    let to_merge = collect_merge_indices(&window.data.cache.cached_ranges, &new_range);
    if to_merge.is_empty() {
        for cached in &mut window.data.cache.cached_ranges {
            cached.is_current_viewport = false;
        }
        window.data.cache.cached_ranges.push(CachedRange { range_ref: new_range.clone(), rows: new_rows.to_vec(), is_current_viewport: true, added_at_iteration: iteration });
    } else {
        let mut merged_range = new_range.clone();
        let mut merged_rows = new_rows.to_vec();
        let mut sorted_merge: Vec<usize> = to_merge.iter().copied().collect();
        sorted_merge.sort_unstable();
        for idx in &sorted_merge {
            let cached = &window.data.cache.cached_ranges[*idx];
            merged_range = rangeref::union_range(&merged_range, &cached.range_ref);
            merged_rows = deduplicated_merge(&cached.rows, &merged_rows, &cached.range_ref, &merged_range);
        }
        let mut idx = 0;
        window.data.cache.cached_ranges.retain(|_| {
            let keep = !to_merge.contains(&idx);
            idx += 1;
            keep
        });
        for cached in &mut window.data.cache.cached_ranges {
            cached.is_current_viewport = false;
        }
        window.data.cache.cached_ranges.push(CachedRange { range_ref: merged_range, rows: merged_rows, is_current_viewport: true, added_at_iteration: iteration });
    }

    trim_cached_ranges(window);
    window.data.focus.viewport_range = new_range;
    rebuild_data_buffer(window);
    window.data.cache.stale_hint = None;
    window.common.lifecycle.detail_level = crate::models::DetailLevel::Full;
    window.common.lifecycle.idle_turns = 0;

    if new_rows.is_empty() {
        return Vec::new();
    }
    let start = window.data.cache.data_buffer.len().saturating_sub(new_rows.len());
    (start..window.data.cache.data_buffer.len()).collect()
}

/// Apply a write result: patch cached rows in place when the target
/// range maps onto a cached block, else mark the viewport stale.
pub fn ingest_write_result(window: &mut SheetWindow, target_range: &str, result_json: Option<&Value>, iteration: i64) -> Vec<usize> {
    let preview_after = result_json.and_then(|v| v.as_object()).and_then(|m| m.get("preview_after"));
    let matrix = to_matrix(preview_after);
    let column_defs = if window.data.schema.columns.is_empty() { window.data.schema.schema.clone() } else { window.data.schema.columns.clone() };

    let updated_rows = if !matrix.is_empty() && !column_defs.is_empty() { apply_preview_patch(window, target_range, &matrix, &column_defs) } else { Vec::new() };

    if !updated_rows.is_empty() {
        window.data.cache.stale_hint = None;
    } else {
        let hint_range = if !target_range.is_empty() { target_range } else if !window.viewport_range().is_empty() { window.viewport_range() } else { "current viewport" };
        window.data.cache.stale_hint = Some(format!("{hint_range} was modified; formula values depending on it may be stale"));
    }
    window.common.lifecycle.detail_level = crate::models::DetailLevel::Full;
    window.common.audit.current_iteration = iteration;
    updated_rows
}

/// Apply a filter result: snapshot the pre-filter buffer (once), then
/// replace the cache with exactly the filtered rows.
pub fn ingest_filter_result(window: &mut SheetWindow, filter_condition: Value, filtered_rows: &[Value], iteration: i64) -> Vec<usize> {
    if window.data.cache.unfiltered_buffer.is_none() {
        window.data.cache.unfiltered_buffer = Some(window.data.cache.data_buffer.clone());
    }
    window.data.cache.data_buffer = filtered_rows.to_vec();
    window.data.filter.state = Some(filter_condition);
    let viewport_range = if window.viewport_range().is_empty() { "A1:A1".to_string() } else { window.viewport_range().to_string() };
    window.data.cache.cached_ranges = vec![CachedRange { range_ref: viewport_range, rows: filtered_rows.to_vec(), is_current_viewport: true, added_at_iteration: iteration }];
    window.common.lifecycle.detail_level = crate::models::DetailLevel::Full;
    window.common.audit.current_iteration = iteration;
    (0..filtered_rows.len()).collect()
}

/// Geometry-first, primary-key-fallback row merge.
#[must_use]
pub fn deduplicated_merge(existing_rows: &[Value], incoming_rows: &[Value], existing_range: &str, incoming_range: &str) -> Vec<Value> {
    if let Some(merged) = merge_rows_by_geometry(existing_rows, existing_range, incoming_rows, incoming_range) {
        return merged;
    }
    merge_rows_by_primary_key(existing_rows, incoming_rows)
}

/// Build a [`ChangeRecord`] from its constituent fields.
#[must_use]
pub fn make_change_record(operation: &str, tool_summary: &str, affected_range: &str, change_type: &str, iteration: i64, affected_row_indices: Vec<i64>) -> ChangeRecord {
    ChangeRecord {
        operation: operation.to_string(),
        tool_summary: tool_summary.to_string(),
        affected_range: affected_range.to_string(),
        change_type: change_type.to_string(),
        iteration,
        affected_row_indices,
    }
}

fn normalize_rows(value: Option<&Value>) -> Vec<Value> {
    let Some(Value::Array(items)) = value else { return Vec::new() };
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::Object(_) => item.clone(),
            Value::Array(cells) => {
                let mut map = serde_json::Map::new();
                for (col_idx, cell) in cells.iter().enumerate() {
                    map.insert(format!("col_{}", col_idx + 1), cell.clone());
                }
                Value::Object(map)
            },
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other.clone());
                map.insert("_idx".to_string(), Value::from(idx));
                Value::Object(map)
            },
        })
        .collect()
}

fn infer_type(values: &[&Value]) -> String {
    for value in values {
        match value {
            Value::Null => continue,
            Value::Bool(_) => return "text".to_string(),
            Value::Number(_) => return "number".to_string(),
            other => {
                let text = other.as_str().map_or_else(|| other.to_string(), str::to_string);
                return if text.contains('-') && text.len() >= 8 { "date".to_string() } else { "text".to_string() };
            },
        }
    }
    "unknown".to_string()
}

fn trim_cached_ranges(window: &mut SheetWindow) {
    let max_rows = window.data.cache.max_cached_rows.max(1);
    loop {
        let total_rows: usize = window.data.cache.cached_ranges.iter().map(|c| c.rows.len()).sum();
        if total_rows <= max_rows {
            break;
        }
        let oldest_idx = window
            .data
            .cache
            .cached_ranges
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_current_viewport)
            .min_by_key(|(_, c)| c.added_at_iteration)
            .map(|(idx, _)| idx);
        match oldest_idx {
            Some(idx) => {
                window.data.cache.cached_ranges.remove(idx);
            },
            None => break,
        }
    }
}

fn rebuild_data_buffer(window: &mut SheetWindow) {
    window.data.cache.data_buffer = window.data.cache.cached_ranges.iter().flat_map(|c| c.rows.clone()).collect();
}

fn to_matrix(value: Option<&Value>) -> Vec<Vec<Value>> {
    let Some(Value::Array(rows)) = value else { return Vec::new() };
    if rows.is_empty() {
        return Vec::new();
    }
    rows.iter().map(|row| if let Value::Array(cells) = row { cells.clone() } else { vec![row.clone()] }).collect()
}

fn apply_preview_patch(window: &mut SheetWindow, target_range: &str, matrix: &[Vec<Value>], column_defs: &[ColumnDef]) -> Vec<usize> {
    if column_defs.is_empty() {
        return Vec::new();
    }
    let column_names: Vec<&str> = column_defs.iter().map(|c| c.name.as_str()).collect();
    let mut patched_any = false;

    for cached in &mut window.data.cache.cached_ranges {
        if patch_matrix_to_cached_range(cached, target_range, matrix, &column_names) {
            patched_any = true;
        }
    }

    if patched_any {
        rebuild_data_buffer(window);
        return (0..window.data.cache.data_buffer.len()).collect();
    }

    let (Some(target), Some(viewport)) = (parse_range(target_range), parse_range(if window.viewport_range().is_empty() { target_range } else { window.viewport_range() })) else {
        return Vec::new();
    };
    if window.data.cache.data_buffer.is_empty() {
        return Vec::new();
    }

    let row_base = target.min_row - viewport.min_row;
    let col_base = target.min_col - viewport.min_col;
    let mut updated = Vec::new();
    for (r_idx, row_vals) in matrix.iter().enumerate() {
        let buffer_index = row_base + r_idx as i64;
        if buffer_index < 0 || buffer_index as usize >= window.data.cache.data_buffer.len() {
            continue;
        }
        let Some(row_obj) = window.data.cache.data_buffer[buffer_index as usize].as_object_mut() else { continue };
        for (c_idx, value) in row_vals.iter().enumerate() {
            let col_index = col_base + c_idx as i64;
            if col_index < 0 || col_index as usize >= column_names.len() {
                continue;
            }
            row_obj.insert(column_names[col_index as usize].to_string(), value.clone());
        }
        updated.push(buffer_index as usize);
    }
    updated
}

fn patch_matrix_to_cached_range(cached: &mut CachedRange, target_range: &str, matrix: &[Vec<Value>], column_names: &[&str]) -> bool {
    let (Some(target), Some(bounds)) = (parse_range(target_range), parse_range(&cached.range_ref)) else { return false };
    if column_names.is_empty() || cached.rows.is_empty() {
        return false;
    }

    let mut touched = false;
    for (r_idx, row_vals) in matrix.iter().enumerate() {
        let abs_row = target.min_row + r_idx as i64;
        if abs_row < bounds.min_row || abs_row > bounds.max_row {
            continue;
        }
        let cached_row_idx = (abs_row - bounds.min_row) as usize;
        if cached_row_idx >= cached.rows.len() {
            continue;
        }
        let Some(row_obj) = cached.rows[cached_row_idx].as_object_mut() else { continue };
        for (c_idx, value) in row_vals.iter().enumerate() {
            let abs_col = target.min_col + c_idx as i64;
            if abs_col < bounds.min_col || abs_col > bounds.max_col {
                continue;
            }
            let col_index = (abs_col - bounds.min_col) as usize;
            if col_index >= column_names.len() {
                continue;
            }
            row_obj.insert(column_names[col_index].to_string(), value.clone());
            touched = true;
        }
    }
    touched
}

fn collect_merge_indices(cached_ranges: &[CachedRange], new_range: &str) -> std::collections::HashSet<usize> {
    let mut merged = std::collections::HashSet::new();
    let mut current_union = new_range.to_string();
    let mut changed = true;
    while changed {
        changed = false;
        for (idx, cached) in cached_ranges.iter().enumerate() {
            if merged.contains(&idx) {
                continue;
            }
            if rangeref::is_adjacent_or_overlapping(&cached.range_ref, &current_union) {
                merged.insert(idx);
                current_union = rangeref::union_range(&current_union, &cached.range_ref);
                changed = true;
            }
        }
    }
    merged
}

fn merge_rows_by_geometry(existing_rows: &[Value], existing_range: &str, incoming_rows: &[Value], incoming_range: &str) -> Option<Vec<Value>> {
    if existing_range.is_empty() || incoming_range.is_empty() {
        return None;
    }
    let existing_bounds = parse_range(existing_range)?;
    let incoming_bounds = parse_range(incoming_range)?;

    let mut merged_by_row: std::collections::BTreeMap<i64, serde_json::Map<String, Value>> = std::collections::BTreeMap::new();
    for (idx, row) in existing_rows.iter().enumerate() {
        let row_no = existing_bounds.min_row + idx as i64;
        if let Some(obj) = row.as_object() {
            merged_by_row.insert(row_no, obj.clone());
        }
    }
    for (idx, row) in incoming_rows.iter().enumerate() {
        let row_no = incoming_bounds.min_row + idx as i64;
        let Some(obj) = row.as_object() else { continue };
        merged_by_row.entry(row_no).or_default().extend(obj.clone());
    }
    Some(merged_by_row.into_values().map(Value::Object).collect())
}

fn merge_rows_by_primary_key(existing_rows: &[Value], incoming_rows: &[Value]) -> Vec<Value> {
    if existing_rows.is_empty() {
        return incoming_rows.to_vec();
    }
    if incoming_rows.is_empty() {
        return existing_rows.to_vec();
    }

    let key_name = detect_primary_key(existing_rows, incoming_rows);
    let Some(key_name) = key_name else {
        return existing_rows.iter().chain(incoming_rows.iter()).cloned().collect();
    };

    let mut merged: indexmap_like::OrderedMap = indexmap_like::OrderedMap::new();
    let mut keyless = Vec::new();
    for row in existing_rows.iter().chain(incoming_rows.iter()) {
        let Some(obj) = row.as_object() else { continue };
        let raw_key = obj.get(&key_name);
        let key = match raw_key {
            Some(Value::Null) | None => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        if key.is_empty() {
            keyless.push(Value::Object(obj.clone()));
        } else {
            merged.upsert(key, obj.clone());
        }
    }
    merged.into_values().map(Value::Object).chain(keyless).collect()
}

fn detect_primary_key(existing_rows: &[Value], incoming_rows: &[Value]) -> Option<String> {
    const CANDIDATES: [&str; 4] = ["id", "ID", "Id", "row_id"];
    let existing_keys: std::collections::HashSet<&str> = existing_rows.iter().filter_map(|r| r.as_object()).flat_map(|m| m.keys().map(String::as_str)).collect();
    let incoming_keys: std::collections::HashSet<&str> = incoming_rows.iter().filter_map(|r| r.as_object()).flat_map(|m| m.keys().map(String::as_str)).collect();
    CANDIDATES.into_iter().find(|c| existing_keys.contains(c) && incoming_keys.contains(c)).map(str::to_string)
}

/// A tiny insertion-ordered string-keyed map, enough for primary-key
/// merge bookkeeping without pulling in the `indexmap` crate for one
/// call site.
mod indexmap_like {
    use serde_json::Map;

    #[derive(Default)]
    pub struct OrderedMap {
        order: Vec<String>,
        values: std::collections::HashMap<String, Map<String, serde_json::Value>>,
    }

    impl OrderedMap {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn upsert(&mut self, key: String, value: Map<String, serde_json::Value>) {
            match self.values.get_mut(&key) {
                Some(existing) => existing.extend(value),
                None => {
                    self.order.push(key.clone());
                    self.values.insert(key, value);
                },
            }
        }

        pub fn into_values(self) -> impl Iterator<Item = Map<String, serde_json::Value>> {
            let OrderedMap { order, mut values } = self;
            order.into_iter().filter_map(move |key| values.remove(&key))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SheetWindow;
    use serde_json::json;

    fn window() -> SheetWindow {
        SheetWindow::new("w1", "t", "/a.xlsx", "Sheet1")
    }

    #[test]
    fn read_ingest_creates_a_new_cached_block() {
        let mut w = window();
        let rows = vec![json!({"a": 1}), json!({"a": 2})];
        let touched = ingest_read_result(&mut w, "A1:A2", &rows, 1);
        assert_eq!(touched, vec![0, 1]);
        assert_eq!(w.data.cache.cached_ranges.len(), 1);
        assert_eq!(w.data.cache.data_buffer.len(), 2);
    }

    #[test]
    fn adjacent_reads_merge_into_one_block() {
        let mut w = window();
        ingest_read_result(&mut w, "A1:A2", &[json!({"a": 1}), json!({"a": 2})], 1);
        ingest_read_result(&mut w, "A3:A4", &[json!({"a": 3}), json!({"a": 4})], 2);
        assert_eq!(w.data.cache.cached_ranges.len(), 1);
        assert_eq!(w.data.cache.cached_ranges[0].range_ref, "A1:A4");
        assert_eq!(w.data.cache.data_buffer.len(), 4);
    }

    #[test]
    fn disjoint_reads_keep_separate_blocks() {
        let mut w = window();
        ingest_read_result(&mut w, "A1:A2", &[json!({"a": 1})], 1);
        ingest_read_result(&mut w, "D10:D11", &[json!({"a": 2})], 2);
        assert_eq!(w.data.cache.cached_ranges.len(), 2);
    }

    #[test]
    fn filter_snapshots_unfiltered_buffer_once() {
        let mut w = window();
        ingest_read_result(&mut w, "A1:A3", &[json!({"a": 1}), json!({"a": 2}), json!({"a": 3})], 1);
        ingest_filter_result(&mut w, json!({"col": "a"}), &[json!({"a": 2})], 2);
        assert_eq!(w.data.cache.unfiltered_buffer.as_ref().unwrap().len(), 3);
        assert_eq!(w.data.cache.data_buffer.len(), 1);
    }

    #[test]
    fn write_without_matching_preview_sets_stale_hint() {
        let mut w = window();
        ingest_write_result(&mut w, "A1:A2", None, 1);
        assert!(w.data.cache.stale_hint.is_some());
    }

    #[test]
    fn write_patches_cached_rows_in_place() {
        let mut w = window();
        ingest_read_result(&mut w, "A1:B2", &[json!({"Name": "x", "Age": 1}), json!({"Name": "y", "Age": 2})], 1);
        w.data.schema.columns = vec![ColumnDef { name: "Name".into(), inferred_type: "text".into() }, ColumnDef { name: "Age".into(), inferred_type: "number".into() }];
        let result = json!({"preview_after": [["z", 99]]});
        let touched = ingest_write_result(&mut w, "A1:B1", Some(&result), 2);
        assert!(!touched.is_empty());
        assert!(w.data.cache.stale_hint.is_none());
        assert_eq!(w.data.cache.cached_ranges[0].rows[0]["Name"], json!("z"));
    }
}
