//! Deltas: the only way window state is mutated. Each delta carries a
//! `kind` that must match its target window's kind, and is applied
//! through [`apply_delta`], which also appends the delta to the
//! window's audit trail before dispatching the kind-specific mutation.
//!
//! Generic field set/append targets the metadata bag rather than
//! arbitrary struct fields — Rust has no `setattr` equivalent, and the
//! metadata bag is exactly the set of fields the renderer reads out of
//! dynamically in the first place (scroll position, status bar, column
//! widths, merged ranges, conditional effects, explorer entries).

use serde_json::Value;

use crate::domain::Window;
use crate::error::DeltaReject;
use crate::models::{DetailLevel, IntentTag, WindowType};

/// Explorer-specific mutation: update the listed directory.
#[derive(Debug, Clone)]
pub struct ExplorerDelta {
    /// New directory, if changed.
    pub directory: Option<String>,
}

/// A successful sheet read: merges into the cache via the ingest
/// pipeline, then updates shape/summary.
#[derive(Debug, Clone)]
pub struct SheetReadDelta {
    /// The range that was read.
    pub range_ref: String,
    /// Rows observed in this read.
    pub rows: i64,
    /// Columns observed in this read.
    pub cols: i64,
    /// Optional human-readable change summary.
    pub change_summary: Option<String>,
}

/// A successful sheet write.
#[derive(Debug, Clone)]
pub struct SheetWriteDelta {
    /// The range the write targeted.
    pub target_range: Option<String>,
    /// Optional human-readable change summary.
    pub change_summary: Option<String>,
}

/// A successful filter application.
#[derive(Debug, Clone)]
pub struct SheetFilterDelta {
    /// Opaque filter-state payload.
    pub filter_state: Option<Value>,
    /// Row count after filtering, for the auto-generated summary.
    pub filtered_rows: i64,
}

/// A style-affecting operation (freeze panes, widths, merges, …).
#[derive(Debug, Clone, Default)]
pub struct SheetStyleDelta {
    /// Human-readable style summary.
    pub style_summary: Option<String>,
    /// New freeze-pane anchor.
    pub freeze_panes: Option<String>,
    /// New column widths, replacing the existing map if present.
    pub column_widths: Option<Value>,
    /// New row heights, replacing the existing map if present.
    pub row_heights: Option<Value>,
    /// New merged-range list, replacing the existing one if present.
    pub merged_ranges: Option<Vec<String>>,
    /// New conditional-format effect descriptions.
    pub conditional_effects: Option<Vec<String>>,
}

/// A focus-service action on a sheet window.
#[derive(Debug, Clone)]
pub struct SheetFocusDelta {
    /// The focus action applied (`"restore"`, `"scroll"`, …).
    pub action: String,
    /// New detail level, if the action changes it.
    pub detail_level: Option<DetailLevel>,
    /// New active-flag value, if the action changes it.
    pub is_active: Option<bool>,
}

/// A lifecycle-tier update (from the advisor/budget allocator).
#[derive(Debug, Clone, Default)]
pub struct LifecycleDelta {
    /// New detail level.
    pub detail_level: Option<DetailLevel>,
    /// New idle-turn count.
    pub idle_turns: Option<i64>,
    /// New last-access sequence value.
    pub last_access_seq: Option<i64>,
    /// New dormancy flag.
    pub dormant: Option<bool>,
}

/// An intent-resolution update.
#[derive(Debug, Clone, Default)]
pub struct IntentDelta {
    /// New intent tag.
    pub tag: Option<IntentTag>,
    /// New confidence.
    pub confidence: Option<f64>,
    /// New source label.
    pub source: Option<String>,
    /// Turn this update happened on.
    pub updated_turn: Option<i64>,
    /// New sticky-lock expiry turn.
    pub lock_until_turn: Option<i64>,
}

/// Generic metadata-bag field set.
#[derive(Debug, Clone)]
pub struct FieldSetDelta {
    /// Metadata key to set.
    pub field: String,
    /// New value.
    pub value: Value,
}

/// Generic metadata-bag field append: the target must already be a
/// JSON array, or absent (treated as an empty array).
#[derive(Debug, Clone)]
pub struct FieldAppendDelta {
    /// Metadata key to append to.
    pub field: String,
    /// Value to append.
    pub value: Value,
}

/// The body of a window delta, kind-tagged by the variant itself.
#[derive(Debug, Clone)]
pub enum DeltaBody {
    /// See [`ExplorerDelta`].
    Explorer(ExplorerDelta),
    /// See [`SheetReadDelta`].
    SheetRead(SheetReadDelta),
    /// See [`SheetWriteDelta`].
    SheetWrite(SheetWriteDelta),
    /// See [`SheetFilterDelta`].
    SheetFilter(SheetFilterDelta),
    /// See [`SheetStyleDelta`].
    SheetStyle(SheetStyleDelta),
    /// See [`SheetFocusDelta`].
    SheetFocus(SheetFocusDelta),
    /// See [`LifecycleDelta`]. Kind-agnostic.
    Lifecycle(LifecycleDelta),
    /// See [`IntentDelta`]. Kind-agnostic.
    Intent(IntentDelta),
    /// See [`FieldSetDelta`]. Kind-agnostic.
    FieldSet(FieldSetDelta),
    /// See [`FieldAppendDelta`]. Kind-agnostic.
    FieldAppend(FieldAppendDelta),
}

/// A single mutation, scoped to a target window kind.
#[derive(Debug, Clone)]
pub struct WindowDelta {
    /// The window kind this delta expects its target to have. Kind-agnostic
    /// bodies (`Lifecycle`, `Intent`, `FieldSet`, `FieldAppend`) still carry
    /// the kind of the window they were built against, so `apply_delta`'s
    /// kind check stays uniform across every delta.
    pub kind: WindowType,
    /// The mutation to apply.
    pub body: DeltaBody,
}

/// Apply `delta` to `window` in place: kind-check, audit append, then
/// the kind-specific (or kind-agnostic) mutation.
///
/// # Errors
///
/// Returns [`DeltaReject`] if `window.kind() != delta.kind`, or if a
/// [`FieldAppendDelta`] targets a metadata value that isn't a JSON array.
pub fn apply_delta(window: &mut Window, delta: &WindowDelta) -> Result<(), DeltaReject> {
    if window.kind() != delta.kind {
        return Err(DeltaReject(format!("kind mismatch: window={:?} delta={:?}", window.kind(), delta.kind)));
    }

    append_audit(window, delta);

    match &delta.body {
        DeltaBody::Explorer(d) => {
            if let (Window::Explorer(w), Some(directory)) = (&mut *window, &d.directory) {
                w.data.directory = directory.clone();
            }
        },
        DeltaBody::SheetRead(d) => {
            if let Some(w) = window.as_sheet_mut() {
                w.data.focus.viewport_range = d.range_ref.clone();
                w.data.total_rows = w.data.total_rows.max(d.rows);
                w.data.total_cols = w.data.total_cols.max(d.cols);
                if let Some(summary) = &d.change_summary {
                    w.common.summary = summary.clone();
                }
            }
        },
        DeltaBody::SheetWrite(d) => {
            if let Some(w) = window.as_sheet_mut() {
                if let Some(summary) = &d.change_summary {
                    w.common.summary = summary.clone();
                }
                if let Some(target) = &d.target_range {
                    if !target.is_empty() {
                        w.data.focus.viewport_range = target.clone();
                    }
                }
            }
        },
        DeltaBody::SheetFilter(d) => {
            if let Some(w) = window.as_sheet_mut() {
                w.data.filter.state = d.filter_state.clone();
                if d.filtered_rows > 0 {
                    w.common.summary = format!("filter result: {} rows", d.filtered_rows);
                }
            }
        },
        DeltaBody::SheetStyle(d) => {
            if let Some(w) = window.as_sheet_mut() {
                if let Some(summary) = &d.style_summary {
                    w.data.style.summary = summary.clone();
                }
                if let Some(freeze) = &d.freeze_panes {
                    w.data.style.freeze_panes = Some(freeze.clone());
                }
                if let Some(Value::Object(map)) = &d.column_widths {
                    w.data.style.column_widths = map.clone().into_iter().collect();
                }
                if let Some(Value::Object(map)) = &d.row_heights {
                    w.data.style.row_heights = map.clone().into_iter().collect();
                }
                if let Some(ranges) = &d.merged_ranges {
                    w.data.style.merged_ranges = ranges.clone();
                }
                if let Some(effects) = &d.conditional_effects {
                    w.data.style.conditional_effects = effects.clone();
                }
            }
        },
        DeltaBody::SheetFocus(d) => {
            if let Some(w) = window.as_sheet_mut() {
                w.common.focus.last_action = d.action.clone();
                if let Some(level) = d.detail_level {
                    w.common.lifecycle.detail_level = level;
                }
                if let Some(active) = d.is_active {
                    w.common.focus.is_active = active;
                }
            }
        },
        DeltaBody::Lifecycle(d) => {
            let common = window.common_mut();
            if let Some(level) = d.detail_level {
                common.lifecycle.detail_level = level;
            }
            if let Some(idle) = d.idle_turns {
                common.lifecycle.idle_turns = idle;
            }
            if let Some(seq) = d.last_access_seq {
                common.lifecycle.last_access_seq = seq;
            }
            if let Some(dormant) = d.dormant {
                common.lifecycle.dormant = dormant;
            }
        },
        DeltaBody::Intent(d) => {
            let common = window.common_mut();
            if let Some(tag) = d.tag {
                common.intent.tag = tag;
            }
            if let Some(confidence) = d.confidence {
                common.intent.confidence = confidence;
            }
            if let Some(source) = &d.source {
                common.intent.source = source.clone();
            }
            if let Some(turn) = d.updated_turn {
                common.intent.updated_turn = turn;
            }
            if let Some(turn) = d.lock_until_turn {
                common.intent.lock_until_turn = turn;
            }
        },
        DeltaBody::FieldSet(d) => {
            window.common_mut().metadata.insert(d.field.clone(), d.value.clone());
        },
        DeltaBody::FieldAppend(d) => {
            let common = window.common_mut();
            let entry = common.metadata.entry(d.field.clone()).or_insert_with(|| Value::Array(Vec::new()));
            match entry {
                Value::Array(arr) => arr.push(d.value.clone()),
                _ => return Err(DeltaReject(format!("append target not list-like: {}", d.field))),
            }
        },
    }
    Ok(())
}

fn append_audit(window: &mut Window, delta: &WindowDelta) {
    let payload = serde_json::json!({
        "kind": delta.kind.as_str(),
        "delta_type": delta_type_name(&delta.body),
    });
    window.common_mut().audit.delta_audit.push(payload);
}

fn delta_type_name(body: &DeltaBody) -> &'static str {
    match body {
        DeltaBody::Explorer(_) => "ExplorerDelta",
        DeltaBody::SheetRead(_) => "SheetReadDelta",
        DeltaBody::SheetWrite(_) => "SheetWriteDelta",
        DeltaBody::SheetFilter(_) => "SheetFilterDelta",
        DeltaBody::SheetStyle(_) => "SheetStyleDelta",
        DeltaBody::SheetFocus(_) => "SheetFocusDelta",
        DeltaBody::Lifecycle(_) => "LifecycleDelta",
        DeltaBody::Intent(_) => "IntentDelta",
        DeltaBody::FieldSet(_) => "FieldSetDelta",
        DeltaBody::FieldAppend(_) => "FieldAppendDelta",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SheetWindow;

    #[test]
    fn kind_mismatch_is_rejected() {
        let mut window = Window::Explorer(crate::domain::ExplorerWindow::new("w1", "t", "/tmp"));
        let delta = WindowDelta { kind: WindowType::Sheet, body: DeltaBody::SheetRead(SheetReadDelta { range_ref: "A1:B2".into(), rows: 2, cols: 2, change_summary: None }) };
        let err = apply_delta(&mut window, &delta).unwrap_err();
        assert!(err.0.contains("kind mismatch"));
    }

    #[test]
    fn sheet_read_delta_updates_shape_and_appends_audit() {
        let mut window = Window::Sheet(SheetWindow::new("w1", "t", "/a.xlsx", "Sheet1"));
        let delta = WindowDelta {
            kind: WindowType::Sheet,
            body: DeltaBody::SheetRead(SheetReadDelta { range_ref: "A1:B10".into(), rows: 10, cols: 2, change_summary: Some("read".into()) }),
        };
        apply_delta(&mut window, &delta).unwrap();
        let sheet = window.as_sheet().unwrap();
        assert_eq!(sheet.total_rows(), 10);
        assert_eq!(sheet.total_cols(), 2);
        assert_eq!(window.common().audit.delta_audit.len(), 1);
    }

    #[test]
    fn field_append_requires_array_target() {
        let mut window = Window::Sheet(SheetWindow::new("w1", "t", "/a.xlsx", "Sheet1"));
        window.common_mut().metadata.insert("note".to_string(), Value::String("x".into()));
        let delta = WindowDelta { kind: WindowType::Sheet, body: DeltaBody::FieldAppend(FieldAppendDelta { field: "note".into(), value: Value::String("y".into()) }) };
        assert!(apply_delta(&mut window, &delta).is_err());
    }

    #[test]
    fn field_append_creates_array_when_absent() {
        let mut window = Window::Sheet(SheetWindow::new("w1", "t", "/a.xlsx", "Sheet1"));
        let delta = WindowDelta { kind: WindowType::Sheet, body: DeltaBody::FieldAppend(FieldAppendDelta { field: "tags".into(), value: Value::String("y".into()) }) };
        apply_delta(&mut window, &delta).unwrap();
        assert_eq!(window.common().metadata["tags"], serde_json::json!(["y"]));
    }
}
