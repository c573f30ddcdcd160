//! Window domain model: sum-typed over `{ExplorerWindow, SheetWindow}`,
//! sharing cross-cutting lifecycle/intent/audit/focus state, each with
//! its own kind-specific data container.
//!
//! All mutation happens through [`crate::delta::apply_delta`], never by
//! writing these fields directly from outside this module's tests.

use std::collections::HashMap;

use serde_json::Value;

use crate::models::{CachedRange, ColumnDef, DetailLevel, IntentTag, OpEntry, Viewport, WindowType};

/// Cross-cutting lifecycle state, common to every window kind.
#[derive(Debug, Clone)]
pub struct LifecycleState {
    /// How this window renders this turn.
    pub detail_level: DetailLevel,
    /// Turns since this window was last the active one.
    pub idle_turns: i64,
    /// Global access counter value at last touch.
    pub last_access_seq: i64,
    /// Whether this window has been suspended to minimal state.
    pub dormant: bool,
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self { detail_level: DetailLevel::Full, idle_turns: 0, last_access_seq: 0, dormant: false }
    }
}

/// Cross-cutting intent state, common to every window kind.
#[derive(Debug, Clone, Default)]
pub struct IntentState {
    /// Current classified intent.
    pub tag: IntentTag,
    /// Confidence in `tag`, in `[0.0, 1.0]`.
    pub confidence: f64,
    /// What produced `tag`: `"user"`, `"tool"`, `"sticky"`, or `"default"`.
    pub source: String,
    /// Turn number `tag` was last updated.
    pub updated_turn: i64,
    /// Sticky lock: `tag` won't change before this turn unless a
    /// force-switch user rule applies.
    pub lock_until_turn: i64,
}

/// Cross-cutting audit state: bounded ring buffers plus the delta log.
#[derive(Debug, Clone, Default)]
pub struct AuditState {
    /// Recent operations, newest last, capped at `max_history_entries`.
    pub operation_history: Vec<OpEntry>,
    /// Cap for `operation_history`.
    pub max_history_entries: usize,
    /// Recent changes, newest last, capped at `max_change_records`.
    pub change_log: Vec<ChangeRecordEntry>,
    /// Cap for `change_log`.
    pub max_change_records: usize,
    /// Monotonic operation counter for this window.
    pub current_iteration: i64,
    /// Every applied delta, serialised, for debugging/inspection.
    pub delta_audit: Vec<Value>,
}

/// Re-exported under a distinct name to avoid clashing with
/// [`crate::models::ChangeRecord`] import ambiguity at call sites.
pub type ChangeRecordEntry = crate::models::ChangeRecord;

impl AuditState {
    fn new() -> Self {
        Self { max_history_entries: 20, max_change_records: 5, ..Self::default() }
    }
}

/// Cross-cutting focus state, common to every window kind.
#[derive(Debug, Clone, Default)]
pub struct FocusState {
    /// Whether `focus_window` most recently targeted this window.
    pub is_active: bool,
    /// The last `focus_window` action applied.
    pub last_action: String,
}

/// Fields shared by every window kind.
#[derive(Debug, Clone)]
pub struct WindowCommon {
    /// Stable window id, assigned at creation.
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Lifecycle (detail level, idle turns, dormancy).
    pub lifecycle: LifecycleState,
    /// Intent classification state.
    pub intent: IntentState,
    /// Operation/change audit trail.
    pub audit: AuditState,
    /// Focus-service state.
    pub focus: FocusState,
    /// Free-text summary, surfaced in suspended/background renders.
    pub summary: String,
    /// Free-form metadata bag for renderer-only fields (scroll
    /// position, status bar, column widths, …) that don't warrant a
    /// dedicated typed field.
    pub metadata: HashMap<String, Value>,
}

impl WindowCommon {
    fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            lifecycle: LifecycleState::default(),
            intent: IntentState::default(),
            audit: AuditState::new(),
            focus: FocusState::default(),
            summary: String::new(),
            metadata: HashMap::new(),
        }
    }
}

/// Explorer-specific data container.
#[derive(Debug, Clone, Default)]
pub struct ExplorerData {
    /// Directory currently listed (may differ from the identity's
    /// normalised form; this is the display form).
    pub directory: String,
    /// Rendered directory entries (file/dir names).
    pub entries: Vec<String>,
}

/// A directory-listing window.
#[derive(Debug, Clone)]
pub struct ExplorerWindow {
    /// Cross-cutting state.
    pub common: WindowCommon,
    /// Explorer-specific data.
    pub data: ExplorerData,
}

impl ExplorerWindow {
    /// Construct a new explorer window bound to `directory`.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, directory: &str) -> Self {
        Self {
            common: WindowCommon::new(id, title),
            data: ExplorerData { directory: if directory.is_empty() { ".".to_string() } else { directory.to_string() }, entries: Vec::new() },
        }
    }
}

/// Sheet cache/state container: cached rows, staleness, last op kind.
#[derive(Debug, Clone, Default)]
pub struct SheetCache {
    /// Preview rows surfaced to the renderer (first N of `data_buffer`).
    pub preview_rows: Vec<Value>,
    /// Flattened, de-duplicated rows across all cached ranges.
    pub data_buffer: Vec<Value>,
    /// Disjoint cached row blocks, most recent marked `is_current`.
    pub cached_ranges: Vec<CachedRange>,
    /// Eviction cap on `cached_ranges` rows.
    pub max_cached_rows: usize,
    /// Set when a write couldn't be patched in place; cleared on the
    /// next successful patch or full re-read.
    pub stale_hint: Option<String>,
    /// Snapshot of `data_buffer` taken just before the first filter, so
    /// `clear_filter` can restore it.
    pub unfiltered_buffer: Option<Vec<Value>>,
    /// `"read"`, `"write"`, `"filter"`, or `None`.
    pub last_op_kind: Option<String>,
    /// Range affected by the most recent write.
    pub last_write_range: Option<String>,
}

impl SheetCache {
    fn new() -> Self {
        Self { max_cached_rows: 200, ..Self::default() }
    }
}

/// Sheet style/visual-state container.
#[derive(Debug, Clone, Default)]
pub struct SheetStyle {
    /// Freeze-pane anchor, e.g. `"B2"`.
    pub freeze_panes: Option<String>,
    /// Free-text style summary.
    pub summary: String,
    /// Column width overrides, keyed by column letter.
    pub column_widths: HashMap<String, Value>,
    /// Row height overrides, keyed by row number as a string.
    pub row_heights: HashMap<String, Value>,
    /// Merged-cell ranges.
    pub merged_ranges: Vec<String>,
    /// Human-readable conditional-format effect descriptions.
    pub conditional_effects: Vec<String>,
}

/// Sheet filter/state container.
#[derive(Debug, Clone, Default)]
pub struct SheetFilter {
    /// Opaque filter-state payload (criteria, active column, …).
    pub state: Option<Value>,
    /// Status-bar aggregate readout (sum/count/average of selection).
    pub status_bar: HashMap<String, Value>,
}

/// Sheet schema/structure container.
#[derive(Debug, Clone, Default)]
pub struct SheetSchema {
    /// Inferred schema (name + dtype per column).
    pub schema: Vec<ColumnDef>,
    /// Declared/observed columns (may differ from `schema` in ordering
    /// or inclusion of derived columns).
    pub columns: Vec<ColumnDef>,
}

/// Sheet focus/viewport helper container.
#[derive(Debug, Clone, Default)]
pub struct SheetFocus {
    /// Viewport range override (takes priority over `viewport.range_ref`).
    pub viewport_range: String,
    /// Scroll-bar position as percentages, for the enriched renderer.
    pub scroll_position: HashMap<String, Value>,
}

/// Sheet-specific data container.
#[derive(Debug, Clone, Default)]
pub struct SheetData {
    /// Absolute file path.
    pub file_path: String,
    /// Worksheet name.
    pub sheet_name: String,
    /// All worksheet tab names in the workbook.
    pub sheet_tabs: Vec<String>,
    /// Current viewport, if one has been observed.
    pub viewport: Option<Viewport>,
    /// Cache state.
    pub cache: SheetCache,
    /// Style state.
    pub style: SheetStyle,
    /// Filter state.
    pub filter: SheetFilter,
    /// Schema state.
    pub schema: SheetSchema,
    /// Focus/viewport helper state.
    pub focus: SheetFocus,
    /// Authoritative total row count, if known independent of viewport.
    pub total_rows: i64,
    /// Authoritative total column count, if known independent of viewport.
    pub total_cols: i64,
    /// Per-tab `(rows, cols)` extents.
    pub sheet_dimensions: HashMap<String, (i64, i64)>,
}

/// A worksheet window.
#[derive(Debug, Clone)]
pub struct SheetWindow {
    /// Cross-cutting state.
    pub common: WindowCommon,
    /// Sheet-specific data.
    pub data: SheetData,
}

impl SheetWindow {
    /// Construct a new sheet window bound to `(file_path, sheet_name)`.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, file_path: &str, sheet_name: &str) -> Self {
        Self {
            common: WindowCommon::new(id, title),
            data: SheetData {
                file_path: file_path.to_string(),
                sheet_name: sheet_name.to_string(),
                cache: SheetCache::new(),
                ..SheetData::default()
            },
        }
    }

    /// Resolved total rows: explicit shape if set, else the viewport's.
    #[must_use]
    pub fn total_rows(&self) -> i64 {
        if self.data.total_rows > 0 {
            self.data.total_rows
        } else {
            self.data.viewport.as_ref().map_or(0, |v| v.total_rows)
        }
    }

    /// Resolved total cols: explicit shape if set, else the viewport's.
    #[must_use]
    pub fn total_cols(&self) -> i64 {
        if self.data.total_cols > 0 {
            self.data.total_cols
        } else {
            self.data.viewport.as_ref().map_or(0, |v| v.total_cols)
        }
    }

    /// Resolved viewport range: the focus override if set, else the
    /// viewport's own range.
    #[must_use]
    pub fn viewport_range(&self) -> &str {
        if !self.data.focus.viewport_range.is_empty() {
            &self.data.focus.viewport_range
        } else {
            self.data.viewport.as_ref().map_or("", |v| v.range_ref.as_str())
        }
    }
}

/// A window: either an explorer or a sheet.
#[derive(Debug, Clone)]
pub enum Window {
    /// A directory-listing window.
    Explorer(ExplorerWindow),
    /// A worksheet window.
    Sheet(SheetWindow),
}

impl Window {
    /// This window's stable id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.common().id
    }

    /// This window's kind discriminant.
    #[must_use]
    pub fn kind(&self) -> WindowType {
        match self {
            Self::Explorer(_) => WindowType::Explorer,
            Self::Sheet(_) => WindowType::Sheet,
        }
    }

    /// Shared cross-cutting state, read-only.
    #[must_use]
    pub fn common(&self) -> &WindowCommon {
        match self {
            Self::Explorer(w) => &w.common,
            Self::Sheet(w) => &w.common,
        }
    }

    /// Shared cross-cutting state, mutable.
    pub fn common_mut(&mut self) -> &mut WindowCommon {
        match self {
            Self::Explorer(w) => &mut w.common,
            Self::Sheet(w) => &mut w.common,
        }
    }

    /// Borrow as a sheet window, if that's what this is.
    #[must_use]
    pub fn as_sheet(&self) -> Option<&SheetWindow> {
        match self {
            Self::Sheet(w) => Some(w),
            Self::Explorer(_) => None,
        }
    }

    /// Mutably borrow as a sheet window, if that's what this is.
    pub fn as_sheet_mut(&mut self) -> Option<&mut SheetWindow> {
        match self {
            Self::Sheet(w) => Some(w),
            Self::Explorer(_) => None,
        }
    }

    /// Borrow as an explorer window, if that's what this is.
    #[must_use]
    pub fn as_explorer(&self) -> Option<&ExplorerWindow> {
        match self {
            Self::Explorer(w) => Some(w),
            Self::Sheet(_) => None,
        }
    }

    /// Mutably borrow as an explorer window, if that's what this is.
    pub fn as_explorer_mut(&mut self) -> Option<&mut ExplorerWindow> {
        match self {
            Self::Explorer(w) => Some(w),
            Self::Sheet(_) => None,
        }
    }
}
