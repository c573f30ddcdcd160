//! Shared value types used across the window perception subsystem.

use serde::{Deserialize, Serialize};

/// Discriminant for the two window kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowType {
    /// A directory listing window.
    Explorer,
    /// A worksheet window.
    Sheet,
}

impl WindowType {
    /// `"explorer"` or `"sheet"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Explorer => "explorer",
            Self::Sheet => "sheet",
        }
    }
}

/// The budget allocator's decision for one window this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowRenderAction {
    /// Render at the tier the allocator chose (active or background).
    Keep,
    /// Render the one-line suspended summary.
    Minimize,
    /// Don't render at all; the window is closed.
    Close,
}

/// How a window renders to the model this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    /// Full render (the active/keep window).
    Full,
    /// Structural summary (background window).
    Summary,
    /// One-line summary (suspended window).
    Icon,
    /// Not rendered at all (closed window).
    None,
}

/// Per-tool-call intent classification for a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentTag {
    /// Aggregation / summarisation work (pivot, sum, group-by).
    Aggregate,
    /// Cosmetic formatting work.
    Format,
    /// Data validation / consistency checking.
    Validate,
    /// Formula authoring or inspection.
    Formula,
    /// Direct data entry.
    Entry,
    /// No specific intent detected.
    General,
}

impl Default for IntentTag {
    fn default() -> Self {
        Self::General
    }
}

impl IntentTag {
    /// Stable lowercase string form, used in rendered confirmations.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aggregate => "aggregate",
            Self::Format => "format",
            Self::Validate => "validate",
            Self::Formula => "formula",
            Self::Entry => "entry",
            Self::General => "general",
        }
    }

    /// Parse from the lowercase string form, defaulting to `General`
    /// for anything unrecognised (matching round-trip parsing, which
    /// should never fail a render just because of an unknown tag).
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "aggregate" => Self::Aggregate,
            "format" => Self::Format,
            "validate" => Self::Validate,
            "formula" => Self::Formula,
            "entry" => Self::Entry,
            _ => Self::General,
        }
    }
}

/// A typed column descriptor, as surfaced by schema-inspecting tools.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnDef {
    /// Column header / name.
    pub name: String,
    /// Inferred or declared data type, free-form.
    pub inferred_type: String,
}

/// A contiguous cached block of rows, anchored to a range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedRange {
    /// The A1-style range this block covers.
    pub range_ref: String,
    /// Cached rows, each a JSON object keyed by column name.
    pub rows: Vec<serde_json::Value>,
    /// Whether this block is the current viewport (the most recently
    /// read block, as opposed to an older one kept for context).
    pub is_current_viewport: bool,
    /// The window-local operation counter this block was added at.
    pub added_at_iteration: i64,
}

/// One entry in a window's bounded operation-history ring buffer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpEntry {
    /// Tool name that produced this operation.
    pub tool_name: String,
    /// The tool's arguments, for audit replay.
    pub arguments: serde_json::Value,
    /// Window-local operation counter value.
    pub iteration: i64,
    /// Whether the tool call succeeded.
    pub success: bool,
}

/// One entry in a window's bounded change-log ring buffer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeRecord {
    /// The tool/operation name.
    pub operation: String,
    /// Fallback summary when `affected_range` is absent.
    pub tool_summary: String,
    /// The range affected, or `"-"` if not range-scoped.
    pub affected_range: String,
    /// Kind of change (e.g. `"write"`, `"style"`, `"filter"`).
    pub change_type: String,
    /// Window-local operation counter value.
    pub iteration: i64,
    /// Absolute row indices touched, if known.
    pub affected_row_indices: Vec<i64>,
}

/// The sheet's current visible viewport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Viewport {
    /// The A1-style visible range.
    pub range_ref: String,
    /// Visible row count.
    pub visible_rows: i64,
    /// Visible column count.
    pub visible_cols: i64,
    /// Total sheet rows (whole-sheet extent, not just visible).
    pub total_rows: i64,
    /// Total sheet columns (whole-sheet extent, not just visible).
    pub total_cols: i64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { range_ref: "A1:T25".to_string(), visible_rows: 25, visible_cols: 20, total_rows: 0, total_cols: 0 }
    }
}

/// A rendered window, ready to be concatenated into the system notice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindowSnapshot {
    /// The window id this snapshot was rendered from.
    pub window_id: String,
    /// The action the budget allocator took for this window.
    pub action: WindowRenderAction,
    /// The rendered text block (empty if `action` is `Close`).
    pub rendered_text: String,
    /// Estimated token cost of `rendered_text`.
    pub estimated_tokens: i64,
}

/// Thresholds and caps governing lifecycle tiering and token budgeting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerceptionBudget {
    /// Total token budget available for rendered window context.
    pub system_budget_tokens: i64,
    /// Token budget reserved for the tool-result text that accompanies
    /// an enriched-mode perception block.
    pub tool_append_tokens: i64,
    /// Maximum number of windows kept open at all; overflow windows
    /// (by last-access order) are closed outright.
    pub max_windows: usize,
    /// Default visible row count for a newly-opened sheet viewport.
    pub default_rows: i64,
    /// Default visible column count for a newly-opened sheet viewport.
    pub default_cols: i64,
    /// Token floor for a suspended (minimized) render.
    pub minimized_tokens: i64,
    /// Idle-turn threshold after which a non-active window demotes to
    /// `background`.
    pub background_after_idle: i64,
    /// Idle-turn threshold after which a window demotes to `suspended`.
    pub suspend_after_idle: i64,
    /// Idle-turn threshold after which a window is `terminated` (closed).
    pub terminate_after_idle: i64,
    /// Base row cap for a full-detail render with two active windows.
    pub window_full_max_rows: i64,
    /// Token budget for a single window's full-detail render.
    pub window_full_total_budget_tokens: i64,
    /// Eviction cap on a sheet's `cached_ranges` total row count.
    pub window_data_buffer_max_rows: i64,
}

impl Default for PerceptionBudget {
    fn default() -> Self {
        Self {
            system_budget_tokens: 3000,
            tool_append_tokens: 500,
            max_windows: 6,
            default_rows: 25,
            default_cols: 20,
            minimized_tokens: 80,
            background_after_idle: 2,
            suspend_after_idle: 5,
            terminate_after_idle: 8,
            window_full_max_rows: 25,
            window_full_total_budget_tokens: 500,
            window_data_buffer_max_rows: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_tag_round_trips_through_as_str_and_parse() {
        for tag in [
            IntentTag::Aggregate,
            IntentTag::Format,
            IntentTag::Validate,
            IntentTag::Formula,
            IntentTag::Entry,
            IntentTag::General,
        ] {
            assert_eq!(IntentTag::parse(tag.as_str()), tag);
        }
    }

    #[test]
    fn intent_tag_unknown_defaults_to_general() {
        assert_eq!(IntentTag::parse("whatever"), IntentTag::General);
    }
}
