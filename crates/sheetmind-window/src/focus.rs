//! The `focus_window` tool: lets the model explicitly restore, filter,
//! scroll, or expand a window's detail level, independent of the
//! idle-turn-driven lifecycle advisor.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::domain::Window;
use crate::models::DetailLevel;

/// The four actions `focus_window` supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusAction {
    /// Bring the window back to full detail and mark it active.
    Restore,
    /// Drop the active filter and restore the pre-filter row buffer.
    ClearFilter,
    /// Move the viewport to a new range without a fresh tool read.
    Scroll,
    /// Widen the rendered row/column window beyond the default cap.
    Expand,
}

impl FocusAction {
    /// Parse the tool argument's action string.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "restore" => Some(Self::Restore),
            "clear_filter" => Some(Self::ClearFilter),
            "scroll" => Some(Self::Scroll),
            "expand" => Some(Self::Expand),
            _ => None,
        }
    }
}

/// Outcome of a `focus_window` call.
#[derive(Debug, Clone)]
pub struct FocusOutcome {
    /// `true` if the action completed without needing a fresh read.
    pub ok: bool,
    /// Human-readable status message.
    pub message: String,
    /// The window id this outcome applies to.
    pub window_id: String,
    /// Set when `restore` found no cached data for the target range and
    /// the caller must perform a fresh read and call
    /// [`FocusService::ingest_refill_result`] before the window is usable.
    pub needs_refill: bool,
    /// The range a refill read (if needed) should cover.
    pub refill_range: Option<String>,
}

/// Performs a read to satisfy a `needs_refill` outcome. Implemented by
/// the engine loop, which has access to the actual spreadsheet tool.
#[async_trait]
pub trait RefillReader {
    /// Read `range_ref` from the sheet identified by `(file_path, sheet_name)`,
    /// returning the raw tool-result JSON (same shape a normal read tool
    /// would produce).
    async fn read_range(&self, file_path: &str, sheet_name: &str, range_ref: &str) -> Option<Value>;
}

/// Dispatches `focus_window` actions against a single resolved window.
#[derive(Debug, Default)]
pub struct FocusService;

impl FocusService {
    /// Apply `action` to `window`. `range_ref`/`rows` are only honoured
    /// by the actions that use them (`scroll`, `expand`).
    pub fn apply(&self, window: &mut Window, action: FocusAction, range_ref: Option<&str>, rows: Option<i64>) -> FocusOutcome {
        let window_id = window.id().to_string();
        match action {
            FocusAction::Restore => self.restore(window, window_id),
            FocusAction::ClearFilter => self.clear_filter(window, window_id),
            FocusAction::Scroll => self.scroll(window, window_id, range_ref),
            FocusAction::Expand => self.expand(window, window_id, rows),
        }
    }

    /// After a caller has satisfied a `needs_refill` outcome by reading
    /// `range_ref`, merge the result into the window and mark it active.
    pub fn ingest_refill_result(&self, window: &mut Window, range_ref: &str, result_json: Option<&Value>, iteration: i64) {
        if let Some(sheet) = window.as_sheet_mut() {
            let rows = crate::ingest::extract_data_rows(result_json);
            crate::ingest::ingest_read_result(sheet, range_ref, &rows, iteration);
        }
        let common = window.common_mut();
        common.focus.is_active = true;
        common.focus.last_action = "restore".to_string();
        common.lifecycle.detail_level = DetailLevel::Full;
        common.lifecycle.idle_turns = 0;
    }

    fn restore(&self, window: &mut Window, window_id: String) -> FocusOutcome {
        let has_cache = window.as_sheet().is_none_or(|s| !s.data.cache.cached_ranges.is_empty());
        if let Some(sheet) = window.as_sheet() {
            if !has_cache {
                let refill_range = if sheet.viewport_range().is_empty() { "A1:T25".to_string() } else { sheet.viewport_range().to_string() };
                debug!(window_id, refill_range, "focus restore needs a fresh read");
                return FocusOutcome { ok: false, message: "window has no cached data; a fresh read is required".to_string(), window_id, needs_refill: true, refill_range: Some(refill_range) };
            }
        }
        let common = window.common_mut();
        common.focus.is_active = true;
        common.focus.last_action = "restore".to_string();
        common.lifecycle.detail_level = DetailLevel::Full;
        common.lifecycle.idle_turns = 0;
        common.lifecycle.dormant = false;
        FocusOutcome { ok: true, message: "window restored to full detail".to_string(), window_id, needs_refill: false, refill_range: None }
    }

    fn clear_filter(&self, window: &mut Window, window_id: String) -> FocusOutcome {
        let Some(sheet) = window.as_sheet_mut() else {
            return FocusOutcome { ok: false, message: "clear_filter only applies to sheet windows".to_string(), window_id, needs_refill: false, refill_range: None };
        };
        let restored = sheet.data.cache.unfiltered_buffer.take();
        let had_filter = restored.is_some();
        if let Some(buffer) = restored {
            sheet.data.cache.data_buffer = buffer;
        }
        sheet.data.filter.state = None;
        window.common_mut().focus.last_action = "clear_filter".to_string();
        FocusOutcome {
            ok: true,
            message: if had_filter { "filter cleared".to_string() } else { "no active filter to clear".to_string() },
            window_id,
            needs_refill: false,
            refill_range: None,
        }
    }

    fn scroll(&self, window: &mut Window, window_id: String, range_ref: Option<&str>) -> FocusOutcome {
        let Some(range_ref) = range_ref.filter(|r| !r.is_empty()) else {
            return FocusOutcome { ok: false, message: "scroll requires a range_ref".to_string(), window_id, needs_refill: false, refill_range: None };
        };
        let Some(sheet) = window.as_sheet_mut() else {
            return FocusOutcome { ok: false, message: "scroll only applies to sheet windows".to_string(), window_id, needs_refill: false, refill_range: None };
        };
        sheet.data.focus.viewport_range = range_ref.to_string();
        window.common_mut().focus.last_action = "scroll".to_string();
        FocusOutcome { ok: true, message: format!("viewport moved to {range_ref}"), window_id, needs_refill: false, refill_range: None }
    }

    fn expand(&self, window: &mut Window, window_id: String, rows: Option<i64>) -> FocusOutcome {
        let Some(sheet) = window.as_sheet_mut() else {
            return FocusOutcome { ok: false, message: "expand only applies to sheet windows".to_string(), window_id, needs_refill: false, refill_range: None };
        };
        if let (Some(viewport), Some(rows)) = (sheet.data.viewport.as_mut(), rows) {
            viewport.visible_rows = rows.max(1);
        }
        sheet.common.lifecycle.detail_level = DetailLevel::Full;
        sheet.common.focus.last_action = "expand".to_string();
        FocusOutcome { ok: true, message: "window expanded".to_string(), window_id, needs_refill: false, refill_range: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SheetWindow;
    use serde_json::json;

    #[test]
    fn restore_requests_refill_when_cache_is_empty() {
        let mut w = Window::Sheet(SheetWindow::new("w1", "t", "/a.xlsx", "Sheet1"));
        let outcome = FocusService.apply(&mut w, FocusAction::Restore, None, None);
        assert!(outcome.needs_refill);
    }

    #[test]
    fn restore_succeeds_once_cache_is_populated() {
        let mut sheet = SheetWindow::new("w1", "t", "/a.xlsx", "Sheet1");
        crate::ingest::ingest_read_result(&mut sheet, "A1:A2", &[json!({"a": 1})], 1);
        let mut w = Window::Sheet(sheet);
        let outcome = FocusService.apply(&mut w, FocusAction::Restore, None, None);
        assert!(outcome.ok);
        assert!(w.common().focus.is_active);
    }

    #[test]
    fn clear_filter_restores_unfiltered_buffer() {
        let mut sheet = SheetWindow::new("w1", "t", "/a.xlsx", "Sheet1");
        crate::ingest::ingest_read_result(&mut sheet, "A1:A3", &[json!({"a": 1}), json!({"a": 2}), json!({"a": 3})], 1);
        crate::ingest::ingest_filter_result(&mut sheet, json!({"col": "a"}), &[json!({"a": 2})], 2);
        let mut w = Window::Sheet(sheet);
        let outcome = FocusService.apply(&mut w, FocusAction::ClearFilter, None, None);
        assert!(outcome.ok);
        assert_eq!(w.as_sheet().unwrap().data.cache.data_buffer.len(), 3);
    }

    #[test]
    fn scroll_without_range_is_rejected() {
        let mut w = Window::Sheet(SheetWindow::new("w1", "t", "/a.xlsx", "Sheet1"));
        let outcome = FocusService.apply(&mut w, FocusAction::Scroll, None, None);
        assert!(!outcome.ok);
    }

    #[test]
    fn action_parsing_is_case_insensitive() {
        assert_eq!(FocusAction::parse("RESTORE"), Some(FocusAction::Restore));
        assert_eq!(FocusAction::parse("bogus"), None);
    }
}
