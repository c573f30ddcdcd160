//! Orchestrates the whole window perception subsystem: resolves a tool
//! call to a window (creating one if needed), dispatches it into the
//! ingest pipeline, resolves intent and repeat-read state, keeps the
//! lifecycle advisor and adaptive render mode current, and renders the
//! per-turn system notice plus per-call confirmation text.
//!
//! This is the only module callers outside this crate are expected to
//! use directly; everything else is the machinery it wires together.

use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use crate::adaptive::AdaptiveModeSelector;
use crate::advisor::{HybridAdvisor, WindowLifecycleView};
use crate::budget::{WindowBudgetAllocator, WindowRenderCandidate};
use crate::confirmation::{build_confirmation_record, serialize_confirmation, ConfirmationMode};
use crate::delta::{apply_delta, DeltaBody, ExplorerDelta, FieldSetDelta, IntentDelta, LifecycleDelta, SheetStyleDelta, WindowDelta};
use crate::domain::{ExplorerWindow, SheetWindow, Window};
use crate::error::{WindowError, WindowResult};
use crate::extractor;
use crate::focus::{FocusAction, FocusOutcome, FocusService};
use crate::geometry::{self, ScrollPosition, StatusBarSummary};
use crate::identity::WindowIdentity;
use crate::ingest;
use crate::locator::WindowLocator;
use crate::models::{ChangeRecord, DetailLevel, IntentTag, OpEntry, PerceptionBudget, Viewport, WindowRenderAction, WindowType};
use crate::renderer;
use crate::repeat::{repeat_threshold, RepeatDetector};
use crate::rules::IntentResolver;
use crate::small_model::{AdvisorContext, SmallModelPlanResult};

const STICKY_LOCK_TURNS: i64 = 3;
const BASE_REPEAT_WARN: i64 = 3;
const BASE_REPEAT_TRIP: i64 = 5;

/// Tunables the manager is constructed with. Tiering thresholds and
/// token caps live on [`PerceptionBudget`] itself; these are the knobs
/// around it.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Tiering/budget thresholds, forwarded to the advisor and allocator.
    pub budget: PerceptionBudget,
    /// The caller's requested confirmation mode (`"unified"`,
    /// `"anchored"`, `"enriched"`, or `"adaptive"`).
    pub confirmation_mode_request: String,
    /// The active model id, used by adaptive mode resolution.
    pub model_id: String,
    /// Model-id-prefix -> mode overrides for adaptive resolution.
    pub model_mode_overrides: HashMap<String, String>,
    /// Whether intent resolution runs at all; `false` freezes every
    /// window's intent at whatever it was last set to.
    pub intent_enabled: bool,
    /// How many turns a small-model lifecycle plan stays valid before
    /// the hybrid advisor falls back to rules.
    pub plan_ttl_turns: i64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            budget: PerceptionBudget::default(),
            confirmation_mode_request: "adaptive".to_string(),
            model_id: String::new(),
            model_mode_overrides: HashMap::new(),
            intent_enabled: true,
            plan_ttl_turns: 4,
        }
    }
}

/// What observing one successful tool call produced.
#[derive(Debug, Clone)]
pub struct ToolObservation {
    /// The window the call was attributed to.
    pub window_id: String,
    /// Kind of that window.
    pub window_kind: WindowType,
    /// Inline confirmation text, under the manager's current render mode.
    pub confirmation_text: Option<String>,
    /// The enriched-mode tool-perception block (built regardless of the
    /// current mode, so a caller that downgrades mid-turn still has it).
    pub tool_perception_block: String,
    /// Whether this call tripped or approached a repeat-read threshold.
    pub repeat_warning: bool,
}

/// Tracks every open window, their stable identities, and the
/// lifecycle/intent/repeat/render-mode state that spans tool calls.
pub struct WindowPerceptionManager {
    config: ManagerConfig,
    windows: HashMap<String, Window>,
    locator: WindowLocator,
    advisor: HybridAdvisor,
    mode_selector: AdaptiveModeSelector,
    repeat_detector: RepeatDetector,
    intent_resolver: IntentResolver,
    focus_service: FocusService,
    next_window_seq: i64,
    access_seq: i64,
    turn_number: i64,
    active_window_id: Option<String>,
    last_identity_reject_code: Option<String>,
    last_task_type: String,
}

impl WindowPerceptionManager {
    /// Build a manager from `config`.
    #[must_use]
    pub fn new(config: ManagerConfig) -> Self {
        let mode_selector = AdaptiveModeSelector::new(config.model_mode_overrides.clone());
        let advisor = HybridAdvisor::new(config.plan_ttl_turns);
        Self {
            config,
            windows: HashMap::new(),
            locator: WindowLocator::new(),
            advisor,
            mode_selector,
            repeat_detector: RepeatDetector::new(),
            intent_resolver: IntentResolver::new(),
            focus_service: FocusService,
            next_window_seq: 0,
            access_seq: 0,
            turn_number: 0,
            active_window_id: None,
            last_identity_reject_code: None,
            last_task_type: "GENERAL_BROWSE".to_string(),
        }
    }

    /// The reject code from the most recent locator conflict, if any.
    #[must_use]
    pub fn last_identity_reject_code(&self) -> Option<&str> {
        self.last_identity_reject_code.as_deref()
    }

    /// The currently active window id, if any.
    #[must_use]
    pub fn active_window_id(&self) -> Option<&str> {
        self.active_window_id.as_deref()
    }

    /// Look up a window by id.
    #[must_use]
    pub fn window(&self, window_id: &str) -> Option<&Window> {
        self.windows.get(window_id)
    }

    /// Every open window id, in no particular order.
    pub fn window_ids(&self) -> impl Iterator<Item = &str> {
        self.windows.keys().map(String::as_str)
    }

    /// Advance the idle-turn counter on every window except the active
    /// one. Call once per agent turn, before processing that turn's
    /// tool calls.
    pub fn begin_turn(&mut self, turn_number: i64) {
        self.turn_number = turn_number;
        let active = self.active_window_id.clone();
        for (id, window) in &mut self.windows {
            if Some(id.as_str()) != active.as_deref() {
                window.common_mut().lifecycle.idle_turns = window.common_mut().lifecycle.idle_turns.saturating_add(1);
            }
        }
    }

    /// Drop every window and reset all session-scoped state (new
    /// session boundary).
    pub fn reset(&mut self) {
        self.windows.clear();
        self.locator = WindowLocator::new();
        self.advisor = HybridAdvisor::new(self.config.plan_ttl_turns);
        self.mode_selector.reset();
        self.repeat_detector = RepeatDetector::new();
        self.next_window_seq = 0;
        self.access_seq = 0;
        self.turn_number = 0;
        self.active_window_id = None;
        self.last_identity_reject_code = None;
        self.last_task_type = "GENERAL_BROWSE".to_string();
    }

    /// Resolve the render mode to use right now, given the configured
    /// request and model id.
    pub fn resolve_effective_mode(&mut self) -> ConfirmationMode {
        let mode = self.mode_selector.select_mode(&self.config.model_id, &self.config.confirmation_mode_request);
        match mode.as_str() {
            "unified" => ConfirmationMode::Unified,
            "enriched" => ConfirmationMode::Enriched,
            _ => ConfirmationMode::Anchored,
        }
    }

    /// Whether a small-model lifecycle refresh should run this turn.
    #[must_use]
    pub fn should_refresh_small_model_plan(&self, context: &AdvisorContext) -> bool {
        context.is_new_task || context.window_count_changed || self.turn_number.saturating_sub(self.advisor.cached_plan_turn) > self.config.plan_ttl_turns
    }

    /// Compact per-window views, for building a small-model advisor prompt.
    #[must_use]
    pub fn compact_window_views(&self) -> Vec<crate::small_model::CompactWindowView> {
        self.windows
            .values()
            .map(|w| {
                let (file_path, sheet_name, viewport) = match w {
                    Window::Explorer(_) => (String::new(), String::new(), crate::small_model::CompactViewport::default()),
                    Window::Sheet(sheet) => (
                        sheet.data.file_path.clone(),
                        sheet.data.sheet_name.clone(),
                        crate::small_model::CompactViewport { range: sheet.viewport_range().to_string(), rows: sheet.total_rows(), cols: sheet.total_cols() },
                    ),
                };
                crate::small_model::CompactWindowView {
                    id: w.id().to_string(),
                    kind: w.kind().as_str().to_string(),
                    file_path,
                    sheet_name,
                    idle_turns: w.common().lifecycle.idle_turns,
                    last_access_seq: w.common().lifecycle.last_access_seq,
                    summary: w.common().summary.chars().take(160).collect(),
                    viewport,
                }
            })
            .collect()
    }

    /// Install a freshly-generated small-model plan.
    pub fn apply_small_model_plan(&mut self, result: SmallModelPlanResult) {
        self.last_task_type = result.task_type;
        self.advisor.set_plan(result.plan, result.generated_turn);
    }

    /// The task-type classification carried by the most recently applied
    /// small-model plan (or the rule-based default if none has run yet).
    #[must_use]
    pub fn last_task_type(&self) -> &str {
        &self.last_task_type
    }

    fn next_seq(&mut self) -> i64 {
        self.access_seq += 1;
        self.access_seq
    }

    fn allocate_window_id(&mut self, prefix: &str) -> String {
        self.next_window_seq += 1;
        format!("{prefix}_{}", self.next_window_seq)
    }

    fn resolve_or_create_sheet(&mut self, file_path: &str, sheet_name: &str) -> String {
        let identity = WindowIdentity::sheet(file_path, sheet_name);
        match self.locator.find_expect_kind(&identity, "sheet") {
            Ok(Some(id)) => {
                self.last_identity_reject_code = None;
                return id.to_string();
            },
            Ok(None) => {},
            Err(reject) => {
                self.last_identity_reject_code = Some(reject.code.as_str().to_string());
                warn!(%reject, "locator reject resolving sheet window; creating a fresh one");
            },
        }
        let id = self.allocate_window_id("sheet");
        let window = Window::Sheet(SheetWindow::new(&id, format!("{file_path} / {sheet_name}"), file_path, sheet_name));
        self.windows.insert(id.clone(), window);
        match self.locator.register(identity, &id) {
            Ok(()) => self.last_identity_reject_code = None,
            Err(reject) => {
                self.last_identity_reject_code = Some(reject.code.as_str().to_string());
                warn!(%reject, "locator registration failed for new sheet window");
            },
        }
        id
    }

    fn resolve_or_create_explorer(&mut self, directory: &str) -> String {
        let identity = WindowIdentity::explorer(directory);
        match self.locator.find_expect_kind(&identity, "explorer") {
            Ok(Some(id)) => {
                self.last_identity_reject_code = None;
                return id.to_string();
            },
            Ok(None) => {},
            Err(reject) => {
                self.last_identity_reject_code = Some(reject.code.as_str().to_string());
                warn!(%reject, "locator reject resolving explorer window; creating a fresh one");
            },
        }
        let id = self.allocate_window_id("explorer");
        let window = Window::Explorer(ExplorerWindow::new(&id, format!("Explorer: {directory}"), directory));
        self.windows.insert(id.clone(), window);
        match self.locator.register(identity, &id) {
            Ok(()) => self.last_identity_reject_code = None,
            Err(reject) => {
                self.last_identity_reject_code = Some(reject.code.as_str().to_string());
                warn!(%reject, "locator registration failed for new explorer window");
            },
        }
        id
    }

    fn touch(&mut self, window_id: &str) {
        self.active_window_id = Some(window_id.to_string());
        let seq = self.next_seq();
        if let Some(window) = self.windows.get_mut(window_id) {
            let delta = WindowDelta {
                kind: window.kind(),
                body: DeltaBody::Lifecycle(LifecycleDelta { detail_level: Some(DetailLevel::Full), idle_turns: Some(0), last_access_seq: Some(seq), dormant: Some(false) }),
            };
            let _ = apply_delta(window, &delta);
        }
    }

    fn apply_intent(&mut self, window_id: &str, canonical_tool_name: &str, arguments: &Value, result_json: Option<&Value>, user_intent_text: &str) {
        let Some(window) = self.windows.get_mut(window_id) else { return };
        let current = window.common().intent.clone();
        let decision = self.intent_resolver.resolve(
            current.tag,
            current.confidence,
            current.lock_until_turn,
            self.turn_number,
            self.config.intent_enabled,
            user_intent_text,
            canonical_tool_name,
            arguments,
            result_json,
        );
        let new_lock = match decision.source {
            "user_rule" | "tool_rule" if decision.tag != IntentTag::General => self.turn_number.saturating_add(STICKY_LOCK_TURNS),
            "carry" | "sticky_lock" => current.lock_until_turn,
            _ => 0,
        };
        let delta = WindowDelta {
            kind: window.kind(),
            body: DeltaBody::Intent(IntentDelta {
                tag: Some(decision.tag),
                confidence: Some(decision.confidence),
                source: Some(decision.source.to_string()),
                updated_turn: Some(self.turn_number),
                lock_until_turn: Some(new_lock),
            }),
        };
        let _ = apply_delta(window, &delta);
    }

    fn push_history(window: &mut Window, tool_name: &str, arguments: Value, iteration: i64, success: bool) {
        let audit = &mut window.common_mut().audit;
        audit.operation_history.push(OpEntry { tool_name: tool_name.to_string(), arguments, iteration, success });
        let cap = audit.max_history_entries.max(1);
        if audit.operation_history.len() > cap {
            let overflow = audit.operation_history.len() - cap;
            audit.operation_history.drain(0..overflow);
        }
    }

    fn push_change(window: &mut Window, record: ChangeRecord) {
        let audit = &mut window.common_mut().audit;
        audit.change_log.push(record);
        let cap = audit.max_change_records.max(1);
        if audit.change_log.len() > cap {
            let overflow = audit.change_log.len() - cap;
            audit.change_log.drain(0..overflow);
        }
    }

    /// Observe one tool call, ingesting its result into whichever window
    /// it targets and returning the confirmation/perception text for it.
    /// Returns `None` for tools this subsystem doesn't track (unknown
    /// tools, or ones missing the identity fields they need).
    pub fn observe_tool_call(&mut self, tool_name: &str, arguments: &Value, result_json: Option<&Value>, success: bool, user_intent_text: &str) -> Option<ToolObservation> {
        let tool_meta = crate::rules::classify_tool(tool_name);
        match tool_meta.window_type? {
            WindowType::Explorer => self.observe_explorer_call(&tool_meta.canonical_name, arguments, result_json, success, user_intent_text),
            WindowType::Sheet => self.observe_sheet_call(&tool_meta.canonical_name, &tool_meta, arguments, result_json, success, user_intent_text),
        }
    }

    fn observe_explorer_call(&mut self, canonical_tool: &str, arguments: &Value, result_json: Option<&Value>, success: bool, user_intent_text: &str) -> Option<ToolObservation> {
        let directory = extractor::extract_directory(arguments, result_json);
        let window_id = self.resolve_or_create_explorer(&directory);
        self.touch(&window_id);

        let entries = extractor::extract_explorer_entries(result_json);
        let iteration = {
            let window = self.windows.get_mut(&window_id)?;
            if let Some(explorer) = window.as_explorer_mut() {
                explorer.data.directory = directory.clone();
                explorer.data.entries = entries.clone();
            }
            let delta = WindowDelta { kind: WindowType::Explorer, body: DeltaBody::Explorer(ExplorerDelta { directory: Some(directory.clone()) }) };
            let _ = apply_delta(window, &delta);
            window.common_mut().summary = format!("{} items", entries.len());
            let audit = &mut window.common_mut().audit;
            audit.current_iteration += 1;
            let iteration = audit.current_iteration;
            Self::push_history(window, canonical_tool, arguments.clone(), iteration, success);
            iteration
        };

        self.apply_intent(&window_id, canonical_tool, arguments, result_json, user_intent_text);
        if success {
            self.mode_selector.mark_ingest_success();
        } else {
            let _ = self.mode_selector.mark_ingest_failure();
        }

        let window = self.windows.get(&window_id)?;
        let confirmation_text = success.then(|| build_explorer_confirmation(&window_id, &directory, canonical_tool, &entries));
        let tool_perception_block = renderer::render_tool_perception_block(&renderer::build_tool_perception_payload(window));
        let _ = iteration;

        Some(ToolObservation { window_id, window_kind: WindowType::Explorer, confirmation_text, tool_perception_block, repeat_warning: false })
    }

    fn observe_sheet_call(
        &mut self,
        canonical_tool: &str,
        tool_meta: &crate::rules::ToolMeta,
        arguments: &Value,
        result_json: Option<&Value>,
        success: bool,
        user_intent_text: &str,
    ) -> Option<ToolObservation> {
        let file_path = extractor::extract_file_path(arguments, result_json);
        let sheet_name = extractor::extract_sheet_name(arguments, result_json);
        if file_path.is_empty() || sheet_name.is_empty() {
            return None;
        }
        let window_id = self.resolve_or_create_sheet(&file_path, &sheet_name);
        self.touch(&window_id);

        let (range_used, change_type, change_summary, touched) = self.ingest_sheet_result(&window_id, canonical_tool, tool_meta, arguments, result_json, success);
        self.apply_sheet_common_details(&window_id, result_json, canonical_tool);
        self.apply_intent(&window_id, canonical_tool, arguments, result_json, user_intent_text);

        let tag = self.windows.get(&window_id).map_or(IntentTag::General, |w| w.common().intent.tag);
        let mut repeat_warning = false;
        if tool_meta.read_like {
            let count = self.repeat_detector.record_read(&file_path, &sheet_name, &range_used, tag);
            let thresholds = repeat_threshold(tag, BASE_REPEAT_WARN, BASE_REPEAT_TRIP);
            if count >= thresholds.trip {
                let _ = self.mode_selector.mark_repeat_tripwire();
                repeat_warning = true;
            } else if count >= thresholds.warn {
                repeat_warning = true;
            }
        } else if tool_meta.write_like {
            self.repeat_detector.record_write(&file_path, &sheet_name);
        }
        if success {
            self.mode_selector.mark_ingest_success();
        } else {
            let _ = self.mode_selector.mark_ingest_failure();
        }

        {
            let window = self.windows.get_mut(&window_id)?;
            let iteration = window.common().audit.current_iteration;
            Self::push_history(window, canonical_tool, arguments.clone(), iteration, success);
            if success {
                let record = ingest::make_change_record(canonical_tool, &change_summary, &range_used, &change_type, iteration, touched.iter().map(|&i| i as i64).collect());
                Self::push_change(window, record);
                window.common_mut().summary.clone_from(&change_summary);
            }
        }

        let mode = self.resolve_effective_mode();
        let window = self.windows.get(&window_id)?;
        let confirmation_text = success.then(|| serialize_confirmation(&build_confirmation_record(window, canonical_tool, repeat_warning), mode));
        let tool_perception_block = renderer::render_tool_perception_block(&renderer::build_tool_perception_payload(window));

        Some(ToolObservation { window_id, window_kind: WindowType::Sheet, confirmation_text, tool_perception_block, repeat_warning })
    }

    /// Dispatch a sheet tool call into the ingest pipeline, returning
    /// `(range_used, change_type, change_summary, touched_row_indices)`.
    fn ingest_sheet_result(
        &mut self,
        window_id: &str,
        canonical_tool: &str,
        tool_meta: &crate::rules::ToolMeta,
        arguments: &Value,
        result_json: Option<&Value>,
        success: bool,
    ) -> (String, String, String, Vec<usize>) {
        let Some(window) = self.windows.get_mut(window_id) else { return (String::new(), String::new(), String::new(), Vec::new()) };
        let Some(sheet) = window.as_sheet_mut() else { return (String::new(), String::new(), String::new(), Vec::new()) };
        sheet.common.audit.current_iteration += 1;
        let iteration = sheet.common.audit.current_iteration;

        if !success {
            return (sheet.viewport_range().to_string(), "error".to_string(), "tool call failed".to_string(), Vec::new());
        }

        if canonical_tool == "filter_data" {
            let filter_condition = arguments.get("conditions").cloned().unwrap_or_else(|| single_condition_fallback(arguments));
            let filtered_rows = ingest::extract_data_rows(result_json);
            let touched = ingest::ingest_filter_result(sheet, filter_condition, &filtered_rows, iteration);
            refresh_preview(sheet);
            let summary = format!("filter result: {} rows", filtered_rows.len());
            return (sheet.viewport_range().to_string(), "filter".to_string(), summary, touched);
        }

        if tool_meta.write_like {
            let target_range = extractor::extract_range_ref(arguments, self.config.budget.default_rows, self.config.budget.default_cols);
            let touched = ingest::ingest_write_result(sheet, &target_range, result_json, iteration);
            refresh_preview(sheet);
            let change_type = if canonical_tool.contains("format") || matches!(canonical_tool, "merge_cells" | "unmerge_cells" | "adjust_column_width" | "adjust_row_height" | "add_color_scale" | "add_data_bar" | "add_conditional_rule") {
                "style"
            } else {
                "write"
            };
            let summary = if touched.is_empty() { format!("{target_range} updated (values not re-confirmed)") } else { format!("{target_range}: {} cells updated", touched.len()) };
            return (target_range, change_type.to_string(), summary, touched);
        }

        let new_range = extractor::extract_range_ref(arguments, self.config.budget.default_rows, self.config.budget.default_cols);
        let rows = ingest::extract_data_rows(result_json);
        let touched = ingest::ingest_read_result(sheet, &new_range, &rows, iteration);
        refresh_preview(sheet);

        let (explicit_rows, explicit_cols) = extractor::extract_shape(result_json);
        let (total_rows, total_cols) = summarize_shape(sheet.total_rows(), sheet.total_cols(), &rows, explicit_rows, explicit_cols);
        sheet.data.total_rows = total_rows;
        sheet.data.total_cols = total_cols;

        let tabs = extractor::extract_sheet_tabs(result_json);
        if !tabs.is_empty() {
            sheet.data.sheet_tabs = tabs;
        }

        let geometry = geometry::extract_viewport_geometry(&new_range, self.config.budget.default_rows, self.config.budget.default_cols);
        sheet.data.viewport = Some(Viewport { range_ref: new_range.clone(), visible_rows: geometry.visible_rows, visible_cols: geometry.visible_cols, total_rows, total_cols });

        let summary = format!("read {} rows", rows.len());
        (new_range, "read".to_string(), summary, touched)
    }

    fn apply_sheet_common_details(&mut self, window_id: &str, result_json: Option<&Value>, canonical_tool: &str) {
        let Some(window) = self.windows.get_mut(window_id) else { return };
        let Some((total_rows, total_cols, viewport_range, sheet_name)) = window.as_sheet().map(|s| (s.total_rows(), s.total_cols(), s.viewport_range().to_string(), s.data.sheet_name.clone()))
        else {
            return;
        };

        let geom = geometry::extract_viewport_geometry(&viewport_range, self.config.budget.default_rows, self.config.budget.default_cols);
        let scroll = geometry::compute_scroll_position(geom, total_rows, total_cols);
        set_scroll_position_metadata(window, scroll);

        let preview_rows = extractor::extract_preview_rows(result_json);
        if let Some(status) = geometry::extract_status_bar(&preview_rows) {
            set_status_bar_metadata(window, status);
        }

        let widths = geometry::extract_column_widths(result_json, &sheet_name);
        merge_numeric_map_metadata(window, "column_widths", widths);
        let heights = geometry::extract_row_heights(result_json);
        merge_numeric_map_metadata(window, "row_heights", heights);

        let (adds, removes) =
            if matches!(canonical_tool, "merge_cells" | "unmerge_cells") { geometry::extract_merged_range_delta(result_json) } else { (geometry::extract_merged_ranges(result_json), Vec::new()) };
        if !adds.is_empty() || !removes.is_empty() {
            merge_ranges_metadata(window, adds, removes);
        }

        let effects = geometry::extract_conditional_effects(result_json);
        merge_conditional_effects_metadata(window, effects);

        let freeze_panes = extractor::extract_freeze_panes(result_json);
        let style_summary = extractor::extract_style_summary(result_json);
        if freeze_panes.is_some() || !style_summary.is_empty() {
            let delta = WindowDelta {
                kind: WindowType::Sheet,
                body: DeltaBody::SheetStyle(SheetStyleDelta { style_summary: (!style_summary.is_empty()).then_some(style_summary), freeze_panes, ..SheetStyleDelta::default() }),
            };
            let _ = apply_delta(window, &delta);
        }
    }

    /// Build this turn's system-notice block: rank windows via the
    /// lifecycle advisor, allocate them against the token budget, apply
    /// the resulting tiers back onto window state (including closing
    /// windows that fell out), and render the surviving snapshots.
    pub fn build_system_notice(&mut self) -> String {
        let active_id = self.active_window_id.clone();
        let views: Vec<WindowLifecycleView> = self.windows.values().map(|w| WindowLifecycleView { id: w.id().to_string(), idle_turns: w.common().lifecycle.idle_turns }).collect();
        let plan = self.advisor.advise_at_turn(&views, active_id.as_deref(), &self.config.budget, self.turn_number);

        let candidates: Vec<WindowRenderCandidate> = self
            .windows
            .values()
            .map(|w| WindowRenderCandidate {
                window_id: w.id().to_string(),
                is_active: Some(w.id()) == active_id.as_deref(),
                must_keep: Some(w.id()) == active_id.as_deref(),
                last_access_seq: w.common().lifecycle.last_access_seq,
                active_text: renderer::render_window_keep(w),
                background_text: renderer::render_window_background(w),
                suspended_text: renderer::render_window_minimized(w),
            })
            .collect();

        let allocator = WindowBudgetAllocator::new(self.config.budget.clone());
        let snapshots = allocator.allocate(&candidates, active_id.as_deref(), &plan);
        self.apply_lifecycle_tiers(&snapshots);
        renderer::render_system_notice(&snapshots)
    }

    fn apply_lifecycle_tiers(&mut self, snapshots: &[crate::models::WindowSnapshot]) {
        for snapshot in snapshots {
            match snapshot.action {
                WindowRenderAction::Close => {
                    self.windows.remove(&snapshot.window_id);
                    self.locator.remove(&snapshot.window_id);
                    if self.active_window_id.as_deref() == Some(snapshot.window_id.as_str()) {
                        self.active_window_id = None;
                    }
                },
                WindowRenderAction::Minimize => {
                    if let Some(window) = self.windows.get_mut(&snapshot.window_id) {
                        let delta = WindowDelta { kind: window.kind(), body: DeltaBody::Lifecycle(LifecycleDelta { detail_level: Some(DetailLevel::Icon), dormant: Some(true), ..LifecycleDelta::default() }) };
                        let _ = apply_delta(window, &delta);
                    }
                },
                WindowRenderAction::Keep => {
                    if let Some(window) = self.windows.get_mut(&snapshot.window_id) {
                        let level = if Some(snapshot.window_id.as_str()) == self.active_window_id.as_deref() { DetailLevel::Full } else { DetailLevel::Summary };
                        let delta = WindowDelta { kind: window.kind(), body: DeltaBody::Lifecycle(LifecycleDelta { detail_level: Some(level), dormant: Some(false), ..LifecycleDelta::default() }) };
                        let _ = apply_delta(window, &delta);
                    }
                },
            }
        }
    }

    /// Dispatch a `focus_window` call against `window_id`.
    ///
    /// # Errors
    ///
    /// Returns [`WindowError::UnknownWindow`] if no such window is open,
    /// or [`WindowError::InvalidFocusAction`] if `action` isn't recognised.
    pub fn focus_window_action(&mut self, window_id: &str, action: &str, range_ref: Option<&str>, rows: Option<i64>) -> WindowResult<FocusOutcome> {
        let parsed = FocusAction::parse(action).ok_or_else(|| WindowError::InvalidFocusAction(action.to_string()))?;
        let window = self.windows.get_mut(window_id).ok_or_else(|| WindowError::UnknownWindow(window_id.to_string()))?;
        let outcome = self.focus_service.apply(window, parsed, range_ref, rows);
        if outcome.ok {
            self.touch(window_id);
        }
        Ok(outcome)
    }

    /// Feed a fresh read result back into a window that `focus_window`
    /// flagged as `needs_refill`.
    ///
    /// # Errors
    ///
    /// Returns [`WindowError::UnknownWindow`] if no such window is open.
    pub fn ingest_focus_refill(&mut self, window_id: &str, range_ref: &str, result_json: Option<&Value>) -> WindowResult<()> {
        let window = self.windows.get_mut(window_id).ok_or_else(|| WindowError::UnknownWindow(window_id.to_string()))?;
        let iteration = {
            let audit = &mut window.common_mut().audit;
            audit.current_iteration += 1;
            audit.current_iteration
        };
        self.focus_service.ingest_refill_result(window, range_ref, result_json, iteration);
        drop(window);
        self.apply_sheet_common_details(window_id, result_json, "focus_window_refill");
        self.touch(window_id);
        Ok(())
    }
}

fn refresh_preview(sheet: &mut SheetWindow) {
    sheet.data.cache.preview_rows = sheet.data.cache.data_buffer.iter().take(25).cloned().collect();
}

fn single_condition_fallback(arguments: &Value) -> Value {
    let column = arguments.get("column").cloned();
    let operator = arguments.get("operator").cloned();
    let value = arguments.get("value").cloned();
    if column.is_none() && operator.is_none() && value.is_none() {
        return Value::Null;
    }
    serde_json::json!({"column": column, "operator": operator, "value": value})
}

fn summarize_shape(existing_rows: i64, existing_cols: i64, result_rows: &[Value], explicit_rows: i64, explicit_cols: i64) -> (i64, i64) {
    let inferred_cols = result_rows.first().and_then(Value::as_object).map_or(0, |m| m.len() as i64);
    let rows = explicit_rows.max(existing_rows).max(result_rows.len() as i64);
    let cols = explicit_cols.max(existing_cols).max(inferred_cols);
    (rows, cols)
}

fn build_explorer_confirmation(window_id: &str, directory: &str, tool_name: &str, entries: &[String]) -> String {
    let mut lines = vec![format!("[OK] [{window_id}: {directory}] {tool_name} | {} items", entries.len())];
    for entry in entries.iter().take(15) {
        lines.push(format!("  {entry}"));
    }
    if entries.len() > 15 {
        lines.push(format!("  ... (+{} more)", entries.len() - 15));
    }
    lines.join("\n")
}

fn set_metadata(window: &mut Window, field: &str, value: Value) {
    let delta = WindowDelta { kind: window.kind(), body: DeltaBody::FieldSet(FieldSetDelta { field: field.to_string(), value }) };
    let _ = apply_delta(window, &delta);
}

fn set_scroll_position_metadata(window: &mut Window, pos: ScrollPosition) {
    let value = serde_json::json!({
        "vertical_pct": pos.vertical_pct,
        "horizontal_pct": pos.horizontal_pct,
        "remaining_rows_pct": pos.remaining_rows_pct,
        "remaining_cols_pct": pos.remaining_cols_pct,
    });
    set_metadata(window, "scroll_position", value);
}

fn set_status_bar_metadata(window: &mut Window, summary: StatusBarSummary) {
    let value = serde_json::json!({"sum": summary.sum, "count": summary.count, "average": summary.average});
    set_metadata(window, "status_bar", value);
}

fn merge_numeric_map_metadata(window: &mut Window, field: &str, new_map: HashMap<String, f64>) {
    if new_map.is_empty() {
        return;
    }
    let mut merged = window.common().metadata.get(field).and_then(Value::as_object).cloned().unwrap_or_default();
    for (key, value) in new_map {
        merged.insert(key, Value::from(value));
    }
    set_metadata(window, field, Value::Object(merged));
}

fn merge_ranges_metadata(window: &mut Window, adds: Vec<String>, removes: Vec<String>) {
    let mut existing: Vec<String> = window.common().metadata.get("merged_ranges").and_then(Value::as_array).map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect()).unwrap_or_default();
    existing.retain(|r| !removes.contains(r));
    for add in adds {
        if !existing.contains(&add) {
            existing.push(add);
        }
    }
    set_metadata(window, "merged_ranges", Value::Array(existing.into_iter().map(Value::String).collect()));
}

fn merge_conditional_effects_metadata(window: &mut Window, new_effects: Vec<String>) {
    if new_effects.is_empty() {
        return;
    }
    let mut existing: Vec<String> =
        window.common().metadata.get("conditional_effects").and_then(Value::as_array).map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect()).unwrap_or_default();
    for effect in new_effects {
        if !existing.contains(&effect) {
            existing.push(effect);
        }
    }
    existing.truncate(12);
    set_metadata(window, "conditional_effects", Value::Array(existing.into_iter().map(Value::String).collect()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manager() -> WindowPerceptionManager {
        WindowPerceptionManager::new(ManagerConfig { confirmation_mode_request: "unified".to_string(), ..ManagerConfig::default() })
    }

    #[test]
    fn unknown_tool_is_skipped() {
        let mut mgr = manager();
        assert!(mgr.observe_tool_call("totally_unknown_tool", &Value::Null, None, true, "").is_none());
    }

    #[test]
    fn read_excel_creates_a_sheet_window_and_confirms() {
        let mut mgr = manager();
        let args = json!({"file_path": "a.xlsx", "sheet_name": "Sheet1", "range": "A1:B2"});
        let result = json!({"data": [{"a": 1, "b": 2}, {"a": 3, "b": 4}]});
        let observation = mgr.observe_tool_call("read_excel", &args, Some(&result), true, "").unwrap();
        assert_eq!(observation.window_kind, WindowType::Sheet);
        assert!(observation.confirmation_text.unwrap().contains("read_excel"));
        assert_eq!(mgr.window_ids().count(), 1);
    }

    #[test]
    fn repeated_identical_reads_eventually_warn() {
        let mut mgr = manager();
        let args = json!({"file_path": "a.xlsx", "sheet_name": "Sheet1", "range": "A1:B2"});
        let result = json!({"data": [{"a": 1}]});
        let mut last_warning = false;
        for _ in 0..6 {
            let observation = mgr.observe_tool_call("read_excel", &args, Some(&result), true, "").unwrap();
            last_warning = observation.repeat_warning;
        }
        assert!(last_warning);
    }

    #[test]
    fn list_directory_creates_an_explorer_window() {
        let mut mgr = manager();
        let args = json!({"directory": "/data"});
        let result = json!({"entries": [{"name": "a.xlsx", "type": "file"}]});
        let observation = mgr.observe_tool_call("list_directory", &args, Some(&result), true, "").unwrap();
        assert_eq!(observation.window_kind, WindowType::Explorer);
        assert!(observation.confirmation_text.unwrap().contains("1 items"));
    }

    #[test]
    fn write_excel_marks_style_change_type_for_format_tools() {
        let mut mgr = manager();
        let read_args = json!({"file_path": "a.xlsx", "sheet_name": "Sheet1", "range": "A1:B2"});
        mgr.observe_tool_call("read_excel", &read_args, Some(&json!({"data": [{"a": 1, "b": 2}]})), true, "").unwrap();
        let style_args = json!({"file_path": "a.xlsx", "sheet_name": "Sheet1", "range": "A1:B2"});
        let style_result = json!({"freeze_panes": "B2"});
        let observation = mgr.observe_tool_call("format_range", &style_args, Some(&style_result), true, "").unwrap();
        let window = mgr.window(&observation.window_id).unwrap();
        assert_eq!(window.as_sheet().unwrap().data.style.freeze_panes.as_deref(), Some("B2"));
    }

    #[test]
    fn build_system_notice_renders_the_active_window() {
        let mut mgr = manager();
        let args = json!({"file_path": "a.xlsx", "sheet_name": "Sheet1", "range": "A1:B2"});
        mgr.observe_tool_call("read_excel", &args, Some(&json!({"data": [{"a": 1, "b": 2}]})), true, "").unwrap();
        let notice = mgr.build_system_notice();
        assert!(notice.contains("a.xlsx"));
    }

    #[test]
    fn focus_window_on_unknown_id_is_rejected() {
        let mut mgr = manager();
        assert!(mgr.focus_window_action("nope", "restore", None, None).is_err());
    }
}
