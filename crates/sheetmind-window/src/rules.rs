//! Tool classification and intent resolution.
//!
//! The keyword table resolving user-expressed intent uses English
//! phrases. The reference implementation's table was Chinese-only;
//! this crate's domain is English-speaking, and the table is built to
//! be swappable (a caller can supply its own via
//! [`ToolClassifier::with_user_keywords`]) rather than hard-coding one
//! language.

use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;

use crate::models::{IntentTag, WindowType};

static FORMULA_HINT_PATTERN: &str = r"(=|SUMIFS\s*\(|VLOOKUP\s*\(|XLOOKUP\s*\(|INDEX\s*\(|MATCH\s*\(|IF\s*\()";

fn explorer_tools() -> &'static [&'static str] {
    &["list_directory", "find_files", "inspect_excel_files"]
}

fn sheet_tools() -> &'static [&'static str] {
    &[
        "read_excel",
        "read_sheet",
        "analyze_data",
        "filter_data",
        "transform_data",
        "list_sheets",
        "describe_sheets",
        "write_excel",
        "write_to_sheet",
        "write_cells",
        "format_cells",
        "format_range",
        "adjust_column_width",
        "adjust_row_height",
        "merge_cells",
        "unmerge_cells",
        "read_cell_styles",
        "add_color_scale",
        "add_data_bar",
        "add_conditional_rule",
        "create_sheet",
        "copy_sheet",
        "rename_sheet",
        "delete_sheet",
        "copy_range_between_sheets",
        "focus_window_refill",
    ]
}

fn read_like_tools() -> &'static [&'static str] {
    &["read_excel", "read_sheet", "analyze_data", "filter_data", "transform_data", "read_cell_styles", "focus_window_refill"]
}

fn write_like_tools() -> &'static [&'static str] {
    &[
        "write_excel",
        "write_to_sheet",
        "write_cells",
        "format_cells",
        "format_range",
        "adjust_column_width",
        "adjust_row_height",
        "merge_cells",
        "unmerge_cells",
        "add_color_scale",
        "add_data_bar",
        "add_conditional_rule",
    ]
}

fn format_intent_tools() -> &'static [&'static str] {
    &["format_cells", "format_range", "adjust_column_width", "adjust_row_height", "merge_cells", "unmerge_cells", "add_color_scale", "add_data_bar", "add_conditional_rule", "read_cell_styles"]
}

fn aggregate_intent_tools() -> &'static [&'static str] {
    &["analyze_data", "transform_data"]
}

fn validate_intent_tools() -> &'static [&'static str] {
    &["filter_data"]
}

fn entry_intent_tools() -> &'static [&'static str] {
    &["write_excel", "write_to_sheet", "write_cells"]
}

/// Default English keyword table for user-expressed intent matching.
fn default_user_keywords() -> HashMap<IntentTag, Vec<&'static str>> {
    HashMap::from([
        (IntentTag::Aggregate, vec!["summarize", "total", "sum", "average", "year over year", "month over month", "breakdown", "sales", "share of"]),
        (IntentTag::Format, vec!["format", "style", "bold", "color", "font", "column width", "row height", "border", "merge", "conditional format"]),
        (IntentTag::Validate, vec!["blank", "missing", "anomaly", "duplicate", "validate", "integrity", "consistency", "dirty data"]),
        (IntentTag::Formula, vec!["formula", "function", "reference", "calculation error", "VLOOKUP", "XLOOKUP", "SUMIFS"]),
        (IntentTag::Entry, vec!["write", "enter", "fill in", "update", "overwrite", "add new"]),
    ])
}

fn task_type_for(intent: IntentTag) -> &'static str {
    match intent {
        IntentTag::Aggregate => "DATA_COMPARISON",
        IntentTag::Format => "FORMAT_CHECK",
        IntentTag::Validate => "ANOMALY_SEARCH",
        IntentTag::Formula => "FORMULA_DEBUG",
        IntentTag::Entry => "DATA_ENTRY",
        IntentTag::General => "GENERAL_BROWSE",
    }
}

/// Map a resolved intent to the small-model advisor's task-type label.
#[must_use]
pub fn task_type_from_intent(intent: IntentTag) -> &'static str {
    task_type_for(intent)
}

/// A tool's classification: which window kind it targets (if any) and
/// whether it's read-like or write-like for repeat-detection purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolMeta {
    /// Lower-cased canonical tool name.
    pub canonical_name: String,
    /// The window kind this tool targets, or `None` if unrecognised
    /// (unknown tools skip all perception processing).
    pub window_type: Option<WindowType>,
    /// Whether this tool's successful calls should feed the repeat detector.
    pub read_like: bool,
    /// Whether this tool's successful calls should reset read counters.
    pub write_like: bool,
    /// Which classification rule matched, for debugging.
    pub rule_id: &'static str,
}

/// Classify `tool_name` into its window kind and read/write-like flags.
/// Unknown tools get `window_type: None` and are skipped by the ingest
/// pipeline entirely.
#[must_use]
pub fn classify_tool(tool_name: &str) -> ToolMeta {
    let name = tool_name.trim();
    if name.is_empty() {
        return ToolMeta { canonical_name: String::new(), window_type: None, read_like: false, write_like: false, rule_id: "empty_tool" };
    }
    let canonical = name.to_lowercase();
    if explorer_tools().contains(&canonical.as_str()) {
        return build_tool_meta(canonical, Some(WindowType::Explorer), "builtin_explorer");
    }
    if sheet_tools().contains(&canonical.as_str()) {
        return build_tool_meta(canonical, Some(WindowType::Sheet), "builtin_sheet");
    }
    build_tool_meta(canonical, None, "unknown_tool")
}

fn build_tool_meta(canonical: String, window_type: Option<WindowType>, rule_id: &'static str) -> ToolMeta {
    let read_like = read_like_tools().contains(&canonical.as_str());
    let write_like = write_like_tools().contains(&canonical.as_str());
    ToolMeta { canonical_name: canonical, window_type, read_like, write_like, rule_id }
}

/// `true` if the tool's successful calls should be fed to the repeat detector's read counter.
#[must_use]
pub fn is_read_like_tool(tool_name: &str) -> bool {
    classify_tool(tool_name).read_like
}

/// `true` if the tool's successful calls should reset the repeat detector's read counters.
#[must_use]
pub fn is_write_like_tool(tool_name: &str) -> bool {
    classify_tool(tool_name).write_like
}

/// The resolved intent decision for one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentDecision {
    /// The resolved intent tag.
    pub tag: IntentTag,
    /// Confidence in `tag`, clamped to `[0.0, 1.0]`.
    pub confidence: f64,
    /// `"carry"`, `"user_rule"`, `"tool_rule"`, or `"default"`.
    pub source: &'static str,
    /// Whether this decision is a forced user switch (bypasses sticky lock).
    pub force: bool,
    /// Which rule matched, for debugging.
    pub rule_id: String,
}

/// Resolves user-expressed and tool-inferred intent against a
/// configurable keyword table.
pub struct IntentResolver {
    user_keywords: HashMap<IntentTag, Vec<String>>,
    formula_hint: Regex,
}

impl Default for IntentResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentResolver {
    /// Build a resolver with the default English keyword table.
    #[must_use]
    pub fn new() -> Self {
        let user_keywords = default_user_keywords().into_iter().map(|(tag, words)| (tag, words.into_iter().map(str::to_string).collect())).collect();
        Self { user_keywords, formula_hint: Regex::new(FORMULA_HINT_PATTERN).expect("static formula hint pattern is valid") }
    }

    /// Replace the user-keyword table entirely (e.g. for another language).
    #[must_use]
    pub fn with_user_keywords(mut self, table: HashMap<IntentTag, Vec<String>>) -> Self {
        self.user_keywords = table;
        self
    }

    /// Resolve the intent decision for one tool call, applying the
    /// precedence: user-expressed > tool-inferred > sticky lock >
    /// carry/default.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn resolve(
        &self,
        current_tag: IntentTag,
        current_confidence: f64,
        current_lock_until_turn: i64,
        current_turn: i64,
        intent_enabled: bool,
        user_intent_text: &str,
        canonical_tool_name: &str,
        arguments: &Value,
        result_json: Option<&Value>,
    ) -> IntentDecision {
        if !intent_enabled {
            return IntentDecision { tag: current_tag, confidence: clamp(current_confidence), source: "carry", force: false, rule_id: "intent_disabled".to_string() };
        }

        let (user_tag, user_conf, user_rule_id) = self.intent_from_user(user_intent_text);
        let (tool_tag, tool_conf, tool_rule_id) = self.intent_from_tool(canonical_tool_name, arguments, result_json, current_tag);

        let force_switch = user_tag != IntentTag::General && user_conf >= 0.75;
        let (mut tag, mut confidence, mut source, mut rule_id) = (current_tag, clamp(current_confidence), "carry", "carry".to_string());

        if force_switch {
            (tag, confidence, source, rule_id) = (user_tag, user_conf, "user_rule", user_rule_id);
        } else if user_tag != IntentTag::General && user_conf >= 0.5 {
            (tag, confidence, source, rule_id) = (user_tag, user_conf, "user_rule", user_rule_id);
        } else if tool_tag != IntentTag::General {
            (tag, confidence, source, rule_id) = (tool_tag, tool_conf, "tool_rule", tool_rule_id);
        } else if current_tag == IntentTag::General {
            (tag, confidence, source, rule_id) = (IntentTag::General, 0.0, "default", "fallback_general".to_string());
        }

        if !force_switch && current_lock_until_turn >= current_turn.max(1) && tag != current_tag {
            return IntentDecision { tag: current_tag, confidence: clamp(current_confidence), source: "carry", force: false, rule_id: "sticky_lock".to_string() };
        }

        IntentDecision { tag, confidence: clamp(confidence), source, force: force_switch, rule_id }
    }

    fn intent_from_user(&self, text: &str) -> (IntentTag, f64, String) {
        let normalized = text.trim();
        if normalized.is_empty() {
            return (IntentTag::General, 0.0, "user_empty".to_string());
        }
        let lower = normalized.to_lowercase();

        let mut best: Option<(IntentTag, f64)> = None;
        for (tag, keywords) in &self.user_keywords {
            let hits = keywords.iter().filter(|kw| normalized.contains(kw.as_str()) || lower.contains(&kw.to_lowercase())).count();
            if hits == 0 {
                continue;
            }
            #[allow(clippy::cast_precision_loss)]
            let score = (0.55 + 0.15 * hits as f64).min(0.95);
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((*tag, score));
            }
        }

        if let Some((tag, score)) = best {
            return (tag, score, format!("user_keyword_{}", tag.as_str()));
        }

        let explicit_token = lower.trim();
        const KNOWN_TAGS: [IntentTag; 6] =
            [IntentTag::Aggregate, IntentTag::Format, IntentTag::Validate, IntentTag::Formula, IntentTag::Entry, IntentTag::General];
        if let Some(tag) = KNOWN_TAGS.into_iter().find(|t| t.as_str() == explicit_token) {
            (tag, 0.8, "user_explicit_enum".to_string())
        } else {
            (IntentTag::General, 0.0, "user_no_match".to_string())
        }
    }

    fn intent_from_tool(&self, canonical_tool_name: &str, arguments: &Value, result_json: Option<&Value>, current_tag: IntentTag) -> (IntentTag, f64, String) {
        let tool = canonical_tool_name.trim().to_lowercase();
        if format_intent_tools().contains(&tool.as_str()) {
            return (IntentTag::Format, 0.88, "tool_format".to_string());
        }
        if aggregate_intent_tools().contains(&tool.as_str()) {
            return (IntentTag::Aggregate, 0.84, "tool_aggregate".to_string());
        }
        if validate_intent_tools().contains(&tool.as_str()) {
            return (IntentTag::Validate, 0.9, "tool_validate".to_string());
        }
        if entry_intent_tools().contains(&tool.as_str()) {
            if self.has_formula_signal(arguments, result_json) {
                return (IntentTag::Formula, 0.9, "tool_formula_signal".to_string());
            }
            return (IntentTag::Entry, 0.84, "tool_entry".to_string());
        }
        if matches!(tool.as_str(), "read_excel" | "read_sheet" | "focus_window_refill") {
            if current_tag != IntentTag::General {
                return (current_tag, 0.7, "tool_read_carry".to_string());
            }
            return (IntentTag::Aggregate, 0.62, "tool_read_default_aggregate".to_string());
        }
        (IntentTag::General, 0.0, "tool_no_match".to_string())
    }

    fn has_formula_signal(&self, arguments: &Value, result_json: Option<&Value>) -> bool {
        iter_text_values(arguments).iter().any(|s| self.formula_hint.is_match(s))
            || result_json.is_some_and(|r| iter_text_values(r).iter().any(|s| self.formula_hint.is_match(s)))
    }
}

fn clamp(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

fn iter_text_values(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Object(map) => map.values().flat_map(iter_text_values).collect(),
        Value::Array(items) => items.iter().flat_map(iter_text_values).collect(),
        Value::Number(n) => vec![n.to_string()],
        Value::Bool(b) => vec![b.to_string()],
        Value::Null => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_tool_maps_known_sheet_tools() {
        let meta = classify_tool("read_excel");
        assert_eq!(meta.window_type, Some(WindowType::Sheet));
        assert!(meta.read_like);
        assert!(!meta.write_like);
    }

    #[test]
    fn classify_tool_is_case_insensitive() {
        assert_eq!(classify_tool("LIST_DIRECTORY").window_type, Some(WindowType::Explorer));
    }

    #[test]
    fn classify_unknown_tool_skips_perception() {
        assert_eq!(classify_tool("some_other_tool").window_type, None);
    }

    #[test]
    fn user_keyword_hit_beats_tool_rule() {
        let resolver = IntentResolver::new();
        let decision = resolver.resolve(IntentTag::General, 0.0, 0, 1, true, "please summarize the total", "read_excel", &Value::Null, None);
        assert_eq!(decision.tag, IntentTag::Aggregate);
        assert_eq!(decision.source, "user_rule");
    }

    #[test]
    fn formula_signal_in_write_arguments_switches_to_formula() {
        let resolver = IntentResolver::new();
        let args = serde_json::json!({"formula": "=SUMIFS(A:A,B:B,1)"});
        let decision = resolver.resolve(IntentTag::General, 0.0, 0, 1, true, "", "write_cells", &args, None);
        assert_eq!(decision.tag, IntentTag::Formula);
        assert_eq!(decision.source, "tool_rule");
    }

    #[test]
    fn sticky_lock_blocks_non_forced_switch() {
        let resolver = IntentResolver::new();
        let decision = resolver.resolve(IntentTag::Entry, 0.5, 5, 2, true, "", "analyze_data", &Value::Null, None);
        assert_eq!(decision.tag, IntentTag::Entry);
        assert_eq!(decision.rule_id, "sticky_lock");
    }

    #[test]
    fn force_switch_bypasses_sticky_lock() {
        let resolver = IntentResolver::new();
        let decision = resolver.resolve(IntentTag::Entry, 0.5, 5, 2, true, "please validate for missing data", "analyze_data", &Value::Null, None);
        assert_eq!(decision.tag, IntentTag::Validate);
        assert!(decision.force);
    }

    #[test]
    fn default_fallback_when_everything_is_general() {
        let resolver = IntentResolver::new();
        let decision = resolver.resolve(IntentTag::General, 0.0, 0, 1, true, "", "list_directory", &Value::Null, None);
        assert_eq!(decision.tag, IntentTag::General);
        assert_eq!(decision.source, "default");
    }

    #[test]
    fn task_type_mapping_covers_every_intent() {
        assert_eq!(task_type_from_intent(IntentTag::Aggregate), "DATA_COMPARISON");
        assert_eq!(task_type_from_intent(IntentTag::General), "GENERAL_BROWSE");
    }
}
