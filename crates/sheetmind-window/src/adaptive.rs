//! Adaptive render-mode selection and downgrade state machine.

use std::collections::HashMap;

use tracing::{info, warn};

/// The three render modes, ordered from richest to most degraded.
const MODE_ORDER: [&str; 3] = ["unified", "anchored", "enriched"];
const DEFAULT_MODE: &str = "anchored";

const DEFAULT_PREFIX_MAP: &[(&str, &str)] =
    &[("gpt-5", "unified"), ("gpt-4", "unified"), ("moonshotai/kimi", "anchored"), ("kimi", "anchored"), ("claude-sonnet", "anchored"), ("sonnet", "anchored"), ("deepseek", "anchored")];

/// Chooses and downgrades the operational render mode based on the
/// model in use and the session's recent ingest/repeat history.
#[derive(Debug, Default)]
pub struct AdaptiveModeSelector {
    model_mode_overrides: HashMap<String, String>,
    current_mode: Option<String>,
    consecutive_ingest_failures: u32,
    requested_mode: String,
}

impl AdaptiveModeSelector {
    /// Build a selector with `overrides` (model-id-prefix -> mode,
    /// case-insensitive; invalid entries are silently dropped).
    #[must_use]
    pub fn new(overrides: HashMap<String, String>) -> Self {
        Self { model_mode_overrides: normalize_overrides(&overrides), requested_mode: DEFAULT_MODE.to_string(), ..Self::default() }
    }

    /// Resolve the mode to use this call. If `requested_mode` names an
    /// explicit mode, that mode is returned as-is; if it's `"adaptive"`,
    /// the initial mode is resolved once (by longest-prefix match
    /// against overrides, then the built-in default map) and cached
    /// for the rest of the session.
    pub fn select_mode(&mut self, model_id: &str, requested_mode: &str) -> String {
        let normalized_requested = normalize_requested_mode(requested_mode);
        self.requested_mode = normalized_requested.clone();
        if normalized_requested != "adaptive" {
            return normalized_requested;
        }

        if self.current_mode.is_none() {
            let resolved = self.resolve_initial_mode(model_id);
            info!(model_id, mode = %resolved, "adaptive mode: initial selection");
            self.current_mode = Some(resolved);
        }
        self.current_mode.clone().unwrap_or_else(|| DEFAULT_MODE.to_string())
    }

    /// Step one notch along `unified -> anchored -> enriched`, terminal
    /// at `enriched`.
    pub fn downgrade(&mut self, reason: &str) -> String {
        let previous = self.current_mode.clone().unwrap_or_else(|| DEFAULT_MODE.to_string());
        let previous = if MODE_ORDER.contains(&previous.as_str()) { previous } else { DEFAULT_MODE.to_string() };
        let index = MODE_ORDER.iter().position(|m| *m == previous).unwrap_or(0);
        let target = MODE_ORDER[(index + 1).min(MODE_ORDER.len() - 1)].to_string();
        self.current_mode = Some(target.clone());
        warn!(%previous, target = %target, reason, "adaptive mode: downgraded");
        target
    }

    /// Reset the consecutive-failure counter after a successful ingest.
    pub fn mark_ingest_success(&mut self) {
        self.consecutive_ingest_failures = 0;
    }

    /// Record an ingest failure; after 2 consecutive failures (without
    /// an intervening success), downgrades one step. Returns whether a
    /// downgrade happened.
    pub fn mark_ingest_failure(&mut self) -> bool {
        self.consecutive_ingest_failures += 1;
        if self.consecutive_ingest_failures < 2 {
            return false;
        }
        self.consecutive_ingest_failures = 0;
        self.downgrade("ingest_failures");
        true
    }

    /// Immediately downgrade one step in response to a repeat-read
    /// tripwire.
    pub fn mark_repeat_tripwire(&mut self) -> String {
        self.downgrade("repeat_tripwire")
    }

    /// Reset all session state (new session / new task boundary).
    pub fn reset(&mut self) {
        self.current_mode = None;
        self.consecutive_ingest_failures = 0;
        self.requested_mode = DEFAULT_MODE.to_string();
    }

    fn resolve_initial_mode(&self, model_id: &str) -> String {
        let normalized = model_id.trim().to_lowercase();
        if normalized.is_empty() {
            return DEFAULT_MODE.to_string();
        }
        if let Some(mode) = match_prefix(&self.model_mode_overrides, &normalized) {
            return mode;
        }
        let default_map: HashMap<&str, &str> = DEFAULT_PREFIX_MAP.iter().copied().collect();
        default_map
            .iter()
            .filter(|(prefix, _)| normalized.starts_with(**prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map_or_else(|| DEFAULT_MODE.to_string(), |(_, mode)| (*mode).to_string())
    }
}

fn match_prefix(prefix_map: &HashMap<String, String>, model_id: &str) -> Option<String> {
    prefix_map.iter().filter(|(prefix, _)| model_id.starts_with(prefix.as_str())).max_by_key(|(prefix, _)| prefix.len()).map(|(_, mode)| mode.clone())
}

fn normalize_requested_mode(requested_mode: &str) -> String {
    let value = requested_mode.trim().to_lowercase();
    if matches!(value.as_str(), "adaptive" | "unified" | "anchored" | "enriched") { value } else { DEFAULT_MODE.to_string() }
}

fn normalize_overrides(raw: &HashMap<String, String>) -> HashMap<String, String> {
    raw.iter()
        .filter_map(|(k, v)| {
            let key = k.trim().to_lowercase();
            let value = v.trim().to_lowercase();
            if key.is_empty() || !matches!(value.as_str(), "unified" | "anchored" | "enriched") {
                None
            } else {
                Some((key, value))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_requested_mode_bypasses_resolution() {
        let mut s = AdaptiveModeSelector::default();
        assert_eq!(s.select_mode("gpt-5", "enriched"), "enriched");
    }

    #[test]
    fn adaptive_resolves_via_longest_prefix_of_default_map() {
        let mut s = AdaptiveModeSelector::default();
        assert_eq!(s.select_mode("gpt-5-mini", "adaptive"), "unified");
    }

    #[test]
    fn overrides_take_priority_over_default_map() {
        let mut overrides = HashMap::new();
        overrides.insert("gpt-5".to_string(), "enriched".to_string());
        let mut s = AdaptiveModeSelector::new(overrides);
        assert_eq!(s.select_mode("gpt-5-mini", "adaptive"), "enriched");
    }

    #[test]
    fn downgrade_steps_through_the_chain_and_stops_at_enriched() {
        let mut s = AdaptiveModeSelector::default();
        s.select_mode("gpt-5", "adaptive");
        assert_eq!(s.downgrade("x"), "anchored");
        assert_eq!(s.downgrade("x"), "enriched");
        assert_eq!(s.downgrade("x"), "enriched");
    }

    #[test]
    fn two_consecutive_ingest_failures_trigger_downgrade() {
        let mut s = AdaptiveModeSelector::default();
        s.select_mode("gpt-5", "adaptive");
        assert!(!s.mark_ingest_failure());
        assert!(s.mark_ingest_failure());
        assert_eq!(s.current_mode.as_deref(), Some("anchored"));
    }

    #[test]
    fn success_resets_the_failure_counter() {
        let mut s = AdaptiveModeSelector::default();
        s.select_mode("gpt-5", "adaptive");
        s.mark_ingest_failure();
        s.mark_ingest_success();
        assert!(!s.mark_ingest_failure());
    }
}
