//! Optional async small-model lifecycle advisor: builds a compact
//! prompt describing open windows, and parses the model's JSON-only
//! reply back into a [`LifecyclePlan`].
//!
//! The actual network call is behind [`SmallModelClient`] so this
//! module stays testable without a live model; [`SmallModelAdvisor`]
//! wires a client into the hybrid advisor's refresh cycle.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::advisor::{LifecyclePlan, PlanSource, WindowAdvice, WindowTier};
use crate::models::PerceptionBudget;

/// Task-type classifications the small model is allowed to return.
pub const TASK_TYPES: [&str; 6] = ["DATA_COMPARISON", "FORMAT_CHECK", "FORMULA_DEBUG", "DATA_ENTRY", "ANOMALY_SEARCH", "GENERAL_BROWSE"];

/// Per-turn context that shapes the advisor prompt beyond raw window state.
#[derive(Debug, Clone, Default)]
pub struct AdvisorContext {
    /// Current turn counter.
    pub turn_number: i64,
    /// Whether this turn starts a new task (resets sticky state upstream).
    pub is_new_task: bool,
    /// Whether the open-window set changed since the last turn.
    pub window_count_changed: bool,
    /// Truncated summary of the user's current ask.
    pub user_intent_summary: String,
    /// Truncated summary of the agent's most recent output.
    pub agent_recent_output: String,
    /// Task-type hint carried from the previous turn, if any.
    pub task_type: Option<String>,
}

/// A compact window view sent to the small model (not the full domain
/// state — field-for-field what the prompt actually needs).
#[derive(Debug, Clone, Serialize)]
pub struct CompactWindowView {
    /// Window id.
    pub id: String,
    /// `"explorer"` or `"sheet"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// File path, empty for explorer windows.
    pub file_path: String,
    /// Sheet name, empty for explorer windows.
    pub sheet_name: String,
    /// Turns since this window was last the active one.
    pub idle_turns: i64,
    /// Global access counter value at last touch.
    pub last_access_seq: i64,
    /// Truncated free-text summary.
    pub summary: String,
    /// Truncated viewport shape.
    pub viewport: CompactViewport,
}

/// The viewport fields sent alongside [`CompactWindowView`].
#[derive(Debug, Clone, Serialize, Default)]
pub struct CompactViewport {
    /// Current range, or empty if none.
    pub range: String,
    /// Total row count, or 0 if unknown.
    pub rows: i64,
    /// Total column count, or 0 if unknown.
    pub cols: i64,
}

/// A chat message, role + content, as sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmallModelMessage {
    /// `"system"` or `"user"`.
    pub role: String,
    /// Message text.
    pub content: String,
}

/// Build the `(system, user)` message pair for a lifecycle-advice request.
#[must_use]
pub fn build_advisor_messages(windows: &[CompactWindowView], active_window_id: Option<&str>, budget: &PerceptionBudget, context: &AdvisorContext) -> Vec<SmallModelMessage> {
    let payload = serde_json::json!({
        "active_window_id": active_window_id,
        "turn_context": {
            "turn_number": context.turn_number,
            "is_new_task": context.is_new_task,
            "window_count_changed": context.window_count_changed,
            "user_intent_summary": truncate(&context.user_intent_summary, 200),
            "agent_recent_output": truncate(&context.agent_recent_output, 200),
            "task_type_hint": context.task_type.clone().unwrap_or_else(|| "GENERAL_BROWSE".to_string()),
        },
        "budget": {
            "system_budget_tokens": budget.system_budget_tokens,
            "max_windows": budget.max_windows,
            "minimized_tokens": budget.minimized_tokens,
            "background_after_idle": budget.background_after_idle,
            "suspend_after_idle": budget.suspend_after_idle,
            "terminate_after_idle": budget.terminate_after_idle,
        },
        "windows": windows.iter().take(8).collect::<Vec<_>>(),
    });

    let system_prompt = format!(
        "You are a window lifecycle advisor. Output only a JSON object, no explanation. \
         You must return fields task_type and advices. task_type must be one of {}. \
         advices is an array, each item containing window_id, tier, reason, custom_summary. \
         tier must be one of active/background/suspended/terminated.",
        TASK_TYPES.join(", ")
    );
    let user_prompt = format!(
        "Give lifecycle advice for the next turn based on the window state below.\n\
         Example output shape:\n\
         {{\"task_type\":\"GENERAL_BROWSE\",\"advices\":[{{\"window_id\":\"sheet_1\",\"tier\":\"background\",\"reason\":\"idle=2\",\"custom_summary\":\"done\"}}]}}\n\
         Input:\n{payload}"
    );
    vec![SmallModelMessage { role: "system".to_string(), content: system_prompt }, SmallModelMessage { role: "user".to_string(), content: user_prompt }]
}

/// A parsed small-model plan plus the task-type classification it came
/// with — kept separate from [`LifecyclePlan`] since that type is
/// shared with the purely rule-based path, which has no task type.
#[derive(Debug, Clone)]
pub struct SmallModelPlanResult {
    /// The lifecycle plan itself.
    pub plan: LifecyclePlan,
    /// The classified task type (one of [`TASK_TYPES`]).
    pub task_type: String,
    /// Turn the model reports this plan was generated for, if given.
    pub generated_turn: i64,
}

static JSON_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").unwrap());

/// Parse a small model's free-form reply into a [`SmallModelPlanResult`],
/// tolerating a fenced code block or surrounding prose around the JSON
/// object. Returns `None` if no valid object with a recognised
/// `task_type` and an `advices` array can be found.
#[must_use]
pub fn parse_small_model_plan(text: &str) -> Option<SmallModelPlanResult> {
    let parsed = parse_json_object(text)?;
    let map = parsed.as_object()?;

    let task_type = map.get("task_type")?.as_str()?.trim().to_uppercase();
    if !TASK_TYPES.contains(&task_type.as_str()) {
        return None;
    }

    let raw_advices = map.get("advices")?.as_array()?;
    let advices: Vec<WindowAdvice> = raw_advices
        .iter()
        .filter_map(|raw| {
            let obj = raw.as_object()?;
            let window_id = obj.get("window_id")?.as_str()?.trim().to_string();
            let tier_str = obj.get("tier")?.as_str()?.trim().to_lowercase();
            if window_id.is_empty() {
                return None;
            }
            let tier = match tier_str.as_str() {
                "active" => WindowTier::Active,
                "background" => WindowTier::Background,
                "suspended" => WindowTier::Suspended,
                "terminated" => WindowTier::Terminated,
                _ => return None,
            };
            let reason = obj.get("reason").and_then(Value::as_str).map(|s| truncate(s, 120)).unwrap_or_default();
            let custom_summary = obj.get("custom_summary").and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty()).map(|s| truncate(s, 120));
            Some(WindowAdvice { window_id, tier, reason, custom_summary })
        })
        .collect();

    let generated_turn = map.get("generated_turn").and_then(Value::as_i64).unwrap_or(0);
    Some(SmallModelPlanResult { plan: LifecyclePlan { advices, source: PlanSource::SmallModel }, task_type, generated_turn })
}

fn parse_json_object(text: &str) -> Option<Value> {
    let content = text.trim();
    if content.is_empty() {
        return None;
    }
    let mut candidates = vec![content.to_string()];
    for caps in JSON_FENCE_RE.captures_iter(content) {
        if let Some(body) = caps.get(1) {
            let body = body.as_str().trim();
            if !body.is_empty() {
                candidates.push(body.to_string());
            }
        }
    }
    if let (Some(left), Some(right)) = (content.find('{'), content.rfind('}')) {
        if right > left {
            candidates.push(content[left..=right].trim().to_string());
        }
    }
    candidates.iter().find_map(|c| serde_json::from_str::<Value>(c).ok().filter(Value::is_object))
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Conditions under which the hybrid advisor should kick off a fresh
/// small-model refresh rather than reusing its cached plan.
#[derive(Debug, Clone, Copy)]
pub struct SmallModelTrigger {
    /// Refresh if the cached plan is older than this many turns.
    pub max_plan_age_turns: i64,
}

impl Default for SmallModelTrigger {
    fn default() -> Self {
        Self { max_plan_age_turns: 4 }
    }
}

impl SmallModelTrigger {
    /// Whether a refresh should run this turn.
    #[must_use]
    pub fn should_refresh(&self, context: &AdvisorContext, cached_plan_turn: i64) -> bool {
        context.is_new_task || context.window_count_changed || context.turn_number.saturating_sub(cached_plan_turn) > self.max_plan_age_turns
    }
}

/// Abstracts the actual small-model call so [`SmallModelAdvisor`] can
/// be tested with a stub.
#[async_trait]
pub trait SmallModelClient: Send + Sync {
    /// Send `messages` and return the model's raw text reply.
    async fn complete(&self, messages: &[SmallModelMessage]) -> Option<String>;
}

/// Drives a [`SmallModelClient`] to refresh a lifecycle plan, falling
/// back to `None` (the caller should keep the rule-based plan) on any
/// failure to reach the model or parse its reply.
pub struct SmallModelAdvisor<C: SmallModelClient> {
    client: C,
    trigger: SmallModelTrigger,
}

impl<C: SmallModelClient> SmallModelAdvisor<C> {
    /// Build an advisor around `client`, refreshing per `trigger`.
    pub fn new(client: C, trigger: SmallModelTrigger) -> Self {
        Self { client, trigger }
    }

    /// Whether a refresh should run this turn.
    #[must_use]
    pub fn should_refresh(&self, context: &AdvisorContext, cached_plan_turn: i64) -> bool {
        self.trigger.should_refresh(context, cached_plan_turn)
    }

    /// Request and parse a fresh plan. Returns `None` on any failure,
    /// logging a warning so the caller's fallback to rules is visible.
    pub async fn refresh(&self, windows: &[CompactWindowView], active_window_id: Option<&str>, budget: &PerceptionBudget, context: &AdvisorContext) -> Option<SmallModelPlanResult> {
        let messages = build_advisor_messages(windows, active_window_id, budget, context);
        let reply = self.client.complete(&messages).await?;
        let parsed = parse_small_model_plan(&reply);
        if parsed.is_none() {
            warn!("small model advisor reply did not parse as a valid plan");
        }
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json_reply() {
        let text = "here you go\n```json\n{\"task_type\":\"GENERAL_BROWSE\",\"advices\":[{\"window_id\":\"w1\",\"tier\":\"background\",\"reason\":\"idle=2\"}]}\n```";
        let result = parse_small_model_plan(text).unwrap();
        assert_eq!(result.task_type, "GENERAL_BROWSE");
        assert_eq!(result.plan.advices.len(), 1);
        assert_eq!(result.plan.advices[0].tier, WindowTier::Background);
    }

    #[test]
    fn rejects_unknown_task_type() {
        let text = r#"{"task_type":"NOT_REAL","advices":[]}"#;
        assert!(parse_small_model_plan(text).is_none());
    }

    #[test]
    fn skips_advice_entries_with_invalid_tier() {
        let text = r#"{"task_type":"GENERAL_BROWSE","advices":[{"window_id":"w1","tier":"bogus"},{"window_id":"w2","tier":"active"}]}"#;
        let result = parse_small_model_plan(text).unwrap();
        assert_eq!(result.plan.advices.len(), 1);
        assert_eq!(result.plan.advices[0].window_id, "w2");
    }

    #[test]
    fn trigger_refreshes_on_new_task() {
        let trigger = SmallModelTrigger::default();
        let context = AdvisorContext { is_new_task: true, ..AdvisorContext::default() };
        assert!(trigger.should_refresh(&context, 0));
    }

    #[test]
    fn trigger_refreshes_after_max_age() {
        let trigger = SmallModelTrigger { max_plan_age_turns: 2 };
        let context = AdvisorContext { turn_number: 10, ..AdvisorContext::default() };
        assert!(trigger.should_refresh(&context, 5));
        assert!(!trigger.should_refresh(&context, 9));
    }
}
