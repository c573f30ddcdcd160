//! Window lifecycle advisors: rule-based tiering, plus a hybrid mode
//! that prefers a small-model-produced plan within its TTL.

use crate::models::PerceptionBudget;

/// Lifecycle tier a window should render at this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowTier {
    /// Full detail (the active window, or a recently-touched one).
    Active,
    /// Structural summary.
    Background,
    /// One-line summary.
    Suspended,
    /// Close the window outright.
    Terminated,
}

impl WindowTier {
    /// Stable lowercase string form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Background => "background",
            Self::Suspended => "suspended",
            Self::Terminated => "terminated",
        }
    }
}

/// A lifecycle recommendation for one window.
#[derive(Debug, Clone)]
pub struct WindowAdvice {
    /// Window id this advice applies to.
    pub window_id: String,
    /// Recommended tier.
    pub tier: WindowTier,
    /// Human-readable reason (e.g. `"idle=3"`).
    pub reason: String,
    /// Small-model-supplied replacement summary, if any.
    pub custom_summary: Option<String>,
}

/// Where a [`LifecyclePlan`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSource {
    /// Deterministic idle-turn rules.
    Rules,
    /// An async small-model advisor.
    SmallModel,
    /// Rules for some windows, small-model for others.
    Hybrid,
}

/// One turn's worth of per-window lifecycle advice.
#[derive(Debug, Clone)]
pub struct LifecyclePlan {
    /// Per-window advice.
    pub advices: Vec<WindowAdvice>,
    /// Where this plan came from.
    pub source: PlanSource,
}

/// Minimal view of a window the advisor needs: just id and idle turns.
/// Kept separate from [`crate::domain::Window`] so advisors can be
/// tested without constructing full window state.
#[derive(Debug, Clone)]
pub struct WindowLifecycleView {
    /// Window id.
    pub id: String,
    /// Turns since this window was last active.
    pub idle_turns: i64,
}

/// Produces a [`LifecyclePlan`] for the current turn.
pub trait WindowLifecycleAdvisor {
    /// Rank every window in `windows` into a tier.
    fn advise(&self, windows: &[WindowLifecycleView], active_window_id: Option<&str>, budget: &PerceptionBudget) -> LifecyclePlan;
}

/// Deterministic idle-turn-count tiering: the active window is always
/// `active`; otherwise walk the three ascending idle thresholds.
#[derive(Debug, Default)]
pub struct RuleBasedAdvisor;

impl RuleBasedAdvisor {
    fn normalize_thresholds(budget: &PerceptionBudget) -> (i64, i64, i64) {
        let background_after = budget.background_after_idle.max(1);
        let suspend_after = budget.suspend_after_idle.max(background_after + 1);
        let terminate_after = budget.terminate_after_idle.max(suspend_after + 1);
        (background_after, suspend_after, terminate_after)
    }
}

impl WindowLifecycleAdvisor for RuleBasedAdvisor {
    fn advise(&self, windows: &[WindowLifecycleView], active_window_id: Option<&str>, budget: &PerceptionBudget) -> LifecyclePlan {
        let (bg_after, suspend_after, terminate_after) = Self::normalize_thresholds(budget);
        let advices = windows
            .iter()
            .map(|window| {
                let tier = if Some(window.id.as_str()) == active_window_id || window.idle_turns < bg_after {
                    WindowTier::Active
                } else if window.idle_turns < suspend_after {
                    WindowTier::Background
                } else if window.idle_turns < terminate_after {
                    WindowTier::Suspended
                } else {
                    WindowTier::Terminated
                };
                WindowAdvice { window_id: window.id.clone(), tier, reason: format!("idle={}", window.idle_turns), custom_summary: None }
            })
            .collect();
        LifecyclePlan { advices, source: PlanSource::Rules }
    }
}

/// Prefers a cached small-model plan while it's within its TTL,
/// falling back to [`RuleBasedAdvisor`] otherwise (missing plan,
/// expired plan, or a window the plan doesn't mention).
pub struct HybridAdvisor {
    rules: RuleBasedAdvisor,
    /// Cached plan from the small-model advisor, if any.
    pub cached_plan: Option<LifecyclePlan>,
    /// Turn the cached plan was generated on.
    pub cached_plan_turn: i64,
    /// How many turns a cached plan stays valid.
    pub plan_ttl_turns: i64,
}

impl HybridAdvisor {
    /// Build a hybrid advisor with the given plan TTL (in turns).
    #[must_use]
    pub fn new(plan_ttl_turns: i64) -> Self {
        Self { rules: RuleBasedAdvisor, cached_plan: None, cached_plan_turn: 0, plan_ttl_turns }
    }

    /// Install a freshly-generated small-model plan.
    pub fn set_plan(&mut self, plan: LifecyclePlan, generated_turn: i64) {
        self.cached_plan = Some(plan);
        self.cached_plan_turn = generated_turn;
    }

    /// Produce this turn's plan: the cached small-model plan if still
    /// within TTL as of `current_turn`, else the rule-based fallback.
    #[must_use]
    pub fn advise_at_turn(&self, windows: &[WindowLifecycleView], active_window_id: Option<&str>, budget: &PerceptionBudget, current_turn: i64) -> LifecyclePlan {
        if let Some(plan) = &self.cached_plan {
            if current_turn.saturating_sub(self.cached_plan_turn) <= self.plan_ttl_turns {
                return plan.clone();
            }
        }
        self.rules.advise(windows, active_window_id, budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(id: &str, idle: i64) -> WindowLifecycleView {
        WindowLifecycleView { id: id.to_string(), idle_turns: idle }
    }

    #[test]
    fn active_window_is_always_active_tier() {
        let advisor = RuleBasedAdvisor;
        let budget = PerceptionBudget::default();
        let plan = advisor.advise(&[view("w1", 99)], Some("w1"), &budget);
        assert_eq!(plan.advices[0].tier, WindowTier::Active);
    }

    #[test]
    fn idle_windows_escalate_through_tiers() {
        let advisor = RuleBasedAdvisor;
        let budget = PerceptionBudget { background_after_idle: 1, suspend_after_idle: 3, terminate_after_idle: 5, ..PerceptionBudget::default() };
        let plan = advisor.advise(&[view("w1", 0), view("w2", 2), view("w3", 4), view("w4", 6)], Some("none"), &budget);
        let tiers: Vec<WindowTier> = plan.advices.iter().map(|a| a.tier).collect();
        assert_eq!(tiers, vec![WindowTier::Active, WindowTier::Background, WindowTier::Suspended, WindowTier::Terminated]);
    }

    #[test]
    fn hybrid_uses_cached_plan_within_ttl() {
        let mut hybrid = HybridAdvisor::new(3);
        hybrid.set_plan(LifecyclePlan { advices: vec![], source: PlanSource::SmallModel }, 5);
        let budget = PerceptionBudget::default();
        let plan = hybrid.advise_at_turn(&[], None, &budget, 7);
        assert_eq!(plan.source, PlanSource::SmallModel);
    }

    #[test]
    fn hybrid_falls_back_to_rules_once_ttl_expires() {
        let mut hybrid = HybridAdvisor::new(2);
        hybrid.set_plan(LifecyclePlan { advices: vec![], source: PlanSource::SmallModel }, 1);
        let budget = PerceptionBudget::default();
        let plan = hybrid.advise_at_turn(&[view("w1", 0)], Some("w1"), &budget, 10);
        assert_eq!(plan.source, PlanSource::Rules);
    }
}
