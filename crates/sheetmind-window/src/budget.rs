//! Token-budget-constrained tier allocation: turns a [`LifecyclePlan`]
//! and a per-window set of pre-rendered texts into a capped set of
//! [`WindowSnapshot`]s that fit inside [`PerceptionBudget::system_budget_tokens`].

use std::collections::HashMap;

use crate::advisor::{LifecyclePlan, WindowTier};
use crate::models::{PerceptionBudget, WindowRenderAction, WindowSnapshot};

/// Rough token estimate, matching the `chars / 4` approximation used
/// elsewhere in this workspace rather than pulling in a tokenizer
/// dependency just for budget bookkeeping.
fn estimate_tokens(text: &str) -> i64 {
    (text.len() / 4) as i64
}

/// The three tier-specific renders of a single window, pre-built by the
/// caller (the renderer owns the actual text construction; this module
/// only decides which one — if any — fits the remaining budget).
#[derive(Debug, Clone, Default)]
pub struct WindowRenderCandidate {
    /// Window id.
    pub window_id: String,
    /// Whether this window is the currently active one (forces `Active`
    /// tier regardless of advisor output).
    pub is_active: bool,
    /// Whether this window must survive at least in `Suspended` tier
    /// even under severe budget pressure (e.g. the most recently
    /// focused non-active window).
    pub must_keep: bool,
    /// Sequence number used to order windows by recency when capping to
    /// `max_windows` (higher is more recent).
    pub last_access_seq: i64,
    /// Full-detail render text (`active`/`background` tier source).
    pub active_text: String,
    /// Structural-summary render text (`background` tier).
    pub background_text: String,
    /// One-line render text (`suspended` tier).
    pub suspended_text: String,
}

/// Computes the per-window token budget and dispatches windows into
/// `keep` / `minimize` / `close` actions under a total token cap.
#[derive(Debug, Clone, Default)]
pub struct WindowBudgetAllocator {
    /// The thresholds and caps this allocator enforces.
    pub budget: PerceptionBudget,
}

impl WindowBudgetAllocator {
    /// Build an allocator from `budget`.
    #[must_use]
    pub fn new(budget: PerceptionBudget) -> Self {
        Self { budget }
    }

    /// Row cap for a full-detail render, scaled by how many windows are
    /// simultaneously at `active`/`background` tier: a single active
    /// window gets up to double the base cap (clamped to 50), exactly
    /// two share the base cap, three or more are clamped down to 15.
    #[must_use]
    pub fn compute_window_full_max_rows(&self, active_window_count: usize) -> i64 {
        let base = self.budget.window_full_max_rows;
        match active_window_count {
            0 | 1 => base.saturating_mul(2).clamp(1, 50),
            2 => base.max(1),
            _ => base.clamp(1, 15),
        }
    }

    /// Allocate tiers/text for every candidate, respecting `max_windows`
    /// and `system_budget_tokens`. Returns snapshots in the same order
    /// the advisor plan ranked them (active-first, then by recency).
    #[must_use]
    pub fn allocate(&self, candidates: &[WindowRenderCandidate], active_window_id: Option<&str>, plan: &LifecyclePlan) -> Vec<WindowSnapshot> {
        let advice_by_id: HashMap<&str, &crate::advisor::WindowAdvice> = plan.advices.iter().map(|a| (a.window_id.as_str(), a)).collect();

        let mut ordered: Vec<&WindowRenderCandidate> = candidates.iter().collect();
        ordered.sort_by_key(|c| (if Some(c.window_id.as_str()) == active_window_id { 0 } else { 1 }, std::cmp::Reverse(c.last_access_seq)));

        let max_windows = self.budget.max_windows.max(1);
        let (kept, overflow) = if ordered.len() > max_windows { ordered.split_at(max_windows) } else { (ordered.as_slice(), &ordered[ordered.len()..]) };

        let mut remaining = self.budget.system_budget_tokens;
        let mut snapshots = Vec::with_capacity(candidates.len());

        for candidate in kept {
            let advice = advice_by_id.get(candidate.window_id.as_str()).copied();
            let desired_tier = if Some(candidate.window_id.as_str()) == active_window_id {
                WindowTier::Active
            } else if let Some(advice) = advice {
                advice.tier
            } else {
                WindowTier::Background
            };

            let snapshot = self.allocate_single(candidate, desired_tier, remaining, advice.and_then(|a| a.custom_summary.clone()));
            if !matches!(snapshot.action, WindowRenderAction::Close) {
                remaining = remaining.saturating_sub(snapshot.estimated_tokens).max(0);
            }
            snapshots.push(snapshot);
        }

        for candidate in overflow {
            snapshots.push(WindowSnapshot {
                window_id: candidate.window_id.clone(),
                action: WindowRenderAction::Close,
                rendered_text: String::new(),
                estimated_tokens: 0,
            });
        }

        snapshots
    }

    fn allocate_single(&self, candidate: &WindowRenderCandidate, desired_tier: WindowTier, remaining: i64, custom_summary: Option<String>) -> WindowSnapshot {
        let active_text = custom_summary.clone().unwrap_or_else(|| candidate.active_text.clone());
        let background_text = custom_summary.clone().unwrap_or_else(|| candidate.background_text.clone());
        let suspended_text = custom_summary.unwrap_or_else(|| candidate.suspended_text.clone());

        let active_tokens = estimate_tokens(&active_text);
        let background_tokens = estimate_tokens(&background_text);
        let suspended_tokens = estimate_tokens(&suspended_text);

        for tier in fallback_chain(desired_tier) {
            match tier {
                WindowTier::Active if active_tokens > 0 && active_tokens <= remaining => {
                    return WindowSnapshot { window_id: candidate.window_id.clone(), action: WindowRenderAction::Keep, rendered_text: active_text, estimated_tokens: active_tokens };
                },
                WindowTier::Background if background_tokens > 0 && background_tokens <= remaining => {
                    return WindowSnapshot {
                        window_id: candidate.window_id.clone(),
                        action: WindowRenderAction::Keep,
                        rendered_text: background_text,
                        estimated_tokens: background_tokens,
                    };
                },
                WindowTier::Suspended => {
                    let floor_ok = remaining >= self.budget.minimized_tokens
                        || (candidate.must_keep && remaining >= (self.budget.minimized_tokens / 2).max(1));
                    if suspended_tokens > 0 && suspended_tokens <= remaining && floor_ok {
                        return WindowSnapshot {
                            window_id: candidate.window_id.clone(),
                            action: WindowRenderAction::Minimize,
                            rendered_text: suspended_text,
                            estimated_tokens: suspended_tokens,
                        };
                    }
                },
                WindowTier::Terminated | WindowTier::Active | WindowTier::Background => {},
            }
        }

        WindowSnapshot { window_id: candidate.window_id.clone(), action: WindowRenderAction::Close, rendered_text: String::new(), estimated_tokens: 0 }
    }
}

fn fallback_chain(tier: WindowTier) -> &'static [WindowTier] {
    use WindowTier::{Active, Background, Suspended, Terminated};
    match tier {
        Active => &[Active, Background, Suspended, Terminated],
        Background => &[Background, Suspended, Terminated],
        Suspended => &[Suspended, Terminated],
        Terminated => &[Terminated],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::{PlanSource, WindowAdvice};

    fn candidate(id: &str, seq: i64) -> WindowRenderCandidate {
        WindowRenderCandidate {
            window_id: id.to_string(),
            is_active: false,
            must_keep: false,
            last_access_seq: seq,
            active_text: "x".repeat(400),
            background_text: "y".repeat(100),
            suspended_text: "z".repeat(20),
        }
    }

    #[test]
    fn window_full_max_rows_scales_with_active_count() {
        let allocator = WindowBudgetAllocator::new(PerceptionBudget::default());
        assert_eq!(allocator.compute_window_full_max_rows(1), 50);
        assert_eq!(allocator.compute_window_full_max_rows(2), 25);
        assert_eq!(allocator.compute_window_full_max_rows(3), 15);
    }

    #[test]
    fn active_window_gets_active_tier_when_budget_allows() {
        let allocator = WindowBudgetAllocator::new(PerceptionBudget::default());
        let plan = LifecyclePlan { advices: vec![WindowAdvice { window_id: "w1".into(), tier: WindowTier::Active, reason: String::new(), custom_summary: None }], source: PlanSource::Rules };
        let snapshots = allocator.allocate(&[candidate("w1", 1)], Some("w1"), &plan);
        assert_eq!(snapshots[0].action, WindowRenderAction::Keep);
        assert!(snapshots[0].rendered_text.len() >= 400);
    }

    #[test]
    fn tight_budget_falls_back_to_suspended_tier() {
        let budget = PerceptionBudget { system_budget_tokens: 30, minimized_tokens: 5, ..PerceptionBudget::default() };
        let allocator = WindowBudgetAllocator::new(budget);
        let plan = LifecyclePlan { advices: vec![WindowAdvice { window_id: "w1".into(), tier: WindowTier::Active, reason: String::new(), custom_summary: None }], source: PlanSource::Rules };
        let snapshots = allocator.allocate(&[candidate("w1", 1)], Some("w1"), &plan);
        assert_eq!(snapshots[0].action, WindowRenderAction::Minimize);
    }

    #[test]
    fn overflow_windows_beyond_max_windows_are_closed() {
        let budget = PerceptionBudget { max_windows: 1, ..PerceptionBudget::default() };
        let allocator = WindowBudgetAllocator::new(budget);
        let plan = LifecyclePlan { advices: vec![], source: PlanSource::Rules };
        let snapshots = allocator.allocate(&[candidate("w1", 5), candidate("w2", 1)], None, &plan);
        assert_eq!(snapshots.iter().find(|s| s.window_id == "w2").unwrap().action, WindowRenderAction::Close);
    }

    #[test]
    fn must_keep_survives_at_suspended_tier_under_severe_pressure() {
        let budget = PerceptionBudget { system_budget_tokens: 6, minimized_tokens: 20, ..PerceptionBudget::default() };
        let allocator = WindowBudgetAllocator::new(budget);
        let mut c = candidate("w1", 1);
        c.must_keep = true;
        c.suspended_text = "zzzz".to_string();
        let plan = LifecyclePlan { advices: vec![WindowAdvice { window_id: "w1".into(), tier: WindowTier::Suspended, reason: String::new(), custom_summary: None }], source: PlanSource::Rules };
        let snapshots = allocator.allocate(&[c], None, &plan);
        assert_eq!(snapshots[0].action, WindowRenderAction::Minimize);
    }

    #[test]
    fn zero_remaining_budget_closes_the_window() {
        let budget = PerceptionBudget { system_budget_tokens: 0, ..PerceptionBudget::default() };
        let allocator = WindowBudgetAllocator::new(budget);
        let plan = LifecyclePlan { advices: vec![], source: PlanSource::Rules };
        let snapshots = allocator.allocate(&[candidate("w1", 1)], None, &plan);
        assert_eq!(snapshots[0].action, WindowRenderAction::Close);
    }
}
