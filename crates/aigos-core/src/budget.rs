// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! Per-instance spend and rate tracking.
//!
//! [`BudgetTracker`] is pure: it holds no external state and performs no I/O.
//! `check` never mutates; `record` does. Rolling the session/day/month/minute
//! anchors forward is the caller's responsibility (via `now_ms`) on every
//! observation — there is no background timer.
//!
//! Budget allocations are always static. There is no adaptive allocation, no
//! ML-based prediction, and no automatic rebalancing.

use crate::types::{ActionContext, BudgetState, CapabilitiesManifest};

const DAY_MS: u64 = 86_400_000;
const MONTH_MS: u64 = 30 * DAY_MS;
const MINUTE_MS: u64 = 60_000;

/// Outcome of a [`BudgetTracker::check`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetVerdict {
    Allowed,
    BudgetExceeded,
    RateLimited,
}

/// Rolls an instance's [`BudgetState`] counters forward to `now_ms`,
/// resetting any counter whose period has elapsed.
///
/// An atomic compare-and-increment on the caller's stored `BudgetState` is
/// required to satisfy P8 (budget atomicity) under concurrent calls; this
/// function is the pure roll/check/record logic the caller wraps with its
/// own synchronization (the policy engine wraps it in a `parking_lot::Mutex`
/// keyed by `instance_id`).
pub struct BudgetTracker;

impl BudgetTracker {
    /// Advance `state`'s period anchors to `now_ms`, zeroing any counter
    /// whose period has rolled over.
    pub fn roll(state: &mut BudgetState, now_ms: u64) {
        if now_ms.saturating_sub(state.day_start) >= DAY_MS {
            state.daily_cost = 0.0;
            state.day_start = now_ms;
        }
        if now_ms.saturating_sub(state.month_start) >= MONTH_MS {
            state.monthly_cost = 0.0;
            state.month_start = now_ms;
        }
        if now_ms.saturating_sub(state.minute_start) >= MINUTE_MS {
            state.calls_this_minute = 0;
            state.minute_start = now_ms;
        }
    }

    /// Evaluate whether `ctx` fits within `manifest`'s caps given the
    /// already-rolled `state`. Does not mutate `state`.
    pub fn check(
        state: &BudgetState,
        manifest: &CapabilitiesManifest,
        ctx: &ActionContext,
    ) -> BudgetVerdict {
        if let Some(cost) = ctx.cost {
            if let Some(session_cap) = manifest.max_cost_per_session {
                if state.session_cost + cost > session_cap {
                    return BudgetVerdict::BudgetExceeded;
                }
            }
            if let Some(day_cap) = manifest.max_cost_per_day {
                if state.daily_cost + cost > day_cap {
                    return BudgetVerdict::BudgetExceeded;
                }
            }
            if let Some(month_cap) = manifest.max_cost_per_month {
                if state.monthly_cost + cost > month_cap {
                    return BudgetVerdict::BudgetExceeded;
                }
            }
        }

        if let Some(max_calls) = manifest.max_calls_per_minute {
            if state.calls_this_minute >= max_calls {
                return BudgetVerdict::RateLimited;
            }
        }

        if let Some(tokens) = ctx.tokens {
            if let Some(max_tokens) = manifest.max_tokens_per_call {
                if tokens > max_tokens {
                    return BudgetVerdict::BudgetExceeded;
                }
            }
        }

        BudgetVerdict::Allowed
    }

    /// Debit `ctx`'s cost/call from `state`. Callers must call
    /// [`check`](Self::check) first and only record on an allowed,
    /// non-dry-run decision — a deny path must not consume budget.
    pub fn record(state: &mut BudgetState, ctx: &ActionContext) {
        if let Some(cost) = ctx.cost {
            state.session_cost += cost;
            state.daily_cost += cost;
            state.monthly_cost += cost;
        }
        state.calls_this_minute += 1;
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    fn manifest_with_session_cap(cap: f64) -> CapabilitiesManifest {
        CapabilitiesManifest {
            max_cost_per_session: Some(cap),
            ..Default::default()
        }
    }

    #[test]
    fn check_allows_within_cap() {
        let state = BudgetState::new(0);
        let manifest = manifest_with_session_cap(100.0);
        let ctx = ActionContext { cost: Some(50.0), tokens: None, purpose: None };
        assert_eq!(BudgetTracker::check(&state, &manifest, &ctx), BudgetVerdict::Allowed);
    }

    #[test]
    fn check_denies_over_cap() {
        let mut state = BudgetState::new(0);
        state.session_cost = 80.0;
        let manifest = manifest_with_session_cap(100.0);
        let ctx = ActionContext { cost: Some(30.0), tokens: None, purpose: None };
        assert_eq!(BudgetTracker::check(&state, &manifest, &ctx), BudgetVerdict::BudgetExceeded);
    }

    #[test]
    fn record_only_mutates_on_explicit_call() {
        let mut state = BudgetState::new(0);
        let ctx = ActionContext { cost: Some(10.0), tokens: None, purpose: None };
        BudgetTracker::record(&mut state, &ctx);
        assert_eq!(state.session_cost, 10.0);
        assert_eq!(state.calls_this_minute, 1);
    }

    #[test]
    fn rate_limit_trips_at_threshold() {
        let mut state = BudgetState::new(0);
        state.calls_this_minute = 5;
        let manifest = CapabilitiesManifest { max_calls_per_minute: Some(5), ..Default::default() };
        let ctx = ActionContext::default();
        assert_eq!(BudgetTracker::check(&state, &manifest, &ctx), BudgetVerdict::RateLimited);
    }

    #[test]
    fn roll_resets_minute_counter_after_period() {
        let mut state = BudgetState::new(0);
        state.calls_this_minute = 10;
        BudgetTracker::roll(&mut state, MINUTE_MS);
        assert_eq!(state.calls_this_minute, 0);
        assert_eq!(state.minute_start, MINUTE_MS);
    }
}
