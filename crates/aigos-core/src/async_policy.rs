// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! The async variant of the Bouncer: wraps [`PolicyEngine`]'s sync 7-step
//! chain and adds an 8th step — user-registered custom checks, run
//! priority-sorted descending, each under its own timeout.

#![cfg(feature = "async")]

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::time::Duration;

use crate::killswitch::{KillSwitchHooks, KillSwitchRegistry, NoopHooks};
use crate::policy::{DecisionCode, DeniedBy, PolicyConfig, PolicyDecision, PolicyEngine};
use crate::types::{ActionContext, RuntimeIdentity};

/// Default per-check budget (§5): a check that ignores cancellation and
/// exceeds this is aborted and treated as pass.
const DEFAULT_CUSTOM_CHECK_TIMEOUT: Duration = Duration::from_millis(50);

/// A user-registered step-8 check. Higher `priority` runs first; a check
/// that denies short-circuits the remaining lower-priority checks.
#[async_trait::async_trait]
pub trait CustomCheck: Send + Sync {
    fn priority(&self) -> i32 {
        0
    }

    /// Return `Some(reason)` to deny, `None` to pass.
    async fn check(&self, identity: &RuntimeIdentity, action: &str, resource: Option<&str>) -> Option<String>;
}

/// Async Bouncer: the sync engine plus a registry of [`CustomCheck`]s.
pub struct AsyncPolicyEngine<H: KillSwitchHooks = NoopHooks> {
    inner: PolicyEngine<H>,
    custom_checks: Vec<Arc<dyn CustomCheck>>,
    custom_check_timeout: Duration,
}

impl<H: KillSwitchHooks> AsyncPolicyEngine<H> {
    pub fn new(inner: PolicyEngine<H>, mut custom_checks: Vec<Arc<dyn CustomCheck>>) -> Self {
        custom_checks.sort_by_key(|c| core::cmp::Reverse(c.priority()));
        Self { inner, custom_checks, custom_check_timeout: DEFAULT_CUSTOM_CHECK_TIMEOUT }
    }

    pub fn with_custom_check_timeout(mut self, timeout: Duration) -> Self {
        self.custom_check_timeout = timeout;
        self
    }

    /// Runs steps 1-6, then step 8 (custom checks), then step 7 (budget &
    /// rate) last — so a request a custom check goes on to deny never
    /// commits budget. Budget is still evaluated against the spec's step
    /// ordering: a custom check cannot see a budget-exceeded request, since
    /// any step-1-6 denial already short-circuited before custom checks ran,
    /// but the *commit* of step 7 is deferred past step 8 so that "budget is
    /// only mutated on an allowed decision" holds for the whole 8-step chain,
    /// not just the sync 7-step prefix.
    pub async fn check_permission(
        &self,
        identity: &RuntimeIdentity,
        action: &str,
        resource: Option<&str>,
        context: Option<&ActionContext>,
    ) -> PolicyDecision {
        let start = now_ns();
        let now_ms = now_ms();

        let pre_budget = self.inner.evaluate_pre_budget(identity, action, resource);
        if pre_budget.is_err() {
            return self.inner.finish_decision(identity, action, start, now_ms, pre_budget);
        }

        for check in &self.custom_checks {
            let verdict = match tokio::time::timeout(self.custom_check_timeout, check.check(identity, action, resource)).await {
                Ok(verdict) => verdict,
                Err(_) => {
                    tracing::warn!(action, "custom check exceeded its timeout budget, treated as pass");
                    None
                }
            };
            if let Some(reason) = verdict {
                let result = Err((DecisionCode::Custom, DeniedBy::Custom, reason));
                return self.inner.finish_decision(identity, action, start, now_ms, result);
            }
        }

        let result = self.inner.check_and_commit_budget(identity, context, now_ms);
        self.inner.finish_decision(identity, action, start, now_ms, result)
    }
}

fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

fn now_ns() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as u64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::killswitch::KillSwitchRegistry;
    use crate::policy::PolicyConfig;
    use crate::types::{CapabilitiesManifest, Lineage, RiskLevel, RuntimeMode};

    fn identity_with(manifest: CapabilitiesManifest) -> RuntimeIdentity {
        RuntimeIdentity {
            instance_id: "inst-1".into(),
            asset_id: "asset-1".into(),
            risk_level: RiskLevel::Limited,
            capabilities_manifest: manifest,
            mode: RuntimeMode::Normal,
            lineage: Lineage::root("inst-1", 0),
            created_at: 0,
            verified: true,
            golden_thread_hash: "x".into(),
        }
    }

    struct AlwaysDeny(&'static str);

    #[async_trait::async_trait]
    impl CustomCheck for AlwaysDeny {
        async fn check(&self, _identity: &RuntimeIdentity, _action: &str, _resource: Option<&str>) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    struct AlwaysAllow;

    #[async_trait::async_trait]
    impl CustomCheck for AlwaysAllow {
        async fn check(&self, _identity: &RuntimeIdentity, _action: &str, _resource: Option<&str>) -> Option<String> {
            None
        }
    }

    fn manifest_allow_all(session_cap: f64) -> CapabilitiesManifest {
        CapabilitiesManifest {
            allowed_tools: alloc::vec!["*".into()],
            max_cost_per_session: Some(session_cap),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn custom_check_denial_is_reported_as_custom() {
        let inner = PolicyEngine::new(PolicyConfig::default(), Arc::new(KillSwitchRegistry::new(true, NoopHooks)));
        let engine = AsyncPolicyEngine::new(inner, alloc::vec![Arc::new(AlwaysDeny("no")) as Arc<dyn CustomCheck>]);
        let identity = identity_with(manifest_allow_all(100.0));
        let decision = engine.check_permission(&identity, "act", None, None).await;
        assert!(!decision.allowed);
        assert_eq!(decision.code, Some(DecisionCode::Custom));
        assert_eq!(decision.denied_by, Some(DeniedBy::Custom));
    }

    #[tokio::test]
    async fn custom_check_denial_never_consumes_budget() {
        let inner = PolicyEngine::new(PolicyConfig::default(), Arc::new(KillSwitchRegistry::new(true, NoopHooks)));
        let engine = AsyncPolicyEngine::new(inner, alloc::vec![Arc::new(AlwaysDeny("no")) as Arc<dyn CustomCheck>]);
        let identity = identity_with(manifest_allow_all(100.0));
        let ctx = ActionContext { cost: Some(60.0), tokens: None, purpose: None };

        let first = engine.check_permission(&identity, "spend", None, Some(&ctx)).await;
        assert!(!first.allowed);
        let second = engine.check_permission(&identity, "spend", None, Some(&ctx)).await;
        assert!(!second.allowed);

        let budget = engine.inner.peek_budget("inst-1");
        assert!(budget.map_or(true, |s| s.session_cost == 0.0));
    }

    #[tokio::test]
    async fn allowed_through_custom_checks_commits_budget_once() {
        let inner = PolicyEngine::new(PolicyConfig::default(), Arc::new(KillSwitchRegistry::new(true, NoopHooks)));
        let engine = AsyncPolicyEngine::new(inner, alloc::vec![Arc::new(AlwaysAllow) as Arc<dyn CustomCheck>]);
        let identity = identity_with(manifest_allow_all(100.0));
        let ctx = ActionContext { cost: Some(30.0), tokens: None, purpose: None };

        let decision = engine.check_permission(&identity, "spend", None, Some(&ctx)).await;
        assert!(decision.allowed);
        let budget = engine.inner.peek_budget("inst-1").unwrap();
        assert_eq!(budget.session_cost, 30.0);
    }

    #[tokio::test]
    async fn higher_priority_check_runs_first_and_short_circuits() {
        let inner = PolicyEngine::new(PolicyConfig::default(), Arc::new(KillSwitchRegistry::new(true, NoopHooks)));
        struct PriorityCheck(i32, &'static str);
        #[async_trait::async_trait]
        impl CustomCheck for PriorityCheck {
            fn priority(&self) -> i32 {
                self.0
            }
            async fn check(&self, _identity: &RuntimeIdentity, _action: &str, _resource: Option<&str>) -> Option<String> {
                Some(self.1.to_string())
            }
        }
        let engine = AsyncPolicyEngine::new(
            inner,
            alloc::vec![
                Arc::new(PriorityCheck(1, "low")) as Arc<dyn CustomCheck>,
                Arc::new(PriorityCheck(10, "high")) as Arc<dyn CustomCheck>,
            ],
        );
        let identity = identity_with(manifest_allow_all(100.0));
        let decision = engine.check_permission(&identity, "act", None, None).await;
        assert_eq!(decision.reason.as_deref(), Some("high"));
    }
}
