// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! The Policy Engine ("the Bouncer"): a single hot-path decision function,
//! `check_permission`, implementing the kernel's 7-step short-circuit
//! evaluation chain. The sync variant here never performs I/O or suspends;
//! the async variant (feature `async`) lives in [`crate::async_policy`] and
//! adds an 8th, user-extensible step.

#![cfg(feature = "std")]

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::budget::{BudgetTracker, BudgetVerdict};
use crate::event::{EventSink, GovernanceEvent, NullSink};
use crate::killswitch::{KillSwitchHooks, KillSwitchRegistry, NoopHooks, RunState};
use crate::pattern;
use crate::types::{ActionContext, BudgetState, RuntimeIdentity, RuntimeMode};

/// Stable decision codes, exactly the *Decision* kind from the error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionCode {
    KillSwitchTerminated,
    KillSwitchPaused,
    ModeRestricted,
    CapabilityDenied,
    ResourceDenied,
    ResourceNotAllowed,
    BudgetExceeded,
    RateLimited,
    Custom,
    EvalError,
}

impl DecisionCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionCode::KillSwitchTerminated => "KILL_SWITCH_TERMINATED",
            DecisionCode::KillSwitchPaused => "KILL_SWITCH_PAUSED",
            DecisionCode::ModeRestricted => "MODE_RESTRICTED",
            DecisionCode::CapabilityDenied => "CAPABILITY_DENIED",
            DecisionCode::ResourceDenied => "RESOURCE_DENIED",
            DecisionCode::ResourceNotAllowed => "RESOURCE_NOT_ALLOWED",
            DecisionCode::BudgetExceeded => "BUDGET_EXCEEDED",
            DecisionCode::RateLimited => "RATE_LIMITED",
            DecisionCode::Custom => "CUSTOM",
            DecisionCode::EvalError => "EVAL_ERROR",
        }
    }
}

/// Which tier produced a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeniedBy {
    KillSwitch,
    Capability,
    ResourceDeny,
    ResourceAllow,
    Budget,
    RateLimit,
    Custom,
}

/// The result of a `check_permission` call.
#[derive(Debug, Clone)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub code: Option<DecisionCode>,
    pub reason: Option<String>,
    pub denied_by: Option<DeniedBy>,
    pub checked_at: u64,
    pub duration_ns: u64,
    pub dry_run: bool,
    pub would_deny: bool,
    pub sandbox: bool,
}

impl PolicyDecision {
    fn allow(checked_at: u64, duration_ns: u64, sandbox: bool) -> Self {
        Self { allowed: true, code: None, reason: None, denied_by: None, checked_at, duration_ns, dry_run: false, would_deny: false, sandbox }
    }
}

/// Policy engine configuration. All fields have the safe defaults named by
/// the kernel's configuration surface.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub dry_run: bool,
    pub fail_open: bool,
    pub default_allow: bool,
    pub max_cache_size: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self { dry_run: false, fail_open: false, default_allow: false, max_cache_size: 1000 }
    }
}

/// Actions permitted for an instance in `RESTRICTED` mode, regardless of its
/// manifest.
const RESTRICTED_ALLOW_LIST: [&str; 4] = ["log", "report", "status", "heartbeat"];

/// The synchronous Bouncer. Holds no identity state of its own — callers
/// pass a `RuntimeIdentity` by reference on every call — but owns the
/// process-wide kill-switch registry and the per-instance budget table, per
/// the kernel's ownership rules.
pub struct PolicyEngine<H: KillSwitchHooks = NoopHooks> {
    config: PolicyConfig,
    kill_switch: Arc<KillSwitchRegistry<H>>,
    budgets: Mutex<HashMap<String, BudgetState>>,
    sink: Arc<dyn EventSink>,
}

impl PolicyEngine<NoopHooks> {
    pub fn new(config: PolicyConfig, kill_switch: Arc<KillSwitchRegistry<NoopHooks>>) -> Self {
        Self::with_sink(config, kill_switch, Arc::new(NullSink))
    }
}

impl<H: KillSwitchHooks> PolicyEngine<H> {
    pub fn with_sink(config: PolicyConfig, kill_switch: Arc<KillSwitchRegistry<H>>, sink: Arc<dyn EventSink>) -> Self {
        pattern::configure(pattern::PatternCacheConfig { max_size: config.max_cache_size });
        Self { config, kill_switch, budgets: Mutex::new(HashMap::new()), sink }
    }

    /// Synchronous evaluation of the 7-step chain (steps 1-7; step 8, custom
    /// async checks, is implemented by [`crate::async_policy::AsyncPolicyEngine`]).
    pub fn check_permission(
        &self,
        identity: &RuntimeIdentity,
        action: &str,
        resource: Option<&str>,
        context: Option<&ActionContext>,
    ) -> PolicyDecision {
        let start = now_ns();
        let now_ms = now_ms();

        let result = self
            .evaluate_pre_budget(identity, action, resource)
            .and_then(|()| self.check_and_commit_budget(identity, context, now_ms));

        self.finish_decision(identity, action, start, now_ms, result)
    }

    /// Steps 1-6: kill-switch, mode, capability deny/allow, resource
    /// deny/allow. No budget state is touched here — callers (sync or async)
    /// run [`check_and_commit_budget`](Self::check_and_commit_budget) only
    /// once every later gate (step 8's custom checks, for the async engine)
    /// has already passed, so a request that is ultimately denied never
    /// consumes budget.
    pub(crate) fn evaluate_pre_budget(
        &self,
        identity: &RuntimeIdentity,
        action: &str,
        resource: Option<&str>,
    ) -> Result<(), (DecisionCode, DeniedBy, String)> {
        // Step 1: kill-switch. Instance overrides asset overrides global.
        match self.kill_switch.effective_state(&identity.instance_id, &identity.asset_id) {
            RunState::Terminated => {
                return Err((DecisionCode::KillSwitchTerminated, DeniedBy::KillSwitch, "instance is terminated".to_string()))
            }
            RunState::Paused => {
                return Err((DecisionCode::KillSwitchPaused, DeniedBy::KillSwitch, "instance is paused".to_string()))
            }
            RunState::Active => {}
        }

        // Step 2: mode.
        if matches!(identity.mode, RuntimeMode::Restricted) && !RESTRICTED_ALLOW_LIST.contains(&action) {
            return Err((
                DecisionCode::ModeRestricted,
                DeniedBy::Capability,
                alloc::format!("action '{action}' not in the restricted-mode allow-list"),
            ));
        }

        let manifest = &identity.capabilities_manifest;

        // Step 3: capability deny.
        if pattern::any_matches(manifest.denied_tools.iter().map(String::as_str), action) {
            return Err((DecisionCode::CapabilityDenied, DeniedBy::Capability, alloc::format!("action '{action}' is explicitly denied")));
        }

        // Step 4: capability allow. Empty allow-list denies everything unless '*' is present.
        if !manifest.allowed_tools.is_empty()
            && !pattern::any_matches(manifest.allowed_tools.iter().map(String::as_str), action)
        {
            return Err((DecisionCode::CapabilityDenied, DeniedBy::Capability, alloc::format!("action '{action}' is not in the allow-list")));
        }
        if manifest.allowed_tools.is_empty() {
            return Err((DecisionCode::CapabilityDenied, DeniedBy::Capability, "empty allow-list denies all actions".to_string()));
        }

        if let Some(resource) = resource {
            let host = pattern::resource_host(resource);

            // Step 5: resource deny.
            if pattern::domain_matches(manifest.denied_domains.iter().map(String::as_str), &host) {
                return Err((DecisionCode::ResourceDenied, DeniedBy::ResourceDeny, alloc::format!("resource '{resource}' is explicitly denied")));
            }

            // Step 6: resource allow.
            let allow_has_wildcard = manifest.allowed_domains.iter().any(|p| p == "*");
            if !manifest.allowed_domains.is_empty()
                && !allow_has_wildcard
                && !pattern::domain_matches(manifest.allowed_domains.iter().map(String::as_str), &host)
            {
                return Err((
                    DecisionCode::ResourceNotAllowed,
                    DeniedBy::ResourceAllow,
                    alloc::format!("resource '{resource}' is not in the allow-list"),
                ));
            }
        }

        Ok(())
    }

    /// Step 7: budget & rate, atomically checked and (unless `dry_run` or the
    /// check fails) committed under a single lock acquisition keyed by
    /// `instance_id` — the compare-and-increment P8 requires. Must run after
    /// every other gate that could still deny the request (the async
    /// engine's step 8 custom checks included), so a request that is
    /// ultimately denied never consumes budget.
    pub(crate) fn check_and_commit_budget(
        &self,
        identity: &RuntimeIdentity,
        context: Option<&ActionContext>,
        now_ms: u64,
    ) -> Result<(), (DecisionCode, DeniedBy, String)> {
        let Some(ctx) = context else { return Ok(()) };
        let manifest = &identity.capabilities_manifest;

        let mut budgets = self.budgets.lock();
        let state = budgets.entry(identity.instance_id.clone()).or_insert_with(|| BudgetState::new(now_ms));
        BudgetTracker::roll(state, now_ms);
        match BudgetTracker::check(state, manifest, ctx) {
            BudgetVerdict::Allowed => {}
            BudgetVerdict::BudgetExceeded => {
                return Err((DecisionCode::BudgetExceeded, DeniedBy::Budget, "action would exceed a configured cost cap".to_string()))
            }
            BudgetVerdict::RateLimited => {
                return Err((DecisionCode::RateLimited, DeniedBy::RateLimit, "calls_this_minute at or above max_calls_per_minute".to_string()))
            }
        }
        // Commit happens under the same lock acquisition as the check above —
        // no other caller can observe or mutate this instance's budget state
        // between the compare and the increment.
        if !self.config.dry_run {
            BudgetTracker::record(state, ctx);
        }
        Ok(())
    }

    /// Snapshot of an instance's current budget state, for tests that need
    /// to assert on commit behavior across the sync/async engine boundary.
    #[cfg(test)]
    pub(crate) fn peek_budget(&self, instance_id: &str) -> Option<BudgetState> {
        self.budgets.lock().get(instance_id).copied()
    }

    /// Shared tail of the sync and async `check_permission`: turns an
    /// `evaluate` result into a [`PolicyDecision`], logs, and emits the
    /// decision event. `start`/`now_ms` must be the timestamps captured
    /// before evaluation began.
    pub(crate) fn finish_decision(
        &self,
        identity: &RuntimeIdentity,
        action: &str,
        start: u64,
        now_ms: u64,
        result: Result<(), (DecisionCode, DeniedBy, String)>,
    ) -> PolicyDecision {
        let sandbox = matches!(identity.mode, RuntimeMode::Sandbox);
        let duration_ns = now_ns().saturating_sub(start);
        let decision = match result {
            Ok(()) => PolicyDecision::allow(now_ms, duration_ns, sandbox),
            Err((code, denied_by, reason)) => {
                if self.config.dry_run {
                    PolicyDecision {
                        allowed: true,
                        code: Some(code),
                        reason: Some(alloc::format!("WOULD_DENY: {reason}")),
                        denied_by: Some(denied_by),
                        checked_at: now_ms,
                        duration_ns,
                        dry_run: true,
                        would_deny: true,
                        sandbox,
                    }
                } else {
                    PolicyDecision {
                        allowed: false,
                        code: Some(code),
                        reason: Some(reason),
                        denied_by: Some(denied_by),
                        checked_at: now_ms,
                        duration_ns,
                        dry_run: false,
                        would_deny: false,
                        sandbox,
                    }
                }
            }
        };

        tracing::debug!(
            instance = %identity.instance_id,
            action = %action,
            allowed = decision.allowed,
            code = ?decision.code,
            duration_ns = decision.duration_ns,
            "check_permission decision"
        );

        self.sink.emit(GovernanceEvent::Decision {
            instance_id: identity.instance_id.clone(),
            action: action.to_string(),
            allowed: decision.allowed,
            code: decision.code.map(|c| c.as_str().to_string()).unwrap_or_default(),
            evaluated_at_ns: start,
        });

        decision
    }
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

fn now_ns() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as u64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CapabilitiesManifest, Lineage, RiskLevel};

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

    fn engine() -> PolicyEngine {
        PolicyEngine::new(PolicyConfig::default(), Arc::new(KillSwitchRegistry::new(true, NoopHooks)))
    }

    #[test]
    fn deny_beats_allow() {
        let manifest = CapabilitiesManifest {
            allowed_tools: alloc::vec!["database:*".into()],
            denied_tools: alloc::vec!["database:drop".into()],
            ..Default::default()
        };
        let identity = identity_with(manifest);
        let decision = engine().check_permission(&identity, "database:drop", None, None);
        assert!(!decision.allowed);
        assert_eq!(decision.code, Some(DecisionCode::CapabilityDenied));
        assert_eq!(decision.denied_by, Some(DeniedBy::Capability));
    }

    #[test]
    fn domain_wildcard_allows_subdomain_denies_others() {
        let manifest = CapabilitiesManifest {
            allowed_tools: alloc::vec!["*".into()],
            allowed_domains: alloc::vec!["*.example.com".into()],
            ..Default::default()
        };
        let identity = identity_with(manifest);
        let engine = engine();

        let ok = engine.check_permission(&identity, "fetch", Some("https://api.example.com/x"), None);
        assert!(ok.allowed);

        let denied = engine.check_permission(&identity, "fetch", Some("https://evil.com"), None);
        assert!(!denied.allowed);
        assert_eq!(denied.code, Some(DecisionCode::ResourceNotAllowed));
    }

    #[test]
    fn kill_switch_pause_then_resume() {
        let manifest = CapabilitiesManifest { allowed_tools: alloc::vec!["*".into()], ..Default::default() };
        let identity = identity_with(manifest);
        let kill_switch = Arc::new(KillSwitchRegistry::new(true, NoopHooks));
        let engine = PolicyEngine::new(PolicyConfig::default(), kill_switch.clone());

        use crate::killswitch::{CommandTarget, KillSwitchCommand, KillSwitchCommandType};
        kill_switch.apply(
            &KillSwitchCommand {
                command_id: "c1".into(),
                command_type: KillSwitchCommandType::Pause,
                timestamp: 0,
                reason: "test".into(),
                target: CommandTarget { instance_id: Some("inst-1".into()), asset_id: None, organization: None },
                signature: None,
            },
            0,
        );
        let paused = engine.check_permission(&identity, "read", None, None);
        assert_eq!(paused.code, Some(DecisionCode::KillSwitchPaused));

        kill_switch.apply(
            &KillSwitchCommand {
                command_id: "c2".into(),
                command_type: KillSwitchCommandType::Resume,
                timestamp: 0,
                reason: "test".into(),
                target: CommandTarget { instance_id: Some("inst-1".into()), asset_id: None, organization: None },
                signature: None,
            },
            1,
        );
        let resumed = engine.check_permission(&identity, "read", None, None);
        assert!(resumed.allowed);
    }

    #[test]
    fn dry_run_allows_but_flags_would_deny() {
        let manifest = CapabilitiesManifest { denied_tools: alloc::vec!["*".into()], ..Default::default() };
        let identity = identity_with(manifest);
        let mut config = PolicyConfig::default();
        config.dry_run = true;
        let engine = PolicyEngine::new(config, Arc::new(KillSwitchRegistry::new(true, NoopHooks)));
        let decision = engine.check_permission(&identity, "anything", None, None);
        assert!(decision.allowed);
        assert!(decision.would_deny);
        assert!(decision.reason.unwrap().starts_with("WOULD_DENY:"));
    }

    #[test]
    fn empty_allow_list_denies_everything() {
        let identity = identity_with(CapabilitiesManifest::default());
        let decision = engine().check_permission(&identity, "anything", None, None);
        assert!(!decision.allowed);
    }

    #[test]
    fn dry_run_never_consumes_budget() {
        let manifest = CapabilitiesManifest {
            allowed_tools: alloc::vec!["*".into()],
            max_cost_per_session: Some(100.0),
            ..Default::default()
        };
        let identity = identity_with(manifest);
        let mut config = PolicyConfig::default();
        config.dry_run = true;
        let engine = PolicyEngine::new(config, Arc::new(KillSwitchRegistry::new(true, NoopHooks)));
        let ctx = ActionContext { cost: Some(60.0), tokens: None, purpose: None };
        engine.check_permission(&identity, "spend", None, Some(&ctx));
        engine.check_permission(&identity, "spend", None, Some(&ctx));
        let state = engine.budgets.lock();
        assert!(state.get("inst-1").map_or(true, |s| s.session_cost == 0.0));
    }

    // P8: two concurrent allowed calls cannot both push session_cost over the
    // session cap — the check-then-increment in `check_and_commit_budget`
    // runs under one lock acquisition per call.
    #[test]
    fn concurrent_calls_cannot_both_exceed_session_cap() {
        use std::sync::Barrier;
        use std::thread;

        let manifest = CapabilitiesManifest {
            allowed_tools: alloc::vec!["*".into()],
            max_cost_per_session: Some(100.0),
            ..Default::default()
        };
        let identity = Arc::new(identity_with(manifest));
        let engine = Arc::new(engine());
        let barrier = Arc::new(Barrier::new(8));

        let handles: alloc::vec::Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&engine);
                let identity = Arc::clone(&identity);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let ctx = ActionContext { cost: Some(30.0), tokens: None, purpose: None };
                    engine.check_permission(&identity, "spend", None, Some(&ctx)).allowed
                })
            })
            .collect();

        let allowed_count = handles.into_iter().filter(|h| h.join().unwrap()).count();

        // 100 / 30 = 3.33 -> at most 3 of the 8 concurrent calls can be
        // allowed without pushing session_cost over the cap.
        assert!(allowed_count <= 3, "expected at most 3 allowed calls, got {allowed_count}");
        let budgets = engine.budgets.lock();
        let session_cost = budgets.get(&identity.instance_id).unwrap().session_cost;
        assert!(session_cost <= 100.0, "session_cost {session_cost} exceeded the cap");
        assert_eq!(session_cost, allowed_count as f64 * 30.0);
    }
}
