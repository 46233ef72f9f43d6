// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! Identity & Lineage Manager.
//!
//! Binds an agent instance to a signed asset card and a golden-thread hash,
//! and propagates a capability manifest under a decay rule when agents spawn
//! children.

use alloc::string::{String, ToString};

use crate::types::{AssetCard, CapabilitiesManifest, CapabilityMode, GoldenThread, Lineage, RuntimeIdentity, RuntimeMode};

#[cfg(feature = "std")]
use crate::error::LineageError;
#[cfg(feature = "std")]
use crate::killswitch::RunState;

/// Fixed decay factor applied to numeric caps under `capability_mode = decay`.
///
/// Left as an implementation constant — the spec this kernel follows
/// explicitly leaves "configurable per tenant?" unresolved and does not
/// require it.
const DECAY_FACTOR: f64 = 0.80;

/// Computes `golden_thread_hash` for a `GoldenThread` tuple.
#[cfg(feature = "std")]
pub fn compute_golden_thread_hash(thread: &GoldenThread) -> String {
    use sha2::{Digest, Sha256};
    let payload = alloc::format!("{}|{}|{}", thread.ticket_id, thread.approved_by, thread.approved_at);
    let digest = Sha256::digest(payload.as_bytes());
    digest.iter().map(|b| alloc::format!("{:02x}", b)).collect()
}

/// Generates fresh UUIDv4 instance identifiers and builds/derives identities.
#[cfg(feature = "std")]
pub struct IdentityManager;

#[cfg(feature = "std")]
impl IdentityManager {
    /// Create a root [`RuntimeIdentity`] from an asset card.
    ///
    /// If the card declares a `golden_thread_hash`, it is verified against
    /// the freshly computed hash; mismatch fails with
    /// [`LineageError::GoldenThreadMismatch`] (P7).
    pub fn create_identity(
        card: &AssetCard,
        override_manifest: Option<CapabilitiesManifest>,
        now_ms: u64,
    ) -> Result<RuntimeIdentity, LineageError> {
        let computed_hash = compute_golden_thread_hash(&card.golden_thread);
        if let Some(declared) = &card.golden_thread_hash {
            if declared != &computed_hash {
                return Err(LineageError::GoldenThreadMismatch);
            }
        }

        let instance_id = uuid::Uuid::new_v4().to_string();
        Ok(RuntimeIdentity {
            instance_id: instance_id.clone(),
            asset_id: card.asset_id.clone(),
            risk_level: card.risk_level,
            capabilities_manifest: override_manifest.unwrap_or_else(|| card.capabilities_manifest.clone()),
            mode: RuntimeMode::Normal,
            lineage: Lineage::root(&instance_id, now_ms),
            created_at: now_ms,
            verified: true,
            golden_thread_hash: computed_hash,
        })
    }

    /// Spawn a child identity from `parent`, deriving its manifest per
    /// `parent.capabilities_manifest.capability_mode` and enforcing depth and
    /// mode restrictions.
    ///
    /// `kill_switch_state` is the parent's effective state read from the
    /// [`crate::killswitch::KillSwitchRegistry`] right before spawning — a
    /// `RESTRICTED` mode or a `TERMINATED` kill-switch state both deny the
    /// spawn with `SPAWN_DENIED_MODE`.
    pub fn spawn_child(
        parent: &RuntimeIdentity,
        requested_manifest: Option<CapabilitiesManifest>,
        kill_switch_state: RunState,
        now_ms: u64,
    ) -> Result<RuntimeIdentity, LineageError> {
        if kill_switch_state == RunState::Terminated {
            return Err(LineageError::SpawnDeniedTerminated);
        }
        if matches!(parent.mode, RuntimeMode::Restricted) {
            return Err(LineageError::SpawnDeniedMode(parent.mode));
        }
        if !parent.capabilities_manifest.may_spawn_children {
            return Err(LineageError::SpawnDeniedPolicy);
        }
        let child_depth = parent.lineage.generation_depth + 1;
        if child_depth > parent.capabilities_manifest.max_child_depth {
            return Err(LineageError::SpawnDeniedDepth {
                child_depth,
                max_child_depth: parent.capabilities_manifest.max_child_depth,
            });
        }

        let manifest = derive_child_manifest(&parent.capabilities_manifest, requested_manifest);

        let instance_id = uuid::Uuid::new_v4().to_string();
        Ok(RuntimeIdentity {
            instance_id,
            asset_id: parent.asset_id.clone(),
            risk_level: parent.risk_level,
            capabilities_manifest: manifest,
            mode: RuntimeMode::Normal,
            lineage: Lineage::child_of(parent, now_ms),
            created_at: now_ms,
            verified: parent.verified,
            golden_thread_hash: parent.golden_thread_hash.clone(),
        })
    }
}

/// Derive a child's effective manifest from `parent` per its
/// `capability_mode`. `requested` is the caller-supplied override, used only
/// under `explicit` mode (clipped to parent values element-wise).
fn derive_child_manifest(
    parent: &CapabilitiesManifest,
    requested: Option<CapabilitiesManifest>,
) -> CapabilitiesManifest {
    match parent.capability_mode {
        CapabilityMode::Inherit => parent.clone(),
        CapabilityMode::Decay => {
            let child_max_child_depth = parent.max_child_depth.saturating_sub(1);
            CapabilitiesManifest {
                allowed_tools: parent.allowed_tools.clone(),
                denied_tools: parent.denied_tools.clone(),
                allowed_domains: parent.allowed_domains.clone(),
                denied_domains: parent.denied_domains.clone(),
                may_spawn_children: parent.may_spawn_children && child_max_child_depth > 0,
                max_child_depth: child_max_child_depth,
                capability_mode: parent.capability_mode,
                max_cost_per_session: parent.max_cost_per_session.map(|v| decay(v)),
                max_cost_per_day: parent.max_cost_per_day.map(|v| decay(v)),
                max_cost_per_month: parent.max_cost_per_month.map(|v| decay(v)),
                max_tokens_per_call: parent.max_tokens_per_call.map(|v| decay_u64(v)),
                max_calls_per_minute: parent.max_calls_per_minute.map(|v| decay_u64(v)),
                custom: parent.custom.clone(),
            }
        }
        CapabilityMode::Explicit => {
            let req = requested.unwrap_or_default();
            CapabilitiesManifest {
                allowed_tools: clip_intersect_allow_tools(&parent.allowed_tools, req.allowed_tools),
                denied_tools: clip_union_deny(&parent.denied_tools, req.denied_tools),
                allowed_domains: clip_intersect_allow_domains(&parent.allowed_domains, req.allowed_domains),
                denied_domains: clip_union_deny(&parent.denied_domains, req.denied_domains),
                may_spawn_children: req.may_spawn_children && parent.may_spawn_children,
                max_child_depth: req.max_child_depth.min(parent.max_child_depth.saturating_sub(1)),
                capability_mode: CapabilityMode::Explicit,
                max_cost_per_session: clip_numeric(req.max_cost_per_session, parent.max_cost_per_session),
                max_cost_per_day: clip_numeric(req.max_cost_per_day, parent.max_cost_per_day),
                max_cost_per_month: clip_numeric(req.max_cost_per_month, parent.max_cost_per_month),
                max_tokens_per_call: clip_numeric(req.max_tokens_per_call, parent.max_tokens_per_call),
                max_calls_per_minute: clip_numeric(req.max_calls_per_minute, parent.max_calls_per_minute),
                custom: req.custom,
            }
        }
    }
}

fn decay(value: f64) -> f64 {
    (value * DECAY_FACTOR).floor()
}

fn decay_u64(value: u64) -> u64 {
    ((value as f64) * DECAY_FACTOR).floor() as u64
}

/// Explicit-mode numeric clip: caller-supplied value, but never above the
/// parent's cap. Absent parent cap means unbounded (caller value passes).
fn clip_numeric<T: PartialOrd + Copy>(requested: Option<T>, parent_cap: Option<T>) -> Option<T> {
    match (requested, parent_cap) {
        (Some(r), Some(p)) if r > p => Some(p),
        (Some(r), _) => Some(r),
        (None, _) => None,
    }
}

/// Explicit-mode deny lists: deny-overrides-allow survives, so the child's
/// deny list is the union of what the caller supplied and the parent's own
/// deny list — a caller cannot un-deny something the parent already denies.
fn clip_union_deny(parent_denies: &[String], requested_denies: alloc::vec::Vec<String>) -> alloc::vec::Vec<String> {
    let mut out = requested_denies;
    for pattern in parent_denies {
        if !out.contains(pattern) {
            out.push(pattern.clone());
        }
    }
    out
}

/// Explicit-mode tool allow list: clipped to ≤ parent values element-wise,
/// so a child can never be granted broader tool access than its parent ever
/// had. A requested pattern is kept only if the parent's own allow-list
/// would itself match it — a parent allow-listing `"*"` or the exact
/// pattern keeps it, anything broader is dropped.
fn clip_intersect_allow_tools(parent_allows: &[String], requested_allows: alloc::vec::Vec<String>) -> alloc::vec::Vec<String> {
    requested_allows
        .into_iter()
        .filter(|candidate| crate::pattern::any_matches(parent_allows.iter().map(String::as_str), candidate))
        .collect()
}

/// Same clip as [`clip_intersect_allow_tools`] but for domain patterns,
/// checked with [`crate::pattern::domain_matches`] so a parent's `"*."`
/// apex/subdomain pattern clips the same way the Bouncer itself matches
/// `allowed_domains` (`policy.rs`), instead of falling through to the
/// generic glob/regex matcher which doesn't know the `"*."` convention.
fn clip_intersect_allow_domains(parent_allows: &[String], requested_allows: alloc::vec::Vec<String>) -> alloc::vec::Vec<String> {
    requested_allows
        .into_iter()
        .filter(|candidate| crate::pattern::domain_matches(parent_allows.iter().map(String::as_str), candidate))
        .collect()
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    fn card_with_hash() -> AssetCard {
        let thread = GoldenThread { ticket_id: "T-1".into(), approved_by: "alice".into(), approved_at: 1000 };
        let hash = compute_golden_thread_hash(&thread);
        AssetCard {
            asset_id: "asset-1".into(),
            version: "1.0".into(),
            risk_level: crate::types::RiskLevel::Limited,
            capabilities_manifest: CapabilitiesManifest {
                may_spawn_children: true,
                max_child_depth: 2,
                capability_mode: CapabilityMode::Decay,
                max_cost_per_session: Some(100.0),
                ..Default::default()
            },
            golden_thread: thread,
            golden_thread_hash: Some(hash),
        }
    }

    #[test]
    fn golden_thread_mismatch_rejected() {
        let mut card = card_with_hash();
        card.golden_thread_hash = Some("deadbeef".into());
        let result = IdentityManager::create_identity(&card, None, 0);
        assert!(matches!(result, Err(LineageError::GoldenThreadMismatch)));
    }

    #[test]
    fn golden_thread_match_succeeds() {
        let card = card_with_hash();
        let identity = IdentityManager::create_identity(&card, None, 0).unwrap();
        assert!(identity.verified);
        assert_eq!(identity.lineage.generation_depth, 0);
    }

    #[test]
    fn spawn_decay_chain_matches_seed_scenario() {
        let card = card_with_hash();
        let root = IdentityManager::create_identity(&card, None, 0).unwrap();
        assert_eq!(root.capabilities_manifest.max_cost_per_session, Some(100.0));

        let child = IdentityManager::spawn_child(&root, None, RunState::Active, 1).unwrap();
        assert_eq!(child.capabilities_manifest.max_cost_per_session, Some(80.0));
        assert_eq!(child.capabilities_manifest.max_child_depth, 1);

        let grandchild = IdentityManager::spawn_child(&child, None, RunState::Active, 2).unwrap();
        assert_eq!(grandchild.capabilities_manifest.max_cost_per_session, Some(64.0));
        assert_eq!(grandchild.capabilities_manifest.max_child_depth, 0);

        let great_grandchild = IdentityManager::spawn_child(&grandchild, None, RunState::Active, 3);
        assert!(matches!(great_grandchild, Err(LineageError::SpawnDeniedDepth { .. })));
    }

    #[test]
    fn spawn_denied_when_policy_forbids() {
        let mut card = card_with_hash();
        card.capabilities_manifest.may_spawn_children = false;
        let root = IdentityManager::create_identity(&card, None, 0).unwrap();
        let result = IdentityManager::spawn_child(&root, None, RunState::Active, 1);
        assert!(matches!(result, Err(LineageError::SpawnDeniedPolicy)));
    }

    #[test]
    fn spawn_denied_when_kill_switch_terminated() {
        let card = card_with_hash();
        let root = IdentityManager::create_identity(&card, None, 0).unwrap();
        let result = IdentityManager::spawn_child(&root, None, RunState::Terminated, 1);
        assert!(matches!(result, Err(LineageError::SpawnDeniedTerminated)));
        // Distinct variant from a RESTRICTED parent, but the same stable
        // code — the taxonomy fixes SPAWN_DENIED_MODE for both.
        assert_eq!(result.unwrap_err().code(), "SPAWN_DENIED_MODE");
    }

    #[test]
    fn spawn_denied_when_parent_mode_restricted() {
        let card = card_with_hash();
        let mut root = IdentityManager::create_identity(&card, None, 0).unwrap();
        root.mode = RuntimeMode::Restricted;
        let result = IdentityManager::spawn_child(&root, None, RunState::Active, 1);
        assert!(matches!(result, Err(LineageError::SpawnDeniedMode(RuntimeMode::Restricted))));
    }

    #[test]
    fn explicit_mode_cannot_escalate_allow_lists() {
        let mut card = card_with_hash();
        card.capabilities_manifest.capability_mode = CapabilityMode::Explicit;
        card.capabilities_manifest.allowed_tools = alloc::vec!["database:read".into()];
        card.capabilities_manifest.allowed_domains = alloc::vec!["*.example.com".into()];
        let root = IdentityManager::create_identity(&card, None, 0).unwrap();

        let requested = CapabilitiesManifest {
            allowed_tools: alloc::vec!["database:read".into(), "database:drop".into()],
            allowed_domains: alloc::vec!["api.example.com".into(), "evil.com".into()],
            ..Default::default()
        };
        let child = IdentityManager::spawn_child(&root, Some(requested), RunState::Active, 1).unwrap();

        // Only the requested patterns the parent's own allow-list already
        // covers survive; "database:drop" and "evil.com" are dropped.
        assert_eq!(child.capabilities_manifest.allowed_tools, alloc::vec!["database:read".to_string()]);
        assert_eq!(child.capabilities_manifest.allowed_domains, alloc::vec!["api.example.com".to_string()]);
    }

    #[test]
    fn explicit_mode_wildcard_parent_allows_any_requested_pattern() {
        let mut card = card_with_hash();
        card.capabilities_manifest.capability_mode = CapabilityMode::Explicit;
        card.capabilities_manifest.allowed_tools = alloc::vec!["*".into()];
        let root = IdentityManager::create_identity(&card, None, 0).unwrap();

        let requested = CapabilitiesManifest { allowed_tools: alloc::vec!["database:drop".into()], ..Default::default() };
        let child = IdentityManager::spawn_child(&root, Some(requested), RunState::Active, 1).unwrap();
        assert_eq!(child.capabilities_manifest.allowed_tools, alloc::vec!["database:drop".to_string()]);
    }

    #[test]
    fn lineage_chain_extends_correctly() {
        let card = card_with_hash();
        let root = IdentityManager::create_identity(&card, None, 0).unwrap();
        let child = IdentityManager::spawn_child(&root, None, RunState::Active, 1).unwrap();
        assert_eq!(child.lineage.ancestor_chain, alloc::vec![root.instance_id.clone()]);
        assert_eq!(child.lineage.root_instance_id, root.instance_id);
        assert_eq!(child.lineage.generation_depth, 1);
    }
}
