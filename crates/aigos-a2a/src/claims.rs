// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! Wire shape of a Governance Token's payload.
//!
//! `TokenClaims` carries the standard JWT registered claims plus one
//! `aigos` block holding the live governance snapshot taken at issue time.
//! Field names match the wire format exactly (`#[serde(rename)]` is never
//! needed beyond what's declared here) so a peer implementation on another
//! stack can deserialize the same JSON.

use serde::{Deserialize, Serialize};

use aigos_core::{CapabilitiesManifest, Lineage, RiskLevel, RuntimeMode};

/// Protocol version carried in every token's `aigos.version` field.
pub const PROTOCOL_VERSION: &str = "1.0";

/// JWT `typ` header values this crate accepts. `AIGOS-GOV+jwt` is issued;
/// bare `JWT` is accepted for legacy peers per the wire spec.
pub const TOKEN_TYPE: &str = "AIGOS-GOV+jwt";
pub const TOKEN_TYPE_LEGACY: &str = "JWT";

/// Top-level JWT payload: standard registered claims plus the `aigos` block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: Vec<String>,
    pub iat: u64,
    pub nbf: u64,
    pub exp: u64,
    /// Globally unique per token, echoed back in `X-AIGOS-Request-Id`.
    pub jti: String,
    pub aigos: AigosClaims,
}

/// The governance snapshot block. Every sub-struct here is a frozen
/// point-in-time copy taken immediately before signing — `generate` never
/// holds a live reference into the caller's identity past that moment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AigosClaims {
    pub version: String,
    pub identity: IdentitySnapshot,
    pub governance: GovernanceSnapshot,
    pub control: ControlSnapshot,
    pub capabilities: CapabilitiesSnapshot,
    pub lineage: LineageSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    pub instance_id: String,
    pub asset_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceSnapshot {
    pub risk_level: RiskLevel,
    pub golden_thread_hash: String,
    /// Whether the issuer's Identity Manager verified the golden thread
    /// hash against the asset card's declared value at identity creation.
    pub golden_thread_verified: bool,
    pub mode: RuntimeMode,
}

/// Kill-switch state as observed at issue time. `paused` and
/// `termination_pending` are independent booleans rather than a copy of
/// `RunState` so that a verifier with no knowledge of the three-state FSM
/// can still make reject/accept decisions from the wire format alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlSnapshot {
    pub kill_switch_enabled: bool,
    pub paused: bool,
    pub termination_pending: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitiesSnapshot {
    pub hash: String,
    pub tools: Vec<String>,
    pub max_budget: Option<f64>,
    pub can_spawn: bool,
    pub max_child_depth: u32,
}

impl CapabilitiesSnapshot {
    pub fn from_manifest(manifest: &CapabilitiesManifest) -> Self {
        Self {
            hash: manifest_hash(manifest),
            tools: manifest.allowed_tools.clone(),
            max_budget: manifest.max_cost_per_session,
            can_spawn: manifest.may_spawn_children,
            max_child_depth: manifest.max_child_depth,
        }
    }
}

/// Stable digest over the parts of a manifest that change the
/// trust decision, so a verifier can tell at a glance whether two tokens
/// from the same instance carry the same effective capabilities without
/// round-tripping the whole manifest.
fn manifest_hash(manifest: &CapabilitiesManifest) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    for tool in &manifest.allowed_tools {
        hasher.update(tool.as_bytes());
        hasher.update(b"\0");
    }
    for tool in &manifest.denied_tools {
        hasher.update(tool.as_bytes());
        hasher.update(b"\0");
    }
    hasher.update(manifest.max_cost_per_session.unwrap_or(0.0).to_bits().to_le_bytes());
    hasher.update([manifest.may_spawn_children as u8]);
    hasher.update(manifest.max_child_depth.to_le_bytes());
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageSnapshot {
    pub parent_instance_id: Option<String>,
    pub generation_depth: u32,
    pub root_instance_id: String,
}

impl From<&Lineage> for LineageSnapshot {
    fn from(lineage: &Lineage) -> Self {
        Self {
            parent_instance_id: lineage.parent_instance_id.clone(),
            generation_depth: lineage.generation_depth,
            root_instance_id: lineage.root_instance_id.clone(),
        }
    }
}
