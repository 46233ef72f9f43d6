// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! Token issuance: `generate(identity, key, opts) -> (token, payload, expires_at)`.
//!
//! The issuer reads identity and kill-switch state immediately before
//! signing, so a pause or terminate landing between the read and the HTTP
//! response never produces a token that understates the caller's risk.

use jsonwebtoken::{encode, EncodingKey, Header};
use uuid::Uuid;

use aigos_core::killswitch::RunState;
use aigos_core::types::RuntimeIdentity;

use crate::claims::{
    AigosClaims, CapabilitiesSnapshot, ControlSnapshot, GovernanceSnapshot, IdentitySnapshot, LineageSnapshot,
    TokenClaims, PROTOCOL_VERSION, TOKEN_TYPE,
};
use crate::error::A2AError;
use crate::keys::SigningKey;

/// Default token lifetime, per the wire format (§3 `GovernanceToken`).
pub const DEFAULT_TTL_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub audience: Vec<String>,
    pub ttl_secs: u64,
    pub issuer: String,
}

impl GenerateOptions {
    pub fn new(issuer: impl Into<String>, audience: Vec<String>) -> Self {
        Self { audience, ttl_secs: DEFAULT_TTL_SECS, issuer: issuer.into() }
    }
}

/// Snapshot of kill-switch state the caller reads right before calling
/// [`generate`], keeping the core's `KillSwitchRegistry` decoupled from this
/// crate's token format.
#[derive(Debug, Clone, Copy)]
pub struct KillSwitchSnapshot {
    pub run_state: RunState,
    pub kill_switch_enabled: bool,
}

/// Issue a signed governance token for `identity` at `now` (Unix epoch
/// seconds), embedding `kill_switch`'s state as observed at this instant.
///
/// Returns the compact JWS, the decoded claims (so the caller doesn't have
/// to re-parse its own output), and the `exp` timestamp.
pub fn generate(
    identity: &RuntimeIdentity,
    key: &SigningKey,
    kill_switch: KillSwitchSnapshot,
    opts: &GenerateOptions,
    now: u64,
) -> Result<(String, TokenClaims, u64), A2AError> {
    let exp = now + opts.ttl_secs;

    let claims = TokenClaims {
        iss: opts.issuer.clone(),
        sub: identity.instance_id.clone(),
        aud: opts.audience.clone(),
        iat: now,
        nbf: now,
        exp,
        jti: Uuid::new_v4().to_string(),
        aigos: AigosClaims {
            version: PROTOCOL_VERSION.to_string(),
            identity: IdentitySnapshot { instance_id: identity.instance_id.clone(), asset_id: identity.asset_id.clone() },
            governance: GovernanceSnapshot {
                risk_level: identity.risk_level,
                golden_thread_hash: identity.golden_thread_hash.clone(),
                golden_thread_verified: identity.verified,
                mode: identity.mode,
            },
            control: ControlSnapshot {
                kill_switch_enabled: kill_switch.kill_switch_enabled,
                paused: kill_switch.run_state == RunState::Paused,
                termination_pending: kill_switch.run_state == RunState::Terminated,
            },
            capabilities: CapabilitiesSnapshot::from_manifest(&identity.capabilities_manifest),
            lineage: LineageSnapshot::from(&identity.lineage),
        },
    };

    let mut header = Header::new(key.algorithm);
    header.typ = Some(TOKEN_TYPE.to_string());
    header.kid = Some(key.kid.clone());

    let token = encode(&header, &claims, encoding_key(key))
        .map_err(|e| A2AError::InvalidClaims(format!("signing failed: {e}")))?;

    Ok((token, claims, exp))
}

fn encoding_key(key: &SigningKey) -> &EncodingKey {
    &key.encoding_key
}

#[cfg(test)]
mod tests {
    use super::*;
    use aigos_core::types::{CapabilitiesManifest, Lineage, RiskLevel, RuntimeMode};

    fn identity() -> RuntimeIdentity {
        RuntimeIdentity {
            instance_id: "inst-1".into(),
            asset_id: "asset-1".into(),
            risk_level: RiskLevel::Limited,
            capabilities_manifest: CapabilitiesManifest { allowed_tools: vec!["report".into()], ..Default::default() },
            mode: RuntimeMode::Normal,
            lineage: Lineage::root("inst-1", 0),
            created_at: 0,
            verified: true,
            golden_thread_hash: "deadbeef".into(),
        }
    }

    fn key() -> SigningKey {
        SigningKey {
            kid: "k1".into(),
            algorithm: jsonwebtoken::Algorithm::HS256,
            encoding_key: EncodingKey::from_secret(b"test-secret"),
        }
    }

    #[test]
    fn generate_embeds_governance_snapshot() {
        let opts = GenerateOptions::new("aigos-issuer", vec!["peer-a".into()]);
        let snapshot = KillSwitchSnapshot { run_state: RunState::Active, kill_switch_enabled: true };
        let (token, claims, exp) = generate(&identity(), &key(), snapshot, &opts, 1_000).unwrap();
        assert!(!token.is_empty());
        assert_eq!(claims.sub, "inst-1");
        assert_eq!(exp, 1_000 + DEFAULT_TTL_SECS);
        assert!(!claims.aigos.control.paused);
        assert!(!claims.aigos.control.termination_pending);
    }

    #[test]
    fn generate_reflects_paused_state_at_issue() {
        let opts = GenerateOptions::new("aigos-issuer", vec!["peer-a".into()]);
        let snapshot = KillSwitchSnapshot { run_state: RunState::Paused, kill_switch_enabled: true };
        let (_, claims, _) = generate(&identity(), &key(), snapshot, &opts, 1_000).unwrap();
        assert!(claims.aigos.control.paused);
    }
}
