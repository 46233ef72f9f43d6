// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! Inbound and outbound trust policy: which peers a verified token is
//! actually allowed to act as, beyond cryptographic and temporal validity.

use aigos_core::types::{RiskLevel, RuntimeMode};

use crate::claims::TokenClaims;
use crate::error::A2AError;

/// Server-side policy applied to an inbound, already-[`crate::verify`]ed
/// token.
#[derive(Debug, Clone, Default)]
pub struct InboundPolicy {
    /// Non-empty means an allow-list; an empty list admits any asset.
    pub allowed_asset_ids: Vec<String>,
    pub max_risk_level: Option<RiskLevel>,
    pub min_mode: Option<RuntimeMode>,
    /// Whether a cryptographic signature is mandatory. [`crate::verify`]
    /// always checks the signature regardless of this flag today — it exists
    /// so the inbound config surface has a place for a future relaxed mode
    /// to turn it off, per the kernel's configuration surface.
    pub require_signature: bool,
    pub require_golden_thread_verified: bool,
}

impl InboundPolicy {
    pub fn check(&self, claims: &TokenClaims) -> Result<(), A2AError> {
        if !self.allowed_asset_ids.is_empty() && !self.allowed_asset_ids.contains(&claims.aigos.identity.asset_id) {
            return Err(A2AError::PolicyViolation(format!(
                "asset_id {} not in inbound allow-list",
                claims.aigos.identity.asset_id
            )));
        }
        if let Some(max) = self.max_risk_level {
            if claims.aigos.governance.risk_level > max {
                return Err(A2AError::PolicyViolation(format!(
                    "peer risk_level {:?} exceeds max {:?}",
                    claims.aigos.governance.risk_level, max
                )));
            }
        }
        if let Some(min_mode) = self.min_mode {
            if mode_rank(claims.aigos.governance.mode) < mode_rank(min_mode) {
                return Err(A2AError::PolicyViolation(format!(
                    "peer mode {:?} below required minimum {:?}",
                    claims.aigos.governance.mode, min_mode
                )));
            }
        }
        if self.require_golden_thread_verified && !claims.aigos.governance.golden_thread_verified {
            return Err(A2AError::PolicyViolation("golden_thread not verified by issuer".into()));
        }
        Ok(())
    }
}

/// Relative trust ordering of runtime modes, used only to compare against a
/// configured floor — the policy engine itself never ranks modes this way.
fn mode_rank(mode: RuntimeMode) -> u8 {
    match mode {
        RuntimeMode::Restricted => 0,
        RuntimeMode::ReadOnly => 1,
        RuntimeMode::Sandbox => 2,
        RuntimeMode::Degraded => 2,
        RuntimeMode::Maintenance => 2,
        RuntimeMode::Normal => 3,
        RuntimeMode::Emergency => 3,
    }
}

/// Client-side per-destination rule set. `require_tls` is enforced by the
/// caller at URL-construction time (this crate never opens a socket itself);
/// everything else is checked here pre-flight (against the URL/host alone)
/// and post-flight (against the verified peer token).
#[derive(Debug, Clone)]
pub struct OutboundRule {
    pub host_pattern: String,
    pub allow: bool,
    pub require_tls: bool,
    pub require_peer_risk_max: Option<RiskLevel>,
    pub required_caller_modes: Vec<RuntimeMode>,
}

#[derive(Debug, Clone, Default)]
pub struct OutboundPolicy {
    pub rules: Vec<OutboundRule>,
}

impl OutboundPolicy {
    fn matching_rule(&self, host: &str) -> Option<&OutboundRule> {
        self.rules.iter().find(|rule| aigos_core::pattern::domain_matches([rule.host_pattern.as_str()], host))
    }

    /// Cheap pre-flight check against the destination URL/host alone,
    /// before any network call is made.
    pub fn check_preflight(&self, host: &str, scheme: &str) -> Result<(), A2AError> {
        let Some(rule) = self.matching_rule(host) else {
            return Ok(());
        };
        if !rule.allow {
            return Err(A2AError::PolicyViolation(format!("outbound policy denies host {host}")));
        }
        if rule.require_tls && scheme != "https" {
            return Err(A2AError::PolicyViolation(format!("outbound policy requires TLS for host {host}")));
        }
        Ok(())
    }

    /// Post-flight check against the verified peer token; can veto even
    /// after a successful HTTP round trip.
    pub fn check_postflight(&self, host: &str, peer_claims: &TokenClaims) -> Result<(), A2AError> {
        let Some(rule) = self.matching_rule(host) else {
            return Ok(());
        };
        if let Some(max) = rule.require_peer_risk_max {
            if peer_claims.aigos.governance.risk_level > max {
                return Err(A2AError::PolicyViolation(format!(
                    "peer risk_level {:?} exceeds outbound rule max {:?}",
                    peer_claims.aigos.governance.risk_level, max
                )));
            }
        }
        if !rule.required_caller_modes.is_empty() && !rule.required_caller_modes.contains(&peer_claims.aigos.governance.mode)
        {
            return Err(A2AError::PolicyViolation(format!(
                "peer mode {:?} not in required set {:?}",
                peer_claims.aigos.governance.mode, rule.required_caller_modes
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{
        AigosClaims, CapabilitiesSnapshot, ControlSnapshot, GovernanceSnapshot, IdentitySnapshot, LineageSnapshot,
        PROTOCOL_VERSION,
    };

    fn claims_with(asset_id: &str, risk: RiskLevel, mode: RuntimeMode) -> TokenClaims {
        TokenClaims {
            iss: "issuer".into(),
            sub: "inst-1".into(),
            aud: vec!["aud".into()],
            iat: 0,
            nbf: 0,
            exp: 1000,
            jti: "jti-1".into(),
            aigos: AigosClaims {
                version: PROTOCOL_VERSION.into(),
                identity: IdentitySnapshot { instance_id: "inst-1".into(), asset_id: asset_id.into() },
                governance: GovernanceSnapshot {
                    risk_level: risk,
                    golden_thread_hash: "hash".into(),
                    golden_thread_verified: true,
                    mode,
                },
                control: ControlSnapshot { kill_switch_enabled: true, paused: false, termination_pending: false },
                capabilities: CapabilitiesSnapshot {
                    hash: "h".into(),
                    tools: vec![],
                    max_budget: None,
                    can_spawn: false,
                    max_child_depth: 0,
                },
                lineage: LineageSnapshot { parent_instance_id: None, generation_depth: 0, root_instance_id: "inst-1".into() },
            },
        }
    }

    #[test]
    fn inbound_rejects_asset_not_on_allow_list() {
        let policy = InboundPolicy { allowed_asset_ids: vec!["asset-a".into()], ..Default::default() };
        let claims = claims_with("asset-b", RiskLevel::Minimal, RuntimeMode::Normal);
        assert!(policy.check(&claims).is_err());
    }

    #[test]
    fn inbound_rejects_risk_above_ceiling() {
        let policy = InboundPolicy { max_risk_level: Some(RiskLevel::Limited), ..Default::default() };
        let claims = claims_with("asset-a", RiskLevel::High, RuntimeMode::Normal);
        assert!(policy.check(&claims).is_err());
    }

    #[test]
    fn outbound_preflight_denies_blocked_host() {
        let policy = OutboundPolicy {
            rules: vec![OutboundRule {
                host_pattern: "*.blocked.example".into(),
                allow: false,
                require_tls: false,
                require_peer_risk_max: None,
                required_caller_modes: vec![],
            }],
        };
        assert!(policy.check_preflight("api.blocked.example", "https").is_err());
    }

    #[test]
    fn outbound_postflight_vetoes_high_risk_peer() {
        let policy = OutboundPolicy {
            rules: vec![OutboundRule {
                host_pattern: "*.example.com".into(),
                allow: true,
                require_tls: true,
                require_peer_risk_max: Some(RiskLevel::Limited),
                required_caller_modes: vec![],
            }],
        };
        let claims = claims_with("asset-a", RiskLevel::High, RuntimeMode::Normal);
        assert!(policy.check_postflight("api.example.com", &claims).is_err());
    }
}
