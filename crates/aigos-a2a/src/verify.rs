// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! Token verification: the strict 8-step algorithm.
//!
//! `jsonwebtoken`'s built-in temporal/issuer/audience checks are
//! deliberately disabled (`validate_exp`/`validate_nbf`/`validate_aud` all
//! `false`, `required_spec_claims` empty) so each failure mode below maps to
//! one of this protocol's own stable codes instead of the crate's bundled
//! `ErrorKind::ExpiredSignature`-style variants, which don't carry enough
//! detail to report `exp`/`now` back to the caller.

use std::collections::HashSet;

use jsonwebtoken::{decode, decode_header, Algorithm, Validation};

use crate::claims::{TokenClaims, TOKEN_TYPE, TOKEN_TYPE_LEGACY};
use crate::error::A2AError;
use crate::keys::TrustedKeyCache;

#[derive(Debug, Clone)]
pub struct VerifyOptions {
    pub required_issuer: String,
    pub required_audiences: Vec<String>,
    pub max_clock_skew_secs: u64,
    pub validate_control: bool,
    pub reject_paused: bool,
    pub reject_terminated: bool,
}

impl VerifyOptions {
    pub fn new(required_issuer: impl Into<String>, required_audiences: Vec<String>) -> Self {
        Self {
            required_issuer: required_issuer.into(),
            required_audiences,
            max_clock_skew_secs: 30,
            validate_control: true,
            reject_paused: true,
            reject_terminated: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub claims: TokenClaims,
    pub warnings: Vec<String>,
}

/// Run the full 8-step verification algorithm against `token` as of `now`
/// (Unix epoch seconds).
pub fn verify(token: &str, keys: &TrustedKeyCache, opts: &VerifyOptions, now: u64) -> Result<VerifiedToken, A2AError> {
    // Step 1: structural — three dot-separated segments, decodable header,
    // typ/alg within the accepted set.
    if token.split('.').count() != 3 {
        return Err(A2AError::InvalidFormat("expected three dot-separated segments".into()));
    }
    let header = decode_header(token).map_err(|e| A2AError::InvalidFormat(e.to_string()))?;
    match header.typ.as_deref() {
        Some(TOKEN_TYPE) | Some(TOKEN_TYPE_LEGACY) | None => {}
        Some(other) => return Err(A2AError::InvalidFormat(format!("unsupported typ {other:?}"))),
    }
    if !matches!(header.alg, Algorithm::ES256 | Algorithm::RS256 | Algorithm::HS256) {
        return Err(A2AError::InvalidFormat(format!("unsupported alg {:?}", header.alg)));
    }

    // Step 2: key lookup by kid, refreshing (rate-limited) on miss.
    let trusted = match &header.kid {
        Some(kid) => keys.get_or_refresh(kid).ok_or_else(|| A2AError::KeyNotFound(Some(kid.clone())))?,
        None => return Err(A2AError::KeyNotFound(None)),
    };
    if trusted.algorithm != header.alg {
        return Err(A2AError::InvalidSignature);
    }

    // Step 3: cryptographic signature over header.payload. Temporal/issuer/
    // audience checks are disabled here and performed explicitly below.
    let mut validation = Validation::new(header.alg);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    let data = decode::<TokenClaims>(token, &trusted.decoding_key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::InvalidSignature => A2AError::InvalidSignature,
        _ => A2AError::InvalidFormat(e.to_string()),
    })?;
    let claims = data.claims;

    // Step 4: temporal claims, skewed.
    let skew = opts.max_clock_skew_secs;
    if claims.exp + skew < now {
        return Err(A2AError::Expired { exp: claims.exp, now });
    }
    if claims.nbf > now + skew {
        return Err(A2AError::NotYetValid { nbf: claims.nbf, now });
    }

    // Step 5: issuer exact match, at least one required audience present.
    if claims.iss != opts.required_issuer {
        return Err(A2AError::InvalidIssuer { expected: opts.required_issuer.clone(), actual: claims.iss.clone() });
    }
    if !opts.required_audiences.is_empty() && !opts.required_audiences.iter().any(|a| claims.aud.contains(a)) {
        return Err(A2AError::InvalidAudience { required: opts.required_audiences.clone(), actual: claims.aud.clone() });
    }

    // Step 6: the aigos block parsed successfully as part of deserializing
    // TokenClaims above — a malformed block fails at Step 3's decode, so
    // reaching here means the schema already validated.

    let mut warnings = Vec::new();

    // Step 7: control-state enforcement, only when requested.
    if opts.validate_control {
        if opts.reject_paused && claims.aigos.control.paused {
            return Err(A2AError::PausedAgent);
        }
        if opts.reject_terminated && claims.aigos.control.termination_pending {
            return Err(A2AError::TerminationPending);
        }
        if !claims.aigos.control.kill_switch_enabled {
            warnings.push("peer kill_switch.enabled is false".to_string());
        }
    }

    // Step 8: golden-thread verification is asserted by the issuer, not
    // re-derived here (the verifier has no access to the card); warn rather
    // than fail since this is advisory per the protocol.
    if !claims.aigos.governance.golden_thread_verified {
        warnings.push("governance.golden_thread.verified is false".to_string());
    }

    Ok(VerifiedToken { claims, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::{generate, GenerateOptions, KillSwitchSnapshot};
    use crate::keys::{SigningKey, StaticKeyStore, TrustedKey};
    use aigos_core::killswitch::RunState;
    use aigos_core::types::{CapabilitiesManifest, Lineage, RiskLevel, RuntimeIdentity, RuntimeMode};
    use jsonwebtoken::{DecodingKey, EncodingKey};

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

    fn cache() -> TrustedKeyCache {
        let store = StaticKeyStore::new(vec![TrustedKey {
            kid: "k1".into(),
            algorithm: Algorithm::HS256,
            decoding_key: DecodingKey::from_secret(b"test-secret"),
        }]);
        let cache = TrustedKeyCache::new(Box::new(store));
        cache.prime().unwrap();
        cache
    }

    fn signing_key() -> SigningKey {
        SigningKey { kid: "k1".into(), algorithm: Algorithm::HS256, encoding_key: EncodingKey::from_secret(b"test-secret") }
    }

    #[test]
    fn round_trip_succeeds() {
        let gen_opts = GenerateOptions::new("aigos-issuer", vec!["peer-a".into()]);
        let snapshot = KillSwitchSnapshot { run_state: RunState::Active, kill_switch_enabled: true };
        let (token, ..) = generate(&identity(), &signing_key(), snapshot, &gen_opts, 1_000).unwrap();

        let verify_opts = VerifyOptions::new("aigos-issuer", vec!["peer-a".into()]);
        let result = verify(&token, &cache(), &verify_opts, 1_010).unwrap();
        assert_eq!(result.claims.sub, "inst-1");
    }

    #[test]
    fn expired_token_rejected() {
        let gen_opts = GenerateOptions::new("aigos-issuer", vec!["peer-a".into()]);
        let snapshot = KillSwitchSnapshot { run_state: RunState::Active, kill_switch_enabled: true };
        let (token, ..) = generate(&identity(), &signing_key(), snapshot, &gen_opts, 1_000).unwrap();

        let verify_opts = VerifyOptions::new("aigos-issuer", vec!["peer-a".into()]);
        let far_future = 1_000 + crate::generate::DEFAULT_TTL_SECS + 1_000;
        let result = verify(&token, &cache(), &verify_opts, far_future);
        assert!(matches!(result, Err(A2AError::Expired { .. })));
    }

    #[test]
    fn wrong_issuer_rejected() {
        let gen_opts = GenerateOptions::new("aigos-issuer", vec!["peer-a".into()]);
        let snapshot = KillSwitchSnapshot { run_state: RunState::Active, kill_switch_enabled: true };
        let (token, ..) = generate(&identity(), &signing_key(), snapshot, &gen_opts, 1_000).unwrap();

        let verify_opts = VerifyOptions::new("someone-else", vec!["peer-a".into()]);
        let result = verify(&token, &cache(), &verify_opts, 1_010);
        assert!(matches!(result, Err(A2AError::InvalidIssuer { .. })));
    }

    #[test]
    fn paused_agent_rejected_when_requested() {
        let gen_opts = GenerateOptions::new("aigos-issuer", vec!["peer-a".into()]);
        let snapshot = KillSwitchSnapshot { run_state: RunState::Paused, kill_switch_enabled: true };
        let (token, ..) = generate(&identity(), &signing_key(), snapshot, &gen_opts, 1_000).unwrap();

        let verify_opts = VerifyOptions::new("aigos-issuer", vec!["peer-a".into()]);
        let result = verify(&token, &cache(), &verify_opts, 1_010);
        assert!(matches!(result, Err(A2AError::PausedAgent)));
    }

    #[test]
    fn unknown_kid_rejected() {
        let gen_opts = GenerateOptions::new("aigos-issuer", vec!["peer-a".into()]);
        let snapshot = KillSwitchSnapshot { run_state: RunState::Active, kill_switch_enabled: true };
        let other_key =
            SigningKey { kid: "k2".into(), algorithm: Algorithm::HS256, encoding_key: EncodingKey::from_secret(b"other") };
        let (token, ..) = generate(&identity(), &other_key, snapshot, &gen_opts, 1_000).unwrap();

        let verify_opts = VerifyOptions::new("aigos-issuer", vec!["peer-a".into()]);
        let result = verify(&token, &cache(), &verify_opts, 1_010);
        assert!(matches!(result, Err(A2AError::KeyNotFound(_))));
    }
}
