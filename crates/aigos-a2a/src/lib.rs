// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! # aigos-a2a
//!
//! Governance Token Protocol (A2A): short-lived signed JWTs carrying a
//! governed agent's live governance state, so two governed agents can
//! authenticate each other and a verifier can reject a paused or
//! terminated peer without calling back into the issuer.
//!
//! - [`claims`] — the wire shape of a token's payload.
//! - [`keys`] — trusted key material and the copy-on-write verification
//!   key cache.
//! - [`generate`] / [`verify`] — the two core operations: mint a token from
//!   a live [`aigos_core::types::RuntimeIdentity`] snapshot, and run the
//!   strict 8-step verification algorithm against one.
//! - [`trust`] — inbound (server-side) and outbound (client-side) trust
//!   policy layered on top of cryptographic/temporal validity.
//! - [`middleware`] — Axum inbound middleware and reqwest outbound
//!   middleware, each gated behind its own feature.
//! - [`config`] — TOML/env loading for generator and validator
//!   configuration, behind the `config-loader` feature.
//!
//! ## Quick start
//!
//! ```rust
//! use aigos_a2a::generate::{generate, GenerateOptions, KillSwitchSnapshot};
//! use aigos_a2a::keys::SigningKey;
//! use aigos_a2a::verify::{verify, VerifyOptions};
//! use aigos_a2a::keys::{StaticKeyStore, TrustedKey, TrustedKeyCache};
//! use aigos_core::killswitch::RunState;
//! use aigos_core::types::{CapabilitiesManifest, Lineage, RiskLevel, RuntimeIdentity, RuntimeMode};
//! use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
//!
//! let identity = RuntimeIdentity {
//!     instance_id: "inst-1".into(),
//!     asset_id: "asset-1".into(),
//!     risk_level: RiskLevel::Limited,
//!     capabilities_manifest: CapabilitiesManifest { allowed_tools: vec!["report".into()], ..Default::default() },
//!     mode: RuntimeMode::Normal,
//!     lineage: Lineage::root("inst-1", 0),
//!     created_at: 0,
//!     verified: true,
//!     golden_thread_hash: "deadbeef".into(),
//! };
//!
//! let signing_key = SigningKey { kid: "k1".into(), algorithm: Algorithm::HS256, encoding_key: EncodingKey::from_secret(b"secret") };
//! let snapshot = KillSwitchSnapshot { run_state: RunState::Active, kill_switch_enabled: true };
//! let opts = GenerateOptions::new("aigos-issuer", vec!["peer-a".into()]);
//! let (token, _, _) = generate(&identity, &signing_key, snapshot, &opts, 1_000).unwrap();
//!
//! let trusted = TrustedKey { kid: "k1".into(), algorithm: Algorithm::HS256, decoding_key: DecodingKey::from_secret(b"secret") };
//! let cache = TrustedKeyCache::new(Box::new(StaticKeyStore::new(vec![trusted])));
//! cache.prime().unwrap();
//! let verify_opts = VerifyOptions::new("aigos-issuer", vec!["peer-a".into()]);
//! let result = verify(&token, &cache, &verify_opts, 1_010).unwrap();
//! assert_eq!(result.claims.sub, "inst-1");
//! ```

pub mod claims;
pub mod error;
pub mod generate;
pub mod keys;
pub mod middleware;
pub mod trust;
pub mod verify;

#[cfg(feature = "config-loader")]
pub mod config;

pub use claims::{AigosClaims, TokenClaims};
pub use error::A2AError;
pub use generate::{generate as generate_token, GenerateOptions, KillSwitchSnapshot};
pub use keys::{KeyStore, SigningKey, StaticKeyStore, TrustedKey, TrustedKeyCache};
pub use trust::{InboundPolicy, OutboundPolicy, OutboundRule};
pub use verify::{verify as verify_token, VerifiedToken, VerifyOptions};

#[cfg(feature = "reqwest-middleware")]
pub use keys::JwksKeyStore;
