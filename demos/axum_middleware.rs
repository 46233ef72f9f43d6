// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! # Axum Governance Middleware Demo
//!
//! Wires [`aigos_a2a::middleware::inbound::governance_middleware`] onto a
//! small Axum router: every request must carry a valid `X-AIGOS-Token`
//! governance token, which is verified and checked against an
//! [`InboundPolicy`] before the handler runs. Run with:
//!
//! ```bash
//! cargo run -p aigos-a2a --example axum_middleware --features axum-middleware
//! ```

use std::sync::Arc;

use aigos_a2a::generate::{generate, GenerateOptions, KillSwitchSnapshot};
use aigos_a2a::keys::{SigningKey, StaticKeyStore, TrustedKey, TrustedKeyCache};
use aigos_a2a::middleware::inbound::{governance_middleware, InboundContext, VerifiedPeer};
use aigos_a2a::trust::InboundPolicy;
use aigos_core::killswitch::{KillSwitchRegistry, NoopHooks, RunState};
use aigos_core::types::{CapabilitiesManifest, Lineage, RiskLevel, RuntimeIdentity, RuntimeMode};
use axum::extract::Extension;
use axum::routing::get;
use axum::Router;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};

const SHARED_SECRET: &[u8] = b"demo-shared-secret";

fn server_identity() -> RuntimeIdentity {
    RuntimeIdentity {
        instance_id: "gateway-1".into(),
        asset_id: "asset-gateway".into(),
        risk_level: RiskLevel::Minimal,
        capabilities_manifest: CapabilitiesManifest { allowed_tools: vec!["*".into()], ..Default::default() },
        mode: RuntimeMode::Normal,
        lineage: Lineage::root("gateway-1", 0),
        created_at: 0,
        verified: true,
        golden_thread_hash: "gateway-thread".into(),
    }
}

fn build_router() -> Router {
    let signing_key = SigningKey { kid: "gateway-k1".into(), algorithm: Algorithm::HS256, encoding_key: EncodingKey::from_secret(SHARED_SECRET) };
    let trusted = TrustedKey { kid: "gateway-k1".into(), algorithm: Algorithm::HS256, decoding_key: DecodingKey::from_secret(SHARED_SECRET) };
    let trusted_keys = TrustedKeyCache::new(Box::new(StaticKeyStore::new(vec![trusted])));
    trusted_keys.prime().expect("static key store never fails to fetch");

    let ctx = Arc::new(InboundContext {
        trusted_keys,
        policy: InboundPolicy { max_risk_level: Some(RiskLevel::High), require_golden_thread_verified: true, ..Default::default() },
        required_issuer: "aigos-caller".into(),
        required_audiences: vec!["gateway".into()],
        signing_key,
        issuer: "gateway".into(),
        exclude_paths: vec!["/healthz".into()],
        server_identity: server_identity(),
        kill_switch: Arc::new(KillSwitchRegistry::new(true, NoopHooks)),
    });

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/invoices", get(handle_invoices))
        .layer(axum::middleware::from_fn_with_state(ctx.clone(), governance_middleware))
        .with_state(ctx)
}

async fn handle_invoices(Extension(peer): Extension<VerifiedPeer>) -> String {
    format!("hello {}, your mode is {:?}", peer.0.sub, peer.0.aigos.governance.mode)
}

/// Mints a token a caller would present, purely for this demo's own use —
/// a real caller mints its own via its own signing key and identity.
fn mint_demo_caller_token() -> String {
    let signing_key = SigningKey { kid: "gateway-k1".into(), algorithm: Algorithm::HS256, encoding_key: EncodingKey::from_secret(SHARED_SECRET) };
    let caller = RuntimeIdentity {
        instance_id: "caller-1".into(),
        asset_id: "asset-invoice-bot".into(),
        risk_level: RiskLevel::Limited,
        capabilities_manifest: CapabilitiesManifest { allowed_tools: vec!["invoice:*".into()], ..Default::default() },
        mode: RuntimeMode::Normal,
        lineage: Lineage::root("caller-1", 0),
        created_at: 0,
        verified: true,
        golden_thread_hash: "caller-thread".into(),
    };
    let opts = GenerateOptions::new("aigos-caller", vec!["gateway".into()]);
    let snapshot = KillSwitchSnapshot { run_state: RunState::Active, kill_switch_enabled: true };
    let (token, _, _) = generate(&caller, &signing_key, snapshot, &opts, 0).expect("demo token generation never fails");
    token
}

#[tokio::main]
async fn main() {
    let router = build_router();
    let token = mint_demo_caller_token();
    println!("demo caller token (present as X-AIGOS-Token): {token}");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    println!("listening on {}", listener.local_addr().unwrap());
    axum::serve(listener, router).await.expect("server exited");
}
