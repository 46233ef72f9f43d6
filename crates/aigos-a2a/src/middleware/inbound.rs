// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! Inbound middleware: extract `X-AIGOS-Token`, verify, apply the inbound
//! trust policy, attach the verified claims to the request extensions, and
//! mint a reply token so the caller can reciprocally verify this server.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use aigos_core::killswitch::{KillSwitchHooks, KillSwitchRegistry, NoopHooks};
use aigos_core::types::RuntimeIdentity;

use crate::claims::TokenClaims;
use crate::error::A2AError;
use crate::generate::{generate, GenerateOptions, KillSwitchSnapshot};
use crate::keys::{SigningKey, TrustedKeyCache};
use crate::middleware::{AIGOS_PROTOCOL_VERSION, AIGOS_PROTOCOL_VERSION_HEADER, AIGOS_TOKEN_HEADER};
use crate::trust::InboundPolicy;
use crate::verify::{verify, VerifyOptions};

/// Shared state an Axum router installs this middleware with.
pub struct InboundContext<H: KillSwitchHooks = NoopHooks> {
    pub trusted_keys: TrustedKeyCache,
    pub policy: InboundPolicy,
    pub required_issuer: String,
    pub required_audiences: Vec<String>,
    pub signing_key: SigningKey,
    pub issuer: String,
    /// Request paths that bypass the check entirely (health checks, etc).
    pub exclude_paths: Vec<String>,
    /// Identity this server presents when minting its own reply token.
    pub server_identity: RuntimeIdentity,
    /// The server's own kill-switch registry, read right before minting the
    /// reply token so a pause/terminate landing on the server itself shows
    /// up in the very next response instead of a stale `Active` snapshot.
    pub kill_switch: Arc<KillSwitchRegistry<H>>,
}

/// The verified peer claims, attached to the request so downstream
/// handlers can read `req.extensions().get::<VerifiedPeer>()`.
#[derive(Clone)]
pub struct VerifiedPeer(pub TokenClaims);

/// `axum::middleware::from_fn_with_state`-compatible handler.
pub async fn governance_middleware<H: KillSwitchHooks + 'static>(
    State(ctx): State<Arc<InboundContext<H>>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if ctx.exclude_paths.iter().any(|p| p == request.uri().path()) {
        return next.run(request).await;
    }

    let now = now_secs();

    let Some(token) = request.headers().get(AIGOS_TOKEN_HEADER).and_then(|v| v.to_str().ok()) else {
        return error_response(A2AError::InvalidFormat("missing X-AIGOS-Token header".into()));
    };
    let token = token.to_string();

    let verify_opts = VerifyOptions::new(ctx.required_issuer.clone(), ctx.required_audiences.clone());
    let verified = match verify(&token, &ctx.trusted_keys, &verify_opts, now) {
        Ok(v) => v,
        Err(e) => return error_response(e),
    };

    if let Err(e) = ctx.policy.check(&verified.claims) {
        return error_response(e);
    }

    request.extensions_mut().insert(VerifiedPeer(verified.claims));

    let mut response = next.run(request).await;

    // Read right before signing, per the issuer contract: a pause/terminate
    // landing on this server itself must show up in the very next reply
    // token, not a stale snapshot taken at startup.
    let run_state = ctx.kill_switch.effective_state(&ctx.server_identity.instance_id, &ctx.server_identity.asset_id);
    let snapshot = KillSwitchSnapshot { run_state, kill_switch_enabled: true };
    let gen_opts = GenerateOptions::new(ctx.issuer.clone(), vec![ctx.required_issuer.clone()]);
    if let Ok((reply_token, ..)) = generate(&ctx.server_identity, &ctx.signing_key, snapshot, &gen_opts, now) {
        if let Ok(value) = axum::http::HeaderValue::from_str(&reply_token) {
            response.headers_mut().insert(AIGOS_TOKEN_HEADER, value);
            response
                .headers_mut()
                .insert(AIGOS_PROTOCOL_VERSION_HEADER, axum::http::HeaderValue::from_static(AIGOS_PROTOCOL_VERSION));
        }
    }

    response
}

fn error_response(error: A2AError) -> Response {
    let status = StatusCode::from_u16(error.http_status()).unwrap_or(StatusCode::UNAUTHORIZED);
    tracing::warn!(code = error.code(), status = %status, "rejected inbound governance token");
    (status, error.to_string()).into_response()
}

fn now_secs() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_secs()
}
