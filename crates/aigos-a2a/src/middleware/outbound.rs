// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! Outbound middleware: mint a token for the target host, attach the
//! protocol headers, send, and verify the reply token against the same
//! outbound policy.

use aigos_core::types::RuntimeIdentity;
use reqwest::{RequestBuilder, Response};

use crate::error::A2AError;
use crate::generate::{generate, GenerateOptions, KillSwitchSnapshot};
use crate::keys::{SigningKey, TrustedKeyCache};
use crate::middleware::{AIGOS_PROTOCOL_VERSION, AIGOS_PROTOCOL_VERSION_HEADER, AIGOS_REQUEST_ID_HEADER, AIGOS_TOKEN_HEADER};
use crate::trust::OutboundPolicy;
use crate::verify::{verify, VerifyOptions};

/// Wraps an HTTP client with the A2A outbound contract: mint, inject,
/// send, verify-the-reply.
pub struct OutboundMiddleware<'a> {
    pub signing_key: &'a SigningKey,
    pub trusted_keys: &'a TrustedKeyCache,
    pub policy: &'a OutboundPolicy,
    pub issuer: String,
}

impl<'a> OutboundMiddleware<'a> {
    /// Send `request` to `host` on behalf of `identity`, minting and
    /// attaching a governance token, then verifying any reply token the
    /// server echoes back. `now` is Unix epoch seconds, supplied by the
    /// caller so this crate never reaches for a wall clock itself.
    pub async fn send(
        &self,
        request: RequestBuilder,
        host: &str,
        scheme: &str,
        identity: &RuntimeIdentity,
        kill_switch: KillSwitchSnapshot,
        now: u64,
    ) -> Result<Response, A2AError> {
        self.policy.check_preflight(host, scheme)?;

        let gen_opts = GenerateOptions::new(self.issuer.clone(), vec![host.to_string()]);
        let (token, claims, _exp) = generate(identity, self.signing_key, kill_switch, &gen_opts, now)?;

        let response = request
            .header(AIGOS_TOKEN_HEADER, token)
            .header(AIGOS_PROTOCOL_VERSION_HEADER, AIGOS_PROTOCOL_VERSION)
            .header(AIGOS_REQUEST_ID_HEADER, claims.jti)
            .send()
            .await
            .map_err(|e| A2AError::PolicyViolation(format!("transport error: {e}")))?;

        if let Some(reply_token) = response.headers().get(AIGOS_TOKEN_HEADER) {
            let reply_token = reply_token.to_str().map_err(|_| A2AError::InvalidFormat("non-UTF8 reply token".into()))?;
            let verify_opts = VerifyOptions::new(host.to_string(), vec![self.issuer.clone()]);
            let verified = verify(reply_token, self.trusted_keys, &verify_opts, now)?;
            self.policy.check_postflight(host, &verified.claims)?;
        }

        Ok(response)
    }
}
