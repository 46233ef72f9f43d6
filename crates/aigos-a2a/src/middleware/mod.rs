// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! HTTP middleware wiring the token protocol into outbound clients and
//! inbound servers. Each side is gated behind its own feature so a pure
//! token-protocol consumer (no HTTP stack opinion) doesn't pull in
//! `reqwest` or `axum` at all.

pub const AIGOS_TOKEN_HEADER: &str = "X-AIGOS-Token";
pub const AIGOS_PROTOCOL_VERSION_HEADER: &str = "X-AIGOS-Protocol-Version";
pub const AIGOS_REQUEST_ID_HEADER: &str = "X-AIGOS-Request-Id";
pub const AIGOS_PROTOCOL_VERSION: &str = "1";

#[cfg(feature = "reqwest-middleware")]
pub mod outbound;

#[cfg(feature = "axum-middleware")]
pub mod inbound;
