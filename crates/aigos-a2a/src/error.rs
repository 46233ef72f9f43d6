// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! Stable error taxonomy for token generation, verification, and middleware.
//!
//! Every variant's `Display` is the exact stable code a peer across the wire
//! is expected to match on (`INVALID_SIGNATURE`, `EXPIRED`, ...), matching
//! how the core crate's own decision codes are strings, not exception types.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum A2AError {
    #[error("INVALID_FORMAT: {0}")]
    InvalidFormat(String),

    #[error("INVALID_SIGNATURE")]
    InvalidSignature,

    #[error("EXPIRED: token expired at {exp}, now={now}")]
    Expired { exp: u64, now: u64 },

    #[error("NOT_YET_VALID: token not valid before {nbf}, now={now}")]
    NotYetValid { nbf: u64, now: u64 },

    #[error("INVALID_ISSUER: expected {expected}, got {actual}")]
    InvalidIssuer { expected: String, actual: String },

    #[error("INVALID_AUDIENCE: none of {required:?} present in {actual:?}")]
    InvalidAudience { required: Vec<String>, actual: Vec<String> },

    #[error("INVALID_CLAIMS: {0}")]
    InvalidClaims(String),

    #[error("KEY_NOT_FOUND: kid={0:?}")]
    KeyNotFound(Option<String>),

    #[error("PAUSED_AGENT")]
    PausedAgent,

    #[error("TERMINATION_PENDING")]
    TerminationPending,

    #[error("POLICY_VIOLATION: {0}")]
    PolicyViolation(String),
}

impl A2AError {
    /// The stable machine-readable code, without the human-readable suffix —
    /// what a peer implementation matches on, and what middleware echoes in
    /// the response body.
    pub fn code(&self) -> &'static str {
        match self {
            A2AError::InvalidFormat(_) => "INVALID_FORMAT",
            A2AError::InvalidSignature => "INVALID_SIGNATURE",
            A2AError::Expired { .. } => "EXPIRED",
            A2AError::NotYetValid { .. } => "NOT_YET_VALID",
            A2AError::InvalidIssuer { .. } => "INVALID_ISSUER",
            A2AError::InvalidAudience { .. } => "INVALID_AUDIENCE",
            A2AError::InvalidClaims(_) => "INVALID_CLAIMS",
            A2AError::KeyNotFound(_) => "KEY_NOT_FOUND",
            A2AError::PausedAgent => "PAUSED_AGENT",
            A2AError::TerminationPending => "TERMINATION_PENDING",
            A2AError::PolicyViolation(_) => "POLICY_VIOLATION",
        }
    }

    /// HTTP status a middleware layer should answer with: 401 for
    /// format/signature/temporal/identity failures, 403 for policy vetoes.
    pub fn http_status(&self) -> u16 {
        match self {
            A2AError::PolicyViolation(_) => 403,
            _ => 401,
        }
    }
}

#[cfg(feature = "config-loader")]
#[derive(Debug, Error)]
pub enum A2AConfigError {
    #[error("failed to read config file \"{path}\": {source}")]
    FileRead { path: String, source: std::io::Error },

    #[error("failed to parse TOML config: {source}")]
    TomlParse { #[from] source: toml::de::Error },

    #[error("field \"{field}\": cannot parse \"{value}\" — {reason}")]
    ParseField { field: String, value: String, reason: String },
}
