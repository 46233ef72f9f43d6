// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! Stable error taxonomy for the kernel's non-decision failure paths.
//!
//! Decision outcomes ([`crate::policy::DecisionCode`]) are values returned
//! from `check_permission`, never exceptions — see `policy.rs`. The error
//! types here cover configuration, lineage, and kill-switch replay failures,
//! which are genuinely exceptional and therefore modelled as `Result`s.
//!
//! Only compiled under the `std` feature: `thiserror` is gated the same way
//! in `Cargo.toml`, matching the upstream crate's own `std`-gating of its
//! ambient dependencies.

#![cfg(feature = "std")]

use thiserror::Error;

/// Failures from [`crate::identity::IdentityManager`].
#[derive(Debug, Error)]
pub enum LineageError {
    #[error("spawn denied: child depth {child_depth} exceeds parent max_child_depth {max_child_depth}")]
    SpawnDeniedDepth { child_depth: u32, max_child_depth: u32 },

    #[error("spawn denied: parent manifest forbids spawning children (may_spawn_children=false)")]
    SpawnDeniedPolicy,

    #[error("spawn denied: parent runtime mode {0:?} cannot spawn children")]
    SpawnDeniedMode(crate::types::RuntimeMode),

    #[error("spawn denied: parent kill-switch state is TERMINATED")]
    SpawnDeniedTerminated,

    #[error("golden thread mismatch: declared hash does not match SHA-256(ticket_id|approved_by|approved_at)")]
    GoldenThreadMismatch,
}

impl LineageError {
    /// Stable error code, fixed by the kernel's Lineage error taxonomy.
    ///
    /// `SpawnDeniedMode` and `SpawnDeniedTerminated` are distinct variants
    /// (so callers can tell a `RESTRICTED` parent from a `TERMINATED` one),
    /// but both report the same `SPAWN_DENIED_MODE` code — the taxonomy
    /// fixes exactly four Lineage codes, and a terminated parent is a mode
    /// restriction from the caller's point of view, per the spec's own
    /// framing ("SPAWN_DENIED_MODE when parent is RESTRICTED or TERMINATED").
    pub fn code(&self) -> &'static str {
        match self {
            LineageError::SpawnDeniedPolicy => "SPAWN_DENIED_POLICY",
            LineageError::SpawnDeniedDepth { .. } => "SPAWN_DENIED_DEPTH",
            LineageError::SpawnDeniedMode(_) | LineageError::SpawnDeniedTerminated => "SPAWN_DENIED_MODE",
            LineageError::GoldenThreadMismatch => "IDENTITY_GOLDEN_THREAD_MISMATCH",
        }
    }
}

/// Failures from [`crate::killswitch::replay::ReplayGuard`].
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("command_id {0:?} already recorded")]
    Duplicate(alloc::string::String),

    #[error("command timestamp {timestamp} is older than the {max_age_s}s freshness window")]
    Expired { timestamp: u64, max_age_s: u64 },

    #[error("command timestamp {timestamp} is in the future relative to now={now}")]
    Future { timestamp: u64, now: u64 },
}

/// Failures loading kernel configuration from file or environment.
#[cfg(feature = "config-loader")]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file \"{path}\": {source}")]
    FileRead { path: alloc::string::String, source: std::io::Error },

    #[error("failed to parse TOML config: {source}")]
    TomlParse { #[from] source: toml::de::Error },

    #[error("field \"{field}\": cannot parse \"{value}\" — {reason}")]
    ParseField { field: alloc::string::String, value: alloc::string::String, reason: alloc::string::String },

    #[error("field \"{field}\": value \"{value}\" out of range — {reason}")]
    InvalidRange { field: alloc::string::String, value: alloc::string::String, reason: alloc::string::String },
}
