// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! # aigos-core
//!
//! Agent Runtime Governance Kernel — the hard, load-bearing core of the
//! AIGOS control plane.
//!
//! Four tightly coupled subsystems live here:
//!
//! - [`policy`] / [`async_policy`] — the Policy Engine ("the Bouncer"):
//!   `check_permission`'s 7-step (sync) / 8-step (async) short-circuit chain.
//! - [`killswitch`] — the FSM (`ACTIVE`/`PAUSED`/`TERMINATED`) and replay
//!   guard. Concrete transports (SSE, polling, file-watch) live in the
//!   `aigos-std` crate because they require sockets/filesystem access; this
//!   crate defines only the `Transport` contract and the state machinery
//!   common to all of them.
//! - [`identity`] — the Identity & Lineage Manager: golden-thread
//!   verification, capability derivation on spawn, depth enforcement.
//! - [`budget`] — the per-instance `BudgetTracker` shared by the policy
//!   engine's step 7.
//!
//! [`event`] carries the `GovernanceEvent` stream these subsystems emit, and
//! [`pattern`] holds the glob/regex matcher and its LRU-bounded compiled
//! cache shared by the policy engine's capability and resource gates.
//!
//! This crate is `no_std`-compatible (requires `alloc`). Enable the `std`
//! feature (on by default) for the compiled regex pattern cache, the
//! kill-switch FSM/replay guard, identity creation (needs `sha2`/`uuid`),
//! event plumbing, and the policy engine itself — none of which can run
//! without an allocator and a handful of std-only crates. The `async`
//! feature layers [`async_policy::AsyncPolicyEngine`] on top via Tokio; the
//! `config-loader` feature adds [`config`]'s TOML/env loading.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use aigos_core::{
//!     identity::IdentityManager,
//!     killswitch::{KillSwitchRegistry, NoopHooks},
//!     policy::{PolicyConfig, PolicyEngine},
//!     types::{AssetCard, CapabilitiesManifest, GoldenThread, RiskLevel},
//! };
//!
//! let thread = GoldenThread { ticket_id: "T-1".into(), approved_by: "alice".into(), approved_at: 0 };
//! let card = AssetCard {
//!     asset_id: "asset-1".into(),
//!     version: "1.0".into(),
//!     risk_level: RiskLevel::Limited,
//!     capabilities_manifest: CapabilitiesManifest { allowed_tools: vec!["report".into()], ..Default::default() },
//!     golden_thread: thread,
//!     golden_thread_hash: None,
//! };
//!
//! let identity = IdentityManager::create_identity(&card, None, 0).unwrap();
//! let kill_switch = Arc::new(KillSwitchRegistry::new(true, NoopHooks));
//! let engine = PolicyEngine::new(PolicyConfig::default(), kill_switch);
//!
//! let decision = engine.check_permission(&identity, "report", None, None);
//! assert!(decision.allowed);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod pattern;
pub mod types;

#[cfg(feature = "std")]
pub mod error;

#[cfg(feature = "std")]
pub mod event;

#[cfg(feature = "std")]
pub mod budget;

#[cfg(feature = "std")]
pub mod identity;

pub mod killswitch;

#[cfg(feature = "std")]
pub mod policy;

// Async engine — only compiled when the "async" feature is enabled.
// Requires the "std" feature (Tokio cannot run in no_std environments).
#[cfg(feature = "async")]
pub mod async_policy;

// Config loader — TOML file and environment variable loading.
// Only compiled when the "config-loader" feature is enabled.
#[cfg(feature = "config-loader")]
pub mod config;

// Re-export the most commonly used items at the crate root so consumers can
// write `use aigos_core::PolicyEngine;` instead of the fully qualified path.
#[cfg(feature = "std")]
pub use event::{EventSink, GovernanceEvent, NullSink, RingBufferSink};
#[cfg(feature = "std")]
pub use identity::IdentityManager;
#[cfg(feature = "std")]
pub use policy::{PolicyConfig, PolicyDecision, PolicyEngine};

pub use killswitch::{KillSwitchCommand, KillSwitchCommandType, RunState};
pub use types::{
    ActionContext, AssetCard, BudgetState, CapabilitiesManifest, CapabilityMode, GoldenThread,
    Lineage, RiskLevel, RuntimeIdentity, RuntimeMode,
};

// Re-export the async engine at the crate root for ergonomic imports.
#[cfg(feature = "async")]
pub use async_policy::AsyncPolicyEngine;

// Re-export config loader types at the crate root.
#[cfg(feature = "config-loader")]
pub use config::{load_kernel_config, load_kernel_config_from_env, KernelFileConfig};
#[cfg(feature = "config-loader")]
pub use error::ConfigError;
