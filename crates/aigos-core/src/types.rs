// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! Shared data types for the Agent Runtime Governance Kernel.
//!
//! All types implement [`Clone`], [`Debug`], [`serde::Serialize`], and
//! [`serde::Deserialize`] so they can be serialised to JSON, carried across
//! the token protocol, and exposed through the WASM boundary without
//! additional conversion steps.

use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Asset card
// ---------------------------------------------------------------------------

/// Declared risk tier of an asset, per the EU AI Act risk taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Minimal,
    Limited,
    High,
    Unacceptable,
}

/// How a child's capabilities manifest is derived from its parent's on spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityMode {
    /// Numeric caps decay by a fixed factor per generation (default).
    Decay,
    /// Child receives an exact copy of the parent manifest.
    Inherit,
    /// Child starts from zero; caller-supplied values are clipped to the parent's.
    Explicit,
}

/// Runtime operating mode carried in tokens and enforced by the policy engine.
///
/// Only `Normal`, `Sandbox`, and `Restricted` are understood by the engine;
/// the remaining variants are opaque labels that pass through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuntimeMode {
    Normal,
    Sandbox,
    Restricted,
    Degraded,
    Emergency,
    Maintenance,
    ReadOnly,
}

/// The `(ticket_id, approved_by, approved_at)` tuple binding an asset card to
/// a business authorization. Its SHA-256 hash travels inside every token and
/// decision event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenThread {
    pub ticket_id: String,
    pub approved_by: String,
    pub approved_at: u64,
}

/// Immutable, loader-supplied declaration of an AI asset's identity, version,
/// risk level, and declared capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetCard {
    pub asset_id: String,
    pub version: String,
    pub risk_level: RiskLevel,
    pub capabilities_manifest: CapabilitiesManifest,
    pub golden_thread: GoldenThread,
    /// Declared `SHA-256("ticket_id|approved_by|approved_at")`, if the card
    /// asserts one. When present, identity creation verifies it.
    pub golden_thread_hash: Option<String>,
}

// ---------------------------------------------------------------------------
// Capabilities manifest
// ---------------------------------------------------------------------------

/// Effective set of allowed/denied actions, domains, numeric budgets, and
/// spawn rules for an instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitiesManifest {
    /// Ordered glob-or-regex patterns over action names. `*` means any.
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    /// Deny patterns; deny always takes precedence over allow.
    #[serde(default)]
    pub denied_tools: Vec<String>,
    /// Patterns matched against the resource's host (or whole string if not
    /// URL-parseable).
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    #[serde(default)]
    pub denied_domains: Vec<String>,

    #[serde(default)]
    pub may_spawn_children: bool,
    #[serde(default)]
    pub max_child_depth: u32,
    #[serde(default = "default_capability_mode")]
    pub capability_mode: CapabilityMode,

    pub max_cost_per_session: Option<f64>,
    pub max_cost_per_day: Option<f64>,
    pub max_cost_per_month: Option<f64>,
    pub max_tokens_per_call: Option<u64>,
    pub max_calls_per_minute: Option<u64>,

    /// Opaque to the core; carried through untouched.
    #[serde(default)]
    pub custom: HashMap<String, serde_json::Value>,
}

fn default_capability_mode() -> CapabilityMode {
    CapabilityMode::Decay
}

impl Default for CapabilitiesManifest {
    fn default() -> Self {
        Self {
            allowed_tools: Vec::new(),
            denied_tools: Vec::new(),
            allowed_domains: Vec::new(),
            denied_domains: Vec::new(),
            may_spawn_children: false,
            max_child_depth: 0,
            capability_mode: CapabilityMode::Decay,
            max_cost_per_session: None,
            max_cost_per_day: None,
            max_cost_per_month: None,
            max_tokens_per_call: None,
            max_calls_per_minute: None,
            custom: HashMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Lineage
// ---------------------------------------------------------------------------

/// Ancestry record for a spawned runtime identity.
///
/// Invariants: `ancestor_chain.len() == generation_depth`;
/// `generation_depth == 0 ⇔ parent_instance_id.is_none() ⇔ root_instance_id == instance_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lineage {
    pub parent_instance_id: Option<String>,
    pub generation_depth: u32,
    /// Root-first ancestor instance IDs.
    pub ancestor_chain: Vec<String>,
    pub root_instance_id: String,
    pub spawned_at: u64,
}

impl Lineage {
    /// Lineage for a freshly created root identity (no parent).
    pub fn root(instance_id: &str, spawned_at: u64) -> Self {
        Self {
            parent_instance_id: None,
            generation_depth: 0,
            ancestor_chain: Vec::new(),
            root_instance_id: instance_id.into(),
            spawned_at,
        }
    }

    /// Lineage for a child spawned from `parent`.
    pub fn child_of(parent_identity: &RuntimeIdentity, spawned_at: u64) -> Self {
        let mut ancestor_chain = parent_identity.lineage.ancestor_chain.clone();
        ancestor_chain.push(parent_identity.instance_id.clone());
        Self {
            parent_instance_id: Some(parent_identity.instance_id.clone()),
            generation_depth: parent_identity.lineage.generation_depth + 1,
            ancestor_chain,
            root_instance_id: parent_identity.lineage.root_instance_id.clone(),
            spawned_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Runtime identity
// ---------------------------------------------------------------------------

/// A live runtime of an asset card, uniquely identified by `instance_id`.
///
/// Created by the Identity Manager. Mutated only by the kill-switch FSM
/// (`mode`, `terminated`) and the budget tracker (usage counters, held
/// externally in [`crate::budget::BudgetTracker`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeIdentity {
    pub instance_id: String,
    pub asset_id: String,
    pub risk_level: RiskLevel,
    pub capabilities_manifest: CapabilitiesManifest,
    pub mode: RuntimeMode,
    pub lineage: Lineage,
    pub created_at: u64,
    pub verified: bool,
    pub golden_thread_hash: String,
}

// ---------------------------------------------------------------------------
// Budget state
// ---------------------------------------------------------------------------

/// Rolling spend/rate counters for a single instance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BudgetState {
    pub session_cost: f64,
    pub daily_cost: f64,
    pub monthly_cost: f64,
    pub calls_this_minute: u64,
    pub session_start: u64,
    pub day_start: u64,
    pub month_start: u64,
    pub minute_start: u64,
}

impl BudgetState {
    pub fn new(now_ms: u64) -> Self {
        Self {
            session_cost: 0.0,
            daily_cost: 0.0,
            monthly_cost: 0.0,
            calls_this_minute: 0,
            session_start: now_ms,
            day_start: now_ms,
            month_start: now_ms,
            minute_start: now_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// Resource / context passed to the policy engine
// ---------------------------------------------------------------------------

/// Optional cost/token/purpose context accompanying a `check_permission` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionContext {
    pub cost: Option<f64>,
    pub tokens: Option<u64>,
    pub purpose: Option<String>,
}
