// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! # aigos-wasm
//!
//! WebAssembly bindings for the Agent Runtime Governance Kernel.
//!
//! This crate exposes `aigos-core`'s synchronous surface — the Policy
//! Engine, Identity & Lineage Manager, and kill-switch FSM — to JavaScript
//! and TypeScript consumers running in browser or edge-worker environments
//! via `wasm-bindgen`. The Governance Token Protocol (`aigos-a2a`) is not
//! bound here: its trusted-key cache rate-limits JWKS refresh against
//! `std::time::Instant`, which is not available on `wasm32-unknown-unknown`
//! without an additional polyfill the rest of the pack does not pull in.
//!
//! ## Architecture
//!
//! Each [`Runtime`] bundles a [`PolicyEngine`] with the [`KillSwitchRegistry`]
//! it was built against, and each [`RuntimeIdentity`] created or spawned
//! through it is stored separately. Both live in thread-local registries
//! keyed by integer handles: WASM is single-threaded, and `wasm-bindgen`
//! cannot export opaque Rust structs across the JS boundary without
//! serialisation overhead.
//!
//! ## Exported functions
//!
//! | Function                  | Description                                            |
//! |----------------------------|--------------------------------------------------------|
//! | `create_runtime`           | Create a policy engine + kill-switch registry           |
//! | `destroy_runtime`          | Release a runtime handle                                |
//! | `create_identity`          | Create a root identity from an asset card (JSON in)     |
//! | `spawn_child_identity`     | Spawn a child identity from a parent handle             |
//! | `destroy_identity`         | Release an identity handle                              |
//! | `check_permission`         | Run the 7-step decision chain (JSON out)                |
//! | `apply_kill_switch_command`| Feed a signed kill-switch command into the FSM          |
//! | `effective_run_state`      | Query ACTIVE/PAUSED/TERMINATED for an instance/asset     |
//!
//! ## JavaScript usage
//!
//! ```js
//! import init, {
//!   create_runtime,
//!   create_identity,
//!   check_permission,
//!   apply_kill_switch_command,
//! } from '@aigos/wasm';
//!
//! await init();
//!
//! const runtime = create_runtime('{}');
//! const identity = create_identity(JSON.stringify({
//!   asset_id: 'asset-1',
//!   version: '1.0',
//!   risk_level: 'limited',
//!   capabilities_manifest: { allowed_tools: ['report'] },
//!   golden_thread: { ticket_id: 'T-1', approved_by: 'alice', approved_at: 0 },
//!   golden_thread_hash: null,
//! }));
//!
//! const decision = JSON.parse(check_permission(runtime, identity, 'report', null, null));
//! console.log(decision.allowed); // true
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use aigos_core::killswitch::{KillSwitchCommand, KillSwitchRegistry, NoopHooks};
use aigos_core::policy::{PolicyConfig, PolicyEngine};
use aigos_core::types::{ActionContext, AssetCard, CapabilitiesManifest, RuntimeIdentity};
use aigos_core::IdentityManager;
use wasm_bindgen::prelude::*;

/// Sentinel returned instead of a handle on allocation/parse failure.
const INVALID_HANDLE: u32 = u32::MAX;

struct Runtime {
    engine: PolicyEngine<NoopHooks>,
    kill_switch: Arc<KillSwitchRegistry<NoopHooks>>,
}

// WASM is single-threaded; RefCell<HashMap<...>> is safe here.
thread_local! {
    static RUNTIMES: RefCell<HashMap<u32, Runtime>> = RefCell::new(HashMap::new());
    static IDENTITIES: RefCell<HashMap<u32, RuntimeIdentity>> = RefCell::new(HashMap::new());
    static NEXT_HANDLE: RefCell<u32> = RefCell::new(0);
}

/// Allocate a new handle. Wraps around before `u32::MAX` to keep it free as
/// the error sentinel.
fn next_handle() -> u32 {
    NEXT_HANDLE.with(|counter| {
        let handle = *counter.borrow();
        let next = if handle >= INVALID_HANDLE - 1 { 0 } else { handle + 1 };
        *counter.borrow_mut() = next;
        handle
    })
}

fn now_ms() -> u64 {
    js_sys_now_ms()
}

// `std::time::SystemTime::now()` panics on `wasm32-unknown-unknown` without
// the `wasm-bindgen` time-shim feature on its dependents; `Date.now()` via
// `js_sys` is the idiomatic substitute in every wasm-bindgen crate in the
// pack. Declared here rather than pulling in `js-sys` as a full dependency
// for a single call, matching `wasm-bindgen`'s own extern-binding style.
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = Date, js_name = now)]
    fn js_sys_now_ms() -> f64;
}

fn with_runtime<F, R>(handle: u32, callback: F) -> Result<R, String>
where
    F: FnOnce(&Runtime) -> R,
{
    RUNTIMES.with(|runtimes| {
        let map = runtimes.borrow();
        match map.get(&handle) {
            Some(runtime) => Ok(callback(runtime)),
            None => Err(format!("unknown runtime handle {handle}")),
        }
    })
}

fn with_identity<F, R>(handle: u32, callback: F) -> Result<R, String>
where
    F: FnOnce(&RuntimeIdentity) -> R,
{
    IDENTITIES.with(|identities| {
        let map = identities.borrow();
        match map.get(&handle) {
            Some(identity) => Ok(callback(identity)),
            None => Err(format!("unknown identity handle {handle}")),
        }
    })
}

// ---------------------------------------------------------------------------
// Runtime lifecycle
// ---------------------------------------------------------------------------

/// Parsed shape of `config_json` accepted by [`create_runtime`]. All fields
/// are optional; omitted fields take [`PolicyConfig::default`]'s values.
#[derive(serde::Deserialize, Default)]
struct RuntimeConfigInput {
    dry_run: Option<bool>,
    fail_open: Option<bool>,
    default_allow: Option<bool>,
    max_cache_size: Option<usize>,
    /// Whether a `RESUME` command is honored once an instance is `PAUSED`.
    allow_resume: Option<bool>,
}

/// Create a new runtime (policy engine + kill-switch registry) from a JSON
/// config object. Pass `"{}"` for defaults. Returns `u32::MAX` on parse
/// error.
#[wasm_bindgen]
pub fn create_runtime(config_json: &str) -> u32 {
    let input: RuntimeConfigInput = match serde_json::from_str(config_json) {
        Ok(input) => input,
        Err(_) => return INVALID_HANDLE,
    };
    let config = PolicyConfig {
        dry_run: input.dry_run.unwrap_or(false),
        fail_open: input.fail_open.unwrap_or(false),
        default_allow: input.default_allow.unwrap_or(false),
        max_cache_size: input.max_cache_size.unwrap_or(1000),
    };
    let kill_switch = Arc::new(KillSwitchRegistry::new(input.allow_resume.unwrap_or(true), NoopHooks));
    let engine = PolicyEngine::new(config, kill_switch.clone());

    let handle = next_handle();
    RUNTIMES.with(|runtimes| {
        runtimes.borrow_mut().insert(handle, Runtime { engine, kill_switch });
    });
    handle
}

/// Release the runtime associated with `handle`.
#[wasm_bindgen]
pub fn destroy_runtime(handle: u32) {
    RUNTIMES.with(|runtimes| {
        runtimes.borrow_mut().remove(&handle);
    });
}

// ---------------------------------------------------------------------------
// Identity & lineage
// ---------------------------------------------------------------------------

/// Create a root identity from an asset card. `asset_card_json` must match
/// [`AssetCard`]'s JSON shape. Returns `u32::MAX` on parse error or a
/// golden-thread hash mismatch.
#[wasm_bindgen]
pub fn create_identity(asset_card_json: &str) -> u32 {
    let card: AssetCard = match serde_json::from_str(asset_card_json) {
        Ok(card) => card,
        Err(_) => return INVALID_HANDLE,
    };
    match IdentityManager::create_identity(&card, None, now_ms() as u64) {
        Ok(identity) => {
            let handle = next_handle();
            IDENTITIES.with(|identities| {
                identities.borrow_mut().insert(handle, identity);
            });
            handle
        }
        Err(_) => INVALID_HANDLE,
    }
}

/// Spawn a child identity from `parent_handle`, gated on `runtime_handle`'s
/// kill-switch state so a `TERMINATED` parent is denied the same as a
/// `RESTRICTED` one. `requested_manifest_json` (only consulted under
/// `capability_mode: explicit`) may be `null`. Returns `u32::MAX` if either
/// handle is unknown, the parent's mode/kill-switch state/manifest forbids
/// spawning, or the manifest JSON fails to parse.
#[wasm_bindgen]
pub fn spawn_child_identity(runtime_handle: u32, parent_handle: u32, requested_manifest_json: Option<String>) -> u32 {
    let requested: Option<CapabilitiesManifest> = match requested_manifest_json {
        Some(json) => match serde_json::from_str(&json) {
            Ok(manifest) => Some(manifest),
            Err(_) => return INVALID_HANDLE,
        },
        None => None,
    };

    let parent = match with_identity(parent_handle, |identity| identity.clone()) {
        Ok(identity) => identity,
        Err(_) => return INVALID_HANDLE,
    };
    let kill_switch_state =
        match with_runtime(runtime_handle, |runtime| runtime.kill_switch.effective_state(&parent.instance_id, &parent.asset_id)) {
            Ok(state) => state,
            Err(_) => return INVALID_HANDLE,
        };

    match IdentityManager::spawn_child(&parent, requested, kill_switch_state, now_ms() as u64) {
        Ok(child) => {
            let handle = next_handle();
            IDENTITIES.with(|identities| {
                identities.borrow_mut().insert(handle, child);
            });
            handle
        }
        Err(_) => INVALID_HANDLE,
    }
}

/// Release the identity associated with `handle`.
#[wasm_bindgen]
pub fn destroy_identity(handle: u32) {
    IDENTITIES.with(|identities| {
        identities.borrow_mut().remove(&handle);
    });
}

/// Return the identity's serialized [`RuntimeIdentity`] JSON, or `"null"`
/// if the handle is unknown.
#[wasm_bindgen]
pub fn get_identity(handle: u32) -> String {
    with_identity(handle, |identity| serde_json::to_string(identity).unwrap_or_else(|_| "null".into()))
        .unwrap_or_else(|_| "null".into())
}

// ---------------------------------------------------------------------------
// Policy evaluation
// ---------------------------------------------------------------------------

/// Parsed shape of the optional `context_json` argument to
/// [`check_permission`].
#[derive(serde::Deserialize, Default)]
struct ActionContextInput {
    cost: Option<f64>,
    tokens: Option<u64>,
    purpose: Option<String>,
}

impl From<ActionContextInput> for ActionContext {
    fn from(input: ActionContextInput) -> Self {
        ActionContext { cost: input.cost, tokens: input.tokens, purpose: input.purpose }
    }
}

/// Run the 7-step decision chain and return a JSON-serialized
/// [`aigos_core::policy::PolicyDecision`]-shaped object. `context_json`, if
/// present, must match [`ActionContext`]'s shape; pass `null` to omit it.
///
/// Returns `{"error":"..."}` if `runtime_handle` or `identity_handle` is
/// unknown, or `context_json` fails to parse.
#[wasm_bindgen]
pub fn check_permission(
    runtime_handle: u32,
    identity_handle: u32,
    action: &str,
    resource: Option<String>,
    context_json: Option<String>,
) -> String {
    let context: Option<ActionContext> = match context_json {
        Some(json) => match serde_json::from_str::<ActionContextInput>(&json) {
            Ok(input) => Some(input.into()),
            Err(error) => return format!("{{\"error\":\"context parse error: {error}\"}}"),
        },
        None => None,
    };

    let identity = match with_identity(identity_handle, |identity| identity.clone()) {
        Ok(identity) => identity,
        Err(error) => return format!("{{\"error\":\"{error}\"}}"),
    };

    let decision = with_runtime(runtime_handle, |runtime| {
        runtime.engine.check_permission(&identity, action, resource.as_deref(), context.as_ref())
    });

    match decision {
        Ok(decision) => serde_json::to_string(&DecisionView::from(decision)).unwrap_or_else(|_| "{\"error\":\"serialisation error\"}".into()),
        Err(error) => format!("{{\"error\":\"{error}\"}}"),
    }
}

/// JSON-friendly mirror of [`aigos_core::policy::PolicyDecision`] — the
/// native type's `DecisionCode`/`DeniedBy` enums don't derive `Serialize`
/// since they're compared by `.as_str()` internally, so this view owns the
/// string conversion at the WASM boundary.
#[derive(serde::Serialize)]
struct DecisionView {
    allowed: bool,
    code: Option<&'static str>,
    reason: Option<String>,
    checked_at: u64,
    duration_ns: u64,
    dry_run: bool,
    would_deny: bool,
    sandbox: bool,
}

impl From<aigos_core::policy::PolicyDecision> for DecisionView {
    fn from(decision: aigos_core::policy::PolicyDecision) -> Self {
        Self {
            allowed: decision.allowed,
            code: decision.code.map(|code| code.as_str()),
            reason: decision.reason,
            checked_at: decision.checked_at,
            duration_ns: decision.duration_ns,
            dry_run: decision.dry_run,
            would_deny: decision.would_deny,
            sandbox: decision.sandbox,
        }
    }
}

// ---------------------------------------------------------------------------
// Kill-switch
// ---------------------------------------------------------------------------

/// Apply a signed kill-switch command, `command_json` matching
/// [`KillSwitchCommand`]'s shape. Returns `false` if the runtime handle is
/// unknown or the JSON fails to parse; the FSM's own replay/validity
/// guarantees are the caller's responsibility at this layer (this binding
/// applies the command unconditionally, the same contract
/// [`KillSwitchRegistry::apply`] exposes natively).
#[wasm_bindgen]
pub fn apply_kill_switch_command(runtime_handle: u32, command_json: &str) -> bool {
    let command: KillSwitchCommand = match serde_json::from_str(command_json) {
        Ok(command) => command,
        Err(_) => return false,
    };
    with_runtime(runtime_handle, |runtime| {
        runtime.kill_switch.apply(&command, now_ms() as u64);
    })
    .is_ok()
}

/// Return the effective `RunState` (`"ACTIVE"` / `"PAUSED"` / `"TERMINATED"`)
/// for the given instance/asset, or `"ACTIVE"` if the runtime handle is
/// unknown (matching the registry's own default-to-active semantics for
/// never-seen instances).
#[wasm_bindgen]
pub fn effective_run_state(runtime_handle: u32, instance_id: &str, asset_id: &str) -> String {
    with_runtime(runtime_handle, |runtime| {
        serde_json::to_value(runtime.kill_switch.effective_state(instance_id, asset_id))
            .ok()
            .and_then(|value| value.as_str().map(|s| s.to_string()))
            .unwrap_or_else(|| "ACTIVE".to_string())
    })
    .unwrap_or_else(|_| "ACTIVE".to_string())
}

// ---------------------------------------------------------------------------
// Native unit tests (run with `cargo test` outside of WASM)
// ---------------------------------------------------------------------------

#[cfg(test)]
#[cfg(not(target_arch = "wasm32"))]
mod native_tests {
    use super::*;

    const CARD_JSON: &str = r#"{
        "asset_id": "asset-1",
        "version": "1.0",
        "risk_level": "limited",
        "capabilities_manifest": { "allowed_tools": ["report"], "may_spawn_children": true, "max_child_depth": 2 },
        "golden_thread": { "ticket_id": "T-1", "approved_by": "alice", "approved_at": 0 },
        "golden_thread_hash": null
    }"#;

    #[test]
    fn runtime_and_identity_lifecycle() {
        let runtime = create_runtime("{}");
        assert_ne!(runtime, INVALID_HANDLE);

        let identity = create_identity(CARD_JSON);
        assert_ne!(identity, INVALID_HANDLE);

        destroy_identity(identity);
        destroy_runtime(runtime);
    }

    #[test]
    fn bad_config_json_is_invalid_handle() {
        assert_eq!(create_runtime("not json"), INVALID_HANDLE);
    }

    #[test]
    fn check_permission_allows_manifest_tool() {
        let runtime = create_runtime("{}");
        let identity = create_identity(CARD_JSON);

        let result = check_permission(runtime, identity, "report", None, None);
        let decision: serde_json::Value = serde_json::from_str(&result).unwrap();
        assert_eq!(decision["allowed"], true);

        destroy_identity(identity);
        destroy_runtime(runtime);
    }

    #[test]
    fn check_permission_denies_unlisted_tool() {
        let runtime = create_runtime("{}");
        let identity = create_identity(CARD_JSON);

        let result = check_permission(runtime, identity, "delete_everything", None, None);
        let decision: serde_json::Value = serde_json::from_str(&result).unwrap();
        assert_eq!(decision["allowed"], false);

        destroy_identity(identity);
        destroy_runtime(runtime);
    }

    #[test]
    fn spawn_child_inherits_depth_budget() {
        let runtime = create_runtime("{}");
        let identity = create_identity(CARD_JSON);
        let child = spawn_child_identity(runtime, identity, None);
        assert_ne!(child, INVALID_HANDLE);
        destroy_identity(child);
        destroy_identity(identity);
        destroy_runtime(runtime);
    }

    #[test]
    fn unknown_identity_handle_is_invalid() {
        let runtime = create_runtime("{}");
        assert_eq!(spawn_child_identity(runtime, 99999, None), INVALID_HANDLE);
        destroy_runtime(runtime);
    }

    #[test]
    fn spawn_denied_once_runtime_kill_switch_terminated() {
        let runtime = create_runtime("{}");
        let identity = create_identity(CARD_JSON);
        let identity_json: serde_json::Value = serde_json::from_str(&get_identity(identity)).unwrap();
        let instance_id = identity_json["instance_id"].as_str().unwrap();

        let command = format!(
            r#"{{"command_id":"cmd-1","type":"TERMINATE","timestamp":0,"reason":"test","target":{{"instance_id":"{instance_id}"}}}}"#
        );
        assert!(apply_kill_switch_command(runtime, &command));

        assert_eq!(spawn_child_identity(runtime, identity, None), INVALID_HANDLE);
        destroy_identity(identity);
        destroy_runtime(runtime);
    }

    #[test]
    fn kill_switch_terminate_denies_subsequent_check() {
        let runtime = create_runtime("{}");
        let identity = create_identity(CARD_JSON);

        let identity_json = get_identity(identity);
        let instance_id: String = serde_json::from_str::<serde_json::Value>(&identity_json).unwrap()["instance_id"]
            .as_str()
            .unwrap()
            .to_string();

        let command_json = format!(
            r#"{{"command_id":"c1","type":"TERMINATE","timestamp":0,"reason":"test","target":{{"instance_id":"{instance_id}","asset_id":null,"organization":null}},"signature":null}}"#
        );
        assert!(apply_kill_switch_command(runtime, &command_json));

        let result = check_permission(runtime, identity, "report", None, None);
        let decision: serde_json::Value = serde_json::from_str(&result).unwrap();
        assert_eq!(decision["allowed"], false);
        assert_eq!(decision["code"], "KILL_SWITCH_TERMINATED");

        destroy_identity(identity);
        destroy_runtime(runtime);
    }
}
