// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! # Basic Kernel Walkthrough
//!
//! Exercises identity creation, a handful of `check_permission` calls
//! through the Bouncer's short-circuit chain, a kill-switch pause/resume
//! round trip, and a decayed child spawn. Run with:
//!
//! ```bash
//! cargo run -p aigos-core --example basic --features std
//! ```

use std::sync::Arc;

use aigos_core::identity::IdentityManager;
use aigos_core::killswitch::{CommandTarget, KillSwitchCommand, KillSwitchCommandType, KillSwitchRegistry, NoopHooks};
use aigos_core::policy::{PolicyConfig, PolicyEngine};
use aigos_core::types::{ActionContext, AssetCard, CapabilitiesManifest, GoldenThread, RiskLevel};

fn main() {
    println!("Aigos Governance Kernel — Basic Walkthrough\n");

    let thread = GoldenThread { ticket_id: "T-4471".into(), approved_by: "alice".into(), approved_at: 0 };
    let card = AssetCard {
        asset_id: "asset-finance-bot".into(),
        version: "1.0".into(),
        risk_level: RiskLevel::Limited,
        capabilities_manifest: CapabilitiesManifest {
            allowed_tools: vec!["invoice:*".into(), "report".into()],
            denied_tools: vec!["invoice:delete".into()],
            may_spawn_children: true,
            max_child_depth: 2,
            max_cost_per_session: Some(100.0),
            ..Default::default()
        },
        golden_thread: thread,
        golden_thread_hash: None,
    };

    let root = IdentityManager::create_identity(&card, None, 0).expect("golden thread hash matches");
    println!("created root identity {} (verified={})\n", root.instance_id, root.verified);

    let kill_switch = Arc::new(KillSwitchRegistry::new(true, NoopHooks));
    let engine = PolicyEngine::new(PolicyConfig::default(), kill_switch.clone());

    let decision = engine.check_permission(&root, "invoice:send", None, Some(&ActionContext { cost: Some(40.0), ..Default::default() }));
    println!("invoice:send -> allowed={} code={:?}", decision.allowed, decision.code);

    let decision = engine.check_permission(&root, "invoice:delete", None, None);
    println!("invoice:delete -> allowed={} code={:?} (denied_by={:?})", decision.allowed, decision.code, decision.denied_by);

    println!("\npausing instance via kill-switch...");
    kill_switch.apply(
        &KillSwitchCommand {
            command_id: "cmd-1".into(),
            command_type: KillSwitchCommandType::Pause,
            timestamp: 0,
            reason: "manual review".into(),
            target: CommandTarget { instance_id: Some(root.instance_id.clone()), asset_id: None, organization: None },
            signature: None,
        },
        0,
    );
    let decision = engine.check_permission(&root, "invoice:send", None, None);
    println!("invoice:send (paused) -> allowed={} code={:?}", decision.allowed, decision.code);

    kill_switch.apply(
        &KillSwitchCommand {
            command_id: "cmd-2".into(),
            command_type: KillSwitchCommandType::Resume,
            timestamp: 0,
            reason: "review cleared".into(),
            target: CommandTarget { instance_id: Some(root.instance_id.clone()), asset_id: None, organization: None },
            signature: None,
        },
        1,
    );
    let decision = engine.check_permission(&root, "invoice:send", None, None);
    println!("invoice:send (resumed) -> allowed={}\n", decision.allowed);

    let child = IdentityManager::spawn_child(&root, None, kill_switch.effective_state(&root.instance_id, &root.asset_id), 1)
        .expect("root allows spawning");
    println!(
        "spawned child {} — max_cost_per_session decayed to {:?}, max_child_depth={}",
        child.instance_id, child.capabilities_manifest.max_cost_per_session, child.capabilities_manifest.max_child_depth
    );

    println!("\nDone.");
}
