// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! Governance event stream.
//!
//! Every subsystem (policy engine, kill-switch registry, identity manager)
//! emits a [`GovernanceEvent`] on state-relevant occurrences. Emission must
//! never block the calling path — the default [`EventSink`] is a bounded
//! ring buffer; callers wanting durable delivery provide their own sink
//! (e.g. one that forwards to a message queue) and accept the same
//! non-blocking contract.

use alloc::string::String;
use alloc::vec::Vec;

use crate::types::RiskLevel;

#[cfg(feature = "std")]
use crate::killswitch::RunState;

/// Severity attached to an event, independent of its variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warn,
    Critical,
}

/// A governance-relevant occurrence. Field names are stable — they are the
/// attribute names downstream consumers (SIEMs, dashboards) key on.
#[derive(Debug, Clone)]
pub enum GovernanceEvent {
    IdentityCreated { instance_id: String, asset_id: String, risk_level: RiskLevel },
    IdentitySpawned { instance_id: String, parent_instance_id: String, generation_depth: u32 },
    SpawnDenied { parent_instance_id: String, reason: String },
    Decision { instance_id: String, action: String, allowed: bool, code: String, evaluated_at_ns: u64 },
    PolicyViolation { instance_id: String, action: String, code: String, severity: Severity },
    BudgetExceeded { instance_id: String, kind: String, limit: f64, attempted: f64 },
    #[cfg(feature = "std")]
    KillSwitchTransition { scope: String, from: RunState, to: RunState, command_id: String },
    TokenIssued { jti: String, issuer: String, subject: String },
    TokenRejected { jti: Option<String>, code: String },
}

impl GovernanceEvent {
    pub fn severity(&self) -> Severity {
        match self {
            GovernanceEvent::IdentityCreated { .. }
            | GovernanceEvent::IdentitySpawned { .. }
            | GovernanceEvent::Decision { allowed: true, .. }
            | GovernanceEvent::TokenIssued { .. } => Severity::Info,
            GovernanceEvent::Decision { allowed: false, .. }
            | GovernanceEvent::SpawnDenied { .. }
            | GovernanceEvent::BudgetExceeded { .. }
            | GovernanceEvent::TokenRejected { .. } => Severity::Warn,
            GovernanceEvent::PolicyViolation { severity, .. } => *severity,
            #[cfg(feature = "std")]
            GovernanceEvent::KillSwitchTransition { to, .. } => {
                if *to == RunState::Terminated {
                    Severity::Critical
                } else {
                    Severity::Warn
                }
            }
        }
    }
}

/// Single-method sink contract. Implementations must not block or panic;
/// a sink that cannot keep up should drop events rather than stall the
/// calling policy/identity/kill-switch path.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: GovernanceEvent);
}

/// Sink that discards everything. Used when no observability is wired up.
pub struct NullSink;
impl EventSink for NullSink {
    fn emit(&self, _event: GovernanceEvent) {}
}

/// Bounded in-memory ring buffer, the default sink when none is configured.
/// Oldest events are dropped once `capacity` is reached.
#[cfg(feature = "std")]
pub struct RingBufferSink {
    capacity: usize,
    buffer: parking_lot::Mutex<alloc::collections::VecDeque<GovernanceEvent>>,
}

#[cfg(feature = "std")]
impl RingBufferSink {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, buffer: parking_lot::Mutex::new(alloc::collections::VecDeque::with_capacity(capacity)) }
    }

    pub fn drain(&self) -> Vec<GovernanceEvent> {
        self.buffer.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(feature = "std")]
impl Default for RingBufferSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(feature = "std")]
impl EventSink for RingBufferSink {
    fn emit(&self, event: GovernanceEvent) {
        let mut buffer = self.buffer.lock();
        if buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(event);
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_drops_oldest_when_full() {
        let sink = RingBufferSink::new(2);
        sink.emit(GovernanceEvent::TokenIssued { jti: "1".into(), issuer: "a".into(), subject: "b".into() });
        sink.emit(GovernanceEvent::TokenIssued { jti: "2".into(), issuer: "a".into(), subject: "b".into() });
        sink.emit(GovernanceEvent::TokenIssued { jti: "3".into(), issuer: "a".into(), subject: "b".into() });
        let drained = sink.drain();
        assert_eq!(drained.len(), 2);
        assert!(matches!(&drained[0], GovernanceEvent::TokenIssued { jti, .. } if jti == "2"));
    }

    #[test]
    fn decision_denied_is_warn_severity() {
        let event = GovernanceEvent::Decision {
            instance_id: "i".into(),
            action: "a".into(),
            allowed: false,
            code: "CAPABILITY_DENY".into(),
            evaluated_at_ns: 0,
        };
        assert_eq!(event.severity(), Severity::Warn);
    }

    #[test]
    fn terminate_transition_is_critical() {
        let event = GovernanceEvent::KillSwitchTransition {
            scope: "x".into(),
            from: RunState::Active,
            to: RunState::Terminated,
            command_id: "c".into(),
        };
        assert_eq!(event.severity(), Severity::Critical);
    }
}
