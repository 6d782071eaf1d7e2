use swarmx_core::{Envelope, EnvelopeKind};

use crate::result::PolicyResult;

pub const POLICY_VERSION: &str = "1.0.0";

/// Kinds a node will forward at all; mirrors the source's
/// `OPAEngine.ALLOWED_KINDS`.
pub const ALLOWED_KINDS: &[EnvelopeKind] = &[
    EnvelopeKind::Need,
    EnvelopeKind::Propose,
    EnvelopeKind::Decide,
    EnvelopeKind::Commit,
    EnvelopeKind::Attest,
    EnvelopeKind::Challenge,
    EnvelopeKind::Heartbeat,
    EnvelopeKind::Yield,
    EnvelopeKind::Release,
    EnvelopeKind::UpdatePlan,
    EnvelopeKind::Finalize,
];

pub const MAX_PAYLOAD_SIZE: usize = 256 * 1024;

pub const REQUIRED_FIELDS: &[&str] = &["v", "id", "thread_id", "kind", "lamport", "ts_ns", "sender_pk", "payload_hash"];

/// Fast, client-side, deterministic check before publish (§4.6). No
/// WASM; O(1) structural rules only, so the result is cacheable by
/// `(op, payload_hash, policy_version)`.
#[derive(Default)]
pub struct PreflightGate;

impl PreflightGate {
    pub fn new() -> Self {
        Self
    }

    pub fn check(&self, envelope: &Envelope) -> PolicyResult {
        if !ALLOWED_KINDS.contains(&envelope.body.kind) {
            return PolicyResult::deny(format!("kind {:?} not allowed", envelope.body.kind), POLICY_VERSION, 0);
        }

        let payload_size = match serde_json::to_vec(&envelope.body.payload) {
            Ok(bytes) => bytes.len(),
            Err(e) => return PolicyResult::deny(format!("payload not serializable: {e}"), POLICY_VERSION, 0),
        };
        if payload_size > MAX_PAYLOAD_SIZE {
            return PolicyResult::deny(
                format!("payload size {payload_size} exceeds {MAX_PAYLOAD_SIZE}"),
                POLICY_VERSION,
                0,
            );
        }

        if envelope.body.sender_pk.is_empty() {
            return PolicyResult::deny("missing sender_pk", POLICY_VERSION, 0);
        }
        if envelope.body.thread_id.is_empty() {
            return PolicyResult::deny("missing thread_id", POLICY_VERSION, 0);
        }

        PolicyResult::allow(POLICY_VERSION, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmx_core::{EnvelopeBody, PayloadHash};

    fn body(kind: EnvelopeKind, payload: serde_json::Value) -> Envelope {
        Envelope::unsigned(EnvelopeBody {
            v: 1,
            id: swarmx_core::EnvelopeId::random(),
            thread_id: "t1".into(),
            kind,
            lamport: 1,
            ts_ns: 0,
            sender_pk: vec![1, 2, 3],
            payload_hash: PayloadHash::from_bytes([0; 32]),
            payload,
        })
    }

    #[test]
    fn allows_well_formed_need() {
        let env = body(EnvelopeKind::Need, serde_json::json!({"goal": "x"}));
        assert!(PreflightGate::new().check(&env).allowed);
    }

    #[test]
    fn rejects_oversized_payload() {
        let big = "x".repeat(MAX_PAYLOAD_SIZE + 1);
        let env = body(EnvelopeKind::Need, serde_json::json!({"blob": big}));
        assert!(!PreflightGate::new().check(&env).allowed);
    }
}
