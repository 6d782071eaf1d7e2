use std::collections::HashMap;
use std::sync::Mutex;

use swarmx_core::{Envelope, LamportClock, ProtocolConfig, SwarmError, TimestampNs};
use swarmx_crypto::hash::account_id_from_pubkey;
use swarmx_policy::{IngressGate, PreflightGate};

use crate::pool::ConnectionPool;
use crate::topic::thread_subject;

/// Mirrors `bus.py`'s `log_event(..., kind="BUS.PUBLISH"|"BUS.DELIVER")`
/// CCTV-style audit trail: every publish and delivery attempt is recorded
/// regardless of outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuditKind {
    Publish,
    Deliver,
    DeadLetter,
}

#[derive(Clone, Debug)]
pub struct BusAuditEntry {
    pub thread_id: String,
    pub subject: String,
    pub kind: AuditKind,
    pub detail: String,
    pub ts_ns: TimestampNs,
}

/// Transport abstraction so `MessageBus`'s validate/gate/dispatch logic is
/// unit-testable without a running libp2p swarm; `crate::network` supplies
/// the real implementation.
pub trait BusTransport: Send + Sync {
    fn publish(&self, subject: String, bytes: Vec<u8>);
}

/// An in-memory transport that just records what was published — used by
/// `swarmx-bus`'s own tests and by any crate that wants to drive
/// `MessageBus::publish` without a network.
#[derive(Default)]
pub struct InMemoryTransport {
    pub sent: Mutex<Vec<(String, Vec<u8>)>>,
}

impl BusTransport for InMemoryTransport {
    fn publish(&self, subject: String, bytes: Vec<u8>) {
        self.sent.lock().unwrap().push((subject, bytes));
    }
}

/// The signed-envelope message bus (§4.7): `publish` validates locally,
/// runs the preflight gate, hands off to the transport, then audits.
/// `handle_inbound` runs the receive-side pipeline: parse, verify
/// signature, ingress gate, Lamport merge, audit, dispatch.
pub struct MessageBus<T: BusTransport> {
    transport: T,
    pool: ConnectionPool,
    preflight: PreflightGate,
    ingress: IngressGate,
    clocks: Mutex<HashMap<String, LamportClock>>,
    audit: Mutex<Vec<BusAuditEntry>>,
}

impl<T: BusTransport> MessageBus<T> {
    pub fn new(transport: T, max_pool_size: usize) -> Self {
        Self {
            transport,
            pool: ConnectionPool::new(max_pool_size),
            preflight: PreflightGate,
            ingress: IngressGate::new(),
            clocks: Mutex::new(HashMap::new()),
            audit: Mutex::new(Vec::new()),
        }
    }

    /// `publish(thread_id, subject, envelope)`: validate locally ->
    /// preflight gate -> transport publish -> audit log (§4.7).
    pub async fn publish(&self, thread_id: &str, role: &str, envelope: &Envelope) -> Result<(), SwarmError> {
        let subject = thread_subject(thread_id, role);

        swarmx_crypto::envelope::verify(envelope)?;

        let decision = self.preflight.check(envelope);
        if !decision.allowed {
            self.record(thread_id, &subject, AuditKind::DeadLetter, decision.reasons.join("; "), envelope.body.ts_ns);
            return Err(SwarmError::PolicyDenied(decision.reasons.join("; ")));
        }

        let _guard = self.pool.get().await;
        let bytes = bincode::serialize(envelope).map_err(|e| SwarmError::MalformedEnvelope(e.to_string()))?;
        self.transport.publish(subject.clone(), bytes);

        self.record(thread_id, &subject, AuditKind::Publish, format!("{:?}", envelope.body.kind), envelope.body.ts_ns);
        Ok(())
    }

    /// `subscribe(subject, handler)`'s receive-side pipeline up to
    /// dispatch: parse -> validate signature -> ingress gate -> merge
    /// lamport. Returns the envelope for the caller's handler to process,
    /// or an error after the malformed/denied message has been
    /// dead-lettered into the audit log.
    pub fn handle_inbound(
        &self,
        thread_id: &str,
        subject: &str,
        bytes: &[u8],
        config: &ProtocolConfig,
        now_ns: TimestampNs,
    ) -> Result<Envelope, SwarmError> {
        let envelope: Envelope = match bincode::deserialize(bytes) {
            Ok(e) => e,
            Err(e) => {
                self.record(thread_id, subject, AuditKind::DeadLetter, format!("malformed: {e}"), now_ns);
                return Err(SwarmError::MalformedEnvelope(e.to_string()));
            }
        };

        if let Err(e) = swarmx_crypto::envelope::verify(&envelope) {
            self.record(thread_id, subject, AuditKind::DeadLetter, format!("verify failed: {e}"), now_ns);
            return Err(e);
        }

        let decision = self.ingress.evaluate(&envelope, config);
        if !decision.allowed {
            self.record(thread_id, subject, AuditKind::DeadLetter, decision.reasons.join("; "), now_ns);
            return Err(SwarmError::PolicyDenied(decision.reasons.join("; ")));
        }

        let sender = account_id_from_pubkey(&envelope.body.sender_pk).to_b58();
        {
            let mut clocks = self.clocks.lock().unwrap();
            let clock = clocks.entry(thread_id.to_string()).or_default();
            if let Err(e) = clock.observe(&sender, envelope.body.lamport) {
                drop(clocks);
                self.record(thread_id, subject, AuditKind::DeadLetter, format!("{e}"), now_ns);
                return Err(e);
            }
        }

        self.record(thread_id, subject, AuditKind::Deliver, format!("{:?}", envelope.body.kind), now_ns);
        Ok(envelope)
    }

    fn record(&self, thread_id: &str, subject: &str, kind: AuditKind, detail: String, ts_ns: TimestampNs) {
        self.audit.lock().unwrap().push(BusAuditEntry {
            thread_id: thread_id.to_string(),
            subject: subject.to_string(),
            kind,
            detail,
            ts_ns,
        });
    }

    pub fn audit_log(&self) -> Vec<BusAuditEntry> {
        self.audit.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmx_core::{EnvelopeBody, EnvelopeId, EnvelopeKind};
    use swarmx_crypto::envelope::{canonical_payload_hash, sign};
    use swarmx_crypto::keypair::KeyPair;

    fn signed_envelope(kp: &KeyPair, lamport: u64) -> Envelope {
        let payload = serde_json::json!({"budget": 100});
        let body = EnvelopeBody {
            v: 1,
            id: EnvelopeId::random(),
            thread_id: "t1".into(),
            kind: EnvelopeKind::Need,
            lamport,
            ts_ns: 0,
            sender_pk: kp.public_key_bytes().to_vec(),
            payload_hash: canonical_payload_hash(&payload).unwrap(),
            payload,
        };
        sign(Envelope::unsigned(body), kp).unwrap()
    }

    #[tokio::test]
    async fn publish_then_inbound_round_trips() {
        let bus = MessageBus::new(InMemoryTransport::default(), 4);
        let kp = KeyPair::generate();
        let env = signed_envelope(&kp, 1);

        bus.publish("t1", "need", &env).await.unwrap();
        let sent = bus.transport.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);

        let config = ProtocolConfig::default();
        let (subject, bytes) = &sent[0];
        let decoded = bus.handle_inbound("t1", subject, bytes, &config, 0).unwrap();
        assert_eq!(decoded.body.lamport, 1);
    }

    #[test]
    fn malformed_bytes_are_dead_lettered() {
        let bus = MessageBus::new(InMemoryTransport::default(), 4);
        let config = ProtocolConfig::default();
        let result = bus.handle_inbound("t1", "thread.t1.need", b"not a real envelope", &config, 0);
        assert!(result.is_err());
        let log = bus.audit_log();
        assert_eq!(log.last().unwrap().kind, AuditKind::DeadLetter);
    }

    #[test]
    fn clock_regression_is_dead_lettered() {
        let bus = MessageBus::new(InMemoryTransport::default(), 4);
        let kp = KeyPair::generate();
        let config = ProtocolConfig::default();

        let env1 = signed_envelope(&kp, 5);
        let bytes1 = bincode::serialize(&env1).unwrap();
        bus.handle_inbound("t1", "thread.t1.need", &bytes1, &config, 0).unwrap();

        let env2 = signed_envelope(&kp, 5);
        let bytes2 = bincode::serialize(&env2).unwrap();
        let result = bus.handle_inbound("t1", "thread.t1.need", &bytes2, &config, 0);
        assert_eq!(result, Err(SwarmError::ClockRegression));
    }
}
