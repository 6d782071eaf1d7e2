use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, EnvelopeId, EvidenceHash, Lamport, OpId, PayloadHash, TaskId, TimestampNs};

// ── Envelope (§3, §4.2, §6) ───────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvelopeKind {
    Need,
    Propose,
    Decide,
    Commit,
    Attest,
    Challenge,
    Heartbeat,
    Yield,
    Release,
    UpdatePlan,
    Finalize,
}

/// Every field that participates in the signature, kept as its own struct
/// (mirrors the teacher's `TransactionBody`/`Transaction` split) so
/// `canonical_bytes()` has an unambiguous, reviewable scope: exactly this
/// struct, nothing more, nothing less.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeBody {
    pub v: u16,
    pub id: EnvelopeId,
    pub thread_id: String,
    pub kind: EnvelopeKind,
    pub lamport: Lamport,
    pub ts_ns: TimestampNs,
    pub sender_pk: Vec<u8>,
    pub payload_hash: PayloadHash,
    pub payload: serde_json::Value,
}

/// The wire envelope: body plus the fields excluded from the signed bytes
/// (`sig`, `policy_decision`, `policy_eval_digest`), per spec §4.2/§6.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(flatten)]
    pub body: EnvelopeBody,
    pub sig: Option<Vec<u8>>,
    pub policy_decision: Option<bool>,
    pub policy_eval_digest: Option<String>,
}

impl Envelope {
    pub fn unsigned(body: EnvelopeBody) -> Self {
        Self {
            body,
            sig: None,
            policy_decision: None,
            policy_eval_digest: None,
        }
    }
}

// ── PlanOp (§3, §4.5) ─────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpType {
    AddTask,
    State,
    Link,
    Annotate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanOp {
    pub op_id: OpId,
    pub thread_id: String,
    pub lamport: Lamport,
    pub actor_id: String,
    pub op_type: OpType,
    pub task_id: TaskId,
    pub payload: serde_json::Value,
    pub ts_ns: TimestampNs,
}

// ── Task / Edge / Annotation (§3, §4.5) ───────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Draft,
    Decided,
    Verified,
    Final,
}

impl TaskState {
    /// Transitions DRAFT→DECIDED→VERIFIED→FINAL only (§3 invariant).
    pub fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::*;
        self == next || matches!((self, next), (Draft, Decided) | (Decided, Verified) | (Verified, Final))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub thread_id: String,
    pub task_type: String,
    pub state: TaskState,
    pub last_lamport: Lamport,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub parent: TaskId,
    pub child: TaskId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub task_id: TaskId,
    pub key: String,
    pub value: serde_json::Value,
    pub lamport: Lamport,
    pub actor_id: String,
}

// ── Ledger (§3, §4.3, §4.4) ───────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub balance: i64,
    pub locked: i64,
    pub unbonding: i64,
}

impl Account {
    pub fn new(id: AccountId, initial: i64) -> Self {
        Self {
            id,
            balance: initial,
            locked: 0,
            unbonding: 0,
        }
    }

    pub fn total(&self) -> i64 {
        self.balance + self.locked + self.unbonding
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscrowState {
    Active,
    Released,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escrow {
    pub escrow_id: String,
    pub depositor: AccountId,
    pub amount: i64,
    pub state: EscrowState,
    pub reference: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stake {
    pub staked: i64,
    pub unbonding: i64,
    pub unlock_ts: TimestampNs,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerifierMetadata {
    pub org_id: Option<String>,
    pub asn: Option<u32>,
    pub region: Option<String>,
    pub identity_hash: Option<String>,
    pub reputation: f64,
    pub tee_verified: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerifierRecord {
    pub did: AccountId,
    pub stake_snapshot: i64,
    pub capabilities: Vec<String>,
    pub metadata: VerifierMetadata,
    pub active: bool,
}

// ── Lease (§3, §4.8) ──────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    pub lease_id: String,
    pub task_id: TaskId,
    pub worker_id: String,
    pub ttl_s: u64,
    pub created_ns: TimestampNs,
    pub last_hb_ns: TimestampNs,
    pub hb_interval_s: u64,
}

impl Lease {
    pub fn is_expired(&self, now_ns: TimestampNs) -> bool {
        now_ns > self.created_ns + (self.ttl_s as i64) * 1_000_000_000
    }

    pub fn heartbeat_missed(&self, now_ns: TimestampNs) -> bool {
        let expected = self.last_hb_ns + (self.hb_interval_s as i64) * 1_000_000_000;
        now_ns > expected
    }
}

// ── Auction / Bid (§3, §4.9) ──────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuctionStatus {
    Open,
    Closed,
    Timeout,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub agent_id: String,
    pub cost: i64,
    pub eta_s: u64,
    pub reputation: f64,
    pub capabilities: Vec<String>,
    pub ts_ns: TimestampNs,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Auction {
    pub need_id: String,
    pub budget: i64,
    pub bids: Vec<Bid>,
    pub status: AuctionStatus,
    pub start_ns: TimestampNs,
    pub extensions: u32,
    pub round: u32,
}

// ── Challenge (§3, §4.10) ─────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProofType {
    SchemaViolation,
    MissingCitation,
    SemanticContradiction,
    OutputMismatch,
    PolicyBreach,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChallengeStatus {
    Queued,
    Verified,
    Upheld,
    Rejected,
    Withdrawn,
    Escalated,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub challenge_id: String,
    pub task_id: TaskId,
    pub commit_id: String,
    pub challenger_did: AccountId,
    pub proof_type: ProofType,
    pub complexity: Complexity,
    pub evidence_hash: EvidenceHash,
    pub bond_amount: i64,
    pub size_bytes: usize,
    pub gas_estimate: u64,
    pub status: ChallengeStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChallengeWindow {
    pub open_ns: TimestampNs,
    pub duration_s: u64,
    pub extensions: u32,
}

impl ChallengeWindow {
    pub fn is_open(&self, now_ns: TimestampNs) -> bool {
        now_ns <= self.open_ns + (self.duration_s as i64) * 1_000_000_000
    }
}

// ── Checkpoint (§3, §4.12) ────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub epoch: u64,
    pub merkle_root: String,
    pub state_summary: String,
    pub op_count: u64,
    pub ts_ns: TimestampNs,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointSignature {
    pub verifier_id: AccountId,
    pub sig: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignedCheckpoint {
    pub checkpoint: Checkpoint,
    pub signatures: Vec<CheckpointSignature>,
}

impl SignedCheckpoint {
    /// P6 (Quorum Validity): accepted iff it carries >= K distinct
    /// verifier signatures. Signature cryptographic validity is checked by
    /// the caller before counting; this only enforces distinctness + count.
    pub fn verify_quorum(&self, k: u32) -> bool {
        let mut seen = std::collections::HashSet::new();
        for sig in &self.signatures {
            seen.insert(sig.verifier_id);
        }
        seen.len() as u32 >= k
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_expiry_math() {
        let lease = Lease {
            lease_id: "l1".into(),
            task_id: TaskId::from_bytes([1; 32]),
            worker_id: "w1".into(),
            ttl_s: 100,
            created_ns: 0,
            last_hb_ns: 0,
            hb_interval_s: 10,
        };
        assert!(!lease.is_expired(50_000_000_000));
        assert!(lease.is_expired(100_000_000_001));
    }

    #[test]
    fn quorum_counts_distinct_signers_only() {
        let ckpt = SignedCheckpoint {
            checkpoint: Checkpoint {
                epoch: 1,
                merkle_root: "r".into(),
                state_summary: "s".into(),
                op_count: 0,
                ts_ns: 0,
            },
            signatures: vec![
                CheckpointSignature {
                    verifier_id: AccountId::from_bytes([1; 32]),
                    sig: vec![1],
                },
                CheckpointSignature {
                    verifier_id: AccountId::from_bytes([1; 32]),
                    sig: vec![2],
                },
            ],
        };
        assert!(!ckpt.verify_quorum(2));
        assert!(ckpt.verify_quorum(1));
    }
}
