use std::cmp::Ordering;
use std::collections::BinaryHeap;

use swarmx_core::Challenge;

/// Wraps a `Challenge` so `BinaryHeap` orders by `bond_amount` descending
/// (higher bonds served first, spec §4.10); ties broken by insertion
/// order via `seq` so the heap is a strict total order.
#[derive(Clone, Debug)]
struct QueueEntry {
    challenge: Challenge,
    seq: u64,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.challenge.bond_amount == other.challenge.bond_amount && self.seq == other.seq
    }
}
impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.challenge
            .bond_amount
            .cmp(&other.challenge.bond_amount)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Max-heap on `bond_amount`, spec §4.10: `QUEUED` challenges are served
/// highest-bond-first.
#[derive(Default)]
pub struct ChallengeQueue {
    heap: BinaryHeap<QueueEntry>,
    next_seq: u64,
}

impl ChallengeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, challenge: Challenge) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueueEntry { challenge, seq });
    }

    pub fn pop(&mut self) -> Option<Challenge> {
        self.heap.pop().map(|entry| entry.challenge)
    }

    pub fn peek(&self) -> Option<&Challenge> {
        self.heap.peek().map(|entry| &entry.challenge)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmx_core::{AccountId, ChallengeStatus, Complexity, EvidenceHash, ProofType, TaskId};

    fn challenge(id: &str, bond_amount: i64) -> Challenge {
        Challenge {
            challenge_id: id.to_string(),
            task_id: TaskId::random(),
            commit_id: "commit-1".to_string(),
            challenger_did: AccountId::from_bytes([3u8; 32]),
            proof_type: ProofType::OutputMismatch,
            complexity: Complexity::Simple,
            evidence_hash: EvidenceHash::random(),
            bond_amount,
            size_bytes: 10,
            gas_estimate: 100,
            status: ChallengeStatus::Queued,
        }
    }

    #[test]
    fn highest_bond_served_first() {
        let mut queue = ChallengeQueue::new();
        queue.push(challenge("low", 10));
        queue.push(challenge("high", 100));
        queue.push(challenge("mid", 50));

        assert_eq!(queue.pop().unwrap().challenge_id, "high");
        assert_eq!(queue.pop().unwrap().challenge_id, "mid");
        assert_eq!(queue.pop().unwrap().challenge_id, "low");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn equal_bonds_preserve_fifo_order() {
        let mut queue = ChallengeQueue::new();
        queue.push(challenge("first", 50));
        queue.push(challenge("second", 50));
        assert_eq!(queue.pop().unwrap().challenge_id, "first");
        assert_eq!(queue.pop().unwrap().challenge_id, "second");
    }
}
