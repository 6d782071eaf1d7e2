use swarmx_core::{Checkpoint, CheckpointSignature, SignedCheckpoint, TimestampNs};
use swarmx_crypto::sha256_hex;

use crate::merkle::MerkleTree;

/// Builds a `Checkpoint` for `epoch` over `op_hashes`, per §4.12.
/// `verify_quorum` (accept once signatures from >= K distinct verifiers
/// accumulate) already lives on `SignedCheckpoint` in `swarmx-core`, an
/// arbitrary policy-driven K rather than a fixed `ceil(2n/3)` fraction.
pub fn create_checkpoint(epoch: u64, state_summary: String, op_hashes: &[String], now_ns: TimestampNs) -> Checkpoint {
    let tree = MerkleTree::build(op_hashes);
    Checkpoint {
        epoch,
        merkle_root: tree.root(),
        state_summary,
        op_count: op_hashes.len() as u64,
        ts_ns: now_ns,
    }
}

/// Canonical hash of a checkpoint's contents, for signing and for
/// checkpoint-to-checkpoint identity comparisons.
pub fn compute_hash(checkpoint: &Checkpoint) -> String {
    let canonical = format!(
        "{}:{}:{}:{}:{}",
        checkpoint.epoch, checkpoint.merkle_root, checkpoint.state_summary, checkpoint.op_count, checkpoint.ts_ns
    );
    sha256_hex(canonical.as_bytes())
}

/// Accumulates verifier signatures onto a checkpoint, rejecting repeat
/// signers (signature cryptographic validity is checked by the caller
/// before this is invoked, per `SignedCheckpoint::verify_quorum`'s
/// contract).
pub fn add_signature(signed: &mut SignedCheckpoint, signature: CheckpointSignature) {
    if !signed.signatures.iter().any(|s| s.verifier_id == signature.verifier_id) {
        signed.signatures.push(signature);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmx_core::AccountId;

    #[test]
    fn checkpoint_merkle_root_matches_tree() {
        let op_hashes = vec![sha256_hex(b"a"), sha256_hex(b"b"), sha256_hex(b"c")];
        let checkpoint = create_checkpoint(1, "summary".to_string(), &op_hashes, 0);
        let tree = MerkleTree::build(&op_hashes);
        assert_eq!(checkpoint.merkle_root, tree.root());
        assert_eq!(checkpoint.op_count, 3);
    }

    #[test]
    fn compute_hash_is_deterministic() {
        let checkpoint = create_checkpoint(1, "summary".to_string(), &[sha256_hex(b"a")], 0);
        assert_eq!(compute_hash(&checkpoint), compute_hash(&checkpoint));
    }

    #[test]
    fn add_signature_deduplicates_by_verifier() {
        let mut signed = SignedCheckpoint {
            checkpoint: create_checkpoint(1, "s".to_string(), &[], 0),
            signatures: Vec::new(),
        };
        let verifier = AccountId::from_bytes([1; 32]);
        add_signature(&mut signed, CheckpointSignature { verifier_id: verifier, sig: vec![1] });
        add_signature(&mut signed, CheckpointSignature { verifier_id: verifier, sig: vec![2] });
        assert_eq!(signed.signatures.len(), 1);
    }
}
