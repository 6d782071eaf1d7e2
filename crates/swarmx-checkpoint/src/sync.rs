use std::collections::HashSet;

use swarmx_core::{Lamport, OpId, SwarmError};

/// Protocol string peers advertise via libp2p `identify` (§4.13) to
/// declare they serve plan sync. Rides on the same capability-exchange
/// mechanism `swarmx-bus` already wires up, rather than a separate
/// capability table.
pub const PLAN_SYNC_PROTOCOL: &str = "/swarmx/plan_sync/1";

/// Minimal per-op metadata needed for incremental sync and continuity
/// verification — deliberately decoupled from `swarmx-plan::PlanOp` so
/// this crate has no dependency on the plan store; the node layer adapts
/// real ops into this shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncOpRef {
    pub op_id: OpId,
    pub epoch: u64,
    pub lamport: Lamport,
}

/// Incremental sync (§4.13): the ops the peer doesn't have yet, as a
/// plain union difference by `op_id`.
pub fn ops_unknown_to_peer(local: &[SyncOpRef], peer_known: &HashSet<OpId>) -> Vec<OpId> {
    local.iter().filter(|op| !peer_known.contains(&op.op_id)).map(|op| op.op_id).collect()
}

/// Fast-sync continuity check (§4.13): every op replayed after loading a
/// checkpoint baseline must belong to a later epoch than the checkpoint,
/// and lamport values must be monotonically non-decreasing across the
/// replay order given.
pub struct ContinuityVerifier {
    checkpoint_epoch: u64,
}

impl ContinuityVerifier {
    pub fn new(checkpoint_epoch: u64) -> Self {
        Self { checkpoint_epoch }
    }

    pub fn verify(&self, ops_in_replay_order: &[SyncOpRef]) -> Result<(), SwarmError> {
        let mut last_lamport: Option<Lamport> = None;
        for op in ops_in_replay_order {
            if op.epoch <= self.checkpoint_epoch {
                return Err(SwarmError::CheckpointContinuityBroken);
            }
            if let Some(last) = last_lamport {
                if op.lamport < last {
                    return Err(SwarmError::CheckpointContinuityBroken);
                }
            }
            last_lamport = Some(op.lamport);
        }
        Ok(())
    }
}

/// A peer's declared capability list, gathered from `identify`.
#[derive(Clone, Debug)]
pub struct PeerCapabilities {
    pub peer_id: String,
    pub protocols: Vec<String>,
}

/// Filters peers down to those contactable for plan sync: advertises
/// [`PLAN_SYNC_PROTOCOL`], and is not `self_peer_id`.
pub fn discover_sync_peers<'a>(self_peer_id: &str, peers: &'a [PeerCapabilities]) -> Vec<&'a PeerCapabilities> {
    peers
        .iter()
        .filter(|p| p.peer_id != self_peer_id && p.protocols.iter().any(|proto| proto == PLAN_SYNC_PROTOCOL))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(seed: u8, epoch: u64, lamport: Lamport) -> SyncOpRef {
        SyncOpRef { op_id: OpId::from_bytes([seed; 32]), epoch, lamport }
    }

    #[test]
    fn diff_returns_only_unknown_ops() {
        let known_op = op(1, 1, 1);
        let mut known = HashSet::new();
        known.insert(known_op.op_id);
        let unknown_op = op(2, 1, 2);
        let diff = ops_unknown_to_peer(&[known_op, unknown_op], &known);
        assert_eq!(diff, vec![unknown_op.op_id]);
    }

    #[test]
    fn continuity_accepts_increasing_epoch_and_lamport() {
        let verifier = ContinuityVerifier::new(5);
        let ops = vec![op(1, 6, 10), op(2, 6, 11), op(3, 7, 11)];
        assert!(verifier.verify(&ops).is_ok());
    }

    #[test]
    fn continuity_rejects_op_at_or_before_checkpoint_epoch() {
        let verifier = ContinuityVerifier::new(5);
        let ops = vec![op(1, 5, 10)];
        assert!(verifier.verify(&ops).is_err());
    }

    #[test]
    fn continuity_rejects_lamport_regression() {
        let verifier = ContinuityVerifier::new(5);
        let ops = vec![op(1, 6, 10), op(2, 6, 5)];
        assert!(verifier.verify(&ops).is_err());
    }

    #[test]
    fn discovery_excludes_self_and_non_advertising_peers() {
        let peers = vec![
            PeerCapabilities { peer_id: "self".to_string(), protocols: vec![PLAN_SYNC_PROTOCOL.to_string()] },
            PeerCapabilities { peer_id: "peer-a".to_string(), protocols: vec![PLAN_SYNC_PROTOCOL.to_string()] },
            PeerCapabilities { peer_id: "peer-b".to_string(), protocols: vec!["/swarmx/other/1".to_string()] },
        ];
        let discovered = discover_sync_peers("self", &peers);
        assert_eq!(discovered.len(), 1);
        assert_eq!(discovered[0].peer_id, "peer-a");
    }
}
