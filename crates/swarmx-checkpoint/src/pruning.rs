use std::collections::HashMap;

use swarmx_cas::CasBackend;
use swarmx_core::{OpId, SwarmError};

struct HotOp {
    epoch: u64,
    bytes: Vec<u8>,
}

/// Hot/cold tiered op storage (§4.12): the most recent `K` epochs stay in
/// memory for cheap replay; ops from older epochs move to a
/// content-addressed cold tier (one blob per op, keyed by its hash) with
/// a small in-memory index from `op_id` to that hash. Retrieval checks
/// hot first, falling back to cold transparently.
pub struct PruningManager<C: CasBackend> {
    hot: HashMap<OpId, HotOp>,
    cold: C,
    cold_index: HashMap<OpId, String>,
}

impl<C: CasBackend> PruningManager<C> {
    pub fn new(cold: C) -> Self {
        Self { hot: HashMap::new(), cold, cold_index: HashMap::new() }
    }

    pub fn insert(&mut self, op_id: OpId, epoch: u64, bytes: Vec<u8>) {
        self.hot.insert(op_id, HotOp { epoch, bytes });
    }

    /// Moves every hot op with `epoch <= current_epoch - hot_epochs` to
    /// the cold tier. Returns the op ids pruned.
    pub fn prune(&mut self, current_epoch: u64, hot_epochs: u64) -> Result<Vec<OpId>, SwarmError> {
        let cutoff = current_epoch.saturating_sub(hot_epochs);
        let due: Vec<OpId> = self.hot.iter().filter(|(_, op)| op.epoch <= cutoff).map(|(id, _)| *id).collect();

        for op_id in &due {
            let op = self.hot.remove(op_id).expect("key just observed present");
            let hash = self.cold.put(&op.bytes)?;
            self.cold_index.insert(*op_id, hash);
        }

        Ok(due)
    }

    pub fn get(&self, op_id: &OpId) -> Result<Option<Vec<u8>>, SwarmError> {
        if let Some(op) = self.hot.get(op_id) {
            return Ok(Some(op.bytes.clone()));
        }
        if let Some(hash) = self.cold_index.get(op_id) {
            return self.cold.get(hash);
        }
        Ok(None)
    }

    pub fn is_hot(&self, op_id: &OpId) -> bool {
        self.hot.contains_key(op_id)
    }

    pub fn is_cold(&self, op_id: &OpId) -> bool {
        self.cold_index.contains_key(op_id)
    }
}
