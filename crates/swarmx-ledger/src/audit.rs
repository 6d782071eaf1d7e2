use swarmx_core::{AccountId, SwarmError, TimestampNs};

use crate::db::LedgerDb;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum LedgerOpType {
    Mint,
    Transfer,
    Escrow,
    ReleaseEscrow,
    CancelEscrow,
    Stake,
    Unstake,
    Slash,
    SlashReward,
    Bounty,
    Burn,
}

/// One audit entry per mutating call (§4.3 invariant).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct LedgerOp {
    pub op_id: String,
    pub op_type: LedgerOpType,
    pub account: AccountId,
    pub amount: i64,
    pub ts_ns: TimestampNs,
    pub metadata: serde_json::Value,
}

#[derive(Default, Clone, Debug)]
pub struct AuditFilter {
    pub account: Option<AccountId>,
    pub op_type: Option<LedgerOpType>,
}

impl AuditFilter {
    fn matches(&self, op: &LedgerOp) -> bool {
        if let Some(account) = self.account {
            if op.account != account {
                return false;
            }
        }
        if let Some(op_type) = self.op_type {
            if op.op_type != op_type {
                return false;
            }
        }
        true
    }
}

pub(crate) fn append(db: &LedgerDb, op: &LedgerOp) -> Result<(), SwarmError> {
    let mut key = (op.ts_ns as u64).to_be_bytes().to_vec();
    key.extend_from_slice(op.op_id.as_bytes());
    let bytes = bincode::serialize(op).map_err(|e| SwarmError::Other(e.to_string()))?;
    db.audit_log.insert(key, bytes).map_err(|e| SwarmError::Other(e.to_string()))?;
    Ok(())
}

pub fn audit(db: &LedgerDb, filter: &AuditFilter) -> Result<Vec<LedgerOp>, SwarmError> {
    let mut out = Vec::new();
    for entry in db.audit_log.iter() {
        let (_, bytes) = entry.map_err(|e| SwarmError::Other(e.to_string()))?;
        let op: LedgerOp = bincode::deserialize(&bytes).map_err(|e| SwarmError::Other(e.to_string()))?;
        if filter.matches(&op) {
            out.push(op);
        }
    }
    Ok(out)
}
