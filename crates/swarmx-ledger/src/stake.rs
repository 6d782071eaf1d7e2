use swarmx_core::{AccountId, Stake, SwarmError, TimestampNs, VerifierMetadata, VerifierRecord};

use crate::audit::{LedgerOp, LedgerOpType};
use crate::db::LedgerDb;
use crate::ledger::Ledger;

/// Reputation-affecting events, per §4.4's reputation ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ReputationEvent {
    AttestationPass,
    AttestationFail,
    ChallengeSuccess,
    ChallengeFail,
}

impl ReputationEvent {
    /// Bounded EMA step; keeps the score auditable from the event log
    /// rather than only the cached field.
    fn delta(self) -> f64 {
        match self {
            ReputationEvent::AttestationPass => 0.02,
            ReputationEvent::AttestationFail => -0.05,
            ReputationEvent::ChallengeSuccess => 0.10,
            ReputationEvent::ChallengeFail => -0.15,
        }
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
struct ReputationRecord {
    event: ReputationEvent,
    ts_ns: TimestampNs,
}

/// Stake locking/unbonding and the verifier pool (§4.4).
pub struct StakePool<'a> {
    ledger: &'a Ledger,
}

impl<'a> StakePool<'a> {
    pub fn new(ledger: &'a Ledger) -> Self {
        Self { ledger }
    }

    fn db(&self) -> &LedgerDb {
        self.ledger.db()
    }

    pub fn get_staked_amount(&self, id: &AccountId) -> Result<i64, SwarmError> {
        Ok(self.db().get_stake(id)?.map(|s| s.staked).unwrap_or(0))
    }

    /// Locks `n` credits from `balance` into `staked`.
    pub fn stake(&self, id: &AccountId, amount: i64, op_id: &str, ts_ns: TimestampNs) -> Result<(), SwarmError> {
        let mut account = self.ledger.get_account(id)?.ok_or_else(|| SwarmError::NotFound(id.to_string()))?;
        if account.balance < amount {
            return Err(SwarmError::InsufficientBalance { need: amount, have: account.balance });
        }
        account.balance -= amount;
        self.db().put_account(&account)?;

        let mut stake = self.db().get_stake(id)?.unwrap_or(Stake { staked: 0, unbonding: 0, unlock_ts: 0 });
        stake.staked += amount;
        self.db().put_stake(id, &stake)?;

        crate::audit::append(
            self.db(),
            &LedgerOp {
                op_id: op_id.to_string(),
                op_type: LedgerOpType::Stake,
                account: *id,
                amount,
                ts_ns,
                metadata: serde_json::json!({}),
            },
        )
    }

    /// Moves `n` from `staked` to `unbonding`, with `unlock_ts = now +
    /// unbond_period`.
    pub fn unstake(&self, id: &AccountId, amount: i64, unbond_period_s: u64, op_id: &str, ts_ns: TimestampNs) -> Result<(), SwarmError> {
        let mut stake = self.db().get_stake(id)?.ok_or_else(|| SwarmError::NotFound(id.to_string()))?;
        if stake.staked < amount {
            return Err(SwarmError::InsufficientStake { need: amount, have: stake.staked });
        }
        stake.staked -= amount;
        stake.unbonding += amount;
        stake.unlock_ts = ts_ns + (unbond_period_s as i64) * 1_000_000_000;
        self.db().put_stake(id, &stake)?;

        crate::audit::append(
            self.db(),
            &LedgerOp {
                op_id: op_id.to_string(),
                op_type: LedgerOpType::Unstake,
                account: *id,
                amount,
                ts_ns,
                metadata: serde_json::json!({"unlock_ts": stake.unlock_ts}),
            },
        )
    }

    /// Registration requires `current_staked >= claimed_stake`.
    pub fn register_verifier(&self, did: AccountId, claimed_stake: i64, capabilities: Vec<String>, metadata: VerifierMetadata) -> Result<(), SwarmError> {
        let current = self.get_staked_amount(&did)?;
        if current < claimed_stake {
            return Err(SwarmError::StakeMismatch { claimed: claimed_stake, actual: current });
        }
        let record = VerifierRecord { did, stake_snapshot: claimed_stake, capabilities, metadata, active: true };
        self.db().put_verifier(&record)
    }

    /// Soft delete: the record stays, `active` flips false.
    pub fn deregister_verifier(&self, did: &AccountId) -> Result<(), SwarmError> {
        let mut record = self.db().get_verifier(did)?.ok_or_else(|| SwarmError::NotFound(did.to_string()))?;
        record.active = false;
        self.db().put_verifier(&record)
    }

    pub fn get_active_verifiers(&self, min_stake: i64) -> Result<Vec<VerifierRecord>, SwarmError> {
        let mut out = Vec::new();
        for record in self.db().all_verifiers()? {
            if record.active && self.get_staked_amount(&record.did)? >= min_stake {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// Appends a reputation event and recomputes the bounded score.
    pub fn record_reputation_event(&self, id: &AccountId, event: ReputationEvent, ts_ns: TimestampNs) -> Result<f64, SwarmError> {
        let mut key = id.as_bytes().to_vec();
        let seq = self.db().reputation.scan_prefix(id.as_bytes()).count() as u64;
        key.extend_from_slice(&seq.to_be_bytes());
        let record = ReputationRecord { event, ts_ns };
        let bytes = bincode::serialize(&record).map_err(|e| SwarmError::Other(e.to_string()))?;
        self.db().reputation.insert(key, bytes).map_err(|e| SwarmError::Other(e.to_string()))?;

        let score = self.current_reputation(id)?;
        if let Some(mut record) = self.db().get_verifier(id)? {
            record.metadata.reputation = score;
            self.db().put_verifier(&record)?;
        }
        Ok(score)
    }

    /// Recomputes the score by replaying the full event log, so it is
    /// always derivable from the audit trail, not just the cached field.
    pub fn current_reputation(&self, id: &AccountId) -> Result<f64, SwarmError> {
        let mut score = 0.5_f64;
        for entry in self.db().reputation.scan_prefix(id.as_bytes()) {
            let (_, bytes) = entry.map_err(|e| SwarmError::Other(e.to_string()))?;
            let record: ReputationRecord = bincode::deserialize(&bytes).map_err(|e| SwarmError::Other(e.to_string()))?;
            score = (score + record.event.delta()).clamp(0.0, 1.0);
        }
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::LedgerDb;

    fn ledger() -> Ledger {
        Ledger::new(LedgerDb::temporary().unwrap())
    }

    #[test]
    fn stake_then_unstake_moves_between_buckets() {
        let l = ledger();
        let a = AccountId::from_bytes([1; 32]);
        l.create_account(a, 100).unwrap();
        let pool = StakePool::new(&l);
        pool.stake(&a, 60, "s1", 0).unwrap();
        assert_eq!(pool.get_staked_amount(&a).unwrap(), 60);
        pool.unstake(&a, 20, 86400, "u1", 0).unwrap();
        assert_eq!(pool.get_staked_amount(&a).unwrap(), 40);
    }

    #[test]
    fn registration_requires_sufficient_stake() {
        let l = ledger();
        let a = AccountId::from_bytes([1; 32]);
        l.create_account(a, 100).unwrap();
        let pool = StakePool::new(&l);
        pool.stake(&a, 10, "s1", 0).unwrap();
        let meta =
            VerifierMetadata { org_id: None, asn: None, region: None, identity_hash: None, reputation: 0.5, tee_verified: false };
        assert!(pool.register_verifier(a, 50, vec![], meta).is_err());
    }

    #[test]
    fn reputation_clamped_to_unit_interval() {
        let l = ledger();
        let a = AccountId::from_bytes([1; 32]);
        l.create_account(a, 0).unwrap();
        let pool = StakePool::new(&l);
        for _ in 0..50 {
            pool.record_reputation_event(&a, ReputationEvent::ChallengeSuccess, 0).unwrap();
        }
        assert_eq!(pool.current_reputation(&a).unwrap(), 1.0);
    }
}
