use swarmx_core::{Account, AccountId, Escrow, EscrowState, SwarmError, TimestampNs};

use crate::audit::{self, AuditFilter, LedgerOp, LedgerOpType};
use crate::db::LedgerDb;

/// All state changes staged by a ledger call before atomic commit —
/// validate fully first, then stage, then commit in one sled transaction.
#[derive(Default)]
struct StagedMutations {
    accounts: Vec<Account>,
    escrows: Vec<Escrow>,
    ops: Vec<LedgerOp>,
}

/// The credit ledger (§4.3): accounts, transfers, and escrow, backed by a
/// single `sled::Db` under one logical writer (callers serialize access
/// externally, e.g. behind `swarmx_node::Node`'s ledger lock).
pub struct Ledger {
    db: LedgerDb,
}

impl Ledger {
    pub fn new(db: LedgerDb) -> Self {
        Self { db }
    }

    fn commit(&self, staged: StagedMutations) -> Result<(), SwarmError> {
        for acc in &staged.accounts {
            self.db.put_account(acc)?;
        }
        for escrow in &staged.escrows {
            self.db.put_escrow(escrow)?;
        }
        for op in &staged.ops {
            audit::append(&self.db, op)?;
        }
        Ok(())
    }

    pub fn create_account(&self, id: AccountId, initial: i64) -> Result<(), SwarmError> {
        if self.db.account_exists(&id) {
            return Err(SwarmError::AccountExists(id.to_string()));
        }
        self.db.put_account(&Account::new(id, initial))
    }

    pub fn get_balance(&self, id: &AccountId) -> Result<i64, SwarmError> {
        Ok(self.db.get_account(id)?.map(|a| a.balance).unwrap_or(0))
    }

    pub fn get_account(&self, id: &AccountId) -> Result<Option<Account>, SwarmError> {
        self.db.get_account(id)
    }

    /// Creates balance out of nothing; the only entry point besides
    /// genesis bootstrap, so "mint/burn are the only sources" (§3) is a
    /// checkable postcondition.
    pub fn mint(&self, id: AccountId, amount: i64, op_id: &str, ts_ns: TimestampNs) -> Result<(), SwarmError> {
        let mut account = self.db.get_account(&id)?.unwrap_or_else(|| Account::new(id, 0));
        account.balance += amount;

        let mut staged = StagedMutations::default();
        staged.accounts.push(account);
        staged.ops.push(LedgerOp {
            op_id: op_id.to_string(),
            op_type: LedgerOpType::Mint,
            account: id,
            amount,
            ts_ns,
            metadata: serde_json::json!({}),
        });
        self.commit(staged)
    }

    pub fn transfer(&self, from: &AccountId, to: &AccountId, amount: i64, op_id: &str, ts_ns: TimestampNs) -> Result<(), SwarmError> {
        let mut sender = self.db.get_account(from)?.ok_or_else(|| SwarmError::NotFound(from.to_string()))?;
        if sender.balance < amount {
            return Err(SwarmError::InsufficientBalance { need: amount, have: sender.balance });
        }
        let mut receiver = self.db.get_account(to)?.unwrap_or_else(|| Account::new(*to, 0));

        sender.balance -= amount;
        receiver.balance += amount;

        let mut staged = StagedMutations::default();
        staged.accounts.push(sender);
        staged.accounts.push(receiver);
        staged.ops.push(LedgerOp {
            op_id: op_id.to_string(),
            op_type: LedgerOpType::Transfer,
            account: *from,
            amount,
            ts_ns,
            metadata: serde_json::json!({"to": to.to_b58()}),
        });
        self.commit(staged)
    }

    /// Atomically moves `amount` from `from.balance` to `from.locked`,
    /// creating an ACTIVE escrow record.
    pub fn escrow(&self, from: &AccountId, amount: i64, reference: &str, escrow_id: &str, ts_ns: TimestampNs) -> Result<String, SwarmError> {
        let mut account = self.db.get_account(from)?.ok_or_else(|| SwarmError::NotFound(from.to_string()))?;
        if account.balance < amount {
            return Err(SwarmError::InsufficientBalance { need: amount, have: account.balance });
        }
        account.balance -= amount;
        account.locked += amount;

        let escrow = Escrow {
            escrow_id: escrow_id.to_string(),
            depositor: *from,
            amount,
            state: EscrowState::Active,
            reference: reference.to_string(),
        };

        let mut staged = StagedMutations::default();
        staged.accounts.push(account);
        staged.escrows.push(escrow);
        staged.ops.push(LedgerOp {
            op_id: format!("{escrow_id}-open"),
            op_type: LedgerOpType::Escrow,
            account: *from,
            amount,
            ts_ns,
            metadata: serde_json::json!({"reference": reference}),
        });
        self.commit(staged)?;
        Ok(escrow_id.to_string())
    }

    /// Moves the escrowed amount from the depositor's `locked` to `to`'s
    /// `balance`, transitioning the escrow to RELEASED.
    pub fn release_escrow(&self, escrow_id: &str, to: &AccountId, ts_ns: TimestampNs) -> Result<(), SwarmError> {
        let mut escrow = self.db.get_escrow(escrow_id)?.ok_or_else(|| SwarmError::EscrowNotFound(escrow_id.to_string()))?;
        if escrow.state != EscrowState::Active {
            return Err(SwarmError::EscrowAlreadyReleased(escrow_id.to_string()));
        }

        let mut depositor = self.db.get_account(&escrow.depositor)?.ok_or_else(|| SwarmError::NotFound(escrow.depositor.to_string()))?;
        depositor.locked -= escrow.amount;
        let mut receiver = self.db.get_account(to)?.unwrap_or_else(|| Account::new(*to, 0));
        receiver.balance += escrow.amount;
        escrow.state = EscrowState::Released;

        let mut staged = StagedMutations::default();
        staged.accounts.push(depositor);
        staged.accounts.push(receiver);
        staged.escrows.push(escrow.clone());
        staged.ops.push(LedgerOp {
            op_id: format!("{escrow_id}-release"),
            op_type: LedgerOpType::ReleaseEscrow,
            account: *to,
            amount: escrow.amount,
            ts_ns,
            metadata: serde_json::json!({"escrow_id": escrow_id}),
        });
        self.commit(staged)
    }

    /// Returns the escrowed amount to the depositor's balance,
    /// transitioning the escrow to CANCELLED.
    pub fn cancel_escrow(&self, escrow_id: &str, ts_ns: TimestampNs) -> Result<(), SwarmError> {
        let mut escrow = self.db.get_escrow(escrow_id)?.ok_or_else(|| SwarmError::EscrowNotFound(escrow_id.to_string()))?;
        if escrow.state != EscrowState::Active {
            return Err(SwarmError::EscrowAlreadyReleased(escrow_id.to_string()));
        }

        let mut depositor = self.db.get_account(&escrow.depositor)?.ok_or_else(|| SwarmError::NotFound(escrow.depositor.to_string()))?;
        depositor.locked -= escrow.amount;
        depositor.balance += escrow.amount;
        escrow.state = EscrowState::Cancelled;

        let mut staged = StagedMutations::default();
        staged.accounts.push(depositor.clone());
        staged.escrows.push(escrow.clone());
        staged.ops.push(LedgerOp {
            op_id: format!("{escrow_id}-cancel"),
            op_type: LedgerOpType::CancelEscrow,
            account: depositor.id,
            amount: escrow.amount,
            ts_ns,
            metadata: serde_json::json!({"escrow_id": escrow_id}),
        });
        self.commit(staged)
    }

    /// Reduces `account.locked` directly (burn); used by slashing and
    /// bounty-burn paths. Per §9's burn-semantics decision, no sentinel
    /// account receives the burned amount.
    pub fn burn_locked(&self, id: &AccountId, amount: i64, op_id: &str, ts_ns: TimestampNs, metadata: serde_json::Value) -> Result<i64, SwarmError> {
        let mut account = self.db.get_account(id)?.ok_or_else(|| SwarmError::NotFound(id.to_string()))?;
        let actual = amount.min(account.locked);
        account.locked -= actual;

        let mut staged = StagedMutations::default();
        staged.accounts.push(account);
        staged.ops.push(LedgerOp {
            op_id: op_id.to_string(),
            op_type: LedgerOpType::Burn,
            account: *id,
            amount: actual,
            ts_ns,
            metadata,
        });
        self.commit(staged)?;
        Ok(actual)
    }

    pub fn credit_balance(&self, id: &AccountId, amount: i64, op_type: LedgerOpType, op_id: &str, ts_ns: TimestampNs, metadata: serde_json::Value) -> Result<(), SwarmError> {
        let mut account = self.db.get_account(id)?.unwrap_or_else(|| Account::new(*id, 0));
        account.balance += amount;

        let mut staged = StagedMutations::default();
        staged.accounts.push(account);
        staged.ops.push(LedgerOp {
            op_id: op_id.to_string(),
            op_type,
            account: *id,
            amount,
            ts_ns,
            metadata,
        });
        self.commit(staged)
    }

    pub fn audit(&self, filter: &AuditFilter) -> Result<Vec<LedgerOp>, SwarmError> {
        audit::audit(&self.db, filter)
    }

    pub(crate) fn db(&self) -> &LedgerDb {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> Ledger {
        Ledger::new(LedgerDb::temporary().unwrap())
    }

    #[test]
    fn transfer_moves_balance_and_conserves_total() {
        let l = ledger();
        let a = AccountId::from_bytes([1; 32]);
        let b = AccountId::from_bytes([2; 32]);
        l.create_account(a, 100).unwrap();
        l.create_account(b, 0).unwrap();
        l.transfer(&a, &b, 40, "op1", 0).unwrap();
        assert_eq!(l.get_balance(&a).unwrap(), 60);
        assert_eq!(l.get_balance(&b).unwrap(), 40);
    }

    #[test]
    fn transfer_insufficient_balance_rejected() {
        let l = ledger();
        let a = AccountId::from_bytes([1; 32]);
        let b = AccountId::from_bytes([2; 32]);
        l.create_account(a, 10).unwrap();
        l.create_account(b, 0).unwrap();
        assert!(l.transfer(&a, &b, 40, "op1", 0).is_err());
    }

    #[test]
    fn escrow_release_round_trip() {
        let l = ledger();
        let a = AccountId::from_bytes([1; 32]);
        let b = AccountId::from_bytes([2; 32]);
        l.create_account(a, 100).unwrap();
        l.create_account(b, 0).unwrap();
        l.escrow(&a, 30, "task-1", "escrow-1", 0).unwrap();
        assert_eq!(l.get_balance(&a).unwrap(), 70);
        l.release_escrow("escrow-1", &b, 0).unwrap();
        assert_eq!(l.get_balance(&b).unwrap(), 30);
        assert!(l.release_escrow("escrow-1", &b, 0).is_err());
    }

    #[test]
    fn escrow_cancel_refunds_depositor() {
        let l = ledger();
        let a = AccountId::from_bytes([1; 32]);
        l.create_account(a, 100).unwrap();
        l.escrow(&a, 30, "task-1", "escrow-1", 0).unwrap();
        l.cancel_escrow("escrow-1", 0).unwrap();
        assert_eq!(l.get_balance(&a).unwrap(), 100);
        assert!(l.cancel_escrow("escrow-1", 0).is_err());
    }

    #[test]
    fn mint_then_burn_changes_conserved_total_only_explicitly() {
        let l = ledger();
        let a = AccountId::from_bytes([1; 32]);
        l.create_account(a, 0).unwrap();
        l.mint(a, 50, "mint1", 0).unwrap();
        assert_eq!(l.get_balance(&a).unwrap(), 50);
    }
}
