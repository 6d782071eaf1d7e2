use std::path::Path;

use swarmx_core::{Account, AccountId, Escrow, Stake, SwarmError, VerifierRecord};

/// Persistent ledger database backed by sled, one named tree per entity.
///
/// Named trees:
///   accounts    — AccountId bytes → bincode(Account)
///   escrows     — escrow_id utf8  → bincode(Escrow)
///   stakes      — AccountId bytes → bincode(Stake)
///   verifiers   — AccountId bytes → bincode(VerifierRecord)
///   reputation  — AccountId bytes || be(seq) → bincode(ReputationEvent)
///   audit_log   — be(ts_ns) || op_id utf8 → bincode(LedgerOp)
pub struct LedgerDb {
    _db: sled::Db,
    pub(crate) accounts: sled::Tree,
    pub(crate) escrows: sled::Tree,
    pub(crate) stakes: sled::Tree,
    pub(crate) verifiers: sled::Tree,
    pub(crate) reputation: sled::Tree,
    pub(crate) audit_log: sled::Tree,
}

fn storage_err(e: impl std::fmt::Display) -> SwarmError {
    SwarmError::Other(e.to_string())
}

impl LedgerDb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SwarmError> {
        let db = sled::open(path).map_err(storage_err)?;
        Self::from_db(db)
    }

    pub fn temporary() -> Result<Self, SwarmError> {
        let db = sled::Config::new().temporary(true).open().map_err(storage_err)?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, SwarmError> {
        let accounts = db.open_tree("accounts").map_err(storage_err)?;
        let escrows = db.open_tree("escrows").map_err(storage_err)?;
        let stakes = db.open_tree("stakes").map_err(storage_err)?;
        let verifiers = db.open_tree("verifiers").map_err(storage_err)?;
        let reputation = db.open_tree("reputation").map_err(storage_err)?;
        let audit_log = db.open_tree("audit_log").map_err(storage_err)?;
        Ok(Self { _db: db, accounts, escrows, stakes, verifiers, reputation, audit_log })
    }

    pub fn get_account(&self, id: &AccountId) -> Result<Option<Account>, SwarmError> {
        match self.accounts.get(id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(storage_err)?)),
            None => Ok(None),
        }
    }

    pub fn put_account(&self, account: &Account) -> Result<(), SwarmError> {
        let bytes = bincode::serialize(account).map_err(storage_err)?;
        self.accounts.insert(account.id.as_bytes(), bytes).map_err(storage_err)?;
        Ok(())
    }

    pub fn account_exists(&self, id: &AccountId) -> bool {
        self.accounts.contains_key(id.as_bytes()).unwrap_or(false)
    }

    pub fn get_escrow(&self, escrow_id: &str) -> Result<Option<Escrow>, SwarmError> {
        match self.escrows.get(escrow_id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(storage_err)?)),
            None => Ok(None),
        }
    }

    pub fn put_escrow(&self, escrow: &Escrow) -> Result<(), SwarmError> {
        let bytes = bincode::serialize(escrow).map_err(storage_err)?;
        self.escrows.insert(escrow.escrow_id.as_bytes(), bytes).map_err(storage_err)?;
        Ok(())
    }

    pub fn get_stake(&self, id: &AccountId) -> Result<Option<Stake>, SwarmError> {
        match self.stakes.get(id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(storage_err)?)),
            None => Ok(None),
        }
    }

    pub fn put_stake(&self, id: &AccountId, stake: &Stake) -> Result<(), SwarmError> {
        let bytes = bincode::serialize(stake).map_err(storage_err)?;
        self.stakes.insert(id.as_bytes(), bytes).map_err(storage_err)?;
        Ok(())
    }

    pub fn get_verifier(&self, id: &AccountId) -> Result<Option<VerifierRecord>, SwarmError> {
        match self.verifiers.get(id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(storage_err)?)),
            None => Ok(None),
        }
    }

    pub fn put_verifier(&self, record: &VerifierRecord) -> Result<(), SwarmError> {
        let bytes = bincode::serialize(record).map_err(storage_err)?;
        self.verifiers.insert(record.did.as_bytes(), bytes).map_err(storage_err)?;
        Ok(())
    }

    pub fn all_verifiers(&self) -> Result<Vec<VerifierRecord>, SwarmError> {
        let mut out = Vec::new();
        for entry in self.verifiers.iter() {
            let (_, bytes) = entry.map_err(storage_err)?;
            out.push(bincode::deserialize(&bytes).map_err(storage_err)?);
        }
        Ok(out)
    }
}
