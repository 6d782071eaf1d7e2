use std::path::Path;

use swarmx_core::{Lease, SwarmError, TaskId, TimestampNs};

fn storage_err(e: impl std::fmt::Display) -> SwarmError {
    SwarmError::Other(e.to_string())
}

/// Why a lease was released, carried through to the RELEASE envelope the
/// caller publishes (§4.8).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReleaseReason {
    HeartbeatMiss,
    Timeout,
    VoluntaryYield,
}

/// Lease persistence, ported from `original_source/src/leases/manager.py`
/// onto a `sled` tree keyed by `lease_id` instead of SQLite — same method
/// names and semantics (`create_lease`, `renew_lease`, `heartbeat`,
/// `check_expiry`, `get_lease`, `get_leases_for_worker`,
/// `scavenge_expired`, `delete_lease`).
pub struct LeaseManager {
    _db: sled::Db,
    leases: sled::Tree,
}

impl LeaseManager {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SwarmError> {
        let db = sled::open(path).map_err(storage_err)?;
        Self::from_db(db)
    }

    pub fn temporary() -> Result<Self, SwarmError> {
        let db = sled::Config::new().temporary(true).open().map_err(storage_err)?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, SwarmError> {
        let leases = db.open_tree("leases").map_err(storage_err)?;
        Ok(Self { _db: db, leases })
    }

    fn put(&self, lease: &Lease) -> Result<(), SwarmError> {
        let bytes = bincode::serialize(lease).map_err(storage_err)?;
        self.leases.insert(lease.lease_id.as_bytes(), bytes).map_err(storage_err)?;
        Ok(())
    }

    pub fn create_lease(&self, task_id: TaskId, worker_id: &str, ttl_s: u64, hb_interval_s: u64, now_ns: TimestampNs) -> Result<String, SwarmError> {
        let lease_id = uuid::Uuid::new_v4().to_string();
        let lease = Lease {
            lease_id: lease_id.clone(),
            task_id,
            worker_id: worker_id.to_string(),
            ttl_s,
            created_ns: now_ns,
            last_hb_ns: now_ns,
            hb_interval_s,
        };
        self.put(&lease)?;
        Ok(lease_id)
    }

    pub fn get_lease(&self, lease_id: &str) -> Result<Option<Lease>, SwarmError> {
        match self.leases.get(lease_id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(storage_err)?)),
            None => Ok(None),
        }
    }

    /// Resets `created_ns`/`last_hb_ns` to `now_ns`, mirroring the
    /// source's `renew_lease`.
    pub fn renew_lease(&self, lease_id: &str, now_ns: TimestampNs) -> Result<(), SwarmError> {
        let mut lease = self.get_lease(lease_id)?.ok_or_else(|| SwarmError::LeaseNotFound(lease_id.to_string()))?;
        lease.created_ns = now_ns;
        lease.last_hb_ns = now_ns;
        self.put(&lease)
    }

    pub fn heartbeat(&self, lease_id: &str, now_ns: TimestampNs) -> Result<(), SwarmError> {
        let mut lease = self.get_lease(lease_id)?.ok_or_else(|| SwarmError::LeaseNotFound(lease_id.to_string()))?;
        lease.last_hb_ns = now_ns;
        self.put(&lease)
    }

    /// Lease ids past full TTL (`now > created_ns + ttl_s`).
    pub fn check_expiry(&self, now_ns: TimestampNs) -> Result<Vec<String>, SwarmError> {
        let mut out = Vec::new();
        for entry in self.leases.iter() {
            let (_, bytes) = entry.map_err(storage_err)?;
            let lease: Lease = bincode::deserialize(&bytes).map_err(storage_err)?;
            if lease.is_expired(now_ns) {
                out.push(lease.lease_id);
            }
        }
        Ok(out)
    }

    pub fn get_leases_for_worker(&self, worker_id: &str) -> Result<Vec<Lease>, SwarmError> {
        let mut out = Vec::new();
        for entry in self.leases.iter() {
            let (_, bytes) = entry.map_err(storage_err)?;
            let lease: Lease = bincode::deserialize(&bytes).map_err(storage_err)?;
            if lease.worker_id == worker_id {
                out.push(lease);
            }
        }
        out.sort_by(|a, b| b.created_ns.cmp(&a.created_ns));
        Ok(out)
    }

    pub fn delete_lease(&self, lease_id: &str) -> Result<bool, SwarmError> {
        let existed = self.leases.remove(lease_id.as_bytes()).map_err(storage_err)?.is_some();
        Ok(existed)
    }

    /// Combines `check_expiry` with deletion, for the background daemon.
    pub fn scavenge_expired(&self, now_ns: TimestampNs) -> Result<Vec<String>, SwarmError> {
        let expired = self.check_expiry(now_ns)?;
        for lease_id in &expired {
            self.delete_lease(lease_id)?;
        }
        Ok(expired)
    }

    /// Scans for leases whose worker has missed a heartbeat
    /// (`now > last_hb_ns + hb_interval_s`) but have not yet hit full TTL,
    /// deleting each and tagging the release reason. Full-TTL expiry takes
    /// precedence over a heartbeat miss when both are true.
    pub fn scavenge_due_releases(&self, now_ns: TimestampNs) -> Result<Vec<(Lease, ReleaseReason)>, SwarmError> {
        let mut due = Vec::new();
        for entry in self.leases.iter() {
            let (_, bytes) = entry.map_err(storage_err)?;
            let lease: Lease = bincode::deserialize(&bytes).map_err(storage_err)?;
            let reason = if lease.is_expired(now_ns) {
                Some(ReleaseReason::Timeout)
            } else if lease.heartbeat_missed(now_ns) {
                Some(ReleaseReason::HeartbeatMiss)
            } else {
                None
            };
            if let Some(reason) = reason {
                due.push((lease, reason));
            }
        }
        for (lease, _) in &due {
            self.delete_lease(&lease.lease_id)?;
        }
        Ok(due)
    }

    /// Voluntary release: deletes the lease immediately and hands back the
    /// prior record so the caller can publish RELEASE(reason=voluntary_yield).
    pub fn yield_lease(&self, lease_id: &str) -> Result<Lease, SwarmError> {
        let lease = self.get_lease(lease_id)?.ok_or_else(|| SwarmError::LeaseNotFound(lease_id.to_string()))?;
        self.delete_lease(lease_id)?;
        Ok(lease)
    }

    /// A lease holds exclusivity (§4.8): reject `worker_id`'s attempt to
    /// act on `task_id` if a different worker already holds a non-expired
    /// lease over it.
    pub fn check_exclusivity(&self, task_id: &TaskId, worker_id: &str, now_ns: TimestampNs) -> Result<(), SwarmError> {
        for entry in self.leases.iter() {
            let (_, bytes) = entry.map_err(storage_err)?;
            let lease: Lease = bincode::deserialize(&bytes).map_err(storage_err)?;
            if lease.task_id == *task_id && !lease.is_expired(now_ns) && lease.worker_id != worker_id {
                return Err(SwarmError::WorkerMismatch);
            }
        }
        Ok(())
    }
}
