use thiserror::Error;

/// Error kinds, not an exception hierarchy: every fallible operation in the
/// workspace returns `Result<T, SwarmError>` and propagates it explicitly
/// with `?` (design note, §9 "Exceptions for control flow").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SwarmError {
    // ── Envelope / signature / clock ─────────────────────────────────────────
    #[error("invalid signature")]
    InvalidSignature,

    #[error("payload hash mismatch")]
    PayloadHashMismatch,

    #[error("clock regression: sender's lamport went backward in thread")]
    ClockRegression,

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    // ── Policy ───────────────────────────────────────────────────────────────
    #[error("policy denied: {0}")]
    PolicyDenied(String),

    #[error("gas exhausted")]
    GasExhausted,

    // ── Ledger ───────────────────────────────────────────────────────────────
    #[error("insufficient balance: need {need}, have {have}")]
    InsufficientBalance { need: i64, have: i64 },

    #[error("account already exists: {0}")]
    AccountExists(String),

    #[error("escrow not found: {0}")]
    EscrowNotFound(String),

    #[error("escrow already released or cancelled: {0}")]
    EscrowAlreadyReleased(String),

    // ── Stake / verifier pool ────────────────────────────────────────────────
    #[error("stake mismatch: claimed {claimed}, actual {actual}")]
    StakeMismatch { claimed: i64, actual: i64 },

    #[error("insufficient stake: need {need}, have {have}")]
    InsufficientStake { need: i64, have: i64 },

    // ── Challenge ────────────────────────────────────────────────────────────
    #[error("bond too small: need at least {min}, got {got}")]
    BondTooSmall { min: i64, got: i64 },

    #[error("window closed")]
    WindowClosed,

    #[error("rate limited")]
    RateLimited,

    #[error("related-party conflict")]
    RelatedPartyConflict,

    #[error("challenge period has not elapsed")]
    ChallengePeriodNotElapsed,

    #[error("task has been invalidated")]
    TaskInvalidated,

    // ── Lease / auction ──────────────────────────────────────────────────────
    #[error("lease not found: {0}")]
    LeaseNotFound(String),

    #[error("worker mismatch: lease is held by another worker")]
    WorkerMismatch,

    // ── Plan / graph ─────────────────────────────────────────────────────────
    #[error("cycle detected")]
    CycleDetected,

    // ── Checkpoint / sync ─────────────────────────────────────────────────────
    #[error("quorum not met")]
    QuorumNotMet,

    #[error("checkpoint continuity broken")]
    CheckpointContinuityBroken,

    // ── Cross-shard dependencies ─────────────────────────────────────────────
    #[error("deadlock detected")]
    DeadlockDetected,

    // ── Generic ──────────────────────────────────────────────────────────────
    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl SwarmError {
    /// Maps an error kind to a process exit code, per spec §6/§7:
    /// 0 success, 1 generic failure, 2 policy/validation error,
    /// 3 ledger/conservation error.
    pub fn exit_code(&self) -> i32 {
        use SwarmError::*;
        match self {
            InvalidSignature
            | PayloadHashMismatch
            | ClockRegression
            | MalformedEnvelope(_)
            | PolicyDenied(_)
            | GasExhausted
            | CycleDetected
            | DeadlockDetected => 2,

            InsufficientBalance { .. }
            | AccountExists(_)
            | EscrowNotFound(_)
            | EscrowAlreadyReleased(_)
            | StakeMismatch { .. }
            | InsufficientStake { .. } => 3,

            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, SwarmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_spec_classes() {
        assert_eq!(SwarmError::InvalidSignature.exit_code(), 2);
        assert_eq!(
            SwarmError::InsufficientBalance { need: 1, have: 0 }.exit_code(),
            3
        );
        assert_eq!(SwarmError::LeaseNotFound("x".into()).exit_code(), 1);
    }
}
