//! Challenge/verification pipeline (§4.10): bond calculation, the
//! deterministic per-proof-type verifier, the bond-ordered challenge
//! queue, verdict aggregation with escalation, and challenger abuse
//! controls.

pub mod abuse;
pub mod bond;
pub mod proof;
pub mod queue;
pub mod verdict;

pub use abuse::AbuseTracker;
pub use bond::required_bond;
pub use proof::{ChallengeVerifier, VerificationResult};
pub use queue::ChallengeQueue;
pub use verdict::{aggregate_verdicts, next_escalation_level, EscalationLevel, Resolution, Verdict};
