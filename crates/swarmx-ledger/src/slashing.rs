use std::collections::HashSet;

use swarmx_core::{AccountId, ProtocolConfig, SwarmError, TimestampNs};

use crate::audit::LedgerOpType;
use crate::ledger::Ledger;
use crate::stake::StakePool;

/// Slashable violation types (§4.11), ported from
/// `original_source/src/economics/slashing.py::ViolationType`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ViolationType {
    FailedChallenge,
    MissedHeartbeat,
    PolicyViolation,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SlashEvent {
    pub event_id: String,
    pub account_id: AccountId,
    pub reason: ViolationType,
    pub amount: i64,
    pub evidence_hash: String,
    pub severity: u8,
    pub timestamp: TimestampNs,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct SlashVerifiersResult {
    pub total_slashed: i64,
    pub challenger_payout: i64,
    pub honest_payout: i64,
    pub burned: i64,
    pub events: Vec<SlashEvent>,
}

/// Calculation and execution of slashing penalties (§4.11), ported from
/// `original_source/src/economics/slashing.py::SlashingRules`.
pub struct SlashingEngine<'a> {
    ledger: &'a Ledger,
    stake_pool: StakePool<'a>,
}

impl<'a> SlashingEngine<'a> {
    pub fn new(ledger: &'a Ledger) -> Self {
        Self { ledger, stake_pool: StakePool::new(ledger) }
    }

    pub fn calculate_slash_amount(
        &self,
        account_id: &AccountId,
        violation_type: ViolationType,
        severity: u8,
        config: &ProtocolConfig,
    ) -> Result<i64, SwarmError> {
        if severity > 10 {
            return Err(SwarmError::Other(format!("severity must be 0-10, got {severity}")));
        }
        let staked = self.stake_pool.get_staked_amount(account_id)?;

        let amount = match violation_type {
            ViolationType::FailedChallenge => (staked as f64) * config.slash_failed_challenge_fraction,
            ViolationType::MissedHeartbeat => {
                let fraction = (severity.min(10) as f64 * config.slash_missed_heartbeat_per_severity).min(config.slash_missed_heartbeat_cap);
                (staked as f64) * fraction
            }
            ViolationType::PolicyViolation => (staked as f64) * (config.slash_policy_violation_base * (1.0 + severity as f64 / 10.0)),
        };
        Ok(amount as i64)
    }

    /// Reduces `locked` directly (burn); partial if stake is insufficient.
    pub fn execute_slash(&self, event: &SlashEvent, op_id: &str) -> Result<i64, SwarmError> {
        let staked = self.stake_pool.get_staked_amount(&event.account_id)?;
        let actual_slash = event.amount.min(staked);

        if actual_slash > 0 {
            self.ledger.burn_locked(
                &event.account_id,
                actual_slash,
                op_id,
                event.timestamp,
                serde_json::json!({
                    "event_id": event.event_id,
                    "reason": format!("{:?}", event.reason),
                    "severity": event.severity,
                    "evidence_hash": event.evidence_hash,
                }),
            )?;
        }
        Ok(actual_slash)
    }

    /// Slashes multiple verifiers and distributes the total using
    /// integer math: 50% challenger, 40% honest verifiers (split
    /// equally, remainder to the first by input order), 10% + rounding
    /// remainder burned. Claimed honest verifiers not present in
    /// `attestation_log` are dropped (free-rider guard).
    #[allow(clippy::too_many_arguments)]
    pub fn slash_verifiers(
        &self,
        verifiers: &[AccountId],
        challenge_evidence: &str,
        challenger: &AccountId,
        honest_verifiers: &[AccountId],
        attestation_log: &[AccountId],
        ts_ns: TimestampNs,
        config: &ProtocolConfig,
    ) -> Result<SlashVerifiersResult, SwarmError> {
        if verifiers.is_empty() {
            return Ok(SlashVerifiersResult::default());
        }

        let honest_verifiers: Vec<AccountId> = if !honest_verifiers.is_empty() && !attestation_log.is_empty() {
            let actual_attestors: HashSet<AccountId> = attestation_log.iter().copied().collect();
            honest_verifiers.iter().copied().filter(|v| actual_attestors.contains(v)).collect()
        } else {
            honest_verifiers.to_vec()
        };

        let mut events = Vec::new();
        let mut total_slashed: i64 = 0;

        for (i, verifier_id) in verifiers.iter().enumerate() {
            let amount = self.calculate_slash_amount(verifier_id, ViolationType::FailedChallenge, 10, config)?;
            let event = SlashEvent {
                event_id: format!("slash-{challenge_evidence}-{i}"),
                account_id: *verifier_id,
                reason: ViolationType::FailedChallenge,
                amount,
                evidence_hash: challenge_evidence.to_string(),
                severity: 10,
                timestamp: ts_ns,
            };
            let actual = self.execute_slash(&event, &format!("{}-exec", event.event_id))?;
            total_slashed += actual;
            events.push(event);
        }

        let challenger_payout = (total_slashed * config.challenger_payout_pct as i64) / 100;
        let honest_total = (total_slashed * config.honest_payout_pct as i64) / 100;
        let burned = total_slashed - challenger_payout - honest_total;
        debug_assert_eq!(challenger_payout + honest_total + burned, total_slashed);

        if challenger_payout > 0 {
            self.ledger.credit_balance(
                challenger,
                challenger_payout,
                LedgerOpType::SlashReward,
                &format!("slash-reward-challenger-{challenge_evidence}"),
                ts_ns,
                serde_json::json!({"reason": "challenge_upheld", "evidence_hash": challenge_evidence}),
            )?;
        }

        if honest_total > 0 && !honest_verifiers.is_empty() {
            let share = honest_total / honest_verifiers.len() as i64;
            let remainder = honest_total % honest_verifiers.len() as i64;
            for (i, verifier_id) in honest_verifiers.iter().enumerate() {
                let payout = share + if i == 0 { remainder } else { 0 };
                self.ledger.credit_balance(
                    verifier_id,
                    payout,
                    LedgerOpType::SlashReward,
                    &format!("slash-reward-honest-{challenge_evidence}-{i}"),
                    ts_ns,
                    serde_json::json!({"reason": "honest_verifier", "evidence_hash": challenge_evidence}),
                )?;
            }
        }

        Ok(SlashVerifiersResult { total_slashed, challenger_payout, honest_payout: honest_total, burned, events })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::LedgerDb;

    fn setup(stake_amount: i64) -> (Ledger, AccountId) {
        let ledger = Ledger::new(LedgerDb::temporary().unwrap());
        let verifier = AccountId::from_bytes([3; 32]);
        ledger.create_account(verifier, stake_amount).unwrap();
        StakePool::new(&ledger).stake(&verifier, stake_amount, "s1", 0).unwrap();
        (ledger, verifier)
    }

    #[test]
    fn failed_challenge_slashes_half_stake() {
        let (ledger, verifier) = setup(1000);
        let engine = SlashingEngine::new(&ledger);
        let config = swarmx_core::ProtocolConfig::default();
        let amount = engine.calculate_slash_amount(&verifier, ViolationType::FailedChallenge, 10, &config).unwrap();
        assert_eq!(amount, 500);
    }

    #[test]
    fn slash_verifiers_distributes_exactly() {
        let (ledger, verifier) = setup(1000);
        let challenger = AccountId::from_bytes([4; 32]);
        ledger.create_account(challenger, 0).unwrap();
        let engine = SlashingEngine::new(&ledger);
        let config = swarmx_core::ProtocolConfig::default();

        let result = engine
            .slash_verifiers(&[verifier], "ev-hash", &challenger, &[], &[], 0, &config)
            .unwrap();

        assert_eq!(result.total_slashed, 500);
        assert_eq!(result.challenger_payout, 250);
        assert_eq!(result.honest_payout, 200);
        assert_eq!(result.burned, 50);
        assert_eq!(result.challenger_payout + result.honest_payout + result.burned, result.total_slashed);
        assert_eq!(ledger.get_balance(&challenger).unwrap(), 250);
    }

    #[test]
    fn free_rider_dropped_from_honest_rewards() {
        let (ledger, verifier) = setup(1000);
        let challenger = AccountId::from_bytes([4; 32]);
        let honest_attestor = AccountId::from_bytes([5; 32]);
        let free_rider = AccountId::from_bytes([6; 32]);
        ledger.create_account(challenger, 0).unwrap();
        ledger.create_account(honest_attestor, 0).unwrap();
        ledger.create_account(free_rider, 0).unwrap();

        let engine = SlashingEngine::new(&ledger);
        let config = swarmx_core::ProtocolConfig::default();
        let result = engine
            .slash_verifiers(
                &[verifier],
                "ev-hash",
                &challenger,
                &[honest_attestor, free_rider],
                &[honest_attestor],
                0,
                &config,
            )
            .unwrap();

        assert_eq!(result.honest_payout, 200);
        assert_eq!(ledger.get_balance(&honest_attestor).unwrap(), 200);
        assert_eq!(ledger.get_balance(&free_rider).unwrap(), 0);
    }
}
