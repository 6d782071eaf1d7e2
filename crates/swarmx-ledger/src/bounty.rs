use swarmx_core::{AccountId, Complexity, ProtocolConfig, SwarmError, TimestampNs, VerifierMetadata};

use crate::audit::LedgerOpType;
use crate::ledger::Ledger;

/// Bounty payout for a FINAL task (§4.11).
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct BountyPayout {
    pub committee_payout: i64,
    pub challenger_payout: i64,
    pub burned: i64,
}

fn bounty_cap(complexity: Complexity, config: &ProtocolConfig) -> i64 {
    match complexity {
        Complexity::Simple => config.bounty_cap_simple,
        Complexity::Moderate => config.bounty_cap_complex,
        Complexity::Complex => config.bounty_cap_critical,
    }
}

/// True if `challenger` shares an org, ASN, or identity hash with any
/// committee member — grounds `RelatedPartyConflict` (§4.11).
pub fn related_party_conflict(challenger: &VerifierMetadata, committee: &[VerifierMetadata]) -> bool {
    committee.iter().any(|member| {
        (challenger.org_id.is_some() && challenger.org_id == member.org_id)
            || (challenger.asn.is_some() && challenger.asn == member.asn)
            || (challenger.identity_hash.is_some() && challenger.identity_hash == member.identity_hash)
    })
}

pub struct BountyEngine<'a> {
    ledger: &'a Ledger,
}

impl<'a> BountyEngine<'a> {
    pub fn new(ledger: &'a Ledger) -> Self {
        Self { ledger }
    }

    /// Pays out a bounty of `amount` (already capped by the caller's
    /// task class) to `committee`, optionally splitting with
    /// `challenger` if a challenge was raised and upheld.
    #[allow(clippy::too_many_arguments)]
    pub fn payout(
        &self,
        amount: i64,
        complexity: Complexity,
        committee: &[AccountId],
        committee_metadata: &[VerifierMetadata],
        challenger: Option<(&AccountId, &VerifierMetadata)>,
        completion_ts: TimestampNs,
        now_ns: TimestampNs,
        task_invalidated: bool,
        config: &ProtocolConfig,
    ) -> Result<BountyPayout, SwarmError> {
        if task_invalidated {
            return Err(SwarmError::TaskInvalidated);
        }

        let challenge_period_ns = (config.default_t_challenge_s as i64) * config.challenge_period_multiplier as i64 * 1_000_000_000;
        if now_ns - completion_ts < challenge_period_ns {
            return Err(SwarmError::ChallengePeriodNotElapsed);
        }

        let cap = bounty_cap(complexity, config);
        let amount = amount.min(cap);

        if let Some((challenger_id, challenger_meta)) = challenger {
            if committee.contains(challenger_id) || related_party_conflict(challenger_meta, committee_metadata) {
                return Err(SwarmError::RelatedPartyConflict);
            }
        }

        let result = match challenger {
            None => {
                self.distribute_equally(committee, amount, now_ns, "bounty_no_challenge")?;
                BountyPayout { committee_payout: amount, challenger_payout: 0, burned: 0 }
            }
            Some((challenger_id, _)) => {
                let challenger_payout = (amount * config.challenger_payout_pct as i64) / 100;
                let committee_total = (amount * config.honest_payout_pct as i64) / 100;
                let burned = amount - challenger_payout - committee_total;

                self.ledger.credit_balance(
                    challenger_id,
                    challenger_payout,
                    LedgerOpType::Bounty,
                    &format!("bounty-challenger-{now_ns}"),
                    now_ns,
                    serde_json::json!({"reason": "bounty_challenged"}),
                )?;
                self.distribute_equally(committee, committee_total, now_ns, "bounty_committee_split")?;

                BountyPayout { committee_payout: committee_total, challenger_payout, burned }
            }
        };

        Ok(result)
    }

    fn distribute_equally(&self, committee: &[AccountId], total: i64, ts_ns: TimestampNs, reason: &str) -> Result<(), SwarmError> {
        if committee.is_empty() || total == 0 {
            return Ok(());
        }
        let share = total / committee.len() as i64;
        let remainder = total % committee.len() as i64;
        for (i, member) in committee.iter().enumerate() {
            let payout = share + if i == 0 { remainder } else { 0 };
            self.ledger.credit_balance(
                member,
                payout,
                LedgerOpType::Bounty,
                &format!("{reason}-{ts_ns}-{i}"),
                ts_ns,
                serde_json::json!({"reason": reason}),
            )?;
        }
        Ok(())
    }
}

/// K_result escalation on challenges (§4.11): a single upheld challenge
/// increments K by 2; multiple upheld challenges double K, capped at the
/// active verifier count.
pub fn escalate_k(current_k: u32, upheld_count: u32, active_verifiers: u32) -> u32 {
    if upheld_count == 0 {
        current_k
    } else if upheld_count == 1 {
        current_k + 2
    } else {
        active_verifiers.min(2 * current_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::LedgerDb;

    fn meta(org_id: Option<&str>, asn: Option<u32>) -> VerifierMetadata {
        VerifierMetadata { org_id: org_id.map(String::from), asn, region: None, identity_hash: None, reputation: 0.5, tee_verified: false }
    }

    #[test]
    fn no_challenge_splits_equally_with_remainder_to_first() {
        let ledger = Ledger::new(LedgerDb::temporary().unwrap());
        let a = AccountId::from_bytes([1; 32]);
        let b = AccountId::from_bytes([2; 32]);
        let c = AccountId::from_bytes([3; 32]);
        for id in [a, b, c] {
            ledger.create_account(id, 0).unwrap();
        }
        let config = ProtocolConfig::default();
        let engine = BountyEngine::new(&ledger);
        let committee = vec![a, b, c];
        let committee_meta = vec![meta(None, None), meta(None, None), meta(None, None)];

        engine
            .payout(10, Complexity::Simple, &committee, &committee_meta, None, 0, 100_000_000_000_000, false, &config)
            .unwrap();

        assert_eq!(ledger.get_balance(&a).unwrap(), 4);
        assert_eq!(ledger.get_balance(&b).unwrap(), 3);
        assert_eq!(ledger.get_balance(&c).unwrap(), 3);
    }

    #[test]
    fn related_party_challenger_blocked() {
        let ledger = Ledger::new(LedgerDb::temporary().unwrap());
        let a = AccountId::from_bytes([1; 32]);
        let challenger = AccountId::from_bytes([9; 32]);
        ledger.create_account(a, 0).unwrap();
        ledger.create_account(challenger, 0).unwrap();
        let config = ProtocolConfig::default();
        let engine = BountyEngine::new(&ledger);

        let committee_meta = vec![meta(Some("org-1"), None)];
        let challenger_meta = meta(Some("org-1"), None);

        let result = engine.payout(
            10,
            Complexity::Simple,
            &[a],
            &committee_meta,
            Some((&challenger, &challenger_meta)),
            0,
            100_000_000_000_000,
            false,
            &config,
        );
        assert_eq!(result, Err(SwarmError::RelatedPartyConflict));
    }

    #[test]
    fn identity_linked_challenger_blocked() {
        let ledger = Ledger::new(LedgerDb::temporary().unwrap());
        let a = AccountId::from_bytes([1; 32]);
        let challenger = AccountId::from_bytes([9; 32]);
        ledger.create_account(a, 0).unwrap();
        ledger.create_account(challenger, 0).unwrap();
        let config = ProtocolConfig::default();
        let engine = BountyEngine::new(&ledger);

        let mut committee_meta = meta(None, None);
        committee_meta.identity_hash = Some("abc123def456".to_string());
        let mut challenger_meta = meta(None, None);
        challenger_meta.identity_hash = Some("abc123def456".to_string());

        let result = engine.payout(
            10,
            Complexity::Simple,
            &[a],
            &[committee_meta],
            Some((&challenger, &challenger_meta)),
            0,
            100_000_000_000_000,
            false,
            &config,
        );
        assert_eq!(result, Err(SwarmError::RelatedPartyConflict));
    }

    #[test]
    fn committee_member_challenging_own_task_blocked() {
        let ledger = Ledger::new(LedgerDb::temporary().unwrap());
        let a = AccountId::from_bytes([1; 32]);
        ledger.create_account(a, 0).unwrap();
        let config = ProtocolConfig::default();
        let engine = BountyEngine::new(&ledger);

        let committee_meta = vec![meta(None, None)];
        let challenger_meta = meta(None, None);

        let result = engine.payout(
            10,
            Complexity::Simple,
            &[a],
            &committee_meta,
            Some((&a, &challenger_meta)),
            0,
            100_000_000_000_000,
            false,
            &config,
        );
        assert_eq!(result, Err(SwarmError::RelatedPartyConflict));
    }

    #[test]
    fn challenge_period_not_elapsed_blocks_payout() {
        let ledger = Ledger::new(LedgerDb::temporary().unwrap());
        let a = AccountId::from_bytes([1; 32]);
        ledger.create_account(a, 0).unwrap();
        let config = ProtocolConfig::default();
        let engine = BountyEngine::new(&ledger);
        let result = engine.payout(10, Complexity::Simple, &[a], &[meta(None, None)], None, 0, 1, false, &config);
        assert_eq!(result, Err(SwarmError::ChallengePeriodNotElapsed));
    }

    #[test]
    fn k_escalation_rules() {
        assert_eq!(escalate_k(5, 0, 20), 5);
        assert_eq!(escalate_k(5, 1, 20), 7);
        assert_eq!(escalate_k(5, 2, 20), 10);
        assert_eq!(escalate_k(5, 3, 8), 8);
    }
}
