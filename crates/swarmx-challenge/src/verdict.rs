use swarmx_core::ProtocolConfig;

/// One verifier's judgment on a challenge, carrying its confidence in
/// `[0,1]` (spec §4.10).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Verdict {
    pub upheld: bool,
    pub confidence: f64,
}

/// Escalation ladder a disputed or high-stakes challenge climbs; terminal
/// levels park the challenge for the out-of-scope human review/governance
/// surface (§1) rather than resolving it automatically.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EscalationLevel {
    VerifierConsensus,
    HumanReview,
    GovernanceVote,
}

/// Outcome of aggregating a consensus committee's verdicts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Resolution {
    Upheld,
    Rejected,
    Escalate(EscalationLevel),
}

/// Aggregates a K_result committee's verdicts per §4.10: escalate on
/// disagreement, low average confidence, or a high-value bond; otherwise
/// resolve by majority.
pub fn aggregate_verdicts(verdicts: &[Verdict], bond_amount: i64, config: &ProtocolConfig) -> Resolution {
    assert!(!verdicts.is_empty(), "aggregate_verdicts requires at least one verdict");

    let all_agree = verdicts.iter().all(|v| v.upheld == verdicts[0].upheld);
    let avg_confidence = verdicts.iter().map(|v| v.confidence).sum::<f64>() / verdicts.len() as f64;
    let high_value = bond_amount >= config.high_value_bond_threshold;

    if !all_agree || avg_confidence < config.verdict_confidence_threshold || high_value {
        return Resolution::Escalate(EscalationLevel::VerifierConsensus);
    }

    if verdicts[0].upheld {
        Resolution::Upheld
    } else {
        Resolution::Rejected
    }
}

/// Advances a challenge that failed to reach consensus at the current
/// committee size to the next escalation level.
pub fn next_escalation_level(current: EscalationLevel) -> EscalationLevel {
    match current {
        EscalationLevel::VerifierConsensus => EscalationLevel::HumanReview,
        EscalationLevel::HumanReview => EscalationLevel::GovernanceVote,
        EscalationLevel::GovernanceVote => EscalationLevel::GovernanceVote,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProtocolConfig {
        ProtocolConfig::default()
    }

    #[test]
    fn unanimous_high_confidence_resolves_directly() {
        let verdicts = [Verdict { upheld: true, confidence: 0.9 }, Verdict { upheld: true, confidence: 0.95 }];
        assert_eq!(aggregate_verdicts(&verdicts, 10, &config()), Resolution::Upheld);
    }

    #[test]
    fn disagreement_escalates() {
        let verdicts = [Verdict { upheld: true, confidence: 0.9 }, Verdict { upheld: false, confidence: 0.9 }];
        assert_eq!(
            aggregate_verdicts(&verdicts, 10, &config()),
            Resolution::Escalate(EscalationLevel::VerifierConsensus)
        );
    }

    #[test]
    fn low_average_confidence_escalates() {
        let verdicts = [Verdict { upheld: true, confidence: 0.5 }, Verdict { upheld: true, confidence: 0.4 }];
        assert_eq!(
            aggregate_verdicts(&verdicts, 10, &config()),
            Resolution::Escalate(EscalationLevel::VerifierConsensus)
        );
    }

    #[test]
    fn high_value_bond_always_escalates() {
        let config = config();
        let verdicts = [Verdict { upheld: true, confidence: 1.0 }, Verdict { upheld: true, confidence: 1.0 }];
        assert_eq!(
            aggregate_verdicts(&verdicts, config.high_value_bond_threshold, &config),
            Resolution::Escalate(EscalationLevel::VerifierConsensus)
        );
    }

    #[test]
    fn escalation_ladder_climbs_then_terminates() {
        assert_eq!(next_escalation_level(EscalationLevel::VerifierConsensus), EscalationLevel::HumanReview);
        assert_eq!(next_escalation_level(EscalationLevel::HumanReview), EscalationLevel::GovernanceVote);
        assert_eq!(next_escalation_level(EscalationLevel::GovernanceVote), EscalationLevel::GovernanceVote);
    }
}
