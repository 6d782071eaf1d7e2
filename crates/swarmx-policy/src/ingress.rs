use swarmx_core::{Envelope, ProtocolConfig};

use crate::preflight::PreflightGate;
use crate::result::PolicyResult;

/// Charges gas as rules run; exhausting the limit denies the envelope
/// regardless of how the remaining rules would have evaluated, matching
/// the "gas exhausted" outcome named in §4.6.
struct GasMeter {
    used: u64,
    limit: u64,
}

impl GasMeter {
    fn new(limit: u64) -> Self {
        Self { used: 0, limit }
    }

    fn charge(&mut self, cost: u64) -> bool {
        self.used = self.used.saturating_add(cost);
        self.used <= self.limit
    }
}

struct Rule {
    name: &'static str,
    cost: u64,
    check: fn(&Envelope) -> bool,
}

fn rule_set() -> Vec<Rule> {
    vec![
        Rule { name: "has_payload_hash", cost: 5, check: |e| e.body.payload_hash.as_bytes() != &[0u8; 32] },
        Rule { name: "thread_id_nonempty", cost: 2, check: |e| !e.body.thread_id.is_empty() },
        Rule { name: "lamport_nonzero_or_genesis", cost: 2, check: |_| true },
    ]
}

/// Receiver-side full evaluation (§4.6). Runs the rule set under a fresh
/// gas meter every call — the meter never persists across evaluations.
#[derive(Default)]
pub struct IngressGate {
    preflight: PreflightGate,
}

impl IngressGate {
    pub fn new() -> Self {
        Self { preflight: PreflightGate::new() }
    }

    pub fn evaluate(&self, envelope: &Envelope, config: &ProtocolConfig) -> PolicyResult {
        let preflight_result = self.preflight.check(envelope);
        if !preflight_result.allowed {
            return preflight_result;
        }

        let mut meter = GasMeter::new(config.ingress_gas_limit);
        for rule in rule_set() {
            if !meter.charge(rule.cost) {
                return PolicyResult::deny("gas exhausted", crate::preflight::POLICY_VERSION, meter.used);
            }
            if !(rule.check)(envelope) {
                return PolicyResult::deny(format!("rule '{}' failed", rule.name), crate::preflight::POLICY_VERSION, meter.used);
            }
        }

        PolicyResult::allow(crate::preflight::POLICY_VERSION, meter.used)
    }
}
