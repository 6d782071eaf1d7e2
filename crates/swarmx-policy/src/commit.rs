use swarmx_core::ProtocolConfig;

use crate::result::PolicyResult;

/// Resource bounds claimed at PROPOSE/DECIDE time, checked against
/// telemetry before ATTEST (§4.6).
#[derive(Clone, Copy, Debug, Default)]
pub struct ResourceClaim {
    pub cpu_ms: u64,
    pub memory_mb: u64,
    pub gas: u64,
}

/// Runs before ATTEST: rejects if any actual measurement exceeds
/// `claimed * (1 + margin)`.
#[derive(Default)]
pub struct CommitGate;

impl CommitGate {
    pub fn new() -> Self {
        Self
    }

    pub fn check(&self, claimed: ResourceClaim, actual: ResourceClaim, config: &ProtocolConfig) -> PolicyResult {
        let margin = config.commit_gate_margin;
        let mut reasons = Vec::new();

        check_bound("cpu_ms", claimed.cpu_ms, actual.cpu_ms, margin, &mut reasons);
        check_bound("memory_mb", claimed.memory_mb, actual.memory_mb, margin, &mut reasons);
        check_bound("gas", claimed.gas, actual.gas, margin, &mut reasons);

        if reasons.is_empty() {
            PolicyResult::allow(crate::preflight::POLICY_VERSION, 0)
        } else {
            PolicyResult {
                allowed: false,
                reasons,
                policy_version: crate::preflight::POLICY_VERSION.to_string(),
                gas_used: 0,
            }
        }
    }
}

fn check_bound(name: &str, claimed: u64, actual: u64, margin: f64, reasons: &mut Vec<String>) {
    let limit = (claimed as f64) * (1.0 + margin);
    if (actual as f64) > limit {
        reasons.push(format!("{name} exceeded claimed bound: actual={actual} claimed={claimed} margin={margin}"));
    }
}
