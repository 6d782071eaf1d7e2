use swarmx_core::{ProtocolConfig, TimestampNs};

/// Effective quorum size given the number of currently active verifiers
/// (spec §4.9): `K=1` below `bootstrap_verifier_threshold`, otherwise
/// `min(quorum_k_target, max(2, floor(0.3 * active_verifiers)))`.
pub fn effective_quorum_k(active_verifiers: usize, config: &ProtocolConfig) -> u32 {
    if active_verifiers < config.bootstrap_verifier_threshold {
        return 1;
    }
    let scaled = (0.3 * active_verifiers as f64).floor() as u32;
    config.quorum_k_target.min(scaled.max(2))
}

/// Tracks whether the network has sustained enough verifiers for long
/// enough to exit bootstrap mode. Exit requires the active count to stay
/// at or above `bootstrap_verifier_threshold` continuously for
/// `bootstrap_sustain_hours`; any dip below the threshold resets the
/// clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct BootstrapTracker {
    above_threshold_since_ns: Option<TimestampNs>,
}

impl BootstrapTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the latest active-verifier count and returns whether the
    /// network is still in bootstrap mode.
    pub fn observe(&mut self, active_verifiers: usize, now_ns: TimestampNs, config: &ProtocolConfig) -> bool {
        if active_verifiers >= config.bootstrap_verifier_threshold {
            let since = *self.above_threshold_since_ns.get_or_insert(now_ns);
            let sustained_s = (now_ns - since) as f64 / 1_000_000_000.0;
            let sustained_h = sustained_s / 3600.0;
            sustained_h < config.bootstrap_sustain_hours as f64
        } else {
            self.above_threshold_since_ns = None;
            true
        }
    }
}

/// Challenge rewards are doubled while bootstrap mode is active (§4.9).
pub fn challenge_reward_multiplier(in_bootstrap: bool, config: &ProtocolConfig) -> f64 {
    if in_bootstrap { config.bootstrap_challenge_reward_multiplier } else { 1.0 }
}
