use serde::{Deserialize, Serialize};

/// Every policy-ish constant the source hardcoded as a module-level literal
/// (auction window, anti-snipe threshold, commit-gate margin, slash
/// fractions, gas costs, ...). Resolves spec §9's first Open Question:
/// "make them configuration with the defaults above; do not bake into
/// types." No component below reads a raw literal for any of these; they
/// all take `&ProtocolConfig`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    // ── Auction (§4.9) ────────────────────────────────────────────────────
    pub auction_window_s: u64,
    pub auction_max_rounds: u32,
    pub anti_snipe_threshold_s: u64,
    pub anti_snipe_extension_s: u64,
    pub anti_snipe_max_extensions: u32,
    pub auction_weight_cost: f64,
    pub auction_weight_eta: f64,
    pub auction_weight_reputation: f64,
    pub auction_weight_capabilities: f64,
    pub auction_eta_horizon_s: f64,
    pub auction_cap_horizon: f64,

    // ── Bootstrap mode (§4.9) ────────────────────────────────────────────
    pub bootstrap_verifier_threshold: usize,
    pub bootstrap_sustain_hours: u64,
    pub bootstrap_challenge_reward_multiplier: f64,
    pub quorum_k_target: u32,

    // ── Backoff (§5) ──────────────────────────────────────────────────────
    pub backoff_base_s: f64,
    pub backoff_max_s: f64,
    pub backoff_jitter_s: f64,

    // ── Policy gates (§4.6) ──────────────────────────────────────────────
    pub commit_gate_margin: f64,
    pub max_payload_size_bytes: usize,
    pub ingress_gas_limit: u64,

    // ── Lease / heartbeat (§4.8) ─────────────────────────────────────────
    pub default_lease_ttl_s: u64,
    pub default_heartbeat_interval_s: u64,

    // ── Challenge (§4.10) ────────────────────────────────────────────────
    pub challenge_window_s: u64,
    pub max_proof_size_bytes: usize,
    pub max_gas_estimate: u64,
    pub challenger_rate_limit_per_hour: u32,
    pub rapid_fire_threshold: u32,
    pub rapid_fire_window_s: u64,
    pub low_quality_success_rate: f64,
    pub verdict_confidence_threshold: f64,
    pub high_value_bond_threshold: i64,

    // ── Slashing / payout (§4.11) ────────────────────────────────────────
    pub slash_failed_challenge_fraction: f64,
    pub slash_missed_heartbeat_per_severity: f64,
    pub slash_missed_heartbeat_cap: f64,
    pub slash_policy_violation_base: f64,
    pub challenger_payout_pct: u64,
    pub honest_payout_pct: u64,
    pub challenge_period_multiplier: u64,
    pub default_t_challenge_s: u64,
    pub bounty_cap_simple: i64,
    pub bounty_cap_complex: i64,
    pub bounty_cap_critical: i64,

    // ── Checkpoint (§4.12) ───────────────────────────────────────────────
    pub checkpoint_hot_epochs: u64,

    // ── Connection pool (§4.7) ───────────────────────────────────────────
    pub bus_connection_pool_size: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            auction_window_s: 30,
            auction_max_rounds: 3,
            anti_snipe_threshold_s: 5,
            anti_snipe_extension_s: 5,
            anti_snipe_max_extensions: 3,
            auction_weight_cost: 0.4,
            auction_weight_eta: 0.3,
            auction_weight_reputation: 0.2,
            auction_weight_capabilities: 0.1,
            auction_eta_horizon_s: 604_800.0,
            auction_cap_horizon: 10.0,

            bootstrap_verifier_threshold: 10,
            bootstrap_sustain_hours: 24,
            bootstrap_challenge_reward_multiplier: 2.0,
            quorum_k_target: 7,

            backoff_base_s: 1.0,
            backoff_max_s: 60.0,
            backoff_jitter_s: 0.5,

            commit_gate_margin: 0.10,
            max_payload_size_bytes: 256 * 1024,
            ingress_gas_limit: 50_000,

            default_lease_ttl_s: 3600,
            default_heartbeat_interval_s: 60,

            challenge_window_s: 86_400,
            max_proof_size_bytes: 1024 * 1024,
            max_gas_estimate: 50_000,
            challenger_rate_limit_per_hour: 10,
            rapid_fire_threshold: 5,
            rapid_fire_window_s: 60,
            low_quality_success_rate: 0.20,
            verdict_confidence_threshold: 0.70,
            high_value_bond_threshold: 500,

            slash_failed_challenge_fraction: 0.50,
            slash_missed_heartbeat_per_severity: 0.01,
            slash_missed_heartbeat_cap: 0.10,
            slash_policy_violation_base: 0.10,
            challenger_payout_pct: 50,
            honest_payout_pct: 40,
            challenge_period_multiplier: 2,
            default_t_challenge_s: 600,
            bounty_cap_simple: 10,
            bounty_cap_complex: 100,
            bounty_cap_critical: 1000,

            checkpoint_hot_epochs: 10,

            bus_connection_pool_size: 10,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("config parse error: {0}")]
pub struct ConfigError(pub String);

impl ProtocolConfig {
    /// Loads overrides from a JSON config file; any field omitted keeps its
    /// spec default. `swarmx-node` resolves the path from `--config` or the
    /// environment per §6.
    pub fn load_overrides(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(|e| ConfigError(e.to_string()))
    }
}
