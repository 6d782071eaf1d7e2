use std::collections::{HashMap, VecDeque};

use swarmx_core::{AccountId, ProtocolConfig, SwarmError, TimestampNs};

const HISTORY_CAP: usize = 256;

/// Rolling submission/outcome history for a single challenger, keyed by
/// DID. No literal `original_source` module covers abuse controls; this
/// is grounded directly on §4.10's rate/threshold language.
#[derive(Default)]
struct ChallengerHistory {
    submissions_ns: VecDeque<TimestampNs>,
    outcomes: VecDeque<bool>,
}

impl ChallengerHistory {
    fn record_submission(&mut self, now_ns: TimestampNs) {
        self.submissions_ns.push_back(now_ns);
        if self.submissions_ns.len() > HISTORY_CAP {
            self.submissions_ns.pop_front();
        }
    }

    fn record_outcome(&mut self, upheld: bool) {
        self.outcomes.push_back(upheld);
        if self.outcomes.len() > HISTORY_CAP {
            self.outcomes.pop_front();
        }
    }

    fn submissions_within(&self, now_ns: TimestampNs, window_s: u64) -> usize {
        let window_ns = window_s as i64 * 1_000_000_000;
        self.submissions_ns.iter().filter(|ts| now_ns - **ts <= window_ns).count()
    }

    fn success_rate(&self) -> Option<f64> {
        if self.outcomes.is_empty() {
            return None;
        }
        let upheld = self.outcomes.iter().filter(|o| **o).count();
        Some(upheld as f64 / self.outcomes.len() as f64)
    }
}

/// Tracks every challenger's submission/outcome history and enforces the
/// abuse controls of §4.10: hourly rate limit, rapid-fire burst
/// detection, and a rolling success-rate flag for low-quality
/// challengers.
#[derive(Default)]
pub struct AbuseTracker {
    histories: HashMap<AccountId, ChallengerHistory>,
}

impl AbuseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call before accepting a new challenge submission. Returns
    /// `RateLimited` if the challenger has exceeded either the hourly cap
    /// or the rapid-fire burst threshold; otherwise records the
    /// submission and returns `Ok(())`.
    pub fn check_and_record(&mut self, challenger: AccountId, now_ns: TimestampNs, config: &ProtocolConfig) -> Result<(), SwarmError> {
        let history = self.histories.entry(challenger).or_default();

        let hourly = history.submissions_within(now_ns, 3600);
        if hourly >= config.challenger_rate_limit_per_hour as usize {
            return Err(SwarmError::RateLimited);
        }

        let burst = history.submissions_within(now_ns, config.rapid_fire_window_s);
        if burst >= config.rapid_fire_threshold as usize {
            return Err(SwarmError::RateLimited);
        }

        history.record_submission(now_ns);
        Ok(())
    }

    pub fn record_outcome(&mut self, challenger: AccountId, upheld: bool) {
        self.histories.entry(challenger).or_default().record_outcome(upheld);
    }

    /// `None` until the challenger has a recorded outcome; `Some(true)`
    /// once their rolling success rate drops below
    /// `config.low_quality_success_rate`.
    pub fn is_low_quality(&self, challenger: &AccountId, config: &ProtocolConfig) -> Option<bool> {
        self.histories.get(challenger).and_then(ChallengerHistory::success_rate).map(|rate| rate < config.low_quality_success_rate)
    }
}
