use std::collections::HashMap;
use std::sync::Mutex;

use swarmx_core::{Auction, AuctionStatus, Bid, ProtocolConfig, SwarmError, TimestampNs};

/// Auction lifecycle and bid collection, ported from
/// `original_source/src/auction/bidding.py::AuctionManager` — the
/// `bid_window`/`max_rounds`/anti-snipe knobs it hardcoded or took from a
/// dataclass now live on `ProtocolConfig` (§9), not a parallel
/// `AuctionConfig`.
#[derive(Default)]
pub struct AuctionManager {
    auctions: Mutex<HashMap<String, Auction>>,
}

impl AuctionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_auction(&self, need_id: &str, budget: i64, now_ns: TimestampNs) -> Auction {
        let auction = Auction {
            need_id: need_id.to_string(),
            budget,
            bids: Vec::new(),
            status: AuctionStatus::Open,
            start_ns: now_ns,
            extensions: 0,
            round: 1,
        };
        self.auctions.lock().unwrap().insert(need_id.to_string(), auction.clone());
        auction
    }

    /// Accepts a bid, applying the anti-sniping window extension in
    /// place, exactly as `bidding.py::accept_bid` does.
    pub fn accept_bid(&self, need_id: &str, bid: Bid, config: &ProtocolConfig, now_ns: TimestampNs) -> Result<(), SwarmError> {
        let mut auctions = self.auctions.lock().unwrap();
        let auction = auctions.get_mut(need_id).ok_or_else(|| SwarmError::NotFound(need_id.to_string()))?;

        if auction.status != AuctionStatus::Open {
            return Err(SwarmError::WindowClosed);
        }

        let elapsed_s = (now_ns - auction.start_ns) as f64 / 1_000_000_000.0;
        if elapsed_s > config.auction_window_s as f64 {
            return Err(SwarmError::WindowClosed);
        }

        if bid.cost > auction.budget {
            return Err(SwarmError::PolicyDenied(format!("bid cost {} exceeds budget {}", bid.cost, auction.budget)));
        }

        let remaining_s = config.auction_window_s as f64 - elapsed_s;
        if remaining_s < config.anti_snipe_threshold_s as f64 && auction.extensions < config.anti_snipe_max_extensions {
            auction.start_ns -= (config.anti_snipe_extension_s as i64) * 1_000_000_000;
            auction.extensions += 1;
        }

        auction.bids.push(bid);
        Ok(())
    }

    /// Closes the auction and scores bids via [`select_winner`]. Returns
    /// `None` if no bids were received. An empty auction still under
    /// `config.auction_max_rounds` is reopened for another round instead
    /// of being closed outright, mirroring the bidding window restart the
    /// original auction manager does on a dry round.
    pub fn close_auction(&self, need_id: &str, config: &ProtocolConfig, now_ns: TimestampNs) -> Result<Option<Bid>, SwarmError> {
        let mut auctions = self.auctions.lock().unwrap();
        let auction = auctions.get_mut(need_id).ok_or_else(|| SwarmError::NotFound(need_id.to_string()))?;

        if auction.bids.is_empty() && auction.round < config.auction_max_rounds {
            auction.round += 1;
            auction.start_ns = now_ns;
            auction.extensions = 0;
            auction.status = AuctionStatus::Open;
            return Ok(None);
        }

        auction.status = AuctionStatus::Closed;

        if auction.bids.is_empty() {
            return Ok(None);
        }

        Ok(select_winner(&auction.bids, auction.budget, config).cloned())
    }

    pub fn timeout_auction(&self, need_id: &str) -> Result<(), SwarmError> {
        let mut auctions = self.auctions.lock().unwrap();
        let auction = auctions.get_mut(need_id).ok_or_else(|| SwarmError::NotFound(need_id.to_string()))?;
        auction.status = AuctionStatus::Timeout;
        Ok(())
    }

    pub fn get_auction(&self, need_id: &str) -> Option<Auction> {
        self.auctions.lock().unwrap().get(need_id).cloned()
    }
}

/// Composite score (0-100), ported from
/// `original_source/src/auction/selection.py::BidEvaluator.score_bid`.
pub fn score_bid(bid: &Bid, budget: i64, config: &ProtocolConfig) -> f64 {
    let cost_score = if budget > 0 { 1.0 - (bid.cost as f64 / budget as f64).min(1.0) } else { 0.0 };
    let eta_score = 1.0 - (bid.eta_s as f64 / config.auction_eta_horizon_s).min(1.0);
    let rep_score = bid.reputation.clamp(0.0, 1.0);
    let cap_score = (bid.capabilities.len() as f64 / config.auction_cap_horizon).min(1.0);

    let composite = cost_score * config.auction_weight_cost
        + eta_score * config.auction_weight_eta
        + rep_score * config.auction_weight_reputation
        + cap_score * config.auction_weight_capabilities;

    composite * 100.0
}

/// Total ordering over bids: highest score wins; ties broken by highest
/// reputation, then earliest timestamp, then `lex(agent_id)` — the fourth
/// tier the source's `handle_ties` didn't need because exact float ties
/// were rare enough not to matter, but which makes the comparison total
/// here.
pub fn select_winner<'a>(bids: &'a [Bid], budget: i64, config: &ProtocolConfig) -> Option<&'a Bid> {
    bids.iter().max_by(|a, b| {
        let score_a = (score_bid(a, budget, config) * 1000.0).round() as i64;
        let score_b = (score_bid(b, budget, config) * 1000.0).round() as i64;
        let rep_a = (a.reputation.clamp(0.0, 1.0) * 1000.0).round() as i64;
        let rep_b = (b.reputation.clamp(0.0, 1.0) * 1000.0).round() as i64;

        score_a
            .cmp(&score_b)
            .then(rep_a.cmp(&rep_b))
            .then(b.ts_ns.cmp(&a.ts_ns))
            .then(b.agent_id.cmp(&a.agent_id))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bid(agent: &str, cost: i64, eta_s: u64, reputation: f64, ts_ns: TimestampNs) -> Bid {
        Bid { agent_id: agent.to_string(), cost, eta_s, reputation, capabilities: vec![], ts_ns }
    }

    #[test]
    fn highest_score_wins() {
        let config = ProtocolConfig::default();
        let manager = AuctionManager::new();
        manager.start_auction("need-1", 100, 0);
        manager.accept_bid("need-1", bid("cheap", 10, 100, 0.9, 1), &config, 1_000_000_000).unwrap();
        manager.accept_bid("need-1", bid("pricey", 90, 100, 0.9, 1), &config, 1_000_000_000).unwrap();
        let winner = manager.close_auction("need-1", &config, 2_000_000_000).unwrap().unwrap();
        assert_eq!(winner.agent_id, "cheap");
    }

    #[test]
    fn bid_over_budget_rejected() {
        let config = ProtocolConfig::default();
        let manager = AuctionManager::new();
        manager.start_auction("need-1", 100, 0);
        let result = manager.accept_bid("need-1", bid("x", 200, 100, 0.9, 1), &config, 0);
        assert!(result.is_err());
    }

    #[test]
    fn anti_snipe_extends_window() {
        let config = ProtocolConfig::default();
        let manager = AuctionManager::new();
        manager.start_auction("need-1", 100, 0);
        let near_close_ns = (config.auction_window_s as i64 - 1) * 1_000_000_000;
        manager.accept_bid("need-1", bid("a", 10, 100, 0.9, near_close_ns), &config, near_close_ns).unwrap();
        let auction = manager.get_auction("need-1").unwrap();
        assert_eq!(auction.extensions, 1);
        assert!(auction.start_ns < 0);
    }

    #[test]
    fn ties_break_by_reputation_then_timestamp_then_agent_id() {
        let config = ProtocolConfig::default();
        let a = bid("aaa", 50, 100, 0.5, 10);
        let b = bid("bbb", 50, 100, 0.5, 5);
        let winner = select_winner(&[a, b], 100, &config).unwrap();
        assert_eq!(winner.agent_id, "bbb");
    }

    #[test]
    fn no_bids_closes_to_none() {
        let config = ProtocolConfig::default();
        let manager = AuctionManager::new();
        manager.start_auction("need-1", 100, 0);
        assert_eq!(manager.close_auction("need-1", &config).unwrap(), None);
    }
}
