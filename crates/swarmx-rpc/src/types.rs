use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcAccount {
    pub account_id: String,
    pub balance: i64,
    pub locked: i64,
    pub unbonding: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcTask {
    pub task_id: String,
    pub thread_id: String,
    pub task_type: String,
    pub state: String,
    pub last_lamport: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcBid {
    pub agent_id: String,
    pub cost: i64,
    pub eta_s: u64,
    pub reputation: f64,
    pub capabilities: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcAuction {
    pub need_id: String,
    pub budget: i64,
    pub status: String,
    pub bids: Vec<RpcBid>,
    pub extensions: u32,
    pub round: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcChallenge {
    pub challenge_id: String,
    pub task_id: String,
    pub commit_id: String,
    pub challenger_did: String,
    pub proof_type: String,
    pub bond_amount: i64,
    pub status: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcCheckpoint {
    pub epoch: u64,
    pub merkle_root: String,
    pub op_count: u64,
    pub ts_ns: i64,
    pub signature_count: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcNetworkInfo {
    pub local_peer_id: String,
    pub protocol_version: String,
    /// Dialable multiaddr (`<listen_addr>/p2p/<peer_id>`) peers can hand to
    /// `--bootstrap` to join this node's gossip mesh.
    pub listen_multiaddr: String,
}
