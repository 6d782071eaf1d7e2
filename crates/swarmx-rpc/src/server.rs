use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObject;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use swarmx_coordinator::AuctionManager;
use swarmx_core::{AccountId, Challenge, Envelope, SignedCheckpoint, TaskId};
use swarmx_ledger::Ledger;
use swarmx_plan::PlanStore;

use crate::api::SwarmApiServer;
use crate::types::{RpcAccount, RpcAuction, RpcBid, RpcChallenge, RpcCheckpoint, RpcNetworkInfo, RpcTask};

fn rpc_err(code: i32, msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned(code, msg.into(), None::<()>)
}

/// Shared state passed to the RPC server: one `Arc` handle per component
/// this system tracks. `submitEnvelope` doesn't apply state itself — it
/// only hands a decoded envelope to the node's single main-loop apply
/// point via `envelope_tx`, which is also where it gets broadcast over
/// the bus.
pub struct RpcServerState {
    pub ledger: Arc<Ledger>,
    pub plan: Arc<Mutex<PlanStore>>,
    pub auctions: Arc<AuctionManager>,
    pub challenges: Arc<Mutex<HashMap<String, Challenge>>>,
    pub checkpoints: Arc<Mutex<HashMap<u64, SignedCheckpoint>>>,
    pub envelope_tx: mpsc::Sender<(Envelope, String)>,
    pub local_peer_id: String,
    pub protocol_version: String,
    pub listen_multiaddr: String,
}

pub struct RpcServer {
    state: Arc<RpcServerState>,
}

impl RpcServer {
    pub fn new(state: Arc<RpcServerState>) -> Self {
        Self { state }
    }

    /// Starts the JSON-RPC server on `addr` behind permissive CORS.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
        let cors = CorsLayer::new().allow_methods(Any).allow_origin(Any).allow_headers(Any);

        let server = Server::builder().set_http_middleware(tower::ServiceBuilder::new().layer(cors)).build(addr).await?;

        let module = self.into_rpc();
        let handle = server.start(module);
        info!(%addr, "RPC server started");
        Ok(handle)
    }
}

fn challenge_to_rpc(c: &Challenge) -> RpcChallenge {
    RpcChallenge {
        challenge_id: c.challenge_id.clone(),
        task_id: c.task_id.to_hex(),
        commit_id: c.commit_id.clone(),
        challenger_did: c.challenger_did.to_b58(),
        proof_type: format!("{:?}", c.proof_type),
        bond_amount: c.bond_amount,
        status: format!("{:?}", c.status),
    }
}

#[async_trait]
impl SwarmApiServer for RpcServer {
    async fn get_account(&self, account_id: String) -> RpcResult<Option<RpcAccount>> {
        let id = AccountId::from_b58(&account_id).map_err(|e| rpc_err(-32602, format!("invalid account id: {e}")))?;

        let account = self.state.ledger.get_account(&id).map_err(|e| rpc_err(-32603, e.to_string()))?;

        Ok(account.map(|a| RpcAccount {
            account_id: a.id.to_b58(),
            balance: a.balance,
            locked: a.locked,
            unbonding: a.unbonding,
        }))
    }

    async fn get_task(&self, task_id: String) -> RpcResult<Option<RpcTask>> {
        let id = TaskId::from_hex(&task_id).map_err(|e| rpc_err(-32602, format!("invalid task id: {e}")))?;

        let plan = self.state.plan.lock().unwrap();
        Ok(plan.get_task(&id).map(|t| RpcTask {
            task_id: t.task_id.to_hex(),
            thread_id: t.thread_id.clone(),
            task_type: t.task_type.clone(),
            state: format!("{:?}", t.state),
            last_lamport: t.last_lamport,
        }))
    }

    async fn get_auction(&self, need_id: String) -> RpcResult<Option<RpcAuction>> {
        Ok(self.state.auctions.get_auction(&need_id).map(|a| RpcAuction {
            need_id: a.need_id,
            budget: a.budget,
            status: format!("{:?}", a.status),
            extensions: a.extensions,
            round: a.round,
            bids: a
                .bids
                .into_iter()
                .map(|b| RpcBid {
                    agent_id: b.agent_id,
                    cost: b.cost,
                    eta_s: b.eta_s,
                    reputation: b.reputation,
                    capabilities: b.capabilities,
                })
                .collect(),
        }))
    }

    async fn get_challenge(&self, challenge_id: String) -> RpcResult<Option<RpcChallenge>> {
        let challenges = self.state.challenges.lock().unwrap();
        Ok(challenges.get(&challenge_id).map(challenge_to_rpc))
    }

    async fn get_checkpoint(&self, epoch: Option<u64>) -> RpcResult<Option<RpcCheckpoint>> {
        let checkpoints = self.state.checkpoints.lock().unwrap();
        let signed = match epoch {
            Some(e) => checkpoints.get(&e),
            None => checkpoints.values().max_by_key(|c| c.checkpoint.epoch),
        };

        Ok(signed.map(|s| RpcCheckpoint {
            epoch: s.checkpoint.epoch,
            merkle_root: s.checkpoint.merkle_root.clone(),
            op_count: s.checkpoint.op_count,
            ts_ns: s.checkpoint.ts_ns,
            signature_count: s.signatures.len(),
        }))
    }

    async fn submit_envelope(&self, envelope_hex: String, role: String) -> RpcResult<String> {
        let bytes = hex::decode(&envelope_hex).map_err(|e| rpc_err(-32602, format!("invalid hex: {e}")))?;
        let envelope: Envelope = bincode::deserialize(&bytes).map_err(|e| rpc_err(-32602, format!("invalid envelope encoding: {e}")))?;
        let id_hex = envelope.body.id.to_hex();

        self.state.envelope_tx.send((envelope, role)).await.map_err(|e| rpc_err(-32603, format!("node not accepting submissions: {e}")))?;

        Ok(id_hex)
    }

    async fn get_network_info(&self) -> RpcResult<RpcNetworkInfo> {
        Ok(RpcNetworkInfo {
            local_peer_id: self.state.local_peer_id.clone(),
            protocol_version: self.state.protocol_version.clone(),
            listen_multiaddr: self.state.listen_multiaddr.clone(),
        })
    }
}
