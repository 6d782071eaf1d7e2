use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;

use crate::types::{RpcAccount, RpcAuction, RpcChallenge, RpcCheckpoint, RpcNetworkInfo, RpcTask};

/// Query/control surface (§4 passim), all methods prefixed `swarm_` via
/// `namespace = "swarm"`.
#[rpc(server, namespace = "swarm")]
pub trait SwarmApi {
    /// Account balance/locked/unbonding state by base-58 account id.
    #[method(name = "getAccount")]
    async fn get_account(&self, account_id: String) -> RpcResult<Option<RpcAccount>>;

    /// Plan task state by hex task id.
    #[method(name = "getTask")]
    async fn get_task(&self, task_id: String) -> RpcResult<Option<RpcTask>>;

    /// Auction status and bids by need id.
    #[method(name = "getAuction")]
    async fn get_auction(&self, need_id: String) -> RpcResult<Option<RpcAuction>>;

    /// Challenge state by challenge id.
    #[method(name = "getChallenge")]
    async fn get_challenge(&self, challenge_id: String) -> RpcResult<Option<RpcChallenge>>;

    /// Latest known checkpoint at or before `epoch`, or the latest
    /// checkpoint if `epoch` is omitted.
    #[method(name = "getCheckpoint")]
    async fn get_checkpoint(&self, epoch: Option<u64>) -> RpcResult<Option<RpcCheckpoint>>;

    /// Submit a signed envelope. `envelope_hex` is hex-encoded
    /// bincode(Envelope); `role` selects the gossipsub subject alongside
    /// the envelope's own `thread_id`. Returns the envelope id hex on
    /// successful publish.
    #[method(name = "submitEnvelope")]
    async fn submit_envelope(&self, envelope_hex: String, role: String) -> RpcResult<String>;

    /// This node's libp2p identity and protocol version.
    #[method(name = "getNetworkInfo")]
    async fn get_network_info(&self) -> RpcResult<RpcNetworkInfo>;
}
