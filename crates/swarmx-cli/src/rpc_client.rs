use anyhow::{bail, Context};

use swarmx_rpc::types::{RpcAccount, RpcAuction, RpcChallenge, RpcCheckpoint, RpcNetworkInfo, RpcTask};

/// JSON-RPC 2.0 client talking to a running swarmx-node. Uses raw HTTP POST
/// with serde_json rather than a full jsonrpsee client, to keep this binary
/// lean and dependency-minimal.
pub struct NodeRpcClient {
    url: String,
    client: reqwest::Client,
}

impl NodeRpcClient {
    pub fn new(url: &str) -> Self {
        Self { url: url.to_string(), client: reqwest::Client::new() }
    }

    async fn call(&self, method: &str, params: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        let body = serde_json::json!({ "jsonrpc": "2.0", "method": method, "params": params, "id": 1 });

        let resp = self.client.post(&self.url).json(&body).send().await.with_context(|| format!("connecting to node at {}", self.url))?;

        let json: serde_json::Value = resp.json().await.context("parsing RPC response")?;
        if let Some(err) = json.get("error") {
            bail!("RPC error: {}", err);
        }
        Ok(json["result"].clone())
    }

    pub async fn get_network_info(&self) -> anyhow::Result<RpcNetworkInfo> {
        let result = self.call("swarm_getNetworkInfo", serde_json::json!([])).await?;
        serde_json::from_value(result).context("parsing network info")
    }

    pub async fn get_account(&self, account_id: &str) -> anyhow::Result<Option<RpcAccount>> {
        let result = self.call("swarm_getAccount", serde_json::json!([account_id])).await?;
        serde_json::from_value(result).context("parsing account")
    }

    pub async fn get_task(&self, task_id: &str) -> anyhow::Result<Option<RpcTask>> {
        let result = self.call("swarm_getTask", serde_json::json!([task_id])).await?;
        serde_json::from_value(result).context("parsing task")
    }

    pub async fn get_auction(&self, need_id: &str) -> anyhow::Result<Option<RpcAuction>> {
        let result = self.call("swarm_getAuction", serde_json::json!([need_id])).await?;
        serde_json::from_value(result).context("parsing auction")
    }

    pub async fn get_challenge(&self, challenge_id: &str) -> anyhow::Result<Option<RpcChallenge>> {
        let result = self.call("swarm_getChallenge", serde_json::json!([challenge_id])).await?;
        serde_json::from_value(result).context("parsing challenge")
    }

    pub async fn get_checkpoint(&self, epoch: Option<u64>) -> anyhow::Result<Option<RpcCheckpoint>> {
        let result = self.call("swarm_getCheckpoint", serde_json::json!([epoch])).await?;
        serde_json::from_value(result).context("parsing checkpoint")
    }

    /// Submits a signed envelope. Returns the envelope id hex.
    pub async fn submit_envelope(&self, envelope_hex: &str, role: &str) -> anyhow::Result<String> {
        let result = self.call("swarm_submitEnvelope", serde_json::json!([envelope_hex, role])).await?;
        result.as_str().map(|s| s.to_string()).context("expected envelope id string from submitEnvelope")
    }
}
