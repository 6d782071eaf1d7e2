//! End-to-end scenario tests for swarmx-node: spawn a real node binary,
//! drive it purely over its RPC surface, assert on the resulting state.
//!
//! Run with:
//!   cargo test -p swarmx-node --test scenarios

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use swarmx_core::{EnvelopeBody, EnvelopeId, EnvelopeKind, OpId, OpType, PlanOp, TaskId};
use swarmx_crypto::{canonical_payload_hash, keypair::KeyPair, sign};

struct NodeGuard {
    child: Child,
    data_dir: PathBuf,
}

impl Drop for NodeGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.data_dir);
    }
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

async fn rpc_call(client: &reqwest::Client, url: &str, method: &str, params: serde_json::Value) -> serde_json::Value {
    let body = serde_json::json!({ "jsonrpc": "2.0", "method": method, "params": params, "id": 1 });
    let resp = client.post(url).json(&body).send().await.unwrap_or_else(|e| panic!("RPC call {method} failed: {e}"));
    let json: serde_json::Value = resp.json().await.expect("parse RPC JSON");
    if let Some(err) = json.get("error") {
        panic!("RPC error from {method}: {err}");
    }
    json["result"].clone()
}

async fn wait_for_rpc(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    let body = serde_json::json!({ "jsonrpc": "2.0", "method": "swarm_getNetworkInfo", "params": [], "id": 1 });
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Ok(resp) = client.post(url).json(&body).send().await {
            if resp.status().is_success() {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    false
}

fn signed_envelope_hex(kp: &KeyPair, thread_id: &str, kind: EnvelopeKind, lamport: u64, payload: serde_json::Value) -> String {
    let ts_ns = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos() as i64;
    let body = EnvelopeBody {
        v: 1,
        id: EnvelopeId::random(),
        thread_id: thread_id.to_string(),
        kind,
        lamport,
        ts_ns,
        sender_pk: kp.public_key_bytes().to_vec(),
        payload_hash: canonical_payload_hash(&payload).unwrap(),
        payload,
    };
    let env = sign(swarmx_core::Envelope::unsigned(body), kp).unwrap();
    let bytes = bincode::serialize(&env).expect("serialize envelope");
    hex::encode(bytes)
}

fn spawn_node(rpc_port: u16, bus_port: u16, data_dir: &std::path::Path, bootstrap: &[String]) -> Child {
    let node_bin = env!("CARGO_BIN_EXE_swarmx-node");
    let mut args = vec![
        "--data-dir".to_string(),
        data_dir.to_str().unwrap().to_string(),
        "--rpc-addr".to_string(),
        format!("127.0.0.1:{rpc_port}"),
        "--bus-listen".to_string(),
        format!("/ip4/127.0.0.1/tcp/{bus_port}"),
    ];
    if !bootstrap.is_empty() {
        args.push("--bootstrap".to_string());
        args.push(bootstrap.join(","));
    }
    Command::new(node_bin).args(args).stdout(Stdio::null()).stderr(Stdio::null()).spawn().expect("failed to spawn swarmx-node")
}

#[tokio::test]
async fn need_and_bid_produce_an_open_auction() {
    let data_dir = std::env::temp_dir().join(format!("swarmx_e2e_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&data_dir);
    std::fs::create_dir_all(&data_dir).unwrap();

    let rpc_port = free_port();
    let bus_port = free_port();
    let rpc_url = format!("http://127.0.0.1:{rpc_port}");

    let child = spawn_node(rpc_port, bus_port, &data_dir, &[]);
    let _guard = NodeGuard { child, data_dir };

    let http = reqwest::Client::new();
    assert!(wait_for_rpc(&http, &rpc_url, Duration::from_secs(20)).await, "node did not become ready within 20 seconds");

    let requester = KeyPair::generate();
    let need_hex = signed_envelope_hex(
        &requester,
        "thread-1",
        EnvelopeKind::Need,
        1,
        serde_json::json!({"need_id": "need-1", "budget": 1_000}),
    );
    rpc_call(&http, &rpc_url, "swarm_submitEnvelope", serde_json::json!([need_hex, "need"])).await;

    let bidder = KeyPair::generate();
    let bid_hex = signed_envelope_hex(
        &bidder,
        "thread-1",
        EnvelopeKind::Propose,
        2,
        serde_json::json!({
            "need_id": "need-1",
            "agent_id": "agent-a",
            "cost": 500,
            "eta_s": 60,
            "reputation": 0.8,
            "capabilities": ["rust"],
        }),
    );
    rpc_call(&http, &rpc_url, "swarm_submitEnvelope", serde_json::json!([bid_hex, "propose"])).await;

    tokio::time::sleep(Duration::from_millis(400)).await;

    let auction = rpc_call(&http, &rpc_url, "swarm_getAuction", serde_json::json!(["need-1"])).await;
    assert_eq!(auction["status"], "Open");
    assert_eq!(auction["bids"].as_array().unwrap().len(), 1);
    assert_eq!(auction["bids"][0]["agent_id"], "agent-a");
}

#[tokio::test]
async fn update_plan_envelope_creates_a_queryable_task() {
    let data_dir = std::env::temp_dir().join(format!("swarmx_e2e_{}", std::process::id() + 1));
    let _ = std::fs::remove_dir_all(&data_dir);
    std::fs::create_dir_all(&data_dir).unwrap();

    let rpc_port = free_port();
    let bus_port = free_port();
    let rpc_url = format!("http://127.0.0.1:{rpc_port}");

    let child = spawn_node(rpc_port, bus_port, &data_dir, &[]);
    let _guard = NodeGuard { child, data_dir };

    let http = reqwest::Client::new();
    assert!(wait_for_rpc(&http, &rpc_url, Duration::from_secs(20)).await, "node did not become ready within 20 seconds");

    let planner = KeyPair::generate();
    let task_id = TaskId::from_bytes([9u8; 32]);
    let plan_op = PlanOp {
        op_id: OpId::from_bytes([7u8; 32]),
        thread_id: "thread-1".to_string(),
        lamport: 1,
        actor_id: "planner-1".to_string(),
        op_type: OpType::AddTask,
        task_id,
        payload: serde_json::json!({"type": "research"}),
        ts_ns: 0,
    };
    let payload = serde_json::to_value(&plan_op).unwrap();
    let env_hex = signed_envelope_hex(&planner, "thread-1", EnvelopeKind::UpdatePlan, 1, payload);
    let task_id_hex = task_id.to_hex();
    rpc_call(&http, &rpc_url, "swarm_submitEnvelope", serde_json::json!([env_hex, "plan"])).await;

    tokio::time::sleep(Duration::from_millis(400)).await;

    let task = rpc_call(&http, &rpc_url, "swarm_getTask", serde_json::json!([task_id_hex])).await;
    assert_eq!(task["task_id"], task_id_hex);
    assert_eq!(task["task_type"], "research");
}
