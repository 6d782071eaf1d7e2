//! Two-node gossip propagation test for swarmx-node: spawn a bootstrap
//! node and a second node that dials it, submit an envelope to the
//! first, and verify the second observes the resulting state via
//! gossipsub.
//!
//! Run with:
//!   cargo test -p swarmx-node --test gossip

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use swarmx_core::{EnvelopeBody, EnvelopeId, EnvelopeKind};
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

async fn rpc_call(client: &reqwest::Client, url: &str, method: &str, params: serde_json::Value) -> Option<serde_json::Value> {
    let body = serde_json::json!({ "jsonrpc": "2.0", "method": method, "params": params, "id": 1 });
    let resp = client.post(url).json(&body).send().await.ok()?;
    let json: serde_json::Value = resp.json().await.ok()?;
    if json.get("error").is_some() {
        return None;
    }
    Some(json["result"].clone())
}

async fn rpc_call_unwrap(client: &reqwest::Client, url: &str, method: &str, params: serde_json::Value) -> serde_json::Value {
    rpc_call(client, url, method, params).await.unwrap_or_else(|| panic!("RPC call {method} returned error/none"))
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

async fn get_multiaddr(client: &reqwest::Client, url: &str) -> String {
    let info = rpc_call_unwrap(client, url, "swarm_getNetworkInfo", serde_json::json!([])).await;
    info["listen_multiaddr"].as_str().expect("listen_multiaddr field").to_string()
}

async fn wait_for_auction(client: &reqwest::Client, url: &str, need_id: &str, timeout: Duration) -> Option<serde_json::Value> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(v) = rpc_call(client, url, "swarm_getAuction", serde_json::json!([need_id])).await {
            if !v.is_null() {
                return Some(v);
            }
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    None
}

fn signed_need_hex(kp: &KeyPair, need_id: &str, budget: i64) -> String {
    let payload = serde_json::json!({"need_id": need_id, "budget": budget});
    let ts_ns = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos() as i64;
    let body = EnvelopeBody {
        v: 1,
        id: EnvelopeId::random(),
        thread_id: "thread-gossip".to_string(),
        kind: EnvelopeKind::Need,
        lamport: 1,
        ts_ns,
        sender_pk: kp.public_key_bytes().to_vec(),
        payload_hash: canonical_payload_hash(&payload).unwrap(),
        payload,
    };
    let env = sign(swarmx_core::Envelope::unsigned(body), kp).unwrap();
    hex::encode(bincode::serialize(&env).expect("serialize envelope"))
}

fn spawn_node(rpc_port: u16, bus_port: u16, data_dir: &std::path::Path, bootstrap: Option<&str>) -> Child {
    let node_bin = env!("CARGO_BIN_EXE_swarmx-node");
    let mut args = vec![
        "--data-dir".to_string(),
        data_dir.to_str().unwrap().to_string(),
        "--rpc-addr".to_string(),
        format!("127.0.0.1:{rpc_port}"),
        "--bus-listen".to_string(),
        format!("/ip4/127.0.0.1/tcp/{bus_port}"),
    ];
    if let Some(bs) = bootstrap {
        args.push("--bootstrap".to_string());
        args.push(bs.to_string());
    }
    Command::new(node_bin).args(args).stdout(Stdio::null()).stderr(Stdio::null()).spawn().expect("failed to spawn swarmx-node")
}

#[tokio::test]
async fn need_submitted_on_node_a_propagates_to_node_b() {
    let base_dir = std::env::temp_dir().join(format!("swarmx_gossip_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&base_dir);
    let dir_a = base_dir.join("a");
    let dir_b = base_dir.join("b");
    std::fs::create_dir_all(&dir_a).unwrap();
    std::fs::create_dir_all(&dir_b).unwrap();

    let http = reqwest::Client::new();

    let rpc_a = free_port();
    let bus_a = free_port();
    let url_a = format!("http://127.0.0.1:{rpc_a}");
    let child_a = spawn_node(rpc_a, bus_a, &dir_a, None);
    let _guard_a = NodeGuard { child: child_a, data_dir: dir_a };
    assert!(wait_for_rpc(&http, &url_a, Duration::from_secs(20)).await, "node A did not become ready");

    let multiaddr_a = get_multiaddr(&http, &url_a).await;
    assert!(multiaddr_a.contains("/p2p/"), "expected /p2p/ in multiaddr, got: {multiaddr_a}");

    let rpc_b = free_port();
    let bus_b = free_port();
    let url_b = format!("http://127.0.0.1:{rpc_b}");
    let child_b = spawn_node(rpc_b, bus_b, &dir_b, Some(&multiaddr_a));
    let _guard_b = NodeGuard { child: child_b, data_dir: base_dir };
    assert!(wait_for_rpc(&http, &url_b, Duration::from_secs(20)).await, "node B did not become ready");

    // Let the gossipsub mesh form (heartbeat fires every second).
    tokio::time::sleep(Duration::from_secs(4)).await;

    let requester = KeyPair::generate();
    let need_hex = signed_need_hex(&requester, "gossip-need-1", 1_000);
    rpc_call_unwrap(&http, &url_a, "swarm_submitEnvelope", serde_json::json!([need_hex, "need"])).await;

    let auction_a = wait_for_auction(&http, &url_a, "gossip-need-1", Duration::from_secs(5)).await;
    assert!(auction_a.is_some(), "node A did not record its own submitted NEED");

    let auction_b = wait_for_auction(&http, &url_b, "gossip-need-1", Duration::from_secs(10)).await;
    let auction_b = auction_b.expect("node B did not receive the NEED via gossipsub within 10 seconds");
    assert_eq!(auction_b["need_id"], "gossip-need-1");
    assert_eq!(auction_b["budget"], 1_000);
}
