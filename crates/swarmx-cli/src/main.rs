//! swarmx-cli
//!
//! CLI for the swarm coordination substrate. Manages Ed25519 agent
//! keypairs, builds and signs envelopes, and submits them to a running
//! swarmx-node via JSON-RPC.
//!
//! Usage:
//!   swarmx-cli keygen     [--keyfile <path>]
//!   swarmx-cli info       [--rpc <url>]
//!   swarmx-cli account    [--account <b58>] [--rpc <url>]
//!   swarmx-cli task       --task-id <hex> [--rpc <url>]
//!   swarmx-cli auction    --need-id <id> [--rpc <url>]
//!   swarmx-cli challenge  --challenge-id <id> [--rpc <url>]
//!   swarmx-cli checkpoint [--epoch <u64>] [--rpc <url>]
//!   swarmx-cli need       --thread <id> --need-id <id> --budget <i64> [--rpc <url>] [--keyfile <path>]
//!   swarmx-cli bid        --thread <id> --need-id <id> --cost <i64> --eta-s <u64> [--rpc <url>] [--keyfile <path>]
//!   swarmx-cli plan       --thread <id> --op-type <ADD_TASK|STATE|LINK|ANNOTATE> --task-id <hex> --payload <json> [--rpc <url>] [--keyfile <path>]

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;

use swarmx_core::{EnvelopeBody, EnvelopeId, EnvelopeKind, OpId, OpType, PlanOp, TaskId};
use swarmx_crypto::{canonical_payload_hash, keypair::KeyPair, sign};

mod rpc_client;
use rpc_client::NodeRpcClient;

// ── CLI definition ──────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "swarmx-cli", version, about = "swarmx agent CLI — sign and submit coordination envelopes")]
struct Args {
    /// Path to the agent keyfile (JSON).
    #[arg(long, global = true, default_value = "~/.swarmx/agent.json")]
    keyfile: PathBuf,

    /// Node RPC endpoint.
    #[arg(long, global = true, default_value = "http://127.0.0.1:8645")]
    rpc: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new Ed25519 agent keypair and save to the keyfile.
    Keygen,

    /// Print node identity and protocol info.
    Info,

    /// Print an account's ledger balance.
    Account {
        /// Account to query (base-58). Defaults to the local keypair's account.
        #[arg(long)]
        account: Option<String>,
    },

    /// Print a task's plan-store state.
    Task {
        /// Task id (hex).
        #[arg(long)]
        task_id: String,
    },

    /// Print an auction's bids and status.
    Auction {
        /// NEED id the auction was opened for.
        #[arg(long)]
        need_id: String,
    },

    /// Print a challenge's status.
    Challenge {
        /// Challenge id.
        #[arg(long)]
        challenge_id: String,
    },

    /// Print the latest (or a specific) signed checkpoint.
    Checkpoint {
        /// Epoch to query. Defaults to the latest known checkpoint.
        #[arg(long)]
        epoch: Option<u64>,
    },

    /// Submit a signed NEED envelope, opening an auction for a task.
    Need {
        /// Thread this NEED belongs to.
        #[arg(long)]
        thread: String,
        /// Unique id for the resulting auction.
        #[arg(long)]
        need_id: String,
        /// Budget offered for the work.
        #[arg(long)]
        budget: i64,
    },

    /// Submit a signed PROPOSE envelope, bidding on an open auction.
    Bid {
        /// Thread the auction belongs to.
        #[arg(long)]
        thread: String,
        /// NEED id being bid on.
        #[arg(long)]
        need_id: String,
        /// Bid cost.
        #[arg(long)]
        cost: i64,
        /// Estimated completion time, in seconds.
        #[arg(long)]
        eta_s: u64,
        /// Comma-separated capability tags.
        #[arg(long, default_value = "")]
        capabilities: String,
    },

    /// Submit a signed UPDATE_PLAN envelope carrying one PlanOp.
    Plan {
        /// Thread this op belongs to.
        #[arg(long)]
        thread: String,
        /// Op type: ADD_TASK, STATE, LINK, or ANNOTATE.
        #[arg(long)]
        op_type: String,
        /// Task id this op targets (hex). A fresh random id is used for ADD_TASK if omitted.
        #[arg(long)]
        task_id: Option<String>,
        /// Op payload as a JSON literal.
        #[arg(long, default_value = "{}")]
        payload: String,
    },
}

// ── Main ─────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("warn,swarmx_cli=info").init();

    let args = Args::parse();
    let keyfile = expand_tilde(&args.keyfile);
    let client = NodeRpcClient::new(&args.rpc);

    match args.command {
        Command::Keygen => cmd_keygen(&keyfile),

        Command::Info => {
            let info = client.get_network_info().await?;
            println!("Peer id:   {}", info.local_peer_id);
            println!("Protocol:  {}", info.protocol_version);
            println!("Multiaddr: {}", info.listen_multiaddr);
            Ok(())
        }

        Command::Account { account } => {
            let addr = match account {
                Some(a) => a,
                None => {
                    let kp = load_keypair(&keyfile)?;
                    kp.account_id.to_b58()
                }
            };
            match client.get_account(&addr).await? {
                Some(a) => {
                    println!("Account:   {}", a.account_id);
                    println!("Balance:   {}", a.balance);
                    println!("Locked:    {}", a.locked);
                    println!("Unbonding: {}", a.unbonding);
                }
                None => println!("No such account: {addr}"),
            }
            Ok(())
        }

        Command::Task { task_id } => {
            match client.get_task(&task_id).await? {
                Some(t) => {
                    println!("Task:      {}", t.task_id);
                    println!("Thread:    {}", t.thread_id);
                    println!("Type:      {}", t.task_type);
                    println!("State:     {}", t.state);
                    println!("Lamport:   {}", t.last_lamport);
                }
                None => println!("No such task: {task_id}"),
            }
            Ok(())
        }

        Command::Auction { need_id } => {
            match client.get_auction(&need_id).await? {
                Some(a) => {
                    println!("Auction:   {}", a.need_id);
                    println!("Budget:    {}", a.budget);
                    println!("Status:    {}", a.status);
                    println!("Extended:  {} times", a.extensions);
                    for bid in &a.bids {
                        println!("  bid: agent={} cost={} eta_s={} rep={:.2}", bid.agent_id, bid.cost, bid.eta_s, bid.reputation);
                    }
                }
                None => println!("No such auction: {need_id}"),
            }
            Ok(())
        }

        Command::Challenge { challenge_id } => {
            match client.get_challenge(&challenge_id).await? {
                Some(c) => {
                    println!("Challenge: {}", c.challenge_id);
                    println!("Task:      {}", c.task_id);
                    println!("Commit:    {}", c.commit_id);
                    println!("Proof:     {}", c.proof_type);
                    println!("Bond:      {}", c.bond_amount);
                    println!("Status:    {}", c.status);
                }
                None => println!("No such challenge: {challenge_id}"),
            }
            Ok(())
        }

        Command::Checkpoint { epoch } => {
            match client.get_checkpoint(epoch).await? {
                Some(c) => {
                    println!("Epoch:      {}", c.epoch);
                    println!("Merkle:     {}", c.merkle_root);
                    println!("Ops:        {}", c.op_count);
                    println!("Signatures: {}", c.signature_count);
                }
                None => println!("No checkpoint found"),
            }
            Ok(())
        }

        Command::Need { thread, need_id, budget } => {
            let kp = load_keypair(&keyfile)?;
            let payload = serde_json::json!({"need_id": need_id, "budget": budget});
            let env_hex = build_and_sign(&kp, &thread, EnvelopeKind::Need, payload)?;
            let id = client.submit_envelope(&env_hex, "need").await?;
            println!("NEED submitted: {id}");
            Ok(())
        }

        Command::Bid { thread, need_id, cost, eta_s, capabilities } => {
            let kp = load_keypair(&keyfile)?;
            let caps: Vec<&str> = capabilities.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
            let payload = serde_json::json!({
                "need_id": need_id,
                "agent_id": kp.account_id.to_b58(),
                "cost": cost,
                "eta_s": eta_s,
                "reputation": 0.0,
                "capabilities": caps,
            });
            let env_hex = build_and_sign(&kp, &thread, EnvelopeKind::Propose, payload)?;
            let id = client.submit_envelope(&env_hex, "propose").await?;
            println!("PROPOSE submitted: {id}");
            Ok(())
        }

        Command::Plan { thread, op_type, task_id, payload } => {
            let kp = load_keypair(&keyfile)?;
            let op_type = parse_op_type(&op_type)?;
            let task_id = match task_id {
                Some(hex) => TaskId::from_hex(&hex).map_err(|e| anyhow::anyhow!("invalid task id: {e}"))?,
                None => TaskId::random(),
            };
            let payload: serde_json::Value = serde_json::from_str(&payload).context("parsing --payload as JSON")?;
            let ts_ns = now_ns();
            let op = PlanOp {
                op_id: OpId::random(),
                thread_id: thread.clone(),
                lamport: 1,
                actor_id: kp.account_id.to_b58(),
                op_type,
                task_id,
                payload,
                ts_ns,
            };
            let op_payload = serde_json::to_value(&op).context("encoding PlanOp")?;
            let env_hex = build_and_sign(&kp, &thread, EnvelopeKind::UpdatePlan, op_payload)?;
            let id = client.submit_envelope(&env_hex, "plan").await?;
            println!("UPDATE_PLAN submitted: {id} (task {})", task_id.to_hex());
            Ok(())
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────

fn cmd_keygen(keyfile: &PathBuf) -> anyhow::Result<()> {
    if keyfile.exists() {
        bail!("Keyfile {} already exists. Delete it first to generate a new key.", keyfile.display());
    }
    if let Some(parent) = keyfile.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let kp = KeyPair::generate();
    let json = serde_json::to_string_pretty(&kp)?;
    std::fs::write(keyfile, &json).with_context(|| format!("writing keyfile to {}", keyfile.display()))?;

    println!("Generated new agent keypair.");
    println!("Account ID: {}", kp.account_id.to_b58());
    println!("Public key: {}", hex::encode(kp.public_key_bytes()));
    println!("Keyfile:    {}", keyfile.display());
    Ok(())
}

// ── Envelope builder ────────────────────────────────────────────────────

fn build_and_sign(kp: &KeyPair, thread_id: &str, kind: EnvelopeKind, payload: serde_json::Value) -> anyhow::Result<String> {
    let payload_hash = canonical_payload_hash(&payload).context("hashing payload")?;
    let body = EnvelopeBody {
        v: 1,
        id: EnvelopeId::random(),
        thread_id: thread_id.to_string(),
        kind,
        lamport: 1,
        ts_ns: now_ns(),
        sender_pk: kp.public_key_bytes().to_vec(),
        payload_hash,
        payload,
    };
    let env = sign(swarmx_core::Envelope::unsigned(body), kp).context("signing envelope")?;
    let bytes = bincode::serialize(&env).context("encoding envelope")?;
    Ok(hex::encode(bytes))
}

fn parse_op_type(s: &str) -> anyhow::Result<OpType> {
    match s.to_ascii_uppercase().as_str() {
        "ADD_TASK" => Ok(OpType::AddTask),
        "STATE" => Ok(OpType::State),
        "LINK" => Ok(OpType::Link),
        "ANNOTATE" => Ok(OpType::Annotate),
        other => bail!("unknown op type: {other} (expected ADD_TASK, STATE, LINK, or ANNOTATE)"),
    }
}

fn now_ns() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn load_keypair(keyfile: &PathBuf) -> anyhow::Result<KeyPair> {
    let json = std::fs::read_to_string(keyfile).with_context(|| format!("reading keyfile {}", keyfile.display()))?;
    let kp: KeyPair = serde_json::from_str(&json).context("parsing keyfile — is it a valid swarmx agent keyfile?")?;
    Ok(kp)
}

fn expand_tilde(path: &PathBuf) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.clone()
}
