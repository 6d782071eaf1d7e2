//! swarmx-node — the full coordination-engine node binary.
//!
//! Startup sequence:
//!   1. Open the persistent ledger and lease databases, open the cold CAS
//!      tier for pruned plan ops
//!   2. Start the gossip bus (libp2p gossipsub) and its transport shim
//!   3. Start the JSON-RPC server
//!   4. Run the main loop: drain inbound bus messages through the
//!      validate/gate/dispatch pipeline, periodically cut checkpoints and
//!      scavenge expired leases

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};

use swarmx_bus::{BusConfig, BusNetwork, BusTransport, MessageBus};
use swarmx_cas::fs_backend::FsCas;
use swarmx_challenge::{required_bond, AbuseTracker, ChallengeQueue};
use swarmx_checkpoint::{create_checkpoint, PruningManager};
use swarmx_coordinator::{AuctionManager, LeaseManager};
use swarmx_core::{
    AccountId, Bid, Challenge, Complexity, Envelope, EnvelopeKind, OpId, OpType, PlanOp, ProtocolConfig, SignedCheckpoint,
    TaskId, VerifierMetadata,
};
use swarmx_ledger::{BountyEngine, Ledger, LedgerDb};
use swarmx_plan::PlanStore;
use swarmx_policy::commit::{CommitGate, ResourceClaim};
use swarmx_rpc::{RpcServer, RpcServerState};

mod sim;

/// Checkpoint cut cadence. Not a protocol invariant (peers may cut on
/// different schedules and still converge via §4.12's quorum rule), so it
/// lives here rather than on `ProtocolConfig`.
const CHECKPOINT_INTERVAL_S: u64 = 60;

#[derive(Parser, Debug)]
#[command(name = "swarmx-node", version, about = "swarmx coordination-engine node")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Directory for the persistent ledger/lease databases.
    #[arg(long, default_value = "./data", global = true)]
    data_dir: PathBuf,

    /// Bus (gossipsub) listen multiaddr.
    #[arg(long, default_value = "/ip4/0.0.0.0/tcp/7000", global = true)]
    bus_listen: String,

    /// JSON-RPC listen address.
    #[arg(long, default_value = "127.0.0.1:8645", global = true)]
    rpc_addr: SocketAddr,

    /// Bootstrap peer multiaddresses (comma-separated).
    #[arg(long, value_delimiter = ',', global = true)]
    bootstrap: Vec<String>,

    /// Path to a JSON `ProtocolConfig` override.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the node (default when no subcommand is given).
    Run,
    /// Replay a JSONL audit log deterministically with optional chaos
    /// injection (§4.14).
    Sim(sim::SimArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,swarmx=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Some(Command::Sim(sim_args)) => return sim::run(sim_args),
        Some(Command::Run) | None => {}
    }

    info!("swarmx node starting");

    let config: Arc<ProtocolConfig> = Arc::new(load_config(args.config.as_deref())?);

    std::fs::create_dir_all(&args.data_dir).with_context(|| format!("creating data dir {}", args.data_dir.display()))?;

    // ── Ledger + lease persistence ──────────────────────────────────────
    let ledger_db = LedgerDb::open(args.data_dir.join("ledger")).map_err(|e| anyhow::anyhow!("opening ledger db: {e}"))?;
    let ledger = Arc::new(Ledger::new(ledger_db));

    let leases = Arc::new(LeaseManager::open(args.data_dir.join("leases")).map_err(|e| anyhow::anyhow!("opening lease db: {e}"))?);

    // ── Plan store, auctions, challenges, checkpoints ───────────────────
    let plan = Arc::new(Mutex::new(PlanStore::new()));
    let auctions = Arc::new(AuctionManager::new());
    let challenge_queue = Arc::new(Mutex::new(ChallengeQueue::new()));
    let challenge_by_id: Arc<Mutex<HashMap<String, Challenge>>> = Arc::new(Mutex::new(HashMap::new()));
    let abuse = Arc::new(Mutex::new(AbuseTracker::new()));
    // Keyed by commit_id: opened when a commit is attested (§4.10), closed
    // once `ChallengeWindow::is_open` reports elapsed.
    let challenge_windows: Arc<Mutex<HashMap<String, swarmx_core::ChallengeWindow>>> = Arc::new(Mutex::new(HashMap::new()));
    let checkpoints: Arc<Mutex<HashMap<u64, SignedCheckpoint>>> = Arc::new(Mutex::new(HashMap::new()));

    let cold_cas = FsCas::open(args.data_dir.join("cas")).map_err(|e| anyhow::anyhow!("opening cold CAS: {e}"))?;
    let pruning = Arc::new(Mutex::new(PruningManager::new(cold_cas)));

    // ── Gossip bus ───────────────────────────────────────────────────────
    let bus_config = BusConfig {
        listen_addr: args.bus_listen.clone(),
        bootstrap_peers: args.bootstrap.clone(),
        protocol_version: "/swarmx/1.0.0".into(),
        max_pool_size: 10,
    };
    let (network, mut handle) = BusNetwork::new(&bus_config).map_err(|e| anyhow::anyhow!("building bus network: {e}"))?;
    info!(peer_id = %handle.local_peer_id, "bus identity");
    let local_peer_id = handle.local_peer_id.to_string();
    let listen_multiaddr = format!("{}/p2p/{}", args.bus_listen, local_peer_id);

    let transport = GossipTransport { command_tx: handle.command_tx.clone() };
    let bus = Arc::new(MessageBus::new(transport, bus_config.max_pool_size));

    // Gossipsub topics don't support the broker-style `*`/`>` wildcards the
    // subject scheme assumes (§4.7), so every node subscribes up front to
    // the fixed, bounded set of role topics instead of one per thread_id.
    for role in swarmx_bus::KNOWN_ROLES {
        let _ = handle.command_tx.try_send(swarmx_bus::BusCommand::Subscribe { subject: swarmx_bus::thread_subject("_", role) });
    }

    tokio::spawn(async move { network.run().await });

    // ── RPC server ───────────────────────────────────────────────────────
    // `submitEnvelope` doesn't touch state directly — it only forwards into
    // this channel, which the main loop below drains alongside inbound
    // gossip, so locally-submitted and network-received envelopes apply and
    // broadcast through the same single path (gossipsub never echoes a
    // node's own publishes back to it).
    let (envelope_tx, mut envelope_rx) = mpsc::channel::<(Envelope, String)>(512);

    let rpc_state = Arc::new(RpcServerState {
        ledger: Arc::clone(&ledger),
        plan: Arc::clone(&plan),
        auctions: Arc::clone(&auctions),
        challenges: Arc::clone(&challenge_by_id),
        checkpoints: Arc::clone(&checkpoints),
        envelope_tx,
        local_peer_id: local_peer_id.clone(),
        protocol_version: "/swarmx/1.0.0".into(),
        listen_multiaddr,
    });
    let _rpc_handle = RpcServer::new(rpc_state).start(args.rpc_addr).await.context("starting RPC server")?;

    // ── Periodic lease scavenging ────────────────────────────────────────
    let leases_bg = Arc::clone(&leases);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(std::time::Duration::from_secs(5));
        loop {
            tick.tick().await;
            let now_ns = now_ns();
            match leases_bg.scavenge_due_releases(now_ns) {
                Ok(released) => {
                    for (lease, reason) in released {
                        info!(lease_id = %lease.lease_id, ?reason, "lease released");
                    }
                }
                Err(e) => warn!(error = %e, "lease scavenge failed"),
            }
        }
    });

    // ── Periodic checkpoint cut ───────────────────────────────────────────
    let plan_bg = Arc::clone(&plan);
    let checkpoints_bg = Arc::clone(&checkpoints);
    let pruning_bg = Arc::clone(&pruning);
    let config_bg = Arc::clone(&config);
    tokio::spawn(async move {
        let mut epoch: u64 = 0;
        let mut tick = tokio::time::interval(std::time::Duration::from_secs(CHECKPOINT_INTERVAL_S));
        loop {
            tick.tick().await;
            let ops = plan_bg.lock().unwrap().all_ops();
            let op_hashes: Vec<String> = ops.iter().map(|op| swarmx_crypto::sha256_hex(&op.op_id.as_bytes()[..])).collect();
            let checkpoint = create_checkpoint(epoch, format!("ops={}", op_hashes.len()), &op_hashes, now_ns());
            info!(epoch, root = %checkpoint.merkle_root, "checkpoint cut");
            checkpoints_bg.lock().unwrap().insert(epoch, SignedCheckpoint { checkpoint, signatures: Vec::new() });

            let mut pruning = pruning_bg.lock().unwrap();
            for op in &ops {
                pruning.insert(op.op_id, epoch, bincode::serialize(op).unwrap_or_default());
            }
            if let Err(e) = pruning.prune(epoch, config_bg.checkpoint_hot_epochs) {
                warn!(error = %e, "pruning failed");
            }
            epoch += 1;
        }
    });

    // ── Main loop: drain local submissions and inbound bus messages ───────
    info!("node ready");
    loop {
        tokio::select! {
            submitted = envelope_rx.recv() => {
                let Some((envelope, role)) = submitted else {
                    // RPC server (and its envelope_tx) dropped; nothing left to serve.
                    break;
                };
                let thread_id = envelope.body.thread_id.clone();
                match bus.publish(&thread_id, &role, &envelope).await {
                    Ok(()) => dispatch_envelope(
                        &envelope,
                        &plan,
                        &auctions,
                        &challenge_queue,
                        &challenge_by_id,
                        &challenge_windows,
                        &abuse,
                        &ledger,
                        &leases,
                        &config,
                    ),
                    Err(e) => warn!(error = %e, %thread_id, "submitted envelope rejected"),
                }
            }

            Some(msg) = handle.inbound_rx.recv() => {
                let Some(role) = swarmx_bus::role_from_gossip_topic(&msg.subject) else {
                    warn!(subject = %msg.subject, "dropping message on unrecognized gossip topic");
                    continue;
                };

                // The gossip topic only carries the role (§4.7 note on
                // wildcard-less transports); the real thread_id lives in
                // the envelope body, so peek it before handing the subject
                // on to `handle_inbound`'s validate/gate/audit pipeline.
                let Ok(peek): Result<Envelope, _> = bincode::deserialize(&msg.bytes) else {
                    warn!(subject = %msg.subject, "dropping malformed gossip payload");
                    continue;
                };
                let thread_id = peek.body.thread_id.clone();
                let subject = swarmx_bus::thread_subject(&thread_id, role);

                match bus.handle_inbound(&thread_id, &subject, &msg.bytes, &config, now_ns()) {
                    Ok(envelope) => dispatch_envelope(
                        &envelope,
                        &plan,
                        &auctions,
                        &challenge_queue,
                        &challenge_by_id,
                        &challenge_windows,
                        &abuse,
                        &ledger,
                        &leases,
                        &config,
                    ),
                    Err(e) => warn!(error = %e, subject = %subject, "inbound envelope rejected"),
                }
            }
        }
    }

    Ok(())
}

/// Applies a validated, gated envelope to the appropriate component (§4
/// passim). Any decode failure is logged and the envelope is dropped —
/// it already passed signature/policy checks, so a bad payload shape here
/// reflects a version skew between peers, not an attack.
#[allow(clippy::too_many_arguments)]
fn dispatch_envelope(
    envelope: &Envelope,
    plan: &Arc<Mutex<PlanStore>>,
    auctions: &Arc<AuctionManager>,
    challenge_queue: &Arc<Mutex<ChallengeQueue>>,
    challenge_by_id: &Arc<Mutex<HashMap<String, Challenge>>>,
    challenge_windows: &Arc<Mutex<HashMap<String, swarmx_core::ChallengeWindow>>>,
    abuse: &Arc<Mutex<AbuseTracker>>,
    ledger: &Arc<Ledger>,
    leases: &Arc<LeaseManager>,
    config: &ProtocolConfig,
) {
    let body = &envelope.body;
    let now_ns = body.ts_ns;
    // Derived from the envelope id rather than randomly generated, so a
    // duplicate delivery (gossip replay, retried RPC submission) lands on
    // the same `op_id` and `PlanStore::append_op`'s G-Set dedup absorbs it.
    let op_id = OpId::from_bytes(*body.id.as_bytes());

    match body.kind {
        EnvelopeKind::UpdatePlan => match serde_json::from_value::<PlanOp>(body.payload.clone()) {
            Ok(op) => {
                if let Err(e) = plan.lock().unwrap().append_op(op) {
                    warn!(error = %e, "plan op rejected");
                }
            }
            Err(e) => warn!(error = %e, "malformed UpdatePlan payload"),
        },

        EnvelopeKind::Need => match serde_json::from_value::<NeedPayload>(body.payload.clone()) {
            Ok(need) => {
                auctions.start_auction(&need.need_id, need.budget, body.ts_ns);
            }
            Err(e) => warn!(error = %e, "malformed NEED payload"),
        },

        EnvelopeKind::Propose => match serde_json::from_value::<BidPayload>(body.payload.clone()) {
            Ok(p) => {
                let bid = Bid { agent_id: p.agent_id, cost: p.cost, eta_s: p.eta_s, reputation: p.reputation, capabilities: p.capabilities, ts_ns: body.ts_ns };
                if let Err(e) = auctions.accept_bid(&p.need_id, bid, config, body.ts_ns) {
                    warn!(error = %e, "bid rejected");
                }
            }
            Err(e) => warn!(error = %e, "malformed PROPOSE payload"),
        },

        EnvelopeKind::Challenge => match serde_json::from_value::<Challenge>(body.payload.clone()) {
            Ok(challenge) => accept_challenge(challenge, now_ns, challenge_queue, challenge_by_id, challenge_windows, abuse, ledger, config),
            Err(e) => warn!(error = %e, "malformed CHALLENGE payload"),
        },

        EnvelopeKind::Decide => match serde_json::from_value::<DecidePayload>(body.payload.clone()) {
            Ok(p) => handle_decide(p, &body.thread_id, body.lamport, op_id, now_ns, plan, leases, config),
            Err(e) => warn!(error = %e, "malformed DECIDE payload"),
        },

        EnvelopeKind::Commit => match serde_json::from_value::<CommitPayload>(body.payload.clone()) {
            Ok(p) => handle_commit(p, &body.thread_id, body.lamport, now_ns, plan),
            Err(e) => warn!(error = %e, "malformed COMMIT payload"),
        },

        EnvelopeKind::Attest => match serde_json::from_value::<AttestPayload>(body.payload.clone()) {
            Ok(p) => handle_attest(p, &body.thread_id, body.lamport, now_ns, plan, leases, challenge_windows, config),
            Err(e) => warn!(error = %e, "malformed ATTEST payload"),
        },

        EnvelopeKind::Heartbeat => match serde_json::from_value::<HeartbeatPayload>(body.payload.clone()) {
            Ok(p) => handle_heartbeat(p, now_ns, leases),
            Err(e) => warn!(error = %e, "malformed HEARTBEAT payload"),
        },

        EnvelopeKind::Yield | EnvelopeKind::Release => match serde_json::from_value::<ReleasePayload>(body.payload.clone()) {
            Ok(p) => handle_release(p, body.kind, &body.thread_id, body.lamport, now_ns, plan, leases),
            Err(e) => warn!(error = %e, "malformed {:?} payload", body.kind),
        },

        EnvelopeKind::Finalize => match serde_json::from_value::<FinalizePayload>(body.payload.clone()) {
            Ok(p) => handle_finalize(p, &body.thread_id, body.lamport, now_ns, plan, ledger, config),
            Err(e) => warn!(error = %e, "malformed FINALIZE payload"),
        },
    }
}

/// Validates a CHALLENGE against abuse controls, proof size/gas limits,
/// the minimum bond for its proof type, and the commit's challenge
/// window, escrowing the bond before the challenge is queued (§4.10).
#[allow(clippy::too_many_arguments)]
fn accept_challenge(
    challenge: Challenge,
    now_ns: swarmx_core::TimestampNs,
    challenge_queue: &Arc<Mutex<ChallengeQueue>>,
    challenge_by_id: &Arc<Mutex<HashMap<String, Challenge>>>,
    challenge_windows: &Arc<Mutex<HashMap<String, swarmx_core::ChallengeWindow>>>,
    abuse: &Arc<Mutex<AbuseTracker>>,
    ledger: &Arc<Ledger>,
    config: &ProtocolConfig,
) {
    let account = challenge.challenger_did;

    if let Err(e) = abuse.lock().unwrap().check_and_record(account, now_ns, config) {
        warn!(error = %e, challenge_id = %challenge.challenge_id, "challenge rejected by abuse controls");
        return;
    }

    if challenge.size_bytes > config.max_proof_size_bytes {
        warn!(challenge_id = %challenge.challenge_id, size_bytes = challenge.size_bytes, "challenge proof exceeds max size");
        return;
    }
    if challenge.gas_estimate > config.max_gas_estimate {
        warn!(challenge_id = %challenge.challenge_id, gas_estimate = challenge.gas_estimate, "challenge proof exceeds max gas");
        return;
    }

    let window_open = challenge_windows.lock().unwrap().get(&challenge.commit_id).map(|w| w.is_open(now_ns)).unwrap_or(false);
    if !window_open {
        warn!(error = %swarmx_core::SwarmError::WindowClosed, challenge_id = %challenge.challenge_id, commit_id = %challenge.commit_id, "challenge window not open");
        return;
    }

    let min_bond = required_bond(challenge.proof_type, challenge.complexity);
    if challenge.bond_amount < min_bond {
        warn!(
            error = %swarmx_core::SwarmError::BondTooSmall { min: min_bond, got: challenge.bond_amount },
            challenge_id = %challenge.challenge_id,
            "challenge bond below required minimum"
        );
        return;
    }

    let escrow_id = format!("challenge-bond-{}", challenge.challenge_id);
    if let Err(e) = ledger.escrow(&account, challenge.bond_amount, &challenge.challenge_id, &escrow_id, now_ns) {
        warn!(error = %e, challenge_id = %challenge.challenge_id, "challenge bond escrow failed");
        return;
    }

    challenge_by_id.lock().unwrap().insert(challenge.challenge_id.clone(), challenge.clone());
    challenge_queue.lock().unwrap().push(challenge);
}

fn append_op(plan: &Arc<Mutex<PlanStore>>, op: PlanOp) {
    if let Err(e) = plan.lock().unwrap().append_op(op) {
        warn!(error = %e, "plan op rejected");
    }
}

fn state_op(task_id: TaskId, thread_id: &str, lamport: swarmx_core::Lamport, op_id: OpId, state: &str, now_ns: swarmx_core::TimestampNs) -> PlanOp {
    PlanOp {
        op_id,
        thread_id: thread_id.to_string(),
        lamport,
        actor_id: "node".to_string(),
        op_type: OpType::State,
        task_id,
        payload: serde_json::json!({ "state": state }),
        ts_ns: now_ns,
    }
}

fn annotate_op(
    task_id: TaskId,
    thread_id: &str,
    lamport: swarmx_core::Lamport,
    key: &str,
    value: serde_json::Value,
    now_ns: swarmx_core::TimestampNs,
) -> PlanOp {
    PlanOp {
        op_id: OpId::random(),
        thread_id: thread_id.to_string(),
        lamport,
        actor_id: "node".to_string(),
        op_type: OpType::Annotate,
        task_id,
        payload: serde_json::json!({ "key": key, "value": value }),
        ts_ns: now_ns,
    }
}

/// DECIDE (§4.9, §4.8): records the task as DECIDED and creates its
/// worker lease so HEARTBEAT/ATTEST have something to renew/check.
fn handle_decide(
    p: DecidePayload,
    thread_id: &str,
    lamport: swarmx_core::Lamport,
    op_id: OpId,
    now_ns: swarmx_core::TimestampNs,
    plan: &Arc<Mutex<PlanStore>>,
    leases: &Arc<LeaseManager>,
    config: &ProtocolConfig,
) {
    let Ok(task_id) = TaskId::from_hex(&p.task_id) else {
        warn!(task_id = %p.task_id, "malformed DECIDE task_id");
        return;
    };

    append_op(plan, state_op(task_id, thread_id, lamport, op_id, "DECIDED", now_ns));

    let ttl_s = p.lease_ttl_s.unwrap_or(config.default_lease_ttl_s);
    let hb_interval_s = p.heartbeat_interval_s.unwrap_or(config.default_heartbeat_interval_s);
    match leases.create_lease(task_id, &p.worker_id, ttl_s, hb_interval_s, now_ns) {
        Ok(lease_id) => info!(%lease_id, worker_id = %p.worker_id, task_id = %p.task_id, "lease created"),
        Err(e) => warn!(error = %e, task_id = %p.task_id, "lease creation failed"),
    }
}

/// COMMIT (§4.6): records the worker's submitted commit id as an
/// annotation so ATTEST/CHALLENGE can reference it.
fn handle_commit(p: CommitPayload, thread_id: &str, lamport: swarmx_core::Lamport, now_ns: swarmx_core::TimestampNs, plan: &Arc<Mutex<PlanStore>>) {
    let Ok(task_id) = TaskId::from_hex(&p.task_id) else {
        warn!(task_id = %p.task_id, "malformed COMMIT task_id");
        return;
    };
    append_op(plan, annotate_op(task_id, thread_id, lamport, "commit_id", serde_json::json!(p.commit_id), now_ns));
}

/// ATTEST (§4.6, §4.8): the commit-gate compares claimed vs. actual
/// resource use, exclusivity rejects a non-lease-holding worker, and on
/// success the task moves to VERIFIED and opens the commit's challenge
/// window.
#[allow(clippy::too_many_arguments)]
fn handle_attest(
    p: AttestPayload,
    thread_id: &str,
    lamport: swarmx_core::Lamport,
    now_ns: swarmx_core::TimestampNs,
    plan: &Arc<Mutex<PlanStore>>,
    leases: &Arc<LeaseManager>,
    challenge_windows: &Arc<Mutex<HashMap<String, swarmx_core::ChallengeWindow>>>,
    config: &ProtocolConfig,
) {
    let Ok(task_id) = TaskId::from_hex(&p.task_id) else {
        warn!(task_id = %p.task_id, "malformed ATTEST task_id");
        return;
    };

    if let Err(e) = leases.check_exclusivity(&task_id, &p.worker_id, now_ns) {
        warn!(error = %e, task_id = %p.task_id, worker_id = %p.worker_id, "attestation rejected: exclusivity");
        return;
    }

    let claimed = ResourceClaim { cpu_ms: p.claimed_cpu_ms, memory_mb: p.claimed_memory_mb, gas: p.claimed_gas };
    let actual = ResourceClaim { cpu_ms: p.actual_cpu_ms, memory_mb: p.actual_memory_mb, gas: p.actual_gas };
    let result = CommitGate::new().check(claimed, actual, config);
    if !result.allowed {
        warn!(task_id = %p.task_id, reasons = ?result.reasons, "attestation rejected: commit gate");
        return;
    }

    append_op(plan, state_op(task_id, thread_id, lamport, OpId::random(), "VERIFIED", now_ns));

    let window = swarmx_core::ChallengeWindow { open_ns: now_ns, duration_s: config.challenge_window_s, extensions: 0 };
    challenge_windows.lock().unwrap().insert(p.commit_id, window);
}

/// HEARTBEAT (§4.8): renews the worker's lease on the task, found by
/// (task_id, worker_id) rather than a bare lease_id so the worker's
/// envelope doesn't have to carry the server-generated UUID.
fn handle_heartbeat(p: HeartbeatPayload, now_ns: swarmx_core::TimestampNs, leases: &Arc<LeaseManager>) {
    let Ok(task_id) = TaskId::from_hex(&p.task_id) else {
        warn!(task_id = %p.task_id, "malformed HEARTBEAT task_id");
        return;
    };
    let lease = match leases.get_leases_for_worker(&p.worker_id) {
        Ok(ls) => ls.into_iter().find(|l| l.task_id == task_id),
        Err(e) => {
            warn!(error = %e, "heartbeat lease lookup failed");
            return;
        }
    };
    match lease {
        Some(lease) => {
            if let Err(e) = leases.heartbeat(&lease.lease_id, now_ns) {
                warn!(error = %e, lease_id = %lease.lease_id, "heartbeat renewal failed");
            }
        }
        None => warn!(task_id = %p.task_id, worker_id = %p.worker_id, "heartbeat for unknown lease"),
    }
}

/// YIELD/RELEASE (§4.8): releases the worker's lease (if still held) and
/// writes ANNOTATE(release) + STATE=DRAFT so the task re-enters the
/// auction pool.
fn handle_release(
    p: ReleasePayload,
    kind: EnvelopeKind,
    thread_id: &str,
    lamport: swarmx_core::Lamport,
    now_ns: swarmx_core::TimestampNs,
    plan: &Arc<Mutex<PlanStore>>,
    leases: &Arc<LeaseManager>,
) {
    let Ok(task_id) = TaskId::from_hex(&p.task_id) else {
        warn!(task_id = %p.task_id, "malformed {:?} task_id", kind);
        return;
    };

    if let Ok(held) = leases.get_leases_for_worker(&p.worker_id) {
        if let Some(lease) = held.into_iter().find(|l| l.task_id == task_id) {
            if let Err(e) = leases.yield_lease(&lease.lease_id) {
                warn!(error = %e, lease_id = %lease.lease_id, "lease release failed");
            }
        }
    }

    append_op(plan, annotate_op(task_id, thread_id, lamport, "release", serde_json::json!({"reason": p.reason}), now_ns));
    append_op(plan, state_op(task_id, thread_id, lamport, OpId::random(), "DRAFT", now_ns));
}

/// FINALIZE (§4.11): pays out the bounty through the committee (and
/// challenger, if one was upheld), then marks the task FINAL.
fn handle_finalize(
    p: FinalizePayload,
    thread_id: &str,
    lamport: swarmx_core::Lamport,
    now_ns: swarmx_core::TimestampNs,
    plan: &Arc<Mutex<PlanStore>>,
    ledger: &Arc<Ledger>,
    config: &ProtocolConfig,
) {
    let Ok(task_id) = TaskId::from_hex(&p.task_id) else {
        warn!(task_id = %p.task_id, "malformed FINALIZE task_id");
        return;
    };

    let challenger_pair = match (&p.challenger, &p.challenger_metadata) {
        (Some(id), Some(meta)) => Some((id, meta)),
        _ => None,
    };

    let engine = BountyEngine::new(ledger);
    match engine.payout(
        p.amount,
        p.complexity,
        &p.committee,
        &p.committee_metadata,
        challenger_pair,
        p.completion_ts,
        now_ns,
        p.task_invalidated,
        config,
    ) {
        Ok(payout) => {
            info!(task_id = %p.task_id, committee_payout = payout.committee_payout, challenger_payout = payout.challenger_payout, burned = payout.burned, "bounty paid out");
            append_op(plan, state_op(task_id, thread_id, lamport, OpId::random(), "FINAL", now_ns));
        }
        Err(e) => warn!(error = %e, task_id = %p.task_id, "bounty payout rejected"),
    }
}

#[derive(serde::Deserialize)]
struct NeedPayload {
    need_id: String,
    budget: i64,
}

#[derive(serde::Deserialize)]
struct BidPayload {
    need_id: String,
    agent_id: String,
    cost: i64,
    eta_s: u64,
    reputation: f64,
    capabilities: Vec<String>,
}

#[derive(serde::Deserialize)]
struct DecidePayload {
    task_id: String,
    worker_id: String,
    lease_ttl_s: Option<u64>,
    heartbeat_interval_s: Option<u64>,
}

#[derive(serde::Deserialize)]
struct CommitPayload {
    task_id: String,
    commit_id: String,
}

#[derive(serde::Deserialize)]
struct AttestPayload {
    task_id: String,
    worker_id: String,
    commit_id: String,
    claimed_cpu_ms: u64,
    claimed_memory_mb: u64,
    claimed_gas: u64,
    actual_cpu_ms: u64,
    actual_memory_mb: u64,
    actual_gas: u64,
}

#[derive(serde::Deserialize)]
struct HeartbeatPayload {
    task_id: String,
    worker_id: String,
}

#[derive(serde::Deserialize)]
struct ReleasePayload {
    task_id: String,
    worker_id: String,
    reason: String,
}

#[derive(serde::Deserialize)]
struct FinalizePayload {
    task_id: String,
    amount: i64,
    complexity: Complexity,
    committee: Vec<AccountId>,
    committee_metadata: Vec<VerifierMetadata>,
    challenger: Option<AccountId>,
    challenger_metadata: Option<VerifierMetadata>,
    completion_ts: swarmx_core::TimestampNs,
    #[serde(default)]
    task_invalidated: bool,
}

/// Bridges `MessageBus`'s synchronous `BusTransport` seam onto the async
/// gossip swarm's command channel, keeping the swarm-driving task separate
/// from its callers.
struct GossipTransport {
    command_tx: mpsc::Sender<swarmx_bus::BusCommand>,
}

impl BusTransport for GossipTransport {
    fn publish(&self, subject: String, bytes: Vec<u8>) {
        if let Err(e) = self.command_tx.try_send(swarmx_bus::BusCommand::Publish { subject, bytes }) {
            warn!(error = %e, "gossip publish channel full or closed");
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<ProtocolConfig> {
    match path {
        Some(p) => {
            let text = std::fs::read_to_string(p).with_context(|| format!("reading config {}", p.display()))?;
            serde_json::from_str(&text).context("parsing ProtocolConfig JSON")
        }
        None => Ok(ProtocolConfig::default()),
    }
}

fn now_ns() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)
}
