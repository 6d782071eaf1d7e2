use futures::StreamExt as _;
use libp2p::{gossipsub, identify, noise, tcp, yamux, Multiaddr, PeerId, Swarm};
use libp2p::swarm::SwarmEvent;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::behaviour::{SwarmxBehaviour, SwarmxBehaviourEvent};
use crate::config::BusConfig;
use crate::topic::parse_subject;

/// Maps a `thread.<thread_id>.<role>` subject onto the gossipsub topic it
/// travels on. Gossipsub topics are exact strings with no broker-style
/// wildcard matching, so all threads share one topic per role instead of
/// one topic per thread_id — `thread_id` still rides along inside the
/// envelope body for the application layer to demux on.
fn gossip_topic_for_subject(subject: &str) -> String {
    match parse_subject(subject) {
        Some((_thread_id, role)) => format!("swarmx.{role}"),
        None => subject.to_string(),
    }
}

/// A command sent from a `BusHandle` into the swarm-driving task.
pub enum BusCommand {
    Publish { subject: String, bytes: Vec<u8> },
    Subscribe { subject: String },
}

/// A raw message arriving on some subject, before envelope parsing.
pub struct InboundMessage {
    pub subject: String,
    pub bytes: Vec<u8>,
}

/// Application-facing handle returned from `BusNetwork::new()`: a command
/// channel to drive the swarm and an inbound channel to receive gossip.
pub struct BusHandle {
    pub command_tx: mpsc::Sender<BusCommand>,
    pub inbound_rx: mpsc::Receiver<InboundMessage>,
    pub local_peer_id: PeerId,
}

/// Owns the libp2p `Swarm`. Pass to `tokio::spawn(network.run())`.
pub struct BusNetwork {
    swarm: Swarm<SwarmxBehaviour>,
    command_rx: mpsc::Receiver<BusCommand>,
    inbound_tx: mpsc::Sender<InboundMessage>,
}

impl BusNetwork {
    pub fn new(config: &BusConfig) -> Result<(Self, BusHandle), Box<dyn std::error::Error + Send + Sync>> {
        let mut swarm = libp2p::SwarmBuilder::with_new_identity()
            .with_tokio()
            .with_tcp(tcp::Config::default(), noise::Config::new, yamux::Config::default)?
            .with_behaviour(|key: &libp2p::identity::Keypair| {
                let message_id_fn = |msg: &gossipsub::Message| {
                    let mut s = DefaultHasher::new();
                    msg.data.hash(&mut s);
                    gossipsub::MessageId::from(s.finish().to_string())
                };

                let gossipsub_config = gossipsub::ConfigBuilder::default()
                    .heartbeat_interval(Duration::from_secs(1))
                    .validation_mode(gossipsub::ValidationMode::Strict)
                    .message_id_fn(message_id_fn)
                    .build()
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

                let gossipsub = gossipsub::Behaviour::new(
                    gossipsub::MessageAuthenticity::Signed(key.clone()),
                    gossipsub_config,
                )
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

                let store = libp2p::kad::store::MemoryStore::new(key.public().to_peer_id());
                let kademlia = libp2p::kad::Behaviour::new(key.public().to_peer_id(), store);

                let identify = identify::Behaviour::new(identify::Config::new(
                    config.protocol_version.clone(),
                    key.public(),
                ));

                let ping = libp2p::ping::Behaviour::default();

                Ok(SwarmxBehaviour { gossipsub, kademlia, identify, ping })
            })?
            .build();

        let listen_addr: Multiaddr = config.listen_addr.parse()?;
        swarm.listen_on(listen_addr)?;

        for addr_str in &config.bootstrap_peers {
            if let Ok(addr) = addr_str.parse::<Multiaddr>() {
                if let Some(libp2p::multiaddr::Protocol::P2p(peer_id)) = addr.iter().last() {
                    swarm.behaviour_mut().kademlia.add_address(&peer_id, addr.clone());
                    debug!(peer = %peer_id, "added bootstrap peer");
                }
            }
        }

        let local_peer_id = *swarm.local_peer_id();
        let (command_tx, command_rx) = mpsc::channel(256);
        let (inbound_tx, inbound_rx) = mpsc::channel(256);

        let network = BusNetwork { swarm, command_rx, inbound_tx };
        let handle = BusHandle { command_tx, inbound_rx, local_peer_id };

        Ok((network, handle))
    }

    /// Drives the gossip event loop. Run in a dedicated tokio task.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        BusCommand::Publish { subject, bytes } => {
                            let topic = gossipsub::IdentTopic::new(gossip_topic_for_subject(&subject));
                            if let Err(e) = self.swarm.behaviour_mut().gossipsub.publish(topic, bytes) {
                                warn!(error = %e, subject, "gossipsub publish failed");
                            }
                        }
                        BusCommand::Subscribe { subject } => {
                            let topic = gossipsub::IdentTopic::new(gossip_topic_for_subject(&subject));
                            if let Err(e) = self.swarm.behaviour_mut().gossipsub.subscribe(&topic) {
                                warn!(error = %e, subject, "gossipsub subscribe failed");
                            }
                        }
                    }
                }

                event = self.swarm.select_next_some() => {
                    match event {
                        SwarmEvent::NewListenAddr { address, .. } => {
                            info!(addr = %address, "bus listening on");
                        }
                        SwarmEvent::Behaviour(SwarmxBehaviourEvent::Gossipsub(
                            gossipsub::Event::Message { message, .. },
                        )) => {
                            let subject = message.topic.to_string();
                            let _ = self.inbound_tx.send(InboundMessage { subject, bytes: message.data }).await;
                        }
                        SwarmEvent::Behaviour(SwarmxBehaviourEvent::Identify(
                            identify::Event::Received { peer_id, info, .. },
                        )) => {
                            for addr in info.listen_addrs {
                                self.swarm.behaviour_mut().kademlia.add_address(&peer_id, addr);
                            }
                        }
                        SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                            debug!(peer = %peer_id, "connection established");
                        }
                        SwarmEvent::ConnectionClosed { peer_id, .. } => {
                            debug!(peer = %peer_id, "connection closed");
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}
