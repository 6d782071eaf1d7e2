use libp2p::swarm::NetworkBehaviour;
use libp2p::{gossipsub, identify, kad, ping};

/// Combined libp2p network behaviour for the bus transport: gossipsub for
/// envelope fan-out, Kademlia for peer discovery, identify/ping for
/// connection metadata and liveness. The `#[derive(NetworkBehaviour)]`
/// macro generates a `SwarmxBehaviourEvent` enum with one variant per
/// field.
#[derive(NetworkBehaviour)]
pub struct SwarmxBehaviour {
    pub gossipsub: gossipsub::Behaviour,
    pub kademlia: kad::Behaviour<kad::store::MemoryStore>,
    pub identify: identify::Behaviour,
    pub ping: ping::Behaviour,
}
