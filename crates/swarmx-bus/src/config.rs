/// Configuration for the swarmx gossip transport. Unlike a single fixed
/// gossip topic, subjects are per-role (`swarmx.<role>`), with thread
/// scoping carried in the envelope body rather than the topic string.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Local listen address (e.g. "/ip4/0.0.0.0/tcp/7777").
    pub listen_addr: String,
    /// Bootstrap peer multiaddresses.
    pub bootstrap_peers: Vec<String>,
    /// Protocol version string advertised to peers via `identify`.
    pub protocol_version: String,
    /// Maximum number of concurrent in-flight publishes (§4.7 ambient
    /// supplement, ported from `bus.py::ConnectionPool(max_size=10)`).
    pub max_pool_size: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            listen_addr: "/ip4/0.0.0.0/tcp/7000".into(),
            bootstrap_peers: Vec::new(),
            protocol_version: "/swarmx/1.0.0".into(),
            max_pool_size: 10,
        }
    }
}
