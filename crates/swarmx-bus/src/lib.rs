//! Signed-envelope message bus (spec §4.7): gossipsub transport, the
//! publish/subscribe validate-then-gate pipeline, and subject naming.

pub mod behaviour;
pub mod bus;
pub mod config;
pub mod network;
pub mod pool;
pub mod topic;

pub use bus::{AuditKind, BusAuditEntry, BusTransport, InMemoryTransport, MessageBus};
pub use config::BusConfig;
pub use network::{BusCommand, BusHandle, BusNetwork, InboundMessage};
pub use pool::ConnectionPool;
pub use topic::{parse_subject, role_from_gossip_topic, thread_subject, KNOWN_ROLES};
