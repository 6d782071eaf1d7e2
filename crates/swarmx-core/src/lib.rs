//! Shared data model, error kinds, and protocol configuration for the swarmx
//! coordination engine. Every other crate in the workspace depends on this
//! one; it depends on nothing workspace-internal.

pub mod clock;
pub mod config;
pub mod error;
pub mod ids;
pub mod model;

pub use clock::LamportClock;
pub use config::ProtocolConfig;
pub use error::{Result, SwarmError};
pub use ids::*;
pub use model::*;
