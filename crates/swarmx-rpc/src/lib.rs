//! JSON-RPC query/control surface (§4 passim): read access to accounts,
//! tasks, auctions, challenges and checkpoints, plus envelope submission
//! and network identity, served over `jsonrpsee` behind permissive CORS.

pub mod api;
pub mod server;
pub mod types;

pub use api::SwarmApiServer;
pub use server::{RpcServer, RpcServerState};
