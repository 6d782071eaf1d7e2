//! Checkpoint, Merkle proofs, and pruning (§4.12); the sync protocol and
//! fast-sync continuity verification (§4.13).

pub mod checkpoint;
pub mod compression;
pub mod merkle;
pub mod pruning;
pub mod sync;

pub use checkpoint::{add_signature, compute_hash, create_checkpoint};
pub use compression::{compress, decompress};
pub use merkle::{verify_proof, MerkleProof, MerkleTree};
pub use pruning::PruningManager;
pub use sync::{discover_sync_peers, ops_unknown_to_peer, ContinuityVerifier, PeerCapabilities, SyncOpRef, PLAN_SYNC_PROTOCOL};
