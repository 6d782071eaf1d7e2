//! Hashing, signing, and envelope canonicalization (spec §4.1, §4.2).
//!
//! Replaces the teacher's BLAKE3/Dilithium2 pair with SHA-256/Ed25519, per
//! the spec's explicit hash and signature choices (DESIGN.md).

pub mod envelope;
pub mod hash;
pub mod keypair;

pub use envelope::{canonical_bytes, canonical_payload_hash, policy_eval_digest, sign, verify, verify_eval_digest};
pub use hash::{account_id_from_pubkey, evidence_hash, payload_hash, sha256, sha256_hex};
pub use keypair::{verify_signature, KeyPair};
