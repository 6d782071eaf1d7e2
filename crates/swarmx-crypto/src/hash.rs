use sha2::{Digest, Sha256};
use swarmx_core::{AccountId, EvidenceHash, PayloadHash};

/// SHA-256 of arbitrary bytes, lowercase hex — the hash function used
/// throughout (CAS keys, `payload_hash`, policy eval digest, Merkle
/// leaves), per spec §4.1/§4.2/§6.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(sha256(bytes))
}

pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

pub fn payload_hash(canonical_payload: &[u8]) -> PayloadHash {
    PayloadHash::from_bytes(sha256(canonical_payload))
}

pub fn evidence_hash(evidence: &[u8]) -> EvidenceHash {
    EvidenceHash::from_bytes(sha256(evidence))
}

/// Derives an account id from a public key, the same role
/// `account_id_from_pubkey` plays in the teacher crate (there: BLAKE3 of a
/// Dilithium key; here: SHA-256 of an Ed25519 key, per the crypto-stack
/// swap documented in DESIGN.md).
pub fn account_id_from_pubkey(pk_bytes: &[u8]) -> AccountId {
    AccountId::from_bytes(sha256(pk_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_is_64_chars() {
        assert_eq!(sha256_hex(b"hello").len(), 64);
    }

    #[test]
    fn put_is_deterministic() {
        assert_eq!(sha256_hex(b"same"), sha256_hex(b"same"));
        assert_ne!(sha256_hex(b"same"), sha256_hex(b"different"));
    }
}
