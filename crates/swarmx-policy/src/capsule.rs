use std::collections::HashMap;

use swarmx_core::SwarmError;
use swarmx_crypto::{sha256_hex, verify_signature, KeyPair};

use crate::preflight::{ALLOWED_KINDS, MAX_PAYLOAD_SIZE, REQUIRED_FIELDS};

/// A cryptographically signed policy distribution unit (§4.6), ported
/// from `original_source/src/policy/capsule.py::PolicyCapsule`. The
/// source signs with a SHA-256-over-shared-secret stand-in; here the
/// signature is real Ed25519 over the same canonical bytes.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct PolicyCapsule {
    pub policy_engine_hash: String,
    pub policy_schema_version: String,
    pub conformance_vector: Vec<String>,
    pub signature: Option<Vec<u8>>,
    pub signer_pk: Option<Vec<u8>>,
    pub metadata: serde_json::Value,
}

impl PolicyCapsule {
    /// Canonical bytes for signing: excludes `signature`/`signer_pk`.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, SwarmError> {
        let mut vector = self.conformance_vector.clone();
        vector.sort();
        let unsigned = serde_json::json!({
            "policy_engine_hash": self.policy_engine_hash,
            "policy_schema_version": self.policy_schema_version,
            "conformance_vector": vector,
            "metadata": self.metadata,
        });
        serde_json::to_vec(&unsigned).map_err(|e| SwarmError::MalformedEnvelope(e.to_string()))
    }
}

/// Hashes the structural rule set a node currently enforces, the way
/// `create_capsule` hashes `OPAEngine.ALLOWED_KINDS`/`MAX_PAYLOAD_SIZE`/
/// `REQUIRED_FIELDS` when no WASM policy file is supplied.
pub fn current_ruleset_hash(schema_version: &str) -> String {
    let mut allowed_kinds: Vec<String> = ALLOWED_KINDS.iter().map(|k| format!("{k:?}")).collect();
    allowed_kinds.sort();
    let mut required_fields: Vec<&str> = REQUIRED_FIELDS.to_vec();
    required_fields.sort();

    let repr = serde_json::json!({
        "allowed_kinds": allowed_kinds,
        "max_payload_size": MAX_PAYLOAD_SIZE,
        "required_fields": required_fields,
        "version": schema_version,
    });
    let bytes = serde_json::to_vec(&repr).expect("static structure always serializes");
    sha256_hex(&bytes)
}

pub fn create_capsule(tests_passed: Vec<String>, schema_version: &str, metadata: serde_json::Value) -> PolicyCapsule {
    let mut conformance_vector = tests_passed;
    conformance_vector.sort();
    PolicyCapsule {
        policy_engine_hash: current_ruleset_hash(schema_version),
        policy_schema_version: schema_version.to_string(),
        conformance_vector,
        signature: None,
        signer_pk: None,
        metadata,
    }
}

pub fn sign_capsule(capsule: &PolicyCapsule, keypair: &KeyPair) -> Result<PolicyCapsule, SwarmError> {
    let bytes = capsule.canonical_bytes()?;
    let sig = keypair.sign(&bytes);
    Ok(PolicyCapsule {
        signature: Some(sig),
        signer_pk: Some(keypair.public_key_bytes().to_vec()),
        ..capsule.clone()
    })
}

pub fn verify_capsule(capsule: &PolicyCapsule) -> bool {
    let (sig, pk) = match (&capsule.signature, &capsule.signer_pk) {
        (Some(sig), Some(pk)) => (sig, pk),
        _ => return false,
    };
    let bytes = match capsule.canonical_bytes() {
        Ok(b) => b,
        Err(_) => return false,
    };
    verify_signature(pk, &bytes, sig).is_ok()
}

/// Tracks capsules received from peers. Replaces
/// `original_source`'s module-level `_capsule_manager` singleton — this
/// state lives on `swarmx_node::Node` instead (§9).
#[derive(Default)]
pub struct CapsuleManager {
    received: HashMap<String, PolicyCapsule>,
}

impl CapsuleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifies the signature and, if valid, stores the capsule keyed by
    /// its policy hash. Conformance-vector checking against a live
    /// checker is left to the caller (mirrors the source's optional
    /// `conformance_checker` argument).
    pub fn receive(&mut self, capsule: PolicyCapsule) -> bool {
        if !verify_capsule(&capsule) {
            return false;
        }
        self.received.insert(capsule.policy_engine_hash.clone(), capsule);
        true
    }

    pub fn get(&self, policy_hash: &str) -> Option<&PolicyCapsule> {
        self.received.get(policy_hash)
    }

    pub fn list(&self) -> impl Iterator<Item = &PolicyCapsule> {
        self.received.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_roundtrips() {
        let kp = KeyPair::generate();
        let capsule = create_capsule(vec!["t1".into(), "t2".into()], "1.0.0", serde_json::json!({}));
        let signed = sign_capsule(&capsule, &kp).unwrap();
        assert!(verify_capsule(&signed));
    }

    #[test]
    fn tampered_capsule_fails_verification() {
        let kp = KeyPair::generate();
        let capsule = create_capsule(vec!["t1".into()], "1.0.0", serde_json::json!({}));
        let mut signed = sign_capsule(&capsule, &kp).unwrap();
        signed.policy_schema_version = "2.0.0".into();
        assert!(!verify_capsule(&signed));
    }

    #[test]
    fn manager_rejects_unsigned_capsule() {
        let capsule = create_capsule(vec!["t1".into()], "1.0.0", serde_json::json!({}));
        let mut mgr = CapsuleManager::new();
        assert!(!mgr.receive(capsule));
    }
}
