use swarmx_core::{Envelope, PayloadHash, SwarmError};

use crate::hash::{payload_hash, sha256_hex};
use crate::keypair::{verify_signature, KeyPair};

/// Deterministic serialization with sorted keys, UTF-8, no insignificant
/// whitespace (§4.2). `serde_json` with a `BTreeMap`-backed `Value` already
/// sorts object keys on serialization, so `to_string` on the body is
/// canonical as long as the body's own nested payload was built the same
/// way — `serde_json::Value` objects are backed by a `BTreeMap` by default
/// in this workspace (no `preserve_order` feature enabled anywhere).
pub fn canonical_bytes(body: &swarmx_core::EnvelopeBody) -> Result<Vec<u8>, SwarmError> {
    serde_json::to_vec(body).map_err(|e| SwarmError::MalformedEnvelope(e.to_string()))
}

/// Computes `payload_hash` over the canonical JSON encoding of just the
/// payload (not the whole body) — this is what envelope producers hash
/// before constructing the body, and what `verify` recomputes.
pub fn canonical_payload_hash(payload: &serde_json::Value) -> Result<PayloadHash, SwarmError> {
    let bytes =
        serde_json::to_vec(payload).map_err(|e| SwarmError::MalformedEnvelope(e.to_string()))?;
    Ok(payload_hash(&bytes))
}

/// `sign(env, sk) -> env'`: computes canonical bytes over the body and
/// signs with Ed25519, embedding `sig`. Excludes `sig`/`policy_decision`/
/// `policy_eval_digest` from the signed bytes by construction — those
/// fields live outside `EnvelopeBody`.
pub fn sign(mut env: Envelope, keypair: &KeyPair) -> Result<Envelope, SwarmError> {
    let bytes = canonical_bytes(&env.body)?;
    env.sig = Some(keypair.sign(&bytes));
    Ok(env)
}

/// `verify(env)`: recomputes canonical bytes, validates `sig` against
/// `sender_pk`, and checks `payload_hash`.
pub fn verify(env: &Envelope) -> Result<(), SwarmError> {
    let sig = env.sig.as_ref().ok_or(SwarmError::InvalidSignature)?;
    let bytes = canonical_bytes(&env.body)?;
    verify_signature(&env.body.sender_pk, &bytes, sig)?;

    let expected = canonical_payload_hash(&env.body.payload)?;
    if expected != env.body.payload_hash {
        return Err(SwarmError::PayloadHashMismatch);
    }
    Ok(())
}

/// `policy_eval_digest = sha256(canonical_json({input, decision,
/// policy_hash}))`, per spec §6. `verify_eval_digest` recomputes and
/// compares.
pub fn policy_eval_digest(
    input: &serde_json::Value,
    decision: bool,
    policy_hash: &str,
) -> Result<String, SwarmError> {
    let obj = serde_json::json!({
        "input": input,
        "decision": decision,
        "policy_hash": policy_hash,
    });
    let bytes = serde_json::to_vec(&obj).map_err(|e| SwarmError::MalformedEnvelope(e.to_string()))?;
    Ok(sha256_hex(&bytes))
}

pub fn verify_eval_digest(
    digest: &str,
    input: &serde_json::Value,
    decision: bool,
    policy_hash: &str,
) -> Result<bool, SwarmError> {
    Ok(policy_eval_digest(input, decision, policy_hash)? == digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmx_core::{EnvelopeBody, EnvelopeId, EnvelopeKind};

    fn make_body(kp: &KeyPair, payload: serde_json::Value) -> EnvelopeBody {
        EnvelopeBody {
            v: 1,
            id: EnvelopeId::random(),
            thread_id: "t1".into(),
            kind: EnvelopeKind::Need,
            lamport: 1,
            ts_ns: 0,
            sender_pk: kp.public_key_bytes().to_vec(),
            payload_hash: canonical_payload_hash(&payload).unwrap(),
            payload,
        }
    }

    #[test]
    fn sign_then_verify_roundtrips() {
        let kp = KeyPair::generate();
        let body = make_body(&kp, serde_json::json!({"budget": 500}));
        let env = sign(Envelope::unsigned(body), &kp).unwrap();
        assert!(verify(&env).is_ok());
    }

    #[test]
    fn tampered_payload_hash_fails() {
        let kp = KeyPair::generate();
        let mut body = make_body(&kp, serde_json::json!({"budget": 500}));
        body.payload_hash = canonical_payload_hash(&serde_json::json!({"budget": 999})).unwrap();
        let env = sign(Envelope::unsigned(body), &kp).unwrap();
        // sig is valid over the (tampered) body bytes, but payload_hash no
        // longer matches the recomputed hash of the payload.
        assert_eq!(verify(&env), Err(SwarmError::PayloadHashMismatch));
    }

    #[test]
    fn eval_digest_roundtrips() {
        let input = serde_json::json!({"op": "ADD_TASK"});
        let digest = policy_eval_digest(&input, true, "policyhash").unwrap();
        assert!(verify_eval_digest(&digest, &input, true, "policyhash").unwrap());
        assert!(!verify_eval_digest(&digest, &input, false, "policyhash").unwrap());
    }
}
