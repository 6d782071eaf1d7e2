use ed25519_dalek::{Signer as _, SigningKey, Verifier as _, VerifyingKey, Signature};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use swarmx_core::{AccountId, SwarmError};

use crate::hash::account_id_from_pubkey;

/// A swarmx keypair: Ed25519 public + secret keys with a derived
/// `AccountId`. The secret key is held in a `Zeroizing` buffer to wipe
/// memory on drop.
#[derive(Serialize, Deserialize)]
pub struct KeyPair {
    pub account_id: AccountId,
    pub public_key: Vec<u8>,
    secret_key: Vec<u8>,
}

impl KeyPair {
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        let signing_key = SigningKey::generate(&mut csprng);
        let pk_bytes = signing_key.verifying_key().to_bytes().to_vec();
        let account_id = account_id_from_pubkey(&pk_bytes);
        Self {
            account_id,
            public_key: pk_bytes,
            secret_key: signing_key.to_bytes().to_vec(),
        }
    }

    pub fn from_raw(pk_bytes: Vec<u8>, sk_bytes: Vec<u8>) -> Self {
        let account_id = account_id_from_pubkey(&pk_bytes);
        Self {
            account_id,
            public_key: pk_bytes,
            secret_key: sk_bytes,
        }
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let sk_bytes: [u8; 32] = Zeroizing::new(self.secret_key.clone())
            .as_slice()
            .try_into()
            .expect("secret key is 32 bytes");
        let signing_key = SigningKey::from_bytes(&sk_bytes);
        signing_key.sign(message).to_bytes().to_vec()
    }

    pub fn public_key_bytes(&self) -> &[u8] {
        &self.public_key
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        self.secret_key.zeroize_secret();
    }
}

trait ZeroizeVec {
    fn zeroize_secret(&mut self);
}
impl ZeroizeVec for Vec<u8> {
    fn zeroize_secret(&mut self) {
        for b in self.iter_mut() {
            *b = 0;
        }
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("account_id", &self.account_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Verifies a raw Ed25519 signature against a raw public key, independent
/// of the envelope canonicalization layer (used by `envelope::verify` and
/// by `swarmx-policy`'s capsule signing).
pub fn verify_signature(pk_bytes: &[u8], message: &[u8], sig_bytes: &[u8]) -> Result<(), SwarmError> {
    let pk: [u8; 32] = pk_bytes.try_into().map_err(|_| SwarmError::InvalidSignature)?;
    let verifying_key = VerifyingKey::from_bytes(&pk).map_err(|_| SwarmError::InvalidSignature)?;
    let sig_arr: [u8; 64] = sig_bytes.try_into().map_err(|_| SwarmError::InvalidSignature)?;
    let sig = Signature::from_bytes(&sig_arr);
    verifying_key
        .verify(message, &sig)
        .map_err(|_| SwarmError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_roundtrips() {
        let kp = KeyPair::generate();
        let msg = b"hello swarm";
        let sig = kp.sign(msg);
        assert!(verify_signature(kp.public_key_bytes(), msg, &sig).is_ok());
    }

    #[test]
    fn tampered_message_fails_verification() {
        let kp = KeyPair::generate();
        let sig = kp.sign(b"original");
        assert!(verify_signature(kp.public_key_bytes(), b"tampered", &sig).is_err());
    }
}
