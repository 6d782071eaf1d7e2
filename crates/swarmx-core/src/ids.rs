use serde::{Deserialize, Serialize};
use std::fmt;

/// Nanosecond Unix timestamp, as carried on every envelope (`ts_ns`).
pub type TimestampNs = i64;

/// Per-sender Lamport logical clock value.
pub type Lamport = u64;

macro_rules! hex_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub fn from_bytes(b: [u8; 32]) -> Self {
                Self(b)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let bytes = hex::decode(s)?;
                let mut arr = [0u8; 32];
                if bytes.len() != 32 {
                    return Err(hex::FromHexError::InvalidStringLength);
                }
                arr.copy_from_slice(&bytes);
                Ok(Self(arr))
            }

            /// Random id, for tests and simulator seeding.
            pub fn random() -> Self {
                let uuid_bytes = uuid::Uuid::new_v4();
                let mut arr = [0u8; 32];
                arr[..16].copy_from_slice(uuid_bytes.as_bytes());
                arr[16..].copy_from_slice(uuid_bytes.as_bytes());
                Self(arr)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}…)", stringify!($name), &self.to_hex()[..8])
            }
        }
    };
}

hex_id!(EnvelopeId, "UUID of an envelope, rendered as hex.");
hex_id!(OpId, "Globally unique identifier of a PlanOp.");
hex_id!(TaskId, "Identifier of a derived Task.");
hex_id!(EvidenceHash, "SHA-256 hash of challenge evidence.");
hex_id!(PayloadHash, "SHA-256 hash of a canonical envelope payload.");

/// Account identifier: base58, following the teacher's AccountId convention
/// (distinguished from the hex ids above because it is user-facing).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_b58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    pub fn from_b58(s: &str) -> Result<Self, bs58::decode::Error> {
        let bytes = bs58::decode(s).into_vec()?;
        let mut arr = [0u8; 32];
        if bytes.len() != 32 {
            return Err(bs58::decode::Error::BufferTooSmall);
        }
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_b58())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({}…)", &self.to_b58()[..8.min(self.to_b58().len())])
    }
}

/// DID: an agent's portable identity. Reputation is keyed on this alone —
/// `verifier_id` anywhere else in the system is treated as an alias of it,
/// per the spec's reputation-coupling design note.
pub type Did = AccountId;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_id_roundtrip() {
        let id = OpId::from_bytes([7u8; 32]);
        let s = id.to_hex();
        assert_eq!(OpId::from_hex(&s).unwrap(), id);
    }

    #[test]
    fn account_id_roundtrip() {
        let id = AccountId::from_bytes([9u8; 32]);
        let s = id.to_b58();
        assert_eq!(AccountId::from_b58(&s).unwrap(), id);
    }
}
