//! Policy gate triplet (spec §4.6): preflight, ingress, commit-gate, plus
//! signed policy capsule distribution.

pub mod capsule;
pub mod commit;
pub mod ingress;
pub mod preflight;
pub mod result;

pub use capsule::{create_capsule, current_ruleset_hash, sign_capsule, verify_capsule, CapsuleManager, PolicyCapsule};
pub use commit::{CommitGate, ResourceClaim};
pub use ingress::IngressGate;
pub use preflight::{PreflightGate, ALLOWED_KINDS, MAX_PAYLOAD_SIZE, POLICY_VERSION, REQUIRED_FIELDS};
pub use result::PolicyResult;

pub use swarmx_crypto::{policy_eval_digest, verify_eval_digest};
