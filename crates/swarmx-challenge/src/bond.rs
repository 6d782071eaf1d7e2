use swarmx_core::{Complexity, ProofType};

/// Base bond per proof type, spec §4.10.
fn base_bond(proof_type: ProofType) -> i64 {
    match proof_type {
        ProofType::SchemaViolation => 10,
        ProofType::MissingCitation => 25,
        ProofType::SemanticContradiction => 50,
        ProofType::OutputMismatch => 100,
        ProofType::PolicyBreach => 100,
    }
}

/// Complexity multiplier, spec §4.10.
fn complexity_multiplier(complexity: Complexity) -> i64 {
    match complexity {
        Complexity::Simple => 1,
        Complexity::Moderate => 2,
        Complexity::Complex => 5,
    }
}

/// `bond = base(proof_type) * multiplier(complexity)`, escrowed at
/// challenge submission.
pub fn required_bond(proof_type: ProofType, complexity: Complexity) -> i64 {
    base_bond(proof_type) * complexity_multiplier(complexity)
}
