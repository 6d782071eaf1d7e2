use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use swarmx_core::ProofType;

/// Result of verifying a challenge proof, ported from
/// `original_source/src/challenges/verification.py::VerificationResult`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerificationResult {
    pub is_valid: bool,
    pub gas_used: u64,
    pub reason: String,
    pub evidence: Value,
}

/// Deterministic, gas-metered verification for each challenge proof type,
/// ported from `original_source/src/challenges/verification.py::ChallengeVerifier`.
pub struct ChallengeVerifier {
    gas_limit: u64,
}

const GAS_BASE: u64 = 1000;
const GAS_PER_FIELD: u64 = 100;
const GAS_PER_CITATION: u64 = 200;
const GAS_CONTRADICTION_ANALYSIS: u64 = 5000;

impl ChallengeVerifier {
    pub fn new(gas_limit: u64) -> Self {
        Self { gas_limit }
    }

    pub fn verify_proof(&self, proof_type: ProofType, evidence: &Value) -> VerificationResult {
        match proof_type {
            ProofType::SchemaViolation => self.verify_schema_violation(evidence),
            ProofType::MissingCitation => self.verify_missing_citation(evidence),
            ProofType::SemanticContradiction => self.verify_semantic_contradiction(evidence),
            ProofType::OutputMismatch => self.verify_output_mismatch(evidence),
            ProofType::PolicyBreach => self.verify_policy_breach(evidence),
        }
    }

    fn verify_schema_violation(&self, evidence: &Value) -> VerificationResult {
        let mut gas_used = GAS_BASE;
        let expected_schema = evidence.get("expected_schema").and_then(Value::as_object);
        let actual_output = evidence.get("actual_output").and_then(Value::as_object);
        let claimed_violations = evidence.get("violations").and_then(Value::as_array).cloned().unwrap_or_default();

        let (expected_schema, actual_output) = match (expected_schema, actual_output) {
            (Some(s), Some(o)) if !s.is_empty() && !o.is_empty() => (s, o),
            _ => {
                return VerificationResult {
                    is_valid: false,
                    gas_used,
                    reason: "missing expected_schema or actual_output".to_string(),
                    evidence: Value::Null,
                }
            }
        };

        let mut violations_found = Vec::new();
        for field in claimed_violations.iter().filter_map(Value::as_str) {
            gas_used += GAS_PER_FIELD;

            let Some(field_schema) = expected_schema.get(field) else { continue };
            let expected_type = field_schema.get("type").and_then(Value::as_str);
            let actual_value = actual_output.get(field);

            match actual_value {
                None | Some(Value::Null) => violations_found.push(format!("{field}: missing")),
                Some(value) => {
                    if let Some(expected_type) = expected_type {
                        if !check_type(value, expected_type) {
                            violations_found.push(format!("{field}: expected {expected_type}"));
                        }
                    }
                }
            }
        }

        let is_valid = !violations_found.is_empty();
        VerificationResult {
            is_valid,
            gas_used: gas_used.min(self.gas_limit),
            reason: if is_valid {
                format!("found {} schema violations", violations_found.len())
            } else {
                "no violations found".to_string()
            },
            evidence: serde_json::json!({ "violations_found": violations_found }),
        }
    }

    fn verify_missing_citation(&self, evidence: &Value) -> VerificationResult {
        let mut gas_used = GAS_BASE;
        let required: Vec<String> = evidence
            .get("required_citations")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let provided: HashSet<String> = evidence
            .get("provided_citations")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let mut missing = Vec::new();
        for citation_id in &required {
            gas_used += GAS_PER_CITATION;
            if !provided.contains(citation_id) {
                missing.push(citation_id.clone());
            }
        }

        let is_valid = !missing.is_empty();
        VerificationResult {
            is_valid,
            gas_used: gas_used.min(self.gas_limit),
            reason: if is_valid {
                format!("found {} missing citations", missing.len())
            } else {
                "all citations present".to_string()
            },
            evidence: serde_json::json!({ "missing_citations": missing }),
        }
    }

    fn verify_semantic_contradiction(&self, evidence: &Value) -> VerificationResult {
        let gas_used = GAS_BASE + GAS_CONTRADICTION_ANALYSIS;
        let statements: Vec<String> = evidence
            .get("statements")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let contradiction_type = evidence.get("contradiction_type").and_then(Value::as_str).unwrap_or("unknown");

        if statements.len() < 2 {
            return VerificationResult {
                is_valid: false,
                gas_used,
                reason: "need at least 2 statements to detect contradiction".to_string(),
                evidence: Value::Null,
            };
        }

        let mut contradictions_found = Vec::new();
        for i in 0..statements.len() {
            for j in (i + 1)..statements.len() {
                if detect_simple_contradiction(&statements[i], &statements[j]) {
                    contradictions_found.push(serde_json::json!({
                        "statement1": statements[i],
                        "statement2": statements[j],
                        "type": contradiction_type,
                    }));
                }
            }
        }

        let is_valid = !contradictions_found.is_empty();
        VerificationResult {
            is_valid,
            gas_used: gas_used.min(self.gas_limit),
            reason: if is_valid {
                format!("found {} contradictions", contradictions_found.len())
            } else {
                "no contradictions found".to_string()
            },
            evidence: serde_json::json!({ "contradictions": contradictions_found }),
        }
    }

    fn verify_output_mismatch(&self, evidence: &Value) -> VerificationResult {
        let mut gas_used = GAS_BASE;
        let specified = evidence.get("specified_output").cloned().unwrap_or(Value::Null);
        let actual = evidence.get("actual_output").cloned().unwrap_or(Value::Null);
        let claimed_fields = evidence.get("mismatch_fields").and_then(Value::as_array).cloned().unwrap_or_default();

        let mut mismatches_found = Vec::new();
        for field in claimed_fields.iter().filter_map(Value::as_str) {
            gas_used += GAS_PER_FIELD;
            let specified_value = specified.get(field).cloned().unwrap_or(Value::Null);
            let actual_value = actual.get(field).cloned().unwrap_or(Value::Null);
            if specified_value != actual_value {
                mismatches_found.push(serde_json::json!({
                    "field": field,
                    "specified": specified_value,
                    "actual": actual_value,
                }));
            }
        }

        let is_valid = !mismatches_found.is_empty();
        VerificationResult {
            is_valid,
            gas_used: gas_used.min(self.gas_limit),
            reason: if is_valid {
                format!("found {} output mismatches", mismatches_found.len())
            } else {
                "output matches specification".to_string()
            },
            evidence: serde_json::json!({ "mismatches": mismatches_found }),
        }
    }

    fn verify_policy_breach(&self, evidence: &Value) -> VerificationResult {
        let gas_used = GAS_BASE + GAS_PER_FIELD * 3;
        let policy_rule = evidence.get("policy_rule").and_then(Value::as_str);
        let violation_details = evidence.get("violation_details").and_then(Value::as_object);

        let Some(policy_rule) = policy_rule else {
            return VerificationResult {
                is_valid: false,
                gas_used,
                reason: "no policy rule specified".to_string(),
                evidence: Value::Null,
            };
        };

        let is_valid = violation_details.map(|d| !d.is_empty()).unwrap_or(false);
        VerificationResult {
            is_valid,
            gas_used: gas_used.min(self.gas_limit),
            reason: if is_valid {
                format!("policy breach confirmed: {policy_rule}")
            } else {
                "no policy breach detected".to_string()
            },
            evidence: serde_json::json!({ "policy_rule": policy_rule }),
        }
    }
}

fn check_type(value: &Value, expected_type: &str) -> bool {
    match expected_type.to_lowercase().as_str() {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}

const OPPOSING_PAIRS: &[(&str, &str)] = &[
    (" is ", " is not "),
    (" true", " false"),
    (" yes", " no"),
    (" correct", " incorrect"),
    (" valid", " invalid"),
];

fn detect_simple_contradiction(stmt1: &str, stmt2: &str) -> bool {
    let a = stmt1.to_lowercase();
    let b = stmt2.to_lowercase();

    for (pos, neg) in OPPOSING_PAIRS {
        if (a.contains(pos) && b.contains(neg)) || (a.contains(neg) && b.contains(pos)) {
            let words_a: HashSet<&str> = a.split_whitespace().collect();
            let words_b: HashSet<&str> = b.split_whitespace().collect();
            if words_a.intersection(&words_b).count() >= 3 {
                return true;
            }
        }
    }
    false
}
