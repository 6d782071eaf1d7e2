/// Outcome of any policy gate (§4.6).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PolicyResult {
    pub allowed: bool,
    pub reasons: Vec<String>,
    pub policy_version: String,
    pub gas_used: u64,
}

impl PolicyResult {
    pub fn allow(policy_version: impl Into<String>, gas_used: u64) -> Self {
        Self {
            allowed: true,
            reasons: Vec::new(),
            policy_version: policy_version.into(),
            gas_used,
        }
    }

    pub fn deny(reason: impl Into<String>, policy_version: impl Into<String>, gas_used: u64) -> Self {
        Self {
            allowed: false,
            reasons: vec![reason.into()],
            policy_version: policy_version.into(),
            gas_used,
        }
    }
}
