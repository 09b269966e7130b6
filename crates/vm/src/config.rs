//! Interpreter configuration.

use aegis_common::{EXPLAINABILITY_THRESHOLD, HIGH_RISK_THRESHOLD};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Lifetime of a handle before it decoheres, reset by entanglement.
    pub coherence_time_ms: u64,
    /// Seed for the demonstration physics.
    pub seed: u64,
    pub explainability_threshold: f64,
    /// Threshold for operations classified `critical` or above.
    pub high_risk_threshold: f64,
    /// Name of the node this session runs on.
    pub local_node: String,
    /// Step ceiling; exceeding it aborts the run.
    pub max_steps: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            coherence_time_ms: 10_000,
            seed: 42,
            explainability_threshold: EXPLAINABILITY_THRESHOLD,
            high_risk_threshold: HIGH_RISK_THRESHOLD,
            local_node: "local".to_string(),
            max_steps: 1_000_000,
        }
    }
}
