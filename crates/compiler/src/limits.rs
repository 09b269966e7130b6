//! Compiler resource ceilings.

use aegis_checker::{CheckerOptions, DEFAULT_MAX_COHERENT_OPERATIONS};
use aegis_common::EXPLAINABILITY_THRESHOLD;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerLimits {
    /// Inputs longer than this are rejected without tokenizing.
    pub max_source_bytes: usize,
    /// Token count above which a performance warning is issued.
    pub performance_warning_tokens: usize,
    /// Unrecognized keywords reported individually before the rest are
    /// summarised in one warning.
    pub max_unknown_keyword_warnings: usize,
    /// Interactions a handle tolerates before the checker warns.
    pub max_coherent_operations: usize,
    pub explainability_threshold: f64,
}

impl Default for CompilerLimits {
    fn default() -> Self {
        Self {
            max_source_bytes: 1 << 20,
            performance_warning_tokens: 10_000,
            max_unknown_keyword_warnings: 20,
            max_coherent_operations: DEFAULT_MAX_COHERENT_OPERATIONS,
            explainability_threshold: EXPLAINABILITY_THRESHOLD,
        }
    }
}

impl CompilerLimits {
    pub fn checker_options(&self) -> CheckerOptions {
        CheckerOptions {
            explainability_threshold: self.explainability_threshold,
            max_coherent_operations: self.max_coherent_operations,
        }
    }
}
