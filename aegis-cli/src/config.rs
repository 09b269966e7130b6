//! TOML configuration for the toolchain.
//!
//! ```toml
//! [compiler]
//! max_source_bytes = 65536
//!
//! [vm]
//! coherence_time_ms = 500
//! seed = 7
//! ```
//!
//! Every field is optional; missing ones take their defaults.

use crate::error::ConfigError;
use aegis_compiler::CompilerLimits;
use aegis_vm::VmConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AegisConfig {
    pub compiler: CompilerLimits,
    pub vm: VmConfig,
}

impl AegisConfig {
    /// Load from `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = [
            ("compiler.explainability_threshold", self.compiler.explainability_threshold),
            ("vm.explainability_threshold", self.vm.explainability_threshold),
            ("vm.high_risk_threshold", self.vm.high_risk_threshold),
        ];
        for (key, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{key} must be within 0..=1, got {value}"
                )));
            }
        }
        if self.compiler.max_source_bytes == 0 {
            return Err(ConfigError::Invalid(
                "compiler.max_source_bytes must be non-zero".to_string(),
            ));
        }
        if self.vm.coherence_time_ms == 0 {
            return Err(ConfigError::Invalid(
                "vm.coherence_time_ms must be non-zero".to_string(),
            ));
        }
        if self.vm.local_node.is_empty() {
            return Err(ConfigError::Invalid("vm.local_node must be set".to_string()));
        }
        Ok(())
    }
}
