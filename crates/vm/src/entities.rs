//! AI entities known to a session.

use aegis_checker::EntityView;
use aegis_common::ast::DEFAULT_EXPLAINABILITY;
use aegis_common::{ComplianceStatus, Criticality, OversightLevel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type EntityTable = BTreeMap<String, AiEntity>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiEntity {
    pub name: String,
    pub explainability: f64,
    pub oversight: OversightLevel,
    pub criticality: Criticality,
    pub compliance: ComplianceStatus,
    pub approved: bool,
    /// Targets this entity was deployed to.
    pub deployments: Vec<String>,
    pub decisions: Vec<String>,
}

impl AiEntity {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            explainability: DEFAULT_EXPLAINABILITY,
            oversight: OversightLevel::default(),
            criticality: Criticality::default(),
            compliance: ComplianceStatus::default(),
            approved: false,
            deployments: Vec::new(),
            decisions: Vec::new(),
        }
    }

    pub fn view(&self) -> EntityView {
        EntityView {
            explainability: self.explainability,
            oversight: self.oversight,
            criticality: self.criticality,
            compliance: self.compliance,
            approved: self.approved,
        }
    }
}
