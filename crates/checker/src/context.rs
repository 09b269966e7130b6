//! The state constraints are evaluated against.
//!
//! The checker implements [`ConstraintContext`] over its replay of the
//! program; the interpreter implements it over its live tables. Both
//! evaluate the same [`crate::Constraint`] values.

use aegis_common::{ComplianceStatus, Criticality, OversightLevel};
use serde::{Deserialize, Serialize};

/// Safety attributes of an entity as seen by a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntityView {
    pub explainability: f64,
    pub oversight: OversightLevel,
    pub criticality: Criticality,
    pub compliance: ComplianceStatus,
    /// An `approve` statement has been recorded for the entity.
    pub approved: bool,
}

impl Default for EntityView {
    fn default() -> Self {
        Self {
            explainability: aegis_common::ast::DEFAULT_EXPLAINABILITY,
            oversight: OversightLevel::default(),
            criticality: Criticality::default(),
            compliance: ComplianceStatus::default(),
            approved: false,
        }
    }
}

pub trait ConstraintContext {
    /// Number of consuming operations applied to `resource` so far.
    fn consumed_count(&self, resource: &str) -> usize;

    /// `resource` is backed by a tracked allocation.
    fn is_tracked(&self, resource: &str) -> bool;

    /// `resource` is still within its coherence budget.
    fn is_coherent(&self, resource: &str) -> bool;

    /// `resource` has taken part in an entanglement.
    fn was_entangled(&self, resource: &str) -> bool;

    fn entity(&self, name: &str) -> Option<EntityView>;
}
