//! Constraints attached to inferred types.
//!
//! Each constraint is a kind with a typed payload plus the phase in which
//! it must hold. Evaluation is a pattern match over the kind against a
//! [`ConstraintContext`]; constraints never capture state of their own.

use crate::context::ConstraintContext;
use aegis_common::{Diagnostic, ErrorCategory, SourceLocation};
use serde::{Deserialize, Serialize};

/// When a constraint is evaluated relative to its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckPhase {
    /// Before the node takes effect.
    Pre,
    /// After the node takes effect.
    Post,
    /// Once, against the state at the end of the program. Only the static
    /// checker evaluates these.
    Final,
}

/// What a no-cloning constraint counts over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageScope {
    /// At most one consuming use across the whole program.
    Program,
    /// The operand has not been consumed yet.
    Operation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "constraint", rename_all = "snake_case")]
pub enum ConstraintKind {
    NoCloning {
        resource: String,
        scope: UsageScope,
    },
    MemorySafety {
        resource: String,
    },
    EntanglementConsistency {
        resource: String,
        partners: Vec<String>,
    },
    CoherencePreservation {
        resource: String,
    },
    Explainability {
        entity: String,
        threshold: f64,
    },
    Compliance {
        entity: String,
    },
    HumanOversight {
        entity: String,
    },
    HumanApproval {
        entity: String,
    },
}

/// A failed constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub category: ErrorCategory,
    pub message: String,
    pub suggestion: Option<String>,
}

impl Violation {
    fn new(category: ErrorCategory, message: String) -> Self {
        Self {
            category,
            message,
            suggestion: None,
        }
    }

    fn with_suggestion(mut self, suggestion: String) -> Self {
        self.suggestion = Some(suggestion);
        self
    }

    fn undeclared_entity(entity: &str) -> Self {
        Violation::new(
            ErrorCategory::Type,
            format!("entity '{entity}' is not declared"),
        )
        .with_suggestion(format!("declare it with `contract {entity}`"))
    }

    /// Render as an error when the constraint is required, else a warning.
    pub fn into_diagnostic(self, location: SourceLocation, required: bool) -> Diagnostic {
        let diagnostic = if required {
            Diagnostic::error(self.category, location, self.message)
        } else {
            Diagnostic::warning(self.category, location, self.message)
        };
        match self.suggestion {
            Some(help) => diagnostic.with_suggestion(help),
            None => diagnostic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub phase: CheckPhase,
    pub description: String,
    /// Failure of a required constraint is an error, otherwise a warning.
    pub required: bool,
}

impl Constraint {
    pub fn no_cloning(resource: &str, scope: UsageScope) -> Self {
        let (phase, description) = match scope {
            UsageScope::Program => (
                CheckPhase::Final,
                format!("'{resource}' is consumed at most once"),
            ),
            UsageScope::Operation => (
                CheckPhase::Pre,
                format!("'{resource}' has not been consumed"),
            ),
        };
        Self {
            kind: ConstraintKind::NoCloning {
                resource: resource.to_string(),
                scope,
            },
            phase,
            description,
            required: true,
        }
    }

    pub fn memory_safety(resource: &str, phase: CheckPhase) -> Self {
        Self {
            kind: ConstraintKind::MemorySafety {
                resource: resource.to_string(),
            },
            phase,
            description: format!("'{resource}' is backed by a tracked allocation"),
            required: true,
        }
    }

    pub fn entanglement_consistency(resource: &str, partners: Vec<String>) -> Self {
        Self {
            description: format!("every partner of '{resource}' is entangled"),
            kind: ConstraintKind::EntanglementConsistency {
                resource: resource.to_string(),
                partners,
            },
            phase: CheckPhase::Final,
            required: true,
        }
    }

    pub fn coherence_preservation(resource: &str) -> Self {
        Self {
            kind: ConstraintKind::CoherencePreservation {
                resource: resource.to_string(),
            },
            phase: CheckPhase::Pre,
            description: format!("'{resource}' is still coherent"),
            required: false,
        }
    }

    pub fn explainability(entity: &str, threshold: f64, phase: CheckPhase) -> Self {
        Self {
            kind: ConstraintKind::Explainability {
                entity: entity.to_string(),
                threshold,
            },
            phase,
            description: format!("'{entity}' is explainable to {threshold:.2}"),
            required: true,
        }
    }

    pub fn compliance(entity: &str, phase: CheckPhase) -> Self {
        Self {
            kind: ConstraintKind::Compliance {
                entity: entity.to_string(),
            },
            phase,
            description: format!("'{entity}' has not failed verification"),
            required: true,
        }
    }

    pub fn human_oversight(entity: &str, phase: CheckPhase) -> Self {
        Self {
            kind: ConstraintKind::HumanOversight {
                entity: entity.to_string(),
            },
            phase,
            description: format!("'{entity}' has a human in the loop when critical"),
            required: true,
        }
    }

    pub fn human_approval(entity: &str) -> Self {
        Self {
            kind: ConstraintKind::HumanApproval {
                entity: entity.to_string(),
            },
            phase: CheckPhase::Pre,
            description: format!("'{entity}' carries an explicit human approval"),
            required: true,
        }
    }

    /// Category reported when this constraint fails.
    pub fn category(&self) -> ErrorCategory {
        match self.kind {
            ConstraintKind::NoCloning { .. }
            | ConstraintKind::MemorySafety { .. }
            | ConstraintKind::EntanglementConsistency { .. }
            | ConstraintKind::CoherencePreservation { .. } => ErrorCategory::QuantumViolation,
            ConstraintKind::Explainability { .. }
            | ConstraintKind::Compliance { .. }
            | ConstraintKind::HumanOversight { .. }
            | ConstraintKind::HumanApproval { .. } => ErrorCategory::AiSafety,
        }
    }

    pub fn evaluate(&self, ctx: &dyn ConstraintContext) -> Result<(), Violation> {
        let category = self.category();
        match &self.kind {
            ConstraintKind::NoCloning { resource, scope } => {
                let used = ctx.consumed_count(resource);
                match scope {
                    UsageScope::Program if used > 1 => Err(Violation::new(
                        category,
                        format!("resource '{resource}' is consumed {used} times"),
                    )
                    .with_suggestion(
                        "declare a separate qudit for each measure, release or teleport"
                            .to_string(),
                    )),
                    UsageScope::Operation if used > 0 => Err(Violation::new(
                        category,
                        format!("resource '{resource}' was already consumed"),
                    )
                    .with_suggestion(
                        "a qudit cannot be used after it is measured, released or teleported"
                            .to_string(),
                    )),
                    _ => Ok(()),
                }
            }
            ConstraintKind::MemorySafety { resource } => {
                if ctx.is_tracked(resource) {
                    Ok(())
                } else {
                    Err(Violation::new(
                        category,
                        format!("resource '{resource}' is not backed by a live allocation"),
                    ))
                }
            }
            ConstraintKind::EntanglementConsistency { resource, partners } => {
                match partners.iter().find(|p| !ctx.was_entangled(p)) {
                    None => Ok(()),
                    Some(partner) => Err(Violation::new(
                        category,
                        format!("partner '{partner}' of '{resource}' is not entangled"),
                    )
                    .with_suggestion(format!(
                        "declare '{partner}' before entangling it with '{resource}'"
                    ))),
                }
            }
            ConstraintKind::CoherencePreservation { resource } => {
                if ctx.is_coherent(resource) {
                    Ok(())
                } else {
                    Err(Violation::new(
                        category,
                        format!("resource '{resource}' may have decohered"),
                    )
                    .with_suggestion("measure the qudit sooner or use a fresh one".to_string()))
                }
            }
            ConstraintKind::Explainability { entity, threshold } => {
                let view = ctx
                    .entity(entity)
                    .ok_or_else(|| Violation::undeclared_entity(entity))?;
                if view.explainability >= *threshold || view.oversight.is_human_in_loop() {
                    Ok(())
                } else {
                    Err(Violation::new(
                        category,
                        format!(
                            "explainability {:.2} of '{entity}' is below the required {threshold:.2}",
                            view.explainability
                        ),
                    )
                    .with_suggestion(format!(
                        "raise it with `explain {entity} {threshold}` or add `oversee {entity} supervision`"
                    )))
                }
            }
            ConstraintKind::Compliance { entity } => {
                let view = ctx
                    .entity(entity)
                    .ok_or_else(|| Violation::undeclared_entity(entity))?;
                if view.compliance == aegis_common::ComplianceStatus::NonCompliant {
                    Err(Violation::new(
                        category,
                        format!("entity '{entity}' failed verification"),
                    ))
                } else {
                    Ok(())
                }
            }
            ConstraintKind::HumanOversight { entity } => {
                let view = ctx
                    .entity(entity)
                    .ok_or_else(|| Violation::undeclared_entity(entity))?;
                if !view.criticality.requires_oversight() || view.oversight.is_human_in_loop() {
                    Ok(())
                } else {
                    Err(Violation::new(
                        category,
                        format!(
                            "'{entity}' is classified {} but its oversight level is {}",
                            view.criticality, view.oversight
                        ),
                    )
                    .with_suggestion(format!("add `oversee {entity} approval`")))
                }
            }
            ConstraintKind::HumanApproval { entity } => {
                let view = ctx
                    .entity(entity)
                    .ok_or_else(|| Violation::undeclared_entity(entity))?;
                if view.approved {
                    Ok(())
                } else {
                    Err(Violation::new(
                        category,
                        format!("decision by '{entity}' requires explicit human approval"),
                    )
                    .with_suggestion(format!("add `approve {entity}` before the decision")))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EntityView;
    use aegis_common::{ComplianceStatus, Criticality, OversightLevel};
    use std::collections::HashMap;

    #[derive(Default)]
    struct Fixture {
        consumed: HashMap<String, usize>,
        tracked: Vec<String>,
        entangled: Vec<String>,
        decohered: Vec<String>,
        entities: HashMap<String, EntityView>,
    }

    impl ConstraintContext for Fixture {
        fn consumed_count(&self, resource: &str) -> usize {
            self.consumed.get(resource).copied().unwrap_or(0)
        }
        fn is_tracked(&self, resource: &str) -> bool {
            self.tracked.iter().any(|r| r == resource)
        }
        fn is_coherent(&self, resource: &str) -> bool {
            !self.decohered.iter().any(|r| r == resource)
        }
        fn was_entangled(&self, resource: &str) -> bool {
            self.entangled.iter().any(|r| r == resource)
        }
        fn entity(&self, name: &str) -> Option<EntityView> {
            self.entities.get(name).copied()
        }
    }

    fn with_entity(view: EntityView) -> Fixture {
        let mut f = Fixture::default();
        f.entities.insert("bot".into(), view);
        f
    }

    #[test]
    fn program_scope_allows_one_consumption() {
        let mut f = Fixture::default();
        let c = Constraint::no_cloning("q", UsageScope::Program);
        f.consumed.insert("q".into(), 1);
        assert!(c.evaluate(&f).is_ok());
        f.consumed.insert("q".into(), 2);
        let v = c.evaluate(&f).unwrap_err();
        assert_eq!(v.category, ErrorCategory::QuantumViolation);
    }

    #[test]
    fn operation_scope_rejects_consumed_operand() {
        let mut f = Fixture::default();
        let c = Constraint::no_cloning("q", UsageScope::Operation);
        assert_eq!(c.phase, CheckPhase::Pre);
        assert!(c.evaluate(&f).is_ok());
        f.consumed.insert("q".into(), 1);
        assert!(c.evaluate(&f).is_err());
    }

    #[test]
    fn memory_safety_needs_tracking() {
        let mut f = Fixture::default();
        let c = Constraint::memory_safety("q", CheckPhase::Pre);
        assert!(c.evaluate(&f).is_err());
        f.tracked.push("q".into());
        assert!(c.evaluate(&f).is_ok());
    }

    #[test]
    fn entanglement_consistency_names_missing_partner() {
        let mut f = Fixture::default();
        f.entangled.push("b".into());
        let c = Constraint::entanglement_consistency("a", vec!["b".into(), "c".into()]);
        let v = c.evaluate(&f).unwrap_err();
        assert!(v.message.contains("'c'"));
    }

    #[test]
    fn coherence_is_advisory() {
        let mut f = Fixture::default();
        f.decohered.push("q".into());
        let c = Constraint::coherence_preservation("q");
        assert!(!c.required);
        let d = c
            .evaluate(&f)
            .unwrap_err()
            .into_diagnostic(SourceLocation::new(1, 1), c.required);
        assert!(!d.is_error());
    }

    #[test]
    fn explainability_threshold_law() {
        let c = Constraint::explainability("bot", 0.85, CheckPhase::Post);
        let low = EntityView {
            explainability: 0.84,
            ..EntityView::default()
        };
        assert_eq!(
            c.evaluate(&with_entity(low)).unwrap_err().category,
            ErrorCategory::AiSafety
        );
        let exact = EntityView {
            explainability: 0.85,
            ..EntityView::default()
        };
        assert!(c.evaluate(&with_entity(exact)).is_ok());
    }

    #[test]
    fn supervision_compensates_low_explainability() {
        let c = Constraint::explainability("bot", 0.85, CheckPhase::Post);
        let view = EntityView {
            explainability: 0.3,
            oversight: OversightLevel::Supervision,
            ..EntityView::default()
        };
        assert!(c.evaluate(&with_entity(view)).is_ok());
    }

    #[test]
    fn criticality_law() {
        let c = Constraint::human_oversight("bot", CheckPhase::Post);
        for criticality in [Criticality::High, Criticality::Critical, Criticality::Safety] {
            let unsupervised = EntityView {
                criticality,
                oversight: OversightLevel::None,
                ..EntityView::default()
            };
            assert!(c.evaluate(&with_entity(unsupervised)).is_err());
            for oversight in [OversightLevel::Approval, OversightLevel::Control] {
                let supervised = EntityView {
                    criticality,
                    oversight,
                    ..EntityView::default()
                };
                assert!(c.evaluate(&with_entity(supervised)).is_ok());
            }
        }
        let medium = EntityView {
            oversight: OversightLevel::None,
            ..EntityView::default()
        };
        assert!(c.evaluate(&with_entity(medium)).is_ok());
    }

    #[test]
    fn compliance_blocks_after_failed_verification() {
        let c = Constraint::compliance("bot", CheckPhase::Pre);
        let failed = EntityView {
            compliance: ComplianceStatus::NonCompliant,
            ..EntityView::default()
        };
        assert!(c.evaluate(&with_entity(failed)).is_err());
        assert!(c.evaluate(&with_entity(EntityView::default())).is_ok());
    }

    #[test]
    fn approval_flag() {
        let c = Constraint::human_approval("bot");
        assert!(c.evaluate(&with_entity(EntityView::default())).is_err());
        let approved = EntityView {
            approved: true,
            ..EntityView::default()
        };
        assert!(c.evaluate(&with_entity(approved)).is_ok());
    }

    #[test]
    fn undeclared_entity_is_type_error() {
        let c = Constraint::compliance("ghost", CheckPhase::Pre);
        let v = c.evaluate(&Fixture::default()).unwrap_err();
        assert_eq!(v.category, ErrorCategory::Type);
    }
}
