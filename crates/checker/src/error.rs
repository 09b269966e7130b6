//! Findings raised by type inference.
//!
//! Constraint failures are reported through [`crate::Violation`]; the
//! variants here cover everything inference itself can reject: names that
//! do not resolve, redeclarations and literal arguments that cannot be
//! interpreted.

use aegis_common::{Diagnostic, ErrorCategory, SourceLocation};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    /// A name that is not declared earlier in the program.
    #[error("unresolved {namespace} '{name}'")]
    UnresolvedName {
        namespace: &'static str,
        name: String,
    },

    /// A resource or entity declared twice.
    #[error("{namespace} '{name}' is already declared")]
    Redeclared {
        namespace: &'static str,
        name: String,
    },

    /// Qudit dimension missing, non-numeric or below 2.
    #[error("invalid dimension for qudit '{name}'")]
    InvalidDimension { name: String },

    /// Explainability score that is not a number in [0, 1].
    #[error("invalid explainability score for '{entity}'")]
    InvalidScore { entity: String },

    /// Unknown oversight or criticality level.
    #[error("invalid {kind} level for '{entity}'")]
    InvalidLevel { kind: &'static str, entity: String },

    /// Barrier or window deadline that is not a non-negative integer.
    #[error("invalid deadline for '{name}'")]
    InvalidDeadline { name: String },

    /// A two-handle operation naming the same handle twice.
    #[error("'{operation}' needs two distinct resources, got '{name}' twice")]
    SelfInteraction {
        operation: &'static str,
        name: String,
    },
}

impl CheckError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CheckError::SelfInteraction { .. } => ErrorCategory::QuantumViolation,
            CheckError::UnresolvedName { .. }
            | CheckError::Redeclared { .. }
            | CheckError::InvalidDimension { .. }
            | CheckError::InvalidScore { .. }
            | CheckError::InvalidLevel { .. }
            | CheckError::InvalidDeadline { .. } => ErrorCategory::Type,
        }
    }

    pub fn suggestion(&self) -> Option<String> {
        match self {
            CheckError::UnresolvedName { namespace, name } => Some(match *namespace {
                "resource" => format!("declare it first with `qudit {name} 2`"),
                "entity" => format!("declare it first with `contract {name}`"),
                _ => format!("bind it first with `let {name} <value>`"),
            }),
            CheckError::Redeclared { .. } => Some("choose a different name".to_string()),
            CheckError::InvalidDimension { .. } => {
                Some("use an integer dimension of at least 2".to_string())
            }
            CheckError::InvalidScore { .. } => {
                Some("use a score between 0.0 and 1.0".to_string())
            }
            CheckError::InvalidLevel { kind: "oversight", .. } => Some(
                "use one of none, notification, supervision, approval, control".to_string(),
            ),
            CheckError::InvalidLevel { .. } => {
                Some("use one of low, medium, high, critical, safety".to_string())
            }
            CheckError::InvalidDeadline { .. } => {
                Some("deadlines are whole milliseconds".to_string())
            }
            CheckError::SelfInteraction { .. } => None,
        }
    }

    pub fn into_diagnostic(self, location: SourceLocation) -> Diagnostic {
        let mut diagnostic = Diagnostic::error(self.category(), location, self.to_string());
        diagnostic.suggestion = self.suggestion();
        diagnostic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_variants_display() {
        let errors = vec![
            CheckError::UnresolvedName {
                namespace: "resource",
                name: "q".into(),
            },
            CheckError::Redeclared {
                namespace: "entity",
                name: "bot".into(),
            },
            CheckError::InvalidDimension { name: "q".into() },
            CheckError::InvalidScore { entity: "bot".into() },
            CheckError::InvalidLevel {
                kind: "oversight",
                entity: "bot".into(),
            },
            CheckError::InvalidDeadline { name: "sync".into() },
            CheckError::SelfInteraction {
                operation: "entangle",
                name: "q".into(),
            },
        ];
        for error in &errors {
            assert!(!error.to_string().is_empty(), "empty display for {error:?}");
        }
    }

    #[test]
    fn unresolved_resource_suggests_declaration() {
        let d = CheckError::UnresolvedName {
            namespace: "resource",
            name: "q".into(),
        }
        .into_diagnostic(SourceLocation::new(4, 1));
        assert_eq!(d.category, ErrorCategory::Type);
        assert_eq!(d.suggestion.as_deref(), Some("declare it first with `qudit q 2`"));
        assert!(!d.fatal);
    }

    #[test]
    fn self_interaction_is_quantum_violation() {
        let e = CheckError::SelfInteraction {
            operation: "entangle",
            name: "q".into(),
        };
        assert_eq!(e.category(), ErrorCategory::QuantumViolation);
    }
}
