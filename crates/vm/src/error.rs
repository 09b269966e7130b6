//! Errors for the Aegis VM.
//!
//! [`RuntimeError`] covers everything an instruction handler or the final
//! scan can reject. It is converted into a [`Diagnostic`] tied to the
//! instruction's source location; only the fatal variants stop a run.
//! The remaining enums are the error contracts of the collaborators.

use aegis_common::{DecodeError, Diagnostic, ErrorCategory, SourceLocation};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// No handle was ever bound to this name.
    #[error("no resource handle named '{name}'")]
    UnknownHandle { name: String },

    /// The handle was measured, released or teleported.
    #[error("resource '{name}' was already consumed")]
    ConsumedHandle { name: String },

    #[error("a resource named '{name}' already exists")]
    AlreadyBound { name: String },

    #[error("resource '{name}' has decohered")]
    Decoherent { name: String },

    #[error("invalid qudit dimension '{token}'")]
    InvalidDimension { token: String },

    #[error("cannot entangle resource '{name}' with itself")]
    SelfEntanglement { name: String },

    #[error("resources '{a}' and '{b}' are already entangled")]
    AlreadyEntangled { a: String, b: String },

    #[error("resources '{a}' and '{b}' are not entangled")]
    NotEntangled { a: String, b: String },

    #[error("no AI entity named '{name}'")]
    UnknownEntity { name: String },

    #[error("AI entity '{name}' already exists")]
    EntityExists { name: String },

    #[error("invalid explainability score '{token}'")]
    InvalidScore { token: String },

    #[error("invalid {kind} level '{token}'")]
    InvalidLevel { kind: &'static str, token: String },

    #[error("variable '{name}' is not bound")]
    UnboundVariable { name: String },

    #[error("invalid deadline '{token}'")]
    InvalidDeadline { token: String },

    #[error("window '{name}' has soft deadline {soft_ms}ms after hard deadline {hard_ms}ms")]
    InvertedWindow {
        name: String,
        soft_ms: u64,
        hard_ms: u64,
    },

    #[error("delegation refused: {0}")]
    DelegationRefused(#[from] CoordinationError),

    /// A governed operation failed verification and cannot be routed to a human.
    #[error("{operation} failed verification: {reasons}")]
    VerificationFailed { operation: String, reasons: String },

    #[error("oversight request {request} rejected: {operation}")]
    OversightRejected { request: u64, operation: String },

    #[error("execution exceeded its step limit of {limit}")]
    IterationLimit { limit: usize },

    #[error("malformed bytecode: {0}")]
    MalformedBytecode(#[from] DecodeError),

    #[error("input is not valid UTF-8 text (first bad byte at offset {offset})")]
    NotText { offset: usize },

    /// An entanglement group failed the final consistency scan.
    #[error("entanglement group {group} is inconsistent: {detail}")]
    InconsistentGroup { group: u64, detail: String },

    /// A decoherent handle still occupies the live table at the end of a run.
    #[error("resource '{name}' decohered and was never released")]
    DecoheredLeak { name: String },
}

impl RuntimeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RuntimeError::UnknownHandle { .. }
            | RuntimeError::ConsumedHandle { .. }
            | RuntimeError::AlreadyBound { .. }
            | RuntimeError::SelfEntanglement { .. }
            | RuntimeError::AlreadyEntangled { .. }
            | RuntimeError::NotEntangled { .. }
            | RuntimeError::InconsistentGroup { .. } => ErrorCategory::QuantumViolation,

            RuntimeError::VerificationFailed { .. } | RuntimeError::OversightRejected { .. } => {
                ErrorCategory::AiSafety
            }

            RuntimeError::DecoheredLeak { .. } => ErrorCategory::MemoryLeak,

            RuntimeError::MalformedBytecode(_) | RuntimeError::NotText { .. } => {
                ErrorCategory::Syntax
            }

            RuntimeError::Decoherent { .. }
            | RuntimeError::InvalidDimension { .. }
            | RuntimeError::UnknownEntity { .. }
            | RuntimeError::EntityExists { .. }
            | RuntimeError::InvalidScore { .. }
            | RuntimeError::InvalidLevel { .. }
            | RuntimeError::UnboundVariable { .. }
            | RuntimeError::InvalidDeadline { .. }
            | RuntimeError::InvertedWindow { .. }
            | RuntimeError::DelegationRefused(_)
            | RuntimeError::IterationLimit { .. } => ErrorCategory::Execution,
        }
    }

    /// Conditions that abort the run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RuntimeError::IterationLimit { .. }
                | RuntimeError::MalformedBytecode(_)
                | RuntimeError::NotText { .. }
                | RuntimeError::InconsistentGroup { .. }
        )
    }

    pub fn suggestion(&self) -> Option<String> {
        match self {
            RuntimeError::UnknownHandle { name } => Some(format!("declare it with `qudit {name} 2`")),
            RuntimeError::ConsumedHandle { .. } => {
                Some("measure, release or teleport each qudit at most once".to_string())
            }
            RuntimeError::Decoherent { .. } => {
                Some("operate on the qudit sooner or entangle it to extend coherence".to_string())
            }
            RuntimeError::UnknownEntity { name } => Some(format!("declare it with `contract {name}`")),
            RuntimeError::VerificationFailed { .. } => {
                Some("raise the explainability score or assign a human oversight level".to_string())
            }
            RuntimeError::InvertedWindow { .. } => {
                Some("the soft deadline must not exceed the hard deadline".to_string())
            }
            RuntimeError::DecoheredLeak { name } => {
                Some(format!("measure or release '{name}' before it decoheres"))
            }
            _ => None,
        }
    }

    pub fn into_diagnostic(self, location: SourceLocation) -> Diagnostic {
        let category = self.category();
        let suggestion = self.suggestion();
        let fatal = self.is_fatal();
        let mut diagnostic = match self {
            RuntimeError::DecoheredLeak { .. } => {
                Diagnostic::warning(category, location, self.to_string())
            }
            _ => Diagnostic::error(category, location, self.to_string()),
        };
        diagnostic.suggestion = suggestion;
        if fatal {
            diagnostic = diagnostic.into_fatal();
        }
        diagnostic
    }
}

/// Errors from the oversight gateway and from resuming a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OversightError {
    #[error("unknown oversight request {0}")]
    UnknownRequest(u64),

    #[error("oversight request {0} was already answered")]
    AlreadyAnswered(u64),

    #[error("session is not waiting for an oversight decision")]
    NotSuspended,
}

/// A coordinator refused to accept a delegation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinationError {
    #[error("node '{0}' is unreachable")]
    Unreachable(String),

    #[error("no channel is configured")]
    NoChannel,
}

/// Failures of an explanation provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("provider '{0}' is unavailable")]
    Unavailable(String),

    #[error("provider returned malformed output: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_common::Severity;

    #[test]
    fn error_display_formats() {
        assert_eq!(
            RuntimeError::ConsumedHandle { name: "q".into() }.to_string(),
            "resource 'q' was already consumed"
        );
        assert_eq!(
            RuntimeError::IterationLimit { limit: 10 }.to_string(),
            "execution exceeded its step limit of 10"
        );
        assert_eq!(
            RuntimeError::DelegationRefused(CoordinationError::Unreachable("mars".into()))
                .to_string(),
            "delegation refused: node 'mars' is unreachable"
        );
    }

    #[test]
    fn fatal_set_is_small() {
        assert!(RuntimeError::IterationLimit { limit: 1 }.is_fatal());
        assert!(RuntimeError::NotText { offset: 0 }.is_fatal());
        assert!(RuntimeError::InconsistentGroup {
            group: 1,
            detail: String::new()
        }
        .is_fatal());
        assert!(!RuntimeError::ConsumedHandle { name: "q".into() }.is_fatal());
        assert!(!RuntimeError::VerificationFailed {
            operation: "deploy".into(),
            reasons: String::new()
        }
        .is_fatal());
    }

    #[test]
    fn leak_is_a_warning() {
        let d = RuntimeError::DecoheredLeak { name: "q".into() }
            .into_diagnostic(SourceLocation::default());
        assert_eq!(d.severity, Severity::Warning);
        assert_eq!(d.category, ErrorCategory::MemoryLeak);
        assert!(d.suggestion.is_some());
    }

    #[test]
    fn inconsistent_group_is_fatal_quantum_violation() {
        let d = RuntimeError::InconsistentGroup {
            group: 3,
            detail: "one member".into(),
        }
        .into_diagnostic(SourceLocation::default());
        assert!(d.fatal);
        assert_eq!(d.category, ErrorCategory::QuantumViolation);
    }
}
