//! User-facing diagnostics shared by the compiler, checker and VM.
//!
//! A diagnostic is data, not control flow: every stage accumulates them
//! and the caller decides what to surface. Only diagnostics marked
//! `fatal` stop a stage early.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 1-based position in source text (or in bytecode text when executing
/// decoded bytecode). `0:0` marks a synthetic location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// Error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed input to the tokenizer or parser.
    Syntax,
    /// Checker violation unrelated to domain safety.
    Type,
    /// No-cloning or entanglement-consistency breach.
    QuantumViolation,
    /// Explainability or oversight breach.
    AiSafety,
    /// Dispatch or runtime fault.
    Execution,
    /// Decoherent handle still occupying the live table.
    MemoryLeak,
    /// Oversized input.
    Performance,
}

impl ErrorCategory {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCategory::Syntax => "syntax",
            ErrorCategory::Type => "type",
            ErrorCategory::QuantumViolation => "quantum_violation",
            ErrorCategory::AiSafety => "ai_safety",
            ErrorCategory::Execution => "execution",
            ErrorCategory::MemoryLeak => "memory_leak",
            ErrorCategory::Performance => "performance",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single error or warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub category: ErrorCategory,
    pub location: SourceLocation,
    pub message: String,
    /// Remediation hint, where one exists.
    pub suggestion: Option<String>,
    /// Aborts the stage that raised it.
    pub fatal: bool,
}

impl Diagnostic {
    pub fn error(
        category: ErrorCategory,
        location: SourceLocation,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Error,
            category,
            location,
            message: message.into(),
            suggestion: None,
            fatal: false,
        }
    }

    pub fn warning(
        category: ErrorCategory,
        location: SourceLocation,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(category, location, message)
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn into_fatal(mut self) -> Self {
        self.fatal = true;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(
            f,
            "{severity}[{}] {}: {}",
            self.category, self.location, self.message
        )?;
        if let Some(help) = &self.suggestion {
            write!(f, " (help: {help})")?;
        }
        Ok(())
    }
}

/// Accumulates errors and warnings for one stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.errors.push(diagnostic),
            Severity::Warning => self.warnings.push(diagnostic),
        }
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_fatal(&self) -> bool {
        self.errors.iter().any(|e| e.fatal)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    /// Iterate over errors and warnings in that order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.errors.iter().chain(self.warnings.iter())
    }
}
