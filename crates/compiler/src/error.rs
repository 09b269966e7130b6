//! Syntax findings raised by the tokenizer and parser.

use aegis_common::{Diagnostic, ErrorCategory, SourceLocation};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    /// The input bytes are not UTF-8 text.
    #[error("input is not valid UTF-8 text (first bad byte at offset {offset})")]
    NotText { offset: usize },

    /// The input exceeds the configured size ceiling.
    #[error("source is {size} bytes, above the {limit} byte limit")]
    SourceTooLarge { size: usize, limit: usize },

    /// Empty or whitespace-only input.
    #[error("source is empty")]
    EmptySource,

    /// A double-quoted string runs to the end of its line.
    #[error("unterminated string literal")]
    UnterminatedString,

    /// A token that is not a keyword where a statement should start.
    #[error("unrecognized keyword '{token}'")]
    UnknownKeyword { token: String },

    /// Unrecognized keywords past the reporting cap.
    #[error("{count} more unrecognized keyword(s) skipped")]
    UnknownKeywordsSuppressed { count: usize },

    /// A keyword whose arguments run past the end of the input.
    #[error("'{keyword}' expects {expected} argument(s), found {found} before end of input")]
    TruncatedStatement {
        keyword: &'static str,
        expected: usize,
        found: usize,
    },

    /// The parser's iteration ceiling was reached.
    #[error("parser exceeded its iteration limit of {limit}")]
    IterationLimit { limit: usize },

    /// Large token stream.
    #[error("{tokens} tokens exceeds the {threshold} token performance threshold")]
    LargeInput { tokens: usize, threshold: usize },
}

impl SyntaxError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SyntaxError::LargeInput { .. } => ErrorCategory::Performance,
            _ => ErrorCategory::Syntax,
        }
    }

    /// Findings that stop compilation immediately.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyntaxError::NotText { .. } | SyntaxError::IterationLimit { .. }
        )
    }

    /// Findings that are reported as warnings rather than errors.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            SyntaxError::EmptySource
                | SyntaxError::UnknownKeyword { .. }
                | SyntaxError::UnknownKeywordsSuppressed { .. }
                | SyntaxError::TruncatedStatement { .. }
                | SyntaxError::LargeInput { .. }
        )
    }

    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            SyntaxError::SourceTooLarge { .. } => Some("split the program into smaller units"),
            SyntaxError::UnterminatedString => Some("close the string with '\"'"),
            SyntaxError::UnknownKeyword { .. } => {
                Some("run `aegis opcodes` for the list of keywords")
            }
            _ => None,
        }
    }

    pub fn into_diagnostic(self, location: SourceLocation) -> Diagnostic {
        let category = self.category();
        let message = self.to_string();
        let mut diagnostic = if self.is_warning() {
            Diagnostic::warning(category, location, message)
        } else {
            Diagnostic::error(category, location, message)
        };
        if let Some(help) = self.suggestion() {
            diagnostic = diagnostic.with_suggestion(help);
        }
        if self.is_fatal() {
            diagnostic = diagnostic.into_fatal();
        }
        diagnostic
    }
}
