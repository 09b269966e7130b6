//! Decode errors for Aegis bytecode text.

use thiserror::Error;

/// Errors that occur while decoding bytecode text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The first field of a line is not a registry mnemonic.
    #[error("line {line}: unknown opcode '{token}'")]
    UnknownOpcode { line: usize, token: String },

    /// A line carries the wrong number of arguments.
    #[error("line {line}: {opcode} expects {expected} argument(s), found {found}")]
    WrongArity {
        line: usize,
        opcode: &'static str,
        expected: usize,
        found: usize,
    },

    /// A quoted argument is not closed before end of line.
    #[error("line {line}: unterminated quoted argument")]
    UnterminatedQuote { line: usize },
}
