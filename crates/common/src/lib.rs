//! Aegis common types.
//!
//! This crate holds the data shared by every stage of the toolchain:
//!
//! - [`Opcode`]: the opcode registry (keywords, mnemonics, arities, handlers)
//! - [`OversightLevel`], [`Criticality`], [`ComplianceStatus`]: governance levels
//! - [`Instruction`] and [`Program`]: instructions and the bytecode text format
//! - [`Value`]: literal values bound by `let`
//! - [`SyntaxNode`]: the annotated syntax tree consumed by the checker
//! - [`Diagnostic`] and [`Diagnostics`]: categorized errors and warnings
//! - [`DecodeError`]: errors from decoding bytecode text

pub mod ast;
pub mod diagnostic;
pub mod error;
pub mod instruction;
pub mod levels;
pub mod opcode;
pub mod program;
pub mod value;

// Re-export commonly used types at the crate root.
pub use ast::{Directive, EntityModifier, GovernedAction, NodeKind, NodeMetadata, SyntaxNode};
pub use diagnostic::{Diagnostic, Diagnostics, ErrorCategory, Severity, SourceLocation};
pub use error::DecodeError;
pub use instruction::Instruction;
pub use levels::{
    ComplianceStatus, Criticality, OversightLevel, UnknownLevel, EXPLAINABILITY_THRESHOLD,
    HIGH_RISK_THRESHOLD,
};
pub use opcode::{is_valid_opcode, Opcode, OpcodeGroup, ALL_OPCODES};
pub use program::Program;
pub use value::Value;

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_opcode() -> impl Strategy<Value = Opcode> {
        prop::sample::select(&opcode::ALL_OPCODES[..])
    }

    /// Bare argument tokens, never containing whitespace or quotes.
    fn arb_arg() -> impl Strategy<Value = String> {
        "[a-z0-9_.-]{1,12}"
    }

    fn arb_instruction() -> impl Strategy<Value = Instruction> {
        arb_opcode().prop_flat_map(|op| {
            prop::collection::vec(arb_arg(), op.arity()).prop_map(move |args| {
                Instruction::new(op, args, SourceLocation::new(1, 1))
            })
        })
    }

    proptest! {
        /// Rendering then decoding preserves opcodes and arguments.
        #[test]
        fn program_text_roundtrip(
            instrs in prop::collection::vec(arb_instruction(), 0..40)
        ) {
            let program = Program::new(instrs);
            let decoded = Program::from_text(&program.to_text()).unwrap();
            prop_assert_eq!(decoded.len(), program.len());
            for (a, b) in program.instructions.iter().zip(&decoded.instructions) {
                prop_assert_eq!(a.opcode, b.opcode);
                prop_assert_eq!(&a.args, &b.args);
            }
            prop_assert_eq!(decoded.to_text(), program.to_text());
        }

        /// Decoding arbitrary text either succeeds or reports a DecodeError.
        #[test]
        fn arbitrary_text_decode_never_panics(text in "\\PC{0,200}") {
            match Program::from_text(&text) {
                Ok(program) => {
                    for instr in &program.instructions {
                        prop_assert_eq!(instr.args.len(), instr.opcode.arity());
                    }
                }
                Err(e) => match e {
                    DecodeError::UnknownOpcode { .. }
                    | DecodeError::WrongArity { .. }
                    | DecodeError::UnterminatedQuote { .. } => {}
                },
            }
        }

        /// Literal parsing is total.
        #[test]
        fn parse_literal_is_total(token in "\\PC{0,30}") {
            let _ = Value::parse_literal(&token).type_name();
        }
    }
}
