//! Parsed instructions.
//!
//! The same type describes an instruction straight out of the parser and
//! one decoded from bytecode text: an opcode, its ordered argument tokens,
//! and the location it came from.

use crate::diagnostic::SourceLocation;
use crate::opcode::Opcode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single Aegis instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// The operation to perform.
    pub opcode: Opcode,
    /// Argument tokens, exactly `opcode.arity()` of them.
    pub args: Vec<String>,
    /// Where the keyword appeared.
    pub location: SourceLocation,
}

impl Instruction {
    pub fn new(opcode: Opcode, args: Vec<String>, location: SourceLocation) -> Self {
        Self {
            opcode,
            args,
            location,
        }
    }

    /// Argument at `idx`, or the empty string when absent.
    pub fn arg(&self, idx: usize) -> &str {
        self.args.get(idx).map(String::as_str).unwrap_or("")
    }

    /// The canonical bytecode line: `MNEMONIC arg1 arg2 ...`.
    pub fn to_bytecode_line(&self) -> String {
        let mut line = String::from(self.opcode.mnemonic());
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_bytecode_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instr(op: Opcode, args: &[&str]) -> Instruction {
        Instruction::new(
            op,
            args.iter().map(|s| s.to_string()).collect(),
            SourceLocation::new(1, 1),
        )
    }

    #[test]
    fn bytecode_line_single_arg() {
        assert_eq!(instr(Opcode::Measure, &["q"]).to_bytecode_line(), "MEASURE q");
    }

    #[test]
    fn bytecode_line_multiple_args() {
        assert_eq!(
            instr(Opcode::ScheduleWindow, &["w", "10", "20"]).to_bytecode_line(),
            "SCHEDULE_WINDOW w 10 20"
        );
    }

    #[test]
    fn missing_arg_is_empty() {
        let i = instr(Opcode::Measure, &["q"]);
        assert_eq!(i.arg(0), "q");
        assert_eq!(i.arg(1), "");
    }

    #[test]
    fn display_matches_bytecode_line() {
        let i = instr(Opcode::AllocQudit, &["a", "2"]);
        assert_eq!(i.to_string(), "ALLOC_QUDIT a 2");
    }
}
