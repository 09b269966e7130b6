//! Bytecode generation.
//!
//! One line per instruction, in instruction order. Generation is pure: the
//! same instructions always render the same text.

use aegis_common::{Instruction, Program};

/// Render instructions as bytecode lines.
pub fn generate_bytecode(instructions: &[Instruction]) -> Vec<String> {
    instructions.iter().map(Instruction::to_bytecode_line).collect()
}

/// Package instructions as a [`Program`].
pub fn generate_program(instructions: &[Instruction]) -> Program {
    Program::new(instructions.to_vec())
}
