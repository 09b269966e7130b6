//! Program representation and the bytecode text format.
//!
//! Bytecode is one instruction per line, `MNEMONIC arg1 arg2 ...`,
//! separated by single spaces. Arguments that contain whitespace are
//! double-quoted. Blank lines are ignored when decoding.

use crate::diagnostic::SourceLocation;
use crate::error::DecodeError;
use crate::instruction::Instruction;
use crate::opcode::Opcode;
use serde::{Deserialize, Serialize};

/// An Aegis program: a sequence of instructions in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// The instruction stream.
    pub instructions: Vec<Instruction>,
}

impl Program {
    /// Create a new program from a vector of instructions.
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    /// Render the canonical bytecode lines.
    pub fn to_lines(&self) -> Vec<String> {
        self.instructions
            .iter()
            .map(Instruction::to_bytecode_line)
            .collect()
    }

    /// Render the canonical bytecode text (newline-terminated lines).
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for line in self.to_lines() {
            text.push_str(&line);
            text.push('\n');
        }
        text
    }

    /// Decode bytecode text.
    ///
    /// Each decoded instruction's location is its bytecode line, column 1.
    pub fn from_text(text: &str) -> Result<Self, DecodeError> {
        let mut instructions = Vec::new();

        for (idx, line) in text.lines().enumerate() {
            let line_num = idx + 1;
            let mut fields = split_fields(line, line_num)?;
            if fields.is_empty() {
                continue;
            }

            let mnemonic = fields.remove(0);
            let opcode =
                Opcode::from_mnemonic(&mnemonic).ok_or_else(|| DecodeError::UnknownOpcode {
                    line: line_num,
                    token: mnemonic.clone(),
                })?;

            if fields.len() != opcode.arity() {
                return Err(DecodeError::WrongArity {
                    line: line_num,
                    opcode: opcode.mnemonic(),
                    expected: opcode.arity(),
                    found: fields.len(),
                });
            }

            instructions.push(Instruction::new(
                opcode,
                fields,
                SourceLocation::new(line_num, 1),
            ));
        }

        Ok(Self { instructions })
    }

    /// blake3 digest of the canonical text, hex encoded.
    pub fn digest(&self) -> String {
        blake3::hash(self.to_text().as_bytes()).to_hex().to_string()
    }

    /// Number of instructions in the program.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true if the program has no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Split a bytecode line on whitespace, keeping double-quoted fields whole
/// (quotes included, so the argument round-trips unchanged).
fn split_fields(line: &str, line_num: usize) -> Result<Vec<String>, DecodeError> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;

    for c in line.chars() {
        match c {
            '"' => {
                current.push(c);
                in_quote = !in_quote;
            }
            c if c.is_whitespace() && !in_quote => {
                if !current.is_empty() {
                    fields.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }

    if in_quote {
        return Err(DecodeError::UnterminatedQuote { line: line_num });
    }
    if !current.is_empty() {
        fields.push(current);
    }
    Ok(fields)
}
