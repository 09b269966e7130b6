//! Parser for Aegis tokens → instructions.
//!
//! A single left-to-right scan. Each keyword consumes the fixed number of
//! argument tokens its opcode declares; punctuation between arguments is
//! skipped. The parser is total: unknown keywords and truncated statements
//! become warnings, and a hard iteration ceiling turns any looping bug
//! into a fatal error instead of a hang.

use crate::error::SyntaxError;
use crate::lexer::Token;
use crate::limits::CompilerLimits;
use aegis_common::{Diagnostics, Instruction, Opcode, SourceLocation};

/// Parser output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parsed {
    pub instructions: Vec<Instruction>,
    pub diagnostics: Diagnostics,
}

/// Iteration ceiling for a stream of `len` tokens.
pub fn iteration_limit(len: usize) -> usize {
    len.saturating_mul(2).saturating_add(16)
}

pub fn parse(tokens: &[Token], limits: &CompilerLimits) -> Parsed {
    let mut parsed = Parsed::default();
    let limit = iteration_limit(tokens.len());
    let mut iterations = 0;
    let mut unknown = 0usize;
    let mut i = 0;

    if tokens.len() > limits.performance_warning_tokens {
        parsed.diagnostics.push(
            SyntaxError::LargeInput {
                tokens: tokens.len(),
                threshold: limits.performance_warning_tokens,
            }
            .into_diagnostic(tokens[0].location),
        );
    }

    while i < tokens.len() {
        iterations += 1;
        if iterations > limit {
            parsed.diagnostics.push(
                SyntaxError::IterationLimit { limit }.into_diagnostic(tokens[i].location),
            );
            break;
        }

        let token = &tokens[i];
        if token.is_punctuation() {
            i += 1;
            continue;
        }

        let Some(opcode) = Opcode::from_keyword(&token.text) else {
            unknown += 1;
            if unknown <= limits.max_unknown_keyword_warnings {
                parsed.diagnostics.push(
                    SyntaxError::UnknownKeyword {
                        token: token.text.clone(),
                    }
                    .into_diagnostic(token.location),
                );
            }
            i += 1;
            continue;
        };

        let (args, next) = collect_args(tokens, i + 1, opcode.arity());
        if args.len() < opcode.arity() {
            parsed.diagnostics.push(
                SyntaxError::TruncatedStatement {
                    keyword: opcode.keyword(),
                    expected: opcode.arity(),
                    found: args.len(),
                }
                .into_diagnostic(token.location),
            );
            break;
        }

        parsed
            .instructions
            .push(Instruction::new(opcode, args, token.location));
        i = next;
    }

    if unknown > limits.max_unknown_keyword_warnings {
        let location = tokens
            .last()
            .map(|t| t.location)
            .unwrap_or_else(SourceLocation::default);
        parsed.diagnostics.push(
            SyntaxError::UnknownKeywordsSuppressed {
                count: unknown - limits.max_unknown_keyword_warnings,
            }
            .into_diagnostic(location),
        );
    }

    parsed
}

/// Take up to `arity` non-punctuation tokens starting at `start`.
/// Returns the arguments and the index after the last one consumed.
fn collect_args(tokens: &[Token], start: usize, arity: usize) -> (Vec<String>, usize) {
    let mut args = Vec::with_capacity(arity);
    let mut j = start;
    while args.len() < arity && j < tokens.len() {
        if !tokens[j].is_punctuation() {
            args.push(tokens[j].text.clone());
        }
        j += 1;
    }
    (args, j)
}
