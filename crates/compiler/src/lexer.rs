//! Tokenizer for Aegis source text.

use crate::error::SyntaxError;
use crate::limits::CompilerLimits;
use aegis_common::{Diagnostics, SourceLocation};
use serde::{Deserialize, Serialize};

/// Structural punctuation. Padded into its own token, ignored by the parser.
pub const PUNCTUATION: [char; 8] = ['(', ')', '{', '}', '[', ']', ',', ';'];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub location: SourceLocation,
}

impl Token {
    pub fn is_punctuation(&self) -> bool {
        let mut chars = self.text.chars();
        matches!((chars.next(), chars.next()), (Some(c), None) if PUNCTUATION.contains(&c))
    }
}

/// Tokenizer output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub diagnostics: Diagnostics,
}

/// Tokenize raw bytes. Input that is not UTF-8 is the one fatal case.
pub fn tokenize_bytes(bytes: &[u8], limits: &CompilerLimits) -> Lexed {
    if bytes.len() > limits.max_source_bytes {
        return too_large(bytes.len(), limits);
    }
    match std::str::from_utf8(bytes) {
        Ok(source) => tokenize(source, limits),
        Err(e) => {
            let mut lexed = Lexed::default();
            lexed.diagnostics.push(
                SyntaxError::NotText {
                    offset: e.valid_up_to(),
                }
                .into_diagnostic(SourceLocation::default()),
            );
            lexed
        }
    }
}

/// Tokenize source text.
///
/// Line comments (`//` or `#`) are stripped, punctuation is split into its
/// own tokens, and double-quoted strings stay one token, quotes included.
/// Never panics; problems are recorded in the returned diagnostics.
pub fn tokenize(source: &str, limits: &CompilerLimits) -> Lexed {
    if source.len() > limits.max_source_bytes {
        return too_large(source.len(), limits);
    }

    let mut lexed = Lexed::default();
    if source.trim().is_empty() {
        lexed
            .diagnostics
            .push(SyntaxError::EmptySource.into_diagnostic(SourceLocation::new(1, 1)));
        return lexed;
    }

    for (idx, line) in source.lines().enumerate() {
        tokenize_line(line, idx + 1, &mut lexed);
    }
    lexed
}

fn too_large(size: usize, limits: &CompilerLimits) -> Lexed {
    let mut lexed = Lexed::default();
    lexed.diagnostics.push(
        SyntaxError::SourceTooLarge {
            size,
            limit: limits.max_source_bytes,
        }
        .into_diagnostic(SourceLocation::default()),
    );
    lexed
}

fn tokenize_line(line: &str, line_num: usize, lexed: &mut Lexed) {
    let chars: Vec<char> = line.chars().collect();
    let mut current = String::new();
    let mut start_col = 0;
    let mut i = 0;

    let flush = |current: &mut String, start_col: usize, lexed: &mut Lexed| {
        if !current.is_empty() {
            lexed.tokens.push(Token {
                text: std::mem::take(current),
                location: SourceLocation::new(line_num, start_col),
            });
        }
    };

    while i < chars.len() {
        let c = chars[i];
        let col = i + 1;

        if c == '#' || (c == '/' && chars.get(i + 1) == Some(&'/')) {
            break;
        }

        if c == '"' {
            flush(&mut current, start_col, lexed);
            match chars[i + 1..].iter().position(|&ch| ch == '"') {
                Some(len) => {
                    let end = i + 1 + len;
                    let text: String = chars[i..=end].iter().collect();
                    lexed.tokens.push(Token {
                        text,
                        location: SourceLocation::new(line_num, col),
                    });
                    i = end + 1;
                }
                None => {
                    lexed.diagnostics.push(
                        SyntaxError::UnterminatedString
                            .into_diagnostic(SourceLocation::new(line_num, col)),
                    );
                    return;
                }
            }
            continue;
        }

        if c.is_whitespace() {
            flush(&mut current, start_col, lexed);
        } else if PUNCTUATION.contains(&c) {
            flush(&mut current, start_col, lexed);
            lexed.tokens.push(Token {
                text: c.to_string(),
                location: SourceLocation::new(line_num, col),
            });
        } else {
            if current.is_empty() {
                start_col = col;
            }
            current.push(c);
        }
        i += 1;
    }

    flush(&mut current, start_col, lexed);
}
