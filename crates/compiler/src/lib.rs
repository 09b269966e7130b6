//! Aegis compiler: source text → checked bytecode.
//!
//! The pipeline is tokenizer → parser → AST builder → checker → bytecode
//! generator. Compilation is two-phase: bytecode is produced only when the
//! checker reports zero errors, so a failed compilation never emits a
//! partial program.
//!
//! # Usage
//!
//! ```
//! use aegis_compiler::compile;
//!
//! let result = compile("qudit a 2\nmeasure a\n");
//! assert!(result.success);
//! assert_eq!(result.bytecode, vec!["ALLOC_QUDIT a 2", "MEASURE a"]);
//! ```

pub mod ast;
pub mod codegen;
pub mod error;
pub mod lexer;
pub mod limits;
pub mod parser;

pub use ast::convert_to_ast;
pub use codegen::{generate_bytecode, generate_program};
pub use error::SyntaxError;
pub use lexer::{tokenize, tokenize_bytes, Lexed, Token};
pub use limits::CompilerLimits;
pub use parser::{parse, Parsed};

use aegis_checker::{InferredType, TypeChecker};
use aegis_common::{Diagnostic, Diagnostics, Program, SyntaxNode};
use serde::Serialize;
use tracing::{debug, info};

/// Everything a compilation produced. Read-only once returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompilationResult {
    pub success: bool,
    /// Empty unless `success`.
    pub bytecode: Vec<String>,
    /// Empty unless `success`.
    pub program: Program,
    pub ast: Vec<SyntaxNode>,
    pub types: Vec<InferredType>,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    /// blake3 digest of the bytecode text, when bytecode was produced.
    pub digest: Option<String>,
}

impl CompilationResult {
    fn failed(diagnostics: Diagnostics) -> Self {
        Self {
            errors: diagnostics.errors,
            warnings: diagnostics.warnings,
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct Compiler {
    limits: CompilerLimits,
    checker: TypeChecker,
}

impl Compiler {
    pub fn new(limits: CompilerLimits) -> Self {
        Self {
            limits,
            checker: TypeChecker::new(limits.checker_options()),
        }
    }

    pub fn limits(&self) -> &CompilerLimits {
        &self.limits
    }

    pub fn compile_bytes(&mut self, bytes: &[u8]) -> CompilationResult {
        let lexed = tokenize_bytes(bytes, &self.limits);
        let source = std::str::from_utf8(bytes).unwrap_or_default();
        self.finish(lexed, source)
    }

    pub fn compile(&mut self, source: &str) -> CompilationResult {
        let lexed = tokenize(source, &self.limits);
        self.finish(lexed, source)
    }

    fn finish(&mut self, lexed: Lexed, source: &str) -> CompilationResult {
        let mut diagnostics = lexed.diagnostics;
        if diagnostics.has_fatal() {
            return CompilationResult::failed(diagnostics);
        }
        debug!(tokens = lexed.tokens.len(), "tokenized");

        let parsed = parse(&lexed.tokens, &self.limits);
        diagnostics.extend(parsed.diagnostics);
        if diagnostics.has_fatal() {
            return CompilationResult::failed(diagnostics);
        }
        debug!(instructions = parsed.instructions.len(), "parsed");

        let ast = convert_to_ast(&parsed.instructions, source);
        let report = self.checker.check(&ast);
        diagnostics.extend(report.diagnostics);

        let success = !diagnostics.has_errors();
        let (bytecode, program, digest) = if success {
            let program = generate_program(&parsed.instructions);
            let digest = program.digest();
            (generate_bytecode(&parsed.instructions), program, Some(digest))
        } else {
            (Vec::new(), Program::default(), None)
        };

        info!(
            success,
            instructions = program.len(),
            errors = diagnostics.errors.len(),
            warnings = diagnostics.warnings.len(),
            "compilation finished"
        );

        CompilationResult {
            success,
            bytecode,
            program,
            ast,
            types: report.types,
            errors: diagnostics.errors,
            warnings: diagnostics.warnings,
            digest,
        }
    }
}

/// Compile `source` with default limits.
pub fn compile(source: &str) -> CompilationResult {
    Compiler::default().compile(source)
}
