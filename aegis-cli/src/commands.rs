//! CLI command implementations.

use crate::config::AegisConfig;
use crate::error::CliError;
use aegis_common::{Diagnostic, ErrorCategory, Program, ALL_OPCODES};
use aegis_compiler::{tokenize_bytes, CompilationResult, Compiler};
use aegis_vm::{OversightDecision, OversightRequest, Session};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Extension of compiled bytecode files.
pub const BYTECODE_EXTENSION: &str = "aegb";

/// How `run` answers oversight requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OversightPolicy {
    ApproveAll,
    RejectAll,
}

impl OversightPolicy {
    fn decide(&self, request: &OversightRequest) -> OversightDecision {
        let decision = match self {
            OversightPolicy::ApproveAll => OversightDecision::Approve,
            OversightPolicy::RejectAll => OversightDecision::Reject,
        };
        let verdict = match decision {
            OversightDecision::Approve => "approved",
            OversightDecision::Reject => "rejected",
        };
        eprintln!(
            "oversight {} ({}, {}): {} -> {verdict}",
            request.id,
            request.level,
            request.criticality,
            request.details
        );
        decision
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>, CliError> {
    fs::read(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn print_diagnostics(errors: &[Diagnostic], warnings: &[Diagnostic]) {
    for d in warnings.iter().chain(errors) {
        eprintln!("{d}");
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Syntax errors exit like malformed input; anything else is a check failure.
fn failure(result: &CompilationResult) -> CliError {
    let errors = result.errors.len();
    if result
        .errors
        .iter()
        .any(|e| e.category == ErrorCategory::Syntax)
    {
        CliError::Syntax { errors }
    } else {
        CliError::CheckFailed { errors }
    }
}

fn compile_file(path: &Path, config: &AegisConfig) -> Result<CompilationResult, CliError> {
    let bytes = read_input(path)?;
    Ok(Compiler::new(config.compiler).compile_bytes(&bytes))
}

/// Compile a source file to bytecode text.
pub fn compile(
    input: &Path,
    output: Option<&Path>,
    json: bool,
    config: &AegisConfig,
) -> Result<(), CliError> {
    let result = compile_file(input, config)?;
    if json {
        print_json(&result)?;
    } else {
        print_diagnostics(&result.errors, &result.warnings);
    }
    if !result.success {
        return Err(failure(&result));
    }

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output(input));
    fs::write(&output, result.program.to_text()).map_err(|source| CliError::Write {
        path: output.clone(),
        source,
    })?;
    eprintln!(
        "compiled {} instructions -> {}",
        result.program.len(),
        output.display()
    );
    Ok(())
}

/// Check a source file without writing anything.
pub fn check(input: &Path, json: bool, config: &AegisConfig) -> Result<(), CliError> {
    let result = compile_file(input, config)?;
    if json {
        print_json(&result)?;
    } else {
        print_diagnostics(&result.errors, &result.warnings);
    }
    if !result.success {
        return Err(failure(&result));
    }
    if !json {
        println!(
            "OK: {} ({} instructions)",
            input.display(),
            result.program.len()
        );
    }
    Ok(())
}

fn is_bytecode(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == BYTECODE_EXTENSION)
}

/// Execute a source file (compiled first) or a bytecode file.
pub fn run(
    input: &Path,
    policy: OversightPolicy,
    seed: Option<u64>,
    json: bool,
    config: &AegisConfig,
) -> Result<(), CliError> {
    let mut vm_config = config.vm.clone();
    if let Some(seed) = seed {
        vm_config.seed = seed;
    }

    let (program, types) = if is_bytecode(input) {
        let bytes = read_input(input)?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|e| CliError::Input(format!("bytecode is not UTF-8: {e}")))?;
        let program = Program::from_text(text).map_err(|e| CliError::Input(e.to_string()))?;
        (program, None)
    } else {
        let result = compile_file(input, config)?;
        if !result.success {
            print_diagnostics(&result.errors, &result.warnings);
            return Err(failure(&result));
        }
        (result.program, Some(result.types))
    };

    let mut session = Session::new(vm_config);
    info!(session = session.session_id(), input = %input.display(), "executing");
    let result = session.run_to_completion(&program, types.as_deref(), |request| {
        policy.decide(request)
    });

    if json {
        print_json(&result)?;
    } else {
        for line in &result.console {
            println!("{line}");
        }
        print_diagnostics(&result.errors, &result.warnings);
    }
    if result.success {
        Ok(())
    } else {
        Err(CliError::RuntimeFailed {
            errors: result.errors.len(),
        })
    }
}

/// Print the token stream of a source file, one token per line.
pub fn tokens(input: &Path, config: &AegisConfig) -> Result<(), CliError> {
    let bytes = read_input(input)?;
    let lexed = tokenize_bytes(&bytes, &config.compiler);
    print_diagnostics(&lexed.diagnostics.errors, &lexed.diagnostics.warnings);
    if lexed.diagnostics.has_fatal() {
        return Err(CliError::Syntax {
            errors: lexed.diagnostics.errors.len(),
        });
    }
    for token in &lexed.tokens {
        println!("{}\t{}", token.location, token.text);
    }
    Ok(())
}

/// List the opcode registry.
pub fn opcodes() -> Result<(), CliError> {
    println!(
        "{:<18} {:<16} {:<5} {:<12} HANDLER",
        "MNEMONIC", "KEYWORD", "ARGS", "GROUP"
    );
    for op in ALL_OPCODES {
        let group = format!("{:?}", op.group()).to_lowercase();
        println!(
            "{:<18} {:<16} {:<5} {:<12} {}",
            op.mnemonic(),
            op.keyword(),
            op.arity(),
            group,
            op.handler_name()
        );
    }
    Ok(())
}

/// Default bytecode path for `input`.
pub fn default_output(input: &Path) -> PathBuf {
    input.with_extension(BYTECODE_EXTENSION)
}
