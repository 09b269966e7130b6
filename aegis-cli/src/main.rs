//! Aegis CLI: compile, check and run governed quantum programs.
//!
//! Exit codes:
//! - 0: Success
//! - 1: Input, syntax or configuration error
//! - 2: Check failure
//! - 3: Runtime failure

mod commands;
mod config;
mod error;

use clap::{Parser, Subcommand};
use commands::OversightPolicy;
use config::AegisConfig;
use error::CliError;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "aegis", version, about = "Compile, check and run Aegis programs")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log more (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile source to bytecode text.
    Compile {
        input: PathBuf,
        /// Output path; defaults to the input with an `.aegb` extension.
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Check source without writing bytecode.
    Check {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Run source or `.aegb` bytecode.
    Run {
        input: PathBuf,
        /// Approve every oversight request.
        #[arg(long, conflicts_with = "reject_all")]
        approve_all: bool,
        /// Reject every oversight request (the default).
        #[arg(long)]
        reject_all: bool,
        /// Override the physics seed.
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        json: bool,
    },
    /// Print the token stream of a source file.
    Tokens { input: PathBuf },
    /// List the opcode registry.
    Opcodes,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    let config = AegisConfig::load(cli.config.as_deref())?;
    match cli.command {
        Command::Compile {
            input,
            output,
            json,
        } => commands::compile(&input, output.as_deref(), json, &config),
        Command::Check { input, json } => commands::check(&input, json, &config),
        Command::Run {
            input,
            approve_all,
            reject_all: _,
            seed,
            json,
        } => {
            let policy = if approve_all {
                OversightPolicy::ApproveAll
            } else {
                OversightPolicy::RejectAll
            };
            commands::run(&input, policy, seed, json, &config)
        }
        Command::Tokens { input } => commands::tokens(&input, &config),
        Command::Opcodes => commands::opcodes(),
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version go to stdout and are not failures.
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            process::exit(code);
        }
    };
    init_tracing(cli.verbose);

    if let Err(e) = dispatch(cli) {
        eprintln!("error: {e}");
        process::exit(e.exit_code());
    }
}
