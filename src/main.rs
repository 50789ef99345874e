//! qa-bench - structured-output question answering benchmark
//!
//! Runs a dataset of questions through a language model under every
//! combination of decoding mode and response contract, grades each answer
//! with an LLM judge and reports per-configuration accuracy.

mod cli;
mod commands;

use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use cli::{Cli, OutputFormat};
use qa_bench_core::error::{BenchError, ExitCode as BenchExitCode};
use qa_bench_core::logging;

fn main() -> ExitCode {
    let start = Instant::now();

    // Malformed arguments exit through clap with status 2, the usage code
    let cli = Cli::parse();

    if let Err(e) = logging::init_tracing(cli.verbose, cli.log_level.as_deref(), cli.log_json) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }
    tracing::debug!(elapsed = ?start.elapsed(), command = ?cli.command, "parse_args");

    let code = match commands::dispatch::run(&cli, start) {
        Ok(()) => BenchExitCode::Success,
        Err(e) => report_failure(&cli, &e),
    };
    ExitCode::from(code as u8)
}

/// Print a failed command's error in the requested format.
fn report_failure(cli: &Cli, error: &BenchError) -> BenchExitCode {
    match cli.format {
        OutputFormat::Json => eprintln!("{}", error.to_json()),
        OutputFormat::Human if !cli.quiet => eprintln!("error: {}", error),
        OutputFormat::Human => {}
    }
    error.exit_code()
}
