//! CLI entry point and dispatch logic
//!
//! `run()` parses arguments, initializes logging, discovers configuration,
//! dispatches to a command and prints every error itself. With `--json`,
//! a failure also prints a canonical `{kind, exit_code, message}` report on
//! stdout.

use anyhow::Result;
use clap::Parser;
use serde::Serialize;

use stackgen_utils::logging::init_tracing;
use stackgen_utils::types::ErrorKind;

use super::args::{Cli, Commands};
use super::commands;
use crate::{Config, ExitCode, StackError, emit_jcs};

/// Main CLI execution function.
///
/// Returns `Err(ExitCode)` after printing a report on stderr; main.rs only
/// calls `std::process::exit(code.as_i32())`.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let operation = cli.command.name();
    let result = dispatch(&cli);

    match result {
        Ok(()) => Ok(()),
        Err(error) => {
            let code = report(&error, operation);
            if cli.command.json() {
                print_json_failure(&error_report(&error, code));
            }
            Err(code)
        }
    }
}

/// Machine-readable failure, printed on stdout with `--json`
#[derive(Debug, Serialize)]
struct ErrorReport {
    kind: ErrorKind,
    exit_code: i32,
    message: String,
}

fn error_report(error: &anyhow::Error, code: ExitCode) -> ErrorReport {
    let kind = error
        .downcast_ref::<StackError>()
        .map_or(ErrorKind::Unknown, StackError::kind);
    ErrorReport {
        kind,
        exit_code: code.as_i32(),
        message: format!("{error:#}"),
    }
}

fn print_json_failure(report: &ErrorReport) {
    match emit_jcs(report) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Warning: failed to encode JSON error report: {e}"),
    }
}

fn dispatch(cli: &Cli) -> Result<()> {
    if let Commands::Init { force } = &cli.command {
        return commands::execute_init_command(*force);
    }

    let config = Config::discover(&cli.config_overrides())?;

    match &cli.command {
        Commands::Generate { json, .. } => commands::execute_generate_command(&config, *json),
        Commands::List { json, .. } => commands::execute_list_command(&config, *json),
        Commands::Services { json } => commands::execute_services_command(&config, *json),
        Commands::Config { json } => commands::execute_config_command(&config, *json),
        Commands::Init { .. } => Ok(()),
    }
}

/// Print `error` for a user and pick the exit code
fn report(error: &anyhow::Error, operation: &str) -> ExitCode {
    if let Some(stack_error) = error.downcast_ref::<StackError>() {
        eprint!("{}", stack_error.display_for_user());
        return stack_error.to_exit_code();
    }

    eprintln!("✗ Unexpected error during {operation}: {error:#}");
    if let Some(suggestions) = enhance_error_context(error) {
        eprintln!("\n  Suggestions:");
        for (i, suggestion) in suggestions.iter().enumerate() {
            eprintln!("    {}. {}", i + 1, suggestion);
        }
    }
    eprintln!("\n  Run with --verbose for more detailed output");
    ExitCode::INTERNAL
}

/// Hints for failures that did not come from the engine
fn enhance_error_context(error: &anyhow::Error) -> Option<Vec<String>> {
    let error_str = format!("{error:#}");

    if error_str.contains("Permission denied") {
        Some(vec![
            "Check file and directory permissions".to_string(),
            "Ensure you have write access to the base directory".to_string(),
        ])
    } else if error_str.contains("No such file or directory") {
        Some(vec![
            "Verify the specified paths exist".to_string(),
            "Check that you're running from the correct directory".to_string(),
        ])
    } else if error_str.contains("not valid UTF-8") {
        Some(vec!["Use a base directory whose path is valid UTF-8".to_string()])
    } else {
        None
    }
}
