//! Gradestore - persistent subsection grade snapshots
//!
//! Operator CLI for computing, saving and inspecting per-student subsection
//! grades and the visible-block records they were computed from.

mod cli;
mod commands;

use std::env;
use std::process::ExitCode;
use std::time::Instant;

use clap::error::ErrorKind;
use clap::Parser;

use cli::{Cli, OutputFormat};
use gradestore_core::error::GradeError;
use gradestore_core::logging;

fn main() -> ExitCode {
    let start = Instant::now();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if wants_json_errors() => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
            _ => return report_json(&parse_failure(&err)),
        },
        Err(err) => err.exit(),
    };

    if let Err(e) = logging::init_tracing(cli.verbose, cli.log_level.as_deref(), cli.log_json) {
        eprintln!("warning: logging disabled: {}", e);
    }
    tracing::debug!(elapsed = ?start.elapsed(), "parsed arguments");

    match commands::dispatch::run(&cli, start) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if cli.format == OutputFormat::Json => report_json(&e),
        Err(e) => {
            if !cli.quiet {
                eprintln!("error: {}", e);
            }
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

/// Map a clap failure onto the gradestore taxonomy.
fn parse_failure(err: &clap::Error) -> GradeError {
    match err.kind() {
        ErrorKind::ValueValidation
        | ErrorKind::InvalidValue
        | ErrorKind::InvalidSubcommand
        | ErrorKind::UnknownArgument
        | ErrorKind::ArgumentConflict
        | ErrorKind::MissingRequiredArgument => GradeError::UsageError(err.to_string()),
        _ => GradeError::Other(err.to_string()),
    }
}

fn report_json(err: &GradeError) -> ExitCode {
    eprintln!("{}", err.to_json());
    ExitCode::from(err.exit_code() as u8)
}

/// `Cli::format` is unavailable when parsing fails, so scan argv directly.
fn wants_json_errors() -> bool {
    let args: Vec<String> = env::args().skip(1).collect();
    args.iter().enumerate().any(|(i, arg)| {
        arg == "--format=json"
            || (arg == "--format" && args.get(i + 1).is_some_and(|v| v == "json"))
    })
}
