//! `gradestore doctor` command - integrity report
//!
//! Exits non-zero when any issue is found.

use gradestore_core::error::{GradeError, Result};
use gradestore_core::integrity::{check_integrity, IntegrityReport};
use gradestore_core::store::Store;

use crate::cli::{Cli, OutputFormat};
use crate::commands::format::{print_json, print_records_header};

/// Execute the doctor command
pub fn execute(cli: &Cli, store: &Store) -> Result<()> {
    let report = check_integrity(store.db())?;
    output_report(cli, &report)?;

    if report.is_clean() {
        Ok(())
    } else {
        Err(GradeError::InvalidStore {
            reason: format!("store has {} integrity issue(s)", report.issues.len()),
        })
    }
}

fn output_report(cli: &Cli, report: &IntegrityReport) -> Result<()> {
    match cli.format {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Human => {
            for issue in &report.issues {
                println!("error: {}", issue);
            }
            if !cli.quiet {
                println!(
                    "Checked {} grade(s) and {} visible-block entr{}: {} issue(s)",
                    report.grades_checked,
                    report.blocks_checked,
                    if report.blocks_checked == 1 { "y" } else { "ies" },
                    report.issues.len()
                );
            }
        }
        OutputFormat::Records => {
            print_records_header(
                "doctor",
                &[
                    ("grades", &report.grades_checked.to_string()),
                    ("blocks", &report.blocks_checked.to_string()),
                    ("issues", &report.issues.len().to_string()),
                ],
            );
            for issue in &report.issues {
                println!("D {}", issue);
            }
        }
    }
    Ok(())
}
