//! `gradestore backfill` command - bulk-create grades
//!
//! The input is a JSON array of grade params. The batch is all-or-nothing: any
//! grade that already exists rejects the whole file.

use std::fs;
use std::path::Path;

use gradestore_core::error::Result;
use gradestore_core::grades::{GradeParams, GradeRepository};
use gradestore_core::store::Store;

use crate::cli::Cli;
use crate::commands::format::{print_json_status, print_records_header};
use crate::commands::show::print_grade_record;
use crate::output_by_format_result;

/// Execute the backfill command
pub fn execute(cli: &Cli, store: &Store, file: &Path) -> Result<()> {
    let content = fs::read_to_string(file)?;
    let params: Vec<GradeParams> = serde_json::from_str(&content)?;
    let created = store.repository().bulk_create(params)?;

    output_by_format_result!(cli.format,
        json => print_json_status("ok", &[
            ("created", serde_json::json!(created.len())),
            ("ids", serde_json::json!(created.iter().map(|r| r.id).collect::<Vec<_>>())),
        ]),
        human => {
            if !cli.quiet {
                println!("Created {} grade(s)", created.len());
            }
        },
        records => {
            print_records_header("backfill", &[("created", &created.len().to_string())]);
            for record in &created {
                print_grade_record(record);
            }
        }
    )
}
