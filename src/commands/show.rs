//! `gradestore show` command - display one saved grade

use gradestore_core::error::Result;
use gradestore_core::grades::{GradeRecord, GradeRepository};
use gradestore_core::keys::UsageKey;
use gradestore_core::store::Store;

use crate::cli::{Cli, OutputFormat};
use crate::commands::format::{print_json, print_records_header, ratio};

/// Execute the show command
pub fn execute(cli: &Cli, store: &Store, student: i64, subsection: &str) -> Result<()> {
    let usage_key: UsageKey = subsection.parse()?;
    let record = store.repository().read(student, &usage_key)?;

    match cli.format {
        OutputFormat::Json => print_json(&record_json(&record))?,
        OutputFormat::Human => {
            println!("{}", record.summary());
            println!("saved {} (modified {})", record.created, record.modified);
            println!("content edited {}", record.subtree_edited_timestamp);
            for block in &record.visible_blocks {
                println!(
                    "  {} max={} weight={}",
                    block.location,
                    block.max_possible_score,
                    block
                        .weight
                        .map(|w| w.to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
        }
        OutputFormat::Records => {
            print_records_header("show", &[("student", &student.to_string())]);
            print_grade_record(&record);
        }
    }
    Ok(())
}

/// Saved grade with its visible blocks inlined
pub fn record_json(record: &GradeRecord) -> serde_json::Value {
    let mut value = serde_json::to_value(record).unwrap_or(serde_json::Value::Null);
    if let Some(obj) = value.as_object_mut() {
        obj.insert(
            "visible_blocks".to_string(),
            serde_json::json!(record.visible_blocks.records()),
        );
    }
    value
}

/// One `R` line for a saved grade
pub fn print_grade_record(record: &GradeRecord) {
    println!(
        "R {} user={} version={} graded={} all={} blocks={} hash={}",
        record.usage_key,
        record.user_id,
        if record.course_version.is_empty() {
            "-"
        } else {
            record.course_version.as_str()
        },
        ratio(record.earned_graded, record.possible_graded),
        ratio(record.earned_all, record.possible_all),
        record.visible_blocks.len(),
        record.visible_blocks_hash
    );
}
