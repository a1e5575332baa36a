//! `gradestore list` command - saved grades of a student in a course

use gradestore_core::error::Result;
use gradestore_core::grades::GradeRepository;
use gradestore_core::keys::CourseKey;
use gradestore_core::store::Store;

use crate::cli::{Cli, OutputFormat};
use crate::commands::format::{print_json, print_records_header};
use crate::commands::show::{print_grade_record, record_json};

/// Execute the list command
pub fn execute(cli: &Cli, store: &Store, student: i64, course: &str) -> Result<()> {
    let course_key: CourseKey = course.parse()?;
    let records = store.repository().read_all_for_course(student, &course_key)?;

    match cli.format {
        OutputFormat::Json => {
            let items: Vec<_> = records.iter().map(record_json).collect();
            print_json(&items)?;
        }
        OutputFormat::Human => {
            if records.is_empty() {
                if !cli.quiet {
                    println!("No saved grades");
                }
            } else {
                for record in &records {
                    println!("{}", record.summary());
                }
            }
        }
        OutputFormat::Records => {
            print_records_header(
                "list",
                &[
                    ("student", &student.to_string()),
                    ("course", course),
                    ("count", &records.len().to_string()),
                ],
            );
            for record in &records {
                print_grade_record(record);
            }
        }
    }
    Ok(())
}
