//! `gradestore grade` command - compute or load subsection grades
//!
//! Runs a subsection grade factory for one student over a course snapshot and
//! a score file. Saved grades are reused unless `--update` is given.

use std::path::Path;
use std::time::Instant;

use gradestore_core::course::{BlockStructure, CourseTree};
use gradestore_core::error::{GradeError, Result};
use gradestore_core::grades::{FactoryContext, GradeState, SubsectionGrade, SubsectionGradeFactory};
use gradestore_core::keys::UsageKey;
use gradestore_core::scores::{ScoreFile, Student};
use gradestore_core::store::Store;
use gradestore_core::{log_grade_metrics, trace_time};

use crate::cli::Cli;
use crate::commands::format::{escape_quotes, print_json, print_records_header, ratio};
use crate::output_by_format_result;

pub struct GradeArgs<'a> {
    pub course: &'a Path,
    pub scores: &'a Path,
    pub student: i64,
    pub subsection: Option<&'a str>,
    pub update: bool,
}

/// Execute the grade command
pub fn execute(cli: &Cli, store: &Store, args: &GradeArgs<'_>) -> Result<()> {
    let start = Instant::now();

    let tree = BlockStructure::load(args.course)?;
    let course = tree.course_key().clone();
    let identity = store.identity();
    let score_file = ScoreFile::load(args.scores, &course, &identity)?;
    let student = score_file
        .student(args.student)
        .unwrap_or_else(|| Student::new(args.student, ""));

    let persistence = store.persistence_for(&course);
    if args.update && !persistence.is_enabled() {
        return Err(GradeError::PersistenceDisabled {
            course_id: course.to_string(),
        });
    }

    let subsections = match args.subsection {
        Some(raw) => vec![raw.parse::<UsageKey>()?],
        None => tree.subsections(),
    };

    let repository = store.repository();
    let mut factory = SubsectionGradeFactory::prefetch(FactoryContext {
        student,
        tree: &tree,
        course_version: tree.course_version().map(str::to_string),
        repository: &repository,
        score_source: &score_file,
        submission_source: &score_file,
        identity: &identity,
        persistence,
    })?;

    let mut grades = Vec::with_capacity(subsections.len());
    for key in &subsections {
        let grade = if args.update {
            factory
                .update(key)?
                .ok_or_else(|| GradeError::PersistenceDisabled {
                    course_id: course.to_string(),
                })?
        } else {
            factory.create(key)?
        };
        grades.push(grade);
    }

    log_grade_metrics!(factory.metrics(), "grade");
    trace_time!(start, "grade", subsections = grades.len());

    output_grades(cli, &factory, &grades)
}

fn output_grades(
    cli: &Cli,
    factory: &SubsectionGradeFactory<'_>,
    grades: &[SubsectionGrade],
) -> Result<()> {
    let student = factory.student().id.to_string();
    let course = factory.course_key().to_string();

    output_by_format_result!(cli.format,
        json => print_json(&serde_json::json!({
            "student": factory.student(),
            "course": course,
            "grades": grades,
        })),
        human => {
            for grade in grades {
                print_human(grade);
            }
            if grades.is_empty() && !cli.quiet {
                println!("No subsections to grade");
            }
        },
        records => {
            print_records_header("grade", &[("student", student.as_str()), ("course", course.as_str())]);
            for grade in grades {
                print_records(grade);
            }
        }
    )
}

fn totals(grade: &SubsectionGrade) -> (String, String) {
    let all = grade
        .all_total()
        .map(|t| ratio(t.earned, t.possible))
        .unwrap_or_else(|| "-".to_string());
    let graded = grade
        .graded_total()
        .map(|t| ratio(t.earned, t.possible))
        .unwrap_or_else(|| "-".to_string());
    (all, graded)
}

fn state_label(grade: &SubsectionGrade) -> &'static str {
    match grade.state() {
        GradeState::Empty => "empty",
        GradeState::Computed => "computed",
        GradeState::Loaded => "loaded",
    }
}

fn print_human(grade: &SubsectionGrade) {
    let (all, graded) = totals(grade);
    println!(
        "{} ({}) [{}] graded {} all {}",
        grade.display_name(),
        grade.location(),
        state_label(grade),
        graded,
        all
    );
    for weighted in grade.locations_to_weighted_scores() {
        let score = &weighted.score;
        let weight = weighted
            .weight
            .map(|w| w.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {} {}{} weight={}",
            score.display_name,
            ratio(score.earned, score.possible),
            if score.graded { " graded" } else { "" },
            weight
        );
    }
}

fn print_records(grade: &SubsectionGrade) {
    let (all, graded) = totals(grade);
    println!(
        "G {} \"{}\" state={} graded={} all={}",
        grade.location(),
        escape_quotes(grade.display_name()),
        state_label(grade),
        graded,
        all
    );
    for weighted in grade.locations_to_weighted_scores() {
        let score = &weighted.score;
        println!(
            "S {} {} graded={} weight={}",
            score.location,
            ratio(score.earned, score.possible),
            score.graded,
            weighted
                .weight
                .map(|w| w.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }
}
