//! CLI argument parsing for gradestore
//!
//! Supports global flags: --root, --store, --format, --quiet, --verbose

pub mod format;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use output::OutputFormat;

/// Gradestore - persistent subsection grade snapshots
#[derive(Parser, Debug)]
#[command(name = "gradestore")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Base directory for resolving the store
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Explicit store root path
    #[arg(long, global = true, env = "GRADESTORE_STORE")]
    pub store: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "human")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Report timing for major phases
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Log level (error, warn, info, debug, trace) or a full filter directive
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new grade store
    Init,

    /// Compute (or load) a student's subsection grades for a course
    Grade {
        /// Course snapshot JSON file
        #[arg(long)]
        course: PathBuf,

        /// Score file JSON with live and submitted scores
        #[arg(long)]
        scores: PathBuf,

        /// Student id
        #[arg(long)]
        student: i64,

        /// Only grade this subsection (usage key)
        #[arg(long)]
        subsection: Option<String>,

        /// Recompute and overwrite saved grades
        #[arg(long)]
        update: bool,
    },

    /// Show one saved grade
    Show {
        /// Student id
        #[arg(long)]
        student: i64,

        /// Subsection usage key
        #[arg(long)]
        subsection: String,
    },

    /// List a student's saved grades in a course
    List {
        /// Student id
        #[arg(long)]
        student: i64,

        /// Course key
        #[arg(long)]
        course: String,
    },

    /// Show a stored visible-blocks entry
    Blocks {
        /// Content hash of the entry
        hash: String,
    },

    /// Create grades in bulk from a JSON array of grade params
    Backfill {
        /// Path to the params file
        file: PathBuf,
    },

    /// Check store integrity
    Doctor,
}
