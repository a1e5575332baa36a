//! `gradestore blocks` command - resolve a visible-blocks entry

use gradestore_core::error::Result;
use gradestore_core::store::Store;

use crate::cli::{Cli, OutputFormat};
use crate::commands::format::{print_json, print_records_header};

/// Execute the blocks command
pub fn execute(cli: &Cli, store: &Store, hash: &str) -> Result<()> {
    let set = store.db().blocks().resolve(hash)?;
    let course = set
        .course_key()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".to_string());

    match cli.format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "hash": hash,
            "course_id": set.course_key(),
            "blocks": set.records(),
        }))?,
        OutputFormat::Human => {
            println!("{} ({} blocks, course {})", hash, set.len(), course);
            for block in &set {
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
            print_records_header(
                "blocks",
                &[("hash", hash), ("course", &course), ("count", &set.len().to_string())],
            );
            for block in &set {
                println!(
                    "B {} max={} weight={}",
                    block.location,
                    block.max_possible_score,
                    block
                        .weight
                        .map(|w| w.to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
        }
    }
    Ok(())
}
