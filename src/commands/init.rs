//! `gradestore init` command - create a new store

use std::path::Path;

use gradestore_core::error::Result;
use gradestore_core::store::Store;

use crate::cli::Cli;
use crate::commands::dispatch::resolve_store_path;
use crate::commands::format::{print_json_status, print_records_header};
use crate::output_by_format_result;

/// Execute the init command
pub fn execute(cli: &Cli, root: &Path) -> Result<()> {
    let store = match resolve_store_path(cli, root) {
        Some(path) => Store::init_at(&path)?,
        None => Store::init(root)?,
    };
    let store_path = store.root().display().to_string();

    output_by_format_result!(cli.format,
        json => print_json_status("ok", &[
            ("store", serde_json::json!(store_path)),
            ("database", serde_json::json!(store.config().database)),
        ]),
        human => {
            if !cli.quiet {
                println!("Initialized gradestore at {}", store_path);
            }
        },
        records => {
            print_records_header("init", &[("store", store_path.as_str()), ("status", "ok")]);
        }
    )
}
