//! Command dispatch logic for gradestore
use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

use gradestore_core::error::Result;
use gradestore_core::store::Store;

use crate::cli::{Cli, Commands};
use crate::commands;

pub fn run(cli: &Cli, start: Instant) -> Result<()> {
    let root = cli
        .root
        .clone()
        .unwrap_or_else(|| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    if cli.verbose {
        eprintln!("resolve_root: {:?}", start.elapsed());
    }

    match &cli.command {
        None => handle_no_command(),

        Some(Commands::Init) => commands::init::execute(cli, &root),

        Some(Commands::Grade {
            course,
            scores,
            student,
            subsection,
            update,
        }) => {
            let store = open_store(cli, &root, start)?;
            commands::grade::execute(
                cli,
                &store,
                &commands::grade::GradeArgs {
                    course,
                    scores,
                    student: *student,
                    subsection: subsection.as_deref(),
                    update: *update,
                },
            )
        }

        Some(Commands::Show {
            student,
            subsection,
        }) => {
            let store = open_store(cli, &root, start)?;
            commands::show::execute(cli, &store, *student, subsection)
        }

        Some(Commands::List { student, course }) => {
            let store = open_store(cli, &root, start)?;
            commands::list::execute(cli, &store, *student, course)
        }

        Some(Commands::Blocks { hash }) => {
            let store = open_store(cli, &root, start)?;
            commands::blocks::execute(cli, &store, hash)
        }

        Some(Commands::Backfill { file }) => {
            let store = open_store(cli, &root, start)?;
            commands::backfill::execute(cli, &store, file)
        }

        Some(Commands::Doctor) => {
            let store = open_store(cli, &root, start)?;
            commands::doctor::execute(cli, &store)
        }
    }
}

/// Resolve `--store` against the root, or discover a store from the root
pub fn resolve_store_path(cli: &Cli, root: &Path) -> Option<PathBuf> {
    cli.store.as_ref().map(|path| {
        if path.is_absolute() {
            path.clone()
        } else {
            root.join(path)
        }
    })
}

fn open_store(cli: &Cli, root: &Path, start: Instant) -> Result<Store> {
    let store = match resolve_store_path(cli, root) {
        Some(path) => Store::open(&path)?,
        None => Store::discover(root)?,
    };
    if cli.verbose {
        eprintln!("discover_store: {:?}", start.elapsed());
    }
    Ok(store)
}

fn handle_no_command() -> Result<()> {
    println!("gradestore {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Persistent subsection grade snapshots.");
    println!();
    println!("Run `gradestore --help` for usage information.");
    Ok(())
}
