//! Store management for gradestore
//!
//! A store is a directory holding `config.toml` and the SQLite database.
//! Default location: `.gradestore/` under the project root.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::StoreConfig;
use crate::db::Database;
use crate::error::{GradeError, Result};
use crate::grades::{PersistenceEnabled, SqliteGradeRepository};
use crate::identity::HashedIdentity;
use crate::keys::CourseKey;

pub const DEFAULT_STORE_DIR: &str = ".gradestore";
pub const CONFIG_FILE: &str = "config.toml";

/// An opened grade store
#[derive(Debug)]
pub struct Store {
    root: PathBuf,
    config: StoreConfig,
    db: Database,
}

impl Store {
    /// Discover a store by walking up from the given directory
    pub fn discover(start: &Path) -> Result<Self> {
        let found = start
            .ancestors()
            .map(|dir| dir.join(DEFAULT_STORE_DIR))
            .find(|candidate| candidate.join(CONFIG_FILE).is_file());

        match found {
            Some(path) => Self::open(&path),
            None => Err(GradeError::StoreNotFound {
                search_root: start.to_path_buf(),
            }),
        }
    }

    /// Open an existing store at the given path
    #[tracing::instrument(skip(path), fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(GradeError::StoreNotFound {
                search_root: path.to_path_buf(),
            });
        }

        let config_path = path.join(CONFIG_FILE);
        let config = if config_path.exists() {
            StoreConfig::load(&config_path)?
        } else {
            StoreConfig::default()
        };

        let db = Database::open(&path.join(&config.database))?;

        Ok(Store {
            root: path.to_path_buf(),
            config,
            db,
        })
    }

    /// Initialize a new store under the given project root.
    pub fn init(project_root: &Path) -> Result<Self> {
        Self::init_at(&project_root.join(DEFAULT_STORE_DIR))
    }

    /// Initialize a store at an explicit path.
    pub fn init_at(store_root: &Path) -> Result<Self> {
        let config_path = store_root.join(CONFIG_FILE);
        if config_path.exists() {
            return Err(GradeError::already_exists(
                "store",
                store_root.display(),
            ));
        }

        fs::create_dir_all(store_root)?;
        let config = StoreConfig::default();
        config.save(&config_path)?;
        let db = Database::open(&store_root.join(&config.database))?;

        tracing::info!(path = %store_root.display(), "initialized store");
        Ok(Store {
            root: store_root.to_path_buf(),
            config,
            db,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn repository(&self) -> SqliteGradeRepository<'_> {
        SqliteGradeRepository::new(&self.db)
    }

    pub fn identity(&self) -> HashedIdentity {
        HashedIdentity::new(self.config.identity.secret.clone())
    }

    pub fn persistence_for(&self, course: &CourseKey) -> PersistenceEnabled {
        self.config.persistence_for(course)
    }
}
