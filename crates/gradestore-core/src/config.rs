//! Store configuration
//!
//! Configuration is stored in `.gradestore/config.toml`.

pub mod types;

use std::fs;
use std::path::Path;

use crate::error::{GradeError, Result};
use crate::grades::PersistenceEnabled;
use crate::keys::CourseKey;

pub use types::{
    IdentityConfig, PersistenceConfig, StoreConfig, DEFAULT_DATABASE_FILE, STORE_FORMAT_VERSION,
};

impl StoreConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: StoreConfig = toml::from_str(&content)?;

        if config.version > STORE_FORMAT_VERSION {
            return Err(GradeError::InvalidStore {
                reason: format!(
                    "config version {} is newer than supported version {}",
                    config.version, STORE_FORMAT_VERSION
                ),
            });
        }

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| GradeError::Other(format!("failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Feature flag value for one request against `course`.
    pub fn persistence_for(&self, course: &CourseKey) -> PersistenceEnabled {
        PersistenceEnabled(self.persistence.is_enabled_for(course))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn course() -> CourseKey {
        CourseKey::new("Org", "CS101", "2016").unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.version, STORE_FORMAT_VERSION);
        assert_eq!(config.database, DEFAULT_DATABASE_FILE);
        assert!(config.persistence.enabled);
        assert!(config.persistence.all_courses);
        assert!(config.persistence.courses.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = StoreConfig::default();
        config.persistence.all_courses = false;
        config
            .persistence
            .courses
            .insert(course().to_string(), true);
        config.identity.secret = "s3cret".to_string();
        config.save(&path).unwrap();

        let loaded = StoreConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: StoreConfig = toml::from_str("version = 1\n").unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn test_newer_version_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "version = 99\n").unwrap();

        let err = StoreConfig::load(&path).unwrap_err();
        assert!(matches!(err, GradeError::InvalidStore { .. }));
    }

    #[test]
    fn test_persistence_flag_resolution() {
        let other = CourseKey::new("Org", "CS102", "2016").unwrap();
        let mut persistence = PersistenceConfig::default();
        assert!(persistence.is_enabled_for(&course()));

        persistence.courses.insert(course().to_string(), false);
        assert!(!persistence.is_enabled_for(&course()));
        assert!(persistence.is_enabled_for(&other));

        persistence.all_courses = false;
        persistence.courses.insert(course().to_string(), true);
        assert!(persistence.is_enabled_for(&course()));
        assert!(!persistence.is_enabled_for(&other));

        persistence.enabled = false;
        assert!(!persistence.is_enabled_for(&course()));
    }

    #[test]
    fn test_persistence_for_wraps_flag() {
        let mut config = StoreConfig::default();
        assert_eq!(config.persistence_for(&course()), PersistenceEnabled(true));
        config.persistence.enabled = false;
        assert_eq!(config.persistence_for(&course()), PersistenceEnabled(false));
    }
}
