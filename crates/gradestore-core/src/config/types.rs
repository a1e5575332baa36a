//! Configuration type definitions

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::keys::CourseKey;

/// Current store format version
pub const STORE_FORMAT_VERSION: u32 = 1;

/// Default database file name inside the store directory
pub const DEFAULT_DATABASE_FILE: &str = "grades.db";

/// Store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store format version for compatibility checking
    #[serde(default = "default_version")]
    pub version: u32,

    /// Database file, relative to the store directory
    #[serde(default = "default_database")]
    pub database: String,

    /// Persistent grade feature flag
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Anonymized id settings
    #[serde(default)]
    pub identity: IdentityConfig,
}

/// Controls whether grades are read from and written to the store.
///
/// A course is enabled when `enabled` is set and either `all_courses` is set or
/// the course is listed with `true`. Listing a course with `false` turns it off
/// even when `all_courses` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_enabled")]
    pub all_courses: bool,

    /// Per-course overrides keyed by course id
    #[serde(default)]
    pub courses: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Secret mixed into anonymized student ids
    #[serde(default = "default_secret")]
    pub secret: String,
}

impl PersistenceConfig {
    pub fn is_enabled_for(&self, course: &CourseKey) -> bool {
        if !self.enabled {
            return false;
        }
        match self.courses.get(&course.to_string()) {
            Some(explicit) => *explicit,
            None => self.all_courses,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            version: STORE_FORMAT_VERSION,
            database: default_database(),
            persistence: PersistenceConfig::default(),
            identity: IdentityConfig::default(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        PersistenceConfig {
            enabled: default_enabled(),
            all_courses: default_enabled(),
            courses: BTreeMap::new(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        IdentityConfig {
            secret: default_secret(),
        }
    }
}

fn default_version() -> u32 {
    STORE_FORMAT_VERSION
}

fn default_database() -> String {
    DEFAULT_DATABASE_FILE.to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_secret() -> String {
    "gradestore".to_string()
}
