//! SQLite database schema for gradestore

use rusqlite::Connection;

use crate::error::{GradeError, Result};

pub const CURRENT_SCHEMA_VERSION: i32 = 1;

const SCHEMA_SQL: &str = r#"
-- Content-addressed lists of the blocks seen by a grade computation
CREATE TABLE IF NOT EXISTS visible_blocks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    hashed TEXT NOT NULL UNIQUE,
    blocks_json TEXT NOT NULL
);

-- One saved grade per (course, user, subsection)
CREATE TABLE IF NOT EXISTS persistent_subsection_grades (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    course_id TEXT NOT NULL,
    usage_key TEXT NOT NULL,
    subtree_edited_timestamp TEXT NOT NULL,
    course_version TEXT NOT NULL DEFAULT '',
    earned_all REAL NOT NULL,
    possible_all REAL NOT NULL,
    earned_graded REAL NOT NULL,
    possible_graded REAL NOT NULL,
    visible_blocks_hash TEXT NOT NULL REFERENCES visible_blocks(hashed),
    created TEXT NOT NULL,
    modified TEXT NOT NULL,
    UNIQUE (course_id, user_id, usage_key)
);
CREATE INDEX IF NOT EXISTS idx_grades_user_course ON persistent_subsection_grades(user_id, course_id);
CREATE INDEX IF NOT EXISTS idx_grades_blocks ON persistent_subsection_grades(visible_blocks_hash);

-- Store metadata
CREATE TABLE IF NOT EXISTS store_meta (
    key TEXT PRIMARY KEY,
    value TEXT
);
"#;

/// Create tables on a fresh database, or verify the version of an existing one.
pub fn create_schema(conn: &Connection) -> Result<()> {
    let current_version: Option<i32> = conn
        .query_row(
            "SELECT value FROM store_meta WHERE key = 'schema_version'",
            [],
            |r| r.get::<_, String>(0).map(|s| s.parse().unwrap_or(0)),
        )
        .ok();

    match current_version {
        None => {
            conn.execute_batch(SCHEMA_SQL)
                .map_err(|e| GradeError::db_operation("create schema", e))?;
            conn.execute(
                "INSERT OR REPLACE INTO store_meta (key, value) VALUES ('schema_version', ?1)",
                [&CURRENT_SCHEMA_VERSION.to_string()],
            )
            .map_err(|e| GradeError::db_operation("record schema version", e))?;
            tracing::debug!(version = CURRENT_SCHEMA_VERSION, "created grade schema");
            Ok(())
        }
        Some(v) if v == CURRENT_SCHEMA_VERSION => Ok(()),
        Some(v) => Err(GradeError::InvalidStore {
            reason: format!(
                "database schema version {} is not supported (expected {})",
                v, CURRENT_SCHEMA_VERSION
            ),
        }),
    }
}

#[cfg(test)]
pub fn force_set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO store_meta (key, value) VALUES ('schema_version', ?1)",
        [&version.to_string()],
    )?;
    Ok(())
}
