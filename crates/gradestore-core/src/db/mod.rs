//! SQLite database module for gradestore

mod schema;

use crate::blocks::ContentAddressedBlockStore;
use crate::error::{GradeError, Result};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

pub use schema::{create_schema, CURRENT_SCHEMA_VERSION};

/// How long a writer waits on a lock held by another connection
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite database holding visible-block entries and saved grades
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create the database file at `db_path`
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path).map_err(|e| {
            GradeError::Other(format!(
                "failed to open database at {}: {}",
                db_path.display(),
                e
            ))
        })?;

        // Other workers may hold the file while we switch journal modes
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| GradeError::Other(format!("failed to set busy timeout: {}", e)))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| GradeError::Other(format!("failed to enable WAL mode: {}", e)))?;

        Self::configure(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| GradeError::Other(format!("failed to open in-memory database: {}", e)))?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| GradeError::Other(format!("failed to enable foreign keys: {}", e)))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| GradeError::Other(format!("failed to set busy timeout: {}", e)))?;

        create_schema(&conn)?;

        Ok(Database { conn })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Visible-blocks store on this connection, outside any transaction
    pub fn blocks(&self) -> ContentAddressedBlockStore<'_> {
        ContentAddressedBlockStore::new(&self.conn)
    }

    pub fn get_grade_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM persistent_subsection_grades", [], |r| {
                r.get(0)
            })
            .map_err(|e| GradeError::Other(format!("failed to get grade count: {}", e)))
    }

    pub fn get_visible_blocks_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM visible_blocks", [], |r| r.get(0))
            .map_err(|e| GradeError::Other(format!("failed to get visible blocks count: {}", e)))
    }

    pub fn get_schema_version(&self) -> Result<i32> {
        self.conn
            .query_row(
                "SELECT value FROM store_meta WHERE key = 'schema_version'",
                [],
                |r| {
                    let s: String = r.get(0)?;
                    Ok(s.parse().unwrap_or(0))
                },
            )
            .map_err(|e| GradeError::Other(format!("failed to get schema version: {}", e)))
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        // Checkpoint so other processes see every committed grade
        let _ = self.conn.pragma_update(None, "wal_checkpoint", "TRUNCATE");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_database_open_creates_tables() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("grades.db")).unwrap();

        let count: i64 = db
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('visible_blocks', 'persistent_subsection_grades', 'store_meta')",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(count, 3);
        assert_eq!(db.get_schema_version().unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_database_reopen_keeps_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grades.db");
        {
            let db = Database::open(&path).unwrap();
            db.conn
                .execute(
                    "INSERT INTO visible_blocks (hashed, blocks_json) VALUES ('h', '{}')",
                    [],
                )
                .unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.get_visible_blocks_count().unwrap(), 1);
    }

    #[test]
    fn test_database_rejects_unknown_schema_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grades.db");
        {
            let db = Database::open(&path).unwrap();
            schema::force_set_schema_version(&db.conn, CURRENT_SCHEMA_VERSION + 1).unwrap();
        }

        let err = Database::open(&path).unwrap_err();
        assert!(matches!(err, GradeError::InvalidStore { .. }));
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let db = Database::open_in_memory().unwrap();
        let result = db.conn.execute(
            "INSERT INTO persistent_subsection_grades (user_id, course_id, usage_key, subtree_edited_timestamp, earned_all, possible_all, earned_graded, possible_graded, visible_blocks_hash, created, modified)
             VALUES (1, 'c', 'u', 't', 0, 0, 0, 0, 'missing', 't', 't')",
            [],
        );
        assert!(result.is_err());
    }
}
