use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use super::BlockRecordSet;
use crate::error::{GradeError, Result};
use crate::map_db_err;

/// A row of the visible-blocks table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlocks {
    pub id: i64,
    pub hashed: String,
    pub blocks_json: String,
}

impl StoredBlocks {
    /// Decode the stored JSON back into its record set.
    pub fn blocks(&self) -> Result<BlockRecordSet> {
        BlockRecordSet::parse(&self.blocks_json)
    }
}

/// Get-or-create store keyed by [`BlockRecordSet::content_hash`].
///
/// Entries are append-only: once a hash is present its JSON is never rewritten.
/// Borrowing a bare connection lets the grade repository run it inside its own
/// transaction.
pub struct ContentAddressedBlockStore<'c> {
    conn: &'c Connection,
}

impl<'c> ContentAddressedBlockStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Return the entry for `set`'s hash, inserting it if absent.
    ///
    /// Losing an insert race to another writer is reported as success with the
    /// winner's row.
    pub fn get_or_create(&self, set: &BlockRecordSet) -> Result<StoredBlocks> {
        let hashed = set.content_hash();

        if let Some(existing) = self.find(hashed)? {
            tracing::trace!(hash = %hashed, "visible blocks already stored");
            return Ok(existing);
        }

        let inserted = self.conn.execute(
            "INSERT INTO visible_blocks (hashed, blocks_json) VALUES (?1, ?2)",
            params![hashed, set.serialize()],
        );

        match inserted {
            Ok(_) => {
                tracing::debug!(hash = %hashed, blocks = set.len(), "stored visible blocks");
                Ok(StoredBlocks {
                    id: self.conn.last_insert_rowid(),
                    hashed: hashed.to_string(),
                    blocks_json: set.serialize().to_string(),
                })
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                tracing::debug!(hash = %hashed, "visible blocks created concurrently");
                self.find(hashed)?
                    .ok_or_else(|| GradeError::not_found("visible blocks", hashed))
            }
            Err(e) => Err(map_db_err!("insert visible blocks", e)),
        }
    }

    /// Look up an entry by hash without decoding it.
    pub fn find(&self, hashed: &str) -> Result<Option<StoredBlocks>> {
        self.conn
            .query_row(
                "SELECT id, hashed, blocks_json FROM visible_blocks WHERE hashed = ?1",
                params![hashed],
                |row| {
                    Ok(StoredBlocks {
                        id: row.get(0)?,
                        hashed: row.get(1)?,
                        blocks_json: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(|e| map_db_err!("query visible blocks", e))
    }

    /// Decode the set stored under `hashed`.
    pub fn resolve(&self, hashed: &str) -> Result<BlockRecordSet> {
        self.find(hashed)?
            .ok_or_else(|| GradeError::not_found("visible blocks", hashed))?
            .blocks()
    }

    /// Every stored entry in insertion order.
    pub fn entries(&self) -> Result<Vec<StoredBlocks>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, hashed, blocks_json FROM visible_blocks ORDER BY id")
            .map_err(|e| map_db_err!("prepare visible blocks scan", e))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(StoredBlocks {
                    id: row.get(0)?,
                    hashed: row.get(1)?,
                    blocks_json: row.get(2)?,
                })
            })
            .map_err(|e| map_db_err!("scan visible blocks", e))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| map_db_err!("read visible blocks row", e))
    }
}
