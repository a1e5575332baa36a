use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use super::record::{format_timestamp, parse_timestamp, GradeParams, GradeRecord, PreparedGrade};
use crate::blocks::{BlockRecordSet, ContentAddressedBlockStore};
use crate::db::Database;
use crate::error::{ConflictEntry, GradeError, Result};
use crate::keys::{CourseKey, UsageKey};
use crate::map_db_err;

/// Read/write access to saved subsection grades.
pub trait GradeRepository {
    /// The grade for one student and subsection, `NotFound` if none is saved.
    fn read(&self, user_id: i64, usage_key: &UsageKey) -> Result<GradeRecord>;

    /// Every saved grade of the student in the course, ordered by subsection.
    fn read_all_for_course(&self, user_id: i64, course_id: &CourseKey) -> Result<Vec<GradeRecord>>;

    /// Create or replace the grade for `(course, user, subsection)`.
    fn upsert(&self, params: GradeParams) -> Result<GradeRecord>;

    /// Insert grades that must not exist yet; all-or-nothing.
    fn bulk_create(&self, params: Vec<GradeParams>) -> Result<Vec<GradeRecord>>;
}

const SELECT_GRADE: &str = "SELECT g.id, g.user_id, g.course_id, g.usage_key, g.subtree_edited_timestamp, \
     g.course_version, g.earned_all, g.possible_all, g.earned_graded, g.possible_graded, \
     g.visible_blocks_hash, v.blocks_json, g.created, g.modified \
     FROM persistent_subsection_grades g \
     JOIN visible_blocks v ON v.hashed = g.visible_blocks_hash";

struct ExtractedGradeRow {
    id: i64,
    user_id: i64,
    course_id: String,
    usage_key: String,
    subtree_edited_timestamp: String,
    course_version: String,
    earned_all: f64,
    possible_all: f64,
    earned_graded: f64,
    possible_graded: f64,
    visible_blocks_hash: String,
    blocks_json: String,
    created: String,
    modified: String,
}

fn extract_grade_row(row: &rusqlite::Row) -> rusqlite::Result<ExtractedGradeRow> {
    Ok(ExtractedGradeRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        course_id: row.get(2)?,
        usage_key: row.get(3)?,
        subtree_edited_timestamp: row.get(4)?,
        course_version: row.get(5)?,
        earned_all: row.get(6)?,
        possible_all: row.get(7)?,
        earned_graded: row.get(8)?,
        possible_graded: row.get(9)?,
        visible_blocks_hash: row.get(10)?,
        blocks_json: row.get(11)?,
        created: row.get(12)?,
        modified: row.get(13)?,
    })
}

impl ExtractedGradeRow {
    fn into_record(self) -> Result<GradeRecord> {
        Ok(GradeRecord {
            id: self.id,
            user_id: self.user_id,
            course_id: self
                .course_id
                .parse()
                .map_err(|e| map_db_err!("parse course_id", e))?,
            usage_key: self
                .usage_key
                .parse()
                .map_err(|e| map_db_err!("parse usage_key", e))?,
            subtree_edited_timestamp: parse_timestamp(
                "subtree_edited_timestamp",
                &self.subtree_edited_timestamp,
            )?,
            course_version: self.course_version,
            earned_all: self.earned_all,
            possible_all: self.possible_all,
            earned_graded: self.earned_graded,
            possible_graded: self.possible_graded,
            visible_blocks: BlockRecordSet::parse(&self.blocks_json)?,
            visible_blocks_hash: self.visible_blocks_hash,
            created: parse_timestamp("created", &self.created)?,
            modified: parse_timestamp("modified", &self.modified)?,
        })
    }
}

/// SQLite-backed [`GradeRepository`].
pub struct SqliteGradeRepository<'db> {
    db: &'db Database,
}

impl<'db> SqliteGradeRepository<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }

    fn read_with(conn: &Connection, user_id: i64, usage_key: &UsageKey) -> Result<Option<GradeRecord>> {
        let sql = format!(
            "{} WHERE g.user_id = ?1 AND g.course_id = ?2 AND g.usage_key = ?3",
            SELECT_GRADE
        );
        let row = conn
            .query_row(
                &sql,
                params![
                    user_id,
                    usage_key.course_key().to_string(),
                    usage_key.to_string()
                ],
                extract_grade_row,
            )
            .optional()
            .map_err(|e| map_db_err!("query grade", e))?;

        row.map(ExtractedGradeRow::into_record).transpose()
    }

    /// Every saved grade, for integrity checks.
    pub fn read_all(&self) -> Result<Vec<GradeRecord>> {
        let sql = format!("{} ORDER BY g.id", SELECT_GRADE);
        let mut stmt = self
            .db
            .conn()
            .prepare(&sql)
            .map_err(|e| map_db_err!("prepare grade scan", e))?;
        let rows = stmt
            .query_map([], extract_grade_row)
            .map_err(|e| map_db_err!("scan grades", e))?;

        let mut records = Vec::new();
        for row in rows {
            let row = row.map_err(|e| map_db_err!("read grade row", e))?;
            records.push(row.into_record()?);
        }
        Ok(records)
    }

    /// Grade rows whose block hash has no visible-blocks entry, as `(id, hash)`.
    pub fn dangling_block_references(&self) -> Result<Vec<(i64, String)>> {
        let mut stmt = self
            .db
            .conn()
            .prepare(
                "SELECT g.id, g.visible_blocks_hash FROM persistent_subsection_grades g \
                 LEFT JOIN visible_blocks v ON v.hashed = g.visible_blocks_hash \
                 WHERE v.id IS NULL ORDER BY g.id",
            )
            .map_err(|e| map_db_err!("prepare dangling reference scan", e))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| map_db_err!("scan dangling references", e))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| map_db_err!("read dangling reference", e))
    }

    fn insert_prepared(
        conn: &Connection,
        prepared: &PreparedGrade,
        upsert: bool,
        now: &DateTime<Utc>,
    ) -> rusqlite::Result<usize> {
        let conflict_clause = if upsert {
            " ON CONFLICT(course_id, user_id, usage_key) DO UPDATE SET \
             subtree_edited_timestamp = excluded.subtree_edited_timestamp, \
             course_version = excluded.course_version, \
             earned_all = excluded.earned_all, \
             possible_all = excluded.possible_all, \
             earned_graded = excluded.earned_graded, \
             possible_graded = excluded.possible_graded, \
             visible_blocks_hash = excluded.visible_blocks_hash, \
             modified = excluded.modified"
        } else {
            ""
        };
        let sql = format!(
            "INSERT INTO persistent_subsection_grades (user_id, course_id, usage_key, \
             subtree_edited_timestamp, course_version, earned_all, possible_all, \
             earned_graded, possible_graded, visible_blocks_hash, created, modified) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11){}",
            conflict_clause
        );

        conn.execute(
            &sql,
            params![
                prepared.user_id,
                prepared.course_id.to_string(),
                prepared.usage_key.to_string(),
                format_timestamp(&prepared.subtree_edited_timestamp),
                prepared.course_version,
                prepared.earned_all,
                prepared.possible_all,
                prepared.earned_graded,
                prepared.possible_graded,
                prepared.visible_blocks.content_hash(),
                format_timestamp(now),
            ],
        )
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

impl GradeRepository for SqliteGradeRepository<'_> {
    #[tracing::instrument(skip(self), fields(usage_key = %usage_key))]
    fn read(&self, user_id: i64, usage_key: &UsageKey) -> Result<GradeRecord> {
        Self::read_with(self.db.conn(), user_id, usage_key)?.ok_or_else(|| {
            GradeError::not_found("grade", format!("user {} subsection {}", user_id, usage_key))
        })
    }

    #[tracing::instrument(skip(self), fields(course_id = %course_id))]
    fn read_all_for_course(&self, user_id: i64, course_id: &CourseKey) -> Result<Vec<GradeRecord>> {
        let sql = format!(
            "{} WHERE g.user_id = ?1 AND g.course_id = ?2 ORDER BY g.usage_key",
            SELECT_GRADE
        );
        let mut stmt = self
            .db
            .conn()
            .prepare(&sql)
            .map_err(|e| map_db_err!("prepare course grades query", e))?;
        let rows = stmt
            .query_map(params![user_id, course_id.to_string()], extract_grade_row)
            .map_err(|e| map_db_err!("query course grades", e))?;

        let mut records = Vec::new();
        for row in rows {
            let row = row.map_err(|e| map_db_err!("read grade row", e))?;
            records.push(row.into_record()?);
        }
        tracing::debug!(count = records.len(), "read saved grades for course");
        Ok(records)
    }

    #[tracing::instrument(skip(self, params), fields(user_id = params.user_id, usage_key = %params.usage_key))]
    fn upsert(&self, params: GradeParams) -> Result<GradeRecord> {
        let prepared = PreparedGrade::from_params(params)?;

        let tx = self
            .db
            .conn()
            .unchecked_transaction()
            .map_err(|e| GradeError::transaction("start", e))?;

        ContentAddressedBlockStore::new(&tx).get_or_create(&prepared.visible_blocks)?;
        Self::insert_prepared(&tx, &prepared, true, &Utc::now())
            .map_err(|e| map_db_err!("upsert grade", e))?;
        let record = Self::read_with(&tx, prepared.user_id, &prepared.usage_key)?
            .ok_or_else(|| GradeError::not_found("grade", &prepared.usage_key))?;

        tx.commit()
            .map_err(|e| GradeError::transaction("commit", e))?;

        tracing::debug!(hash = %record.visible_blocks_hash, "saved grade");
        Ok(record)
    }

    #[tracing::instrument(skip(self, params), fields(count = params.len()))]
    fn bulk_create(&self, params: Vec<GradeParams>) -> Result<Vec<GradeRecord>> {
        if params.is_empty() {
            return Ok(Vec::new());
        }

        let prepared = params
            .into_iter()
            .map(PreparedGrade::from_params)
            .collect::<Result<Vec<_>>>()?;

        let tx = self
            .db
            .conn()
            .unchecked_transaction()
            .map_err(|e| GradeError::transaction("start", e))?;

        let now = Utc::now();
        let blocks = ContentAddressedBlockStore::new(&tx);
        let mut conflicts = Vec::new();
        let mut inserted = Vec::with_capacity(prepared.len());

        for (index, grade) in prepared.into_iter().enumerate() {
            blocks.get_or_create(&grade.visible_blocks)?;
            match Self::insert_prepared(&tx, &grade, false, &now) {
                Ok(_) => inserted.push((tx.last_insert_rowid(), grade)),
                Err(e) if is_constraint_violation(&e) => conflicts.push(ConflictEntry {
                    index,
                    user_id: grade.user_id,
                    usage_key: grade.usage_key.to_string(),
                }),
                Err(e) => return Err(map_db_err!("insert grade", e)),
            }
        }

        if !conflicts.is_empty() {
            tracing::warn!(conflicts = conflicts.len(), "bulk create rolled back");
            tx.rollback()
                .map_err(|e| GradeError::transaction("rollback", e))?;
            return Err(GradeError::Conflict { conflicts });
        }

        tx.commit()
            .map_err(|e| GradeError::transaction("commit", e))?;

        let records: Vec<GradeRecord> = inserted
            .into_iter()
            .map(|(id, grade)| grade.into_record(id, now, now))
            .collect();
        tracing::info!(count = records.len(), "bulk created grades");
        Ok(records)
    }
}
