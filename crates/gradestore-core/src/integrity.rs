//! Consistency checks over a grade database

use serde::Serialize;

use crate::db::Database;
use crate::error::Result;
use crate::grades::SqliteGradeRepository;
use crate::map_db_err;

/// One problem found by [`check_integrity`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    /// Grade row whose visible-blocks hash has no stored entry
    DanglingBlocks { grade_id: i64, hash: String },
    /// Stored JSON that cannot be decoded
    MalformedBlocks { hash: String, reason: String },
    /// Stored JSON whose hash no longer matches its key
    HashMismatch { hash: String, actual: String },
    /// Totals outside `possible >= earned >= 0`
    TotalsOutOfRange {
        grade_id: i64,
        user_id: i64,
        usage_key: String,
        total: &'static str,
        earned: f64,
        possible: f64,
    },
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Issue::DanglingBlocks { grade_id, hash } => {
                write!(f, "grade {} references missing visible blocks {}", grade_id, hash)
            }
            Issue::MalformedBlocks { hash, reason } => {
                write!(f, "visible blocks {} cannot be decoded: {}", hash, reason)
            }
            Issue::HashMismatch { hash, actual } => {
                write!(f, "visible blocks {} now hash to {}", hash, actual)
            }
            Issue::TotalsOutOfRange {
                grade_id,
                user_id,
                usage_key,
                total,
                earned,
                possible,
            } => write!(
                f,
                "grade {} (user {}, {}) has {} total {}/{}",
                grade_id, user_id, usage_key, total, earned, possible
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntegrityReport {
    pub grades_checked: i64,
    pub blocks_checked: usize,
    pub issues: Vec<Issue>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

pub fn check_integrity(db: &Database) -> Result<IntegrityReport> {
    let mut report = IntegrityReport {
        grades_checked: db.get_grade_count()?,
        ..IntegrityReport::default()
    };

    for (grade_id, hash) in SqliteGradeRepository::new(db).dangling_block_references()? {
        report.issues.push(Issue::DanglingBlocks { grade_id, hash });
    }

    let entries = db.blocks().entries()?;
    report.blocks_checked = entries.len();
    for entry in entries {
        match entry.blocks() {
            Ok(set) if set.content_hash() != entry.hashed => {
                report.issues.push(Issue::HashMismatch {
                    actual: set.content_hash().to_string(),
                    hash: entry.hashed,
                });
            }
            Ok(_) => {}
            Err(e) => report.issues.push(Issue::MalformedBlocks {
                hash: entry.hashed,
                reason: e.to_string(),
            }),
        }
    }

    report.issues.extend(out_of_range_totals(db)?);

    tracing::debug!(
        grades = report.grades_checked,
        blocks = report.blocks_checked,
        issues = report.issues.len(),
        "integrity check finished"
    );
    Ok(report)
}

fn out_of_range_totals(db: &Database) -> Result<Vec<Issue>> {
    let mut stmt = db
        .conn()
        .prepare(
            "SELECT id, user_id, usage_key, earned_all, possible_all, earned_graded, possible_graded \
             FROM persistent_subsection_grades ORDER BY id",
        )
        .map_err(|e| map_db_err!("prepare totals scan", e))?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                [
                    ("all", row.get::<_, f64>(3)?, row.get::<_, f64>(4)?),
                    ("graded", row.get::<_, f64>(5)?, row.get::<_, f64>(6)?),
                ],
            ))
        })
        .map_err(|e| map_db_err!("scan totals", e))?;

    let mut issues = Vec::new();
    for row in rows {
        let (grade_id, user_id, usage_key, totals) =
            row.map_err(|e| map_db_err!("read totals row", e))?;
        for (total, earned, possible) in totals {
            if !(earned >= 0.0 && possible >= earned) {
                issues.push(Issue::TotalsOutOfRange {
                    grade_id,
                    user_id,
                    usage_key: usage_key.clone(),
                    total,
                    earned,
                    possible,
                });
            }
        }
    }
    Ok(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::BlockRecord;
    use crate::grades::{GradeParams, GradeRepository};
    use crate::keys::CourseKey;
    use chrono::Utc;
    use rusqlite::params;

    fn grade(earned_graded: f64) -> GradeParams {
        let course = CourseKey::new("Org", "CS101", "2016").unwrap();
        GradeParams {
            user_id: 1,
            usage_key: course.make_usage_key("sequential", "s1").unwrap(),
            course_id: None,
            course_version: None,
            subtree_edited_timestamp: Utc::now(),
            earned_all: 1.0,
            possible_all: 2.0,
            earned_graded,
            possible_graded: 2.0,
            visible_blocks: vec![BlockRecord::new(
                course.make_usage_key("problem", "p1").unwrap(),
                None,
                2.0,
            )],
        }
    }

    #[test]
    fn test_clean_database() {
        let db = Database::open_in_memory().unwrap();
        SqliteGradeRepository::new(&db).upsert(grade(1.0)).unwrap();

        let report = check_integrity(&db).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.grades_checked, 1);
        assert_eq!(report.blocks_checked, 1);
    }

    #[test]
    fn test_fractional_scores_stay_clean() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteGradeRepository::new(&db);
        let possible = 1.0 / 11.0;
        let mut params = grade(0.05);
        params.possible_graded = possible;
        params.visible_blocks[0].max_possible_score = possible;
        params.visible_blocks[0].weight = Some(2.0 / 3.0);
        let saved = repo.upsert(params).unwrap();

        let reloaded = repo.read(saved.user_id, &saved.usage_key).unwrap();
        assert_eq!(reloaded.visible_blocks.records()[0].max_possible_score, possible);
        assert_eq!(reloaded.visible_blocks.records()[0].weight, Some(2.0 / 3.0));
        assert_eq!(reloaded.visible_blocks.content_hash(), saved.visible_blocks_hash);

        let report = check_integrity(&db).unwrap();
        assert!(report.is_clean(), "{:?}", report.issues);
    }

    #[test]
    fn test_reports_out_of_range_totals() {
        let db = Database::open_in_memory().unwrap();
        SqliteGradeRepository::new(&db).upsert(grade(3.0)).unwrap();

        let report = check_integrity(&db).unwrap();
        assert_eq!(report.issues.len(), 1);
        assert!(matches!(
            report.issues[0],
            Issue::TotalsOutOfRange { total: "graded", .. }
        ));
    }

    #[test]
    fn test_reports_tampered_and_missing_blocks() {
        let db = Database::open_in_memory().unwrap();
        let saved = SqliteGradeRepository::new(&db).upsert(grade(1.0)).unwrap();

        db.conn()
            .execute(
                "INSERT INTO visible_blocks (hashed, blocks_json) VALUES ('bogus', 'not json')",
                [],
            )
            .unwrap();
        db.conn()
            .execute(
                "INSERT INTO visible_blocks (hashed, blocks_json) VALUES ('stale', ?1)",
                params![saved.visible_blocks.serialize()],
            )
            .unwrap();
        db.conn().pragma_update(None, "foreign_keys", "OFF").unwrap();
        db.conn()
            .execute(
                "DELETE FROM visible_blocks WHERE hashed = ?1",
                params![saved.visible_blocks_hash],
            )
            .unwrap();

        let report = check_integrity(&db).unwrap();
        let kinds: Vec<&str> = report
            .issues
            .iter()
            .map(|issue| match issue {
                Issue::DanglingBlocks { .. } => "dangling",
                Issue::MalformedBlocks { .. } => "malformed",
                Issue::HashMismatch { .. } => "mismatch",
                Issue::TotalsOutOfRange { .. } => "totals",
            })
            .collect();
        assert_eq!(kinds, vec!["dangling", "malformed", "mismatch"]);
        assert!(!report.is_clean());
    }
}
