use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::bail_invalid;
use crate::blocks::{BlockRecord, BlockRecordSet};
use crate::error::{GradeError, Result};
use crate::keys::{CourseKey, UsageKey};

/// A saved subsection grade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeRecord {
    pub id: i64,
    pub user_id: i64,
    pub course_id: CourseKey,
    pub usage_key: UsageKey,
    /// Last content edit in the subsection when the grade was computed
    pub subtree_edited_timestamp: DateTime<Utc>,
    /// Course version string, empty when unknown
    pub course_version: String,
    pub earned_all: f64,
    pub possible_all: f64,
    pub earned_graded: f64,
    pub possible_graded: f64,
    pub visible_blocks_hash: String,
    #[serde(skip)]
    pub visible_blocks: BlockRecordSet,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl GradeRecord {
    pub fn summary(&self) -> String {
        format!(
            "user: {}, course version: {}, subsection {} ({}). {}/{} graded, {}/{} all",
            self.user_id,
            self.course_version,
            self.usage_key,
            self.visible_blocks_hash,
            self.earned_graded,
            self.possible_graded,
            self.earned_all,
            self.possible_all,
        )
    }

    /// Totals that break `possible >= earned >= 0`, as `(label, earned, possible)`.
    pub fn total_violations(&self) -> Vec<(&'static str, f64, f64)> {
        [
            ("all", self.earned_all, self.possible_all),
            ("graded", self.earned_graded, self.possible_graded),
        ]
        .into_iter()
        .filter(|(_, earned, possible)| !(*earned >= 0.0 && possible >= earned))
        .collect()
    }
}

/// Input for writing a grade row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeParams {
    pub user_id: i64,
    pub usage_key: UsageKey,
    /// Defaults to the usage key's course
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<CourseKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_version: Option<String>,
    pub subtree_edited_timestamp: DateTime<Utc>,
    pub earned_all: f64,
    pub possible_all: f64,
    pub earned_graded: f64,
    pub possible_graded: f64,
    pub visible_blocks: Vec<BlockRecord>,
}

/// Params normalized and ready to be written.
#[derive(Debug, Clone)]
pub(crate) struct PreparedGrade {
    pub user_id: i64,
    pub course_id: CourseKey,
    pub usage_key: UsageKey,
    pub subtree_edited_timestamp: DateTime<Utc>,
    pub course_version: String,
    pub earned_all: f64,
    pub possible_all: f64,
    pub earned_graded: f64,
    pub possible_graded: f64,
    pub visible_blocks: BlockRecordSet,
}

impl PreparedGrade {
    pub fn from_params(params: GradeParams) -> Result<Self> {
        let course_id = params
            .course_id
            .unwrap_or_else(|| params.usage_key.course_key().clone());
        if &course_id != params.usage_key.course_key() {
            return Err(GradeError::structural(format!(
                "subsection {} is not in course {}",
                params.usage_key, course_id
            )));
        }

        for (label, value) in [
            ("earned_all", params.earned_all),
            ("possible_all", params.possible_all),
            ("earned_graded", params.earned_graded),
            ("possible_graded", params.possible_graded),
        ] {
            if !value.is_finite() {
                bail_invalid!(label, value);
            }
        }

        let visible_blocks = BlockRecordSet::build(params.visible_blocks)?;
        if let Some(blocks_course) = visible_blocks.course_key() {
            if blocks_course != &course_id {
                return Err(GradeError::structural(format!(
                    "visible blocks belong to {} but grade is for {}",
                    blocks_course, course_id
                )));
            }
        }

        Ok(Self {
            user_id: params.user_id,
            course_id,
            usage_key: params.usage_key,
            subtree_edited_timestamp: params.subtree_edited_timestamp,
            course_version: params.course_version.unwrap_or_default(),
            earned_all: params.earned_all,
            possible_all: params.possible_all,
            earned_graded: params.earned_graded,
            possible_graded: params.possible_graded,
            visible_blocks,
        })
    }

    pub fn into_record(self, id: i64, created: DateTime<Utc>, modified: DateTime<Utc>) -> GradeRecord {
        GradeRecord {
            id,
            user_id: self.user_id,
            course_id: self.course_id,
            usage_key: self.usage_key,
            subtree_edited_timestamp: self.subtree_edited_timestamp,
            course_version: self.course_version,
            earned_all: self.earned_all,
            possible_all: self.possible_all,
            earned_graded: self.earned_graded,
            possible_graded: self.possible_graded,
            visible_blocks_hash: self.visible_blocks.content_hash().to_string(),
            visible_blocks: self.visible_blocks,
            created,
            modified,
        }
    }
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| GradeError::db_operation(&format!("parse {}", field), e))
}
