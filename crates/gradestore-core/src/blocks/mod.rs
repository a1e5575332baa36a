//! Visible block records
//!
//! A [`BlockRecordSet`] captures which scorable blocks (and with what weight and
//! maximum score) were considered when a subsection grade was computed. Its
//! canonical JSON form is hashed so identical sets share one stored entry.

mod store;

use std::sync::OnceLock;

use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::bail_malformed;
use crate::error::{GradeError, Result};
use crate::keys::{CourseKey, UsageKey};

pub use store::{ContentAddressedBlockStore, StoredBlocks};

/// A block as it was seen by one grade computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    #[serde(rename = "block_id")]
    pub location: UsageKey,
    pub weight: Option<f64>,
    pub max_possible_score: f64,
}

impl BlockRecord {
    pub fn new(location: UsageKey, weight: Option<f64>, max_possible_score: f64) -> Self {
        Self {
            location,
            weight,
            max_possible_score,
        }
    }
}

// Wire structs declare fields in lexicographic order of their serialized
// names; serde_json emits struct fields in declaration order, which gives the
// sorted-key canonical form.
#[derive(Serialize)]
struct CanonicalSet<'a> {
    blocks: Vec<CanonicalRecord<'a>>,
    course_id: Option<String>,
}

#[derive(Serialize)]
struct CanonicalRecord<'a> {
    block_id: String,
    max_possible_score: f64,
    weight: &'a Option<f64>,
}

#[derive(Deserialize)]
struct StoredSet {
    course_id: Option<String>,
    blocks: Vec<StoredRecord>,
}

#[derive(Deserialize)]
struct StoredRecord {
    block_id: String,
    weight: Option<f64>,
    max_possible_score: f64,
}

/// Immutable, order-preserving list of [`BlockRecord`]s from a single course.
#[derive(Debug, Clone)]
pub struct BlockRecordSet {
    records: Vec<BlockRecord>,
    json: String,
    hash: OnceLock<String>,
}

impl BlockRecordSet {
    /// Build a set from records in the order given.
    ///
    /// Repeated locations are kept as-is. Mixing courses or supplying a
    /// non-finite score is a caller bug and fails fast.
    pub fn build(records: impl IntoIterator<Item = BlockRecord>) -> Result<Self> {
        let records: Vec<BlockRecord> = records.into_iter().collect();

        if let Some(first) = records.first() {
            let course = first.location.course_key();
            if let Some(stray) = records
                .iter()
                .find(|r| r.location.course_key() != course)
            {
                return Err(GradeError::structural(format!(
                    "block {} does not belong to course {}",
                    stray.location, course
                )));
            }
        }

        if let Some(bad) = records.iter().find(|r| {
            !r.max_possible_score.is_finite() || r.weight.is_some_and(|w| !w.is_finite())
        }) {
            return Err(GradeError::invalid_value(
                "block record score",
                format!("{} ({:?}, {})", bad.location, bad.weight, bad.max_possible_score),
            ));
        }

        let json = Self::canonical_json(&records)?;

        Ok(Self {
            records,
            json,
            hash: OnceLock::new(),
        })
    }

    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            json: r#"{"blocks":[],"course_id":null}"#.to_string(),
            hash: OnceLock::new(),
        }
    }

    fn canonical_json(records: &[BlockRecord]) -> Result<String> {
        let set = CanonicalSet {
            blocks: records
                .iter()
                .map(|r| CanonicalRecord {
                    block_id: r.location.to_string(),
                    max_possible_score: r.max_possible_score,
                    weight: &r.weight,
                })
                .collect(),
            course_id: records
                .first()
                .map(|r| r.location.course_key().to_string()),
        };
        Ok(serde_json::to_string(&set)?)
    }

    /// Course shared by every record, `None` for the empty set.
    pub fn course_key(&self) -> Option<&CourseKey> {
        self.records.first().map(|r| r.location.course_key())
    }

    pub fn records(&self) -> &[BlockRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BlockRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Canonical serialized form: sorted keys, no whitespace.
    pub fn serialize(&self) -> &str {
        &self.json
    }

    /// Base64 of the SHA-1 digest of [`serialize`](Self::serialize).
    pub fn content_hash(&self) -> &str {
        self.hash.get_or_init(|| {
            let digest = Sha1::digest(self.json.as_bytes());
            BASE64_STANDARD.encode(digest)
        })
    }

    /// Parse a previously serialized set.
    pub fn parse(raw: &str) -> Result<Self> {
        let stored: StoredSet = serde_json::from_str(raw)
            .map_err(|e| GradeError::malformed(format!("invalid JSON: {}", e)))?;

        let course: CourseKey = match (stored.course_id, stored.blocks.is_empty()) {
            (None, true) => return Ok(Self::empty()),
            (None, false) => {
                bail_malformed!("course_id is null but {} block(s) present", stored.blocks.len())
            }
            (Some(course_id), true) => {
                bail_malformed!("course_id {} given for an empty block list", course_id)
            }
            (Some(course_id), false) => course_id
                .parse()
                .map_err(|_| GradeError::malformed(format!("invalid course_id {}", course_id)))?,
        };

        let mut records = Vec::with_capacity(stored.blocks.len());
        for block in stored.blocks {
            let location: UsageKey = block
                .block_id
                .parse()
                .map_err(|_| GradeError::malformed(format!("invalid block_id {}", block.block_id)))?;
            if location.course_key() != &course {
                bail_malformed!("block_id {} is not in course {}", location, course);
            }
            records.push(BlockRecord::new(
                location,
                block.weight,
                block.max_possible_score,
            ));
        }

        Self::build(records).map_err(|e| match e {
            GradeError::InvalidValue { value, .. } => GradeError::malformed(value),
            other => other,
        })
    }
}

impl PartialEq for BlockRecordSet {
    fn eq(&self, other: &Self) -> bool {
        self.records == other.records
    }
}

impl<'a> IntoIterator for &'a BlockRecordSet {
    type Item = &'a BlockRecord;
    type IntoIter = std::slice::Iter<'a, BlockRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
