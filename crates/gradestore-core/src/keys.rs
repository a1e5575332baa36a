//! Opaque course and block identifiers
//!
//! Course keys render as `course-v1:{org}+{course}+{run}` and block usage keys
//! as `block-v1:{org}+{course}+{run}+type@{block_type}+block@{block_id}`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GradeError;

const COURSE_PREFIX: &str = "course-v1:";
const BLOCK_PREFIX: &str = "block-v1:";
const TYPE_TAG: &str = "type@";
const BLOCK_TAG: &str = "block@";

fn valid_component(part: &str) -> bool {
    !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '~' | '%'))
}

/// Identifier of one course run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CourseKey {
    org: String,
    course: String,
    run: String,
}

impl CourseKey {
    pub fn new(org: &str, course: &str, run: &str) -> Result<Self, GradeError> {
        for part in [org, course, run] {
            if !valid_component(part) {
                return Err(GradeError::invalid_value("course key component", part));
            }
        }
        Ok(Self {
            org: org.to_string(),
            course: course.to_string(),
            run: run.to_string(),
        })
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn course(&self) -> &str {
        &self.course
    }

    pub fn run(&self) -> &str {
        &self.run
    }

    /// Build a usage key for a block inside this course.
    pub fn make_usage_key(&self, block_type: &str, block_id: &str) -> Result<UsageKey, GradeError> {
        UsageKey::new(self.clone(), block_type, block_id)
    }
}

impl fmt::Display for CourseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}+{}+{}", COURSE_PREFIX, self.org, self.course, self.run)
    }
}

impl FromStr for CourseKey {
    type Err = GradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix(COURSE_PREFIX)
            .ok_or_else(|| GradeError::invalid_value("course key", s))?;
        let parts: Vec<&str> = body.split('+').collect();
        match parts.as_slice() {
            [org, course, run] => CourseKey::new(org, course, run)
                .map_err(|_| GradeError::invalid_value("course key", s)),
            _ => Err(GradeError::invalid_value("course key", s)),
        }
    }
}

impl TryFrom<String> for CourseKey {
    type Error = GradeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CourseKey> for String {
    fn from(key: CourseKey) -> String {
        key.to_string()
    }
}

/// Identifier of one block (problem, vertical, subsection, ...) within a course.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UsageKey {
    course: CourseKey,
    block_type: String,
    block_id: String,
}

impl UsageKey {
    pub fn new(course: CourseKey, block_type: &str, block_id: &str) -> Result<Self, GradeError> {
        if !valid_component(block_type) {
            return Err(GradeError::invalid_value("block type", block_type));
        }
        if !valid_component(block_id) {
            return Err(GradeError::invalid_value("block id", block_id));
        }
        Ok(Self {
            course,
            block_type: block_type.to_string(),
            block_id: block_id.to_string(),
        })
    }

    pub fn course_key(&self) -> &CourseKey {
        &self.course
    }

    pub fn block_type(&self) -> &str {
        &self.block_type
    }

    pub fn block_id(&self) -> &str {
        &self.block_id
    }
}

impl fmt::Display for UsageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}+{}+{}+{}{}+{}{}",
            BLOCK_PREFIX,
            self.course.org,
            self.course.course,
            self.course.run,
            TYPE_TAG,
            self.block_type,
            BLOCK_TAG,
            self.block_id
        )
    }
}

impl FromStr for UsageKey {
    type Err = GradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GradeError::invalid_value("usage key", s);
        let body = s.strip_prefix(BLOCK_PREFIX).ok_or_else(invalid)?;
        let parts: Vec<&str> = body.split('+').collect();
        let [org, course, run, type_part, block_part] = parts.as_slice() else {
            return Err(invalid());
        };
        let block_type = type_part.strip_prefix(TYPE_TAG).ok_or_else(invalid)?;
        let block_id = block_part.strip_prefix(BLOCK_TAG).ok_or_else(invalid)?;
        let course = CourseKey::new(org, course, run).map_err(|_| invalid())?;
        UsageKey::new(course, block_type, block_id).map_err(|_| invalid())
    }
}

impl TryFrom<String> for UsageKey {
    type Error = GradeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UsageKey> for String {
    fn from(key: UsageKey) -> String {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_course_key_round_trips_through_string() {
        let key: CourseKey = "course-v1:MITx+6.002x+2016_T1".parse().unwrap();
        assert_eq!(key.org(), "MITx");
        assert_eq!(key.course(), "6.002x");
        assert_eq!(key.run(), "2016_T1");
        assert_eq!(key.to_string(), "course-v1:MITx+6.002x+2016_T1");
    }

    #[test]
    fn test_course_key_rejects_missing_run() {
        assert!("course-v1:MITx+6.002x".parse::<CourseKey>().is_err());
        assert!("MITx/6.002x/2016".parse::<CourseKey>().is_err());
    }

    #[test]
    fn test_usage_key_parses_components() {
        let key: UsageKey = "block-v1:Org+CS101+2016+type@problem+block@p1"
            .parse()
            .unwrap();
        assert_eq!(key.block_type(), "problem");
        assert_eq!(key.block_id(), "p1");
        assert_eq!(key.course_key().to_string(), "course-v1:Org+CS101+2016");
    }

    #[test]
    fn test_usage_key_rejects_bad_tags() {
        assert!("block-v1:Org+CS101+2016+problem+block@p1"
            .parse::<UsageKey>()
            .is_err());
        assert!("block-v1:Org+CS101+2016+type@problem+block@"
            .parse::<UsageKey>()
            .is_err());
        assert!("block-v1:Org+CS101+2016+type@problem+block@p 1"
            .parse::<UsageKey>()
            .is_err());
    }

    #[test]
    fn test_usage_key_serde_as_string() {
        let course = CourseKey::new("Org", "CS101", "2016").unwrap();
        let key = course.make_usage_key("sequential", "hw1").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"block-v1:Org+CS101+2016+type@sequential+block@hw1\"");
        let back: UsageKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
