use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::{RawScore, ScoreSource, ScoresSnapshot, Student, SubmissionScoreSource, SubmissionScores};
use crate::error::Result;
use crate::identity::IdentityService;
use crate::keys::{CourseKey, UsageKey};

#[derive(Debug, Deserialize)]
struct ScoreFileDocument {
    #[serde(default)]
    students: Vec<StudentScores>,
}

/// Scores of one student as written in a score file.
#[derive(Debug, Clone, Deserialize)]
pub struct StudentScores {
    pub id: i64,
    #[serde(default)]
    pub username: String,
    /// Live attempt scores
    #[serde(default)]
    pub scores: BTreeMap<UsageKey, RawScore>,
    /// Scores from the submissions service
    #[serde(default)]
    pub submissions: BTreeMap<UsageKey, RawScore>,
}

/// Both score sources backed by one JSON document.
///
/// ```json
/// {"students": [{"id": 7, "username": "ada",
///   "scores": {"block-v1:Org+CS101+2016+type@problem+block@p1": {"earned": 1, "possible": 2}},
///   "submissions": {}}]}
/// ```
///
/// Submission scores are indexed by the anonymized id of each student in the
/// course, the same way the submissions service is queried.
#[derive(Debug, Clone, Default)]
pub struct ScoreFile {
    students: HashMap<i64, StudentScores>,
    by_anonymous_id: HashMap<String, i64>,
}

impl ScoreFile {
    pub fn load(path: &Path, course: &CourseKey, identity: &dyn IdentityService) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content, course, identity)
    }

    pub fn from_json(raw: &str, course: &CourseKey, identity: &dyn IdentityService) -> Result<Self> {
        let document: ScoreFileDocument = serde_json::from_str(raw)?;

        let mut file = ScoreFile::default();
        for entry in document.students {
            let student = Student::new(entry.id, entry.username.clone());
            let anonymous_id = identity.anonymized_id(&student, course)?;
            file.by_anonymous_id.insert(anonymous_id, entry.id);
            file.students.insert(entry.id, entry);
        }
        Ok(file)
    }

    pub fn student(&self, id: i64) -> Option<Student> {
        self.students
            .get(&id)
            .map(|entry| Student::new(entry.id, entry.username.clone()))
    }
}

impl ScoreSource for ScoreFile {
    fn scores_for(
        &self,
        _course: &CourseKey,
        student: &Student,
        locations: &[UsageKey],
    ) -> Result<ScoresSnapshot> {
        let Some(entry) = self.students.get(&student.id) else {
            return Ok(ScoresSnapshot::default());
        };
        Ok(locations
            .iter()
            .filter_map(|location| {
                entry
                    .scores
                    .get(location)
                    .map(|score| (location.clone(), *score))
            })
            .collect())
    }
}

impl SubmissionScoreSource for ScoreFile {
    fn get_scores(&self, _course: &CourseKey, anonymous_id: &str) -> Result<SubmissionScores> {
        let entry = self
            .by_anonymous_id
            .get(anonymous_id)
            .and_then(|id| self.students.get(id));
        Ok(entry
            .map(|entry| {
                entry
                    .submissions
                    .iter()
                    .map(|(location, score)| (location.clone(), *score))
                    .collect()
            })
            .unwrap_or_default())
    }
}
