//! Score types and the score-source collaborators
//!
//! Live attempt scores and externally submitted scores are fetched in bulk once
//! per student and course, then consulted block by block through a
//! [`ScoreResolver`]. Totals over a subsection come from an [`Aggregator`].

mod aggregate;
mod file;
mod resolve;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::keys::{CourseKey, UsageKey};

pub use aggregate::{Aggregator, SumAggregator};
pub use file::{ScoreFile, StudentScores};
pub use resolve::{DefaultScoreResolver, ScoreResolver};

/// A learner whose grades are being computed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    #[serde(default)]
    pub username: String,
}

impl Student {
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }
}

/// Earned/possible pair as reported by a score source; either side may be unset.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawScore {
    #[serde(default)]
    pub earned: Option<f64>,
    #[serde(default)]
    pub possible: Option<f64>,
}

impl RawScore {
    pub const UNSET: RawScore = RawScore {
        earned: None,
        possible: None,
    };

    pub fn new(earned: f64, possible: f64) -> Self {
        Self {
            earned: Some(earned),
            possible: Some(possible),
        }
    }

    pub fn is_unset(&self) -> bool {
        self.earned.is_none() && self.possible.is_none()
    }
}

/// Points available on a block.
///
/// A block whose maximum is zero or negative can never count towards a graded
/// total, so that case is kept apart from an ordinary positive maximum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Possible {
    /// Nothing is known about the maximum (never attempted, no declared max)
    Unset,
    NonPositive(f64),
    Positive(f64),
}

impl Possible {
    pub fn value(self) -> Option<f64> {
        match self {
            Possible::Unset => None,
            Possible::NonPositive(v) | Possible::Positive(v) => Some(v),
        }
    }

    /// Whether a block with this maximum may count towards a graded total.
    pub fn is_gradable(self) -> bool {
        matches!(self, Possible::Positive(_))
    }
}

impl From<Option<f64>> for Possible {
    fn from(raw: Option<f64>) -> Self {
        match raw {
            None => Possible::Unset,
            Some(v) if v > 0.0 => Possible::Positive(v),
            Some(v) => Possible::NonPositive(v),
        }
    }
}

/// Resolved score of one block inside a subsection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProblemScore {
    pub earned: f64,
    pub possible: f64,
    pub graded: bool,
    pub display_name: String,
    pub location: UsageKey,
}

/// A subsection total, either over all blocks or over graded blocks only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedScore {
    pub earned: f64,
    pub possible: f64,
    pub graded: bool,
    pub section: String,
    pub module_id: UsageKey,
}

impl AggregatedScore {
    /// Fraction earned, zero when nothing was possible.
    pub fn percent(&self) -> f64 {
        if self.possible > 0.0 {
            self.earned / self.possible
        } else {
            0.0
        }
    }
}

/// Live attempt scores for one student, keyed by block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoresSnapshot {
    scores: HashMap<UsageKey, RawScore>,
}

impl ScoresSnapshot {
    pub fn new(scores: HashMap<UsageKey, RawScore>) -> Self {
        Self { scores }
    }

    pub fn get(&self, location: &UsageKey) -> Option<&RawScore> {
        self.scores.get(location)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl FromIterator<(UsageKey, RawScore)> for ScoresSnapshot {
    fn from_iter<I: IntoIterator<Item = (UsageKey, RawScore)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Scores recorded by an external submissions service, keyed by block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionScores {
    scores: HashMap<UsageKey, RawScore>,
}

impl SubmissionScores {
    pub fn new(scores: HashMap<UsageKey, RawScore>) -> Self {
        Self { scores }
    }

    pub fn get(&self, location: &UsageKey) -> Option<&RawScore> {
        self.scores.get(location)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl FromIterator<(UsageKey, RawScore)> for SubmissionScores {
    fn from_iter<I: IntoIterator<Item = (UsageKey, RawScore)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Store of live per-user attempt scores.
pub trait ScoreSource {
    /// Fetch the student's scores for every location in one round trip.
    fn scores_for(
        &self,
        course: &CourseKey,
        student: &Student,
        locations: &[UsageKey],
    ) -> Result<ScoresSnapshot>;
}

/// Service holding scores submitted outside the courseware.
pub trait SubmissionScoreSource {
    fn get_scores(&self, course: &CourseKey, anonymous_id: &str) -> Result<SubmissionScores>;
}
