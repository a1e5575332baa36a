use chrono::{DateTime, Utc};
use serde::Serialize;

use super::record::{GradeParams, GradeRecord};
use super::repository::GradeRepository;
use crate::blocks::BlockRecord;
use crate::course::{BlockMetadata, CourseTree};
use crate::error::{GradeError, Result};
use crate::keys::UsageKey;
use crate::scores::{
    AggregatedScore, Aggregator, Possible, ProblemScore, ScoreResolver, ScoresSnapshot, Student,
    SubmissionScores,
};

/// Where a grade's totals came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeState {
    Empty,
    /// Totals were aggregated from a fresh walk of the course tree
    Computed,
    /// Totals were read from a saved grade
    Loaded,
}

/// A block's resolved score and the weight it was graded with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedScore {
    pub score: ProblemScore,
    pub weight: Option<f64>,
}

impl WeightedScore {
    pub fn location(&self) -> &UsageKey {
        &self.score.location
    }
}

/// Everything a subsection grade reads while resolving block scores.
#[derive(Clone, Copy)]
pub struct GradingContext<'a> {
    pub tree: &'a dyn CourseTree,
    pub scores: &'a ScoresSnapshot,
    pub submissions: &'a SubmissionScores,
    pub resolver: &'a dyn ScoreResolver,
    pub aggregator: &'a dyn Aggregator,
}

/// Grade of one student in one subsection.
///
/// Starts `Empty` and becomes either `Computed` (via [`SubsectionGrade::compute`])
/// or `Loaded` (via [`SubsectionGrade::load_from_record`]). Totals never change
/// after that.
#[derive(Debug, Clone, Serialize)]
pub struct SubsectionGrade {
    location: UsageKey,
    display_name: String,
    url_name: String,
    format: Option<String>,
    due: Option<DateTime<Utc>>,
    graded: bool,
    subtree_edited_on: Option<DateTime<Utc>>,
    state: GradeState,
    locations_to_weighted_scores: Vec<WeightedScore>,
    all_total: Option<AggregatedScore>,
    graded_total: Option<AggregatedScore>,
}

impl SubsectionGrade {
    pub fn new(subsection: &BlockMetadata) -> Self {
        Self {
            location: subsection.location.clone(),
            display_name: subsection.display_name_with_default(),
            url_name: subsection.url_name().to_string(),
            format: subsection.format.clone(),
            due: subsection.due,
            graded: subsection.graded,
            subtree_edited_on: subsection.subtree_edited_on,
            state: GradeState::Empty,
            locations_to_weighted_scores: Vec::new(),
            all_total: None,
            graded_total: None,
        }
    }

    /// Walk the scorable blocks under the subsection and aggregate their scores.
    pub fn compute(&mut self, ctx: &GradingContext<'_>) -> Result<()> {
        self.ensure_empty("compute")?;

        let tree = ctx.tree;
        let walk = tree.post_order_traversal(
            &self.location,
            Box::new(move |key: &UsageKey| tree.possibly_scored(key)),
        );
        for location in walk {
            if let Some(block) = tree.block(&location) {
                self.compute_block_score(block, ctx, None);
            }
        }

        let refs: Vec<&ProblemScore> = self
            .locations_to_weighted_scores
            .iter()
            .map(|w| &w.score)
            .collect();
        let (all_total, graded_total) =
            ctx.aggregator
                .aggregate(&refs, &self.display_name, &self.location);

        tracing::debug!(
            subsection = %self.location,
            blocks = self.locations_to_weighted_scores.len(),
            earned = all_total.earned,
            possible = all_total.possible,
            "computed subsection grade"
        );

        self.all_total = Some(all_total);
        self.graded_total = Some(graded_total);
        self.state = GradeState::Computed;
        Ok(())
    }

    /// Rebuild the per-block detail of a saved grade.
    ///
    /// Blocks keep the weight and maximum they were saved with. Blocks that are
    /// gone from the live tree are skipped; totals come from the record as is.
    pub fn load_from_record(&mut self, record: &GradeRecord, ctx: &GradingContext<'_>) -> Result<()> {
        self.ensure_empty("load")?;
        if record.usage_key != self.location {
            return Err(GradeError::structural(format!(
                "saved grade for {} loaded into subsection {}",
                record.usage_key, self.location
            )));
        }

        for persisted in &record.visible_blocks {
            match ctx.tree.block(&persisted.location) {
                Some(block) => self.compute_block_score(block, ctx, Some(persisted)),
                None => tracing::trace!(
                    block = %persisted.location,
                    "skipping saved block missing from course tree"
                ),
            }
        }

        self.all_total = Some(AggregatedScore {
            earned: record.earned_all,
            possible: record.possible_all,
            graded: false,
            section: self.display_name.clone(),
            module_id: self.location.clone(),
        });
        self.graded_total = Some(AggregatedScore {
            earned: record.earned_graded,
            possible: record.possible_graded,
            graded: true,
            section: self.display_name.clone(),
            module_id: self.location.clone(),
        });
        self.state = GradeState::Loaded;
        Ok(())
    }

    /// Persist the totals and the visible blocks they were computed from.
    pub fn save(
        &self,
        repository: &dyn GradeRepository,
        student: &Student,
        course_version: Option<&str>,
    ) -> Result<GradeRecord> {
        let params = self.to_params(student, course_version)?;
        repository.upsert(params)
    }

    /// The write parameters for this grade.
    pub fn to_params(&self, student: &Student, course_version: Option<&str>) -> Result<GradeParams> {
        let (all_total, graded_total) = match (&self.all_total, &self.graded_total) {
            (Some(all), Some(graded)) => (all, graded),
            _ => {
                return Err(GradeError::structural(format!(
                    "subsection {} has no totals to save",
                    self.location
                )))
            }
        };

        let visible_blocks = self
            .locations_to_weighted_scores
            .iter()
            .map(|w| BlockRecord::new(w.score.location.clone(), w.weight, w.score.possible))
            .collect();

        Ok(GradeParams {
            user_id: student.id,
            usage_key: self.location.clone(),
            course_id: None,
            course_version: course_version.map(str::to_string),
            subtree_edited_timestamp: self.subtree_edited_on.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            earned_all: all_total.earned,
            possible_all: all_total.possible,
            earned_graded: graded_total.earned,
            possible_graded: graded_total.possible,
            visible_blocks,
        })
    }

    fn ensure_empty(&self, action: &str) -> Result<()> {
        if self.state == GradeState::Empty {
            Ok(())
        } else {
            Err(GradeError::structural(format!(
                "cannot {} subsection {}: grade is already {:?}",
                action, self.location, self.state
            )))
        }
    }

    fn compute_block_score(
        &mut self,
        block: &BlockMetadata,
        ctx: &GradingContext<'_>,
        persisted: Option<&BlockRecord>,
    ) {
        if !block.has_score {
            return;
        }

        let raw = ctx.resolver.resolve(block, ctx.scores, ctx.submissions);
        let (possible, weight) = match persisted {
            Some(saved) => (Some(saved.max_possible_score), saved.weight),
            None => (raw.possible, block.weight),
        };

        if raw.earned.is_none() && possible.is_none() {
            return;
        }

        let possible = Possible::from(possible);
        let score = ProblemScore {
            earned: raw.earned.unwrap_or(0.0),
            possible: possible.value().unwrap_or(0.0),
            graded: possible.is_gradable() && block.graded,
            display_name: block.display_name_with_default(),
            location: block.location.clone(),
        };
        let weighted = WeightedScore { score, weight };

        match self
            .locations_to_weighted_scores
            .iter_mut()
            .find(|w| w.score.location == block.location)
        {
            Some(existing) => *existing = weighted,
            None => self.locations_to_weighted_scores.push(weighted),
        }
    }

    pub fn location(&self) -> &UsageKey {
        &self.location
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn url_name(&self) -> &str {
        &self.url_name
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn due(&self) -> Option<DateTime<Utc>> {
        self.due
    }

    pub fn graded(&self) -> bool {
        self.graded
    }

    pub fn state(&self) -> GradeState {
        self.state
    }

    /// Scored blocks in traversal order.
    pub fn locations_to_weighted_scores(&self) -> &[WeightedScore] {
        &self.locations_to_weighted_scores
    }

    pub fn score_for(&self, location: &UsageKey) -> Option<&WeightedScore> {
        self.locations_to_weighted_scores
            .iter()
            .find(|w| w.location() == location)
    }

    pub fn all_total(&self) -> Option<&AggregatedScore> {
        self.all_total.as_ref()
    }

    pub fn graded_total(&self) -> Option<&AggregatedScore> {
        self.graded_total.as_ref()
    }
}
