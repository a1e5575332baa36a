use std::collections::HashMap;
use std::time::Instant;

use super::record::GradeRecord;
use super::repository::GradeRepository;
use super::subsection::{GradingContext, SubsectionGrade};
use crate::course::CourseTree;
use crate::error::{GradeError, Result};
use crate::identity::IdentityService;
use crate::keys::{CourseKey, UsageKey};
use crate::logging::GradeMetrics;
use crate::scores::{
    Aggregator, DefaultScoreResolver, ScoreResolver, ScoreSource, ScoresSnapshot, Student,
    SubmissionScoreSource, SubmissionScores, SumAggregator,
};
use crate::trace_time;

/// Whether saved grades may be read or written for the factory's course.
///
/// Resolved once per request by the caller (see
/// [`PersistenceConfig::is_enabled_for`](crate::config::PersistenceConfig::is_enabled_for)).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceEnabled(pub bool);

impl PersistenceEnabled {
    pub fn is_enabled(self) -> bool {
        self.0
    }
}

/// Collaborators a factory is built from.
pub struct FactoryContext<'a> {
    pub student: Student,
    pub tree: &'a dyn CourseTree,
    pub course_version: Option<String>,
    pub repository: &'a dyn GradeRepository,
    pub score_source: &'a dyn ScoreSource,
    pub submission_source: &'a dyn SubmissionScoreSource,
    pub identity: &'a dyn IdentityService,
    pub persistence: PersistenceEnabled,
}

/// Produces subsection grades for one student in one course.
///
/// All score lookups happen once in [`SubsectionGradeFactory::prefetch`]; every
/// later `create`/`update` reuses them. An instance belongs to a single request
/// and is not meant to be shared between threads.
pub struct SubsectionGradeFactory<'a> {
    student: Student,
    tree: &'a dyn CourseTree,
    course_version: Option<String>,
    repository: &'a dyn GradeRepository,
    persistence: PersistenceEnabled,
    resolver: &'a dyn ScoreResolver,
    aggregator: &'a dyn Aggregator,
    scores: ScoresSnapshot,
    submissions: SubmissionScores,
    saved: HashMap<UsageKey, GradeRecord>,
    metrics: GradeMetrics,
}

impl<'a> SubsectionGradeFactory<'a> {
    /// Fetch live scores, submitted scores and (when persistence is on) the
    /// student's saved grades for the whole course.
    #[tracing::instrument(skip(ctx), fields(student = ctx.student.id, course = %ctx.tree.course_key()))]
    pub fn prefetch(ctx: FactoryContext<'a>) -> Result<Self> {
        let start = Instant::now();
        let course = ctx.tree.course_key().clone();

        let mut locations: Vec<UsageKey> = ctx
            .tree
            .locations()
            .filter(|key| ctx.tree.possibly_scored(key))
            .cloned()
            .collect();
        locations.sort();

        let metrics = GradeMetrics::new();
        let scores = ctx.score_source.scores_for(&course, &ctx.student, &locations)?;
        metrics.record_score_fetch();

        let anonymous_id = ctx.identity.anonymized_id(&ctx.student, &course)?;
        let submissions = ctx.submission_source.get_scores(&course, &anonymous_id)?;
        metrics.record_score_fetch();

        let saved = if ctx.persistence.is_enabled() {
            ctx.repository
                .read_all_for_course(ctx.student.id, &course)?
                .into_iter()
                .map(|record| (record.usage_key.clone(), record))
                .collect()
        } else {
            HashMap::new()
        };

        tracing::debug!(
            scores = scores.len(),
            submissions = submissions.len(),
            saved = saved.len(),
            "prefetched grading inputs"
        );
        trace_time!(start, "prefetch");

        Ok(Self {
            student: ctx.student,
            tree: ctx.tree,
            course_version: ctx.course_version,
            repository: ctx.repository,
            persistence: ctx.persistence,
            resolver: &DefaultScoreResolver,
            aggregator: &SumAggregator,
            scores,
            submissions,
            saved,
            metrics,
        })
    }

    pub fn with_resolver(mut self, resolver: &'a dyn ScoreResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_aggregator(mut self, aggregator: &'a dyn Aggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn course_key(&self) -> &CourseKey {
        self.tree.course_key()
    }

    pub fn student(&self) -> &Student {
        &self.student
    }

    pub fn metrics(&self) -> &GradeMetrics {
        &self.metrics
    }

    /// Saved grade if there is one, otherwise a fresh (and, with persistence on,
    /// saved) computation.
    pub fn create(&mut self, subsection: &UsageKey) -> Result<SubsectionGrade> {
        self.create_in(subsection, None)
    }

    /// Like [`create`](Self::create), walking `sub_tree` instead of the course tree.
    #[tracing::instrument(skip(self, sub_tree), fields(student = self.student.id, subsection = %subsection))]
    pub fn create_in(
        &mut self,
        subsection: &UsageKey,
        sub_tree: Option<&'a dyn CourseTree>,
    ) -> Result<SubsectionGrade> {
        let tree = self.verified_tree(sub_tree)?;
        let block = tree
            .block(subsection)
            .ok_or_else(|| GradeError::not_found("subsection", subsection))?;
        let mut grade = SubsectionGrade::new(block);

        if self.persistence.is_enabled() {
            if let Some(record) = self.saved.get(subsection) {
                grade.load_from_record(record, &self.grading_context(tree))?;
                self.metrics.record_cache_hit();
                tracing::debug!("loaded saved grade");
                return Ok(grade);
            }
            self.metrics.record_cache_miss();
        }

        grade.compute(&self.grading_context(tree))?;
        if self.persistence.is_enabled() {
            self.persist(&grade)?;
        }
        Ok(grade)
    }

    /// Recompute and overwrite the saved grade; `None` when persistence is off.
    pub fn update(&mut self, subsection: &UsageKey) -> Result<Option<SubsectionGrade>> {
        self.update_in(subsection, None)
    }

    #[tracing::instrument(skip(self, sub_tree), fields(student = self.student.id, subsection = %subsection))]
    pub fn update_in(
        &mut self,
        subsection: &UsageKey,
        sub_tree: Option<&'a dyn CourseTree>,
    ) -> Result<Option<SubsectionGrade>> {
        if !self.persistence.is_enabled() {
            tracing::debug!("persistence disabled, skipping update");
            return Ok(None);
        }

        let tree = self.verified_tree(sub_tree)?;
        let block = tree
            .block(subsection)
            .ok_or_else(|| GradeError::not_found("subsection", subsection))?;
        let mut grade = SubsectionGrade::new(block);
        grade.compute(&self.grading_context(tree))?;
        self.persist(&grade)?;
        Ok(Some(grade))
    }

    fn verified_tree(&self, sub_tree: Option<&'a dyn CourseTree>) -> Result<&'a dyn CourseTree> {
        let Some(sub) = sub_tree else {
            return Ok(self.tree);
        };
        if sub.course_key() != self.tree.course_key() || !self.tree.contains(sub.root()) {
            return Err(GradeError::structural(format!(
                "sub-structure rooted at {} does not belong to course {}",
                sub.root(),
                self.tree.course_key()
            )));
        }
        Ok(sub)
    }

    fn grading_context(&self, tree: &'a dyn CourseTree) -> GradingContext<'_> {
        GradingContext {
            tree,
            scores: &self.scores,
            submissions: &self.submissions,
            resolver: self.resolver,
            aggregator: self.aggregator,
        }
    }

    fn persist(&mut self, grade: &SubsectionGrade) -> Result<()> {
        let record = grade.save(
            self.repository,
            &self.student,
            self.course_version.as_deref(),
        )?;
        self.metrics.record_save();
        tracing::debug!(hash = %record.visible_blocks_hash, "saved computed grade");
        self.saved.insert(record.usage_key.clone(), record);
        Ok(())
    }
}

#[cfg(test)]
mod tests;
