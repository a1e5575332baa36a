use std::cell::Cell;

use super::*;
use crate::course::{BlockMetadata, BlockStructure, CourseSnapshot};
use crate::db::Database;
use crate::grades::record::GradeParams;
use crate::grades::repository::SqliteGradeRepository;
use crate::grades::subsection::GradeState;
use crate::identity::HashedIdentity;
use crate::scores::{AggregatedScore, ProblemScore, RawScore};

fn course() -> CourseKey {
    CourseKey::new("Org", "CS101", "2016").unwrap()
}

fn key(block_type: &str, id: &str) -> UsageKey {
    course().make_usage_key(block_type, id).unwrap()
}

fn problem(id: &str) -> BlockMetadata {
    BlockMetadata {
        has_score: true,
        graded: true,
        weight: Some(1.0),
        ..BlockMetadata::new(key("problem", id))
    }
}

fn container(block_type: &str, id: &str, children: Vec<UsageKey>) -> BlockMetadata {
    BlockMetadata {
        children,
        ..BlockMetadata::new(key(block_type, id))
    }
}

fn sample_tree() -> BlockStructure {
    BlockStructure::from_snapshot(CourseSnapshot {
        course_id: course(),
        course_version: Some("v1".to_string()),
        root: key("course", "course"),
        blocks: vec![
            container("course", "course", vec![key("chapter", "ch1")]),
            container(
                "chapter",
                "ch1",
                vec![key("sequential", "s1"), key("sequential", "s2")],
            ),
            container("sequential", "s1", vec![key("problem", "p1")]),
            container("sequential", "s2", vec![key("problem", "p2")]),
            problem("p1"),
            problem("p2"),
        ],
    })
    .unwrap()
}

/// Wraps a real repository and counts every call.
struct CountingRepository<'db> {
    inner: SqliteGradeRepository<'db>,
    reads: Cell<usize>,
    writes: Cell<usize>,
}

impl<'db> CountingRepository<'db> {
    fn new(db: &'db Database) -> Self {
        Self {
            inner: SqliteGradeRepository::new(db),
            reads: Cell::new(0),
            writes: Cell::new(0),
        }
    }
}

impl GradeRepository for CountingRepository<'_> {
    fn read(&self, user_id: i64, usage_key: &UsageKey) -> Result<GradeRecord> {
        self.reads.set(self.reads.get() + 1);
        self.inner.read(user_id, usage_key)
    }

    fn read_all_for_course(&self, user_id: i64, course_id: &CourseKey) -> Result<Vec<GradeRecord>> {
        self.reads.set(self.reads.get() + 1);
        self.inner.read_all_for_course(user_id, course_id)
    }

    fn upsert(&self, params: GradeParams) -> Result<GradeRecord> {
        self.writes.set(self.writes.get() + 1);
        self.inner.upsert(params)
    }

    fn bulk_create(&self, params: Vec<GradeParams>) -> Result<Vec<GradeRecord>> {
        self.writes.set(self.writes.get() + 1);
        self.inner.bulk_create(params)
    }
}

struct FixedScores {
    scores: Vec<(UsageKey, RawScore)>,
    calls: Cell<usize>,
}

impl FixedScores {
    fn new(scores: &[(&str, RawScore)]) -> Self {
        Self {
            scores: scores
                .iter()
                .map(|(id, score)| (key("problem", id), *score))
                .collect(),
            calls: Cell::new(0),
        }
    }
}

impl ScoreSource for FixedScores {
    fn scores_for(
        &self,
        _course: &CourseKey,
        _student: &Student,
        locations: &[UsageKey],
    ) -> Result<ScoresSnapshot> {
        self.calls.set(self.calls.get() + 1);
        Ok(self
            .scores
            .iter()
            .filter(|(location, _)| locations.contains(location))
            .cloned()
            .collect())
    }
}

impl SubmissionScoreSource for FixedScores {
    fn get_scores(&self, _course: &CourseKey, _anonymous_id: &str) -> Result<SubmissionScores> {
        self.calls.set(self.calls.get() + 1);
        Ok(SubmissionScores::default())
    }
}

struct Harness {
    tree: BlockStructure,
    db: Database,
    scores: FixedScores,
    submissions: FixedScores,
    identity: HashedIdentity,
}

impl Harness {
    fn new(scores: &[(&str, RawScore)]) -> Self {
        Self {
            tree: sample_tree(),
            db: Database::open_in_memory().unwrap(),
            scores: FixedScores::new(scores),
            submissions: FixedScores::new(&[]),
            identity: HashedIdentity::new("secret"),
        }
    }

    fn factory<'a>(
        &'a self,
        repository: &'a dyn GradeRepository,
        enabled: bool,
    ) -> SubsectionGradeFactory<'a> {
        SubsectionGradeFactory::prefetch(FactoryContext {
            student: Student::new(1, "ada"),
            tree: &self.tree,
            course_version: self.tree.course_version().map(str::to_string),
            repository,
            score_source: &self.scores,
            submission_source: &self.submissions,
            identity: &self.identity,
            persistence: PersistenceEnabled(enabled),
        })
        .unwrap()
    }
}

#[test]
fn test_persistence_disabled_never_touches_repository() {
    let harness = Harness::new(&[("p1", RawScore::new(1.0, 2.0))]);
    let repo = CountingRepository::new(&harness.db);
    let mut factory = harness.factory(&repo, false);

    let grade = factory.create(&key("sequential", "s1")).unwrap();
    factory.create(&key("sequential", "s1")).unwrap();

    assert_eq!(grade.state(), GradeState::Computed);
    assert_eq!(grade.graded_total().unwrap().earned, 1.0);
    assert!(factory.update(&key("sequential", "s1")).unwrap().is_none());
    assert_eq!(repo.reads.get(), 0);
    assert_eq!(repo.writes.get(), 0);
    assert_eq!(harness.db.get_grade_count().unwrap(), 0);
}

#[test]
fn test_scores_fetched_once_per_factory() {
    let harness = Harness::new(&[("p1", RawScore::new(1.0, 2.0))]);
    let repo = CountingRepository::new(&harness.db);
    let mut factory = harness.factory(&repo, true);

    factory.create(&key("sequential", "s1")).unwrap();
    factory.create(&key("sequential", "s2")).unwrap();
    factory.update(&key("sequential", "s1")).unwrap();

    assert_eq!(harness.scores.calls.get(), 1);
    assert_eq!(harness.submissions.calls.get(), 1);
    assert_eq!(repo.reads.get(), 1);
}

#[test]
fn test_create_saves_then_loads() {
    let harness = Harness::new(&[("p1", RawScore::new(3.0, 4.0))]);
    let repo = CountingRepository::new(&harness.db);

    let mut first = harness.factory(&repo, true);
    let computed = first.create(&key("sequential", "s1")).unwrap();
    assert_eq!(computed.state(), GradeState::Computed);
    assert_eq!(repo.writes.get(), 1);
    assert_eq!(first.metrics().cache_misses(), 1);

    let saved = repo.read(1, &key("sequential", "s1")).unwrap();
    assert_eq!(saved.course_version, "v1");
    assert_eq!((saved.earned_graded, saved.possible_graded), (3.0, 4.0));

    let mut second = harness.factory(&repo, true);
    let loaded = second.create(&key("sequential", "s1")).unwrap();
    assert_eq!(loaded.state(), GradeState::Loaded);
    assert_eq!(loaded.graded_total(), computed.graded_total());
    assert_eq!(second.metrics().cache_hits(), 1);
    assert_eq!(repo.writes.get(), 1);
}

#[test]
fn test_update_overwrites_saved_grade() {
    let harness = Harness::new(&[("p1", RawScore::new(3.0, 4.0))]);
    let repo = CountingRepository::new(&harness.db);
    let mut factory = harness.factory(&repo, true);

    factory.create(&key("sequential", "s1")).unwrap();
    let updated = factory.update(&key("sequential", "s1")).unwrap().unwrap();

    assert_eq!(updated.state(), GradeState::Computed);
    assert_eq!(repo.writes.get(), 2);
    assert_eq!(harness.db.get_grade_count().unwrap(), 1);
    assert_eq!(factory.metrics().saves(), 2);
}

#[test]
fn test_unknown_subsection_is_not_found() {
    let harness = Harness::new(&[]);
    let repo = CountingRepository::new(&harness.db);
    let mut factory = harness.factory(&repo, true);

    let err = factory.create(&key("sequential", "missing")).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_sub_structure_from_this_course_is_used() {
    let harness = Harness::new(&[("p2", RawScore::new(2.0, 2.0))]);
    let repo = CountingRepository::new(&harness.db);
    let sub = harness.tree.subtree(&key("sequential", "s2")).unwrap();
    let mut factory = harness.factory(&repo, false);

    let grade = factory
        .create_in(&key("sequential", "s2"), Some(&sub))
        .unwrap();
    assert_eq!(grade.all_total().unwrap().earned, 2.0);
}

#[test]
fn test_sub_structure_from_other_course_is_rejected() {
    let harness = Harness::new(&[]);
    let repo = CountingRepository::new(&harness.db);
    let other_course = CourseKey::new("Other", "X", "1").unwrap();
    let other_root = other_course.make_usage_key("sequential", "s1").unwrap();
    let other = BlockStructure::from_snapshot(CourseSnapshot {
        course_id: other_course,
        course_version: None,
        root: other_root.clone(),
        blocks: vec![BlockMetadata::new(other_root.clone())],
    })
    .unwrap();
    let mut factory = harness.factory(&repo, true);

    let err = factory.create_in(&other_root, Some(&other)).unwrap_err();
    assert!(matches!(err, GradeError::StructuralMismatch { .. }));
    assert_eq!(repo.writes.get(), 0);
}

/// Grants every attempted block its full possible score.
struct FullCredit;

impl ScoreResolver for FullCredit {
    fn resolve(
        &self,
        block: &BlockMetadata,
        scores: &ScoresSnapshot,
        submissions: &SubmissionScores,
    ) -> RawScore {
        let raw = DefaultScoreResolver.resolve(block, scores, submissions);
        RawScore {
            earned: raw.possible,
            possible: raw.possible,
        }
    }
}

#[derive(Default)]
struct CountingAggregator {
    calls: Cell<usize>,
}

impl Aggregator for CountingAggregator {
    fn aggregate(
        &self,
        scores: &[&ProblemScore],
        section: &str,
        location: &UsageKey,
    ) -> (AggregatedScore, AggregatedScore) {
        self.calls.set(self.calls.get() + 1);
        SumAggregator.aggregate(scores, section, location)
    }
}

#[test]
fn test_custom_resolver_and_aggregator() {
    let harness = Harness::new(&[("p1", RawScore::new(1.0, 4.0))]);
    let repo = CountingRepository::new(&harness.db);
    let aggregator = CountingAggregator::default();
    let mut factory = harness
        .factory(&repo, true)
        .with_resolver(&FullCredit)
        .with_aggregator(&aggregator);

    let grade = factory.create(&key("sequential", "s1")).unwrap();
    let graded = grade.graded_total().unwrap();
    assert_eq!((graded.earned, graded.possible), (4.0, 4.0));
    assert_eq!(aggregator.calls.get(), 1);

    let saved = repo.read(1, &key("sequential", "s1")).unwrap();
    assert_eq!(saved.earned_graded, 4.0);
}
