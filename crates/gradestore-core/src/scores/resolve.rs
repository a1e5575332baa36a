use super::{RawScore, ScoresSnapshot, SubmissionScores};
use crate::course::BlockMetadata;

/// Decides the earned/possible pair of a block from the prefetched sources.
pub trait ScoreResolver {
    fn resolve(
        &self,
        block: &BlockMetadata,
        scores: &ScoresSnapshot,
        submissions: &SubmissionScores,
    ) -> RawScore;
}

/// Live attempt score first, then a submitted score, then the block's declared
/// maximum with nothing earned.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultScoreResolver;

impl ScoreResolver for DefaultScoreResolver {
    fn resolve(
        &self,
        block: &BlockMetadata,
        scores: &ScoresSnapshot,
        submissions: &SubmissionScores,
    ) -> RawScore {
        if let Some(live) = scores.get(&block.location) {
            if live.possible.is_some() {
                return *live;
            }
        }

        if let Some(submitted) = submissions.get(&block.location) {
            if !submitted.is_unset() {
                return *submitted;
            }
        }

        match block.max_score {
            Some(max) => RawScore {
                earned: None,
                possible: Some(max),
            },
            None => RawScore::UNSET,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{CourseKey, UsageKey};

    fn location(id: &str) -> UsageKey {
        CourseKey::new("Org", "CS101", "2016")
            .unwrap()
            .make_usage_key("problem", id)
            .unwrap()
    }

    fn block(id: &str, max_score: Option<f64>) -> BlockMetadata {
        BlockMetadata {
            has_score: true,
            max_score,
            ..BlockMetadata::new(location(id))
        }
    }

    #[test]
    fn test_live_score_wins() {
        let scores: ScoresSnapshot = [(location("p1"), RawScore::new(2.0, 4.0))]
            .into_iter()
            .collect();
        let submissions: SubmissionScores = [(location("p1"), RawScore::new(9.0, 9.0))]
            .into_iter()
            .collect();

        let resolved = DefaultScoreResolver.resolve(&block("p1", Some(4.0)), &scores, &submissions);
        assert_eq!(resolved, RawScore::new(2.0, 4.0));
    }

    #[test]
    fn test_falls_back_to_submission() {
        let submissions: SubmissionScores = [(location("p1"), RawScore::new(1.0, 2.0))]
            .into_iter()
            .collect();

        let resolved = DefaultScoreResolver.resolve(
            &block("p1", None),
            &ScoresSnapshot::default(),
            &submissions,
        );
        assert_eq!(resolved, RawScore::new(1.0, 2.0));
    }

    #[test]
    fn test_unattempted_block_uses_declared_max() {
        let resolved = DefaultScoreResolver.resolve(
            &block("p1", Some(5.0)),
            &ScoresSnapshot::default(),
            &SubmissionScores::default(),
        );
        assert_eq!(resolved.earned, None);
        assert_eq!(resolved.possible, Some(5.0));
    }

    #[test]
    fn test_nothing_known_is_unset() {
        let resolved = DefaultScoreResolver.resolve(
            &block("p1", None),
            &ScoresSnapshot::default(),
            &SubmissionScores::default(),
        );
        assert!(resolved.is_unset());
    }
}
