use super::{AggregatedScore, ProblemScore};
use crate::keys::UsageKey;

/// Folds per-block scores into `(all_total, graded_total)`.
pub trait Aggregator {
    fn aggregate(
        &self,
        scores: &[&ProblemScore],
        section: &str,
        location: &UsageKey,
    ) -> (AggregatedScore, AggregatedScore);
}

/// Plain sums of earned and possible points.
#[derive(Debug, Clone, Copy, Default)]
pub struct SumAggregator;

impl Aggregator for SumAggregator {
    fn aggregate(
        &self,
        scores: &[&ProblemScore],
        section: &str,
        location: &UsageKey,
    ) -> (AggregatedScore, AggregatedScore) {
        let (mut earned_all, mut possible_all) = (0.0, 0.0);
        let (mut earned_graded, mut possible_graded) = (0.0, 0.0);

        for score in scores {
            earned_all += score.earned;
            possible_all += score.possible;
            if score.graded {
                earned_graded += score.earned;
                possible_graded += score.possible;
            }
        }

        let all_total = AggregatedScore {
            earned: earned_all,
            possible: possible_all,
            graded: false,
            section: section.to_string(),
            module_id: location.clone(),
        };
        let graded_total = AggregatedScore {
            earned: earned_graded,
            possible: possible_graded,
            graded: true,
            section: section.to_string(),
            module_id: location.clone(),
        };

        (all_total, graded_total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::CourseKey;

    fn score(id: &str, earned: f64, possible: f64, graded: bool) -> ProblemScore {
        ProblemScore {
            earned,
            possible,
            graded,
            display_name: id.to_string(),
            location: CourseKey::new("Org", "CS101", "2016")
                .unwrap()
                .make_usage_key("problem", id)
                .unwrap(),
        }
    }

    #[test]
    fn test_splits_graded_from_all() {
        let graded = score("p1", 5.0, 10.0, true);
        let practice = score("p2", 3.0, 3.0, false);
        let section = graded.location.clone();

        let (all, graded_total) =
            SumAggregator.aggregate(&[&graded, &practice], "Homework 1", &section);

        assert_eq!((all.earned, all.possible), (8.0, 13.0));
        assert_eq!((graded_total.earned, graded_total.possible), (5.0, 10.0));
        assert!(graded_total.graded);
        assert!(!all.graded);
        assert_eq!(graded_total.percent(), 0.5);
    }

    #[test]
    fn test_empty_scores_are_zero() {
        let section = score("s", 0.0, 0.0, false).location;
        let (all, graded) = SumAggregator.aggregate(&[], "Empty", &section);
        assert_eq!((all.earned, all.possible), (0.0, 0.0));
        assert_eq!((graded.earned, graded.possible), (0.0, 0.0));
        assert_eq!(graded.percent(), 0.0);
    }
}
