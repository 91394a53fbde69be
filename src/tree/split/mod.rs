//! Split search.
//!
//! Every finder answers the same question for a node subset: which
//! `(feature, threshold)` pair yields the largest impurity reduction.
//! Finders return `None` when no candidate has strictly positive gain
//! so the growth engine can turn the node into a leaf.
//!
//! Candidate ties are broken deterministically: higher gain first, then
//! lower feature index, then lower threshold. This keeps trained trees
//! identical across thread counts and scheduling orders.

mod adaptive;
mod exhaustive;
mod histogram;
mod quartile;
mod random;

pub use adaptive::{AdaptiveEqFinder, AdaptiveEwFinder};
pub use exhaustive::ExhaustiveFinder;
pub use histogram::HistogramFinder;
pub use quartile::QuartileFinder;
pub use random::RandomFinder;

use crate::core::types::{BinningType, FeatureIndex, SplitMethod};
use crate::dataset::Dataset;
use crate::tree::criterion::Criterion;

/// A candidate split. Samples with `value <= threshold` go left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Split {
    pub feature: FeatureIndex,
    pub threshold: f64,
    pub gain: f64,
}

impl Split {
    /// Deterministic ordering: higher gain wins, then lower feature,
    /// then lower threshold.
    pub fn better_than(&self, other: &Split) -> bool {
        if self.gain != other.gain {
            return self.gain > other.gain;
        }
        if self.feature != other.feature {
            return self.feature < other.feature;
        }
        self.threshold < other.threshold
    }
}

/// Merge two optional candidates under the deterministic ordering.
pub fn merge_best(a: Option<Split>, b: Option<Split>) -> Option<Split> {
    match (a, b) {
        (Some(x), Some(y)) => Some(if x.better_than(&y) { x } else { y }),
        (x, None) => x,
        (None, y) => y,
    }
}

/// Split-search strategy over a node's sample-index subset.
pub trait SplitFinder: Send + Sync {
    /// Best split for `indices`, or `None` when no candidate improves on
    /// the parent. `parent_metric` is the node impurity under the
    /// training criterion.
    fn find_best_split(
        &self,
        dataset: &Dataset,
        indices: &[usize],
        parent_metric: f64,
        criterion: &dyn Criterion,
    ) -> Option<Split>;

    fn name(&self) -> &'static str;
}

/// Instantiate the finder selected by configuration.
pub fn create_finder(method: SplitMethod, seed: u64) -> Box<dyn SplitFinder> {
    match method {
        SplitMethod::Exhaustive => Box::new(ExhaustiveFinder),
        SplitMethod::Random { k } => Box::new(RandomFinder::new(k, seed)),
        SplitMethod::Quartile => Box::new(QuartileFinder),
        SplitMethod::HistogramEw { bins } => {
            Box::new(HistogramFinder::new(BinningType::EqualWidth, bins))
        }
        SplitMethod::HistogramEq { bins } => {
            Box::new(HistogramFinder::new(BinningType::EqualFrequency, bins))
        }
        SplitMethod::AdaptiveEw { rule } => Box::new(AdaptiveEwFinder::new(rule)),
        SplitMethod::AdaptiveEq => Box::new(AdaptiveEqFinder::default()),
    }
}

/// Gain of a candidate from child sufficient statistics, using variance
/// as the surrogate impurity: `parent - (var_l*n_l + var_r*n_r) / n`.
pub(crate) fn variance_gain(
    parent_metric: f64,
    left_sum: f64,
    left_sum_sq: f64,
    left_count: usize,
    right_sum: f64,
    right_sum_sq: f64,
    right_count: usize,
) -> f64 {
    let nl = left_count as f64;
    let nr = right_count as f64;
    let left_mean = left_sum / nl;
    let right_mean = right_sum / nr;
    let left_var = (left_sum_sq / nl - left_mean * left_mean).max(0.0);
    let right_var = (right_sum_sq / nr - right_mean * right_mean).max(0.0);
    parent_metric - (left_var * nl + right_var * nr) / (nl + nr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tie_break_ordering() {
        let a = Split {
            feature: 0,
            threshold: 1.0,
            gain: 2.0,
        };
        let b = Split {
            feature: 1,
            threshold: 0.5,
            gain: 2.0,
        };
        let c = Split {
            feature: 1,
            threshold: 0.5,
            gain: 3.0,
        };

        assert!(a.better_than(&b)); // equal gain, lower feature wins
        assert!(c.better_than(&a)); // higher gain wins outright
        assert_eq!(merge_best(Some(b), Some(a)), Some(a));
        assert_eq!(merge_best(None, Some(c)), Some(c));
        assert_eq!(merge_best(None, None), None);
    }

    #[test]
    fn test_tie_break_threshold() {
        let a = Split {
            feature: 2,
            threshold: 0.25,
            gain: 1.0,
        };
        let b = Split {
            feature: 2,
            threshold: 0.75,
            gain: 1.0,
        };
        assert!(a.better_than(&b));
    }

    #[test]
    fn test_variance_gain_perfect_split() {
        // {0,0} vs {4,4}: parent variance 4, children pure
        let gain = variance_gain(4.0, 0.0, 0.0, 2, 8.0, 32.0, 2);
        assert!((gain - 4.0).abs() < 1e-12);
    }
}
