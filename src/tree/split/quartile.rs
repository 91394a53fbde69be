//! Quartile split search.
//!
//! Evaluates at most three candidate thresholds per feature, the
//! quartiles of the node's values, scoring each candidate with the
//! configured criterion. Cheap and criterion-exact, at the cost of a
//! coarse threshold grid.

use crate::core::constants::{EPS, PARALLEL_THRESHOLD};
use crate::dataset::Dataset;
use crate::tree::criterion::Criterion;
use crate::tree::split::{merge_best, Split, SplitFinder};
use rayon::prelude::*;

pub struct QuartileFinder;

impl QuartileFinder {
    fn scan_feature(
        &self,
        dataset: &Dataset,
        indices: &[usize],
        feature: usize,
        parent_metric: f64,
        criterion: &dyn Criterion,
    ) -> Option<Split> {
        let n = indices.len();
        let mut values: Vec<f64> = indices
            .iter()
            .map(|&i| dataset.value(i, feature))
            .collect();
        values.sort_unstable_by(f64::total_cmp);

        let q1 = values[(0.25 * (n - 1) as f64) as usize];
        let q2 = values[(0.50 * (n - 1) as f64) as usize];
        let q3 = values[(0.75 * (n - 1) as f64) as usize];

        let mut thresholds = vec![q1];
        if (q2 - q1).abs() > EPS {
            thresholds.push(q2);
        }
        if (q3 - q2).abs() > EPS && (q3 - q1).abs() > EPS {
            thresholds.push(q3);
        }

        let mut best: Option<Split> = None;
        for threshold in thresholds {
            let (left, right): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .copied()
                .partition(|&i| dataset.value(i, feature) <= threshold);
            if left.is_empty() || right.is_empty() {
                continue;
            }
            let m_left = criterion.score(dataset.targets(), &left);
            let m_right = criterion.score(dataset.targets(), &right);
            let gain = parent_metric
                - (m_left * left.len() as f64 + m_right * right.len() as f64) / n as f64;
            if gain > 0.0 {
                best = merge_best(
                    best,
                    Some(Split {
                        feature,
                        threshold,
                        gain,
                    }),
                );
            }
        }
        best
    }
}

impl SplitFinder for QuartileFinder {
    fn find_best_split(
        &self,
        dataset: &Dataset,
        indices: &[usize],
        parent_metric: f64,
        criterion: &dyn Criterion,
    ) -> Option<Split> {
        let n = indices.len();
        if n < 4 {
            return None;
        }
        let features = dataset.num_features();
        if n >= PARALLEL_THRESHOLD {
            (0..features)
                .into_par_iter()
                .map(|f| self.scan_feature(dataset, indices, f, parent_metric, criterion))
                .reduce(|| None, merge_best)
        } else {
            (0..features)
                .map(|f| self.scan_feature(dataset, indices, f, parent_metric, criterion))
                .fold(None, merge_best)
        }
    }

    fn name(&self) -> &'static str {
        "quartile"
    }
}
