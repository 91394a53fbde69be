//! Randomized split search.
//!
//! Draws `k` uniform thresholds per feature inside the feature's value
//! range and evaluates each against prefix sums over the sorted subset.
//! Each feature derives its generator from the base seed and the feature
//! index, so results do not depend on thread count or scheduling.

use crate::core::constants::{EPS, PARALLEL_THRESHOLD};
use crate::dataset::Dataset;
use crate::tree::criterion::Criterion;
use crate::tree::split::{merge_best, variance_gain, Split, SplitFinder};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

pub struct RandomFinder {
    k: usize,
    seed: u64,
}

impl RandomFinder {
    pub fn new(k: usize, seed: u64) -> Self {
        RandomFinder { k, seed }
    }

    fn scan_feature(
        &self,
        dataset: &Dataset,
        indices: &[usize],
        feature: usize,
        parent_metric: f64,
    ) -> Option<Split> {
        let n = indices.len();
        let mut pairs: Vec<(f64, f64)> = indices
            .iter()
            .map(|&i| (dataset.value(i, feature), dataset.target(i)))
            .collect();
        pairs.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        let v_min = pairs[0].0;
        let v_max = pairs[n - 1].0;
        if v_max - v_min < EPS {
            return None;
        }

        let mut prefix_sum = vec![0.0; n + 1];
        let mut prefix_sum_sq = vec![0.0; n + 1];
        for (i, &(_, y)) in pairs.iter().enumerate() {
            prefix_sum[i + 1] = prefix_sum[i] + y;
            prefix_sum_sq[i + 1] = prefix_sum_sq[i] + y * y;
        }

        let mut rng = StdRng::seed_from_u64(self.seed ^ feature as u64);
        let mut best: Option<Split> = None;

        for _ in 0..self.k {
            let threshold = v_min + rng.gen::<f64>() * (v_max - v_min);
            let pos = pairs.partition_point(|&(v, _)| v <= threshold);
            if pos == 0 || pos == n {
                continue;
            }
            let gain = variance_gain(
                parent_metric,
                prefix_sum[pos],
                prefix_sum_sq[pos],
                pos,
                prefix_sum[n] - prefix_sum[pos],
                prefix_sum_sq[n] - prefix_sum_sq[pos],
                n - pos,
            );
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

impl SplitFinder for RandomFinder {
    fn find_best_split(
        &self,
        dataset: &Dataset,
        indices: &[usize],
        parent_metric: f64,
        _criterion: &dyn Criterion,
    ) -> Option<Split> {
        let n = indices.len();
        if n < 2 {
            return None;
        }
        let features = dataset.num_features();
        if n >= PARALLEL_THRESHOLD {
            (0..features)
                .into_par_iter()
                .map(|f| self.scan_feature(dataset, indices, f, parent_metric))
                .reduce(|| None, merge_best)
        } else {
            (0..features)
                .map(|f| self.scan_feature(dataset, indices, f, parent_metric))
                .fold(None, merge_best)
        }
    }

    fn name(&self) -> &'static str {
        "random"
    }
}
