//! Adaptive binning split search.
//!
//! Unlike the fixed-bin histogram finder, these finders choose a bin
//! count per node and per feature from the node's own value
//! distribution: equal-width counts come from a statistical rule
//! (Sturges, Rice, square-root, or Freedman-Diaconis), equal-frequency
//! counts from the feature's coefficient of variation.

use crate::core::constants::{
    ADAPTIVE_EQ_MAX_BINS, ADAPTIVE_EQ_MIN_SAMPLES_PER_BIN, ADAPTIVE_EQ_VARIABILITY_THRESHOLD,
    ADAPTIVE_MAX_BINS, ADAPTIVE_MIN_BINS, EPS, PARALLEL_THRESHOLD,
};
use crate::core::types::BinningRule;
use crate::dataset::Dataset;
use crate::tree::criterion::Criterion;
use crate::tree::split::{merge_best, variance_gain, Split, SplitFinder};
use rayon::prelude::*;

/// Equal-width search with a per-feature bin count chosen by `rule`.
pub struct AdaptiveEwFinder {
    rule: BinningRule,
}

impl AdaptiveEwFinder {
    pub fn new(rule: BinningRule) -> Self {
        AdaptiveEwFinder { rule }
    }

    fn optimal_bins(&self, values: &[f64]) -> usize {
        let n = values.len();
        if n <= 1 {
            return 1;
        }
        let bins = match self.rule {
            BinningRule::Sturges => (n as f64).log2().ceil() as usize + 1,
            BinningRule::Rice => (2.0 * (n as f64).cbrt()).ceil() as usize,
            BinningRule::Sqrt => (n as f64).sqrt().ceil() as usize,
            BinningRule::FreedmanDiaconis => {
                let mut sorted = values.to_vec();
                sorted.sort_unstable_by(f64::total_cmp);
                let iqr = sorted[3 * n / 4] - sorted[n / 4];
                if iqr > 0.0 {
                    let h = 2.0 * iqr / (n as f64).cbrt();
                    ((sorted[n - 1] - sorted[0]) / h).ceil() as usize
                } else {
                    ADAPTIVE_MIN_BINS
                }
            }
        };
        bins.clamp(ADAPTIVE_MIN_BINS, ADAPTIVE_MAX_BINS)
    }

    fn scan_feature(
        &self,
        dataset: &Dataset,
        indices: &[usize],
        feature: usize,
        parent_metric: f64,
    ) -> Option<Split> {
        let n = indices.len();
        let values: Vec<f64> = indices
            .iter()
            .map(|&i| dataset.value(i, feature))
            .collect();

        let bins = self.optimal_bins(&values);
        if bins < 2 {
            return None;
        }
        let v_min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let v_max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if (v_max - v_min).abs() < EPS {
            return None;
        }
        let width = (v_max - v_min) / bins as f64;

        let mut count = vec![0usize; bins];
        let mut sum = vec![0.0; bins];
        let mut sum_sq = vec![0.0; bins];
        for (pos, &i) in indices.iter().enumerate() {
            let b = (((values[pos] - v_min) / width) as usize).min(bins - 1);
            let y = dataset.target(i);
            count[b] += 1;
            sum[b] += y;
            sum_sq[b] += y * y;
        }

        let total_sum: f64 = sum.iter().sum();
        let total_sum_sq: f64 = sum_sq.iter().sum();

        let mut best: Option<Split> = None;
        let mut left_count = 0;
        let mut left_sum = 0.0;
        let mut left_sum_sq = 0.0;
        for b in 0..bins - 1 {
            left_count += count[b];
            left_sum += sum[b];
            left_sum_sq += sum_sq[b];
            let right_count = n - left_count;
            if left_count == 0 || right_count == 0 {
                continue;
            }
            let gain = variance_gain(
                parent_metric,
                left_sum,
                left_sum_sq,
                left_count,
                total_sum - left_sum,
                total_sum_sq - left_sum_sq,
                right_count,
            );
            if gain > 0.0 {
                best = merge_best(
                    best,
                    Some(Split {
                        feature,
                        threshold: v_min + width * (b + 1) as f64,
                        gain,
                    }),
                );
            }
        }
        best
    }
}

impl SplitFinder for AdaptiveEwFinder {
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
        "adaptive_ew"
    }
}

/// Equal-frequency search where the bin count follows the feature's
/// coefficient of variation: low-variability features get fewer, wider
/// bins.
pub struct AdaptiveEqFinder {
    min_samples_per_bin: usize,
    max_bins: usize,
    variability_threshold: f64,
}

impl Default for AdaptiveEqFinder {
    fn default() -> Self {
        AdaptiveEqFinder {
            min_samples_per_bin: ADAPTIVE_EQ_MIN_SAMPLES_PER_BIN,
            max_bins: ADAPTIVE_EQ_MAX_BINS,
            variability_threshold: ADAPTIVE_EQ_VARIABILITY_THRESHOLD,
        }
    }
}

impl AdaptiveEqFinder {
    /// `(bins, samples_per_bin)` for one feature's values.
    fn frequency_params(&self, values: &[f64]) -> (usize, usize) {
        let n = values.len();
        let mean = values.iter().sum::<f64>() / n as f64;
        let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;
        let cv = var.sqrt() / (mean.abs() + EPS);

        let sqrt_n = (n as f64).sqrt() as usize;
        let bins = if cv < self.variability_threshold {
            (sqrt_n / 2).clamp(4, 16)
        } else {
            sqrt_n.clamp(8, self.max_bins)
        };
        let bins = bins.clamp(2, (n / self.min_samples_per_bin.max(1)).max(2));
        let per_bin = self.min_samples_per_bin.max(n / bins);
        (bins, per_bin)
    }

    fn scan_feature(
        &self,
        dataset: &Dataset,
        indices: &[usize],
        feature: usize,
        parent_metric: f64,
        criterion: &dyn Criterion,
    ) -> Option<Split> {
        let n = indices.len();
        let values: Vec<f64> = indices
            .iter()
            .map(|&i| dataset.value(i, feature))
            .collect();

        let (_, per_bin) = self.frequency_params(&values);
        if n < 2 * per_bin {
            return None;
        }

        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_unstable_by(|&a, &b| {
            dataset
                .value(a, feature)
                .total_cmp(&dataset.value(b, feature))
        });

        let mut best: Option<Split> = None;
        let mut pivot = per_bin;
        while pivot + per_bin <= n {
            let v_left = dataset.value(sorted[pivot - 1], feature);
            let v_right = dataset.value(sorted[pivot], feature);
            if (v_right - v_left).abs() < EPS {
                pivot += per_bin;
                continue;
            }

            let left = &sorted[..pivot];
            let right = &sorted[pivot..];
            if left.len() < self.min_samples_per_bin || right.len() < self.min_samples_per_bin {
                pivot += per_bin;
                continue;
            }

            let m_left = criterion.score(dataset.targets(), left);
            let m_right = criterion.score(dataset.targets(), right);
            let gain = parent_metric
                - (m_left * left.len() as f64 + m_right * right.len() as f64) / n as f64;
            if gain > 0.0 {
                best = merge_best(
                    best,
                    Some(Split {
                        feature,
                        threshold: 0.5 * (v_left + v_right),
                        gain,
                    }),
                );
            }
            pivot += per_bin;
        }
        best
    }
}

impl SplitFinder for AdaptiveEqFinder {
    fn find_best_split(
        &self,
        dataset: &Dataset,
        indices: &[usize],
        parent_metric: f64,
        criterion: &dyn Criterion,
    ) -> Option<Split> {
        let n = indices.len();
        if n < 2 * self.min_samples_per_bin {
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
        "adaptive_eq"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::criterion::MseCriterion;

    fn stepped_dataset(n: usize) -> Dataset {
        let data: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let targets: Vec<f64> = (0..n).map(|i| if i < n / 2 { 0.0 } else { 50.0 }).collect();
        Dataset::from_rows(data, 1, targets).unwrap()
    }

    #[test]
    fn test_adaptive_ew_finds_split() {
        let dataset = stepped_dataset(64);
        let indices = dataset.all_indices();
        let metric = MseCriterion.score(dataset.targets(), &indices);
        for rule in [
            BinningRule::Sturges,
            BinningRule::Rice,
            BinningRule::Sqrt,
            BinningRule::FreedmanDiaconis,
        ] {
            let split = AdaptiveEwFinder::new(rule)
                .find_best_split(&dataset, &indices, metric, &MseCriterion)
                .unwrap();
            assert_eq!(split.feature, 0);
            assert!(split.gain > 0.0, "rule {:?} found no gain", rule);
        }
    }

    #[test]
    fn test_adaptive_ew_bin_count_clamped() {
        let finder = AdaptiveEwFinder::new(BinningRule::Sqrt);
        let many: Vec<f64> = (0..100_000).map(|i| i as f64).collect();
        assert_eq!(finder.optimal_bins(&many), ADAPTIVE_MAX_BINS);
        let few = [1.0, 2.0, 3.0];
        assert_eq!(finder.optimal_bins(&few), ADAPTIVE_MIN_BINS);
    }

    #[test]
    fn test_adaptive_eq_finds_split() {
        let dataset = stepped_dataset(64);
        let indices = dataset.all_indices();
        let metric = MseCriterion.score(dataset.targets(), &indices);
        let split = AdaptiveEqFinder::default()
            .find_best_split(&dataset, &indices, metric, &MseCriterion)
            .unwrap();
        assert_eq!(split.feature, 0);
        assert!(split.gain > 0.0);
    }

    #[test]
    fn test_adaptive_eq_rejects_tiny_nodes() {
        let dataset = stepped_dataset(8);
        let indices: Vec<usize> = (0..8).collect();
        let finder = AdaptiveEqFinder::default();
        // 6 samples cannot fill two minimum-size frequency bins
        assert!(finder
            .find_best_split(&dataset, &indices[..6], 1.0, &MseCriterion)
            .is_none());
    }
}
