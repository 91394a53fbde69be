//! Precomputed feature histograms.
//!
//! Bin boundaries are derived once from the full dataset and then reused
//! for every node: a node subset is re-bucketed against the fixed
//! boundaries, which costs one pass instead of a sort. The shared
//! histograms are never mutated after construction; per-node statistics
//! live in short-lived [`FeatureHistogram`] values that the bounded
//! [`cache::HistogramCache`] can retain across queries.

pub mod cache;

use crate::core::constants::{
    ADAPTIVE_EQ_MIN_SAMPLES_PER_BIN, ADAPTIVE_EQ_VARIABILITY_THRESHOLD, ADAPTIVE_MAX_BINS,
    ADAPTIVE_MIN_BINS, EPS,
};
use crate::core::types::{BinningRule, BinningType, FeatureIndex};
use crate::dataset::Dataset;
use crate::tree::split::{merge_best, variance_gain, Split};
use self::cache::HistogramCache;
use rayon::prelude::*;
use std::sync::Mutex;

/// One bin: the samples it holds and their target statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistogramBin {
    pub sample_indices: Vec<usize>,
    pub sum: f64,
    pub sum_sq: f64,
    pub count: usize,
    pub bin_start: f64,
    pub bin_end: f64,
}

impl HistogramBin {
    pub fn add_sample(&mut self, index: usize, target: f64) {
        self.sample_indices.push(index);
        self.sum += target;
        self.sum_sq += target * target;
        self.count += 1;
    }
}

/// Histogram of one feature: bins, their boundaries, and prefix arrays
/// for O(1) left-side statistics at any boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureHistogram {
    pub feature: FeatureIndex,
    pub binning: BinningType,
    pub bins: Vec<HistogramBin>,
    /// `bins.len() + 1` boundary values; bin `b` covers
    /// `[boundaries[b], boundaries[b+1])` with the last bin closed.
    pub boundaries: Vec<f64>,
    pub prefix_count: Vec<usize>,
    pub prefix_sum: Vec<f64>,
    pub prefix_sum_sq: Vec<f64>,
}

impl FeatureHistogram {
    fn empty(feature: FeatureIndex, binning: BinningType) -> Self {
        FeatureHistogram {
            feature,
            binning,
            bins: Vec::new(),
            boundaries: Vec::new(),
            prefix_count: Vec::new(),
            prefix_sum: Vec::new(),
            prefix_sum_sq: Vec::new(),
        }
    }

    /// Rebuild the prefix arrays from the current bin statistics.
    pub fn update_prefix_arrays(&mut self) {
        let n = self.bins.len();
        self.prefix_count = Vec::with_capacity(n);
        self.prefix_sum = Vec::with_capacity(n);
        self.prefix_sum_sq = Vec::with_capacity(n);
        let mut count = 0;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for bin in &self.bins {
            count += bin.count;
            sum += bin.sum;
            sum_sq += bin.sum_sq;
            self.prefix_count.push(count);
            self.prefix_sum.push(sum);
            self.prefix_sum_sq.push(sum_sq);
        }
    }

    /// Bin index holding `value`, clamped to the outermost bins.
    pub fn find_bin(&self, value: f64) -> Option<usize> {
        if self.bins.is_empty() || self.boundaries.len() < 2 {
            return None;
        }
        let pos = self.boundaries.partition_point(|&b| b <= value);
        Some(pos.saturating_sub(1).min(self.bins.len() - 1))
    }

    pub fn total_count(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }

    /// Copy of this histogram's structure with emptied bins, ready to be
    /// refilled with a sample subset.
    fn hollow_copy(&self) -> Self {
        let mut copy = self.clone();
        for bin in &mut copy.bins {
            bin.sample_indices.clear();
            bin.sum = 0.0;
            bin.sum_sq = 0.0;
            bin.count = 0;
        }
        copy
    }
}

/// Shared, immutable histograms for every feature of a dataset.
pub struct PrecomputedHistograms {
    histograms: Vec<FeatureHistogram>,
}

impl PrecomputedHistograms {
    /// Build histograms for all features over `indices` under the given
    /// binning policy. Features are processed in parallel.
    pub fn precompute(
        dataset: &Dataset,
        indices: &[usize],
        binning: BinningType,
        bins: usize,
    ) -> Self {
        let histograms = (0..dataset.num_features())
            .into_par_iter()
            .map(|f| {
                let values: Vec<f64> = indices.iter().map(|&i| dataset.value(i, f)).collect();
                let mut hist = build_feature_histogram(f, &values, indices, dataset, binning, bins);
                hist.update_prefix_arrays();
                hist
            })
            .collect();
        PrecomputedHistograms { histograms }
    }

    pub fn num_features(&self) -> usize {
        self.histograms.len()
    }

    pub fn feature(&self, feature: FeatureIndex) -> &FeatureHistogram {
        &self.histograms[feature]
    }

    /// Restrict the precomputed histogram of `feature` to a node subset:
    /// same boundaries, statistics over `indices` only.
    pub fn node_histogram(
        &self,
        dataset: &Dataset,
        indices: &[usize],
        feature: FeatureIndex,
    ) -> FeatureHistogram {
        let parent = &self.histograms[feature];
        let mut hist = parent.hollow_copy();
        for &i in indices {
            if let Some(b) = parent.find_bin(dataset.value(i, feature)) {
                hist.bins[b].add_sample(i, dataset.target(i));
            }
        }
        hist.update_prefix_arrays();
        hist
    }

    /// Best split over the fixed boundaries, or `None` when the node
    /// subset is degenerate with respect to them (all samples in one
    /// bin, or no boundary improves on the parent). Callers fall back to
    /// an exact finder on `None`.
    pub fn find_best_split_fast(
        &self,
        dataset: &Dataset,
        indices: &[usize],
        parent_metric: f64,
        cache: Option<&Mutex<HistogramCache>>,
    ) -> Option<Split> {
        let n = indices.len();
        if n < 2 {
            return None;
        }
        (0..self.histograms.len())
            .into_par_iter()
            .map(|f| self.scan_feature(dataset, indices, f, parent_metric, cache))
            .reduce(|| None, merge_best)
    }

    fn scan_feature(
        &self,
        dataset: &Dataset,
        indices: &[usize],
        feature: FeatureIndex,
        parent_metric: f64,
        cache: Option<&Mutex<HistogramCache>>,
    ) -> Option<Split> {
        let parent = &self.histograms[feature];
        if parent.bins.len() < 2 {
            return None;
        }

        let node_hist = match cache {
            Some(cache) => {
                if let Some(hit) = cache
                    .lock()
                    .ok()
                    .and_then(|mut c| c.get(feature, indices).cloned())
                {
                    hit
                } else {
                    let hist = self.node_histogram(dataset, indices, feature);
                    if let Ok(mut c) = cache.lock() {
                        c.insert(feature, indices, hist.clone());
                    }
                    hist
                }
            }
            None => self.node_histogram(dataset, indices, feature),
        };

        let n = indices.len();
        let total_sum = *node_hist.prefix_sum.last()?;
        let total_sum_sq = *node_hist.prefix_sum_sq.last()?;

        let mut best: Option<Split> = None;
        for b in 0..node_hist.bins.len() - 1 {
            let left_count = node_hist.prefix_count[b];
            let right_count = n - left_count;
            if left_count == 0 || right_count == 0 {
                continue;
            }
            let left_sum = node_hist.prefix_sum[b];
            let left_sum_sq = node_hist.prefix_sum_sq[b];
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
                        threshold: node_hist.bins[b].bin_end,
                        gain,
                    }),
                );
            }
        }
        best
    }

    /// Partition a parent subset at `(feature, threshold)` and derive
    /// both child histograms for that feature without re-sorting. Samples
    /// are routed by their actual feature value, and the children keep
    /// the parent's boundaries.
    pub fn split_node(
        &self,
        dataset: &Dataset,
        feature: FeatureIndex,
        threshold: f64,
        parent_indices: &[usize],
    ) -> (Vec<usize>, Vec<usize>, FeatureHistogram, FeatureHistogram) {
        let parent = &self.histograms[feature];
        let mut left_indices = Vec::new();
        let mut right_indices = Vec::new();
        let mut left_hist = parent.hollow_copy();
        let mut right_hist = parent.hollow_copy();

        for &i in parent_indices {
            let value = dataset.value(i, feature);
            let bin = parent.find_bin(value);
            if value <= threshold {
                left_indices.push(i);
                if let Some(b) = bin {
                    left_hist.bins[b].add_sample(i, dataset.target(i));
                }
            } else {
                right_indices.push(i);
                if let Some(b) = bin {
                    right_hist.bins[b].add_sample(i, dataset.target(i));
                }
            }
        }

        left_hist.update_prefix_arrays();
        right_hist.update_prefix_arrays();
        (left_indices, right_indices, left_hist, right_hist)
    }

    /// Approximate heap footprint in bytes.
    pub fn memory_usage(&self) -> usize {
        self.histograms
            .iter()
            .map(|h| {
                std::mem::size_of::<FeatureHistogram>()
                    + h.bins.len() * std::mem::size_of::<HistogramBin>()
                    + h.bins
                        .iter()
                        .map(|b| b.sample_indices.len() * std::mem::size_of::<usize>())
                        .sum::<usize>()
                    + h.boundaries.len() * std::mem::size_of::<f64>()
                    + h.prefix_sum.len() * std::mem::size_of::<f64>() * 2
                    + h.prefix_count.len() * std::mem::size_of::<usize>()
            })
            .sum()
    }
}

fn build_feature_histogram(
    feature: FeatureIndex,
    values: &[f64],
    indices: &[usize],
    dataset: &Dataset,
    binning: BinningType,
    bins: usize,
) -> FeatureHistogram {
    match binning {
        BinningType::EqualWidth => equal_width_bins(feature, values, indices, dataset, bins),
        BinningType::EqualFrequency => {
            equal_frequency_bins(feature, values, indices, dataset, bins)
        }
        BinningType::AdaptiveEw(rule) => {
            let n = values.len();
            let adaptive = optimal_equal_width_bins(values, rule)
                .clamp(ADAPTIVE_MIN_BINS, ADAPTIVE_MAX_BINS)
                .min(n.max(1));
            let mut hist = equal_width_bins(feature, values, indices, dataset, adaptive);
            hist.binning = binning;
            hist
        }
        BinningType::AdaptiveEq => {
            let adaptive = adaptive_frequency_bins(values);
            let mut hist = equal_frequency_bins(feature, values, indices, dataset, adaptive);
            hist.binning = binning;
            hist
        }
    }
}

fn equal_width_bins(
    feature: FeatureIndex,
    values: &[f64],
    indices: &[usize],
    dataset: &Dataset,
    num_bins: usize,
) -> FeatureHistogram {
    let mut hist = FeatureHistogram::empty(feature, BinningType::EqualWidth);
    if values.is_empty() {
        return hist;
    }

    let v_min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let v_max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if (v_max - v_min).abs() < EPS {
        // Constant feature collapses to a single bin.
        hist.bins = vec![HistogramBin {
            bin_start: v_min,
            bin_end: v_max,
            ..HistogramBin::default()
        }];
        hist.boundaries = vec![v_min, v_max];
        for &i in indices {
            hist.bins[0].add_sample(i, dataset.target(i));
        }
        return hist;
    }

    let width = (v_max - v_min) / num_bins as f64;
    hist.boundaries = (0..=num_bins).map(|b| v_min + b as f64 * width).collect();
    hist.bins = (0..num_bins)
        .map(|b| HistogramBin {
            bin_start: hist.boundaries[b],
            bin_end: hist.boundaries[b + 1],
            ..HistogramBin::default()
        })
        .collect();

    for (pos, &i) in indices.iter().enumerate() {
        let b = (((values[pos] - v_min) / width) as usize).min(num_bins - 1);
        hist.bins[b].add_sample(i, dataset.target(i));
    }
    hist
}

fn equal_frequency_bins(
    feature: FeatureIndex,
    values: &[f64],
    indices: &[usize],
    dataset: &Dataset,
    num_bins: usize,
) -> FeatureHistogram {
    let mut hist = FeatureHistogram::empty(feature, BinningType::EqualFrequency);
    if values.is_empty() {
        return hist;
    }

    let mut pairs: Vec<(f64, usize)> = values
        .iter()
        .copied()
        .zip(indices.iter().copied())
        .collect();
    pairs.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

    let n = pairs.len();
    let num_bins = num_bins.clamp(1, n);
    let base = n / num_bins;
    let remainder = n % num_bins;

    hist.boundaries.push(pairs[0].0);
    let mut pos = 0;
    for b in 0..num_bins {
        let size = base + usize::from(b < remainder);
        let end = (pos + size).min(n);
        let mut bin = HistogramBin {
            bin_start: pairs[pos].0,
            bin_end: pairs[end - 1].0,
            ..HistogramBin::default()
        };
        for &(_, idx) in &pairs[pos..end] {
            bin.add_sample(idx, dataset.target(idx));
        }
        hist.bins.push(bin);
        if end < n {
            hist.boundaries.push(pairs[end].0);
        } else {
            hist.boundaries.push(pairs[n - 1].0);
        }
        pos = end;
    }
    hist
}

/// Bin count for one feature under a statistical equal-width rule.
fn optimal_equal_width_bins(values: &[f64], rule: BinningRule) -> usize {
    let n = values.len();
    if n <= 1 {
        return 1;
    }
    match rule {
        BinningRule::Sturges => (n as f64).log2().ceil() as usize + 1,
        BinningRule::Rice => (2.0 * (n as f64).cbrt()).ceil() as usize,
        BinningRule::Sqrt => (n as f64).sqrt().ceil() as usize,
        BinningRule::FreedmanDiaconis => {
            let mut sorted = values.to_vec();
            sorted.sort_unstable_by(f64::total_cmp);
            let q1 = sorted[n / 4];
            let q3 = sorted[3 * n / 4];
            let iqr = q3 - q1;
            if iqr > 0.0 {
                let h = 2.0 * iqr / (n as f64).cbrt();
                let range = sorted[n - 1] - sorted[0];
                (range / h).ceil() as usize
            } else {
                ADAPTIVE_MIN_BINS
            }
        }
    }
}

/// Bin count for adaptive equal-frequency binning: low-variability
/// features get fewer, wider bins.
fn adaptive_frequency_bins(values: &[f64]) -> usize {
    let n = values.len();
    if n <= 1 {
        return 1;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;
    let cv = var.sqrt() / (mean.abs() + EPS);

    let sqrt_n = (n as f64).sqrt() as usize;
    let bins = if cv < ADAPTIVE_EQ_VARIABILITY_THRESHOLD {
        (sqrt_n / 2).clamp(4, 16)
    } else {
        sqrt_n.clamp(8, crate::core::constants::ADAPTIVE_EQ_MAX_BINS)
    };
    bins.clamp(2, (n / ADAPTIVE_EQ_MIN_SAMPLES_PER_BIN).max(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_dataset(n: usize) -> Dataset {
        let data: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let targets: Vec<f64> = (0..n).map(|i| if i < n / 2 { 0.0 } else { 1.0 }).collect();
        Dataset::from_rows(data, 1, targets).unwrap()
    }

    #[test]
    fn test_equal_width_bin_assignment() {
        let dataset = uniform_dataset(16);
        let indices = dataset.all_indices();
        let hists =
            PrecomputedHistograms::precompute(&dataset, &indices, BinningType::EqualWidth, 4);
        let hist = hists.feature(0);
        assert_eq!(hist.bins.len(), 4);
        assert_eq!(hist.total_count(), 16);
        assert_eq!(hist.boundaries.len(), 5);
        // counts per bin: values 0..15 over width 3.75
        assert_eq!(hist.prefix_count[3], 16);
    }

    #[test]
    fn test_equal_frequency_balanced_counts() {
        let dataset = uniform_dataset(12);
        let indices = dataset.all_indices();
        let hists =
            PrecomputedHistograms::precompute(&dataset, &indices, BinningType::EqualFrequency, 4);
        let hist = hists.feature(0);
        assert_eq!(hist.bins.len(), 4);
        for bin in &hist.bins {
            assert_eq!(bin.count, 3);
        }
    }

    #[test]
    fn test_constant_feature_single_bin() {
        let dataset = Dataset::from_rows(vec![7.0; 5], 1, vec![1.0; 5]).unwrap();
        let indices = dataset.all_indices();
        let hists =
            PrecomputedHistograms::precompute(&dataset, &indices, BinningType::EqualWidth, 8);
        assert_eq!(hists.feature(0).bins.len(), 1);
        assert_eq!(hists.feature(0).total_count(), 5);
    }

    #[test]
    fn test_find_bin_clamps_out_of_range() {
        let dataset = uniform_dataset(10);
        let indices = dataset.all_indices();
        let hists =
            PrecomputedHistograms::precompute(&dataset, &indices, BinningType::EqualWidth, 5);
        let hist = hists.feature(0);
        assert_eq!(hist.find_bin(-100.0), Some(0));
        assert_eq!(hist.find_bin(100.0), Some(4));
    }

    #[test]
    fn test_fast_split_finds_boundary() {
        let dataset = uniform_dataset(16);
        let indices = dataset.all_indices();
        let hists =
            PrecomputedHistograms::precompute(&dataset, &indices, BinningType::EqualWidth, 4);
        let split = hists
            .find_best_split_fast(&dataset, &indices, 0.25, None)
            .unwrap();
        assert_eq!(split.feature, 0);
        assert!(split.gain > 0.0);
        // the cluster boundary at 7/8 falls on the middle bin edge
        assert!((split.threshold - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_fast_split_degenerate_subset() {
        let dataset = uniform_dataset(16);
        let indices = dataset.all_indices();
        let hists =
            PrecomputedHistograms::precompute(&dataset, &indices, BinningType::EqualWidth, 4);
        // all chosen samples fall inside the first bin
        let subset = vec![0, 1, 2];
        assert!(hists
            .find_best_split_fast(&dataset, &subset, 1.0, None)
            .is_none());
    }

    #[test]
    fn test_split_node_partitions_by_value() {
        let dataset = uniform_dataset(16);
        let indices = dataset.all_indices();
        let hists =
            PrecomputedHistograms::precompute(&dataset, &indices, BinningType::EqualWidth, 4);
        let (left, right, left_hist, right_hist) = hists.split_node(&dataset, 0, 7.5, &indices);

        assert_eq!(left.len(), 8);
        assert_eq!(right.len(), 8);
        assert!(left.iter().all(|&i| dataset.value(i, 0) <= 7.5));
        assert!(right.iter().all(|&i| dataset.value(i, 0) > 7.5));
        assert_eq!(left_hist.total_count(), 8);
        assert_eq!(right_hist.total_count(), 8);
        // children keep the parent's boundaries
        assert_eq!(left_hist.boundaries, hists.feature(0).boundaries);
    }

    #[test]
    fn test_adaptive_ew_rules() {
        let values: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        assert_eq!(optimal_equal_width_bins(&values, BinningRule::Sturges), 11);
        assert_eq!(optimal_equal_width_bins(&values, BinningRule::Rice), 20);
        assert_eq!(optimal_equal_width_bins(&values, BinningRule::Sqrt), 32);
        assert!(optimal_equal_width_bins(&values, BinningRule::FreedmanDiaconis) > 0);
    }

    #[test]
    fn test_adaptive_eq_low_variability_uses_fewer_bins() {
        let flat: Vec<f64> = (0..400).map(|i| 100.0 + (i % 3) as f64 * 0.01).collect();
        let spread: Vec<f64> = (0..400).map(|i| (i as f64).powi(2)).collect();
        assert!(adaptive_frequency_bins(&flat) < adaptive_frequency_bins(&spread));
    }

    #[test]
    fn test_memory_usage_nonzero() {
        let dataset = uniform_dataset(32);
        let indices = dataset.all_indices();
        let hists =
            PrecomputedHistograms::precompute(&dataset, &indices, BinningType::EqualWidth, 8);
        assert!(hists.memory_usage() > 0);
    }
}
