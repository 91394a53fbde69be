//! Histogram-based split search.
//!
//! On the first query the finder builds dataset-wide per-feature
//! histograms (equal-width or equal-frequency boundaries) and afterwards
//! answers every node query by re-bucketing the node subset against
//! those fixed boundaries. Node-restricted histograms are retained in a
//! bounded cache. When a node subset is degenerate with respect to the
//! precomputed boundaries, the finder falls back to binning the node's
//! own value range.

use crate::dataset::Dataset;
use crate::tree::criterion::Criterion;
use crate::tree::histogram::cache::HistogramCache;
use crate::tree::histogram::PrecomputedHistograms;
use crate::tree::split::{Split, SplitFinder};
use crate::core::types::BinningType;
use std::sync::{Arc, Mutex};

pub struct HistogramFinder {
    binning: BinningType,
    bins: usize,
    precomputed: Mutex<Option<Arc<PrecomputedHistograms>>>,
    cache: Mutex<HistogramCache>,
}

impl HistogramFinder {
    pub fn new(binning: BinningType, bins: usize) -> Self {
        HistogramFinder {
            binning,
            bins,
            precomputed: Mutex::new(None),
            cache: Mutex::new(HistogramCache::default()),
        }
    }

    /// Dataset-wide histograms, built on first use.
    fn histograms(&self, dataset: &Dataset) -> Arc<PrecomputedHistograms> {
        let mut guard = self
            .precomputed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(existing) = guard.as_ref() {
            return Arc::clone(existing);
        }
        log::debug!(
            "precomputing {} histograms with {} bins for {} features",
            self.binning,
            self.bins,
            dataset.num_features()
        );
        let built = Arc::new(PrecomputedHistograms::precompute(
            dataset,
            &dataset.all_indices(),
            self.binning,
            self.bins,
        ));
        *guard = Some(Arc::clone(&built));
        built
    }

    /// Exact-boundary fallback: bin the node's own value range instead
    /// of the dataset-wide boundaries.
    fn find_node_local(
        &self,
        dataset: &Dataset,
        indices: &[usize],
        parent_metric: f64,
    ) -> Option<Split> {
        let local =
            PrecomputedHistograms::precompute(dataset, indices, self.binning, self.bins);
        local.find_best_split_fast(dataset, indices, parent_metric, None)
    }
}

impl SplitFinder for HistogramFinder {
    fn find_best_split(
        &self,
        dataset: &Dataset,
        indices: &[usize],
        parent_metric: f64,
        _criterion: &dyn Criterion,
    ) -> Option<Split> {
        if indices.len() < 2 {
            return None;
        }
        let histograms = self.histograms(dataset);
        let fast = histograms.find_best_split_fast(
            dataset,
            indices,
            parent_metric,
            Some(&self.cache),
        );
        if fast.is_some() {
            return fast;
        }
        self.find_node_local(dataset, indices, parent_metric)
    }

    fn name(&self) -> &'static str {
        match self.binning {
            BinningType::EqualFrequency => "histogram_eq",
            _ => "histogram_ew",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::criterion::MseCriterion;

    fn two_cluster_dataset() -> Dataset {
        let mut data = Vec::new();
        let mut targets = Vec::new();
        for i in 0..8 {
            data.push(i as f64 * 0.25);
            targets.push(0.0);
        }
        for i in 0..8 {
            data.push(20.0 + i as f64 * 0.25);
            targets.push(10.0);
        }
        Dataset::from_rows(data, 1, targets).unwrap()
    }

    #[test]
    fn test_equal_width_split_in_gap() {
        let dataset = two_cluster_dataset();
        let indices = dataset.all_indices();
        let metric = MseCriterion.score(dataset.targets(), &indices);
        let finder = HistogramFinder::new(BinningType::EqualWidth, 4);
        let split = finder
            .find_best_split(&dataset, &indices, metric, &MseCriterion)
            .unwrap();
        assert_eq!(split.feature, 0);
        assert!(split.threshold > 1.75 && split.threshold < 20.0);
        assert!((split.gain - metric).abs() < 1e-9);
    }

    #[test]
    fn test_equal_frequency_split() {
        let dataset = two_cluster_dataset();
        let indices = dataset.all_indices();
        let metric = MseCriterion.score(dataset.targets(), &indices);
        let finder = HistogramFinder::new(BinningType::EqualFrequency, 4);
        let split = finder
            .find_best_split(&dataset, &indices, metric, &MseCriterion)
            .unwrap();
        assert!(split.threshold > 1.75 && split.threshold < 20.0);
        assert!(split.gain > 0.0);
    }

    #[test]
    fn test_fallback_on_degenerate_subset() {
        // Cluster A sits entirely inside the first of two global bins,
        // so the fast path sees a single occupied bin and gives up; the
        // node-local fallback still splits A's internal structure.
        let mut data: Vec<f64> = (0..8).map(|i| i as f64 * 0.1).collect();
        data.extend((0..8).map(|i| 20.0 + i as f64 * 0.1));
        let mut targets = vec![0.0; 4];
        targets.extend(vec![5.0; 4]);
        targets.extend(vec![10.0; 8]);
        let dataset = Dataset::from_rows(data, 1, targets).unwrap();

        let indices = dataset.all_indices();
        let metric = MseCriterion.score(dataset.targets(), &indices);
        let finder = HistogramFinder::new(BinningType::EqualWidth, 2);
        finder.find_best_split(&dataset, &indices, metric, &MseCriterion);

        let subset: Vec<usize> = (0..8).collect();
        let subset_metric = MseCriterion.score(dataset.targets(), &subset);
        let split = finder
            .find_best_split(&dataset, &subset, subset_metric, &MseCriterion)
            .unwrap();
        assert_eq!(split.feature, 0);
        assert!(split.threshold < 0.8);
        assert!(split.gain > 0.0);
    }

    #[test]
    fn test_constant_feature_gives_none() {
        let dataset = Dataset::from_rows(vec![1.0; 6], 1, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0])
            .unwrap();
        let indices = dataset.all_indices();
        let finder = HistogramFinder::new(BinningType::EqualWidth, 4);
        assert!(finder
            .find_best_split(&dataset, &indices, 2.9, &MseCriterion)
            .is_none());
    }
}
