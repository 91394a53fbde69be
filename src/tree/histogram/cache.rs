//! Bounded cache of node-restricted feature histograms.
//!
//! Keys are exact: the feature index plus the full sample-index subset.
//! Two different subsets can never alias the same entry. Eviction is
//! FIFO once the configured capacity is reached.

use crate::core::constants::DEFAULT_HISTOGRAM_CACHE_SIZE;
use crate::core::types::FeatureIndex;
use crate::tree::histogram::FeatureHistogram;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    feature: FeatureIndex,
    indices: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

pub struct HistogramCache {
    capacity: usize,
    entries: HashMap<CacheKey, FeatureHistogram>,
    order: VecDeque<CacheKey>,
    stats: CacheStats,
}

impl Default for HistogramCache {
    fn default() -> Self {
        Self::new(DEFAULT_HISTOGRAM_CACHE_SIZE)
    }
}

impl HistogramCache {
    pub fn new(capacity: usize) -> Self {
        HistogramCache {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn get(&mut self, feature: FeatureIndex, indices: &[usize]) -> Option<&FeatureHistogram> {
        let key = CacheKey {
            feature,
            indices: indices.to_vec(),
        };
        match self.entries.get(&key) {
            Some(hist) => {
                self.stats.hits += 1;
                Some(hist)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, feature: FeatureIndex, indices: &[usize], histogram: FeatureHistogram) {
        let key = CacheKey {
            feature,
            indices: indices.to_vec(),
        };
        if self.entries.contains_key(&key) {
            self.entries.insert(key, histogram);
            return;
        }
        while self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                self.stats.evictions += 1;
            } else {
                break;
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, histogram);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
