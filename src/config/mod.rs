//! Training configuration for the cartree engine.
//!
//! [`TreeConfig`] collects every recognized option with sensible defaults;
//! [`TreeConfigBuilder`] provides a fluent construction API with validation
//! at `build()` time.

use crate::core::constants::{DEFAULT_MAX_DEPTH, DEFAULT_MIN_SAMPLES_LEAF, DEFAULT_SEED};
use crate::core::error::{Result, TreeError};
use crate::core::types::{CriterionKind, PrunerKind, SplitMethod};
use serde::{Deserialize, Serialize};

/// Complete configuration for training a single tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Maximum tree depth; the root is at depth 0.
    pub max_depth: usize,
    /// Minimum number of samples each leaf must hold.
    pub min_samples_leaf: usize,
    /// Impurity criterion.
    pub criterion: CriterionKind,
    /// Split-search algorithm.
    pub split_method: SplitMethod,
    /// Pruning strategy applied after (or, for min-gain, during) growth.
    pub pruner: PrunerKind,
    /// Pruner parameter: alpha for cost-complexity, minimum gain for
    /// the min-gain policy. Ignored by the other pruners.
    pub pruner_param: f64,
    /// Seed for random components.
    pub seed: u64,
    /// Worker threads for parallel growth; 0 selects all available cores.
    pub num_threads: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig {
            max_depth: DEFAULT_MAX_DEPTH,
            min_samples_leaf: DEFAULT_MIN_SAMPLES_LEAF,
            criterion: CriterionKind::default(),
            split_method: SplitMethod::default(),
            pruner: PrunerKind::default(),
            pruner_param: 0.0,
            seed: DEFAULT_SEED,
            num_threads: 0,
        }
    }
}

impl TreeConfig {
    /// Validate parameter ranges. Called by the trainer before growth starts.
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(TreeError::invalid_parameter(
                "max_depth",
                "0",
                "must be at least 1",
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(TreeError::invalid_parameter(
                "min_samples_leaf",
                "0",
                "must be at least 1",
            ));
        }
        if let CriterionKind::Quantile { tau } = self.criterion {
            if !(0.0..=1.0).contains(&tau) {
                return Err(TreeError::invalid_parameter(
                    "quantile tau",
                    tau.to_string(),
                    "must lie in [0, 1]",
                ));
            }
        }
        if let CriterionKind::Huber { delta } = self.criterion {
            if delta <= 0.0 {
                return Err(TreeError::invalid_parameter(
                    "huber delta",
                    delta.to_string(),
                    "must be positive",
                ));
            }
        }
        match self.split_method {
            SplitMethod::Random { k } if k == 0 => {
                return Err(TreeError::invalid_parameter(
                    "random k",
                    "0",
                    "must draw at least one threshold",
                ));
            }
            SplitMethod::HistogramEw { bins } | SplitMethod::HistogramEq { bins } if bins < 2 => {
                return Err(TreeError::invalid_parameter(
                    "bins",
                    bins.to_string(),
                    "histogram methods need at least 2 bins",
                ));
            }
            _ => {}
        }
        if self.pruner_param < 0.0 {
            return Err(TreeError::invalid_parameter(
                "pruner_param",
                self.pruner_param.to_string(),
                "must be non-negative",
            ));
        }
        Ok(())
    }

    /// Resolved worker count for parallel sections.
    pub fn effective_threads(&self) -> usize {
        if self.num_threads == 0 {
            num_cpus::get()
        } else {
            self.num_threads
        }
    }
}

/// Fluent builder for [`TreeConfig`].
#[derive(Debug, Clone, Default)]
pub struct TreeConfigBuilder {
    config: TreeConfig,
}

impl TreeConfigBuilder {
    /// Start from the default configuration.
    pub fn new() -> Self {
        TreeConfigBuilder {
            config: TreeConfig::default(),
        }
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    pub fn min_samples_leaf(mut self, samples: usize) -> Self {
        self.config.min_samples_leaf = samples;
        self
    }

    pub fn criterion(mut self, criterion: CriterionKind) -> Self {
        self.config.criterion = criterion;
        self
    }

    pub fn split_method(mut self, method: SplitMethod) -> Self {
        self.config.split_method = method;
        self
    }

    pub fn pruner(mut self, pruner: PrunerKind) -> Self {
        self.config.pruner = pruner;
        self
    }

    pub fn pruner_param(mut self, param: f64) -> Self {
        self.config.pruner_param = param;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.num_threads = threads;
        self
    }

    /// Validate and produce the final configuration.
    pub fn build(self) -> Result<TreeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
