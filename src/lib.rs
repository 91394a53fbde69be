//! # cartree
//!
//! A CART-style regression tree training engine with configurable
//! impurity criteria, split-search strategies, and pruning.
//!
//! - **Criteria**: MSE, MAE, Huber, quantile (pinball), log-cosh, and
//!   Poisson deviance.
//! - **Split finders**: exhaustive scan, random thresholds, quartiles,
//!   fixed equal-width/equal-frequency histograms with precomputed
//!   boundaries, and adaptive binning variants.
//! - **Pruning**: min-gain pre-pruning, cost-complexity, and
//!   reduced-error pruning against a validation set.
//! - **Concurrency**: parallel feature scans, parallel recursion near
//!   the root, and a task-queue growth path for large datasets.
//!
//! ## Example
//!
//! ```
//! use cartree::config::TreeConfigBuilder;
//! use cartree::dataset::Dataset;
//! use cartree::tree::SingleTreeTrainer;
//!
//! let data = vec![1.0, 2.0, 10.0, 11.0];
//! let targets = vec![0.0, 0.0, 5.0, 5.0];
//! let dataset = Dataset::from_rows(data, 1, targets).unwrap();
//!
//! let config = TreeConfigBuilder::new().max_depth(3).build().unwrap();
//! let mut trainer = SingleTreeTrainer::new(config).unwrap();
//! trainer.train(&dataset).unwrap();
//! assert_eq!(trainer.predict(&[1.5]).unwrap(), 0.0);
//! ```

pub mod config;
pub mod core;
pub mod dataset;
pub mod tree;

pub use crate::config::{TreeConfig, TreeConfigBuilder};
pub use crate::core::error::{Result, TreeError};
pub use crate::core::types::{BinningRule, BinningType, CriterionKind, PrunerKind, SplitMethod};
pub use crate::dataset::Dataset;
pub use crate::tree::{Node, NodeKind, SingleTreeTrainer, TreeStats};

/// Crate version from the package manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
