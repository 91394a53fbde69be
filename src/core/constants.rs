//! Numeric constants and default parameters shared across the engine.

/// Epsilon used when comparing feature values for distinctness.
pub const EPS: f64 = 1e-12;

/// Below this subset size, data-parallel loops run serially to avoid
/// thread-dispatch overhead dominating small inputs.
pub const PARALLEL_THRESHOLD: usize = 1000;

/// Above this sample count (with more than one worker available) the growth
/// engine switches from the recursive path to the task-queue path.
pub const TASK_QUEUE_THRESHOLD: usize = 1000;

/// Maximum number of workers the task-queue growth path will spawn.
pub const MAX_QUEUE_WORKERS: usize = 8;

/// Maximum depth at which the recursive growth path may fork both children
/// in parallel.
pub const PARALLEL_RECURSION_DEPTH: usize = 2;

/// Minimum node size before the recursive path considers parallel recursion.
pub const PARALLEL_RECURSION_NODE: usize = 2000;

/// Minimum child size before the recursive path considers parallel recursion.
pub const PARALLEL_RECURSION_CHILD: usize = 500;

/// Default maximum tree depth.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Default minimum samples per leaf.
pub const DEFAULT_MIN_SAMPLES_LEAF: usize = 1;

/// Default number of histogram bins.
pub const DEFAULT_BINS: usize = 64;

/// Default number of random thresholds per feature for the random finder.
pub const DEFAULT_RANDOM_SPLITS: usize = 10;

/// Default seed for random components.
pub const DEFAULT_SEED: u64 = 42;

/// Default Huber transition point.
pub const DEFAULT_HUBER_DELTA: f64 = 1.0;

/// Default quantile level.
pub const DEFAULT_QUANTILE_TAU: f64 = 0.5;

/// Bin-count clamp for adaptive equal-width binning.
pub const ADAPTIVE_MIN_BINS: usize = 8;
pub const ADAPTIVE_MAX_BINS: usize = 128;

/// Adaptive equal-frequency defaults.
pub const ADAPTIVE_EQ_MIN_SAMPLES_PER_BIN: usize = 5;
pub const ADAPTIVE_EQ_MAX_BINS: usize = 64;
pub const ADAPTIVE_EQ_VARIABILITY_THRESHOLD: f64 = 0.1;

/// Default bounded size of the histogram cache (entries).
pub const DEFAULT_HISTOGRAM_CACHE_SIZE: usize = 1000;
