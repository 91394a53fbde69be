//! Core data types and configuration enumerations for the cartree engine.
//!
//! Each enum implements `FromStr` so that option strings such as
//! `"huber:1.5"` or `"histogram_ew:32"` parse directly into a typed,
//! parameterized variant.

use crate::core::constants::{
    DEFAULT_BINS, DEFAULT_HUBER_DELTA, DEFAULT_QUANTILE_TAU, DEFAULT_RANDOM_SPLITS,
};
use crate::core::error::TreeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Feature index type for identifying columns in the feature matrix.
pub type FeatureIndex = usize;

/// Impurity criterion selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CriterionKind {
    /// Mean squared error (variance)
    Mse,
    /// Mean absolute deviation from the median
    Mae,
    /// Huber loss with transition point `delta`
    Huber { delta: f64 },
    /// Pinball loss at quantile level `tau`
    Quantile { tau: f64 },
    /// Log-cosh loss
    LogCosh,
    /// Poisson deviance
    Poisson,
}

impl Default for CriterionKind {
    fn default() -> Self {
        CriterionKind::Mse
    }
}

impl fmt::Display for CriterionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CriterionKind::Mse => write!(f, "mse"),
            CriterionKind::Mae => write!(f, "mae"),
            CriterionKind::Huber { delta } => write!(f, "huber:{}", delta),
            CriterionKind::Quantile { tau } => write!(f, "quantile:{}", tau),
            CriterionKind::LogCosh => write!(f, "logcosh"),
            CriterionKind::Poisson => write!(f, "poisson"),
        }
    }
}

/// Splits an option string into `(name, optional parameter)` at the first colon.
fn split_param(s: &str) -> (&str, Option<&str>) {
    match s.split_once(':') {
        Some((name, param)) => (name, Some(param)),
        None => (s, None),
    }
}

fn parse_f64(name: &str, param: &str) -> Result<f64, TreeError> {
    param
        .parse::<f64>()
        .map_err(|_| TreeError::invalid_parameter(name, param, "expected a number"))
}

fn parse_usize(name: &str, param: &str) -> Result<usize, TreeError> {
    param
        .parse::<usize>()
        .map_err(|_| TreeError::invalid_parameter(name, param, "expected a positive integer"))
}

impl FromStr for CriterionKind {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, param) = split_param(s);
        match name {
            "mse" => Ok(CriterionKind::Mse),
            "mae" => Ok(CriterionKind::Mae),
            "huber" => {
                let delta = match param {
                    Some(p) => parse_f64("huber delta", p)?,
                    None => DEFAULT_HUBER_DELTA,
                };
                Ok(CriterionKind::Huber { delta })
            }
            "quantile" => {
                let tau = match param {
                    Some(p) => parse_f64("quantile tau", p)?,
                    None => DEFAULT_QUANTILE_TAU,
                };
                Ok(CriterionKind::Quantile { tau })
            }
            "logcosh" => Ok(CriterionKind::LogCosh),
            "poisson" => Ok(CriterionKind::Poisson),
            other => Err(TreeError::config(format!("unknown criterion: {}", other))),
        }
    }
}

/// Bin-count rule for adaptive equal-width binning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinningRule {
    /// `ceil(log2 n) + 1`
    Sturges,
    /// `ceil(2 * n^(1/3))`
    Rice,
    /// `ceil(sqrt n)`
    Sqrt,
    /// `2 * IQR / n^(1/3)` bin width
    FreedmanDiaconis,
}

impl Default for BinningRule {
    fn default() -> Self {
        BinningRule::Sturges
    }
}

impl fmt::Display for BinningRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinningRule::Sturges => write!(f, "sturges"),
            BinningRule::Rice => write!(f, "rice"),
            BinningRule::Sqrt => write!(f, "sqrt"),
            BinningRule::FreedmanDiaconis => write!(f, "freedman_diaconis"),
        }
    }
}

impl FromStr for BinningRule {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sturges" => Ok(BinningRule::Sturges),
            "rice" => Ok(BinningRule::Rice),
            "sqrt" => Ok(BinningRule::Sqrt),
            "freedman_diaconis" | "fd" => Ok(BinningRule::FreedmanDiaconis),
            other => Err(TreeError::config(format!("unknown binning rule: {}", other))),
        }
    }
}

/// Split-search algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SplitMethod {
    /// Scan every adjacent distinct-value boundary per feature
    Exhaustive,
    /// Evaluate `k` uniform random thresholds per feature
    Random { k: usize },
    /// Evaluate only the three quartile values per feature
    Quartile,
    /// Precomputed equal-width histogram boundaries
    HistogramEw { bins: usize },
    /// Precomputed equal-frequency histogram boundaries
    HistogramEq { bins: usize },
    /// Equal-width with per-feature bin count chosen by a statistical rule
    AdaptiveEw { rule: BinningRule },
    /// Equal-frequency with bin count driven by coefficient of variation
    AdaptiveEq,
}

impl Default for SplitMethod {
    fn default() -> Self {
        SplitMethod::Exhaustive
    }
}

impl fmt::Display for SplitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitMethod::Exhaustive => write!(f, "exhaustive"),
            SplitMethod::Random { k } => write!(f, "random:{}", k),
            SplitMethod::Quartile => write!(f, "quartile"),
            SplitMethod::HistogramEw { bins } => write!(f, "histogram_ew:{}", bins),
            SplitMethod::HistogramEq { bins } => write!(f, "histogram_eq:{}", bins),
            SplitMethod::AdaptiveEw { rule } => write!(f, "adaptive_ew:{}", rule),
            SplitMethod::AdaptiveEq => write!(f, "adaptive_eq"),
        }
    }
}

impl FromStr for SplitMethod {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, param) = split_param(s);
        match name {
            "exhaustive" => Ok(SplitMethod::Exhaustive),
            "random" => {
                let k = match param {
                    Some(p) => parse_usize("random k", p)?,
                    None => DEFAULT_RANDOM_SPLITS,
                };
                Ok(SplitMethod::Random { k })
            }
            "quartile" => Ok(SplitMethod::Quartile),
            "histogram_ew" => {
                let bins = match param {
                    Some(p) => parse_usize("histogram_ew bins", p)?,
                    None => DEFAULT_BINS,
                };
                Ok(SplitMethod::HistogramEw { bins })
            }
            "histogram_eq" => {
                let bins = match param {
                    Some(p) => parse_usize("histogram_eq bins", p)?,
                    None => DEFAULT_BINS,
                };
                Ok(SplitMethod::HistogramEq { bins })
            }
            "adaptive_ew" => {
                let rule = match param {
                    Some(p) => p.parse()?,
                    None => BinningRule::default(),
                };
                Ok(SplitMethod::AdaptiveEw { rule })
            }
            "adaptive_eq" => Ok(SplitMethod::AdaptiveEq),
            other => Err(TreeError::config(format!("unknown split method: {}", other))),
        }
    }
}

/// Pruning strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrunerKind {
    /// No pruning
    None,
    /// Minimum-gain pre-pruning policy consulted during growth
    MinGain,
    /// Cost-complexity post-pruning with complexity parameter alpha
    CostComplexity,
    /// Reduced-error post-pruning against a held-out validation set
    ReducedError,
}

impl Default for PrunerKind {
    fn default() -> Self {
        PrunerKind::None
    }
}

impl fmt::Display for PrunerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrunerKind::None => write!(f, "none"),
            PrunerKind::MinGain => write!(f, "mingain"),
            PrunerKind::CostComplexity => write!(f, "cost_complexity"),
            PrunerKind::ReducedError => write!(f, "reduced_error"),
        }
    }
}

impl FromStr for PrunerKind {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(PrunerKind::None),
            "mingain" => Ok(PrunerKind::MinGain),
            "cost_complexity" => Ok(PrunerKind::CostComplexity),
            "reduced_error" => Ok(PrunerKind::ReducedError),
            other => Err(TreeError::config(format!("unknown pruner: {}", other))),
        }
    }
}

/// Binning policy used by the precomputed-histogram subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BinningType {
    EqualWidth,
    EqualFrequency,
    AdaptiveEw(BinningRule),
    AdaptiveEq,
}

impl fmt::Display for BinningType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinningType::EqualWidth => write!(f, "equal_width"),
            BinningType::EqualFrequency => write!(f, "equal_frequency"),
            BinningType::AdaptiveEw(rule) => write!(f, "adaptive_ew:{}", rule),
            BinningType::AdaptiveEq => write!(f, "adaptive_eq"),
        }
    }
}
