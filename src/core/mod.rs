//! Core infrastructure: types, constants, and error handling.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Result, TreeError};
pub use types::{BinningRule, BinningType, CriterionKind, FeatureIndex, PrunerKind, SplitMethod};
