//! Error handling for the cartree engine.
//!
//! All fallible operations in the crate return [`Result`], built on a single
//! [`TreeError`] enum so callers can match on the failure category.

use thiserror::Error;

/// Main error type for the cartree library.
#[derive(Error, Debug)]
pub enum TreeError {
    /// Configuration and validation errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Dataset-related errors (empty input, invalid values)
    #[error("Dataset error: {message}")]
    Dataset { message: String },

    /// Data dimension mismatch errors
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}, {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    /// Training-related errors
    #[error("Training error: {message}")]
    Training { message: String },

    /// Prediction errors (untrained tree, bad sample width)
    #[error("Prediction error: {message}")]
    Prediction { message: String },

    /// JSON serialization errors
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// Internal library errors (should not occur in normal usage)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Type alias for Results using TreeError
pub type Result<T> = std::result::Result<T, TreeError>;

impl TreeError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        TreeError::Config {
            message: message.into(),
        }
    }

    /// Create a dataset error
    pub fn dataset<S: Into<String>>(message: S) -> Self {
        TreeError::Dataset {
            message: message.into(),
        }
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch<E, A>(expected: E, actual: A) -> Self
    where
        E: Into<String>,
        A: Into<String>,
    {
        TreeError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter<P, V, R>(parameter: P, value: V, reason: R) -> Self
    where
        P: Into<String>,
        V: Into<String>,
        R: Into<String>,
    {
        TreeError::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a training error
    pub fn training<S: Into<String>>(message: S) -> Self {
        TreeError::Training {
            message: message.into(),
        }
    }

    /// Create a prediction error
    pub fn prediction<S: Into<String>>(message: S) -> Self {
        TreeError::Prediction {
            message: message.into(),
        }
    }

    /// Create an internal error (should be used sparingly)
    pub fn internal<S: Into<String>>(message: S) -> Self {
        TreeError::Internal {
            message: message.into(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            TreeError::Config { .. } => "config",
            TreeError::Dataset { .. } => "dataset",
            TreeError::DimensionMismatch { .. } => "dimension_mismatch",
            TreeError::InvalidParameter { .. } => "invalid_parameter",
            TreeError::Training { .. } => "training",
            TreeError::Prediction { .. } => "prediction",
            TreeError::Json { .. } => "json",
            TreeError::Internal { .. } => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = TreeError::config("bad split method");
        assert_eq!(err.category(), "config");
        let display = format!("{}", err);
        assert!(display.contains("Configuration error"));
        assert!(display.contains("bad split method"));
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = TreeError::dimension_mismatch("100 labels", "90 labels");
        assert_eq!(err.category(), "dimension_mismatch");
        assert!(format!("{}", err).contains("expected 100 labels"));
    }

    #[test]
    fn test_parameter_error() {
        let err = TreeError::invalid_parameter("max_depth", "0", "must be at least 1");
        assert_eq!(err.category(), "invalid_parameter");
    }
}
