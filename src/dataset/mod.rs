//! Dataset management for the cartree engine.
//!
//! A [`Dataset`] owns a dense row-major feature matrix together with the
//! target vector and optional per-row weights. The matrix and targets are
//! immutable once training starts; nodes refer to their data exclusively
//! through sample-index subsets.

use crate::core::error::{Result, TreeError};
use ndarray::{Array1, Array2};

/// A dense regression dataset.
#[derive(Debug, Clone)]
pub struct Dataset {
    features: Array2<f64>,
    targets: Array1<f64>,
    weights: Option<Array1<f64>>,
}

impl Dataset {
    /// Create a dataset from an ndarray matrix and target vector.
    pub fn new(features: Array2<f64>, targets: Array1<f64>) -> Result<Self> {
        if features.nrows() == 0 || features.ncols() == 0 {
            return Err(TreeError::dataset("empty feature matrix"));
        }
        if features.nrows() != targets.len() {
            return Err(TreeError::dimension_mismatch(
                format!("{} targets", features.nrows()),
                format!("{} targets", targets.len()),
            ));
        }
        Ok(Dataset {
            features,
            targets,
            weights: None,
        })
    }

    /// Create a dataset from a flat row-major buffer and its row length.
    pub fn from_rows(data: Vec<f64>, row_length: usize, targets: Vec<f64>) -> Result<Self> {
        if row_length == 0 {
            return Err(TreeError::dataset("row length must be positive"));
        }
        if data.len() % row_length != 0 {
            return Err(TreeError::dimension_mismatch(
                format!("a multiple of {} values", row_length),
                format!("{} values", data.len()),
            ));
        }
        let rows = data.len() / row_length;
        let features = Array2::from_shape_vec((rows, row_length), data)
            .map_err(|e| TreeError::dataset(e.to_string()))?;
        Self::new(features, Array1::from_vec(targets))
    }

    /// Attach per-row sample weights, used for weighted leaf means.
    pub fn with_weights(mut self, weights: Vec<f64>) -> Result<Self> {
        if weights.len() != self.num_rows() {
            return Err(TreeError::dimension_mismatch(
                format!("{} weights", self.num_rows()),
                format!("{} weights", weights.len()),
            ));
        }
        if weights.iter().any(|w| *w < 0.0 || !w.is_finite()) {
            return Err(TreeError::dataset("weights must be finite and non-negative"));
        }
        self.weights = Some(Array1::from_vec(weights));
        Ok(self)
    }

    /// Number of rows (samples).
    pub fn num_rows(&self) -> usize {
        self.features.nrows()
    }

    /// Number of feature columns, i.e. the row length.
    pub fn num_features(&self) -> usize {
        self.features.ncols()
    }

    /// Feature value at `(row, feature)`.
    #[inline]
    pub fn value(&self, row: usize, feature: usize) -> f64 {
        self.features[[row, feature]]
    }

    /// Target value for `row`.
    #[inline]
    pub fn target(&self, row: usize) -> f64 {
        self.targets[row]
    }

    /// Weight for `row`; 1.0 when no weights were supplied.
    #[inline]
    pub fn weight(&self, row: usize) -> f64 {
        match &self.weights {
            Some(w) => w[row],
            None => 1.0,
        }
    }

    /// Whether sample weights were attached.
    pub fn has_weights(&self) -> bool {
        self.weights.is_some()
    }

    /// The full feature matrix.
    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    /// The full target vector as a slice.
    pub fn targets(&self) -> &[f64] {
        self.targets.as_slice().expect("targets are contiguous")
    }

    /// All row indices, `0..num_rows`.
    pub fn all_indices(&self) -> Vec<usize> {
        (0..self.num_rows()).collect()
    }
}
