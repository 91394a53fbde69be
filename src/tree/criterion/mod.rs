//! Impurity criteria.
//!
//! A criterion scores the homogeneity of a node's target subset; split
//! gain is `parent_metric - weighted child metrics`. All criteria return
//! 0.0 for empty and singleton subsets, and large subsets accumulate in
//! parallel via rayon.

use crate::core::constants::{EPS, PARALLEL_THRESHOLD};
use crate::core::types::CriterionKind;
use rayon::prelude::*;

/// Node impurity measure over a target subset selected by indices.
pub trait Criterion: Send + Sync {
    /// Impurity of `targets[indices]`; lower is purer. Gain is computed
    /// as a difference of scores, so only relative values matter (the
    /// Poisson proxy, for one, can go negative on valid count data).
    fn score(&self, targets: &[f64], indices: &[usize]) -> f64;

    /// Human-readable name used in logs.
    fn name(&self) -> &'static str;
}

/// Instantiate the criterion selected by configuration.
pub fn create_criterion(kind: CriterionKind) -> Box<dyn Criterion> {
    match kind {
        CriterionKind::Mse => Box::new(MseCriterion),
        CriterionKind::Mae => Box::new(MaeCriterion),
        CriterionKind::Huber { delta } => Box::new(HuberCriterion { delta }),
        CriterionKind::Quantile { tau } => Box::new(QuantileCriterion { tau }),
        CriterionKind::LogCosh => Box::new(LogCoshCriterion),
        CriterionKind::Poisson => Box::new(PoissonCriterion),
    }
}

/// Sum `f(targets[i])` over the subset, in parallel past the serial
/// threshold.
fn subset_sum<F>(targets: &[f64], indices: &[usize], f: F) -> f64
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    if indices.len() >= PARALLEL_THRESHOLD {
        indices.par_iter().map(|&i| f(targets[i])).sum()
    } else {
        indices.iter().map(|&i| f(targets[i])).sum()
    }
}

fn subset_mean(targets: &[f64], indices: &[usize]) -> f64 {
    subset_sum(targets, indices, |y| y) / indices.len() as f64
}

/// Median of the subset; averages the two middle values for even counts.
fn subset_median(targets: &[f64], indices: &[usize]) -> f64 {
    let mut values: Vec<f64> = indices.iter().map(|&i| targets[i]).collect();
    let n = values.len();
    let mid = n / 2;
    values.select_nth_unstable_by(mid, f64::total_cmp);
    let upper = values[mid];
    if n % 2 == 1 {
        upper
    } else {
        let lower = values[..mid]
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        0.5 * (lower + upper)
    }
}

/// Variance computed as `E[y^2] - E[y]^2`, clamped at zero to absorb
/// floating-point cancellation on near-constant subsets.
pub struct MseCriterion;

impl Criterion for MseCriterion {
    fn score(&self, targets: &[f64], indices: &[usize]) -> f64 {
        let n = indices.len();
        if n < 2 {
            return 0.0;
        }
        let sum = subset_sum(targets, indices, |y| y);
        let sum_sq = subset_sum(targets, indices, |y| y * y);
        let mean = sum / n as f64;
        (sum_sq / n as f64 - mean * mean).max(0.0)
    }

    fn name(&self) -> &'static str {
        "mse"
    }
}

/// Mean absolute deviation from the subset median.
pub struct MaeCriterion;

impl Criterion for MaeCriterion {
    fn score(&self, targets: &[f64], indices: &[usize]) -> f64 {
        let n = indices.len();
        if n < 2 {
            return 0.0;
        }
        let median = subset_median(targets, indices);
        subset_sum(targets, indices, |y| (y - median).abs()) / n as f64
    }

    fn name(&self) -> &'static str {
        "mae"
    }
}

/// Huber loss around the subset mean: quadratic within `delta`, linear
/// beyond it.
pub struct HuberCriterion {
    pub delta: f64,
}

impl Criterion for HuberCriterion {
    fn score(&self, targets: &[f64], indices: &[usize]) -> f64 {
        let n = indices.len();
        if n < 2 {
            return 0.0;
        }
        let mean = subset_mean(targets, indices);
        let delta = self.delta;
        let total = subset_sum(targets, indices, |y| {
            let r = (y - mean).abs();
            if r <= delta {
                0.5 * r * r
            } else {
                delta * (r - 0.5 * delta)
            }
        });
        total / n as f64
    }

    fn name(&self) -> &'static str {
        "huber"
    }
}

/// Pinball loss at level `tau` around the empirical tau-quantile.
pub struct QuantileCriterion {
    pub tau: f64,
}

impl Criterion for QuantileCriterion {
    fn score(&self, targets: &[f64], indices: &[usize]) -> f64 {
        let n = indices.len();
        if n < 2 {
            return 0.0;
        }
        let mut values: Vec<f64> = indices.iter().map(|&i| targets[i]).collect();
        let k = (self.tau * (n - 1) as f64) as usize;
        let k = k.min(n - 1);
        values.select_nth_unstable_by(k, f64::total_cmp);
        let q = values[k];
        let tau = self.tau;
        let total = subset_sum(targets, indices, |y| {
            let r = y - q;
            if r >= 0.0 {
                tau * r
            } else {
                (tau - 1.0) * r
            }
        });
        total / n as f64
    }

    fn name(&self) -> &'static str {
        "quantile"
    }
}

/// Mean `ln cosh` of the residual around the subset mean. Smooth and
/// everywhere twice differentiable, bounded below by zero.
pub struct LogCoshCriterion;

impl Criterion for LogCoshCriterion {
    fn score(&self, targets: &[f64], indices: &[usize]) -> f64 {
        let n = indices.len();
        if n < 2 {
            return 0.0;
        }
        let mean = subset_mean(targets, indices);
        subset_sum(targets, indices, |y| ln_cosh(y - mean)) / n as f64
    }

    fn name(&self) -> &'static str {
        "logcosh"
    }
}

// ln cosh with an overflow-safe large-|x| form: ln cosh x = |x| + ln(1 +
// e^{-2|x|}) - ln 2.
fn ln_cosh(x: f64) -> f64 {
    let a = x.abs();
    a + (-2.0 * a).exp().ln_1p() - std::f64::consts::LN_2
}

/// Poisson deviance proxy `mean(mu - y ln mu)` with the rate floored at
/// a small epsilon to keep the logarithm finite.
pub struct PoissonCriterion;

impl Criterion for PoissonCriterion {
    fn score(&self, targets: &[f64], indices: &[usize]) -> f64 {
        let n = indices.len();
        if n < 2 {
            return 0.0;
        }
        let mu = subset_mean(targets, indices).max(EPS);
        let log_mu = mu.ln();
        subset_sum(targets, indices, |y| mu - y.max(0.0) * log_mu) / n as f64
    }

    fn name(&self) -> &'static str {
        "poisson"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const TARGETS: &[f64] = &[1.0, 2.0, 3.0, 4.0, 5.0];

    fn all() -> Vec<usize> {
        (0..TARGETS.len()).collect()
    }

    #[test]
    fn test_mse_matches_variance() {
        let score = MseCriterion.score(TARGETS, &all());
        assert_relative_eq!(score, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mse_constant_is_zero() {
        let targets = vec![3.5; 100];
        let indices: Vec<usize> = (0..100).collect();
        assert_eq!(MseCriterion.score(&targets, &indices), 0.0);
    }

    #[test]
    fn test_mae_around_median() {
        // median 3, deviations 2 1 0 1 2 -> mean 1.2
        let score = MaeCriterion.score(TARGETS, &all());
        assert_relative_eq!(score, 1.2, epsilon = 1e-12);
    }

    #[test]
    fn test_mae_even_count_uses_middle_average() {
        let targets = [1.0, 2.0, 3.0, 4.0];
        let score = MaeCriterion.score(&targets, &[0, 1, 2, 3]);
        // median 2.5, deviations 1.5 0.5 0.5 1.5 -> mean 1.0
        assert_relative_eq!(score, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_huber_small_residuals_are_quadratic() {
        // mean 3, all residuals <= 2 with delta 10 -> 0.5 * mse-like sum
        let huber = HuberCriterion { delta: 10.0 };
        let score = huber.score(TARGETS, &all());
        assert_relative_eq!(score, 0.5 * 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_huber_large_residuals_are_linear() {
        let huber = HuberCriterion { delta: 0.5 };
        let targets = [0.0, 10.0];
        // mean 5, residuals 5 -> 0.5 * (5 - 0.25) each
        let score = huber.score(&targets, &[0, 1]);
        assert_relative_eq!(score, 0.5 * (5.0 - 0.25), epsilon = 1e-12);
    }

    #[test]
    fn test_quantile_median_matches_half_mae() {
        let pinball = QuantileCriterion { tau: 0.5 };
        let score = pinball.score(TARGETS, &all());
        // pinball at tau=0.5 is half the absolute deviation
        assert_relative_eq!(score, 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_quantile_symmetric_taus_on_symmetric_data() {
        // tau 0.25 and 0.75 land exactly on indices 1 and 3
        let low = QuantileCriterion { tau: 0.25 }.score(TARGETS, &all());
        let high = QuantileCriterion { tau: 0.75 }.score(TARGETS, &all());
        assert_relative_eq!(low, 0.45, epsilon = 1e-12);
        assert_relative_eq!(high, 0.45, epsilon = 1e-12);
    }

    #[test]
    fn test_logcosh_zero_for_constant() {
        let targets = [2.0, 2.0, 2.0];
        let score = LogCoshCriterion.score(&targets, &[0, 1, 2]);
        assert_relative_eq!(score, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_logcosh_overflow_safe() {
        let targets = [0.0, 1.0e6];
        let score = LogCoshCriterion.score(&targets, &[0, 1]);
        assert!(score.is_finite());
        assert!(score > 0.0);
    }

    #[test]
    fn test_poisson_finite_on_zero_counts() {
        let targets = [0.0, 0.0, 0.0];
        let score = PoissonCriterion.score(&targets, &[0, 1, 2]);
        assert!(score.is_finite());
    }

    #[test]
    fn test_singleton_and_empty_are_zero() {
        for kind in [
            CriterionKind::Mse,
            CriterionKind::Mae,
            CriterionKind::Huber { delta: 1.0 },
            CriterionKind::Quantile { tau: 0.5 },
            CriterionKind::LogCosh,
            CriterionKind::Poisson,
        ] {
            let criterion = create_criterion(kind);
            assert_eq!(criterion.score(TARGETS, &[]), 0.0);
            assert_eq!(criterion.score(TARGETS, &[2]), 0.0);
        }
    }
}
