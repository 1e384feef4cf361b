//! Population sparseness and activity of spike-count patterns.
use nalgebra::DMatrix;

use crate::utils::nan_mean;

/// Treves-Rolls population sparseness of a pattern, `(N - (Σx)² / Σx²) / (N - 1)`.
///
/// The sparseness is 0 for uniform activity and 1 when a single cell is active.
/// It is NaN for an all-zero pattern or a population of a single cell.
///
/// # Examples
///
/// ```rust
/// use approx::assert_relative_eq;
/// use rusty_gcl::analysis::sparseness::population_sparseness;
///
/// assert_relative_eq!(population_sparseness(&[3.0, 3.0, 3.0, 3.0]), 0.0);
/// assert_relative_eq!(population_sparseness(&[0.0, 7.0, 0.0, 0.0]), 1.0);
/// assert!(population_sparseness(&[0.0, 0.0]).is_nan());
/// ```
pub fn population_sparseness(pattern: &[f64]) -> f64 {
    let n = pattern.len() as f64;
    let sum: f64 = pattern.iter().sum();
    let sum_sq: f64 = pattern.iter().map(|x| x * x).sum();
    (n - sum * sum / sum_sq) / (n - 1.0)
}

/// Fraction of cells with a non-zero count.
pub fn active_fraction(pattern: &[f64]) -> f64 {
    if pattern.is_empty() {
        return f64::NAN;
    }
    pattern.iter().filter(|x| **x > 0.0).count() as f64 / pattern.len() as f64
}

/// Per-pattern sparseness and activity of a sample matrix (cells x patterns).
#[derive(Debug, Clone, PartialEq)]
pub struct SparsenessProfile {
    pub sparseness: Vec<f64>,
    pub activity: Vec<f64>,
}

impl SparsenessProfile {
    pub fn from_samples(samples: &DMatrix<f64>) -> Self {
        let (sparseness, activity) = samples
            .column_iter()
            .map(|column| {
                let pattern: Vec<f64> = column.iter().copied().collect();
                (population_sparseness(&pattern), active_fraction(&pattern))
            })
            .unzip();
        SparsenessProfile {
            sparseness,
            activity,
        }
    }

    /// Mean sparseness across patterns, ignoring the all-zero ones.
    pub fn mean_sparseness(&self) -> f64 {
        nan_mean(&self.sparseness)
    }

    pub fn mean_activity(&self) -> f64 {
        nan_mean(&self.activity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_uniform_and_one_hot() {
        for n in 2..10 {
            assert_relative_eq!(population_sparseness(&vec![2.0; n]), 0.0, epsilon = 1e-12);
            let mut one_hot = vec![0.0; n];
            one_hot[n / 2] = 5.0;
            assert_relative_eq!(population_sparseness(&one_hot), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_bounds() {
        let pattern = [0.0, 1.0, 4.0, 2.0, 0.0, 9.0];
        let sparseness = population_sparseness(&pattern);
        assert!((0.0..=1.0).contains(&sparseness));
        assert_relative_eq!(active_fraction(&pattern), 4.0 / 6.0);
    }

    #[test]
    fn test_sample_matrix() {
        let samples = DMatrix::from_row_slice(3, 2, &[0.0, 5.0, 2.0, 2.0, 0.0, 0.0]);
        let profile = SparsenessProfile::from_samples(&samples);

        assert_relative_eq!(profile.sparseness[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(profile.sparseness[1], (3.0 - 49.0 / 29.0) / 2.0, epsilon = 1e-12);
        assert_relative_eq!(profile.sparseness[1], 0.655172, epsilon = 1e-6);
        assert_relative_eq!(profile.activity[0], 1.0 / 3.0);
        assert_relative_eq!(profile.activity[1], 2.0 / 3.0);
        assert_relative_eq!(profile.mean_activity(), 0.5);
    }

    #[test]
    fn test_silent_pattern_is_skipped() {
        let samples = DMatrix::from_row_slice(2, 3, &[0.0, 1.0, 1.0, 0.0, 1.0, 0.0]);
        let profile = SparsenessProfile::from_samples(&samples);

        assert!(profile.sparseness[0].is_nan());
        assert_relative_eq!(profile.mean_sparseness(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(profile.activity[0], 0.0);
        assert_relative_eq!(profile.mean_activity(), 0.5);

        let silent = SparsenessProfile::from_samples(&DMatrix::zeros(3, 2));
        assert!(silent.mean_sparseness().is_nan());
    }
}
