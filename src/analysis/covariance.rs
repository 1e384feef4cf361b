//! Total variance and covariance concentration of a population code.
use nalgebra::{DMatrix, SymmetricEigen};

use crate::error::GclError;

/// Unbiased covariance between the rows (cells) of a sample matrix, observations being columns.
pub fn cell_covariance(samples: &DMatrix<f64>) -> Result<DMatrix<f64>, GclError> {
    let num_patterns = samples.ncols();
    if samples.nrows() == 0 || num_patterns < 2 {
        return Err(GclError::IncompatibleShapes(format!(
            "Covariance needs at least one cell and two patterns, got ({} x {})",
            samples.nrows(),
            num_patterns
        )));
    }
    let mut centered = samples.clone();
    for mut row in centered.row_iter_mut() {
        let mean = row.mean();
        row.add_scalar_mut(-mean);
    }
    Ok(&centered * centered.transpose() / (num_patterns - 1) as f64)
}

/// Spectrum summary of the covariance between cells.
#[derive(Debug, Clone, PartialEq)]
pub struct VarianceSpectrum {
    /// Square roots of the covariance eigenvalues, negative numerical artifacts set to 0.
    pub magnitudes: Vec<f64>,
}

impl VarianceSpectrum {
    pub fn from_samples(samples: &DMatrix<f64>) -> Result<Self, GclError> {
        let eigen = SymmetricEigen::new(cell_covariance(samples)?);
        let magnitudes = eigen
            .eigenvalues
            .iter()
            .map(|lambda| lambda.max(0.0).sqrt())
            .collect();
        Ok(VarianceSpectrum { magnitudes })
    }

    /// Total variance, i.e., the sum of the squared magnitudes.
    pub fn total_variance(&self) -> f64 {
        self.magnitudes.iter().map(|l| l * l).sum()
    }

    /// Concentration of the spectrum in its leading mode, `(max L / Σ L - 1/N) / (1 - 1/N)`.
    ///
    /// It is 0 when every mode has the same magnitude and 1 when a single mode carries everything.
    /// It is NaN for a silent population or a single cell.
    pub fn concentration(&self) -> f64 {
        let n = self.magnitudes.len() as f64;
        let sum: f64 = self.magnitudes.iter().sum();
        let max = self.magnitudes.iter().copied().fold(f64::NAN, f64::max);
        (max / sum - 1.0 / n) / (1.0 - 1.0 / n)
    }
}
