//! Precomputed spatial-correlation structures for MF activation.
//!
//! For a correlation radius, the structure holds one linear operator `R` and one threshold `g`
//! per activation-fraction bin. The bins are evenly spaced over [0.05, 0.95].
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::GclError;
use crate::utils::{linspace, load_json, save_json};
use crate::{MAX_FRACTION_BIN, MIN_FRACTION_BIN, NUM_FRACTION_BINS};

/// Tolerance on the stored bin fractions.
const BIN_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Serialize, Deserialize)]
struct CorrelationBinRecord {
    f_mf: f64,
    /// Row-major operator of shape (N_mf x N_mf).
    rs: Vec<Vec<f64>>,
    g: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct CorrelationRecord {
    radius: u32,
    bins: Vec<CorrelationBinRecord>,
}

/// The latent-Gaussian parameters for one activation-fraction bin.
#[derive(Debug, PartialEq, Clone)]
pub struct CorrelationBin {
    f_mf: f64,
    operator: DMatrix<f64>,
    threshold: f64,
}

impl CorrelationBin {
    /// The activation fraction at the center of the bin.
    pub fn f_mf(&self) -> f64 {
        self.f_mf
    }

    /// The linear operator `R`, of shape (N_mf x N_mf).
    pub fn operator(&self) -> &DMatrix<f64> {
        &self.operator
    }

    /// The threshold `g`: an MF is ON whenever its latent variable exceeds `-g`.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

/// All bins for one correlation radius.
#[derive(Debug, PartialEq, Clone)]
pub struct CorrelationStructure {
    radius: u32,
    num_mf: usize,
    bins: Vec<CorrelationBin>,
}

impl CorrelationStructure {
    /// Create a correlation structure from one (operator, threshold) pair per fraction bin,
    /// ordered by increasing fraction.
    pub fn build(radius: u32, bins: Vec<(DMatrix<f64>, f64)>) -> Result<Self, GclError> {
        if radius == 0 {
            return Err(GclError::InvalidParameter(
                "A correlation structure requires a positive radius".to_string(),
            ));
        }
        if bins.len() != NUM_FRACTION_BINS {
            return Err(GclError::IncompatibleShapes(format!(
                "Expected {} fraction bins, found {}",
                NUM_FRACTION_BINS,
                bins.len()
            )));
        }

        let num_mf = bins[0].0.nrows();
        if let Some((i, (r, _))) = bins
            .iter()
            .enumerate()
            .find(|(_, (r, _))| r.nrows() != num_mf || r.ncols() != num_mf)
        {
            return Err(GclError::IncompatibleShapes(format!(
                "Operator of bin {} has shape ({}, {}) instead of ({}, {})",
                i,
                r.nrows(),
                r.ncols(),
                num_mf,
                num_mf
            )));
        }

        let bins = linspace(MIN_FRACTION_BIN, MAX_FRACTION_BIN, NUM_FRACTION_BINS)
            .into_iter()
            .zip(bins)
            .map(|(f_mf, (operator, threshold))| CorrelationBin {
                f_mf,
                operator,
                threshold,
            })
            .collect();

        Ok(CorrelationStructure {
            radius,
            num_mf,
            bins,
        })
    }

    /// The conventional location of the correlation file for a given radius.
    pub fn path_for<P: AsRef<Path>>(dir: P, radius: u32) -> PathBuf {
        dir.as_ref().join(format!("mf_patterns_r{}.json", radius))
    }

    /// Load a correlation file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, GclError> {
        let record: CorrelationRecord = load_json(path.as_ref())?;
        let expected = linspace(MIN_FRACTION_BIN, MAX_FRACTION_BIN, NUM_FRACTION_BINS);

        let mut bins = Vec::with_capacity(record.bins.len());
        for (i, bin) in record.bins.into_iter().enumerate() {
            if let Some(&f_mf) = expected.get(i) {
                if (bin.f_mf - f_mf).abs() > BIN_TOLERANCE {
                    return Err(GclError::ParseError(format!(
                        "Bin {} is labelled with fraction {} instead of {}",
                        i, bin.f_mf, f_mf
                    )));
                }
            }
            let num_rows = bin.rs.len();
            let num_cols = bin.rs.first().map_or(0, |row| row.len());
            if bin.rs.iter().any(|row| row.len() != num_cols) {
                return Err(GclError::IncompatibleShapes(format!(
                    "Operator of bin {} is ragged",
                    i
                )));
            }
            let operator = DMatrix::from_row_iterator(
                num_rows,
                num_cols,
                bin.rs.into_iter().flatten(),
            );
            bins.push((operator, bin.g));
        }

        let structure = CorrelationStructure::build(record.radius, bins)?;
        log::info!(
            "Correlation structure loaded from {}: radius {}, {} MFs",
            path.as_ref().display(),
            structure.radius,
            structure.num_mf
        );
        Ok(structure)
    }

    /// Save the correlation structure to a JSON file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), GclError> {
        let bins = self
            .bins
            .iter()
            .map(|bin| CorrelationBinRecord {
                f_mf: bin.f_mf,
                rs: bin
                    .operator
                    .row_iter()
                    .map(|row| row.iter().copied().collect())
                    .collect(),
                g: bin.threshold,
            })
            .collect();
        save_json(
            &CorrelationRecord {
                radius: self.radius,
                bins,
            },
            path,
        )
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// The number of MFs the operators act on.
    pub fn num_mf(&self) -> usize {
        self.num_mf
    }

    /// The index of the bin whose center is the closest to the requested fraction.
    pub fn bin_index(f_mf: f64) -> Result<usize, GclError> {
        if !(0.0..=1.0).contains(&f_mf) {
            return Err(GclError::InvalidParameter(format!(
                "The activation fraction must be in [0, 1], got {}",
                f_mf
            )));
        }
        let step = (MAX_FRACTION_BIN - MIN_FRACTION_BIN) / (NUM_FRACTION_BINS - 1) as f64;
        let index = ((f_mf - MIN_FRACTION_BIN) / step).round().max(0.0) as usize;
        Ok(index.min(NUM_FRACTION_BINS - 1))
    }

    /// The bin closest to the requested fraction.
    pub fn lookup(&self, f_mf: f64) -> Result<&CorrelationBin, GclError> {
        let index = CorrelationStructure::bin_index(f_mf)?;
        Ok(&self.bins[index])
    }
}
