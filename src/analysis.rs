//! Estimators of the quality of a population code.
//!
//! - [`sparseness`]: population sparseness and fraction of active cells per pattern
//! - [`covariance`]: total variance and concentration of the covariance spectrum
//! - [`similarity`]: SPIKE-synchronization and SPIKE-distance between spike trains
//! - [`learning`]: learnability of random labels by a single-layer classifier
//!
//! The count-based estimators work on sample matrices with one row per cell and one column per
//! pattern.
//!
//! # Examples
//!
//! ```
//! use approx::assert_relative_eq;
//! use nalgebra::DMatrix;
//! use rusty_gcl::analysis::sparseness::SparsenessProfile;
//!
//! let samples = DMatrix::from_row_slice(3, 2, &[0.0, 5.0, 2.0, 2.0, 0.0, 0.0]);
//! let profile = SparsenessProfile::from_samples(&samples);
//!
//! assert_relative_eq!(profile.activity[0], 1.0 / 3.0);
//! assert_relative_eq!(profile.sparseness[1], (3.0 - 49.0 / 29.0) / 2.0, epsilon = 1e-12);
//! ```
pub mod covariance;
pub mod learning;
pub mod similarity;
pub mod sparseness;
