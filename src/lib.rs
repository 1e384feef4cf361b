//! This crate provides the experiment pipeline of mossy fiber (MF) to granule cell (GC) network
//! simulations in Rust: activation-pattern ensembles, job fan-out to an external simulation
//! engine, spike-count aggregation and population-code statistics.
//!
//! # Pipeline
//!
//! Every stage is a binary taking a single base directory:
//!
//! 1. `init_params` enumerates the experimental design into `params_file.json`.
//! 2. `run_network` samples one activation pattern per run, wires it onto the fixed connectivity
//!    and hands the job to the engine, one (synapse count, activation fraction) group at a time.
//! 3. `save_samples` counts spikes after the burn-in into sample matrices.
//! 4. `spar_cov` and `learning` estimate sparseness, covariance and learnability of the codes.
//! 5. `spike_analysis` compares spike trains with SPIKE-synchronization and SPIKE-distance.
//!
//! # Sampling Activation Patterns
//!
//! ```rust
//! use rusty_gcl::sampler::ActivationSampler;
//!
//! // Draw the pattern of a run over 100 independent MFs
//! let sampler = ActivationSampler::independent(100);
//! let pattern = sampler.sample_seeded(0.25, 42).unwrap();
//! assert_eq!(pattern.num_on(), 25);
//!
//! // The same seed always gives the same pattern
//! assert_eq!(pattern, sampler.sample_seeded(0.25, 42).unwrap());
//! ```
//!
//! # Enumerating Runs
//!
//! ```rust
//! use rusty_gcl::params::RunParameterSet;
//!
//! let design = RunParameterSet::new(vec![4], vec![0.1, 0.5, 0.9], 640).unwrap();
//! assert_eq!(design.len(), 3 * 640);
//!
//! let run = design.find(4, 0.5, 12).unwrap();
//! assert_eq!(design.get(run.run_id).unwrap(), run);
//! assert_eq!(run.file_suffix(), "4_0.50_12");
//! ```
pub mod aggregator;
pub mod analysis;
pub mod config;
pub mod connectivity;
pub mod correlation;
pub mod error;
pub mod logging;
pub mod network;
pub mod params;
pub mod pipeline;
pub mod sampler;
pub mod simulator;
pub mod spike_train;
pub mod utils;

/// Initial simulated time excluded from spike counting (ms).
pub const BURN_IN: f64 = 150.0;
/// Number of activation-fraction bins of a correlation structure.
pub const NUM_FRACTION_BINS: usize = 19;
/// Activation fraction of the first correlation bin.
pub const MIN_FRACTION_BIN: f64 = 0.05;
/// Activation fraction of the last correlation bin.
pub const MAX_FRACTION_BIN: f64 = 0.95;
