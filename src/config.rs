//! Experiment configuration and base-directory layout.
//!
//! Every stage takes a single base directory. An optional `experiment.json` in that directory
//! overrides the defaults below, which reproduce the reference experiment.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::connectivity::ConnectivityModel;
use crate::correlation::CorrelationStructure;
use crate::error::GclError;
use crate::params::RunParameterSet;
use crate::utils::{linspace, load_json, save_json};
use crate::{BURN_IN, MAX_FRACTION_BIN, MIN_FRACTION_BIN, NUM_FRACTION_BINS};

/// The model variant to simulate.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    /// The original model.
    #[default]
    Orig,
    /// The knock-out model with altered synaptic and cellular parameters.
    Ko,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Condition::Orig => write!(f, "orig"),
            Condition::Ko => write!(f, "ko"),
        }
    }
}

/// The unit of the timestamps written by the simulation engine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    #[default]
    #[serde(rename = "ms")]
    Milliseconds,
    #[serde(rename = "s")]
    Seconds,
}

impl TimeUnit {
    /// Convert a timestamp in this unit to milliseconds.
    pub fn to_ms(&self, time: f64) -> f64 {
        match self {
            TimeUnit::Milliseconds => time,
            TimeUnit::Seconds => time * 1000.0,
        }
    }
}

/// Timing and stimulus of every simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Total simulated time (ms).
    pub duration: f64,
    /// Integration time step (ms).
    pub dt: f64,
    /// Minimum inter-spike interval of the MF spike generators (ms).
    pub min_isi: f64,
    /// Firing rate of ON MFs (Hz).
    pub on_rate: f64,
    /// Firing rate of OFF MFs (Hz).
    pub off_rate: f64,
    /// Initial time excluded from spike counting (ms).
    pub burn_in: f64,
    /// The unit of the timestamps in spike-event files.
    pub time_unit: TimeUnit,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            duration: 180.0,
            dt: 0.05,
            min_isi: 2.0,
            on_rate: 50.0,
            off_rate: 0.0,
            burn_in: BURN_IN,
            time_unit: TimeUnit::Milliseconds,
        }
    }
}

/// Parameters of the learnability probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    pub num_epochs: usize,
    pub learning_rate: f64,
    pub num_classes: usize,
    /// RMS error level defining the learning speed.
    pub cutoff: f64,
    pub seed: u64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        LearningConfig {
            num_epochs: 5000,
            learning_rate: 0.01,
            num_classes: 10,
            cutoff: 0.2,
            seed: 0,
        }
    }
}

/// Parameters of the spike-train similarity analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Analysis window (ms); spikes outside are ignored.
    pub window: (f64, f64),
    /// Stimulus frequency increment between consecutive files of a condition (Hz).
    pub frequency_step: f64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        SimilarityConfig {
            window: (100.0, 1100.0),
            frequency_step: 50.0,
        }
    }
}

/// The whole experiment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub synapse_counts: Vec<usize>,
    pub activation_fractions: Vec<f64>,
    /// Number of patterns per (synapse count, activation fraction) configuration.
    pub num_patterns: usize,
    /// MF correlation radii to simulate, 0 being independent activation.
    pub correlation_radii: Vec<u32>,
    pub condition: Condition,
    pub simulation: SimulationConfig,
    /// Program (and leading arguments) invoked with the path of each job descriptor.
    /// Without a command, job descriptors are only written.
    pub engine_command: Option<Vec<String>>,
    pub learning: LearningConfig,
    pub similarity: SimilarityConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        ExperimentConfig {
            synapse_counts: vec![4],
            activation_fractions: linspace(MIN_FRACTION_BIN, MAX_FRACTION_BIN, NUM_FRACTION_BINS),
            num_patterns: 640,
            correlation_radii: vec![0, 5, 10, 15, 20, 25, 30],
            condition: Condition::Orig,
            simulation: SimulationConfig::default(),
            engine_command: None,
            learning: LearningConfig::default(),
            similarity: SimilarityConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Load the configuration of a base directory, falling back to defaults without a config file.
    pub fn load_or_default(layout: &ExperimentLayout) -> Result<Self, GclError> {
        let path = layout.config_file();
        let config = if path.exists() {
            log::info!("Loading configuration from {}", path.display());
            load_json(&path)?
        } else {
            log::info!("No configuration file in {}, using defaults", layout.base().display());
            ExperimentConfig::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), GclError> {
        save_json(self, path)
    }

    /// Check the consistency of the configuration.
    pub fn validate(&self) -> Result<(), GclError> {
        let sim = &self.simulation;
        if !(sim.duration > 0.0 && sim.dt > 0.0 && sim.dt <= sim.duration) {
            return Err(GclError::InvalidParameter(format!(
                "Invalid simulation timing: duration {} ms, time step {} ms",
                sim.duration, sim.dt
            )));
        }
        if !(0.0..sim.duration).contains(&sim.burn_in) {
            return Err(GclError::InvalidParameter(format!(
                "The burn-in ({} ms) must be in [0, duration)",
                sim.burn_in
            )));
        }
        if sim.on_rate < 0.0 || sim.off_rate < 0.0 || sim.min_isi < 0.0 {
            return Err(GclError::InvalidParameter(
                "Firing rates and minimum ISI must be non-negative".to_string(),
            ));
        }
        if self.learning.num_classes == 0 || self.learning.num_epochs == 0 {
            return Err(GclError::InvalidParameter(
                "The learnability probe needs at least one class and one epoch".to_string(),
            ));
        }
        let (start, end) = self.similarity.window;
        if !(start < end) {
            return Err(GclError::InvalidParameter(format!(
                "Invalid similarity window ({}, {})",
                start, end
            )));
        }
        if matches!(&self.engine_command, Some(command) if command.is_empty()) {
            return Err(GclError::InvalidParameter(
                "The engine command must name a program".to_string(),
            ));
        }
        Ok(())
    }
}

/// The file layout below a base directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentLayout {
    base: PathBuf,
}

impl ExperimentLayout {
    pub fn new<P: AsRef<Path>>(base: P) -> Self {
        ExperimentLayout {
            base: base.as_ref().to_path_buf(),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("experiment.json")
    }

    pub fn params_file(&self) -> PathBuf {
        RunParameterSet::path_in(&self.base)
    }

    pub fn connectivity_file(&self, n_syn: usize) -> PathBuf {
        ConnectivityModel::path_for(self.network_structures_dir(), n_syn)
    }

    pub fn correlation_file(&self, radius: u32) -> PathBuf {
        CorrelationStructure::path_for(self.input_statistics_dir(), radius)
    }

    /// Directory holding one connectivity file per synapse count.
    pub fn network_structures_dir(&self) -> PathBuf {
        self.base.join("network_structures")
    }

    /// Directory holding one correlation file per radius.
    pub fn input_statistics_dir(&self) -> PathBuf {
        self.base.join("input_statistics")
    }

    /// Directory where job descriptors are handed to the engine.
    pub fn work_dir(&self) -> PathBuf {
        self.base.join("tempdata")
    }

    /// Directory of spike files, samples and result tables for a condition and radius.
    pub fn results_dir(&self, condition: Condition, radius: u32) -> PathBuf {
        self.base
            .join("results")
            .join(format!("{}_data_r{}", condition, radius))
    }

    /// Directory of spike-train files for the similarity analysis.
    pub fn spike_times_dir(&self) -> PathBuf {
        self.base.join("SpikeTimes")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.base.join("log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ExperimentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.activation_fractions.len(), NUM_FRACTION_BINS);
        assert_eq!(config.correlation_radii.len(), 7);
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ExperimentLayout::new(dir.path());
        std::fs::write(
            layout.config_file(),
            r#"{"num_patterns": 8, "condition": "ko", "simulation": {"time_unit": "s"}}"#,
        )
        .unwrap();

        let config = ExperimentConfig::load_or_default(&layout).unwrap();
        assert_eq!(config.num_patterns, 8);
        assert_eq!(config.condition, Condition::Ko);
        assert_eq!(config.simulation.time_unit, TimeUnit::Seconds);
        assert_eq!(config.simulation.duration, 180.0);
        assert_eq!(config.synapse_counts, vec![4]);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ExperimentLayout::new(dir.path());
        assert_eq!(
            ExperimentConfig::load_or_default(&layout).unwrap(),
            ExperimentConfig::default()
        );
    }

    #[test]
    fn test_invalid() {
        let mut config = ExperimentConfig::default();
        config.simulation.burn_in = 200.0;
        assert!(config.validate().is_err());

        let mut config = ExperimentConfig::default();
        config.engine_command = Some(vec![]);
        assert!(config.validate().is_err());

        let mut config = ExperimentConfig::default();
        config.similarity.window = (10.0, 10.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_layout() {
        let layout = ExperimentLayout::new("/data");
        assert_eq!(
            layout.results_dir(Condition::Ko, 20),
            PathBuf::from("/data/results/ko_data_r20")
        );
        assert_eq!(layout.params_file(), PathBuf::from("/data/params_file.json"));
        assert_eq!(
            layout.connectivity_file(4),
            PathBuf::from("/data/network_structures/GCLconnectivity_4.json")
        );
        assert_eq!(
            layout.correlation_file(10),
            PathBuf::from("/data/input_statistics/mf_patterns_r10.json")
        );
        assert_eq!(TimeUnit::Seconds.to_ms(0.5), 500.0);
        assert_eq!(TimeUnit::Milliseconds.to_ms(0.5), 0.5);
    }
}
