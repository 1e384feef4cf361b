//! Factorial experiment design: synapse count x activation fraction x repetition.
//!
//! Each run gets a unique ID equal to its position in the enumeration (synapse count outermost,
//! repetition innermost). The run ID doubles as the seed of the run, and every later stage resolves
//! run IDs through the persisted parameter file, so the mapping never changes once written.
//!
//! # Examples
//!
//! ```rust
//! use rusty_gcl::params::RunParameterSet;
//!
//! let design = RunParameterSet::new(vec![4], vec![0.1, 0.5, 0.9], 64).unwrap();
//! assert_eq!(design.len(), 3 * 64);
//!
//! let run = design.get(70).unwrap();
//! assert_eq!((run.n_syn, run.run_num), (4, 6));
//! assert_eq!(design.find(4, 0.5, 6).unwrap().run_id, 70);
//! ```
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::GclError;
use crate::utils::{fraction_label, load_json, save_json};

/// Tolerance for two activation fractions to be considered equal.
const FRACTION_TOLERANCE: f64 = 1e-9;

/// The semantic parameters of one run.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct RunParameters {
    /// The unique ID of the run, equal to its position in the design.
    pub run_id: usize,
    /// The number of synapses per granule cell.
    pub n_syn: usize,
    /// The target fraction of active MFs.
    pub f_mf: f64,
    /// The repetition index within the (n_syn, f_mf) configuration, i.e., the pattern index.
    pub run_num: usize,
}

impl RunParameters {
    /// The seed of the run generator.
    pub fn seed(&self) -> u64 {
        self.run_id as u64
    }

    /// The suffix shared by every file produced by the run, e.g., `4_0.50_12`.
    pub fn file_suffix(&self) -> String {
        format!("{}_{}_{}", self.n_syn, fraction_label(self.f_mf), self.run_num)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RunParameterRecord {
    synapse_counts: Vec<usize>,
    activation_fractions: Vec<f64>,
    num_patterns: usize,
    runs: Vec<RunParameters>,
}

/// The full, immutable enumeration of runs of an experiment.
#[derive(Debug, PartialEq, Clone)]
pub struct RunParameterSet {
    synapse_counts: Vec<usize>,
    activation_fractions: Vec<f64>,
    num_patterns: usize,
    runs: Vec<RunParameters>,
}

impl RunParameterSet {
    /// Enumerate the design.
    /// Returns an error if an axis is empty, contains duplicates, or if a fraction is outside [0, 1].
    pub fn new(
        synapse_counts: Vec<usize>,
        activation_fractions: Vec<f64>,
        num_patterns: usize,
    ) -> Result<Self, GclError> {
        if synapse_counts.is_empty() || activation_fractions.is_empty() || num_patterns == 0 {
            return Err(GclError::InvalidParameter(
                "Every axis of the design must be non-empty".to_string(),
            ));
        }
        if let Some(f_mf) = activation_fractions
            .iter()
            .find(|f| !(0.0..=1.0).contains(*f))
        {
            return Err(GclError::InvalidParameter(format!(
                "The activation fraction must be in [0, 1], got {}",
                f_mf
            )));
        }
        for (i, n_syn) in synapse_counts.iter().enumerate() {
            if synapse_counts[..i].contains(n_syn) {
                return Err(GclError::InvalidParameter(format!(
                    "Duplicated synapse count {}",
                    n_syn
                )));
            }
        }
        // File names only keep two decimals, so two fractions must not share a label.
        for (i, f_mf) in activation_fractions.iter().enumerate() {
            if activation_fractions[..i]
                .iter()
                .any(|other| fraction_label(*other) == fraction_label(*f_mf))
            {
                return Err(GclError::InvalidParameter(format!(
                    "Duplicated activation fraction {}",
                    fraction_label(*f_mf)
                )));
            }
        }

        let mut runs =
            Vec::with_capacity(synapse_counts.len() * activation_fractions.len() * num_patterns);
        for &n_syn in synapse_counts.iter() {
            for &f_mf in activation_fractions.iter() {
                for run_num in 0..num_patterns {
                    runs.push(RunParameters {
                        run_id: runs.len(),
                        n_syn,
                        f_mf,
                        run_num,
                    });
                }
            }
        }

        Ok(RunParameterSet {
            synapse_counts,
            activation_fractions,
            num_patterns,
            runs,
        })
    }

    /// The conventional location of the parameter file in a base directory.
    pub fn path_in<P: AsRef<Path>>(dir: P) -> PathBuf {
        dir.as_ref().join("params_file.json")
    }

    /// Load a parameter file.
    /// Returns an error if the stored runs do not match the enumeration of the stored axes.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, GclError> {
        let record: RunParameterRecord = load_json(path.as_ref())?;
        let design = RunParameterSet::new(
            record.synapse_counts,
            record.activation_fractions,
            record.num_patterns,
        )?;
        if design.runs != record.runs {
            return Err(GclError::ParseError(format!(
                "The runs stored in {} do not match the enumeration of the design",
                path.as_ref().display()
            )));
        }
        log::info!(
            "Run parameters loaded from {}: {} runs",
            path.as_ref().display(),
            design.len()
        );
        Ok(design)
    }

    /// Save the design, runs included, to a JSON file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), GclError> {
        let record = RunParameterRecord {
            synapse_counts: self.synapse_counts.clone(),
            activation_fractions: self.activation_fractions.clone(),
            num_patterns: self.num_patterns,
            runs: self.runs.clone(),
        };
        save_json(&record, path)
    }

    /// The total number of runs.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn synapse_counts(&self) -> &[usize] {
        &self.synapse_counts
    }

    pub fn activation_fractions(&self) -> &[f64] {
        &self.activation_fractions
    }

    /// The number of patterns (repetitions) per (n_syn, f_mf) configuration.
    pub fn num_patterns(&self) -> usize {
        self.num_patterns
    }

    /// Resolve a run ID into its parameters.
    pub fn get(&self, run_id: usize) -> Result<&RunParameters, GclError> {
        self.runs.get(run_id).ok_or_else(|| {
            GclError::OutOfBounds(format!(
                "Run {} does not exist in a design of {} runs",
                run_id,
                self.runs.len()
            ))
        })
    }

    /// The run with the given semantic parameters, if any.
    pub fn find(&self, n_syn: usize, f_mf: f64, run_num: usize) -> Option<&RunParameters> {
        let i = self.synapse_counts.iter().position(|&n| n == n_syn)?;
        let j = self
            .activation_fractions
            .iter()
            .position(|f| (f - f_mf).abs() < FRACTION_TOLERANCE)?;
        if run_num >= self.num_patterns {
            return None;
        }
        let run_id = (i * self.activation_fractions.len() + j) * self.num_patterns + run_num;
        self.runs.get(run_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RunParameters> + '_ {
        self.runs.iter()
    }

    /// Every (n_syn, f_mf) configuration, in enumeration order.
    pub fn configurations(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.synapse_counts.iter().flat_map(move |&n_syn| {
            self.activation_fractions
                .iter()
                .map(move |&f_mf| (n_syn, f_mf))
        })
    }

    /// The runs of one configuration, ordered by repetition index.
    pub fn group(&self, n_syn: usize, f_mf: f64) -> Vec<&RunParameters> {
        (0..self.num_patterns)
            .filter_map(|run_num| self.find(n_syn, f_mf, run_num))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_invalid() {
        assert!(RunParameterSet::new(vec![], vec![0.5], 2).is_err());
        assert!(RunParameterSet::new(vec![4], vec![], 2).is_err());
        assert!(RunParameterSet::new(vec![4], vec![0.5], 0).is_err());
        assert!(RunParameterSet::new(vec![4], vec![1.5], 2).is_err());
        assert!(RunParameterSet::new(vec![4, 4], vec![0.5], 2).is_err());
        assert!(RunParameterSet::new(vec![4], vec![0.5, 0.501], 2).is_err());
    }

    #[test]
    fn test_enumeration_order() {
        let design = RunParameterSet::new(vec![2, 4], vec![0.1, 0.5, 0.9], 3).unwrap();
        assert_eq!(design.len(), 18);

        let triples: Vec<(usize, String, usize)> = design
            .iter()
            .map(|run| (run.n_syn, fraction_label(run.f_mf), run.run_num))
            .collect();
        assert_eq!(triples[0], (2, "0.10".to_string(), 0));
        assert_eq!(triples[2], (2, "0.10".to_string(), 2));
        assert_eq!(triples[3], (2, "0.50".to_string(), 0));
        assert_eq!(triples[9], (4, "0.10".to_string(), 0));
        assert_eq!(triples[17], (4, "0.90".to_string(), 2));

        for (position, run) in design.iter().enumerate() {
            assert_eq!(run.run_id, position);
            assert_eq!(run.seed(), position as u64);
        }
    }

    #[test]
    fn test_mapping_invertible() {
        let design = RunParameterSet::new(vec![1, 4, 8], vec![0.05, 0.3, 0.95], 7).unwrap();
        for run in design.iter() {
            assert_eq!(design.get(run.run_id).unwrap(), run);
            assert_eq!(design.find(run.n_syn, run.f_mf, run.run_num).unwrap(), run);
        }
        assert!(design.get(design.len()).is_err());
        assert!(design.find(3, 0.3, 0).is_none());
        assert!(design.find(4, 0.4, 0).is_none());
        assert!(design.find(4, 0.3, 7).is_none());
    }

    #[test]
    fn test_groups() {
        let design = RunParameterSet::new(vec![4], vec![0.1, 0.9], 5).unwrap();
        let configurations: Vec<(usize, f64)> = design.configurations().collect();
        assert_eq!(configurations, vec![(4, 0.1), (4, 0.9)]);

        let group = design.group(4, 0.9);
        assert_eq!(group.len(), 5);
        assert!(group
            .iter()
            .enumerate()
            .all(|(run_num, run)| run.run_num == run_num && run.run_id == 5 + run_num));
    }

    #[test]
    fn test_file_suffix() {
        let run = RunParameters {
            run_id: 12,
            n_syn: 4,
            f_mf: 0.5,
            run_num: 12,
        };
        assert_eq!(run.file_suffix(), "4_0.50_12");
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = RunParameterSet::path_in(dir.path());
        let design = RunParameterSet::new(vec![4], vec![0.1, 0.2, 0.3], 4).unwrap();
        design.save_to(&path).unwrap();
        assert_eq!(RunParameterSet::load_from(&path).unwrap(), design);
    }

    #[test]
    fn test_load_rejects_tampered_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = RunParameterSet::path_in(dir.path());
        let json = r#"{
            "synapse_counts": [4],
            "activation_fractions": [0.5],
            "num_patterns": 2,
            "runs": [
                {"run_id": 0, "n_syn": 4, "f_mf": 0.5, "run_num": 1},
                {"run_id": 1, "n_syn": 4, "f_mf": 0.5, "run_num": 0}
            ]
        }"#;
        std::fs::write(&path, json).unwrap();
        assert!(matches!(
            RunParameterSet::load_from(&path),
            Err(GclError::ParseError(_))
        ));
    }
}
