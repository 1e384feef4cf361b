//! Conversion of raw spike-event files into spike-count sample matrices.
//!
//! A sample matrix holds, for one population and one (n_syn, f_mf) configuration, the number of
//! spikes of every cell (rows) for every pattern (columns) after the burn-in period.
use nalgebra::DMatrix;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::{SimulationConfig, TimeUnit};
use crate::error::GclError;
use crate::network::{sample_file, Population, SpikeFiles};
use crate::params::RunParameterSet;
use crate::spike_train::{read_spike_events, SpikeEvent};
use crate::utils::open_input;

/// Spike counts of a population, one row per cell and one column per pattern.
#[derive(Debug, PartialEq, Clone)]
pub struct SampleMatrix {
    counts: DMatrix<u32>,
}

impl SampleMatrix {
    /// A matrix of zero counts.
    pub fn zeros(num_cells: usize, num_patterns: usize) -> Self {
        SampleMatrix {
            counts: DMatrix::zeros(num_cells, num_patterns),
        }
    }

    /// Create a matrix from its rows (one per cell).
    /// Returns an error if the rows do not all have the same length.
    pub fn from_rows(rows: &[Vec<u32>]) -> Result<Self, GclError> {
        let num_patterns = rows.first().map_or(0, |row| row.len());
        if rows.iter().any(|row| row.len() != num_patterns) {
            return Err(GclError::IncompatibleShapes(
                "Every cell must have one count per pattern".to_string(),
            ));
        }
        Ok(SampleMatrix {
            counts: DMatrix::from_row_iterator(
                rows.len(),
                num_patterns,
                rows.iter().flatten().copied(),
            ),
        })
    }

    pub fn num_cells(&self) -> usize {
        self.counts.nrows()
    }

    pub fn num_patterns(&self) -> usize {
        self.counts.ncols()
    }

    pub fn get(&self, cell_id: usize, pattern_id: usize) -> Option<u32> {
        self.counts.get((cell_id, pattern_id)).copied()
    }

    /// The counts of every cell for one pattern.
    pub fn pattern(&self, pattern_id: usize) -> Vec<u32> {
        self.counts.column(pattern_id).iter().copied().collect()
    }

    /// Overwrite the counts of one pattern.
    pub fn set_pattern(&mut self, pattern_id: usize, counts: &[u32]) -> Result<(), GclError> {
        if pattern_id >= self.num_patterns() || counts.len() != self.num_cells() {
            return Err(GclError::IncompatibleShapes(format!(
                "Cannot write {} counts as pattern {} of a ({} x {}) sample matrix",
                counts.len(),
                pattern_id,
                self.num_cells(),
                self.num_patterns()
            )));
        }
        self.counts
            .column_mut(pattern_id)
            .iter_mut()
            .zip(counts)
            .for_each(|(dst, src)| *dst = *src);
        Ok(())
    }

    /// The counts as floats, for the statistical estimators.
    pub fn to_f64(&self) -> DMatrix<f64> {
        self.counts.map(|c| c as f64)
    }

    /// Load a whitespace-delimited matrix, one row per cell.
    /// Counts written as integral floats (e.g., `2.` or `2.0`) are accepted.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, GclError> {
        drop(open_input(path.as_ref())?);
        let content = fs::read_to_string(path.as_ref())?;
        let rows = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(line_num, line)| {
                line.split_whitespace()
                    .map(|token| {
                        token
                            .parse::<f64>()
                            .ok()
                            .filter(|x| *x >= 0.0 && x.fract() == 0.0 && *x <= u32::MAX as f64)
                            .map(|x| x as u32)
                            .ok_or_else(|| {
                                GclError::ParseError(format!(
                                    "{}: line {}: invalid count `{}`",
                                    path.as_ref().display(),
                                    line_num + 1,
                                    token
                                ))
                            })
                    })
                    .collect::<Result<Vec<u32>, GclError>>()
            })
            .collect::<Result<Vec<Vec<u32>>, GclError>>()?;
        SampleMatrix::from_rows(&rows)
    }

    /// Save the matrix as whitespace-delimited integers, one row per cell.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), GclError> {
        let mut writer = BufWriter::new(File::create(path)?);
        for row in self.counts.row_iter() {
            let line = row
                .iter()
                .map(|c| format!("{:2}", c))
                .collect::<Vec<String>>()
                .join(" ");
            writeln!(writer, "{}", line)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Counts spikes in the analysis period of every run.
#[derive(Debug, Clone, PartialEq)]
pub struct SpikeAggregator {
    /// Spikes before this time (ms) are ignored.
    burn_in: f64,
    /// Spikes after this time (ms) are ignored.
    duration: f64,
    time_unit: TimeUnit,
}

impl SpikeAggregator {
    pub fn new(burn_in: f64, duration: f64, time_unit: TimeUnit) -> Self {
        SpikeAggregator {
            burn_in,
            duration,
            time_unit,
        }
    }

    pub fn from_config(simulation: &SimulationConfig) -> Self {
        SpikeAggregator::new(simulation.burn_in, simulation.duration, simulation.time_unit)
    }

    /// The number of spikes of each of `num_cells` cells at or after the burn-in.
    /// Returns an error if an event refers to an unknown cell.
    pub fn count_spikes(
        &self,
        events: &[SpikeEvent],
        num_cells: usize,
    ) -> Result<Vec<u32>, GclError> {
        let mut counts = vec![0; num_cells];
        for event in events {
            let count = counts.get_mut(event.cell_id()).ok_or_else(|| {
                GclError::OutOfBounds(format!(
                    "Spike of cell {} in a population of {} cells",
                    event.cell_id(),
                    num_cells
                ))
            })?;
            if event.time() >= self.burn_in && event.time() <= self.duration {
                *count += 1;
            }
        }
        Ok(counts)
    }

    /// Build the sample matrix of a population for one configuration, reading the spike files of
    /// every pattern in `dir`. Patterns are ordered by repetition index; runs without a spike file
    /// give zero counts.
    pub fn aggregate<P: AsRef<Path>>(
        &self,
        dir: P,
        design: &RunParameterSet,
        n_syn: usize,
        f_mf: f64,
        population: Population,
        num_cells: usize,
    ) -> Result<SampleMatrix, GclError> {
        let runs = design.group(n_syn, f_mf);
        if runs.is_empty() {
            return Err(GclError::InvalidParameter(format!(
                "No run with {} synapses and activation fraction {} in the design",
                n_syn, f_mf
            )));
        }

        let mut samples = SampleMatrix::zeros(num_cells, design.num_patterns());
        for run in runs {
            let files = SpikeFiles::for_run(dir.as_ref(), run);
            let events = read_spike_events(files.get(population), self.time_unit)?;
            let counts = self.count_spikes(&events, num_cells).map_err(|e| {
                GclError::ParseError(format!("{}: {}", files.get(population).display(), e))
            })?;
            samples.set_pattern(run.run_num, &counts)?;
        }
        Ok(samples)
    }

    /// Build and save the MF and GC sample matrices of one configuration.
    pub fn save_configuration<P: AsRef<Path>>(
        &self,
        dir: P,
        design: &RunParameterSet,
        n_syn: usize,
        f_mf: f64,
        num_mf: usize,
        num_grc: usize,
    ) -> Result<(SampleMatrix, SampleMatrix), GclError> {
        let save = |population: Population, num_cells: usize| -> Result<SampleMatrix, GclError> {
            let samples = self.aggregate(dir.as_ref(), design, n_syn, f_mf, population, num_cells)?;
            let path = sample_file(dir.as_ref(), population, n_syn, f_mf);
            samples.save_to(&path)?;
            log::info!(
                "{} samples ({} x {}) saved to {}",
                population,
                samples.num_cells(),
                samples.num_patterns(),
                path.display()
            );
            Ok(samples)
        };
        Ok((save(Population::Mf, num_mf)?, save(Population::Grc, num_grc)?))
    }
}
