//! The stages of an experiment, each reading and writing files below a base directory.
//!
//! Stages are meant to run in order (`init_params`, `run_network`, `save_samples`, then any of
//! the analyses); each one only reads what the previous ones wrote.
use nalgebra::DMatrix;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

use crate::aggregator::{SampleMatrix, SpikeAggregator};
use crate::analysis::covariance::VarianceSpectrum;
use crate::analysis::learning::LearnabilityProbe;
use crate::analysis::similarity::{group_by_prefix, AnalysisWindow, TrialSetSimilarity};
use crate::analysis::sparseness::SparsenessProfile;
use crate::config::{ExperimentConfig, ExperimentLayout};
use crate::connectivity::ConnectivityModel;
use crate::correlation::CorrelationStructure;
use crate::error::GclError;
use crate::network::{sample_file, NetworkBuilder, Population};
use crate::params::RunParameterSet;
use crate::sampler::ActivationSampler;
use crate::simulator::{SimulationDriver, SimulationEngine, SimulationReport};
use crate::spike_train::read_spike_trains;
use crate::utils::{dir_tag, fraction_label, write_table};

/// An experiment: a base directory and its configuration.
#[derive(Debug, Clone)]
pub struct Experiment {
    layout: ExperimentLayout,
    config: ExperimentConfig,
}

impl Experiment {
    pub fn new(layout: ExperimentLayout, config: ExperimentConfig) -> Result<Self, GclError> {
        config.validate()?;
        Ok(Experiment { layout, config })
    }

    /// Open the experiment of a base directory, reading its configuration file if any.
    pub fn open<P: AsRef<Path>>(base: P) -> Result<Self, GclError> {
        let layout = ExperimentLayout::new(base);
        let config = ExperimentConfig::load_or_default(&layout)?;
        Ok(Experiment { layout, config })
    }

    pub fn layout(&self) -> &ExperimentLayout {
        &self.layout
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Enumerate the design, save it, and create the work and results directories.
    pub fn init_params(&self) -> Result<RunParameterSet, GclError> {
        let design = RunParameterSet::new(
            self.config.synapse_counts.clone(),
            self.config.activation_fractions.clone(),
            self.config.num_patterns,
        )?;
        design.save_to(self.layout.params_file())?;
        log::info!(
            "{} runs saved to {}",
            design.len(),
            self.layout.params_file().display()
        );

        fs::create_dir_all(self.layout.work_dir())?;
        for (_, dir) in self.results_dirs() {
            fs::create_dir_all(&dir)?;
            log::debug!("Created {}", dir.display());
        }
        Ok(design)
    }

    pub fn load_design(&self) -> Result<RunParameterSet, GclError> {
        RunParameterSet::load_from(self.layout.params_file())
    }

    /// The connectivity of every synapse count of the design, in the order of the design.
    pub fn load_connectivities(
        &self,
        design: &RunParameterSet,
    ) -> Result<Vec<ConnectivityModel>, GclError> {
        design
            .synapse_counts()
            .iter()
            .map(|&n_syn| {
                let connectivity =
                    ConnectivityModel::load_from(self.layout.connectivity_file(n_syn))?;
                if connectivity.n_syn() != n_syn {
                    return Err(GclError::ParseError(format!(
                        "{} declares {} synapses per granule cell",
                        self.layout.connectivity_file(n_syn).display(),
                        connectivity.n_syn()
                    )));
                }
                Ok(connectivity)
            })
            .collect()
    }

    /// The correlation structure of every configured radius, `None` for radius 0.
    pub fn load_correlations(&self) -> Result<Vec<(u32, Option<CorrelationStructure>)>, GclError> {
        self.config
            .correlation_radii
            .iter()
            .map(|&radius| match radius {
                0 => Ok((radius, None)),
                _ => CorrelationStructure::load_from(self.layout.correlation_file(radius))
                    .map(|structure| (radius, Some(structure))),
            })
            .collect()
    }

    /// The results directory of every configured radius.
    pub fn results_dirs(&self) -> Vec<(u32, PathBuf)> {
        self.config
            .correlation_radii
            .iter()
            .map(|&radius| (radius, self.layout.results_dir(self.config.condition, radius)))
            .collect()
    }

    /// Build every job and run it through the engine, one (n_syn, f_mf) group at a time.
    ///
    /// Every input is loaded and checked before the first job is submitted. Job failures are
    /// collected in the report and do not stop the other jobs.
    pub fn run_network<E: SimulationEngine>(
        &self,
        engine: &E,
        driver: &SimulationDriver,
    ) -> Result<SimulationReport, GclError> {
        let design = self.load_design()?;
        let connectivities = self.load_connectivities(&design)?;
        let correlations = self.load_correlations()?;
        for (_, structure) in correlations.iter() {
            for connectivity in connectivities.iter() {
                ActivationSampler::new(connectivity.num_mf(), structure.as_ref())?;
            }
        }

        let mut report = SimulationReport::default();
        for (radius, structure) in correlations.iter() {
            let output_dir = self.layout.results_dir(self.config.condition, *radius);
            for connectivity in connectivities.iter() {
                let sampler = ActivationSampler::new(connectivity.num_mf(), structure.as_ref())?;
                let builder = NetworkBuilder::new(
                    connectivity,
                    &design,
                    sampler,
                    self.config.condition,
                    self.config.simulation.clone(),
                    &output_dir,
                )?;
                for &f_mf in design.activation_fractions() {
                    let jobs = design
                        .group(connectivity.n_syn(), f_mf)
                        .into_iter()
                        .map(|run| builder.build(run.run_id))
                        .collect::<Result<Vec<_>, GclError>>()?;
                    log::info!(
                        "Radius {}, {} synapses, f_mf {}: running {} jobs",
                        radius,
                        connectivity.n_syn(),
                        fraction_label(f_mf),
                        jobs.len()
                    );
                    report.extend(driver.run_all(engine, &jobs));
                }
            }
        }
        Ok(report)
    }

    /// Aggregate the spike files of every configuration into sample matrices.
    pub fn save_samples(&self) -> Result<(), GclError> {
        let design = self.load_design()?;
        let connectivities = self.load_connectivities(&design)?;
        let aggregator = SpikeAggregator::from_config(&self.config.simulation);

        for (_, dir) in self.existing_results_dirs() {
            for connectivity in connectivities.iter() {
                for &f_mf in design.activation_fractions() {
                    aggregator.save_configuration(
                        &dir,
                        &design,
                        connectivity.n_syn(),
                        f_mf,
                        connectivity.num_mf(),
                        connectivity.num_grc(),
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Sparseness, activity, variance and covariance tables, one row per activation fraction.
    pub fn spar_cov(&self) -> Result<(), GclError> {
        let design = self.load_design()?;
        for (_, dir) in self.existing_results_dirs() {
            for &n_syn in design.synapse_counts() {
                let mut spar_rows = Vec::new();
                let mut cov_rows = Vec::new();
                for &f_mf in design.activation_fractions() {
                    let (mf, grc) = load_samples(&dir, n_syn, f_mf)?;
                    let (spar_mf, spar_grc) = (
                        SparsenessProfile::from_samples(&mf),
                        SparsenessProfile::from_samples(&grc),
                    );
                    let (cov_mf, cov_grc) = (
                        VarianceSpectrum::from_samples(&mf)?,
                        VarianceSpectrum::from_samples(&grc)?,
                    );
                    spar_rows.push(vec![
                        spar_mf.mean_sparseness(),
                        spar_grc.mean_sparseness(),
                        spar_mf.mean_activity(),
                        spar_grc.mean_activity(),
                    ]);
                    cov_rows.push(vec![
                        cov_mf.total_variance(),
                        cov_grc.total_variance(),
                        cov_mf.concentration(),
                        cov_grc.concentration(),
                    ]);
                }

                let tag = self.table_tag(&design, &dir, n_syn);
                let spar_path = dir.join(format!("grc_spar_biophys_{}.txt", tag));
                let cov_path = dir.join(format!("grc_cov_biophys_{}.txt", tag));
                write_table(&spar_path, &spar_rows)?;
                write_table(&cov_path, &cov_rows)?;
                log::info!(
                    "Sparseness and covariance saved to {} and {}",
                    spar_path.display(),
                    cov_path.display()
                );
            }
        }
        Ok(())
    }

    /// Learnability probe of every activation fraction, fractions being processed in parallel.
    pub fn learning(&self) -> Result<(), GclError> {
        let design = self.load_design()?;
        let learning = &self.config.learning;
        for (_, dir) in self.existing_results_dirs() {
            for &n_syn in design.synapse_counts() {
                let tag = self.table_tag(&design, &dir, n_syn);
                let rows = design
                    .activation_fractions()
                    .par_iter()
                    .enumerate()
                    .map(|(i, &f_mf)| -> Result<Vec<f64>, GclError> {
                        let (mf, grc) = load_samples(&dir, n_syn, f_mf)?;
                        let seed = learning.seed.wrapping_add(i as u64);
                        let probe = LearnabilityProbe::run(&mf, &grc, learning, seed)?;
                        write_table(
                            dir.join(format!(
                                "grc_bp_biophys_{}_{}.txt",
                                fraction_label(f_mf),
                                tag
                            )),
                            &probe.curve_rows(),
                        )?;
                        let mut row = vec![f_mf];
                        row.extend(probe.summary(learning.cutoff));
                        log::info!("{} f_mf {}: {:?}", dir.display(), fraction_label(f_mf), row);
                        Ok(row)
                    })
                    .collect::<Result<Vec<Vec<f64>>, GclError>>()?;

                let path = match design.synapse_counts().len() {
                    1 => dir.join("learning_results.txt"),
                    _ => dir.join(format!("learning_results_{}.txt", n_syn)),
                };
                write_table(&path, &rows)?;
                log::info!("Learning summary saved to {}", path.display());
            }
        }
        Ok(())
    }

    /// Spike-train similarity of every file in the spike-times directory.
    ///
    /// Files are grouped by condition (name prefix before the first `_`), and the i-th file of
    /// every condition corresponds to the stimulus frequency `(i + 1) * frequency_step`. Returns
    /// the rows written to `results_all.txt`: frequency, then the matched synchronization, the
    /// reference synchronization, the matched distance and the reference distance of every
    /// condition.
    pub fn spike_analysis(&self) -> Result<Vec<Vec<f64>>, GclError> {
        let dir = self.layout.spike_times_dir();
        let entries = fs::read_dir(&dir).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => GclError::MissingInput(dir.display().to_string()),
            _ => GclError::IOError(format!("{}: {}", dir.display(), e)),
        })?;
        let mut names = Vec::new();
        for entry in entries {
            let name = entry?.file_name().to_string_lossy().to_string();
            if name.ends_with(".txt") {
                names.push(name);
            }
        }

        let groups = group_by_prefix(names);
        let num_freq = groups.first().map_or(0, |(_, files)| files.len());
        if num_freq == 0 {
            return Err(GclError::MissingInput(format!(
                "No spike-train file in {}",
                dir.display()
            )));
        }
        if let Some((condition, files)) = groups.iter().find(|(_, files)| files.len() != num_freq) {
            return Err(GclError::IncompatibleShapes(format!(
                "Condition `{}` has {} files, expected {}",
                condition,
                files.len(),
                num_freq
            )));
        }
        log::info!(
            "Conditions: {:?}",
            groups.iter().map(|(condition, _)| condition).collect::<Vec<_>>()
        );

        let (start, end) = self.config.similarity.window;
        let window = AnalysisWindow::new(start, end)?;
        let results = groups
            .par_iter()
            .map(|(_, files)| {
                files
                    .iter()
                    .map(|name| {
                        let trains = read_spike_trains(dir.join(name))?;
                        TrialSetSimilarity::from_trains(&trains, &window)
                    })
                    .collect::<Result<Vec<TrialSetSimilarity>, GclError>>()
            })
            .collect::<Result<Vec<Vec<TrialSetSimilarity>>, GclError>>()?;

        let rows: Vec<Vec<f64>> = (0..num_freq)
            .map(|i| {
                let mut row = vec![(i + 1) as f64 * self.config.similarity.frequency_step];
                row.extend(results.iter().map(|r| r[i].sync));
                row.extend(results.iter().map(|r| r[i].reference_sync));
                row.extend(results.iter().map(|r| r[i].distance));
                row.extend(results.iter().map(|r| r[i].reference_distance));
                row
            })
            .collect();

        let path = self.layout.base().join("results_all.txt");
        write_table(&path, &rows)?;
        log::info!("Similarity results saved to {}", path.display());
        Ok(rows)
    }

    fn existing_results_dirs(&self) -> Vec<(u32, PathBuf)> {
        self.results_dirs()
            .into_iter()
            .filter(|(radius, dir)| {
                let exists = dir.is_dir();
                if !exists {
                    log::warn!("No results for radius {} ({} missing)", radius, dir.display());
                }
                exists
            })
            .collect()
    }

    /// The tag of the tables of a results directory, prefixed by the synapse count when the
    /// design has several.
    fn table_tag(&self, design: &RunParameterSet, dir: &Path, n_syn: usize) -> String {
        match design.synapse_counts().len() {
            1 => dir_tag(dir),
            _ => format!("{}_{}", n_syn, dir_tag(dir)),
        }
    }
}

/// Load the MF and GC sample matrices of a configuration.
fn load_samples(
    dir: &Path,
    n_syn: usize,
    f_mf: f64,
) -> Result<(DMatrix<f64>, DMatrix<f64>), GclError> {
    let mf = SampleMatrix::load_from(sample_file(dir, Population::Mf, n_syn, f_mf))?;
    let grc = SampleMatrix::load_from(sample_file(dir, Population::Grc, n_syn, f_mf))?;
    Ok((mf.to_f64(), grc.to_f64()))
}
