//! Assembly of the job descriptors handed to the simulation engine.
//!
//! For a run, the MFs are split into an ON and an OFF spike-generator population, and every MF is
//! wired to the granule cells it innervates through one fast (AMPA) and one slow (NMDA) synapse.
//! The output spike files of a run are named after its parameters only, so the aggregation stage
//! finds them without any bookkeeping.
//!
//! # Examples
//!
//! ```rust
//! use rusty_gcl::config::{Condition, SimulationConfig};
//! use rusty_gcl::connectivity::ConnectivityModel;
//! use rusty_gcl::network::NetworkBuilder;
//! use rusty_gcl::params::RunParameterSet;
//! use rusty_gcl::sampler::ActivationSampler;
//!
//! let conn_mat = vec![
//!     vec![true, false],
//!     vec![true, false],
//!     vec![false, true],
//!     vec![false, true],
//! ];
//! let connectivity = ConnectivityModel::build(2, conn_mat, Default::default()).unwrap();
//! let design = RunParameterSet::new(vec![2], vec![0.5], 8).unwrap();
//! let builder = NetworkBuilder::new(
//!     &connectivity,
//!     &design,
//!     ActivationSampler::independent(4),
//!     Condition::Orig,
//!     SimulationConfig::default(),
//!     "results/orig_data_r0",
//! )
//! .unwrap();
//!
//! let job = builder.build(7).unwrap();
//! assert_eq!(job.on_indices.len(), 2);
//! assert_eq!(job.connections.len(), 4 * 2);
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::{Condition, SimulationConfig};
use crate::connectivity::ConnectivityModel;
use crate::error::GclError;
use crate::params::{RunParameterSet, RunParameters};
use crate::sampler::{ActivationPattern, ActivationSampler};
use crate::utils::fraction_label;

/// The two recorded cell populations.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum Population {
    /// Mossy fibers.
    Mf,
    /// Granule cells.
    Grc,
}

impl Population {
    /// The prefix of every file produced for the population.
    pub fn prefix(&self) -> &'static str {
        match self {
            Population::Mf => "MF",
            Population::Grc => "GrC",
        }
    }
}

impl fmt::Display for Population {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// The spike-event files written by one run.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SpikeFiles {
    pub mf: PathBuf,
    pub grc: PathBuf,
}

impl SpikeFiles {
    /// The spike files of a run, e.g., `MF_spikes_4_0.50_12.dat`.
    pub fn for_run<P: AsRef<Path>>(dir: P, run: &RunParameters) -> Self {
        SpikeFiles {
            mf: spike_file(dir.as_ref(), Population::Mf, run),
            grc: spike_file(dir.as_ref(), Population::Grc, run),
        }
    }

    pub fn get(&self, population: Population) -> &Path {
        match population {
            Population::Mf => &self.mf,
            Population::Grc => &self.grc,
        }
    }
}

fn spike_file(dir: &Path, population: Population, run: &RunParameters) -> PathBuf {
    dir.join(format!("{}_spikes_{}.dat", population.prefix(), run.file_suffix()))
}

/// The sample-matrix file of a population and configuration, e.g., `GrC_samples_4_0.50.txt`.
pub fn sample_file<P: AsRef<Path>>(
    dir: P,
    population: Population,
    n_syn: usize,
    f_mf: f64,
) -> PathBuf {
    dir.as_ref().join(format!(
        "{}_samples_{}_{}.txt",
        population.prefix(),
        n_syn,
        fraction_label(f_mf)
    ))
}

/// The two conductances every MF→GC contact is made of.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum SynapseKind {
    /// Fast, AMPA receptor mediated.
    Fast,
    /// Slow, NMDA receptor mediated.
    Slow,
}

impl SynapseKind {
    pub const ALL: [SynapseKind; 2] = [SynapseKind::Fast, SynapseKind::Slow];

    /// The name of the synapse model for a condition, e.g., `MFGrC_AMPA_orig`.
    pub fn model_name(&self, condition: Condition) -> String {
        match self {
            SynapseKind::Fast => format!("MFGrC_AMPA_{}", condition),
            SynapseKind::Slow => format!("MFGrC_NMDA_{}", condition),
        }
    }
}

/// The spike-generator population an MF belongs to during a run.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum MfState {
    On,
    Off,
}

/// A synapse from an MF spike generator onto a granule cell.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SynapticConnection {
    /// The generator population of the MF.
    pub state: MfState,
    /// The index of the MF within its generator population.
    pub source_id: usize,
    /// The global index of the MF.
    pub mf_id: usize,
    /// The target granule cell.
    pub grc_id: usize,
    pub kind: SynapseKind,
}

/// Firing statistics of the MF spike generators.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Stimulus {
    /// Firing rate of ON MFs (Hz).
    pub on_rate: f64,
    /// Firing rate of OFF MFs (Hz).
    pub off_rate: f64,
    /// Minimum inter-spike interval (ms).
    pub min_isi: f64,
}

/// Everything the simulation engine needs to run one pattern.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub run: RunParameters,
    /// MF correlation radius the pattern was drawn with.
    pub radius: u32,
    pub condition: Condition,
    /// Name of the granule cell model, e.g., `IaF_GrC_orig`.
    pub grc_model: String,
    pub num_grc: usize,
    /// Global indices of the ON MFs, in increasing order.
    /// The i-th ON generator stands for MF `on_indices[i]`.
    pub on_indices: Vec<usize>,
    /// Global indices of the OFF MFs, in increasing order.
    pub off_indices: Vec<usize>,
    pub connections: Vec<SynapticConnection>,
    pub stimulus: Stimulus,
    /// Total simulated time (ms).
    pub duration: f64,
    /// Integration time step (ms).
    pub dt: f64,
    pub output: SpikeFiles,
}

impl JobDescriptor {
    pub fn run_id(&self) -> usize {
        self.run.run_id
    }

    /// The number of MFs, ON and OFF.
    pub fn num_mf(&self) -> usize {
        self.on_indices.len() + self.off_indices.len()
    }
}

/// Builds the job descriptors of every run sharing a connectivity matrix.
#[derive(Debug, Clone)]
pub struct NetworkBuilder<'a> {
    connectivity: &'a ConnectivityModel,
    design: &'a RunParameterSet,
    sampler: ActivationSampler<'a>,
    condition: Condition,
    simulation: SimulationConfig,
    output_dir: PathBuf,
}

impl<'a> NetworkBuilder<'a> {
    /// Returns an error if the sampler and the connectivity disagree on the number of MFs.
    pub fn new<P: AsRef<Path>>(
        connectivity: &'a ConnectivityModel,
        design: &'a RunParameterSet,
        sampler: ActivationSampler<'a>,
        condition: Condition,
        simulation: SimulationConfig,
        output_dir: P,
    ) -> Result<Self, GclError> {
        if sampler.num_mf() != connectivity.num_mf() {
            return Err(GclError::IncompatibleShapes(format!(
                "The sampler draws patterns over {} MFs, but the network has {}",
                sampler.num_mf(),
                connectivity.num_mf()
            )));
        }
        Ok(NetworkBuilder {
            connectivity,
            design,
            sampler,
            condition,
            simulation,
            output_dir: output_dir.as_ref().to_path_buf(),
        })
    }

    /// The runs this builder can assemble, i.e., those with a matching synapse count.
    pub fn runs(&self) -> impl Iterator<Item = &'a RunParameters> + '_ {
        let n_syn = self.connectivity.n_syn();
        self.design.iter().filter(move |run| run.n_syn == n_syn)
    }

    /// Sample the activation pattern of a run and assemble its job descriptor.
    pub fn build(&self, run_id: usize) -> Result<JobDescriptor, GclError> {
        let run = self.design.get(run_id)?;
        let pattern = self.sampler.sample_seeded(run.f_mf, run.seed())?;
        self.assemble(run, &pattern)
    }

    /// Assemble the job descriptor of a run for a given activation pattern.
    pub fn assemble(
        &self,
        run: &RunParameters,
        pattern: &ActivationPattern,
    ) -> Result<JobDescriptor, GclError> {
        if run.n_syn != self.connectivity.n_syn() {
            return Err(GclError::InvalidParameter(format!(
                "Run {} needs {} synapses per granule cell, but the network has {}",
                run.run_id,
                run.n_syn,
                self.connectivity.n_syn()
            )));
        }
        if pattern.len() != self.connectivity.num_mf() {
            return Err(GclError::IncompatibleShapes(format!(
                "The pattern covers {} MFs, but the network has {}",
                pattern.len(),
                self.connectivity.num_mf()
            )));
        }

        let on_indices = pattern.on_indices();
        let off_indices = pattern.off_indices();

        let mut connections =
            Vec::with_capacity(SynapseKind::ALL.len() * self.connectivity.num_contacts());
        for (state, indices) in [(MfState::On, &on_indices), (MfState::Off, &off_indices)] {
            for (source_id, &mf_id) in indices.iter().enumerate() {
                for &grc_id in self.connectivity.targets(mf_id) {
                    for kind in SynapseKind::ALL {
                        connections.push(SynapticConnection {
                            state,
                            source_id,
                            mf_id,
                            grc_id,
                            kind,
                        });
                    }
                }
            }
        }

        log::debug!(
            "Run {} ({}): {} ON MFs, {} OFF MFs, {} synapses",
            run.run_id,
            run.file_suffix(),
            on_indices.len(),
            off_indices.len(),
            connections.len()
        );

        Ok(JobDescriptor {
            run: *run,
            radius: self.sampler.radius(),
            condition: self.condition,
            grc_model: format!("IaF_GrC_{}", self.condition),
            num_grc: self.connectivity.num_grc(),
            on_indices,
            off_indices,
            connections,
            stimulus: Stimulus {
                on_rate: self.simulation.on_rate,
                off_rate: self.simulation.off_rate,
                min_isi: self.simulation.min_isi,
            },
            duration: self.simulation.duration,
            dt: self.simulation.dt,
            output: SpikeFiles::for_run(&self.output_dir, run),
        })
    }
}
