//! Fan-out of independent simulation jobs over a worker pool.
//!
//! The biophysical simulation itself is delegated to an external engine behind the
//! [`SimulationEngine`] trait. Jobs share nothing mutable and write to distinct files, so they run
//! in any order. A failing job is recorded in the [`SimulationReport`] and never stops the others.
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::GclError;
use crate::network::JobDescriptor;
use crate::utils::save_json;

/// Maximum number of characters of the engine error output kept in a failure report.
const MAX_STDERR_CHARS: usize = 2000;

/// An external simulator producing the spike files of a job.
pub trait SimulationEngine: Sync {
    /// Simulate the job, writing exactly its two spike-event files.
    fn run(&self, job: &JobDescriptor) -> Result<(), GclError>;
}

/// Engine adapter writing each job descriptor as JSON and invoking an external command on it.
///
/// Without a command, only the descriptors are written, e.g., to be run later on a cluster.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    work_dir: PathBuf,
    command: Option<Vec<String>>,
}

impl CommandEngine {
    pub fn new<P: AsRef<Path>>(work_dir: P, command: Option<Vec<String>>) -> Self {
        CommandEngine {
            work_dir: work_dir.as_ref().to_path_buf(),
            command,
        }
    }

    /// The descriptor file of a job.
    pub fn descriptor_path(&self, job: &JobDescriptor) -> PathBuf {
        self.work_dir.join(format!(
            "job_{}_r{}_{}.json",
            job.condition,
            job.radius,
            job.run_id()
        ))
    }
}

impl SimulationEngine for CommandEngine {
    fn run(&self, job: &JobDescriptor) -> Result<(), GclError> {
        let descriptor = self.descriptor_path(job);
        save_json(job, &descriptor)?;
        for file in [&job.output.mf, &job.output.grc] {
            if let Some(dir) = file.parent() {
                std::fs::create_dir_all(dir)?;
            }
        }

        let Some((program, args)) = self.command.as_ref().and_then(|c| c.split_first()) else {
            log::trace!("Job {} written to {}", job.run_id(), descriptor.display());
            return Ok(());
        };

        let output = Command::new(program)
            .args(args)
            .arg(&descriptor)
            .output()
            .map_err(|e| GclError::JobFailed {
                run_id: job.run_id(),
                reason: format!("cannot start `{}`: {}", program, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .chars()
                .rev()
                .take(MAX_STDERR_CHARS)
                .collect::<Vec<char>>()
                .into_iter()
                .rev()
                .collect();
            return Err(GclError::JobFailed {
                run_id: job.run_id(),
                reason: format!("`{}` exited with {}: {}", program, output.status, tail.trim()),
            });
        }
        Ok(())
    }
}

/// A job that did not produce its spike files.
#[derive(Debug, PartialEq)]
pub struct JobFailure {
    pub run_id: usize,
    /// The directory the job writes its spike files to, which tells radius and condition apart.
    pub output_dir: PathBuf,
    pub error: GclError,
}

impl JobFailure {
    fn new(job: &JobDescriptor, error: GclError) -> Self {
        JobFailure {
            run_id: job.run_id(),
            output_dir: job.output.mf.parent().map(Path::to_path_buf).unwrap_or_default(),
            error,
        }
    }
}

/// The outcome of a batch of jobs.
#[derive(Debug, Default, PartialEq)]
pub struct SimulationReport {
    /// IDs of the runs that completed, in increasing order.
    pub completed: Vec<usize>,
    /// The failed jobs, ordered by output directory then run ID.
    pub failed: Vec<JobFailure>,
}

impl SimulationReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn num_jobs(&self) -> usize {
        self.completed.len() + self.failed.len()
    }

    /// Merge the outcome of another batch.
    pub fn extend(&mut self, other: SimulationReport) {
        self.completed.extend(other.completed);
        self.failed.extend(other.failed);
        self.completed.sort_unstable();
        self.sort_failures();
    }

    fn sort_failures(&mut self) {
        self.failed.sort_by(|a, b| {
            a.output_dir
                .cmp(&b.output_dir)
                .then(a.run_id.cmp(&b.run_id))
        });
    }
}

/// Runs jobs on a fixed-size pool of worker threads.
pub struct SimulationDriver {
    pool: ThreadPool,
}

impl SimulationDriver {
    /// Create a driver with the given number of workers, or one per available core.
    pub fn new(num_threads: Option<usize>) -> Result<Self, GclError> {
        let num_threads = match num_threads {
            Some(n) => n,
            None => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        };
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("gcl-worker-{}", i))
            .build()
            .map_err(|e| GclError::InvalidParameter(format!("Cannot build worker pool: {}", e)))?;
        log::info!("Simulation driver started with {} workers", pool.current_num_threads());
        Ok(SimulationDriver { pool })
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run every job through the engine and report per-job outcomes.
    pub fn run_all<E: SimulationEngine>(
        &self,
        engine: &E,
        jobs: &[JobDescriptor],
    ) -> SimulationReport {
        let outcomes: Vec<Result<(), GclError>> = self
            .pool
            .install(|| jobs.par_iter().map(|job| run_isolated(engine, job)).collect());

        let mut report = SimulationReport::default();
        for (job, outcome) in jobs.iter().zip(outcomes) {
            match outcome {
                Ok(()) => report.completed.push(job.run_id()),
                Err(e) => {
                    let failure = JobFailure::new(job, e);
                    log::warn!("{} (in {})", failure.error, failure.output_dir.display());
                    report.failed.push(failure);
                }
            }
        }
        report.completed.sort_unstable();
        report.sort_failures();
        log::info!(
            "{} jobs done: {} completed, {} failed",
            report.num_jobs(),
            report.completed.len(),
            report.failed.len()
        );
        report
    }
}

/// Run one job, turning a panic of the engine into a failure of that job only.
fn run_isolated<E: SimulationEngine>(engine: &E, job: &JobDescriptor) -> Result<(), GclError> {
    log::debug!("Starting job {}", job.run_id());
    panic::catch_unwind(AssertUnwindSafe(|| engine.run(job))).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "engine panicked".to_string());
        Err(GclError::JobFailed {
            run_id: job.run_id(),
            reason,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Condition, SimulationConfig};
    use crate::connectivity::{ConnectivityModel, SpatialPositions};
    use crate::network::NetworkBuilder;
    use crate::params::RunParameterSet;
    use crate::sampler::ActivationSampler;
    use crate::spike_train::{write_spike_events, SpikeEvent};

    /// Fails every job with an odd run ID, panics on run 4, writes spike files otherwise.
    struct FlakyEngine;

    impl SimulationEngine for FlakyEngine {
        fn run(&self, job: &JobDescriptor) -> Result<(), GclError> {
            if job.run_id() == 4 {
                panic!("engine crashed");
            }
            if job.run_id() % 2 == 1 {
                return Err(GclError::JobFailed {
                    run_id: job.run_id(),
                    reason: "timeout".to_string(),
                });
            }
            let events: Vec<SpikeEvent> = job
                .on_indices
                .iter()
                .map(|&mf_id| SpikeEvent::new(mf_id, 160.0))
                .collect();
            write_spike_events(&job.output.mf, &events)?;
            write_spike_events(&job.output.grc, &[])
        }
    }

    fn jobs(dir: &Path, num_patterns: usize) -> Vec<JobDescriptor> {
        let conn_mat = (0..6)
            .map(|mf_id| (0..3).map(|grc_id| mf_id / 2 == grc_id).collect())
            .collect();
        let connectivity =
            ConnectivityModel::build(2, conn_mat, SpatialPositions::default()).unwrap();
        let design = RunParameterSet::new(vec![2], vec![0.5], num_patterns).unwrap();
        let builder = NetworkBuilder::new(
            &connectivity,
            &design,
            ActivationSampler::independent(6),
            Condition::Orig,
            SimulationConfig::default(),
            dir,
        )
        .unwrap();
        design
            .iter()
            .map(|run| builder.build(run.run_id).unwrap())
            .collect()
    }

    #[test]
    fn test_failures_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = jobs(dir.path(), 8);
        let driver = SimulationDriver::new(Some(3)).unwrap();
        assert_eq!(driver.num_threads(), 3);

        let report = driver.run_all(&FlakyEngine, &jobs);
        assert!(!report.is_success());
        assert_eq!(report.num_jobs(), 8);
        assert_eq!(report.completed, vec![0, 2, 6]);
        assert_eq!(
            report.failed.iter().map(|f| f.run_id).collect::<Vec<usize>>(),
            vec![1, 3, 4, 5, 7]
        );
        assert!(report.failed.iter().all(|f| f.output_dir == dir.path()));
        assert_eq!(
            report.failed[2].error,
            GclError::JobFailed {
                run_id: 4,
                reason: "engine crashed".to_string()
            }
        );

        for &run_id in report.completed.iter() {
            assert!(jobs[run_id].output.mf.exists());
            assert!(jobs[run_id].output.grc.exists());
        }
    }

    #[test]
    fn test_report_extend() {
        let mut report = SimulationReport {
            completed: vec![4],
            failed: vec![],
        };
        report.extend(SimulationReport {
            completed: vec![1],
            failed: vec![JobFailure {
                run_id: 3,
                output_dir: PathBuf::from("results/orig_data_r5"),
                error: GclError::IOError("disk full".to_string()),
            }],
        });
        report.extend(SimulationReport {
            completed: vec![],
            failed: vec![JobFailure {
                run_id: 3,
                output_dir: PathBuf::from("results/orig_data_r0"),
                error: GclError::IOError("disk full".to_string()),
            }],
        });
        assert_eq!(report.completed, vec![1, 4]);
        assert_eq!(report.num_jobs(), 4);
        assert_eq!(report.failed[0].output_dir, PathBuf::from("results/orig_data_r0"));
    }

    #[test]
    fn test_command_engine_without_command() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = jobs(&dir.path().join("results"), 2);
        let engine = CommandEngine::new(dir.path().join("tempdata"), None);

        let report = SimulationDriver::new(Some(2)).unwrap().run_all(&engine, &jobs);
        assert!(report.is_success());

        let descriptor = engine.descriptor_path(&jobs[1]);
        assert!(descriptor.ends_with("job_orig_r0_1.json"));
        let content = std::fs::read_to_string(descriptor).unwrap();
        let loaded: JobDescriptor = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded, jobs[1]);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_engine_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = jobs(dir.path(), 1);

        let engine = CommandEngine::new(dir.path(), Some(vec!["true".to_string()]));
        assert!(engine.run(&jobs[0]).is_ok());

        let engine = CommandEngine::new(dir.path(), Some(vec!["false".to_string()]));
        assert!(matches!(
            engine.run(&jobs[0]),
            Err(GclError::JobFailed { run_id: 0, .. })
        ));

        let engine = CommandEngine::new(
            dir.path(),
            Some(vec!["/nonexistent/simulator".to_string()]),
        );
        assert!(matches!(
            engine.run(&jobs[0]),
            Err(GclError::JobFailed { run_id: 0, .. })
        ));
    }
}
