use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use rusty_gcl::config::ExperimentLayout;
use rusty_gcl::error::GclError;
use rusty_gcl::logging::init_stage_logging;
use rusty_gcl::pipeline::Experiment;
use rusty_gcl::simulator::{CommandEngine, SimulationDriver};

/// Build the job of every run and hand it to the simulation engine.
#[derive(Parser, Debug)]
struct Args {
    /// The base directory of the experiment
    basedir: PathBuf,
}

fn main() -> Result<(), GclError> {
    let args = Args::parse();
    let layout = ExperimentLayout::new(&args.basedir);
    init_stage_logging(&layout, "run_network")?;
    log::info!("{:?}", args);

    let start = Instant::now();
    let experiment = Experiment::open(&args.basedir)?;
    let engine = CommandEngine::new(layout.work_dir(), experiment.config().engine_command.clone());
    let driver = SimulationDriver::new(None)?;

    let report = experiment.run_network(&engine, &driver)?;
    log::info!(
        "{} jobs in {:.1?}: {} completed, {} failed",
        report.num_jobs(),
        start.elapsed(),
        report.completed.len(),
        report.failed.len()
    );

    match report.failed.first() {
        None => Ok(()),
        Some(first) => {
            for failure in report.failed.iter() {
                log::error!("{} (in {})", failure.error, failure.output_dir.display());
            }
            Err(GclError::JobFailed {
                run_id: first.run_id,
                reason: format!("{} of {} jobs failed", report.failed.len(), report.num_jobs()),
            })
        }
    }
}
