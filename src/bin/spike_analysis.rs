use clap::Parser;
use std::path::PathBuf;

use rusty_gcl::config::ExperimentLayout;
use rusty_gcl::error::GclError;
use rusty_gcl::logging::init_stage_logging;
use rusty_gcl::pipeline::Experiment;

/// SPIKE-synchronization and SPIKE-distance of the spike-train files in `SpikeTimes/`.
#[derive(Parser, Debug)]
struct Args {
    /// The base directory of the experiment
    basedir: PathBuf,
}

fn main() -> Result<(), GclError> {
    let args = Args::parse();
    init_stage_logging(&ExperimentLayout::new(&args.basedir), "spike_analysis")?;
    log::info!("{:?}", args);

    let rows = Experiment::open(&args.basedir)?.spike_analysis()?;
    log::info!("Spike analysis: done! {} frequencies", rows.len());
    Ok(())
}
