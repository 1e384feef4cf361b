use clap::Parser;
use std::path::PathBuf;

use rusty_gcl::config::ExperimentLayout;
use rusty_gcl::error::GclError;
use rusty_gcl::logging::init_stage_logging;
use rusty_gcl::pipeline::Experiment;

/// Enumerate the runs of an experiment into its parameter file.
#[derive(Parser, Debug)]
struct Args {
    /// The base directory of the experiment
    basedir: PathBuf,
}

fn main() -> Result<(), GclError> {
    let args = Args::parse();
    init_stage_logging(&ExperimentLayout::new(&args.basedir), "init_params")?;
    log::info!("{:?}", args);

    let experiment = Experiment::open(&args.basedir)?;
    let design = experiment.init_params()?;
    log::info!(
        "Design: {} synapse count(s) x {} activation fraction(s) x {} patterns",
        design.synapse_counts().len(),
        design.activation_fractions().len(),
        design.num_patterns()
    );
    Ok(())
}
