use clap::Parser;
use std::path::PathBuf;

use rusty_gcl::config::ExperimentLayout;
use rusty_gcl::error::GclError;
use rusty_gcl::logging::init_stage_logging;
use rusty_gcl::pipeline::Experiment;

/// Population sparseness, activity, variance and covariance of the sample matrices.
#[derive(Parser, Debug)]
struct Args {
    /// The base directory of the experiment
    basedir: PathBuf,
}

fn main() -> Result<(), GclError> {
    let args = Args::parse();
    init_stage_logging(&ExperimentLayout::new(&args.basedir), "spar_cov")?;
    log::info!("{:?}", args);

    Experiment::open(&args.basedir)?.spar_cov()?;
    log::info!("Sparseness and covariance: done!");
    Ok(())
}
