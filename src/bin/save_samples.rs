use clap::Parser;
use std::path::PathBuf;

use rusty_gcl::config::ExperimentLayout;
use rusty_gcl::error::GclError;
use rusty_gcl::logging::init_stage_logging;
use rusty_gcl::pipeline::Experiment;

/// Count the spikes of every run into MF and GC sample matrices.
#[derive(Parser, Debug)]
struct Args {
    /// The base directory of the experiment
    basedir: PathBuf,
}

fn main() -> Result<(), GclError> {
    let args = Args::parse();
    init_stage_logging(&ExperimentLayout::new(&args.basedir), "save_samples")?;
    log::info!("{:?}", args);

    Experiment::open(&args.basedir)?.save_samples()?;
    log::info!("Saving samples: done!");
    Ok(())
}
