use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use rusty_gcl::config::ExperimentLayout;
use rusty_gcl::error::GclError;
use rusty_gcl::logging::init_stage_logging;
use rusty_gcl::pipeline::Experiment;

/// Learnability of random labels from the MF and GC sample matrices.
#[derive(Parser, Debug)]
struct Args {
    /// The base directory of the experiment
    basedir: PathBuf,
}

fn main() -> Result<(), GclError> {
    let args = Args::parse();
    init_stage_logging(&ExperimentLayout::new(&args.basedir), "learning")?;
    log::info!("{:?}", args);

    let start = Instant::now();
    Experiment::open(&args.basedir)?.learning()?;
    log::info!("Learning: done in {:.1?}", start.elapsed());
    Ok(())
}
