//! Logging setup of the pipeline stages.
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::PathBuf;

use crate::config::ExperimentLayout;
use crate::error::GclError;

/// Log to the console and to `<basedir>/log/<stage>.log`, at the info level.
/// Returns the path of the log file.
pub fn init_stage_logging(layout: &ExperimentLayout, stage: &str) -> Result<PathBuf, GclError> {
    let log_path = layout.log_dir().join(format!("{}.log", stage));

    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{h({l})} - {m}\n")))
        .build();
    let logfile = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d} {l} [{T}] - {m}\n")))
        .build(&log_path)
        .map_err(|e| GclError::IOError(e.to_string()))?;

    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .appender(Appender::builder().build("logfile", Box::new(logfile)))
        .build(
            Root::builder()
                .appender("stdout")
                .appender("logfile")
                .build(LevelFilter::Info),
        )
        .map_err(|e| GclError::IOError(e.to_string()))?;

    log4rs::init_config(config).map_err(|e| GclError::IOError(e.to_string()))?;
    Ok(log_path)
}
