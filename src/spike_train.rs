//! Spike events and spike trains as read from the simulation engine output.
//!
//! A spike-event file has one `cell_index<TAB>time` row per spike. An absent or empty file is a
//! valid run without any spike, and yields an empty event list.
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;

use crate::config::TimeUnit;
use crate::error::GclError;

/// A spike emitted by a cell.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct SpikeEvent {
    /// The ID of the cell producing the spike.
    cell_id: usize,
    /// The time at which the spike is produced (ms).
    time: f64,
}

impl SpikeEvent {
    pub fn new(cell_id: usize, time: f64) -> Self {
        SpikeEvent { cell_id, time }
    }

    /// Returns the ID of the cell producing the spike.
    pub fn cell_id(&self) -> usize {
        self.cell_id
    }

    /// Returns the time at which the spike is produced (ms).
    pub fn time(&self) -> f64 {
        self.time
    }
}

/// Parse a cell index written either as an integer or as an integral float.
fn parse_cell_id(token: &str) -> Option<usize> {
    token.parse::<usize>().ok().or_else(|| {
        token
            .parse::<f64>()
            .ok()
            .filter(|x| *x >= 0.0 && x.fract() == 0.0)
            .map(|x| x as usize)
    })
}

/// Parse the content of a spike-event file, converting timestamps to milliseconds.
pub fn parse_spike_events(content: &str, unit: TimeUnit) -> Result<Vec<SpikeEvent>, GclError> {
    let mut events = Vec::new();
    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let event = match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(cell), Some(time), None) => {
                match (parse_cell_id(cell), time.parse::<f64>().ok()) {
                    (Some(cell_id), Some(time)) if time.is_finite() => {
                        Some(SpikeEvent::new(cell_id, unit.to_ms(time)))
                    }
                    _ => None,
                }
            }
            _ => None,
        };
        match event {
            Some(event) => events.push(event),
            None => {
                return Err(GclError::ParseError(format!(
                    "Line {}: expected `cell_index<TAB>time`, got `{}`",
                    line_num + 1,
                    line
                )))
            }
        }
    }
    Ok(events)
}

/// Read a spike-event file. An absent file means that no spike was produced.
pub fn read_spike_events<P: AsRef<Path>>(
    path: P,
    unit: TimeUnit,
) -> Result<Vec<SpikeEvent>, GclError> {
    match fs::read_to_string(path.as_ref()) {
        Ok(content) => parse_spike_events(&content, unit).map_err(|e| {
            GclError::ParseError(format!("{}: {}", path.as_ref().display(), e))
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::debug!("No spike file at {}, assuming no spike", path.as_ref().display());
            Ok(Vec::new())
        }
        Err(e) => Err(GclError::IOError(format!(
            "{}: {}",
            path.as_ref().display(),
            e
        ))),
    }
}

/// Write spike events (times in ms) in the engine format.
pub fn write_spike_events<P: AsRef<Path>>(path: P, events: &[SpikeEvent]) -> Result<(), GclError> {
    let mut writer = BufWriter::new(fs::File::create(path)?);
    for event in events {
        writeln!(writer, "{}\t{}", event.cell_id, event.time)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a spike-train file: one train per line, spike times (ms) separated by whitespace.
/// Comment lines start with `#`; an empty line is an empty train.
/// The times of every train are sorted.
pub fn read_spike_trains<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<f64>>, GclError> {
    let content = fs::read_to_string(path.as_ref()).map_err(|e| match e.kind() {
        ErrorKind::NotFound => GclError::MissingInput(path.as_ref().display().to_string()),
        _ => GclError::IOError(format!("{}: {}", path.as_ref().display(), e)),
    })?;

    let mut trains = Vec::new();
    for (line_num, line) in content.lines().enumerate() {
        if line.trim_start().starts_with('#') {
            continue;
        }
        let mut train = line
            .split_whitespace()
            .map(|token| {
                token
                    .parse::<f64>()
                    .ok()
                    .filter(|t| t.is_finite())
                    .ok_or_else(|| {
                        GclError::ParseError(format!(
                            "{}: line {}: invalid spike time `{}`",
                            path.as_ref().display(),
                            line_num + 1,
                            token
                        ))
                    })
            })
            .collect::<Result<Vec<f64>, GclError>>()?;
        train.sort_by(|a, b| a.total_cmp(b));
        trains.push(train);
    }
    Ok(trains)
}
