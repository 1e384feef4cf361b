//! Small helpers shared across the pipeline stages.
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

use crate::error::GclError;

/// Open a required input file, reporting an absent file as a missing input.
pub fn open_input<P: AsRef<Path>>(path: P) -> Result<File, GclError> {
    File::open(path.as_ref()).map_err(|e| match e.kind() {
        ErrorKind::NotFound => GclError::MissingInput(path.as_ref().display().to_string()),
        _ => GclError::IOError(format!("{}: {}", path.as_ref().display(), e)),
    })
}

/// Read a JSON record from a required input file.
pub fn load_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, GclError> {
    let reader = BufReader::new(open_input(path.as_ref())?);
    serde_json::from_reader(reader)
        .map_err(|e| GclError::ParseError(format!("{}: {}", path.as_ref().display(), e)))
}

/// Write a JSON record, creating the parent directory if needed.
pub fn save_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<(), GclError> {
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

/// Returns `num` evenly spaced values over `[start, end]`, both ends included.
pub fn linspace(start: f64, end: f64, num: usize) -> Vec<f64> {
    match num {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (end - start) / (num - 1) as f64;
            (0..num).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Mean of the non-NaN values; NaN if there are none.
pub fn nan_mean(values: &[f64]) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// The two-decimal label of an activation fraction used in every file name, e.g., `0.50`.
pub fn fraction_label(f_mf: f64) -> String {
    format!("{:.2}", f_mf)
}

/// The tag of the result tables of a directory: the last `_`-separated token of its name,
/// e.g., `r20` for `orig_data_r20`.
pub fn dir_tag<P: AsRef<Path>>(dir: P) -> String {
    dir.as_ref()
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .and_then(|name| name.rsplit('_').next().map(|token| token.to_string()))
        .unwrap_or_default()
}

/// Write a tab-delimited table of floats, one row per configuration.
pub fn write_table<P: AsRef<Path>>(path: P, rows: &[Vec<f64>]) -> Result<(), GclError> {
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    for row in rows {
        let line = row
            .iter()
            .map(|v| format!("{:.8e}", v))
            .collect::<Vec<String>>()
            .join("\t");
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}
