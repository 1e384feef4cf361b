//! Error module for the Rusty GCL library.
use std::error::Error;
use std::fmt;

/// Error types for the library.
#[derive(Debug, PartialEq)]
pub enum GclError {
    /// Error for invalid parameters, e.g., an activation fraction outside [0, 1].
    InvalidParameter(String),
    /// Error for a connectivity matrix violating the fixed in-degree invariant.
    InvalidConnectivity {
        /// The index of the first offending granule cell.
        grc_id: usize,
        /// The number of synapses found for that granule cell.
        found: usize,
        /// The declared number of synapses per granule cell.
        expected: usize,
    },
    /// Error for a required input (connectivity, correlation or parameter file) that cannot be found.
    MissingInput(String),
    /// Error for incompatible shapes, e.g., a correlation operator not matching the number of mossy fibers.
    IncompatibleShapes(String),
    /// Error for out of bounds access, e.g., unknown run ID.
    OutOfBounds(String),
    /// Error while parsing a text or JSON file.
    ParseError(String),
    /// Error for a simulation job that failed in the external engine.
    JobFailed {
        /// The ID of the failed run.
        run_id: usize,
        /// The reason of the failure.
        reason: String,
    },
    /// Error for I/O operations.
    IOError(String),
}

impl fmt::Display for GclError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GclError::InvalidParameter(e) => write!(f, "Invalid parameters: {}", e),
            GclError::InvalidConnectivity {
                grc_id,
                found,
                expected,
            } => write!(
                f,
                "Connectivity matrix is incorrect: granule cell {} receives {} synapses instead of {}",
                grc_id, found, expected
            ),
            GclError::MissingInput(e) => write!(f, "Missing input: {}", e),
            GclError::IncompatibleShapes(e) => write!(f, "Incompatible shapes: {}", e),
            GclError::OutOfBounds(e) => write!(f, "Index out of bounds: {}", e),
            GclError::ParseError(e) => write!(f, "Parse error: {}", e),
            GclError::JobFailed { run_id, reason } => {
                write!(f, "Simulation job {} failed: {}", run_id, reason)
            }
            GclError::IOError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for GclError {}

impl From<std::io::Error> for GclError {
    fn from(e: std::io::Error) -> Self {
        GclError::IOError(e.to_string())
    }
}

impl From<serde_json::Error> for GclError {
    fn from(e: serde_json::Error) -> Self {
        GclError::ParseError(e.to_string())
    }
}
