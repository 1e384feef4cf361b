//! Fixed bipartite connectivity between mossy fibers (MFs) and granule cells (GCs).
//!
//! The matrix is precomputed elsewhere. This module only checks that every granule cell
//! receives exactly the declared number of synapses, and refuses anything else.
//!
//! # Examples
//!
//! ```rust
//! use rusty_gcl::connectivity::ConnectivityModel;
//!
//! // MF 0 and 1 contact GC 0, MF 2 and 3 contact GC 1
//! let conn_mat = vec![
//!     vec![true, false],
//!     vec![true, false],
//!     vec![false, true],
//!     vec![false, true],
//! ];
//! let model = ConnectivityModel::build(2, conn_mat, Default::default()).unwrap();
//!
//! assert_eq!(model.num_mf(), 4);
//! assert_eq!(model.num_grc(), 2);
//! assert_eq!(model.targets(2), &[1]);
//! ```
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::GclError;
use crate::utils::{load_json, save_json};

/// Cell coordinates of both populations, carried along for visualization only.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Clone)]
pub struct SpatialPositions {
    /// The positions of the MF glomeruli.
    #[serde(default)]
    pub glom_pos: Vec<[f64; 3]>,
    /// The positions of the granule cells.
    #[serde(default)]
    pub grc_pos: Vec<[f64; 3]>,
}

/// On-disk layout of a connectivity file.
#[derive(Debug, Serialize, Deserialize)]
struct ConnectivityRecord {
    n_syn: usize,
    conn_mat: Vec<Vec<u8>>,
    #[serde(flatten)]
    positions: SpatialPositions,
}

/// The validated MF→GC connectivity matrix.
#[derive(Debug, PartialEq, Clone)]
pub struct ConnectivityModel {
    /// The number of synapses received by every granule cell.
    n_syn: usize,
    num_mf: usize,
    num_grc: usize,
    /// For each MF, the sorted IDs of the granule cells it innervates.
    targets: Vec<Vec<usize>>,
    positions: SpatialPositions,
}

impl ConnectivityModel {
    /// Create a connectivity model from a boolean matrix of shape (N_mf x N_grc).
    /// Returns an error if the matrix is ragged, empty, or if any column does not sum to `n_syn`.
    pub fn build(
        n_syn: usize,
        conn_mat: Vec<Vec<bool>>,
        positions: SpatialPositions,
    ) -> Result<Self, GclError> {
        let num_mf = conn_mat.len();
        let num_grc = conn_mat.first().map_or(0, |row| row.len());
        if num_mf == 0 || num_grc == 0 {
            return Err(GclError::InvalidParameter(
                "The connectivity matrix must be non-empty".to_string(),
            ));
        }
        if let Some(mf_id) = conn_mat.iter().position(|row| row.len() != num_grc) {
            return Err(GclError::IncompatibleShapes(format!(
                "Row {} of the connectivity matrix has {} columns instead of {}",
                mf_id,
                conn_mat[mf_id].len(),
                num_grc
            )));
        }

        for grc_id in 0..num_grc {
            let found = conn_mat.iter().filter(|row| row[grc_id]).count();
            if found != n_syn {
                return Err(GclError::InvalidConnectivity {
                    grc_id,
                    found,
                    expected: n_syn,
                });
            }
        }

        let targets = conn_mat
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .filter_map(|(grc_id, &connected)| connected.then_some(grc_id))
                    .collect()
            })
            .collect();

        Ok(ConnectivityModel {
            n_syn,
            num_mf,
            num_grc,
            targets,
            positions,
        })
    }

    /// The conventional location of the connectivity file for a given synapse count.
    pub fn path_for<P: AsRef<Path>>(dir: P, n_syn: usize) -> PathBuf {
        dir.as_ref()
            .join(format!("GCLconnectivity_{}.json", n_syn))
    }

    /// Load and validate a connectivity file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, GclError> {
        let record: ConnectivityRecord = load_json(path.as_ref())?;
        let conn_mat = record
            .conn_mat
            .into_iter()
            .map(|row| row.into_iter().map(|x| x != 0).collect())
            .collect();
        let model = ConnectivityModel::build(record.n_syn, conn_mat, record.positions)?;
        log::info!(
            "Connectivity loaded from {}: {} MFs, {} GCs, {} synapses per GC",
            path.as_ref().display(),
            model.num_mf,
            model.num_grc,
            model.n_syn
        );
        Ok(model)
    }

    /// Save the connectivity model to a JSON file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), GclError> {
        let conn_mat = (0..self.num_mf)
            .map(|mf_id| {
                (0..self.num_grc)
                    .map(|grc_id| self.is_connected(mf_id, grc_id) as u8)
                    .collect()
            })
            .collect();
        let record = ConnectivityRecord {
            n_syn: self.n_syn,
            conn_mat,
            positions: self.positions.clone(),
        };
        save_json(&record, path)
    }

    /// The number of synapses received by every granule cell.
    pub fn n_syn(&self) -> usize {
        self.n_syn
    }

    /// The number of mossy fibers.
    pub fn num_mf(&self) -> usize {
        self.num_mf
    }

    /// The number of granule cells.
    pub fn num_grc(&self) -> usize {
        self.num_grc
    }

    /// The sorted IDs of the granule cells innervated by the given MF.
    /// Panics if the MF does not exist.
    pub fn targets(&self, mf_id: usize) -> &[usize] {
        &self.targets[mf_id]
    }

    /// Whether the MF innervates the granule cell.
    pub fn is_connected(&self, mf_id: usize, grc_id: usize) -> bool {
        self.targets
            .get(mf_id)
            .is_some_and(|targets| targets.binary_search(&grc_id).is_ok())
    }

    /// The total number of MF→GC contacts.
    pub fn num_contacts(&self) -> usize {
        self.targets.iter().map(|t| t.len()).sum()
    }

    pub fn positions(&self) -> &SpatialPositions {
        &self.positions
    }
}
