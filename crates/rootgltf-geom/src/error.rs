//! Error types for reading geometry dumps.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or assembling a geometry.
#[derive(Error, Debug)]
pub enum GeometryError {
    /// The geometry file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not a valid geometry dump.
    #[error("invalid geometry JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// No object with the requested name (or `name;cycle`) exists.
    #[error("object {0:?} not found")]
    ObjectNotFound(String),

    /// Two volumes share a name, so placements would be ambiguous.
    #[error("duplicate volume {0:?}")]
    DuplicateVolume(String),

    /// The declared master volume does not exist.
    #[error("master volume {0:?} not found")]
    MissingMaster(String),

    /// A placement refers to a volume that does not exist.
    #[error("node {node:?} references unknown volume {volume:?}")]
    UnknownVolume {
        /// Placement name.
        node: String,
        /// Missing volume name.
        volume: String,
    },

    /// A volume contains itself, directly or through its daughters.
    #[error("volume {0:?} contains itself")]
    Cycle(String),
}

/// Result type for geometry operations.
pub type Result<T> = std::result::Result<T, GeometryError>;
