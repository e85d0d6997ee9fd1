//! Error types for the conversion pipeline.

use std::path::PathBuf;

use rootgltf_geom::GeometryError;
use thiserror::Error;

/// Errors raised while loading or validating a conversion config.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config {path}: {source}")]
    Io {
        /// Config file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config is not valid TOML or has the wrong shape.
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    /// Circles need at least three faces.
    #[error("faces_per_circle must be at least 3, got {0}")]
    FacesPerCircle(u32),

    /// Nothing to convert.
    #[error("config declares no subparts")]
    NoSubparts,

    /// Two subparts share a menu entry.
    #[error("duplicate subpart {0:?}")]
    DuplicateSubpart(String),
}

/// Errors raised by a geometry builder.
#[derive(Error, Debug)]
pub enum BuildError {
    /// A visible volume carries a shape that cannot be tessellated.
    #[error("volume {volume:?} has an invalid shape: {reason}")]
    InvalidShape {
        /// Volume name.
        volume: String,
        /// What is wrong with the shape.
        reason: String,
    },
}

/// Errors raised by a scene exporter.
#[derive(Error, Debug)]
pub enum ExportError {
    /// A record could not be converted to JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The serialized document is rejected by the format validator.
    #[error("invalid document: {0}")]
    Invalid(String),
}

/// Errors raised while deduplicating a document.
#[derive(Error, Debug)]
pub enum DedupError {
    /// An index in the input document does not resolve.
    #[error("{kind} index {index} out of range (document has {len})")]
    DanglingReference {
        /// Referenced record kind (`"material"`, `"mesh"`, `"node"`).
        kind: &'static str,
        /// Offending index.
        index: usize,
        /// Number of records of that kind.
        len: usize,
    },

    /// A record could not be reduced to its canonical form for comparison.
    #[error("cannot compare {kind} {index}: {source}")]
    Canonicalize {
        /// Record kind.
        kind: &'static str,
        /// Record index in the input document.
        index: usize,
        /// Serialization failure.
        source: serde_json::Error,
    },
}

/// Top-level conversion failure. Nothing is written when this is returned.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The input geometry could not be read.
    #[error("reading geometry: {0}")]
    Source(#[from] GeometryError),

    /// The builder failed on one of the subparts.
    #[error("building scene: {0}")]
    Build(#[from] BuildError),

    /// The exporter failed.
    #[error("exporting scenes: {0}")]
    Export(#[from] ExportError),

    /// Deduplication failed.
    #[error("deduplicating document: {0}")]
    Dedup(#[from] DedupError),

    /// The deduplicated document could not be serialized.
    #[error("serializing document: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The artifact writer failed.
    #[error("writing {name}: {source}")]
    Write {
        /// Target artifact name.
        name: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
