#![warn(missing_docs)]

//! rootgltf converts ROOT detector geometry into one compact glTF file split
//! into subparts for a menu driven event display.
//!
//! For every subpart the geometry tree is pruned, its visibility flags are
//! reset so that only the selected nodes (plus the ancestors needed to reach
//! them) are drawn, and a scene is built. All scenes are exported into one
//! document whose identical materials and meshes are then merged.
//!
//! # Example
//!
//! ```rust,no_run
//! use rootgltf::export::{FileWriter, GltfExporter, JsonGeometrySource, MeshBuilder};
//! use rootgltf::{ConversionConfig, Converter};
//!
//! let request = ConversionConfig::load("lhcb.toml")?.into_request()?;
//! let mut converter = Converter::new(
//!     JsonGeometrySource,
//!     MeshBuilder::new(),
//!     GltfExporter::new(),
//!     FileWriter::new("out"),
//! );
//! let report = converter.convert(&request)?;
//! println!("{} scenes, {} bytes", report.scenes, report.bytes);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod convert;
pub mod dedup;
pub mod document;
pub mod error;
pub mod export;
pub mod matcher;
pub mod prune;
pub mod scene;
pub mod subpart;
pub mod visibility;

pub use config::ConversionConfig;
pub use convert::{
    ArtifactWriter, BuildOptions, ConvertReport, ConvertRequest, Converter, GeometryBuilder,
    GeometrySource, ProgressEvent, ProgressSink, SceneExporter,
};
pub use dedup::{deduplicate, DedupStats};
pub use document::InterchangeDocument;
pub use error::{BuildError, ConfigError, ConvertError, DedupError, ExportError};
pub use matcher::{MatchList, MatchSpec};
pub use prune::{prune, PruneStats};
pub use scene::{MeshRef, NamedScene, SceneObject};
pub use subpart::{MenuPath, SubpartSpec, Visibility};
pub use visibility::{select_subpart, show_subpart};

pub use rootgltf_geom as geom;
