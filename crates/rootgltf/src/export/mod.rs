//! Reference collaborators: JSON geometry input, tessellating builder, glTF
//! exporter and file output.

use std::fs;
use std::path::{Path, PathBuf};

use rootgltf_geom::{read_geometry, Geometry};
use tracing::debug;

use crate::convert::{ArtifactWriter, GeometrySource};

pub mod builder;
#[cfg(feature = "gltf")]
pub mod gltf;
pub mod tessellate;

pub use builder::MeshBuilder;
#[cfg(feature = "gltf")]
pub use self::gltf::GltfExporter;
pub use tessellate::{tessellate, TessellationParams, TriangleMesh};

/// Reads geometry dumps from JSON files. The locator is a file path.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonGeometrySource;

impl GeometrySource for JsonGeometrySource {
    fn read(&self, locator: &str, object: &str) -> rootgltf_geom::Result<Geometry> {
        read_geometry(locator, object)
    }
}

/// Writes artifacts as files below a directory, creating it when missing.
#[derive(Debug, Clone)]
pub struct FileWriter {
    dir: PathBuf,
}

impl FileWriter {
    /// Writer rooted at `dir`. Absolute artifact names ignore it.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Where an artifact named `name` is written.
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl Default for FileWriter {
    fn default() -> Self {
        Self::new(".")
    }
}

impl ArtifactWriter for FileWriter {
    fn write(&mut self, name: &str, bytes: &[u8]) -> std::io::Result<()> {
        let path = self.path_of(name);
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "wrote artifact");
        Ok(())
    }
}

/// Whether `path` names a glTF JSON file.
pub fn is_gltf_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gltf"))
}
