//! Typed view of an exported glTF JSON document.
//!
//! Only the members that carry cross references touched by deduplication are
//! typed. Everything else, on every record and at the top level, is kept in a
//! flattened map and written back unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DedupError;

/// A glTF material record, compared as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Material(pub Map<String, Value>);

/// One drawable part of a mesh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Primitive {
    /// Index into [`InterchangeDocument::materials`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<usize>,
    /// `attributes`, `indices`, `mode` and any extension members.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// A glTF mesh record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    /// Drawable parts.
    pub primitives: Vec<Primitive>,
    /// Remaining members.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// A glTF node record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Index into [`InterchangeDocument::meshes`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<usize>,
    /// Indices into [`InterchangeDocument::nodes`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<usize>,
    /// `name`, transform and any extension members.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// A glTF scene record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Root node indices.
    #[serde(default)]
    pub nodes: Vec<usize>,
    /// Scene name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Application data, here the viewer visibility annotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
    /// Remaining members.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// An exported glTF document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterchangeDocument {
    /// Material records.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<Material>,
    /// Mesh records.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meshes: Vec<Mesh>,
    /// Node records, forming one forest per scene.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<Node>,
    /// Scene records.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scenes: Vec<Scene>,
    /// Accessor records. Never compared, shared through meshes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accessors: Vec<Value>,
    /// `asset`, `buffers`, `bufferViews` and anything else.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl InterchangeDocument {
    /// Parse a document from JSON text.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Parse a document from JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Serialize to compact JSON bytes.
    pub fn to_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Serialize to indented JSON text.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Check that every material, mesh and node index resolves.
    pub fn check_references(&self) -> Result<(), DedupError> {
        for mesh in &self.meshes {
            for primitive in &mesh.primitives {
                if let Some(index) = primitive.material {
                    check_index("material", index, self.materials.len())?;
                }
            }
        }
        for node in &self.nodes {
            if let Some(index) = node.mesh {
                check_index("mesh", index, self.meshes.len())?;
            }
            for &child in &node.children {
                check_index("node", child, self.nodes.len())?;
            }
        }
        for scene in &self.scenes {
            for &root in &scene.nodes {
                check_index("node", root, self.nodes.len())?;
            }
        }
        Ok(())
    }
}

fn check_index(kind: &'static str, index: usize, len: usize) -> Result<(), DedupError> {
    if index < len {
        Ok(())
    } else {
        Err(DedupError::DanglingReference { kind, index, len })
    }
}
