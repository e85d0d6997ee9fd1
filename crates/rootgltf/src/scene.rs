//! Built scenes handed from the geometry builder to the exporter.

use std::sync::Arc;

use rootgltf_geom::Placement;

use crate::export::tessellate::TriangleMesh;
use crate::subpart::Visibility;

/// Identity of a tessellated shape. Equal ids mean identical triangles.
pub type GeometryId = u64;

/// Drawable part of a [`SceneObject`].
#[derive(Debug, Clone)]
pub struct MeshRef {
    /// Shared geometry id; the exporter writes each id's buffers once.
    pub geometry: GeometryId,
    /// Triangles in the object's local frame.
    pub mesh: Arc<TriangleMesh>,
    /// RGB color in `0.0..=1.0`.
    pub color: [f32; 3],
}

/// A node of a built scene.
#[derive(Debug, Clone)]
pub struct SceneObject {
    /// Name of the placement it was built from.
    pub name: String,
    /// Placement in the parent object.
    pub placement: Placement,
    /// Drawable part, absent for pure containers.
    pub mesh: Option<MeshRef>,
    /// Child objects.
    pub children: Vec<SceneObject>,
}

impl SceneObject {
    /// Container without a mesh.
    pub fn group(name: impl Into<String>, placement: Placement) -> Self {
        Self {
            name: name.into(),
            placement,
            mesh: None,
            children: Vec::new(),
        }
    }

    /// Number of objects in this subtree, itself included.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(SceneObject::count).sum::<usize>()
    }

    /// Number of objects carrying a mesh in this subtree.
    pub fn mesh_count(&self) -> usize {
        usize::from(self.mesh.is_some())
            + self.children.iter().map(SceneObject::mesh_count).sum::<usize>()
    }

    /// Triangles drawn by this subtree.
    pub fn triangle_count(&self) -> usize {
        self.mesh.as_ref().map_or(0, |mesh| mesh.mesh.num_triangles())
            + self.children.iter().map(SceneObject::triangle_count).sum::<usize>()
    }
}

/// One subpart ready for export.
#[derive(Debug, Clone)]
pub struct NamedScene {
    /// Menu path joined with `" > "`.
    pub name: String,
    /// Viewer visibility annotation.
    pub visibility: Visibility,
    /// Built tree, `None` when nothing was drawn.
    pub root: Option<SceneObject>,
}
