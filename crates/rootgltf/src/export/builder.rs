//! Reference geometry builder: turns the visible part of a geometry tree into
//! a [`SceneObject`] tree.

use std::collections::HashMap;
use std::sync::Arc;

use rootgltf_geom::{Geometry, GeometryNode, Shape, VolumeKey};
use tracing::{debug, warn};

use crate::convert::{BuildOptions, GeometryBuilder};
use crate::error::BuildError;
use crate::export::tessellate::{tessellate, TessellationParams, TriangleMesh};
use crate::scene::{GeometryId, MeshRef, SceneObject};

/// Color used when neither the volume nor its material provides one.
pub const DEFAULT_COLOR: [f32; 3] = [0.7, 0.7, 0.7];

const PALETTE: [[f32; 3]; 10] = [
    [0.90, 0.30, 0.24],
    [0.18, 0.55, 0.80],
    [0.20, 0.70, 0.40],
    [0.95, 0.65, 0.15],
    [0.60, 0.35, 0.70],
    [0.10, 0.70, 0.70],
    [0.85, 0.45, 0.60],
    [0.55, 0.55, 0.20],
    [0.40, 0.45, 0.85],
    [0.75, 0.55, 0.40],
];

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Palette color for a material name. Picked by a 64-bit FNV-1a hash of the
/// name, so a material keeps its color across runs and toolchains.
pub fn material_color(material: &str) -> [f32; 3] {
    let hash = material
        .bytes()
        .fold(FNV_OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME));
    PALETTE[(hash % PALETTE.len() as u64) as usize]
}

struct CachedGeometry {
    shape: Shape,
    params: TessellationParams,
    id: GeometryId,
    mesh: Arc<TriangleMesh>,
}

/// Budget and warning state of one build.
struct BuildState {
    options: BuildOptions,
    params: TessellationParams,
    faces: usize,
    meshes: usize,
    exhausted: bool,
}

impl BuildState {
    fn admit(&mut self, triangles: usize) -> bool {
        if self.exhausted {
            return false;
        }
        if self.meshes + 1 > self.options.max_nodes || self.faces + triangles > self.options.max_faces {
            warn!(
                faces = self.faces,
                meshes = self.meshes,
                max_faces = self.options.max_faces,
                max_nodes = self.options.max_nodes,
                "build budget exhausted, remaining volumes are not drawn"
            );
            self.exhausted = true;
            return false;
        }
        self.meshes += 1;
        self.faces += triangles;
        true
    }
}

/// Tessellating builder with a per-volume geometry cache.
///
/// The cache outlives a single build, so subparts drawing the same volume
/// share its geometry id, and the exporter writes its buffers once. An entry
/// is reused while the volume's shape and the circle segmentation are
/// unchanged.
#[derive(Default)]
pub struct MeshBuilder {
    cache: HashMap<VolumeKey, CachedGeometry>,
    next_id: GeometryId,
}

impl MeshBuilder {
    /// Create a builder with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached geometries.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn geometry(
        &mut self,
        geometry: &Geometry,
        key: VolumeKey,
        params: TessellationParams,
    ) -> Result<(GeometryId, Arc<TriangleMesh>), BuildError> {
        let volume = geometry.volume(key);
        if let Some(cached) = self.cache.get(&key) {
            if cached.shape == volume.shape && cached.params == params {
                return Ok((cached.id, Arc::clone(&cached.mesh)));
            }
        }

        let mesh = tessellate(&volume.shape, &params).map_err(|reason| BuildError::InvalidShape {
            volume: volume.name.clone(),
            reason,
        })?;
        let mesh = Arc::new(mesh);
        let id = self.next_id;
        self.next_id += 1;
        self.cache.insert(
            key,
            CachedGeometry {
                shape: volume.shape.clone(),
                params,
                id,
                mesh: Arc::clone(&mesh),
            },
        );
        Ok((id, mesh))
    }

    fn build_node(
        &mut self,
        geometry: &Geometry,
        node: &GeometryNode,
        depth: usize,
        state: &mut BuildState,
    ) -> Result<Option<SceneObject>, BuildError> {
        let volume = geometry.volume(node.volume);
        let mut object = SceneObject::group(node.name.clone(), node.placement);

        if volume.att.visible_self() {
            let (id, mesh) = self.geometry(geometry, node.volume, state.params)?;
            if !mesh.is_empty() && state.admit(mesh.num_triangles()) {
                let color = match (&volume.color, &volume.material) {
                    (Some(color), _) => *color,
                    (None, Some(material)) if state.options.default_colors => material_color(material),
                    _ => DEFAULT_COLOR,
                };
                object.mesh = Some(MeshRef {
                    geometry: id,
                    mesh,
                    color,
                });
            }
        }

        if volume.att.visible_children() && depth < state.options.vis_level {
            for child in &volume.nodes {
                if let Some(built) = self.build_node(geometry, child, depth + 1, state)? {
                    object.children.push(built);
                }
            }
        }

        if object.mesh.is_none() && object.children.is_empty() {
            Ok(None)
        } else {
            Ok(Some(object))
        }
    }
}

impl GeometryBuilder for MeshBuilder {
    fn build(
        &mut self,
        geometry: &Geometry,
        options: &BuildOptions,
    ) -> Result<Option<SceneObject>, BuildError> {
        let mut state = BuildState {
            options: *options,
            params: TessellationParams::from_segments(options.faces_per_circle),
            faces: 0,
            meshes: 0,
            exhausted: false,
        };
        let root = self.build_node(geometry, geometry.top(), 0, &mut state)?;
        debug!(faces = state.faces, meshes = state.meshes, "built scene");
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatchList;
    use crate::visibility::show_subpart;
    use rootgltf_geom::{GeoAtt, Volume};

    fn visible(volume: Volume) -> Volume {
        volume.with_att(GeoAtt::ROOT_DEFAULT)
    }

    /// World -> Station_1 -> [Module_1, Module_2] (shared), Ball_1
    fn detector() -> Geometry {
        let mut geo = Geometry::new(visible(Volume::assembly("World")));
        let master = geo.master();
        let station = geo.add_daughter(master, "Station_1", visible(Volume::assembly("Station")));
        let module = geo.add_volume(visible(Volume::new("Module", Shape::cuboid(1.0, 1.0, 1.0)).with_material("Si")));
        geo.place(station, GeometryNode::new("Module_1", module));
        geo.place(station, GeometryNode::new("Module_2", module));
        geo.add_daughter(master, "Ball_1", visible(Volume::new("Ball", Shape::sphere(1.0))));
        geo
    }

    fn mesh_ids(object: &SceneObject, out: &mut Vec<GeometryId>) {
        if let Some(mesh) = &object.mesh {
            out.push(mesh.geometry);
        }
        for child in &object.children {
            mesh_ids(child, out);
        }
    }

    #[test]
    fn draws_every_visible_volume() {
        let geo = detector();
        let root = MeshBuilder::new().build(&geo, &BuildOptions::default()).unwrap().unwrap();
        assert_eq!(root.mesh_count(), 3);
        assert_eq!(root.count(), 5);
        assert_eq!(root.triangle_count(), 12 + 12 + 2 * 20 * 11);
    }

    #[test]
    fn shared_volumes_share_geometry() {
        let geo = detector();
        let mut builder = MeshBuilder::new();
        let root = builder.build(&geo, &BuildOptions::default()).unwrap().unwrap();
        let mut ids = Vec::new();
        mesh_ids(&root, &mut ids);
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0], ids[1]);
        assert_ne!(ids[0], ids[2]);
        // the two assemblies are cached with empty meshes
        assert_eq!(builder.cached(), 4);
    }

    #[test]
    fn only_the_subpart_is_drawn() {
        let mut geo = detector();
        show_subpart(&mut geo, &MatchList::prefixes(["Module_2"]));
        let root = MeshBuilder::new().build(&geo, &BuildOptions::default()).unwrap().unwrap();

        // flags live on the shared volume, so both placements are drawn
        assert_eq!(root.mesh_count(), 2);
        assert_eq!(root.children.len(), 1);
        let station = &root.children[0];
        assert_eq!(station.name, "Station_1");
        assert!(station.mesh.is_none());
        assert_eq!(station.children.len(), 2);
    }

    #[test]
    fn nothing_visible_builds_nothing() {
        let mut geo = detector();
        show_subpart(&mut geo, &MatchList::prefixes(["Nothing"]));
        let root = MeshBuilder::new().build(&geo, &BuildOptions::default()).unwrap();
        assert!(root.is_none());
    }

    #[test]
    fn simplified_shape_gets_new_geometry() {
        let mut geo = detector();
        let mut builder = MeshBuilder::new();
        let before = builder.build(&geo, &BuildOptions::default()).unwrap().unwrap();

        show_subpart(&mut geo, &MatchList::prefixes(["Ball"]));
        let after = builder.build(&geo, &BuildOptions::default()).unwrap().unwrap();

        let ball = after.children.last().unwrap().mesh.as_ref().unwrap();
        assert_eq!(ball.mesh.num_triangles(), 2 * 3 * 3);
        let old_ball = before.children.last().unwrap().mesh.as_ref().unwrap();
        assert_ne!(ball.geometry, old_ball.geometry);
    }

    #[test]
    fn vis_level_limits_depth() {
        let geo = detector();
        let options = BuildOptions {
            vis_level: 1,
            ..BuildOptions::default()
        };
        let root = MeshBuilder::new().build(&geo, &options).unwrap().unwrap();
        // modules sit at depth 2
        assert_eq!(root.mesh_count(), 1);
    }

    #[test]
    fn node_budget_stops_drawing() {
        let geo = detector();
        let options = BuildOptions {
            max_nodes: 2,
            ..BuildOptions::default()
        };
        let root = MeshBuilder::new().build(&geo, &options).unwrap().unwrap();
        assert_eq!(root.mesh_count(), 2);
    }

    #[test]
    fn material_palette_is_fixed() {
        assert_eq!(material_color("Si"), PALETTE[9]);
        assert_eq!(material_color("Fe"), PALETTE[4]);
        assert_eq!(material_color(""), PALETTE[7]);
    }

    #[test]
    fn colors_follow_volume_then_material() {
        let mut geo = detector();
        let root = MeshBuilder::new().build(&geo, &BuildOptions::default()).unwrap().unwrap();
        let module = root.children[0].children[0].mesh.as_ref().unwrap();
        assert_eq!(module.color, material_color("Si"));
        let ball = root.children[1].mesh.as_ref().unwrap();
        assert_eq!(ball.color, DEFAULT_COLOR);

        let key = geo.find_volume("Module").unwrap();
        geo.volume_mut(key).color = Some([1.0, 0.0, 0.0]);
        let root = MeshBuilder::new().build(&geo, &BuildOptions::default()).unwrap().unwrap();
        assert_eq!(root.children[0].children[0].mesh.as_ref().unwrap().color, [1.0, 0.0, 0.0]);

        let options = BuildOptions {
            default_colors: false,
            ..BuildOptions::default()
        };
        geo.volume_mut(key).color = None;
        let root = MeshBuilder::new().build(&geo, &options).unwrap().unwrap();
        assert_eq!(root.children[0].children[0].mesh.as_ref().unwrap().color, DEFAULT_COLOR);
    }

    #[test]
    fn invalid_shape_fails_the_build() {
        let mut geo = Geometry::new(visible(Volume::new("Bad", Shape::cuboid(-1.0, 1.0, 1.0))));
        let master = geo.master();
        geo.volume_mut(master).att = GeoAtt::VIS_THIS;
        let err = MeshBuilder::new().build(&geo, &BuildOptions::default()).unwrap_err();
        assert!(matches!(err, BuildError::InvalidShape { volume, .. } if volume == "Bad"));
    }
}
