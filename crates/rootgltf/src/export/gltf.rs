//! glTF 2.0 JSON export with an embedded base64 buffer.
//!
//! Every drawn object gets its own material and mesh record; repeated
//! geometry only shares accessors. [`crate::dedup`] collapses the records
//! afterwards.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use nalgebra::{Matrix3, Rotation3, UnitQuaternion};
use rootgltf_geom::Placement;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::convert::SceneExporter;
use crate::document::InterchangeDocument;
use crate::error::ExportError;
use crate::export::tessellate::TriangleMesh;
use crate::scene::{GeometryId, MeshRef, NamedScene, SceneObject};

const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;
const FLOAT: u32 = 5126;
const UNSIGNED_SHORT: u32 = 5123;
const UNSIGNED_INT: u32 = 5125;
const TRIANGLES: u32 = 4;

/// Writes [`NamedScene`]s as one glTF document, one glTF scene per subpart.
#[derive(Debug, Clone)]
pub struct GltfExporter {
    generator: String,
}

impl Default for GltfExporter {
    fn default() -> Self {
        Self {
            generator: concat!("rootgltf ", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl GltfExporter {
    /// Exporter with the default `asset.generator`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the `asset.generator` string.
    pub fn with_generator(mut self, generator: impl Into<String>) -> Self {
        self.generator = generator.into();
        self
    }
}

/// Accessors and buffer contents shared by the whole document.
#[derive(Default)]
struct Payload {
    buffer: Vec<u8>,
    buffer_views: Vec<Value>,
    accessors: Vec<Value>,
    /// POSITION and index accessors per geometry.
    geometries: HashMap<GeometryId, (usize, usize)>,
    nodes: Vec<Value>,
    meshes: Vec<Value>,
    materials: Vec<Value>,
}

impl Payload {
    fn geometry(&mut self, id: GeometryId, mesh: &TriangleMesh) -> (usize, usize) {
        if let Some(&accessors) = self.geometries.get(&id) {
            return accessors;
        }
        let (min, max) = mesh.bounds().unwrap_or(([0.0; 3], [0.0; 3]));
        let positions = self.push_f32(&mesh.vertices, ARRAY_BUFFER);
        let position = self.push_accessor(positions, FLOAT, mesh.num_vertices(), "VEC3", Some((min, max)));

        let (bytes, component_type) = encode_indices(&mesh.indices, mesh.num_vertices());
        let indices = self.push_bytes(&bytes, ELEMENT_ARRAY_BUFFER);
        let index = self.push_accessor(indices, component_type, mesh.indices.len(), "SCALAR", None);

        self.geometries.insert(id, (position, index));
        (position, index)
    }

    fn push_f32(&mut self, data: &[f32], target: u32) -> usize {
        let bytes: Vec<u8> = data.iter().flat_map(|value| value.to_le_bytes()).collect();
        self.push_bytes(&bytes, target)
    }

    fn push_bytes(&mut self, data: &[u8], target: u32) -> usize {
        align_to_four(&mut self.buffer);
        let offset = self.buffer.len();
        self.buffer.extend_from_slice(data);
        self.buffer_views.push(json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": data.len(),
            "target": target
        }));
        self.buffer_views.len() - 1
    }

    fn push_accessor(
        &mut self,
        view: usize,
        component_type: u32,
        count: usize,
        ty: &str,
        bounds: Option<([f32; 3], [f32; 3])>,
    ) -> usize {
        let mut obj = Map::new();
        obj.insert("bufferView".to_string(), json!(view));
        obj.insert("componentType".to_string(), json!(component_type));
        obj.insert("count".to_string(), json!(count));
        obj.insert("type".to_string(), json!(ty));
        if let Some((min, max)) = bounds {
            obj.insert("min".to_string(), json!(min));
            obj.insert("max".to_string(), json!(max));
        }
        self.accessors.push(Value::Object(obj));
        self.accessors.len() - 1
    }

    fn mesh(&mut self, mesh: &MeshRef) -> usize {
        let (position, indices) = self.geometry(mesh.geometry, &mesh.mesh);
        let [r, g, b] = mesh.color.map(|c| c.clamp(0.0, 1.0));
        self.materials.push(json!({
            "pbrMetallicRoughness": {
                "baseColorFactor": [r, g, b, 1.0],
                "metallicFactor": 0.0,
                "roughnessFactor": 0.8
            },
            "doubleSided": true
        }));
        self.meshes.push(json!({
            "primitives": [{
                "attributes": { "POSITION": position },
                "indices": indices,
                "material": self.materials.len() - 1,
                "mode": TRIANGLES
            }]
        }));
        self.meshes.len() - 1
    }

    fn node(&mut self, object: &SceneObject) -> usize {
        let mut node = Map::new();
        node.insert("name".to_string(), json!(object.name));
        insert_transform(&mut node, &object.placement);
        if let Some(mesh) = &object.mesh {
            node.insert("mesh".to_string(), json!(self.mesh(mesh)));
        }
        let children: Vec<usize> = object.children.iter().map(|child| self.node(child)).collect();
        if !children.is_empty() {
            node.insert("children".to_string(), json!(children));
        }
        self.nodes.push(Value::Object(node));
        self.nodes.len() - 1
    }
}

fn insert_transform(node: &mut Map<String, Value>, placement: &Placement) {
    if placement.translation != [0.0; 3] {
        node.insert("translation".to_string(), json!(placement.translation));
    }
    let matrix = Matrix3::from_row_slice(&placement.rotation);
    if matrix != Matrix3::identity() {
        let rotation = Rotation3::from_matrix(&matrix);
        let q = UnitQuaternion::from_rotation_matrix(&rotation);
        node.insert("rotation".to_string(), json!([q.i, q.j, q.k, q.w]));
    }
}

fn encode_indices(indices: &[u32], vertex_count: usize) -> (Vec<u8>, u32) {
    if vertex_count <= u16::MAX as usize {
        let bytes = indices.iter().flat_map(|&i| (i as u16).to_le_bytes()).collect();
        (bytes, UNSIGNED_SHORT)
    } else {
        let bytes = indices.iter().flat_map(|i| i.to_le_bytes()).collect();
        (bytes, UNSIGNED_INT)
    }
}

fn align_to_four(buffer: &mut Vec<u8>) {
    let padding = (4 - (buffer.len() % 4)) % 4;
    buffer.resize(buffer.len() + padding, 0);
}

impl SceneExporter for GltfExporter {
    fn export(&mut self, scenes: &[NamedScene]) -> Result<InterchangeDocument, ExportError> {
        let mut payload = Payload::default();
        let mut gltf_scenes = Vec::with_capacity(scenes.len());
        for scene in scenes {
            let roots: Vec<usize> = scene.root.iter().map(|root| payload.node(root)).collect();
            gltf_scenes.push(json!({
                "name": scene.name,
                "nodes": roots,
                "extras": scene.visibility.annotation()
            }));
        }
        debug!(
            nodes = payload.nodes.len(),
            accessors = payload.accessors.len(),
            bytes = payload.buffer.len(),
            "exported glTF payload"
        );

        let mut gltf = json!({
            "asset": { "version": "2.0", "generator": self.generator },
            "scenes": gltf_scenes,
            "nodes": payload.nodes,
            "meshes": payload.meshes,
            "materials": payload.materials,
            "accessors": payload.accessors,
        });
        if !scenes.is_empty() {
            gltf["scene"] = json!(0);
        }
        if !payload.buffer.is_empty() {
            gltf["bufferViews"] = json!(payload.buffer_views);
            gltf["buffers"] = json!([{
                "byteLength": payload.buffer.len(),
                "uri": format!("data:application/octet-stream;base64,{}", STANDARD.encode(&payload.buffer))
            }]);
        }
        Ok(serde_json::from_value(gltf)?)
    }

    fn validate(&self, bytes: &[u8]) -> Result<(), ExportError> {
        ::gltf::Gltf::from_slice(bytes)
            .map(|_| ())
            .map_err(|err| ExportError::Invalid(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::dedup::deduplicate;
    use crate::subpart::Visibility;
    use rootgltf_geom::Shape;

    fn boxed(name: &str, geometry: GeometryId, placement: Placement) -> SceneObject {
        let mesh = crate::export::tessellate(&Shape::cuboid(1.0, 1.0, 1.0), &Default::default()).unwrap();
        SceneObject {
            mesh: Some(MeshRef {
                geometry,
                mesh: Arc::new(mesh),
                color: [0.2, 0.4, 0.6],
            }),
            ..SceneObject::group(name, placement)
        }
    }

    fn scenes() -> Vec<NamedScene> {
        let mut rotated = Placement::translation(0.0, 0.0, 5.0);
        rotated.rotation = [0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0];
        let mut station = SceneObject::group("Station_1", Placement::default());
        station.children.push(boxed("Module_1", 7, Placement::translation(1.0, 0.0, 0.0)));
        station.children.push(boxed("Module_2", 7, rotated));
        vec![
            NamedScene {
                name: "Tracking > Station".to_string(),
                visibility: Visibility::Shown(true),
                root: Some(station),
            },
            NamedScene {
                name: "Empty".to_string(),
                visibility: Visibility::Opacity(0.25),
                root: None,
            },
        ]
    }

    #[test]
    fn accessors_are_shared_per_geometry() {
        let doc = GltfExporter::new().export(&scenes()).unwrap();
        assert_eq!(doc.meshes.len(), 2);
        assert_eq!(doc.materials.len(), 2);
        assert_eq!(doc.accessors.len(), 2);
        assert_eq!(doc.nodes.len(), 3);
        assert_eq!(doc.scenes[1].nodes.len(), 0);
        assert_eq!(doc.scenes[1].extras, Some(json!({ "visible": true, "opacity": 0.25 })));
        assert_eq!(doc.accessors[0]["min"], json!([-1.0, -1.0, -1.0]));
    }

    #[test]
    fn rotation_becomes_a_quaternion() {
        let doc = GltfExporter::new().export(&scenes()).unwrap();
        let rotation = doc.nodes[1].other["rotation"].as_array().unwrap();
        let z = rotation[2].as_f64().unwrap();
        let w = rotation[3].as_f64().unwrap();
        // quarter turn about Z
        assert!((z.abs() - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-9);
        assert!((w.abs() - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-9);
        assert!(!doc.nodes[0].other.contains_key("rotation"));
        assert_eq!(doc.nodes[0].other["translation"], json!([1.0, 0.0, 0.0]));
    }

    #[test]
    fn deduplicated_output_is_valid_gltf() {
        let exporter = GltfExporter::new();
        let doc = exporter.clone().export(&scenes()).unwrap();
        let (doc, stats) = deduplicate(doc).unwrap();
        assert_eq!(stats.meshes_after, 1);
        let bytes = doc.to_vec().unwrap();

        exporter.validate(&bytes).unwrap();

        let (document, buffers, _) = ::gltf::import_slice(&bytes).unwrap();
        assert_eq!(document.scenes().count(), 2);
        assert_eq!(document.meshes().count(), 1);
        assert_eq!(buffers.len(), 1);
        let names: Vec<_> = document.scenes().filter_map(|scene| scene.name().map(str::to_string)).collect();
        assert_eq!(names, ["Tracking > Station", "Empty"]);
        let extras = document.scenes().next().unwrap().extras().as_ref().unwrap().get().to_string();
        assert_eq!(serde_json::from_str::<Value>(&extras).unwrap(), json!({ "visible": true }));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(GltfExporter::new().validate(b"{\"asset\": 3}").is_err());
    }

    #[test]
    fn large_meshes_use_u32_indices() {
        let (bytes, ty) = encode_indices(&[0, 1, 2], 70_000);
        assert_eq!((bytes.len(), ty), (12, UNSIGNED_INT));
        let (bytes, ty) = encode_indices(&[0, 1, 2], 3);
        assert_eq!((bytes.len(), ty), (6, UNSIGNED_SHORT));
    }
}
