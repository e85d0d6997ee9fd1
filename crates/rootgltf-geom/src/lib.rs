#![warn(missing_docs)]

//! In-memory ROOT detector geometry for the rootgltf converter.
//!
//! A [`Geometry`] is a tree of placed [`GeometryNode`]s. Each node refers to a
//! [`Volume`] by [`VolumeKey`]; volumes live in an arena owned by the geometry,
//! so the same volume may be placed many times and every placement observes
//! mutations of its flags or shape.
//!
//! The tree holds shapes, placements and visibility attributes but no
//! triangles; tessellation is handled by the converter.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SecondaryMap, SlotMap};

pub mod error;
pub mod reader;

pub use error::{GeometryError, Result};
pub use reader::{parse_geometry, read_geometry, GeometryDump, GeometryFile, NodeDump, VolumeDump};

new_key_type! {
    /// Stable handle of a [`Volume`] inside a [`Geometry`].
    pub struct VolumeKey;
}

bitflags! {
    /// Geometry attribute bits, numerically compatible with ROOT's `fGeoAtt`.
    ///
    /// Only the two visibility bits carry meaning here; every other bit is
    /// kept as read.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GeoAtt: u32 {
        /// Daughters of the volume are traversed (`kVisDaughters`).
        const VIS_DAUGHTERS = 0x08;
        /// The volume itself is drawn (`kVisThis`).
        const VIS_THIS = 0x80;

        const _ = !0;
    }
}

impl GeoAtt {
    /// Attributes ROOT gives a freshly created volume: drawn, daughters drawn.
    pub const ROOT_DEFAULT: GeoAtt = GeoAtt::VIS_THIS.union(GeoAtt::VIS_DAUGHTERS);

    /// Whether the volume itself is drawn.
    pub fn visible_self(self) -> bool {
        self.contains(GeoAtt::VIS_THIS)
    }

    /// Whether the daughters of the volume are traversed.
    pub fn visible_children(self) -> bool {
        self.contains(GeoAtt::VIS_DAUGHTERS)
    }
}

impl Default for GeoAtt {
    fn default() -> Self {
        GeoAtt::empty()
    }
}

impl From<u32> for GeoAtt {
    fn from(bits: u32) -> Self {
        GeoAtt::from_bits_retain(bits)
    }
}

impl From<GeoAtt> for u32 {
    fn from(att: GeoAtt) -> Self {
        att.bits()
    }
}

impl Serialize for GeoAtt {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for GeoAtt {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        u32::deserialize(deserializer).map(GeoAtt::from_bits_retain)
    }
}

/// Boolean operator of a [`Shape::Composite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOp {
    /// Left ∪ right.
    Union,
    /// Left minus right.
    Subtraction,
    /// Left ∩ right.
    Intersection,
}

fn full_turn() -> f64 {
    360.0
}

fn half_turn() -> f64 {
    180.0
}

fn default_sphere_nseg() -> u32 {
    20
}

fn default_sphere_nz() -> u32 {
    11
}

/// Solid shape of a volume. Lengths are half lengths, angles in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Shape {
    /// Axis-aligned box centered at origin.
    Box {
        /// Half length along X.
        dx: f64,
        /// Half length along Y.
        dy: f64,
        /// Half length along Z.
        dz: f64,
    },
    /// Tube (optionally a phi segment of one) along Z.
    Tube {
        /// Inner radius.
        #[serde(default)]
        rmin: f64,
        /// Outer radius.
        rmax: f64,
        /// Half length along Z.
        dz: f64,
        /// Start angle.
        #[serde(default)]
        phi1: f64,
        /// End angle.
        #[serde(default = "full_turn")]
        phi2: f64,
    },
    /// Conical shell along Z, `-dz` end first.
    Cone {
        /// Half length along Z.
        dz: f64,
        /// Inner radius at `-dz`.
        #[serde(default)]
        rmin1: f64,
        /// Outer radius at `-dz`.
        rmax1: f64,
        /// Inner radius at `+dz`.
        #[serde(default)]
        rmin2: f64,
        /// Outer radius at `+dz`.
        rmax2: f64,
    },
    /// Spherical shell sector.
    Sphere {
        /// Inner radius.
        #[serde(default)]
        rmin: f64,
        /// Outer radius.
        rmax: f64,
        /// Start polar angle.
        #[serde(default)]
        theta1: f64,
        /// End polar angle.
        #[serde(default = "half_turn")]
        theta2: f64,
        /// Start azimuth.
        #[serde(default)]
        phi1: f64,
        /// End azimuth.
        #[serde(default = "full_turn")]
        phi2: f64,
        /// Number of azimuthal segments.
        #[serde(default = "default_sphere_nseg")]
        nseg: u32,
        /// Number of polar segments.
        #[serde(default = "default_sphere_nz")]
        nz: u32,
    },
    /// Boolean combination of two shapes.
    Composite {
        /// Combining operator.
        op: BoolOp,
        /// Left operand.
        left: Box<Shape>,
        /// Right operand.
        right: Box<Shape>,
    },
    /// Any shape kind the converter does not model.
    #[serde(other)]
    Unsupported,
}

impl Shape {
    /// Sphere of radius `r` with ROOT's default segmentation.
    pub fn sphere(r: f64) -> Self {
        Shape::Sphere {
            rmin: 0.0,
            rmax: r,
            theta1: 0.0,
            theta2: half_turn(),
            phi1: 0.0,
            phi2: full_turn(),
            nseg: default_sphere_nseg(),
            nz: default_sphere_nz(),
        }
    }

    /// Box with the given half lengths.
    pub fn cuboid(dx: f64, dy: f64, dz: f64) -> Self {
        Shape::Box { dx, dy, dz }
    }

    /// Combine two shapes.
    pub fn composite(op: BoolOp, left: Shape, right: Shape) -> Self {
        Shape::Composite {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

/// Local placement of a node inside its parent volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Translation of the daughter origin in the mother frame.
    #[serde(default)]
    pub translation: [f64; 3],
    /// Row-major 3x3 rotation matrix.
    #[serde(default = "identity_rotation")]
    pub rotation: [f64; 9],
}

fn identity_rotation() -> [f64; 9] {
    [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            translation: [0.0; 3],
            rotation: identity_rotation(),
        }
    }
}

impl Placement {
    /// Pure translation.
    pub fn translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            translation: [x, y, z],
            ..Self::default()
        }
    }

    /// Whether this placement leaves coordinates unchanged.
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}

/// A placed instance of a volume inside its mother volume.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryNode {
    /// Node name (e.g. `"Ecal_1"`); not unique across the tree.
    pub name: String,
    /// The placed volume.
    pub volume: VolumeKey,
    /// Position in the mother frame.
    pub placement: Placement,
}

impl GeometryNode {
    /// Node at the mother origin.
    pub fn new(name: impl Into<String>, volume: VolumeKey) -> Self {
        Self {
            name: name.into(),
            volume,
            placement: Placement::default(),
        }
    }
}

/// Reusable solid definition with its daughters.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    /// Volume name.
    pub name: String,
    /// Solid shape.
    pub shape: Shape,
    /// Visibility and other attribute bits.
    pub att: GeoAtt,
    /// Material (medium) name, used for default coloring.
    pub material: Option<String>,
    /// Explicit RGB color in 0.0..1.0.
    pub color: Option<[f32; 3]>,
    /// Daughter placements, in declaration order.
    pub nodes: Vec<GeometryNode>,
}

impl Volume {
    /// Create a volume with cleared attributes and no daughters.
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            att: GeoAtt::empty(),
            material: None,
            color: None,
            nodes: Vec::new(),
        }
    }

    /// Volume used only to hold daughters.
    pub fn assembly(name: impl Into<String>) -> Self {
        Self::new(name, Shape::Unsupported)
    }

    /// Set the material name.
    pub fn with_material(mut self, material: impl Into<String>) -> Self {
        self.material = Some(material.into());
        self
    }

    /// Set the attribute bits.
    pub fn with_att(mut self, att: GeoAtt) -> Self {
        self.att = att;
        self
    }

    /// Whether the volume has no daughters.
    pub fn is_leaf(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Counts gathered by walking the tree from the top node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Placements reachable below the master volume (shared volumes counted per placement).
    pub placements: usize,
    /// Distinct volumes reachable from the top node, master included.
    pub volumes: usize,
    /// Number of placement levels below the master volume.
    pub depth: usize,
}

/// A complete geometry: volume arena plus the top node placing the master volume.
#[derive(Debug, Clone)]
pub struct Geometry {
    volumes: SlotMap<VolumeKey, Volume>,
    top: GeometryNode,
}

impl Geometry {
    /// Create a geometry around its master volume. The top node is named `<master>_1`.
    pub fn new(master: Volume) -> Self {
        let top_name = format!("{}_1", master.name);
        Self::with_top_name(master, top_name)
    }

    /// Create a geometry with an explicit top node name.
    pub fn with_top_name(master: Volume, top_name: impl Into<String>) -> Self {
        let mut volumes = SlotMap::with_key();
        let key = volumes.insert(master);
        Self {
            volumes,
            top: GeometryNode::new(top_name, key),
        }
    }

    /// The node placing the master volume.
    pub fn top(&self) -> &GeometryNode {
        &self.top
    }

    /// Key of the master volume.
    pub fn master(&self) -> VolumeKey {
        self.top.volume
    }

    /// Add a volume to the arena without placing it.
    pub fn add_volume(&mut self, volume: Volume) -> VolumeKey {
        self.volumes.insert(volume)
    }

    /// Append a daughter placement of `child` to `mother`.
    ///
    /// # Panics
    ///
    /// Panics if `mother` does not belong to this geometry.
    pub fn place(&mut self, mother: VolumeKey, node: GeometryNode) {
        self.volumes[mother].nodes.push(node);
    }

    /// Add `volume` and place it once in `mother` under `name`.
    pub fn add_daughter(&mut self, mother: VolumeKey, name: impl Into<String>, volume: Volume) -> VolumeKey {
        let key = self.add_volume(volume);
        self.place(mother, GeometryNode::new(name, key));
        key
    }

    /// Borrow a volume.
    ///
    /// # Panics
    ///
    /// Panics if `key` does not belong to this geometry.
    pub fn volume(&self, key: VolumeKey) -> &Volume {
        &self.volumes[key]
    }

    /// Mutably borrow a volume.
    ///
    /// # Panics
    ///
    /// Panics if `key` does not belong to this geometry.
    pub fn volume_mut(&mut self, key: VolumeKey) -> &mut Volume {
        &mut self.volumes[key]
    }

    /// Look up a volume, returning `None` for foreign or reclaimed keys.
    pub fn get(&self, key: VolumeKey) -> Option<&Volume> {
        self.volumes.get(key)
    }

    /// Iterate all volumes in the arena, reachable or not.
    pub fn volumes(&self) -> impl Iterator<Item = (VolumeKey, &Volume)> {
        self.volumes.iter()
    }

    /// Number of volumes in the arena.
    pub fn volume_count(&self) -> usize {
        self.volumes.len()
    }

    /// First volume with the given name.
    pub fn find_volume(&self, name: &str) -> Option<VolumeKey> {
        self.volumes
            .iter()
            .find(|(_, volume)| volume.name == name)
            .map(|(key, _)| key)
    }

    /// Keys of all volumes reachable from the top node.
    pub fn reachable(&self) -> SecondaryMap<VolumeKey, ()> {
        let mut seen = SecondaryMap::new();
        let mut stack = vec![self.master()];
        while let Some(key) = stack.pop() {
            if seen.insert(key, ()).is_some() {
                continue;
            }
            stack.extend(self.volumes[key].nodes.iter().map(|node| node.volume));
        }
        seen
    }

    /// Drop volumes no longer reachable from the top node. Returns how many were dropped.
    pub fn retain_reachable(&mut self) -> usize {
        let reachable = self.reachable();
        let before = self.volumes.len();
        self.volumes.retain(|key, _| reachable.contains_key(key));
        before - self.volumes.len()
    }

    /// Walk the tree and count placements, distinct volumes and depth.
    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats {
            volumes: self.reachable().len(),
            ..TreeStats::default()
        };
        let mut stack = vec![(self.master(), 0usize)];
        while let Some((key, depth)) = stack.pop() {
            for node in &self.volumes[key].nodes {
                stats.placements += 1;
                stats.depth = stats.depth.max(depth + 1);
                stack.push((node.volume, depth + 1));
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> (Geometry, VolumeKey, VolumeKey) {
        let mut geo = Geometry::new(Volume::assembly("World"));
        let master = geo.master();
        let module = geo.add_volume(Volume::new("Module", Shape::cuboid(1.0, 1.0, 1.0)));
        let station = geo.add_daughter(master, "Station_1", Volume::assembly("Station"));
        geo.place(station, GeometryNode::new("Module_1", module));
        geo.place(station, GeometryNode::new("Module_2", module));
        (geo, station, module)
    }

    #[test]
    fn top_node_places_master() {
        let (geo, _, _) = detector();
        assert_eq!(geo.top().name, "World_1");
        assert_eq!(geo.volume(geo.master()).name, "World");
    }

    #[test]
    fn shared_volume_is_aliased() {
        let (mut geo, station, module) = detector();
        geo.volume_mut(module).att.insert(GeoAtt::VIS_THIS);
        let placements = &geo.volume(station).nodes;
        assert!(placements
            .iter()
            .all(|node| geo.volume(node.volume).att.visible_self()));
    }

    #[test]
    fn stats_count_placements() {
        let (geo, _, _) = detector();
        let stats = geo.stats();
        assert_eq!(stats.placements, 3);
        assert_eq!(stats.volumes, 3);
        assert_eq!(stats.depth, 2);
    }

    #[test]
    fn retain_reachable_keeps_placed_volumes() {
        let (mut geo, station, module) = detector();
        let orphan = geo.add_volume(Volume::new("Orphan", Shape::Unsupported));
        geo.volume_mut(station).nodes.truncate(1);

        assert_eq!(geo.retain_reachable(), 1);
        assert!(geo.get(orphan).is_none());
        assert!(geo.get(module).is_some());
    }

    #[test]
    fn geo_att_preserves_unknown_bits() {
        let mut att = GeoAtt::from(0x8f88u32);
        att.remove(GeoAtt::VIS_THIS);
        assert_eq!(u32::from(att), 0x8f08);
        assert!(att.visible_children());
        assert!(!att.visible_self());
    }

    #[test]
    fn geo_att_serializes_as_number() {
        let json = serde_json::to_string(&GeoAtt::ROOT_DEFAULT).unwrap();
        assert_eq!(json, "136");
        let att: GeoAtt = serde_json::from_str("8").unwrap();
        assert_eq!(att, GeoAtt::VIS_DAUGHTERS);
    }

    #[test]
    fn unknown_shape_kind_is_unsupported() {
        let shape: Shape = serde_json::from_str(r#"{"type":"Paraboloid"}"#).unwrap();
        assert_eq!(shape, Shape::Unsupported);
    }

    #[test]
    fn sphere_defaults_match_root() {
        let shape: Shape = serde_json::from_str(r#"{"type":"Sphere","rmax":2.0}"#).unwrap();
        assert_eq!(shape, Shape::sphere(2.0));
    }
}
