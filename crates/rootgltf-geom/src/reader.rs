//! JSON geometry dumps.
//!
//! A dump file holds one or more named geometry objects, mirroring the keys
//! of a ROOT file (`"Default;1"`, `"Default;2"`, ...):
//!
//! ```json
//! {
//!   "objects": {
//!     "Default;1": {
//!       "master": "World",
//!       "volumes": [
//!         { "name": "World", "shape": { "type": "Box", "dx": 10, "dy": 10, "dz": 10 },
//!           "nodes": [ { "name": "Ecal_1", "volume": "Ecal", "translation": [0, 0, 5] } ] },
//!         { "name": "Ecal", "shape": { "type": "Tube", "rmax": 4, "dz": 1 }, "material": "Lead" }
//!       ]
//!     }
//!   }
//! }
//! ```
//!
//! Volumes are referenced by name, so placing the same name twice shares the
//! volume between both placements.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

use crate::error::{GeometryError, Result};
use crate::{GeoAtt, Geometry, GeometryNode, Placement, Shape, Volume, VolumeKey};

/// A dump file: named geometry objects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeometryFile {
    /// Objects keyed by name, optionally suffixed with `;cycle`.
    pub objects: BTreeMap<String, GeometryDump>,
}

/// One geometry object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryDump {
    /// Name of the master volume.
    pub master: String,
    /// Name of the top node; `<master>_1` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<String>,
    /// All volumes, each listed once.
    pub volumes: Vec<VolumeDump>,
}

/// Serialized form of a [`Volume`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeDump {
    /// Unique volume name.
    pub name: String,
    /// Solid shape.
    pub shape: Shape,
    /// Attribute bits; ROOT's default when absent.
    #[serde(default = "default_att")]
    pub att: GeoAtt,
    /// Material name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    /// RGB color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<[f32; 3]>,
    /// Daughter placements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<NodeDump>,
}

/// Serialized form of a [`GeometryNode`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDump {
    /// Placement name.
    pub name: String,
    /// Name of the placed volume.
    pub volume: String,
    /// Position in the mother frame.
    #[serde(flatten)]
    pub placement: Placement,
}

fn default_att() -> GeoAtt {
    GeoAtt::ROOT_DEFAULT
}

impl GeometryFile {
    /// Take the object stored under `name`.
    ///
    /// An exact key wins; otherwise the `name;N` key with the highest cycle is used.
    pub fn take_object(&mut self, name: &str) -> Result<GeometryDump> {
        if let Some(dump) = self.objects.remove(name) {
            return Ok(dump);
        }
        let key = self
            .objects
            .keys()
            .filter_map(|key| {
                let (base, cycle) = key.rsplit_once(';')?;
                let cycle: u32 = cycle.parse().ok()?;
                (base == name).then_some((cycle, key.clone()))
            })
            .max()
            .map(|(_, key)| key)
            .ok_or_else(|| GeometryError::ObjectNotFound(name.to_string()))?;
        self.objects
            .remove(&key)
            .ok_or_else(|| GeometryError::ObjectNotFound(name.to_string()))
    }
}

impl GeometryDump {
    /// Resolve volume names into an arena-backed [`Geometry`].
    pub fn into_geometry(self) -> Result<Geometry> {
        let mut by_name: HashMap<String, usize> = HashMap::with_capacity(self.volumes.len());
        for (index, volume) in self.volumes.iter().enumerate() {
            if by_name.insert(volume.name.clone(), index).is_some() {
                return Err(GeometryError::DuplicateVolume(volume.name.clone()));
            }
        }
        let master_index = *by_name
            .get(&self.master)
            .ok_or_else(|| GeometryError::MissingMaster(self.master.clone()))?;

        let mut pending: Vec<(Volume, Vec<NodeDump>)> = self
            .volumes
            .into_iter()
            .map(|dump| {
                let volume = Volume {
                    name: dump.name,
                    shape: dump.shape,
                    att: dump.att,
                    material: dump.material,
                    color: dump.color,
                    nodes: Vec::new(),
                };
                (volume, dump.nodes)
            })
            .collect();

        let (master, mut master_nodes) = std::mem::replace(
            &mut pending[master_index],
            (Volume::assembly(""), Vec::new()),
        );
        let top_name = self.top.unwrap_or_else(|| format!("{}_1", master.name));
        let mut geometry = Geometry::with_top_name(master, top_name);

        let mut keys = Vec::with_capacity(pending.len());
        let mut daughters = Vec::with_capacity(pending.len());
        for (index, (volume, nodes)) in pending.into_iter().enumerate() {
            if index == master_index {
                keys.push(geometry.master());
                daughters.push(std::mem::take(&mut master_nodes));
            } else {
                keys.push(geometry.add_volume(volume));
                daughters.push(nodes);
            }
        }

        for (index, nodes) in daughters.into_iter().enumerate() {
            for node in nodes {
                let child = by_name
                    .get(&node.volume)
                    .map(|&i| keys[i])
                    .ok_or_else(|| GeometryError::UnknownVolume {
                        node: node.name.clone(),
                        volume: node.volume.clone(),
                    })?;
                geometry.place(
                    keys[index],
                    GeometryNode {
                        name: node.name,
                        volume: child,
                        placement: node.placement,
                    },
                );
            }
        }

        check_acyclic(&geometry)?;
        Ok(geometry)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Open,
    Done,
}

/// Reject geometries in which a volume contains itself.
fn check_acyclic(geometry: &Geometry) -> Result<()> {
    let mut marks: SecondaryMap<VolumeKey, Mark> = SecondaryMap::new();
    for (root, _) in geometry.volumes() {
        if marks.contains_key(root) {
            continue;
        }
        // (volume, index of the next daughter to visit)
        let mut stack = vec![(root, 0usize)];
        marks.insert(root, Mark::Open);
        while let Some((key, next)) = stack.pop() {
            let nodes = &geometry.volume(key).nodes;
            if next == nodes.len() {
                marks.insert(key, Mark::Done);
                continue;
            }
            stack.push((key, next + 1));
            let child = nodes[next].volume;
            match marks.get(child) {
                Some(Mark::Open) => {
                    return Err(GeometryError::Cycle(geometry.volume(child).name.clone()))
                }
                Some(Mark::Done) => {}
                None => {
                    marks.insert(child, Mark::Open);
                    stack.push((child, 0));
                }
            }
        }
    }
    Ok(())
}

impl Geometry {
    /// Serialize into dump form. Volumes not reachable from the top node are omitted.
    pub fn to_dump(&self) -> GeometryDump {
        let reachable = self.reachable();
        let volumes = self
            .volumes()
            .filter(|(key, _)| reachable.contains_key(*key))
            .map(|(_, volume)| VolumeDump {
                name: volume.name.clone(),
                shape: volume.shape.clone(),
                att: volume.att,
                material: volume.material.clone(),
                color: volume.color,
                nodes: volume
                    .nodes
                    .iter()
                    .map(|node| NodeDump {
                        name: node.name.clone(),
                        volume: self.volume(node.volume).name.clone(),
                        placement: node.placement,
                    })
                    .collect(),
            })
            .collect();
        GeometryDump {
            master: self.volume(self.master()).name.clone(),
            top: Some(self.top().name.clone()),
            volumes,
        }
    }

    /// Serialize a single object to pretty JSON.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_dump())
    }

    /// Parse a single object (a bare [`GeometryDump`]) from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let dump: GeometryDump = serde_json::from_str(json)?;
        dump.into_geometry()
    }
}

/// Parse a dump file and extract the named object.
pub fn parse_geometry(json: &str, object: &str) -> Result<Geometry> {
    let mut file: GeometryFile = serde_json::from_str(json)?;
    file.take_object(object)?.into_geometry()
}

/// Read a dump file from disk and extract the named object.
pub fn read_geometry(path: impl AsRef<Path>, object: &str) -> Result<Geometry> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|source| GeometryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_geometry(&json, object)
}
