//! Merging of structurally identical materials and meshes.
//!
//! The exporter writes one material and one mesh per drawn object, so a
//! detector with thousands of identical modules produces thousands of
//! identical records. [`deduplicate`] keeps the first occurrence of each
//! distinct record and points every reference at it.
//!
//! Two records are identical when their canonical JSON forms (object keys
//! sorted, no whitespace) are equal. Merging is global: identical records are
//! merged wherever they appear in the list.

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::document::InterchangeDocument;
use crate::error::DedupError;

/// Record counts before and after deduplication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupStats {
    /// Materials in the input document.
    pub materials_before: usize,
    /// Materials kept.
    pub materials_after: usize,
    /// Meshes in the input document.
    pub meshes_before: usize,
    /// Meshes kept.
    pub meshes_after: usize,
    /// Accessors, left untouched.
    pub accessors: usize,
}

/// Merge identical materials, then identical meshes, rewriting every
/// primitive's `material` and every node's `mesh`.
///
/// Materials go first so that meshes differing only by which of two equal
/// materials they used become equal themselves. On error the document is
/// dropped and nothing partial is returned.
pub fn deduplicate(
    mut doc: InterchangeDocument,
) -> Result<(InterchangeDocument, DedupStats), DedupError> {
    doc.check_references()?;

    let mut stats = DedupStats {
        materials_before: doc.materials.len(),
        meshes_before: doc.meshes.len(),
        accessors: doc.accessors.len(),
        ..DedupStats::default()
    };
    info!(
        materials = stats.materials_before,
        meshes = stats.meshes_before,
        accessors = stats.accessors,
        "deduplicating document"
    );

    let (materials, material_map) = merge_identical(std::mem::take(&mut doc.materials), "material")?;
    doc.materials = materials;
    for primitive in doc.meshes.iter_mut().flat_map(|mesh| mesh.primitives.iter_mut()) {
        if let Some(index) = primitive.material.as_mut() {
            *index = material_map[*index];
        }
    }

    let (meshes, mesh_map) = merge_identical(std::mem::take(&mut doc.meshes), "mesh")?;
    doc.meshes = meshes;
    // The scene forest is index based; visiting every node record covers all depths.
    for node in &mut doc.nodes {
        if let Some(index) = node.mesh.as_mut() {
            *index = mesh_map[*index];
        }
    }

    stats.materials_after = doc.materials.len();
    stats.meshes_after = doc.meshes.len();
    info!(
        materials = stats.materials_after,
        meshes = stats.meshes_after,
        accessors = stats.accessors,
        "deduplicated document"
    );
    Ok((doc, stats))
}

/// Keep the first occurrence of each distinct record. Returns the kept
/// records and, for every input index, the index of its kept copy.
fn merge_identical<T: Serialize>(
    records: Vec<T>,
    kind: &'static str,
) -> Result<(Vec<T>, Vec<usize>), DedupError> {
    let mut seen: HashMap<String, usize> = HashMap::with_capacity(records.len());
    let mut kept = Vec::new();
    let mut remap = Vec::with_capacity(records.len());

    for (index, record) in records.into_iter().enumerate() {
        let key = canonical_form(&record)
            .map_err(|source| DedupError::Canonicalize { kind, index, source })?;
        let target = *seen.entry(key).or_insert_with(|| {
            kept.push(record);
            kept.len() - 1
        });
        remap.push(target);
    }
    Ok((kept, remap))
}

/// Compact JSON with object keys sorted at every level.
pub fn canonical_form<T: Serialize>(record: &T) -> serde_json::Result<String> {
    let value = serde_json::to_value(record)?;
    let mut out = String::new();
    write_canonical(&value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut String) -> serde_json::Result<()> {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(item, out)?;
            }
            out.push('}');
        }
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
    Ok(())
}
