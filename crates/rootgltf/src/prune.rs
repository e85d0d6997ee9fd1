//! Destructive removal of hidden and too-deep placements.

use rootgltf_geom::{Geometry, VolumeKey};

use crate::matcher::MatchList;

/// Outcome of a [`prune`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    /// Placements removed from their mother volumes.
    pub removed: usize,
}

/// Drop every placement whose name matches `hidden` or whose depth is at
/// least `max_depth`, starting with the master volume's daughters at depth 0.
///
/// The filter is applied in place and keeps the order of survivors. Running
/// it again with the same arguments removes nothing.
pub fn prune(geometry: &mut Geometry, hidden: &MatchList, max_depth: usize) -> PruneStats {
    let mut stats = PruneStats::default();
    let master = geometry.master();
    prune_volume(geometry, master, hidden, max_depth, 0, &mut stats);
    stats
}

fn prune_volume(
    geometry: &mut Geometry,
    key: VolumeKey,
    hidden: &MatchList,
    max_depth: usize,
    depth: usize,
    stats: &mut PruneStats,
) {
    let volume = geometry.volume_mut(key);
    let before = volume.nodes.len();
    volume
        .nodes
        .retain(|node| depth < max_depth && !hidden.matches(&node.name));
    stats.removed += before - volume.nodes.len();

    let survivors: Vec<VolumeKey> = volume.nodes.iter().map(|node| node.volume).collect();
    for child in survivors {
        prune_volume(geometry, child, hidden, max_depth, depth + 1, stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatchSpec;
    use rootgltf_geom::{GeometryNode, Shape, Volume};

    fn names(geometry: &Geometry, key: VolumeKey) -> Vec<&str> {
        geometry
            .volume(key)
            .nodes
            .iter()
            .map(|node| node.name.as_str())
            .collect()
    }

    /// World -> [A_1 -> [A1_1 -> [Deep_1]], B_1, C_1]
    fn tree() -> Geometry {
        let mut geo = Geometry::new(Volume::assembly("World"));
        let master = geo.master();
        let a = geo.add_daughter(master, "A_1", Volume::assembly("A"));
        geo.add_daughter(master, "B_1", Volume::new("B", Shape::cuboid(1.0, 1.0, 1.0)));
        geo.add_daughter(master, "C_1", Volume::new("C", Shape::sphere(1.0)));
        let a1 = geo.add_daughter(a, "A1_1", Volume::assembly("A1"));
        geo.add_daughter(a1, "Deep_1", Volume::new("Deep", Shape::cuboid(0.1, 0.1, 0.1)));
        geo
    }

    fn max_surviving_depth(geometry: &Geometry) -> Option<usize> {
        let mut deepest = None;
        let mut stack = vec![(geometry.master(), 0usize)];
        while let Some((key, depth)) = stack.pop() {
            for node in &geometry.volume(key).nodes {
                deepest = deepest.max(Some(depth));
                stack.push((node.volume, depth + 1));
            }
        }
        deepest
    }

    #[test]
    fn hidden_sibling_is_removed() {
        let mut geo = Geometry::new(Volume::assembly("root"));
        let master = geo.master();
        geo.add_daughter(master, "A", Volume::assembly("A"));
        geo.add_daughter(master, "B", Volume::assembly("B"));

        let stats = prune(&mut geo, &MatchList::prefixes(["B"]), 999);

        assert_eq!(stats.removed, 1);
        assert_eq!(names(&geo, master), ["A"]);
    }

    #[test]
    fn hidden_match_removes_whole_subtree() {
        let mut geo = tree();
        let stats = prune(&mut geo, &MatchList::prefixes(["A_"]), usize::MAX);
        assert_eq!(stats.removed, 1);
        assert_eq!(names(&geo, geo.master()), ["B_1", "C_1"]);
        assert_eq!(geo.stats().placements, 2);
    }

    #[test]
    fn pattern_hides_nested_nodes() {
        let mut geo = tree();
        let hidden: MatchList = vec![MatchSpec::pattern("^Deep").unwrap()].into();
        prune(&mut geo, &hidden, usize::MAX);
        assert_eq!(geo.stats().depth, 2);
        assert_eq!(geo.stats().placements, 4);
    }

    #[test]
    fn depth_limit_is_exclusive() {
        for limit in 0..4 {
            let mut geo = tree();
            prune(&mut geo, &MatchList::new(), limit);
            match max_surviving_depth(&geo) {
                Some(depth) => assert!(depth < limit, "depth {depth} survived limit {limit}"),
                None => assert_eq!(limit, 0),
            }
        }
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let mut geo = tree();
        let hidden = MatchList::prefixes(["C", "Deep"]);
        let first = prune(&mut geo, &hidden, 2);
        let snapshot = geo.to_dump();

        let second = prune(&mut geo, &hidden, 2);

        assert!(first.removed > 0);
        assert_eq!(second.removed, 0);
        assert_eq!(geo.to_dump(), snapshot);
    }

    #[test]
    fn shared_volume_is_pruned_for_every_placement() {
        let mut geo = Geometry::new(Volume::assembly("World"));
        let master = geo.master();
        let module = geo.add_volume(Volume::assembly("Module"));
        geo.add_daughter(module, "Sensor_1", Volume::new("Sensor", Shape::cuboid(1.0, 1.0, 0.1)));
        geo.add_daughter(module, "Cable_1", Volume::assembly("Cable"));
        geo.place(master, GeometryNode::new("Module_1", module));
        geo.place(master, GeometryNode::new("Module_2", module));

        prune(&mut geo, &MatchList::prefixes(["Cable"]), usize::MAX);

        for node in &geo.volume(master).nodes {
            assert_eq!(names(&geo, node.volume), ["Sensor_1"]);
        }
    }
}
