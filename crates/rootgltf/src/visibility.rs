//! Visibility flags and shape simplification for one subpart.
//!
//! Flags live on volumes, not placements, so every operation here affects all
//! placements of the touched volume.
//!
//! A subpart is shown by opening the smallest part of the tree that reaches
//! the selected nodes: selected nodes and everything below them get
//! [`GeoAtt::VIS_THIS`]; their unselected ancestors are hidden themselves but
//! get [`GeoAtt::VIS_DAUGHTERS`] so the builder still walks down to them.

use rootgltf_geom::{GeoAtt, Geometry, Shape, VolumeKey};
use slotmap::SecondaryMap;

use crate::matcher::MatchList;

/// Segment count spheres are reduced to once they become visible.
pub const SIMPLIFIED_SPHERE_SEGMENTS: u32 = 3;

/// Coarsen round shapes: spheres drop to [`SIMPLIFIED_SPHERE_SEGMENTS`] in
/// both directions, composites are simplified operand by operand.
pub fn simplify_shape(shape: &mut Shape) {
    match shape {
        Shape::Sphere { nseg, nz, .. } => {
            *nseg = SIMPLIFIED_SPHERE_SEGMENTS;
            *nz = SIMPLIFIED_SPHERE_SEGMENTS;
        }
        Shape::Composite { left, right, .. } => {
            simplify_shape(left);
            simplify_shape(right);
        }
        _ => {}
    }
}

/// Draw the volume and simplify its shape.
pub fn set_visible(geometry: &mut Geometry, volume: VolumeKey) {
    let volume = geometry.volume_mut(volume);
    volume.att.insert(GeoAtt::VIS_THIS);
    simplify_shape(&mut volume.shape);
}

/// Let the builder walk into the volume's daughters.
pub fn set_visible_children(geometry: &mut Geometry, volume: VolumeKey) {
    geometry.volume_mut(volume).att.insert(GeoAtt::VIS_DAUGHTERS);
}

/// Stop drawing the volume itself. Daughter traversal is left as is.
pub fn set_invisible(geometry: &mut Geometry, volume: VolumeKey) {
    geometry.volume_mut(volume).att.remove(GeoAtt::VIS_THIS);
}

/// [`set_visible`] on the volume and every volume below it.
pub fn set_visible_recursive(geometry: &mut Geometry, volume: VolumeKey) {
    let mut done = SecondaryMap::new();
    let mut stack = vec![volume];
    while let Some(key) = stack.pop() {
        if done.insert(key, ()).is_some() {
            continue;
        }
        set_visible(geometry, key);
        stack.extend(geometry.volume(key).nodes.iter().map(|node| node.volume));
    }
}

/// Show only what `paths` selects below `volume`.
///
/// A daughter whose name matches is shown with its whole subtree, whatever
/// its own daughters would match. Any other daughter is hidden; if something
/// below it matches, it is opened for traversal instead. Returns whether
/// anything below `volume` matched.
pub fn select_subpart(geometry: &mut Geometry, volume: VolumeKey, paths: &MatchList) -> bool {
    let mut any_found = false;
    for index in 0..geometry.volume(volume).nodes.len() {
        let node = &geometry.volume(volume).nodes[index];
        let child = node.volume;
        if paths.matches(&node.name) {
            // recursive, deeper volumes may have been hidden by an earlier subpart
            set_visible_recursive(geometry, child);
            any_found = true;
        } else {
            set_invisible(geometry, child);
            if select_subpart(geometry, child, paths) {
                set_visible_children(geometry, child);
                any_found = true;
            }
        }
    }
    any_found
}

/// Prepare the tree for one subpart: show the top node, then select `paths`
/// below the master volume. Returns whether anything matched.
pub fn show_subpart(geometry: &mut Geometry, paths: &MatchList) -> bool {
    let master = geometry.master();
    set_visible(geometry, master);
    select_subpart(geometry, master, paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatchSpec;
    use rootgltf_geom::{BoolOp, GeometryNode, Volume};

    fn att(geometry: &Geometry, name: &str) -> GeoAtt {
        let key = geometry.find_volume(name).unwrap();
        geometry.volume(key).att
    }

    /// root -> X -> Y
    fn chain() -> Geometry {
        let mut geo = Geometry::new(Volume::assembly("root"));
        let master = geo.master();
        let x = geo.add_daughter(master, "X", Volume::new("X", Shape::cuboid(2.0, 2.0, 2.0)));
        geo.add_daughter(x, "Y", Volume::new("Y", Shape::cuboid(1.0, 1.0, 1.0)));
        geo
    }

    #[test]
    fn ancestor_of_match_is_only_traversable() {
        let mut geo = chain();
        let master = geo.master();
        set_visible(&mut geo, master);

        assert!(select_subpart(&mut geo, master, &MatchList::prefixes(["Y"])));

        assert!(att(&geo, "Y").visible_self());
        assert!(att(&geo, "X").visible_children());
        assert!(!att(&geo, "X").visible_self());
        assert_eq!(att(&geo, "root"), GeoAtt::VIS_THIS);
    }

    #[test]
    fn nothing_selected_leaves_flags_clear() {
        let mut geo = chain();
        let master = geo.master();
        assert!(!select_subpart(&mut geo, master, &MatchList::prefixes(["Z"])));
        assert_eq!(att(&geo, "X"), GeoAtt::empty());
        assert_eq!(att(&geo, "Y"), GeoAtt::empty());
    }

    #[test]
    fn matching_node_wins_over_its_daughters() {
        let mut geo = chain();
        let master = geo.master();
        let paths: MatchList = vec![MatchSpec::prefix("X"), MatchSpec::prefix("Y")].into();

        assert!(select_subpart(&mut geo, master, &paths));

        assert!(att(&geo, "X").visible_self());
        assert!(att(&geo, "Y").visible_self());
        assert!(!att(&geo, "X").visible_children());
    }

    #[test]
    fn earlier_subpart_is_overridden() {
        let mut geo = chain();
        show_subpart(&mut geo, &MatchList::prefixes(["Y"]));
        show_subpart(&mut geo, &MatchList::prefixes(["X"]));

        assert!(att(&geo, "X").visible_self());
        assert!(att(&geo, "Y").visible_self());

        show_subpart(&mut geo, &MatchList::prefixes(["Y"]));
        assert!(!att(&geo, "X").visible_self());
        assert!(att(&geo, "X").visible_children());
        assert!(att(&geo, "Y").visible_self());
    }

    #[test]
    fn invisible_keeps_other_bits() {
        let mut geo = Geometry::new(Volume::assembly("root").with_att(GeoAtt::from(0x1088u32)));
        let master = geo.master();
        set_invisible(&mut geo, master);
        assert_eq!(u32::from(geo.volume(master).att), 0x1008);
    }

    #[test]
    fn visible_simplifies_spheres_inside_composites() {
        let composite = Shape::composite(
            BoolOp::Subtraction,
            Shape::sphere(10.0),
            Shape::composite(BoolOp::Union, Shape::cuboid(1.0, 1.0, 1.0), Shape::sphere(2.0)),
        );
        let mut geo = Geometry::new(Volume::new("mirror", composite));
        let master = geo.master();

        set_visible(&mut geo, master);

        let mut spheres = 0;
        let mut stack = vec![&geo.volume(master).shape];
        while let Some(shape) = stack.pop() {
            match shape {
                Shape::Sphere { nseg, nz, .. } => {
                    spheres += 1;
                    assert_eq!((*nseg, *nz), (3, 3));
                }
                Shape::Composite { left, right, .. } => {
                    stack.push(left);
                    stack.push(right);
                }
                Shape::Box { dx, .. } => assert_eq!(*dx, 1.0),
                _ => {}
            }
        }
        assert_eq!(spheres, 2);
    }

    #[test]
    fn other_shapes_are_left_alone() {
        let tube = Shape::Tube {
            rmin: 1.0,
            rmax: 2.0,
            dz: 3.0,
            phi1: 0.0,
            phi2: 360.0,
        };
        let mut shape = tube.clone();
        simplify_shape(&mut shape);
        assert_eq!(shape, tube);
    }

    #[test]
    fn recursive_visibility_reaches_shared_volumes() {
        let mut geo = Geometry::new(Volume::assembly("World"));
        let master = geo.master();
        let station = geo.add_daughter(master, "Station_1", Volume::assembly("Station"));
        let ball = geo.add_volume(Volume::new("Ball", Shape::sphere(1.0)));
        geo.place(station, GeometryNode::new("Ball_1", ball));
        geo.place(station, GeometryNode::new("Ball_2", ball));

        assert!(show_subpart(&mut geo, &MatchList::prefixes(["Station"])));

        assert!(geo.volume(ball).att.visible_self());
        assert!(matches!(geo.volume(ball).shape, Shape::Sphere { nseg: 3, nz: 3, .. }));
    }
}
