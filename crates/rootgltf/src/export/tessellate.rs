//! Triangulation of volume shapes.
//!
//! Shapes are tessellated in their local frame: ROOT conventions, half
//! lengths, Z as the symmetry axis and angles in degrees.

use rootgltf_geom::{BoolOp, Shape};

/// A triangle mesh with flat vertex and index arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    /// Flat array of vertex positions: `[x0, y0, z0, x1, y1, z1, ...]`.
    pub vertices: Vec<f32>,
    /// Flat array of triangle indices: `[i0, i1, i2, ...]`.
    pub indices: Vec<u32>,
}

impl TriangleMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Whether the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Merge another mesh into this one.
    pub fn merge(&mut self, other: &TriangleMesh) {
        let offset = self.num_vertices() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|&i| i + offset));
    }

    /// Per-axis minimum and maximum of the vertex positions.
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        if self.vertices.is_empty() {
            return None;
        }
        let mut min = [f32::INFINITY; 3];
        let mut max = [f32::NEG_INFINITY; 3];
        for vertex in self.vertices.chunks_exact(3) {
            for i in 0..3 {
                min[i] = min[i].min(vertex[i]);
                max[i] = max[i].max(vertex[i]);
            }
        }
        Some((min, max))
    }

    fn push_vertex(&mut self, x: f64, y: f64, z: f64) -> u32 {
        let index = self.num_vertices() as u32;
        self.vertices.extend_from_slice(&[x as f32, y as f32, z as f32]);
        index
    }

    fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    fn push_quad(&mut self, a: u32, b: u32, c: u32, d: u32) {
        self.push_triangle(a, b, c);
        self.push_triangle(a, c, d);
    }
}

/// Tessellation parameters controlling mesh quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TessellationParams {
    /// Number of segments used for a full circle.
    pub circle_segments: u32,
}

impl Default for TessellationParams {
    fn default() -> Self {
        Self { circle_segments: 24 }
    }
}

impl TessellationParams {
    /// Create params from a segment count for full circles.
    pub fn from_segments(segments: u32) -> Self {
        Self {
            circle_segments: segments.max(3),
        }
    }

    /// Segments for an arc spanning `degrees`.
    pub fn arc_segments(&self, degrees: f64) -> u32 {
        let share = (degrees / 360.0).clamp(0.0, 1.0);
        ((f64::from(self.circle_segments) * share).ceil() as u32).max(1)
    }
}

/// Triangulate a shape. Unsupported shapes yield an empty mesh.
///
/// Composites are approximated: a union draws both operands, a subtraction
/// or intersection draws its left operand only.
pub fn tessellate(shape: &Shape, params: &TessellationParams) -> Result<TriangleMesh, String> {
    match shape {
        Shape::Box { dx, dy, dz } => {
            check_lengths(&[*dx, *dy, *dz])?;
            Ok(tessellate_box(*dx, *dy, *dz))
        }
        Shape::Tube {
            rmin,
            rmax,
            dz,
            phi1,
            phi2,
        } => {
            check_lengths(&[*rmin, *rmax, *dz])?;
            check_radii(*rmin, *rmax)?;
            let span = check_span(*phi1, *phi2, "phi")?;
            let ring = Ring {
                dz: *dz,
                rmin: [*rmin, *rmin],
                rmax: [*rmax, *rmax],
                phi1: *phi1,
                span,
            };
            Ok(ring.tessellate(params.arc_segments(span)))
        }
        Shape::Cone {
            dz,
            rmin1,
            rmax1,
            rmin2,
            rmax2,
        } => {
            check_lengths(&[*dz, *rmin1, *rmax1, *rmin2, *rmax2])?;
            check_radii(*rmin1, *rmax1)?;
            check_radii(*rmin2, *rmax2)?;
            let ring = Ring {
                dz: *dz,
                rmin: [*rmin1, *rmin2],
                rmax: [*rmax1, *rmax2],
                phi1: 0.0,
                span: 360.0,
            };
            Ok(ring.tessellate(params.circle_segments))
        }
        Shape::Sphere {
            rmin,
            rmax,
            theta1,
            theta2,
            phi1,
            phi2,
            nseg,
            nz,
        } => {
            check_lengths(&[*rmin, *rmax])?;
            check_radii(*rmin, *rmax)?;
            let theta_span = check_span(*theta1, *theta2, "theta")?;
            let phi_span = check_span(*phi1, *phi2, "phi")?;
            if *nseg == 0 || *nz == 0 {
                return Err(format!("sphere needs segments, got nseg={nseg} nz={nz}"));
            }
            let grid = SphereGrid {
                theta1: *theta1,
                theta_span,
                phi1: *phi1,
                phi_span,
                nseg: *nseg,
                nz: *nz,
            };
            let mut mesh = grid.shell(*rmax, false);
            if *rmin > 0.0 {
                mesh.merge(&grid.shell(*rmin, true));
            }
            Ok(mesh)
        }
        Shape::Composite { op, left, right } => {
            let mut mesh = tessellate(left, params)?;
            if *op == BoolOp::Union {
                mesh.merge(&tessellate(right, params)?);
            }
            Ok(mesh)
        }
        Shape::Unsupported => Ok(TriangleMesh::new()),
    }
}

fn check_lengths(values: &[f64]) -> Result<(), String> {
    match values.iter().find(|v| !v.is_finite() || **v < 0.0) {
        Some(value) => Err(format!("invalid length {value}")),
        None => Ok(()),
    }
}

fn check_radii(rmin: f64, rmax: f64) -> Result<(), String> {
    if rmin > rmax {
        Err(format!("inner radius {rmin} exceeds outer radius {rmax}"))
    } else {
        Ok(())
    }
}

fn check_span(from: f64, to: f64, what: &str) -> Result<f64, String> {
    let span = to - from;
    if span.is_finite() && span > 0.0 {
        Ok(span)
    } else {
        Err(format!("empty {what} range {from}..{to}"))
    }
}

fn tessellate_box(dx: f64, dy: f64, dz: f64) -> TriangleMesh {
    let mut mesh = TriangleMesh::new();
    for &z in &[-dz, dz] {
        for &(x, y) in &[(-dx, -dy), (dx, -dy), (dx, dy), (-dx, dy)] {
            mesh.push_vertex(x, y, z);
        }
    }
    // bottom, top, then the four sides, counter-clockwise seen from outside
    mesh.push_quad(0, 3, 2, 1);
    mesh.push_quad(4, 5, 6, 7);
    for i in 0..4 {
        let j = (i + 1) % 4;
        mesh.push_quad(i, j, j + 4, i + 4);
    }
    mesh
}

/// Tube, tube segment or cone: a solid of revolution between `-dz` and `+dz`.
struct Ring {
    dz: f64,
    /// Inner radius at `-dz` and `+dz`.
    rmin: [f64; 2],
    /// Outer radius at `-dz` and `+dz`.
    rmax: [f64; 2],
    phi1: f64,
    span: f64,
}

impl Ring {
    fn tessellate(&self, segments: u32) -> TriangleMesh {
        let mut mesh = TriangleMesh::new();
        let hollow = self.rmin[0] > 0.0 || self.rmin[1] > 0.0;
        let full = self.span >= 360.0;

        // per boundary: outer bottom, outer top, inner bottom, inner top
        let mut columns = Vec::with_capacity(segments as usize + 1);
        for i in 0..=segments {
            let phi = (self.phi1 + self.span * f64::from(i) / f64::from(segments)).to_radians();
            let (sin, cos) = phi.sin_cos();
            columns.push([
                mesh.push_vertex(self.rmax[0] * cos, self.rmax[0] * sin, -self.dz),
                mesh.push_vertex(self.rmax[1] * cos, self.rmax[1] * sin, self.dz),
                mesh.push_vertex(self.rmin[0] * cos, self.rmin[0] * sin, -self.dz),
                mesh.push_vertex(self.rmin[1] * cos, self.rmin[1] * sin, self.dz),
            ]);
        }

        for pair in columns.windows(2) {
            let [ob0, ot0, ib0, it0] = pair[0];
            let [ob1, ot1, ib1, it1] = pair[1];
            mesh.push_quad(ob0, ob1, ot1, ot0);
            if hollow {
                mesh.push_quad(ib1, ib0, it0, it1);
                mesh.push_quad(ib0, ib1, ob1, ob0);
                mesh.push_quad(it1, it0, ot0, ot1);
            } else {
                mesh.push_triangle(ib0, ob1, ob0);
                mesh.push_triangle(it0, ot0, ot1);
            }
        }

        if !full {
            let [ob, ot, ib, it] = columns[0];
            mesh.push_quad(ib, it, ot, ob);
            let [ob, ot, ib, it] = columns[columns.len() - 1];
            mesh.push_quad(ob, ot, it, ib);
        }
        mesh
    }
}

/// Latitude/longitude grid over a sphere sector.
struct SphereGrid {
    theta1: f64,
    theta_span: f64,
    phi1: f64,
    phi_span: f64,
    nseg: u32,
    nz: u32,
}

impl SphereGrid {
    /// One spherical surface, `nz` x `nseg` cells of two triangles each.
    fn shell(&self, radius: f64, inward: bool) -> TriangleMesh {
        let mut mesh = TriangleMesh::new();
        let stride = self.nseg + 1;
        for i in 0..=self.nz {
            let theta = (self.theta1 + self.theta_span * f64::from(i) / f64::from(self.nz)).to_radians();
            let (sin_t, cos_t) = theta.sin_cos();
            for j in 0..=self.nseg {
                let phi = (self.phi1 + self.phi_span * f64::from(j) / f64::from(self.nseg)).to_radians();
                let (sin_p, cos_p) = phi.sin_cos();
                mesh.push_vertex(radius * sin_t * cos_p, radius * sin_t * sin_p, radius * cos_t);
            }
        }
        for i in 0..self.nz {
            for j in 0..self.nseg {
                let a = i * stride + j;
                let b = a + 1;
                let c = a + stride + 1;
                let d = a + stride;
                if inward {
                    mesh.push_quad(a, b, c, d);
                } else {
                    mesh.push_quad(a, d, c, b);
                }
            }
        }
        mesh
    }
}
