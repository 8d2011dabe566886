//! Faceted Mesh Kernel Backend
//!
//! Pure Rust reference kernel. Curves are discretized to a chord tolerance,
//! planar regions are geo polygons, and solids are triangle meshes combined
//! with BSP trees.
//!
//! Note: results are faceted approximations; there is no exact-arithmetic
//! robustness for degenerate configurations.

mod bsp;
mod geometry;
mod loft;
mod planar;

use std::collections::HashMap;
use std::sync::Arc;

use glam::{DAffine3, DVec2, DVec3};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use self::geometry::{
    Geometry, JOIN_TOLERANCE, PlanarFace, Polyline, TriMesh, arc_segments, arc_sweep,
    circumcenter, open_ring, region_from_rings, ring_placement,
};
use self::planar::RegionOp;
use super::{
    Aabb, CadError, CadResult, FaceWires, GeometryKernel, KernelOutcome, Shape, ShapeKind,
    TessellatedMesh,
};

/// Discretization settings of the faceted kernel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshKernelConfig {
    /// Maximum distance between an arc and its chords
    pub chord_tolerance: f64,
    /// Minimum number of segments for a full circle
    pub min_circle_segments: usize,
    /// Intermediate rings inserted between sections of a smooth loft
    pub loft_smoothing_steps: usize,
    /// Deepest midpoint split applied to one facet when tessellating
    pub max_refinement_depth: u32,
}

impl Default for MeshKernelConfig {
    fn default() -> Self {
        Self {
            chord_tolerance: 5e-3,
            min_circle_segments: 16,
            loft_smoothing_steps: 4,
            max_refinement_depth: 6,
        }
    }
}

/// Faceted geometry kernel
pub struct MeshKernel {
    config: MeshKernelConfig,
    /// Storage for shape data (keyed by UUID)
    shapes: RwLock<HashMap<Uuid, Arc<Geometry>>>,
}

impl MeshKernel {
    /// Create a new mesh kernel with default settings
    pub fn new() -> Self {
        Self::with_config(MeshKernelConfig::default())
    }

    pub fn with_config(config: MeshKernelConfig) -> Self {
        Self {
            config,
            shapes: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &MeshKernelConfig {
        &self.config
    }

    /// Number of shapes currently stored
    pub fn shape_count(&self) -> usize {
        self.shapes.read().len()
    }

    /// Store geometry and return its handle
    fn store(&self, geometry: Geometry) -> Shape {
        let kind = match &geometry {
            Geometry::Edge(_) => ShapeKind::Edge,
            Geometry::Wire(_) => ShapeKind::Wire,
            Geometry::Face(_) => ShapeKind::Face,
            Geometry::Shell(_) => ShapeKind::Shell,
            Geometry::Solid(_) => ShapeKind::Solid,
            Geometry::Compound(_) => ShapeKind::Compound,
        };
        let shape = Shape::new(kind);
        self.shapes.write().insert(shape.id, Arc::new(geometry));
        shape
    }

    /// Get stored geometry by handle
    fn get(&self, shape: Shape) -> CadResult<Arc<Geometry>> {
        self.shapes
            .read()
            .get(&shape.id)
            .cloned()
            .ok_or(CadError::ShapeNotFound(shape.id))
    }

    fn polyline(&self, shape: Shape) -> CadResult<Polyline> {
        match &*self.get(shape)? {
            Geometry::Edge(line) | Geometry::Wire(line) => Ok(line.clone()),
            _ => Err(CadError::InvalidShape {
                expected: "edge or wire".into(),
                found: shape.kind,
            }),
        }
    }

    fn closed_ring(&self, shape: Shape) -> CadResult<Vec<DVec3>> {
        let line = self.polyline(shape)?;
        if !line.closed || line.points.len() < 3 {
            return Err(CadError::InvalidProfile(format!(
                "{shape} is not a closed wire"
            )));
        }
        Ok(line.points)
    }

    /// Depth-first leaves of a shape, compounds expanded
    fn leaves(&self, shape: Shape) -> CadResult<Vec<(Shape, Arc<Geometry>)>> {
        let geometry = self.get(shape)?;
        match &*geometry {
            Geometry::Compound(children) => {
                let mut out = Vec::new();
                for child in children {
                    out.extend(self.leaves(*child)?);
                }
                Ok(out)
            }
            _ => Ok(vec![(shape, geometry)]),
        }
    }

    fn face_leaves(&self, shape: Shape) -> CadResult<Vec<PlanarFace>> {
        self.leaves(shape)?
            .into_iter()
            .map(|(leaf, geometry)| match &*geometry {
                Geometry::Face(face) => Ok(face.clone()),
                _ => Err(CadError::InvalidShape {
                    expected: "face".into(),
                    found: leaf.kind,
                }),
            })
            .collect()
    }

    fn solid_leaves(&self, shape: Shape) -> CadResult<TriMesh> {
        let mut mesh = TriMesh::default();
        for (leaf, geometry) in self.leaves(shape)? {
            match &*geometry {
                Geometry::Solid(m) | Geometry::Shell(m) => {
                    mesh.triangles.extend_from_slice(&m.triangles)
                }
                _ => {
                    return Err(CadError::InvalidShape {
                        expected: "solid".into(),
                        found: leaf.kind,
                    });
                }
            }
        }
        Ok(mesh)
    }

    /// Dimension of the leaves of a boolean operand (2 = faces, 3 = solids)
    fn dimension(&self, shape: Shape) -> CadResult<Option<u8>> {
        let mut dimension = None;
        for (leaf, geometry) in self.leaves(shape)? {
            let d = match &*geometry {
                Geometry::Face(_) => 2,
                Geometry::Solid(_) | Geometry::Shell(_) => 3,
                _ => {
                    return Err(CadError::BooleanFailed(format!(
                        "unsupported operand {leaf}"
                    )));
                }
            };
            if dimension.is_some_and(|prev| prev != d) {
                return Err(CadError::BooleanFailed(
                    "operand mixes faces and solids".into(),
                ));
            }
            dimension = Some(d);
        }
        Ok(dimension)
    }

    fn boolean(&self, a: Shape, b: Shape, op: RegionOp, fuzzy: f64) -> CadResult<KernelOutcome> {
        let dimension = match (self.dimension(a)?, self.dimension(b)?) {
            (Some(da), Some(db)) if da != db => {
                return Err(CadError::BooleanFailed(
                    "cannot combine faces with solids".into(),
                ));
            }
            (Some(d), _) | (None, Some(d)) => d,
            (None, None) => {
                return Ok(KernelOutcome::done(
                    self.store(Geometry::Compound(Vec::new())),
                ));
            }
        };

        if dimension == 2 {
            let (left, right) = (self.face_leaves(a)?, self.face_leaves(b)?);
            let faces = planar::combine(&left, &right, op, fuzzy)?;
            let children = faces
                .into_iter()
                .map(|face| self.store(Geometry::Face(face)))
                .collect();
            return Ok(KernelOutcome::done(self.store(Geometry::Compound(children))));
        }

        let (lhs, rhs) = (self.solid_leaves(a)?, self.solid_leaves(b)?);
        let mesh = match op {
            RegionOp::Union => bsp::union(&lhs, &rhs),
            RegionOp::Difference => bsp::subtract(&lhs, &rhs),
        };
        if mesh.triangles.is_empty() && op == RegionOp::Union {
            return Ok(KernelOutcome::not_done(self.store(Geometry::Solid(mesh))));
        }
        Ok(KernelOutcome::done(self.store(Geometry::Solid(mesh))))
    }

    fn prism_face(&self, face: &PlanarFace, direction: DVec3) -> CadResult<TriMesh> {
        let normal = face.normal();
        let rise = direction.dot(normal);
        if rise.abs() <= JOIN_TOLERANCE {
            return Err(CadError::OperationFailed(
                "prism direction lies in the face plane".into(),
            ));
        }
        let mut mesh = TriMesh::default();
        for t in face.triangles() {
            mesh.triangles
                .push(geometry::orient_triangle(t, -normal * rise));
            mesh.triangles.push(geometry::orient_triangle(
                t.map(|p| p + direction),
                normal * rise,
            ));
        }
        // Rings are counter-clockwise around the normal (holes clockwise), so
        // each edge's outward side is edge x normal
        for ring in face.rings() {
            let n = ring.len();
            for i in 0..n {
                let (p, q) = (ring[i], ring[(i + 1) % n]);
                let outward = (q - p).cross(normal);
                let (pt, qt) = (p + direction, q + direction);
                mesh.triangles
                    .push(geometry::orient_triangle([p, q, qt], outward));
                mesh.triangles
                    .push(geometry::orient_triangle([p, qt, pt], outward));
            }
        }
        Ok(mesh)
    }

    fn transform_geometry(&self, geometry: &Geometry, placement: &DAffine3) -> CadResult<Geometry> {
        Ok(match geometry {
            Geometry::Edge(line) => Geometry::Edge(line.transformed(placement)),
            Geometry::Wire(line) => Geometry::Wire(line.transformed(placement)),
            Geometry::Face(face) => Geometry::Face(PlanarFace {
                placement: *placement * face.placement,
                region: face.region.clone(),
            }),
            Geometry::Shell(mesh) => Geometry::Shell(mesh.transformed(placement)),
            Geometry::Solid(mesh) => Geometry::Solid(mesh.transformed(placement)),
            Geometry::Compound(children) => Geometry::Compound(
                children
                    .iter()
                    .map(|child| self.transform(*child, placement))
                    .collect::<CadResult<_>>()?,
            ),
        })
    }
}

impl Default for MeshKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl GeometryKernel for MeshKernel {
    fn name(&self) -> &str {
        "mesh"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn make_polygon(&self, points: &[DVec2]) -> CadResult<Shape> {
        let line = Polyline::closed(points.iter().map(|p| p.extend(0.0)).collect());
        if line.points.len() < 3 {
            return Err(CadError::InvalidProfile(format!(
                "polygon needs at least 3 points, got {}",
                line.points.len()
            )));
        }
        Ok(self.store(Geometry::Wire(line)))
    }

    fn make_segment(&self, start: DVec2, end: DVec2) -> CadResult<Shape> {
        if start.distance(end) <= JOIN_TOLERANCE {
            return Err(CadError::InvalidProfile("zero-length segment".into()));
        }
        Ok(self.store(Geometry::Edge(Polyline::open(vec![
            start.extend(0.0),
            end.extend(0.0),
        ]))))
    }

    fn make_arc(&self, start: DVec2, mid: DVec2, end: DVec2) -> CadResult<Shape> {
        let center = circumcenter(start, mid, end)
            .ok_or_else(|| CadError::InvalidProfile("arc points are collinear".into()))?;
        let radius = center.distance(start);
        let (a0, sweep) = arc_sweep(center, start, mid, end);
        let segments = arc_segments(
            radius,
            sweep,
            self.config.chord_tolerance,
            self.config.min_circle_segments,
        );
        let mut points: Vec<DVec3> = (0..=segments)
            .map(|i| {
                let angle = a0 + sweep * i as f64 / segments as f64;
                (center + radius * DVec2::from_angle(angle)).extend(0.0)
            })
            .collect();
        // Exact endpoints so chained edges meet
        points[0] = start.extend(0.0);
        points[segments] = end.extend(0.0);
        Ok(self.store(Geometry::Edge(Polyline::open(points))))
    }

    fn make_circle(&self, center: DVec2, radius: f64) -> CadResult<Shape> {
        if radius <= JOIN_TOLERANCE {
            return Err(CadError::InvalidProfile(format!(
                "circle radius {radius} is too small"
            )));
        }
        let segments = arc_segments(
            radius,
            std::f64::consts::TAU,
            self.config.chord_tolerance,
            self.config.min_circle_segments,
        );
        let points = (0..segments)
            .map(|i| {
                let angle = std::f64::consts::TAU * i as f64 / segments as f64;
                (center + radius * DVec2::from_angle(angle)).extend(0.0)
            })
            .collect();
        Ok(self.store(Geometry::Edge(Polyline {
            points,
            closed: true,
        })))
    }

    fn make_wire(&self, parts: &[Shape]) -> CadResult<Shape> {
        let mut pending: Vec<Polyline> = parts
            .iter()
            .map(|p| self.polyline(*p))
            .collect::<CadResult<_>>()?;
        if pending.is_empty() {
            return Err(CadError::InvalidProfile("wire needs at least one edge".into()));
        }
        let first = pending.remove(0);
        if first.closed {
            if !pending.is_empty() {
                return Err(CadError::InvalidProfile(
                    "closed edge cannot be chained".into(),
                ));
            }
            return Ok(self.store(Geometry::Wire(first)));
        }

        let mut chain = first.points;
        while !pending.is_empty() {
            let (Some(head), Some(tail)) = (chain.first().copied(), chain.last().copied()) else {
                break;
            };
            let near =
                |a: Option<DVec3>, b: DVec3| a.is_some_and(|a| a.distance(b) <= JOIN_TOLERANCE);
            let Some(index) = pending.iter().position(|part| {
                !part.closed
                    && (near(part.first(), tail)
                        || near(part.last(), tail)
                        || near(part.first(), head)
                        || near(part.last(), head))
            }) else {
                return Err(CadError::InvalidProfile(
                    "edges do not form a connected chain".into(),
                ));
            };
            let mut part = pending.remove(index).points;
            if near(part.first().copied(), tail) {
                chain.extend(part.into_iter().skip(1));
            } else if near(part.last().copied(), tail) {
                part.reverse();
                chain.extend(part.into_iter().skip(1));
            } else {
                if near(part.first().copied(), head) {
                    part.reverse();
                }
                part.pop();
                part.extend(chain);
                chain = part;
            }
        }

        let closed = chain.len() > 2
            && chain[0].distance(chain[chain.len() - 1]) <= JOIN_TOLERANCE;
        let line = if closed {
            Polyline::closed(chain)
        } else {
            Polyline::open(chain)
        };
        Ok(self.store(Geometry::Wire(line)))
    }

    fn make_face(&self, outer: Shape, holes: &[Shape]) -> CadResult<Shape> {
        let outer_ring = self.closed_ring(outer)?;
        let placement = ring_placement(&outer_ring)?;
        let mut hole_rings = Vec::with_capacity(holes.len());
        let normal = placement.matrix3.z_axis;
        for hole in holes {
            let ring = self.closed_ring(*hole)?;
            if ring
                .iter()
                .any(|p| (*p - placement.translation).dot(normal).abs() > JOIN_TOLERANCE)
            {
                return Err(CadError::InvalidProfile(
                    "hole does not lie in the face plane".into(),
                ));
            }
            hole_rings.push(ring);
        }
        let region = region_from_rings(&placement, &outer_ring, &hole_rings);
        Ok(self.store(Geometry::Face(PlanarFace { placement, region })))
    }

    fn make_compound(&self, shapes: &[Shape]) -> CadResult<Shape> {
        for shape in shapes {
            self.get(*shape)?;
        }
        Ok(self.store(Geometry::Compound(shapes.to_vec())))
    }

    fn fuse(&self, a: Shape, b: Shape, fuzzy: f64) -> CadResult<KernelOutcome> {
        self.boolean(a, b, RegionOp::Union, fuzzy)
    }

    fn cut(&self, a: Shape, b: Shape, fuzzy: f64) -> CadResult<KernelOutcome> {
        self.boolean(a, b, RegionOp::Difference, fuzzy)
    }

    fn prism(&self, shape: Shape, direction: DVec3) -> CadResult<Shape> {
        let faces = self.face_leaves(shape)?;
        let mut solids = Vec::with_capacity(faces.len());
        for face in &faces {
            solids.push(self.store(Geometry::Solid(self.prism_face(face, direction)?)));
        }
        match solids.as_slice() {
            [single] => Ok(*single),
            _ => Ok(self.store(Geometry::Compound(solids))),
        }
    }

    fn loft(
        &self,
        wires: &[Shape],
        ruled: bool,
        solid: bool,
        precision: f64,
    ) -> CadResult<KernelOutcome> {
        if wires.len() < 2 {
            tracing::debug!(sections = wires.len(), "Loft needs at least two sections");
            return Ok(KernelOutcome::not_done(
                self.store(Geometry::Compound(Vec::new())),
            ));
        }
        let rings = wires
            .iter()
            .map(|w| self.closed_ring(*w))
            .collect::<CadResult<Vec<_>>>()?;
        let mesh = loft::skin(
            &rings,
            ruled,
            solid,
            self.config.loft_smoothing_steps,
            precision.max(f64::EPSILON),
        );
        let geometry = if solid {
            Geometry::Solid(mesh)
        } else {
            Geometry::Shell(mesh)
        };
        Ok(KernelOutcome::done(self.store(geometry)))
    }

    fn transform(&self, shape: Shape, placement: &DAffine3) -> CadResult<Shape> {
        let geometry = self.get(shape)?;
        let moved = self.transform_geometry(&geometry, placement)?;
        Ok(self.store(moved))
    }

    fn faces(&self, shape: Shape) -> CadResult<Vec<Shape>> {
        Ok(self
            .leaves(shape)?
            .into_iter()
            .filter(|(leaf, _)| leaf.kind == ShapeKind::Face)
            .map(|(leaf, _)| leaf)
            .collect())
    }

    fn face_wires(&self, face: Shape) -> CadResult<FaceWires> {
        let geometry = self.get(face)?;
        let Geometry::Face(planar) = &*geometry else {
            return Err(CadError::InvalidShape {
                expected: "face".into(),
                found: face.kind,
            });
        };
        let mut rings = planar.rings().into_iter();
        let outer = rings
            .next()
            .map(|ring| self.store(Geometry::Wire(Polyline::closed(ring))))
            .ok_or_else(|| CadError::InvalidProfile("face has no boundary".into()))?;
        let inner = rings
            .map(|ring| self.store(Geometry::Wire(Polyline::closed(ring))))
            .collect();
        Ok(FaceWires { outer, inner })
    }

    fn bounding_box(&self, shape: Shape) -> CadResult<Aabb> {
        let points = self.vertices(shape)?;
        if points.is_empty() {
            return Err(CadError::OperationFailed(format!(
                "{shape} is empty and has no bounding box"
            )));
        }
        Ok(Aabb::from_points(&points))
    }

    fn vertices(&self, shape: Shape) -> CadResult<Vec<DVec3>> {
        let mut points = Vec::new();
        for (_, geometry) in self.leaves(shape)? {
            match &*geometry {
                Geometry::Edge(line) | Geometry::Wire(line) => points.extend(&line.points),
                Geometry::Face(face) => points.extend(
                    open_ring(face.region.exterior())
                        .iter()
                        .map(|c| face.to_world(c)),
                ),
                Geometry::Shell(mesh) | Geometry::Solid(mesh) => {
                    points.extend(mesh.triangles.iter().flatten())
                }
                Geometry::Compound(_) => {}
            }
        }
        Ok(points)
    }

    fn area(&self, shape: Shape) -> CadResult<f64> {
        let mut area = 0.0;
        for (_, geometry) in self.leaves(shape)? {
            area += match &*geometry {
                Geometry::Face(face) => face.area(),
                Geometry::Shell(mesh) | Geometry::Solid(mesh) => mesh.area(),
                _ => 0.0,
            };
        }
        Ok(area)
    }

    fn volume(&self, shape: Shape) -> CadResult<f64> {
        let mut volume = 0.0;
        for (_, geometry) in self.leaves(shape)? {
            if let Geometry::Solid(mesh) = &*geometry {
                volume += mesh.signed_volume();
            }
        }
        Ok(volume)
    }

    /// Facets are exact, so the deflections bound facet size: a triangle is
    /// split at its edge midpoints while its longest edge exceeds
    /// `linear / angular`.
    fn tessellate(&self, shape: Shape, linear: f64, angular: f64) -> CadResult<TessellatedMesh> {
        if linear <= 0.0 || angular <= 0.0 {
            return Err(CadError::TessellationFailed(format!(
                "deflection must be positive (linear {linear}, angular {angular})"
            )));
        }
        let refine = Refinement {
            max_edge: linear / angular,
            max_depth: self.config.max_refinement_depth,
        };
        let mut mesh = TessellatedMesh::new();
        for (_, geometry) in self.leaves(shape)? {
            match &*geometry {
                Geometry::Face(face) => {
                    for t in face.triangles() {
                        refine.push(&mut mesh, t, 0);
                    }
                }
                Geometry::Shell(m) | Geometry::Solid(m) => {
                    for t in &m.triangles {
                        refine.push(&mut mesh, *t, 0);
                    }
                }
                _ => {}
            }
        }
        if mesh.is_empty() {
            return Err(CadError::TessellationFailed(format!(
                "{shape} has no surface to tessellate"
            )));
        }
        Ok(mesh)
    }
}

/// Midpoint subdivision of facets during tessellation
struct Refinement {
    max_edge: f64,
    max_depth: u32,
}

impl Refinement {
    fn push(&self, mesh: &mut TessellatedMesh, triangle: [DVec3; 3], depth: u32) {
        let [a, b, c] = triangle;
        let longest = a.distance(b).max(b.distance(c)).max(c.distance(a));
        if longest <= self.max_edge || depth >= self.max_depth {
            mesh.push_triangle(triangle);
            return;
        }
        let (ab, bc, ca) = ((a + b) / 2.0, (b + c) / 2.0, (c + a) / 2.0);
        for t in [[a, ab, ca], [ab, b, bc], [ca, bc, c], [ab, bc, ca]] {
            self.push(mesh, t, depth + 1);
        }
    }
}
