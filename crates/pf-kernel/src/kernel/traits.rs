//! Geometry kernel trait definitions
//!
//! These traits define the interface that every geometry backend must implement.
//! All shapes are opaque handles; the backend owns the actual geometry.

use glam::{DAffine3, DVec2, DVec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Topological kind of a kernel shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Edge,
    Wire,
    Face,
    Shell,
    Solid,
    Compound,
}

impl std::fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ShapeKind::Edge => "edge",
            ShapeKind::Wire => "wire",
            ShapeKind::Face => "face",
            ShapeKind::Shell => "shell",
            ShapeKind::Solid => "solid",
            ShapeKind::Compound => "compound",
        };
        f.write_str(name)
    }
}

/// Opaque handle to a shape stored inside a kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    /// Unique identifier of the kernel-side geometry
    pub id: Uuid,
    /// Topological kind
    pub kind: ShapeKind,
}

impl Shape {
    /// Create a handle for freshly stored geometry
    pub fn new(kind: ShapeKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
        }
    }

    pub fn is_compound(&self) -> bool {
        self.kind == ShapeKind::Compound
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Error type for kernel operations
#[derive(Debug, Clone, Error)]
pub enum CadError {
    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    #[error("Expected {expected}, found {found}")]
    InvalidShape { expected: String, found: ShapeKind },

    #[error("Shape not found: {0}")]
    ShapeNotFound(Uuid),

    #[error("Boolean operation failed: {0}")]
    BooleanFailed(String),

    #[error("Tessellation failed: {0}")]
    TessellationFailed(String),

    #[error("Kernel not available: {0}")]
    KernelNotAvailable(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("Export failed: {0}")]
    Export(String),
}

/// Result type for kernel operations
pub type CadResult<T> = Result<T, CadError>;

/// Result of a kernel operation that may finish without producing a valid shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelOutcome {
    pub shape: Shape,
    /// Whether the kernel reports the operation as completed
    pub done: bool,
}

impl KernelOutcome {
    pub fn done(shape: Shape) -> Self {
        Self { shape, done: true }
    }

    pub fn not_done(shape: Shape) -> Self {
        Self { shape, done: false }
    }
}

/// Axis-aligned bounding box in world coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    /// An inverted box that absorbs the first point added to it
    pub fn empty() -> Self {
        Self {
            min: DVec3::splat(f64::INFINITY),
            max: DVec3::splat(f64::NEG_INFINITY),
        }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a DVec3>) -> Self {
        let mut aabb = Self::empty();
        for p in points {
            aabb.include(*p);
        }
        aabb
    }

    pub fn include(&mut self, point: DVec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn size(&self) -> DVec3 {
        if self.is_empty() {
            DVec3::ZERO
        } else {
            self.max - self.min
        }
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Compare two boxes corner by corner within `tolerance`
    pub fn approx_eq(&self, other: &Aabb, tolerance: f64) -> bool {
        self.min.abs_diff_eq(other.min, tolerance) && self.max.abs_diff_eq(other.max, tolerance)
    }
}

/// A tessellated mesh output from the kernel
#[derive(Debug, Clone, Default)]
pub struct TessellatedMesh {
    /// Vertex positions (3 floats per vertex)
    pub vertices: Vec<[f32; 3]>,
    /// Vertex normals (3 floats per vertex)
    pub normals: Vec<[f32; 3]>,
    /// Triangle indices (3 indices per triangle)
    pub indices: Vec<u32>,
}

impl TessellatedMesh {
    /// Create an empty tessellated mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the mesh is empty
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Get the number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Append one flat-shaded triangle
    pub fn push_triangle(&mut self, triangle: [DVec3; 3]) {
        let normal = (triangle[1] - triangle[0])
            .cross(triangle[2] - triangle[0])
            .normalize_or_zero()
            .as_vec3()
            .to_array();
        for vertex in triangle {
            self.indices.push(self.vertices.len() as u32);
            self.vertices.push(vertex.as_vec3().to_array());
            self.normals.push(normal);
        }
    }
}

/// Boundary wires of a face, outer first
#[derive(Debug, Clone, PartialEq)]
pub struct FaceWires {
    pub outer: Shape,
    pub inner: Vec<Shape>,
}

/// The geometry kernel trait
///
/// Construction methods work in the canonical XY plane (z = 0); shapes are moved
/// into place afterwards with [`GeometryKernel::transform`].
pub trait GeometryKernel: Send + Sync {
    /// Get the name of this kernel
    fn name(&self) -> &str;

    /// Check if the kernel is available
    fn is_available(&self) -> bool;

    // ========== Construction ==========

    /// Closed polygonal wire through `points`
    fn make_polygon(&self, points: &[DVec2]) -> CadResult<Shape>;

    /// Straight edge between two points
    fn make_segment(&self, start: DVec2, end: DVec2) -> CadResult<Shape>;

    /// Circular arc edge passing through three points
    fn make_arc(&self, start: DVec2, mid: DVec2, end: DVec2) -> CadResult<Shape>;

    /// Full circle edge
    fn make_circle(&self, center: DVec2, radius: f64) -> CadResult<Shape>;

    /// Chain edges and wires into one wire, reversing parts where needed
    fn make_wire(&self, parts: &[Shape]) -> CadResult<Shape>;

    /// Planar face bounded by a closed outer wire with optional holes
    fn make_face(&self, outer: Shape, holes: &[Shape]) -> CadResult<Shape>;

    /// Group shapes without merging them
    fn make_compound(&self, shapes: &[Shape]) -> CadResult<Shape>;

    // ========== Operations ==========

    /// Boolean union of `a` and `b`, gluing features closer than `fuzzy`
    fn fuse(&self, a: Shape, b: Shape, fuzzy: f64) -> CadResult<KernelOutcome>;

    /// Boolean difference `a - b`, gluing features closer than `fuzzy`
    fn cut(&self, a: Shape, b: Shape, fuzzy: f64) -> CadResult<KernelOutcome>;

    /// Linear sweep of a face (or compound of faces) along `direction`
    fn prism(&self, shape: Shape, direction: DVec3) -> CadResult<Shape>;

    /// Through-sections loft over an ordered list of closed wires
    ///
    /// # Arguments
    /// * `wires` - Section wires in loft order
    /// * `ruled` - Use straight rulings between sections
    /// * `solid` - Cap the ends to produce a solid (shell otherwise)
    /// * `precision` - Approximation tolerance
    fn loft(
        &self,
        wires: &[Shape],
        ruled: bool,
        solid: bool,
        precision: f64,
    ) -> CadResult<KernelOutcome>;

    /// Copy of `shape` moved by a rigid placement
    fn transform(&self, shape: Shape, placement: &DAffine3) -> CadResult<Shape>;

    // ========== Queries ==========

    /// Faces of a shape in traversal order
    fn faces(&self, shape: Shape) -> CadResult<Vec<Shape>>;

    /// Outer and inner boundary wires of a face
    fn face_wires(&self, face: Shape) -> CadResult<FaceWires>;

    fn bounding_box(&self, shape: Shape) -> CadResult<Aabb>;

    /// Boundary vertices of a shape
    fn vertices(&self, shape: Shape) -> CadResult<Vec<DVec3>>;

    /// Surface area (faces, shells and solids)
    fn area(&self, shape: Shape) -> CadResult<f64>;

    /// Enclosed volume (solids only; zero for lower-dimensional shapes)
    fn volume(&self, shape: Shape) -> CadResult<f64>;

    /// Tessellate a shape into triangles
    ///
    /// # Arguments
    /// * `linear` - Linear deflection (lower = more triangles)
    /// * `angular` - Angular deflection in radians
    fn tessellate(&self, shape: Shape, linear: f64, angular: f64) -> CadResult<TessellatedMesh>;
}

/// A null kernel that always returns errors (used when no kernel is available)
#[derive(Debug, Default)]
pub struct NullKernel;

fn unavailable<T>() -> CadResult<T> {
    Err(CadError::KernelNotAvailable(
        "No geometry kernel available".into(),
    ))
}

impl GeometryKernel for NullKernel {
    fn name(&self) -> &str {
        "null"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn make_polygon(&self, _points: &[DVec2]) -> CadResult<Shape> {
        unavailable()
    }

    fn make_segment(&self, _start: DVec2, _end: DVec2) -> CadResult<Shape> {
        unavailable()
    }

    fn make_arc(&self, _start: DVec2, _mid: DVec2, _end: DVec2) -> CadResult<Shape> {
        unavailable()
    }

    fn make_circle(&self, _center: DVec2, _radius: f64) -> CadResult<Shape> {
        unavailable()
    }

    fn make_wire(&self, _parts: &[Shape]) -> CadResult<Shape> {
        unavailable()
    }

    fn make_face(&self, _outer: Shape, _holes: &[Shape]) -> CadResult<Shape> {
        unavailable()
    }

    fn make_compound(&self, _shapes: &[Shape]) -> CadResult<Shape> {
        unavailable()
    }

    fn fuse(&self, _a: Shape, _b: Shape, _fuzzy: f64) -> CadResult<KernelOutcome> {
        unavailable()
    }

    fn cut(&self, _a: Shape, _b: Shape, _fuzzy: f64) -> CadResult<KernelOutcome> {
        unavailable()
    }

    fn prism(&self, _shape: Shape, _direction: DVec3) -> CadResult<Shape> {
        unavailable()
    }

    fn loft(
        &self,
        _wires: &[Shape],
        _ruled: bool,
        _solid: bool,
        _precision: f64,
    ) -> CadResult<KernelOutcome> {
        unavailable()
    }

    fn transform(&self, _shape: Shape, _placement: &DAffine3) -> CadResult<Shape> {
        unavailable()
    }

    fn faces(&self, _shape: Shape) -> CadResult<Vec<Shape>> {
        unavailable()
    }

    fn face_wires(&self, _face: Shape) -> CadResult<FaceWires> {
        unavailable()
    }

    fn bounding_box(&self, _shape: Shape) -> CadResult<Aabb> {
        unavailable()
    }

    fn vertices(&self, _shape: Shape) -> CadResult<Vec<DVec3>> {
        unavailable()
    }

    fn area(&self, _shape: Shape) -> CadResult<f64> {
        unavailable()
    }

    fn volume(&self, _shape: Shape) -> CadResult<f64> {
        unavailable()
    }

    fn tessellate(&self, _shape: Shape, _linear: f64, _angular: f64) -> CadResult<TessellatedMesh> {
        unavailable()
    }
}

/// Get the default geometry kernel based on available features
pub fn default_kernel() -> Box<dyn GeometryKernel> {
    #[cfg(feature = "mesh")]
    {
        tracing::debug!("Using faceted mesh kernel");
        Box::new(super::MeshKernel::new())
    }

    #[cfg(not(feature = "mesh"))]
    {
        tracing::warn!("No geometry kernel backend enabled");
        Box::new(NullKernel)
    }
}
