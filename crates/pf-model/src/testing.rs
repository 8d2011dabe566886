//! Test doubles

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use glam::{DAffine3, DVec2, DVec3};
use pf_kernel::{
    Aabb, CadResult, FaceWires, GeometryKernel, KernelOutcome, MeshKernel, Shape, TessellatedMesh,
};

/// Reference kernel that counts every call made through the trait
#[derive(Default)]
pub struct CountingKernel {
    inner: MeshKernel,
    calls: AtomicUsize,
    lofts: AtomicUsize,
    incomplete_booleans: AtomicBool,
}

impl CountingKernel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn lofts(&self) -> usize {
        self.lofts.load(Ordering::SeqCst)
    }

    /// Make every later fuse and cut report non-completion
    pub fn fail_booleans(&self) {
        self.incomplete_booleans.store(true, Ordering::SeqCst);
    }

    fn boolean_incomplete(&self) -> bool {
        self.incomplete_booleans.load(Ordering::SeqCst)
    }

    fn count(&self) -> &MeshKernel {
        self.calls.fetch_add(1, Ordering::SeqCst);
        &self.inner
    }
}

impl GeometryKernel for CountingKernel {
    fn name(&self) -> &str {
        "counting"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn make_polygon(&self, points: &[DVec2]) -> CadResult<Shape> {
        self.count().make_polygon(points)
    }

    fn make_segment(&self, start: DVec2, end: DVec2) -> CadResult<Shape> {
        self.count().make_segment(start, end)
    }

    fn make_arc(&self, start: DVec2, mid: DVec2, end: DVec2) -> CadResult<Shape> {
        self.count().make_arc(start, mid, end)
    }

    fn make_circle(&self, center: DVec2, radius: f64) -> CadResult<Shape> {
        self.count().make_circle(center, radius)
    }

    fn make_wire(&self, parts: &[Shape]) -> CadResult<Shape> {
        self.count().make_wire(parts)
    }

    fn make_face(&self, outer: Shape, holes: &[Shape]) -> CadResult<Shape> {
        self.count().make_face(outer, holes)
    }

    fn make_compound(&self, shapes: &[Shape]) -> CadResult<Shape> {
        self.count().make_compound(shapes)
    }

    fn fuse(&self, a: Shape, b: Shape, fuzzy: f64) -> CadResult<KernelOutcome> {
        let outcome = self.count().fuse(a, b, fuzzy)?;
        if self.boolean_incomplete() {
            return Ok(KernelOutcome::not_done(outcome.shape));
        }
        Ok(outcome)
    }

    fn cut(&self, a: Shape, b: Shape, fuzzy: f64) -> CadResult<KernelOutcome> {
        let outcome = self.count().cut(a, b, fuzzy)?;
        if self.boolean_incomplete() {
            return Ok(KernelOutcome::not_done(outcome.shape));
        }
        Ok(outcome)
    }

    fn prism(&self, shape: Shape, direction: DVec3) -> CadResult<Shape> {
        self.count().prism(shape, direction)
    }

    fn loft(
        &self,
        wires: &[Shape],
        ruled: bool,
        solid: bool,
        precision: f64,
    ) -> CadResult<KernelOutcome> {
        self.lofts.fetch_add(1, Ordering::SeqCst);
        self.count().loft(wires, ruled, solid, precision)
    }

    fn transform(&self, shape: Shape, placement: &DAffine3) -> CadResult<Shape> {
        self.count().transform(shape, placement)
    }

    fn faces(&self, shape: Shape) -> CadResult<Vec<Shape>> {
        self.count().faces(shape)
    }

    fn face_wires(&self, face: Shape) -> CadResult<FaceWires> {
        self.count().face_wires(face)
    }

    fn bounding_box(&self, shape: Shape) -> CadResult<Aabb> {
        self.count().bounding_box(shape)
    }

    fn vertices(&self, shape: Shape) -> CadResult<Vec<DVec3>> {
        self.count().vertices(shape)
    }

    fn area(&self, shape: Shape) -> CadResult<f64> {
        self.count().area(shape)
    }

    fn volume(&self, shape: Shape) -> CadResult<f64> {
        self.count().volume(shape)
    }

    fn tessellate(&self, shape: Shape, linear: f64, angular: f64) -> CadResult<TessellatedMesh> {
        self.count().tessellate(shape, linear, angular)
    }
}
