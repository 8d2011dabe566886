//! 2D Shape Tree
//!
//! Sketches are immutable trees: a [`Sketch`] is an ordered list of [`Face`]s,
//! each combining its elements into the running result with a boolean
//! [`Mode`]. Elements are primitives (polylines, segments, arcs, text) or
//! nested sketches. Every sketch carries a structural key used to memoize
//! its evaluation.

mod evaluator;
mod hash;
mod text;

use std::f64::consts::TAU;
use std::sync::OnceLock;

use glam::DVec2;
use pf_kernel::CadError;
use serde::{Deserialize, Serialize};

pub use evaluator::{CacheStats, EvalCache, SketchEvaluator};
pub use hash::SketchKey;
pub use text::{
    FontWeight, GlyphOutliner, HAlign, Text, TextBuilder, TextCache, TextOutline, VAlign,
};

use crate::error::ModelResult;
use hash::KeyHasher;

/// How a face combines with the faces before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Union with the accumulated region
    #[default]
    Add,
    /// Subtract from the accumulated region
    Sub,
    /// Intersect with the accumulated region (not supported by the evaluator)
    Int,
}

/// Sequence of vertices, optionally closed into a polygon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    vertices: Vec<DVec2>,
    closed: bool,
}

impl Polyline {
    pub fn new(vertices: Vec<DVec2>, closed: bool) -> Self {
        Self { vertices, closed }
    }

    pub fn closed(vertices: Vec<DVec2>) -> Self {
        Self::new(vertices, true)
    }

    pub fn open(vertices: Vec<DVec2>) -> Self {
        Self::new(vertices, false)
    }

    /// Closed axis-aligned rectangle
    pub fn rectangle(center: DVec2, width: f64, height: f64) -> Self {
        let hw = width / 2.0;
        let hh = height / 2.0;
        Self::closed(vec![
            center + DVec2::new(-hw, -hh),
            center + DVec2::new(hw, -hh),
            center + DVec2::new(hw, hh),
            center + DVec2::new(-hw, hh),
        ])
    }

    pub fn vertices(&self) -> &[DVec2] {
        &self.vertices
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Clockwise polygon ring, with the first vertex repeated when the ends
    /// are farther apart than `closing_tolerance`
    pub fn ring(&self, closing_tolerance: f64) -> Vec<DVec2> {
        let mut ring = self.vertices.clone();
        if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
            if first.distance(last) > closing_tolerance {
                ring.push(first);
            }
        }
        if signed_area(&ring) > 0.0 {
            ring.reverse();
        }
        ring
    }

    fn hash_into(&self, h: &mut KeyHasher) {
        h.tag(b"polyline")
            .bool(self.closed)
            .count(self.vertices.len());
        for v in &self.vertices {
            h.vec2(*v);
        }
    }
}

/// Shoelace area, positive for counter-clockwise rings
pub(crate) fn signed_area(ring: &[DVec2]) -> f64 {
    let n = ring.len();
    (0..n)
        .map(|i| ring[i].perp_dot(ring[(i + 1) % n]))
        .sum::<f64>()
        / 2.0
}

/// Straight segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub start: DVec2,
    pub end: DVec2,
}

impl LineSegment {
    pub fn new(start: DVec2, end: DVec2) -> Self {
        Self { start, end }
    }
}

/// Circular arc swept from `start_angle` to `end_angle` (radians, counter-clockwise
/// when the end angle is larger)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    pub center: DVec2,
    pub radius: f64,
    pub start_angle: f64,
    pub end_angle: f64,
}

impl Arc {
    pub fn new(center: DVec2, radius: f64, start_angle: f64, end_angle: f64) -> Self {
        Self {
            center,
            radius,
            start_angle,
            end_angle,
        }
    }

    /// Full circle
    pub fn circle(center: DVec2, radius: f64) -> Self {
        Self::new(center, radius, 0.0, TAU)
    }

    /// Arc through three points, sweeping from `start` past `mid` to `end`
    pub fn from_start_mid_end(start: DVec2, mid: DVec2, end: DVec2) -> ModelResult<Self> {
        let d = 2.0
            * (start.x * (mid.y - end.y) + mid.x * (end.y - start.y) + end.x * (start.y - mid.y));
        if d.abs() < 1e-12 {
            return Err(CadError::InvalidProfile("arc points are collinear".into()).into());
        }
        let (s2, m2, e2) = (
            start.length_squared(),
            mid.length_squared(),
            end.length_squared(),
        );
        let center = DVec2::new(
            (s2 * (mid.y - end.y) + m2 * (end.y - start.y) + e2 * (start.y - mid.y)) / d,
            (s2 * (end.x - mid.x) + m2 * (start.x - end.x) + e2 * (mid.x - start.x)) / d,
        );
        let angle = |p: DVec2| {
            let d = p - center;
            d.y.atan2(d.x)
        };
        let a0 = angle(start);
        let to_end = (angle(end) - a0).rem_euclid(TAU);
        let to_mid = (angle(mid) - a0).rem_euclid(TAU);
        let sweep = if to_mid <= to_end {
            to_end
        } else {
            to_end - TAU
        };
        Ok(Self::new(center, center.distance(start), a0, a0 + sweep))
    }

    pub fn sweep(&self) -> f64 {
        self.end_angle - self.start_angle
    }

    pub fn is_full_circle(&self) -> bool {
        self.sweep().abs() >= TAU - 1e-9
    }

    pub fn point_at(&self, angle: f64) -> DVec2 {
        self.center + self.radius * DVec2::from_angle(angle)
    }

    pub fn start_point(&self) -> DVec2 {
        self.point_at(self.start_angle)
    }

    pub fn mid_point(&self) -> DVec2 {
        self.point_at(self.start_angle + self.sweep() / 2.0)
    }

    pub fn end_point(&self) -> DVec2 {
        self.point_at(self.end_angle)
    }
}

/// Leaf of the shape tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    Polyline(Polyline),
    Line(LineSegment),
    Arc(Arc),
    Text(Text),
}

impl Primitive {
    /// Closed primitives form an outline on their own
    pub fn is_closed(&self) -> bool {
        match self {
            Primitive::Polyline(p) => p.is_closed(),
            Primitive::Arc(a) => a.is_full_circle(),
            Primitive::Line(_) => false,
            Primitive::Text(_) => true,
        }
    }

    fn hash_into(&self, h: &mut KeyHasher) {
        match self {
            Primitive::Polyline(p) => p.hash_into(h),
            Primitive::Line(l) => {
                h.tag(b"line").vec2(l.start).vec2(l.end);
            }
            Primitive::Arc(a) => {
                h.tag(b"arc")
                    .vec2(a.center)
                    .f64(a.radius)
                    .f64(a.start_angle)
                    .f64(a.end_angle);
            }
            Primitive::Text(t) => {
                h.tag(b"text").key(&t.key());
            }
        }
    }
}

/// Child of a face: a primitive or a nested sketch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Element {
    Primitive(Primitive),
    Sketch(Sketch),
}

impl From<Primitive> for Element {
    fn from(primitive: Primitive) -> Self {
        Element::Primitive(primitive)
    }
}

impl From<Polyline> for Element {
    fn from(polyline: Polyline) -> Self {
        Element::Primitive(Primitive::Polyline(polyline))
    }
}

impl From<LineSegment> for Element {
    fn from(line: LineSegment) -> Self {
        Element::Primitive(Primitive::Line(line))
    }
}

impl From<Arc> for Element {
    fn from(arc: Arc) -> Self {
        Element::Primitive(Primitive::Arc(arc))
    }
}

impl From<Text> for Element {
    fn from(text: Text) -> Self {
        Element::Primitive(Primitive::Text(text))
    }
}

impl From<Sketch> for Element {
    fn from(sketch: Sketch) -> Self {
        Element::Sketch(sketch)
    }
}

/// Elements combined into the running region with one boolean mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub mode: Mode,
    pub elements: Vec<Element>,
}

impl Face {
    pub fn new(mode: Mode, elements: Vec<Element>) -> Self {
        Self { mode, elements }
    }

    pub fn add(elements: Vec<Element>) -> Self {
        Self::new(Mode::Add, elements)
    }

    pub fn sub(elements: Vec<Element>) -> Self {
        Self::new(Mode::Sub, elements)
    }

    pub fn int(elements: Vec<Element>) -> Self {
        Self::new(Mode::Int, elements)
    }

    fn hash_into(&self, h: &mut KeyHasher) {
        let mode: &[u8] = match self.mode {
            Mode::Add => b"add",
            Mode::Sub => b"sub",
            Mode::Int => b"int",
        };
        h.tag(b"face").tag(mode).count(self.elements.len());
        for element in &self.elements {
            match element {
                Element::Primitive(p) => p.hash_into(h),
                Element::Sketch(s) => {
                    h.tag(b"sketch").key(&s.key());
                }
            }
        }
    }
}

/// Ordered faces folded left to right into one region
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sketch {
    faces: Vec<Face>,
    #[serde(skip)]
    key: OnceLock<SketchKey>,
}

impl PartialEq for Sketch {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Sketch {
    pub fn new(faces: Vec<Face>) -> Self {
        Self {
            faces,
            key: OnceLock::new(),
        }
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Structural key, computed on first use
    pub fn key(&self) -> SketchKey {
        *self.key.get_or_init(|| {
            let mut h = KeyHasher::new(b"sketch");
            h.count(self.faces.len());
            for face in &self.faces {
                face.hash_into(&mut h);
            }
            h.finish()
        })
    }
}
