//! Sketch evaluation
//!
//! Folds a [`Sketch`] into one 2D region through the geometry kernel and
//! memoizes the region under the sketch's structural key.

use std::collections::HashMap;

use glam::DVec2;
use parking_lot::Mutex;
use pf_kernel::{GeometryKernel, Shape};

use super::hash::SketchKey;
use super::text::TextBuilder;
use super::{Arc, Element, Face, Mode, Polyline, Primitive, Sketch};
use crate::config::ModelConfig;
use crate::error::{GeometryOp, ModelError, ModelResult};

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug, Default)]
struct CacheState {
    regions: HashMap<SketchKey, Shape>,
    hits: u64,
    misses: u64,
}

/// Session-owned map from sketch key to evaluated region
#[derive(Debug, Default)]
pub struct EvalCache {
    state: Mutex<CacheState>,
}

impl EvalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a region, counting the hit or miss
    fn lookup(&self, key: &SketchKey) -> Option<Shape> {
        let mut state = self.state.lock();
        match state.regions.get(key).copied() {
            Some(shape) => {
                state.hits += 1;
                Some(shape)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    fn insert(&self, key: SketchKey, shape: Shape) {
        self.state.lock().regions.insert(key, shape);
    }

    pub fn contains(&self, key: &SketchKey) -> bool {
        self.state.lock().regions.contains_key(key)
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            entries: state.regions.len(),
        }
    }

    pub fn clear(&self) {
        *self.state.lock() = CacheState::default();
    }
}

/// Evaluates sketches into kernel regions
pub struct SketchEvaluator<'a> {
    kernel: &'a dyn GeometryKernel,
    config: &'a ModelConfig,
    cache: &'a EvalCache,
    text: TextBuilder<'a>,
}

impl<'a> SketchEvaluator<'a> {
    pub fn new(
        kernel: &'a dyn GeometryKernel,
        config: &'a ModelConfig,
        cache: &'a EvalCache,
        text: TextBuilder<'a>,
    ) -> Self {
        Self {
            kernel,
            config,
            cache,
            text,
        }
    }

    /// Region of `sketch` in its own XY plane, wrapped in a compound
    pub fn evaluate(&self, sketch: &Sketch) -> ModelResult<Shape> {
        let key = sketch.key();
        if let Some(shape) = self.cache.lookup(&key) {
            tracing::debug!(%key, "Sketch cache hit");
            return Ok(shape);
        }
        tracing::debug!(%key, faces = sketch.faces().len(), "Evaluating sketch");

        let mut acc: Option<Shape> = None;
        for (index, face) in sketch.faces().iter().enumerate() {
            if face.mode == Mode::Int {
                return Err(ModelError::UnsupportedOperation(
                    "intersection faces are not supported".into(),
                ));
            }
            let Some(contribution) = self.face_region(face)? else {
                tracing::debug!(index, "Skipping empty face");
                continue;
            };
            acc = Some(match (acc, face.mode) {
                (None, _) => self.kernel.make_compound(&[contribution])?,
                (Some(acc), Mode::Add) => self.fuse(contribution, acc)?,
                (Some(acc), _) => self.cut(acc, contribution)?,
            });
        }

        let region = match acc {
            Some(region) => region,
            None => self.kernel.make_compound(&[])?,
        };
        self.cache.insert(key, region);
        Ok(region)
    }

    fn fuse(&self, a: Shape, b: Shape) -> ModelResult<Shape> {
        let outcome = self.kernel.fuse(a, b, self.config.fuzzy_tolerance)?;
        if !outcome.done {
            return Err(ModelError::GeometryOperationFailed {
                op: GeometryOp::Fuse,
                operands: vec![a, b],
            });
        }
        Ok(outcome.shape)
    }

    fn cut(&self, a: Shape, b: Shape) -> ModelResult<Shape> {
        let outcome = self.kernel.cut(a, b, self.config.fuzzy_tolerance)?;
        if !outcome.done {
            return Err(ModelError::GeometryOperationFailed {
                op: GeometryOp::Cut,
                operands: vec![a, b],
            });
        }
        Ok(outcome.shape)
    }

    /// Union of everything a face contributes, `None` for an empty face
    fn face_region(&self, face: &Face) -> ModelResult<Option<Shape>> {
        let mut regions = Vec::new();
        let mut open_edges = Vec::new();
        let mut open_ends = Vec::new();

        if let [Element::Primitive(Primitive::Polyline(line))] = face.elements.as_slice() {
            if !line.is_closed() {
                return Ok(Some(self.polygon_face(line)?));
            }
        }

        for element in &face.elements {
            match element {
                Element::Sketch(sketch) => regions.push(self.evaluate(sketch)?),
                Element::Primitive(Primitive::Polyline(line)) if line.is_closed() => {
                    regions.push(self.polygon_face(line)?);
                }
                Element::Primitive(Primitive::Polyline(line)) => {
                    for pair in line.vertices().windows(2) {
                        open_edges.push(self.kernel.make_segment(pair[0], pair[1])?);
                    }
                    let vertices = line.vertices();
                    if let (Some(first), Some(last)) = (vertices.first(), vertices.last()) {
                        open_ends.extend([*first, *last]);
                    }
                }
                Element::Primitive(Primitive::Line(segment)) => {
                    open_edges.push(self.kernel.make_segment(segment.start, segment.end)?);
                    open_ends.extend([segment.start, segment.end]);
                }
                Element::Primitive(Primitive::Arc(arc)) if arc.is_full_circle() => {
                    regions.push(self.circle_face(arc)?);
                }
                Element::Primitive(Primitive::Arc(arc)) => {
                    open_edges.push(self.kernel.make_arc(
                        arc.start_point(),
                        arc.mid_point(),
                        arc.end_point(),
                    )?);
                    open_ends.extend([arc.start_point(), arc.end_point()]);
                }
                Element::Primitive(Primitive::Text(text)) => {
                    regions.push(self.text.build(text)?.region);
                }
            }
        }

        if !open_edges.is_empty() {
            if let Some(end) = dangling_end(&open_ends, self.config.closing_tolerance) {
                return Err(ModelError::MalformedSection(format!(
                    "open outline ends at ({}, {}) without closing",
                    end.x, end.y
                )));
            }
            let wire = self.kernel.make_wire(&open_edges)?;
            regions.push(self.kernel.make_face(wire, &[])?);
        }

        let mut regions = regions.into_iter();
        let Some(first) = regions.next() else {
            return Ok(None);
        };
        regions
            .try_fold(first, |acc, next| self.fuse(next, acc))
            .map(Some)
    }

    fn polygon_face(&self, line: &Polyline) -> ModelResult<Shape> {
        let ring: Vec<DVec2> = line.ring(self.config.closing_tolerance);
        let wire = self.kernel.make_polygon(&ring)?;
        Ok(self.kernel.make_face(wire, &[])?)
    }

    fn circle_face(&self, arc: &Arc) -> ModelResult<Shape> {
        let edge = self.kernel.make_circle(arc.center, arc.radius)?;
        let wire = self.kernel.make_wire(&[edge])?;
        Ok(self.kernel.make_face(wire, &[])?)
    }
}

/// An end point of an open outline that meets no other end point
fn dangling_end(ends: &[DVec2], tolerance: f64) -> Option<DVec2> {
    ends.iter().enumerate().find_map(|(i, end)| {
        let joined = ends
            .iter()
            .enumerate()
            .any(|(j, other)| i != j && end.distance(*other) <= tolerance);
        (!joined).then_some(*end)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sketch::{LineSegment, TextCache};
    use crate::testing::CountingKernel;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    struct Fixture {
        kernel: CountingKernel,
        config: ModelConfig,
        cache: EvalCache,
        texts: TextCache,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                kernel: CountingKernel::new(),
                config: ModelConfig::default(),
                cache: EvalCache::new(),
                texts: TextCache::new(),
            }
        }

        fn evaluator(&self) -> SketchEvaluator<'_> {
            SketchEvaluator::new(
                &self.kernel,
                &self.config,
                &self.cache,
                TextBuilder::new(&self.kernel, None, &self.texts),
            )
        }
    }

    fn annulus() -> Sketch {
        Sketch::new(vec![
            Face::add(vec![Arc::circle(DVec2::ZERO, 12.0).into()]),
            Face::sub(vec![Arc::circle(DVec2::ZERO, 3.0).into()]),
        ])
    }

    #[test]
    fn test_annulus_fold() {
        let fx = Fixture::new();
        let region = fx.evaluator().evaluate(&annulus()).unwrap();
        let area = fx.kernel.area(region).unwrap();
        assert_relative_eq!(area, PI * (144.0 - 9.0), max_relative = 0.02);

        let bb = fx.kernel.bounding_box(region).unwrap();
        assert_relative_eq!(bb.min.x, -12.0, epsilon = 1e-6);
        assert_relative_eq!(bb.max.y, 12.0, epsilon = 1e-6);

        let faces = fx.kernel.faces(region).unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(fx.kernel.face_wires(faces[0]).unwrap().inner.len(), 1);
    }

    #[test]
    fn test_memoized_evaluation_builds_once() {
        let fx = Fixture::new();
        let evaluator = fx.evaluator();
        let first = evaluator.evaluate(&annulus()).unwrap();
        let calls = fx.kernel.calls();

        let second = evaluator.evaluate(&annulus()).unwrap();
        assert_eq!(first, second);
        assert_eq!(fx.kernel.calls(), calls);
        assert_eq!(
            fx.kernel.bounding_box(first).unwrap(),
            fx.kernel.bounding_box(second).unwrap()
        );

        let stats = fx.cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_nested_sketch_is_cached() {
        let fx = Fixture::new();
        let inner = annulus();
        let outer = Sketch::new(vec![
            Face::add(vec![inner.clone().into()]),
            Face::add(vec![Polyline::rectangle(DVec2::new(20.0, 0.0), 4.0, 4.0).into()]),
        ]);
        fx.evaluator().evaluate(&outer).unwrap();
        assert!(fx.cache.contains(&inner.key()));
        assert!(fx.cache.contains(&outer.key()));
    }

    #[test]
    fn test_open_edges_chain_into_one_outline() {
        let fx = Fixture::new();
        // Half disc: diameter plus a reversed arc
        let sketch = Sketch::new(vec![Face::add(vec![
            LineSegment::new(DVec2::new(-1.0, 0.0), DVec2::new(1.0, 0.0)).into(),
            Arc::new(DVec2::ZERO, 1.0, 0.0, PI).into(),
        ])]);
        let region = fx.evaluator().evaluate(&sketch).unwrap();
        assert_relative_eq!(
            fx.kernel.area(region).unwrap(),
            PI / 2.0,
            max_relative = 0.02
        );
    }

    #[test]
    fn test_unclosed_open_edges_are_malformed() {
        let fx = Fixture::new();
        let sketch = Sketch::new(vec![Face::add(vec![
            LineSegment::new(DVec2::ZERO, DVec2::X).into(),
            LineSegment::new(DVec2::X, DVec2::ONE).into(),
        ])]);
        assert!(matches!(
            fx.evaluator().evaluate(&sketch),
            Err(ModelError::MalformedSection(_))
        ));
        assert_eq!(fx.cache.stats().entries, 0);
    }

    #[test]
    fn test_counter_clockwise_polylines_mix_with_circles() {
        let fx = Fixture::new();
        let ccw = |half: f64| {
            Polyline::closed(vec![
                DVec2::new(-half, -half),
                DVec2::new(half, -half),
                DVec2::new(half, half),
                DVec2::new(-half, half),
            ])
        };

        let square_minus_disc = Sketch::new(vec![
            Face::add(vec![ccw(2.0).into()]),
            Face::sub(vec![Arc::circle(DVec2::ZERO, 1.0).into()]),
        ]);
        let region = fx.evaluator().evaluate(&square_minus_disc).unwrap();
        assert_relative_eq!(
            fx.kernel.area(region).unwrap(),
            16.0 - PI,
            max_relative = 0.01
        );
        let faces = fx.kernel.faces(region).unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(fx.kernel.face_wires(faces[0]).unwrap().inner.len(), 1);

        let disc_minus_square = Sketch::new(vec![
            Face::add(vec![Arc::circle(DVec2::ZERO, 3.0).into()]),
            Face::sub(vec![ccw(1.0).into()]),
        ]);
        let region = fx.evaluator().evaluate(&disc_minus_square).unwrap();
        assert_relative_eq!(
            fx.kernel.area(region).unwrap(),
            9.0 * PI - 4.0,
            max_relative = 0.02
        );
        let faces = fx.kernel.faces(region).unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(fx.kernel.face_wires(faces[0]).unwrap().inner.len(), 1);
    }

    #[test]
    fn test_single_open_polyline_is_polygon() {
        let fx = Fixture::new();
        let sketch = Sketch::new(vec![Face::add(vec![
            Polyline::open(vec![DVec2::ZERO, DVec2::new(2.0, 0.0), DVec2::new(2.0, 2.0)]).into(),
        ])]);
        let region = fx.evaluator().evaluate(&sketch).unwrap();
        assert_relative_eq!(fx.kernel.area(region).unwrap(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_closed_primitives_fuse_within_face() {
        let fx = Fixture::new();
        let sketch = Sketch::new(vec![Face::add(vec![
            Polyline::rectangle(DVec2::ZERO, 2.0, 2.0).into(),
            Polyline::rectangle(DVec2::new(1.0, 0.0), 2.0, 2.0).into(),
        ])]);
        let region = fx.evaluator().evaluate(&sketch).unwrap();
        assert_relative_eq!(fx.kernel.area(region).unwrap(), 6.0, epsilon = 1e-6);
    }

    #[test]
    fn test_intersection_unsupported() {
        let fx = Fixture::new();
        let sketch = Sketch::new(vec![
            Face::add(vec![Arc::circle(DVec2::ZERO, 1.0).into()]),
            Face::int(vec![Arc::circle(DVec2::X, 1.0).into()]),
        ]);
        assert!(matches!(
            fx.evaluator().evaluate(&sketch),
            Err(ModelError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_text_without_outliner() {
        let fx = Fixture::new();
        let sketch = Sketch::new(vec![Face::add(vec![crate::sketch::Text::new("A").into()])]);
        assert!(matches!(
            fx.evaluator().evaluate(&sketch),
            Err(ModelError::TextUnavailable(_))
        ));
    }

    #[test]
    fn test_empty_sketch_is_empty_compound() {
        let fx = Fixture::new();
        let region = fx.evaluator().evaluate(&Sketch::default()).unwrap();
        assert!(region.is_compound());
        assert!(fx.kernel.faces(region).unwrap().is_empty());
    }
}
