//! Faceted geometry stored behind kernel handles

use std::f64::consts::{FRAC_PI_2, TAU};

use geo::orient::{Direction, Orient};
use geo::{Area, Coord, LineString, Polygon, TriangulateEarcut};
use glam::{DAffine3, DVec2, DVec3};

use crate::kernel::{CadError, CadResult, Shape};

/// Tolerance used when joining edge endpoints and testing planarity
pub const JOIN_TOLERANCE: f64 = 1e-5;

#[derive(Debug, Clone)]
pub enum Geometry {
    Edge(Polyline),
    Wire(Polyline),
    Face(PlanarFace),
    Shell(TriMesh),
    Solid(TriMesh),
    Compound(Vec<Shape>),
}

/// Ordered points; a closed polyline does not repeat its first point
#[derive(Debug, Clone)]
pub struct Polyline {
    pub points: Vec<DVec3>,
    pub closed: bool,
}

impl Polyline {
    pub fn open(points: Vec<DVec3>) -> Self {
        Self {
            points,
            closed: false,
        }
    }

    pub fn closed(mut points: Vec<DVec3>) -> Self {
        if points.len() > 1 && points[0].distance(points[points.len() - 1]) <= JOIN_TOLERANCE {
            points.pop();
        }
        Self {
            points,
            closed: true,
        }
    }

    pub fn first(&self) -> Option<DVec3> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<DVec3> {
        self.points.last().copied()
    }

    pub fn transformed(&self, placement: &DAffine3) -> Self {
        Self {
            points: self
                .points
                .iter()
                .map(|p| placement.transform_point3(*p))
                .collect(),
            closed: self.closed,
        }
    }
}

/// A planar region: a geo polygon in the local XY plane of `placement`
#[derive(Debug, Clone)]
pub struct PlanarFace {
    pub placement: DAffine3,
    pub region: Polygon<f64>,
}

impl PlanarFace {
    pub fn normal(&self) -> DVec3 {
        self.placement.matrix3.z_axis.normalize()
    }

    pub fn origin(&self) -> DVec3 {
        self.placement.translation
    }

    pub fn to_world(&self, c: &Coord<f64>) -> DVec3 {
        self.placement.transform_point3(DVec3::new(c.x, c.y, 0.0))
    }

    /// Rings in world coordinates, outer first, without the closing point
    pub fn rings(&self) -> Vec<Vec<DVec3>> {
        std::iter::once(self.region.exterior())
            .chain(self.region.interiors())
            .map(|ring| open_ring(ring).iter().map(|c| self.to_world(c)).collect())
            .collect()
    }

    pub fn area(&self) -> f64 {
        self.region.unsigned_area()
    }

    /// Ear-clipped triangles in world coordinates, wound around `normal()`
    pub fn triangles(&self) -> Vec<[DVec3; 3]> {
        let raw = self.region.earcut_triangles_raw();
        let vertex = |i: usize| {
            self.placement
                .transform_point3(DVec3::new(raw.vertices[2 * i], raw.vertices[2 * i + 1], 0.0))
        };
        let normal = self.normal();
        raw.triangle_indices
            .chunks_exact(3)
            .map(|t| orient_triangle([vertex(t[0]), vertex(t[1]), vertex(t[2])], normal))
            .collect()
    }
}

/// Triangle soup with outward-facing winding
#[derive(Debug, Clone, Default)]
pub struct TriMesh {
    pub triangles: Vec<[DVec3; 3]>,
}

impl TriMesh {
    pub fn signed_volume(&self) -> f64 {
        self.triangles
            .iter()
            .map(|[a, b, c]| a.dot(b.cross(*c)))
            .sum::<f64>()
            / 6.0
    }

    pub fn area(&self) -> f64 {
        self.triangles
            .iter()
            .map(|[a, b, c]| (*b - *a).cross(*c - *a).length() * 0.5)
            .sum()
    }

    /// Flip every triangle when the mesh encloses negative volume
    pub fn orient_outward(&mut self) {
        if self.signed_volume() < 0.0 {
            for t in &mut self.triangles {
                t.swap(1, 2);
            }
        }
    }

    pub fn transformed(&self, placement: &DAffine3) -> Self {
        let mirror = placement.matrix3.determinant() < 0.0;
        let triangles = self
            .triangles
            .iter()
            .map(|t| {
                let mut m = t.map(|p| placement.transform_point3(p));
                if mirror {
                    m.swap(1, 2);
                }
                m
            })
            .collect();
        Self { triangles }
    }
}

/// Flip `triangle` so that its winding faces `direction`
pub fn orient_triangle(mut triangle: [DVec3; 3], direction: DVec3) -> [DVec3; 3] {
    let n = (triangle[1] - triangle[0]).cross(triangle[2] - triangle[0]);
    if n.dot(direction) < 0.0 {
        triangle.swap(1, 2);
    }
    triangle
}

/// Newell normal of a closed ring (unnormalized, length = 2 * area)
pub fn newell_normal(ring: &[DVec3]) -> DVec3 {
    let mut n = DVec3::ZERO;
    for (i, a) in ring.iter().enumerate() {
        let b = ring[(i + 1) % ring.len()];
        n.x += (a.y - b.y) * (a.z + b.z);
        n.y += (a.z - b.z) * (a.x + b.x);
        n.z += (a.x - b.x) * (a.y + b.y);
    }
    n
}

pub fn centroid(points: &[DVec3]) -> DVec3 {
    if points.is_empty() {
        return DVec3::ZERO;
    }
    points.iter().copied().sum::<DVec3>() / points.len() as f64
}

/// Rigid placement of the plane through `ring`
///
/// Planes parallel to XY keep the world X/Y axes so faces built in the
/// canonical sketch plane stay axis aligned.
pub fn ring_placement(ring: &[DVec3]) -> CadResult<DAffine3> {
    let normal = newell_normal(ring);
    if normal.length() <= JOIN_TOLERANCE * JOIN_TOLERANCE {
        return Err(CadError::InvalidProfile(
            "wire encloses no area".into(),
        ));
    }
    let normal = canonical_normal(normal.normalize());
    let origin = ring[0];
    let off_plane = ring
        .iter()
        .map(|p| (*p - origin).dot(normal).abs())
        .fold(0.0, f64::max);
    if off_plane > JOIN_TOLERANCE {
        return Err(CadError::InvalidProfile(format!(
            "wire is not planar (deviation {off_plane:.3e})"
        )));
    }
    let (x_axis, y_axis) = plane_axes(normal);
    // Translation sits at the foot of the world origin on the plane
    Ok(DAffine3::from_cols(
        x_axis,
        y_axis,
        normal,
        normal * origin.dot(normal),
    ))
}

fn canonical_normal(n: DVec3) -> DVec3 {
    let dominant = if n.x.abs() >= n.y.abs() && n.x.abs() >= n.z.abs() {
        n.x
    } else if n.y.abs() >= n.z.abs() {
        n.y
    } else {
        n.z
    };
    if dominant < 0.0 { -n } else { n }
}

/// In-plane axes for a unit normal; world X/Y for the XY plane
pub fn plane_axes(normal: DVec3) -> (DVec3, DVec3) {
    if normal.abs_diff_eq(DVec3::Z, 1e-12) {
        return (DVec3::X, DVec3::Y);
    }
    let reference = if normal.z.abs() < 0.9 {
        DVec3::Z
    } else {
        DVec3::X
    };
    let x_axis = reference.cross(normal).normalize();
    (x_axis, normal.cross(x_axis))
}

/// Drop the closing coordinate geo keeps on every ring
pub fn open_ring(ring: &LineString<f64>) -> &[Coord<f64>] {
    let coords = &ring.0[..];
    if coords.len() > 1 && coords[0] == coords[coords.len() - 1] {
        &coords[..coords.len() - 1]
    } else {
        coords
    }
}

/// Build a normalized polygon from world rings lying on `placement`'s plane
pub fn region_from_rings(
    placement: &DAffine3,
    outer: &[DVec3],
    holes: &[Vec<DVec3>],
) -> Polygon<f64> {
    let inverse = placement.inverse();
    let to_ring = |ring: &[DVec3]| {
        LineString::new(
            ring.iter()
                .map(|p| {
                    let local = inverse.transform_point3(*p);
                    Coord {
                        x: local.x,
                        y: local.y,
                    }
                })
                .collect(),
        )
    };
    Polygon::new(to_ring(outer), holes.iter().map(|h| to_ring(h)).collect())
        .orient(Direction::Default)
}

/// Number of chords needed to stay within `tolerance` of an arc
pub fn arc_segments(radius: f64, sweep: f64, tolerance: f64, min_segments: usize) -> usize {
    let step = if tolerance >= radius {
        FRAC_PI_2
    } else {
        (2.0 * (1.0 - tolerance / radius).acos()).min(FRAC_PI_2)
    };
    let full = ((TAU / step).ceil() as usize).max(min_segments);
    // Multiples of four keep the quadrant points, so circle bounds are exact
    let full = full.div_ceil(4) * 4;
    ((full as f64 * sweep.abs() / TAU).ceil() as usize).max(1)
}

/// Circumcircle center of three points, `None` when collinear
pub fn circumcenter(a: DVec2, b: DVec2, c: DVec2) -> Option<DVec2> {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() < 1e-12 {
        return None;
    }
    let (a2, b2, c2) = (a.length_squared(), b.length_squared(), c.length_squared());
    Some(DVec2::new(
        (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d,
        (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d,
    ))
}

/// Signed sweep from `start` through `mid` to `end` around `center`
pub fn arc_sweep(center: DVec2, start: DVec2, mid: DVec2, end: DVec2) -> (f64, f64) {
    let angle = |p: DVec2| (p.y - center.y).atan2(p.x - center.x);
    let a0 = angle(start);
    let ccw_end = (angle(end) - a0).rem_euclid(TAU);
    let ccw_mid = (angle(mid) - a0).rem_euclid(TAU);
    if ccw_mid <= ccw_end {
        (a0, ccw_end)
    } else {
        (a0, ccw_end - TAU)
    }
}
