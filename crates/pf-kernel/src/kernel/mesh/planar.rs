//! Boolean operations on coplanar faces

use geo::orient::{Direction, Orient};
use geo::{Area, BooleanOps, Coord, MapCoords, MultiPolygon, Polygon};
use glam::{DAffine3, DVec3};

use super::geometry::{JOIN_TOLERANCE, PlanarFace};
use crate::kernel::{CadError, CadResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionOp {
    Union,
    Difference,
}

/// Combine two sets of faces lying on one plane
///
/// The result is expressed in the placement of the first face found, with
/// coordinates snapped to a `fuzzy` grid so nearly coincident edges merge.
pub fn combine(
    a: &[PlanarFace],
    b: &[PlanarFace],
    op: RegionOp,
    fuzzy: f64,
) -> CadResult<Vec<PlanarFace>> {
    let Some(base) = a.first().or_else(|| b.first()).map(|f| f.placement) else {
        return Ok(Vec::new());
    };
    let tolerance = fuzzy.max(JOIN_TOLERANCE);

    let lhs = to_base(a, &base, tolerance, fuzzy)?;
    let rhs = to_base(b, &base, tolerance, fuzzy)?;
    let result = match op {
        RegionOp::Union => lhs.union(&rhs),
        RegionOp::Difference => lhs.difference(&rhs),
    };

    let min_area = tolerance * tolerance;
    Ok(result
        .0
        .into_iter()
        .filter(|p| p.unsigned_area() > min_area)
        .map(|region| PlanarFace {
            placement: base,
            region: region.orient(Direction::Default),
        })
        .collect())
}

/// Check that `face` lies on the plane of `base`
pub fn is_coplanar(face: &PlanarFace, base: &DAffine3, tolerance: f64) -> bool {
    let normal = base.matrix3.z_axis;
    let parallel = face.normal().dot(normal).abs() > 1.0 - 1e-9;
    let offset = (face.origin() - base.translation).dot(normal).abs();
    parallel && offset <= tolerance
}

fn to_base(
    faces: &[PlanarFace],
    base: &DAffine3,
    tolerance: f64,
    fuzzy: f64,
) -> CadResult<MultiPolygon<f64>> {
    let inverse = base.inverse();
    let mut polygons = Vec::with_capacity(faces.len());
    for face in faces {
        if !is_coplanar(face, base, tolerance) {
            return Err(CadError::BooleanFailed(
                "faces do not share a plane".into(),
            ));
        }
        let local_to_base = inverse * face.placement;
        polygons.push(reproject(&face.region, &local_to_base, fuzzy));
    }
    Ok(MultiPolygon::new(polygons))
}

fn reproject(region: &Polygon<f64>, transform: &DAffine3, fuzzy: f64) -> Polygon<f64> {
    let transform = *transform;
    region.map_coords(move |c| {
        let p = transform.transform_point3(DVec3::new(c.x, c.y, 0.0));
        Coord {
            x: snap(p.x, fuzzy),
            y: snap(p.y, fuzzy),
        }
    })
}

fn snap(value: f64, fuzzy: f64) -> f64 {
    if fuzzy > 0.0 {
        (value / fuzzy).round() * fuzzy
    } else {
        value
    }
}
