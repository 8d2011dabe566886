//! Through-sections lofting on polygonal rings

use geo::{Coord, LineString, Polygon};
use glam::DVec3;

use super::geometry::{PlanarFace, TriMesh, centroid, newell_normal, orient_triangle, plane_axes};

/// Skin a sequence of closed rings
///
/// Rings are refined to a common vertex count, oriented consistently and
/// rotated so that corresponding vertices line up. With `ruled == false`,
/// `smoothing_steps` Catmull-Rom rings are inserted between sections.
pub fn skin(
    rings: &[Vec<DVec3>],
    ruled: bool,
    solid: bool,
    smoothing_steps: usize,
    precision: f64,
) -> TriMesh {
    let count = rings.iter().map(Vec::len).max().unwrap_or(0);
    let mut aligned: Vec<Vec<DVec3>> = Vec::with_capacity(rings.len());
    for ring in rings {
        let mut ring = dedup_ring(ring, precision);
        refine(&mut ring, count);
        if let Some(reference) = aligned.last() {
            ring = align(reference, ring);
        }
        aligned.push(ring);
    }

    let stations = if ruled || aligned.len() < 3 {
        aligned
    } else {
        interpolate(&aligned, smoothing_steps)
    };

    let mut mesh = TriMesh::default();
    for pair in stations.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let n = a.len();
        for j in 0..n {
            let k = (j + 1) % n;
            mesh.triangles.push([a[j], a[k], b[k]]);
            mesh.triangles.push([a[j], b[k], b[j]]);
        }
    }

    if solid {
        if let (Some(first), Some(last)) = (stations.first(), stations.last()) {
            // Caps follow the side winding; orient_outward fixes both together
            let mut axis = centroid(last) - centroid(first);
            if newell_normal(first).dot(axis) < 0.0 {
                axis = -axis;
            }
            mesh.triangles.extend(cap(first, -axis));
            mesh.triangles.extend(cap(last, axis));
        }
        mesh.orient_outward();
    }
    mesh
}

/// Remove consecutive points closer than `precision`
fn dedup_ring(ring: &[DVec3], precision: f64) -> Vec<DVec3> {
    let mut out: Vec<DVec3> = Vec::with_capacity(ring.len());
    for p in ring {
        if out.last().is_none_or(|q| q.distance(*p) > precision) {
            out.push(*p);
        }
    }
    while out.len() > 1 && out[0].distance(out[out.len() - 1]) <= precision {
        out.pop();
    }
    out
}

/// Split the longest edge until the ring has `count` vertices
fn refine(ring: &mut Vec<DVec3>, count: usize) {
    while ring.len() < count {
        let n = ring.len();
        let longest = (0..n)
            .max_by(|&i, &j| {
                let li = ring[i].distance_squared(ring[(i + 1) % n]);
                let lj = ring[j].distance_squared(ring[(j + 1) % n]);
                li.total_cmp(&lj)
            })
            .unwrap_or(0);
        let mid = (ring[longest] + ring[(longest + 1) % n]) * 0.5;
        ring.insert(longest + 1, mid);
    }
}

/// Match winding and starting vertex of `ring` to `reference`
fn align(reference: &[DVec3], mut ring: Vec<DVec3>) -> Vec<DVec3> {
    if newell_normal(reference).dot(newell_normal(&ring)) < 0.0 {
        ring.reverse();
    }
    let (rc, c) = (centroid(reference), centroid(&ring));
    let n = ring.len();
    let best = (0..n)
        .min_by(|&s, &t| {
            let cost = |shift: usize| -> f64 {
                (0..n)
                    .map(|j| ((ring[(j + shift) % n] - c) - (reference[j] - rc)).length_squared())
                    .sum()
            };
            cost(s).total_cmp(&cost(t))
        })
        .unwrap_or(0);
    ring.rotate_left(best);
    ring
}

/// Catmull-Rom stations through the section rings
fn interpolate(rings: &[Vec<DVec3>], steps: usize) -> Vec<Vec<DVec3>> {
    let last = rings.len() - 1;
    let mut stations = Vec::with_capacity(last * (steps + 1) + 1);
    for i in 0..last {
        let p0 = &rings[i.saturating_sub(1)];
        let p1 = &rings[i];
        let p2 = &rings[i + 1];
        let p3 = &rings[(i + 2).min(last)];
        for step in 0..=steps {
            let t = step as f64 / (steps + 1) as f64;
            stations.push(
                (0..p1.len())
                    .map(|j| catmull_rom(p0[j], p1[j], p2[j], p3[j], t))
                    .collect(),
            );
        }
    }
    stations.push(rings[last].clone());
    stations
}

fn catmull_rom(p0: DVec3, p1: DVec3, p2: DVec3, p3: DVec3, t: f64) -> DVec3 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (p2 - p0) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (3.0 * p1 - p0 - 3.0 * p2 + p3) * t3)
}

/// Triangulated end cap facing `outward`
fn cap(ring: &[DVec3], outward: DVec3) -> Vec<[DVec3; 3]> {
    let normal = newell_normal(ring).normalize_or_zero();
    if normal == DVec3::ZERO {
        return Vec::new();
    }
    let (x_axis, y_axis) = plane_axes(normal);
    let origin = ring[0];
    let exterior: Vec<Coord<f64>> = ring
        .iter()
        .map(|p| Coord {
            x: (*p - origin).dot(x_axis),
            y: (*p - origin).dot(y_axis),
        })
        .collect();
    let face = PlanarFace {
        placement: glam::DAffine3::from_cols(x_axis, y_axis, normal, origin),
        region: Polygon::new(LineString::new(exterior), vec![]),
    };
    face.triangles()
        .into_iter()
        .map(|t| orient_triangle(t, outward))
        .collect()
}
