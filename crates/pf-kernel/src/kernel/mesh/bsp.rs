//! # BSP Tree Booleans
//!
//! Solid union and difference on triangle meshes by binary space partitioning.
//!
//! Each node stores a splitting plane, the polygons coplanar with it, and
//! front/back subtrees. Union keeps the parts of each operand outside the
//! other; difference keeps `a` outside `b` plus the parts of `b` inside `a`,
//! reversed.

use glam::DVec3;

use super::geometry::TriMesh;

/// Plane-side classification tolerance
const EPSILON: f64 = 1e-5;

/// Stack reserved before each recursive descent
const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROWTH: usize = 2 * 1024 * 1024;

const COPLANAR: u8 = 0;
const FRONT: u8 = 1;
const BACK: u8 = 2;
const SPANNING: u8 = 3;

#[derive(Debug, Clone, Copy)]
struct Plane {
    normal: DVec3,
    w: f64,
}

impl Plane {
    fn from_points(a: DVec3, b: DVec3, c: DVec3) -> Option<Self> {
        let n = (b - a).cross(c - a);
        if n.length_squared() < 1e-24 {
            return None;
        }
        let normal = n.normalize();
        Some(Self {
            normal,
            w: normal.dot(a),
        })
    }

    fn flip(&mut self) {
        self.normal = -self.normal;
        self.w = -self.w;
    }

    /// Sort `polygon` into the four output lists, splitting it if it spans the plane
    fn split_polygon(
        &self,
        polygon: &Polygon,
        coplanar_front: &mut Vec<Polygon>,
        coplanar_back: &mut Vec<Polygon>,
        front: &mut Vec<Polygon>,
        back: &mut Vec<Polygon>,
    ) {
        let mut polygon_type = COPLANAR;
        let types: Vec<u8> = polygon
            .vertices
            .iter()
            .map(|v| {
                let t = self.normal.dot(*v) - self.w;
                let kind = if t < -EPSILON {
                    BACK
                } else if t > EPSILON {
                    FRONT
                } else {
                    COPLANAR
                };
                polygon_type |= kind;
                kind
            })
            .collect();

        match polygon_type {
            COPLANAR => {
                if self.normal.dot(polygon.plane.normal) > 0.0 {
                    coplanar_front.push(polygon.clone());
                } else {
                    coplanar_back.push(polygon.clone());
                }
            }
            FRONT => front.push(polygon.clone()),
            BACK => back.push(polygon.clone()),
            _ => {
                let n = polygon.vertices.len();
                let mut f = Vec::with_capacity(n + 1);
                let mut b = Vec::with_capacity(n + 1);
                for i in 0..n {
                    let j = (i + 1) % n;
                    let (ti, tj) = (types[i], types[j]);
                    let (vi, vj) = (polygon.vertices[i], polygon.vertices[j]);
                    if ti != BACK {
                        f.push(vi);
                    }
                    if ti != FRONT {
                        b.push(vi);
                    }
                    if (ti | tj) == SPANNING {
                        let t = (self.w - self.normal.dot(vi)) / self.normal.dot(vj - vi);
                        let v = vi.lerp(vj, t);
                        f.push(v);
                        b.push(v);
                    }
                }
                if f.len() >= 3 {
                    front.push(Polygon {
                        vertices: f,
                        plane: polygon.plane,
                    });
                }
                if b.len() >= 3 {
                    back.push(Polygon {
                        vertices: b,
                        plane: polygon.plane,
                    });
                }
            }
        }
    }
}

/// Convex planar polygon
#[derive(Debug, Clone)]
struct Polygon {
    vertices: Vec<DVec3>,
    plane: Plane,
}

impl Polygon {
    fn from_triangle(t: &[DVec3; 3]) -> Option<Self> {
        Plane::from_points(t[0], t[1], t[2]).map(|plane| Self {
            vertices: t.to_vec(),
            plane,
        })
    }

    fn flip(&mut self) {
        self.vertices.reverse();
        self.plane.flip();
    }
}

#[derive(Debug, Default)]
struct Node {
    plane: Option<Plane>,
    polygons: Vec<Polygon>,
    front: Option<Box<Node>>,
    back: Option<Box<Node>>,
}

impl Node {
    fn new(polygons: Vec<Polygon>) -> Self {
        let mut node = Node::default();
        node.build(polygons);
        node
    }

    /// Convert solid space to empty space and empty space to solid space
    fn invert(&mut self) {
        for p in &mut self.polygons {
            p.flip();
        }
        if let Some(plane) = &mut self.plane {
            plane.flip();
        }
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
            if let Some(front) = &mut self.front {
                front.invert();
            }
            if let Some(back) = &mut self.back {
                back.invert();
            }
        });
        std::mem::swap(&mut self.front, &mut self.back);
    }

    /// Remove the parts of `polygons` that lie inside this tree
    fn clip_polygons(&self, polygons: Vec<Polygon>) -> Vec<Polygon> {
        let Some(plane) = &self.plane else {
            return polygons;
        };
        let mut front = Vec::new();
        let mut back = Vec::new();
        for polygon in &polygons {
            let mut coplanar_front = Vec::new();
            let mut coplanar_back = Vec::new();
            plane.split_polygon(
                polygon,
                &mut coplanar_front,
                &mut coplanar_back,
                &mut front,
                &mut back,
            );
            front.append(&mut coplanar_front);
            back.append(&mut coplanar_back);
        }
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
            let mut kept = match &self.front {
                Some(node) => node.clip_polygons(front),
                None => front,
            };
            if let Some(node) = &self.back {
                kept.extend(node.clip_polygons(back));
            }
            kept
        })
    }

    /// Remove the parts of this tree's polygons that lie inside `other`
    fn clip_to(&mut self, other: &Node) {
        self.polygons = other.clip_polygons(std::mem::take(&mut self.polygons));
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
            if let Some(front) = &mut self.front {
                front.clip_to(other);
            }
            if let Some(back) = &mut self.back {
                back.clip_to(other);
            }
        });
    }

    fn all_polygons(&self) -> Vec<Polygon> {
        let mut out = self.polygons.clone();
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
            if let Some(front) = &self.front {
                out.extend(front.all_polygons());
            }
            if let Some(back) = &self.back {
                out.extend(back.all_polygons());
            }
        });
        out
    }

    fn build(&mut self, polygons: Vec<Polygon>) {
        let Some(first) = polygons.first() else {
            return;
        };
        let plane = *self.plane.get_or_insert(first.plane);
        let mut front = Vec::new();
        let mut back = Vec::new();
        let mut coplanar = Vec::new();
        for polygon in &polygons {
            let mut coplanar_back = Vec::new();
            plane.split_polygon(
                polygon,
                &mut coplanar,
                &mut coplanar_back,
                &mut front,
                &mut back,
            );
            coplanar.append(&mut coplanar_back);
        }
        self.polygons.append(&mut coplanar);
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
            if !front.is_empty() {
                self.front.get_or_insert_with(Box::default).build(front);
            }
            if !back.is_empty() {
                self.back.get_or_insert_with(Box::default).build(back);
            }
        });
    }
}

fn to_polygons(mesh: &TriMesh) -> Vec<Polygon> {
    mesh.triangles
        .iter()
        .filter_map(Polygon::from_triangle)
        .collect()
}

fn to_mesh(polygons: Vec<Polygon>) -> TriMesh {
    let mut triangles = Vec::new();
    for polygon in polygons {
        let v = &polygon.vertices;
        for i in 1..v.len() - 1 {
            triangles.push([v[0], v[i], v[i + 1]]);
        }
    }
    TriMesh { triangles }
}

pub fn union(a: &TriMesh, b: &TriMesh) -> TriMesh {
    let mut a = Node::new(to_polygons(a));
    let mut b = Node::new(to_polygons(b));
    a.clip_to(&b);
    b.clip_to(&a);
    b.invert();
    b.clip_to(&a);
    b.invert();
    a.build(b.all_polygons());
    to_mesh(a.all_polygons())
}

pub fn subtract(a: &TriMesh, b: &TriMesh) -> TriMesh {
    let mut a = Node::new(to_polygons(a));
    let mut b = Node::new(to_polygons(b));
    a.invert();
    a.clip_to(&b);
    b.clip_to(&a);
    b.invert();
    b.clip_to(&a);
    b.invert();
    a.build(b.all_polygons());
    a.invert();
    to_mesh(a.all_polygons())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Axis-aligned box with outward winding
    fn cuboid(min: DVec3, max: DVec3) -> TriMesh {
        // Corner bits: 1 = max x, 2 = max y, 4 = max z
        let c = |i: usize| {
            DVec3::new(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            )
        };
        let quads = [
            [0, 2, 3, 1],
            [4, 5, 7, 6],
            [0, 1, 5, 4],
            [2, 6, 7, 3],
            [0, 4, 6, 2],
            [1, 3, 7, 5],
        ]
        .map(|q: [usize; 4]| q.map(c));
        let mut triangles = Vec::new();
        for q in quads {
            triangles.push([q[0], q[1], q[2]]);
            triangles.push([q[0], q[2], q[3]]);
        }
        TriMesh { triangles }
    }

    #[test]
    fn test_cuboid_volume() {
        assert_relative_eq!(cuboid(DVec3::ZERO, DVec3::splat(2.0)).signed_volume(), 8.0);
    }

    #[test]
    fn test_union_overlapping_boxes() {
        let a = cuboid(DVec3::ZERO, DVec3::splat(2.0));
        let b = cuboid(DVec3::new(1.0, 0.5, 0.5), DVec3::new(3.0, 1.5, 1.5));
        assert_relative_eq!(union(&a, &b).signed_volume(), 9.0, epsilon = 1e-9);
    }

    #[test]
    fn test_subtract_overlapping_boxes() {
        let a = cuboid(DVec3::ZERO, DVec3::splat(2.0));
        let b = cuboid(DVec3::new(1.0, 0.5, 0.5), DVec3::new(3.0, 1.5, 1.5));
        assert_relative_eq!(subtract(&a, &b).signed_volume(), 7.0, epsilon = 1e-9);
    }

    #[test]
    fn test_disjoint_union_keeps_both() {
        let a = cuboid(DVec3::ZERO, DVec3::ONE);
        let b = cuboid(DVec3::splat(5.0), DVec3::splat(6.0));
        assert_relative_eq!(union(&a, &b).signed_volume(), 2.0, epsilon = 1e-9);
    }
}
