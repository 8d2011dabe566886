//! STL export of tessellated shapes

use std::io::Write;
use std::path::Path;

use crate::kernel::{CadError, CadResult, TessellatedMesh};

/// Write a tessellated mesh as binary STL
pub fn write_stl<W: Write>(mesh: &TessellatedMesh, writer: &mut W) -> CadResult<()> {
    let mut triangles = Vec::with_capacity(mesh.triangle_count());
    for (i, chunk) in mesh.indices.chunks(3).enumerate() {
        if chunk.len() != 3 {
            continue;
        }

        let corner = |k: usize| -> CadResult<[f32; 3]> {
            mesh.vertices
                .get(chunk[k] as usize)
                .copied()
                .ok_or_else(|| CadError::Export(format!("triangle {i} indexes a missing vertex")))
        };
        let (v0, v1, v2) = (corner(0)?, corner(1)?, corner(2)?);

        // Per-vertex normals are flat in kernel output; use the first corner
        let normal = mesh
            .normals
            .get(chunk[0] as usize)
            .copied()
            .unwrap_or_else(|| face_normal(v0, v1, v2));

        triangles.push(stl_io::Triangle {
            normal: stl_io::Normal::new(normal),
            vertices: [
                stl_io::Vertex::new(v0),
                stl_io::Vertex::new(v1),
                stl_io::Vertex::new(v2),
            ],
        });
    }

    stl_io::write_stl(writer, triangles.iter()).map_err(|e| CadError::Export(e.to_string()))
}

/// Save a tessellated mesh to an STL file
pub fn save_stl(mesh: &TessellatedMesh, path: impl AsRef<Path>) -> CadResult<()> {
    let path = path.as_ref();
    let mut file = std::fs::File::create(path)
        .map_err(|e| CadError::Export(format!("{}: {e}", path.display())))?;
    write_stl(mesh, &mut file)?;
    tracing::info!(path = %path.display(), triangles = mesh.triangle_count(), "Saved STL");
    Ok(())
}

fn face_normal(v0: [f32; 3], v1: [f32; 3], v2: [f32; 3]) -> [f32; 3] {
    let e1 = glam::Vec3::from(v1) - glam::Vec3::from(v0);
    let e2 = glam::Vec3::from(v2) - glam::Vec3::from(v0);
    let n = e1.cross(e2);
    if n.length() > 0.0 {
        n.normalize().to_array()
    } else {
        [0.0, 0.0, 1.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn triangle_mesh() -> TessellatedMesh {
        let mut mesh = TessellatedMesh::new();
        mesh.push_triangle([DVec3::ZERO, DVec3::X, DVec3::Y]);
        mesh.push_triangle([DVec3::ZERO, DVec3::Y, DVec3::Z]);
        mesh
    }

    #[test]
    fn test_write_and_read_back() {
        let mut bytes = Vec::new();
        write_stl(&triangle_mesh(), &mut bytes).unwrap();
        // 80 byte header, u32 count, 50 bytes per triangle
        assert_eq!(bytes.len(), 84 + 2 * 50);

        let mut reader = std::io::Cursor::new(bytes);
        let indexed = stl_io::read_stl(&mut reader).unwrap();
        assert_eq!(indexed.faces.len(), 2);
    }

    #[test]
    fn test_save_stl_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part.stl");
        save_stl(&triangle_mesh(), &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_missing_vertex_is_an_error() {
        let mut mesh = triangle_mesh();
        mesh.indices.push(99);
        mesh.indices.push(0);
        mesh.indices.push(1);
        let mut bytes = Vec::new();
        assert!(matches!(
            write_stl(&mesh, &mut bytes),
            Err(CadError::Export(_))
        ));
    }
}
