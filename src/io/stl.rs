//! STL support through `stl_io`.
//!
//! STL stores three corners per triangle. Corners with identical
//! coordinates are welded on load so the result is a connected mesh.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::Path;

use log::warn;
use nalgebra::{Point3, Vector3};

use crate::error::{MeshError, Result};
use crate::mesh::{build_from_triangles, to_face_vertex, Bmesh, MeshIndex};

/// Read a binary or ASCII STL stream.
pub fn read<R: Read + Seek, I: MeshIndex>(reader: &mut R) -> Result<Bmesh<I>> {
    let stl = stl_io::read_stl(reader)?;

    let mut welded: HashMap<[u32; 3], usize> = HashMap::with_capacity(stl.vertices.len());
    let mut vertices: Vec<Point3<f64>> = Vec::with_capacity(stl.vertices.len());
    let mut index = |v: &stl_io::Vertex| {
        let key = [v[0].to_bits(), v[1].to_bits(), v[2].to_bits()];
        *welded.entry(key).or_insert_with(|| {
            vertices.push(Point3::new(v[0] as f64, v[1] as f64, v[2] as f64));
            vertices.len() - 1
        })
    };

    let mut faces: Vec<[usize; 3]> = Vec::with_capacity(stl.faces.len());
    let mut skipped = 0;
    for tri in &stl.faces {
        let [a, b, c] = tri.vertices.map(|i| index(&stl.vertices[i]));
        if a == b || b == c || a == c {
            skipped += 1;
            continue;
        }
        faces.push([a, b, c]);
    }
    if skipped > 0 {
        warn!("stl: skipped {} degenerate triangles", skipped);
    }

    build_from_triangles(&vertices, &faces)
}

/// Write a mesh as binary STL.
pub fn write<W: Write, I: MeshIndex>(mesh: &Bmesh<I>, writer: &mut W) -> Result<()> {
    let (vertices, faces) = to_face_vertex(mesh);
    let to_vertex = |p: &Point3<f64>| stl_io::Vertex::new([p.x as f32, p.y as f32, p.z as f32]);

    let triangles: Vec<stl_io::Triangle> = faces
        .iter()
        .map(|&[a, b, c]| {
            let (p, q, r) = (&vertices[a], &vertices[b], &vertices[c]);
            let n = (q - p).cross(&(r - p)).try_normalize(0.0).unwrap_or_else(Vector3::zeros);
            stl_io::Triangle {
                normal: stl_io::Normal::new([n.x as f32, n.y as f32, n.z as f32]),
                vertices: [to_vertex(p), to_vertex(q), to_vertex(r)],
            }
        })
        .collect();

    stl_io::write_stl(writer, triangles.iter())?;
    writer.flush()?;
    Ok(())
}

/// Load an STL file.
pub fn load<P: AsRef<Path>, I: MeshIndex>(path: P) -> Result<Bmesh<I>> {
    let path = path.as_ref();
    let mut file = File::open(path)?;
    read(&mut file).map_err(|e| match e {
        MeshError::Io(err) => MeshError::LoadError {
            path: path.to_path_buf(),
            message: err.to_string(),
        },
        other => other,
    })
}

/// Save a mesh as a binary STL file.
pub fn save<P: AsRef<Path>, I: MeshIndex>(mesh: &Bmesh<I>, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    write(mesh, &mut writer).map_err(|e| MeshError::SaveError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_write_then_weld() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        let mesh: Bmesh = build_from_triangles(&vertices, &[[0, 1, 2], [1, 3, 2]]).unwrap();

        let mut bytes = Cursor::new(Vec::new());
        write(&mesh, &mut bytes).unwrap();
        // 80-byte header, count, 50 bytes per triangle
        assert_eq!(bytes.get_ref().len(), 84 + 2 * 50);

        bytes.set_position(0);
        let back: Bmesh = read(&mut bytes).unwrap();
        assert_eq!(back.num_verts(), 4);
        assert_eq!(back.num_edges(), 5);
        assert!(back.is_valid());
    }
}
