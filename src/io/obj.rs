//! Wavefront OBJ support.
//!
//! Only `v` and `f` records are read. Face corners may carry texture and
//! normal references (`f 1/1/1 2/2/2 3/3/3`); those are skipped. Negative
//! indices count back from the last vertex read so far.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::debug;
use nalgebra::Point3;

use crate::error::{MeshError, Result};
use crate::mesh::{build_from_polygons, to_polygons, Bmesh, MeshIndex};

fn parse_error(line: usize, message: impl Into<String>) -> MeshError {
    MeshError::Parse {
        line,
        message: message.into(),
    }
}

/// Resolve one face corner to a zero-based vertex index.
fn corner(token: &str, num_verts: usize, line: usize) -> Result<usize> {
    let head = token.split('/').next().unwrap_or(token);
    let idx: i64 = head
        .parse()
        .map_err(|_| parse_error(line, format!("bad vertex reference '{}'", token)))?;
    match idx {
        0 => Err(parse_error(line, "vertex index 0")),
        i if i > 0 => Ok(i as usize - 1),
        i => {
            let back = i.unsigned_abs() as usize;
            num_verts
                .checked_sub(back)
                .ok_or_else(|| parse_error(line, format!("relative index {} before the first vertex", i)))
        }
    }
}

/// Read an OBJ stream.
pub fn read<R: BufRead, I: MeshIndex>(reader: R) -> Result<Bmesh<I>> {
    let mut vertices: Vec<Point3<f64>> = Vec::new();
    let mut faces: Vec<Vec<usize>> = Vec::new();

    for (n, text) in reader.lines().enumerate() {
        let text = text?;
        let line = n + 1;
        let mut tokens = text.split_whitespace();
        match tokens.next() {
            Some("v") => {
                let coords: Vec<f64> = tokens
                    .take(3)
                    .map(|t| t.parse::<f64>())
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| parse_error(line, e.to_string()))?;
                let [x, y, z] = coords[..] else {
                    return Err(parse_error(line, "vertex needs three coordinates"));
                };
                vertices.push(Point3::new(x, y, z));
            }
            Some("f") => {
                let face = tokens
                    .map(|t| corner(t, vertices.len(), line))
                    .collect::<Result<Vec<usize>>>()?;
                if face.len() < 3 {
                    return Err(parse_error(line, "face needs at least three corners"));
                }
                faces.push(face);
            }
            Some(other) if !other.starts_with('#') => debug!("obj: skipping '{}' on line {}", other, line),
            _ => {}
        }
    }

    build_from_polygons(&vertices, &faces)
}

/// Write a mesh as OBJ. Quads split along a weak diagonal are written as
/// quads.
pub fn write<W: Write, I: MeshIndex>(mesh: &Bmesh<I>, mut writer: W) -> Result<()> {
    let (vertices, faces) = to_polygons(mesh);
    writeln!(writer, "# jot: {} vertices, {} faces", vertices.len(), faces.len())?;
    for p in &vertices {
        writeln!(writer, "v {} {} {}", p.x, p.y, p.z)?;
    }
    for face in &faces {
        write!(writer, "f")?;
        for &v in face {
            write!(writer, " {}", v + 1)?;
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

/// Load an OBJ file.
pub fn load<P: AsRef<Path>, I: MeshIndex>(path: P) -> Result<Bmesh<I>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    read(BufReader::new(file)).map_err(|e| match e {
        MeshError::Parse { .. } => MeshError::LoadError {
            path: path.to_path_buf(),
            message: e.to_string(),
        },
        other => other,
    })
}

/// Save a mesh as an OBJ file.
pub fn save<P: AsRef<Path>, I: MeshIndex>(mesh: &Bmesh<I>, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write(mesh, BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::VertexId;

    const QUAD: &str = "\
# unit square
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vn 0 0 1
f 1//1 2//1 3//1 4//1
";

    #[test]
    fn test_read_quad() {
        let mesh: Bmesh = read(QUAD.as_bytes()).unwrap();
        assert_eq!(mesh.num_verts(), 4);
        assert_eq!(mesh.num_faces(), 2);
        let diagonal = mesh.lookup_edge(VertexId::new(0), VertexId::new(2)).unwrap();
        assert!(mesh.edge(diagonal).is_weak());
    }

    #[test]
    fn test_relative_indices() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let mesh: Bmesh = read(text.as_bytes()).unwrap();
        assert_eq!(mesh.num_faces(), 1);

        let err = read::<_, u32>("v 0 0 0\nf -1 -2 -3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, MeshError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_bad_input() {
        let zero = read::<_, u32>("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 0 1 2\n".as_bytes());
        assert!(matches!(zero, Err(MeshError::Parse { line: 4, .. })));

        let short = read::<_, u32>("v 0 0\n".as_bytes());
        assert!(matches!(short, Err(MeshError::Parse { line: 1, .. })));

        let range = read::<_, u32>("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n".as_bytes());
        assert!(matches!(range, Err(MeshError::InvalidVertexIndex { vertex: 8, .. })));
    }

    #[test]
    fn test_write_keeps_quads() {
        let mesh: Bmesh = read(QUAD.as_bytes()).unwrap();
        let mut out = Vec::new();
        write(&mesh, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("f ")).count(), 1);

        let again: Bmesh = read(text.as_bytes()).unwrap();
        assert_eq!(again.counts(), mesh.counts());
    }
}
