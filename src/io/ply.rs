//! PLY support.
//!
//! Loading goes through `ply-rs` and accepts ASCII and binary files. Vertex
//! colors in `red`/`green`/`blue` properties are kept. Saving writes ASCII
//! and adds color properties only when some vertex has a color.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::{Point3, Vector3};
use ply_rs::parser::Parser;
use ply_rs::ply::{DefaultElement, Property};

use crate::error::{MeshError, Result};
use crate::mesh::{build_from_polygons, to_polygons, Bmesh, MeshIndex, VertexId};

fn scalar(element: &DefaultElement, name: &str) -> Option<f64> {
    Some(match *element.get(name)? {
        Property::Float(v) => v as f64,
        Property::Double(v) => v,
        Property::Int(v) => v as f64,
        Property::UInt(v) => v as f64,
        Property::Short(v) => v as f64,
        Property::UShort(v) => v as f64,
        Property::Char(v) => v as f64,
        Property::UChar(v) => v as f64,
        _ => return None,
    })
}

fn channel(element: &DefaultElement, name: &str) -> Option<f64> {
    match *element.get(name)? {
        Property::UChar(v) => Some(v as f64 / 255.0),
        Property::Float(v) => Some(v as f64),
        Property::Double(v) => Some(v),
        _ => None,
    }
}

fn index_list(element: &DefaultElement) -> Option<Vec<usize>> {
    let list = element.get("vertex_indices").or_else(|| element.get("vertex_index"))?;
    Some(match list {
        Property::ListInt(v) => v.iter().map(|&x| x as usize).collect(),
        Property::ListUInt(v) => v.iter().map(|&x| x as usize).collect(),
        Property::ListShort(v) => v.iter().map(|&x| x as usize).collect(),
        Property::ListUShort(v) => v.iter().map(|&x| x as usize).collect(),
        Property::ListUChar(v) => v.iter().map(|&x| x as usize).collect(),
        _ => return None,
    })
}

fn malformed(message: &str) -> MeshError {
    MeshError::InvalidState(format!("ply: {}", message))
}

/// Read a PLY stream.
pub fn read<R: BufRead, I: MeshIndex>(reader: &mut R) -> Result<Bmesh<I>> {
    let ply = Parser::<DefaultElement>::new().read_ply(reader)?;

    let verts = ply.payload.get("vertex").ok_or_else(|| malformed("no vertex element"))?;
    let mut positions = Vec::with_capacity(verts.len());
    let mut colors = Vec::with_capacity(verts.len());
    for vert in verts {
        let [x, y, z] = ["x", "y", "z"].map(|axis| scalar(vert, axis));
        let (Some(x), Some(y), Some(z)) = (x, y, z) else {
            return Err(malformed("vertex without x, y and z"));
        };
        positions.push(Point3::new(x, y, z));
        colors.push(match ["red", "green", "blue"].map(|c| channel(vert, c)) {
            [Some(r), Some(g), Some(b)] => Some(Vector3::new(r, g, b)),
            _ => None,
        });
    }

    let faces: Vec<Vec<usize>> = ply
        .payload
        .get("face")
        .ok_or_else(|| malformed("no face element"))?
        .iter()
        .map(|face| index_list(face).ok_or_else(|| malformed("face without vertex_indices")))
        .collect::<Result<_>>()?;

    let mut mesh = build_from_polygons(&positions, &faces)?;
    for (i, color) in colors.into_iter().enumerate() {
        if color.is_some() {
            mesh.set_color(VertexId::new(i), color)?;
        }
    }
    Ok(mesh)
}

/// Write a mesh as ASCII PLY.
pub fn write<W: Write, I: MeshIndex>(mesh: &Bmesh<I>, writer: &mut W) -> Result<()> {
    let (positions, faces) = to_polygons(mesh);
    let colors: Vec<Option<Vector3<f64>>> = mesh.vertices().map(|(_, v)| v.color()).collect();
    let colored = colors.iter().any(Option::is_some);

    writeln!(writer, "ply")?;
    writeln!(writer, "format ascii 1.0")?;
    writeln!(writer, "comment written by jot")?;
    writeln!(writer, "element vertex {}", positions.len())?;
    for axis in ["x", "y", "z"] {
        writeln!(writer, "property double {}", axis)?;
    }
    if colored {
        for c in ["red", "green", "blue"] {
            writeln!(writer, "property uchar {}", c)?;
        }
    }
    writeln!(writer, "element face {}", faces.len())?;
    writeln!(writer, "property list uchar uint vertex_indices")?;
    writeln!(writer, "end_header")?;

    for (p, c) in positions.iter().zip(&colors) {
        write!(writer, "{} {} {}", p.x, p.y, p.z)?;
        if colored {
            let c = c.unwrap_or_else(|| Vector3::repeat(1.0));
            let byte = |x: f64| (x.clamp(0.0, 1.0) * 255.0).round() as u8;
            write!(writer, " {} {} {}", byte(c.x), byte(c.y), byte(c.z))?;
        }
        writeln!(writer)?;
    }
    for face in &faces {
        write!(writer, "{}", face.len())?;
        for v in face {
            write!(writer, " {}", v)?;
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

/// Load a PLY file.
pub fn load<P: AsRef<Path>, I: MeshIndex>(path: P) -> Result<Bmesh<I>> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    read(&mut reader).map_err(|e| MeshError::LoadError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Save a mesh as an ASCII PLY file.
pub fn save<P: AsRef<Path>, I: MeshIndex>(mesh: &Bmesh<I>, path: P) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    write(mesh, &mut writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_from_quads;

    fn colored_quad() -> Bmesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mut mesh: Bmesh = build_from_quads(&vertices, &[[0, 1, 2, 3]]).unwrap();
        mesh.set_color(VertexId::new(2), Some(Vector3::new(1.0, 0.0, 0.0))).unwrap();
        mesh
    }

    #[test]
    fn test_header_and_quads() {
        let mut out = Vec::new();
        write(&colored_quad(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("element vertex 4"));
        assert!(text.contains("element face 1"));
        assert!(text.contains("property uchar red"));
        assert!(text.lines().any(|l| l == "1 1 0 255 0 0"));
    }

    #[test]
    fn test_read_back() {
        let mut out = Vec::new();
        write(&colored_quad(), &mut out).unwrap();

        let mesh: Bmesh = read(&mut out.as_slice()).unwrap();
        assert_eq!(mesh.num_faces(), 2);
        assert_eq!(mesh.color(VertexId::new(2)), Some(Vector3::new(1.0, 0.0, 0.0)));
        // Uncolored vertices were written white
        assert_eq!(mesh.color(VertexId::new(0)), Some(Vector3::new(1.0, 1.0, 1.0)));
        let diagonal = mesh.lookup_edge(VertexId::new(0), VertexId::new(2)).unwrap();
        assert!(mesh.edge(diagonal).is_weak());
    }

    #[test]
    fn test_missing_faces() {
        let text = "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nproperty float y\nproperty float z\nend_header\n0 0 0\n";
        let err = read::<_, u32>(&mut text.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("no face element"));
    }
}
