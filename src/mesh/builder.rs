//! Mesh construction utilities.
//!
//! This module builds [`Bmesh`] levels from face-vertex lists, the layout
//! used by mesh file formats, and converts them back. Quads are split into
//! two triangles along a *weak* diagonal so that subdivision and tools can
//! still treat the pair as one quad.

use std::collections::HashMap;

use nalgebra::Point3;

use super::bmesh::Bmesh;
use super::index::{MeshIndex, VertexId};
use crate::error::{MeshError, Result};

fn check_indices(vertices: &[Point3<f64>], fi: usize, face: &[usize]) -> Result<()> {
    for &vi in face {
        if vi >= vertices.len() {
            return Err(MeshError::InvalidVertexIndex { face: fi, vertex: vi });
        }
    }
    for i in 0..face.len() {
        if face[i + 1..].contains(&face[i]) {
            return Err(MeshError::DegenerateFace { face: fi });
        }
    }
    Ok(())
}

fn add_quad<I: MeshIndex>(mesh: &mut Bmesh<I>, ids: &[VertexId<I>], quad: [usize; 4]) -> Result<()> {
    let [a, b, c, d] = quad.map(|i| ids[i]);
    mesh.add_face(a, b, c)?;
    mesh.add_face(a, c, d)?;
    if let Some(e) = mesh.lookup_edge(a, c) {
        mesh.set_weak(e, true)?;
    }
    Ok(())
}

/// Build a mesh from vertices and triangle faces.
///
/// # Arguments
/// * `vertices` - List of vertex positions
/// * `faces` - List of triangle faces, each as [v0, v1, v2] indices
///
/// # Returns
/// A mesh, or an error if an index is out of range, a face repeats a
/// vertex, or two faces share all three vertices.
///
/// # Example
/// ```
/// use jot::mesh::{build_from_triangles, Bmesh};
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.5, 1.0, 0.0),
/// ];
/// let faces = vec![[0, 1, 2]];
///
/// let mesh: Bmesh = build_from_triangles(&vertices, &faces).unwrap();
/// assert_eq!(mesh.num_verts(), 3);
/// assert_eq!(mesh.num_edges(), 3);
/// assert_eq!(mesh.num_faces(), 1);
/// ```
pub fn build_from_triangles<I: MeshIndex>(vertices: &[Point3<f64>], faces: &[[usize; 3]]) -> Result<Bmesh<I>> {
    if faces.is_empty() {
        return Err(MeshError::EmptyMesh);
    }
    for (fi, face) in faces.iter().enumerate() {
        check_indices(vertices, fi, face)?;
    }

    let mut mesh = Bmesh::with_capacity(vertices.len(), faces.len() * 3 / 2 + 1, faces.len());
    let ids: Vec<VertexId<I>> = vertices.iter().map(|&p| mesh.add_vertex(p)).collect();
    for face in faces {
        mesh.add_face(ids[face[0]], ids[face[1]], ids[face[2]])?;
    }
    Ok(mesh)
}

/// Build a mesh from vertices and quad faces.
///
/// Each quad `[v0, v1, v2, v3]` becomes the triangles `(v0, v1, v2)` and
/// `(v0, v2, v3)`, with the diagonal `v0`-`v2` marked weak.
pub fn build_from_quads<I: MeshIndex>(vertices: &[Point3<f64>], faces: &[[usize; 4]]) -> Result<Bmesh<I>> {
    if faces.is_empty() {
        return Err(MeshError::EmptyMesh);
    }
    for (fi, face) in faces.iter().enumerate() {
        check_indices(vertices, fi, face)?;
    }

    let mut mesh = Bmesh::with_capacity(vertices.len(), faces.len() * 3, faces.len() * 2);
    let ids: Vec<VertexId<I>> = vertices.iter().map(|&p| mesh.add_vertex(p)).collect();
    for &quad in faces {
        add_quad(&mut mesh, &ids, quad)?;
    }
    Ok(mesh)
}

/// Build a mesh from polygons of any size.
///
/// Triangles are added as they are, quads are split along a weak diagonal
/// and larger polygons are fanned from their first vertex.
pub fn build_from_polygons<I: MeshIndex>(vertices: &[Point3<f64>], faces: &[Vec<usize>]) -> Result<Bmesh<I>> {
    if faces.is_empty() {
        return Err(MeshError::EmptyMesh);
    }
    for (fi, face) in faces.iter().enumerate() {
        if face.len() < 3 {
            return Err(MeshError::DegenerateFace { face: fi });
        }
        check_indices(vertices, fi, face)?;
    }

    let mut mesh = Bmesh::with_capacity(vertices.len(), faces.len() * 3, faces.len() * 2);
    let ids: Vec<VertexId<I>> = vertices.iter().map(|&p| mesh.add_vertex(p)).collect();
    for face in faces {
        match face.as_slice() {
            &[a, b, c, d] => add_quad(&mut mesh, &ids, [a, b, c, d])?,
            poly => {
                for k in 1..poly.len() - 1 {
                    mesh.add_face(ids[poly[0]], ids[poly[k]], ids[poly[k + 1]])?;
                }
            }
        }
    }
    Ok(mesh)
}

/// Live vertex positions, and a map from vertex slot to output index.
fn compact_vertices<I: MeshIndex>(mesh: &Bmesh<I>) -> (Vec<Point3<f64>>, HashMap<VertexId<I>, usize>) {
    let mut positions = Vec::with_capacity(mesh.num_verts());
    let mut remap = HashMap::with_capacity(mesh.num_verts());
    for (v, vert) in mesh.vertices() {
        remap.insert(v, positions.len());
        positions.push(*vert.position());
    }
    (positions, remap)
}

/// Convert a mesh back to a face-vertex representation.
///
/// Dead slots are skipped, so output indices are dense. Returns (vertices,
/// faces) tuple.
pub fn to_face_vertex<I: MeshIndex>(mesh: &Bmesh<I>) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let (vertices, remap) = compact_vertices(mesh);
    let faces = mesh
        .faces()
        .map(|(_, f)| f.verts().map(|v| remap[&v]))
        .collect();
    (vertices, faces)
}

/// Convert a mesh to polygons, merging each pair of faces that share a weak
/// edge back into a quad.
pub fn to_polygons<I: MeshIndex>(mesh: &Bmesh<I>) -> (Vec<Point3<f64>>, Vec<Vec<usize>>) {
    let (vertices, remap) = compact_vertices(mesh);
    let mut faces = Vec::with_capacity(mesh.num_faces());
    for (f, face) in mesh.faces() {
        match (mesh.quad_partner(f), mesh.quad_verts(f)) {
            (Some(g), Some(quad)) => {
                if f < g {
                    faces.push(quad.iter().map(|v| remap[v]).collect());
                }
            }
            _ => faces.push(face.verts().iter().map(|v| remap[v]).collect()),
        }
    }
    (vertices, faces)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_triangles() -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        // Two triangles sharing an edge
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, -1.0, 0.0),
        ];
        let faces = vec![[0, 1, 2], [1, 0, 3]];
        (vertices, faces)
    }

    fn two_quads() -> (Vec<Point3<f64>>, Vec<[usize; 4]>) {
        // Two quads sharing an edge (1-2)
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
        ];
        let faces = vec![[0, 1, 2, 3], [1, 4, 5, 2]];
        (vertices, faces)
    }

    #[test]
    fn test_two_triangles() {
        let (vertices, faces) = two_triangles();
        let mesh: Bmesh<u32> = build_from_triangles(&vertices, &faces).unwrap();

        assert_eq!(mesh.num_verts(), 4);
        assert_eq!(mesh.num_faces(), 2);
        assert_eq!(mesh.num_edges(), 5);
        assert!(mesh.is_valid());
        assert!(mesh.face_ids().all(|f| mesh.check_face(f)));
    }

    #[test]
    fn test_roundtrip() {
        let (vertices, faces) = two_triangles();
        let mesh: Bmesh<u32> = build_from_triangles(&vertices, &faces).unwrap();
        let (out_verts, out_faces) = to_face_vertex(&mesh);
        assert_eq!(out_verts, vertices);
        assert_eq!(out_faces, faces);
    }

    #[test]
    fn test_invalid_input() {
        let vertices = vec![Point3::new(0.0, 0.0, 0.0)];
        let result: Result<Bmesh<u32>> = build_from_triangles(&vertices, &[[0, 1, 2]]);
        assert!(matches!(result, Err(MeshError::InvalidVertexIndex { face: 0, vertex: 1 })));

        let (vertices, _) = two_triangles();
        let result: Result<Bmesh<u32>> = build_from_triangles(&vertices, &[[0, 0, 2]]);
        assert!(matches!(result, Err(MeshError::DegenerateFace { face: 0 })));

        let result: Result<Bmesh<u32>> = build_from_triangles(&vertices, &[[0, 1, 2], [2, 0, 1]]);
        assert!(matches!(result, Err(MeshError::DuplicateFace { .. })));

        let result: Result<Bmesh<u32>> = build_from_triangles(&vertices, &[]);
        assert!(matches!(result, Err(MeshError::EmptyMesh)));
    }

    #[test]
    fn test_quads_get_weak_diagonals() {
        let (vertices, faces) = two_quads();
        let mesh: Bmesh<u32> = build_from_quads(&vertices, &faces).unwrap();

        assert_eq!(mesh.num_verts(), 6);
        assert_eq!(mesh.num_faces(), 4);
        // 7 quad sides + 2 diagonals
        assert_eq!(mesh.num_edges(), 9);
        assert_eq!(mesh.edge_ids().filter(|&e| mesh.edge(e).is_weak()).count(), 2);
        assert!(mesh.face_ids().all(|f| mesh.is_quad(f)));
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_polygons_roundtrip_quads() {
        let (vertices, quads) = two_quads();
        let polys: Vec<Vec<usize>> = quads.iter().map(|q| q.to_vec()).collect();
        let mesh: Bmesh<u32> = build_from_polygons(&vertices, &polys).unwrap();

        let (out_verts, out_faces) = to_polygons(&mesh);
        assert_eq!(out_verts.len(), 6);
        assert_eq!(out_faces.len(), 2);
        assert!(out_faces.iter().all(|f| f.len() == 4));
    }

    #[test]
    fn test_pentagon_is_fanned() {
        let vertices: Vec<Point3<f64>> = (0..5)
            .map(|i| {
                let a = i as f64 * std::f64::consts::TAU / 5.0;
                Point3::new(a.cos(), a.sin(), 0.0)
            })
            .collect();
        let polys = vec![vec![0, 1, 2, 3, 4]];
        let mesh: Bmesh<u32> = build_from_polygons(&vertices, &polys).unwrap();
        assert_eq!(mesh.num_faces(), 3);
        assert!((mesh.surface_area() - 2.377_641_290_737_884).abs() < 1e-9);
    }

    #[test]
    fn test_quad_degenerate_face() {
        let (vertices, _) = two_quads();
        // Degenerate: v0 == v2 (diagonal vertices the same)
        let result: Result<Bmesh<u32>> = build_from_quads(&vertices, &[[0, 1, 0, 3]]);
        assert!(matches!(result, Err(MeshError::DegenerateFace { face: 0 })));
    }
}
