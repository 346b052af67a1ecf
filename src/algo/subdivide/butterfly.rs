//! Modified butterfly stencils.
//!
//! Vertex points are the parent vertices themselves. An edge `a`-`b` with
//! opposite corners `c` and `d` gets
//!
//! ```text
//!        w1 ---- c ---- w2
//!          \    / \    /
//!           \  /   \  /
//!            a ----- b
//!           /  \   /  \
//!          /    \ /    \
//!        w4 ---- d ---- w3
//! ```
//!
//! `1/2 (a + b) + 1/8 (c + d) - 1/16 (w1 + w2 + w3 + w4)`. Near borders and
//! creases, where a wing is missing, the Loop edge rule is used instead.

use crate::mesh::{Bmesh, EdgeId, FaceId, MeshIndex, VertexId};

use super::{loop_subdivision, opposite_corner, Stencil};

pub(super) fn vertex_stencil<I: MeshIndex>(v: VertexId<I>) -> Stencil<I> {
    vec![(v, 1.0)]
}

/// Corner across the side `p`-`q` of face `f`, away from `f`.
fn wing<I: MeshIndex>(mesh: &Bmesh<I>, f: FaceId<I>, p: VertexId<I>, q: VertexId<I>) -> Option<VertexId<I>> {
    let e = mesh.lookup_edge(p, q)?;
    let edge = mesh.edge(e);
    if edge.is_sharp() {
        return None;
    }
    let g = edge.other_face(f)?;
    opposite_corner(mesh, g, e)
}

pub(super) fn edge_stencil<I: MeshIndex>(mesh: &Bmesh<I>, e: EdgeId<I>) -> Stencil<I> {
    let edge = mesh.edge(e);
    let (a, b) = (edge.v1(), edge.v2());
    let full = || -> Option<Stencil<I>> {
        if edge.is_sharp() {
            return None;
        }
        let (f, g) = (edge.f1()?, edge.f2()?);
        let c = opposite_corner(mesh, f, e)?;
        let d = opposite_corner(mesh, g, e)?;
        let wings = [
            wing(mesh, f, a, c)?,
            wing(mesh, f, b, c)?,
            wing(mesh, g, b, d)?,
            wing(mesh, g, a, d)?,
        ];
        let mut stencil = vec![(a, 0.5), (b, 0.5), (c, 0.125), (d, 0.125)];
        stencil.extend(wings.iter().map(|&w| (w, -1.0 / 16.0)));
        Some(stencil)
    };
    full().unwrap_or_else(|| loop_subdivision::edge_stencil(mesh, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::subdivide::stencil_point;
    use crate::mesh::build_from_triangles;
    use nalgebra::Point3;

    /// Regular triangulated patch large enough for one full butterfly.
    fn lattice() -> Bmesh {
        let mut vertices = Vec::new();
        for j in 0..4 {
            for i in 0..4 {
                vertices.push(Point3::new(i as f64, j as f64, 0.0));
            }
        }
        let mut faces = Vec::new();
        for j in 0..3 {
            for i in 0..3 {
                let v0 = j * 4 + i;
                faces.push([v0, v0 + 1, v0 + 5]);
                faces.push([v0, v0 + 5, v0 + 4]);
            }
        }
        build_from_triangles(&vertices, &faces).unwrap()
    }

    #[test]
    fn test_center_edge_uses_eight_points() {
        let mut mesh = lattice();
        // Diagonal 5-10 sits in the middle of the lattice
        let e = mesh.lookup_edge(VertexId::new(5), VertexId::new(10)).unwrap();
        let stencil = edge_stencil(&mesh, e);
        assert_eq!(stencil.len(), 8);
        let p = stencil_point(&mesh, &stencil);
        assert!((p - Point3::new(1.5, 1.5, 0.0)).norm() < 1e-12);

        // Lifting the edge ends lifts the edge point by the same amount
        for v in [5, 10] {
            let q = *mesh.position(VertexId::new(v));
            mesh.set_position(VertexId::new(v), Point3::new(q.x, q.y, 1.0)).unwrap();
        }
        let p = stencil_point(&mesh, &edge_stencil(&mesh, e));
        assert!((p.z - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_border_falls_back_to_loop() {
        let mesh = lattice();
        let e = mesh.lookup_edge(VertexId::new(0), VertexId::new(1)).unwrap();
        assert_eq!(edge_stencil(&mesh, e).len(), 2);
        // Edge 1-5 is interior but its wings reach past the border
        let e = mesh.lookup_edge(VertexId::new(1), VertexId::new(5)).unwrap();
        assert_eq!(edge_stencil(&mesh, e).len(), 4);
    }
}
