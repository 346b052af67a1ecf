//! Loop subdivision stencils with crease rules.

use crate::mesh::{Bmesh, EdgeId, MeshIndex, VertexId};

use super::{midpoint, opposite_corner, Stencil};

/// Vertex point.
///
/// The rule depends on how many sharp edges meet at `v`:
/// - none or one: smooth rule, `(1 - nβ) v + β Σ neighbours`
/// - two: crease curve rule, `3/4 v + 1/8` of each sharp neighbour
/// - three or more, or isolated: corner, the vertex stays put
pub(super) fn vertex_stencil<I: MeshIndex>(mesh: &Bmesh<I>, v: VertexId<I>) -> Stencil<I> {
    let vert = mesh.vertex(v);
    let n = vert.degree();
    if n == 0 {
        return vec![(v, 1.0)];
    }

    let sharp: Vec<VertexId<I>> = vert
        .edges()
        .iter()
        .map(|&e| mesh.edge(e))
        .filter(|edge| edge.is_sharp())
        .filter_map(|edge| edge.other_vertex(v))
        .collect();

    match sharp.len() {
        0 | 1 => {
            let beta = compute_loop_beta(n);
            let mut stencil = Vec::with_capacity(n + 1);
            stencil.push((v, 1.0 - n as f64 * beta));
            stencil.extend(mesh.neighbors(v).map(|u| (u, beta)));
            stencil
        }
        2 => vec![(v, 3.0 / 4.0), (sharp[0], 1.0 / 8.0), (sharp[1], 1.0 / 8.0)],
        _ => vec![(v, 1.0)],
    }
}

/// Edge point. Sharp edges take the midpoint; smooth edges weigh their ends
/// 3/8 and the two opposite corners 1/8.
pub(super) fn edge_stencil<I: MeshIndex>(mesh: &Bmesh<I>, e: EdgeId<I>) -> Stencil<I> {
    let edge = mesh.edge(e);
    if edge.is_sharp() {
        return midpoint(mesh, e);
    }

    let corners = (
        edge.f1().and_then(|f| opposite_corner(mesh, f, e)),
        edge.f2().and_then(|f| opposite_corner(mesh, f, e)),
    );
    match corners {
        (Some(c), Some(d)) => vec![
            (edge.v1(), 3.0 / 8.0),
            (edge.v2(), 3.0 / 8.0),
            (c, 1.0 / 8.0),
            (d, 1.0 / 8.0),
        ],
        _ => midpoint(mesh, e),
    }
}

/// Compute the Loop subdivision beta coefficient for a vertex with n neighbors.
pub fn compute_loop_beta(n: usize) -> f64 {
    if n == 3 {
        3.0 / 16.0
    } else {
        // β = 1/n * (5/8 - (3/8 + 1/4 * cos(2π/n))²)
        let n_f = n as f64;
        let cos_term = (std::f64::consts::TAU / n_f).cos();
        let inner = 3.0 / 8.0 + 0.25 * cos_term;
        (5.0 / 8.0 - inner * inner) / n_f
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::subdivide::stencil_point;
    use crate::mesh::{build_from_triangles, CREASE_INF};
    use nalgebra::Point3;

    fn two_triangles() -> Bmesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(1.0, -2.0, 0.0),
        ];
        build_from_triangles(&vertices, &[[0, 1, 2], [1, 0, 3]]).unwrap()
    }

    /// Hexagonal fan around vertex 0, every spoke interior.
    fn fan() -> Bmesh {
        let mut vertices = vec![Point3::new(0.0, 0.0, 1.0)];
        for i in 0..6 {
            let a = i as f64 * std::f64::consts::TAU / 6.0;
            vertices.push(Point3::new(a.cos(), a.sin(), 0.0));
        }
        let faces: Vec<[usize; 3]> = (0..6).map(|i| [0, 1 + i, 1 + (i + 1) % 6]).collect();
        build_from_triangles(&vertices, &faces).unwrap()
    }

    #[test]
    fn test_interior_edge_point() {
        let mesh = two_triangles();
        let e = mesh.lookup_edge(VertexId::new(0), VertexId::new(1)).unwrap();
        // 3/8 (0,0,0) + 3/8 (2,0,0) + 1/8 (1,2,0) + 1/8 (1,-2,0) = (1,0,0)
        let p = stencil_point(&mesh, &edge_stencil(&mesh, e));
        assert!((p - Point3::new(1.0, 0.0, 0.0)).norm() < 1e-10);
    }

    #[test]
    fn test_border_edge_is_midpoint() {
        let mesh = two_triangles();
        let e = mesh.lookup_edge(VertexId::new(1), VertexId::new(2)).unwrap();
        let p = stencil_point(&mesh, &edge_stencil(&mesh, e));
        assert!((p - Point3::new(1.5, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_smooth_vertex_uses_beta() {
        let mesh = fan();
        let stencil = vertex_stencil(&mesh, VertexId::new(0));
        assert_eq!(stencil.len(), 7);
        let beta = compute_loop_beta(6);
        assert!((stencil[0].1 - (1.0 - 6.0 * beta)).abs() < 1e-12);
        let p = stencil_point(&mesh, &stencil);
        assert!(p.x.abs() < 1e-12 && p.y.abs() < 1e-12);
        assert!((p.z - (1.0 - 6.0 * beta)).abs() < 1e-12);
    }

    #[test]
    fn test_crease_vertex_rules() {
        let mut mesh = fan();
        let spokes: Vec<EdgeId> = (1..=6)
            .map(|i| mesh.lookup_edge(VertexId::new(0), VertexId::new(i)).unwrap())
            .collect();

        mesh.set_crease(spokes[0], CREASE_INF).unwrap();
        assert_eq!(vertex_stencil(&mesh, VertexId::new(0)).len(), 7);

        mesh.set_crease(spokes[3], 2).unwrap();
        let stencil = vertex_stencil(&mesh, VertexId::new(0));
        assert_eq!(stencil, vec![(VertexId::new(0), 0.75), (VertexId::new(1), 0.125), (VertexId::new(4), 0.125)]);

        mesh.set_crease(spokes[1], 1).unwrap();
        assert_eq!(vertex_stencil(&mesh, VertexId::new(0)), vec![(VertexId::new(0), 1.0)]);
    }

    #[test]
    fn test_loop_beta_coefficient() {
        assert!((compute_loop_beta(3) - 3.0 / 16.0).abs() < 1e-10);
        // Valence 6 gives the regular-mesh weight 1/16
        assert!((compute_loop_beta(6) - 1.0 / 16.0).abs() < 1e-12);
    }
}
