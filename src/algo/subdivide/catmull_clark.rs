//! Hybrid stencils: Catmull-Clark on quads, Loop on triangles.
//!
//! A quad is a pair of triangles sharing a weak edge. The weak edge's child
//! is the quad's face point. Quad sides and vertices whose whole star is
//! made of quads use the Catmull-Clark edge and vertex rules; everything
//! else, including every sharp feature, falls back to Loop.

use std::collections::BTreeSet;

use crate::mesh::{Bmesh, EdgeId, FaceId, MeshIndex, VertexId};

use super::{loop_subdivision, Stencil};

/// Face point of the quad containing `f`, as quarter weights on its corners.
fn face_point<I: MeshIndex>(mesh: &Bmesh<I>, f: FaceId<I>, scale: f64, out: &mut Stencil<I>) -> Option<()> {
    let quad = mesh.quad_verts(f)?;
    out.extend(quad.iter().map(|&v| (v, 0.25 * scale)));
    Some(())
}

/// One representative face per quad, so each quad is counted once.
fn quad_key<I: MeshIndex>(mesh: &Bmesh<I>, f: FaceId<I>) -> Option<FaceId<I>> {
    let g = mesh.quad_partner(f)?;
    Some(f.min(g))
}

pub(super) fn edge_stencil<I: MeshIndex>(mesh: &Bmesh<I>, e: EdgeId<I>) -> Stencil<I> {
    let edge = mesh.edge(e);
    let quad_rule = || -> Option<Stencil<I>> {
        let f = edge.f1()?;
        let mut stencil = Vec::with_capacity(8);
        if edge.is_weak() {
            face_point(mesh, f, 1.0, &mut stencil)?;
            return Some(stencil);
        }
        if edge.is_sharp() {
            return None;
        }
        // Average of the edge ends and both face points
        let g = edge.f2()?;
        stencil.push((edge.v1(), 0.25));
        stencil.push((edge.v2(), 0.25));
        face_point(mesh, f, 0.25, &mut stencil)?;
        face_point(mesh, g, 0.25, &mut stencil)?;
        Some(stencil)
    };
    quad_rule().unwrap_or_else(|| loop_subdivision::edge_stencil(mesh, e))
}

pub(super) fn vertex_stencil<I: MeshIndex>(mesh: &Bmesh<I>, v: VertexId<I>) -> Stencil<I> {
    let quad_rule = || -> Option<Stencil<I>> {
        let vert = mesh.vertex(v);
        let mut ring = Vec::new();
        for &e in vert.edges() {
            let edge = mesh.edge(e);
            if edge.is_sharp() {
                return None;
            }
            if !edge.is_weak() {
                ring.push(edge.other_vertex(v)?);
            }
        }

        // Sorted so the face points are summed in the same order every run
        let mut quads = BTreeSet::new();
        for f in mesh.vertex_primary_faces(v) {
            quads.insert(quad_key(mesh, f)?);
        }
        let n = ring.len();
        if n < 3 || quads.len() != n {
            return None;
        }

        // (n-2)/n v + 1/n² Σ ring + 1/n² Σ face points
        let nf = n as f64;
        let mut stencil = Vec::with_capacity(1 + n + 4 * n);
        stencil.push((v, (nf - 2.0) / nf));
        stencil.extend(ring.iter().map(|&u| (u, 1.0 / (nf * nf))));
        for f in quads {
            face_point(mesh, f, 1.0 / (nf * nf), &mut stencil)?;
        }
        Some(stencil)
    };
    quad_rule().unwrap_or_else(|| loop_subdivision::vertex_stencil(mesh, v))
}
