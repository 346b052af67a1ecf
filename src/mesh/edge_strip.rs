//! Chains of edges.
//!
//! An [`EdgeStrip`] is a sequence of directed edges stored as (start vertex,
//! edge) pairs. Consecutive pairs that share a vertex continue the same line
//! strip; anywhere the next start vertex differs from the previous end vertex
//! the strip breaks and a new line strip begins.

use std::collections::HashMap;

use super::bmesh::Bmesh;
use super::index::{EdgeId, FaceId, MeshIndex, PatchId, VertexId};
use super::view::ViewFrame;
use crate::error::{MeshError, Result};

/// A sequence of directed edges forming one or more line strips.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeStrip<I: MeshIndex = u32> {
    verts: Vec<VertexId<I>>,
    edges: Vec<EdgeId<I>>,
}

impl<I: MeshIndex> EdgeStrip<I> {
    /// Create an empty strip.
    pub fn new() -> Self {
        Self {
            verts: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Append edge `e`, traversed starting at `v`.
    pub fn add(&mut self, v: VertexId<I>, e: EdgeId<I>) {
        self.verts.push(v);
        self.edges.push(e);
    }

    /// Start vertex of every edge.
    pub fn verts(&self) -> &[VertexId<I>] {
        &self.verts
    }

    /// The edges.
    pub fn edges(&self) -> &[EdgeId<I>] {
        &self.edges
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// True if the strip has no edges.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// End vertex of edge `i`.
    pub fn end_vert(&self, mesh: &Bmesh<I>, i: usize) -> Option<VertexId<I>> {
        mesh.get_edge(self.edges[i])?.other_vertex(self.verts[i])
    }

    /// True if edge `i` starts a new line strip.
    pub fn is_break(&self, mesh: &Bmesh<I>, i: usize) -> bool {
        i == 0 || self.end_vert(mesh, i - 1) != Some(self.verts[i])
    }

    /// Number of line strips.
    pub fn num_line_strips(&self, mesh: &Bmesh<I>) -> usize {
        (0..self.len()).filter(|&i| self.is_break(mesh, i)).count()
    }

    /// Vertex sequence of each line strip. A closed loop repeats its first
    /// vertex at the end.
    pub fn line_strips(&self, mesh: &Bmesh<I>) -> Vec<Vec<VertexId<I>>> {
        let mut out: Vec<Vec<VertexId<I>>> = Vec::new();
        for i in 0..self.len() {
            if self.is_break(mesh, i) {
                out.push(vec![self.verts[i]]);
            }
            if let (Some(line), Some(end)) = (out.last_mut(), self.end_vert(mesh, i)) {
                line.push(end);
            }
        }
        out
    }

    /// Chain directed edges into line strips, following each edge with one
    /// that starts where it ends. Edges are taken in input order.
    fn chain_directed(mesh: &Bmesh<I>, directed: &[(VertexId<I>, EdgeId<I>)]) -> Self {
        let mut by_start: HashMap<VertexId<I>, Vec<usize>> = HashMap::new();
        for (i, &(v, _)) in directed.iter().enumerate() {
            by_start.entry(v).or_default().push(i);
        }

        let mut used = vec![false; directed.len()];
        let mut strip = Self::new();
        for first in 0..directed.len() {
            if used[first] {
                continue;
            }
            let mut i = first;
            loop {
                used[i] = true;
                let (v, e) = directed[i];
                strip.add(v, e);
                let Some(end) = mesh.edge(e).other_vertex(v) else { break };
                let next = by_start
                    .get(&end)
                    .and_then(|cands| cands.iter().copied().find(|&j| !used[j]));
                match next {
                    Some(j) => i = j,
                    None => break,
                }
            }
        }
        strip
    }

    /// Build counter-clockwise boundary loops from the boundary edges of a
    /// face set. Each edge is oriented the way its member face traverses it,
    /// so loops run counter-clockwise around the set seen from the front.
    pub fn build_ccw_boundaries(mesh: &Bmesh<I>, boundary: &[(EdgeId<I>, FaceId<I>)]) -> Self {
        let directed: Vec<(VertexId<I>, EdgeId<I>)> = boundary
            .iter()
            .filter_map(|&(e, f)| {
                let edge = mesh.get_edge(e)?;
                let face = mesh.get_face(f)?;
                if face.has_directed_edge(edge.v1, edge.v2) {
                    Some((edge.v1, e))
                } else if face.has_directed_edge(edge.v2, edge.v1) {
                    Some((edge.v2, e))
                } else {
                    None
                }
            })
            .collect();
        Self::chain_directed(mesh, &directed)
    }

    /// Chain undirected edges into maximal line strips. Open chains start at
    /// a vertex with one chain edge; closed loops start anywhere.
    pub fn build_chains(mesh: &Bmesh<I>, edges: &[EdgeId<I>]) -> Self {
        let live: Vec<EdgeId<I>> = edges.iter().copied().filter(|&e| mesh.is_edge_alive(e)).collect();
        let mut at: HashMap<VertexId<I>, Vec<EdgeId<I>>> = HashMap::new();
        for &e in &live {
            for v in mesh.edge(e).verts() {
                at.entry(v).or_default().push(e);
            }
        }

        let mut strip = Self::new();
        let walk = |start: VertexId<I>, first: EdgeId<I>, strip: &mut Self| {
            let (mut v, mut e) = (start, first);
            loop {
                strip.add(v, e);
                let Some(w) = mesh.edge(e).other_vertex(v) else { break };
                let next = at
                    .get(&w)
                    .and_then(|cands| cands.iter().copied().find(|d| !strip.edges.contains(d)));
                match next {
                    Some(d) => (v, e) = (w, d),
                    None => break,
                }
            }
        };

        // Open chains first, from their ends
        for &e in &live {
            for v in mesh.edge(e).verts() {
                if at[&v].len() == 1 && !strip.edges.contains(&e) {
                    walk(v, e, &mut strip);
                }
            }
        }
        for &e in &live {
            if !strip.edges.contains(&e) {
                walk(mesh.edge(e).v1, e, &mut strip);
            }
        }
        strip
    }
}

impl<I: MeshIndex> Bmesh<I> {
    /// Silhouette edges of a patch: edges between a front-facing and a
    /// back-facing primary face, oriented as the front face traverses them
    /// and chained into line strips.
    pub fn sil_strip(&self, p: PatchId<I>, view: &dyn ViewFrame) -> Result<EdgeStrip<I>> {
        let patch = self.patch(p).ok_or(MeshError::UnknownPatch(p.index()))?;
        let front = |f: FaceId<I>| view.is_front_facing(&self.face_centroid(f), &self.face_norm(f));

        let mut directed = Vec::new();
        for &f in patch.faces() {
            let Some(face) = self.get_face(f).filter(|face| !face.is_secondary()) else {
                continue;
            };
            if !front(f) {
                continue;
            }
            for i in 0..3 {
                let e = face.edges[i];
                if let Some(g) = self.edge(e).other_face(f) {
                    if !front(g) {
                        directed.push((face.verts[i], e));
                    }
                }
            }
        }
        Ok(EdgeStrip::chain_directed(self, &directed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{build_from_quads, FaceList, OrthoView};
    use nalgebra::Point3;

    fn grid(n: usize) -> Bmesh {
        let mut vertices = Vec::new();
        for j in 0..=n {
            for i in 0..=n {
                vertices.push(Point3::new(i as f64, j as f64, 0.0));
            }
        }
        let mut quads = Vec::new();
        for j in 0..n {
            for i in 0..n {
                let v0 = j * (n + 1) + i;
                quads.push([v0, v0 + 1, v0 + n + 2, v0 + n + 1]);
            }
        }
        build_from_quads(&vertices, &quads).unwrap()
    }

    #[test]
    fn test_grid_boundary_is_one_ccw_loop() {
        let mesh = grid(2);
        let all = FaceList::all(&mesh);
        let strip = all.get_boundary(&mesh);
        assert_eq!(strip.len(), 8);
        assert_eq!(strip.num_line_strips(&mesh), 1);

        let loops = strip.line_strips(&mesh);
        let line = &loops[0];
        assert_eq!(line.first(), line.last());

        // Shoelace area is positive for a counter-clockwise loop
        let area: f64 = line
            .windows(2)
            .map(|w| {
                let (a, b) = (mesh.position(w[0]), mesh.position(w[1]));
                a.x * b.y - b.x * a.y
            })
            .sum();
        assert!((area / 2.0 - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_chains_open_and_closed() {
        let mesh = grid(2);
        // Bottom row of edges: an open chain of length 2
        let e0 = mesh.lookup_edge(VertexId::new(0), VertexId::new(1)).unwrap();
        let e1 = mesh.lookup_edge(VertexId::new(1), VertexId::new(2)).unwrap();
        let strip = EdgeStrip::build_chains(&mesh, &[e1, e0]);
        assert_eq!(strip.num_line_strips(&mesh), 1);
        let line = &strip.line_strips(&mesh)[0];
        assert_eq!(line.len(), 3);
        assert!(line[0] == VertexId::new(0) || line[0] == VertexId::new(2));
    }

    #[test]
    fn test_silhouette_of_folded_grid() {
        let mut mesh = grid(2);
        let p = mesh.create_patch("all");
        for f in mesh.face_ids().collect::<Vec<_>>() {
            mesh.set_patch(f, Some(p)).unwrap();
        }
        let view = OrthoView::top_down(1.0);
        assert!(mesh.sil_strip(p, &view).unwrap().is_empty());

        for v in mesh.vertex_ids().collect::<Vec<_>>() {
            let q = *mesh.position(v);
            if q.x > 1.5 {
                mesh.set_position(v, Point3::new(0.5, q.y, 0.5)).unwrap();
            }
        }
        let sil = mesh.sil_strip(p, &view).unwrap();
        // The fold line x = 1 has two edges
        assert_eq!(sil.len(), 2);
        assert_eq!(sil.num_line_strips(&mesh), 1);
    }
}
