//! Patches: groups of faces rendered with one style.
//!
//! A patch owns nothing but a face list. Renderers pull faces or triangle
//! strips from it and compare [`Patch::stamp`] against the value they saw
//! last time to decide whether cached display data is stale. Every change to
//! the face list bumps the stamp and drops the cached strips.

use std::collections::HashSet;
use std::sync::OnceLock;

use super::bmesh::Bmesh;
use super::index::{FaceId, MeshIndex, VertexId};

/// A named group of faces.
#[derive(Debug, Clone)]
pub struct Patch<I: MeshIndex = u32> {
    name: String,
    faces: Vec<FaceId<I>>,
    stamp: u64,
    pub(crate) strips: OnceLock<Vec<TriStrip<I>>>,
}

impl<I: MeshIndex> Patch<I> {
    /// Create an empty patch.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            faces: Vec::new(),
            stamp: 0,
            strips: OnceLock::new(),
        }
    }

    /// Patch name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member faces, in insertion order.
    pub fn faces(&self) -> &[FaceId<I>] {
        &self.faces
    }

    /// Number of member faces.
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Version counter, bumped whenever the triangulation changes.
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    /// Record a triangulation change.
    pub fn changed(&mut self) {
        self.stamp += 1;
        self.strips.take();
    }

    pub(crate) fn add_face(&mut self, f: FaceId<I>) {
        self.faces.push(f);
        self.changed();
    }

    pub(crate) fn remove_face(&mut self, f: FaceId<I>) -> bool {
        let before = self.faces.len();
        self.faces.retain(|&g| g != f);
        let removed = self.faces.len() != before;
        if removed {
            self.changed();
        }
        removed
    }

    pub(crate) fn faces_mut(&mut self) -> &mut Vec<FaceId<I>> {
        self.strips.take();
        &mut self.faces
    }
}

/// A triangle strip: triangle `i` uses `verts[i..i + 3]`, with every odd
/// triangle reversed so that all triangles keep the mesh orientation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriStrip<I: MeshIndex = u32> {
    verts: Vec<VertexId<I>>,
    faces: Vec<FaceId<I>>,
}

impl<I: MeshIndex> TriStrip<I> {
    /// Strip vertices.
    pub fn verts(&self) -> &[VertexId<I>] {
        &self.verts
    }

    /// The face rendered by each triangle of the strip.
    pub fn faces(&self) -> &[FaceId<I>] {
        &self.faces
    }

    /// Number of triangles.
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    /// True if the strip has no triangles.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// The face completed by strip vertex `i`. The first two vertices are
    /// attributed to the first face.
    pub fn face_at(&self, i: usize) -> FaceId<I> {
        self.faces[i.saturating_sub(2).min(self.faces.len() - 1)]
    }
}

/// Receives triangle strips from [`Bmesh::draw_tri_strips`].
pub trait StripCallback<I: MeshIndex = u32> {
    /// Called before the first vertex of each strip.
    fn begin_strip(&mut self) {}

    /// Called for each strip vertex with the face it belongs to.
    fn strip_vertex(&mut self, mesh: &Bmesh<I>, v: VertexId<I>, f: FaceId<I>);

    /// Called after the last vertex of each strip.
    fn end_strip(&mut self) {}
}

/// Greedily decompose the primary faces of `faces` into triangle strips.
pub(crate) fn build_tri_strips<I: MeshIndex>(mesh: &Bmesh<I>, faces: &[FaceId<I>]) -> Vec<TriStrip<I>> {
    let members: HashSet<FaceId<I>> = faces
        .iter()
        .copied()
        .filter(|&f| mesh.get_face(f).is_some_and(|face| !face.is_secondary()))
        .collect();

    let mut used: HashSet<FaceId<I>> = HashSet::with_capacity(members.len());
    let mut strips = Vec::new();

    for &start in faces {
        if !members.contains(&start) || !used.insert(start) {
            continue;
        }

        let mut strip = TriStrip {
            verts: mesh.face(start).verts().to_vec(),
            faces: vec![start],
        };

        loop {
            let n = strip.verts.len();
            let (p, q) = (strip.verts[n - 2], strip.verts[n - 1]);
            // The next face must traverse the shared edge against the
            // direction the last triangle does.
            let even = (strip.faces.len() - 1) % 2 == 0;
            let (from, to) = if even { (q, p) } else { (p, q) };

            let next = mesh.lookup_edge(p, q).and_then(|e| {
                mesh.edge(e).faces().find(|g| {
                    members.contains(g) && !used.contains(g) && mesh.face(*g).has_directed_edge(from, to)
                })
            });

            let Some(g) = next else { break };
            let Some(&third) = mesh.face(g).verts().iter().find(|&&w| w != p && w != q) else {
                break;
            };
            used.insert(g);
            strip.verts.push(third);
            strip.faces.push(g);
        }

        strips.push(strip);
    }

    strips
}
