//! The element pool of one mesh level.
//!
//! [`Bmesh`] stores vertices, edges and faces in slot arenas indexed by typed
//! ids. Adjacency is kept in both directions: a vertex lists its edges, an edge
//! lists its faces, a face lists its vertices and edges. Every mutation keeps
//! both directions in sync.
//!
//! # Element lifetime
//!
//! Removing an element leaves an empty slot behind. Slots are never reused, so
//! ids held across an edit either still name the same element or are detected
//! as dead by [`Bmesh::is_vertex_alive`] and friends.
//!
//! # Layers
//!
//! Each edge has at most two *primary* faces. A face added to an edge that
//! already has two becomes secondary on that edge, which is how non-manifold
//! input is represented. [`Bmesh::make_secondary`] pushes a face into the
//! secondary layer on purpose, typically to hide it behind another surface.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashSet, TryReserveError, VecDeque};
use std::hash::{Hash, Hasher};
use std::mem::size_of;

use nalgebra::{Point3, Vector3};

use super::index::{EdgeId, FaceId, MeshIndex, PatchId, VertexId};
use super::patch::{build_tri_strips, Patch, StripCallback, TriStrip};
use super::simplex::{Bedge, Bface, Bvert, FaceGeom};
use crate::error::{MeshError, Result};

/// Element counts of a mesh, used for capacity bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshCounts {
    /// Vertices.
    pub verts: usize,
    /// Edges.
    pub edges: usize,
    /// Faces.
    pub faces: usize,
}

/// Slot shifts applied to the ids of a mesh appended by [`Bmesh::append`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct MeshOffsets {
    pub verts: usize,
    pub edges: usize,
    pub faces: usize,
    pub patches: usize,
}

/// A triangle mesh level with explicit edges and patches.
#[derive(Debug, Clone)]
pub struct Bmesh<I: MeshIndex = u32> {
    pub(crate) verts: Vec<Option<Bvert<I>>>,
    pub(crate) edges: Vec<Option<Bedge<I>>>,
    pub(crate) faces: Vec<Option<Bface<I>>>,
    pub(crate) patches: Vec<Patch<I>>,
    nverts: usize,
    nedges: usize,
    nfaces: usize,
    stamp: u64,
}

impl<I: MeshIndex> Default for Bmesh<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: MeshIndex> Bmesh<I> {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self {
            verts: Vec::new(),
            edges: Vec::new(),
            faces: Vec::new(),
            patches: Vec::new(),
            nverts: 0,
            nedges: 0,
            nfaces: 0,
            stamp: 0,
        }
    }

    /// Create a mesh with pre-allocated capacity.
    pub fn with_capacity(num_verts: usize, num_edges: usize, num_faces: usize) -> Self {
        Self {
            verts: Vec::with_capacity(num_verts),
            edges: Vec::with_capacity(num_edges),
            faces: Vec::with_capacity(num_faces),
            ..Self::new()
        }
    }

    /// Reserve room for additional elements without aborting on failure.
    pub fn try_reserve(&mut self, counts: MeshCounts) -> std::result::Result<(), TryReserveError> {
        self.verts.try_reserve(counts.verts)?;
        self.edges.try_reserve(counts.edges)?;
        self.faces.try_reserve(counts.faces)?;
        Ok(())
    }

    // ==================== Accessors ====================

    /// Number of live vertices.
    #[inline]
    pub fn num_verts(&self) -> usize {
        self.nverts
    }

    /// Number of live edges.
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.nedges
    }

    /// Number of live faces.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.nfaces
    }

    /// Live element counts.
    pub fn counts(&self) -> MeshCounts {
        MeshCounts {
            verts: self.nverts,
            edges: self.nedges,
            faces: self.nfaces,
        }
    }

    /// Number of vertex slots, live or dead. Every vertex id is below this.
    #[inline]
    pub fn vert_slots(&self) -> usize {
        self.verts.len()
    }

    /// Number of edge slots, live or dead.
    #[inline]
    pub fn edge_slots(&self) -> usize {
        self.edges.len()
    }

    /// Number of face slots, live or dead.
    #[inline]
    pub fn face_slots(&self) -> usize {
        self.faces.len()
    }

    /// True if the mesh has no live elements.
    pub fn is_empty(&self) -> bool {
        self.nverts == 0 && self.nedges == 0 && self.nfaces == 0
    }

    /// Version counter, bumped on every topology change.
    #[inline]
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    /// Get a vertex by ID.
    ///
    /// # Panics
    /// Panics if the vertex was removed or never existed.
    #[inline]
    pub fn vertex(&self, id: VertexId<I>) -> &Bvert<I> {
        match self.verts.get(id.index()) {
            Some(Some(v)) => v,
            _ => panic!("{:?} is not a live vertex", id),
        }
    }

    /// Get an edge by ID.
    ///
    /// # Panics
    /// Panics if the edge was removed or never existed.
    #[inline]
    pub fn edge(&self, id: EdgeId<I>) -> &Bedge<I> {
        match self.edges.get(id.index()) {
            Some(Some(e)) => e,
            _ => panic!("{:?} is not a live edge", id),
        }
    }

    /// Get a face by ID.
    ///
    /// # Panics
    /// Panics if the face was removed or never existed.
    #[inline]
    pub fn face(&self, id: FaceId<I>) -> &Bface<I> {
        match self.faces.get(id.index()) {
            Some(Some(f)) => f,
            _ => panic!("{:?} is not a live face", id),
        }
    }

    #[inline]
    pub(crate) fn vertex_mut(&mut self, id: VertexId<I>) -> &mut Bvert<I> {
        match self.verts.get_mut(id.index()) {
            Some(Some(v)) => v,
            _ => panic!("{:?} is not a live vertex", id),
        }
    }

    #[inline]
    pub(crate) fn edge_mut(&mut self, id: EdgeId<I>) -> &mut Bedge<I> {
        match self.edges.get_mut(id.index()) {
            Some(Some(e)) => e,
            _ => panic!("{:?} is not a live edge", id),
        }
    }

    #[inline]
    pub(crate) fn face_mut(&mut self, id: FaceId<I>) -> &mut Bface<I> {
        match self.faces.get_mut(id.index()) {
            Some(Some(f)) => f,
            _ => panic!("{:?} is not a live face", id),
        }
    }

    /// Get a vertex if it is alive.
    #[inline]
    pub fn get_vertex(&self, id: VertexId<I>) -> Option<&Bvert<I>> {
        self.verts.get(id.index()).and_then(Option::as_ref)
    }

    /// Get an edge if it is alive.
    #[inline]
    pub fn get_edge(&self, id: EdgeId<I>) -> Option<&Bedge<I>> {
        self.edges.get(id.index()).and_then(Option::as_ref)
    }

    /// Get a face if it is alive.
    #[inline]
    pub fn get_face(&self, id: FaceId<I>) -> Option<&Bface<I>> {
        self.faces.get(id.index()).and_then(Option::as_ref)
    }

    /// True if `id` names a live vertex.
    #[inline]
    pub fn is_vertex_alive(&self, id: VertexId<I>) -> bool {
        self.get_vertex(id).is_some()
    }

    /// True if `id` names a live edge.
    #[inline]
    pub fn is_edge_alive(&self, id: EdgeId<I>) -> bool {
        self.get_edge(id).is_some()
    }

    /// True if `id` names a live face.
    #[inline]
    pub fn is_face_alive(&self, id: FaceId<I>) -> bool {
        self.get_face(id).is_some()
    }

    /// Get the position of a vertex.
    #[inline]
    pub fn position(&self, v: VertexId<I>) -> &Point3<f64> {
        &self.vertex(v).position
    }

    /// Get the color of a vertex.
    #[inline]
    pub fn color(&self, v: VertexId<I>) -> Option<Vector3<f64>> {
        self.vertex(v).color
    }

    /// Get the three corner positions of a face.
    pub fn face_positions(&self, f: FaceId<I>) -> [Point3<f64>; 3] {
        let [a, b, c] = self.face(f).verts;
        [*self.position(a), *self.position(b), *self.position(c)]
    }

    // ==================== Iteration ====================

    /// Iterate over live vertex IDs.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId<I>> + '_ {
        self.verts
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_some())
            .map(|(i, _)| VertexId::new(i))
    }

    /// Iterate over live edge IDs.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId<I>> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_some())
            .map(|(i, _)| EdgeId::new(i))
    }

    /// Iterate over live face IDs.
    pub fn face_ids(&self) -> impl Iterator<Item = FaceId<I>> + '_ {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_some())
            .map(|(i, _)| FaceId::new(i))
    }

    /// Iterate over live vertices with their IDs.
    pub fn vertices(&self) -> impl Iterator<Item = (VertexId<I>, &Bvert<I>)> + '_ {
        self.verts
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|v| (VertexId::new(i), v)))
    }

    /// Iterate over live faces with their IDs.
    pub fn faces(&self) -> impl Iterator<Item = (FaceId<I>, &Bface<I>)> + '_ {
        self.faces
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.as_ref().map(|f| (FaceId::new(i), f)))
    }

    // ==================== Adjacency ====================

    /// Vertices sharing an edge with `v`.
    pub fn neighbors(&self, v: VertexId<I>) -> impl Iterator<Item = VertexId<I>> + '_ {
        self.vertex(v)
            .edges
            .iter()
            .filter_map(move |&e| self.edge(e).other_vertex(v))
    }

    /// Faces (primary and secondary) with `v` as a corner, without repeats.
    pub fn vertex_faces(&self, v: VertexId<I>) -> Vec<FaceId<I>> {
        let mut out: Vec<FaceId<I>> = Vec::new();
        for &e in &self.vertex(v).edges {
            for f in self.edge(e).all_faces() {
                if !out.contains(&f) {
                    out.push(f);
                }
            }
        }
        out
    }

    /// Primary faces with `v` as a corner.
    pub fn vertex_primary_faces(&self, v: VertexId<I>) -> Vec<FaceId<I>> {
        let mut out = self.vertex_faces(v);
        out.retain(|&f| !self.face(f).secondary);
        out
    }

    /// Vertices within `radius` edge hops of `v`, including `v`.
    pub fn vertex_ring(&self, v: VertexId<I>, radius: usize) -> Vec<VertexId<I>> {
        let mut seen: HashSet<VertexId<I>> = HashSet::from([v]);
        let mut out = vec![v];
        let mut queue = VecDeque::from([(v, 0usize)]);
        while let Some((u, d)) = queue.pop_front() {
            if d == radius {
                continue;
            }
            for w in self.neighbors(u) {
                if seen.insert(w) {
                    out.push(w);
                    queue.push_back((w, d + 1));
                }
            }
        }
        out
    }

    /// Number of sharp edges at `v` (see [`Bedge::is_sharp`]).
    pub fn num_sharp_edges(&self, v: VertexId<I>) -> usize {
        self.vertex(v)
            .edges
            .iter()
            .filter(|&&e| self.edge(e).is_sharp())
            .count()
    }

    /// Find the edge joining `a` and `b`.
    pub fn lookup_edge(&self, a: VertexId<I>, b: VertexId<I>) -> Option<EdgeId<I>> {
        self.get_vertex(a)?
            .edges
            .iter()
            .copied()
            .find(|&e| self.edge(e).other_vertex(a) == Some(b))
    }

    /// Find a face with corners `a`, `b`, `c` in any order.
    pub fn lookup_face(&self, a: VertexId<I>, b: VertexId<I>, c: VertexId<I>) -> Option<FaceId<I>> {
        let e = self.lookup_edge(a, b)?;
        self.edge(e)
            .all_faces()
            .find(|&f| self.face(f).contains_vert(c))
    }

    // ==================== Editing ====================

    /// Add an isolated vertex.
    pub fn add_vertex(&mut self, position: Point3<f64>) -> VertexId<I> {
        let id = VertexId::new(self.verts.len());
        self.verts.push(Some(Bvert::new(position)));
        self.nverts += 1;
        id
    }

    /// Add the edge `a`-`b`, or return the existing one.
    pub fn add_edge(&mut self, a: VertexId<I>, b: VertexId<I>) -> Result<EdgeId<I>> {
        for v in [a, b] {
            if !self.is_vertex_alive(v) {
                return Err(MeshError::StaleVertex(v.index()));
            }
        }
        if a == b {
            return Err(MeshError::invalid_param("edge", format!("{:?}-{:?}", a, b), "endpoints coincide"));
        }
        if let Some(e) = self.lookup_edge(a, b) {
            return Ok(e);
        }

        let id = EdgeId::new(self.edges.len());
        self.edges.push(Some(Bedge::new(a, b)));
        self.vertex_mut(a).edges.push(id);
        self.vertex_mut(b).edges.push(id);
        self.nedges += 1;
        self.stamp += 1;
        Ok(id)
    }

    /// Add the face `a`→`b`→`c`, creating missing edges.
    ///
    /// The face becomes primary on each edge that has a free primary slot and
    /// secondary on the others.
    pub fn add_face(&mut self, a: VertexId<I>, b: VertexId<I>, c: VertexId<I>) -> Result<FaceId<I>> {
        self.add_face_in_patch(a, b, c, None)
    }

    /// Add a face and make it a member of `patch`.
    pub fn add_face_in_patch(
        &mut self,
        a: VertexId<I>,
        b: VertexId<I>,
        c: VertexId<I>,
        patch: Option<PatchId<I>>,
    ) -> Result<FaceId<I>> {
        for v in [a, b, c] {
            if !self.is_vertex_alive(v) {
                return Err(MeshError::StaleVertex(v.index()));
            }
        }
        if a == b || b == c || a == c {
            return Err(MeshError::DegenerateFace { face: self.faces.len() });
        }
        if self.lookup_face(a, b, c).is_some() {
            return Err(MeshError::DuplicateFace {
                v0: a.index(),
                v1: b.index(),
                v2: c.index(),
            });
        }
        if let Some(p) = patch {
            if p.index() >= self.patches.len() {
                return Err(MeshError::UnknownPatch(p.index()));
            }
        }

        let edges = [self.add_edge(a, b)?, self.add_edge(b, c)?, self.add_edge(c, a)?];
        let id = FaceId::new(self.faces.len());
        let mut face = Bface::new([a, b, c], edges);
        face.patch = patch;
        self.faces.push(Some(face));

        for e in edges {
            let edge = self.edge_mut(e);
            edge.add_face(id, true);
            edge.normal_changed();
        }
        for v in [a, b, c] {
            self.vertex_mut(v).normal_changed();
        }
        if let Some(p) = patch {
            self.patches[p.index()].add_face(id);
        }

        self.nfaces += 1;
        self.stamp += 1;
        Ok(id)
    }

    /// Remove a face, detaching it from its edges and patch.
    pub fn remove_face(&mut self, f: FaceId<I>) -> Result<()> {
        let face = self
            .faces
            .get_mut(f.index())
            .and_then(Option::take)
            .ok_or(MeshError::StaleFace(f.index()))?;

        for e in face.edges {
            if let Some(Some(edge)) = self.edges.get_mut(e.index()) {
                edge.remove_face(f);
                edge.normal_changed();
            }
        }
        for v in face.verts {
            if let Some(Some(vert)) = self.verts.get_mut(v.index()) {
                vert.normal_changed();
            }
        }
        if let Some(p) = face.patch {
            if let Some(patch) = self.patches.get_mut(p.index()) {
                patch.remove_face(f);
            }
        }

        self.nfaces -= 1;
        self.stamp += 1;
        Ok(())
    }

    /// Remove an edge and every face on it.
    pub fn remove_edge(&mut self, e: EdgeId<I>) -> Result<()> {
        let faces: Vec<FaceId<I>> = self
            .get_edge(e)
            .ok_or(MeshError::StaleEdge(e.index()))?
            .all_faces()
            .collect();
        for f in faces {
            self.remove_face(f)?;
        }

        let edge = self
            .edges
            .get_mut(e.index())
            .and_then(Option::take)
            .ok_or(MeshError::StaleEdge(e.index()))?;
        for v in edge.verts() {
            if let Some(Some(vert)) = self.verts.get_mut(v.index()) {
                vert.edges.retain(|&d| d != e);
                vert.normal_changed();
            }
        }

        self.nedges -= 1;
        self.stamp += 1;
        Ok(())
    }

    /// Remove a vertex and every edge and face touching it.
    pub fn remove_vertex(&mut self, v: VertexId<I>) -> Result<()> {
        let edges = self
            .get_vertex(v)
            .ok_or(MeshError::StaleVertex(v.index()))?
            .edges
            .clone();
        for e in edges {
            self.remove_edge(e)?;
        }
        self.verts[v.index()] = None;
        self.nverts -= 1;
        self.stamp += 1;
        Ok(())
    }

    /// Move a vertex and invalidate every cached normal it affects.
    pub fn set_position(&mut self, v: VertexId<I>, position: Point3<f64>) -> Result<()> {
        if !self.is_vertex_alive(v) {
            return Err(MeshError::StaleVertex(v.index()));
        }
        let faces = self.vertex_faces(v);
        let edges = self.vertex(v).edges.clone();

        let vert = self.vertex_mut(v);
        vert.position = position;
        vert.normal_changed();
        for e in edges {
            self.edge_mut(e).normal_changed();
        }
        for f in faces {
            self.geometry_changed(f);
        }
        Ok(())
    }

    /// Set or clear the color of a vertex.
    pub fn set_color(&mut self, v: VertexId<I>, color: Option<Vector3<f64>>) -> Result<()> {
        match self.verts.get_mut(v.index()) {
            Some(Some(vert)) => {
                vert.color = color;
                Ok(())
            }
            _ => Err(MeshError::StaleVertex(v.index())),
        }
    }

    /// Clear the cached geometry of `f` and the normals of its corners and
    /// sides.
    pub fn geometry_changed(&mut self, f: FaceId<I>) {
        let Some(Some(face)) = self.faces.get_mut(f.index()) else {
            return;
        };
        face.normal_changed();
        let (verts, edges) = (face.verts, face.edges);
        for v in verts {
            self.vertex_mut(v).normal_changed();
        }
        for e in edges {
            self.edge_mut(e).normal_changed();
        }
    }

    /// Set the crease level of an edge. `0` is smooth,
    /// [`CREASE_INF`](super::CREASE_INF) is sharp at every level.
    pub fn set_crease(&mut self, e: EdgeId<I>, crease: u16) -> Result<()> {
        match self.edges.get_mut(e.index()) {
            Some(Some(edge)) => {
                edge.crease = crease;
                Ok(())
            }
            _ => Err(MeshError::StaleEdge(e.index())),
        }
    }

    /// Mark or unmark an edge as a quad diagonal.
    pub fn set_weak(&mut self, e: EdgeId<I>, weak: bool) -> Result<()> {
        match self.edges.get_mut(e.index()) {
            Some(Some(edge)) => {
                edge.weak = weak;
                Ok(())
            }
            _ => Err(MeshError::StaleEdge(e.index())),
        }
    }

    // ==================== Layers ====================

    /// Push a face into the secondary layer. Returns false if it already was
    /// secondary.
    pub fn make_secondary(&mut self, f: FaceId<I>) -> Result<bool> {
        let face = self.get_face(f).ok_or(MeshError::StaleFace(f.index()))?;
        if face.secondary {
            return Ok(false);
        }
        let edges = face.edges;
        for e in edges {
            let edge = self.edge_mut(e);
            edge.demote(f);
            edge.normal_changed();
        }
        self.face_mut(f).secondary = true;
        self.changed_patch_of(f);
        self.stamp += 1;
        Ok(true)
    }

    /// Bring a secondary face back into the primary layer. Returns false,
    /// leaving the face untouched, if one of its edges already has two
    /// primary faces.
    pub fn make_primary(&mut self, f: FaceId<I>) -> Result<bool> {
        let face = self.get_face(f).ok_or(MeshError::StaleFace(f.index()))?;
        if !face.secondary {
            return Ok(true);
        }
        let edges = face.edges;
        if edges.iter().any(|&e| self.edge(e).nfaces() == 2) {
            return Ok(false);
        }
        for e in edges {
            let edge = self.edge_mut(e);
            edge.promote(f);
            edge.normal_changed();
        }
        self.face_mut(f).secondary = false;
        self.changed_patch_of(f);
        self.stamp += 1;
        Ok(true)
    }

    fn changed_patch_of(&mut self, f: FaceId<I>) {
        if let Some(p) = self.face(f).patch {
            if let Some(patch) = self.patches.get_mut(p.index()) {
                patch.changed();
            }
        }
    }

    // ==================== Quads ====================

    /// The weak edge of a face, if it is half of a quad.
    pub fn weak_edge(&self, f: FaceId<I>) -> Option<EdgeId<I>> {
        self.get_face(f)?
            .edges
            .iter()
            .copied()
            .find(|&e| self.edge(e).weak)
    }

    /// The other half of the quad `f` belongs to.
    pub fn quad_partner(&self, f: FaceId<I>) -> Option<FaceId<I>> {
        let e = self.weak_edge(f)?;
        self.edge(e).other_face(f)
    }

    /// True if `f` and a partner form a quad.
    pub fn is_quad(&self, f: FaceId<I>) -> bool {
        self.quad_partner(f).is_some()
    }

    /// The four corners of the quad `f` belongs to, in orientation order.
    pub fn quad_verts(&self, f: FaceId<I>) -> Option<[VertexId<I>; 4]> {
        let e = self.weak_edge(f)?;
        let g = self.edge(e).other_face(f)?;
        let face = self.face(f);
        let i = face.eindex(e)?;
        let (a, b) = (face.verts[i], face.verts[(i + 1) % 3]);
        let c = face.verts[(i + 2) % 3];
        let d = self
            .face(g)
            .verts
            .iter()
            .copied()
            .find(|&w| w != a && w != b)?;
        Some([b, c, a, d])
    }

    /// Centroid of a quad, or of the face alone if it has no partner.
    pub fn quad_centroid(&self, f: FaceId<I>) -> Point3<f64> {
        match self.quad_verts(f) {
            Some(q) => {
                let sum = q
                    .iter()
                    .fold(Vector3::zeros(), |acc, &v| acc + self.position(v).coords);
                Point3::from(sum / 4.0)
            }
            None => self.face_centroid(f),
        }
    }

    // ==================== Geometry ====================

    fn face_geom(&self, f: FaceId<I>) -> FaceGeom {
        *self.face(f).geom.get_or_init(|| {
            let [p0, p1, p2] = self.face_positions(f);
            let n = (p1 - p0).cross(&(p2 - p0));
            let len = n.norm();
            FaceGeom {
                normal: if len > 0.0 { n / len } else { Vector3::zeros() },
                area: 0.5 * len,
            }
        })
    }

    /// Unit normal of a face (zero for a degenerate face).
    pub fn face_norm(&self, f: FaceId<I>) -> Vector3<f64> {
        self.face_geom(f).normal
    }

    /// Area of a face.
    pub fn face_area(&self, f: FaceId<I>) -> f64 {
        self.face_geom(f).area
    }

    /// Centroid of a face.
    pub fn face_centroid(&self, f: FaceId<I>) -> Point3<f64> {
        let [p0, p1, p2] = self.face_positions(f);
        Point3::from((p0.coords + p1.coords + p2.coords) / 3.0)
    }

    /// Area-weighted normal at a vertex over its primary faces.
    pub fn vert_norm(&self, v: VertexId<I>) -> Vector3<f64> {
        *self.vertex(v).norm_cache.get_or_init(|| {
            let n = self
                .vertex_primary_faces(v)
                .into_iter()
                .fold(Vector3::zeros(), |acc, f| {
                    let g = self.face_geom(f);
                    acc + g.normal * g.area
                });
            n.try_normalize(0.0).unwrap_or_else(Vector3::zeros)
        })
    }

    /// Average normal of the primary faces of an edge.
    pub fn edge_norm(&self, e: EdgeId<I>) -> Vector3<f64> {
        let edge = self.edge(e);
        *edge.norm_cache.get_or_init(|| {
            let n = edge
                .faces()
                .fold(Vector3::zeros(), |acc, f| acc + self.face_norm(f));
            n.try_normalize(0.0).unwrap_or_else(Vector3::zeros)
        })
    }

    /// Length of an edge.
    pub fn edge_length(&self, e: EdgeId<I>) -> f64 {
        let edge = self.edge(e);
        (self.position(edge.v2) - self.position(edge.v1)).norm()
    }

    /// Midpoint of an edge.
    pub fn edge_midpoint(&self, e: EdgeId<I>) -> Point3<f64> {
        let edge = self.edge(e);
        nalgebra::center(self.position(edge.v1), self.position(edge.v2))
    }

    /// Axis-aligned bounding box of the live vertices.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let mut it = self.vertices().map(|(_, v)| v.position);
        let first = it.next()?;
        Some(it.fold((first, first), |(lo, hi), p| (lo.inf(&p), hi.sup(&p))))
    }

    /// Total area of the primary faces.
    pub fn surface_area(&self) -> f64 {
        self.faces()
            .filter(|(_, f)| !f.secondary)
            .map(|(id, _)| self.face_area(id))
            .sum()
    }

    // ==================== Validation ====================

    /// True if every stored edge of `f` is the edge [`lookup_edge`](Self::lookup_edge)
    /// finds for its vertex pair and lists `f` among its faces.
    pub fn check_face(&self, f: FaceId<I>) -> bool {
        let Some(face) = self.get_face(f) else {
            return false;
        };
        (0..3).all(|i| {
            let (a, b) = (face.verts[i], face.verts[(i + 1) % 3]);
            self.lookup_edge(a, b) == Some(face.edges[i])
                && self.edge(face.edges[i]).all_faces().any(|g| g == f)
        })
    }

    /// Check that adjacency is consistent in both directions.
    pub fn is_valid(&self) -> bool {
        let faces_ok = self.face_ids().all(|f| self.check_face(f));

        let edges_ok = self.edges.iter().enumerate().all(|(i, e)| {
            let Some(e) = e else { return true };
            let id = EdgeId::new(i);
            e.verts()
                .iter()
                .all(|&v| self.get_vertex(v).is_some_and(|v| v.edges.contains(&id)))
                && e.all_faces()
                    .all(|f| self.get_face(f).is_some_and(|f| f.edges.contains(&id)))
                && e.all_faces().all(|f| {
                    let secondary = self.face(f).secondary;
                    !secondary || !e.has_primary(f)
                })
        });

        let verts_ok = self.verts.iter().enumerate().all(|(i, v)| {
            let Some(v) = v else { return true };
            let id = VertexId::new(i);
            v.edges
                .iter()
                .all(|&e| self.get_edge(e).is_some_and(|e| e.contains(id)))
        });

        let counts_ok = self.vertex_ids().count() == self.nverts
            && self.edge_ids().count() == self.nedges
            && self.face_ids().count() == self.nfaces;

        faces_ok && edges_ok && verts_ok && counts_ok
    }

    /// A hash of the connectivity, independent of positions. Meshes with the
    /// same slots and adjacency hash equal.
    pub fn topology_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for (id, f) in self.faces() {
            id.hash(&mut hasher);
            f.verts.hash(&mut hasher);
            f.secondary.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Approximate heap footprint in bytes.
    pub fn size(&self) -> usize {
        self.verts.len() * (size_of::<Option<Bvert<I>>>() + 6 * size_of::<EdgeId<I>>())
            + self.edges.len() * size_of::<Option<Bedge<I>>>()
            + self.faces.len() * size_of::<Option<Bface<I>>>()
            + self
                .patches
                .iter()
                .map(|p| size_of::<Patch<I>>() + p.num_faces() * size_of::<FaceId<I>>())
                .sum::<usize>()
    }

    // ==================== Merging ====================

    /// Move every element of `other` into this mesh. Ids of `other` are
    /// shifted past the slots already in use, and its patches are appended
    /// after the existing ones. Returns the shifts that were applied.
    pub(crate) fn append(&mut self, other: Bmesh<I>) -> MeshOffsets {
        let offsets = MeshOffsets {
            verts: self.verts.len(),
            edges: self.edges.len(),
            faces: self.faces.len(),
            patches: self.patches.len(),
        };

        self.verts.extend(other.verts.into_iter().map(|slot| {
            slot.map(|mut vert| {
                vert.edges.iter_mut().for_each(|e| *e = e.shifted(offsets.edges));
                vert
            })
        }));
        self.edges.extend(other.edges.into_iter().map(|slot| {
            slot.map(|mut edge| {
                edge.v1 = edge.v1.shifted(offsets.verts);
                edge.v2 = edge.v2.shifted(offsets.verts);
                edge.f1 = edge.f1.map(|f| f.shifted(offsets.faces));
                edge.f2 = edge.f2.map(|f| f.shifted(offsets.faces));
                edge.adj.iter_mut().for_each(|f| *f = f.shifted(offsets.faces));
                edge
            })
        }));
        self.faces.extend(other.faces.into_iter().map(|slot| {
            slot.map(|mut face| {
                face.verts = face.verts.map(|v| v.shifted(offsets.verts));
                face.edges = face.edges.map(|e| e.shifted(offsets.edges));
                face.patch = face.patch.map(|p| p.shifted(offsets.patches));
                face
            })
        }));
        self.patches.extend(other.patches.into_iter().map(|mut patch| {
            patch.faces_mut().iter_mut().for_each(|f| *f = f.shifted(offsets.faces));
            patch.changed();
            patch
        }));

        self.nverts += other.nverts;
        self.nedges += other.nedges;
        self.nfaces += other.nfaces;
        self.stamp += 1;
        offsets
    }

    // ==================== Patches ====================

    /// Create an empty patch.
    pub fn create_patch(&mut self, name: impl Into<String>) -> PatchId<I> {
        let id = PatchId::new(self.patches.len());
        self.patches.push(Patch::new(name));
        id
    }

    /// Get a patch by ID.
    pub fn patch(&self, p: PatchId<I>) -> Option<&Patch<I>> {
        self.patches.get(p.index())
    }

    /// All patches.
    pub fn patches(&self) -> &[Patch<I>] {
        &self.patches
    }

    /// Move a face into a patch, or out of every patch with `None`.
    pub fn set_patch(&mut self, f: FaceId<I>, patch: Option<PatchId<I>>) -> Result<()> {
        if let Some(p) = patch {
            if p.index() >= self.patches.len() {
                return Err(MeshError::UnknownPatch(p.index()));
            }
        }
        let old = self.get_face(f).ok_or(MeshError::StaleFace(f.index()))?.patch;
        if old == patch {
            return Ok(());
        }
        if let Some(p) = old {
            self.patches[p.index()].remove_face(f);
        }
        if let Some(p) = patch {
            self.patches[p.index()].add_face(f);
        }
        self.face_mut(f).patch = patch;
        Ok(())
    }

    /// Triangle strips covering the primary faces of a patch, cached until
    /// the patch stamp changes.
    pub fn tri_strips(&self, p: PatchId<I>) -> Result<&[TriStrip<I>]> {
        let patch = self.patch(p).ok_or(MeshError::UnknownPatch(p.index()))?;
        Ok(patch
            .strips
            .get_or_init(|| build_tri_strips(self, patch.faces()))
            .as_slice())
    }

    /// Call `f` for every primary face of a patch.
    pub fn draw_faces<F>(&self, p: PatchId<I>, mut f: F) -> Result<()>
    where
        F: FnMut(FaceId<I>, &Bface<I>),
    {
        let patch = self.patch(p).ok_or(MeshError::UnknownPatch(p.index()))?;
        for &id in patch.faces() {
            if let Some(face) = self.get_face(id).filter(|face| !face.secondary) {
                f(id, face);
            }
        }
        Ok(())
    }

    /// Feed the triangle strips of a patch to a callback.
    pub fn draw_tri_strips<C>(&self, p: PatchId<I>, cb: &mut C) -> Result<()>
    where
        C: StripCallback<I> + ?Sized,
    {
        for strip in self.tri_strips(p)? {
            cb.begin_strip();
            for (i, &v) in strip.verts().iter().enumerate() {
                cb.strip_vertex(self, v, strip.face_at(i));
            }
            cb.end_strip();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_from_triangles;

    fn tetrahedron() -> Bmesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, 0.5, 1.0),
        ];
        let faces = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];
        build_from_triangles(&vertices, &faces).unwrap()
    }

    fn v(i: usize) -> VertexId {
        VertexId::new(i)
    }

    #[test]
    fn test_tetrahedron_counts() {
        let mesh = tetrahedron();
        assert_eq!(mesh.num_verts(), 4);
        assert_eq!(mesh.num_edges(), 6);
        assert_eq!(mesh.num_faces(), 4);
        assert!(mesh.is_valid());
        assert!(mesh.edge_ids().all(|e| mesh.edge(e).nfaces() == 2));
    }

    #[test]
    fn test_add_face_rejects_bad_input() {
        let mut mesh = tetrahedron();
        assert!(matches!(mesh.add_face(v(0), v(0), v(1)), Err(MeshError::DegenerateFace { .. })));
        assert!(matches!(mesh.add_face(v(1), v(0), v(2)), Err(MeshError::DuplicateFace { .. })));
        assert!(matches!(mesh.add_face(v(0), v(1), v(9)), Err(MeshError::StaleVertex(9))));
    }

    #[test]
    fn test_third_face_is_secondary_on_edge() {
        let mut mesh = tetrahedron();
        let x = mesh.add_vertex(Point3::new(0.5, -1.0, 0.0));
        let f = mesh.add_face(v(1), v(0), x).unwrap();
        let e = mesh.lookup_edge(v(0), v(1)).unwrap();
        assert!(mesh.edge(e).is_multi());
        assert_eq!(mesh.edge(e).secondary_faces(), &[f]);
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_remove_vertex_cascades() {
        let mut mesh = tetrahedron();
        mesh.remove_vertex(v(3)).unwrap();
        assert_eq!(mesh.num_verts(), 3);
        assert_eq!(mesh.num_edges(), 3);
        assert_eq!(mesh.num_faces(), 1);
        assert!(!mesh.is_vertex_alive(v(3)));
        assert!(mesh.is_valid());

        // Slots are not reused
        let w = mesh.add_vertex(Point3::origin());
        assert_eq!(w.index(), 4);
        assert!(matches!(mesh.remove_vertex(v(3)), Err(MeshError::StaleVertex(3))));
    }

    #[test]
    fn test_set_position_invalidates_normals() {
        let mut mesh = tetrahedron();
        let f = mesh.lookup_face(v(0), v(1), v(3)).unwrap();
        let before = mesh.face_norm(f);
        let vn_before = mesh.vert_norm(v(0));

        mesh.set_position(v(3), Point3::new(0.5, 2.0, 0.1)).unwrap();

        let after = mesh.face_norm(f);
        assert!((before - after).norm() > 1e-3);
        assert!((vn_before - mesh.vert_norm(v(0))).norm() > 1e-6);

        // Cached value equals a fresh computation
        let [p0, p1, p2] = mesh.face_positions(f);
        let n = (p1 - p0).cross(&(p2 - p0)).normalize();
        assert!((after - n).norm() < 1e-12);
    }

    #[test]
    fn test_layers() {
        let mut mesh = tetrahedron();
        let f = FaceId::new(0);
        assert!(mesh.make_secondary(f).unwrap());
        assert!(!mesh.make_secondary(f).unwrap());
        assert!(mesh.face(f).is_secondary());
        for e in mesh.face(f).edges() {
            assert_eq!(mesh.edge(e).nfaces(), 1);
        }
        assert!(mesh.is_valid());
        assert!(mesh.make_primary(f).unwrap());
        assert!(!mesh.face(f).is_secondary());
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_quad_helpers() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mesh: Bmesh = crate::mesh::build_from_quads(&vertices, &[[0, 1, 2, 3]]).unwrap();
        let f = FaceId::new(0);
        assert!(mesh.is_quad(f));
        let g = mesh.quad_partner(f).unwrap();
        assert_eq!(mesh.quad_partner(g), Some(f));

        let q = mesh.quad_verts(f).unwrap();
        let mut sorted = q;
        sorted.sort();
        assert_eq!(sorted, [v(0), v(1), v(2), v(3)]);
        let c = mesh.quad_centroid(f);
        assert!((c - Point3::new(0.5, 0.5, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_patches_track_faces() {
        let mut mesh: Bmesh = Bmesh::new();
        let p = mesh.create_patch("body");
        let a = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let c = mesh.add_vertex(Point3::new(0.0, 1.0, 0.0));
        let f = mesh.add_face_in_patch(a, b, c, Some(p)).unwrap();

        let stamp = mesh.patch(p).unwrap().stamp();
        assert_eq!(mesh.patch(p).unwrap().faces(), &[f]);
        assert_eq!(mesh.tri_strips(p).unwrap().len(), 1);

        mesh.remove_face(f).unwrap();
        assert!(mesh.patch(p).unwrap().stamp() > stamp);
        assert!(mesh.tri_strips(p).unwrap().is_empty());
        assert!(matches!(
            mesh.add_face_in_patch(a, b, c, Some(PatchId::new(7))),
            Err(MeshError::UnknownPatch(7))
        ));
    }

    #[test]
    fn test_vertex_ring() {
        let mesh = tetrahedron();
        assert_eq!(mesh.vertex_ring(v(0), 0), vec![v(0)]);
        assert_eq!(mesh.vertex_ring(v(0), 1).len(), 4);
    }

    #[test]
    fn test_append_shifts_ids() {
        let mut mesh = tetrahedron();
        mesh.create_patch("left");
        let mut other = tetrahedron();
        let p = other.create_patch("right");
        for f in other.face_ids().collect::<Vec<_>>() {
            other.set_patch(f, Some(p)).unwrap();
        }
        mesh.remove_face(FaceId::new(0)).unwrap();

        let offsets = mesh.append(other);
        assert_eq!(offsets.verts, 4);
        assert_eq!(offsets.faces, 4);
        assert_eq!(mesh.num_verts(), 8);
        assert_eq!(mesh.num_faces(), 7);
        assert!(mesh.is_valid());
        assert!(mesh.face_ids().all(|f| mesh.check_face(f)));

        let right = mesh.patch(PatchId::new(1)).unwrap();
        assert_eq!(right.name(), "right");
        assert!(right.faces().iter().all(|f| f.index() >= 4));
    }
}
