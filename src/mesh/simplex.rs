//! Simplex primitives: vertices, edges and triangular faces.
//!
//! Simplices hold ids of their neighbours rather than references; the owning
//! [`Bmesh`](super::Bmesh) resolves them. An edge has up to two *primary*
//! faces (the manifold surface) plus any number of *secondary* faces, which
//! covers both faces pushed into a background layer and faces that make the
//! edge non-manifold.
//!
//! Derived geometry (normals, areas) is cached lazily in a [`OnceLock`] and
//! cleared by the mesh whenever a position changes.

use std::sync::OnceLock;

use nalgebra::{Point3, Vector3};

use super::index::{EdgeId, FaceId, MeshIndex, PatchId, VertexId};

/// Crease level of a fully sharp edge. Finite crease levels decrease by one
/// per subdivision level; this one never does.
pub const CREASE_INF: u16 = u16::MAX;

/// Any mesh element, used wherever a tagged union over vertex, edge or face
/// is needed (subdivision parents, walk repeaters, nearest features).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Simplex<I: MeshIndex = u32> {
    /// A vertex.
    Vertex(VertexId<I>),
    /// An edge.
    Edge(EdgeId<I>),
    /// A face.
    Face(FaceId<I>),
}

/// A vertex.
#[derive(Debug, Clone)]
pub struct Bvert<I: MeshIndex = u32> {
    /// World-space position.
    pub(crate) position: Point3<f64>,

    /// Optional RGB color carried through subdivision.
    pub(crate) color: Option<Vector3<f64>>,

    /// Incident edges, in insertion order.
    pub(crate) edges: Vec<EdgeId<I>>,

    pub(crate) norm_cache: OnceLock<Vector3<f64>>,
}

impl<I: MeshIndex> Bvert<I> {
    /// Create an isolated vertex at the given position.
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            color: None,
            edges: Vec::new(),
            norm_cache: OnceLock::new(),
        }
    }

    /// The vertex position.
    #[inline]
    pub fn position(&self) -> &Point3<f64> {
        &self.position
    }

    /// The vertex color, if one was assigned.
    #[inline]
    pub fn color(&self) -> Option<Vector3<f64>> {
        self.color
    }

    /// Incident edges.
    #[inline]
    pub fn edges(&self) -> &[EdgeId<I>] {
        &self.edges
    }

    /// Number of incident edges.
    #[inline]
    pub fn degree(&self) -> usize {
        self.edges.len()
    }

    /// True if no edge touches this vertex.
    #[inline]
    pub fn is_isolated(&self) -> bool {
        self.edges.is_empty()
    }

    pub(crate) fn normal_changed(&mut self) {
        self.norm_cache.take();
    }
}

/// An edge between two vertices.
#[derive(Debug, Clone)]
pub struct Bedge<I: MeshIndex = u32> {
    pub(crate) v1: VertexId<I>,
    pub(crate) v2: VertexId<I>,
    pub(crate) f1: Option<FaceId<I>>,
    pub(crate) f2: Option<FaceId<I>>,

    /// Secondary faces: demoted faces and faces beyond the first two.
    pub(crate) adj: Vec<FaceId<I>>,

    pub(crate) crease: u16,
    pub(crate) weak: bool,
    pub(crate) norm_cache: OnceLock<Vector3<f64>>,
}

impl<I: MeshIndex> Bedge<I> {
    /// Create an edge with no faces.
    pub fn new(v1: VertexId<I>, v2: VertexId<I>) -> Self {
        Self {
            v1,
            v2,
            f1: None,
            f2: None,
            adj: Vec::new(),
            crease: 0,
            weak: false,
            norm_cache: OnceLock::new(),
        }
    }

    /// First endpoint.
    #[inline]
    pub fn v1(&self) -> VertexId<I> {
        self.v1
    }

    /// Second endpoint.
    #[inline]
    pub fn v2(&self) -> VertexId<I> {
        self.v2
    }

    /// Both endpoints.
    #[inline]
    pub fn verts(&self) -> [VertexId<I>; 2] {
        [self.v1, self.v2]
    }

    /// True if `v` is an endpoint.
    #[inline]
    pub fn contains(&self, v: VertexId<I>) -> bool {
        self.v1 == v || self.v2 == v
    }

    /// The endpoint opposite `v`, or `None` if `v` is not an endpoint.
    pub fn other_vertex(&self, v: VertexId<I>) -> Option<VertexId<I>> {
        if v == self.v1 {
            Some(self.v2)
        } else if v == self.v2 {
            Some(self.v1)
        } else {
            None
        }
    }

    /// First primary face.
    #[inline]
    pub fn f1(&self) -> Option<FaceId<I>> {
        self.f1
    }

    /// Second primary face.
    #[inline]
    pub fn f2(&self) -> Option<FaceId<I>> {
        self.f2
    }

    /// Primary faces.
    pub fn faces(&self) -> impl Iterator<Item = FaceId<I>> + '_ {
        self.f1.into_iter().chain(self.f2)
    }

    /// Secondary faces.
    #[inline]
    pub fn secondary_faces(&self) -> &[FaceId<I>] {
        &self.adj
    }

    /// Primary and secondary faces.
    pub fn all_faces(&self) -> impl Iterator<Item = FaceId<I>> + '_ {
        self.faces().chain(self.adj.iter().copied())
    }

    /// Number of primary faces (0, 1 or 2).
    #[inline]
    pub fn nfaces(&self) -> usize {
        self.f1.is_some() as usize + self.f2.is_some() as usize
    }

    /// Number of primary and secondary faces.
    #[inline]
    pub fn num_all_faces(&self) -> usize {
        self.nfaces() + self.adj.len()
    }

    /// The primary face across this edge from `f`.
    pub fn other_face(&self, f: FaceId<I>) -> Option<FaceId<I>> {
        if self.f1 == Some(f) {
            self.f2
        } else if self.f2 == Some(f) {
            self.f1
        } else {
            None
        }
    }

    /// True if `f` is one of the primary faces.
    #[inline]
    pub fn has_primary(&self, f: FaceId<I>) -> bool {
        self.f1 == Some(f) || self.f2 == Some(f)
    }

    /// Exactly one primary face.
    #[inline]
    pub fn is_border(&self) -> bool {
        self.nfaces() == 1
    }

    /// No faces at all.
    #[inline]
    pub fn is_polyline(&self) -> bool {
        self.num_all_faces() == 0
    }

    /// Has secondary faces.
    #[inline]
    pub fn is_multi(&self) -> bool {
        !self.adj.is_empty()
    }

    /// Crease level.
    #[inline]
    pub fn crease(&self) -> u16 {
        self.crease
    }

    /// Non-zero crease level.
    #[inline]
    pub fn is_crease(&self) -> bool {
        self.crease > 0
    }

    /// Diagonal of a quad split into two triangles.
    #[inline]
    pub fn is_weak(&self) -> bool {
        self.weak
    }

    /// Edges that subdivision rules must treat as sharp: creases, borders,
    /// polylines and non-manifold edges.
    pub fn is_sharp(&self) -> bool {
        self.is_crease() || self.nfaces() < 2 || self.is_multi()
    }

    /// Attach a face, as primary if a slot is free and secondary otherwise.
    /// Returns true if it became primary.
    pub(crate) fn add_face(&mut self, f: FaceId<I>, primary: bool) -> bool {
        if primary {
            if self.f1.is_none() {
                self.f1 = Some(f);
                return true;
            }
            if self.f2.is_none() {
                self.f2 = Some(f);
                return true;
            }
        }
        self.adj.push(f);
        false
    }

    /// Forget a face. Returns false if the face was not attached.
    pub(crate) fn remove_face(&mut self, f: FaceId<I>) -> bool {
        if self.f1 == Some(f) {
            self.f1 = self.f2.take();
            true
        } else if self.f2 == Some(f) {
            self.f2 = None;
            true
        } else if let Some(pos) = self.adj.iter().position(|&g| g == f) {
            self.adj.remove(pos);
            true
        } else {
            false
        }
    }

    /// Move a primary face to the secondary list.
    pub(crate) fn demote(&mut self, f: FaceId<I>) -> bool {
        if !self.has_primary(f) {
            return false;
        }
        self.remove_face(f);
        self.adj.push(f);
        true
    }

    /// Move a secondary face into a free primary slot.
    pub(crate) fn promote(&mut self, f: FaceId<I>) -> bool {
        if self.nfaces() == 2 {
            return false;
        }
        match self.adj.iter().position(|&g| g == f) {
            Some(pos) => {
                self.adj.remove(pos);
                self.add_face(f, true)
            }
            None => false,
        }
    }

    pub(crate) fn normal_changed(&mut self) {
        self.norm_cache.take();
    }
}

/// Cached per-face geometry.
#[derive(Debug, Clone, Copy)]
pub struct FaceGeom {
    /// Unit normal (zero for degenerate faces).
    pub normal: Vector3<f64>,
    /// Area.
    pub area: f64,
}

/// A triangular face.
///
/// Edge `e1` joins `v1`→`v2`, `e2` joins `v2`→`v3` and `e3` joins `v3`→`v1`;
/// the vertex order defines the orientation.
#[derive(Debug, Clone)]
pub struct Bface<I: MeshIndex = u32> {
    pub(crate) verts: [VertexId<I>; 3],
    pub(crate) edges: [EdgeId<I>; 3],
    pub(crate) patch: Option<PatchId<I>>,
    pub(crate) secondary: bool,
    pub(crate) geom: OnceLock<FaceGeom>,
}

impl<I: MeshIndex> Bface<I> {
    pub(crate) fn new(verts: [VertexId<I>; 3], edges: [EdgeId<I>; 3]) -> Self {
        Self {
            verts,
            edges,
            patch: None,
            secondary: false,
            geom: OnceLock::new(),
        }
    }

    /// The three vertices in orientation order.
    #[inline]
    pub fn verts(&self) -> [VertexId<I>; 3] {
        self.verts
    }

    /// The three edges `[e1, e2, e3]`.
    #[inline]
    pub fn edges(&self) -> [EdgeId<I>; 3] {
        self.edges
    }

    /// Edge `v1`→`v2`.
    #[inline]
    pub fn e1(&self) -> EdgeId<I> {
        self.edges[0]
    }

    /// Edge `v2`→`v3`.
    #[inline]
    pub fn e2(&self) -> EdgeId<I> {
        self.edges[1]
    }

    /// Edge `v3`→`v1`.
    #[inline]
    pub fn e3(&self) -> EdgeId<I> {
        self.edges[2]
    }

    /// Owning patch.
    #[inline]
    pub fn patch(&self) -> Option<PatchId<I>> {
        self.patch
    }

    /// True if the face has been pushed out of the primary layer.
    #[inline]
    pub fn is_secondary(&self) -> bool {
        self.secondary
    }

    /// True if `v` is a corner.
    #[inline]
    pub fn contains_vert(&self, v: VertexId<I>) -> bool {
        self.verts.contains(&v)
    }

    /// True if `e` is a side.
    #[inline]
    pub fn contains_edge(&self, e: EdgeId<I>) -> bool {
        self.edges.contains(&e)
    }

    /// Position (0, 1 or 2) of `v` among the corners.
    pub fn vindex(&self, v: VertexId<I>) -> Option<usize> {
        self.verts.iter().position(|&w| w == v)
    }

    /// Position (0, 1 or 2) of `e` among the sides.
    pub fn eindex(&self, e: EdgeId<I>) -> Option<usize> {
        self.edges.iter().position(|&d| d == e)
    }

    /// The corner not on edge slot `i`.
    #[inline]
    pub fn opposite_vert(&self, i: usize) -> VertexId<I> {
        self.verts[(i + 2) % 3]
    }

    /// True if walking the face boundary goes directly from `a` to `b`.
    pub fn has_directed_edge(&self, a: VertexId<I>, b: VertexId<I>) -> bool {
        (0..3).any(|i| self.verts[i] == a && self.verts[(i + 1) % 3] == b)
    }

    /// The corner following `v` in orientation order.
    pub fn next_vert(&self, v: VertexId<I>) -> Option<VertexId<I>> {
        self.vindex(v).map(|i| self.verts[(i + 1) % 3])
    }

    /// The corner preceding `v` in orientation order.
    pub fn prev_vert(&self, v: VertexId<I>) -> Option<VertexId<I>> {
        self.vindex(v).map(|i| self.verts[(i + 2) % 3])
    }

    /// Clears cached normal and area; the mesh also clears the corner and
    /// side caches, see [`Bmesh::geometry_changed`](super::Bmesh::geometry_changed).
    pub(crate) fn normal_changed(&mut self) {
        self.geom.take();
    }
}
