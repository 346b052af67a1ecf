//! Face, edge and vertex sets with connectivity queries.
//!
//! The lists are plain id vectors. Queries take the mesh they index into and
//! skip ids that no longer name a live element. Searches track visited
//! elements in a `HashSet` owned by the call, so no state leaks between
//! queries.

use std::collections::HashSet;

use nalgebra::{Point3, Vector3};

use super::bmesh::Bmesh;
use super::edge_strip::EdgeStrip;
use super::index::{EdgeId, FaceId, MeshIndex, VertexId};
use super::simplex::Bedge;

macro_rules! impl_list {
    ($name:ident, $id:ident) => {
        impl<I: MeshIndex> $name<I> {
            /// Create an empty list.
            pub fn new() -> Self {
                Self(Vec::new())
            }

            /// Append an id.
            pub fn push(&mut self, id: $id<I>) {
                self.0.push(id);
            }

            /// Number of ids.
            pub fn len(&self) -> usize {
                self.0.len()
            }

            /// True if the list is empty.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// The ids.
            pub fn as_slice(&self) -> &[$id<I>] {
                &self.0
            }

            /// Iterate over the ids.
            pub fn iter(&self) -> impl Iterator<Item = $id<I>> + '_ {
                self.0.iter().copied()
            }

            /// True if `id` is in the list.
            pub fn contains(&self, id: $id<I>) -> bool {
                self.0.contains(&id)
            }
        }

        impl<I: MeshIndex> Default for $name<I> {
            fn default() -> Self {
                Self::new()
            }
        }

        impl<I: MeshIndex> From<Vec<$id<I>>> for $name<I> {
            fn from(ids: Vec<$id<I>>) -> Self {
                Self(ids)
            }
        }

        impl<I: MeshIndex> FromIterator<$id<I>> for $name<I> {
            fn from_iter<T: IntoIterator<Item = $id<I>>>(iter: T) -> Self {
                Self(iter.into_iter().collect())
            }
        }

        impl<I: MeshIndex> IntoIterator for $name<I> {
            type Item = $id<I>;
            type IntoIter = std::vec::IntoIter<$id<I>>;

            fn into_iter(self) -> Self::IntoIter {
                self.0.into_iter()
            }
        }
    };
}

/// A set of faces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceList<I: MeshIndex = u32>(Vec<FaceId<I>>);

/// A set of edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeList<I: MeshIndex = u32>(Vec<EdgeId<I>>);

/// A set of vertices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertList<I: MeshIndex = u32>(Vec<VertexId<I>>);

impl_list!(FaceList, FaceId);
impl_list!(EdgeList, EdgeId);
impl_list!(VertList, VertexId);

/// Push `id` if `seen` did not have it yet.
fn push_unique<T: Copy + Eq + std::hash::Hash>(out: &mut Vec<T>, seen: &mut HashSet<T>, id: T) {
    if seen.insert(id) {
        out.push(id);
    }
}

impl<I: MeshIndex> FaceList<I> {
    fn members(&self) -> HashSet<FaceId<I>> {
        self.0.iter().copied().collect()
    }

    /// Every live face of the mesh.
    pub fn all(mesh: &Bmesh<I>) -> Self {
        mesh.face_ids().collect()
    }

    fn live<'a>(&'a self, mesh: &'a Bmesh<I>) -> impl Iterator<Item = FaceId<I>> + 'a {
        self.iter().filter(move |&f| mesh.is_face_alive(f))
    }

    /// Corners of the faces, without repeats.
    pub fn get_verts(&self, mesh: &Bmesh<I>) -> VertList<I> {
        let (mut out, mut seen) = (Vec::new(), HashSet::new());
        for f in self.live(mesh) {
            for v in mesh.face(f).verts() {
                push_unique(&mut out, &mut seen, v);
            }
        }
        VertList(out)
    }

    /// Sides of the faces, without repeats.
    pub fn get_edges(&self, mesh: &Bmesh<I>) -> EdgeList<I> {
        let (mut out, mut seen) = (Vec::new(), HashSet::new());
        for f in self.live(mesh) {
            for e in mesh.face(f).edges() {
                push_unique(&mut out, &mut seen, e);
            }
        }
        EdgeList(out)
    }

    /// Number of faces of the set on edge `e`.
    fn member_count(mesh: &Bmesh<I>, members: &HashSet<FaceId<I>>, e: EdgeId<I>) -> usize {
        mesh.edge(e).all_faces().filter(|f| members.contains(f)).count()
    }

    /// Edges whose faces all belong to the set and that have two primary faces.
    pub fn interior_edges(&self, mesh: &Bmesh<I>) -> EdgeList<I> {
        let members = self.members();
        self.get_edges(mesh)
            .into_iter()
            .filter(|&e| {
                let edge = mesh.edge(e);
                edge.nfaces() == 2 && edge.all_faces().all(|f| members.contains(&f))
            })
            .collect()
    }

    /// Edges with exactly one face in the set.
    pub fn boundary_edges(&self, mesh: &Bmesh<I>) -> EdgeList<I> {
        let members = self.members();
        self.get_edges(mesh)
            .into_iter()
            .filter(|&e| Self::member_count(mesh, &members, e) == 1)
            .collect()
    }

    /// Boundary of the set as counter-clockwise loops, one per boundary
    /// component.
    pub fn get_boundary(&self, mesh: &Bmesh<I>) -> EdgeStrip<I> {
        let members = self.members();
        let mut boundary = Vec::new();
        for f in self.live(mesh) {
            for e in mesh.face(f).edges() {
                if Self::member_count(mesh, &members, e) == 1 {
                    boundary.push((e, f));
                }
            }
        }
        EdgeStrip::build_ccw_boundaries(mesh, &boundary)
    }

    /// Faces of the set reachable from `start` by crossing edges accepted by
    /// `accept`. Empty if `start` is not a live member.
    pub fn grow_connected<F>(&self, mesh: &Bmesh<I>, start: FaceId<I>, accept: F) -> FaceList<I>
    where
        F: Fn(&Bedge<I>) -> bool,
    {
        let members = self.members();
        if !members.contains(&start) || !mesh.is_face_alive(start) {
            return FaceList::new();
        }

        let mut reached = vec![start];
        let mut seen: HashSet<FaceId<I>> = HashSet::from([start]);
        let mut stack = vec![start];
        while let Some(f) = stack.pop() {
            for e in mesh.face(f).edges() {
                let edge = mesh.edge(e);
                if !accept(edge) {
                    continue;
                }
                for g in edge.all_faces() {
                    if members.contains(&g) && seen.insert(g) {
                        reached.push(g);
                        stack.push(g);
                    }
                }
            }
        }
        FaceList(reached)
    }

    /// True if every live face is reachable from the first across shared
    /// edges. An empty set is connected.
    pub fn is_connected(&self, mesh: &Bmesh<I>) -> bool {
        let live: Vec<FaceId<I>> = self.live(mesh).collect();
        match live.first() {
            None => true,
            Some(&f) => {
                let unique: HashSet<FaceId<I>> = live.iter().copied().collect();
                self.grow_connected(mesh, f, |_| true).len() == unique.len()
            }
        }
    }

    /// Split the set into edge-connected components.
    pub fn components(&self, mesh: &Bmesh<I>) -> Vec<FaceList<I>> {
        let mut assigned: HashSet<FaceId<I>> = HashSet::new();
        let mut out = Vec::new();
        for f in self.live(mesh) {
            if assigned.contains(&f) {
                continue;
            }
            let comp = self.grow_connected(mesh, f, |_| true);
            assigned.extend(comp.iter());
            out.push(comp);
        }
        out
    }

    /// True if no edge touches more than two faces of the set.
    pub fn is_2_manifold(&self, mesh: &Bmesh<I>) -> bool {
        let members = self.members();
        self.get_edges(mesh)
            .iter()
            .all(|e| Self::member_count(mesh, &members, e) <= 2)
    }

    /// True if the set is a topological disk: connected, 2-manifold, with a
    /// single boundary loop and Euler characteristic 1.
    pub fn is_disk(&self, mesh: &Bmesh<I>) -> bool {
        let faces: HashSet<FaceId<I>> = self.live(mesh).collect();
        if faces.is_empty() || !self.is_connected(mesh) || !self.is_2_manifold(mesh) {
            return false;
        }
        let boundary = self.get_boundary(mesh);
        if boundary.num_line_strips(mesh) != 1 {
            return false;
        }
        let v = self.get_verts(mesh).len() as i64;
        let e = self.get_edges(mesh).len() as i64;
        v - e + faces.len() as i64 == 1
    }

    /// Push every face into the secondary layer. Returns how many changed.
    pub fn push_layer(&self, mesh: &mut Bmesh<I>) -> usize {
        self.iter()
            .filter(|&f| mesh.make_secondary(f).unwrap_or(false))
            .count()
    }

    /// Bring every face back to the primary layer. Returns false if some
    /// face could not be promoted because its edges were already full.
    pub fn unpush_layer(&self, mesh: &mut Bmesh<I>) -> bool {
        let mut ok = true;
        for f in self.iter() {
            if mesh.is_face_alive(f) && !mesh.make_primary(f).unwrap_or(false) {
                ok = false;
            }
        }
        ok
    }

    /// The set plus the quad partner of every member.
    pub fn quad_complete(&self, mesh: &Bmesh<I>) -> FaceList<I> {
        let (mut out, mut seen) = (Vec::new(), HashSet::new());
        for f in self.live(mesh) {
            push_unique(&mut out, &mut seen, f);
            if let Some(g) = mesh.quad_partner(f) {
                push_unique(&mut out, &mut seen, g);
            }
        }
        FaceList(out)
    }

    /// The set plus every face sharing a vertex with it.
    pub fn one_ring(&self, mesh: &Bmesh<I>) -> FaceList<I> {
        let (mut out, mut seen) = (Vec::new(), HashSet::new());
        for f in self.live(mesh) {
            push_unique(&mut out, &mut seen, f);
        }
        for v in self.get_verts(mesh).iter() {
            for g in mesh.vertex_faces(v) {
                push_unique(&mut out, &mut seen, g);
            }
        }
        FaceList(out)
    }

    /// Total area.
    pub fn area(&self, mesh: &Bmesh<I>) -> f64 {
        self.live(mesh).map(|f| mesh.face_area(f)).sum()
    }

    /// Area-weighted average normal, zero if the set has no area.
    pub fn avg_normal(&self, mesh: &Bmesh<I>) -> Vector3<f64> {
        let n = self
            .live(mesh)
            .fold(Vector3::zeros(), |acc, f| acc + mesh.face_norm(f) * mesh.face_area(f));
        n.try_normalize(0.0).unwrap_or_else(Vector3::zeros)
    }

    /// Primary faces of the set.
    pub fn primary(&self, mesh: &Bmesh<I>) -> FaceList<I> {
        self.live(mesh).filter(|&f| !mesh.face(f).is_secondary()).collect()
    }

    /// Secondary faces of the set.
    pub fn secondary(&self, mesh: &Bmesh<I>) -> FaceList<I> {
        self.live(mesh).filter(|&f| mesh.face(f).is_secondary()).collect()
    }
}

impl<I: MeshIndex> EdgeList<I> {
    fn live<'a>(&'a self, mesh: &'a Bmesh<I>) -> impl Iterator<Item = EdgeId<I>> + 'a {
        self.iter().filter(move |&e| mesh.is_edge_alive(e))
    }

    /// Endpoints, without repeats.
    pub fn get_verts(&self, mesh: &Bmesh<I>) -> VertList<I> {
        let (mut out, mut seen) = (Vec::new(), HashSet::new());
        for e in self.live(mesh) {
            for v in mesh.edge(e).verts() {
                push_unique(&mut out, &mut seen, v);
            }
        }
        VertList(out)
    }

    /// Faces on the edges, primary and secondary, without repeats.
    pub fn get_faces(&self, mesh: &Bmesh<I>) -> FaceList<I> {
        let (mut out, mut seen) = (Vec::new(), HashSet::new());
        for e in self.live(mesh) {
            for f in mesh.edge(e).all_faces() {
                push_unique(&mut out, &mut seen, f);
            }
        }
        FaceList(out)
    }

    /// Edges accepted by `pred`.
    pub fn filter<F>(&self, mesh: &Bmesh<I>, pred: F) -> EdgeList<I>
    where
        F: Fn(&Bedge<I>) -> bool,
    {
        self.live(mesh).filter(|&e| pred(mesh.edge(e))).collect()
    }

    /// Summed edge length.
    pub fn total_length(&self, mesh: &Bmesh<I>) -> f64 {
        self.live(mesh).map(|e| mesh.edge_length(e)).sum()
    }

    /// The edges chained into line strips.
    pub fn get_chains(&self, mesh: &Bmesh<I>) -> EdgeStrip<I> {
        EdgeStrip::build_chains(mesh, &self.0)
    }
}

impl<I: MeshIndex> VertList<I> {
    fn members(&self) -> HashSet<VertexId<I>> {
        self.0.iter().copied().collect()
    }

    fn live<'a>(&'a self, mesh: &'a Bmesh<I>) -> impl Iterator<Item = VertexId<I>> + 'a {
        self.iter().filter(move |&v| mesh.is_vertex_alive(v))
    }

    /// Edges touching any vertex, without repeats.
    pub fn get_edges(&self, mesh: &Bmesh<I>) -> EdgeList<I> {
        let (mut out, mut seen) = (Vec::new(), HashSet::new());
        for v in self.live(mesh) {
            for &e in mesh.vertex(v).edges() {
                push_unique(&mut out, &mut seen, e);
            }
        }
        EdgeList(out)
    }

    /// Faces touching any vertex, without repeats.
    pub fn get_faces(&self, mesh: &Bmesh<I>) -> FaceList<I> {
        let (mut out, mut seen) = (Vec::new(), HashSet::new());
        for v in self.live(mesh) {
            for f in mesh.vertex_faces(v) {
                push_unique(&mut out, &mut seen, f);
            }
        }
        FaceList(out)
    }

    /// Edges with both endpoints in the set.
    pub fn inner_edges(&self, mesh: &Bmesh<I>) -> EdgeList<I> {
        let members = self.members();
        self.get_edges(mesh)
            .into_iter()
            .filter(|&e| mesh.edge(e).verts().iter().all(|v| members.contains(v)))
            .collect()
    }

    /// Average position.
    pub fn center(&self, mesh: &Bmesh<I>) -> Option<Point3<f64>> {
        let (sum, n) = self
            .live(mesh)
            .fold((Vector3::zeros(), 0usize), |(s, n), v| (s + mesh.position(v).coords, n + 1));
        (n > 0).then(|| Point3::from(sum / n as f64))
    }

    /// Axis-aligned bounding box.
    pub fn bounding_box(&self, mesh: &Bmesh<I>) -> Option<(Point3<f64>, Point3<f64>)> {
        let mut it = self.live(mesh).map(|v| *mesh.position(v));
        let first = it.next()?;
        Some(it.fold((first, first), |(lo, hi), p| (lo.inf(&p), hi.sup(&p))))
    }

    /// The vertex closest to `p`.
    pub fn nearest(&self, mesh: &Bmesh<I>, p: &Point3<f64>) -> Option<VertexId<I>> {
        self.live(mesh).min_by(|&a, &b| {
            let da = (mesh.position(a) - p).norm_squared();
            let db = (mesh.position(b) - p).norm_squared();
            da.total_cmp(&db)
        })
    }
}
