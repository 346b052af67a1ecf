//! One level of a subdivision hierarchy.
//!
//! A [`Level`] wraps a [`Bmesh`] with side tables that link its elements to
//! the levels above and below. The tables are indexed by the same slots as
//! the mesh arenas and grow on demand, so elements added straight to the
//! mesh simply start with no links.

use std::collections::TryReserveError;
use std::mem::size_of;

use crate::mesh::{Bmesh, EdgeId, FaceId, MeshCounts, MeshIndex, Simplex, VertexId};

/// Subdivision data of a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lvert<I: MeshIndex = u32> {
    /// The child position on the next level is stale.
    pub dirty: bool,
    /// Vertex on the next level that this vertex becomes.
    pub child: Option<VertexId<I>>,
    /// Vertex or edge on the previous level this vertex came from.
    pub parent: Option<Simplex<I>>,
}

/// Subdivision data of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ledge<I: MeshIndex = u32> {
    /// Midpoint vertex on the next level.
    pub child_vert: Option<VertexId<I>>,
    /// Halves on the next level, from `v1` and from `v2`.
    pub children: [Option<EdgeId<I>>; 2],
    /// Edge or face on the previous level this edge came from.
    pub parent: Option<Simplex<I>>,
}

/// Subdivision data of a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lface<I: MeshIndex = u32> {
    /// Corner faces at `v1`, `v2`, `v3`, then the center face.
    pub children: [Option<FaceId<I>>; 4],
    /// Edges of the center face, each opposite one corner face.
    pub interior: [Option<EdgeId<I>>; 3],
    /// Face on the previous level this face came from.
    pub parent: Option<FaceId<I>>,
}

// Derived Default would require `I: Default`.
impl<I: MeshIndex> Default for Lvert<I> {
    fn default() -> Self {
        Self {
            dirty: false,
            child: None,
            parent: None,
        }
    }
}

impl<I: MeshIndex> Default for Ledge<I> {
    fn default() -> Self {
        Self {
            child_vert: None,
            children: [None; 2],
            parent: None,
        }
    }
}

impl<I: MeshIndex> Default for Lface<I> {
    fn default() -> Self {
        Self {
            children: [None; 4],
            interior: [None; 3],
            parent: None,
        }
    }
}

fn slot<T: Default>(table: &mut Vec<T>, i: usize) -> &mut T {
    if i >= table.len() {
        table.resize_with(i + 1, T::default);
    }
    &mut table[i]
}

/// A mesh level plus its links to neighbouring levels and its dirty list.
#[derive(Debug, Clone)]
pub struct Level<I: MeshIndex = u32> {
    pub(crate) mesh: Bmesh<I>,
    pub(crate) lverts: Vec<Lvert<I>>,
    pub(crate) ledges: Vec<Ledge<I>>,
    pub(crate) lfaces: Vec<Lface<I>>,
    pub(crate) dirty: Vec<VertexId<I>>,
    reserved: MeshCounts,
}

impl<I: MeshIndex> Default for Level<I> {
    fn default() -> Self {
        Self::new(Bmesh::new())
    }
}

impl<I: MeshIndex> Level<I> {
    pub(crate) fn new(mesh: Bmesh<I>) -> Self {
        Self {
            mesh,
            lverts: Vec::new(),
            ledges: Vec::new(),
            lfaces: Vec::new(),
            dirty: Vec::new(),
            reserved: MeshCounts::default(),
        }
    }

    /// Reserve room for `counts` elements in the mesh and the side tables.
    pub(crate) fn try_reserve(&mut self, counts: MeshCounts) -> Result<(), TryReserveError> {
        self.mesh.try_reserve(counts)?;
        self.lverts.try_reserve(counts.verts)?;
        self.ledges.try_reserve(counts.edges)?;
        self.lfaces.try_reserve(counts.faces)?;
        self.reserved = counts;
        Ok(())
    }

    /// The mesh of this level.
    #[inline]
    pub fn mesh(&self) -> &Bmesh<I> {
        &self.mesh
    }

    /// Element counts this level was sized for when it was allocated.
    pub fn reserved(&self) -> MeshCounts {
        self.reserved
    }

    /// Subdivision data of a vertex, if any was recorded.
    pub fn lvert(&self, v: VertexId<I>) -> Option<&Lvert<I>> {
        self.lverts.get(v.index())
    }

    /// Subdivision data of an edge, if any was recorded.
    pub fn ledge(&self, e: EdgeId<I>) -> Option<&Ledge<I>> {
        self.ledges.get(e.index())
    }

    /// Subdivision data of a face, if any was recorded.
    pub fn lface(&self, f: FaceId<I>) -> Option<&Lface<I>> {
        self.lfaces.get(f.index())
    }

    pub(crate) fn lvert_mut(&mut self, v: VertexId<I>) -> &mut Lvert<I> {
        slot(&mut self.lverts, v.index())
    }

    pub(crate) fn ledge_mut(&mut self, e: EdgeId<I>) -> &mut Ledge<I> {
        slot(&mut self.ledges, e.index())
    }

    pub(crate) fn lface_mut(&mut self, f: FaceId<I>) -> &mut Lface<I> {
        slot(&mut self.lfaces, f.index())
    }

    /// Child vertex of `v` on the next level.
    pub fn vert_child(&self, v: VertexId<I>) -> Option<VertexId<I>> {
        self.lvert(v)?.child
    }

    /// Midpoint child of `e` on the next level.
    pub fn edge_child(&self, e: EdgeId<I>) -> Option<VertexId<I>> {
        self.ledge(e)?.child_vert
    }

    /// Child faces of `f` on the next level.
    pub fn face_children(&self, f: FaceId<I>) -> [Option<FaceId<I>>; 4] {
        self.lface(f).map_or([None; 4], |l| l.children)
    }

    /// Whether the next-level position of `v` is stale.
    pub fn is_dirty(&self, v: VertexId<I>) -> bool {
        self.lvert(v).is_some_and(|l| l.dirty)
    }

    /// Number of vertices waiting on the dirty list.
    pub fn num_dirty(&self) -> usize {
        self.dirty.len()
    }

    /// Put `v` on the dirty list unless it already is.
    pub(crate) fn mark_dirty(&mut self, v: VertexId<I>) {
        if !self.mesh.is_vertex_alive(v) {
            return;
        }
        let lv = self.lvert_mut(v);
        if !lv.dirty {
            lv.dirty = true;
            self.dirty.push(v);
        }
    }

    /// Mark `v` and every vertex within `radius` hops of it.
    pub(crate) fn mark_dirty_around(&mut self, v: VertexId<I>, radius: usize) {
        if !self.mesh.is_vertex_alive(v) {
            return;
        }
        for u in self.mesh.vertex_ring(v, radius) {
            self.mark_dirty(u);
        }
    }

    pub(crate) fn mark_all_dirty(&mut self) {
        let ids: Vec<VertexId<I>> = self.mesh.vertex_ids().collect();
        for v in ids {
            self.mark_dirty(v);
        }
    }

    /// Forget every link into the next level.
    pub(crate) fn clear_children(&mut self) {
        for lv in &mut self.lverts {
            lv.child = None;
        }
        for le in &mut self.ledges {
            le.child_vert = None;
            le.children = [None; 2];
        }
        for lf in &mut self.lfaces {
            lf.children = [None; 4];
            lf.interior = [None; 3];
        }
    }

    /// Approximate heap footprint in bytes.
    pub fn size(&self) -> usize {
        self.mesh.size()
            + self.lverts.len() * size_of::<Lvert<I>>()
            + self.ledges.len() * size_of::<Ledge<I>>()
            + self.lfaces.len() * size_of::<Lface<I>>()
            + self.dirty.len() * size_of::<VertexId<I>>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    #[test]
    fn test_side_tables_grow_on_demand() {
        let mut level: Level = Level::default();
        let v = level.mesh.add_vertex(Point3::origin());
        assert!(level.lvert(v).is_none());
        assert!(!level.is_dirty(v));

        level.mark_dirty(v);
        level.mark_dirty(v);
        assert!(level.is_dirty(v));
        assert_eq!(level.num_dirty(), 1);

        // Dead vertices never enter the list
        let w = level.mesh.add_vertex(Point3::origin());
        level.mesh.remove_vertex(w).unwrap();
        level.mark_dirty(w);
        level.mark_dirty_around(w, 1);
        assert_eq!(level.dirty, vec![v]);
    }

    #[test]
    fn test_clear_children() {
        let mut level: Level = Level::default();
        let v = level.mesh.add_vertex(Point3::origin());
        level.lvert_mut(v).child = Some(VertexId::new(3));
        level.lface_mut(FaceId::new(2)).children[3] = Some(FaceId::new(9));
        level.clear_children();
        assert_eq!(level.vert_child(v), None);
        assert_eq!(level.face_children(FaceId::new(2)), [None; 4]);
    }
}
