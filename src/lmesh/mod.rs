//! Loop subdivision hierarchies.
//!
//! A [`LoopMesh`] owns a stack of [`Level`]s. Level 0 is the *control mesh*,
//! the only level edited directly; every finer level is produced from the
//! one above it by splitting each face in four. Levels refer to each other
//! only through ids stored in their side tables, so each level is an
//! ordinary [`Bmesh`] with no pointers into its neighbours.
//!
//! # Incremental updates
//!
//! Edits mark the affected control vertices *dirty*. Nothing is recomputed
//! until [`LoopMesh::update_subdivision`] is asked for a level; it then only
//! visits dirty vertices and their neighbourhoods, creating missing child
//! elements on the way.
//!
//! # Current level
//!
//! Renderers and tools work on the *current* level, moved with
//! [`refine`](LoopMesh::refine), [`unrefine`](LoopMesh::unrefine) and
//! [`set_cur_level`](LoopMesh::set_cur_level). The patch-facing queries
//! ([`cur_faces`](LoopMesh::cur_faces), [`draw_tri_strips`](LoopMesh::draw_tri_strips)
//! and friends) read from it.
//!
//! # Example
//!
//! ```
//! use jot::lmesh::{LoopMesh, MeshEvent};
//! use jot::mesh::{build_from_quads, VertexId};
//! use nalgebra::Point3;
//! use std::sync::{Arc, Mutex};
//!
//! let vertices: Vec<Point3<f64>> = (0..9)
//!     .map(|i| Point3::new((i % 3) as f64, (i / 3) as f64, 0.0))
//!     .collect();
//! let quads = vec![[0, 1, 4, 3], [1, 2, 5, 4], [3, 4, 7, 6], [4, 5, 8, 7]];
//! let control = build_from_quads(&vertices, &quads).unwrap();
//!
//! let mut lmesh: LoopMesh = LoopMesh::from_mesh(control);
//! let events = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&events);
//! lmesh.subscribe(move |e| sink.lock().unwrap().push(*e));
//!
//! lmesh.refine().unwrap();
//! assert_eq!(lmesh.cur_level(), 1);
//! assert_eq!(lmesh.cur_mesh().num_verts(), 25);
//! assert_eq!(lmesh.cur_mesh().num_faces(), 32);
//! assert!(events.lock().unwrap().contains(&MeshEvent::SubdivGenerated { level: 1 }));
//!
//! // Lift the middle control vertex; only its neighbourhood is recomputed.
//! lmesh.set_position(VertexId::new(4), Point3::new(1.0, 1.0, 1.0)).unwrap();
//! let stats = lmesh.update_subdivision(1).unwrap();
//! assert!(stats.verts_processed < 9);
//! ```

mod events;
mod level;
mod merge;
mod refine;
mod remove;

use log::warn;
use nalgebra::{Point3, Vector3};

use crate::algo::subdivide::SubdivOptions;
use crate::error::{MeshError, Result};
use crate::mesh::{
    Bface, Bmesh, EdgeId, EdgeStrip, FaceId, FaceList, MeshIndex, PatchId, SearchHit, Simplex, StripCallback,
    TriStrip, VertexId, ViewFrame,
};

pub use events::{ListenerId, MeshEvent};
pub use level::{Ledge, Level, Lface, Lvert};
pub use refine::UpdateStats;

use events::Listeners;

/// A subdivision hierarchy over a control mesh.
#[derive(Debug)]
pub struct LoopMesh<I: MeshIndex = u32> {
    levels: Vec<Level<I>>,
    cur_level: usize,
    options: SubdivOptions,
    listeners: Listeners,
}

impl<I: MeshIndex> Default for LoopMesh<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: MeshIndex> LoopMesh<I> {
    /// Create a hierarchy with an empty control mesh and default options.
    pub fn new() -> Self {
        Self::with_options(Bmesh::new(), SubdivOptions::default())
    }

    /// Use `control` as the control mesh, with default options.
    pub fn from_mesh(control: Bmesh<I>) -> Self {
        Self::with_options(control, SubdivOptions::default())
    }

    /// Use `control` as the control mesh. Every control vertex starts dirty.
    pub fn with_options(control: Bmesh<I>, options: SubdivOptions) -> Self {
        let mut level = Level::new(control);
        level.mark_all_dirty();
        Self {
            levels: vec![level],
            cur_level: 0,
            options,
            listeners: Listeners::default(),
        }
    }

    // ==================== Accessors ====================

    /// Number of levels finer than the control mesh.
    #[inline]
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    /// The options in use.
    pub fn options(&self) -> &SubdivOptions {
        &self.options
    }

    /// Level `k`, if allocated.
    pub fn level(&self, k: usize) -> Option<&Level<I>> {
        self.levels.get(k)
    }

    /// Mesh of level `k`, if allocated.
    pub fn mesh(&self, k: usize) -> Option<&Bmesh<I>> {
        self.levels.get(k).map(Level::mesh)
    }

    /// The control mesh.
    pub fn control(&self) -> &Bmesh<I> {
        &self.levels[0].mesh
    }

    /// Depth of the current level.
    #[inline]
    pub fn cur_level(&self) -> usize {
        self.cur_level
    }

    /// Mesh of the current level.
    pub fn cur_mesh(&self) -> &Bmesh<I> {
        &self.levels[self.cur_level].mesh
    }

    /// Approximate heap footprint of every level in bytes.
    pub fn size(&self) -> usize {
        self.levels.iter().map(Level::size).sum()
    }

    // ==================== Events ====================

    /// Register a listener. It is called synchronously for every event.
    pub fn subscribe<F>(&mut self, callback: F) -> ListenerId
    where
        F: FnMut(&MeshEvent) + Send + 'static,
    {
        self.listeners.subscribe(Box::new(callback))
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    // ==================== Editing ====================

    fn mark_around(&mut self, v: VertexId<I>) {
        let radius = self.options.rule.dirty_radius();
        self.levels[0].mark_dirty_around(v, radius);
    }

    /// Add a control vertex.
    pub fn add_vertex(&mut self, position: Point3<f64>) -> VertexId<I> {
        let v = self.levels[0].mesh.add_vertex(position);
        self.levels[0].mark_dirty(v);
        v
    }

    /// Add a control face.
    pub fn add_face(&mut self, a: VertexId<I>, b: VertexId<I>, c: VertexId<I>) -> Result<FaceId<I>> {
        self.add_face_in_patch(a, b, c, None)
    }

    /// Add a control face in a patch.
    pub fn add_face_in_patch(
        &mut self,
        a: VertexId<I>,
        b: VertexId<I>,
        c: VertexId<I>,
        patch: Option<PatchId<I>>,
    ) -> Result<FaceId<I>> {
        let f = self.levels[0].mesh.add_face_in_patch(a, b, c, patch)?;
        for v in [a, b, c] {
            self.mark_around(v);
        }
        Ok(f)
    }

    /// Move a control vertex.
    pub fn set_position(&mut self, v: VertexId<I>, position: Point3<f64>) -> Result<()> {
        self.levels[0].mesh.set_position(v, position)?;
        self.mark_around(v);
        Ok(())
    }

    /// Set or clear the color of a control vertex.
    pub fn set_color(&mut self, v: VertexId<I>, color: Option<Vector3<f64>>) -> Result<()> {
        self.levels[0].mesh.set_color(v, color)?;
        self.mark_around(v);
        Ok(())
    }

    /// Set the crease level of a control edge.
    pub fn set_crease(&mut self, e: EdgeId<I>, crease: u16) -> Result<()> {
        self.levels[0].mesh.set_crease(e, crease)?;
        self.edge_changed(e);
        Ok(())
    }

    /// Mark or unmark a control edge as a quad diagonal.
    pub fn set_weak(&mut self, e: EdgeId<I>, weak: bool) -> Result<()> {
        self.levels[0].mesh.set_weak(e, weak)?;
        self.edge_changed(e);
        Ok(())
    }

    /// Crease and weak flags are copied to child edges when they are made,
    /// so changing them on the control mesh drops the children of the edge
    /// and of its faces. The next update rebuilds them.
    fn edge_changed(&mut self, e: EdgeId<I>) {
        let control = &self.levels[0];
        let [a, b] = control.mesh.edge(e).verts();
        let mut doomed: Vec<Simplex<I>> = Vec::new();
        if let Some(m) = control.edge_child(e) {
            doomed.push(Simplex::Vertex(m));
        }
        for f in control.mesh.edge(e).all_faces() {
            if let Some(lf) = control.lface(f) {
                doomed.extend(lf.interior.iter().flatten().map(|&d| Simplex::Edge(d)));
                doomed.extend(lf.children.iter().flatten().map(|&g| Simplex::Face(g)));
            }
        }
        if self.depth() > 0 {
            for s in doomed {
                self.remove_at(1, s);
            }
        }
        self.mark_around(a);
        self.mark_around(b);
    }

    /// Push faces of the control mesh into the secondary layer, together
    /// with all their descendants. Returns how many control faces changed.
    ///
    /// Layer changes alter which edges are sharp, so the corners of every
    /// changed face are marked dirty.
    pub fn push_layer(&mut self, faces: &FaceList<I>) -> usize {
        let control = &mut self.levels[0].mesh;
        let pushed: FaceList<I> = faces
            .iter()
            .filter(|&f| control.make_secondary(f).unwrap_or(false))
            .collect();
        if !self.for_descendants(&pushed, |mesh, g| mesh.make_secondary(g).is_ok()) {
            warn!("push_layer: finer levels disagree with the control mesh");
        }
        self.layer_changed(&pushed);
        pushed.len()
    }

    /// Bring faces of the control mesh and their descendants back into the
    /// primary layer. Returns false if some face, on any level, could not
    /// be promoted. Descendants of a control face that stays secondary are
    /// left alone.
    pub fn unpush_layer(&mut self, faces: &FaceList<I>) -> bool {
        let control = &mut self.levels[0].mesh;
        let mut ok = true;
        let mut promoted = Vec::new();
        for f in faces.iter() {
            if !control.is_face_alive(f) {
                continue;
            }
            let was_secondary = control.face(f).is_secondary();
            match control.make_primary(f) {
                Ok(true) if was_secondary => promoted.push(f),
                Ok(true) => {}
                _ => ok = false,
            }
        }
        let promoted = FaceList::from(promoted);
        let below = self.for_descendants(&promoted, |mesh, g| mesh.make_primary(g).unwrap_or(false));
        if !below {
            warn!("unpush_layer: finer levels disagree with the control mesh");
        }
        self.layer_changed(&promoted);
        ok && below
    }

    fn layer_changed(&mut self, faces: &FaceList<I>) {
        let corners: Vec<VertexId<I>> = faces
            .iter()
            .flat_map(|f| self.levels[0].mesh.face(f).verts())
            .collect();
        for v in corners {
            self.mark_around(v);
        }
    }

    /// Apply `op` to every descendant of `faces` on every finer level.
    /// Returns false if `op` failed anywhere.
    fn for_descendants<F>(&mut self, faces: &FaceList<I>, mut op: F) -> bool
    where
        F: FnMut(&mut Bmesh<I>, FaceId<I>) -> bool,
    {
        let mut ok = true;
        let mut frontier: Vec<FaceId<I>> = faces.iter().collect();
        for k in 1..self.levels.len() {
            frontier = frontier
                .iter()
                .flat_map(|&f| self.levels[k - 1].face_children(f))
                .flatten()
                .filter(|&g| self.levels[k].mesh.is_face_alive(g))
                .collect();
            for &g in &frontier {
                ok &= op(&mut self.levels[k].mesh, g);
            }
        }
        ok
    }

    /// Create a patch on every level. Patch ids agree across levels.
    pub fn create_patch(&mut self, name: &str) -> PatchId<I> {
        let mut id = PatchId::new(0);
        for level in &mut self.levels {
            id = level.mesh.create_patch(name);
        }
        id
    }

    /// Move a control face and its descendants into a patch.
    pub fn set_patch(&mut self, f: FaceId<I>, patch: Option<PatchId<I>>) -> Result<()> {
        self.levels[0].mesh.set_patch(f, patch)?;
        let mut result = Ok(());
        self.for_descendants(&FaceList::from(vec![f]), |mesh, g| {
            if let Err(err) = mesh.set_patch(g, patch) {
                result = Err(err);
                return false;
            }
            true
        });
        result
    }

    // ==================== Patch interface ====================

    /// Faces of a patch on the current level.
    pub fn cur_faces(&self, p: PatchId<I>) -> Result<&[FaceId<I>]> {
        let mesh = self.cur_mesh();
        mesh.patch(p)
            .map(|patch| patch.faces())
            .ok_or(MeshError::UnknownPatch(p.index()))
    }

    /// Number of faces on the current level.
    pub fn num_faces(&self) -> usize {
        self.cur_mesh().num_faces()
    }

    /// Stamp of a patch on the current level.
    pub fn stamp(&self, p: PatchId<I>) -> Result<u64> {
        self.cur_mesh()
            .patch(p)
            .map(|patch| patch.stamp())
            .ok_or(MeshError::UnknownPatch(p.index()))
    }

    /// Call `f` for every primary face of a patch on the current level.
    pub fn draw_faces<F>(&self, p: PatchId<I>, f: F) -> Result<()>
    where
        F: FnMut(FaceId<I>, &Bface<I>),
    {
        self.cur_mesh().draw_faces(p, f)
    }

    /// Triangle strips of a patch on the current level.
    pub fn tri_strips(&self, p: PatchId<I>) -> Result<&[TriStrip<I>]> {
        self.cur_mesh().tri_strips(p)
    }

    /// Feed the triangle strips of a patch on the current level to `cb`.
    pub fn draw_tri_strips<C>(&self, p: PatchId<I>, cb: &mut C) -> Result<()>
    where
        C: StripCallback<I> + ?Sized,
    {
        self.cur_mesh().draw_tri_strips(p, cb)
    }

    /// Silhouette strip of a patch on the current level.
    pub fn sil_strip(&self, p: PatchId<I>, view: &dyn ViewFrame) -> Result<EdgeStrip<I>> {
        self.cur_mesh().sil_strip(p, view)
    }

    /// Search the current level for the point nearest `p`, starting at face
    /// `f`, with the configured recursion cap.
    pub fn local_search(&self, f: FaceId<I>, p: &Point3<f64>) -> Option<SearchHit<I>> {
        self.cur_mesh().local_search(f, p, self.options.search_depth)
    }
}
