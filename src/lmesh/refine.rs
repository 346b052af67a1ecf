//! Level allocation and incremental refinement.
//!
//! [`LoopMesh::update_subdivision`] drains the dirty list of each level in
//! turn. Every dirty vertex makes sure its own child, the children of its
//! edges and the children of its faces exist on the next level, then the
//! positions of those children are recomputed from stencils. Work is
//! proportional to the dirty set, not to the mesh.

use std::ops::AddAssign;

use log::{debug, error};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use super::events::MeshEvent;
use super::level::Level;
use super::LoopMesh;
use crate::algo::subdivide::{stencil_color, stencil_point, ColorRule, SubdivRule};
use crate::algo::Progress;
use crate::error::{MeshError, Result};
use crate::mesh::{EdgeId, FaceId, MeshCounts, MeshIndex, Simplex, VertexId, CREASE_INF};

/// Stencil jobs below this count are evaluated on the calling thread.
const PARALLEL_THRESHOLD: usize = 512;

/// Dirty vertices between two progress reports.
const PROGRESS_BATCH: usize = 256;

/// What one call to [`LoopMesh::update_subdivision`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateStats {
    /// Dirty vertices drained.
    pub verts_processed: usize,
    /// Child positions recomputed.
    pub positions_updated: usize,
    /// Elements created on finer levels.
    pub created: MeshCounts,
}

impl UpdateStats {
    /// True if the call found nothing to do.
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

impl AddAssign for UpdateStats {
    fn add_assign(&mut self, rhs: Self) {
        self.verts_processed += rhs.verts_processed;
        self.positions_updated += rhs.positions_updated;
        self.created.verts += rhs.created.verts;
        self.created.edges += rhs.created.edges;
        self.created.faces += rhs.created.faces;
    }
}

/// Where a child vertex gets its position from.
#[derive(Debug, Clone, Copy)]
enum Source<I: MeshIndex> {
    Vertex(VertexId<I>),
    Edge(EdgeId<I>),
}

type Job<I> = (VertexId<I>, Source<I>);

fn child_crease(crease: u16) -> u16 {
    if crease == CREASE_INF {
        CREASE_INF
    } else {
        crease.saturating_sub(1)
    }
}

/// Element counts after splitting every face of a mesh with `counts` in four.
fn split_counts(counts: MeshCounts) -> Option<MeshCounts> {
    let MeshCounts { verts, edges, faces } = counts;
    Some(MeshCounts {
        verts: verts.checked_add(edges)?,
        edges: edges.checked_mul(2)?.checked_add(faces.checked_mul(3)?)?,
        faces: faces.checked_mul(4)?,
    })
}

/// Builds missing elements of `child` for a region of `parent`, recording
/// which child vertices need a position.
struct Allocator<'a, I: MeshIndex> {
    parent: &'a mut Level<I>,
    child: &'a mut Level<I>,
    jobs: Vec<Job<I>>,
}

impl<'a, I: MeshIndex> Allocator<'a, I> {
    fn vert_child(&mut self, v: VertexId<I>) -> VertexId<I> {
        if let Some(c) = self.parent.vert_child(v).filter(|&c| self.child.mesh.is_vertex_alive(c)) {
            return c;
        }
        let c = self.child.mesh.add_vertex(*self.parent.mesh.position(v));
        self.child.lvert_mut(c).parent = Some(Simplex::Vertex(v));
        self.parent.lvert_mut(v).child = Some(c);
        self.jobs.push((c, Source::Vertex(v)));
        c
    }

    fn edge_vert(&mut self, e: EdgeId<I>) -> VertexId<I> {
        if let Some(m) = self.parent.edge_child(e).filter(|&m| self.child.mesh.is_vertex_alive(m)) {
            return m;
        }
        let m = self.child.mesh.add_vertex(self.parent.mesh.edge_midpoint(e));
        self.child.lvert_mut(m).parent = Some(Simplex::Edge(e));
        self.parent.ledge_mut(e).child_vert = Some(m);
        self.jobs.push((m, Source::Edge(e)));
        m
    }

    /// Midpoint and both halves of `e`. Returns the midpoint.
    fn edge_children(&mut self, e: EdgeId<I>) -> Result<VertexId<I>> {
        let edge = self.parent.mesh.edge(e);
        let ([a, b], crease, weak) = (edge.verts(), child_crease(edge.crease()), edge.is_weak());
        let ends = [self.vert_child(a), self.vert_child(b)];
        let m = self.edge_vert(e);

        for (i, end) in ends.into_iter().enumerate() {
            let existing = self.parent.ledges.get(e.index()).and_then(|l| l.children[i]);
            if existing.is_some_and(|d| self.child.mesh.is_edge_alive(d)) {
                continue;
            }
            let d = self.child.mesh.add_edge(end, m)?;
            self.child.mesh.set_crease(d, crease)?;
            self.child.mesh.set_weak(d, weak)?;
            self.child.ledge_mut(d).parent = Some(Simplex::Edge(e));
            self.parent.ledge_mut(e).children[i] = Some(d);
        }
        Ok(m)
    }

    /// The four children of `f` and the three edges inside it.
    fn face_children(&mut self, f: FaceId<I>) -> Result<()> {
        let done = self.parent.face_children(f);
        if done.iter().all(|g| g.is_some_and(|g| self.child.mesh.is_face_alive(g))) {
            return Ok(());
        }

        let face = self.parent.mesh.face(f);
        let (verts, edges, patch, secondary) = (face.verts(), face.edges(), face.patch(), face.is_secondary());
        let weak = edges.map(|e| self.parent.mesh.edge(e).is_weak());

        let c = verts.map(|v| self.vert_child(v));
        let mut m = [c[0]; 3];
        for i in 0..3 {
            m[i] = self.edge_children(edges[i])?;
        }

        let tris = [
            [c[0], m[0], m[2]],
            [c[1], m[1], m[0]],
            [c[2], m[2], m[1]],
            [m[0], m[1], m[2]],
        ];
        for (i, [p, q, r]) in tris.into_iter().enumerate() {
            if done[i].is_some_and(|g| self.child.mesh.is_face_alive(g)) {
                continue;
            }
            let g = match self.child.mesh.lookup_face(p, q, r) {
                Some(g) => g,
                None => self.child.mesh.add_face_in_patch(p, q, r, patch)?,
            };
            if secondary {
                self.child.mesh.make_secondary(g)?;
            }
            self.child.lface_mut(g).parent = Some(f);
            self.parent.lface_mut(f).children[i] = Some(g);
        }

        // Interior edge i sits opposite corner i; it is weak when the parent
        // edge across from it (the one not touching corner i) is.
        let inner = [(m[0], m[2]), (m[1], m[0]), (m[2], m[1])];
        for (i, (p, q)) in inner.into_iter().enumerate() {
            if let Some(d) = self.child.mesh.lookup_edge(p, q) {
                self.child.mesh.set_weak(d, weak[(i + 1) % 3])?;
                self.child.ledge_mut(d).parent = Some(Simplex::Face(f));
                self.parent.lface_mut(f).interior[i] = Some(d);
            }
        }
        Ok(())
    }
}

fn evaluate<I: MeshIndex>(
    level: &Level<I>,
    rule: SubdivRule,
    color_rule: ColorRule,
    (c, src): Job<I>,
) -> (VertexId<I>, Point3<f64>, Option<Vector3<f64>>) {
    let mesh = &level.mesh;
    let (pos, col) = match src {
        Source::Vertex(v) => (rule.vertex_stencil(mesh, v), color_rule.vertex_stencil(rule, mesh, v)),
        Source::Edge(e) => (rule.edge_stencil(mesh, e), color_rule.edge_stencil(rule, mesh, e)),
    };
    (c, stencil_point(mesh, &pos), stencil_color(mesh, &col))
}

impl<I: MeshIndex> LoopMesh<I> {
    /// Append the next finer level.
    ///
    /// The new level is sized for a full 1-to-4 split of the current finest
    /// level: `V + E` vertices, `2E + 3F` edges and `4F` faces. Every vertex
    /// of the parent level becomes dirty.
    pub fn allocate_subdiv_mesh(&mut self) -> Result<()> {
        let k = self.levels.len() - 1;
        let level = k + 1;
        if level > self.options.max_level {
            error!("refusing to allocate level {}: limit is {}", level, self.options.max_level);
            return Err(MeshError::SubdivAllocation {
                level,
                reason: format!("exceeds the maximum level {}", self.options.max_level),
            });
        }

        let Some(want) = split_counts(self.levels[k].mesh.counts()) else {
            error!("level {} would overflow the element counts", level);
            return Err(MeshError::SubdivAllocation {
                level,
                reason: "element count overflow".to_string(),
            });
        };

        let mut fine = Level::default();
        if let Err(err) = fine.try_reserve(want) {
            error!("cannot allocate level {}: {}", level, err);
            return Err(MeshError::SubdivAllocation {
                level,
                reason: err.to_string(),
            });
        }
        for patch in self.levels[k].mesh.patches() {
            fine.mesh.create_patch(patch.name());
        }

        debug!("allocated level {} for {:?}", level, want);
        self.levels.push(fine);
        self.levels[k].mark_all_dirty();
        self.listeners.emit(MeshEvent::SubdivGenerated { level });
        Ok(())
    }

    /// Bring every level down to `level` up to date, allocating missing
    /// levels on the way.
    ///
    /// Calling it again without an edit in between does nothing.
    ///
    /// # Example
    ///
    /// ```
    /// use jot::lmesh::LoopMesh;
    /// use jot::mesh::build_from_triangles;
    /// use nalgebra::Point3;
    ///
    /// let vertices = vec![
    ///     Point3::new(0.0, 0.0, 0.0),
    ///     Point3::new(1.0, 0.0, 0.0),
    ///     Point3::new(0.5, 1.0, 0.0),
    /// ];
    /// let control = build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap();
    /// let mut lmesh: LoopMesh = LoopMesh::from_mesh(control);
    ///
    /// let stats = lmesh.update_subdivision(2).unwrap();
    /// assert_eq!(lmesh.mesh(2).unwrap().num_faces(), 16);
    /// assert!(stats.verts_processed > 0);
    /// assert!(lmesh.update_subdivision(2).unwrap().is_noop());
    /// ```
    pub fn update_subdivision(&mut self, level: usize) -> Result<UpdateStats> {
        self.update_subdivision_with_progress(level, &Progress::none())
    }

    /// [`update_subdivision`](Self::update_subdivision) with progress
    /// reporting.
    pub fn update_subdivision_with_progress(&mut self, level: usize, progress: &Progress) -> Result<UpdateStats> {
        if level > self.options.max_level {
            return Err(MeshError::LevelOutOfRange {
                level,
                depth: self.options.max_level,
            });
        }
        self.listeners.emit(MeshEvent::UpdateRequested { level });

        let mut stats = UpdateStats::default();
        for k in 0..level {
            if self.levels.len() == k + 1 {
                self.allocate_subdiv_mesh()?;
            }
            stats += self.update_level(k, progress)?;
        }
        if !stats.is_noop() {
            debug!("update to level {}: {:?}", level, stats);
        }
        Ok(stats)
    }

    /// Drain the dirty list of level `k` into level `k + 1`.
    fn update_level(&mut self, k: usize, progress: &Progress) -> Result<UpdateStats> {
        let rule = self.options.rule;
        let color_rule = self.options.color_rule;
        let radius = rule.dirty_radius();
        let parallel = self.options.parallel;

        let (coarse, fine) = self.levels.split_at_mut(k + 1);
        let (parent, child) = (&mut coarse[k], &mut fine[0]);
        let before = child.mesh.counts();
        let total = parent.dirty.len();
        let mut stats = UpdateStats::default();
        let mut alloc = Allocator {
            parent,
            child,
            jobs: Vec::new(),
        };

        while let Some(v) = alloc.parent.dirty.pop() {
            if !alloc.parent.mesh.is_vertex_alive(v) {
                continue;
            }
            alloc.parent.lvert_mut(v).dirty = false;
            stats.verts_processed += 1;
            if stats.verts_processed % PROGRESS_BATCH == 0 {
                progress.report(k + 1, stats.verts_processed, total);
            }

            let c = alloc.vert_child(v);
            alloc.jobs.push((c, Source::Vertex(v)));
            for e in alloc.parent.mesh.vertex(v).edges().to_vec() {
                let m = alloc.edge_children(e)?;
                alloc.jobs.push((m, Source::Edge(e)));
            }
            for f in alloc.parent.mesh.vertex_faces(v) {
                alloc.face_children(f)?;
            }
        }

        let Allocator { parent, child, mut jobs } = alloc;
        jobs.sort_by_key(|&(c, _)| c);
        jobs.dedup_by_key(|&mut (c, _)| c);

        let parent: &Level<I> = parent;
        let results: Vec<_> = if parallel && jobs.len() >= PARALLEL_THRESHOLD {
            jobs.par_iter().map(|&job| evaluate(parent, rule, color_rule, job)).collect()
        } else {
            jobs.iter().map(|&job| evaluate(parent, rule, color_rule, job)).collect()
        };

        for (c, position, color) in results {
            child.mesh.set_position(c, position)?;
            child.mesh.set_color(c, color)?;
            child.mark_dirty_around(c, radius);
        }

        let after = child.mesh.counts();
        stats.positions_updated = jobs.len();
        stats.created = MeshCounts {
            verts: after.verts.saturating_sub(before.verts),
            edges: after.edges.saturating_sub(before.edges),
            faces: after.faces.saturating_sub(before.faces),
        };
        if total > 0 {
            progress.report(k + 1, stats.verts_processed, total);
        }
        Ok(stats)
    }

    /// Make the next finer level current, updating it first.
    pub fn refine(&mut self) -> Result<()> {
        let target = self.cur_level + 1;
        self.update_subdivision(target)?;
        self.cur_level = target;
        Ok(())
    }

    /// Make the next coarser level current. Returns false at the control
    /// mesh. No data is discarded.
    pub fn unrefine(&mut self) -> bool {
        if self.cur_level == 0 {
            return false;
        }
        self.cur_level -= 1;
        true
    }

    /// Make level `level` current, updating it first.
    pub fn set_cur_level(&mut self, level: usize) -> Result<()> {
        self.update_subdivision(level)?;
        self.cur_level = level;
        Ok(())
    }

    /// Mark every vertex on every level dirty, forcing a full recompute on
    /// the next update.
    pub fn mark_all_dirty(&mut self) {
        for level in &mut self.levels {
            level.mark_all_dirty();
        }
    }

    /// Switch the position rule. Every level is marked dirty.
    pub fn set_rule(&mut self, rule: SubdivRule) {
        if self.options.rule != rule {
            self.options.rule = rule;
            self.mark_all_dirty();
        }
    }

    /// Switch the color rule. Every level is marked dirty.
    pub fn set_color_rule(&mut self, color_rule: ColorRule) {
        if self.options.color_rule != color_rule {
            self.options.color_rule = color_rule;
            self.mark_all_dirty();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::subdivide::SubdivOptions;
    use crate::mesh::{build_from_quads, Bmesh};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

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
    fn test_split_counts() {
        let mut lmesh: LoopMesh = LoopMesh::from_mesh(grid(2));
        lmesh.allocate_subdiv_mesh().unwrap();
        let reserved = lmesh.level(1).unwrap().reserved();
        assert_eq!(reserved, MeshCounts { verts: 25, edges: 56, faces: 32 });

        let stats = lmesh.update_subdivision(1).unwrap();
        let fine = lmesh.mesh(1).unwrap();
        assert_eq!(fine.counts(), MeshCounts { verts: 25, edges: 56, faces: 32 });
        assert_eq!(stats.created, fine.counts());
        assert_eq!(stats.verts_processed, 9);
        assert!(fine.is_valid());
        assert!(lmesh.check_hierarchy());
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut lmesh: LoopMesh = LoopMesh::from_mesh(grid(2));
        lmesh.update_subdivision(3).unwrap();
        let hash = lmesh.mesh(3).unwrap().topology_hash();
        assert!(lmesh.update_subdivision(3).unwrap().is_noop());
        assert!(lmesh.update_subdivision(1).unwrap().is_noop());
        assert_eq!(lmesh.mesh(3).unwrap().topology_hash(), hash);
        assert_eq!(lmesh.mesh(3).unwrap().num_faces(), 8 * 64);
    }

    #[test]
    fn test_incremental_matches_full() {
        let lifted = Point3::new(2.0, 2.0, 1.0);
        let center = VertexId::new(12);

        let mut edited: LoopMesh = LoopMesh::from_mesh(grid(4));
        edited.update_subdivision(2).unwrap();
        edited.set_position(center, lifted).unwrap();
        let stats = edited.update_subdivision(2).unwrap();
        assert!(stats.verts_processed < 25 + 81);
        assert_eq!(stats.created, MeshCounts::default());

        let mut control = grid(4);
        control.set_position(center, lifted).unwrap();
        let mut fresh: LoopMesh = LoopMesh::from_mesh(control);
        fresh.update_subdivision(2).unwrap();

        let (a, b) = (edited.mesh(2).unwrap(), fresh.mesh(2).unwrap());
        assert_eq!(a.num_verts(), b.num_verts());
        for v in a.vertex_ids() {
            assert!((a.position(v) - b.position(v)).norm() < 1e-12, "vertex {:?}", v);
        }
    }

    #[test]
    fn test_weak_edges_propagate() {
        let mut lmesh: LoopMesh = LoopMesh::from_mesh(grid(1));
        lmesh.update_subdivision(1).unwrap();
        let fine = lmesh.mesh(1).unwrap();
        let weak = fine.edge_ids().filter(|&e| fine.edge(e).is_weak()).count();
        // Two halves of the diagonal plus one inner edge per triangle
        assert_eq!(weak, 4);
        let quads = fine.face_ids().filter(|&f| fine.is_quad(f)).count();
        assert_eq!(quads, 8);
    }

    #[test]
    fn test_crease_decrements_per_level() {
        let mut lmesh: LoopMesh = LoopMesh::from_mesh(grid(2));
        let control = lmesh.control();
        let e = control.lookup_edge(VertexId::new(3), VertexId::new(4)).unwrap();
        let f = control.lookup_edge(VertexId::new(4), VertexId::new(5)).unwrap();
        lmesh.set_crease(e, 2).unwrap();
        lmesh.set_crease(f, CREASE_INF).unwrap();
        lmesh.update_subdivision(2).unwrap();

        let halves = |k: usize, e: EdgeId| lmesh.level(k).unwrap().ledge(e).unwrap().children;
        let crease = |k: usize, e: EdgeId| lmesh.mesh(k).unwrap().edge(e).crease();

        for d in halves(0, e).into_iter().flatten() {
            assert_eq!(crease(1, d), 1);
            for g in halves(1, d).into_iter().flatten() {
                assert_eq!(crease(2, g), 0);
            }
        }
        for d in halves(0, f).into_iter().flatten() {
            assert_eq!(crease(1, d), CREASE_INF);
        }

        // The creased row stays flat in y at every level
        let fine = lmesh.mesh(2).unwrap();
        let m = lmesh.level(0).unwrap().edge_child(e).unwrap();
        let m2 = lmesh.level(1).unwrap().vert_child(m).unwrap();
        assert!((fine.position(m2).y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_max_level() {
        let options = SubdivOptions::default().with_max_level(1);
        let mut lmesh: LoopMesh = LoopMesh::with_options(grid(1), options);
        assert!(matches!(
            lmesh.update_subdivision(2),
            Err(MeshError::LevelOutOfRange { level: 2, .. })
        ));
        lmesh.allocate_subdiv_mesh().unwrap();
        assert!(matches!(
            lmesh.allocate_subdiv_mesh(),
            Err(MeshError::SubdivAllocation { level: 2, .. })
        ));
        assert_eq!(lmesh.depth(), 1);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut par: LoopMesh = LoopMesh::from_mesh(grid(20));
        let mut seq: LoopMesh = LoopMesh::with_options(grid(20), SubdivOptions::default().sequential());
        par.update_subdivision(2).unwrap();
        seq.update_subdivision(2).unwrap();

        let (a, b) = (par.mesh(2).unwrap(), seq.mesh(2).unwrap());
        assert_eq!(a.counts(), b.counts());
        assert!(a.vertex_ids().all(|v| a.position(v) == b.position(v)));
    }

    #[test]
    fn test_hybrid_is_bit_exact() {
        let hybrid = SubdivOptions::new(SubdivRule::Hybrid);
        let mut runs: Vec<LoopMesh> = vec![
            LoopMesh::with_options(grid(20), hybrid.clone()),
            LoopMesh::with_options(grid(20), hybrid.clone()),
            LoopMesh::with_options(grid(20), hybrid.sequential()),
        ];
        for lmesh in &mut runs {
            lmesh.update_subdivision(2).unwrap();
        }

        let first = runs[0].mesh(2).unwrap();
        for other in &runs[1..] {
            let other = other.mesh(2).unwrap();
            assert_eq!(first.counts(), other.counts());
            assert!(first.vertex_ids().all(|v| first.position(v) == other.position(v)));
        }
    }

    #[test]
    fn test_progress_reports() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let progress = Progress::new(move |level, done, total| {
            assert!(done <= total);
            assert!(level >= 1);
            seen.fetch_add(1, Ordering::Relaxed);
        });

        let mut lmesh: LoopMesh = LoopMesh::from_mesh(grid(20));
        lmesh.update_subdivision_with_progress(1, &progress).unwrap();
        // 441 dirty vertices: one batch report and one final report
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_refine_and_unrefine() {
        let mut lmesh: LoopMesh = LoopMesh::from_mesh(grid(1));
        assert!(!lmesh.unrefine());
        lmesh.refine().unwrap();
        lmesh.refine().unwrap();
        assert_eq!(lmesh.cur_level(), 2);
        assert_eq!(lmesh.num_faces(), 32);
        assert!(lmesh.unrefine());
        assert_eq!(lmesh.num_faces(), 8);
        assert_eq!(lmesh.depth(), 2);
    }

    #[test]
    fn test_child_crease() {
        assert_eq!(child_crease(0), 0);
        assert_eq!(child_crease(3), 2);
        assert_eq!(child_crease(CREASE_INF), CREASE_INF);
        assert!(split_counts(MeshCounts { verts: 1, edges: usize::MAX, faces: 0 }).is_none());
    }
}
