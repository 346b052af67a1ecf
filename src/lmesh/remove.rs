//! Cascading removal and level deletion.
//!
//! Removing a control element first removes everything it produced on finer
//! levels, deepest first, so no child link ever names a dead element and no
//! element is left behind whose parent is gone.

use log::{debug, warn};

use super::events::MeshEvent;
use super::LoopMesh;
use crate::error::{MeshError, Result};
use crate::mesh::{EdgeId, FaceId, MeshIndex, Simplex, VertexId};

impl<I: MeshIndex> LoopMesh<I> {
    /// Remove a control vertex, its edges and faces, and all their
    /// descendants.
    ///
    /// # Errors
    /// [`MeshError::StaleVertex`] if the id is not live on the control mesh. Unlike
    /// [`Bmesh`](crate::mesh::Bmesh) accessors, this never panics.
    pub fn remove_vertex(&mut self, v: VertexId<I>) -> Result<()> {
        if !self.levels[0].mesh.is_vertex_alive(v) {
            return Err(MeshError::StaleVertex(v.index()));
        }
        let ring: Vec<VertexId<I>> = self.levels[0].mesh.neighbors(v).collect();
        self.remove_vertex_at(0, v);
        for u in ring {
            self.mark_dirty_after_removal(u);
        }
        Ok(())
    }

    /// Remove a control edge, its faces, and all their descendants.
    ///
    /// # Errors
    /// [`MeshError::StaleEdge`] if the id is not live on the control mesh. Unlike
    /// [`Bmesh`](crate::mesh::Bmesh) accessors, this never panics.
    pub fn remove_edge(&mut self, e: EdgeId<I>) -> Result<()> {
        let ends = self
            .levels[0]
            .mesh
            .get_edge(e)
            .ok_or(MeshError::StaleEdge(e.index()))?
            .verts();
        self.remove_edge_at(0, e);
        for v in ends {
            self.mark_dirty_after_removal(v);
        }
        Ok(())
    }

    /// Remove a control face and all its descendants.
    ///
    /// # Errors
    /// [`MeshError::StaleFace`] if the id is not live on the control mesh. Unlike
    /// [`Bmesh`](crate::mesh::Bmesh) accessors, this never panics.
    pub fn remove_face(&mut self, f: FaceId<I>) -> Result<()> {
        let corners = self
            .levels[0]
            .mesh
            .get_face(f)
            .ok_or(MeshError::StaleFace(f.index()))?
            .verts();
        self.remove_face_at(0, f);
        for v in corners {
            self.mark_dirty_after_removal(v);
        }
        Ok(())
    }

    fn mark_dirty_after_removal(&mut self, v: VertexId<I>) {
        let radius = self.options.rule.dirty_radius();
        self.levels[0].mark_dirty_around(v, radius);
    }

    /// Remove `s` from level `k` with its descendants. Dead elements are
    /// skipped.
    pub(crate) fn remove_at(&mut self, k: usize, s: Simplex<I>) {
        match s {
            Simplex::Vertex(v) => self.remove_vertex_at(k, v),
            Simplex::Edge(e) => self.remove_edge_at(k, e),
            Simplex::Face(f) => self.remove_face_at(k, f),
        }
    }

    fn remove_vertex_at(&mut self, k: usize, v: VertexId<I>) {
        let Some(vert) = self.levels.get(k).and_then(|l| l.mesh.get_vertex(v)) else {
            return;
        };
        for e in vert.edges().to_vec() {
            self.remove_edge_at(k, e);
        }
        if let Some(c) = self.levels[k].vert_child(v) {
            self.remove_vertex_at(k + 1, c);
        }

        let level = &mut self.levels[k];
        let parent = level.lvert(v).and_then(|l| l.parent);
        if level.mesh.remove_vertex(v).is_ok() {
            *level.lvert_mut(v) = Default::default();
        }
        if let (Some(parent), Some(k_up)) = (parent, k.checked_sub(1)) {
            let up = &mut self.levels[k_up];
            match parent {
                Simplex::Vertex(p) => up.lvert_mut(p).child = None,
                Simplex::Edge(p) => up.ledge_mut(p).child_vert = None,
                Simplex::Face(_) => {}
            }
        }
    }

    fn remove_edge_at(&mut self, k: usize, e: EdgeId<I>) {
        let Some(edge) = self.levels.get(k).and_then(|l| l.mesh.get_edge(e)) else {
            return;
        };
        for f in edge.all_faces().collect::<Vec<_>>() {
            self.remove_face_at(k, f);
        }
        if let Some(le) = self.levels[k].ledge(e).copied() {
            for d in le.children.into_iter().flatten() {
                self.remove_edge_at(k + 1, d);
            }
            if let Some(m) = le.child_vert {
                self.remove_vertex_at(k + 1, m);
            }
        }

        let level = &mut self.levels[k];
        let parent = level.ledge(e).and_then(|l| l.parent);
        if level.mesh.remove_edge(e).is_ok() {
            *level.ledge_mut(e) = Default::default();
        }
        if let (Some(parent), Some(k_up)) = (parent, k.checked_sub(1)) {
            let up = &mut self.levels[k_up];
            match parent {
                Simplex::Edge(p) => {
                    for slot in &mut up.ledge_mut(p).children {
                        if *slot == Some(e) {
                            *slot = None;
                        }
                    }
                }
                Simplex::Face(p) => {
                    for slot in &mut up.lface_mut(p).interior {
                        if *slot == Some(e) {
                            *slot = None;
                        }
                    }
                }
                Simplex::Vertex(_) => {}
            }
        }
    }

    fn remove_face_at(&mut self, k: usize, f: FaceId<I>) {
        if !self.levels.get(k).is_some_and(|l| l.mesh.is_face_alive(f)) {
            return;
        }
        if let Some(lf) = self.levels[k].lface(f).copied() {
            for g in lf.children.into_iter().flatten() {
                self.remove_face_at(k + 1, g);
            }
            for d in lf.interior.into_iter().flatten() {
                self.remove_edge_at(k + 1, d);
            }
        }

        let level = &mut self.levels[k];
        let parent = level.lface(f).and_then(|l| l.parent);
        if level.mesh.remove_face(f).is_ok() {
            *level.lface_mut(f) = Default::default();
        }
        if let (Some(p), Some(k_up)) = (parent, k.checked_sub(1)) {
            for slot in &mut self.levels[k_up].lface_mut(p).children {
                if *slot == Some(f) {
                    *slot = None;
                }
            }
        }
    }

    /// Drop every level finer than `level`, detaching the children of
    /// `level`. Returns false if there was nothing to drop.
    pub fn delete_subdiv_mesh(&mut self, level: usize) -> bool {
        if level + 1 >= self.levels.len() {
            return false;
        }
        debug!("deleting levels {}..={}", level + 1, self.depth());
        self.levels.truncate(level + 1);
        self.levels[level].clear_children();
        self.cur_level = self.cur_level.min(level);
        self.listeners.emit(MeshEvent::SubDeleted { level: level + 1 });
        true
    }

    /// Check that every link between levels names a live element and that
    /// parent and child links agree.
    pub fn check_hierarchy(&self) -> bool {
        let mut ok = true;
        for (k, level) in self.levels.iter().enumerate() {
            let next = self.levels.get(k + 1);
            let prev = k.checked_sub(1).map(|j| &self.levels[j]);

            for v in level.mesh.vertex_ids() {
                let lv = level.lvert(v).copied().unwrap_or_default();
                if let Some(c) = lv.child {
                    let back = next.and_then(|n| n.lvert(c)).and_then(|l| l.parent);
                    if back != Some(Simplex::Vertex(v)) || !next.is_some_and(|n| n.mesh.is_vertex_alive(c)) {
                        warn!("level {}: {:?} has a bad child {:?}", k, v, c);
                        ok = false;
                    }
                }
                if prev.is_some() && !parent_alive(prev, lv.parent) {
                    warn!("level {}: {:?} has a dead parent", k, v);
                    ok = false;
                }
            }

            for e in level.mesh.edge_ids() {
                let le = level.ledge(e).copied().unwrap_or_default();
                let verts_ok = le
                    .child_vert
                    .into_iter()
                    .all(|m| next.is_some_and(|n| n.mesh.is_vertex_alive(m)));
                let edges_ok = le
                    .children
                    .into_iter()
                    .flatten()
                    .all(|d| next.is_some_and(|n| n.mesh.is_edge_alive(d)));
                if !verts_ok || !edges_ok {
                    warn!("level {}: {:?} has a dead child", k, e);
                    ok = false;
                }
                if prev.is_some() && !parent_alive(prev, le.parent) {
                    warn!("level {}: {:?} has a dead parent", k, e);
                    ok = false;
                }
            }

            for f in level.mesh.face_ids() {
                let lf = level.lface(f).copied().unwrap_or_default();
                let faces_ok = lf
                    .children
                    .into_iter()
                    .flatten()
                    .all(|g| next.is_some_and(|n| n.mesh.is_face_alive(g)));
                let edges_ok = lf
                    .interior
                    .into_iter()
                    .flatten()
                    .all(|d| next.is_some_and(|n| n.mesh.is_edge_alive(d)));
                if !faces_ok || !edges_ok {
                    warn!("level {}: {:?} has a dead child", k, f);
                    ok = false;
                }
                if prev.is_some() && !parent_alive(prev, lf.parent.map(Simplex::Face)) {
                    warn!("level {}: {:?} has a dead parent", k, f);
                    ok = false;
                }
            }
        }
        ok
    }
}

/// True if `parent` names a live element of `prev`.
fn parent_alive<I: MeshIndex>(prev: Option<&super::Level<I>>, parent: Option<Simplex<I>>) -> bool {
    let (Some(level), Some(parent)) = (prev, parent) else {
        return false;
    };
    match parent {
        Simplex::Vertex(v) => level.mesh.is_vertex_alive(v),
        Simplex::Edge(e) => level.mesh.is_edge_alive(e),
        Simplex::Face(f) => level.mesh.is_face_alive(f),
    }
}

#[cfg(test)]
mod tests {
    use crate::error::MeshError;
    use crate::lmesh::{LoopMesh, MeshEvent};
    use crate::mesh::{build_from_quads, Bmesh, EdgeId, FaceId, Simplex, VertexId};
    use nalgebra::Point3;
    use std::sync::{Arc, Mutex};

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
    fn test_remove_vertex_cascades() {
        let mut lmesh: LoopMesh = LoopMesh::from_mesh(grid(2));
        lmesh.update_subdivision(2).unwrap();
        assert!(lmesh.check_hierarchy());

        let corner = VertexId::new(0);
        let c1 = lmesh.level(0).unwrap().vert_child(corner).unwrap();
        let c2 = lmesh.level(1).unwrap().vert_child(c1).unwrap();

        lmesh.remove_vertex(corner).unwrap();
        assert!(!lmesh.mesh(1).unwrap().is_vertex_alive(c1));
        assert!(!lmesh.mesh(2).unwrap().is_vertex_alive(c2));
        assert!(lmesh.check_hierarchy());
        assert!(lmesh.mesh(1).unwrap().is_valid());

        // Corner 0 had two control faces (one quad); each had 4 and 16 descendants
        assert_eq!(lmesh.control().num_faces(), 6);
        assert_eq!(lmesh.mesh(1).unwrap().num_faces(), 24);
        assert_eq!(lmesh.mesh(2).unwrap().num_faces(), 96);

        // Updating again rebuilds nothing that was removed
        lmesh.update_subdivision(2).unwrap();
        assert_eq!(lmesh.mesh(2).unwrap().num_faces(), 96);
        assert!(lmesh.check_hierarchy());
    }

    #[test]
    fn test_remove_face_keeps_shared_edges() {
        let mut lmesh: LoopMesh = LoopMesh::from_mesh(grid(1));
        lmesh.update_subdivision(1).unwrap();
        lmesh.remove_face(FaceId::new(0)).unwrap();

        let fine = lmesh.mesh(1).unwrap();
        assert_eq!(fine.num_faces(), 4);
        // The diagonal and its midpoint survive with the other triangle
        assert_eq!(fine.num_verts(), 9);
        assert!(lmesh.check_hierarchy());
        assert!(lmesh.remove_face(FaceId::new(0)).is_err());
    }

    #[test]
    fn test_dead_ids_are_errors() {
        let mut lmesh: LoopMesh = LoopMesh::from_mesh(grid(1));
        lmesh.remove_vertex(VertexId::new(0)).unwrap();
        assert!(matches!(lmesh.remove_vertex(VertexId::new(0)), Err(MeshError::StaleVertex(0))));
        assert!(matches!(lmesh.remove_edge(EdgeId::new(0)), Err(MeshError::StaleEdge(0))));
        assert!(matches!(lmesh.remove_face(FaceId::new(99)), Err(MeshError::StaleFace(99))));
    }

    #[test]
    fn test_delete_subdiv_mesh() {
        let mut lmesh: LoopMesh = LoopMesh::from_mesh(grid(1));
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        lmesh.subscribe(move |e| sink.lock().unwrap().push(*e));

        lmesh.set_cur_level(2).unwrap();
        assert!(lmesh.delete_subdiv_mesh(1));
        assert_eq!(lmesh.depth(), 1);
        assert_eq!(lmesh.cur_level(), 1);
        assert_eq!(lmesh.level(1).unwrap().face_children(FaceId::new(0)), [None; 4]);
        assert!(lmesh.check_hierarchy());
        assert!(!lmesh.delete_subdiv_mesh(1));
        assert!(events.lock().unwrap().contains(&MeshEvent::SubDeleted { level: 2 }));

        // Everything on level 1 is dirty again and level 2 comes back whole
        lmesh.update_subdivision(2).unwrap();
        assert_eq!(lmesh.mesh(2).unwrap().num_faces(), 32);
        assert!(lmesh.check_hierarchy());
    }

    #[test]
    fn test_parent_links_point_up() {
        let mut lmesh: LoopMesh = LoopMesh::from_mesh(grid(1));
        lmesh.update_subdivision(1).unwrap();
        let fine = lmesh.level(1).unwrap();
        let parents: Vec<_> = fine
            .mesh()
            .vertex_ids()
            .map(|v| fine.lvert(v).unwrap().parent.unwrap())
            .collect();
        assert_eq!(parents.iter().filter(|p| matches!(p, Simplex::Vertex(_))).count(), 4);
        assert_eq!(parents.iter().filter(|p| matches!(p, Simplex::Edge(_))).count(), 5);
    }
}
