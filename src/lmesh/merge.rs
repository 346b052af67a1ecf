//! Merging two hierarchies.

use log::debug;

use super::events::MeshEvent;
use super::level::{Ledge, Level, Lface, Lvert};
use super::LoopMesh;
use crate::mesh::{MeshIndex, MeshOffsets, Simplex};

fn shift_simplex<I: MeshIndex>(s: Simplex<I>, by: MeshOffsets) -> Simplex<I> {
    match s {
        Simplex::Vertex(v) => Simplex::Vertex(v.shifted(by.verts)),
        Simplex::Edge(e) => Simplex::Edge(e.shifted(by.edges)),
        Simplex::Face(f) => Simplex::Face(f.shifted(by.faces)),
    }
}

fn pad<T: Default>(table: &mut Vec<T>, len: usize) {
    if table.len() < len {
        table.resize_with(len, T::default);
    }
}

/// Move `other` into `level`. `up` and `down` are the shifts applied to the
/// neighbouring levels, which parent and child links point into.
fn append_level<I: MeshIndex>(level: &mut Level<I>, other: Level<I>, up: MeshOffsets, down: MeshOffsets) {
    let Level {
        mesh,
        lverts,
        ledges,
        lfaces,
        dirty,
        ..
    } = other;
    let here = level.mesh.append(mesh);

    pad(&mut level.lverts, here.verts);
    pad(&mut level.ledges, here.edges);
    pad(&mut level.lfaces, here.faces);

    level.lverts.extend(lverts.into_iter().map(|lv| Lvert {
        dirty: lv.dirty,
        child: lv.child.map(|c| c.shifted(down.verts)),
        parent: lv.parent.map(|p| shift_simplex(p, up)),
    }));
    level.ledges.extend(ledges.into_iter().map(|le| Ledge {
        child_vert: le.child_vert.map(|m| m.shifted(down.verts)),
        children: le.children.map(|d| d.map(|d| d.shifted(down.edges))),
        parent: le.parent.map(|p| shift_simplex(p, up)),
    }));
    level.lfaces.extend(lfaces.into_iter().map(|lf| Lface {
        children: lf.children.map(|g| g.map(|g| g.shifted(down.faces))),
        interior: lf.interior.map(|d| d.map(|d| d.shifted(down.edges))),
        parent: lf.parent.map(|f| f.shifted(up.faces)),
    }));
    level.dirty.extend(dirty.into_iter().map(|v| v.shifted(here.verts)));
}

impl<I: MeshIndex> LoopMesh<I> {
    /// Move every level of `other` into this hierarchy.
    ///
    /// Both hierarchies are first cut back to the shallower of the two, so
    /// the result has `min(self.depth(), other.depth())` levels. Ids from
    /// `other` are shifted past the slots already in use on each level.
    /// Listeners and options of `other` are dropped.
    pub fn merge(&mut self, mut other: LoopMesh<I>) {
        let depth = self.depth().min(other.depth());
        self.delete_subdiv_mesh(depth);
        other.delete_subdiv_mesh(depth);

        let offsets: Vec<MeshOffsets> = self
            .levels
            .iter()
            .map(|level| MeshOffsets {
                verts: level.mesh.vert_slots(),
                edges: level.mesh.edge_slots(),
                faces: level.mesh.face_slots(),
                patches: level.mesh.patches().len(),
            })
            .collect();

        for (k, theirs) in other.levels.into_iter().enumerate() {
            let up = k.checked_sub(1).map_or_else(MeshOffsets::default, |j| offsets[j]);
            let down = offsets.get(k + 1).copied().unwrap_or_default();
            append_level(&mut self.levels[k], theirs, up, down);
        }

        self.cur_level = self.cur_level.min(depth);
        debug!("merged hierarchies at depth {}: {:?}", depth, self.control().counts());
        self.listeners.emit(MeshEvent::Merged);
    }
}

#[cfg(test)]
mod tests {
    use crate::lmesh::{LoopMesh, MeshEvent};
    use crate::mesh::{build_from_triangles, Bmesh, VertexId};
    use nalgebra::Point3;
    use std::sync::{Arc, Mutex};

    fn triangle(x: f64) -> Bmesh {
        let vertices = vec![
            Point3::new(x, 0.0, 0.0),
            Point3::new(x + 1.0, 0.0, 0.0),
            Point3::new(x + 0.5, 1.0, 0.0),
        ];
        build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap()
    }

    #[test]
    fn test_merge_truncates_to_shallower() {
        let mut a: LoopMesh = LoopMesh::from_mesh(triangle(0.0));
        a.set_cur_level(2).unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        a.subscribe(move |e| sink.lock().unwrap().push(*e));

        let b: LoopMesh = LoopMesh::from_mesh(triangle(5.0));
        a.merge(b);

        assert_eq!(a.depth(), 0);
        assert_eq!(a.cur_level(), 0);
        assert_eq!(a.control().num_faces(), 2);
        assert_eq!(
            *events.lock().unwrap(),
            vec![MeshEvent::SubDeleted { level: 1 }, MeshEvent::Merged]
        );

        // Both halves subdivide on the next update
        a.update_subdivision(1).unwrap();
        assert_eq!(a.mesh(1).unwrap().num_faces(), 8);
        assert!(a.check_hierarchy());
    }

    #[test]
    fn test_merge_shifts_links() {
        let mut a: LoopMesh = LoopMesh::from_mesh(triangle(0.0));
        a.update_subdivision(1).unwrap();
        let mut b: LoopMesh = LoopMesh::from_mesh(triangle(5.0));
        b.update_subdivision(1).unwrap();
        let b_child = *b.mesh(1).unwrap().position(b.level(0).unwrap().vert_child(VertexId::new(0)).unwrap());

        a.merge(b);
        assert_eq!(a.depth(), 1);
        assert_eq!(a.mesh(1).unwrap().num_faces(), 8);
        assert_eq!(a.mesh(1).unwrap().num_verts(), 12);
        assert!(a.check_hierarchy());
        assert!(a.mesh(1).unwrap().is_valid());
        assert!(a.update_subdivision(1).unwrap().is_noop());

        // Vertex 3 is the first vertex of the merged triangle
        let c = a.level(0).unwrap().vert_child(VertexId::new(3)).unwrap();
        assert_eq!(*a.mesh(1).unwrap().position(c), b_child);

        let before = *a.mesh(1).unwrap().position(a.level(0).unwrap().vert_child(VertexId::new(0)).unwrap());
        a.set_position(VertexId::new(3), Point3::new(5.0, 0.0, 2.0)).unwrap();
        a.update_subdivision(1).unwrap();
        assert!(a.mesh(1).unwrap().position(c).z > 0.0);
        let after = *a.mesh(1).unwrap().position(a.level(0).unwrap().vert_child(VertexId::new(0)).unwrap());
        assert_eq!(before, after);
    }
}
