//! # jot
//!
//! A Loop-subdivision mesh kernel for interactive, sketch-based modelling.
//!
//! jot keeps a coarse *control mesh* and a stack of finer levels produced from
//! it by splitting every triangle in four. Edits to the control mesh mark the
//! affected vertices dirty, and only those neighbourhoods are recomputed when
//! a level is next asked for.
//!
//! ## Layout
//!
//! - [`mesh`]: the triangle mesh level [`Bmesh`](mesh::Bmesh), with explicit
//!   edges, crease levels, weak quad diagonals, secondary faces and patches.
//! - [`algo::subdivide`]: Loop, butterfly and hybrid Catmull-Clark stencils.
//! - [`lmesh`]: the subdivision hierarchy [`LoopMesh`](lmesh::LoopMesh).
//! - [`io`]: OBJ, STL and PLY files.
//!
//! ## Quick Start
//!
//! ```
//! use jot::prelude::*;
//! use nalgebra::Point3;
//!
//! // A tetrahedron
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//!     Point3::new(0.5, 0.5, 1.0),
//! ];
//! let faces = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];
//! let control: Bmesh = build_from_triangles(&vertices, &faces).unwrap();
//!
//! let mut lmesh = LoopMesh::from_mesh(control);
//! lmesh.set_cur_level(2).unwrap();
//! assert_eq!(lmesh.cur_mesh().num_faces(), 64);
//!
//! // Pull a corner up; the next update only touches its neighbourhood
//! lmesh.set_position(VertexId::new(3), Point3::new(0.5, 0.5, 2.0)).unwrap();
//! lmesh.update_subdivision(2).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod io;
pub mod lmesh;
pub mod mesh;

/// Prelude module for convenient imports.
///
/// ```
/// use jot::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::subdivide::{ColorRule, SubdivOptions, SubdivRule};
    pub use crate::error::{MeshError, Result};
    pub use crate::lmesh::{LoopMesh, MeshEvent};
    pub use crate::mesh::{
        build_from_polygons, build_from_quads, build_from_triangles, to_face_vertex, Bedge, Bface, Bmesh, Bvert,
        EdgeId, FaceId, MeshIndex, PatchId, VertexId,
    };
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use nalgebra::Point3;

    #[test]
    fn test_tetrahedron() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, 0.5, 1.0),
        ];
        let faces = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];
        let control: Bmesh = build_from_triangles(&vertices, &faces).unwrap();
        assert_eq!(control.num_edges(), 6);
        assert!(control.edge_ids().all(|e| !control.edge(e).is_border()));

        let mut lmesh = LoopMesh::from_mesh(control);
        lmesh.update_subdivision(1).unwrap();
        let fine = lmesh.mesh(1).unwrap();
        assert_eq!(fine.counts().verts, 10);
        assert_eq!(fine.num_faces(), 16);
        assert!(fine.is_valid());

        // Smooth rules pull the closed surface inward
        let (lo, hi) = fine.bounding_box().unwrap();
        assert!(hi.z < 1.0 && lo.z >= 0.0);
    }
}
