//! Core mesh data structures.
//!
//! This module provides [`Bmesh`], one level of triangle mesh with explicit
//! vertices, edges and faces, together with the queries and set algorithms
//! built on it.
//!
//! # Overview
//!
//! A [`Bmesh`] keeps adjacency in both directions: vertices list their
//! edges, edges list up to two primary faces plus any secondary ones, and
//! faces list their three vertices and edges. Derived geometry (face normals
//! and areas, vertex and edge normals) is computed lazily and cached until a
//! position changes.
//!
//! # Index Types
//!
//! Mesh elements are identified by type-safe index wrappers:
//! - [`VertexId`] - Identifies a vertex
//! - [`EdgeId`] - Identifies an edge
//! - [`FaceId`] - Identifies a face
//! - [`PatchId`] - Identifies a patch
//!
//! These indices are generic over the underlying integer type ([`MeshIndex`] trait),
//! allowing you to choose `u16`, `u32`, or `u64` based on mesh size.
//!
//! # Construction
//!
//! Meshes are typically constructed from file I/O or from face-vertex lists:
//!
//! ```
//! use jot::mesh::{Bmesh, build_from_quads};
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let quads = vec![[0, 1, 2, 3]];
//!
//! let mesh: Bmesh = build_from_quads(&vertices, &quads).unwrap();
//! assert_eq!(mesh.num_faces(), 2);
//! ```

mod bmesh;
mod builder;
mod edge_strip;
mod geometry;
mod index;
mod lists;
mod patch;
mod simplex;
mod view;

pub use bmesh::{Bmesh, MeshCounts};
pub(crate) use bmesh::MeshOffsets;
pub use builder::{build_from_polygons, build_from_quads, build_from_triangles, to_face_vertex, to_polygons};
pub use edge_strip::EdgeStrip;
pub use geometry::{NearestPt, SearchHit, BC_SNAP};
pub use index::{EdgeId, FaceId, MeshIndex, PatchId, VertexId};
pub use lists::{EdgeList, FaceList, VertList};
pub use patch::{Patch, StripCallback, TriStrip};
pub use simplex::{Bedge, Bface, Bvert, FaceGeom, Simplex, CREASE_INF};
pub use view::{OrthoView, ViewFrame};
