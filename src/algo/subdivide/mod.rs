//! Subdivision rules.
//!
//! A rule decides where each vertex of the next finer level goes. Every new
//! vertex comes from either a parent vertex (the *vertex point*) or a parent
//! edge (the *edge point*), and its position is an affine combination of
//! parent vertices. That combination is returned as a [`Stencil`] so the
//! caller can apply it to positions and colors alike, and can evaluate many
//! stencils in parallel against a read-only parent level.
//!
//! # Loop
//!
//! Loop subdivision (Loop, 1987) is approximating. Smooth vertices move
//! towards the weighted average of their neighbours, edge points sit at
//! `3/8, 3/8, 1/8, 1/8` of the edge ends and the two opposite corners.
//! Sharp edges (creases, borders, non-manifold edges) use curve rules.
//!
//! # Butterfly
//!
//! The modified butterfly scheme (Dyn, Levin & Gregory, 1990) is
//! interpolating: vertex points stay where they are and edge points use an
//! eight point stencil.
//!
//! # Hybrid
//!
//! Pairs of triangles joined by a weak edge are logical quads. The hybrid
//! rule uses Catmull-Clark weights wherever the neighbourhood is made of
//! quads and Loop weights elsewhere.
//!
//! # Example
//!
//! ```
//! use jot::algo::subdivide::{SubdivRule, stencil_point};
//! use jot::mesh::{build_from_triangles, Bmesh, VertexId};
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//! ];
//! let mesh: Bmesh = build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap();
//!
//! // A lone triangle is all border: its corners have two sharp edges.
//! let stencil = SubdivRule::Loop.vertex_stencil(&mesh, VertexId::new(0));
//! let p = stencil_point(&mesh, &stencil);
//! assert!((p - Point3::new(0.1875, 0.125, 0.0)).norm() < 1e-12);
//! ```
//!
//! # References
//!
//! - Loop, C. (1987). "Smooth Subdivision Surfaces Based on Triangles."
//!   Master's thesis, University of Utah.
//! - Dyn, N., Levin, D. & Gregory, J. (1990). "A butterfly subdivision scheme
//!   for surface interpolation with tension control." ACM TOG 9(2).
//! - Catmull, E. & Clark, J. (1978). "Recursively generated B-spline surfaces
//!   on arbitrary topological meshes." Computer-Aided Design, 10(6), 350-355.

mod butterfly;
mod catmull_clark;
mod loop_subdivision;

use nalgebra::{Point3, Vector3};

use crate::mesh::{Bmesh, EdgeId, MeshIndex, VertexId};

pub use loop_subdivision::compute_loop_beta;

/// Weighted parent vertices whose affine combination gives one child vertex.
/// Weights sum to one.
pub type Stencil<I = u32> = Vec<(VertexId<I>, f64)>;

/// Which scheme places vertices on the next level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SubdivRule {
    /// Approximating Loop subdivision with crease rules.
    #[default]
    Loop,
    /// Interpolating modified butterfly.
    Butterfly,
    /// Catmull-Clark weights on quad regions, Loop elsewhere.
    Hybrid,
}

impl SubdivRule {
    /// How many rings around an edited vertex have stale vertex or edge
    /// points under this rule.
    pub fn dirty_radius(self) -> usize {
        match self {
            SubdivRule::Loop | SubdivRule::Butterfly => 1,
            SubdivRule::Hybrid => 2,
        }
    }

    /// Stencil of the child of parent vertex `v`.
    pub fn vertex_stencil<I: MeshIndex>(self, mesh: &Bmesh<I>, v: VertexId<I>) -> Stencil<I> {
        match self {
            SubdivRule::Loop => loop_subdivision::vertex_stencil(mesh, v),
            SubdivRule::Butterfly => butterfly::vertex_stencil(v),
            SubdivRule::Hybrid => catmull_clark::vertex_stencil(mesh, v),
        }
    }

    /// Stencil of the midpoint child of parent edge `e`.
    pub fn edge_stencil<I: MeshIndex>(self, mesh: &Bmesh<I>, e: EdgeId<I>) -> Stencil<I> {
        match self {
            SubdivRule::Loop => loop_subdivision::edge_stencil(mesh, e),
            SubdivRule::Butterfly => butterfly::edge_stencil(mesh, e),
            SubdivRule::Hybrid => catmull_clark::edge_stencil(mesh, e),
        }
    }
}

impl std::str::FromStr for SubdivRule {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "loop" => Ok(SubdivRule::Loop),
            "butterfly" => Ok(SubdivRule::Butterfly),
            "hybrid" => Ok(SubdivRule::Hybrid),
            other => Err(format!("unknown subdivision rule '{}'", other)),
        }
    }
}

/// How vertex colors are carried to the next level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ColorRule {
    /// Use the same stencil as positions.
    #[default]
    Smooth,
    /// Copy vertex colors and average edge ends.
    Linear,
}

impl ColorRule {
    /// Stencil used for the color of the child of `v`.
    pub fn vertex_stencil<I: MeshIndex>(self, rule: SubdivRule, mesh: &Bmesh<I>, v: VertexId<I>) -> Stencil<I> {
        match self {
            ColorRule::Smooth => rule.vertex_stencil(mesh, v),
            ColorRule::Linear => vec![(v, 1.0)],
        }
    }

    /// Stencil used for the color of the midpoint child of `e`.
    pub fn edge_stencil<I: MeshIndex>(self, rule: SubdivRule, mesh: &Bmesh<I>, e: EdgeId<I>) -> Stencil<I> {
        match self {
            ColorRule::Smooth => rule.edge_stencil(mesh, e),
            ColorRule::Linear => midpoint(mesh, e),
        }
    }
}

/// Options for a subdivision hierarchy.
#[derive(Debug, Clone)]
pub struct SubdivOptions {
    /// Scheme for positions.
    pub rule: SubdivRule,

    /// Scheme for colors.
    pub color_rule: ColorRule,

    /// Whether to evaluate stencils in parallel (default: true).
    pub parallel: bool,

    /// Deepest level that may be allocated.
    pub max_level: usize,

    /// Recursion cap for world-space face searches.
    pub search_depth: usize,
}

impl Default for SubdivOptions {
    fn default() -> Self {
        Self {
            rule: SubdivRule::Loop,
            color_rule: ColorRule::Smooth,
            parallel: true,
            max_level: 8,
            search_depth: 50,
        }
    }
}

impl SubdivOptions {
    /// Create default options using `rule`.
    pub fn new(rule: SubdivRule) -> Self {
        Self {
            rule,
            ..Self::default()
        }
    }

    /// Set the color rule.
    pub fn with_color_rule(mut self, color_rule: ColorRule) -> Self {
        self.color_rule = color_rule;
        self
    }

    /// Set the deepest level that may be allocated.
    pub fn with_max_level(mut self, max_level: usize) -> Self {
        self.max_level = max_level;
        self
    }

    /// Set the recursion cap for face searches.
    pub fn with_search_depth(mut self, depth: usize) -> Self {
        self.search_depth = depth;
        self
    }

    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Create options for single-threaded execution.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

/// Apply a stencil to parent positions.
pub fn stencil_point<I: MeshIndex>(mesh: &Bmesh<I>, stencil: &Stencil<I>) -> Point3<f64> {
    let sum: Vector3<f64> = stencil
        .iter()
        .map(|&(v, w)| mesh.position(v).coords * w)
        .sum();
    Point3::from(sum)
}

/// Apply a stencil to parent colors. `None` unless every vertex of the
/// stencil has a color.
pub fn stencil_color<I: MeshIndex>(mesh: &Bmesh<I>, stencil: &Stencil<I>) -> Option<Vector3<f64>> {
    stencil
        .iter()
        .map(|&(v, w)| mesh.color(v).map(|c| c * w))
        .sum()
}

fn midpoint<I: MeshIndex>(mesh: &Bmesh<I>, e: EdgeId<I>) -> Stencil<I> {
    let [a, b] = mesh.edge(e).verts();
    vec![(a, 0.5), (b, 0.5)]
}

/// Corner of primary face `f` opposite edge `e`.
fn opposite_corner<I: MeshIndex>(mesh: &Bmesh<I>, f: crate::mesh::FaceId<I>, e: EdgeId<I>) -> Option<VertexId<I>> {
    let face = mesh.get_face(f)?;
    let i = face.eindex(e)?;
    Some(face.opposite_vert(i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{build_from_quads, build_from_triangles};

    fn octahedron() -> Bmesh {
        let vertices = vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, -1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(0.0, 0.0, -1.0),
        ];
        let faces = vec![
            [0, 2, 4],
            [2, 1, 4],
            [1, 3, 4],
            [3, 0, 4],
            [2, 0, 5],
            [1, 2, 5],
            [3, 1, 5],
            [0, 3, 5],
        ];
        build_from_triangles(&vertices, &faces).unwrap()
    }

    fn weight_sum(stencil: &Stencil) -> f64 {
        stencil.iter().map(|&(_, w)| w).sum()
    }

    #[test]
    fn test_stencils_are_affine() {
        let mesh = octahedron();
        for rule in [SubdivRule::Loop, SubdivRule::Butterfly, SubdivRule::Hybrid] {
            for v in mesh.vertex_ids() {
                assert!((weight_sum(&rule.vertex_stencil(&mesh, v)) - 1.0).abs() < 1e-12);
            }
            for e in mesh.edge_ids() {
                assert!((weight_sum(&rule.edge_stencil(&mesh, e)) - 1.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_symmetric_mesh_stays_symmetric() {
        let mesh = octahedron();
        // Every vertex has valence 4, so every child lands at the same radius.
        let radii: Vec<f64> = mesh
            .vertex_ids()
            .map(|v| stencil_point(&mesh, &SubdivRule::Loop.vertex_stencil(&mesh, v)).coords.norm())
            .collect();
        for r in &radii {
            assert!((r - radii[0]).abs() < 1e-12);
        }
        assert!(radii[0] < 1.0);
    }

    #[test]
    fn test_linear_colors() {
        let mut mesh = octahedron();
        for v in mesh.vertex_ids().collect::<Vec<_>>() {
            mesh.set_color(v, Some(Vector3::new(v.index() as f64, 0.0, 1.0))).unwrap();
        }
        let e = mesh.lookup_edge(VertexId::new(0), VertexId::new(2)).unwrap();
        let stencil = ColorRule::Linear.edge_stencil(SubdivRule::Loop, &mesh, e);
        let c = stencil_color(&mesh, &stencil).unwrap();
        assert!((c - Vector3::new(1.0, 0.0, 1.0)).norm() < 1e-12);

        mesh.set_color(VertexId::new(2), None).unwrap();
        assert_eq!(stencil_color(&mesh, &stencil), None);
    }

    #[test]
    fn test_rule_parsing() {
        assert_eq!("Loop".parse::<SubdivRule>(), Ok(SubdivRule::Loop));
        assert_eq!("hybrid".parse::<SubdivRule>(), Ok(SubdivRule::Hybrid));
        assert!("sqrt3".parse::<SubdivRule>().is_err());
    }

    #[test]
    fn test_options_builder() {
        let opts = SubdivOptions::new(SubdivRule::Butterfly)
            .with_color_rule(ColorRule::Linear)
            .with_max_level(3)
            .sequential();
        assert_eq!(opts.rule, SubdivRule::Butterfly);
        assert_eq!(opts.color_rule, ColorRule::Linear);
        assert_eq!(opts.max_level, 3);
        assert!(!opts.parallel);
        assert_eq!(SubdivRule::Hybrid.dirty_radius(), 2);
    }

    #[test]
    fn test_flat_grid_stays_flat() {
        let vertices: Vec<Point3<f64>> = (0..9)
            .map(|i| Point3::new((i % 3) as f64, (i / 3) as f64, 0.0))
            .collect();
        let quads = vec![[0, 1, 4, 3], [1, 2, 5, 4], [3, 4, 7, 6], [4, 5, 8, 7]];
        let mesh: Bmesh = build_from_quads(&vertices, &quads).unwrap();
        for rule in [SubdivRule::Loop, SubdivRule::Butterfly, SubdivRule::Hybrid] {
            for e in mesh.edge_ids() {
                let p = stencil_point(&mesh, &rule.edge_stencil(&mesh, e));
                assert!(p.z.abs() < 1e-12);
            }
        }
    }
}
