//! Local geometric queries on faces.
//!
//! Everything here is read-only and answers with `Option` or `bool` rather
//! than an error: a query that has no answer (a ray missing a face, a walk
//! blocked by a silhouette) is an ordinary outcome. A dead face id is a
//! caller bug and panics, except in the two walks.
//!
//! The two walks, [`Bmesh::local_search`] in world space and
//! [`Bmesh::ndc_walk`] in screen space, hop from face to face toward a
//! target. Both terminate because every hop must strictly decrease the
//! squared distance to the target.

use log::debug;
use nalgebra::{Point2, Point3, Vector2, Vector3};

use super::bmesh::Bmesh;
use super::index::{FaceId, MeshIndex, VertexId};
use super::simplex::Simplex;
use super::view::ViewFrame;

/// Barycentric coordinates with a magnitude below this snap to zero.
pub const BC_SNAP: f64 = 1e-10;

/// Result of [`Bmesh::nearest_pt`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestPt {
    /// The closest point on the face.
    pub point: Point3<f64>,
    /// Barycentric coordinates of `point`.
    pub bc: Vector3<f64>,
    /// True if the projection of the query point fell inside the triangle.
    pub on_tri: bool,
}

/// Result of [`Bmesh::local_search`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit<I: MeshIndex = u32> {
    /// The face the search ended on.
    pub face: FaceId<I>,
    /// The closest point on that face.
    pub point: Point3<f64>,
    /// Barycentric coordinates of `point` in `face`.
    pub bc: Vector3<f64>,
    /// True if the query point projects inside `face`.
    pub on_tri: bool,
    /// Squared distance from the query point to `point`.
    pub dist2: f64,
}

/// Closest feature of a triangle to a point, by corner slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Feature {
    Inside,
    Edge(usize),
    Vertex(usize),
}

fn snap_bc(mut bc: Vector3<f64>) -> Vector3<f64> {
    for c in bc.iter_mut() {
        if c.abs() < BC_SNAP {
            *c = 0.0;
        }
    }
    let sum = bc.sum();
    if sum != 0.0 {
        bc /= sum;
    }
    bc
}

fn closest_on_segment3(a: &Point3<f64>, b: &Point3<f64>, p: &Point3<f64>) -> f64 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 == 0.0 {
        return 0.0;
    }
    ((p - a).dot(&ab) / len2).clamp(0.0, 1.0)
}

fn closest_on_segment2(a: &Point2<f64>, b: &Point2<f64>, p: &Point2<f64>) -> f64 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 == 0.0 {
        return 0.0;
    }
    ((p - a).dot(&ab) / len2).clamp(0.0, 1.0)
}

fn cross2(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Nearest feature of a 2D triangle to `t`, with the squared distance.
fn nearest_feature2(q: &[Point2<f64>; 3], t: &Point2<f64>) -> (Feature, f64) {
    let area = cross2(&(q[1] - q[0]), &(q[2] - q[0]));
    if area != 0.0 {
        let inside = (0..3).all(|i| {
            let (a, b) = (q[i], q[(i + 1) % 3]);
            cross2(&(b - a), &(t - a)) * area.signum() >= 0.0
        });
        if inside {
            return (Feature::Inside, 0.0);
        }
    }

    let mut best = (Feature::Vertex(0), f64::INFINITY);
    for i in 0..3 {
        let (a, b) = (q[i], q[(i + 1) % 3]);
        let s = closest_on_segment2(&a, &b, t);
        let d2 = (a + (b - a) * s - t).norm_squared();
        if d2 < best.1 {
            let feature = if s <= 0.0 {
                Feature::Vertex(i)
            } else if s >= 1.0 {
                Feature::Vertex((i + 1) % 3)
            } else {
                Feature::Edge(i)
            };
            best = (feature, d2);
        }
    }
    best
}

impl<I: MeshIndex> Bmesh<I> {
    /// Barycentric coordinates of the projection of `p` onto the plane of `f`.
    ///
    /// Degenerate faces report the centroid.
    ///
    /// # Panics
    /// Panics if `f` is not a live face.
    pub fn project_barycentric(&self, f: FaceId<I>, p: &Point3<f64>) -> Vector3<f64> {
        let [a, b, c] = self.face_positions(f);
        let v0 = b - a;
        let v1 = c - a;
        let v2 = p - a;
        let d00 = v0.dot(&v0);
        let d01 = v0.dot(&v1);
        let d11 = v1.dot(&v1);
        let d20 = v2.dot(&v0);
        let d21 = v2.dot(&v1);
        let denom = d00 * d11 - d01 * d01;
        if denom.abs() < f64::EPSILON * (d00 * d11).max(f64::MIN_POSITIVE) {
            return Vector3::repeat(1.0 / 3.0);
        }
        let v = (d11 * d20 - d01 * d21) / denom;
        let w = (d00 * d21 - d01 * d20) / denom;
        Vector3::new(1.0 - v - w, v, w)
    }

    /// The point of `f` with barycentric coordinates `bc`.
    ///
    /// # Panics
    /// Panics if `f` is not a live face.
    pub fn bc_to_point(&self, f: FaceId<I>, bc: &Vector3<f64>) -> Point3<f64> {
        let [a, b, c] = self.face_positions(f);
        Point3::from(a.coords * bc.x + b.coords * bc.y + c.coords * bc.z)
    }

    /// The point of `f` closest to `p`.
    ///
    /// If the projection of `p` falls outside the triangle, the closest point
    /// on the nearest edge is returned with `on_tri == false`. Equal edge
    /// distances resolve to the first edge in `e1`, `e2`, `e3` order.
    ///
    /// # Panics
    /// Panics if `f` is not a live face.
    ///
    /// # Example
    /// ```
    /// use jot::mesh::{build_from_triangles, Bmesh, FaceId};
    /// use nalgebra::Point3;
    ///
    /// let vertices = vec![
    ///     Point3::new(0.0, 0.0, 0.0),
    ///     Point3::new(1.0, 0.0, 0.0),
    ///     Point3::new(0.0, 1.0, 0.0),
    /// ];
    /// let mesh: Bmesh = build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap();
    ///
    /// let near = mesh.nearest_pt(FaceId::new(0), &Point3::new(0.25, 0.25, 3.0));
    /// assert!(near.on_tri);
    /// assert!((near.point - Point3::new(0.25, 0.25, 0.0)).norm() < 1e-12);
    /// ```
    pub fn nearest_pt(&self, f: FaceId<I>, p: &Point3<f64>) -> NearestPt {
        let bc = snap_bc(self.project_barycentric(f, p));
        if bc.iter().all(|&c| c >= 0.0) {
            return NearestPt {
                point: self.bc_to_point(f, &bc),
                bc,
                on_tri: true,
            };
        }

        let corners = self.face_positions(f);
        let mut best = NearestPt {
            point: corners[0],
            bc: Vector3::x(),
            on_tri: false,
        };
        let mut best_d2 = f64::INFINITY;
        for i in 0..3 {
            let j = (i + 1) % 3;
            let t = closest_on_segment3(&corners[i], &corners[j], p);
            let q = corners[i] + (corners[j] - corners[i]) * t;
            let d2 = (q - p).norm_squared();
            if d2 < best_d2 {
                let mut bc = Vector3::zeros();
                bc[i] = 1.0 - t;
                bc[j] = t;
                best = NearestPt {
                    point: q,
                    bc,
                    on_tri: false,
                };
                best_d2 = d2;
            }
        }
        best
    }

    /// Intersect the ray `p + t·d`, `t >= 0`, with `f`.
    ///
    /// Returns the hit point and `t`. The inside test is not symmetric: a hit
    /// exactly on the edge `v3`-`v1` counts, hits exactly on the other two
    /// edges do not.
    ///
    /// # Panics
    /// Panics if `f` is not a live face.
    pub fn ray_intersect(&self, f: FaceId<I>, p: &Point3<f64>, d: &Vector3<f64>) -> Option<(Point3<f64>, f64)> {
        let [a, b, c] = self.face_positions(f);
        let n = self.face_norm(f);
        let denom = n.dot(d);
        if denom == 0.0 {
            return None;
        }
        let t = n.dot(&(a - p)) / denom;
        if t < 0.0 {
            return None;
        }
        let hit = p + d * t;

        let da = hit - a;
        let db = hit - b;
        let ba = b - a;
        let inside = da.cross(&ba).dot(&da.cross(&(c - a))) <= 0.0
            && db.cross(&ba).dot(&db.cross(&(c - b))) > 0.0;
        inside.then_some((hit, t))
    }

    /// Intersect the line `p + t·d` with the plane of `f`.
    ///
    /// # Panics
    /// Panics if `f` is not a live face.
    pub fn plane_intersect(&self, f: FaceId<I>, p: &Point3<f64>, d: &Vector3<f64>) -> Option<Point3<f64>> {
        let n = self.face_norm(f);
        let denom = n.dot(d);
        if denom.abs() < f64::EPSILON {
            return None;
        }
        let a = self.position(self.face(f).verts[0]);
        let t = n.dot(&(a - p)) / denom;
        Some(p + d * t)
    }

    /// True if `pt`, taken in the plane of `f`, lies inside the triangle or
    /// within `threshold` of its edges.
    ///
    /// # Panics
    /// Panics if `f` is not a live face.
    pub fn contains(&self, f: FaceId<I>, pt: &Point3<f64>, threshold: f64) -> bool {
        let n = self.face_norm(f);
        if n == Vector3::zeros() {
            return false;
        }
        let corners = self.face_positions(f);
        (0..3).all(|i| {
            let (a, b) = (corners[i], corners[(i + 1) % 3]);
            let ab = b - a;
            let len = ab.norm();
            if len == 0.0 {
                return true;
            }
            ab.cross(&(pt - a)).dot(&n) / len >= -threshold
        })
    }

    /// Normal at corner `v` of `f` for smooth shading across non-crease edges.
    ///
    /// Averages the normals of the faces around `v` reachable from `f`
    /// without crossing a crease or border. Each direction visits at most
    /// `degree(v)` faces.
    ///
    /// # Panics
    /// Panics if `f` is not a live face.
    pub fn vert_normal(&self, f: FaceId<I>, v: VertexId<I>) -> Vector3<f64> {
        let n0 = self.face_norm(f);
        if !self.face(f).contains_vert(v) {
            return n0;
        }
        let degree = self.vertex(v).degree();
        let mut sum = n0;
        let mut seen: Vec<FaceId<I>> = vec![f];

        for forward in [true, false] {
            let mut cur = f;
            for _ in 0..degree {
                let face = self.face(cur);
                let w = if forward { face.next_vert(v) } else { face.prev_vert(v) };
                let Some(e) = w.and_then(|w| self.lookup_edge(v, w)) else {
                    break;
                };
                let edge = self.edge(e);
                if edge.is_crease() || edge.nfaces() != 2 {
                    break;
                }
                let Some(next) = edge.other_face(cur) else { break };
                if next == f {
                    // Went all the way round
                    return sum.try_normalize(0.0).unwrap_or(n0);
                }
                if seen.contains(&next) {
                    break;
                }
                seen.push(next);
                sum += self.face_norm(next);
                cur = next;
            }
        }
        sum.try_normalize(0.0).unwrap_or(n0)
    }

    /// Walk from `f` toward the surface point nearest `p`.
    ///
    /// At each face the nearest feature (edge or vertex) is crossed if a face
    /// beyond it is strictly closer. The walk stops on a face containing the
    /// projection of `p`, when no neighbour is closer, when it would cross
    /// back over the feature it just came through, or after `iters` hops. In
    /// every case the closest hit found is returned; `None` only for a dead
    /// start face.
    pub fn local_search(&self, f: FaceId<I>, p: &Point3<f64>, iters: usize) -> Option<SearchHit<I>> {
        self.get_face(f)?;
        Some(self.local_search_from(f, p, None, iters))
    }

    fn hit_for(&self, f: FaceId<I>, p: &Point3<f64>) -> SearchHit<I> {
        let near = self.nearest_pt(f, p);
        SearchHit {
            face: f,
            point: near.point,
            bc: near.bc,
            on_tri: near.on_tri,
            dist2: (near.point - p).norm_squared(),
        }
    }

    fn local_search_from(
        &self,
        f: FaceId<I>,
        p: &Point3<f64>,
        repeater: Option<Simplex<I>>,
        iters: usize,
    ) -> SearchHit<I> {
        let hit = self.hit_for(f, p);
        if hit.on_tri {
            return hit;
        }
        if iters == 0 {
            debug!("local_search: depth limit reached at {:?}", f);
            return hit;
        }

        let face = self.face(f);
        let nonzero: Vec<usize> = (0..3).filter(|&i| hit.bc[i] != 0.0).collect();
        let feature = match nonzero.as_slice() {
            [i] => Simplex::Vertex(face.verts[*i]),
            [i, j] => {
                // Edge slot k joins verts[k] and verts[k + 1]
                let k = if (i + 1) % 3 == *j { *i } else { *j };
                Simplex::Edge(face.edges[k])
            }
            _ => return hit,
        };
        if repeater == Some(feature) {
            return hit;
        }

        let candidates: Vec<FaceId<I>> = match feature {
            Simplex::Edge(e) => self.edge(e).faces().filter(|&g| g != f).collect(),
            Simplex::Vertex(v) => self
                .vertex_primary_faces(v)
                .into_iter()
                .filter(|&g| g != f)
                .collect(),
            Simplex::Face(_) => Vec::new(),
        };

        let next = candidates
            .into_iter()
            .map(|g| self.hit_for(g, p))
            .filter(|h| h.dist2 < hit.dist2)
            .min_by(|a, b| a.dist2.total_cmp(&b.dist2));

        match next {
            Some(n) => {
                let deeper = self.local_search_from(n.face, p, Some(feature), iters - 1);
                if deeper.dist2 <= n.dist2 {
                    deeper
                } else {
                    n
                }
            }
            None => hit,
        }
    }

    fn face_ndc(&self, f: FaceId<I>, view: &dyn ViewFrame) -> [Point2<f64>; 3] {
        self.face_positions(f).map(|p| view.to_ndc(&p))
    }

    fn front_facing(&self, f: FaceId<I>, view: &dyn ViewFrame) -> bool {
        view.is_front_facing(&self.face_centroid(f), &self.face_norm(f))
    }

    /// Walk across the mesh in screen space from `f` to the face under the
    /// NDC point `target`.
    ///
    /// Returns `None` if the walk is blocked: by a border, by an edge whose
    /// faces differ in facing (a silhouette), or because no neighbour is
    /// strictly closer to `target` on screen.
    pub fn ndc_walk(&self, f: FaceId<I>, target: &Point2<f64>, view: &dyn ViewFrame) -> Option<FaceId<I>> {
        self.ndc_walk_traced(f, target, view).0
    }

    /// [`ndc_walk`](Self::ndc_walk), also returning the screen-space squared
    /// distance of every face visited.
    pub fn ndc_walk_traced(
        &self,
        f: FaceId<I>,
        target: &Point2<f64>,
        view: &dyn ViewFrame,
    ) -> (Option<FaceId<I>>, Vec<f64>) {
        let mut trace = Vec::new();
        if self.get_face(f).is_none() {
            return (None, trace);
        }

        let mut cur = f;
        let mut last = f64::INFINITY;
        loop {
            let (feature, d2) = nearest_feature2(&self.face_ndc(cur, view), target);
            if d2 >= last {
                debug!("ndc_walk: no progress at {:?}", cur);
                return (None, trace);
            }
            trace.push(d2);
            last = d2;

            let face = self.face(cur);
            let candidates: Vec<FaceId<I>> = match feature {
                Feature::Inside => return (Some(cur), trace),
                Feature::Edge(i) => match self.edge(face.edges[i]).other_face(cur) {
                    Some(g) => vec![g],
                    None => return (None, trace),
                },
                Feature::Vertex(i) => self
                    .vertex_primary_faces(face.verts[i])
                    .into_iter()
                    .filter(|&g| g != cur)
                    .collect(),
            };

            let facing = self.front_facing(cur, view);
            let next = candidates
                .into_iter()
                .filter(|&g| self.front_facing(g, view) == facing)
                .map(|g| (g, nearest_feature2(&self.face_ndc(g, view), target).1))
                .min_by(|a, b| a.1.total_cmp(&b.1));

            match next {
                Some((g, _)) => cur = g,
                None => return (None, trace),
            }
        }
    }
}
