//! The projection a mesh needs from a camera.
//!
//! Screen-space walks and silhouette extraction only need to map world
//! points to normalized device coordinates and to ask whether a surface
//! normal faces the viewer. [`ViewFrame`] is that narrow interface;
//! [`OrthoView`] is a self-contained implementation for tools and tests.

use nalgebra::{Point2, Point3, Unit, Vector3};

/// World to screen mapping used by [`ndc_walk`](super::Bmesh::ndc_walk) and
/// [`sil_strip`](super::Bmesh::sil_strip).
pub trait ViewFrame {
    /// Map a world point to normalized device coordinates.
    fn to_ndc(&self, p: &Point3<f64>) -> Point2<f64>;

    /// True if a surface at `p` with normal `n` faces the viewer.
    fn is_front_facing(&self, p: &Point3<f64>, n: &Vector3<f64>) -> bool;
}

/// An orthographic camera.
#[derive(Debug, Clone, Copy)]
pub struct OrthoView {
    target: Point3<f64>,
    right: Unit<Vector3<f64>>,
    up: Unit<Vector3<f64>>,
    toward_eye: Unit<Vector3<f64>>,
    half_width: f64,
}

impl OrthoView {
    /// Look from `eye` at `target`. `half_width` world units map to NDC 1.
    ///
    /// Returns `None` if `eye == target`, `up` is parallel to the view
    /// direction, or `half_width` is not positive.
    pub fn new(eye: Point3<f64>, target: Point3<f64>, up: Vector3<f64>, half_width: f64) -> Option<Self> {
        if half_width <= 0.0 {
            return None;
        }
        let toward_eye = Unit::try_new(eye - target, 1e-12)?;
        let right = Unit::try_new(up.cross(&toward_eye), 1e-12)?;
        let up = Unit::new_normalize(toward_eye.cross(&right));
        Some(Self {
            target,
            right,
            up,
            toward_eye,
            half_width,
        })
    }

    /// Looking down the -Z axis at the origin with Y up.
    pub fn top_down(half_width: f64) -> Self {
        Self {
            target: Point3::origin(),
            right: Vector3::x_axis(),
            up: Vector3::y_axis(),
            toward_eye: Vector3::z_axis(),
            half_width: half_width.abs().max(f64::EPSILON),
        }
    }

    /// Unit vector from the scene toward the viewer.
    pub fn toward_eye(&self) -> Vector3<f64> {
        self.toward_eye.into_inner()
    }
}

impl ViewFrame for OrthoView {
    fn to_ndc(&self, p: &Point3<f64>) -> Point2<f64> {
        let d = p - self.target;
        Point2::new(d.dot(&self.right) / self.half_width, d.dot(&self.up) / self.half_width)
    }

    fn is_front_facing(&self, _p: &Point3<f64>, n: &Vector3<f64>) -> bool {
        n.dot(&self.toward_eye) > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_down() {
        let view = OrthoView::top_down(2.0);
        let q = view.to_ndc(&Point3::new(1.0, -2.0, 5.0));
        assert!((q - Point2::new(0.5, -1.0)).norm() < 1e-12);
        assert!(view.is_front_facing(&Point3::origin(), &Vector3::z()));
        assert!(!view.is_front_facing(&Point3::origin(), &-Vector3::z()));
    }

    #[test]
    fn test_side_view_matches_top_down_basis() {
        let view = OrthoView::new(
            Point3::new(0.0, 0.0, 3.0),
            Point3::origin(),
            Vector3::y(),
            1.0,
        )
        .unwrap();
        let p = Point3::new(0.25, 0.5, -7.0);
        let q = view.to_ndc(&p);
        assert!((q - Point2::new(0.25, 0.5)).norm() < 1e-12);
    }

    #[test]
    fn test_degenerate_views() {
        assert!(OrthoView::new(Point3::origin(), Point3::origin(), Vector3::y(), 1.0).is_none());
        assert!(OrthoView::new(Point3::new(0.0, 1.0, 0.0), Point3::origin(), Vector3::y(), 1.0).is_none());
        assert!(OrthoView::new(Point3::new(0.0, 0.0, 1.0), Point3::origin(), Vector3::y(), 0.0).is_none());
    }
}
