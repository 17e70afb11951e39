//! Homogeneous 2D coordinate systems.
//!
//! A coordinate system is a 3x3 matrix mapping local coordinates to world
//! coordinates: the first two columns hold the x and y axes, the third holds
//! the origin. Rigid systems have unit axes; scaled systems use the length of
//! the defining segment as the unit.

use nalgebra::{Matrix3, Vector3};

use super::vector::{Vec2, perp};
use crate::tolerance::tol_zero;

fn hcs_from_axis(origin: &Vec2, x_axis: &Vec2) -> Matrix3<f64> {
    let y_axis = perp(x_axis);
    #[rustfmt::skip]
    let m = Matrix3::new(
        x_axis.x, y_axis.x, origin.x,
        x_axis.y, y_axis.y, origin.y,
        0.0,      0.0,      1.0,
    );
    m
}

/// Rigid coordinate system with its origin at `origin` and x axis pointing at
/// `x_point`. Returns None when the two points coincide.
pub fn make_hcs(origin: &Vec2, x_point: &Vec2) -> Option<Matrix3<f64>> {
    let dir = x_point - origin;
    let len = dir.norm();
    if tol_zero(len) {
        return None;
    }
    Some(hcs_from_axis(origin, &(dir / len)))
}

/// Similarity coordinate system where `x_point` has local coordinates (1, 0).
/// Returns None when the two points coincide.
pub fn make_hcs_scaled(origin: &Vec2, x_point: &Vec2) -> Option<Matrix3<f64>> {
    let dir = x_point - origin;
    if tol_zero(dir.norm()) {
        return None;
    }
    Some(hcs_from_axis(origin, &dir))
}

/// Transform that re-expresses points given relative to `from` relative to `to`.
///
/// A point at local coordinates `l` in `from` is mapped to the point with the
/// same local coordinates in `to`, i.e. the result is `to * from⁻¹`.
pub fn cs_transform(from: &Matrix3<f64>, to: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    from.try_inverse().map(|inv| to * inv)
}

/// A pure translation.
pub fn translation(offset: &Vec2) -> Matrix3<f64> {
    hcs_from_axis(offset, &Vec2::new(1.0, 0.0))
}

/// Apply a homogeneous transform to a point.
pub fn transform_point(t: &Matrix3<f64>, p: &Vec2) -> Vec2 {
    let h = t * Vector3::new(p.x, p.y, 1.0);
    Vec2::new(h.x / h.z, h.y / h.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_make_hcs_maps_unit_x() {
        let cs = make_hcs(&Vec2::new(1.0, 1.0), &Vec2::new(1.0, 5.0)).unwrap();
        let p = transform_point(&cs, &Vec2::new(1.0, 0.0));
        assert_relative_eq!(p, Vec2::new(1.0, 2.0), epsilon = 1e-12);
        // y axis is a quarter turn counter-clockwise from the x axis
        let q = transform_point(&cs, &Vec2::new(0.0, 1.0));
        assert_relative_eq!(q, Vec2::new(0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_scaled_hcs_maps_x_point() {
        let cs = make_hcs_scaled(&Vec2::zeros(), &Vec2::new(0.0, 3.0)).unwrap();
        let p = transform_point(&cs, &Vec2::new(1.0, 0.0));
        assert_relative_eq!(p, Vec2::new(0.0, 3.0), epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_hcs() {
        assert!(make_hcs(&Vec2::zeros(), &Vec2::new(0.0, 1e-9)).is_none());
        assert!(make_hcs_scaled(&Vec2::new(2.0, 2.0), &Vec2::new(2.0, 2.0)).is_none());
    }

    #[test]
    fn test_cs_transform_aligns_segments() {
        let from = make_hcs(&Vec2::new(0.0, 0.0), &Vec2::new(1.0, 0.0)).unwrap();
        let to = make_hcs(&Vec2::new(5.0, 5.0), &Vec2::new(5.0, 6.0)).unwrap();
        let t = cs_transform(&from, &to).unwrap();
        assert_relative_eq!(transform_point(&t, &Vec2::zeros()), Vec2::new(5.0, 5.0), epsilon = 1e-12);
        assert_relative_eq!(
            transform_point(&t, &Vec2::new(2.0, 0.0)),
            Vec2::new(5.0, 7.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_translation() {
        let t = translation(&Vec2::new(3.0, -1.0));
        assert_relative_eq!(transform_point(&t, &Vec2::new(1.0, 1.0)), Vec2::new(4.0, 0.0), epsilon = 1e-12);
    }
}
