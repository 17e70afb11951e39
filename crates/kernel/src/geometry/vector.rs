use nalgebra::Vector2;
use std::f64::consts::{FRAC_PI_2, PI};

use crate::tolerance::{tol_gt, tol_lt, tol_zero};

/// A point or direction in the plane.
pub type Vec2 = Vector2<f64>;

/// The vector rotated a quarter turn counter-clockwise.
pub fn perp(v: &Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

/// The z component of the 3D cross product of two planar vectors.
pub fn cross(a: &Vec2, b: &Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Rotate `v` counter-clockwise by `angle` radians about the origin.
pub fn rotate(v: &Vec2, angle: f64) -> Vec2 {
    let (s, c) = angle.sin_cos();
    Vec2::new(c * v.x - s * v.y, s * v.x + c * v.y)
}

pub fn distance(a: &Vec2, b: &Vec2) -> f64 {
    (b - a).norm()
}

/// Signed angle at `p2`, rotating the ray `p2→p1` onto the ray `p2→p3`.
///
/// Counter-clockwise is positive; the result lies in (-π, π]. Returns 0 when
/// either ray has zero length.
pub fn angle_3p(p1: &Vec2, p2: &Vec2, p3: &Vec2) -> f64 {
    let a = p1 - p2;
    let b = p3 - p2;
    if tol_zero(a.norm()) || tol_zero(b.norm()) {
        return 0.0;
    }
    let angle = cross(&a, &b).atan2(a.dot(&b));
    if angle <= -PI { angle + 2.0 * PI } else { angle }
}

/// Twice the signed area of the triangle (positive when counter-clockwise).
fn signed_area2(p1: &Vec2, p2: &Vec2, p3: &Vec2) -> f64 {
    cross(&(p2 - p1), &(p3 - p1))
}

pub fn is_clockwise(p1: &Vec2, p2: &Vec2, p3: &Vec2) -> bool {
    tol_lt(signed_area2(p1, p2, p3), 0.0)
}

pub fn is_counterclockwise(p1: &Vec2, p2: &Vec2, p3: &Vec2) -> bool {
    tol_gt(signed_area2(p1, p2, p3), 0.0)
}

pub fn is_colinear(p1: &Vec2, p2: &Vec2, p3: &Vec2) -> bool {
    !is_clockwise(p1, p2, p3) && !is_counterclockwise(p1, p2, p3)
}

/// True when the unsigned angle at `p2` is smaller than a right angle.
pub fn is_acute(p1: &Vec2, p2: &Vec2, p3: &Vec2) -> bool {
    tol_lt(angle_3p(p1, p2, p3).abs(), FRAC_PI_2)
}

/// True when the unsigned angle at `p2` is larger than a right angle.
pub fn is_obtuse(p1: &Vec2, p2: &Vec2, p3: &Vec2) -> bool {
    tol_gt(angle_3p(p1, p2, p3).abs(), FRAC_PI_2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rotate_quarter_turn() {
        let v = rotate(&Vec2::new(1.0, 0.0), FRAC_PI_2);
        assert_relative_eq!(v.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(v.y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(perp(&Vec2::new(1.0, 0.0)), v, epsilon = 1e-12);
    }

    #[test]
    fn test_angle_3p_sign() {
        let o = Vec2::zeros();
        let x = Vec2::new(1.0, 0.0);
        let y = Vec2::new(0.0, 1.0);
        assert_relative_eq!(angle_3p(&x, &o, &y), FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(angle_3p(&y, &o, &x), -FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(angle_3p(&x, &o, &-x), PI, epsilon = 1e-12);
        assert_eq!(angle_3p(&o, &o, &x), 0.0);
    }

    #[test]
    fn test_orientation_predicates() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(1.0, 0.0);
        let c = Vec2::new(0.0, 1.0);
        assert!(is_counterclockwise(&a, &b, &c));
        assert!(is_clockwise(&a, &c, &b));
        assert!(is_colinear(&a, &b, &Vec2::new(2.0, 0.0)));
    }

    #[test]
    fn test_acute_obtuse() {
        let o = Vec2::zeros();
        let x = Vec2::new(1.0, 0.0);
        assert!(is_acute(&x, &o, &Vec2::new(1.0, 1.0)));
        assert!(is_obtuse(&x, &o, &Vec2::new(-1.0, 1.0)));
        let right = Vec2::new(0.0, 1.0);
        assert!(!is_acute(&x, &o, &right));
        assert!(!is_obtuse(&x, &o, &right));
    }
}
