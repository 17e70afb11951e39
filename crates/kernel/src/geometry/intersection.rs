//! Planar intersections of circles, lines and rays.
//!
//! Every function returns the (possibly empty) list of intersection points.
//! Tangent configurations collapse to a single point within tolerance.

use super::vector::{Vec2, cross, perp};
use crate::tolerance::{tol_eq, tol_ge, tol_gt, tol_lt, tol_zero};

// ─── Circle-Circle ───────────────────────────────────────────────────────────

/// Intersect circle (`c1`, `r1`) with circle (`c2`, `r2`).
///
/// Concentric circles yield no points, even when they coincide. When two
/// points exist, the first one lies on the counter-clockwise side of the
/// directed centre line `c1→c2`.
pub fn cc_int(c1: &Vec2, r1: f64, c2: &Vec2, r2: f64) -> Vec<Vec2> {
    let d_vec = c2 - c1;
    let d = d_vec.norm();
    if tol_zero(d) {
        return vec![];
    }
    if tol_gt(d, r1 + r2) || tol_lt(d, (r1 - r2).abs()) {
        return vec![];
    }

    let u = d_vec / d;
    let a = (r1 * r1 - r2 * r2 + d * d) / (2.0 * d);
    let h2 = r1 * r1 - a * a;
    let base = c1 + u * a;
    if h2 <= 0.0 || tol_zero(h2.sqrt()) {
        return vec![base];
    }
    let h = h2.sqrt();
    vec![base + perp(&u) * h, base - perp(&u) * h]
}

// ─── Circle-Line / Circle-Ray ────────────────────────────────────────────────

/// Parameters `t` where `origin + t * dir` lies on the circle, ascending.
fn circle_line_params(center: &Vec2, radius: f64, origin: &Vec2, dir: &Vec2) -> Vec<f64> {
    let a = dir.dot(dir);
    if tol_zero(a) {
        return vec![];
    }
    let oc = origin - center;
    let b = 2.0 * dir.dot(&oc);
    let c = oc.dot(&oc) - radius * radius;
    let disc = b * b - 4.0 * a * c;

    // Compare the half-chord length rather than the raw discriminant so the
    // tangent test is expressed in distance units.
    let half_chord_sq = disc / (4.0 * a);
    if half_chord_sq < 0.0 && !tol_zero((-half_chord_sq).sqrt()) {
        return vec![];
    }
    if half_chord_sq <= 0.0 || tol_zero(half_chord_sq.sqrt()) {
        return vec![-b / (2.0 * a)];
    }
    let sqrt_disc = disc.sqrt();
    vec![(-b - sqrt_disc) / (2.0 * a), (-b + sqrt_disc) / (2.0 * a)]
}

/// Intersect a circle with the infinite line through `p1` and `p2`.
pub fn cl_int(center: &Vec2, radius: f64, p1: &Vec2, p2: &Vec2) -> Vec<Vec2> {
    let dir = p2 - p1;
    circle_line_params(center, radius, p1, &dir)
        .into_iter()
        .map(|t| p1 + dir * t)
        .collect()
}

/// Intersect a circle with the ray starting at `origin` in direction `dir`.
///
/// Points are ordered by increasing distance from the ray origin.
pub fn cr_int(center: &Vec2, radius: f64, origin: &Vec2, dir: &Vec2) -> Vec<Vec2> {
    let len = dir.norm();
    circle_line_params(center, radius, origin, dir)
        .into_iter()
        .filter(|t| tol_ge(t * len, 0.0))
        .map(|t| origin + dir * t.max(0.0))
        .collect()
}

// ─── Line-Line / Ray-Ray ─────────────────────────────────────────────────────

/// Solve `o1 + s * d1 = o2 + t * d2`. Returns None for parallel directions.
fn line_params(o1: &Vec2, d1: &Vec2, o2: &Vec2, d2: &Vec2) -> Option<(f64, f64)> {
    let denom = cross(d1, d2);
    let scale = d1.norm() * d2.norm();
    if tol_zero(scale) || tol_zero(denom / scale) {
        return None;
    }
    let w = o2 - o1;
    let s = cross(&w, d2) / denom;
    let t = cross(&w, d1) / denom;
    Some((s, t))
}

/// Intersect the line through `p1`,`p2` with the line through `p3`,`p4`.
pub fn ll_int(p1: &Vec2, p2: &Vec2, p3: &Vec2, p4: &Vec2) -> Vec<Vec2> {
    let d1 = p2 - p1;
    let d2 = p4 - p3;
    match line_params(p1, &d1, p3, &d2) {
        Some((s, _)) => vec![p1 + d1 * s],
        None => vec![],
    }
}

/// Intersect two rays given by origin and direction.
pub fn rr_int(o1: &Vec2, d1: &Vec2, o2: &Vec2, d2: &Vec2) -> Vec<Vec2> {
    match line_params(o1, d1, o2, d2) {
        Some((s, t)) if tol_ge(s * d1.norm(), 0.0) && tol_ge(t * d2.norm(), 0.0) => {
            vec![o1 + d1 * s.max(0.0)]
        }
        _ => vec![],
    }
}

/// True when `p` lies on the circle (`center`, `radius`).
pub fn on_circle(p: &Vec2, center: &Vec2, radius: f64) -> bool {
    tol_eq((p - center).norm(), radius)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cc_int_two_points() {
        let hits = cc_int(&Vec2::zeros(), 5.0, &Vec2::new(8.0, 0.0), 5.0);
        assert_eq!(hits.len(), 2);
        assert_relative_eq!(hits[0], Vec2::new(4.0, 3.0), epsilon = 1e-9);
        assert_relative_eq!(hits[1], Vec2::new(4.0, -3.0), epsilon = 1e-9);
    }

    #[test]
    fn test_cc_int_tangent_and_disjoint() {
        let tangent = cc_int(&Vec2::zeros(), 1.0, &Vec2::new(2.0, 0.0), 1.0);
        assert_eq!(tangent.len(), 1);
        assert_relative_eq!(tangent[0], Vec2::new(1.0, 0.0), epsilon = 1e-9);

        assert!(cc_int(&Vec2::zeros(), 1.0, &Vec2::new(3.0, 0.0), 1.0).is_empty());
        assert!(cc_int(&Vec2::zeros(), 5.0, &Vec2::new(1.0, 0.0), 1.0).is_empty());
        assert!(cc_int(&Vec2::zeros(), 1.0, &Vec2::zeros(), 1.0).is_empty());
    }

    #[test]
    fn test_cl_int() {
        let hits = cl_int(&Vec2::zeros(), 1.0, &Vec2::new(-5.0, 0.0), &Vec2::new(5.0, 0.0));
        assert_eq!(hits.len(), 2);
        assert_relative_eq!(hits[0], Vec2::new(-1.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(hits[1], Vec2::new(1.0, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn test_cr_int_keeps_forward_points() {
        let hits = cr_int(&Vec2::zeros(), 1.0, &Vec2::zeros(), &Vec2::new(1.0, 0.0));
        assert_eq!(hits.len(), 1);
        assert_relative_eq!(hits[0], Vec2::new(1.0, 0.0), epsilon = 1e-9);

        let both = cr_int(&Vec2::new(5.0, 0.0), 1.0, &Vec2::zeros(), &Vec2::new(1.0, 0.0));
        assert_eq!(both.len(), 2);
        assert_relative_eq!(both[0].x, 4.0, epsilon = 1e-9);
        assert_relative_eq!(both[1].x, 6.0, epsilon = 1e-9);

        assert!(cr_int(&Vec2::new(-5.0, 0.0), 1.0, &Vec2::zeros(), &Vec2::new(1.0, 0.0)).is_empty());
    }

    #[test]
    fn test_ll_int_and_parallel() {
        let hit = ll_int(
            &Vec2::new(0.0, 0.0),
            &Vec2::new(1.0, 1.0),
            &Vec2::new(0.0, 2.0),
            &Vec2::new(1.0, 1.0),
        );
        assert_eq!(hit.len(), 1);
        assert_relative_eq!(hit[0], Vec2::new(1.0, 1.0), epsilon = 1e-9);

        let parallel = ll_int(
            &Vec2::new(0.0, 0.0),
            &Vec2::new(1.0, 0.0),
            &Vec2::new(0.0, 1.0),
            &Vec2::new(1.0, 1.0),
        );
        assert!(parallel.is_empty());
    }

    #[test]
    fn test_rr_int_direction_matters() {
        let hit = rr_int(
            &Vec2::zeros(),
            &Vec2::new(1.0, 1.0),
            &Vec2::new(2.0, 0.0),
            &Vec2::new(-1.0, 1.0),
        );
        assert_eq!(hit.len(), 1);
        assert_relative_eq!(hit[0], Vec2::new(1.0, 1.0), epsilon = 1e-9);

        let diverging = rr_int(
            &Vec2::zeros(),
            &Vec2::new(-1.0, -1.0),
            &Vec2::new(2.0, 0.0),
            &Vec2::new(-1.0, 1.0),
        );
        assert!(diverging.is_empty());
    }

    #[test]
    fn test_on_circle() {
        assert!(on_circle(&Vec2::new(0.0, 2.0), &Vec2::zeros(), 2.0));
        assert!(!on_circle(&Vec2::new(0.0, 2.1), &Vec2::zeros(), 2.0));
    }
}
