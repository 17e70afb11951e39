//! Property-based tests for geometry kernel invariants using the `proptest` crate.

use proptest::prelude::*;

use geo_kernel::geometry::intersection::{cc_int, on_circle};
use geo_kernel::geometry::transform::{make_hcs, transform_point, translation};
use geo_kernel::geometry::vector::{Vec2, cross, rotate};
use geo_kernel::{Configuration, solve_ddd, tol_eq, tol_le};

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

/// Arbitrary 2D coordinate in a range where an absolute tolerance is meaningful.
fn arb_point() -> impl Strategy<Value = (f64, f64)> {
    (-100.0f64..100.0, -100.0f64..100.0)
}

fn arb_angle() -> impl Strategy<Value = f64> {
    -std::f64::consts::PI..std::f64::consts::PI
}

fn arb_length() -> impl Strategy<Value = f64> {
    0.5f64..50.0
}

fn triangle_conf(a: Vec2, b: Vec2, c: Vec2) -> Configuration<&'static str> {
    [("a", a), ("b", b), ("c", c)].into_iter().collect()
}

// ---------------------------------------------------------------------------
// 1. Tolerance comparisons are reflexive and consistent
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn tolerance_eq_reflexive_and_le(x in -1e6f64..1e6, dx in -1e-7f64..1e-7) {
        prop_assert!(tol_eq(x, x));
        prop_assert!(tol_eq(x, x + dx));
        prop_assert!(tol_le(x, x + dx));
        prop_assert!(tol_le(x + dx, x));
    }
}

// ---------------------------------------------------------------------------
// 2. Circle-circle intersections lie on both circles
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn cc_int_points_on_both_circles(
        (ax, ay) in arb_point(),
        (bx, by) in arb_point(),
        r1 in arb_length(),
        r2 in arb_length(),
    ) {
        let c1 = Vec2::new(ax, ay);
        let c2 = Vec2::new(bx, by);
        for p in cc_int(&c1, r1, &c2, r2) {
            // tangent solutions are only accurate to the square root of the tolerance
            prop_assert!(((p - c1).norm() - r1).abs() < 1e-2);
            prop_assert!(((p - c2).norm() - r2).abs() < 1e-2);
        }
    }
}

// ---------------------------------------------------------------------------
// 3. Side lengths recovered from a solved triangle
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn solve_ddd_reproduces_distances(
        (ax, ay) in arb_point(),
        (bx, by) in arb_point(),
        (cx, cy) in arb_point(),
    ) {
        let (a, b, c) = (Vec2::new(ax, ay), Vec2::new(bx, by), Vec2::new(cx, cy));
        let d_ab = (b - a).norm();
        let d_bc = (c - b).norm();
        let d_ca = (a - c).norm();
        prop_assume!(d_ab > 1e-2);
        // skip near-flat triangles where the tangent test collapses solutions
        prop_assume!(cross(&(b - a), &(c - a)).abs() / d_ab > 1e-3);

        let sols = solve_ddd(&"a", &"b", &"c", d_ab, d_bc, d_ca);
        prop_assert_eq!(sols.len(), 2);
        let original = triangle_conf(a, b, c);
        // exactly one of the mirror solutions is congruent to the input
        let matches = sols.iter().filter(|s| **s == original).count();
        prop_assert_eq!(matches, 1);
        for s in &sols {
            prop_assert!(on_circle(&s.position(&"c").unwrap(), &s.position(&"a").unwrap(), d_ca));
        }
    }
}

// ---------------------------------------------------------------------------
// 4. Configurations compare equal under rigid motion
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn configuration_eq_under_rigid_motion(
        (ax, ay) in arb_point(),
        (bx, by) in arb_point(),
        (cx, cy) in arb_point(),
        angle in arb_angle(),
        (tx, ty) in arb_point(),
    ) {
        let (a, b) = (Vec2::new(ax, ay), Vec2::new(bx, by));
        prop_assume!((b - a).norm() > 1e-2);
        let conf = triangle_conf(a, b, Vec2::new(cx, cy));
        let t = translation(&Vec2::new(tx, ty));
        let moved: Configuration<&str> = conf
            .iter()
            .map(|(v, p)| (*v, transform_point(&t, &rotate(p, angle))))
            .collect();
        prop_assert_eq!(&conf, &moved);
    }
}

// ---------------------------------------------------------------------------
// 5. Merging a congruent copy changes nothing
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn merge_congruent_frames(
        (ax, ay) in arb_point(),
        (bx, by) in arb_point(),
        (cx, cy) in arb_point(),
        angle in arb_angle(),
    ) {
        let (a, b, c) = (Vec2::new(ax, ay), Vec2::new(bx, by), Vec2::new(cx, cy));
        prop_assume!((b - a).norm() > 1e-2);
        let left: Configuration<&str> = [("a", a), ("b", b)].into_iter().collect();
        let right: Configuration<&str> = [("a", rotate(&a, angle)), ("b", rotate(&b, angle)), ("c", rotate(&c, angle))]
            .into_iter()
            .collect();
        let merged = left.merge(&right);
        prop_assert!(!merged.is_underconstrained());
        let got = merged.position(&"c").unwrap();
        prop_assert!((got - c).norm() < 1e-6, "expected {:?}, got {:?}", c, got);
    }
}

// ---------------------------------------------------------------------------
// 6. A coordinate system maps its defining points back
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn hcs_maps_origin_and_axis(
        (ax, ay) in arb_point(),
        (bx, by) in arb_point(),
    ) {
        let (a, b) = (Vec2::new(ax, ay), Vec2::new(bx, by));
        let len = (b - a).norm();
        prop_assume!(len > 1e-2);
        let cs = make_hcs(&a, &b).unwrap();
        prop_assert!((transform_point(&cs, &Vec2::zeros()) - a).norm() < 1e-9);
        prop_assert!((transform_point(&cs, &Vec2::new(len, 0.0)) - b).norm() < 1e-9);
    }
}
