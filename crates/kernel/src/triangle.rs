//! Closed-form triangle constructions.
//!
//! Each solver places the first two points of a triangle in a canonical frame
//! and returns every configuration consistent with the given measures. Angles
//! are signed and counter-clockwise positive, matching [`angle_3p`].
//!
//! [`angle_3p`]: crate::geometry::vector::angle_3p

use std::fmt::Debug;
use std::hash::Hash;
use tracing::trace;

use crate::configuration::Configuration;
use crate::geometry::intersection::{cc_int, cr_int, rr_int};
use crate::geometry::vector::{Vec2, rotate};
use crate::tolerance::{tol_eq, tol_zero};

fn triangle<V>(vars: [&V; 3], points: [Vec2; 3]) -> Configuration<V>
where
    V: Clone + Eq + Hash + Debug,
{
    vars.into_iter().cloned().zip(points).collect()
}

/// Triangle from three side lengths.
///
/// `v1` is placed at the origin and `v2` on the positive x axis. Two mirror
/// solutions are returned in general, one for a tangent fit and none when the
/// triangle inequality fails. A zero-length `d12` with `d31 == d23` leaves the
/// direction of `v3` free: one underconstrained solution is returned.
pub fn solve_ddd<V>(v1: &V, v2: &V, v3: &V, d12: f64, d23: f64, d31: f64) -> Vec<Configuration<V>>
where
    V: Clone + Eq + Hash + Debug,
{
    let p1 = Vec2::zeros();
    let p2 = Vec2::new(d12, 0.0);

    if tol_zero(d12) {
        if tol_eq(d31, d23) {
            let p3 = Vec2::new(d31, 0.0);
            return vec![triangle([v1, v2, v3], [p1, p2, p3]).with_underconstrained(true)];
        }
        return vec![];
    }

    let solutions: Vec<_> = cc_int(&p1, d31, &p2, d23)
        .into_iter()
        .map(|p3| triangle([v1, v2, v3], [p1, p2, p3]))
        .collect();
    trace!(count = solutions.len(), "solve_ddd");
    solutions
}

/// Triangle from two sides and the included angle at `v2`.
///
/// `a123` rotates the ray `v2→v1` onto the ray `v2→v3`. Always exactly one
/// solution.
pub fn solve_dad<V>(v1: &V, v2: &V, v3: &V, d12: f64, a123: f64, d23: f64) -> Vec<Configuration<V>>
where
    V: Clone + Eq + Hash + Debug,
{
    let p2 = Vec2::zeros();
    let p1 = Vec2::new(d12, 0.0);
    let p3 = rotate(&Vec2::new(d23, 0.0), a123);
    vec![triangle([v1, v2, v3], [p1, p2, p3])]
}

/// Triangle from the angle at `a`, side `ab` and side `bc`.
///
/// `c` lies on the ray from `a` at `angle_bac` from `a→b`, at distance `d_bc`
/// from `b`. Zero, one or two solutions.
pub fn solve_add<V>(
    a: &V,
    b: &V,
    c: &V,
    angle_bac: f64,
    d_ab: f64,
    d_bc: f64,
) -> Vec<Configuration<V>>
where
    V: Clone + Eq + Hash + Debug,
{
    let pa = Vec2::zeros();
    let pb = Vec2::new(d_ab, 0.0);
    let dir = rotate(&Vec2::new(1.0, 0.0), angle_bac);
    let solutions: Vec<_> = cr_int(&pb, d_bc, &pa, &dir)
        .into_iter()
        .map(|pc| triangle([a, b, c], [pa, pb, pc]))
        .collect();
    trace!(count = solutions.len(), "solve_add");
    solutions
}

/// Triangle from the angles at `a` and `b` and the side between them.
///
/// When both angles vanish the rays overlap; `c` is placed at the midpoint of
/// `ab` and the solution is marked underconstrained.
pub fn solve_ada<V>(
    a: &V,
    b: &V,
    c: &V,
    angle_bac: f64,
    d_ab: f64,
    angle_abc: f64,
) -> Vec<Configuration<V>>
where
    V: Clone + Eq + Hash + Debug,
{
    let pa = Vec2::zeros();
    let pb = Vec2::new(d_ab, 0.0);

    if tol_zero(angle_bac) && tol_zero(angle_abc) {
        let pc = (pa + pb) / 2.0;
        return vec![triangle([a, b, c], [pa, pb, pc]).with_underconstrained(true)];
    }

    let dir_a = rotate(&Vec2::new(1.0, 0.0), angle_bac);
    let dir_b = rotate(&Vec2::new(-1.0, 0.0), angle_abc);
    let solutions: Vec<_> = rr_int(&pa, &dir_a, &pb, &dir_b)
        .into_iter()
        .map(|pc| triangle([a, b, c], [pa, pb, pc]))
        .collect();
    trace!(count = solutions.len(), "solve_ada");
    solutions
}
