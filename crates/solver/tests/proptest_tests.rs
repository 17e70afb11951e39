//! Property-based tests for the cluster model and the cluster solver.

use proptest::prelude::*;
use std::collections::BTreeSet;

use geo_kernel::Vec2;
use geo_kernel::geometry::vector::{cross, rotate};
use geo_solver::{Cluster, ClusterSolver, Configuration, Variable};

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

const NAMES: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

fn arb_vars(min: usize) -> impl Strategy<Value = BTreeSet<Variable>> {
    proptest::sample::subsequence(NAMES.to_vec(), min..=NAMES.len())
        .prop_map(|names| names.into_iter().map(Variable::from).collect())
}

fn arb_cluster() -> impl Strategy<Value = Cluster> {
    prop_oneof![
        arb_vars(1).prop_map(|vars| Cluster::Rigid { vars }),
        arb_vars(3).prop_map(|vars| Cluster::Balloon { vars }),
        arb_vars(3).prop_map(|vars| {
            let mut xvars = vars;
            let cvar = xvars.pop_first().unwrap_or_else(|| Variable::from("a"));
            Cluster::Hedgehog { cvar, xvars }
        }),
    ]
}

fn arb_point() -> impl Strategy<Value = Vec2> {
    (-50.0f64..50.0, -50.0f64..50.0).prop_map(|(x, y)| Vec2::new(x, y))
}

/// A distance cluster's configuration placed at an arbitrary pose.
fn placed(a: &str, b: &str, d: f64, origin: Vec2, angle: f64) -> Configuration {
    [
        (Variable::from(a), origin),
        (Variable::from(b), origin + rotate(&Vec2::new(d, 0.0), angle)),
    ]
    .into_iter()
    .collect()
}

// ---------------------------------------------------------------------------
// 1. Cluster intersection laws
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn intersection_is_commutative(c1 in arb_cluster(), c2 in arb_cluster()) {
        prop_assert_eq!(c1.intersection(&c2), c2.intersection(&c1));
    }

    #[test]
    fn intersection_is_implied_by_both(c1 in arb_cluster(), c2 in arb_cluster()) {
        if let Some(shared) = c1.intersection(&c2) {
            prop_assert!(shared.vars().is_subset(&c1.vars()));
            prop_assert!(shared.vars().is_subset(&c2.vars()));
            for relation in shared.relations() {
                prop_assert!(c1.implies(&relation), "{} does not imply {:?}", c1, relation);
                prop_assert!(c2.implies(&relation), "{} does not imply {:?}", c2, relation);
            }
        }
    }

    #[test]
    fn self_intersection_is_identity(c in arb_cluster()) {
        prop_assume!(c.len() >= 2);
        prop_assert_eq!(c.intersection(&c), Some(c.clone()));
    }
}

// ---------------------------------------------------------------------------
// 2. Constraint counting
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn relations_match_constraint_count(c in arb_cluster()) {
        let relations = c.relations();
        let counted = match &c {
            Cluster::Rigid { .. } => relations
                .iter()
                .filter(|r| matches!(r, geo_solver::Relation::Distance(_)))
                .count(),
            _ => relations.len(),
        };
        prop_assert_eq!(counted, c.num_constraints());
        for relation in &relations {
            prop_assert!(c.implies(relation));
        }
    }

    /// A rigid body of n points has 2n - 3 degrees of freedom fixed once n ≥ 2,
    /// which never exceeds the number of pairwise distances.
    #[test]
    fn rigid_dof_bounded_by_distances(vars in arb_vars(2)) {
        let n = vars.len();
        let rigid = Cluster::Rigid { vars };
        prop_assert!(2 * n - 3 <= rigid.num_constraints());
    }
}

// ---------------------------------------------------------------------------
// 3. Triangles from three distances, wherever the inputs are placed
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn ccc_reproduces_input_distances(
        a in arb_point(),
        b in arb_point(),
        c in arb_point(),
        poses in proptest::array::uniform3((arb_point(), -3.0f64..3.0)),
    ) {
        // keep clear of degenerate triangles
        let d_ab = (b - a).norm();
        let d_bc = (c - b).norm();
        let d_ca = (a - c).norm();
        prop_assume!(d_ab > 1.0 && d_ca > 1.0);
        prop_assume!(cross(&(b - a), &(c - a)).abs() / (d_ab * d_ca) > 0.05);

        let mut solver = ClusterSolver::new();
        let specs = [("a", "b", d_ab), ("b", "c", d_bc), ("c", "a", d_ca)];
        for ((p, q, d), (origin, angle)) in specs.into_iter().zip(poses) {
            let id = solver.add(Cluster::rigid([p, q]).unwrap()).unwrap();
            solver.set(id, vec![placed(p, q, d, origin, angle)]).unwrap();
        }

        let top = solver.top_level();
        prop_assert_eq!(top.len(), 1);
        let solutions = solver.get(top[0]).unwrap();
        prop_assert_eq!(solutions.len(), 1);
        let expected: Configuration = [
            (Variable::from("a"), a),
            (Variable::from("b"), b),
            (Variable::from("c"), c),
        ]
        .into_iter()
        .collect();
        let solution = &solutions[0];
        for (p, q, d) in specs {
            let got = solution.distance(&Variable::from(p), &Variable::from(q)).unwrap();
            prop_assert!((got - d).abs() < 1e-5 * d.max(1.0), "{}{} = {} != {}", p, q, got, d);
        }
        // one of the two mirror images of the input triangle
        let mirrored: Configuration = expected
            .iter()
            .map(|(v, p)| (v.clone(), Vec2::new(p.x, -p.y)))
            .collect();
        prop_assert!(*solution == expected || *solution == mirrored);
    }
}
