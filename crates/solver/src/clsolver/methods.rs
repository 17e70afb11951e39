//! Numeric evaluation of merges and derivations.
//!
//! Every merge installs a [`MergeMethod`] in the method graph. It receives one
//! configuration per input cluster, in the order the merge lists its inputs,
//! and returns every candidate configuration of the output cluster.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use geo_kernel::geometry::vector::angle_3p;
use geo_kernel::{Vec2, solve_ada, solve_add, solve_dad, solve_ddd, tol_zero};

use crate::Configuration;
use crate::cluster::Variable;
use crate::error::MethodError;
use crate::multimethod::MultiMethod;

/// The rule that produced a merge or derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rule {
    /// A single point joins a rigid cluster containing it.
    PointCluster,
    /// Two rigid clusters sharing at least two points.
    ClusterCluster,
    /// Three rigid clusters pairwise sharing one point.
    ClusterClusterCluster,
    /// Two rigid clusters sharing one point plus the angle at that point.
    ClusterHedgehogCluster,
    /// Two rigid clusters sharing one point plus an angle at another point.
    ClusterClusterHedgehog,
    /// A rigid cluster absorbs a hedgehog it covers.
    AbsorbHedgehog,
    /// A balloon absorbs a hedgehog it covers.
    BalloonAbsorbHedgehog,
    /// Two hedgehogs with the same centre.
    HedgehogHedgehog,
    /// Two hedgehogs whose centres see each other span a balloon.
    HedgehogsToBalloon,
    /// Two balloons sharing at least two points.
    BalloonBalloon,
    /// A balloon sharing at least two points with a rigid cluster.
    BalloonRigid,
    /// A sub-hedgehog derived from a cluster; its input is not consumed.
    DeriveHedgehog,
}

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Rule::PointCluster => "merge_pc",
            Rule::ClusterCluster => "merge_cc",
            Rule::ClusterClusterCluster => "merge_ccc",
            Rule::ClusterHedgehogCluster => "merge_chc",
            Rule::ClusterClusterHedgehog => "merge_cch",
            Rule::AbsorbHedgehog => "merge_ch",
            Rule::BalloonAbsorbHedgehog => "merge_bh",
            Rule::HedgehogHedgehog => "merge_hh",
            Rule::HedgehogsToBalloon => "merge_hhb",
            Rule::BalloonBalloon => "merge_bb",
            Rule::BalloonRigid => "merge_br",
            Rule::DeriveHedgehog => "derive_hog",
        }
    }

    pub fn is_derive(&self) -> bool {
        matches!(self, Rule::DeriveHedgehog)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Closed-form triangle at the heart of a three-cluster merge.
///
/// Indices refer to positions in the merge's input list: `ab` is the input
/// holding the distance `|ab|`, `hog` the hedgehog holding the angle.
#[derive(Debug, Clone, PartialEq)]
pub enum Triangle {
    /// Three distances, from the inputs holding `pq`, `qr` and `rp`.
    Ddd {
        p: Variable,
        q: Variable,
        r: Variable,
        pq: usize,
        qr: usize,
        rp: usize,
    },
    /// Distance, angle at `b`, distance.
    Dad {
        a: Variable,
        b: Variable,
        c: Variable,
        ab: usize,
        hog: usize,
        bc: usize,
    },
    /// Angle at `a`, distance `ab`, distance `bc`.
    Add {
        a: Variable,
        b: Variable,
        c: Variable,
        ab: usize,
        hog: usize,
        bc: usize,
    },
    /// Angle at `a`, unit base `ab`, angle at `b`.
    Ada {
        a: Variable,
        b: Variable,
        c: Variable,
        hog_a: usize,
        hog_b: usize,
    },
}

/// How a merge computes its output configurations.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeGeometry {
    /// Output equals input `keep`.
    Keep { keep: usize },
    /// Rigid union of every input, aligned onto input `base`.
    Rigid { base: usize },
    /// Similarity union of every input, aligned onto input `base`.
    Scaled { base: usize },
    /// Solve a triangle, align it onto input `base`, then add the remaining
    /// rigid inputs listed in `rigids`.
    Triangle {
        triangle: Triangle,
        base: Option<usize>,
        rigids: Vec<usize>,
    },
    /// Sub-hedgehog of a single input, outer points moved to unit distance.
    Hedgehog {
        cvar: Variable,
        xvars: BTreeSet<Variable>,
    },
}

/// Multi-method evaluating one merge.
pub struct MergeMethod {
    rule: Rule,
    geometry: MergeGeometry,
}

impl MergeMethod {
    pub fn new(rule: Rule, geometry: MergeGeometry) -> Self {
        Self { rule, geometry }
    }

    fn input<'a>(&self, inputs: &[&'a Configuration], i: usize) -> Result<&'a Configuration, MethodError> {
        inputs.get(i).copied().ok_or_else(|| MethodError::InputCount {
            method: self.rule.name().to_string(),
            expected: i + 1,
            got: inputs.len(),
        })
    }

    fn position(&self, conf: &Configuration, var: &Variable) -> Result<Vec2, MethodError> {
        conf.position(var).ok_or_else(|| MethodError::MissingVariable {
            method: self.rule.name().to_string(),
            variable: var.to_string(),
        })
    }

    fn distance(&self, conf: &Configuration, a: &Variable, b: &Variable) -> Result<f64, MethodError> {
        Ok((self.position(conf, b)? - self.position(conf, a)?).norm())
    }

    /// Counter-clockwise angle at `vertex` from `from` to `to`.
    fn angle(&self, conf: &Configuration, from: &Variable, vertex: &Variable, to: &Variable) -> Result<f64, MethodError> {
        Ok(angle_3p(
            &self.position(conf, from)?,
            &self.position(conf, vertex)?,
            &self.position(conf, to)?,
        ))
    }

    fn union(
        &self,
        inputs: &[&Configuration],
        base: usize,
        merge: fn(&Configuration, &Configuration) -> Configuration,
    ) -> Result<Configuration, MethodError> {
        let mut result = self.input(inputs, base)?.clone();
        for (i, conf) in inputs.iter().enumerate() {
            if i != base {
                result = merge(&result, conf);
            }
        }
        Ok(result)
    }

    fn solve_triangle(&self, inputs: &[&Configuration], triangle: &Triangle) -> Result<Vec<Configuration>, MethodError> {
        let solutions = match triangle {
            Triangle::Ddd { p, q, r, pq, qr, rp } => {
                let d_pq = self.distance(self.input(inputs, *pq)?, p, q)?;
                let d_qr = self.distance(self.input(inputs, *qr)?, q, r)?;
                let d_rp = self.distance(self.input(inputs, *rp)?, r, p)?;
                solve_ddd(p, q, r, d_pq, d_qr, d_rp)
            }
            Triangle::Dad { a, b, c, ab, hog, bc } => {
                let d_ab = self.distance(self.input(inputs, *ab)?, a, b)?;
                let angle = self.angle(self.input(inputs, *hog)?, a, b, c)?;
                let d_bc = self.distance(self.input(inputs, *bc)?, b, c)?;
                solve_dad(a, b, c, d_ab, angle, d_bc)
            }
            Triangle::Add { a, b, c, ab, hog, bc } => {
                let angle = self.angle(self.input(inputs, *hog)?, b, a, c)?;
                let d_ab = self.distance(self.input(inputs, *ab)?, a, b)?;
                let d_bc = self.distance(self.input(inputs, *bc)?, b, c)?;
                solve_add(a, b, c, angle, d_ab, d_bc)
            }
            Triangle::Ada { a, b, c, hog_a, hog_b } => {
                let angle_a = self.angle(self.input(inputs, *hog_a)?, b, a, c)?;
                let angle_b = self.angle(self.input(inputs, *hog_b)?, a, b, c)?;
                solve_ada(a, b, c, angle_a, 1.0, angle_b)
            }
        };
        Ok(solutions)
    }
}

impl MultiMethod<Configuration> for MergeMethod {
    fn name(&self) -> &str {
        self.rule.name()
    }

    fn multi_execute(&self, inputs: &[&Configuration]) -> Result<Vec<Configuration>, MethodError> {
        match &self.geometry {
            MergeGeometry::Keep { keep } => Ok(vec![self.input(inputs, *keep)?.clone()]),
            MergeGeometry::Rigid { base } => Ok(vec![self.union(inputs, *base, Configuration::merge)?]),
            MergeGeometry::Scaled { base } => Ok(vec![self.union(inputs, *base, Configuration::merge_scale)?]),
            MergeGeometry::Triangle { triangle, base, rigids } => {
                let mut results = Vec::new();
                for solution in self.solve_triangle(inputs, triangle)? {
                    let mut conf = match base {
                        Some(base) => self.input(inputs, *base)?.merge(&solution),
                        None => solution,
                    };
                    for &i in rigids {
                        if Some(i) != *base {
                            conf = conf.merge(self.input(inputs, i)?);
                        }
                    }
                    results.push(conf);
                }
                Ok(results)
            }
            MergeGeometry::Hedgehog { cvar, xvars } => {
                let conf = self.input(inputs, 0)?;
                let centre = self.position(conf, cvar)?;
                let mut points = vec![(cvar.clone(), centre)];
                for x in xvars {
                    let offset = self.position(conf, x)? - centre;
                    let norm = offset.norm();
                    let unit = if tol_zero(norm) { offset } else { offset / norm };
                    points.push((x.clone(), centre + unit));
                }
                let derived: Configuration = points.into_iter().collect();
                Ok(vec![derived.with_underconstrained(conf.is_underconstrained())])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn v(name: &str) -> Variable {
        Variable::from(name)
    }

    fn conf(points: &[(&str, f64, f64)]) -> Configuration {
        points
            .iter()
            .map(|(n, x, y)| (v(n), Vec2::new(*x, *y)))
            .collect()
    }

    #[test]
    fn test_dad_merge_keeps_base_frame() {
        // |ab| = 3 placed vertically, |bc| = 4, right angle at b
        let ab = conf(&[("a", 0.0, 3.0), ("b", 0.0, 0.0)]);
        let bc = conf(&[("b", 0.0, 0.0), ("c", 4.0, 0.0)]);
        let hog = conf(&[("b", 0.0, 0.0), ("a", 1.0, 0.0), ("c", 0.0, -1.0)]);
        let method = MergeMethod::new(
            Rule::ClusterHedgehogCluster,
            MergeGeometry::Triangle {
                triangle: Triangle::Dad {
                    a: v("a"),
                    b: v("b"),
                    c: v("c"),
                    ab: 0,
                    hog: 2,
                    bc: 1,
                },
                base: Some(0),
                rigids: vec![0, 1],
            },
        );
        let out = method.multi_execute(&[&ab, &bc, &hog]).unwrap();
        assert_eq!(out.len(), 1);
        let result = &out[0];
        assert_relative_eq!(result.distance(&v("a"), &v("c")).unwrap(), 5.0, epsilon = 1e-9);
        assert_relative_eq!(result.position(&v("a")).unwrap(), Vec2::new(0.0, 3.0), epsilon = 1e-9);
        // clockwise quarter turn from b->a lands on the positive x axis
        assert_relative_eq!(result.position(&v("c")).unwrap(), Vec2::new(4.0, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn test_ddd_merge_two_candidates() {
        let r1 = conf(&[("p", 0.0, 0.0), ("r", 4.0, 0.0)]);
        let r2 = conf(&[("p", 0.0, 0.0), ("q", 3.0, 0.0)]);
        let r3 = conf(&[("q", 0.0, 0.0), ("r", 5.0, 0.0)]);
        let method = MergeMethod::new(
            Rule::ClusterClusterCluster,
            MergeGeometry::Triangle {
                triangle: Triangle::Ddd {
                    p: v("p"),
                    q: v("q"),
                    r: v("r"),
                    pq: 1,
                    qr: 2,
                    rp: 0,
                },
                base: Some(0),
                rigids: vec![0, 1, 2],
            },
        );
        let out = method.multi_execute(&[&r1, &r2, &r3]).unwrap();
        assert_eq!(out.len(), 2);
        for c in &out {
            assert_relative_eq!(c.position(&v("r")).unwrap(), Vec2::new(4.0, 0.0), epsilon = 1e-9);
            assert_relative_eq!(c.distance(&v("p"), &v("q")).unwrap(), 3.0, epsilon = 1e-9);
            assert_relative_eq!(c.distance(&v("q"), &v("r")).unwrap(), 5.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_hedgehog_derivation_normalises() {
        let rigid = conf(&[("o", 1.0, 1.0), ("a", 4.0, 1.0), ("b", 1.0, -1.0), ("z", 9.0, 9.0)]);
        let method = MergeMethod::new(
            Rule::DeriveHedgehog,
            MergeGeometry::Hedgehog {
                cvar: v("o"),
                xvars: [v("a"), v("b")].into_iter().collect(),
            },
        );
        let out = method.multi_execute(&[&rigid]).unwrap();
        let hog = &out[0];
        assert_eq!(hog.len(), 3);
        assert_relative_eq!(hog.distance(&v("o"), &v("a")).unwrap(), 1.0, epsilon = 1e-12);
        let angle = angle_3p(
            &hog.position(&v("a")).unwrap(),
            &hog.position(&v("o")).unwrap(),
            &hog.position(&v("b")).unwrap(),
        );
        assert_relative_eq!(angle, -FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_missing_variable_is_an_error() {
        let rigid = conf(&[("o", 0.0, 0.0)]);
        let method = MergeMethod::new(
            Rule::DeriveHedgehog,
            MergeGeometry::Hedgehog {
                cvar: v("o"),
                xvars: [v("a"), v("b")].into_iter().collect(),
            },
        );
        assert!(matches!(
            method.multi_execute(&[&rigid]),
            Err(MethodError::MissingVariable { .. })
        ));
    }

    #[test]
    fn test_balloon_union_scales() {
        let b1 = conf(&[("a", 0.0, 0.0), ("b", 2.0, 0.0), ("c", 1.0, 1.0)]);
        let b2 = conf(&[("a", 0.0, 0.0), ("b", 1.0, 0.0), ("d", 0.5, -0.5)]);
        let method = MergeMethod::new(Rule::BalloonBalloon, MergeGeometry::Scaled { base: 0 });
        let out = method.multi_execute(&[&b1, &b2]).unwrap();
        assert_relative_eq!(out[0].position(&v("d")).unwrap(), Vec2::new(1.0, -1.0), epsilon = 1e-9);
    }
}
