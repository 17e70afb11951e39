//! Clusters: the structural vocabulary of the solver.
//!
//! A cluster is a set of point variables together with the kind of geometric
//! knowledge held about them:
//!
//! - [`Cluster::Rigid`]: all pairwise distances are known.
//! - [`Cluster::Hedgehog`]: all angles at a centre point between a set of
//!   outer points are known.
//! - [`Cluster::Balloon`]: the shape is known up to a similarity transform.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::ClusterError;

/// Identifier of a point variable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Variable(pub String);

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Variable {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Variable {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A known distance between two points, unordered in its pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Distance {
    a: Variable,
    b: Variable,
}

impl Distance {
    pub fn new(a: Variable, b: Variable) -> Self {
        if a <= b { Self { a, b } } else { Self { a: b, b: a } }
    }

    pub fn vars(&self) -> [&Variable; 2] {
        [&self.a, &self.b]
    }
}

/// A known angle at `vertex`, symmetric in its two outer points.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Angle {
    a: Variable,
    vertex: Variable,
    c: Variable,
}

impl Angle {
    pub fn new(a: Variable, vertex: Variable, c: Variable) -> Self {
        if a <= c {
            Self { a, vertex, c }
        } else {
            Self { a: c, vertex, c: a }
        }
    }

    pub fn vertex(&self) -> &Variable {
        &self.vertex
    }

    pub fn outer(&self) -> [&Variable; 2] {
        [&self.a, &self.c]
    }
}

/// An elementary piece of geometric knowledge a cluster can imply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Relation {
    Distance(Distance),
    Angle(Angle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterKind {
    Rigid,
    Hedgehog,
    Balloon,
}

impl fmt::Display for ClusterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterKind::Rigid => f.write_str("rigid"),
            ClusterKind::Hedgehog => f.write_str("hedgehog"),
            ClusterKind::Balloon => f.write_str("balloon"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cluster {
    Rigid {
        vars: BTreeSet<Variable>,
    },
    Hedgehog {
        cvar: Variable,
        xvars: BTreeSet<Variable>,
    },
    Balloon {
        vars: BTreeSet<Variable>,
    },
}

impl Cluster {
    pub fn rigid<I>(vars: I) -> Result<Self, ClusterError>
    where
        I: IntoIterator,
        I::Item: Into<Variable>,
    {
        let vars: BTreeSet<Variable> = vars.into_iter().map(Into::into).collect();
        if vars.is_empty() {
            return Err(ClusterError::EmptyRigid);
        }
        Ok(Cluster::Rigid { vars })
    }

    pub fn hedgehog<I>(cvar: impl Into<Variable>, xvars: I) -> Result<Self, ClusterError>
    where
        I: IntoIterator,
        I::Item: Into<Variable>,
    {
        let cvar = cvar.into();
        let xvars: BTreeSet<Variable> = xvars.into_iter().map(Into::into).collect();
        if xvars.contains(&cvar) {
            return Err(ClusterError::CentreInOuterSet(cvar));
        }
        if xvars.len() < 2 {
            return Err(ClusterError::HedgehogTooSmall(xvars.len()));
        }
        Ok(Cluster::Hedgehog { cvar, xvars })
    }

    pub fn balloon<I>(vars: I) -> Result<Self, ClusterError>
    where
        I: IntoIterator,
        I::Item: Into<Variable>,
    {
        let vars: BTreeSet<Variable> = vars.into_iter().map(Into::into).collect();
        if vars.len() < 3 {
            return Err(ClusterError::BalloonTooSmall(vars.len()));
        }
        Ok(Cluster::Balloon { vars })
    }

    /// Re-check the arity rules of the checked constructors.
    pub fn validate(&self) -> Result<(), ClusterError> {
        match self {
            Cluster::Rigid { vars } if vars.is_empty() => Err(ClusterError::EmptyRigid),
            Cluster::Hedgehog { cvar, xvars } if xvars.contains(cvar) => {
                Err(ClusterError::CentreInOuterSet(cvar.clone()))
            }
            Cluster::Hedgehog { xvars, .. } if xvars.len() < 2 => {
                Err(ClusterError::HedgehogTooSmall(xvars.len()))
            }
            Cluster::Balloon { vars } if vars.len() < 3 => Err(ClusterError::BalloonTooSmall(vars.len())),
            _ => Ok(()),
        }
    }

    pub fn kind(&self) -> ClusterKind {
        match self {
            Cluster::Rigid { .. } => ClusterKind::Rigid,
            Cluster::Hedgehog { .. } => ClusterKind::Hedgehog,
            Cluster::Balloon { .. } => ClusterKind::Balloon,
        }
    }

    pub fn is_rigid(&self) -> bool {
        self.kind() == ClusterKind::Rigid
    }

    /// All variables, in sorted order. A hedgehog's centre is included.
    pub fn vars(&self) -> BTreeSet<Variable> {
        match self {
            Cluster::Rigid { vars } | Cluster::Balloon { vars } => vars.clone(),
            Cluster::Hedgehog { cvar, xvars } => {
                let mut all = xvars.clone();
                all.insert(cvar.clone());
                all
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Cluster::Rigid { vars } | Cluster::Balloon { vars } => vars.len(),
            Cluster::Hedgehog { xvars, .. } => xvars.len() + 1,
        }
    }

    pub fn contains(&self, var: &Variable) -> bool {
        match self {
            Cluster::Rigid { vars } | Cluster::Balloon { vars } => vars.contains(var),
            Cluster::Hedgehog { cvar, xvars } => cvar == var || xvars.contains(var),
        }
    }

    /// Variables present in both clusters.
    pub fn shared(&self, other: &Cluster) -> BTreeSet<Variable> {
        self.vars()
            .into_iter()
            .filter(|v| other.contains(v))
            .collect()
    }

    /// Number of independent scalar constraints this cluster represents.
    pub fn num_constraints(&self) -> usize {
        match self {
            Cluster::Rigid { vars } => {
                let n = vars.len();
                n * n.saturating_sub(1) / 2
            }
            Cluster::Balloon { vars } => 3 * choose3(vars.len()),
            Cluster::Hedgehog { xvars, .. } => {
                let k = xvars.len();
                k * k.saturating_sub(1) / 2
            }
        }
    }

    /// The strongest cluster implied by what both clusters know, if any.
    pub fn intersection(&self, other: &Cluster) -> Option<Cluster> {
        use Cluster::*;
        match (self, other) {
            (Rigid { .. }, Rigid { .. }) => {
                let shared = self.shared(other);
                (shared.len() >= 2).then_some(Rigid { vars: shared })
            }
            (Rigid { .. } | Balloon { .. }, Balloon { .. }) | (Balloon { .. }, Rigid { .. }) => {
                let shared = self.shared(other);
                (shared.len() >= 3).then_some(Balloon { vars: shared })
            }
            (Hedgehog { cvar: c1, xvars: x1 }, Hedgehog { cvar: c2, xvars: x2 }) => {
                if c1 != c2 {
                    return None;
                }
                sub_hedgehog(c1, x1.intersection(x2).cloned().collect())
            }
            (Hedgehog { cvar, xvars }, _) | (_, Hedgehog { cvar, xvars }) => {
                let cover = if matches!(self, Hedgehog { .. }) { other } else { self };
                if !cover.contains(cvar) {
                    return None;
                }
                let outer = xvars.iter().filter(|v| cover.contains(v)).cloned().collect();
                sub_hedgehog(cvar, outer)
            }
        }
    }

    /// Whether this cluster determines the given relation.
    pub fn implies(&self, relation: &Relation) -> bool {
        match (self, relation) {
            (Cluster::Rigid { vars }, Relation::Distance(d)) => d.vars().iter().all(|v| vars.contains(*v)),
            (Cluster::Rigid { vars } | Cluster::Balloon { vars }, Relation::Angle(a)) => {
                vars.contains(a.vertex()) && a.outer().iter().all(|v| vars.contains(*v))
            }
            (Cluster::Hedgehog { cvar, xvars }, Relation::Angle(a)) => {
                a.vertex() == cvar && a.outer().iter().all(|v| xvars.contains(*v))
            }
            _ => false,
        }
    }

    /// Every non-degenerate relation this cluster implies.
    pub fn relations(&self) -> Vec<Relation> {
        let mut relations = Vec::new();
        match self {
            Cluster::Rigid { vars } | Cluster::Balloon { vars } => {
                let list: Vec<&Variable> = vars.iter().collect();
                if self.is_rigid() {
                    for (i, a) in list.iter().enumerate() {
                        for b in &list[i + 1..] {
                            relations.push(Relation::Distance(Distance::new((*a).clone(), (*b).clone())));
                        }
                    }
                }
                for vertex in &list {
                    let outer: Vec<&&Variable> = list.iter().filter(|v| **v != *vertex).collect();
                    push_angles(&mut relations, vertex, &outer);
                }
            }
            Cluster::Hedgehog { cvar, xvars } => {
                let outer: Vec<&Variable> = xvars.iter().collect();
                let outer: Vec<&&Variable> = outer.iter().collect();
                push_angles(&mut relations, cvar, &outer);
            }
        }
        relations
    }
}

fn push_angles(relations: &mut Vec<Relation>, vertex: &Variable, outer: &[&&Variable]) {
    for (i, a) in outer.iter().enumerate() {
        for c in &outer[i + 1..] {
            relations.push(Relation::Angle(Angle::new(
                (**a).clone(),
                vertex.clone(),
                (**c).clone(),
            )));
        }
    }
}

fn sub_hedgehog(cvar: &Variable, xvars: BTreeSet<Variable>) -> Option<Cluster> {
    (xvars.len() >= 2).then(|| Cluster::Hedgehog {
        cvar: cvar.clone(),
        xvars,
    })
}

fn choose3(n: usize) -> usize {
    if n < 3 { 0 } else { n * (n - 1) * (n - 2) / 6 }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |vars: &BTreeSet<Variable>| {
            vars.iter().map(Variable::name).collect::<Vec<_>>().join(",")
        };
        match self {
            Cluster::Rigid { vars } => write!(f, "rigid#{{{}}}", join(vars)),
            Cluster::Balloon { vars } => write!(f, "balloon#{{{}}}", join(vars)),
            Cluster::Hedgehog { cvar, xvars } => write!(f, "hedgehog#{}{{{}}}", cvar, join(xvars)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(name: &str) -> Variable {
        Variable::from(name)
    }

    #[test]
    fn test_arity_checks() {
        assert_eq!(Cluster::rigid(Vec::<&str>::new()), Err(ClusterError::EmptyRigid));
        assert_eq!(
            Cluster::hedgehog("c", ["a"]),
            Err(ClusterError::HedgehogTooSmall(1))
        );
        assert_eq!(
            Cluster::hedgehog("c", ["a", "c"]),
            Err(ClusterError::CentreInOuterSet(v("c")))
        );
        assert_eq!(Cluster::balloon(["a", "b"]), Err(ClusterError::BalloonTooSmall(2)));
        assert!(Cluster::balloon(["a", "b", "c"]).is_ok());

        let raw = Cluster::Hedgehog {
            cvar: v("o"),
            xvars: [v("a")].into_iter().collect(),
        };
        assert_eq!(raw.validate(), Err(ClusterError::HedgehogTooSmall(1)));
    }

    #[test]
    fn test_num_constraints() {
        assert_eq!(Cluster::rigid(["a"]).unwrap().num_constraints(), 0);
        assert_eq!(Cluster::rigid(["a", "b", "c", "d"]).unwrap().num_constraints(), 6);
        assert_eq!(Cluster::balloon(["a", "b", "c", "d"]).unwrap().num_constraints(), 12);
        assert_eq!(Cluster::hedgehog("o", ["a", "b", "c"]).unwrap().num_constraints(), 3);
    }

    #[test]
    fn test_rigid_intersection() {
        let r1 = Cluster::rigid(["a", "b", "c"]).unwrap();
        let r2 = Cluster::rigid(["b", "c", "d"]).unwrap();
        let r3 = Cluster::rigid(["c", "d"]).unwrap();
        assert_eq!(r1.intersection(&r2), Some(Cluster::rigid(["b", "c"]).unwrap()));
        assert_eq!(r1.intersection(&r3), None);
    }

    #[test]
    fn test_balloon_intersection() {
        let r = Cluster::rigid(["a", "b", "c", "d"]).unwrap();
        let b = Cluster::balloon(["b", "c", "d", "e"]).unwrap();
        assert_eq!(r.intersection(&b), Some(Cluster::balloon(["b", "c", "d"]).unwrap()));
        assert_eq!(b.intersection(&r), r.intersection(&b));
        let small = Cluster::balloon(["c", "d", "x"]).unwrap();
        assert_eq!(r.intersection(&small), None);
    }

    #[test]
    fn test_hedgehog_intersection() {
        let h1 = Cluster::hedgehog("o", ["a", "b", "c"]).unwrap();
        let h2 = Cluster::hedgehog("o", ["b", "c", "d"]).unwrap();
        let h3 = Cluster::hedgehog("p", ["a", "b", "c"]).unwrap();
        assert_eq!(h1.intersection(&h2), Some(Cluster::hedgehog("o", ["b", "c"]).unwrap()));
        assert_eq!(h1.intersection(&h3), None);

        let r = Cluster::rigid(["o", "a", "b"]).unwrap();
        assert_eq!(r.intersection(&h1), Some(Cluster::hedgehog("o", ["a", "b"]).unwrap()));
        assert_eq!(h1.intersection(&r), r.intersection(&h1));

        // centre missing from the rigid
        let r2 = Cluster::rigid(["a", "b", "c"]).unwrap();
        assert_eq!(r2.intersection(&h1), None);
    }

    #[test]
    fn test_implies() {
        let r = Cluster::rigid(["a", "b", "c"]).unwrap();
        assert!(r.implies(&Relation::Distance(Distance::new(v("c"), v("a")))));
        assert!(r.implies(&Relation::Angle(Angle::new(v("a"), v("b"), v("c")))));

        let h = Cluster::hedgehog("o", ["a", "b"]).unwrap();
        assert!(h.implies(&Relation::Angle(Angle::new(v("b"), v("o"), v("a")))));
        assert!(!h.implies(&Relation::Angle(Angle::new(v("o"), v("a"), v("b")))));
        assert!(!h.implies(&Relation::Distance(Distance::new(v("o"), v("a")))));

        let b = Cluster::balloon(["a", "b", "c"]).unwrap();
        assert!(!b.implies(&Relation::Distance(Distance::new(v("a"), v("b")))));
        assert!(b.implies(&Relation::Angle(Angle::new(v("a"), v("c"), v("b")))));
    }

    #[test]
    fn test_relations_match_implies() {
        let clusters = [
            Cluster::rigid(["a", "b", "c"]).unwrap(),
            Cluster::balloon(["a", "b", "c", "d"]).unwrap(),
            Cluster::hedgehog("o", ["a", "b", "c"]).unwrap(),
        ];
        for c in &clusters {
            let relations = c.relations();
            assert!(!relations.is_empty());
            assert!(relations.iter().all(|r| c.implies(r)));
        }
        // 3 distances + 3 angles for a rigid triangle
        assert_eq!(clusters[0].relations().len(), 6);
    }

    #[test]
    fn test_display() {
        let h = Cluster::hedgehog("o", ["b", "a"]).unwrap();
        assert_eq!(h.to_string(), "hedgehog#o{a,b}");
    }
}
