//! Merge rules.
//!
//! Each search looks at the top-level neighbours of one cluster, in insertion
//! order, and applies the first rule that matches. A search returns true when
//! it merged something, in which case the cluster is searched again if it is
//! still on the top level.

use indexmap::IndexSet;
use std::collections::{BTreeSet, VecDeque};

use super::{ClusterId, ClusterSolver, EdgeTag, MergeGeometry, MergePlan, Rule, Triangle, Vertex};
use crate::cluster::{Cluster, ClusterKind, Variable};
use crate::error::SolverError;
use crate::selection::SelectionConstraint;

impl MergePlan {
    fn new(rule: Rule, inputs: Vec<ClusterId>, output: Cluster, geometry: MergeGeometry) -> Self {
        Self {
            rule,
            consumed: inputs.clone(),
            inputs,
            output,
            redundant: false,
            geometry,
            prototype: Vec::new(),
        }
    }

    fn redundant(mut self, redundant: bool) -> Self {
        self.redundant = redundant;
        self
    }

    fn prototype(mut self, prototype: Vec<SelectionConstraint>) -> Self {
        self.prototype = prototype;
        self
    }
}

fn union(clusters: &[&Cluster]) -> BTreeSet<Variable> {
    clusters.iter().flat_map(|c| c.vars()).collect()
}

fn only(set: BTreeSet<Variable>) -> Option<Variable> {
    let mut iter = set.into_iter();
    match (iter.next(), iter.next()) {
        (Some(v), None) => Some(v),
        _ => None,
    }
}

fn outer(cluster: &Cluster) -> Option<(&Variable, &BTreeSet<Variable>)> {
    match cluster {
        Cluster::Hedgehog { cvar, xvars } => Some((cvar, xvars)),
        _ => None,
    }
}

impl ClusterSolver {
    // ─── Per-kind searches ───────────────────────────────────────────────────

    pub(super) fn search_rigid(&mut self, id: ClusterId) -> Result<bool, SolverError> {
        let rigid = self.cluster_of(id)?;
        let neighbours = self.neighbours(id)?;

        for &n in &neighbours {
            let other = self.cluster_of(n)?;
            if other.kind() == ClusterKind::Hedgehog
                && other.vars().is_subset(&rigid.vars())
                && !self.depends_on(n, id)
            {
                let plan = MergePlan::new(
                    Rule::AbsorbHedgehog,
                    vec![id, n],
                    rigid.clone(),
                    MergeGeometry::Keep { keep: 0 },
                );
                self.merge(plan.redundant(true))?;
                return Ok(true);
            }
        }

        for &n in &neighbours {
            let other = self.cluster_of(n)?;
            if other.kind() == ClusterKind::Balloon && self.balloon_rigid(n, &other, id, &rigid)? {
                return Ok(true);
            }
        }

        if self.point_merge(id, &rigid, &neighbours)? {
            return Ok(true);
        }

        for &n in &neighbours {
            let other = self.cluster_of(n)?;
            if !other.is_rigid() || rigid.shared(&other).len() < 2 {
                continue;
            }
            let inputs = vec![id, n];
            let output = Cluster::rigid(union(&[&rigid, &other]))?;
            let base = self.root_index(&inputs);
            let plan = MergePlan::new(
                Rule::ClusterCluster,
                inputs,
                output,
                MergeGeometry::Rigid { base },
            );
            self.merge(plan.redundant(true))?;
            return Ok(true);
        }

        if self.search_ccc(id, &rigid, &neighbours)? {
            return Ok(true);
        }

        for &n in &neighbours {
            let other = self.cluster_of(n)?;
            if other.is_rigid() && rigid.shared(&other).len() == 1 {
                if self.try_chc(id, n)? || self.try_cch(id, n)? {
                    return Ok(true);
                }
            }
        }

        self.extend_hedgehogs(id, &rigid)
    }

    pub(super) fn search_hedgehog(&mut self, id: ClusterId) -> Result<bool, SolverError> {
        let hog = self.cluster_of(id)?;
        let Some((cvar, xvars)) = outer(&hog) else {
            return Ok(false);
        };
        let (cvar, xvars) = (cvar.clone(), xvars.clone());
        let neighbours = self.neighbours(id)?;

        for &n in &neighbours {
            let other = self.cluster_of(n)?;
            let rule = match other.kind() {
                ClusterKind::Rigid => Rule::AbsorbHedgehog,
                ClusterKind::Balloon => Rule::BalloonAbsorbHedgehog,
                ClusterKind::Hedgehog => continue,
            };
            if hog.vars().is_subset(&other.vars()) && !self.depends_on(id, n) {
                let plan = MergePlan::new(rule, vec![n, id], other, MergeGeometry::Keep { keep: 0 });
                self.merge(plan.redundant(true))?;
                return Ok(true);
            }
        }

        for &n in &neighbours {
            let other = self.cluster_of(n)?;
            let Some((ocvar, oxvars)) = outer(&other) else {
                continue;
            };
            let shared = xvars.intersection(oxvars).count();
            if *ocvar != cvar || shared == 0 {
                continue;
            }
            let output = Cluster::hedgehog(cvar.clone(), xvars.union(oxvars).cloned())?;
            let plan = MergePlan::new(
                Rule::HedgehogHedgehog,
                vec![id, n],
                output,
                MergeGeometry::Scaled { base: 0 },
            );
            self.merge(plan.redundant(shared >= 2))?;
            return Ok(true);
        }

        let rigids: Vec<(ClusterId, Cluster)> = neighbours
            .iter()
            .filter_map(|&n| self.clusters.get(n).map(|node| (n, node.cluster.clone())))
            .filter(|(_, c)| c.is_rigid() && c.len() > 1)
            .collect();
        for (i, (r, rc)) in rigids.iter().enumerate() {
            for (n, nc) in &rigids[i + 1..] {
                if rc.shared(nc).len() == 1 && (self.try_chc(*r, *n)? || self.try_cch(*r, *n)?) {
                    return Ok(true);
                }
            }
        }

        if self.hedgehogs_to_balloon(id, &cvar, &xvars)? {
            return Ok(true);
        }

        for &n in &neighbours {
            let other = self.cluster_of(n)?;
            if other.kind() != ClusterKind::Hedgehog
                && other.contains(&cvar)
                && self.extend_hedgehog(n, &other, &cvar, id, &xvars)?
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub(super) fn search_balloon(&mut self, id: ClusterId) -> Result<bool, SolverError> {
        let balloon = self.cluster_of(id)?;
        let neighbours = self.neighbours(id)?;

        for &n in &neighbours {
            let other = self.cluster_of(n)?;
            if other.kind() == ClusterKind::Hedgehog
                && other.vars().is_subset(&balloon.vars())
                && !self.depends_on(n, id)
            {
                let plan = MergePlan::new(
                    Rule::BalloonAbsorbHedgehog,
                    vec![id, n],
                    balloon.clone(),
                    MergeGeometry::Keep { keep: 0 },
                );
                self.merge(plan.redundant(true))?;
                return Ok(true);
            }
        }

        for &n in &neighbours {
            let other = self.cluster_of(n)?;
            let shared = balloon.shared(&other).len();
            if other.kind() != ClusterKind::Balloon || shared < 2 {
                continue;
            }
            let output = Cluster::balloon(union(&[&balloon, &other]))?;
            let plan = MergePlan::new(
                Rule::BalloonBalloon,
                vec![id, n],
                output,
                MergeGeometry::Scaled { base: 0 },
            );
            self.merge(plan.redundant(shared >= 3))?;
            return Ok(true);
        }

        for &n in &neighbours {
            let other = self.cluster_of(n)?;
            if other.is_rigid() && self.balloon_rigid(id, &balloon, n, &other)? {
                return Ok(true);
            }
        }

        self.extend_hedgehogs(id, &balloon)
    }

    // ─── Shared rules ────────────────────────────────────────────────────────

    fn balloon_rigid(
        &mut self,
        balloon_id: ClusterId,
        balloon: &Cluster,
        rigid_id: ClusterId,
        rigid: &Cluster,
    ) -> Result<bool, SolverError> {
        let shared = balloon.shared(rigid).len();
        if shared < 2 {
            return Ok(false);
        }
        let output = Cluster::rigid(union(&[balloon, rigid]))?;
        let plan = MergePlan::new(
            Rule::BalloonRigid,
            vec![balloon_id, rigid_id],
            output,
            MergeGeometry::Scaled { base: 1 },
        );
        self.merge(plan.redundant(shared >= 3))?;
        Ok(true)
    }

    /// A single point joins a rigid cluster containing it.
    fn point_merge(&mut self, id: ClusterId, rigid: &Cluster, neighbours: &[ClusterId]) -> Result<bool, SolverError> {
        let mut pair = None;
        for &n in neighbours {
            let other = self.cluster_of(n)?;
            if !other.is_rigid() {
                continue;
            }
            if rigid.len() == 1 {
                pair = Some((n, id, other));
                break;
            }
            if other.len() == 1 {
                pair = Some((id, n, rigid.clone()));
                break;
            }
        }
        let Some((cluster, point, output)) = pair else {
            return Ok(false);
        };
        let geometry = if self.contains_root(point) && !self.contains_root(cluster) {
            MergeGeometry::Rigid { base: 1 }
        } else {
            MergeGeometry::Keep { keep: 0 }
        };
        self.merge(MergePlan::new(Rule::PointCluster, vec![cluster, point], output, geometry))?;
        Ok(true)
    }

    /// Three rigids pairwise sharing one distinct point.
    fn search_ccc(&mut self, id: ClusterId, rigid: &Cluster, neighbours: &[ClusterId]) -> Result<bool, SolverError> {
        for &n1 in neighbours {
            let c1 = self.cluster_of(n1)?;
            if !c1.is_rigid() {
                continue;
            }
            let Some(p) = only(rigid.shared(&c1)) else {
                continue;
            };
            for &n2 in neighbours {
                if n2 == n1 {
                    continue;
                }
                let c2 = self.cluster_of(n2)?;
                if !c2.is_rigid() {
                    continue;
                }
                let (Some(q), Some(r)) = (only(c1.shared(&c2)), only(c2.shared(rigid))) else {
                    continue;
                };
                if p == q || q == r || r == p {
                    continue;
                }
                let inputs = vec![id, n1, n2];
                let base = self.root_index(&inputs);
                let output = Cluster::rigid(union(&[rigid, &c1, &c2]))?;
                let prototype = vec![
                    SelectionConstraint::NotClockwise(p.clone(), q.clone(), r.clone()),
                    SelectionConstraint::NotCounterClockwise(p.clone(), q.clone(), r.clone()),
                ];
                let geometry = MergeGeometry::Triangle {
                    triangle: Triangle::Ddd {
                        p,
                        q,
                        r,
                        pq: 1,
                        qr: 2,
                        rp: 0,
                    },
                    base: Some(base),
                    rigids: vec![0, 1, 2],
                };
                let plan = MergePlan::new(Rule::ClusterClusterCluster, inputs, output, geometry);
                self.merge(plan.prototype(prototype))?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Two rigids sharing `b` plus a hedgehog at `b` spanning both.
    fn try_chc(&mut self, r: ClusterId, n: ClusterId) -> Result<bool, SolverError> {
        let (rc, nc) = (self.cluster_of(r)?, self.cluster_of(n)?);
        let Some(b) = only(rc.shared(&nc)) else {
            return Ok(false);
        };
        for h in self.hedgehogs_at(&b) {
            let hog = self.cluster_of(h)?;
            let Some((_, xvars)) = outer(&hog) else {
                continue;
            };
            let a = xvars.iter().find(|v| rc.contains(v) && !nc.contains(v));
            let c = xvars.iter().find(|v| nc.contains(v) && !rc.contains(v));
            let (Some(a), Some(c)) = (a.cloned(), c.cloned()) else {
                continue;
            };
            let hog_id = self.hedgehog_input(h, &b, [a.clone(), c.clone()].into())?;
            let inputs = vec![r, n, hog_id];
            let base = self.root_index(&inputs[..2]);
            let output = Cluster::rigid(union(&[&rc, &nc]))?;
            let geometry = MergeGeometry::Triangle {
                triangle: Triangle::Dad {
                    a,
                    b,
                    c,
                    ab: 0,
                    hog: 2,
                    bc: 1,
                },
                base: Some(base),
                rigids: vec![0, 1],
            };
            self.merge(MergePlan::new(Rule::ClusterHedgehogCluster, inputs, output, geometry))?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Two rigids sharing `b` plus a hedgehog centred in one of them seeing
    /// `b` and a point `c` of the other.
    fn try_cch(&mut self, r: ClusterId, n: ClusterId) -> Result<bool, SolverError> {
        let (rc, nc) = (self.cluster_of(r)?, self.cluster_of(n)?);
        let Some(b) = only(rc.shared(&nc)) else {
            return Ok(false);
        };
        for (near, far, ab, bc) in [(&rc, &nc, 0, 1), (&nc, &rc, 1, 0)] {
            for a in near.vars() {
                if a == b {
                    continue;
                }
                for h in self.hedgehogs_at(&a) {
                    let hog = self.cluster_of(h)?;
                    let Some((_, xvars)) = outer(&hog) else {
                        continue;
                    };
                    if !xvars.contains(&b) {
                        continue;
                    }
                    let Some(c) = xvars.iter().find(|v| far.contains(v) && !near.contains(v)).cloned() else {
                        continue;
                    };
                    let hog_id = self.hedgehog_input(h, &a, [b.clone(), c.clone()].into())?;
                    let inputs = vec![r, n, hog_id];
                    let base = self.root_index(&inputs[..2]);
                    let output = Cluster::rigid(union(&[&rc, &nc]))?;
                    let prototype = vec![
                        SelectionConstraint::NotAcute(a.clone(), c.clone(), b.clone()),
                        SelectionConstraint::NotObtuse(a.clone(), c.clone(), b.clone()),
                    ];
                    let geometry = MergeGeometry::Triangle {
                        triangle: Triangle::Add {
                            a,
                            b,
                            c,
                            ab,
                            hog: 2,
                            bc,
                        },
                        base: Some(base),
                        rigids: vec![0, 1],
                    };
                    let plan = MergePlan::new(Rule::ClusterClusterHedgehog, inputs, output, geometry);
                    self.merge(plan.prototype(prototype))?;
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Two hedgehogs whose centres see each other and a common third point.
    fn hedgehogs_to_balloon(
        &mut self,
        id: ClusterId,
        a: &Variable,
        xvars: &BTreeSet<Variable>,
    ) -> Result<bool, SolverError> {
        for b in xvars {
            for h2 in self.hedgehogs_at(b) {
                let other = self.cluster_of(h2)?;
                let Some((_, oxvars)) = outer(&other) else {
                    continue;
                };
                if !oxvars.contains(a) {
                    continue;
                }
                for c in xvars.intersection(oxvars) {
                    let triangle: BTreeSet<Variable> = [a.clone(), b.clone(), c.clone()].into();
                    if self.covered(&triangle)? {
                        continue;
                    }
                    let hog_a = self.hedgehog_input(id, a, [b.clone(), c.clone()].into())?;
                    let hog_b = self.hedgehog_input(h2, b, [a.clone(), c.clone()].into())?;
                    let geometry = MergeGeometry::Triangle {
                        triangle: Triangle::Ada {
                            a: a.clone(),
                            b: b.clone(),
                            c: c.clone(),
                            hog_a: 0,
                            hog_b: 1,
                        },
                        base: None,
                        rigids: vec![],
                    };
                    let output = Cluster::balloon(triangle)?;
                    self.merge(MergePlan::new(
                        Rule::HedgehogsToBalloon,
                        vec![hog_a, hog_b],
                        output,
                        geometry,
                    ))?;
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Grow any top-level hedgehog centred in `id` with the angles `id` knows.
    fn extend_hedgehogs(&mut self, id: ClusterId, cluster: &Cluster) -> Result<bool, SolverError> {
        for v in cluster.vars() {
            for h in self.hedgehogs_at(&v) {
                let hog = self.cluster_of(h)?;
                let Some((_, xvars)) = outer(&hog) else {
                    continue;
                };
                if self.extend_hedgehog(id, cluster, &v, h, xvars)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Derive the hedgehog of `source` at `centre` and merge it into `hog`
    /// when that adds outer points.
    fn extend_hedgehog(
        &mut self,
        source: ClusterId,
        cluster: &Cluster,
        centre: &Variable,
        hog: ClusterId,
        xvars: &BTreeSet<Variable>,
    ) -> Result<bool, SolverError> {
        let mut seen = cluster.vars();
        seen.remove(centre);
        if seen.len() < 2 || seen.is_disjoint(xvars) || seen.is_subset(xvars) || self.depends_on(hog, source) {
            return Ok(false);
        }
        let shared = seen.intersection(xvars).count();
        let output = Cluster::hedgehog(centre.clone(), xvars.union(&seen).cloned())?;
        let derived = self.derive_hedgehog(source, centre.clone(), seen)?;
        let plan = MergePlan::new(
            Rule::HedgehogHedgehog,
            vec![hog, derived],
            output,
            MergeGeometry::Scaled { base: 0 },
        );
        self.merge(plan.redundant(shared >= 2))?;
        Ok(true)
    }

    // ─── Helpers ─────────────────────────────────────────────────────────────

    fn cluster_of(&self, id: ClusterId) -> Result<Cluster, SolverError> {
        Ok(self.node(id)?.cluster.clone())
    }

    /// Top-level clusters sharing a variable with `id`.
    fn neighbours(&self, id: ClusterId) -> Result<Vec<ClusterId>, SolverError> {
        let mut found = IndexSet::new();
        for var in self.node(id)?.cluster.vars() {
            for other in self.clusters_with(&var) {
                if other != id && self.is_top_level(other) {
                    found.insert(other);
                }
            }
        }
        Ok(found.into_iter().collect())
    }

    fn hedgehogs_at(&self, centre: &Variable) -> Vec<ClusterId> {
        self.clusters_with(centre)
            .into_iter()
            .filter(|&c| self.is_top_level(c))
            .filter(|&c| {
                self.clusters
                    .get(c)
                    .is_some_and(|n| matches!(&n.cluster, Cluster::Hedgehog { cvar, .. } if cvar == centre))
            })
            .collect()
    }

    /// A top-level rigid or balloon already holds all of `vars`.
    fn covered(&self, vars: &BTreeSet<Variable>) -> Result<bool, SolverError> {
        for id in self.top_level() {
            let cluster = &self.node(id)?.cluster;
            if cluster.kind() != ClusterKind::Hedgehog && vars.iter().all(|v| cluster.contains(v)) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// `hog` itself if its outer points are exactly `xvars`, otherwise a
    /// sub-hedgehog derived from it.
    fn hedgehog_input(
        &mut self,
        hog: ClusterId,
        centre: &Variable,
        xvars: BTreeSet<Variable>,
    ) -> Result<ClusterId, SolverError> {
        let exact = matches!(
            &self.node(hog)?.cluster,
            Cluster::Hedgehog { xvars: current, .. } if *current == xvars
        );
        if exact {
            return Ok(hog);
        }
        self.derive_hedgehog(hog, centre.clone(), xvars)
    }

    /// Index of the first rigid input holding the root, or 0.
    fn root_index(&self, inputs: &[ClusterId]) -> usize {
        inputs
            .iter()
            .position(|&c| self.contains_root(c) && self.clusters.get(c).is_some_and(|n| n.cluster.is_rigid()))
            .unwrap_or(0)
    }

    /// Whether `id` was computed, directly or not, from `on`.
    fn depends_on(&self, id: ClusterId, on: ClusterId) -> bool {
        let target = Vertex::Cluster(id);
        let mut seen = IndexSet::new();
        let mut queue = VecDeque::from([Vertex::Cluster(on)]);
        while let Some(v) = queue.pop_front() {
            if v == target {
                return true;
            }
            for next in self.graph.outgoing_vertices(&v) {
                if self.graph.get(&v, &next) == Some(&EdgeTag::Dependency) && seen.insert(next.clone()) {
                    queue.push_back(next);
                }
            }
        }
        false
    }
}
