//! The user-facing solver.
//!
//! [`GeometricSolver`] owns a [`GeometricProblem`] and mirrors it into a
//! [`ClusterSolver`]:
//!
//! - every point becomes a single-point rigid placed at its prototype,
//! - a distance becomes a two-point rigid,
//! - an angle becomes a hedgehog at its vertex with unit-length arms,
//! - all fixed points together form one rigid that is made the root,
//! - a selection constraint is handed to the cluster solver unchanged.
//!
//! Mutations go through the forwarding methods on the solver. Each one
//! changes the problem and then replays the problem's events.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use geo_kernel::Vec2;
use geo_kernel::geometry::vector::rotate;

use crate::Configuration;
use crate::clsolver::{ClusterId, ClusterSolver};
use crate::cluster::{Cluster, ClusterKind, Variable};
use crate::config::SolverConfig;
use crate::error::{ProblemError, Result, SolverError};
use crate::notify::ListenerId;
use crate::problem::{Constraint, ConstraintId, GeometricProblem, Parameter, ProblemEvent};

/// Classification of one node of the result tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterFlag {
    WellConstrained,
    /// Solved, but a merge could not fix the orientation of its parts.
    IncidentalUnder,
    /// Structurally fine, but no candidate survived.
    IncidentalOver,
    /// Redundant information from independent sources.
    StructuralOver,
    /// Parts that are not merged into one rigid body.
    StructuralUnder,
    Unsolved,
}

/// Overall verdict of a [`GeometricSolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Constrainedness {
    Unsolved,
    WellConstrained,
    UnderConstrained,
    OverConstrained,
    Error,
}

impl From<ClusterFlag> for Constrainedness {
    fn from(flag: ClusterFlag) -> Self {
        match flag {
            ClusterFlag::WellConstrained => Constrainedness::WellConstrained,
            ClusterFlag::IncidentalUnder | ClusterFlag::StructuralUnder => Constrainedness::UnderConstrained,
            ClusterFlag::IncidentalOver | ClusterFlag::StructuralOver => Constrainedness::OverConstrained,
            ClusterFlag::Unsolved => Constrainedness::Unsolved,
        }
    }
}

/// A node of the decomposition returned by [`GeometricSolver::get_result`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometricCluster {
    pub variables: Vec<Variable>,
    pub solutions: Vec<Configuration>,
    pub subs: Vec<GeometricCluster>,
    pub flag: ClusterFlag,
}

#[derive(Debug)]
pub struct GeometricSolver {
    problem: GeometricProblem,
    listener: ListenerId,
    solver: ClusterSolver,
    points: IndexMap<Variable, ClusterId>,
    clusters: IndexMap<ConstraintId, ClusterId>,
    fixed: IndexMap<Variable, Vec2>,
    root: Option<ClusterId>,
}

impl GeometricSolver {
    pub fn new(problem: GeometricProblem) -> Result<Self> {
        Self::with_config(problem, SolverConfig::default())
    }

    /// Take ownership of `problem` and mirror everything already in it.
    pub fn with_config(mut problem: GeometricProblem, config: SolverConfig) -> Result<Self> {
        let listener = problem.subscribe();
        let mut geometric = Self {
            problem,
            listener,
            solver: ClusterSolver::with_config(config),
            points: IndexMap::new(),
            clusters: IndexMap::new(),
            fixed: IndexMap::new(),
            root: None,
        };
        let points: Vec<(Variable, Vec2)> = geometric.problem.points().map(|(v, p)| (v.clone(), *p)).collect();
        for (var, position) in points {
            geometric.add_point_cluster(var, position)?;
        }
        let constraints: Vec<(ConstraintId, Constraint)> =
            geometric.problem.constraints().map(|(id, c)| (id, c.clone())).collect();
        for (id, constraint) in constraints {
            geometric.mirror_constraint(id, &constraint)?;
        }
        Ok(geometric)
    }

    pub fn problem(&self) -> &GeometricProblem {
        &self.problem
    }

    pub fn cluster_solver(&self) -> &ClusterSolver {
        &self.solver
    }

    // ─── Forwarding mutators ─────────────────────────────────────────────────

    pub fn add_point(&mut self, var: impl Into<Variable>, position: Vec2) -> Result<()> {
        self.problem.add_point(var, position)?;
        self.sync()
    }

    pub fn rem_point(&mut self, var: &Variable) -> Result<()> {
        self.problem.rem_point(var)?;
        self.sync()
    }

    pub fn set_point(&mut self, var: &Variable, position: Vec2) -> Result<()> {
        self.problem.set_point(var, position)?;
        self.sync()
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<ConstraintId> {
        let id = self.problem.add_constraint(constraint)?;
        self.sync()?;
        Ok(id)
    }

    pub fn rem_constraint(&mut self, id: ConstraintId) -> Result<Constraint> {
        let constraint = self.problem.rem_constraint(id)?;
        self.sync()?;
        Ok(constraint)
    }

    pub fn set_parameter(&mut self, id: ConstraintId, parameter: Parameter) -> Result<()> {
        self.problem.set_parameter(id, parameter)?;
        self.sync()
    }

    // ─── Mirroring ───────────────────────────────────────────────────────────

    /// Replay pending problem events into the cluster solver.
    #[instrument(skip(self))]
    fn sync(&mut self) -> Result<()> {
        for event in self.problem.drain_events(self.listener) {
            debug!(?event, "mirroring");
            match event {
                ProblemEvent::AddPoint(var) => {
                    let position = self.prototype_of(&var)?;
                    self.add_point_cluster(var, position)?;
                }
                ProblemEvent::RemovePoint(var) => {
                    if let Some(id) = self.points.shift_remove(&var) {
                        self.solver.remove(id)?;
                    }
                    self.solver.clear_prototype(&var)?;
                }
                ProblemEvent::SetPoint(var) => {
                    let position = self.prototype_of(&var)?;
                    if let Some(&id) = self.points.get(&var) {
                        self.solver.set(id, vec![single(&var, position)])?;
                    }
                    self.solver.set_prototype(var, position)?;
                }
                ProblemEvent::AddConstraint(id) => {
                    let constraint = self
                        .problem
                        .get_constraint(id)
                        .cloned()
                        .ok_or(ProblemError::UnknownConstraint)?;
                    self.mirror_constraint(id, &constraint)?;
                }
                ProblemEvent::RemoveConstraint(id, constraint) => self.unmirror_constraint(id, &constraint)?,
                ProblemEvent::SetParameter(id) => {
                    let constraint = self
                        .problem
                        .get_constraint(id)
                        .cloned()
                        .ok_or(ProblemError::UnknownConstraint)?;
                    self.update_parameter(id, &constraint)?;
                }
            }
        }
        Ok(())
    }

    fn prototype_of(&self, var: &Variable) -> Result<Vec2> {
        self.problem
            .get_point(var)
            .ok_or_else(|| ProblemError::UnknownPoint(var.clone()).into())
    }

    fn add_point_cluster(&mut self, var: Variable, position: Vec2) -> Result<()> {
        self.solver.set_prototype(var.clone(), position)?;
        let id = self.solver.add(Cluster::rigid([var.clone()])?)?;
        self.solver.set(id, vec![single(&var, position)])?;
        self.points.insert(var, id);
        Ok(())
    }

    fn mirror_constraint(&mut self, id: ConstraintId, constraint: &Constraint) -> Result<()> {
        match constraint {
            Constraint::Distance { a, b, .. } => {
                let cluster = self.solver.add(Cluster::rigid([a.clone(), b.clone()])?)?;
                self.clusters.insert(id, cluster);
                self.update_parameter(id, constraint)?;
            }
            Constraint::Angle { a, b, c, .. } => {
                let cluster = self
                    .solver
                    .add(Cluster::hedgehog(b.clone(), [a.clone(), c.clone()])?)?;
                self.clusters.insert(id, cluster);
                self.update_parameter(id, constraint)?;
            }
            Constraint::Fix { var, position } => {
                self.fixed.insert(var.clone(), *position);
                self.rebuild_root()?;
            }
            Constraint::Selection(s) => {
                self.solver.add_selection_constraint(s.clone())?;
            }
        }
        Ok(())
    }

    fn unmirror_constraint(&mut self, id: ConstraintId, constraint: &Constraint) -> Result<()> {
        match constraint {
            Constraint::Distance { .. } | Constraint::Angle { .. } => {
                if let Some(cluster) = self.clusters.shift_remove(&id) {
                    self.solver.remove(cluster)?;
                }
            }
            Constraint::Fix { var, .. } => {
                self.fixed.shift_remove(var);
                self.rebuild_root()?;
            }
            Constraint::Selection(s) => {
                self.solver.remove_selection_constraint(s)?;
            }
        }
        Ok(())
    }

    /// Place the points of a constraint cluster so they encode its value.
    fn update_parameter(&mut self, id: ConstraintId, constraint: &Constraint) -> Result<()> {
        let conf = match constraint {
            Constraint::Distance { a, b, distance } => {
                [(a.clone(), Vec2::zeros()), (b.clone(), Vec2::new(*distance, 0.0))]
                    .into_iter()
                    .collect::<Configuration>()
            }
            Constraint::Angle { a, b, c, angle } => {
                let arm = Vec2::new(1.0, 0.0);
                [
                    (b.clone(), Vec2::zeros()),
                    (a.clone(), arm),
                    (c.clone(), rotate(&arm, -angle)),
                ]
                .into_iter()
                .collect()
            }
            Constraint::Fix { var, position } => {
                self.fixed.insert(var.clone(), *position);
                if let Some(root) = self.root {
                    let conf = self.fixed_configuration();
                    self.solver.set(root, vec![conf])?;
                }
                return Ok(());
            }
            Constraint::Selection(_) => return Ok(()),
        };
        let cluster = *self
            .clusters
            .get(&id)
            .ok_or(ProblemError::UnknownConstraint)?;
        self.solver.set(cluster, vec![conf])?;
        Ok(())
    }

    fn fixed_configuration(&self) -> Configuration {
        Configuration::new(self.fixed.clone())
    }

    /// Replace the root rigid by one over the current fixed points. A single
    /// fixed point already makes a root, anchoring translation only.
    #[instrument(skip(self), fields(fixed = self.fixed.len()))]
    fn rebuild_root(&mut self) -> Result<()> {
        if let Some(old) = self.root.take() {
            self.solver.remove(old)?;
        }
        if self.fixed.is_empty() {
            return Ok(());
        }
        let root = self.solver.add(Cluster::rigid(self.fixed.keys().cloned())?)?;
        let conf = self.fixed_configuration();
        self.solver.set(root, vec![conf])?;
        self.solver.set_root(root)?;
        self.root = Some(root);
        Ok(())
    }

    // ─── Results ─────────────────────────────────────────────────────────────

    /// The decomposition as a tree. With several top-level clusters the root
    /// of the tree is a structurally under-constrained wrapper around them.
    pub fn get_result(&self) -> Result<GeometricCluster> {
        let top = self.solver.top_level();
        let mut nodes = top
            .iter()
            .map(|&id| self.result_node(id))
            .collect::<std::result::Result<Vec<_>, SolverError>>()?;
        if nodes.len() == 1 {
            if let Some(node) = nodes.pop() {
                return Ok(node);
            }
        }
        let flag = if nodes.is_empty() {
            ClusterFlag::Unsolved
        } else {
            ClusterFlag::StructuralUnder
        };
        Ok(GeometricCluster {
            variables: self.problem.points().map(|(v, _)| v.clone()).collect(),
            solutions: Vec::new(),
            subs: nodes,
            flag,
        })
    }

    pub fn get_constrainedness(&self) -> Constrainedness {
        match self.get_result() {
            Ok(result) => result.flag.into(),
            Err(_) => Constrainedness::Error,
        }
    }

    /// Solutions of the single top-level cluster, if there is exactly one.
    pub fn solutions(&self) -> Option<&[Configuration]> {
        match self.solver.top_level().as_slice() {
            [only] => self.solver.get(*only),
            _ => None,
        }
    }

    fn result_node(&self, id: ClusterId) -> std::result::Result<GeometricCluster, SolverError> {
        let cluster = self.solver.cluster(id).ok_or(SolverError::UnknownCluster)?;
        let solutions = self.solver.get(id);

        let mut subs = Vec::new();
        if let Some(info) = self
            .solver
            .determining_method(id)
            .and_then(|m| self.solver.merge_info(m))
        {
            for &input in &info.inputs {
                if !self.is_derived(input) {
                    subs.push(self.result_node(input)?);
                }
            }
        }

        let flag = if self.solver.is_overconstrained(id) {
            ClusterFlag::StructuralOver
        } else {
            match solutions {
                None => ClusterFlag::Unsolved,
                Some([]) => ClusterFlag::IncidentalOver,
                Some(s) if s.iter().any(Configuration::is_underconstrained) => ClusterFlag::IncidentalUnder,
                Some(_) if cluster.kind() != ClusterKind::Rigid => ClusterFlag::StructuralUnder,
                Some(_) => ClusterFlag::WellConstrained,
            }
        };

        Ok(GeometricCluster {
            variables: cluster.vars().into_iter().collect(),
            solutions: solutions.map(<[Configuration]>::to_vec).unwrap_or_default(),
            subs,
            flag,
        })
    }

    fn is_derived(&self, id: ClusterId) -> bool {
        self.solver
            .determining_method(id)
            .and_then(|m| self.solver.merge_info(m))
            .is_some_and(|info| info.rule.is_derive())
    }
}

fn single(var: &Variable, position: Vec2) -> Configuration {
    [(var.clone(), position)].into_iter().collect()
}
