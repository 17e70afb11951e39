//! Named points and the constraints between them.
//!
//! A [`GeometricProblem`] owns prototype positions for its points and a set
//! of [`Constraint`]s. Every mutation is published to listeners as a
//! [`ProblemEvent`], which is how the geometric solver keeps its cluster
//! decomposition in sync.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use std::f64::consts::PI;
use std::fmt;
use tracing::debug;

use geo_kernel::geometry::vector::angle_3p;
use geo_kernel::{Vec2, tol_eq, tol_eq_vec, tol_zero};

use crate::Configuration;
use crate::cluster::{Angle, Distance, Variable};
use crate::error::ProblemError;
use crate::graph::Graph;
use crate::notify::{ListenerId, Notifier};
use crate::selection::SelectionConstraint;

new_key_type! {
    /// Handle for a constraint of a [`GeometricProblem`].
    pub struct ConstraintId;
}

/// A constraint between named points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
    /// Distance between `a` and `b`.
    Distance { a: Variable, b: Variable, distance: f64 },
    /// Angle at `b` turning clockwise from the ray `b→a` to the ray `b→c`,
    /// in radians.
    Angle {
        a: Variable,
        b: Variable,
        c: Variable,
        angle: f64,
    },
    /// Position of a point in the world frame.
    Fix { var: Variable, position: Vec2 },
    /// Chirality or acuteness predicate every solution must satisfy.
    Selection(SelectionConstraint),
}

/// The numeric value carried by a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Parameter {
    Distance(f64),
    Angle(f64),
    Position(Vec2),
}

/// What makes two constraints equivalent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstraintKey {
    Distance(Distance),
    Angle(Angle),
    Fix(Variable),
    Selection(SelectionConstraint),
}

impl Constraint {
    pub fn distance(a: impl Into<Variable>, b: impl Into<Variable>, distance: f64) -> Self {
        Constraint::Distance {
            a: a.into(),
            b: b.into(),
            distance,
        }
    }

    pub fn angle(a: impl Into<Variable>, b: impl Into<Variable>, c: impl Into<Variable>, angle: f64) -> Self {
        Constraint::Angle {
            a: a.into(),
            b: b.into(),
            c: c.into(),
            angle,
        }
    }

    pub fn fix(var: impl Into<Variable>, position: Vec2) -> Self {
        Constraint::Fix {
            var: var.into(),
            position,
        }
    }

    pub fn variables(&self) -> Vec<&Variable> {
        match self {
            Constraint::Distance { a, b, .. } => vec![a, b],
            Constraint::Angle { a, b, c, .. } => vec![a, b, c],
            Constraint::Fix { var, .. } => vec![var],
            Constraint::Selection(s) => s.variables().to_vec(),
        }
    }

    pub fn parameter(&self) -> Option<Parameter> {
        match self {
            Constraint::Distance { distance, .. } => Some(Parameter::Distance(*distance)),
            Constraint::Angle { angle, .. } => Some(Parameter::Angle(*angle)),
            Constraint::Fix { position, .. } => Some(Parameter::Position(*position)),
            Constraint::Selection(_) => None,
        }
    }

    /// Replace the numeric value, which must be of the matching kind.
    pub fn set_parameter(&mut self, parameter: Parameter) -> Result<(), ProblemError> {
        match (self, parameter) {
            (Constraint::Distance { distance, .. }, Parameter::Distance(d)) => *distance = d,
            (Constraint::Angle { angle, .. }, Parameter::Angle(a)) => *angle = a,
            (Constraint::Fix { position, .. }, Parameter::Position(p)) => *position = p,
            _ => return Err(ProblemError::ParameterMismatch),
        }
        Ok(())
    }

    /// Whether the positions satisfy this constraint, None when a variable is
    /// missing.
    pub fn satisfied(&self, positions: &Configuration) -> Option<bool> {
        match self {
            Constraint::Distance { a, b, distance } => Some(tol_eq(positions.distance(a, b)?, *distance)),
            Constraint::Angle { a, b, c, angle } => {
                let ccw = angle_3p(&positions.position(a)?, &positions.position(b)?, &positions.position(c)?);
                Some(tol_zero(normalize_angle(ccw + angle)))
            }
            Constraint::Fix { var, position } => Some(tol_eq_vec(&positions.position(var)?, position)),
            Constraint::Selection(s) => s.evaluate(positions),
        }
    }

    fn key(&self) -> ConstraintKey {
        match self {
            Constraint::Distance { a, b, .. } => ConstraintKey::Distance(Distance::new(a.clone(), b.clone())),
            Constraint::Angle { a, b, c, .. } => ConstraintKey::Angle(Angle::new(a.clone(), b.clone(), c.clone())),
            Constraint::Fix { var, .. } => ConstraintKey::Fix(var.clone()),
            Constraint::Selection(s) => ConstraintKey::Selection(s.clone()),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Distance { a, b, distance } => write!(f, "distance({a},{b})={distance}"),
            Constraint::Angle { a, b, c, angle } => write!(f, "angle({a},{b},{c})={angle}"),
            Constraint::Fix { var, position } => write!(f, "fix({var})=({},{})", position.x, position.y),
            Constraint::Selection(s) => write!(f, "{s}"),
        }
    }
}

/// Map an angle into (-π, π].
fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(2.0 * PI);
    if wrapped > PI { wrapped - 2.0 * PI } else { wrapped }
}

// ─── ConstraintGraph ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Node {
    Variable(Variable),
    Constraint(ConstraintId),
}

/// Variables and constraints as a bipartite graph, edges pointing from each
/// constraint to its variables.
#[derive(Debug, Clone, Default)]
pub struct ConstraintGraph {
    graph: Graph<Node, ()>,
}

impl ConstraintGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, var: Variable) -> bool {
        self.graph.add_vertex(Node::Variable(var))
    }

    pub fn remove_variable(&mut self, var: &Variable) -> bool {
        self.graph.remove_vertex(&Node::Variable(var.clone()))
    }

    pub fn has_variable(&self, var: &Variable) -> bool {
        self.graph.has_vertex(&Node::Variable(var.clone()))
    }

    pub fn variables(&self) -> Vec<Variable> {
        self.graph
            .vertices()
            .filter_map(|n| match n {
                Node::Variable(v) => Some(v.clone()),
                Node::Constraint(_) => None,
            })
            .collect()
    }

    pub fn add_constraint<'a>(&mut self, id: ConstraintId, vars: impl IntoIterator<Item = &'a Variable>) {
        self.graph.add_vertex(Node::Constraint(id));
        for var in vars {
            self.graph
                .add_edge(Node::Constraint(id), Node::Variable(var.clone()), ());
        }
    }

    pub fn remove_constraint(&mut self, id: ConstraintId) -> bool {
        self.graph.remove_vertex(&Node::Constraint(id))
    }

    /// Constraints on `var`, oldest first.
    pub fn constraints_on(&self, var: &Variable) -> Vec<ConstraintId> {
        self.graph
            .ingoing_vertices(&Node::Variable(var.clone()))
            .into_iter()
            .filter_map(|n| match n {
                Node::Constraint(id) => Some(id),
                Node::Variable(_) => None,
            })
            .collect()
    }
}

// ─── GeometricProblem ────────────────────────────────────────────────────────

/// Change published by a [`GeometricProblem`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProblemEvent {
    AddPoint(Variable),
    RemovePoint(Variable),
    SetPoint(Variable),
    AddConstraint(ConstraintId),
    RemoveConstraint(ConstraintId, Constraint),
    SetParameter(ConstraintId),
}

#[derive(Debug, Default)]
pub struct GeometricProblem {
    points: IndexMap<Variable, Vec2>,
    constraints: SlotMap<ConstraintId, Constraint>,
    index: IndexMap<ConstraintKey, ConstraintId>,
    graph: ConstraintGraph,
    notifier: Notifier<ProblemEvent>,
}

impl GeometricProblem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> ListenerId {
        self.notifier.subscribe()
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.notifier.unsubscribe(id)
    }

    pub fn drain_events(&mut self, id: ListenerId) -> Vec<ProblemEvent> {
        self.notifier.drain(id)
    }

    // ─── Points ──────────────────────────────────────────────────────────────

    /// Add a point with its prototype position.
    pub fn add_point(&mut self, var: impl Into<Variable>, position: Vec2) -> Result<(), ProblemError> {
        let var = var.into();
        if self.points.contains_key(&var) {
            return Err(ProblemError::DuplicatePoint(var));
        }
        self.points.insert(var.clone(), position);
        self.graph.add_variable(var.clone());
        debug!(point = %var, "added point");
        self.notifier.notify(ProblemEvent::AddPoint(var));
        Ok(())
    }

    /// Remove a point and every constraint on it. Returns the removed
    /// constraints.
    pub fn rem_point(&mut self, var: &Variable) -> Result<Vec<(ConstraintId, Constraint)>, ProblemError> {
        if !self.points.contains_key(var) {
            return Err(ProblemError::UnknownPoint(var.clone()));
        }
        let mut removed = Vec::new();
        for id in self.graph.constraints_on(var) {
            let constraint = self.rem_constraint(id)?;
            removed.push((id, constraint));
        }
        self.points.shift_remove(var);
        self.graph.remove_variable(var);
        debug!(point = %var, constraints = removed.len(), "removed point");
        self.notifier.notify(ProblemEvent::RemovePoint(var.clone()));
        Ok(removed)
    }

    /// Move the prototype position of a point.
    pub fn set_point(&mut self, var: &Variable, position: Vec2) -> Result<(), ProblemError> {
        let slot = self
            .points
            .get_mut(var)
            .ok_or_else(|| ProblemError::UnknownPoint(var.clone()))?;
        *slot = position;
        self.notifier.notify(ProblemEvent::SetPoint(var.clone()));
        Ok(())
    }

    pub fn get_point(&self, var: &Variable) -> Option<Vec2> {
        self.points.get(var).copied()
    }

    pub fn has_point(&self, var: &Variable) -> bool {
        self.points.contains_key(var)
    }

    pub fn points(&self) -> impl Iterator<Item = (&Variable, &Vec2)> {
        self.points.iter()
    }

    /// Prototype positions of every point.
    pub fn prototype(&self) -> Configuration {
        Configuration::new(self.points.clone())
    }

    // ─── Constraints ─────────────────────────────────────────────────────────

    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<ConstraintId, ProblemError> {
        if let Some(var) = constraint.variables().into_iter().find(|v| !self.points.contains_key(*v)) {
            return Err(ProblemError::UnknownVariable(var.clone()));
        }
        let key = constraint.key();
        if self.index.contains_key(&key) {
            return Err(ProblemError::DuplicateConstraint);
        }
        let id = self.constraints.insert(constraint);
        self.index.insert(key, id);
        self.graph.add_constraint(id, self.constraints[id].variables());
        debug!(constraint = %self.constraints[id], "added constraint");
        self.notifier.notify(ProblemEvent::AddConstraint(id));
        Ok(id)
    }

    pub fn rem_constraint(&mut self, id: ConstraintId) -> Result<Constraint, ProblemError> {
        let constraint = self
            .constraints
            .remove(id)
            .ok_or(ProblemError::UnknownConstraint)?;
        self.index.shift_remove(&constraint.key());
        self.graph.remove_constraint(id);
        debug!(constraint = %constraint, "removed constraint");
        self.notifier
            .notify(ProblemEvent::RemoveConstraint(id, constraint.clone()));
        Ok(constraint)
    }

    pub fn set_parameter(&mut self, id: ConstraintId, parameter: Parameter) -> Result<(), ProblemError> {
        let constraint = self
            .constraints
            .get_mut(id)
            .ok_or(ProblemError::UnknownConstraint)?;
        constraint.set_parameter(parameter)?;
        self.notifier.notify(ProblemEvent::SetParameter(id));
        Ok(())
    }

    pub fn get_constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.get(id)
    }

    /// Every constraint, oldest first.
    pub fn constraints(&self) -> impl Iterator<Item = (ConstraintId, &Constraint)> {
        self.index
            .values()
            .filter_map(|&id| self.constraints.get(id).map(|c| (id, c)))
    }

    pub fn constraints_on(&self, var: &Variable) -> Vec<ConstraintId> {
        self.graph.constraints_on(var)
    }

    pub fn constraint_graph(&self) -> &ConstraintGraph {
        &self.graph
    }

    /// Whether `solution` places every point and satisfies every constraint.
    pub fn verify(&self, solution: &Configuration) -> bool {
        self.points.keys().all(|v| solution.contains(v))
            && self
                .constraints
                .values()
                .all(|c| c.satisfied(solution) == Some(true))
    }
}
