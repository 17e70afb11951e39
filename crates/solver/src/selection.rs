//! Choosing between candidate solutions.
//!
//! Merges that intersect circles or rays can produce two mirror-image
//! candidates. A [`SelectionConstraint`] is a boolean predicate on three
//! points; [`PrototypeMethod`] filters candidate sets with them, either
//! absolutely (user constraints) or by agreement with the prototype positions.

use serde::{Deserialize, Serialize};
use std::fmt;

use geo_kernel::geometry::vector::{is_acute, is_clockwise, is_counterclockwise, is_obtuse};

use crate::Configuration;
use crate::cluster::Variable;
use crate::config::{AmbiguityFallback, SolverConfig};
use crate::error::MethodError;
use crate::method::Method;

/// A predicate over the positions of three points.
///
/// Orientation constraints look at the triangle `(a, b, c)`; angle
/// constraints look at the angle at the middle point `b`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectionConstraint {
    NotClockwise(Variable, Variable, Variable),
    NotCounterClockwise(Variable, Variable, Variable),
    NotAcute(Variable, Variable, Variable),
    NotObtuse(Variable, Variable, Variable),
}

impl SelectionConstraint {
    pub fn variables(&self) -> [&Variable; 3] {
        match self {
            SelectionConstraint::NotClockwise(a, b, c)
            | SelectionConstraint::NotCounterClockwise(a, b, c)
            | SelectionConstraint::NotAcute(a, b, c)
            | SelectionConstraint::NotObtuse(a, b, c) => [a, b, c],
        }
    }

    /// Truth value on `conf`, or None when a variable is missing.
    pub fn evaluate(&self, conf: &Configuration) -> Option<bool> {
        let [a, b, c] = self.variables();
        let (pa, pb, pc) = (conf.position(a)?, conf.position(b)?, conf.position(c)?);
        Some(match self {
            SelectionConstraint::NotClockwise(..) => !is_clockwise(&pa, &pb, &pc),
            SelectionConstraint::NotCounterClockwise(..) => !is_counterclockwise(&pa, &pb, &pc),
            SelectionConstraint::NotAcute(..) => !is_acute(&pa, &pb, &pc),
            SelectionConstraint::NotObtuse(..) => !is_obtuse(&pa, &pb, &pc),
        })
    }
}

impl fmt::Display for SelectionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, [a, b, c]) = match self {
            SelectionConstraint::NotClockwise(..) => ("not_clockwise", self.variables()),
            SelectionConstraint::NotCounterClockwise(..) => ("not_counter_clockwise", self.variables()),
            SelectionConstraint::NotAcute(..) => ("not_acute", self.variables()),
            SelectionConstraint::NotObtuse(..) => ("not_obtuse", self.variables()),
        };
        write!(f, "{name}({a},{b},{c})")
    }
}

/// Selects among the candidates of one merge.
///
/// Inputs are the candidate set and a single-element set holding the
/// prototype configuration; the output is the selected candidate set.
pub struct PrototypeMethod {
    name: String,
    prototype_constraints: Vec<SelectionConstraint>,
    user_constraints: Vec<SelectionConstraint>,
    config: SolverConfig,
}

impl PrototypeMethod {
    pub fn new(
        name: impl Into<String>,
        prototype_constraints: Vec<SelectionConstraint>,
        user_constraints: Vec<SelectionConstraint>,
        config: SolverConfig,
    ) -> Self {
        Self {
            name: name.into(),
            prototype_constraints,
            user_constraints,
            config,
        }
    }

    pub fn select(&self, candidates: &[Configuration], prototype: Option<&Configuration>) -> Vec<Configuration> {
        let kept: Vec<Configuration> = candidates
            .iter()
            .filter(|c| self.user_constraints.iter().all(|sc| sc.evaluate(c) != Some(false)))
            .cloned()
            .collect();

        if kept.len() < 2 || !self.config.use_prototype || self.prototype_constraints.is_empty() {
            return kept;
        }
        let Some(prototype) = prototype else {
            return kept;
        };

        let matching: Vec<Configuration> = kept
            .iter()
            .filter(|c| {
                self.prototype_constraints
                    .iter()
                    .all(|sc| sc.evaluate(c) == sc.evaluate(prototype))
            })
            .cloned()
            .collect();
        if !matching.is_empty() {
            return matching;
        }
        match self.config.fallback {
            AmbiguityFallback::FirstCandidate => kept.into_iter().take(1).collect(),
            AmbiguityFallback::KeepAll => kept,
        }
    }
}

impl Method<Vec<Configuration>> for PrototypeMethod {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, inputs: &[&Vec<Configuration>]) -> Result<Vec<Vec<Configuration>>, MethodError> {
        let [candidates, prototype] = inputs else {
            return Err(MethodError::InputCount {
                method: self.name.clone(),
                expected: 2,
                got: inputs.len(),
            });
        };
        Ok(vec![self.select(candidates, prototype.first())])
    }
}
