use thiserror::Error;

use crate::cluster::Variable;

/// Arity violations when constructing a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    #[error("Rigid cluster needs at least one variable")]
    EmptyRigid,
    #[error("Hedgehog needs at least two outer variables, got {0}")]
    HedgehogTooSmall(usize),
    #[error("Hedgehog centre {0} is also one of its outer variables")]
    CentreInOuterSet(Variable),
    #[error("Balloon needs at least three variables, got {0}")]
    BalloonTooSmall(usize),
}

/// Failure while evaluating a method.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MethodError {
    #[error("Method {method} expected {expected} inputs, got {got}")]
    InputCount {
        method: String,
        expected: usize,
        got: usize,
    },
    #[error("Method {method} produced {got} values for {expected} outputs")]
    OutputCount {
        method: String,
        expected: usize,
        got: usize,
    },
    #[error("Method {method}: input configuration lacks variable {variable}")]
    MissingVariable { method: String, variable: String },
    #[error("Method {method}: inputs share too few points to be merged ({shared})")]
    Underdetermined { method: String, shared: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MethodGraphError {
    #[error("Unknown method-graph variable")]
    UnknownVariable,
    #[error("Unknown method")]
    UnknownMethod,
    #[error("Variable {0} is already determined by another method")]
    AlreadyDetermined(String),
    #[error("Adding method {0} would introduce a dependency cycle")]
    Cycle(String),
    #[error("Multi-method {method} must have exactly one output, got {outputs}")]
    MultiOutputCount { method: String, outputs: usize },
    #[error("Output {0} of a multi-method is not a multi-variable")]
    NotMultiVariable(String),
    #[error(transparent)]
    Method(#[from] MethodError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverError {
    #[error("Unknown cluster")]
    UnknownCluster,
    #[error("Cluster is not rigid")]
    NotRigid,
    #[error("Cluster was produced by a merge and cannot be removed directly")]
    DerivedCluster,
    #[error(transparent)]
    Cluster(#[from] ClusterError),
    #[error(transparent)]
    MethodGraph(#[from] MethodGraphError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProblemError {
    #[error("Point {0} already exists")]
    DuplicatePoint(Variable),
    #[error("Unknown point {0}")]
    UnknownPoint(Variable),
    #[error("Constraint refers to unknown variable {0}")]
    UnknownVariable(Variable),
    #[error("An equivalent constraint already exists")]
    DuplicateConstraint,
    #[error("Unknown constraint")]
    UnknownConstraint,
    #[error("Parameter does not match the constraint kind")]
    ParameterMismatch,
}

/// Any error raised by the geometric solver front end.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Problem(#[from] ProblemError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error(transparent)]
    Cluster(#[from] ClusterError),
    #[error(transparent)]
    MethodGraph(#[from] MethodGraphError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
