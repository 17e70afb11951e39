pub mod cluster;
pub mod clsolver;
pub mod config;
pub mod error;
pub mod geometric;
pub mod graph;
pub mod method;
pub mod multimethod;
pub mod notify;
pub mod problem;
pub mod selection;

/// Point positions keyed by solver variable.
pub type Configuration = geo_kernel::Configuration<cluster::Variable>;

// Re-export key types at crate root for convenience.
pub use cluster::{Angle, Cluster, ClusterKind, Distance, Relation, Variable};
pub use clsolver::{ClusterId, ClusterSolver, MergeId, MergeInfo, Rule};
pub use config::{AmbiguityFallback, SolverConfig};
pub use error::{ClusterError, Error, MethodError, MethodGraphError, ProblemError, Result, SolverError};
pub use geometric::{ClusterFlag, Constrainedness, GeometricCluster, GeometricSolver};
pub use problem::{Constraint, ConstraintId, GeometricProblem, Parameter};
pub use selection::SelectionConstraint;
