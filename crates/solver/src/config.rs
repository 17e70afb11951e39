use serde::{Deserialize, Serialize};

/// What survives a prototype-based selection when no candidate agrees with
/// the prototype.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmbiguityFallback {
    /// Keep only the first candidate.
    #[default]
    FirstCandidate,
    /// Keep every candidate.
    KeepAll,
}

/// Tuning for the cluster solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Use prototype positions to choose between mirror solutions.
    pub use_prototype: bool,
    pub fallback: AmbiguityFallback,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            use_prototype: true,
            fallback: AmbiguityFallback::FirstCandidate,
        }
    }
}
