pub mod configuration;
pub mod geometry;
pub mod tolerance;
pub mod triangle;

// Re-export key types at crate root for convenience.
pub use configuration::Configuration;
pub use geometry::vector::Vec2;
pub use tolerance::{
    default_tolerance, tol_eq, tol_eq_vec, tol_ge, tol_gt, tol_le, tol_lt, tol_ne, tol_zero,
    Tolerance, TOL,
};
pub use triangle::{solve_ada, solve_add, solve_dad, solve_ddd};
