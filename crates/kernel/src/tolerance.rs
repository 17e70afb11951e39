//! Approximate numeric comparison.
//!
//! Every comparison in the solver goes through these helpers instead of exact
//! float equality. Values may be `f64::INFINITY` / `f64::NEG_INFINITY`, which act
//! as sentinels: an infinity only equals the infinity of the same sign.

use approx::abs_diff_eq;

use crate::geometry::vector::Vec2;

/// Default absolute tolerance.
pub const TOL: f64 = 1e-6;

/// Tolerance configuration for approximate comparisons.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Values closer than this are considered equal.
    pub absolute: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self { absolute: TOL }
    }
}

impl Tolerance {
    pub fn new(absolute: f64) -> Self {
        Self { absolute }
    }

    pub fn eq(&self, a: f64, b: f64) -> bool {
        if a == b {
            // Also covers equal infinities.
            return true;
        }
        if a.is_infinite() || b.is_infinite() {
            return false;
        }
        abs_diff_eq!(a, b, epsilon = self.absolute)
    }

    pub fn ne(&self, a: f64, b: f64) -> bool {
        !self.eq(a, b)
    }

    pub fn lt(&self, a: f64, b: f64) -> bool {
        a < b && !self.eq(a, b)
    }

    pub fn gt(&self, a: f64, b: f64) -> bool {
        a > b && !self.eq(a, b)
    }

    pub fn le(&self, a: f64, b: f64) -> bool {
        a < b || self.eq(a, b)
    }

    pub fn ge(&self, a: f64, b: f64) -> bool {
        a > b || self.eq(a, b)
    }

    pub fn is_zero(&self, a: f64) -> bool {
        self.eq(a, 0.0)
    }

    /// Component-wise approximate equality of two vectors.
    pub fn eq_vec(&self, a: &Vec2, b: &Vec2) -> bool {
        self.eq(a.x, b.x) && self.eq(a.y, b.y)
    }
}

/// The default tolerance.
pub fn default_tolerance() -> Tolerance {
    Tolerance::default()
}

pub fn tol_eq(a: f64, b: f64) -> bool {
    default_tolerance().eq(a, b)
}

pub fn tol_ne(a: f64, b: f64) -> bool {
    default_tolerance().ne(a, b)
}

pub fn tol_lt(a: f64, b: f64) -> bool {
    default_tolerance().lt(a, b)
}

pub fn tol_gt(a: f64, b: f64) -> bool {
    default_tolerance().gt(a, b)
}

pub fn tol_le(a: f64, b: f64) -> bool {
    default_tolerance().le(a, b)
}

pub fn tol_ge(a: f64, b: f64) -> bool {
    default_tolerance().ge(a, b)
}

pub fn tol_zero(a: f64) -> bool {
    default_tolerance().is_zero(a)
}

pub fn tol_eq_vec(a: &Vec2, b: &Vec2) -> bool {
    default_tolerance().eq_vec(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eq_within_tolerance() {
        assert!(tol_eq(1.0, 1.0 + 1e-7));
        assert!(!tol_eq(1.0, 1.0 + 1e-5));
        assert!(tol_zero(-5e-7));
    }

    #[test]
    fn test_infinity_sentinels() {
        assert!(tol_eq(f64::INFINITY, f64::INFINITY));
        assert!(tol_eq(f64::NEG_INFINITY, f64::NEG_INFINITY));
        assert!(!tol_eq(f64::INFINITY, f64::NEG_INFINITY));
        assert!(!tol_eq(f64::INFINITY, 1e300));
        assert!(tol_lt(1e300, f64::INFINITY));
        assert!(tol_gt(f64::INFINITY, f64::NEG_INFINITY));
    }

    #[test]
    fn test_strict_orderings_exclude_equal() {
        assert!(!tol_lt(1.0, 1.0 + 1e-8));
        assert!(!tol_gt(1.0 + 1e-8, 1.0));
        assert!(tol_le(1.0 + 1e-8, 1.0));
        assert!(tol_ge(1.0, 1.0 + 1e-8));
        assert!(tol_lt(1.0, 2.0));
    }

    #[test]
    fn test_custom_tolerance() {
        let loose = Tolerance::new(0.1);
        assert!(loose.eq(1.0, 1.05));
        assert!(!default_tolerance().eq(1.0, 1.05));
        assert!(loose.eq_vec(&Vec2::new(1.0, 2.0), &Vec2::new(1.05, 1.95)));
    }
}
