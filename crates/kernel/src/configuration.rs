//! Point configurations.
//!
//! A [`Configuration`] assigns a position to each of a set of variables. It is
//! the value type flowing through the solver: clusters carry sets of candidate
//! configurations, and merges combine them by aligning shared points.

use indexmap::IndexMap;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

use crate::geometry::transform::{cs_transform, make_hcs, make_hcs_scaled, transform_point, translation};
use crate::geometry::vector::Vec2;
use crate::tolerance::{tol_eq_vec, tol_zero};

/// An immutable map from variables to positions.
///
/// `underconstrained` is set whenever a merge producing this configuration
/// could not uniquely orient its parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "V: Serialize + Eq + Hash",
    deserialize = "V: Deserialize<'de> + Eq + Hash"
))]
pub struct Configuration<V> {
    map: IndexMap<V, Vec2>,
    underconstrained: bool,
}

/// How two configurations can be aligned.
enum Basis<V> {
    /// No shared variables.
    Empty,
    /// A single usable anchor point.
    Point(V),
    /// Two shared points that are distinct in both configurations.
    Segment(V, V),
}

impl<V> Configuration<V>
where
    V: Clone + Eq + Hash + Debug,
{
    pub fn new(map: IndexMap<V, Vec2>) -> Self {
        Self {
            map,
            underconstrained: false,
        }
    }

    pub fn is_underconstrained(&self) -> bool {
        self.underconstrained
    }

    /// A copy with the `underconstrained` flag replaced.
    pub fn with_underconstrained(mut self, underconstrained: bool) -> Self {
        self.underconstrained = underconstrained;
        self
    }

    pub fn vars(&self) -> impl Iterator<Item = &V> {
        self.map.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&V, &Vec2)> {
        self.map.iter()
    }

    pub fn map(&self) -> &IndexMap<V, Vec2> {
        &self.map
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, var: &V) -> bool {
        self.map.contains_key(var)
    }

    pub fn position(&self, var: &V) -> Option<Vec2> {
        self.map.get(var).copied()
    }

    /// Distance between two variables, if both are present.
    pub fn distance(&self, a: &V, b: &V) -> Option<f64> {
        Some((self.position(b)? - self.position(a)?).norm())
    }

    /// Apply a homogeneous transform to every point.
    pub fn transform(&self, t: &Matrix3<f64>) -> Self {
        Self {
            map: self
                .map
                .iter()
                .map(|(v, p)| (v.clone(), transform_point(t, p)))
                .collect(),
            underconstrained: self.underconstrained,
        }
    }

    /// Sub-configuration restricted to `vars` (variables not present are skipped).
    pub fn select<'a>(&self, vars: impl IntoIterator<Item = &'a V>) -> Self
    where
        V: 'a,
    {
        Self {
            map: vars
                .into_iter()
                .filter_map(|v| self.map.get(v).map(|p| (v.clone(), *p)))
                .collect(),
            underconstrained: self.underconstrained,
        }
    }

    fn basis(&self, other: &Self) -> (Basis<V>, bool) {
        let shared: Vec<&V> = self.map.keys().filter(|v| other.contains(v)).collect();
        let Some(first) = shared.first() else {
            return (Basis::Empty, true);
        };

        for (i, v1) in shared.iter().enumerate() {
            for v2 in &shared[i + 1..] {
                let d_self = (self.map[*v2] - self.map[*v1]).norm();
                let d_other = (other.map[*v2] - other.map[*v1]).norm();
                if !tol_zero(d_self) && !tol_zero(d_other) {
                    return (Basis::Segment((*v1).clone(), (*v2).clone()), false);
                }
            }
        }

        // A single anchor only fixes translation; the result is ambiguous unless
        // one side is a lone point. Coincident shared points are always ambiguous.
        let underconstrained = shared.len() > 1 || (self.len() > 1 && other.len() > 1);
        (Basis::Point((*first).clone()), underconstrained)
    }

    fn align(
        &self,
        other: &Self,
        make: fn(&Vec2, &Vec2) -> Option<Matrix3<f64>>,
    ) -> (Matrix3<f64>, bool) {
        let (basis, ambiguous) = self.basis(other);
        let inherited = self.underconstrained || other.underconstrained;
        let t = match basis {
            Basis::Empty => Matrix3::identity(),
            Basis::Point(v) => translation(&(self.map[&v] - other.map[&v])),
            Basis::Segment(v1, v2) => {
                let to = make(&self.map[&v1], &self.map[&v2]);
                let from = make(&other.map[&v1], &other.map[&v2]);
                match (from, to) {
                    (Some(from), Some(to)) => {
                        cs_transform(&from, &to).unwrap_or_else(Matrix3::identity)
                    }
                    _ => Matrix3::identity(),
                }
            }
        };
        (t, ambiguous || inherited)
    }

    /// Rigid transform (rotation and translation) mapping `other` onto `self`,
    /// plus whether the alignment is underconstrained.
    pub fn merge_transform(&self, other: &Self) -> (Matrix3<f64>, bool) {
        self.align(other, make_hcs)
    }

    /// Similarity transform (rotation, translation, uniform scale) mapping
    /// `other` onto `self`, plus whether the alignment is underconstrained.
    pub fn merge_scale_transform(&self, other: &Self) -> (Matrix3<f64>, bool) {
        self.align(other, make_hcs_scaled)
    }

    fn union_with(&self, other: &Self, t: &Matrix3<f64>, underconstrained: bool) -> Self {
        let mut map = self.map.clone();
        for (v, p) in &other.map {
            map.entry(v.clone()).or_insert_with(|| transform_point(t, p));
        }
        Self {
            map,
            underconstrained,
        }
    }

    /// Rigidly align `other` onto `self` and take the union of both point sets.
    /// Positions of shared variables are taken from `self`.
    pub fn merge(&self, other: &Self) -> Self {
        let (t, underconstrained) = self.merge_transform(other);
        self.union_with(other, &t, underconstrained)
    }

    /// Like [`merge`](Self::merge) but `other` may also be uniformly scaled.
    pub fn merge_scale(&self, other: &Self) -> Self {
        let (t, underconstrained) = self.merge_scale_transform(other);
        self.union_with(other, &t, underconstrained)
    }
}

impl<V> FromIterator<(V, Vec2)> for Configuration<V>
where
    V: Clone + Eq + Hash + Debug,
{
    fn from_iter<I: IntoIterator<Item = (V, Vec2)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Equality up to rigid motion: same variables, and every point coincides
/// after aligning `other` onto `self`.
impl<V> PartialEq for Configuration<V>
where
    V: Clone + Eq + Hash + Debug,
{
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() || !self.vars().all(|v| other.contains(v)) {
            return false;
        }
        let (t, _) = self.merge_transform(other);
        self.map
            .iter()
            .all(|(v, p)| tol_eq_vec(p, &transform_point(&t, &other.map[v])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::vector::rotate;
    use approx::assert_relative_eq;

    fn conf(points: &[(&'static str, f64, f64)]) -> Configuration<&'static str> {
        points
            .iter()
            .map(|(v, x, y)| (*v, Vec2::new(*x, *y)))
            .collect()
    }

    #[test]
    fn test_merge_two_shared_points() {
        let a = conf(&[("a", 0.0, 0.0), ("b", 1.0, 0.0)]);
        // same segment, rotated a quarter turn and shifted, plus a third point
        let b = conf(&[("a", 5.0, 5.0), ("b", 5.0, 6.0), ("c", 4.0, 5.0)]);
        let merged = a.merge(&b);
        assert!(!merged.is_underconstrained());
        assert_relative_eq!(merged.position(&"c").unwrap(), Vec2::new(0.0, 1.0), epsilon = 1e-9);
        assert_relative_eq!(merged.position(&"b").unwrap(), Vec2::new(1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_merge_single_shared_point_is_translation() {
        let a = conf(&[("a", 1.0, 1.0), ("b", 2.0, 1.0)]);
        let b = conf(&[("b", 0.0, 0.0), ("c", 0.0, 3.0)]);
        let merged = a.merge(&b);
        assert!(merged.is_underconstrained());
        assert_relative_eq!(merged.position(&"c").unwrap(), Vec2::new(2.0, 4.0), epsilon = 1e-12);
    }

    #[test]
    fn test_merge_with_lone_point_is_well_defined() {
        let point = conf(&[("a", 3.0, 3.0)]);
        let segment = conf(&[("a", 0.0, 0.0), ("b", 1.0, 0.0)]);
        let merged = point.merge(&segment);
        assert!(!merged.is_underconstrained());
        assert_relative_eq!(merged.position(&"b").unwrap(), Vec2::new(4.0, 3.0), epsilon = 1e-12);
    }

    #[test]
    fn test_merge_disjoint_is_underconstrained() {
        let a = conf(&[("a", 0.0, 0.0)]);
        let b = conf(&[("b", 1.0, 0.0)]);
        assert!(a.merge(&b).is_underconstrained());
    }

    #[test]
    fn test_merge_coincident_shared_points() {
        let a = conf(&[("a", 0.0, 0.0), ("b", 0.0, 0.0), ("x", 1.0, 0.0)]);
        let b = conf(&[("a", 2.0, 2.0), ("b", 2.0, 2.0), ("y", 3.0, 2.0)]);
        let merged = a.merge(&b);
        assert!(merged.is_underconstrained());
        assert_relative_eq!(merged.position(&"y").unwrap(), Vec2::new(1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_merge_scale() {
        let a = conf(&[("a", 0.0, 0.0), ("b", 2.0, 0.0)]);
        let b = conf(&[("a", 0.0, 0.0), ("b", 1.0, 0.0), ("c", 0.0, 1.0)]);
        let merged = a.merge_scale(&b);
        assert_relative_eq!(merged.position(&"c").unwrap(), Vec2::new(0.0, 2.0), epsilon = 1e-12);
        // rigid merge keeps the original size
        let rigid = a.merge(&b);
        assert_relative_eq!(rigid.position(&"c").unwrap(), Vec2::new(0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_select() {
        let a = conf(&[("a", 0.0, 0.0), ("b", 1.0, 0.0), ("c", 2.0, 0.0)]);
        let sub = a.select(&["a", "c", "z"]);
        assert_eq!(sub.len(), 2);
        assert!(sub.contains(&"c"));
        assert!(!sub.contains(&"b"));
    }

    #[test]
    fn test_equality_up_to_rigid_motion() {
        let a = conf(&[("a", 0.0, 0.0), ("b", 3.0, 0.0), ("c", 0.0, 4.0)]);
        let t = crate::geometry::transform::translation(&Vec2::new(7.0, -2.0));
        let rotated: Configuration<&str> = a
            .iter()
            .map(|(v, p)| (*v, rotate(p, 1.1)))
            .collect();
        let moved = rotated.transform(&t);
        assert_eq!(a, moved);

        // the mirror image is not congruent by a proper rigid motion
        let mirrored: Configuration<&str> = a.iter().map(|(v, p)| (*v, Vec2::new(p.x, -p.y))).collect();
        assert_ne!(a, mirrored);

        let other_vars = conf(&[("a", 0.0, 0.0), ("b", 3.0, 0.0), ("d", 0.0, 4.0)]);
        assert_ne!(a, other_vars);
    }

    #[test]
    fn test_serde_roundtrip_keeps_flag() {
        let a = conf(&[("a", 0.0, 0.0)]).with_underconstrained(true);
        let json = serde_json::to_string(&a).unwrap();
        let back: Configuration<String> = serde_json::from_str(&json).unwrap();
        assert!(back.is_underconstrained());
        assert_relative_eq!(back.position(&"a".to_string()).unwrap(), Vec2::zeros());
    }
}
