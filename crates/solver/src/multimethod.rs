//! Methods over candidate sets.
//!
//! A multi-variable holds a `Vec<T>` of candidate values. A [`MultiMethod`]
//! is written against single values; [`MethodGraph::add_multi_method`] wraps
//! it so that it is evaluated once for every combination of input candidates
//! and the results are collected into one candidate set.

use crate::error::{MethodError, MethodGraphError};
use crate::method::{Method, MethodGraph, MethodKey, VarKey};

pub trait MultiMethod<T> {
    fn name(&self) -> &str;

    /// All output candidates for one combination of input values.
    fn multi_execute(&self, inputs: &[&T]) -> Result<Vec<T>, MethodError>;
}

/// Runs a [`MultiMethod`] over the cartesian product of its inputs.
struct CartesianAdapter<M> {
    inner: M,
}

impl<T, M> Method<Vec<T>> for CartesianAdapter<M>
where
    T: PartialEq,
    M: MultiMethod<T>,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn execute(&self, inputs: &[&Vec<T>]) -> Result<Vec<Vec<T>>, MethodError> {
        let mut results: Vec<T> = Vec::new();
        let mut indices = vec![0usize; inputs.len()];

        if inputs.iter().all(|candidates| !candidates.is_empty()) {
            loop {
                let combination: Vec<&T> = inputs
                    .iter()
                    .zip(&indices)
                    .map(|(candidates, &i)| &candidates[i])
                    .collect();
                for value in self.inner.multi_execute(&combination)? {
                    if !results.contains(&value) {
                        results.push(value);
                    }
                }
                if !advance(&mut indices, inputs) {
                    break;
                }
            }
        }
        Ok(vec![results])
    }
}

/// Odometer step over the candidate indices; false once every combination
/// has been visited.
fn advance<T>(indices: &mut [usize], inputs: &[&Vec<T>]) -> bool {
    for (i, candidates) in indices.iter_mut().zip(inputs).rev() {
        *i += 1;
        if *i < candidates.len() {
            return true;
        }
        *i = 0;
    }
    false
}

impl<T> MethodGraph<Vec<T>>
where
    T: PartialEq + 'static,
{
    /// Register a multi-method. It must have exactly one output, which must
    /// be a multi-variable.
    pub fn add_multi_method<M>(
        &mut self,
        method: M,
        inputs: Vec<VarKey>,
        outputs: Vec<VarKey>,
    ) -> Result<MethodKey, MethodGraphError>
    where
        M: MultiMethod<T> + 'static,
    {
        let [output] = outputs.as_slice() else {
            return Err(MethodGraphError::MultiOutputCount {
                method: method.name().to_string(),
                outputs: outputs.len(),
            });
        };
        if !self.contains_variable(*output) {
            return Err(MethodGraphError::UnknownVariable);
        }
        if !self.is_multi(*output) {
            let label = self.label(*output).unwrap_or_default().to_string();
            return Err(MethodGraphError::NotMultiVariable(label));
        }
        self.add_method(Box::new(CartesianAdapter { inner: method }), inputs, outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Both signs of the sum of its inputs.
    struct PlusMinus;

    impl MultiMethod<i64> for PlusMinus {
        fn name(&self) -> &str {
            "plus_minus"
        }

        fn multi_execute(&self, inputs: &[&i64]) -> Result<Vec<i64>, MethodError> {
            let s: i64 = inputs.iter().copied().sum();
            Ok(vec![s, -s])
        }
    }

    #[test]
    fn test_cartesian_product_with_dedup() {
        let mut g = MethodGraph::new();
        let a = g.add_variable("a", true);
        let b = g.add_variable("b", true);
        let out = g.add_variable("out", true);
        g.add_multi_method(PlusMinus, vec![a, b], vec![out]).unwrap();

        g.set(a, vec![1, 2]).unwrap();
        g.set(b, vec![0, 1]).unwrap();
        g.propagate().unwrap();
        // sums 1, 2, 2, 3 with both signs, duplicates removed
        assert_eq!(g.get(out), Some(&vec![1, -1, 2, -2, 3, -3]));
    }

    #[test]
    fn test_empty_candidate_set_yields_empty_output() {
        let mut g = MethodGraph::new();
        let a = g.add_variable("a", true);
        let b = g.add_variable("b", true);
        let out = g.add_variable("out", true);
        g.add_multi_method(PlusMinus, vec![a, b], vec![out]).unwrap();
        g.set(a, vec![1]).unwrap();
        g.set(b, vec![]).unwrap();
        g.propagate().unwrap();
        assert_eq!(g.get(out), Some(&vec![]));
    }

    #[test]
    fn test_output_must_be_single_multi_variable() {
        let mut g: MethodGraph<Vec<i64>> = MethodGraph::new();
        let a = g.add_variable("a", true);
        let plain = g.add_variable("plain", false);
        let other = g.add_variable("other", true);

        assert_eq!(
            g.add_multi_method(PlusMinus, vec![a], vec![plain]),
            Err(MethodGraphError::NotMultiVariable("plain".into()))
        );
        assert!(matches!(
            g.add_multi_method(PlusMinus, vec![a], vec![plain, other]),
            Err(MethodGraphError::MultiOutputCount { outputs: 2, .. })
        ));
        assert_eq!(g.methods().count(), 0);
    }
}
