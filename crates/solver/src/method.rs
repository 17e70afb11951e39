//! Incremental dataflow over methods and variables.
//!
//! A [`MethodGraph`] holds variables and the methods that compute them. Each
//! variable is determined by at most one method and the dependency graph is
//! kept acyclic; both rules are checked before anything is inserted. Value
//! changes are recorded and only the affected part of the graph is
//! re-evaluated on [`MethodGraph::propagate`].

use indexmap::IndexSet;
use slotmap::{SlotMap, new_key_type};
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, instrument};

use crate::error::{MethodError, MethodGraphError};
use crate::graph::Graph;

new_key_type! {
    /// Handle for a method-graph variable.
    pub struct VarKey;
    /// Handle for a method registered in a method graph.
    pub struct MethodKey;
}

/// A computation from input values to output values.
pub trait Method<V> {
    fn name(&self) -> &str;

    /// Compute one value per output from one value per input.
    fn execute(&self, inputs: &[&V]) -> Result<Vec<V>, MethodError>;
}

struct VarNode<V> {
    label: String,
    value: Option<V>,
    multi: bool,
}

struct MethodNode<V> {
    method: Box<dyn Method<V>>,
    inputs: Vec<VarKey>,
    outputs: Vec<VarKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Node {
    Var(VarKey),
    Method(MethodKey),
}

pub struct MethodGraph<V> {
    variables: SlotMap<VarKey, VarNode<V>>,
    methods: SlotMap<MethodKey, MethodNode<V>>,
    topology: Graph<Node, ()>,
    changed: IndexSet<VarKey>,
    pending: IndexSet<MethodKey>,
}

impl<V> Default for MethodGraph<V> {
    fn default() -> Self {
        Self {
            variables: SlotMap::with_key(),
            methods: SlotMap::with_key(),
            topology: Graph::new(),
            changed: IndexSet::new(),
            pending: IndexSet::new(),
        }
    }
}

impl<V> fmt::Debug for MethodGraph<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodGraph")
            .field("variables", &self.variables.len())
            .field("methods", &self.methods.len())
            .field("changed", &self.changed.len())
            .finish()
    }
}

impl<V: 'static> MethodGraph<V> {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Variables ───────────────────────────────────────────────────────────

    /// Create an unset variable. `multi` marks it as holding a candidate set.
    pub fn add_variable(&mut self, label: impl Into<String>, multi: bool) -> VarKey {
        let key = self.variables.insert(VarNode {
            label: label.into(),
            value: None,
            multi,
        });
        self.topology.add_vertex(Node::Var(key));
        key
    }

    /// Create a variable holding `value`.
    pub fn add_variable_with(&mut self, label: impl Into<String>, multi: bool, value: V) -> VarKey {
        let key = self.add_variable(label, multi);
        if let Some(node) = self.variables.get_mut(key) {
            node.value = Some(value);
        }
        key
    }

    /// Remove a variable together with every method reading or writing it.
    pub fn remove_variable(&mut self, var: VarKey) -> Result<(), MethodGraphError> {
        if !self.variables.contains_key(var) {
            return Err(MethodGraphError::UnknownVariable);
        }
        for node in self.topology.adjacent_vertices(&Node::Var(var)) {
            if let Node::Method(m) = node {
                self.remove_method(m)?;
            }
        }
        self.topology.remove_vertex(&Node::Var(var));
        self.variables.remove(var);
        self.changed.shift_remove(&var);
        Ok(())
    }

    pub fn contains_variable(&self, var: VarKey) -> bool {
        self.variables.contains_key(var)
    }

    pub fn variables(&self) -> impl Iterator<Item = VarKey> + '_ {
        self.variables.keys()
    }

    pub fn is_multi(&self, var: VarKey) -> bool {
        self.variables.get(var).is_some_and(|v| v.multi)
    }

    pub fn label(&self, var: VarKey) -> Option<&str> {
        self.variables.get(var).map(|v| v.label.as_str())
    }

    pub fn get(&self, var: VarKey) -> Option<&V> {
        self.variables.get(var)?.value.as_ref()
    }

    /// Assign a value; dependants are updated on the next propagation.
    pub fn set(&mut self, var: VarKey, value: V) -> Result<(), MethodGraphError> {
        let node = self
            .variables
            .get_mut(var)
            .ok_or(MethodGraphError::UnknownVariable)?;
        node.value = Some(value);
        self.changed.insert(var);
        Ok(())
    }

    /// Unset a variable.
    pub fn clear(&mut self, var: VarKey) -> Result<(), MethodGraphError> {
        let node = self
            .variables
            .get_mut(var)
            .ok_or(MethodGraphError::UnknownVariable)?;
        node.value = None;
        self.changed.insert(var);
        Ok(())
    }

    // ─── Methods ─────────────────────────────────────────────────────────────

    /// Register a method. Nothing is inserted if an output is already
    /// determined or if the method would close a dependency cycle.
    pub fn add_method(
        &mut self,
        method: Box<dyn Method<V>>,
        inputs: Vec<VarKey>,
        outputs: Vec<VarKey>,
    ) -> Result<MethodKey, MethodGraphError> {
        if inputs
            .iter()
            .chain(&outputs)
            .any(|v| !self.variables.contains_key(*v))
        {
            return Err(MethodGraphError::UnknownVariable);
        }
        let mut seen = IndexSet::new();
        for &out in &outputs {
            let label = self.variables[out].label.clone();
            if !seen.insert(out) || self.determining_method(out).is_some() {
                return Err(MethodGraphError::AlreadyDetermined(label));
            }
            if inputs.contains(&out)
                || inputs
                    .iter()
                    .any(|inp| self.topology.path(&Node::Var(out), &Node::Var(*inp)).is_some())
            {
                return Err(MethodGraphError::Cycle(method.name().to_string()));
            }
        }

        let name = method.name().to_string();
        let key = self.methods.insert(MethodNode {
            method,
            inputs: inputs.clone(),
            outputs: outputs.clone(),
        });
        for inp in inputs {
            self.topology.add_edge(Node::Var(inp), Node::Method(key), ());
        }
        for out in outputs {
            self.topology.add_edge(Node::Method(key), Node::Var(out), ());
        }
        self.pending.insert(key);
        debug!(method = %name, "added method");
        Ok(key)
    }

    /// Remove a method and unset the variables it determined.
    pub fn remove_method(&mut self, method: MethodKey) -> Result<(), MethodGraphError> {
        let node = self
            .methods
            .remove(method)
            .ok_or(MethodGraphError::UnknownMethod)?;
        self.topology.remove_vertex(&Node::Method(method));
        self.pending.shift_remove(&method);
        for out in node.outputs {
            if let Some(v) = self.variables.get_mut(out) {
                v.value = None;
                self.changed.insert(out);
            }
        }
        Ok(())
    }

    pub fn contains_method(&self, method: MethodKey) -> bool {
        self.methods.contains_key(method)
    }

    pub fn methods(&self) -> impl Iterator<Item = MethodKey> + '_ {
        self.methods.keys()
    }

    pub fn method_name(&self, method: MethodKey) -> Option<&str> {
        self.methods.get(method).map(|m| m.method.name())
    }

    pub fn inputs(&self, method: MethodKey) -> &[VarKey] {
        self.methods.get(method).map_or(&[], |m| m.inputs.as_slice())
    }

    pub fn outputs(&self, method: MethodKey) -> &[VarKey] {
        self.methods.get(method).map_or(&[], |m| m.outputs.as_slice())
    }

    /// The method whose output is `var`, if any.
    pub fn determining_method(&self, var: VarKey) -> Option<MethodKey> {
        self.topology
            .ingoing_vertices(&Node::Var(var))
            .into_iter()
            .find_map(|n| match n {
                Node::Method(m) => Some(m),
                Node::Var(_) => None,
            })
    }

    fn consumers(&self, var: VarKey) -> Vec<MethodKey> {
        self.topology
            .outgoing_vertices(&Node::Var(var))
            .into_iter()
            .filter_map(|n| match n {
                Node::Method(m) => Some(m),
                Node::Var(_) => None,
            })
            .collect()
    }

    // ─── Evaluation ──────────────────────────────────────────────────────────

    /// Evaluate one method now and store its outputs. Downstream methods run
    /// on the next propagation.
    pub fn execute(&mut self, method: MethodKey) -> Result<(), MethodGraphError> {
        let node = self
            .methods
            .get(method)
            .ok_or(MethodGraphError::UnknownMethod)?;

        let inputs: Option<Vec<&V>> = node
            .inputs
            .iter()
            .map(|k| self.variables.get(*k).and_then(|v| v.value.as_ref()))
            .collect();
        let values: Vec<Option<V>> = match inputs {
            Some(inputs) => {
                let results = node.method.execute(&inputs)?;
                if results.len() != node.outputs.len() {
                    return Err(MethodError::OutputCount {
                        method: node.method.name().to_string(),
                        expected: node.outputs.len(),
                        got: results.len(),
                    }
                    .into());
                }
                results.into_iter().map(Some).collect()
            }
            None => node.outputs.iter().map(|_| None).collect(),
        };

        let outputs = node.outputs.clone();
        for (out, value) in outputs.into_iter().zip(values) {
            if let Some(v) = self.variables.get_mut(out) {
                v.value = value;
                self.changed.insert(out);
            }
        }
        Ok(())
    }

    /// Re-evaluate every method affected by changes since the last
    /// propagation, each after the methods it depends on.
    #[instrument(skip(self), fields(changed = self.changed.len(), pending = self.pending.len()))]
    pub fn propagate(&mut self) -> Result<(), MethodGraphError> {
        let mut affected: IndexSet<MethodKey> = std::mem::take(&mut self.pending);
        for var in std::mem::take(&mut self.changed) {
            affected.extend(self.consumers(var));
        }

        let mut queue: VecDeque<MethodKey> = affected.iter().copied().collect();
        while let Some(m) = queue.pop_front() {
            for &out in self.outputs(m) {
                for next in self.consumers(out) {
                    if affected.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }

        for m in self.topological_order(&affected) {
            self.execute(m)?;
        }
        self.changed.clear();
        debug!(executed = affected.len(), "propagated");
        Ok(())
    }

    /// Kahn ordering of `methods`, restricted to dependencies among them.
    fn topological_order(&self, methods: &IndexSet<MethodKey>) -> Vec<MethodKey> {
        let predecessors = |m: MethodKey| -> IndexSet<MethodKey> {
            self.inputs(m)
                .iter()
                .filter_map(|v| self.determining_method(*v))
                .filter(|d| methods.contains(d))
                .collect()
        };

        let mut indegree: Vec<usize> = methods.iter().map(|m| predecessors(*m).len()).collect();
        let mut ready: VecDeque<usize> = (0..methods.len()).filter(|i| indegree[*i] == 0).collect();
        let mut order = Vec::with_capacity(methods.len());

        while let Some(i) = ready.pop_front() {
            let m = methods[i];
            order.push(m);
            for &out in self.outputs(m) {
                for next in self.consumers(out) {
                    if let Some(j) = methods.get_index_of(&next) {
                        indegree[j] = indegree[j].saturating_sub(1);
                        if indegree[j] == 0 {
                            ready.push_back(j);
                        }
                    }
                }
            }
        }
        order
    }
}
