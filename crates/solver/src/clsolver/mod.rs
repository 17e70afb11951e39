//! Incremental cluster rewriting.
//!
//! The [`ClusterSolver`] keeps a frontier of *top-level* clusters. Every new
//! cluster is pushed onto a FIFO worklist; popping it tries the merge rules for
//! its kind against the other top-level clusters. A merge replaces its inputs
//! by a single output cluster and installs methods in a [`MethodGraph`] that
//! compute the output's candidate configurations from the inputs' ones.
//!
//! Bookkeeping lives in an internal [`Graph`] whose vertices are variables,
//! clusters, merges and a few group vertices:
//!
//! - `Contains` edges go from a group to its members and from a cluster to its
//!   variables. Membership of the `TopLevel` group is the frontier.
//! - `Dependency` edges go from every input cluster to its merge and from the
//!   merge to its output.
//! - `NeededBy` edges go from a merge to every input it consumed.

mod methods;
mod rules;

pub use methods::{MergeGeometry, MergeMethod, Rule, Triangle};

use indexmap::{IndexMap, IndexSet};
use slotmap::{SlotMap, new_key_type};
use std::collections::{BTreeSet, VecDeque};
use tracing::{debug, info, instrument};

use geo_kernel::Vec2;

use crate::Configuration;
use crate::cluster::{Cluster, ClusterKind, Relation, Variable};
use crate::config::SolverConfig;
use crate::error::SolverError;
use crate::graph::Graph;
use crate::method::{MethodGraph, MethodKey, VarKey};
use crate::selection::{PrototypeMethod, SelectionConstraint};

new_key_type! {
    /// Handle for a cluster known to a [`ClusterSolver`].
    pub struct ClusterId;
    /// Handle for a merge or derivation performed by a [`ClusterSolver`].
    pub struct MergeId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Group {
    Root,
    TopLevel,
    Variables,
    Rigids,
    Hedgehogs,
    Balloons,
    Methods,
}

impl Group {
    const ALL: [Group; 7] = [
        Group::Root,
        Group::TopLevel,
        Group::Variables,
        Group::Rigids,
        Group::Hedgehogs,
        Group::Balloons,
        Group::Methods,
    ];

    fn of(kind: ClusterKind) -> Self {
        match kind {
            ClusterKind::Rigid => Group::Rigids,
            ClusterKind::Hedgehog => Group::Hedgehogs,
            ClusterKind::Balloon => Group::Balloons,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Vertex {
    Group(Group),
    Variable(Variable),
    Cluster(ClusterId),
    Merge(MergeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeTag {
    Dependency,
    Contains,
    NeededBy,
}

#[derive(Debug)]
struct ClusterNode {
    cluster: Cluster,
    overconstrained: bool,
    value: VarKey,
}

/// Public description of a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeInfo {
    pub rule: Rule,
    /// Every input, in the order the merge method receives them.
    pub inputs: Vec<ClusterId>,
    /// Inputs removed from the top level by this merge.
    pub consumed: Vec<ClusterId>,
    pub output: ClusterId,
    /// Redundant relations shared by the inputs all trace back to the same
    /// source clusters.
    pub consistent: bool,
    pub overconstrained: bool,
}

#[derive(Debug)]
struct MergeNode {
    info: MergeInfo,
    candidates: VarKey,
    merge_method: MethodKey,
    select_method: MethodKey,
    prototype: Vec<SelectionConstraint>,
}

/// A merge found by a search rule, not yet applied.
#[derive(Debug, Clone)]
struct MergePlan {
    rule: Rule,
    inputs: Vec<ClusterId>,
    consumed: Vec<ClusterId>,
    output: Cluster,
    /// The inputs share relations, so the merge is overconstrained unless
    /// those relations come from the same sources.
    redundant: bool,
    geometry: MergeGeometry,
    prototype: Vec<SelectionConstraint>,
}

#[derive(Debug)]
pub struct ClusterSolver {
    config: SolverConfig,
    clusters: SlotMap<ClusterId, ClusterNode>,
    merges: SlotMap<MergeId, MergeNode>,
    graph: Graph<Vertex, EdgeTag>,
    methods: MethodGraph<Vec<Configuration>>,
    prototype_var: VarKey,
    prototypes: IndexMap<Variable, Vec2>,
    selection: IndexSet<SelectionConstraint>,
    root: Option<ClusterId>,
    worklist: VecDeque<ClusterId>,
}

impl Default for ClusterSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterSolver {
    pub fn new() -> Self {
        Self::with_config(SolverConfig::default())
    }

    pub fn with_config(config: SolverConfig) -> Self {
        let mut methods = MethodGraph::new();
        let prototype_var =
            methods.add_variable_with("prototype", true, vec![Configuration::new(IndexMap::new())]);
        let mut graph = Graph::new();
        for group in Group::ALL {
            graph.add_vertex(Vertex::Group(group));
        }
        Self {
            config,
            clusters: SlotMap::with_key(),
            merges: SlotMap::with_key(),
            graph,
            methods,
            prototype_var,
            prototypes: IndexMap::new(),
            selection: IndexSet::new(),
            root: None,
            worklist: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    // ─── Mutation ────────────────────────────────────────────────────────────

    /// Add a cluster and merge it into the decomposition.
    #[instrument(skip(self, cluster), fields(cluster = %cluster))]
    pub fn add(&mut self, cluster: Cluster) -> Result<ClusterId, SolverError> {
        cluster.validate()?;
        let id = self.insert_cluster(cluster, false);
        self.worklist.push_back(id);
        self.process()?;
        self.methods.propagate()?;
        Ok(id)
    }

    /// Remove a cluster that was added with [`ClusterSolver::add`], and
    /// everything derived from it. Clusters that were only consumed by
    /// removed merges return to the top level. Merge outputs cannot be
    /// removed directly.
    #[instrument(skip(self))]
    pub fn remove(&mut self, id: ClusterId) -> Result<(), SolverError> {
        if !self.clusters.contains_key(id) {
            return Err(SolverError::UnknownCluster);
        }
        if self.determining_method(id).is_some() {
            return Err(SolverError::DerivedCluster);
        }
        self.remove_cluster(id)?;
        self.process()?;
        self.methods.propagate()?;
        Ok(())
    }

    /// Assign the candidate configurations of a cluster.
    #[instrument(skip(self, configurations), fields(count = configurations.len()))]
    pub fn set(&mut self, id: ClusterId, configurations: Vec<Configuration>) -> Result<(), SolverError> {
        let node = self.clusters.get(id).ok_or(SolverError::UnknownCluster)?;
        self.methods.set(node.value, configurations)?;
        self.methods.propagate()?;
        Ok(())
    }

    /// Make a rigid cluster the root: merges keep its coordinate frame.
    #[instrument(skip(self))]
    pub fn set_root(&mut self, id: ClusterId) -> Result<(), SolverError> {
        let node = self.clusters.get(id).ok_or(SolverError::UnknownCluster)?;
        if !node.cluster.is_rigid() {
            return Err(SolverError::NotRigid);
        }
        let old = self.root.replace(id).filter(|old| *old != id);
        if let Some(old) = old {
            self.graph
                .remove_edge(&Vertex::Group(Group::Root), &Vertex::Cluster(old));
        }
        self.graph.add_edge(
            Vertex::Group(Group::Root),
            Vertex::Cluster(id),
            EdgeTag::Contains,
        );
        if let Some(old) = old {
            self.rebuild_dependents(old)?;
        }
        self.rebuild_dependents(id)?;
        self.process()?;
        self.methods.propagate()?;
        Ok(())
    }

    /// Set the prototype position of a variable, used to choose between
    /// mirror solutions.
    pub fn set_prototype(&mut self, var: Variable, position: Vec2) -> Result<(), SolverError> {
        self.prototypes.insert(var, position);
        self.refresh_prototype()
    }

    pub fn clear_prototype(&mut self, var: &Variable) -> Result<(), SolverError> {
        if self.prototypes.shift_remove(var).is_some() {
            self.refresh_prototype()?;
        }
        Ok(())
    }

    pub fn prototype(&self, var: &Variable) -> Option<Vec2> {
        self.prototypes.get(var).copied()
    }

    /// Add a constraint that every solution must satisfy. Returns false if it
    /// was already present.
    pub fn add_selection_constraint(&mut self, constraint: SelectionConstraint) -> Result<bool, SolverError> {
        if !self.selection.insert(constraint) {
            return Ok(false);
        }
        self.rebuild_selectors()?;
        Ok(true)
    }

    pub fn remove_selection_constraint(&mut self, constraint: &SelectionConstraint) -> Result<bool, SolverError> {
        if !self.selection.shift_remove(constraint) {
            return Ok(false);
        }
        self.rebuild_selectors()?;
        Ok(true)
    }

    pub fn selection_constraints(&self) -> impl Iterator<Item = &SelectionConstraint> {
        self.selection.iter()
    }

    // ─── Queries ─────────────────────────────────────────────────────────────

    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id).map(|n| &n.cluster)
    }

    /// Candidate configurations of a cluster, None while unsolved.
    pub fn get(&self, id: ClusterId) -> Option<&[Configuration]> {
        let node = self.clusters.get(id)?;
        self.methods.get(node.value).map(Vec::as_slice)
    }

    pub fn is_overconstrained(&self, id: ClusterId) -> bool {
        self.clusters.get(id).is_some_and(|n| n.overconstrained)
    }

    pub fn root(&self) -> Option<ClusterId> {
        self.root
    }

    /// Whether the cluster is the root or was merged from it.
    pub fn contains_root(&self, id: ClusterId) -> bool {
        self.graph
            .has_edge(&Vertex::Group(Group::Root), &Vertex::Cluster(id))
    }

    pub fn is_top_level(&self, id: ClusterId) -> bool {
        self.graph
            .has_edge(&Vertex::Group(Group::TopLevel), &Vertex::Cluster(id))
    }

    pub fn top_level(&self) -> Vec<ClusterId> {
        self.group_clusters(Group::TopLevel)
    }

    pub fn rigids(&self) -> Vec<ClusterId> {
        self.group_clusters(Group::Rigids)
    }

    pub fn hedgehogs(&self) -> Vec<ClusterId> {
        self.group_clusters(Group::Hedgehogs)
    }

    pub fn balloons(&self) -> Vec<ClusterId> {
        self.group_clusters(Group::Balloons)
    }

    pub fn variables(&self) -> Vec<Variable> {
        self.graph
            .outgoing_vertices(&Vertex::Group(Group::Variables))
            .into_iter()
            .filter_map(|v| match v {
                Vertex::Variable(var) => Some(var),
                _ => None,
            })
            .collect()
    }

    pub fn methods(&self) -> Vec<MergeId> {
        self.graph
            .outgoing_vertices(&Vertex::Group(Group::Methods))
            .into_iter()
            .filter_map(|v| match v {
                Vertex::Merge(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn merge_info(&self, id: MergeId) -> Option<&MergeInfo> {
        self.merges.get(id).map(|m| &m.info)
    }

    /// The merge or derivation that produced a cluster.
    pub fn determining_method(&self, id: ClusterId) -> Option<MergeId> {
        let to = Vertex::Cluster(id);
        self.graph
            .ingoing_vertices(&to)
            .into_iter()
            .find_map(|v| match v {
                Vertex::Merge(m) if self.graph.get(&v, &to) == Some(&EdgeTag::Dependency) => Some(m),
                _ => None,
            })
    }

    /// Merges and derivations taking the cluster as input.
    pub fn consumers(&self, id: ClusterId) -> Vec<MergeId> {
        let from = Vertex::Cluster(id);
        self.graph
            .outgoing_vertices(&from)
            .into_iter()
            .filter_map(|v| match v {
                Vertex::Merge(m) if self.graph.get(&from, &v) == Some(&EdgeTag::Dependency) => Some(m),
                _ => None,
            })
            .collect()
    }

    /// Every cluster containing `var`, in insertion order.
    pub fn clusters_with(&self, var: &Variable) -> Vec<ClusterId> {
        self.graph
            .ingoing_vertices(&Vertex::Variable(var.clone()))
            .into_iter()
            .filter_map(|v| match v {
                Vertex::Cluster(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    fn group_clusters(&self, group: Group) -> Vec<ClusterId> {
        self.graph
            .outgoing_vertices(&Vertex::Group(group))
            .into_iter()
            .filter_map(|v| match v {
                Vertex::Cluster(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    // ─── Internal bookkeeping ────────────────────────────────────────────────

    fn insert_cluster(&mut self, cluster: Cluster, overconstrained: bool) -> ClusterId {
        let value = self.methods.add_variable(cluster.to_string(), true);
        let kind = cluster.kind();
        let vars = cluster.vars();
        let id = self.clusters.insert(ClusterNode {
            cluster,
            overconstrained,
            value,
        });
        let vertex = Vertex::Cluster(id);
        self.graph.add_edge(
            Vertex::Group(Group::of(kind)),
            vertex.clone(),
            EdgeTag::Contains,
        );
        self.graph.add_edge(
            Vertex::Group(Group::TopLevel),
            vertex.clone(),
            EdgeTag::Contains,
        );
        for var in vars {
            let var_vertex = Vertex::Variable(var);
            if !self.graph.has_vertex(&var_vertex) {
                self.graph.add_edge(
                    Vertex::Group(Group::Variables),
                    var_vertex.clone(),
                    EdgeTag::Contains,
                );
            }
            self.graph.add_edge(vertex.clone(), var_vertex, EdgeTag::Contains);
        }
        id
    }

    fn node(&self, id: ClusterId) -> Result<&ClusterNode, SolverError> {
        self.clusters.get(id).ok_or(SolverError::UnknownCluster)
    }

    fn process(&mut self) -> Result<(), SolverError> {
        while let Some(id) = self.worklist.pop_front() {
            if !self.is_top_level(id) {
                continue;
            }
            let kind = self.node(id)?.cluster.kind();
            let found = match kind {
                ClusterKind::Rigid => self.search_rigid(id)?,
                ClusterKind::Hedgehog => self.search_hedgehog(id)?,
                ClusterKind::Balloon => self.search_balloon(id)?,
            };
            if found && self.is_top_level(id) {
                self.worklist.push_back(id);
            }
        }
        Ok(())
    }

    /// Apply a merge: create its output, wire it into both graphs and take
    /// the consumed inputs off the top level.
    fn apply(&mut self, plan: MergePlan) -> Result<ClusterId, SolverError> {
        let MergePlan {
            rule,
            inputs,
            consumed,
            output,
            redundant,
            geometry,
            prototype,
        } = plan;

        let consistent = self.is_consistent(&inputs)?;
        let merge_over = redundant && !consistent;
        let mut overconstrained = merge_over;
        let mut root_marked = false;
        let mut input_vars = Vec::with_capacity(inputs.len());
        for &input in &inputs {
            let node = self.node(input)?;
            overconstrained |= node.overconstrained;
            root_marked |= node.cluster.is_rigid() && self.contains_root(input);
            input_vars.push(node.value);
        }
        root_marked &= output.is_rigid();

        let user = self.user_constraints_for(&inputs, &output)?;
        let output_label = output.to_string();
        let out = self.insert_cluster(output, overconstrained);
        if root_marked {
            self.graph.add_edge(
                Vertex::Group(Group::Root),
                Vertex::Cluster(out),
                EdgeTag::Contains,
            );
        }

        let candidates = self
            .methods
            .add_variable(format!("{rule}:{output_label}"), true);
        let merge_method = self.methods.add_multi_method(
            MergeMethod::new(rule, geometry),
            input_vars,
            vec![candidates],
        )?;
        let out_value = self.node(out)?.value;
        let select_method = self.methods.add_method(
            Box::new(PrototypeMethod::new(
                format!("select:{output_label}"),
                prototype.clone(),
                user,
                self.config,
            )),
            vec![candidates, self.prototype_var],
            vec![out_value],
        )?;

        let id = self.merges.insert(MergeNode {
            info: MergeInfo {
                rule,
                inputs: inputs.clone(),
                consumed: consumed.clone(),
                output: out,
                consistent,
                overconstrained: merge_over,
            },
            candidates,
            merge_method,
            select_method,
            prototype,
        });

        let vertex = Vertex::Merge(id);
        self.graph.add_edge(
            Vertex::Group(Group::Methods),
            vertex.clone(),
            EdgeTag::Contains,
        );
        for &input in &inputs {
            self.graph
                .add_edge(Vertex::Cluster(input), vertex.clone(), EdgeTag::Dependency);
        }
        self.graph
            .add_edge(vertex.clone(), Vertex::Cluster(out), EdgeTag::Dependency);
        for &c in &consumed {
            self.graph
                .add_edge(vertex.clone(), Vertex::Cluster(c), EdgeTag::NeededBy);
            self.graph
                .remove_edge(&Vertex::Group(Group::TopLevel), &Vertex::Cluster(c));
        }

        if merge_over || !consistent {
            info!(%rule, output = %output_label, consistent, overconstrained = merge_over, "redundant merge");
        } else {
            debug!(%rule, output = %output_label, inputs = inputs.len(), "merged");
        }
        Ok(out)
    }

    /// Apply a merge and queue its output for searching.
    fn merge(&mut self, plan: MergePlan) -> Result<ClusterId, SolverError> {
        let out = self.apply(plan)?;
        self.worklist.push_back(out);
        Ok(out)
    }

    /// Derive a sub-hedgehog at `cvar` from `source`. The source stays on the
    /// top level and the derived hedgehog is not queued.
    fn derive_hedgehog(
        &mut self,
        source: ClusterId,
        cvar: Variable,
        xvars: BTreeSet<Variable>,
    ) -> Result<ClusterId, SolverError> {
        let output = Cluster::hedgehog(cvar.clone(), xvars.iter().cloned())?;
        self.apply(MergePlan {
            rule: Rule::DeriveHedgehog,
            inputs: vec![source],
            consumed: vec![],
            output,
            redundant: false,
            geometry: MergeGeometry::Hedgehog { cvar, xvars },
            prototype: vec![],
        })
    }

    /// Relations known to `id` trace back to these clusters.
    fn sources(&self, id: ClusterId, relation: &Relation) -> BTreeSet<ClusterId> {
        let mut found = BTreeSet::new();
        if let Some(merge) = self.determining_method(id).and_then(|m| self.merges.get(m)) {
            for &input in &merge.info.inputs {
                if self
                    .clusters
                    .get(input)
                    .is_some_and(|n| n.cluster.implies(relation))
                {
                    found.extend(self.sources(input, relation));
                }
            }
        }
        if found.is_empty() {
            found.insert(id);
        }
        found
    }

    /// True when every relation implied by two inputs at once comes from the
    /// same sources on both sides.
    fn is_consistent(&self, inputs: &[ClusterId]) -> Result<bool, SolverError> {
        for (i, &c1) in inputs.iter().enumerate() {
            for &c2 in &inputs[i + 1..] {
                let shared = self.node(c1)?.cluster.intersection(&self.node(c2)?.cluster);
                let Some(shared) = shared else {
                    continue;
                };
                for relation in shared.relations() {
                    if self.sources(c1, &relation) != self.sources(c2, &relation) {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }

    /// User selection constraints that first become decidable at this merge.
    fn user_constraints_for(
        &self,
        inputs: &[ClusterId],
        output: &Cluster,
    ) -> Result<Vec<SelectionConstraint>, SolverError> {
        let mut applicable = Vec::new();
        for constraint in &self.selection {
            let vars = constraint.variables();
            if !vars.iter().all(|v| output.contains(v)) {
                continue;
            }
            let mut decided_earlier = false;
            for &input in inputs {
                let cluster = &self.node(input)?.cluster;
                decided_earlier |= vars.iter().all(|v| cluster.contains(v));
            }
            if !decided_earlier {
                applicable.push(constraint.clone());
            }
        }
        Ok(applicable)
    }

    fn refresh_prototype(&mut self) -> Result<(), SolverError> {
        let prototype = Configuration::new(self.prototypes.clone());
        self.methods.set(self.prototype_var, vec![prototype])?;
        self.methods.propagate()?;
        Ok(())
    }

    /// Reinstall every selector with the current user constraints.
    fn rebuild_selectors(&mut self) -> Result<(), SolverError> {
        let ids: Vec<MergeId> = self.merges.keys().collect();
        for id in ids {
            let Some(node) = self.merges.get(id) else {
                continue;
            };
            let output = node.info.output;
            let inputs = node.info.inputs.clone();
            let old = node.select_method;
            let candidates = node.candidates;
            let prototype = node.prototype.clone();

            let cluster = self.node(output)?.cluster.clone();
            let out_value = self.node(output)?.value;
            let user = self.user_constraints_for(&inputs, &cluster)?;
            self.methods.remove_method(old)?;
            let select = self.methods.add_method(
                Box::new(PrototypeMethod::new(
                    format!("select:{cluster}"),
                    prototype,
                    user,
                    self.config,
                )),
                vec![candidates, self.prototype_var],
                vec![out_value],
            )?;
            if let Some(node) = self.merges.get_mut(id) {
                node.select_method = select;
            }
        }
        self.methods.propagate()?;
        Ok(())
    }

    // ─── Removal ─────────────────────────────────────────────────────────────

    fn remove_cluster(&mut self, id: ClusterId) -> Result<(), SolverError> {
        for merge in self.consumers(id) {
            if self.merges.contains_key(merge) {
                self.remove_merge(merge)?;
            }
        }
        let Some(node) = self.clusters.remove(id) else {
            return Ok(());
        };
        if self.methods.contains_variable(node.value) {
            self.methods.remove_variable(node.value)?;
        }
        self.graph.remove_vertex(&Vertex::Cluster(id));
        for var in node.cluster.vars() {
            let vertex = Vertex::Variable(var);
            let still_used = self
                .graph
                .ingoing_vertices(&vertex)
                .iter()
                .any(|v| matches!(v, Vertex::Cluster(_)));
            if !still_used {
                self.graph.remove_vertex(&vertex);
            }
        }
        if self.root == Some(id) {
            self.root = None;
        }
        debug!(cluster = %node.cluster, "removed cluster");
        Ok(())
    }

    fn remove_merge(&mut self, id: MergeId) -> Result<(), SolverError> {
        let Some(node) = self.merges.remove(id) else {
            return Ok(());
        };
        for method in [node.select_method, node.merge_method] {
            if self.methods.contains_method(method) {
                self.methods.remove_method(method)?;
            }
        }
        if self.methods.contains_variable(node.candidates) {
            self.methods.remove_variable(node.candidates)?;
        }
        self.remove_cluster(node.info.output)?;
        self.graph.remove_vertex(&Vertex::Merge(id));
        debug!(rule = %node.info.rule, "removed merge");
        for input in node.info.consumed {
            self.restore(input)?;
        }
        Ok(())
    }

    /// Return a consumed cluster to the top level once nothing needs it. A
    /// derived cluster that nothing needs is dropped instead.
    fn restore(&mut self, id: ClusterId) -> Result<(), SolverError> {
        if !self.clusters.contains_key(id) || self.is_top_level(id) {
            return Ok(());
        }
        let vertex = Vertex::Cluster(id);
        let needed = self
            .graph
            .ingoing_vertices(&vertex)
            .iter()
            .any(|v| self.graph.get(v, &vertex) == Some(&EdgeTag::NeededBy));
        if needed {
            return Ok(());
        }
        let derived_by = self
            .determining_method(id)
            .filter(|m| self.merges.get(*m).is_some_and(|n| n.info.rule.is_derive()));
        if let Some(derive) = derived_by {
            return self.remove_merge(derive);
        }
        self.graph.add_edge(
            Vertex::Group(Group::TopLevel),
            vertex,
            EdgeTag::Contains,
        );
        self.worklist.push_back(id);
        debug!(cluster = ?id, "restored to top level");
        Ok(())
    }

    /// Undo every merge consuming `id` so that it is searched again.
    fn rebuild_dependents(&mut self, id: ClusterId) -> Result<(), SolverError> {
        if !self.clusters.contains_key(id) {
            return Ok(());
        }
        for merge in self.consumers(id) {
            self.remove_merge(merge)?;
        }
        if self.is_top_level(id) {
            self.worklist.push_back(id);
        }
        Ok(())
    }
}
