//! Directed weighted graph with insertion-ordered adjacency.
//!
//! Both the forward (`from → to → weight`) and reverse (`to → {from}`) maps are
//! kept so that ingoing queries cost the same as outgoing ones. All iteration
//! follows insertion order, which keeps every search built on top of the graph
//! deterministic.

use indexmap::{IndexMap, IndexSet};
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::hash::Hash;

use crate::notify::{ListenerId, Notifier};

/// Structural change published by a [`Graph`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphEvent<V> {
    AddVertex(V),
    RemoveVertex(V),
    AddEdge(V, V),
    RemoveEdge(V, V),
}

#[derive(Debug, Clone)]
pub struct Graph<V, E> {
    forward: IndexMap<V, IndexMap<V, E>>,
    reverse: IndexMap<V, IndexSet<V>>,
    notifier: Notifier<GraphEvent<V>>,
}

impl<V, E> Default for Graph<V, E> {
    fn default() -> Self {
        Self {
            forward: IndexMap::new(),
            reverse: IndexMap::new(),
            notifier: Notifier::default(),
        }
    }
}

impl<V, E> Graph<V, E>
where
    V: Clone + Eq + Hash + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for structural changes.
    pub fn subscribe(&mut self) -> ListenerId {
        self.notifier.subscribe()
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.notifier.unsubscribe(id)
    }

    pub fn drain_events(&mut self, id: ListenerId) -> Vec<GraphEvent<V>> {
        self.notifier.drain(id)
    }

    // ─── Mutation ────────────────────────────────────────────────────────────

    /// Insert a vertex. Returns false if it was already present.
    pub fn add_vertex(&mut self, v: V) -> bool {
        if self.forward.contains_key(&v) {
            return false;
        }
        self.forward.insert(v.clone(), IndexMap::new());
        self.reverse.insert(v.clone(), IndexSet::new());
        self.notifier.notify(GraphEvent::AddVertex(v));
        true
    }

    /// Remove a vertex together with all incident edges.
    pub fn remove_vertex(&mut self, v: &V) -> bool {
        if !self.forward.contains_key(v) {
            return false;
        }
        for to in self.outgoing_vertices(v) {
            self.remove_edge(v, &to);
        }
        for from in self.ingoing_vertices(v) {
            self.remove_edge(&from, v);
        }
        self.forward.shift_remove(v);
        self.reverse.shift_remove(v);
        self.notifier.notify(GraphEvent::RemoveVertex(v.clone()));
        true
    }

    /// Insert or re-weight the edge `from → to`, adding missing endpoints.
    pub fn add_edge(&mut self, from: V, to: V, weight: E) {
        self.add_vertex(from.clone());
        self.add_vertex(to.clone());
        let Some(out) = self.forward.get_mut(&from) else {
            return;
        };
        let is_new = out.insert(to.clone(), weight).is_none();
        if let Some(ins) = self.reverse.get_mut(&to) {
            ins.insert(from.clone());
        }
        if is_new {
            self.notifier.notify(GraphEvent::AddEdge(from, to));
        }
    }

    /// Remove the edge `from → to`, returning its weight.
    pub fn remove_edge(&mut self, from: &V, to: &V) -> Option<E> {
        let weight = self.forward.get_mut(from)?.shift_remove(to)?;
        if let Some(ins) = self.reverse.get_mut(to) {
            ins.shift_remove(from);
        }
        self.notifier
            .notify(GraphEvent::RemoveEdge(from.clone(), to.clone()));
        Some(weight)
    }

    // ─── Queries ─────────────────────────────────────────────────────────────

    pub fn has_vertex(&self, v: &V) -> bool {
        self.forward.contains_key(v)
    }

    pub fn has_edge(&self, from: &V, to: &V) -> bool {
        self.get(from, to).is_some()
    }

    /// Weight of the edge `from → to`.
    pub fn get(&self, from: &V, to: &V) -> Option<&E> {
        self.forward.get(from)?.get(to)
    }

    pub fn vertex_count(&self) -> usize {
        self.forward.len()
    }

    pub fn vertices(&self) -> impl Iterator<Item = &V> {
        self.forward.keys()
    }

    pub fn edges(&self) -> impl Iterator<Item = (&V, &V, &E)> {
        self.forward
            .iter()
            .flat_map(|(from, out)| out.iter().map(move |(to, w)| (from, to, w)))
    }

    pub fn outgoing_vertices(&self, v: &V) -> Vec<V> {
        self.forward
            .get(v)
            .map(|out| out.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn ingoing_vertices(&self, v: &V) -> Vec<V> {
        self.reverse
            .get(v)
            .map(|ins| ins.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Outgoing then ingoing neighbours, without duplicates.
    pub fn adjacent_vertices(&self, v: &V) -> Vec<V> {
        let mut seen: IndexSet<V> = self.outgoing_vertices(v).into_iter().collect();
        seen.extend(self.ingoing_vertices(v));
        seen.into_iter().collect()
    }

    pub fn outgoing_edges(&self, v: &V) -> Vec<(V, V)> {
        self.outgoing_vertices(v)
            .into_iter()
            .map(|to| (v.clone(), to))
            .collect()
    }

    pub fn ingoing_edges(&self, v: &V) -> Vec<(V, V)> {
        self.ingoing_vertices(v)
            .into_iter()
            .map(|from| (from, v.clone()))
            .collect()
    }

    /// Every vertex reachable from `v` through at least one edge.
    pub fn reachable(&self, v: &V) -> IndexSet<V> {
        let mut seen = IndexSet::new();
        let mut queue: VecDeque<V> = self.outgoing_vertices(v).into();
        while let Some(next) = queue.pop_front() {
            if seen.insert(next.clone()) {
                queue.extend(self.outgoing_vertices(&next));
            }
        }
        seen
    }

    /// Shortest directed path from `from` to `to`, both endpoints included.
    pub fn path(&self, from: &V, to: &V) -> Option<Vec<V>> {
        if !self.has_vertex(from) || !self.has_vertex(to) {
            return None;
        }
        let mut parent: IndexMap<V, Option<V>> = IndexMap::new();
        parent.insert(from.clone(), None);
        let mut queue = VecDeque::from([from.clone()]);

        while let Some(current) = queue.pop_front() {
            if &current == to {
                let mut path = vec![current];
                while let Some(Some(p)) = path.last().and_then(|last| parent.get(last)) {
                    path.push(p.clone());
                }
                path.reverse();
                return Some(path);
            }
            for next in self.outgoing_vertices(&current) {
                if !parent.contains_key(&next) {
                    parent.insert(next.clone(), Some(current.clone()));
                    queue.push_back(next);
                }
            }
        }
        None
    }

    /// Weakly connected components, in order of their first vertex.
    pub fn connected_subsets(&self) -> Vec<IndexSet<V>> {
        let mut assigned: IndexSet<V> = IndexSet::new();
        let mut subsets = Vec::new();
        for start in self.forward.keys() {
            if assigned.contains(start) {
                continue;
            }
            let mut component = IndexSet::new();
            let mut queue = VecDeque::from([start.clone()]);
            while let Some(v) = queue.pop_front() {
                if component.insert(v.clone()) {
                    queue.extend(self.adjacent_vertices(&v));
                }
            }
            assigned.extend(component.iter().cloned());
            subsets.push(component);
        }
        subsets
    }
}

impl<V> Graph<V, f64>
where
    V: Clone + Eq + Hash + Debug,
{
    /// Global minimum cut of the undirected view (Stoer–Wagner).
    ///
    /// Edge weights in both directions are summed and must be non-negative.
    /// Returns the cut weight and one side of the partition, or None for
    /// graphs with fewer than two vertices.
    pub fn min_cut(&self) -> Option<(f64, IndexSet<V>)> {
        let n = self.forward.len();
        if n < 2 {
            return None;
        }

        let mut w = vec![vec![0.0; n]; n];
        for (from, to, weight) in self.edges() {
            let (Some(i), Some(j)) = (self.forward.get_index_of(from), self.forward.get_index_of(to))
            else {
                continue;
            };
            if i != j {
                w[i][j] += *weight;
                w[j][i] += *weight;
            }
        }

        let mut groups: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
        let mut active: Vec<usize> = (0..n).collect();
        let mut best: Option<(f64, Vec<usize>)> = None;

        while active.len() > 1 {
            let mut added = vec![false; n];
            let mut key = vec![0.0; n];
            let mut prev = active[0];
            let mut last = active[0];
            let mut cut_of_phase = 0.0;

            for _ in 0..active.len() {
                let Some(sel) = active
                    .iter()
                    .copied()
                    .filter(|&v| !added[v])
                    .min_by(|&a, &b| key[b].partial_cmp(&key[a]).unwrap_or(Ordering::Equal))
                else {
                    break;
                };
                added[sel] = true;
                prev = last;
                last = sel;
                cut_of_phase = key[sel];
                for &v in &active {
                    if !added[v] {
                        key[v] += w[sel][v];
                    }
                }
            }

            if best.as_ref().is_none_or(|(b, _)| cut_of_phase < *b) {
                best = Some((cut_of_phase, groups[last].clone()));
            }

            // contract `last` into `prev`
            let merged = std::mem::take(&mut groups[last]);
            groups[prev].extend(merged);
            for &v in &active {
                w[prev][v] += w[last][v];
                w[v][prev] = w[prev][v];
            }
            w[prev][prev] = 0.0;
            active.retain(|&v| v != last);
        }

        let (weight, side) = best?;
        let side = side
            .into_iter()
            .filter_map(|i| self.forward.get_index(i).map(|(v, _)| v.clone()))
            .collect();
        Some((weight, side))
    }
}
