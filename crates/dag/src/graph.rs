//! Vertex storage and edge bookkeeping.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{GraphError, Result};

/// Stable handle to a vertex slot. Ids are never reused, so a stale id
/// after [`Graph::remove`] resolves to nothing rather than to a
/// different vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub(crate) usize);

impl VertexId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A directed graph whose edges `(a, b)` mean "a depends on b".
#[derive(Debug, Clone, Default)]
pub struct Graph<V> {
    slots: Vec<Option<V>>,
    /// Per-slot dependencies (edges out of the slot).
    down: Vec<BTreeSet<usize>>,
    /// Per-slot dependants (edges into the slot).
    up: Vec<BTreeSet<usize>>,
}

impl<V> Graph<V> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            down: Vec::new(),
            up: Vec::new(),
        }
    }

    /// Number of live vertices.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add(&mut self, vertex: V) -> VertexId {
        let id = self.slots.len();
        self.slots.push(Some(vertex));
        self.down.push(BTreeSet::new());
        self.up.push(BTreeSet::new());
        VertexId(id)
    }

    pub fn contains(&self, id: VertexId) -> bool {
        self.slots.get(id.0).is_some_and(|s| s.is_some())
    }

    pub fn get(&self, id: VertexId) -> Option<&V> {
        self.slots.get(id.0)?.as_ref()
    }

    pub fn get_mut(&mut self, id: VertexId) -> Option<&mut V> {
        self.slots.get_mut(id.0)?.as_mut()
    }

    /// Remove a vertex along with its incident edges.
    pub fn remove(&mut self, id: VertexId) -> Option<V> {
        let vertex = self.slots.get_mut(id.0)?.take()?;
        for dep in std::mem::take(&mut self.down[id.0]) {
            self.up[dep].remove(&id.0);
        }
        for dependant in std::mem::take(&mut self.up[id.0]) {
            self.down[dependant].remove(&id.0);
        }
        Some(vertex)
    }

    /// Record that `from` depends on `to`. Self-edges are dropped.
    pub fn connect(&mut self, from: VertexId, to: VertexId) {
        if from == to {
            log::debug!("ignoring self-edge on {from}");
            return;
        }
        if !self.contains(from) || !self.contains(to) {
            return;
        }
        self.down[from.0].insert(to.0);
        self.up[to.0].insert(from.0);
    }

    pub fn disconnect(&mut self, from: VertexId, to: VertexId) {
        if from.0 < self.down.len() {
            self.down[from.0].remove(&to.0);
        }
        if to.0 < self.up.len() {
            self.up[to.0].remove(&from.0);
        }
    }

    pub fn has_edge(&self, from: VertexId, to: VertexId) -> bool {
        self.down.get(from.0).is_some_and(|d| d.contains(&to.0))
    }

    /// Live vertex ids in ascending order.
    pub fn ids(&self) -> Vec<VertexId> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|_| VertexId(i)))
            .collect()
    }

    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &V)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|v| (VertexId(i), v)))
    }

    /// All edges as (dependant, dependency) pairs, in slot order.
    pub fn edges(&self) -> Vec<(VertexId, VertexId)> {
        let mut out = Vec::new();
        for (i, deps) in self.down.iter().enumerate() {
            if self.slots[i].is_none() {
                continue;
            }
            for dep in deps {
                out.push((VertexId(i), VertexId(*dep)));
            }
        }
        out
    }

    /// Direct dependants of `id`: the vertices that must run after it.
    pub fn up_edges(&self, id: VertexId) -> Vec<VertexId> {
        self.up
            .get(id.0)
            .map(|s| s.iter().map(|i| VertexId(*i)).collect())
            .unwrap_or_default()
    }

    /// Direct dependencies of `id`: the vertices it must run after.
    pub fn down_edges(&self, id: VertexId) -> Vec<VertexId> {
        self.down
            .get(id.0)
            .map(|s| s.iter().map(|i| VertexId(*i)).collect())
            .unwrap_or_default()
    }

    /// Every vertex transitively reachable through dependency edges.
    pub fn ancestors(&self, id: VertexId) -> BTreeSet<VertexId> {
        self.reach(id, |g, i| &g.down[i])
    }

    /// Every vertex transitively reachable through dependant edges.
    pub fn descendants(&self, id: VertexId) -> BTreeSet<VertexId> {
        self.reach(id, |g, i| &g.up[i])
    }

    fn reach(
        &self,
        id: VertexId,
        next: impl Fn(&Self, usize) -> &BTreeSet<usize>,
    ) -> BTreeSet<VertexId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![id.0];
        while let Some(i) = stack.pop() {
            for n in next(self, i) {
                if seen.insert(VertexId(*n)) {
                    stack.push(*n);
                }
            }
        }
        seen
    }

    /// Vertices with no dependants: nothing in the graph runs after them.
    pub fn sinks(&self) -> Vec<VertexId> {
        self.ids()
            .into_iter()
            .filter(|id| self.up[id.0].is_empty())
            .collect()
    }

    /// Group vertices into dependency ranks: rank 0 has no dependencies,
    /// rank n depends only on earlier ranks. Within a rank, ids ascend.
    /// Fails when the edge set contains a cycle.
    pub fn topo_ranks(&self) -> Result<Vec<Vec<VertexId>>>
    where
        V: fmt::Display,
    {
        let ids = self.ids();
        let mut remaining: BTreeSet<usize> = ids.iter().map(|id| id.0).collect();
        let mut pending: std::collections::BTreeMap<usize, usize> = ids
            .iter()
            .map(|id| (id.0, self.down[id.0].len()))
            .collect();

        let mut ranks = Vec::new();
        while !remaining.is_empty() {
            let ready: Vec<usize> = remaining
                .iter()
                .copied()
                .filter(|i| pending[i] == 0)
                .collect();
            if ready.is_empty() {
                let members = remaining
                    .iter()
                    .map(|i| self.slots[*i].as_ref().map(|v| v.to_string()).unwrap_or_default())
                    .collect();
                return Err(GraphError::Cycle { members });
            }
            for i in &ready {
                remaining.remove(i);
                for dependant in &self.up[*i] {
                    if let Some(count) = pending.get_mut(dependant) {
                        *count = count.saturating_sub(1);
                    }
                }
            }
            ranks.push(ready.into_iter().map(VertexId).collect());
        }
        Ok(ranks)
    }

    /// Check the invariants expected of a fully built graph: an acyclic
    /// edge set converging on a single sink, with no stranded vertices.
    pub fn validate(&self) -> Result<()>
    where
        V: fmt::Display,
    {
        self.topo_ranks()?;

        let sinks = self.sinks();
        if self.len() > 1 && sinks.len() != 1 {
            return Err(GraphError::MultipleSinks {
                count: sinks.len(),
                members: sinks
                    .iter()
                    .map(|id| self.get(*id).map(|v| v.to_string()).unwrap_or_default())
                    .collect(),
            });
        }
        Ok(())
    }

    /// Remove every edge implied by a longer dependency path, leaving the
    /// minimal edge set with the same reachability.
    pub fn transitive_reduction(&mut self) {
        for id in self.ids() {
            let deps = self.down_edges(id);
            for candidate in &deps {
                let through_another = deps.iter().any(|other| {
                    other != candidate && self.ancestors(*other).contains(candidate)
                });
                if through_another {
                    self.disconnect(id, *candidate);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> (Graph<&'static str>, [VertexId; 4]) {
        let mut g = Graph::new();
        let top = g.add("top");
        let left = g.add("left");
        let right = g.add("right");
        let bottom = g.add("bottom");
        g.connect(left, top);
        g.connect(right, top);
        g.connect(bottom, left);
        g.connect(bottom, right);
        (g, [top, left, right, bottom])
    }

    #[test]
    fn test_edges_and_traversal() {
        let (g, [top, left, _right, bottom]) = diamond();
        assert_eq!(g.len(), 4);
        assert_eq!(g.up_edges(top).len(), 2);
        assert_eq!(g.down_edges(bottom).len(), 2);
        assert!(g.ancestors(bottom).contains(&top));
        assert!(g.descendants(top).contains(&bottom));
        assert!(!g.ancestors(left).contains(&bottom));
    }

    #[test]
    fn test_self_edge_dropped() {
        let mut g = Graph::new();
        let a = g.add("a");
        g.connect(a, a);
        assert!(g.edges().is_empty());
    }

    #[test]
    fn test_remove_clears_incident_edges() {
        let (mut g, [top, left, _right, bottom]) = diamond();
        g.remove(left);
        assert_eq!(g.len(), 3);
        assert!(!g.up_edges(top).contains(&left));
        assert!(!g.down_edges(bottom).contains(&left));
        assert!(g.get(left).is_none());
    }

    #[test]
    fn test_topo_ranks_deterministic() {
        let (g, [top, left, right, bottom]) = diamond();
        let ranks = g.topo_ranks().unwrap();
        assert_eq!(ranks, vec![vec![top], vec![left, right], vec![bottom]]);
    }

    #[test]
    fn test_cycle_detected() {
        let mut g = Graph::new();
        let a = g.add("a");
        let b = g.add("b");
        g.connect(a, b);
        g.connect(b, a);
        let err = g.topo_ranks().unwrap_err();
        assert!(matches!(err, GraphError::Cycle { .. }));
        assert!(err.to_string().contains("a"));
    }

    #[test]
    fn test_validate_single_sink() {
        let (mut g, [top, left, right, bottom]) = diamond();
        // bottom is the only vertex nothing depends on
        assert!(g.validate().is_ok());

        let stray = g.add("stray");
        assert!(matches!(
            g.validate(),
            Err(GraphError::MultipleSinks { count: 2, .. })
        ));
        g.connect(stray, bottom);
        let _ = (top, left, right);
        // now stray is the single sink again
        assert!(g.validate().is_ok());
    }

    #[test]
    fn test_transitive_reduction() {
        let mut g = Graph::new();
        let a = g.add("a");
        let b = g.add("b");
        let c = g.add("c");
        g.connect(c, b);
        g.connect(b, a);
        g.connect(c, a); // implied by c -> b -> a
        g.transitive_reduction();
        assert!(!g.has_edge(c, a));
        assert!(g.has_edge(c, b));
        assert!(g.has_edge(b, a));
    }
}
