//! Dependency graph index
//!
//! Directed edges `from -> to` meaning `from` depends on `to`, kept in
//! forward and reverse adjacency maps. The graph is acyclic by
//! construction: an insert that would close a cycle is rejected before
//! any mutation.
//!
//! When a graph provider is installed the index becomes graph-backed:
//! adjacency and size queries delegate to the provider, the local edge
//! maps are ignored, and `all_edges` returns `None` because the edge set
//! lives outside the store.

use crate::graph::GraphAdapter;
use crs_core::error::{Error, Result};
use crs_core::types::DependencyEdge;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Owning container for the dependency graph
#[derive(Debug, Clone, Default)]
pub struct DependencyIndex {
    forward: HashMap<String, BTreeSet<String>>,
    reverse: HashMap<String, BTreeSet<String>>,
    edge_count: usize,
}

impl DependencyIndex {
    /// An empty index
    pub fn new() -> Self {
        DependencyIndex {
            forward: HashMap::new(),
            reverse: HashMap::new(),
            edge_count: 0,
        }
    }

    /// Rebuild from forward/reverse maps (restore path).
    ///
    /// The maps are trusted to be mutually consistent; the edge count is
    /// recomputed from the forward map.
    pub fn from_parts(
        forward: HashMap<String, BTreeSet<String>>,
        reverse: HashMap<String, BTreeSet<String>>,
    ) -> Self {
        let edge_count = forward.values().map(|s| s.len()).sum();
        DependencyIndex {
            forward,
            reverse,
            edge_count,
        }
    }

    /// Whether adding `from -> to` would close a directed cycle.
    ///
    /// True when `from` is reachable from `to` along existing forward
    /// edges (depth-first, iterative).
    pub fn would_cycle(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }
        let mut stack = vec![to.to_string()];
        let mut visited: HashSet<String> = HashSet::new();
        while let Some(node) = stack.pop() {
            if node == from {
                return true;
            }
            if !visited.insert(node.clone()) {
                continue;
            }
            if let Some(nexts) = self.forward.get(&node) {
                stack.extend(nexts.iter().cloned());
            }
        }
        false
    }

    /// Add an edge. Rejects self-edges and cycle-closing edges.
    ///
    /// Returns false if the edge already existed.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<bool> {
        if from.is_empty() || to.is_empty() {
            return Err(Error::EmptyId("dependency edge endpoint".into()));
        }
        if from == to {
            return Err(Error::SelfEdge(from.to_string()));
        }
        if self
            .forward
            .get(from)
            .map(|s| s.contains(to))
            .unwrap_or(false)
        {
            return Ok(false);
        }
        if self.would_cycle(from, to) {
            return Err(Error::CycleDetected {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        self.forward
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        self.reverse
            .entry(to.to_string())
            .or_default()
            .insert(from.to_string());
        self.edge_count += 1;
        Ok(true)
    }

    /// Remove an edge. Returns false if it was absent.
    pub fn remove_edge(&mut self, from: &str, to: &str) -> bool {
        let removed = match self.forward.get_mut(from) {
            Some(set) => set.remove(to),
            None => false,
        };
        if removed {
            if self.forward.get(from).map(|s| s.is_empty()).unwrap_or(false) {
                self.forward.remove(from);
            }
            if let Some(set) = self.reverse.get_mut(to) {
                set.remove(from);
                if set.is_empty() {
                    self.reverse.remove(to);
                }
            }
            self.edge_count -= 1;
        }
        removed
    }

    /// Nodes `node_id` depends on
    pub fn depends_on(&self, node_id: &str) -> Vec<String> {
        self.forward
            .get(node_id)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Nodes that depend on `node_id`
    pub fn depended_by(&self, node_id: &str) -> Vec<String> {
        self.reverse
            .get(node_id)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of edges
    pub fn size(&self) -> usize {
        self.edge_count
    }

    /// Scan the whole graph for any directed cycle (health check).
    ///
    /// The insert path keeps the graph acyclic, so a hit here means
    /// corruption. Iterative three-color depth-first search.
    pub fn find_any_cycle(&self) -> Option<String> {
        let mut done: HashSet<&str> = HashSet::new();
        for start in self.forward.keys() {
            if done.contains(start.as_str()) {
                continue;
            }
            let mut on_path: HashSet<&str> = HashSet::new();
            // Stack entries: (node, entered). A node is pushed twice: once
            // to enter, once to leave the path.
            let mut stack: Vec<(&str, bool)> = vec![(start.as_str(), false)];
            while let Some((node, entered)) = stack.pop() {
                if entered {
                    on_path.remove(node);
                    done.insert(node);
                    continue;
                }
                if done.contains(node) {
                    continue;
                }
                if !on_path.insert(node) {
                    continue;
                }
                stack.push((node, true));
                if let Some(nexts) = self.forward.get(node) {
                    for next in nexts {
                        if on_path.contains(next.as_str()) {
                            return Some(next.clone());
                        }
                        if !done.contains(next.as_str()) {
                            stack.push((next.as_str(), false));
                        }
                    }
                }
            }
        }
        None
    }

    /// The forward adjacency map (checkpoint path)
    pub fn forward(&self) -> &HashMap<String, BTreeSet<String>> {
        &self.forward
    }

    /// The reverse adjacency map (checkpoint path)
    pub fn reverse(&self) -> &HashMap<String, BTreeSet<String>> {
        &self.reverse
    }

    /// Freeze into a shareable read view; `adapter` marks graph-backed mode
    pub fn view(&self, adapter: Option<Arc<GraphAdapter>>) -> DependencyView {
        DependencyView {
            forward: Arc::new(self.forward.clone()),
            reverse: Arc::new(self.reverse.clone()),
            edge_count: self.edge_count,
            adapter,
        }
    }
}

/// Immutable read view over the dependency graph
#[derive(Debug, Clone)]
pub struct DependencyView {
    forward: Arc<HashMap<String, BTreeSet<String>>>,
    reverse: Arc<HashMap<String, BTreeSet<String>>>,
    edge_count: usize,
    adapter: Option<Arc<GraphAdapter>>,
}

impl DependencyView {
    /// Nodes `node_id` depends on
    pub fn depends_on(&self, node_id: &str) -> Vec<String> {
        match &self.adapter {
            Some(adapter) => adapter.depends_on(node_id),
            None => self
                .forward
                .get(node_id)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default(),
        }
    }

    /// Nodes that depend on `node_id`
    pub fn depended_by(&self, node_id: &str) -> Vec<String> {
        match &self.adapter {
            Some(adapter) => adapter.depended_by(node_id),
            None => self
                .reverse
                .get(node_id)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default(),
        }
    }

    /// Whether `node_id` can reach itself along forward edges.
    ///
    /// Always false for a healthy legacy graph; graph-backed mode asks
    /// the provider's adjacency.
    pub fn has_cycle(&self, node_id: &str) -> bool {
        let mut stack = self.depends_on(node_id);
        let mut visited: HashSet<String> = HashSet::new();
        while let Some(node) = stack.pop() {
            if node == node_id {
                return true;
            }
            if !visited.insert(node.clone()) {
                continue;
            }
            stack.extend(self.depends_on(&node));
        }
        false
    }

    /// Number of edges
    pub fn size(&self) -> usize {
        match &self.adapter {
            Some(adapter) => adapter.size(),
            None => self.edge_count,
        }
    }

    /// Every edge, or `None` in graph-backed mode (the edge set is
    /// external; consult the graph directly)
    pub fn all_edges(&self) -> Option<Vec<DependencyEdge>> {
        if self.adapter.is_some() {
            return None;
        }
        let mut edges = Vec::with_capacity(self.edge_count);
        for (from, tos) in self.forward.iter() {
            for to in tos {
                edges.push(DependencyEdge::new(from.clone(), to.clone()));
            }
        }
        edges.sort();
        Some(edges)
    }

    /// Whether adjacency is served by an external graph provider
    pub fn is_graph_backed(&self) -> bool {
        self.adapter.is_some()
    }

    /// The forward adjacency map, for restore and export
    pub fn forward(&self) -> &HashMap<String, BTreeSet<String>> {
        &self.forward
    }

    /// The reverse adjacency map, for restore and export
    pub fn reverse(&self) -> &HashMap<String, BTreeSet<String>> {
        &self.reverse
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // === Edge insertion ===

    #[test]
    fn test_add_and_query_edges() {
        let mut idx = DependencyIndex::new();
        assert!(idx.add_edge("a", "b").unwrap());
        assert!(idx.add_edge("a", "c").unwrap());
        assert!(!idx.add_edge("a", "b").unwrap()); // duplicate

        assert_eq!(idx.depends_on("a"), vec!["b".to_string(), "c".to_string()]);
        assert_eq!(idx.depended_by("b"), vec!["a".to_string()]);
        assert_eq!(idx.size(), 2);
    }

    #[test]
    fn test_self_edge_rejected() {
        let mut idx = DependencyIndex::new();
        assert!(matches!(idx.add_edge("a", "a"), Err(Error::SelfEdge(_))));
    }

    #[test]
    fn test_cycle_rejected() {
        let mut idx = DependencyIndex::new();
        idx.add_edge("a", "b").unwrap();
        idx.add_edge("b", "c").unwrap();
        let err = idx.add_edge("c", "a").unwrap_err();
        assert!(matches!(err, Error::CycleDetected { .. }));
        // Graph unchanged
        assert_eq!(idx.size(), 2);
        assert!(idx.depends_on("c").is_empty());
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let mut idx = DependencyIndex::new();
        idx.add_edge("a", "b").unwrap();
        idx.add_edge("a", "c").unwrap();
        idx.add_edge("b", "d").unwrap();
        idx.add_edge("c", "d").unwrap();
        assert_eq!(idx.size(), 4);
        assert!(idx.find_any_cycle().is_none());
    }

    #[test]
    fn test_remove_edge_cleans_adjacency() {
        let mut idx = DependencyIndex::new();
        idx.add_edge("a", "b").unwrap();
        assert!(idx.remove_edge("a", "b"));
        assert!(!idx.remove_edge("a", "b"));
        assert_eq!(idx.size(), 0);
        assert!(idx.depends_on("a").is_empty());
        assert!(idx.depended_by("b").is_empty());
        // Removing the edge allows the reverse edge now
        assert!(idx.add_edge("b", "a").unwrap());
    }

    // === View ===

    #[test]
    fn test_view_all_edges_sorted() {
        let mut idx = DependencyIndex::new();
        idx.add_edge("b", "c").unwrap();
        idx.add_edge("a", "b").unwrap();
        let view = idx.view(None);
        let edges = view.all_edges().unwrap();
        assert_eq!(
            edges,
            vec![DependencyEdge::new("a", "b"), DependencyEdge::new("b", "c")]
        );
        assert!(!view.is_graph_backed());
        assert!(!view.has_cycle("a"));
    }

    #[test]
    fn test_graph_backed_view_hides_edges() {
        use crs_core::traits::GraphProvider;

        struct StaticProvider;
        impl GraphProvider for StaticProvider {
            fn successors(&self, _: &str) -> Vec<String> {
                vec!["x".to_string()]
            }
            fn predecessors(&self, _: &str) -> Vec<String> {
                vec!["y".to_string()]
            }
            fn node_count(&self) -> usize {
                2
            }
            fn edge_count(&self) -> usize {
                1
            }
            fn generation(&self) -> u64 {
                0
            }
            fn close(&self) {}
        }

        let idx = DependencyIndex::new();
        let adapter = Arc::new(GraphAdapter::new(Arc::new(StaticProvider)));
        let view = idx.view(Some(adapter));
        assert!(view.is_graph_backed());
        assert!(view.all_edges().is_none());
        assert_eq!(view.size(), 1);
        assert_eq!(view.depends_on("n"), vec!["x".to_string()]);
        assert_eq!(view.depended_by("n"), vec!["y".to_string()]);
    }
}
