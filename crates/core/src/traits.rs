//! Core trait seams
//!
//! The store integrates with an externally owned code graph through the
//! [`GraphProvider`] trait. The provider is installed as a capability
//! handoff: the store holds the handle, the dependency index delegates
//! adjacency queries to it, and replacing the provider closes the old one.

/// Read-only view of an external code graph.
///
/// Implementations must be safe to share across snapshots and threads.
/// Adjacency queries return owned node-id lists so the provider is free
/// to compute them lazily or serve them from its own caches.
pub trait GraphProvider: Send + Sync {
    /// Nodes `node_id` depends on (outgoing edges)
    fn successors(&self, node_id: &str) -> Vec<String>;

    /// Nodes that depend on `node_id` (incoming edges)
    fn predecessors(&self, node_id: &str) -> Vec<String>;

    /// Total number of nodes in the graph
    fn node_count(&self) -> usize;

    /// Total number of edges in the graph
    fn edge_count(&self) -> usize;

    /// The provider's own refresh generation; bumps when the graph changes
    fn generation(&self) -> u64;

    /// Release any resources the provider holds. Idempotent.
    fn close(&self);
}
