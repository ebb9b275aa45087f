//! Graph-backed dependency adapter
//!
//! When an external code-graph provider is installed, the dependency
//! index delegates adjacency queries to it instead of its own edge maps.
//! The adapter memoizes the (potentially expensive) edge count and is
//! invalidated when the provider refreshes.
//!
//! Lifetime: the adapter is created at provider-install time and torn
//! down when the provider is cleared or replaced.

use crs_core::traits::GraphProvider;
use parking_lot::Mutex;
use std::sync::Arc;

/// Adapter installing an external graph behind the dependency index
pub struct GraphAdapter {
    provider: Arc<dyn GraphProvider>,
    size_cache: Mutex<Option<usize>>,
}

impl std::fmt::Debug for GraphAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphAdapter")
            .field("cached_size", &*self.size_cache.lock())
            .finish()
    }
}

impl GraphAdapter {
    /// Wrap a provider
    pub fn new(provider: Arc<dyn GraphProvider>) -> Self {
        GraphAdapter {
            provider,
            size_cache: Mutex::new(None),
        }
    }

    /// Nodes `node_id` depends on
    pub fn depends_on(&self, node_id: &str) -> Vec<String> {
        self.provider.successors(node_id)
    }

    /// Nodes that depend on `node_id`
    pub fn depended_by(&self, node_id: &str) -> Vec<String> {
        self.provider.predecessors(node_id)
    }

    /// Edge count, memoized until [`GraphAdapter::invalidate`]
    pub fn size(&self) -> usize {
        let mut cache = self.size_cache.lock();
        match *cache {
            Some(size) => size,
            None => {
                let size = self.provider.edge_count();
                *cache = Some(size);
                size
            }
        }
    }

    /// Drop the memoized size; the next `size()` re-queries the provider
    pub fn invalidate(&self) {
        *self.size_cache.lock() = None;
    }

    /// The underlying provider handle
    pub fn provider(&self) -> &Arc<dyn GraphProvider> {
        &self.provider
    }
}
