//! Frozen, consistent view of the whole store at one generation
//!
//! Every snapshot is built from cloned or otherwise unshared data, so a
//! reader can keep it across subsequent writes without ever observing a
//! partial update. Streaming statistics are deep-copied because the live
//! container carries its own mutex; clauses are duplicated so readers see
//! a stable view.

use crs_core::traits::GraphProvider;
use crs_index::{
    ConstraintView, DependencyView, HistoryView, ProofView, SimilarityView, StreamingView,
};
use std::sync::Arc;

/// Immutable view of all six indexes at a single generation.
///
/// Cheap to clone: the index views share their frozen backing maps.
#[derive(Clone)]
pub struct Snapshot {
    generation: u64,
    created_at: i64,
    proof: ProofView,
    constraint: ConstraintView,
    similarity: SimilarityView,
    dependency: DependencyView,
    history: HistoryView,
    streaming: StreamingView,
    graph: Option<Arc<dyn GraphProvider>>,
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("generation", &self.generation)
            .field("created_at", &self.created_at)
            .field("graph_backed", &self.graph.is_some())
            .finish()
    }
}

impl Snapshot {
    /// Assemble a snapshot from frozen views
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        generation: u64,
        created_at: i64,
        proof: ProofView,
        constraint: ConstraintView,
        similarity: SimilarityView,
        dependency: DependencyView,
        history: HistoryView,
        streaming: StreamingView,
        graph: Option<Arc<dyn GraphProvider>>,
    ) -> Self {
        Snapshot {
            generation,
            created_at,
            proof,
            constraint,
            similarity,
            dependency,
            history,
            streaming,
            graph,
        }
    }

    /// Generation this snapshot was taken at
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wall-clock creation time, milliseconds since the Unix epoch
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Proof-number view
    pub fn proof(&self) -> &ProofView {
        &self.proof
    }

    /// Constraint and clause view
    pub fn constraint(&self) -> &ConstraintView {
        &self.constraint
    }

    /// Similarity view
    pub fn similarity(&self) -> &SimilarityView {
        &self.similarity
    }

    /// Dependency view
    pub fn dependency(&self) -> &DependencyView {
        &self.dependency
    }

    /// History view
    pub fn history(&self) -> &HistoryView {
        &self.history
    }

    /// Streaming statistics view
    pub fn streaming(&self) -> &StreamingView {
        &self.streaming
    }

    /// The installed graph provider, if any
    pub fn graph_query(&self) -> Option<&Arc<dyn GraphProvider>> {
        self.graph.as_ref()
    }
}
