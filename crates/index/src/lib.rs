//! Specialized indexes for the concurrent reasoning store
//!
//! Six typed containers, each with an owning mutable form used under the
//! store's write lock and an immutable view form embedded in snapshots:
//! - Proof numbers (`proof`)
//! - Constraints and learned clauses (`constraint`)
//! - Pairwise similarity (`similarity`)
//! - The dependency graph, optionally graph-backed (`dependency`, `graph`)
//! - Decision history (`history`)
//! - Streaming frequency statistics (`streaming`)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constraint;
pub mod dependency;
pub mod graph;
pub mod history;
pub mod proof;
pub mod similarity;
pub mod streaming;

pub use constraint::{AssignmentCheck, ClauseInsert, ConstraintIndex, ConstraintView};
pub use dependency::{DependencyIndex, DependencyView};
pub use graph::GraphAdapter;
pub use history::{HistoryIndex, HistoryView};
pub use proof::{ProofIndex, ProofUpdate, ProofUpdateKind, ProofView};
pub use similarity::{SimilarityIndex, SimilarityPair, SimilarityView};
pub use streaming::{StreamingStats, StreamingView};
