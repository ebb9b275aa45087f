//! JSON session export and import for the concurrent reasoning store
//!
//! The wire contract: a session export is one JSON object carrying the
//! six index sections and a derived summary. Similarity pairs travel in
//! canonical single direction and are symmetrized on import; dependency
//! edges are absent when the index is graph-backed.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod export;
pub mod import;

pub use export::{
    ConstraintExport, DependencyEdgeExport, DependencyExport, ExportOptions, ExportSummary,
    HistoryExport, IndexExports, ProofExport, SessionExport, SimilarityExport,
    SimilarityPairExport, StreamingExport, export_snapshot, DEPENDENCY_SOURCE_GRAPH,
    DEPENDENCY_SOURCE_LEGACY,
};
pub use import::{import_session, ImportOptions, ImportedState};
