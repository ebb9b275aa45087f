//! # CRS
//!
//! A concurrent reasoning store: the in-memory, versioned, transactional
//! blackboard behind an agent-style search system. Producers publish
//! typed deltas describing what they learned; the store validates each
//! delta against the current state, commits it atomically, assigns it a
//! monotonically increasing generation, and publishes an immutable
//! snapshot to readers.
//!
//! # Quick Start
//!
//! ```no_run
//! use crs::{Context, Delta, SignalSource, Store};
//! use std::collections::BTreeMap;
//!
//! fn main() -> crs::Result<()> {
//!     let store = Store::with_defaults();
//!     let ctx = Context::background();
//!     store.set_session_id("session-1");
//!
//!     // Publish a streaming observation
//!     let mut counts = BTreeMap::new();
//!     counts.insert("expand:module_a".to_string(), 1);
//!     let metrics = store.apply(&ctx, Delta::streaming(SignalSource::Soft, counts))?;
//!     assert_eq!(metrics.new_generation, 1);
//!
//!     // Readers pull a frozen snapshot once and read freely
//!     let snapshot = store.snapshot();
//!     assert_eq!(snapshot.streaming().estimate("expand:module_a"), 1);
//!
//!     store.close();
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! | Crate | Responsibility |
//! |-------|----------------|
//! | `crs-core` | Types, errors, cancellation, configuration |
//! | `crs-index` | The six specialized indexes and their read views |
//! | `crs-store` | The owning store, deltas, session log, journal |
//! | `crs-wire` | JSON session export/import |
//!
//! The [`Store`] struct is the entry point. Internal crates are
//! re-exported here; only this surface is stable.

pub use crs_core::{
    Assignment, CancelHandle, Clause, ClausePersistence, ClauseScope, Constraint, ConstraintType,
    Context, DeltaType, DependencyEdge, Error, ErrorCategory, FailureType, GraphProvider,
    HistoryEntry, IndexTag, IndexTagSet, Literal, ProofNumber, ProofStatus, Result, SignalSource,
    StepActor, StepDecision, StepOutcome, StepRecord, StoreConfig, INFINITE,
};
pub use crs_index::{
    AssignmentCheck, ProofUpdate, ProofUpdateKind, SimilarityPair,
};
pub use crs_store::{
    ApplyMetrics, Checkpoint, CircuitBreakerDecision, CompositeDelta, ConstraintDelta, Delta,
    DeltaRecord, DependencyDelta, HistoryDelta, ProofDelta, SimilarityDelta, SimilarityUpdate,
    Snapshot, Store, StoreStats, StreamingDelta,
};
pub use crs_wire::{
    export_snapshot, import_session, ExportOptions, ImportOptions, ImportedState, SessionExport,
};
