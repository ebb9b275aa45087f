//! Transactional core of the concurrent reasoning store
//!
//! This crate implements the owning [`Store`]: the two-phase optimistic
//! apply protocol, immutable snapshots, the per-session step log, the
//! delta-history journal worker, checkpoint/restore, and the prometheus
//! telemetry contract.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
pub mod delta;
pub mod journal;
pub mod metrics;
pub mod session;
pub mod snapshot;
pub mod store;

pub use checkpoint::Checkpoint;
pub use delta::{
    CompositeDelta, ConstraintDelta, Delta, DependencyDelta, HistoryDelta, ProofDelta,
    SimilarityDelta, SimilarityUpdate, StreamingDelta,
};
pub use journal::{DeltaHistory, DeltaRecord, RecordPayload};
pub use session::SessionLog;
pub use snapshot::Snapshot;
pub use store::{ApplyMetrics, CircuitBreakerDecision, Store, StoreStats};
