//! Core types and traits for the concurrent reasoning store
//!
//! This crate defines the foundational vocabulary used throughout the
//! system:
//! - Proof numbers, constraints, learned clauses, history entries
//! - Session step records and their enums
//! - The unified `Error` type and `Result` alias
//! - Cooperative cancellation (`Context`)
//! - Store configuration and size limits
//! - The `GraphProvider` capability seam

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod context;
pub mod error;
pub mod limits;
pub mod time;
pub mod traits;
pub mod types;

pub use config::{ClausePersistence, ClauseScope, StoreConfig};
pub use context::{CancelHandle, Context};
pub use error::{Error, Result};
pub use limits::INFINITE;
pub use time::now_ms;
pub use traits::GraphProvider;
pub use types::{
    Assignment, Clause, Constraint, ConstraintType, DeltaType, DependencyEdge, ErrorCategory,
    FailureType, HistoryEntry, IndexTag, IndexTagSet, Literal, ProofNumber, ProofStatus,
    SignalSource, StepActor, StepDecision, StepOutcome, StepRecord,
};
