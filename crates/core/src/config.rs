//! Store configuration
//!
//! Plain config structs with defaults and a `validate()` gate, checked
//! once at store construction.

use crate::error::{Error, Result};
use crate::limits;
use serde::{Deserialize, Serialize};

/// Visibility scope of learned clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClauseScope {
    /// Clauses live and die with one session
    #[default]
    Session,
    /// Clauses are shared across sessions of one project
    Project,
    /// Clauses are shared globally
    Global,
}

/// Retention policy for the learned-clause index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClausePersistence {
    /// Visibility scope
    pub scope: ClauseScope,
    /// Time-to-live in milliseconds; expired clauses are garbage-collected
    pub ttl_ms: i64,
    /// Capacity; overflow evicts the least-recently-used clause
    pub max_clauses: usize,
}

impl Default for ClausePersistence {
    fn default() -> Self {
        ClausePersistence {
            scope: ClauseScope::Session,
            ttl_ms: limits::DEFAULT_CLAUSE_TTL_MS,
            max_clauses: limits::DEFAULT_MAX_CLAUSES,
        }
    }
}

/// Store configuration.
///
/// All fields have working defaults; construct with `StoreConfig::default()`
/// and override what you need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Hard ceiling on the generation counter; 0 means unlimited
    pub max_generation: u64,
    /// Number of snapshot epochs retained by readers; informational
    pub snapshot_epoch_limit: u64,
    /// Whether prometheus counters are updated
    pub enable_metrics: bool,
    /// Whether tracing spans are entered around operations
    pub enable_tracing: bool,
    /// Learned-clause retention policy
    pub clause_persistence: ClausePersistence,
    /// FIFO bound on each session's step log
    pub max_steps_per_session: usize,
    /// Capacity of the delta-history journal
    pub max_delta_records: usize,
    /// Tool-execution count at which the circuit breaker fires
    pub circuit_breaker_threshold: u64,
    /// Bound on breadth-first disproof propagation depth
    pub max_propagation_depth: usize,
    /// Initial proof and disproof number for fresh nodes
    pub initial_proof_number: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            max_generation: 0,
            snapshot_epoch_limit: 0,
            enable_metrics: true,
            enable_tracing: true,
            clause_persistence: ClausePersistence::default(),
            max_steps_per_session: limits::DEFAULT_MAX_STEPS_PER_SESSION,
            max_delta_records: limits::DEFAULT_MAX_DELTA_RECORDS,
            circuit_breaker_threshold: limits::DEFAULT_CIRCUIT_BREAKER_THRESHOLD,
            max_propagation_depth: limits::DEFAULT_MAX_PROPAGATION_DEPTH,
            initial_proof_number: limits::DEFAULT_INITIAL_PROOF_NUMBER,
        }
    }
}

impl StoreConfig {
    /// Validate the configuration.
    ///
    /// Checked once at store construction; a store never runs with an
    /// invalid config.
    pub fn validate(&self) -> Result<()> {
        if self.max_steps_per_session == 0 {
            return Err(Error::InvalidConfig(
                "max_steps_per_session must be at least 1".into(),
            ));
        }
        if self.max_delta_records == 0 {
            return Err(Error::InvalidConfig(
                "max_delta_records must be at least 1".into(),
            ));
        }
        if self.circuit_breaker_threshold == 0 {
            return Err(Error::InvalidConfig(
                "circuit_breaker_threshold must be at least 1".into(),
            ));
        }
        if self.max_propagation_depth == 0 {
            return Err(Error::InvalidConfig(
                "max_propagation_depth must be at least 1".into(),
            ));
        }
        if self.initial_proof_number == 0 || self.initial_proof_number == limits::INFINITE {
            return Err(Error::InvalidConfig(
                "initial_proof_number must be finite and non-zero".into(),
            ));
        }
        if self.clause_persistence.max_clauses == 0 {
            return Err(Error::InvalidConfig(
                "clause_persistence.max_clauses must be at least 1".into(),
            ));
        }
        if self.clause_persistence.ttl_ms <= 0 {
            return Err(Error::InvalidConfig(
                "clause_persistence.ttl_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}
