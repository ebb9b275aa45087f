//! Size limits and tuning defaults
//!
//! Centralizes every bound the store enforces so callers and tests agree
//! on a single source of truth. Limits are deliberately conservative:
//! the store is a shared blackboard for agent search and a single runaway
//! producer must not be able to exhaust memory.

/// Sentinel proof/disproof value marking an impossible side.
///
/// Arithmetic on proof numbers saturates at this value and never wraps.
pub const INFINITE: u64 = u64::MAX;

/// Maximum length of a history-entry metadata key in bytes
pub const MAX_METADATA_KEY_LEN: usize = 256;

/// Maximum length of a history-entry metadata value in bytes
pub const MAX_METADATA_VALUE_LEN: usize = 4096;

/// Default FIFO bound on the per-session step log
pub const DEFAULT_MAX_STEPS_PER_SESSION: usize = 10_000;

/// Default capacity of the delta-history journal
pub const DEFAULT_MAX_DELTA_RECORDS: usize = 1_000;

/// Capacity of the journal's record queue; overflow drops the record
pub const RECORD_QUEUE_CAPACITY: usize = 100;

/// Capacity of the journal's query queue
pub const QUERY_QUEUE_CAPACITY: usize = 10;

/// Default number of tool executions after which the circuit breaker fires
pub const DEFAULT_CIRCUIT_BREAKER_THRESHOLD: u64 = 3;

/// Default bound on breadth-first disproof propagation depth
pub const DEFAULT_MAX_PROPAGATION_DEPTH: usize = 10;

/// Default initial proof and disproof number for fresh nodes
pub const DEFAULT_INITIAL_PROOF_NUMBER: u64 = 1;

/// Default time-to-live for learned clauses, in milliseconds (1 hour)
pub const DEFAULT_CLAUSE_TTL_MS: i64 = 3_600_000;

/// Default cap on the learned-clause index; overflow evicts by LRU
pub const DEFAULT_MAX_CLAUSES: usize = 1_000;

/// Default cap on exported similarity pairs; negative means unlimited
pub const DEFAULT_MAX_SIMILARITY_PAIRS: i64 = 100_000;

/// Default cap on exported dependency edges; negative means unlimited
pub const DEFAULT_MAX_DEPENDENCY_EDGES: i64 = 100_000;
