//! Error types for the concurrent reasoning store
//!
//! One unified error enum for every layer, built with `thiserror`.
//! Validation failures are always surfaced to the caller wrapped in
//! [`Error::DeltaValidation`] so diagnostics carry both the kind and the
//! underlying cause.
//!
//! Two kinds from the original design — nil context and nil delta — are
//! unrepresentable here: operations take references and owned values,
//! neither of which can be null.

use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the reasoning store
#[derive(Debug, Error)]
pub enum Error {
    /// The ambient operation context was cancelled or its deadline passed
    #[error("operation cancelled")]
    Cancelled,

    /// A delta failed pre-apply validation; wraps the specific cause
    #[error("delta validation failed: {0}")]
    DeltaValidation(#[source] Box<Error>),

    /// A soft source attempted a disproof-only operation
    #[error("hard/soft boundary violation: {0}")]
    HardSoftBoundary(String),

    /// Constraint id missing on remove or update
    #[error("constraint not found: {0}")]
    ConstraintNotFound(String),

    /// Constraint id already present on add
    #[error("duplicate constraint id: {0}")]
    DuplicateConstraint(String),

    /// A dependency edge from a node to itself
    #[error("self-edge rejected for node {0}")]
    SelfEdge(String),

    /// A dependency edge that would close a directed cycle
    #[error("edge {from} -> {to} would create a cycle")]
    CycleDetected {
        /// Source node of the rejected edge
        from: String,
        /// Target node of the rejected edge
        to: String,
    },

    /// A similarity pair relating a node to itself
    #[error("self-similarity rejected for node {0}")]
    SelfSimilarity(String),

    /// A similarity score outside [0, 1]
    #[error("similarity score {score} for ({from}, {to}) outside [0, 1]")]
    InvalidScore {
        /// First node of the pair
        from: String,
        /// Second node of the pair
        to: String,
        /// The offending score
        score: f64,
    },

    /// A history-entry metadata key or value exceeded its size limit
    #[error("metadata limit exceeded: {0}")]
    MetadataTooLarge(String),

    /// An id field that must be non-empty was empty
    #[error("empty id: {0}")]
    EmptyId(String),

    /// A step record arrived without a session id
    #[error("session id must not be empty")]
    EmptySessionId,

    /// A step record failed validation
    #[error("invalid step: {0}")]
    InvalidStep(String),

    /// A learned clause failed validation
    #[error("invalid clause: {0}")]
    InvalidClause(String),

    /// One or more children of a composite delta failed validation;
    /// the message joins every child cause
    #[error("composite validation failed: {0}")]
    CompositeValidation(String),

    /// A commit-phase failure after validation succeeded
    #[error("apply rolled back: {0}")]
    ApplyRollback(String),

    /// A journal query after the worker was closed
    #[error("delta history worker is closed")]
    DeltaHistoryClosed,

    /// Restore received data it cannot interpret
    #[error("invalid checkpoint: {0}")]
    InvalidCheckpoint(String),

    /// Store configuration failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization or deserialization failure
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Session import failed strict validation
    #[error("import validation failed: {0}")]
    ImportValidation(String),

    /// The configured generation ceiling was reached
    #[error("generation limit {0} reached")]
    GenerationLimit(u64),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::SerializationError(e.to_string())
    }
}

impl Error {
    /// Check if this error is a cancellation
    ///
    /// Cancellation is the only error a caller may safely retry verbatim
    /// with a fresh context.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Check if this error is a validation failure
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::DeltaValidation(_))
    }

    /// The innermost cause of a validation failure, or the error itself
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::DeltaValidation(inner) => inner.root_cause(),
            other => other,
        }
    }

    /// Wrap this error as a validation failure
    pub fn into_validation(self) -> Error {
        match self {
            already @ Error::DeltaValidation(_) => already,
            other => Error::DeltaValidation(Box::new(other)),
        }
    }
}
