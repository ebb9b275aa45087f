//! Domain types for the reasoning store
//!
//! This module defines the value types that flow through the store:
//! proof numbers, constraints, learned clauses, history entries, session
//! step records, and the tag types used to dispatch deltas across
//! indexes. All wire-visible enums serialize as lower-snake strings.

use crate::error::{Error, Result};
use crate::limits::{INFINITE, MAX_METADATA_KEY_LEN, MAX_METADATA_VALUE_LEN};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A variable assignment used to test clause satisfaction or violation
pub type Assignment = HashMap<String, bool>;

/// Origin of a signal written into the store.
///
/// Hard and Safety sources are authorized to assert irreversible facts
/// (a `Disproven` status); Soft sources are heuristic and are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    /// Origin unknown; treated as soft
    #[default]
    Unknown,
    /// Deterministic evidence (tool output, verified computation)
    Hard,
    /// Heuristic evidence (model scores, priors)
    Soft,
    /// Safety subsystem; hard by definition
    Safety,
}

impl SignalSource {
    /// Whether this source may assert irreversible facts
    pub fn is_hard(&self) -> bool {
        matches!(self, SignalSource::Hard | SignalSource::Safety)
    }

    /// Stable lower-snake label, as used on the wire and in metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalSource::Unknown => "unknown",
            SignalSource::Hard => "hard",
            SignalSource::Soft => "soft",
            SignalSource::Safety => "safety",
        }
    }
}

/// Proof search status of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProofStatus {
    /// Not yet examined
    #[default]
    Unknown,
    /// Examined but neither proven nor disproven
    Expanded,
    /// Established as true
    Proven,
    /// Established as false; only hard sources may set this
    Disproven,
}

impl ProofStatus {
    /// Stable lower-snake label
    pub fn as_str(&self) -> &'static str {
        match self {
            ProofStatus::Unknown => "unknown",
            ProofStatus::Expanded => "expanded",
            ProofStatus::Proven => "proven",
            ProofStatus::Disproven => "disproven",
        }
    }

    /// Whether the node has reached a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProofStatus::Proven | ProofStatus::Disproven)
    }
}

/// Per-node proof/disproof cost estimate.
///
/// Invariants: `Proven` implies `proof == 0`; `Disproven` implies
/// `proof == INFINITE`. A `Disproven` status may only originate from a
/// hard source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofNumber {
    /// Node identifier
    pub node_id: String,
    /// Estimated cost to prove; 0 when proven, `INFINITE` when disproven
    pub proof: u64,
    /// Estimated cost to disprove
    pub disproof: u64,
    /// Current proof status
    pub status: ProofStatus,
    /// Source that last wrote this record
    pub source: SignalSource,
    /// Last update, milliseconds since the Unix epoch
    pub updated_at: i64,
}

impl ProofNumber {
    /// A fresh record with symmetric initial numbers and Unknown status
    pub fn new(node_id: impl Into<String>, initial: u64, now_ms: i64) -> Self {
        ProofNumber {
            node_id: node_id.into(),
            proof: initial,
            disproof: initial,
            status: ProofStatus::Unknown,
            source: SignalSource::Unknown,
            updated_at: now_ms,
        }
    }

    /// Whether this node is disproven by status or by proof exhaustion
    pub fn is_disproven(&self) -> bool {
        self.status == ProofStatus::Disproven || self.proof >= INFINITE
    }

    /// Whether this node is proven
    pub fn is_proven(&self) -> bool {
        self.status == ProofStatus::Proven
    }
}

/// Category of a structural constraint between nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintType {
    /// Category unknown
    #[default]
    Unknown,
    /// At most one of the nodes may hold
    MutualExclusion,
    /// The first node implies the rest
    Implication,
    /// Nodes must be established in sequence order
    Ordering,
    /// Nodes compete for a bounded resource
    Resource,
}

impl ConstraintType {
    /// Stable lower-snake label
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintType::Unknown => "unknown",
            ConstraintType::MutualExclusion => "mutual_exclusion",
            ConstraintType::Implication => "implication",
            ConstraintType::Ordering => "ordering",
            ConstraintType::Resource => "resource",
        }
    }
}

/// A structural constraint over a set of nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// Globally unique constraint id
    pub id: String,
    /// Constraint category
    #[serde(rename = "type")]
    pub constraint_type: ConstraintType,
    /// Ordered node ids the constraint ranges over
    pub nodes: Vec<String>,
    /// Opaque expression for diagnostics; not evaluated by the store
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub expression: String,
    /// Whether the constraint is currently enforced
    pub active: bool,
    /// Source that introduced the constraint
    pub source: SignalSource,
    /// Creation time, milliseconds since the Unix epoch
    pub created_at: i64,
}

/// Why a clause was learned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    /// A tool invocation failed
    ToolError,
    /// The same decision pattern repeated without progress
    CycleDetected,
    /// The circuit breaker fired
    CircuitBreaker,
    /// A step exceeded its time budget
    Timeout,
    /// A tool produced unusable output
    InvalidOutput,
    /// The safety subsystem intervened
    Safety,
}

impl FailureType {
    /// Stable lower-snake label
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureType::ToolError => "tool_error",
            FailureType::CycleDetected => "cycle_detected",
            FailureType::CircuitBreaker => "circuit_breaker",
            FailureType::Timeout => "timeout",
            FailureType::InvalidOutput => "invalid_output",
            FailureType::Safety => "safety",
        }
    }
}

/// A literal in a learned clause. Polarity matters for semantic equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    /// Variable name, e.g. `tool:grep` or `prev_tool:grep`
    pub variable: String,
    /// True if the literal is the variable's negation
    #[serde(default)]
    pub negated: bool,
}

impl Literal {
    /// A positive literal over `variable`
    pub fn positive(variable: impl Into<String>) -> Self {
        Literal {
            variable: variable.into(),
            negated: false,
        }
    }

    /// A negated literal over `variable`
    pub fn negative(variable: impl Into<String>) -> Self {
        Literal {
            variable: variable.into(),
            negated: true,
        }
    }

    /// Evaluate under an assignment.
    ///
    /// `Some(value)` if the variable is assigned, `None` otherwise.
    pub fn evaluate(&self, assignment: &Assignment) -> Option<bool> {
        assignment.get(&self.variable).map(|v| *v != self.negated)
    }
}

/// A learned CNF clause blocking decision patterns that led to failure.
///
/// Satisfied if any literal is true under an assignment; violated if every
/// literal is definitely false. Unassigned literals leave the clause
/// unresolved. The empty clause is always violated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    /// Clause id
    pub id: String,
    /// Disjunction of literals
    pub literals: Vec<Literal>,
    /// Source that learned the clause; must be hard
    pub source: SignalSource,
    /// Failure that triggered learning
    pub failure_type: FailureType,
    /// When the clause was learned, milliseconds since the Unix epoch
    pub learned_at: i64,
    /// Last time the clause matched or deduplicated, milliseconds
    pub last_used: i64,
    /// Number of times the clause matched or deduplicated
    pub use_count: u64,
}

impl Clause {
    /// Deduplicated, polarity-aware literal set in canonical order.
    ///
    /// Two clauses with equal keys are semantically the same disjunction.
    pub fn dedup_key(&self) -> Vec<(String, bool)> {
        let mut key: Vec<(String, bool)> = self
            .literals
            .iter()
            .map(|l| (l.variable.clone(), l.negated))
            .collect();
        key.sort();
        key.dedup();
        key
    }

    /// Whether `other` is the same disjunction up to order and repeats
    pub fn semantically_equals(&self, other: &Clause) -> bool {
        self.dedup_key() == other.dedup_key()
    }

    /// Whether any literal is true under `assignment`
    pub fn is_satisfied(&self, assignment: &Assignment) -> bool {
        self.literals
            .iter()
            .any(|l| l.evaluate(assignment) == Some(true))
    }

    /// Whether every literal is definitely false under `assignment`
    pub fn is_violated(&self, assignment: &Assignment) -> bool {
        self.literals
            .iter()
            .all(|l| l.evaluate(assignment) == Some(false))
    }

    /// Bump usage bookkeeping
    pub fn touch(&mut self, now_ms: i64) {
        self.use_count += 1;
        self.last_used = now_ms;
    }

    /// Validate invariants enforced at insert time
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::InvalidClause("clause id must not be empty".into()));
        }
        if self.literals.is_empty() {
            return Err(Error::InvalidClause(format!(
                "clause {} has no literals",
                self.id
            )));
        }
        if self.literals.iter().any(|l| l.variable.is_empty()) {
            return Err(Error::InvalidClause(format!(
                "clause {} has a literal with an empty variable",
                self.id
            )));
        }
        if !self.source.is_hard() {
            return Err(Error::HardSoftBoundary(format!(
                "clause {} has soft source {}",
                self.id,
                self.source.as_str()
            )));
        }
        Ok(())
    }
}

/// Append-only record of an action taken against a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Entry id; must be non-empty
    pub id: String,
    /// Node the action targeted
    pub node_id: String,
    /// Action label
    pub action: String,
    /// Action result label
    pub result: String,
    /// Source that performed the action
    pub source: SignalSource,
    /// When the action happened, milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Free-form annotations; keys and values are size-limited
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl HistoryEntry {
    /// Validate id and metadata size limits
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::EmptyId("history entry id".into()));
        }
        for (k, v) in &self.metadata {
            if k.is_empty() {
                return Err(Error::MetadataTooLarge(format!(
                    "entry {} has an empty metadata key",
                    self.id
                )));
            }
            if k.len() > MAX_METADATA_KEY_LEN {
                return Err(Error::MetadataTooLarge(format!(
                    "entry {} metadata key exceeds {} bytes",
                    self.id, MAX_METADATA_KEY_LEN
                )));
            }
            if v.len() > MAX_METADATA_VALUE_LEN {
                return Err(Error::MetadataTooLarge(format!(
                    "entry {} metadata value for {:?} exceeds {} bytes",
                    self.id, k, MAX_METADATA_VALUE_LEN
                )));
            }
        }
        Ok(())
    }
}

/// A directed dependency edge: `from` depends on `to`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// Depending node
    pub from: String,
    /// Depended-upon node
    pub to: String,
}

impl DependencyEdge {
    /// Construct an edge
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        DependencyEdge {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Who took a session step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepActor {
    /// The routing layer
    #[default]
    Router,
    /// The main reasoning agent
    MainAgent,
    /// The store or its guards acting autonomously
    System,
}

impl StepActor {
    /// Stable lower-snake label
    pub fn as_str(&self) -> &'static str {
        match self {
            StepActor::Router => "router",
            StepActor::MainAgent => "main_agent",
            StepActor::System => "system",
        }
    }
}

/// What kind of decision a session step records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepDecision {
    /// A tool was chosen
    #[default]
    SelectTool,
    /// A tool was run
    ExecuteTool,
    /// Results were synthesized
    Synthesize,
    /// The circuit breaker fired
    CircuitBreaker,
    /// A previous step was retried
    Retry,
    /// The session finished
    Complete,
    /// The session errored
    Error,
}

impl StepDecision {
    /// Stable lower-snake label
    pub fn as_str(&self) -> &'static str {
        match self {
            StepDecision::SelectTool => "select_tool",
            StepDecision::ExecuteTool => "execute_tool",
            StepDecision::Synthesize => "synthesize",
            StepDecision::CircuitBreaker => "circuit_breaker",
            StepDecision::Retry => "retry",
            StepDecision::Complete => "complete",
            StepDecision::Error => "error",
        }
    }
}

/// How a session step ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// The step succeeded
    #[default]
    Success,
    /// The step failed; requires a non-None error category
    Failure,
    /// The step was skipped
    Skipped,
    /// The step was forced by a guard
    Forced,
}

impl StepOutcome {
    /// Stable lower-snake label
    pub fn as_str(&self) -> &'static str {
        match self {
            StepOutcome::Success => "success",
            StepOutcome::Failure => "failure",
            StepOutcome::Skipped => "skipped",
            StepOutcome::Forced => "forced",
        }
    }
}

/// Failure classification for a session step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// No error
    #[default]
    None,
    /// The requested tool does not exist
    ToolNotFound,
    /// Tool parameters failed validation
    InvalidParams,
    /// The tool timed out
    Timeout,
    /// The tool was rate-limited
    RateLimited,
    /// Permission was denied
    Permission,
    /// A network failure occurred
    Network,
    /// An internal error occurred
    Internal,
    /// The safety subsystem intervened
    Safety,
}

impl ErrorCategory {
    /// Stable lower-snake label
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::None => "none",
            ErrorCategory::ToolNotFound => "tool_not_found",
            ErrorCategory::InvalidParams => "invalid_params",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::RateLimited => "rate_limited",
            ErrorCategory::Permission => "permission",
            ErrorCategory::Network => "network",
            ErrorCategory::Internal => "internal",
            ErrorCategory::Safety => "safety",
        }
    }
}

/// One decision taken during a session, 1-indexed within the session.
///
/// `step_number` and `timestamp` are auto-assigned at record time when
/// left at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Owning session; must be non-empty
    pub session_id: String,
    /// 1-indexed position within the session; 0 means auto-assign
    #[serde(default)]
    pub step_number: u64,
    /// Who took the step
    pub actor: StepActor,
    /// What was decided
    pub decision: StepDecision,
    /// How it ended
    pub outcome: StepOutcome,
    /// Tool involved, if any
    #[serde(default)]
    pub tool: String,
    /// Tool parameters; deep-copied at record time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_params: Option<serde_json::Value>,
    /// Failure classification; must be non-None on Failure
    #[serde(default)]
    pub error_category: ErrorCategory,
    /// Decision confidence in [0, 1]
    #[serde(default)]
    pub confidence: f64,
    /// Step duration in milliseconds
    #[serde(default)]
    pub duration_ms: u64,
    /// When the step was taken; 0 means auto-assign
    #[serde(default)]
    pub timestamp: i64,
    /// Node ids whose proof numbers this step updated
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proof_updates: Vec<String>,
    /// Constraint ids this step introduced
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints_added: Vec<String>,
    /// Dependency edges this step discovered
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies_found: Vec<DependencyEdge>,
}

impl StepRecord {
    /// Minimal record for tests and simple callers
    pub fn new(
        session_id: impl Into<String>,
        actor: StepActor,
        decision: StepDecision,
        outcome: StepOutcome,
    ) -> Self {
        StepRecord {
            session_id: session_id.into(),
            step_number: 0,
            actor,
            decision,
            outcome,
            tool: String::new(),
            tool_params: None,
            error_category: ErrorCategory::None,
            confidence: 0.0,
            duration_ms: 0,
            timestamp: 0,
            proof_updates: Vec::new(),
            constraints_added: Vec::new(),
            dependencies_found: Vec::new(),
        }
    }

    /// Validate the record's invariants
    pub fn validate(&self) -> Result<()> {
        if self.session_id.is_empty() {
            return Err(Error::EmptySessionId);
        }
        if self.outcome == StepOutcome::Failure && self.error_category == ErrorCategory::None {
            return Err(Error::InvalidStep(
                "failure outcome requires an error category".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::InvalidStep(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        Ok(())
    }
}

/// Kind of a delta, used for dispatch, journaling, and metrics labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaType {
    /// Proof-number updates
    Proof,
    /// Constraint adds/removes/updates
    Constraint,
    /// Similarity pairs
    Similarity,
    /// Dependency edges
    Dependency,
    /// History entries
    History,
    /// Streaming frequency increments
    Streaming,
    /// An ordered batch of deltas
    Composite,
}

impl DeltaType {
    /// Stable lower-snake label
    pub fn as_str(&self) -> &'static str {
        match self {
            DeltaType::Proof => "proof",
            DeltaType::Constraint => "constraint",
            DeltaType::Similarity => "similarity",
            DeltaType::Dependency => "dependency",
            DeltaType::History => "history",
            DeltaType::Streaming => "streaming",
            DeltaType::Composite => "composite",
        }
    }
}

impl fmt::Display for DeltaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the six specialized indexes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexTag {
    /// Proof-number index
    Proof,
    /// Constraint and learned-clause index
    Constraint,
    /// Pairwise similarity index
    Similarity,
    /// Dependency graph index
    Dependency,
    /// Decision history index
    History,
    /// Streaming frequency index
    Streaming,
}

impl IndexTag {
    const ALL: [IndexTag; 6] = [
        IndexTag::Proof,
        IndexTag::Constraint,
        IndexTag::Similarity,
        IndexTag::Dependency,
        IndexTag::History,
        IndexTag::Streaming,
    ];

    fn bit(self) -> u8 {
        match self {
            IndexTag::Proof => 1 << 0,
            IndexTag::Constraint => 1 << 1,
            IndexTag::Similarity => 1 << 2,
            IndexTag::Dependency => 1 << 3,
            IndexTag::History => 1 << 4,
            IndexTag::Streaming => 1 << 5,
        }
    }

    /// Stable lower-snake label, used as the metrics `index` label
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexTag::Proof => "proof",
            IndexTag::Constraint => "constraint",
            IndexTag::Similarity => "similarity",
            IndexTag::Dependency => "dependency",
            IndexTag::History => "history",
            IndexTag::Streaming => "streaming",
        }
    }
}

/// Compact bitmask over [`IndexTag`]s
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexTagSet(u8);

impl IndexTagSet {
    /// The empty set
    pub fn empty() -> Self {
        IndexTagSet(0)
    }

    /// A set containing exactly `tag`
    pub fn single(tag: IndexTag) -> Self {
        IndexTagSet(tag.bit())
    }

    /// Insert a tag
    pub fn insert(&mut self, tag: IndexTag) {
        self.0 |= tag.bit();
    }

    /// Whether `tag` is present
    pub fn contains(&self, tag: IndexTag) -> bool {
        self.0 & tag.bit() != 0
    }

    /// Union with another set
    pub fn union(self, other: IndexTagSet) -> IndexTagSet {
        IndexTagSet(self.0 | other.0)
    }

    /// Number of tags present
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Tags present, in declaration order
    pub fn iter(&self) -> impl Iterator<Item = IndexTag> + '_ {
        IndexTag::ALL.iter().copied().filter(|t| self.contains(*t))
    }

    /// Raw bitmask value, as reported in apply metrics
    pub fn bits(&self) -> u8 {
        self.0
    }
}
