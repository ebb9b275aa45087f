//! The owning store
//!
//! One `Store` owns all six indexes, the per-session step log, and the
//! delta-history worker. Writers serialize on the state lock; readers
//! take frozen snapshots and never block writers for long.
//!
//! # Apply protocol
//!
//! `apply` is a two-phase optimistic transaction:
//!
//! 1. Validate the delta against a snapshot, without any lock held.
//! 2. Take the write lock. If the generation moved during validation,
//!    re-validate against the live state. Then dispatch on the delta
//!    variant, mutate the affected indexes, and bump the generation by
//!    exactly one.
//!
//! A composite delta is all-or-nothing: its children mutate a working
//! copy of the state which replaces the live state only after every
//! child succeeds, so a failing child leaves nothing behind.
//!
//! # Lock order
//!
//! state lock → streaming mutex → per-session mutex. The state lock is
//! never acquired while a streaming or per-session lock is held.

use crate::checkpoint::Checkpoint;
use crate::delta::Delta;
use crate::journal::{DeltaHistory, DeltaRecord, RecordPayload};
use crate::metrics;
use crate::session::SessionLog;
use crate::snapshot::Snapshot;
use crs_core::config::StoreConfig;
use crs_core::context::Context;
use crs_core::error::{Error, Result};
use crs_core::limits::INFINITE;
use crs_core::time::now_ms;
use crs_core::traits::GraphProvider;
use crs_core::types::{
    Assignment, Clause, DeltaType, IndexTag, IndexTagSet, ProofNumber, ProofStatus, SignalSource,
    StepActor, StepOutcome, StepRecord,
};
use crs_index::{
    ConstraintIndex, DependencyIndex, GraphAdapter, HistoryIndex, ProofIndex, ProofUpdate,
    ProofUpdateKind, SimilarityIndex, StreamingStats,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Timing and coverage of one successful apply
#[derive(Debug, Clone)]
pub struct ApplyMetrics {
    /// Kind of the applied delta
    pub delta_type: DeltaType,
    /// Generation before the apply
    pub old_generation: u64,
    /// Generation the apply produced; always `old_generation + 1`
    pub new_generation: u64,
    /// Time spent in phase 1 validation
    pub validation_duration: Duration,
    /// Time spent in the commit phase
    pub apply_duration: Duration,
    /// Number of index entries written
    pub entries_modified: usize,
    /// Which indexes were touched
    pub indexes_updated: IndexTagSet,
}

/// Verdict of the per-session, per-tool circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerDecision {
    /// Whether the tool should be blocked for this session
    pub should_fire: bool,
    /// Human-readable justification; empty when not firing
    pub reason: String,
    /// The tracked proof number, if the node exists
    pub proof_number: Option<u64>,
    /// The tracked status; Unknown when no node exists
    pub status: ProofStatus,
}

/// Per-index entry counts, for observability and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Current generation
    pub generation: u64,
    /// Proof-number entries
    pub proof_entries: usize,
    /// Constraints
    pub constraints: usize,
    /// Learned clauses
    pub clauses: usize,
    /// Canonical similarity pairs
    pub similarity_pairs: usize,
    /// Dependency edges (0 when graph-backed)
    pub dependency_edges: usize,
    /// History entries
    pub history_entries: usize,
    /// Distinct streaming items
    pub streaming_items: usize,
}

struct StoreState {
    proof: ProofIndex,
    constraint: ConstraintIndex,
    similarity: SimilarityIndex,
    dependency: DependencyIndex,
    history: HistoryIndex,
    streaming: StreamingStats,
    graph_provider: Option<Arc<dyn GraphProvider>>,
    graph_adapter: Option<Arc<GraphAdapter>>,
}

impl StoreState {
    fn new() -> Self {
        StoreState {
            proof: ProofIndex::new(),
            constraint: ConstraintIndex::new(),
            similarity: SimilarityIndex::new(),
            dependency: DependencyIndex::new(),
            history: HistoryIndex::new(),
            streaming: StreamingStats::new(),
            graph_provider: None,
            graph_adapter: None,
        }
    }

    fn build_snapshot(&self, generation: u64) -> Snapshot {
        Snapshot::new(
            generation,
            now_ms(),
            self.proof.view(),
            self.constraint.view(),
            self.similarity.view(),
            self.dependency.view(self.graph_adapter.clone()),
            self.history.view(),
            self.streaming.view(),
            self.graph_provider.clone(),
        )
    }

    /// Working copy for all-or-nothing composite commits. Streaming
    /// statistics carry a mutex and need an explicit deep clone.
    fn clone_for_commit(&self) -> StoreState {
        StoreState {
            proof: self.proof.clone(),
            constraint: self.constraint.clone(),
            similarity: self.similarity.clone(),
            dependency: self.dependency.clone(),
            history: self.history.clone(),
            streaming: self.streaming.deep_clone(),
            graph_provider: self.graph_provider.clone(),
            graph_adapter: self.graph_adapter.clone(),
        }
    }
}

/// The concurrent reasoning store
pub struct Store {
    state: RwLock<StoreState>,
    generation: AtomicU64,
    session_id: Mutex<String>,
    sessions: SessionLog,
    journal: DeltaHistory,
    config: StoreConfig,
    dep_warning_emitted: AtomicBool,
    closed: AtomicBool,
}

impl Store {
    /// Create a store with the given configuration
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let journal = DeltaHistory::new(config.max_delta_records, config.enable_metrics);
        Ok(Store {
            state: RwLock::new(StoreState::new()),
            generation: AtomicU64::new(0),
            session_id: Mutex::new(String::new()),
            sessions: SessionLog::new(config.max_steps_per_session),
            journal,
            config,
            dep_warning_emitted: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// Create a store with the default configuration
    pub fn with_defaults() -> Self {
        Store::new(StoreConfig::default()).expect("default configuration is valid")
    }

    /// The active configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Current generation, lock-free
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Bind subsequent applies to a session
    pub fn set_session_id(&self, session_id: impl Into<String>) {
        *self.session_id.lock() = session_id.into();
    }

    /// The bound session id, empty if unbound
    pub fn session_id(&self) -> String {
        self.session_id.lock().clone()
    }

    /// Frozen view of all indexes at the current generation
    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.read();
        let snapshot = state.build_snapshot(self.generation.load(Ordering::SeqCst));
        drop(state);
        if self.config.enable_metrics {
            metrics::SNAPSHOT_TOTAL.inc();
        }
        snapshot
    }

    // === Apply ===

    /// Validate and commit a delta; the record is stamped with the
    /// delta's intrinsic source.
    pub fn apply(&self, ctx: &Context, delta: Delta) -> Result<ApplyMetrics> {
        self.apply_inner(ctx, delta, None, BTreeMap::new(), "crs.Apply")
    }

    /// Like [`Store::apply`] but stamps the journal record with a
    /// caller-supplied source label and metadata.
    pub fn apply_with_source(
        &self,
        ctx: &Context,
        delta: Delta,
        source: impl Into<String>,
        metadata: BTreeMap<String, String>,
    ) -> Result<ApplyMetrics> {
        self.apply_inner(
            ctx,
            delta,
            Some(source.into()),
            metadata,
            "crs.ApplyWithSource",
        )
    }

    fn apply_inner(
        &self,
        ctx: &Context,
        delta: Delta,
        source: Option<String>,
        metadata: BTreeMap<String, String>,
        span_name: &'static str,
    ) -> Result<ApplyMetrics> {
        ctx.check()?;
        let _span = self.span(span_name);
        let delta_type = delta.delta_type();

        // Phase 1: validate against a snapshot, no lock held
        let validate_start = Instant::now();
        let snapshot = self.snapshot();
        if let Err(cause) = delta.validate(&snapshot) {
            self.count_apply(delta_type, "validation_error");
            return Err(cause.into_validation());
        }
        let validation_duration = validate_start.elapsed();

        // Journal material is prepared before the commit so the commit
        // phase cannot fail on serialization.
        let delta_json = serde_json::to_string(&delta)?;
        let affected_nodes = delta.affected_nodes();
        let indexes_updated = delta.indexes_affected();

        ctx.check()?;

        // Phase 2: commit under the write lock
        let apply_start = Instant::now();
        let mut state = self.state.write();
        let old_generation = self.generation.load(Ordering::SeqCst);
        if self.config.max_generation > 0 && old_generation >= self.config.max_generation {
            self.count_apply(delta_type, "generation_limit");
            return Err(Error::GenerationLimit(self.config.max_generation));
        }
        if old_generation != snapshot.generation() {
            // Generation drifted during validation; close the optimistic
            // race by re-validating against the live state.
            let fresh = state.build_snapshot(old_generation);
            if let Err(cause) = delta.validate(&fresh) {
                self.count_apply(delta_type, "validation_error");
                return Err(cause.into_validation());
            }
        }

        let entries_modified = match &delta {
            Delta::Composite(composite) => {
                let mut working = state.clone_for_commit();
                let mut modified = 0;
                for (position, child) in composite.deltas.iter().enumerate() {
                    ctx.check()?;
                    modified += self.apply_one(&mut working, child).map_err(|e| {
                        self.count_apply(delta_type, "apply_error");
                        Error::ApplyRollback(format!("composite child {position}: {e}"))
                    })?;
                }
                *state = working;
                modified
            }
            single => self.apply_one(&mut state, single).map_err(|e| {
                self.count_apply(delta_type, "apply_error");
                Error::ApplyRollback(e.to_string())
            })?,
        };

        let new_generation = old_generation + 1;
        self.generation.store(new_generation, Ordering::SeqCst);
        if self.config.enable_metrics {
            metrics::GENERATION.set(new_generation as i64);
            self.update_index_gauges(&state);
        }
        drop(state);
        let apply_duration = apply_start.elapsed();

        let source_label =
            source.unwrap_or_else(|| delta.source().as_str().to_string());
        self.journal.record(RecordPayload {
            generation: new_generation,
            timestamp: now_ms(),
            delta_type,
            delta_json,
            source: source_label,
            session_id: self.session_id(),
            metadata,
            affected_nodes,
        });

        if self.config.enable_metrics {
            self.count_apply(delta_type, "ok");
            metrics::APPLY_DURATION_SECONDS
                .with_label_values(&[delta_type.as_str()])
                .observe(apply_duration.as_secs_f64() + validation_duration.as_secs_f64());
        }

        Ok(ApplyMetrics {
            delta_type,
            old_generation,
            new_generation,
            validation_duration,
            apply_duration,
            entries_modified,
            indexes_updated,
        })
    }

    /// Dispatch one non-composite delta against `state`. Infallible for
    /// any delta that passed validation; errors indicate a commit bug
    /// and are wrapped by the caller.
    fn apply_one(&self, state: &mut StoreState, delta: &Delta) -> Result<usize> {
        match delta {
            Delta::Proof(d) => {
                let now = now_ms();
                for (node_id, update) in &d.updates {
                    let mut pn = update.clone();
                    pn.node_id = node_id.clone();
                    pn.updated_at = now;
                    // Terminal statuses pin their proof numbers
                    match pn.status {
                        ProofStatus::Proven => pn.proof = 0,
                        ProofStatus::Disproven => pn.proof = INFINITE,
                        _ => {}
                    }
                    state.proof.insert(pn);
                }
                Ok(d.updates.len())
            }
            Delta::Constraint(d) => {
                for constraint in &d.add {
                    state.constraint.add(constraint.clone())?;
                }
                for id in &d.remove {
                    state.constraint.remove(id)?;
                }
                for constraint in d.update.values() {
                    state.constraint.update(constraint.clone())?;
                }
                Ok(d.add.len() + d.remove.len() + d.update.len())
            }
            Delta::Similarity(d) => {
                for pair in &d.pairs {
                    state.similarity.insert(&pair.from, &pair.to, pair.score)?;
                }
                Ok(d.pairs.len())
            }
            Delta::Dependency(d) => {
                if state.graph_adapter.is_some() {
                    // The graph is the source of truth; the delta type is
                    // retained only for journal compatibility.
                    if !self.dep_warning_emitted.swap(true, Ordering::SeqCst) {
                        tracing::warn!(
                            "dependency deltas are ignored while a graph provider is installed"
                        );
                    }
                    return Ok(0);
                }
                let mut modified = 0;
                for edge in &d.remove_edges {
                    if state.dependency.remove_edge(&edge.from, &edge.to) {
                        modified += 1;
                    }
                }
                for edge in &d.add_edges {
                    if state.dependency.add_edge(&edge.from, &edge.to)? {
                        modified += 1;
                    }
                }
                Ok(modified)
            }
            Delta::History(d) => {
                for entry in &d.entries {
                    state.history.append(entry.clone());
                }
                Ok(d.entries.len())
            }
            Delta::Streaming(d) => {
                for (item, count) in &d.increments {
                    state.streaming.observe(item, *count);
                }
                for item in &d.distinct_items {
                    state.streaming.observe_distinct(item);
                }
                Ok(d.increments.len() + d.distinct_items.len())
            }
            Delta::Composite(_) => Err(Error::ApplyRollback(
                "nested composite delta".into(),
            )),
        }
    }

    // === Proof operations ===

    /// Apply a targeted proof-number update, creating the node if absent.
    ///
    /// Bumps the generation like any other successful write.
    pub fn update_proof_number(&self, ctx: &Context, update: &ProofUpdate) -> Result<ProofNumber> {
        ctx.check()?;
        let _span = self.span("crs.UpdateProofNumber");
        let mut state = self.state.write();
        let old_generation = self.generation.load(Ordering::SeqCst);
        if self.config.max_generation > 0 && old_generation >= self.config.max_generation {
            return Err(Error::GenerationLimit(self.config.max_generation));
        }
        let pn = state
            .proof
            .apply_update(update, self.config.initial_proof_number, now_ms())?;
        let new_generation = old_generation + 1;
        self.generation.store(new_generation, Ordering::SeqCst);
        if self.config.enable_metrics {
            metrics::GENERATION.set(new_generation as i64);
            metrics::INDEX_SIZE
                .with_label_values(&[IndexTag::Proof.as_str()])
                .set(state.proof.size() as i64);
        }
        Ok(pn)
    }

    /// The tracked proof number for a node, if any
    pub fn get_proof_status(&self, node_id: &str) -> Option<ProofNumber> {
        self.state.read().proof.get(node_id).cloned()
    }

    /// Decide whether `tool` is futile for `session_id`.
    ///
    /// Inspects the proof node `session:{sid}:tool:{tool}`; with no proof
    /// data, falls back to the session step log and fires once the tool's
    /// execution count reaches the configured threshold.
    pub fn check_circuit_breaker(&self, session_id: &str, tool: &str) -> CircuitBreakerDecision {
        let node_id = format!("session:{session_id}:tool:{tool}");
        let entry = self.state.read().proof.get(&node_id).cloned();

        match entry {
            Some(pn) => {
                let should_fire = pn.status == ProofStatus::Disproven || pn.proof >= INFINITE;
                let reason = if should_fire {
                    format!("tool {tool} is disproven for session {session_id}")
                } else {
                    String::new()
                };
                CircuitBreakerDecision {
                    should_fire,
                    reason,
                    proof_number: Some(pn.proof),
                    status: pn.status,
                }
            }
            None => {
                let count = self.sessions.count_tool_executions(session_id, tool);
                let threshold = self.config.circuit_breaker_threshold;
                let should_fire = count >= threshold;
                let reason = if should_fire {
                    format!("tool {tool} executed {count} times (threshold {threshold})")
                } else {
                    String::new()
                };
                CircuitBreakerDecision {
                    should_fire,
                    reason,
                    proof_number: None,
                    status: ProofStatus::Unknown,
                }
            }
        }
    }

    /// Propagate a node's disproof to its ancestors.
    ///
    /// Breadth-first over reverse dependencies with a visited set and a
    /// bounded depth. Every reached parent gets a hard +1 increment;
    /// parents that become disproven propagate further. The dependency
    /// view is frozen once before the walk. Returns the number of
    /// parents whose proof numbers were modified.
    pub fn propagate_disproof(&self, ctx: &Context, node_id: &str) -> Result<usize> {
        ctx.check()?;
        let _span = self.span("crs.PropagateDisproof");

        let dep_view = {
            let state = self.state.read();
            state.dependency.view(state.graph_adapter.clone())
        };

        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(node_id.to_string());
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((node_id.to_string(), 0));
        let mut affected = 0;

        while let Some((current, depth)) = queue.pop_front() {
            ctx.check()?;
            if depth >= self.config.max_propagation_depth {
                continue;
            }
            for parent in dep_view.depended_by(&current) {
                if !visited.insert(parent.clone()) {
                    continue;
                }
                let update = ProofUpdate {
                    node_id: parent.clone(),
                    kind: ProofUpdateKind::Increment,
                    delta: 1,
                    reason: format!("child_disproven:{current}"),
                    source: SignalSource::Hard,
                };
                let pn = self.update_proof_number(ctx, &update)?;
                affected += 1;
                if pn.is_disproven() {
                    queue.push_back((parent, depth + 1));
                }
            }
        }
        Ok(affected)
    }

    // === Clause operations ===

    /// Add a learned clause.
    ///
    /// Semantic duplicates bump the existing clause instead of inserting;
    /// at capacity the least-recently-used clause is evicted.
    pub fn add_clause(&self, ctx: &Context, clause: Clause) -> Result<()> {
        ctx.check()?;
        let _span = self.span("crs.AddClause");
        clause.validate()?;
        let mut state = self.state.write();
        state.constraint.insert_clause(
            clause,
            self.config.clause_persistence.max_clauses,
            now_ms(),
        );
        if self.config.enable_metrics {
            metrics::INDEX_SIZE
                .with_label_values(&[IndexTag::Constraint.as_str()])
                .set((state.constraint.size() + state.constraint.clause_count()) as i64);
        }
        Ok(())
    }

    /// Gate a tool decision on the learned clauses.
    ///
    /// Builds a variable assignment from the proposed tool and the last
    /// two session steps, then blocks on the first violated clause.
    /// Returns `(allowed, reason)`.
    pub fn check_decision_allowed(&self, session_id: &str, tool: &str) -> (bool, String) {
        // Per-session lock first, released before the state lock is taken
        let (last, before_last) = self.sessions.last_two(session_id);

        let mut assignment = Assignment::new();
        assignment.insert(format!("tool:{tool}"), true);
        if let Some(last) = last {
            if !last.tool.is_empty() {
                assignment.insert(format!("prev_tool:{}", last.tool), true);
            }
            assignment.insert(format!("outcome:{}", last.outcome.as_str()), true);
            assignment.insert(format!("error:{}", last.error_category.as_str()), true);
        }
        if let Some(prev) = before_last {
            if !prev.tool.is_empty() {
                assignment.insert(format!("prev_prev_tool:{}", prev.tool), true);
            }
        }

        let mut state = self.state.write();
        let violated = state
            .constraint
            .find_violated(&assignment)
            .map(|c| c.id.clone());
        match violated {
            Some(id) => {
                state.constraint.touch_clause(&id, now_ms());
                (false, format!("violates learned clause {id}"))
            }
            None => (true, String::new()),
        }
    }

    /// Delete clauses older than the configured TTL. Returns the count.
    pub fn garbage_collect_clauses(&self) -> usize {
        let mut state = self.state.write();
        state
            .constraint
            .gc_expired_clauses(self.config.clause_persistence.ttl_ms, now_ms())
    }

    // === Session step log ===

    /// Record a session step; see the session log for the full contract
    pub fn record_step(&self, ctx: &Context, step: StepRecord) -> Result<StepRecord> {
        ctx.check()?;
        self.sessions.record(step)
    }

    /// All steps for a session, oldest first
    pub fn get_step_history(&self, session_id: &str) -> Vec<StepRecord> {
        self.sessions.history(session_id)
    }

    /// The most recent step, if any
    pub fn get_last_step(&self, session_id: &str) -> Option<StepRecord> {
        self.sessions.last(session_id)
    }

    /// Number of `ExecuteTool` steps for `tool` in the session
    pub fn count_tool_executions(&self, session_id: &str, tool: &str) -> u64 {
        self.sessions.count_tool_executions(session_id, tool)
    }

    /// Steps taken by `actor`
    pub fn get_steps_by_actor(&self, session_id: &str, actor: StepActor) -> Vec<StepRecord> {
        self.sessions.by_actor(session_id, actor)
    }

    /// Steps with `outcome`
    pub fn get_steps_by_outcome(&self, session_id: &str, outcome: StepOutcome) -> Vec<StepRecord> {
        self.sessions.by_outcome(session_id, outcome)
    }

    /// Drop all steps for a session
    pub fn clear_step_history(&self, session_id: &str) {
        self.sessions.clear(session_id)
    }

    // === Checkpoint / restore ===

    /// Deep-copied full state with an id and generation
    pub fn checkpoint(&self, ctx: &Context) -> Result<Checkpoint> {
        ctx.check()?;
        Ok(Checkpoint::new(self.snapshot(), now_ms()))
    }

    /// Replace all state with the checkpoint's content and re-install
    /// its generation. Not cancellable once the write lock is taken.
    pub fn restore(&self, ctx: &Context, checkpoint: &Checkpoint) -> Result<()> {
        ctx.check()?;
        let _span = self.span("crs.Restore");
        if checkpoint.data.generation() != checkpoint.generation {
            return Err(Error::InvalidCheckpoint(format!(
                "metadata generation {} does not match snapshot generation {}",
                checkpoint.generation,
                checkpoint.data.generation()
            )));
        }

        let data = &checkpoint.data;
        let mut state = self.state.write();
        state.proof = ProofIndex::from_entries(data.proof().entries().clone());
        // Clauses and streaming stats are cloned again so the restored
        // store shares nothing mutable with the checkpoint holder.
        state.constraint = ConstraintIndex::from_parts(
            data.constraint().constraints().clone(),
            data.constraint().clauses().clone(),
        );
        state.similarity = SimilarityIndex::from_scores(data.similarity().scores().clone());
        state.dependency = DependencyIndex::from_parts(
            data.dependency().forward().clone(),
            data.dependency().reverse().clone(),
        );
        state.history = HistoryIndex::from_entries(data.history().entries().to_vec());
        state.streaming = StreamingStats::from_counts(
            data.streaming().counts().clone(),
            data.streaming().cardinality(),
        );
        self.generation.store(checkpoint.generation, Ordering::SeqCst);
        if self.config.enable_metrics {
            metrics::GENERATION.set(checkpoint.generation as i64);
            self.update_index_gauges(&state);
        }
        Ok(())
    }

    // === Graph provider ===

    /// Install or clear the external graph provider.
    ///
    /// The previous provider, if any and distinct, is closed. Installing
    /// a provider puts the dependency index into graph-backed mode.
    pub fn set_graph_provider(&self, provider: Option<Arc<dyn GraphProvider>>) {
        let mut state = self.state.write();
        let previous = state.graph_provider.take();
        match provider {
            Some(new_provider) => {
                if let Some(previous) = previous {
                    if !Arc::ptr_eq(&previous, &new_provider) {
                        previous.close();
                    }
                }
                state.graph_adapter = Some(Arc::new(GraphAdapter::new(new_provider.clone())));
                state.graph_provider = Some(new_provider);
            }
            None => {
                if let Some(previous) = previous {
                    previous.close();
                }
                state.graph_adapter = None;
            }
        }
    }

    /// Drop the graph adapter's memoized size after an external refresh
    pub fn invalidate_graph_cache(&self) {
        if let Some(adapter) = self.state.read().graph_adapter.as_ref() {
            adapter.invalidate();
        }
    }

    // === Journal queries ===

    /// Journal records with `from < generation <= to`
    pub fn get_delta_range(&self, ctx: &Context, from: u64, to: u64) -> Result<Vec<DeltaRecord>> {
        self.journal.get_range(ctx, from, to)
    }

    /// Journal records touching a node
    pub fn get_deltas_by_node(&self, ctx: &Context, node_id: &str) -> Result<Vec<DeltaRecord>> {
        self.journal.get_by_node(ctx, node_id)
    }

    /// The journal record for one generation, if retained
    pub fn get_delta_by_generation(
        &self,
        ctx: &Context,
        generation: u64,
    ) -> Result<Option<DeltaRecord>> {
        self.journal.get_by_generation(ctx, generation)
    }

    /// A node's journal records in causal order
    pub fn explain(&self, ctx: &Context, node_id: &str) -> Result<Vec<DeltaRecord>> {
        self.journal.explain(ctx, node_id)
    }

    /// Number of retained journal records
    pub fn delta_history_size(&self, ctx: &Context) -> Result<usize> {
        self.journal.size(ctx)
    }

    /// Records dropped because the journal queue was full
    pub fn dropped_delta_records(&self) -> u64 {
        self.journal.dropped_records()
    }

    // === Lifecycle ===

    /// Verify every index view is reachable and the dependency graph is
    /// still acyclic.
    pub fn health_check(&self, ctx: &Context) -> Result<()> {
        ctx.check()?;
        let snapshot = self.snapshot();
        // Touch all six views; an unreachable view would be a bug
        let _ = snapshot.proof().size();
        let _ = snapshot.constraint().size();
        let _ = snapshot.similarity().size();
        let _ = snapshot.dependency().size();
        let _ = snapshot.history().size();
        let _ = snapshot.streaming().size();

        if let Some(node) = self.state.read().dependency.find_any_cycle() {
            return Err(Error::CycleDetected {
                from: node.clone(),
                to: node,
            });
        }
        Ok(())
    }

    /// Per-index entry counts
    pub fn stats(&self) -> StoreStats {
        let state = self.state.read();
        StoreStats {
            generation: self.generation.load(Ordering::SeqCst),
            proof_entries: state.proof.size(),
            constraints: state.constraint.size(),
            clauses: state.constraint.clause_count(),
            similarity_pairs: state.similarity.size(),
            dependency_edges: state.dependency.size(),
            history_entries: state.history.size(),
            streaming_items: state.streaming.size(),
        }
    }

    /// Stop the delta-history worker. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.journal.close();
    }

    // === Internals ===

    fn span(&self, name: &'static str) -> Option<tracing::span::EnteredSpan> {
        if self.config.enable_tracing {
            Some(tracing::debug_span!("crs_op", name = name).entered())
        } else {
            None
        }
    }

    fn count_apply(&self, delta_type: DeltaType, status: &str) {
        if self.config.enable_metrics {
            metrics::APPLY_TOTAL
                .with_label_values(&[delta_type.as_str(), status])
                .inc();
        }
    }

    fn update_index_gauges(&self, state: &StoreState) {
        metrics::INDEX_SIZE
            .with_label_values(&[IndexTag::Proof.as_str()])
            .set(state.proof.size() as i64);
        metrics::INDEX_SIZE
            .with_label_values(&[IndexTag::Constraint.as_str()])
            .set((state.constraint.size() + state.constraint.clause_count()) as i64);
        metrics::INDEX_SIZE
            .with_label_values(&[IndexTag::Similarity.as_str()])
            .set(state.similarity.size() as i64);
        metrics::INDEX_SIZE
            .with_label_values(&[IndexTag::Dependency.as_str()])
            .set(state.dependency.size() as i64);
        metrics::INDEX_SIZE
            .with_label_values(&[IndexTag::History.as_str()])
            .set(state.history.size() as i64);
        metrics::INDEX_SIZE
            .with_label_values(&[IndexTag::Streaming.as_str()])
            .set(state.streaming.size() as i64);
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.close();
    }
}
