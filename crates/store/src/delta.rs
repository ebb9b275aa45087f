//! Typed deltas and their capability surface
//!
//! A delta is a validated description of a state change. Producers build
//! one, the store validates it against a snapshot, and the commit phase
//! dispatches on the variant to mutate the affected indexes.
//!
//! The capability surface every variant implements:
//! - `validate(snapshot)` — full pre-apply validation; commit-phase
//!   mutation is infallible once validation has passed
//! - `merge(other)` — combine two deltas; later timestamp wins for
//!   conflicting per-key entries, source upgrades from soft to hard if
//!   either side is hard, differing types join into a composite
//! - `conflicts_with(other)` — overlapping key sets of the same kind
//! - `indexes_affected()` / `affected_nodes()` — dispatch and journaling
//!
//! On the wire a delta is `{"type": <kind>, "data": <fields>}`.

use crs_core::error::{Error, Result};
use crs_core::time::now_ms;
use crs_core::types::{
    Constraint, DeltaType, DependencyEdge, HistoryEntry, IndexTag, IndexTagSet, ProofNumber,
    ProofStatus, SignalSource,
};
use crs_index::{DependencyIndex, SimilarityIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::snapshot::Snapshot;

/// Proof-number updates keyed by node id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofDelta {
    /// Source of the evidence
    pub source: SignalSource,
    /// Creation time, milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Replacement records per node
    pub updates: BTreeMap<String, ProofNumber>,
}

/// Constraint additions, removals, and replacements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintDelta {
    /// Source of the evidence
    pub source: SignalSource,
    /// Creation time, milliseconds since the Unix epoch
    pub timestamp: i64,
    /// New constraints; ids must be unused
    #[serde(default)]
    pub add: Vec<Constraint>,
    /// Ids to remove; must exist
    #[serde(default)]
    pub remove: Vec<String>,
    /// Replacements keyed by id; must exist
    #[serde(default)]
    pub update: BTreeMap<String, Constraint>,
}

/// One scored pair inside a similarity delta
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityUpdate {
    /// First node
    pub from: String,
    /// Second node
    pub to: String,
    /// Score in [0, 1]
    pub score: f64,
}

/// Pairwise similarity scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityDelta {
    /// Source of the evidence
    pub source: SignalSource,
    /// Creation time, milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Scored pairs; applied symmetrically
    pub pairs: Vec<SimilarityUpdate>,
}

/// Dependency edge additions and removals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyDelta {
    /// Source of the evidence
    pub source: SignalSource,
    /// Creation time, milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Edges to add; must not close a cycle
    #[serde(default)]
    pub add_edges: Vec<DependencyEdge>,
    /// Edges to remove; missing edges are tolerated
    #[serde(default)]
    pub remove_edges: Vec<DependencyEdge>,
}

/// History entries to append
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryDelta {
    /// Source of the evidence
    pub source: SignalSource,
    /// Creation time, milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Entries, appended in order
    pub entries: Vec<HistoryEntry>,
}

/// Streaming frequency increments. Always valid; commutative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingDelta {
    /// Source of the evidence
    pub source: SignalSource,
    /// Creation time, milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Observation counts per item
    #[serde(default)]
    pub increments: BTreeMap<String, u64>,
    /// Items registered for cardinality without an observation
    #[serde(default)]
    pub distinct_items: Vec<String>,
}

/// An ordered batch of deltas applied as one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeDelta {
    /// Children, applied in order
    pub deltas: Vec<Delta>,
}

/// A typed, validated description of a state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Delta {
    /// Proof-number updates
    Proof(ProofDelta),
    /// Constraint changes
    Constraint(ConstraintDelta),
    /// Similarity pairs
    Similarity(SimilarityDelta),
    /// Dependency edges
    Dependency(DependencyDelta),
    /// History entries
    History(HistoryDelta),
    /// Streaming increments
    Streaming(StreamingDelta),
    /// An ordered batch
    Composite(CompositeDelta),
}

impl Delta {
    /// Proof delta stamped with the current time
    pub fn proof(source: SignalSource, updates: BTreeMap<String, ProofNumber>) -> Delta {
        Delta::Proof(ProofDelta {
            source,
            timestamp: now_ms(),
            updates,
        })
    }

    /// Constraint-add delta stamped with the current time
    pub fn constraint_add(source: SignalSource, add: Vec<Constraint>) -> Delta {
        Delta::Constraint(ConstraintDelta {
            source,
            timestamp: now_ms(),
            add,
            remove: Vec::new(),
            update: BTreeMap::new(),
        })
    }

    /// Similarity delta stamped with the current time
    pub fn similarity(source: SignalSource, pairs: Vec<SimilarityUpdate>) -> Delta {
        Delta::Similarity(SimilarityDelta {
            source,
            timestamp: now_ms(),
            pairs,
        })
    }

    /// Dependency-add delta stamped with the current time
    pub fn dependency_add(source: SignalSource, add_edges: Vec<DependencyEdge>) -> Delta {
        Delta::Dependency(DependencyDelta {
            source,
            timestamp: now_ms(),
            add_edges,
            remove_edges: Vec::new(),
        })
    }

    /// History delta stamped with the current time
    pub fn history(source: SignalSource, entries: Vec<HistoryEntry>) -> Delta {
        Delta::History(HistoryDelta {
            source,
            timestamp: now_ms(),
            entries,
        })
    }

    /// Streaming delta stamped with the current time
    pub fn streaming(source: SignalSource, increments: BTreeMap<String, u64>) -> Delta {
        Delta::Streaming(StreamingDelta {
            source,
            timestamp: now_ms(),
            increments,
            distinct_items: Vec::new(),
        })
    }

    /// The variant's kind tag
    pub fn delta_type(&self) -> DeltaType {
        match self {
            Delta::Proof(_) => DeltaType::Proof,
            Delta::Constraint(_) => DeltaType::Constraint,
            Delta::Similarity(_) => DeltaType::Similarity,
            Delta::Dependency(_) => DeltaType::Dependency,
            Delta::History(_) => DeltaType::History,
            Delta::Streaming(_) => DeltaType::Streaming,
            Delta::Composite(_) => DeltaType::Composite,
        }
    }

    /// Strongest source across the delta.
    ///
    /// A composite is as hard as its hardest child.
    pub fn source(&self) -> SignalSource {
        match self {
            Delta::Proof(d) => d.source,
            Delta::Constraint(d) => d.source,
            Delta::Similarity(d) => d.source,
            Delta::Dependency(d) => d.source,
            Delta::History(d) => d.source,
            Delta::Streaming(d) => d.source,
            Delta::Composite(c) => {
                let mut strongest = SignalSource::Unknown;
                for child in &c.deltas {
                    let s = child.source();
                    strongest = match (strongest, s) {
                        (_, SignalSource::Safety) | (SignalSource::Safety, _) => {
                            SignalSource::Safety
                        }
                        (_, SignalSource::Hard) | (SignalSource::Hard, _) => SignalSource::Hard,
                        (_, SignalSource::Soft) | (SignalSource::Soft, _) => SignalSource::Soft,
                        _ => SignalSource::Unknown,
                    };
                }
                strongest
            }
        }
    }

    /// Creation time; a composite reports its latest child
    pub fn timestamp(&self) -> i64 {
        match self {
            Delta::Proof(d) => d.timestamp,
            Delta::Constraint(d) => d.timestamp,
            Delta::Similarity(d) => d.timestamp,
            Delta::Dependency(d) => d.timestamp,
            Delta::History(d) => d.timestamp,
            Delta::Streaming(d) => d.timestamp,
            Delta::Composite(c) => c.deltas.iter().map(|d| d.timestamp()).max().unwrap_or(0),
        }
    }

    /// Validate against a snapshot. Returns the specific cause; the store
    /// wraps it as a validation failure.
    pub fn validate(&self, snapshot: &Snapshot) -> Result<()> {
        match self {
            Delta::Proof(d) => {
                for (node_id, pn) in &d.updates {
                    if node_id.is_empty() {
                        return Err(Error::EmptyId("proof delta node id".into()));
                    }
                    if pn.status == ProofStatus::Disproven && !d.source.is_hard() {
                        return Err(Error::HardSoftBoundary(format!(
                            "source {} may not disprove node {}",
                            d.source.as_str(),
                            node_id
                        )));
                    }
                }
                Ok(())
            }
            Delta::Constraint(d) => {
                let index = snapshot.constraint();
                let mut adding: BTreeSet<&str> = BTreeSet::new();
                for constraint in &d.add {
                    if constraint.id.is_empty() {
                        return Err(Error::EmptyId("constraint id".into()));
                    }
                    if !adding.insert(constraint.id.as_str()) {
                        return Err(Error::DuplicateConstraint(constraint.id.clone()));
                    }
                    if index.get(&constraint.id).is_some() {
                        return Err(Error::DuplicateConstraint(constraint.id.clone()));
                    }
                }
                for id in &d.remove {
                    if index.get(id).is_none() {
                        return Err(Error::ConstraintNotFound(id.clone()));
                    }
                }
                for id in d.update.keys() {
                    if index.get(id).is_none() {
                        return Err(Error::ConstraintNotFound(id.clone()));
                    }
                }
                Ok(())
            }
            Delta::Similarity(d) => {
                for pair in &d.pairs {
                    SimilarityIndex::validate_pair(&pair.from, &pair.to, pair.score)?;
                }
                Ok(())
            }
            Delta::Dependency(d) => {
                for edge in &d.add_edges {
                    if edge.from == edge.to {
                        return Err(Error::SelfEdge(edge.from.clone()));
                    }
                }
                // Graph-backed mode ignores dependency deltas entirely, so
                // there is nothing further to check against.
                if snapshot.dependency().is_graph_backed() {
                    return Ok(());
                }
                // Simulate removals then additions on a scratch graph and
                // reject any add that would close a cycle.
                let mut scratch = DependencyIndex::from_parts(
                    snapshot.dependency().forward().clone(),
                    snapshot.dependency().reverse().clone(),
                );
                for edge in &d.remove_edges {
                    scratch.remove_edge(&edge.from, &edge.to);
                }
                for edge in &d.add_edges {
                    scratch.add_edge(&edge.from, &edge.to)?;
                }
                Ok(())
            }
            Delta::History(d) => {
                for entry in &d.entries {
                    entry.validate()?;
                }
                Ok(())
            }
            Delta::Streaming(_) => Ok(()),
            Delta::Composite(c) => {
                let mut failures: Vec<String> = Vec::new();
                for (position, child) in c.deltas.iter().enumerate() {
                    if let Delta::Composite(_) = child {
                        failures.push(format!("child {position}: nested composite"));
                        continue;
                    }
                    if let Err(e) = child.validate(snapshot) {
                        failures.push(format!("child {position}: {e}"));
                    }
                }
                if failures.is_empty() {
                    Ok(())
                } else {
                    Err(Error::CompositeValidation(failures.join("; ")))
                }
            }
        }
    }

    /// Merge with another delta.
    ///
    /// Same-kind deltas merge per key with the later timestamp winning;
    /// the merged source upgrades to hard if either side is hard.
    /// Differing kinds join into a composite.
    pub fn merge(self, other: Delta) -> Delta {
        match (self, other) {
            (Delta::Proof(a), Delta::Proof(b)) => {
                let (source, timestamp) = merged_stamp(a.source, a.timestamp, b.source, b.timestamp);
                let (earlier, later) = order_by_time(a.timestamp, b.timestamp, a.updates, b.updates);
                let mut updates = earlier;
                updates.extend(later);
                Delta::Proof(ProofDelta {
                    source,
                    timestamp,
                    updates,
                })
            }
            (Delta::Constraint(a), Delta::Constraint(b)) => {
                let (source, timestamp) = merged_stamp(a.source, a.timestamp, b.source, b.timestamp);
                let (first, second) = if a.timestamp <= b.timestamp {
                    (a, b)
                } else {
                    (b, a)
                };
                let mut add: Vec<Constraint> = first.add;
                for constraint in second.add {
                    if let Some(existing) = add.iter_mut().find(|c| c.id == constraint.id) {
                        *existing = constraint;
                    } else {
                        add.push(constraint);
                    }
                }
                let mut remove = first.remove;
                for id in second.remove {
                    if !remove.contains(&id) {
                        remove.push(id);
                    }
                }
                let mut update = first.update;
                update.extend(second.update);
                Delta::Constraint(ConstraintDelta {
                    source,
                    timestamp,
                    add,
                    remove,
                    update,
                })
            }
            (Delta::Similarity(a), Delta::Similarity(b)) => {
                let (source, timestamp) = merged_stamp(a.source, a.timestamp, b.source, b.timestamp);
                let (first, second) = if a.timestamp <= b.timestamp {
                    (a, b)
                } else {
                    (b, a)
                };
                let mut merged: BTreeMap<(String, String), f64> = BTreeMap::new();
                for pair in first.pairs.into_iter().chain(second.pairs) {
                    merged.insert((pair.from, pair.to), pair.score);
                }
                Delta::Similarity(SimilarityDelta {
                    source,
                    timestamp,
                    pairs: merged
                        .into_iter()
                        .map(|((from, to), score)| SimilarityUpdate { from, to, score })
                        .collect(),
                })
            }
            (Delta::Dependency(a), Delta::Dependency(b)) => {
                let (source, timestamp) = merged_stamp(a.source, a.timestamp, b.source, b.timestamp);
                let mut add_edges = a.add_edges;
                for edge in b.add_edges {
                    if !add_edges.contains(&edge) {
                        add_edges.push(edge);
                    }
                }
                let mut remove_edges = a.remove_edges;
                for edge in b.remove_edges {
                    if !remove_edges.contains(&edge) {
                        remove_edges.push(edge);
                    }
                }
                Delta::Dependency(DependencyDelta {
                    source,
                    timestamp,
                    add_edges,
                    remove_edges,
                })
            }
            (Delta::History(a), Delta::History(b)) => {
                let (source, timestamp) = merged_stamp(a.source, a.timestamp, b.source, b.timestamp);
                let (first, second) = if a.timestamp <= b.timestamp {
                    (a, b)
                } else {
                    (b, a)
                };
                let mut entries = first.entries;
                entries.extend(second.entries);
                Delta::History(HistoryDelta {
                    source,
                    timestamp,
                    entries,
                })
            }
            (Delta::Streaming(a), Delta::Streaming(b)) => {
                let (source, timestamp) = merged_stamp(a.source, a.timestamp, b.source, b.timestamp);
                let mut increments = a.increments;
                for (item, count) in b.increments {
                    let entry = increments.entry(item).or_insert(0);
                    *entry = entry.saturating_add(count);
                }
                let mut distinct_items = a.distinct_items;
                for item in b.distinct_items {
                    if !distinct_items.contains(&item) {
                        distinct_items.push(item);
                    }
                }
                Delta::Streaming(StreamingDelta {
                    source,
                    timestamp,
                    increments,
                    distinct_items,
                })
            }
            (Delta::Composite(mut a), Delta::Composite(b)) => {
                a.deltas.extend(b.deltas);
                Delta::Composite(a)
            }
            (Delta::Composite(mut a), other) => {
                a.deltas.push(other);
                Delta::Composite(a)
            }
            (this, Delta::Composite(b)) => {
                let mut deltas = vec![this];
                deltas.extend(b.deltas);
                Delta::Composite(CompositeDelta { deltas })
            }
            (this, other) => Delta::Composite(CompositeDelta {
                deltas: vec![this, other],
            }),
        }
    }

    /// Whether applying both deltas could produce order-dependent results.
    ///
    /// Same-kind deltas conflict when their key sets overlap; history and
    /// streaming deltas are append-only/commutative and never conflict.
    pub fn conflicts_with(&self, other: &Delta) -> bool {
        match (self, other) {
            (Delta::Composite(c), other) => c.deltas.iter().any(|d| d.conflicts_with(other)),
            (this, Delta::Composite(c)) => c.deltas.iter().any(|d| this.conflicts_with(d)),
            (Delta::History(_), Delta::History(_)) => false,
            (Delta::Streaming(_), Delta::Streaming(_)) => false,
            (a, b) if a.delta_type() == b.delta_type() => {
                let keys_a = a.conflict_keys();
                let keys_b = b.conflict_keys();
                keys_a.intersection(&keys_b).next().is_some()
            }
            _ => false,
        }
    }

    fn conflict_keys(&self) -> BTreeSet<String> {
        let mut keys = BTreeSet::new();
        match self {
            Delta::Proof(d) => keys.extend(d.updates.keys().cloned()),
            Delta::Constraint(d) => {
                keys.extend(d.add.iter().map(|c| c.id.clone()));
                keys.extend(d.remove.iter().cloned());
                keys.extend(d.update.keys().cloned());
            }
            Delta::Similarity(d) => {
                for pair in &d.pairs {
                    let (lo, hi) = if pair.from <= pair.to {
                        (&pair.from, &pair.to)
                    } else {
                        (&pair.to, &pair.from)
                    };
                    keys.insert(format!("{lo}|{hi}"));
                }
            }
            Delta::Dependency(d) => {
                for edge in d.add_edges.iter().chain(&d.remove_edges) {
                    keys.insert(format!("{}->{}", edge.from, edge.to));
                }
            }
            Delta::History(_) | Delta::Streaming(_) => {}
            Delta::Composite(c) => {
                for child in &c.deltas {
                    keys.extend(child.conflict_keys());
                }
            }
        }
        keys
    }

    /// Which indexes the commit phase will touch
    pub fn indexes_affected(&self) -> IndexTagSet {
        match self {
            Delta::Proof(_) => IndexTagSet::single(IndexTag::Proof),
            Delta::Constraint(_) => IndexTagSet::single(IndexTag::Constraint),
            Delta::Similarity(_) => IndexTagSet::single(IndexTag::Similarity),
            Delta::Dependency(_) => IndexTagSet::single(IndexTag::Dependency),
            Delta::History(_) => IndexTagSet::single(IndexTag::History),
            Delta::Streaming(_) => IndexTagSet::single(IndexTag::Streaming),
            Delta::Composite(c) => c
                .deltas
                .iter()
                .fold(IndexTagSet::empty(), |acc, d| acc.union(d.indexes_affected())),
        }
    }

    /// Node ids this delta touches, for journal by-node lookups.
    ///
    /// Deduplicated and sorted.
    pub fn affected_nodes(&self) -> Vec<String> {
        let mut nodes: BTreeSet<String> = BTreeSet::new();
        self.collect_affected_nodes(&mut nodes);
        nodes.into_iter().collect()
    }

    fn collect_affected_nodes(&self, nodes: &mut BTreeSet<String>) {
        match self {
            Delta::Proof(d) => nodes.extend(d.updates.keys().cloned()),
            Delta::Constraint(d) => {
                for constraint in d.add.iter().chain(d.update.values()) {
                    nodes.extend(constraint.nodes.iter().cloned());
                }
                nodes.extend(d.remove.iter().cloned());
            }
            Delta::Similarity(d) => {
                for pair in &d.pairs {
                    nodes.insert(pair.from.clone());
                    nodes.insert(pair.to.clone());
                }
            }
            Delta::Dependency(d) => {
                for edge in d.add_edges.iter().chain(&d.remove_edges) {
                    nodes.insert(edge.from.clone());
                    nodes.insert(edge.to.clone());
                }
            }
            Delta::History(d) => {
                for entry in &d.entries {
                    if !entry.node_id.is_empty() {
                        nodes.insert(entry.node_id.clone());
                    }
                }
            }
            Delta::Streaming(d) => {
                nodes.extend(d.increments.keys().cloned());
                nodes.extend(d.distinct_items.iter().cloned());
            }
            Delta::Composite(c) => {
                for child in &c.deltas {
                    child.collect_affected_nodes(nodes);
                }
            }
        }
    }
}

fn merged_stamp(
    source_a: SignalSource,
    ts_a: i64,
    source_b: SignalSource,
    ts_b: i64,
) -> (SignalSource, i64) {
    let later = if ts_b >= ts_a { source_b } else { source_a };
    let source = if later.is_hard() {
        later
    } else if source_a.is_hard() {
        source_a
    } else if source_b.is_hard() {
        source_b
    } else {
        later
    };
    (source, ts_a.max(ts_b))
}

fn order_by_time<T>(ts_a: i64, ts_b: i64, a: T, b: T) -> (T, T) {
    if ts_a <= ts_b {
        (a, b)
    } else {
        (b, a)
    }
}
