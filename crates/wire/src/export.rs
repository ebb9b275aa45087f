//! Session export: snapshot → external JSON form
//!
//! The wire shape is a stable contract consumed by tooling outside this
//! process. Similarity pairs are exported in canonical single direction
//! (`from_id < to_id`); dependency edges are exported in full unless the
//! index is graph-backed, in which case the edge data is external and
//! only the count is reported. Truncation by the export options is
//! surfaced as a non-fatal warning.

use crs_core::types::{Constraint, HistoryEntry, ProofNumber};
use crs_store::metrics;
use crs_store::Snapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Dependency edge source marker: edges live in the store
pub const DEPENDENCY_SOURCE_LEGACY: &str = "legacy";
/// Dependency edge source marker: edges live in the external graph
pub const DEPENDENCY_SOURCE_GRAPH: &str = "graph_backed";

/// Caps applied while exporting; negative means unlimited
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Maximum similarity pairs emitted
    pub max_similarity_pairs: i64,
    /// Maximum dependency edges emitted
    pub max_dependency_edges: i64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            max_similarity_pairs: crs_core::limits::DEFAULT_MAX_SIMILARITY_PAIRS,
            max_dependency_edges: crs_core::limits::DEFAULT_MAX_DEPENDENCY_EDGES,
        }
    }
}

/// One canonical similarity pair on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityPairExport {
    /// Lexically smaller node
    pub from_id: String,
    /// Lexically larger node
    pub to_id: String,
    /// Score in [0, 1]
    pub similarity: f64,
}

/// One dependency edge on the wire
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdgeExport {
    /// Depending node
    pub from_id: String,
    /// Depended-upon node
    pub to_id: String,
}

/// Proof index section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProofExport {
    /// Every tracked proof number
    pub entries: Vec<ProofNumber>,
}

/// Constraint index section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConstraintExport {
    /// Every constraint
    pub constraints: Vec<Constraint>,
}

/// Similarity index section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SimilarityExport {
    /// Canonical pair count before truncation
    pub pair_count: usize,
    /// Canonical pairs, possibly truncated
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pairs: Vec<SimilarityPairExport>,
    /// Whether the pair list was truncated
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

/// Dependency index section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyExport {
    /// Edge count before truncation
    pub edge_count: usize,
    /// Edges, absent when graph-backed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<DependencyEdgeExport>,
    /// Where the edges live: `legacy` or `graph_backed`
    pub source: String,
    /// Whether the edge list was truncated
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

impl Default for DependencyExport {
    fn default() -> Self {
        DependencyExport {
            edge_count: 0,
            edges: Vec::new(),
            source: DEPENDENCY_SOURCE_LEGACY.to_string(),
            truncated: false,
        }
    }
}

/// History index section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HistoryExport {
    /// Total entries
    pub entry_count: usize,
    /// Entries, most recent last
    pub recent_entries: Vec<HistoryEntry>,
}

/// Streaming index section; frequencies are summarized, not exported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StreamingExport {
    /// Distinct items observed
    pub cardinality: u64,
    /// Rough in-memory footprint of the frequency map
    pub approximate_bytes: usize,
}

/// The six index sections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IndexExports {
    /// Proof numbers
    pub proof: ProofExport,
    /// Constraints
    pub constraint: ConstraintExport,
    /// Similarity pairs
    pub similarity: SimilarityExport,
    /// Dependency edges
    pub dependency: DependencyExport,
    /// Decision history
    pub history: HistoryExport,
    /// Streaming summary
    pub streaming: StreamingExport,
}

/// Aggregate search progress, derived from the indexes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExportSummary {
    /// Nodes with any proof record
    pub nodes_explored: usize,
    /// Nodes proven
    pub nodes_proven: usize,
    /// Nodes disproven
    pub nodes_disproven: usize,
    /// Nodes still unknown
    pub nodes_unknown: usize,
    /// Constraints in force
    pub constraints_applied: usize,
    /// Longest path in the dependency graph; 0 when graph-backed
    pub exploration_depth: usize,
    /// Proven fraction of explored nodes, in [0, 1]
    pub confidence_score: f64,
}

/// Top-level session export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionExport {
    /// Session the snapshot was bound to
    pub session_id: String,
    /// Generation of the exported snapshot
    pub generation: i64,
    /// Export time, milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Per-index sections
    pub indexes: IndexExports,
    /// Derived aggregates
    pub summary: ExportSummary,
}

/// Export a snapshot to the external JSON form.
///
/// Returns the export and any non-fatal warnings (truncation notices).
pub fn export_snapshot(
    snapshot: &Snapshot,
    session_id: &str,
    options: &ExportOptions,
) -> (SessionExport, Vec<String>) {
    let _span = tracing::debug_span!("crs_op", name = "crs.Serializer.ExportFull").entered();
    let timer = std::time::Instant::now();
    let mut warnings = Vec::new();

    // Proof entries, sorted for deterministic output
    let mut proof_entries: Vec<ProofNumber> = snapshot.proof().all().cloned().collect();
    proof_entries.sort_by(|a, b| a.node_id.cmp(&b.node_id));

    let mut constraints: Vec<Constraint> = snapshot.constraint().all().cloned().collect();
    constraints.sort_by(|a, b| a.id.cmp(&b.id));

    let pair_count = snapshot.similarity().size();
    let (pairs, similarity_truncated) =
        snapshot.similarity().all_pairs_filtered(options.max_similarity_pairs);
    if similarity_truncated {
        warnings.push(format!(
            "similarity pairs truncated to {} of {}",
            pairs.len(),
            pair_count
        ));
    }
    let similarity = SimilarityExport {
        pair_count,
        pairs: pairs
            .into_iter()
            .map(|p| SimilarityPairExport {
                from_id: p.from,
                to_id: p.to,
                similarity: p.score,
            })
            .collect(),
        truncated: similarity_truncated,
    };

    let dependency = if snapshot.dependency().is_graph_backed() {
        DependencyExport {
            edge_count: snapshot.dependency().size(),
            edges: Vec::new(),
            source: DEPENDENCY_SOURCE_GRAPH.to_string(),
            truncated: false,
        }
    } else {
        let all_edges = snapshot.dependency().all_edges().unwrap_or_default();
        let edge_count = all_edges.len();
        let mut edges: Vec<DependencyEdgeExport> = all_edges
            .into_iter()
            .map(|e| DependencyEdgeExport {
                from_id: e.from,
                to_id: e.to,
            })
            .collect();
        let truncated =
            options.max_dependency_edges >= 0 && edges.len() > options.max_dependency_edges as usize;
        if truncated {
            edges.truncate(options.max_dependency_edges as usize);
            warnings.push(format!(
                "dependency edges truncated to {} of {edge_count}",
                edges.len()
            ));
        }
        DependencyExport {
            edge_count,
            edges,
            source: DEPENDENCY_SOURCE_LEGACY.to_string(),
            truncated,
        }
    };

    let history_entries = snapshot.history().entries().to_vec();
    let history = HistoryExport {
        entry_count: history_entries.len(),
        recent_entries: history_entries,
    };

    let streaming = StreamingExport {
        cardinality: snapshot.streaming().cardinality(),
        approximate_bytes: snapshot.streaming().approximate_bytes(),
    };

    let summary = build_summary(snapshot, &proof_entries, constraints.len());

    let export = SessionExport {
        session_id: session_id.to_string(),
        generation: snapshot.generation() as i64,
        timestamp: crs_core::time::now_ms(),
        indexes: IndexExports {
            proof: ProofExport {
                entries: proof_entries,
            },
            constraint: ConstraintExport { constraints },
            similarity,
            dependency,
            history,
            streaming,
        },
        summary,
    };

    metrics::EXPORT_DURATION_SECONDS
        .with_label_values(&[session_id])
        .observe(timer.elapsed().as_secs_f64());
    (export, warnings)
}

fn build_summary(
    snapshot: &Snapshot,
    proof_entries: &[ProofNumber],
    constraints_applied: usize,
) -> ExportSummary {
    use crs_core::types::ProofStatus;

    let nodes_explored = proof_entries.len();
    let nodes_proven = proof_entries
        .iter()
        .filter(|p| p.status == ProofStatus::Proven)
        .count();
    let nodes_disproven = proof_entries
        .iter()
        .filter(|p| p.status == ProofStatus::Disproven)
        .count();
    let nodes_unknown = proof_entries
        .iter()
        .filter(|p| p.status == ProofStatus::Unknown)
        .count();

    let confidence_score = if nodes_explored == 0 {
        0.0
    } else {
        (nodes_proven as f64 / nodes_explored as f64).clamp(0.0, 1.0)
    };

    ExportSummary {
        nodes_explored,
        nodes_proven,
        nodes_disproven,
        nodes_unknown,
        constraints_applied,
        exploration_depth: dependency_depth(snapshot),
        confidence_score,
    }
}

/// Longest path in the (acyclic) dependency graph.
///
/// Graph-backed indexes report 0: walking an external graph during
/// export is not worth the cost.
fn dependency_depth(snapshot: &Snapshot) -> usize {
    if snapshot.dependency().is_graph_backed() {
        return 0;
    }
    let forward = snapshot.dependency().forward();
    let mut memo: HashMap<&str, usize> = HashMap::new();

    fn depth_of<'a>(
        node: &'a str,
        forward: &'a HashMap<String, std::collections::BTreeSet<String>>,
        memo: &mut HashMap<&'a str, usize>,
    ) -> usize {
        if let Some(depth) = memo.get(node) {
            return *depth;
        }
        let depth = forward
            .get(node)
            .map(|nexts| {
                nexts
                    .iter()
                    .map(|next| depth_of(next, forward, memo) + 1)
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0);
        memo.insert(node, depth);
        depth
    }

    forward
        .keys()
        .map(|node| depth_of(node, forward, &mut memo))
        .max()
        .unwrap_or(0)
}
