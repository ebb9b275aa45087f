//! Session import: external JSON form → rebuilt index state
//!
//! Import validates before building anything: similarity scores outside
//! [0, 1] and empty ids are rejected, and under strict validation a
//! count mismatch on a non-truncated section is an error. Similarity
//! pairs arrive in canonical single direction and are symmetrized;
//! duplicate dependency edges are deduplicated silently.

use crate::export::{SessionExport, DEPENDENCY_SOURCE_GRAPH};
use crs_core::error::{Error, Result};
use crs_core::types::{Constraint, HistoryEntry, ProofNumber};
use crs_store::metrics;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Import validation options
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Error on count mismatches in non-truncated sections
    pub strict_validation: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            strict_validation: true,
        }
    }
}

/// Index state rebuilt from a session export, ready to install
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedState {
    /// Generation of the exported snapshot
    pub generation: u64,
    /// Proof numbers keyed by node
    pub proof: HashMap<String, ProofNumber>,
    /// Constraints keyed by id
    pub constraints: HashMap<String, Constraint>,
    /// Symmetrized similarity scores
    pub similarity: HashMap<String, BTreeMap<String, f64>>,
    /// Forward dependency adjacency
    pub dependency_forward: HashMap<String, BTreeSet<String>>,
    /// Reverse dependency adjacency
    pub dependency_reverse: HashMap<String, BTreeSet<String>>,
    /// History entries, oldest first
    pub history: Vec<HistoryEntry>,
    /// Whether dependency edges live in an external graph
    pub dependency_graph_backed: bool,
}

/// Rebuild index state from a session export.
///
/// Returns the state and any non-fatal warnings.
pub fn import_session(
    export: &SessionExport,
    options: &ImportOptions,
) -> Result<(ImportedState, Vec<String>)> {
    let _span = tracing::debug_span!("crs_op", name = "crs.Serializer.Import").entered();
    let timer = std::time::Instant::now();

    let result = import_inner(export, options);
    match &result {
        Ok(_) => {
            metrics::IMPORT_DURATION_SECONDS
                .with_label_values(&[export.session_id.as_str()])
                .observe(timer.elapsed().as_secs_f64());
        }
        Err(e) => {
            let error_type = match e {
                Error::ImportValidation(_) => "validation",
                _ => "internal",
            };
            metrics::IMPORT_ERRORS_TOTAL
                .with_label_values(&[export.session_id.as_str(), error_type])
                .inc();
        }
    }
    result
}

fn import_inner(
    export: &SessionExport,
    options: &ImportOptions,
) -> Result<(ImportedState, Vec<String>)> {
    let mut warnings = Vec::new();
    let mut state = ImportedState {
        generation: export.generation.max(0) as u64,
        ..ImportedState::default()
    };

    // Proof
    for entry in &export.indexes.proof.entries {
        if entry.node_id.is_empty() {
            return Err(Error::ImportValidation(
                "proof entry with empty node id".into(),
            ));
        }
        state.proof.insert(entry.node_id.clone(), entry.clone());
    }

    // Constraints
    for constraint in &export.indexes.constraint.constraints {
        if constraint.id.is_empty() {
            return Err(Error::ImportValidation(
                "constraint with empty id".into(),
            ));
        }
        if state
            .constraints
            .insert(constraint.id.clone(), constraint.clone())
            .is_some()
        {
            return Err(Error::ImportValidation(format!(
                "duplicate constraint id {:?}",
                constraint.id
            )));
        }
    }

    // Similarity: validate, then symmetrize
    let similarity = &export.indexes.similarity;
    if options.strict_validation
        && !similarity.truncated
        && similarity.pairs.len() != similarity.pair_count
    {
        return Err(Error::ImportValidation(format!(
            "similarity pair count mismatch: header says {}, payload has {}",
            similarity.pair_count,
            similarity.pairs.len()
        )));
    }
    for pair in &similarity.pairs {
        if pair.from_id.is_empty() || pair.to_id.is_empty() {
            return Err(Error::ImportValidation(
                "similarity pair with empty node id".into(),
            ));
        }
        if pair.from_id == pair.to_id {
            return Err(Error::ImportValidation(format!(
                "self-similarity for {:?}",
                pair.from_id
            )));
        }
        if !(0.0..=1.0).contains(&pair.similarity) || pair.similarity.is_nan() {
            return Err(Error::ImportValidation(format!(
                "similarity score {} for ({:?}, {:?}) outside [0, 1]",
                pair.similarity, pair.from_id, pair.to_id
            )));
        }
        state
            .similarity
            .entry(pair.from_id.clone())
            .or_default()
            .insert(pair.to_id.clone(), pair.similarity);
        state
            .similarity
            .entry(pair.to_id.clone())
            .or_default()
            .insert(pair.from_id.clone(), pair.similarity);
    }

    // Dependency
    let dependency = &export.indexes.dependency;
    if dependency.source == DEPENDENCY_SOURCE_GRAPH {
        state.dependency_graph_backed = true;
        if !dependency.edges.is_empty() {
            warnings.push("graph-backed export carries edges; ignoring them".to_string());
        }
    } else {
        if options.strict_validation
            && !dependency.truncated
            && dependency.edges.len() != dependency.edge_count
        {
            return Err(Error::ImportValidation(format!(
                "dependency edge count mismatch: header says {}, payload has {}",
                dependency.edge_count,
                dependency.edges.len()
            )));
        }
        for edge in &dependency.edges {
            if edge.from_id.is_empty() || edge.to_id.is_empty() {
                return Err(Error::ImportValidation(
                    "dependency edge with empty endpoint".into(),
                ));
            }
            if edge.from_id == edge.to_id {
                return Err(Error::ImportValidation(format!(
                    "self-edge for {:?}",
                    edge.from_id
                )));
            }
            // BTreeSet insertion deduplicates repeated edges silently
            state
                .dependency_forward
                .entry(edge.from_id.clone())
                .or_default()
                .insert(edge.to_id.clone());
            state
                .dependency_reverse
                .entry(edge.to_id.clone())
                .or_default()
                .insert(edge.from_id.clone());
        }
    }

    // History
    for entry in &export.indexes.history.recent_entries {
        entry
            .validate()
            .map_err(|e| Error::ImportValidation(e.to_string()))?;
        state.history.push(entry.clone());
    }

    Ok((state, warnings))
}
