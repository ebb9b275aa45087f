//! Export/import round-trip tests
//!
//! Invariant: for non-truncated exports, the imported proof, constraint,
//! similarity (symmetrized), dependency, and history data match the
//! exported state up to map iteration order.

use crs::{
    export_snapshot, import_session, Constraint, ConstraintType, Context, Delta, DependencyEdge,
    ExportOptions, HistoryEntry, ImportOptions, ProofNumber, ProofStatus, SignalSource,
    SimilarityUpdate, Store, StoreConfig,
};
use std::collections::BTreeMap;

fn quiet_store() -> Store {
    Store::new(StoreConfig {
        enable_metrics: false,
        enable_tracing: false,
        ..StoreConfig::default()
    })
    .unwrap()
}

fn populated_store() -> Store {
    let store = quiet_store();
    let ctx = Context::background();

    let mut updates = BTreeMap::new();
    for (node, status) in [
        ("goal", ProofStatus::Proven),
        ("dead_end", ProofStatus::Disproven),
        ("frontier", ProofStatus::Expanded),
    ] {
        updates.insert(
            node.to_string(),
            ProofNumber {
                node_id: node.to_string(),
                proof: 2,
                disproof: 3,
                status,
                source: SignalSource::Hard,
                updated_at: 7,
            },
        );
    }
    store.apply(&ctx, Delta::proof(SignalSource::Hard, updates)).unwrap();

    store
        .apply(
            &ctx,
            Delta::constraint_add(
                SignalSource::Hard,
                vec![Constraint {
                    id: "mutex_1".to_string(),
                    constraint_type: ConstraintType::MutualExclusion,
                    nodes: vec!["goal".to_string(), "dead_end".to_string()],
                    expression: "goal xor dead_end".to_string(),
                    active: true,
                    source: SignalSource::Hard,
                    created_at: 9,
                }],
            ),
        )
        .unwrap();

    store
        .apply(
            &ctx,
            Delta::similarity(
                SignalSource::Soft,
                vec![
                    SimilarityUpdate {
                        from: "frontier".to_string(),
                        to: "goal".to_string(),
                        score: 0.9,
                    },
                    SimilarityUpdate {
                        from: "dead_end".to_string(),
                        to: "frontier".to_string(),
                        score: 0.1,
                    },
                ],
            ),
        )
        .unwrap();

    store
        .apply(
            &ctx,
            Delta::dependency_add(
                SignalSource::Hard,
                vec![
                    DependencyEdge::new("goal", "frontier"),
                    DependencyEdge::new("frontier", "dead_end"),
                ],
            ),
        )
        .unwrap();

    let mut metadata = BTreeMap::new();
    metadata.insert("depth".to_string(), "3".to_string());
    store
        .apply(
            &ctx,
            Delta::history(
                SignalSource::Hard,
                vec![HistoryEntry {
                    id: "h1".to_string(),
                    node_id: "frontier".to_string(),
                    action: "expand".to_string(),
                    result: "ok".to_string(),
                    source: SignalSource::Hard,
                    timestamp: 11,
                    metadata,
                }],
            ),
        )
        .unwrap();
    store
}

#[test]
fn full_round_trip_preserves_all_indexes() {
    let store = populated_store();
    let (export, warnings) =
        export_snapshot(&store.snapshot(), "S", &ExportOptions::default());
    assert!(warnings.is_empty());

    let (imported, import_warnings) =
        import_session(&export, &ImportOptions::default()).unwrap();
    assert!(import_warnings.is_empty());

    // Proof
    assert_eq!(imported.proof.len(), 3);
    assert_eq!(imported.proof["goal"].status, ProofStatus::Proven);
    // Applied Disproven entries have their proof pinned at INFINITE
    assert_eq!(imported.proof["dead_end"].proof, crs::INFINITE);

    // Constraints
    assert_eq!(imported.constraints.len(), 1);
    assert_eq!(
        imported.constraints["mutex_1"].constraint_type,
        ConstraintType::MutualExclusion
    );
    assert_eq!(imported.constraints["mutex_1"].expression, "goal xor dead_end");

    // Similarity, symmetrized
    assert_eq!(imported.similarity["frontier"]["goal"], 0.9);
    assert_eq!(imported.similarity["goal"]["frontier"], 0.9);
    assert_eq!(imported.similarity["dead_end"]["frontier"], 0.1);

    // Dependency, both directions
    assert!(imported.dependency_forward["goal"].contains("frontier"));
    assert!(imported.dependency_reverse["frontier"].contains("goal"));
    assert!(imported.dependency_forward["frontier"].contains("dead_end"));

    // History
    assert_eq!(imported.history.len(), 1);
    assert_eq!(imported.history[0].metadata["depth"], "3");

    assert_eq!(imported.generation, store.generation());
    store.close();
}

#[test]
fn round_trip_through_json_text() {
    let store = populated_store();
    let (export, _) = export_snapshot(&store.snapshot(), "S", &ExportOptions::default());

    let text = serde_json::to_string_pretty(&export).unwrap();
    let parsed: crs::SessionExport = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, export);

    let (imported, _) = import_session(&parsed, &ImportOptions::default()).unwrap();
    assert_eq!(imported.proof.len(), 3);
    store.close();
}

#[test]
fn truncated_export_skips_strict_count_check() {
    let store = populated_store();
    let options = ExportOptions {
        max_similarity_pairs: 1,
        max_dependency_edges: -1,
    };
    let (export, warnings) = export_snapshot(&store.snapshot(), "S", &options);
    assert_eq!(warnings.len(), 1);
    assert!(export.indexes.similarity.truncated);

    // Strict import accepts the mismatch because the flag is set
    let (imported, _) = import_session(&export, &ImportOptions::default()).unwrap();
    assert!(imported.similarity.len() < 4);
    store.close();
}

#[test]
fn export_summary_tracks_proof_statuses() {
    let store = populated_store();
    let (export, _) = export_snapshot(&store.snapshot(), "S", &ExportOptions::default());
    assert_eq!(export.summary.nodes_explored, 3);
    assert_eq!(export.summary.nodes_proven, 1);
    assert_eq!(export.summary.nodes_disproven, 1);
    assert_eq!(export.summary.nodes_unknown, 0);
    assert_eq!(export.summary.constraints_applied, 1);
    // goal -> frontier -> dead_end
    assert_eq!(export.summary.exploration_depth, 2);
    store.close();
}

#[test]
fn empty_store_exports_cleanly() {
    let store = quiet_store();
    let (export, warnings) =
        export_snapshot(&store.snapshot(), "empty", &ExportOptions::default());
    assert!(warnings.is_empty());
    assert_eq!(export.generation, 0);
    assert_eq!(export.summary.nodes_explored, 0);
    assert_eq!(export.summary.confidence_score, 0.0);

    let (imported, _) = import_session(&export, &ImportOptions::default()).unwrap();
    assert!(imported.proof.is_empty());
    assert!(imported.history.is_empty());
    store.close();
}
