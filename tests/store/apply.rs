//! Apply protocol: generations, validation, and visibility

use crate::{background, proof_entry, quiet_store};
use crs::{
    Delta, DeltaType, DependencyEdge, Error, ProofStatus, SignalSource, SimilarityUpdate,
};
use std::collections::BTreeMap;

#[test]
fn generations_are_strictly_sequential() {
    let store = quiet_store();
    let ctx = background();

    let mut previous = 0;
    for i in 0..10 {
        let mut updates = BTreeMap::new();
        updates.insert(format!("n{i}"), proof_entry(&format!("n{i}"), ProofStatus::Expanded));
        let metrics = store.apply(&ctx, Delta::proof(SignalSource::Soft, updates)).unwrap();
        assert_eq!(metrics.old_generation, previous);
        assert_eq!(metrics.new_generation, previous + 1);
        previous = metrics.new_generation;
    }
    assert_eq!(store.generation(), 10);
    store.close();
}

#[test]
fn snapshot_reflects_all_prior_applies() {
    let store = quiet_store();
    let ctx = background();

    let mut updates = BTreeMap::new();
    updates.insert("n".to_string(), proof_entry("n", ProofStatus::Proven));
    let metrics = store.apply(&ctx, Delta::proof(SignalSource::Hard, updates)).unwrap();

    let snapshot = store.snapshot();
    assert!(snapshot.generation() >= metrics.new_generation);
    assert_eq!(snapshot.proof().get("n").unwrap().status, ProofStatus::Proven);
    store.close();
}

#[test]
fn snapshots_are_immune_to_later_writes() {
    let store = quiet_store();
    let ctx = background();

    let mut updates = BTreeMap::new();
    updates.insert("n".to_string(), proof_entry("n", ProofStatus::Expanded));
    store.apply(&ctx, Delta::proof(SignalSource::Soft, updates)).unwrap();

    let frozen = store.snapshot();
    let mut updates = BTreeMap::new();
    updates.insert("n".to_string(), proof_entry("n", ProofStatus::Proven));
    store.apply(&ctx, Delta::proof(SignalSource::Hard, updates)).unwrap();

    assert_eq!(frozen.proof().get("n").unwrap().status, ProofStatus::Expanded);
    assert_eq!(
        store.snapshot().proof().get("n").unwrap().status,
        ProofStatus::Proven
    );
    store.close();
}

#[test]
fn hard_soft_boundary_is_enforced_end_to_end() {
    let store = quiet_store();
    let ctx = background();

    let mut updates = BTreeMap::new();
    updates.insert("n".to_string(), proof_entry("n", ProofStatus::Disproven));
    let err = store
        .apply(&ctx, Delta::proof(SignalSource::Soft, updates))
        .unwrap_err();

    assert!(matches!(err, Error::DeltaValidation(_)));
    assert!(matches!(err.root_cause(), Error::HardSoftBoundary(_)));
    assert_eq!(store.generation(), 0);
    store.close();
}

#[test]
fn cycle_in_one_batch_is_rejected() {
    let store = quiet_store();
    let ctx = background();

    let err = store
        .apply(
            &ctx,
            Delta::dependency_add(
                SignalSource::Hard,
                vec![
                    DependencyEdge::new("a", "b"),
                    DependencyEdge::new("b", "c"),
                    DependencyEdge::new("c", "a"),
                ],
            ),
        )
        .unwrap_err();
    assert!(matches!(err, Error::DeltaValidation(_)));
    assert!(store.snapshot().dependency().depends_on("a").is_empty());
    store.close();
}

#[test]
fn apply_metrics_carry_delta_shape() {
    let store = quiet_store();
    let ctx = background();

    let metrics = store
        .apply(
            &ctx,
            Delta::similarity(
                SignalSource::Soft,
                vec![
                    SimilarityUpdate {
                        from: "a".to_string(),
                        to: "b".to_string(),
                        score: 0.5,
                    },
                    SimilarityUpdate {
                        from: "a".to_string(),
                        to: "c".to_string(),
                        score: 0.25,
                    },
                ],
            ),
        )
        .unwrap();
    assert_eq!(metrics.delta_type, DeltaType::Similarity);
    assert_eq!(metrics.entries_modified, 2);
    assert_eq!(metrics.indexes_updated.len(), 1);
    store.close();
}

#[test]
fn history_metadata_limits_are_enforced() {
    let store = quiet_store();
    let ctx = background();

    let mut metadata = BTreeMap::new();
    metadata.insert("k".repeat(300), "v".to_string());
    let entry = crs::HistoryEntry {
        id: "h1".to_string(),
        node_id: "n".to_string(),
        action: "expand".to_string(),
        result: "ok".to_string(),
        source: SignalSource::Hard,
        timestamp: 1,
        metadata,
    };
    let err = store
        .apply(&ctx, Delta::history(SignalSource::Hard, vec![entry]))
        .unwrap_err();
    assert!(matches!(err.root_cause(), Error::MetadataTooLarge(_)));
    store.close();
}

#[test]
fn similarity_is_readable_in_both_directions() {
    let store = quiet_store();
    let ctx = background();
    store
        .apply(
            &ctx,
            Delta::similarity(
                SignalSource::Soft,
                vec![SimilarityUpdate {
                    from: "b".to_string(),
                    to: "a".to_string(),
                    score: 0.8,
                }],
            ),
        )
        .unwrap();
    let snapshot = store.snapshot();
    assert_eq!(snapshot.similarity().score("a", "b"), Some(0.8));
    assert_eq!(snapshot.similarity().score("b", "a"), Some(0.8));
    let neighbors = snapshot.similarity().nearest_neighbors("a", 5);
    assert_eq!(neighbors.len(), 1);
    assert_eq!(neighbors[0].to, "b");
    store.close();
}
