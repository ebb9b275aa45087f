//! Checkpoint and restore semantics

use crate::{background, proof_entry, quiet_store};
use crs::{Clause, Delta, FailureType, Literal, ProofStatus, SignalSource};
use std::collections::BTreeMap;

fn clause(id: &str) -> Clause {
    Clause {
        id: id.to_string(),
        literals: vec![Literal::negative(format!("tool:{id}"))],
        source: SignalSource::Hard,
        failure_type: FailureType::ToolError,
        learned_at: 0,
        last_used: 0,
        use_count: 0,
    }
}

#[test]
fn restore_isolates_post_checkpoint_writes() {
    let store = quiet_store();
    let ctx = background();

    store.add_clause(&ctx, clause("c1")).unwrap();
    let checkpoint = store.checkpoint(&ctx).unwrap();

    store.add_clause(&ctx, clause("c2")).unwrap();
    store.restore(&ctx, &checkpoint).unwrap();

    let snapshot = store.snapshot();
    assert!(snapshot.constraint().get_clause("c1").is_some());
    assert!(snapshot.constraint().get_clause("c2").is_none());
    assert_eq!(snapshot.constraint().clause_count(), 1);
    store.close();
}

#[test]
fn restore_rewinds_generation() {
    let store = quiet_store();
    let ctx = background();

    let mut updates = BTreeMap::new();
    updates.insert("n".to_string(), proof_entry("n", ProofStatus::Expanded));
    store.apply(&ctx, Delta::proof(SignalSource::Soft, updates.clone())).unwrap();
    let checkpoint = store.checkpoint(&ctx).unwrap();
    assert_eq!(checkpoint.generation, 1);

    store.apply(&ctx, Delta::proof(SignalSource::Soft, updates)).unwrap();
    assert_eq!(store.generation(), 2);

    store.restore(&ctx, &checkpoint).unwrap();
    assert_eq!(store.generation(), 1);

    // The next successful apply continues from the checkpoint
    let metrics = store
        .apply(&ctx, Delta::streaming(SignalSource::Soft, BTreeMap::new()))
        .unwrap();
    assert_eq!(metrics.new_generation, 2);
    store.close();
}

#[test]
fn restored_streaming_stats_are_independent() {
    let store = quiet_store();
    let ctx = background();

    let mut counts = BTreeMap::new();
    counts.insert("item".to_string(), 5u64);
    store.apply(&ctx, Delta::streaming(SignalSource::Soft, counts)).unwrap();
    let checkpoint = store.checkpoint(&ctx).unwrap();

    store.restore(&ctx, &checkpoint).unwrap();
    let mut more = BTreeMap::new();
    more.insert("item".to_string(), 3u64);
    store.apply(&ctx, Delta::streaming(SignalSource::Soft, more)).unwrap();

    // The restored store moved on; the checkpoint did not
    assert_eq!(store.snapshot().streaming().estimate("item"), 8);
    assert_eq!(checkpoint.data.streaming().estimate("item"), 5);
    store.close();
}

#[test]
fn checkpoint_ids_are_distinct() {
    let store = quiet_store();
    let ctx = background();
    let a = store.checkpoint(&ctx).unwrap();
    let b = store.checkpoint(&ctx).unwrap();
    assert_ne!(a.id, b.id);
    store.close();
}

#[test]
fn restore_checks_internal_consistency() {
    let store = quiet_store();
    let ctx = background();
    let mut checkpoint = store.checkpoint(&ctx).unwrap();
    checkpoint.generation += 1; // metadata no longer matches the snapshot
    assert!(matches!(
        store.restore(&ctx, &checkpoint),
        Err(crs::Error::InvalidCheckpoint(_))
    ));
    store.close();
}
