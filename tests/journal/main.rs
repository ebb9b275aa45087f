//! Delta-history journal integration tests
//!
//! The journal is exercised through the store's apply path so records
//! carry real generations, sources, and affected-node sets.

use crs::{
    Context, Delta, DeltaType, DependencyEdge, Error, ProofNumber, ProofStatus, SignalSource,
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

fn small_journal_store(max_delta_records: usize) -> Store {
    Store::new(StoreConfig {
        max_delta_records,
        enable_metrics: false,
        enable_tracing: false,
        ..StoreConfig::default()
    })
    .unwrap()
}

fn proof_entry(node: &str) -> ProofNumber {
    ProofNumber {
        node_id: node.to_string(),
        proof: 1,
        disproof: 1,
        status: ProofStatus::Expanded,
        source: SignalSource::Hard,
        updated_at: 0,
    }
}

fn apply_proof(store: &Store, ctx: &Context, node: &str) {
    let mut updates = BTreeMap::new();
    updates.insert(node.to_string(), proof_entry(node));
    store.apply(ctx, Delta::proof(SignalSource::Soft, updates)).unwrap();
}

#[test]
fn explain_returns_records_in_generation_order() {
    let store = quiet_store();
    let ctx = Context::background();

    let mut updates = BTreeMap::new();
    updates.insert("n1".to_string(), proof_entry("n1"));
    updates.insert("n2".to_string(), proof_entry("n2"));
    store.apply(&ctx, Delta::proof(SignalSource::Soft, updates)).unwrap();

    store
        .apply(
            &ctx,
            Delta::similarity(
                SignalSource::Soft,
                vec![SimilarityUpdate {
                    from: "n2".to_string(),
                    to: "n3".to_string(),
                    score: 0.5,
                }],
            ),
        )
        .unwrap();

    let records = store.explain(&ctx, "n2").unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].generation, 1);
    assert_eq!(records[1].generation, 2);
    assert_eq!(records[0].delta_type, DeltaType::Proof);
    assert_eq!(records[1].delta_type, DeltaType::Similarity);

    // n1 only appears in the first record
    let records = store.explain(&ctx, "n1").unwrap();
    assert_eq!(records.len(), 1);
    store.close();
}

#[test]
fn range_query_is_exclusive_inclusive() {
    let store = quiet_store();
    let ctx = Context::background();
    for i in 0..5 {
        apply_proof(&store, &ctx, &format!("n{i}"));
    }

    let records = store.get_delta_range(&ctx, 1, 4).unwrap();
    let generations: Vec<u64> = records.iter().map(|r| r.generation).collect();
    assert_eq!(generations, vec![2, 3, 4]);
    store.close();
}

#[test]
fn by_generation_is_a_function() {
    let store = quiet_store();
    let ctx = Context::background();
    for i in 0..4 {
        apply_proof(&store, &ctx, &format!("n{i}"));
    }

    let mut seen = std::collections::HashSet::new();
    for generation in 1..=4 {
        let record = store.get_delta_by_generation(&ctx, generation).unwrap().unwrap();
        assert_eq!(record.generation, generation);
        assert!(seen.insert(record.id.clone()), "generation mapped to two ids");
    }
    assert!(store.get_delta_by_generation(&ctx, 99).unwrap().is_none());
    store.close();
}

#[test]
fn journal_evicts_oldest_at_capacity() {
    let store = small_journal_store(3);
    let ctx = Context::background();
    for i in 0..5 {
        apply_proof(&store, &ctx, &format!("n{i}"));
    }

    assert_eq!(store.delta_history_size(&ctx).unwrap(), 3);
    // Oldest two are gone everywhere
    assert!(store.get_delta_by_generation(&ctx, 1).unwrap().is_none());
    assert!(store.get_delta_by_generation(&ctx, 2).unwrap().is_none());
    assert!(store.explain(&ctx, "n0").unwrap().is_empty());
    assert_eq!(store.explain(&ctx, "n4").unwrap().len(), 1);
    store.close();
}

#[test]
fn record_ids_are_stable_and_increasing() {
    let store = quiet_store();
    let ctx = Context::background();
    for i in 0..3 {
        apply_proof(&store, &ctx, &format!("n{i}"));
    }
    let records = store.get_delta_range(&ctx, 0, 10).unwrap();
    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["delta_0", "delta_1", "delta_2"]);
    store.close();
}

#[test]
fn journaled_delta_payload_round_trips() {
    let store = quiet_store();
    let ctx = Context::background();
    store
        .apply(
            &ctx,
            Delta::dependency_add(SignalSource::Hard, vec![DependencyEdge::new("a", "b")]),
        )
        .unwrap();

    let record = store.get_delta_by_generation(&ctx, 1).unwrap().unwrap();
    let delta: Delta = serde_json::from_str(&record.delta_json).unwrap();
    assert_eq!(delta.delta_type(), DeltaType::Dependency);
    assert_eq!(delta.affected_nodes(), vec!["a".to_string(), "b".to_string()]);
    store.close();
}

#[test]
fn queries_after_close_fail_cleanly() {
    let store = quiet_store();
    let ctx = Context::background();
    apply_proof(&store, &ctx, "n");
    store.close();

    assert!(matches!(
        store.explain(&ctx, "n"),
        Err(Error::DeltaHistoryClosed)
    ));
    assert!(matches!(
        store.delta_history_size(&ctx),
        Err(Error::DeltaHistoryClosed)
    ));
}

#[test]
fn cancelled_query_returns_cancellation() {
    let store = quiet_store();
    let (ctx, handle) = Context::with_cancel();
    handle.cancel();
    assert!(matches!(
        store.explain(&ctx, "n"),
        Err(Error::Cancelled)
    ));
    store.close();
}

#[test]
fn journal_tolerates_write_bursts() {
    // The journal may lag and drop under pressure, but the store must
    // stay consistent and the journal must never exceed its capacity.
    let store = small_journal_store(50);
    let ctx = Context::background();
    for i in 0..500 {
        apply_proof(&store, &ctx, &format!("n{i}"));
    }
    assert_eq!(store.generation(), 500);
    let size = store.delta_history_size(&ctx).unwrap();
    assert!(size <= 50);
    store.close();
}
