//! Concurrent readers and writers

use crate::{background, exec_step, proof_entry, quiet_store};
use crs::{Delta, ProofStatus, SignalSource};
use std::collections::BTreeMap;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn parallel_writers_serialize_on_generation() {
    let store = Arc::new(quiet_store());
    let ctx = background();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|writer| {
            let store = Arc::clone(&store);
            let ctx = ctx.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..50 {
                    let node = format!("w{writer}_n{i}");
                    let mut updates = BTreeMap::new();
                    updates.insert(node.clone(), proof_entry(&node, ProofStatus::Expanded));
                    store.apply(&ctx, Delta::proof(SignalSource::Soft, updates)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // 400 applies, 400 generations, no gaps
    assert_eq!(store.generation(), 400);
    assert_eq!(store.snapshot().proof().size(), 400);
    store.close();
}

#[test]
fn readers_always_see_consistent_snapshots() {
    let store = Arc::new(quiet_store());
    let ctx = background();
    let barrier = Arc::new(Barrier::new(5));

    let writer = {
        let store = Arc::clone(&store);
        let ctx = ctx.clone();
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for i in 0..100 {
                // Every apply writes the pair (left_i, right_i) together
                let mut updates = BTreeMap::new();
                updates.insert(format!("left_{i}"), proof_entry(&format!("left_{i}"), ProofStatus::Expanded));
                updates.insert(format!("right_{i}"), proof_entry(&format!("right_{i}"), ProofStatus::Expanded));
                store.apply(&ctx, Delta::proof(SignalSource::Soft, updates)).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..100 {
                    let snapshot = store.snapshot();
                    // Atomicity: both halves of a pair appear together
                    for i in 0..100 {
                        let left = snapshot.proof().get(&format!("left_{i}")).is_some();
                        let right = snapshot.proof().get(&format!("right_{i}")).is_some();
                        assert_eq!(left, right, "pair {i} was split across a snapshot");
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    store.close();
}

#[test]
fn step_recording_does_not_block_applies() {
    let store = Arc::new(quiet_store());
    let ctx = background();
    let barrier = Arc::new(Barrier::new(2));

    let stepper = {
        let store = Arc::clone(&store);
        let ctx = ctx.clone();
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..500 {
                store.record_step(&ctx, exec_step("S", "tool")).unwrap();
            }
        })
    };
    let applier = {
        let store = Arc::clone(&store);
        let ctx = ctx.clone();
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for i in 0..200 {
                let mut counts = BTreeMap::new();
                counts.insert(format!("item_{i}"), 1u64);
                store.apply(&ctx, Delta::streaming(SignalSource::Soft, counts)).unwrap();
            }
        })
    };

    stepper.join().unwrap();
    applier.join().unwrap();
    assert_eq!(store.count_tool_executions("S", "tool"), 500);
    assert_eq!(store.generation(), 200);
    store.close();
}

#[test]
fn concurrent_decision_checks_are_safe() {
    let store = Arc::new(quiet_store());
    let ctx = background();
    store.record_step(&ctx, exec_step("S", "x")).unwrap();
    store
        .add_clause(
            &ctx,
            crs::Clause {
                id: "gate".to_string(),
                literals: vec![
                    crs::Literal::negative("tool:x"),
                    crs::Literal::negative("prev_tool:x"),
                ],
                source: SignalSource::Hard,
                failure_type: crs::FailureType::CycleDetected,
                learned_at: 0,
                last_used: 0,
                use_count: 0,
            },
        )
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..50 {
                    let (allowed, _) = store.check_decision_allowed("S", "x");
                    assert!(!allowed);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    // Every check bumped the clause exactly once
    assert_eq!(
        store.snapshot().constraint().get_clause("gate").unwrap().use_count,
        400
    );
    store.close();
}
