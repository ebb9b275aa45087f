//! Circuit breaker and learned-clause decision gate

use crate::{background, exec_step, proof_entry, quiet_store};
use crs::{Clause, Delta, FailureType, Literal, ProofStatus, SignalSource};
use std::collections::BTreeMap;

fn clause(id: &str, literals: Vec<Literal>) -> Clause {
    Clause {
        id: id.to_string(),
        literals,
        source: SignalSource::Hard,
        failure_type: FailureType::CycleDetected,
        learned_at: 0,
        last_used: 0,
        use_count: 0,
    }
}

#[test]
fn breaker_fires_after_threshold_executions() {
    let store = quiet_store();
    let ctx = background();
    store.set_session_id("S");

    for _ in 0..3 {
        store.record_step(&ctx, exec_step("S", "T")).unwrap();
    }
    assert_eq!(store.count_tool_executions("S", "T"), 3);

    let decision = store.check_circuit_breaker("S", "T");
    assert!(decision.should_fire);
    assert!(decision.reason.contains('T'));
    assert!(decision.reason.contains('3'));
    store.close();
}

#[test]
fn breaker_stays_quiet_below_threshold() {
    let store = quiet_store();
    let ctx = background();
    store.record_step(&ctx, exec_step("S", "T")).unwrap();
    store.record_step(&ctx, exec_step("S", "T")).unwrap();
    assert!(!store.check_circuit_breaker("S", "T").should_fire);
    store.close();
}

#[test]
fn breaker_reads_proof_node_when_present() {
    let store = quiet_store();
    let ctx = background();

    let mut updates = BTreeMap::new();
    updates.insert(
        "session:S:tool:T".to_string(),
        proof_entry("session:S:tool:T", ProofStatus::Disproven),
    );
    store.apply(&ctx, Delta::proof(SignalSource::Safety, updates)).unwrap();

    let decision = store.check_circuit_breaker("S", "T");
    assert!(decision.should_fire);
    assert_eq!(decision.status, ProofStatus::Disproven);
    store.close();
}

#[test]
fn learned_clause_blocks_repeat_tool() {
    let store = quiet_store();
    let ctx = background();

    store.record_step(&ctx, exec_step("S", "tool_a")).unwrap();
    store
        .add_clause(
            &ctx,
            clause(
                "block_repeat",
                vec![
                    Literal::negative("tool:tool_a"),
                    Literal::negative("prev_tool:tool_a"),
                ],
            ),
        )
        .unwrap();

    let (allowed, reason) = store.check_decision_allowed("S", "tool_a");
    assert!(!allowed);
    assert!(reason.contains("block_repeat"));

    let (allowed, _) = store.check_decision_allowed("S", "tool_b");
    assert!(allowed);
    store.close();
}

#[test]
fn clause_semantics_see_two_steps_back() {
    let store = quiet_store();
    let ctx = background();

    store.record_step(&ctx, exec_step("S", "alpha")).unwrap();
    store.record_step(&ctx, exec_step("S", "beta")).unwrap();
    // Block alpha -> beta -> alpha oscillation
    store
        .add_clause(
            &ctx,
            clause(
                "no_oscillation",
                vec![
                    Literal::negative("tool:alpha"),
                    Literal::negative("prev_tool:beta"),
                    Literal::negative("prev_prev_tool:alpha"),
                ],
            ),
        )
        .unwrap();

    let (allowed, reason) = store.check_decision_allowed("S", "alpha");
    assert!(!allowed);
    assert!(reason.contains("no_oscillation"));

    let (allowed, _) = store.check_decision_allowed("S", "gamma");
    assert!(allowed);
    store.close();
}

#[test]
fn duplicate_clause_bumps_instead_of_growing() {
    let store = quiet_store();
    let ctx = background();

    store
        .add_clause(&ctx, clause("c1", vec![Literal::negative("tool:x")]))
        .unwrap();
    store
        .add_clause(&ctx, clause("c2", vec![Literal::negative("tool:x")]))
        .unwrap();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.constraint().clause_count(), 1);
    assert_eq!(snapshot.constraint().get_clause("c1").unwrap().use_count, 1);
    assert!(snapshot.constraint().get_clause("c2").is_none());
    store.close();
}

#[test]
fn soft_clause_is_rejected() {
    let store = quiet_store();
    let ctx = background();
    let mut bad = clause("c", vec![Literal::negative("tool:x")]);
    bad.source = SignalSource::Soft;
    assert!(store.add_clause(&ctx, bad).is_err());
    assert_eq!(store.snapshot().constraint().clause_count(), 0);
    store.close();
}

#[test]
fn propagation_reaches_bounded_ancestors() {
    let store = quiet_store();
    let ctx = background();

    // chain: a4 -> a3 -> a2 -> a1 -> leaf
    let edges = vec![
        crs::DependencyEdge::new("a1", "leaf"),
        crs::DependencyEdge::new("a2", "a1"),
        crs::DependencyEdge::new("a3", "a2"),
        crs::DependencyEdge::new("a4", "a3"),
    ];
    store
        .apply(&ctx, Delta::dependency_add(SignalSource::Hard, edges))
        .unwrap();

    // Pin every ancestor at the brink so each +1 disproves it
    let mut updates = BTreeMap::new();
    for node in ["a1", "a2", "a3", "a4"] {
        let mut pn = proof_entry(node, ProofStatus::Expanded);
        pn.proof = crs::INFINITE - 1;
        updates.insert(node.to_string(), pn);
    }
    store.apply(&ctx, Delta::proof(SignalSource::Hard, updates)).unwrap();

    let affected = store.propagate_disproof(&ctx, "leaf").unwrap();
    assert_eq!(affected, 4);
    for node in ["a1", "a2", "a3", "a4"] {
        let pn = store.get_proof_status(node).unwrap();
        assert_eq!(pn.status, ProofStatus::Disproven, "node {node}");
    }
    store.close();
}

#[test]
fn step_fifo_eviction_preserves_counters() {
    let store = crs::Store::new(crs::StoreConfig {
        max_steps_per_session: 2,
        enable_metrics: false,
        enable_tracing: false,
        ..crs::StoreConfig::default()
    })
    .unwrap();
    let ctx = background();

    store.record_step(&ctx, exec_step("S", "a")).unwrap();
    store.record_step(&ctx, exec_step("S", "b")).unwrap();
    store.record_step(&ctx, exec_step("S", "c")).unwrap();

    let history = store.get_step_history("S");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].tool, "b");
    assert_eq!(store.count_tool_executions("S", "a"), 0);
    assert_eq!(store.count_tool_executions("S", "b"), 1);
    assert_eq!(store.count_tool_executions("S", "c"), 1);
    store.close();
}
