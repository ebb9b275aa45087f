//! Property tests for the core invariants

use crate::{background, proof_entry, quiet_store};
use crs::{Clause, Delta, DependencyEdge, FailureType, Literal, ProofStatus, SignalSource};
use proptest::prelude::*;
use std::collections::BTreeMap;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Invariant: every successful apply advances the generation by one.
    #[test]
    fn generation_advances_by_exactly_one(nodes in prop::collection::vec("[a-z]{1,8}", 1..20)) {
        let store = quiet_store();
        let ctx = background();
        let mut expected = 0u64;
        for node in nodes {
            let mut updates = BTreeMap::new();
            updates.insert(node.clone(), proof_entry(&node, ProofStatus::Expanded));
            let metrics = store.apply(&ctx, Delta::proof(SignalSource::Soft, updates)).unwrap();
            expected += 1;
            prop_assert_eq!(metrics.new_generation, expected);
        }
        store.close();
    }

    /// Invariant: the dependency graph stays acyclic under arbitrary
    /// edge batches; rejected batches leave no partial writes behind.
    #[test]
    fn dependency_graph_stays_acyclic(
        edges in prop::collection::vec(("[a-e]", "[a-e]"), 1..30)
    ) {
        let store = quiet_store();
        let ctx = background();
        for (from, to) in edges {
            let delta = Delta::dependency_add(
                SignalSource::Hard,
                vec![DependencyEdge::new(from, to)],
            );
            // Either accepted or rejected; never inconsistent
            let _ = store.apply(&ctx, delta);
        }
        prop_assert!(store.health_check(&ctx).is_ok());
        store.close();
    }

    /// Invariant: clause dedup keys stay unique in the index no matter
    /// how literals are ordered or repeated.
    #[test]
    fn clause_index_has_no_semantic_duplicates(
        batches in prop::collection::vec(
            prop::collection::vec(("[a-c]", any::<bool>()), 1..4),
            1..12,
        )
    ) {
        let store = quiet_store();
        let ctx = background();
        for (i, literals) in batches.into_iter().enumerate() {
            let clause = Clause {
                id: format!("c{i}"),
                literals: literals
                    .into_iter()
                    .map(|(var, negated)| Literal {
                        variable: format!("tool:{var}"),
                        negated,
                    })
                    .collect(),
                source: SignalSource::Hard,
                failure_type: FailureType::ToolError,
                learned_at: 0,
                last_used: 0,
                use_count: 0,
            };
            store.add_clause(&ctx, clause).unwrap();
        }

        let snapshot = store.snapshot();
        let keys: Vec<_> = snapshot
            .constraint()
            .all_clauses()
            .map(|c| c.dedup_key())
            .collect();
        let mut deduped = keys.clone();
        deduped.sort();
        deduped.dedup();
        prop_assert_eq!(keys.len(), deduped.len());
        store.close();
    }

    /// Boundary: increments saturate at INFINITE, decrements at zero.
    #[test]
    fn proof_arithmetic_saturates(delta in any::<u64>()) {
        let store = quiet_store();
        let ctx = background();
        let up = crs::ProofUpdate {
            node_id: "n".to_string(),
            kind: crs::ProofUpdateKind::Increment,
            delta,
            reason: String::new(),
            source: SignalSource::Soft,
        };
        let pn = store.update_proof_number(&ctx, &up).unwrap();
        prop_assert!(pn.proof >= store.config().initial_proof_number || pn.proof == crs::INFINITE);

        let down = crs::ProofUpdate {
            node_id: "n".to_string(),
            kind: crs::ProofUpdateKind::Decrement,
            delta: u64::MAX,
            reason: String::new(),
            source: SignalSource::Soft,
        };
        let pn = store.update_proof_number(&ctx, &down).unwrap();
        prop_assert_eq!(pn.proof, 0);
        store.close();
    }
}
