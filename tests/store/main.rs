//! Store integration tests
//!
//! End-to-end coverage of the apply protocol, the guard operations, and
//! checkpoint/restore, driven through the public `crs` facade.

mod apply;
mod checkpoint;
mod concurrency;
mod guards;
mod properties;

use crs::{Context, ProofNumber, ProofStatus, SignalSource, StepActor, StepDecision, StepOutcome, StepRecord, Store, StoreConfig};

/// A store with telemetry switched off so tests stay quiet
pub fn quiet_store() -> Store {
    Store::new(StoreConfig {
        enable_metrics: false,
        enable_tracing: false,
        ..StoreConfig::default()
    })
    .unwrap()
}

pub fn background() -> Context {
    Context::background()
}

pub fn proof_entry(node: &str, status: ProofStatus) -> ProofNumber {
    ProofNumber {
        node_id: node.to_string(),
        proof: 1,
        disproof: 1,
        status,
        source: SignalSource::Hard,
        updated_at: 0,
    }
}

pub fn exec_step(session: &str, tool: &str) -> StepRecord {
    let mut step = StepRecord::new(
        session,
        StepActor::MainAgent,
        StepDecision::ExecuteTool,
        StepOutcome::Success,
    );
    step.tool = tool.to_string();
    step
}
