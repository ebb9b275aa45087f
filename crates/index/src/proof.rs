//! Proof-number index
//!
//! Per-node proof/disproof cost estimates with saturating arithmetic.
//! The `INFINITE` sentinel marks an impossible side; increments saturate
//! there and never wrap, decrements saturate at zero.

use crs_core::error::{Error, Result};
use crs_core::limits::INFINITE;
use crs_core::types::{ProofNumber, ProofStatus, SignalSource};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Kind of a targeted proof-number update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofUpdateKind {
    /// Add `delta` to the proof number, saturating at `INFINITE`
    Increment,
    /// Subtract `delta` from the proof number, saturating at 0
    Decrement,
    /// Mark the node disproven; requires a hard source
    Disproven,
    /// Mark the node proven
    Proven,
    /// Reset both numbers to the configured initial
    Reset,
}

/// A targeted update to one node's proof number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofUpdate {
    /// Target node
    pub node_id: String,
    /// What to do
    pub kind: ProofUpdateKind,
    /// Magnitude for Increment/Decrement; ignored otherwise
    #[serde(default)]
    pub delta: u64,
    /// Human-readable reason, kept for diagnostics
    #[serde(default)]
    pub reason: String,
    /// Source of the update
    pub source: SignalSource,
}

/// Owning container for per-node proof numbers
#[derive(Debug, Clone, Default)]
pub struct ProofIndex {
    entries: HashMap<String, ProofNumber>,
}

impl ProofIndex {
    /// An empty index
    pub fn new() -> Self {
        ProofIndex {
            entries: HashMap::new(),
        }
    }

    /// Rebuild from a plain map (restore path)
    pub fn from_entries(entries: HashMap<String, ProofNumber>) -> Self {
        ProofIndex { entries }
    }

    /// Look up a node's record
    pub fn get(&self, node_id: &str) -> Option<&ProofNumber> {
        self.entries.get(node_id)
    }

    /// Insert or replace a record wholesale (delta application path)
    pub fn insert(&mut self, pn: ProofNumber) {
        self.entries.insert(pn.node_id.clone(), pn);
    }

    /// Number of tracked nodes
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Apply a targeted update, creating the node record if absent.
    ///
    /// Returns the post-update record. `initial` seeds fresh records and
    /// is the Reset target; `now_ms` stamps `updated_at`.
    pub fn apply_update(
        &mut self,
        update: &ProofUpdate,
        initial: u64,
        now_ms: i64,
    ) -> Result<ProofNumber> {
        if update.node_id.is_empty() {
            return Err(Error::EmptyId("proof update node id".into()));
        }
        if update.kind == ProofUpdateKind::Disproven && !update.source.is_hard() {
            return Err(Error::HardSoftBoundary(format!(
                "source {} may not disprove node {}",
                update.source.as_str(),
                update.node_id
            )));
        }

        let entry = self
            .entries
            .entry(update.node_id.clone())
            .or_insert_with(|| ProofNumber::new(update.node_id.clone(), initial, now_ms));

        match update.kind {
            ProofUpdateKind::Increment => {
                entry.proof = entry.proof.saturating_add(update.delta);
                if entry.status == ProofStatus::Unknown {
                    entry.status = ProofStatus::Expanded;
                }
                // Proof exhaustion from a hard source is a disproof; a soft
                // source may exhaust the number but not flip the status.
                if entry.proof >= INFINITE && update.source.is_hard() {
                    entry.status = ProofStatus::Disproven;
                }
            }
            ProofUpdateKind::Decrement => {
                entry.proof = entry.proof.saturating_sub(update.delta);
                if entry.status == ProofStatus::Unknown {
                    entry.status = ProofStatus::Expanded;
                }
            }
            ProofUpdateKind::Disproven => {
                entry.proof = INFINITE;
                entry.status = ProofStatus::Disproven;
            }
            ProofUpdateKind::Proven => {
                entry.proof = 0;
                entry.status = ProofStatus::Proven;
            }
            ProofUpdateKind::Reset => {
                entry.proof = initial;
                entry.disproof = initial;
                entry.status = ProofStatus::Unknown;
            }
        }
        entry.source = update.source;
        entry.updated_at = now_ms;
        Ok(entry.clone())
    }

    /// Clone the backing map (checkpoint path)
    pub fn entries(&self) -> &HashMap<String, ProofNumber> {
        &self.entries
    }

    /// Freeze into a shareable read view
    pub fn view(&self) -> ProofView {
        ProofView {
            entries: Arc::new(self.entries.clone()),
        }
    }
}

/// Immutable read view over the proof index
#[derive(Debug, Clone)]
pub struct ProofView {
    entries: Arc<HashMap<String, ProofNumber>>,
}

impl ProofView {
    /// Look up a node's record
    pub fn get(&self, node_id: &str) -> Option<&ProofNumber> {
        self.entries.get(node_id)
    }

    /// All records
    pub fn all(&self) -> impl Iterator<Item = &ProofNumber> {
        self.entries.values()
    }

    /// Number of tracked nodes
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// The backing map, for restore and export
    pub fn entries(&self) -> &HashMap<String, ProofNumber> {
        &self.entries
    }
}
