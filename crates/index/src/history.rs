//! Decision history index
//!
//! Append-only entries plus per-node posting lists for `trace` queries.
//! Entries are validated by the delta layer before they reach the index.

use crs_core::types::HistoryEntry;
use std::collections::HashMap;
use std::sync::Arc;

/// Owning container for decision history
#[derive(Debug, Clone, Default)]
pub struct HistoryIndex {
    entries: Vec<HistoryEntry>,
    by_node: HashMap<String, Vec<usize>>,
}

impl HistoryIndex {
    /// An empty index
    pub fn new() -> Self {
        HistoryIndex {
            entries: Vec::new(),
            by_node: HashMap::new(),
        }
    }

    /// Rebuild from an entry list (restore path); posting lists are rebuilt
    pub fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        let mut idx = HistoryIndex::new();
        for entry in entries {
            idx.append(entry);
        }
        idx
    }

    /// Append an entry
    pub fn append(&mut self, entry: HistoryEntry) {
        let position = self.entries.len();
        if !entry.node_id.is_empty() {
            self.by_node
                .entry(entry.node_id.clone())
                .or_default()
                .push(position);
        }
        self.entries.push(entry);
    }

    /// Number of entries
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// The backing entry list (checkpoint path)
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Freeze into a shareable read view
    pub fn view(&self) -> HistoryView {
        HistoryView {
            entries: Arc::new(self.entries.clone()),
            by_node: Arc::new(self.by_node.clone()),
        }
    }
}

/// Immutable read view over decision history
#[derive(Debug, Clone)]
pub struct HistoryView {
    entries: Arc<Vec<HistoryEntry>>,
    by_node: Arc<HashMap<String, Vec<usize>>>,
}

impl HistoryView {
    /// All entries touching `node_id`, oldest first
    pub fn trace(&self, node_id: &str) -> Vec<HistoryEntry> {
        self.by_node
            .get(node_id)
            .map(|positions| positions.iter().map(|p| self.entries[*p].clone()).collect())
            .unwrap_or_default()
    }

    /// The `n` most recent entries, oldest first
    pub fn recent(&self, n: usize) -> Vec<HistoryEntry> {
        let start = self.entries.len().saturating_sub(n);
        self.entries[start..].to_vec()
    }

    /// Number of entries
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// The backing entry list, for restore and export
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }
}
