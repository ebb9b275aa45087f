//! Streaming frequency statistics
//!
//! Item-frequency map plus a distinct-item cardinality counter, guarded
//! by its own mutex so frequency bumps never contend with the store's
//! state lock. Lock order: the store's state lock, when held, is taken
//! BEFORE this mutex, never after.
//!
//! Snapshots and checkpoints receive a deep clone; the mutex is never
//! shared outside the owning store.

use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
struct StreamingInner {
    counts: HashMap<String, u64>,
    cardinality: u64,
}

/// Owning container for streaming frequency statistics
#[derive(Debug, Default)]
pub struct StreamingStats {
    inner: Mutex<StreamingInner>,
}

impl StreamingStats {
    /// Empty statistics
    pub fn new() -> Self {
        StreamingStats {
            inner: Mutex::new(StreamingInner::default()),
        }
    }

    /// Rebuild from a plain frequency map (restore path)
    pub fn from_counts(counts: HashMap<String, u64>, cardinality: u64) -> Self {
        StreamingStats {
            inner: Mutex::new(StreamingInner {
                counts,
                cardinality,
            }),
        }
    }

    /// Add `count` observations of `item`.
    ///
    /// The first observation of an item bumps cardinality.
    pub fn observe(&self, item: &str, count: u64) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match inner.counts.entry(item.to_string()) {
            std::collections::hash_map::Entry::Vacant(vacant) => {
                vacant.insert(count);
                inner.cardinality += 1;
            }
            std::collections::hash_map::Entry::Occupied(mut occupied) => {
                let current = occupied.get_mut();
                *current = current.saturating_add(count);
            }
        }
    }

    /// Register `item` for cardinality without counting an observation
    pub fn observe_distinct(&self, item: &str) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if !inner.counts.contains_key(item) {
            inner.counts.insert(item.to_string(), 0);
            inner.cardinality += 1;
        }
    }

    /// Observation count for `item`
    pub fn estimate(&self, item: &str) -> u64 {
        self.inner.lock().counts.get(item).copied().unwrap_or(0)
    }

    /// Number of distinct items ever observed
    pub fn cardinality(&self) -> u64 {
        self.inner.lock().cardinality
    }

    /// Number of tracked items
    pub fn size(&self) -> usize {
        self.inner.lock().counts.len()
    }

    /// Deep clone with a fresh mutex
    pub fn deep_clone(&self) -> StreamingStats {
        let inner = self.inner.lock();
        StreamingStats {
            inner: Mutex::new(inner.clone()),
        }
    }

    /// Freeze into a shareable read view (deep copy, no mutex)
    pub fn view(&self) -> StreamingView {
        let inner = self.inner.lock();
        StreamingView {
            counts: inner.counts.clone(),
            cardinality: inner.cardinality,
        }
    }
}

/// Immutable read view over streaming statistics
#[derive(Debug, Clone, Default)]
pub struct StreamingView {
    counts: HashMap<String, u64>,
    cardinality: u64,
}

impl StreamingView {
    /// Observation count for `item`
    pub fn estimate(&self, item: &str) -> u64 {
        self.counts.get(item).copied().unwrap_or(0)
    }

    /// Number of distinct items ever observed
    pub fn cardinality(&self) -> u64 {
        self.cardinality
    }

    /// Number of tracked items
    pub fn size(&self) -> usize {
        self.counts.len()
    }

    /// Rough in-memory footprint of the frequency map, for export
    pub fn approximate_bytes(&self) -> usize {
        self.counts
            .iter()
            .map(|(k, _)| k.len() + std::mem::size_of::<u64>())
            .sum()
    }

    /// The backing frequency map, for restore
    pub fn counts(&self) -> &HashMap<String, u64> {
        &self.counts
    }
}
