//! Checkpoints: deep-copied full state with an id and generation
//!
//! A checkpoint wraps a snapshot whose streaming statistics and clauses
//! are already deep copies, so restoring never shares mutable state with
//! the checkpoint holder. Persistence of the blob is out of scope; the
//! store only materializes the object.

use crate::snapshot::Snapshot;
use uuid::Uuid;

/// A restorable copy of the whole store at one generation
#[derive(Debug, Clone)]
pub struct Checkpoint {
    /// Unique checkpoint id
    pub id: Uuid,
    /// Generation the checkpoint was taken at; restore re-installs it
    pub generation: u64,
    /// Creation time, milliseconds since the Unix epoch
    pub created_at: i64,
    /// The frozen state
    pub data: Snapshot,
}

impl Checkpoint {
    /// Wrap a snapshot with fresh checkpoint metadata
    pub fn new(snapshot: Snapshot, created_at: i64) -> Self {
        Checkpoint {
            id: Uuid::new_v4(),
            generation: snapshot.generation(),
            created_at,
            data: snapshot,
        }
    }
}
