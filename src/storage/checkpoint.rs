//! Serialized visited-set checkpoints
//!
//! Checkpoints may be requested from several workers at once. The snapshot is
//! taken while holding the checkpoint lock, so saves reach the store in the
//! same order their snapshots were taken and a later save never writes a
//! smaller set than an earlier one.

use crate::state::VisitedSet;
use crate::storage::traits::StateStore;
use crate::PersistenceResult;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Writes visited-set snapshots through a [`StateStore`]
pub struct Checkpointer {
    store: Arc<dyn StateStore>,
    lock: Mutex<()>,
}

impl Checkpointer {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// Loads the persisted visited set from the underlying store
    pub fn load(&self) -> PersistenceResult<HashSet<String>> {
        self.store.load()
    }

    /// Snapshots `visited` and saves it
    ///
    /// Blocks on I/O; callers on async threads should run this through
    /// `spawn_blocking`.
    ///
    /// # Returns
    ///
    /// The number of URLs written
    pub fn save(&self, visited: &VisitedSet) -> PersistenceResult<usize> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = visited.snapshot();
        self.store.save(&snapshot)?;
        Ok(snapshot.len())
    }
}
