//! In-memory storage implementation
//!
//! Used when persistence is disabled and as a test double.

use crate::storage::traits::StateStore;
use crate::PersistenceResult;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// StateStore that keeps the last saved snapshot in memory
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    snapshot: Mutex<Option<HashSet<String>>>,
    saves: AtomicUsize,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds a snapshot, as if saved by an
    /// earlier run
    pub fn with_urls(urls: HashSet<String>) -> Self {
        Self {
            snapshot: Mutex::new(Some(urls)),
            saves: AtomicUsize::new(0),
        }
    }

    /// The last saved snapshot, if any
    pub fn stored(&self) -> Option<HashSet<String>> {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of successful saves since creation
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> PersistenceResult<HashSet<String>> {
        Ok(self.stored().unwrap_or_default())
    }

    fn save(&self, urls: &HashSet<String>) -> PersistenceResult<()> {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = Some(urls.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
