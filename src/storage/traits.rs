//! Storage trait for visited-set persistence
//!
//! This module defines the interface the crawl engine uses to load and save
//! its visited set. Error types live at the crate root
//! ([`crate::PersistenceError`]).

use crate::PersistenceResult;
use std::collections::HashSet;

/// Trait for visited-set persistence backends
///
/// Implementations must be shareable across worker threads. Neither method is
/// called on the crawl submission path; checkpoints run on a blocking thread.
pub trait StateStore: Send + Sync {
    /// Loads the persisted visited set
    ///
    /// An absent backing medium is not an error and yields an empty set.
    /// A corrupt one yields a `PersistenceError`.
    fn load(&self) -> PersistenceResult<HashSet<String>>;

    /// Replaces the persisted visited set with `urls`
    fn save(&self, urls: &HashSet<String>) -> PersistenceResult<()>;
}
