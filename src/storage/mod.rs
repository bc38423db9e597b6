//! Storage module for persisting the visited set
//!
//! This module handles saving and restoring crawl progress across process
//! restarts, including:
//! - The `StateStore` backend trait
//! - A SQLite state file with atomic replacement on save
//! - An in-memory store for tests and persistence-free runs
//! - Ordered checkpointing of the live visited set

mod checkpoint;
mod memory;
mod schema;
mod sqlite;
mod traits;

pub use checkpoint::Checkpointer;
pub use memory::MemoryStateStore;
pub use sqlite::{SnapshotInfo, SqliteStateStore};
pub use traits::StateStore;

use std::path::Path;

/// Opens the SQLite state store at `path`
///
/// The file is not touched until the first load or save.
pub fn open_state_store(path: &Path) -> SqliteStateStore {
    SqliteStateStore::new(path)
}
