//! Tracking of URLs whose fetch has already failed once

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Run-scoped set of URLs that have failed once
///
/// A URL is granted exactly one retry: the first failure marks it, the second
/// failure finds it marked and abandons it. Not persisted.
#[derive(Debug, Default)]
pub struct RetryTracker {
    failed: Mutex<HashSet<String>>,
}

impl RetryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the URL has already failed once
    pub fn has_failed(&self, url: &str) -> bool {
        self.failed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(url)
    }

    /// Records a failure for the URL
    ///
    /// Returns `true` if this was the first failure (the caller may retry),
    /// `false` if the URL had already failed (the caller must abandon it).
    pub fn mark_failed(&self, url: &str) -> bool {
        let mut failed = self.failed.lock().unwrap_or_else(PoisonError::into_inner);
        if failed.contains(url) {
            return false;
        }
        failed.insert(url.to_string())
    }

    /// Number of URLs that have failed at least once
    pub fn len(&self) -> usize {
        self.failed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
