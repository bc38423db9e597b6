//! Concurrent set of URLs already admitted for crawling
//!
//! This is the in-memory half of the visited store; persistence lives in
//! [`crate::storage`]. The set only grows during a run.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Set of URLs that have passed the admission gate
///
/// Check-and-mark is a single critical section ([`VisitedSet::insert`]), so two
/// workers racing on the same URL can never both be told they won.
#[derive(Debug, Default)]
pub struct VisitedSet {
    urls: Mutex<HashSet<String>>,
}

impl VisitedSet {
    /// Creates an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set pre-populated from a persisted snapshot
    pub fn from_urls(urls: HashSet<String>) -> Self {
        Self {
            urls: Mutex::new(urls),
        }
    }

    /// Marks a URL as visited
    ///
    /// Returns `true` only for the call that actually added the URL. Every
    /// later call for the same URL returns `false`, regardless of which thread
    /// makes it.
    pub fn insert(&self, url: &str) -> bool {
        let mut urls = self.lock();
        if urls.contains(url) {
            return false;
        }
        urls.insert(url.to_string())
    }

    /// Returns whether a URL has been visited
    ///
    /// Only useful for observation. Admission must go through
    /// [`VisitedSet::insert`].
    pub fn contains(&self, url: &str) -> bool {
        self.lock().contains(url)
    }

    /// Number of visited URLs
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns whether no URL has been visited yet
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copies the current contents for persistence
    pub fn snapshot(&self) -> HashSet<String> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // A panic while holding the lock cannot leave the set half-updated.
        self.urls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
