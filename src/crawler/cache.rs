//! In-memory page cache for the built-in engine

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// A fetched response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPage {
    pub final_url: String,
    pub content_type: String,
    pub body: String,
}

#[derive(Debug)]
struct Entry {
    page: CachedPage,
    stored_at: Instant,
}

/// Per-URL body cache with a fixed time-to-live
///
/// Holds at most `capacity` pages; inserting past that evicts the least
/// recently used one, so expired pages that are never looked up again still
/// age out.
#[derive(Debug)]
pub struct PageCache {
    ttl: Duration,
    entries: Mutex<LruCache<String, Entry>>,
}

impl PageCache {
    /// Creates a cache holding up to `capacity` pages (at least one) for `ttl`
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            ttl,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the cached page for `url` if it has not expired
    pub fn get(&self, url: &str) -> Option<CachedPage> {
        let key = url.to_string();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let expired = match entries.get(&key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => return Some(entry.page.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(&key);
        }
        None
    }

    pub fn insert(&self, url: &str, page: CachedPage) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).put(
            url.to_string(),
            Entry {
                page,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn capacity(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cap()
            .get()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
