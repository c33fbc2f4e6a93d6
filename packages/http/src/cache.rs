//! Metadata cache for `stat` results.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::entry::RemoteEntry;

/// How long a cached entry is served without asking the backend again.
pub const DEFAULT_STAT_TTL: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
struct CachedEntry {
    entry: RemoteEntry,
    fetched_at: Instant,
}

/// Path-keyed cache of remote metadata.
///
/// Thread-safe via an internal `RwLock`. Entries are replaced wholesale on
/// refresh and only ever go stale; nothing is evicted. Two callers racing
/// on the same stale key may both fetch, and the later store wins.
pub struct StatCache {
    entries: RwLock<HashMap<String, CachedEntry>>,
    ttl: Duration,
}

impl StatCache {
    /// Create a cache whose entries stay fresh for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Get a fresh entry for `path`, or `None` if missing or stale.
    pub fn get(&self, path: &str) -> Option<RemoteEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(path)
            .filter(|cached| cached.fetched_at.elapsed() < self.ttl)
            .map(|cached| cached.entry.clone())
    }

    /// Store `entry` for `path`, stamped with the current time.
    pub fn insert(&self, path: &str, entry: RemoteEntry) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            path.to_string(),
            CachedEntry {
                entry,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Forget `path`, forcing the next `get` to miss.
    pub fn invalidate(&self, path: &str) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(path);
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of entries, fresh or stale.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for StatCache {
    fn default() -> Self {
        Self::new(DEFAULT_STAT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn entry(name: &str, size: u64) -> RemoteEntry {
        RemoteEntry {
            name: name.to_string(),
            size,
            mode: 0o644,
            mtime: 0,
            is_dir: false,
        }
    }

    #[test]
    fn fresh_entries_are_served() {
        let cache = StatCache::default();
        assert!(cache.get("hello").is_none());

        cache.insert("hello", entry("hello", 13));
        assert_eq!(cache.get("hello"), Some(entry("hello", 13)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn stale_entries_miss_but_stay_stored() {
        let cache = StatCache::new(Duration::from_millis(20));
        cache.insert("hello", entry("hello", 13));
        thread::sleep(Duration::from_millis(40));

        assert!(cache.get("hello").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn refresh_replaces_the_entry() {
        let cache = StatCache::default();
        cache.insert("hello", entry("hello", 13));
        cache.insert("hello", entry("hello", 20));
        assert_eq!(cache.get("hello").unwrap().size, 20);
    }

    #[test]
    fn invalidate_removes_the_entry() {
        let cache = StatCache::default();
        cache.insert("hello", entry("hello", 13));
        cache.invalidate("hello");
        assert!(cache.get("hello").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_access_keeps_the_map_consistent() {
        let cache = Arc::new(StatCache::default());
        let workers: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for j in 0..200 {
                        let key = format!("f{}", j % 10);
                        cache.insert(&key, entry(&key, i));
                        assert!(cache.get(&key).is_some());
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(cache.len(), 10);
    }
}
