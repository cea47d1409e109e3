//! Per-user item statistics cache.
//!
//! Entries are keyed by history revision: a lookup at a different revision
//! is a miss and the entry is replaced. Statistics are derived data, so a
//! poisoned lock only costs a recomputation.
//!
//! The cache holds at most one entry per user and at most `capacity` users;
//! past that the least recently used user is evicted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use reorder_core::UserId;
use reorder_recommender::ItemStats;

/// Users kept by [`StatsCache::new`].
pub const DEFAULT_STATS_CACHE_CAPACITY: usize = 10_000;

/// Statistics computed from one history revision.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedStats {
    pub revision: u64,
    pub stats: ItemStats,
    /// Raw records that could not be used for this revision.
    pub dropped_records: usize,
}

#[derive(Debug)]
struct Entry {
    stats: Arc<CachedStats>,
    last_used: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<UserId, Entry>,
    clock: u64,
}

impl Inner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(user_id, _)| *user_id);
        if let Some(user_id) = oldest {
            self.entries.remove(&user_id);
        }
    }
}

#[derive(Debug)]
pub struct StatsCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl Default for StatsCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_STATS_CACHE_CAPACITY)
    }
}

impl StatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache holding at most `capacity` users (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cached statistics for `user_id` if they were computed at `revision`.
    pub fn get(&self, user_id: UserId, revision: u64) -> Option<Arc<CachedStats>> {
        let mut inner = self.inner.lock().ok()?;
        let now = inner.tick();
        let entry = inner.entries.get_mut(&user_id)?;
        if entry.stats.revision != revision {
            return None;
        }
        entry.last_used = now;
        Some(entry.stats.clone())
    }

    /// Return the entry for `revision`, computing and storing it on a miss.
    pub fn get_or_compute<F>(&self, user_id: UserId, revision: u64, compute: F) -> Arc<CachedStats>
    where
        F: FnOnce() -> CachedStats,
    {
        if let Some(hit) = self.get(user_id, revision) {
            return hit;
        }

        let fresh = Arc::new(compute());
        if let Ok(mut inner) = self.inner.lock() {
            // A concurrent caller may have stored a newer revision meanwhile.
            let keep_existing = inner
                .entries
                .get(&user_id)
                .is_some_and(|existing| existing.stats.revision > fresh.revision);
            if !keep_existing {
                if !inner.entries.contains_key(&user_id) && inner.entries.len() >= self.capacity {
                    inner.evict_lru();
                }
                let last_used = inner.tick();
                inner.entries.insert(
                    user_id,
                    Entry {
                        stats: fresh.clone(),
                        last_used,
                    },
                );
            }
        }
        fresh
    }

    pub fn invalidate(&self, user_id: UserId) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.entries.remove(&user_id);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn cached(user_id: UserId, revision: u64) -> CachedStats {
        CachedStats {
            revision,
            stats: ItemStats::empty(user_id),
            dropped_records: 0,
        }
    }

    #[test]
    fn same_revision_is_computed_once() {
        let cache = StatsCache::new();
        let user = UserId::new();
        let calls = Cell::new(0);

        for _ in 0..3 {
            let entry = cache.get_or_compute(user, 4, || {
                calls.set(calls.get() + 1);
                cached(user, 4)
            });
            assert_eq!(entry.revision, 4);
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn new_revision_replaces_entry() {
        let cache = StatsCache::new();
        let user = UserId::new();

        cache.get_or_compute(user, 1, || cached(user, 1));
        assert!(cache.get(user, 2).is_none());

        cache.get_or_compute(user, 2, || cached(user, 2));
        assert!(cache.get(user, 1).is_none());
        assert!(cache.get(user, 2).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn invalidate_drops_the_user_only() {
        let cache = StatsCache::new();
        let alice = UserId::new();
        let bob = UserId::new();
        cache.get_or_compute(alice, 1, || cached(alice, 1));
        cache.get_or_compute(bob, 1, || cached(bob, 1));

        cache.invalidate(alice);
        assert!(cache.get(alice, 1).is_none());
        assert!(cache.get(bob, 1).is_some());
    }

    #[test]
    fn least_recently_used_user_is_evicted_at_capacity() {
        let cache = StatsCache::with_capacity(2);
        let alice = UserId::new();
        let bob = UserId::new();
        let carol = UserId::new();

        cache.get_or_compute(alice, 1, || cached(alice, 1));
        cache.get_or_compute(bob, 1, || cached(bob, 1));
        // Touch alice so bob becomes the oldest.
        assert!(cache.get(alice, 1).is_some());

        cache.get_or_compute(carol, 1, || cached(carol, 1));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(bob, 1).is_none());
        assert!(cache.get(alice, 1).is_some());
        assert!(cache.get(carol, 1).is_some());
    }

    #[test]
    fn many_users_never_exceed_capacity() {
        let cache = StatsCache::with_capacity(8);
        for _ in 0..100 {
            let user = UserId::new();
            cache.get_or_compute(user, 1, || cached(user, 1));
        }
        assert_eq!(cache.len(), 8);
        assert_eq!(StatsCache::new().capacity(), DEFAULT_STATS_CACHE_CAPACITY);
    }
}
