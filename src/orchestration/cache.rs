//! Time- and size-bounded result cache.
//!
//! Entries expire `ttl` after they were inserted and are dropped lazily: a
//! `get` that finds an expired entry removes it, and capacity eviction may
//! displace it. When an insertion pushes the cache over `max_size`, the oldest
//! insertions go first. Reads never refresh an entry's position.
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
struct CacheEntry<T> {
    value: T,
    inserted_at: Instant,
    /// Monotonic insertion number; orders entries sharing an `Instant`.
    seq: u64,
    hits: u64,
}

struct CacheState<T> {
    entries: HashMap<String, CacheEntry<T>>,
    /// seq -> key, oldest first.
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl<T> CacheState<T> {
    fn remove(&mut self, key: &str) -> Option<CacheEntry<T>> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.seq);
        Some(entry)
    }

    fn evict_to(&mut self, max_size: usize) -> usize {
        let mut evicted = 0;
        while self.entries.len() > max_size {
            let Some((_, key)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&key);
            evicted += 1;
        }
        evicted
    }
}

/// Keyed cache with per-entry expiry and a maximum entry count.
///
/// All methods take `&self`; share one instance behind an `Arc`.
pub struct ResultCache<T> {
    ttl: Duration,
    max_size: usize,
    state: Mutex<CacheState<T>>,
}

impl<T: Clone> ResultCache<T> {
    /// A `max_size` of zero stores nothing; a zero `ttl` expires every entry
    /// on its next read.
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        ResultCache {
            ttl,
            max_size,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                order: BTreeMap::new(),
                next_seq: 0,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Insert or replace `key`. Replacing resets its age and access count and
    /// makes it the newest entry for eviction purposes.
    pub fn set(&self, key: impl Into<String>, value: T) {
        let key = key.into();
        let mut state = self.lock();
        state.remove(&key);

        let seq = state.next_seq;
        state.next_seq += 1;
        state.order.insert(seq, key.clone());
        state.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                seq,
                hits: 1,
            },
        );

        let evicted = state.evict_to(self.max_size);
        if evicted > 0 {
            tracing::debug!(evicted, size = state.entries.len(), "evicted oldest cache entries");
        }
    }

    /// Look up `key`, counting the access. Expired entries are removed and
    /// reported as absent.
    pub fn get(&self, key: &str) -> Option<T> {
        let mut state = self.lock();
        let entry = state.entries.get_mut(key)?;
        if self.is_fresh(entry.inserted_at) {
            entry.hits += 1;
            return Some(entry.value.clone());
        }
        state.remove(key);
        tracing::debug!(key, "dropped expired cache entry");
        None
    }

    fn is_fresh(&self, inserted_at: Instant) -> bool {
        !self.ttl.is_zero() && inserted_at.elapsed() <= self.ttl
    }

    pub fn remove(&self, key: &str) -> Option<T> {
        self.lock().remove(key).map(|entry| entry.value)
    }

    /// Access count for `key` without touching or expiring it.
    pub fn access_count(&self, key: &str) -> Option<u64> {
        self.lock().entries.get(key).map(|entry| entry.hits)
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.order.clear();
    }

    /// Number of stored entries, including expired ones not yet dropped.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> fmt::Debug for ResultCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = self
            .state
            .lock()
            .map(|s| s.entries.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().entries.len());
        f.debug_struct("ResultCache")
            .field("ttl", &self.ttl)
            .field("max_size", &self.max_size)
            .field("size", &size)
            .finish()
    }
}
