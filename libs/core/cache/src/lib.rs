// [libs/core/cache/src/lib.rs]
/*!
 * =================================================================
 * APARATO: PROCESS-WIDE TTL+LRU CACHE
 * CLASIFICACIÓN: CORE (L1)
 * RESPONSABILIDAD: MEMOIZACIÓN DE SÍNTESIS Y CLASIFICACIÓN
 *
 * Shared process-wide across every request. Entries are immutable once
 * inserted; a write that collides with an existing key is an atomic
 * replacement, never a mutation in place.
 * =================================================================
 */

use chrono::{Duration, Utc};
use meridian_domain::cache::{CacheEntry, CacheStats};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use tracing::debug;

/// Bounds how many entries the cache holds before it starts evicting the
/// least-recently-used key, independent of TTL.
const DEFAULT_MAX_ENTRIES: usize = 10_000;

pub struct TtlLruCache<V: Clone> {
    max_entries: usize,
    inner: RwLock<Inner<V>>,
}

struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// Most-recently-used key is at the back; eviction pops the front.
    recency: VecDeque<String>,
    hit_count: u64,
    miss_count: u64,
}

impl<V: Clone> TtlLruCache<V> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            max_entries,
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                recency: VecDeque::new(),
                hit_count: 0,
                miss_count: 0,
            }),
        }
    }

    /// Returns `Some(value)` only if the entry exists and has not passed its
    /// TTL; an entry past TTL never surfaces as a hit. An expired entry
    /// found during lookup is evicted immediately.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Utc::now();
        let mut inner = self.inner.write().expect("cache lock poisoned");

        let fresh = inner
            .entries
            .get(key)
            .map(|entry| entry.is_fresh(now))
            .unwrap_or(false);

        if !fresh {
            inner.entries.remove(key);
            inner.miss_count += 1;
            return None;
        }

        touch_recency(&mut inner.recency, key);
        let entry = inner.entries.get_mut(key).expect("checked fresh above");
        entry.hit_count += 1;
        inner.hit_count += 1;
        Some(entry.value.clone())
    }

    pub fn insert(&self, key: String, value: V, ttl_minutes: i64) {
        let now = Utc::now();
        let entry = CacheEntry::new(value, now, Duration::minutes(ttl_minutes));
        let mut inner = self.inner.write().expect("cache lock poisoned");

        inner.entries.insert(key.clone(), entry);
        touch_recency(&mut inner.recency, &key);

        while inner.entries.len() > self.max_entries {
            if let Some(lru_key) = inner.recency.pop_front() {
                debug!(evicted = %lru_key, "cache at capacity, evicting least-recently-used entry");
                inner.entries.remove(&lru_key);
            } else {
                break;
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.read().expect("cache lock poisoned");
        CacheStats {
            size: inner.entries.len(),
            hit_count: inner.hit_count,
            miss_count: inner.miss_count,
        }
    }
}

impl<V: Clone> Default for TtlLruCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

fn touch_recency(recency: &mut VecDeque<String>, key: &str) {
    if let Some(pos) = recency.iter().position(|existing| existing == key) {
        recency.remove(pos);
    }
    recency.push_back(key.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_then_expiry() {
        let cache: TtlLruCache<String> = TtlLruCache::new();
        cache.insert("k".to_string(), "v".to_string(), 60);
        assert_eq!(cache.get("k"), Some("v".to_string()));
        assert_eq!(cache.stats().hit_count, 1);
    }

    #[test]
    fn expired_entry_never_surfaces() {
        let cache: TtlLruCache<String> = TtlLruCache::new();
        // Negative TTL: already expired at insert time.
        cache.insert("k".to_string(), "v".to_string(), -1);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn lru_eviction_respects_capacity() {
        let cache: TtlLruCache<i32> = TtlLruCache::with_capacity(2);
        cache.insert("a".to_string(), 1, 60);
        cache.insert("b".to_string(), 2, 60);
        cache.get("a"); // bump "a" to most-recently-used
        cache.insert("c".to_string(), 3, 60); // evicts "b"
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("c"), Some(3));
    }
}
