//! Fingerprint-keyed classification cache.
//!
//! A bounded LRU map with lazy TTL expiry. One mutex guards the LRU ordering
//! and is only ever held for O(1) bookkeeping; callers must not hold it across
//! a classifier call (the public API makes that impossible). Hit/miss counters
//! and the current size live in atomics so [`FingerprintCache::stats`] never
//! touches the lock.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Deterministic digest of content text, used only as a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    /// Fingerprints the full content.
    pub fn of(content: &str) -> Self {
        Self::with_limit(content, None)
    }

    /// Fingerprints at most the first `limit` characters of the content.
    pub fn with_limit(content: &str, limit: Option<usize>) -> Self {
        let mut hasher = Sha256::new();
        match limit {
            Some(n) => {
                let end = content
                    .char_indices()
                    .nth(n)
                    .map_or(content.len(), |(i, _)| i);
                hasher.update(content[..end].as_bytes());
            }
            None => hasher.update(content.as_bytes()),
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Returns the hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Twelve hex digits are plenty to correlate log lines.
        f.write_str(&self.0[..self.0.len().min(12)])
    }
}

/// Snapshot of cache counters. Approximate under concurrent load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    /// Percentage of lookups that were hits.
    pub hit_rate: f64,
}

struct CacheEntry<V> {
    value: Arc<V>,
    created_at: Instant,
}

/// Bounded, time-expiring LRU cache keyed by content fingerprint.
pub struct FingerprintCache<V> {
    entries: Mutex<LruCache<ContentFingerprint, CacheEntry<V>>>,
    capacity: NonZeroUsize,
    ttl: Duration,
    len: AtomicUsize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V> fmt::Debug for FingerprintCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FingerprintCache")
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .field("len", &self.len.load(Ordering::Relaxed))
            .finish()
    }
}

impl<V> FingerprintCache<V> {
    /// Creates an empty cache with fixed capacity and TTL.
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            capacity,
            ttl,
            len: AtomicUsize::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Looks up a fingerprint, expiring the entry if it has gone stale.
    pub fn get(&self, key: &ContentFingerprint) -> Option<Arc<V>> {
        self.get_at(key, Instant::now())
    }

    /// Stores a value, restarting its TTL and evicting the LRU entry if full.
    pub fn set(&self, key: ContentFingerprint, value: Arc<V>) {
        self.set_at(key, value, Instant::now());
    }

    fn get_at(&self, key: &ContentFingerprint, now: Instant) -> Option<Arc<V>> {
        let found = {
            let mut entries = self.entries.lock();
            // peek first so a stale entry is not promoted before removal
            let fresh = entries
                .peek(key)
                .map(|entry| now.saturating_duration_since(entry.created_at) < self.ttl);

            match fresh {
                Some(true) => entries.get(key).map(|entry| Arc::clone(&entry.value)),
                Some(false) => {
                    entries.pop(key);
                    self.len.store(entries.len(), Ordering::Relaxed);
                    None
                }
                None => None,
            }
        };

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    fn set_at(&self, key: ContentFingerprint, value: Arc<V>, now: Instant) {
        let mut entries = self.entries.lock();
        entries.put(
            key,
            CacheEntry {
                value,
                created_at: now,
            },
        );
        self.len.store(entries.len(), Ordering::Relaxed);
    }

    /// Returns approximate counters without taking the lock.
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        CacheStats {
            size: self.len.load(Ordering::Relaxed),
            capacity: self.capacity.get(),
            hits,
            misses,
            hit_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize, ttl_secs: u64) -> FingerprintCache<String> {
        FingerprintCache::new(
            NonZeroUsize::new(capacity).unwrap(),
            Duration::from_secs(ttl_secs),
        )
    }

    fn key(s: &str) -> ContentFingerprint {
        ContentFingerprint::of(s)
    }

    fn value(s: &str) -> Arc<String> {
        Arc::new(s.to_string())
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        assert_eq!(key("hello"), key("hello"));
        assert_ne!(key("hello"), key("hello "));
        assert_eq!(key("hello").as_str().len(), 64);
    }

    #[test]
    fn test_fingerprint_limit_truncates_on_char_boundaries() {
        let a = ContentFingerprint::with_limit("héllo world", Some(5));
        let b = ContentFingerprint::with_limit("héllo there", Some(5));
        assert_eq!(a, b);
        assert_eq!(
            ContentFingerprint::with_limit("short", Some(100)),
            ContentFingerprint::of("short")
        );
    }

    #[test]
    fn test_miss_then_hit() {
        let cache = cache(10, 60);
        assert!(cache.get(&key("a")).is_none());

        cache.set(key("a"), value("A"));
        assert_eq!(cache.get(&key("a")).unwrap().as_str(), "A");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.capacity, 10);
        assert!((stats.hit_rate - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_capacity_two_evicts_oldest() {
        let cache = cache(2, 60);
        cache.set(key("A"), value("a"));
        cache.set(key("B"), value("b"));
        cache.set(key("C"), value("c"));

        assert!(cache.get(&key("A")).is_none());
        assert!(cache.get(&key("B")).is_some());
        assert!(cache.get(&key("C")).is_some());
        assert_eq!(cache.stats().size, 2);
    }

    #[test]
    fn test_hit_promotes_entry() {
        let cache = cache(2, 60);
        cache.set(key("A"), value("a"));
        cache.set(key("B"), value("b"));
        assert!(cache.get(&key("A")).is_some());
        cache.set(key("C"), value("c"));

        assert!(cache.get(&key("B")).is_none());
        assert!(cache.get(&key("A")).is_some());
    }

    #[test]
    fn test_size_never_exceeds_capacity() {
        let cache = cache(3, 60);
        for i in 0..50 {
            cache.set(key(&i.to_string()), value("v"));
            assert!(cache.stats().size <= 3);
        }
        assert_eq!(cache.stats().size, 3);
    }

    #[test]
    fn test_expired_entry_is_a_miss_and_removed() {
        let cache = cache(10, 1);
        let t0 = Instant::now();
        cache.set_at(key("A"), value("a"), t0);
        cache.set_at(key("B"), value("b"), t0);
        assert_eq!(cache.stats().size, 2);

        assert!(cache.get_at(&key("A"), t0 + Duration::from_secs(2)).is_none());
        let stats = cache.stats();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_entry_at_exact_ttl_is_stale() {
        let cache = cache(10, 5);
        let t0 = Instant::now();
        cache.set_at(key("A"), value("a"), t0);

        assert!(cache.get_at(&key("A"), t0 + Duration::from_secs(4)).is_some());
        assert!(cache.get_at(&key("A"), t0 + Duration::from_secs(5)).is_none());
    }

    #[test]
    fn test_set_restarts_ttl_and_replaces_value() {
        let cache = cache(10, 5);
        let t0 = Instant::now();
        cache.set_at(key("A"), value("old"), t0);
        cache.set_at(key("A"), value("new"), t0 + Duration::from_secs(4));

        let hit = cache.get_at(&key("A"), t0 + Duration::from_secs(8)).unwrap();
        assert_eq!(hit.as_str(), "new");
        assert_eq!(cache.stats().size, 1);
    }

    #[test]
    fn test_stale_entries_linger_until_accessed() {
        let cache = cache(10, 1);
        let t0 = Instant::now();
        cache.set_at(key("A"), value("a"), t0);
        cache.set_at(key("B"), value("b"), t0 + Duration::from_secs(5));
        assert_eq!(cache.stats().size, 2);
    }

    #[test]
    fn test_concurrent_access_respects_capacity() {
        let cache = Arc::new(cache(16, 60));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let k = key(&format!("{}-{}", t, i % 20));
                        if cache.get(&k).is_none() {
                            cache.set(k, value("v"));
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = cache.stats();
        assert!(stats.size <= 16);
        assert_eq!(stats.hits + stats.misses, 8 * 200);
    }
}
