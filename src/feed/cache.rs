use dashmap::DashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

/// Memoizing cache with per-entry TTL. Entries are only ever superseded by a
/// successful refresh or aged out by their TTL; there is no invalidation API.
/// Expired entries stay retrievable via `stale` so the feed can serve
/// last-known-good data when every backend is down.
pub struct TtlCache<K, V> {
    entries: DashMap<K, Entry<V>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn put(&self, key: K, value: V, ttl: Duration) {
        self.entries.insert(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Value stored within its TTL, if any.
    pub fn fresh(&self, key: &K) -> Option<V> {
        self.entries.get(key).and_then(|e| {
            if e.stored_at.elapsed() < e.ttl {
                Some(e.value.clone())
            } else {
                None
            }
        })
    }

    /// Value of any age, fresh or expired.
    pub fn stale(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|e| e.value.clone())
    }
}

impl<K: Eq + Hash, V: Clone> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_hit_within_ttl() {
        let cache: TtlCache<&str, u32> = TtlCache::new();
        cache.put("k", 7, Duration::from_secs(60));
        assert_eq!(cache.fresh(&"k"), Some(7));
    }

    #[test]
    fn expired_entry_is_not_fresh_but_still_stale() {
        let cache: TtlCache<&str, u32> = TtlCache::new();
        cache.put("k", 7, Duration::ZERO);
        assert_eq!(cache.fresh(&"k"), None);
        assert_eq!(cache.stale(&"k"), Some(7));
    }

    #[test]
    fn missing_key_is_neither_fresh_nor_stale() {
        let cache: TtlCache<&str, u32> = TtlCache::new();
        assert_eq!(cache.fresh(&"k"), None);
        assert_eq!(cache.stale(&"k"), None);
    }

    #[test]
    fn refresh_replaces_expired_value() {
        let cache: TtlCache<&str, u32> = TtlCache::new();
        cache.put("k", 1, Duration::ZERO);
        cache.put("k", 2, Duration::from_secs(60));
        assert_eq!(cache.fresh(&"k"), Some(2));
    }
}
