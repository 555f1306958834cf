//! Expiring, size-bounded geolocation cache.
//!
//! Concurrent map from IP to cached location. Expiry is checked at read
//! time and the stale entry removed on that same access, so an expired
//! value is never returned. When the configured maximum size is exceeded,
//! the oldest-inserted entries are evicted by insertion time, not access
//! recency.

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::geolocation::GeoLocation;

/// A cached location with its validity window and hit counter.
#[derive(Debug, Clone)]
struct CachedLocation {
    location: GeoLocation,
    cached_at: Instant,
    expires_at: Instant,
    hits: u64,
}

pub struct GeoCache {
    entries: DashMap<IpAddr, CachedLocation>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl GeoCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        GeoCache {
            entries: DashMap::new(),
            ttl,
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Fetch a live cached location. A hit bumps the entry's hit counter;
    /// an expired entry is removed and reported as a miss.
    pub fn get(&self, ip: &IpAddr) -> Option<GeoLocation> {
        let now = Instant::now();
        if let Some(mut entry) = self.entries.get_mut(ip) {
            if entry.expires_at > now {
                entry.hits += 1;
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.location.clone());
            }
            drop(entry);
            self.entries.remove(ip);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert a resolved location with expiry = now + TTL, then enforce the
    /// size bound. Racing inserts on the same key overwrite idempotently.
    pub fn insert(&self, ip: IpAddr, location: GeoLocation) {
        let now = Instant::now();
        self.entries.insert(
            ip,
            CachedLocation {
                location,
                cached_at: now,
                expires_at: now + self.ttl,
                hits: 0,
            },
        );
        self.evict_oldest();
    }

    fn evict_oldest(&self) {
        if self.entries.len() <= self.max_entries {
            return;
        }
        let mut by_age: Vec<(IpAddr, Instant)> = self
            .entries
            .iter()
            .map(|entry| (*entry.key(), entry.cached_at))
            .collect();
        by_age.sort_by_key(|(_, cached_at)| *cached_at);

        let excess = by_age.len().saturating_sub(self.max_entries);
        for (ip, _) in by_age.into_iter().take(excess) {
            self.entries.remove(&ip);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Hits recorded against one entry since it was inserted.
    pub fn entry_hits(&self, ip: &IpAddr) -> Option<u64> {
        self.entries.get(ip).map(|entry| entry.hits)
    }

    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn ip(text: &str) -> IpAddr {
        IpAddr::from_str(text).unwrap()
    }

    fn location(code: &str) -> GeoLocation {
        GeoLocation {
            country_code: code.to_string(),
            country_name: code.to_string(),
            city: None,
            extra: Default::default(),
        }
    }

    #[test]
    fn test_hit_after_insert() {
        let cache = GeoCache::new(Duration::from_secs(60), 100);
        cache.insert(ip("8.8.8.8"), location("US"));

        let hit = cache.get(&ip("8.8.8.8")).unwrap();
        assert_eq!(hit.country_code, "US");
        assert_eq!(cache.hit_count(), 1);
        assert_eq!(cache.miss_count(), 0);
        assert_eq!(cache.entry_hits(&ip("8.8.8.8")), Some(1));
    }

    #[test]
    fn test_miss_on_absent_key() {
        let cache = GeoCache::new(Duration::from_secs(60), 100);
        assert!(cache.get(&ip("1.1.1.1")).is_none());
        assert_eq!(cache.miss_count(), 1);
    }

    #[test]
    fn test_expired_entry_removed_on_read() {
        let cache = GeoCache::new(Duration::from_secs(0), 100);
        cache.insert(ip("8.8.8.8"), location("US"));
        assert_eq!(cache.len(), 1);

        assert!(cache.get(&ip("8.8.8.8")).is_none());
        assert_eq!(cache.len(), 0, "stale entry must be removed on access");
        assert_eq!(cache.miss_count(), 1);
    }

    #[test]
    fn test_oldest_insertion_evicted_first() {
        let cache = GeoCache::new(Duration::from_secs(60), 2);
        cache.insert(ip("1.1.1.1"), location("AU"));
        std::thread::sleep(Duration::from_millis(5));
        cache.insert(ip("8.8.8.8"), location("US"));
        std::thread::sleep(Duration::from_millis(5));

        // Reading the oldest does not protect it: eviction ranks by
        // insertion time, not access recency.
        assert!(cache.get(&ip("1.1.1.1")).is_some());
        cache.insert(ip("9.9.9.9"), location("CH"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&ip("1.1.1.1")).is_none());
        assert!(cache.get(&ip("8.8.8.8")).is_some());
        assert!(cache.get(&ip("9.9.9.9")).is_some());
    }

    #[test]
    fn test_clear() {
        let cache = GeoCache::new(Duration::from_secs(60), 100);
        cache.insert(ip("8.8.8.8"), location("US"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
