//! Per-actor offer list cache with a runtime-tunable TTL.
//!
//! Entries are never evicted by age, only replaced, invalidated, or cleared.
//! Staleness is decided at lookup time against the current TTL.

use offer_types::Offer;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::actor::ActorKey;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: Vec<Offer>,
    pub fetched_at: Instant,
}

impl CacheEntry {
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// What a lookup found.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Fresh(Vec<Offer>),
    /// Past the TTL, handed out only while SWR is on.
    Stale(Vec<Offer>),
    Miss,
}

pub struct OfferCache {
    entries: Mutex<HashMap<ActorKey, CacheEntry>>,
    ttl_ms: AtomicU64,
    swr_enabled: AtomicBool,
}

impl OfferCache {
    pub fn new(ttl: Duration, swr_enabled: bool) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl_ms: AtomicU64::new(ttl.as_millis() as u64),
            swr_enabled: AtomicBool::new(swr_enabled),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ActorKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms.load(Ordering::Relaxed))
    }

    pub fn set_ttl(&self, ttl: Duration) {
        self.ttl_ms.store(ttl.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn swr_enabled(&self) -> bool {
        self.swr_enabled.load(Ordering::Relaxed)
    }

    pub fn set_swr_enabled(&self, enabled: bool) {
        self.swr_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn get(&self, key: &ActorKey) -> Option<CacheEntry> {
        self.lock().get(key).cloned()
    }

    pub fn lookup(&self, key: &ActorKey) -> Lookup {
        let ttl = self.ttl();
        let swr = self.swr_enabled();
        match self.lock().get(key) {
            Some(entry) if entry.is_fresh(ttl) => Lookup::Fresh(entry.data.clone()),
            Some(entry) if swr => Lookup::Stale(entry.data.clone()),
            _ => Lookup::Miss,
        }
    }

    pub fn set(&self, key: &ActorKey, data: Vec<Offer>) {
        self.lock().insert(
            key.clone(),
            CacheEntry {
                data,
                fetched_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &ActorKey) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offers(id: &str) -> Vec<Offer> {
        vec![Offer::pending(id, "b1", "s1", "p1", 100, 1)]
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_goes_stale_after_ttl() {
        let cache = OfferCache::new(Duration::from_secs(60), false);
        let key = ActorKey::buyer("b1");
        cache.set(&key, offers("o1"));

        assert_eq!(cache.lookup(&key), Lookup::Fresh(offers("o1")));
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.lookup(&key), Lookup::Miss);

        cache.set_swr_enabled(true);
        assert_eq!(cache.lookup(&key), Lookup::Stale(offers("o1")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_is_always_stale() {
        let cache = OfferCache::new(Duration::ZERO, true);
        let key = ActorKey::supplier("s1");
        cache.set(&key, offers("o1"));
        assert_eq!(cache.lookup(&key), Lookup::Stale(offers("o1")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_change_applies_to_existing_entries() {
        let cache = OfferCache::new(Duration::from_secs(60), false);
        let key = ActorKey::buyer("b1");
        cache.set(&key, offers("o1"));
        tokio::time::advance(Duration::from_secs(5)).await;

        cache.set_ttl(Duration::from_secs(1));
        assert_eq!(cache.lookup(&key), Lookup::Miss);
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn test_roles_do_not_collide() {
        let cache = OfferCache::new(Duration::from_secs(60), false);
        cache.set(&ActorKey::buyer("42"), offers("as-buyer"));
        cache.set(&ActorKey::supplier("42"), offers("as-supplier"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&ActorKey::buyer("42")).unwrap().data[0].id, "as-buyer");

        assert!(cache.invalidate(&ActorKey::buyer("42")));
        assert!(!cache.invalidate(&ActorKey::buyer("42")));
        cache.clear();
        assert!(cache.is_empty());
    }
}
