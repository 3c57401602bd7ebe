//! In-memory expiring key/value stores.
//!
//! Expiry is lazy: nothing sweeps the map, an expired entry simply reads as a
//! miss until the next write to the same key replaces it.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::model::{LocationId, ProviderId, WastePickup};

/// Lifetime of a cached pickup schedule.
pub const PICKUP_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Value plus its absolute expiry.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Generic expiring store keyed by string.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<V: Clone> TtlCache<V> {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the value stored under `key` unless it has expired.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        let entry = self.entries.get(key)?;
        (entry.expires_at > Instant::now()).then(|| entry.value.clone())
    }

    /// Store `value` under `key`, replacing whatever was there.
    pub fn set<K: Into<String>>(&self, key: K, value: V, ttl: Duration) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

/// Store for normalized pickup schedules with a fixed TTL.
#[derive(Debug, Default)]
pub struct PickupCache {
    inner: TtlCache<Arc<[WastePickup]>>,
}

impl PickupCache {
    /// Create an empty pickup cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key for a provider/location pair.
    #[must_use]
    pub fn key(provider: &ProviderId, location_id: &LocationId) -> String {
        format!("{provider}:{location_id}")
    }

    /// Cached schedule for the pair, if present and fresh.
    #[must_use]
    pub fn get(&self, provider: &ProviderId, location_id: &LocationId) -> Option<Arc<[WastePickup]>> {
        self.inner.get(&Self::key(provider, location_id))
    }

    /// Store a schedule for [`PICKUP_TTL`].
    pub fn set(&self, provider: &ProviderId, location_id: &LocationId, pickups: Arc<[WastePickup]>) {
        self.inner
            .set(Self::key(provider, location_id), pickups, PICKUP_TTL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn value_is_visible_until_ttl_elapses() {
        let cache = TtlCache::new();
        cache.set("k", 1_u32, Duration::from_secs(10));
        assert_eq!(cache.get("k"), Some(1), "fresh value must be readable");

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(cache.get("k"), Some(1), "value still within ttl");

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("k"), None, "value at expiry reads as miss");
    }

    #[tokio::test(start_paused = true)]
    async fn set_after_expiry_overwrites() {
        let cache = TtlCache::new();
        cache.set("k", "old", Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.get("k"), None, "expired");

        cache.set("k", "new", Duration::from_secs(1));
        assert_eq!(cache.get("k"), Some("new"), "rewrite visible immediately");
    }

    #[tokio::test(start_paused = true)]
    async fn set_replaces_fresh_value() {
        let cache = TtlCache::new();
        cache.set("k", 1_u8, Duration::from_secs(60));
        cache.set("k", 2_u8, Duration::from_secs(60));
        assert_eq!(cache.get("k"), Some(2), "second write wins");
        assert_eq!(cache.get("other"), None, "unknown key misses");
    }

    #[tokio::test(start_paused = true)]
    async fn pickup_cache_expires_after_six_hours() {
        let cache = PickupCache::new();
        let provider = ProviderId::from("trv");
        let location = LocationId::from("42");
        let empty: Arc<[WastePickup]> = Arc::from(Vec::new());

        cache.set(&provider, &location, empty);
        assert!(cache.get(&provider, &location).is_some(), "fresh schedule");
        assert!(
            cache.get(&ProviderId::from("bir"), &location).is_none(),
            "keys are scoped per provider"
        );

        tokio::time::advance(PICKUP_TTL).await;
        assert!(cache.get(&provider, &location).is_none(), "expired schedule");
    }

    #[test]
    fn pickup_key_joins_provider_and_location() {
        let key = PickupCache::key(&ProviderId::from("oslo"), &LocationId::from("a|1"));
        assert_eq!(key, "oslo:a|1", "key layout");
    }
}
