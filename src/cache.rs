//! # Listing Cache
//!
//! In-memory TTL cache for listing payloads with key-prefix invalidation.
//!
//! Keys are flat strings namespaced by convention (`canteens`,
//! `canteen:{id}`, `menu:{canteen_id}:{category}:{available}`,
//! `session:{user_id}`, `orders:recent:{user_id}`), so a mutation can wipe
//! every cached view of one canteen with a single [`TtlCache::remove_prefix`]
//! call. The prefix scan walks the whole key space; fine here because key
//! cardinality is bounded by canteens x categories x availability flags.
//!
//! Expiry is checked lazily on every read, and a periodic sweeper
//! ([`TtlCache::spawn_sweeper`]) drops entries that are never read again.
//! The cache is strictly per process; multiple backend replicas each hold an
//! independent copy.

use std::{collections::HashMap, sync::Arc};

use tokio::{
    sync::RwLock,
    task::JoinHandle,
    time::{Duration, Instant, interval},
};
use tracing::debug;

pub const DEFAULT_TTL: Duration = Duration::from_secs(600);
pub const MENU_TTL: Duration = Duration::from_secs(300);
pub const CANTEENS_TTL: Duration = Duration::from_secs(1800);
pub const SESSION_TTL: Duration = Duration::from_secs(1800);
pub const RECENT_ORDERS_TTL: Duration = Duration::from_secs(900);
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(120);

/// The cache instance shared by the route handlers.
pub type ListingCache = TtlCache<serde_json::Value>;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

pub struct TtlCache<V> {
    entries: Arc<RwLock<HashMap<String, Entry<V>>>>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<V> Default for TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the live value for `key`.
    ///
    /// An expired entry is treated exactly like a missing one; callers cannot
    /// tell "never set" from "expired".
    pub async fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;

        if entry.expires_at <= Instant::now() {
            return None;
        }

        Some(entry.value.clone())
    }

    /// Inserts or overwrites `key`, resetting its expiry to now + `ttl`.
    pub async fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };

        self.entries.write().await.insert(key.into(), entry);
    }

    /// Removes the given keys, returning how many were actually present.
    pub async fn remove(&self, keys: &[&str]) -> usize {
        let mut entries = self.entries.write().await;

        let mut removed = 0;
        for key in keys {
            if entries.remove(*key).is_some() {
                removed += 1;
            }
        }

        removed
    }

    /// Removes every entry whose key starts with the literal `prefix`.
    pub async fn remove_prefix(&self, prefix: &str) {
        let mut entries = self.entries.write().await;
        entries.retain(|key, _| !key.starts_with(prefix));
    }

    /// Drops all expired entries, returning how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);

        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Spawns the background sweeper that bounds memory from entries whose
    /// keys are never read again.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let cache = self.clone();

        tokio::spawn(async move {
            let mut ticker = interval(every);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let removed = cache.sweep().await;
                if removed > 0 {
                    debug!(removed, "Swept expired cache entries");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_returns_value() {
        let cache = TtlCache::new();

        cache.set("canteens", 42u32, Duration::from_secs(300)).await;

        assert_eq!(cache.get("canteens").await, Some(42));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_key_is_absent() {
        let cache = TtlCache::new();

        cache.set("k", 1u32, Duration::from_secs(1)).await;
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_refreshes_expiry() {
        let cache = TtlCache::new();

        cache.set("k", 1u32, Duration::from_secs(1)).await;
        cache.set("k", 2u32, Duration::from_secs(600)).await;
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(cache.get("k").await, Some(2));
    }

    #[tokio::test]
    async fn remove_returns_count_of_present_keys() {
        let cache = TtlCache::new();

        cache.set("a", 1u32, DEFAULT_TTL).await;
        cache.set("b", 2u32, DEFAULT_TTL).await;

        assert_eq!(cache.remove(&["a", "b", "missing"]).await, 2);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn remove_prefix_only_touches_matching_keys() {
        let cache = TtlCache::new();

        cache.set("menu:canteen-a:snacks:*", 1u32, MENU_TTL).await;
        cache.set("menu:canteen-a:meals:true", 2u32, MENU_TTL).await;
        cache.set("menu:canteen-b:snacks:*", 3u32, MENU_TTL).await;
        cache.set("canteens", 4u32, CANTEENS_TTL).await;

        cache.remove_prefix("menu:canteen-a:").await;

        assert_eq!(cache.get("menu:canteen-a:snacks:*").await, None);
        assert_eq!(cache.get("menu:canteen-a:meals:true").await, None);
        assert_eq!(cache.get("menu:canteen-b:snacks:*").await, Some(3));
        assert_eq!(cache.get("canteens").await, Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_only_expired_entries() {
        let cache = TtlCache::new();

        cache.set("short", 1u32, Duration::from_secs(1)).await;
        cache.set("long", 2u32, Duration::from_secs(600)).await;
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(cache.sweep().await, 1);
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("long").await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_task_bounds_memory() {
        let cache = TtlCache::new();
        cache.set("k", 1u32, Duration::from_secs(1)).await;

        let sweeper = cache.spawn_sweeper(SWEEP_INTERVAL);

        // Let the sweeper reach its first interval wait before advancing.
        tokio::task::yield_now().await;
        tokio::time::advance(SWEEP_INTERVAL + Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert_eq!(cache.len().await, 0);
        sweeper.abort();
    }
}
