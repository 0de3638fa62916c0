//! Dashboard content caching with TTL-based invalidation
//!
//! This module is the single source of truth for "do we already have fresh
//! data for key K", hiding expiry, eviction, and persistence mechanics from
//! page-rendering callers.
//!
//! # Features
//!
//! - **TTL-based expiration**: per-entry time-to-live; expired entries are
//!   never returned
//! - **Namespaced payloads**: independent sub-caches for dashboards,
//!   metadata, configuration, and card lists
//! - **Capacity eviction**: the dashboards namespace is bounded, evicting the
//!   oldest entry by insertion timestamp
//! - **Hit/miss accounting**: per-key counters plus an aggregate hit rate
//! - **Durable persistence**: optional write-through of dashboard entries to
//!   a pluggable storage backend, revalidated at hydration
//!
//! # Example
//!
//! ```
//! use dashstate::{CacheConfig, DashboardCache, Namespace};
//! use serde_json::json;
//!
//! let mut cache = DashboardCache::new(CacheConfig::default());
//!
//! cache.set(Namespace::Dashboards, "sales", json!({"total": 100}), None);
//! assert!(cache.get(Namespace::Dashboards, "sales").is_some());
//!
//! let stats = cache.stats();
//! assert_eq!(stats.total_hits, 1);
//! ```

pub mod storage;
pub mod ttl;

use self::storage::CacheStorage;
use self::ttl::{CacheEntry, TtlStore};
use crate::clock::{Clock, SystemClock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, warn};

/// Prefix of every durable storage key owned by the cache.
const STORAGE_KEY_PREFIX: &str = "dashboard_cache_";

fn storage_key(key: &str) -> String {
    format!("{STORAGE_KEY_PREFIX}{key}")
}

/// Cache configuration options.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Default TTL for cached entries in milliseconds.
    pub default_ttl_ms: i64,
    /// Maximum number of entries in the dashboards namespace.
    pub max_dashboard_entries: usize,
    /// Interval between background expiry sweeps.
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: 5 * 60 * 1000, // 5 minutes
            max_dashboard_entries: 50,
            cleanup_interval: Duration::from_secs(60), // 1 minute
        }
    }
}

/// The four independent sub-caches a key can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Full dashboard payloads. Bounded and persisted.
    Dashboards,
    /// Dashboard metadata.
    Metadata,
    /// Dashboard configuration.
    Configuration,
    /// Card lists.
    Cards,
}

impl Namespace {
    /// All namespaces, in invalidation order.
    pub const ALL: [Namespace; 4] = [
        Namespace::Dashboards,
        Namespace::Metadata,
        Namespace::Configuration,
        Namespace::Cards,
    ];

    /// Stable lowercase name, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Dashboards => "dashboards",
            Namespace::Metadata => "metadata",
            Namespace::Configuration => "configuration",
            Namespace::Cards => "cards",
        }
    }
}

/// Per-key hit/miss counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct KeyStats {
    /// Reads served from a fresh entry.
    pub hits: u64,
    /// Reads that found nothing, or only an expired entry.
    pub misses: u64,
}

impl KeyStats {
    /// hits / (hits + misses), `0.0` before any read.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Snapshot of cache health for monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Entries resident in the dashboards namespace.
    pub size: usize,
    /// Aggregate hits / (hits + misses) across all keys, `0.0` when idle.
    pub hit_rate: f64,
    /// Total hits across all keys.
    pub total_hits: u64,
    /// Total misses across all keys.
    pub total_misses: u64,
    /// Insertion timestamp of the oldest dashboards entry, ms since epoch.
    pub oldest_entry: Option<i64>,
    /// Insertion timestamp of the newest dashboards entry, ms since epoch.
    pub newest_entry: Option<i64>,
    /// Entries evicted to respect the capacity bound.
    pub evictions: u64,
    /// Entries removed because their TTL had elapsed.
    pub expired_cleaned: u64,
    /// Most-read dashboard keys with their access counts.
    pub top_keys: Vec<(String, u64)>,
}

/// TTL-keyed cache for dashboard payloads with hit/miss accounting, capacity
/// eviction, and optional durable persistence.
///
/// All operations are synchronous and the host owns the instance; there is no
/// interior locking. For shared ownership with the background cleanup task,
/// wrap the cache in `Arc<tokio::sync::Mutex<_>>` and use
/// [`DashboardCache::spawn_cleanup`].
pub struct DashboardCache {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    dashboards: TtlStore<Value>,
    metadata: TtlStore<Value>,
    configuration: TtlStore<Value>,
    cards: TtlStore<Value>,
    key_stats: HashMap<String, KeyStats>,
    loading: HashSet<String>,
    errors: HashMap<String, String>,
    storage: Option<Box<dyn CacheStorage>>,
    evictions: u64,
    expired_cleaned: u64,
}

impl DashboardCache {
    /// Memory-only cache with the system clock.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_parts(config, None, Arc::new(SystemClock))
    }

    /// Cache backed by durable storage. Persisted entries are hydrated into
    /// the dashboards namespace immediately, dropping (and durably deleting)
    /// any whose TTL has already elapsed.
    pub fn with_storage(config: CacheConfig, storage: Box<dyn CacheStorage>) -> Self {
        Self::with_parts(config, Some(storage), Arc::new(SystemClock))
    }

    /// Fully-injected constructor; the host supplies every collaborator.
    pub fn with_parts(
        config: CacheConfig,
        storage: Option<Box<dyn CacheStorage>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut cache = Self {
            dashboards: TtlStore::bounded(config.max_dashboard_entries),
            metadata: TtlStore::new(),
            configuration: TtlStore::new(),
            cards: TtlStore::new(),
            key_stats: HashMap::new(),
            loading: HashSet::new(),
            errors: HashMap::new(),
            storage,
            evictions: 0,
            expired_cleaned: 0,
            config,
            clock,
        };
        cache.hydrate();
        cache
    }

    fn store(&self, namespace: Namespace) -> &TtlStore<Value> {
        match namespace {
            Namespace::Dashboards => &self.dashboards,
            Namespace::Metadata => &self.metadata,
            Namespace::Configuration => &self.configuration,
            Namespace::Cards => &self.cards,
        }
    }

    fn store_mut(&mut self, namespace: Namespace) -> &mut TtlStore<Value> {
        match namespace {
            Namespace::Dashboards => &mut self.dashboards,
            Namespace::Metadata => &mut self.metadata,
            Namespace::Configuration => &mut self.configuration,
            Namespace::Cards => &mut self.cards,
        }
    }

    /// Look up `key` in `namespace`.
    ///
    /// Returns `None` on an absent or expired entry and records a miss for
    /// the key; expired entries are removed as they are observed, so stale
    /// data is never returned. A hit records the read and returns the data.
    pub fn get(&mut self, namespace: Namespace, key: &str) -> Option<Value> {
        if key.is_empty() {
            warn!("cache get rejected: empty key");
            return None;
        }

        let now = self.clock.now_ms();
        let was_resident = self.store(namespace).contains(key);
        let value = self.store_mut(namespace).get(key, now).cloned();

        match value {
            Some(value) => {
                self.key_stats.entry(key.to_string()).or_default().hits += 1;
                Some(value)
            }
            None => {
                if was_resident {
                    // The read observed an expired entry and dropped it.
                    self.expired_cleaned += 1;
                    if namespace == Namespace::Dashboards {
                        self.remove_persisted(key);
                    }
                }
                self.key_stats.entry(key.to_string()).or_default().misses += 1;
                None
            }
        }
    }

    /// Store `data` under `key` in `namespace` with the given TTL (the
    /// configured default when `None`).
    ///
    /// A JSON `null` payload is ignored. Any existing entry for the key is
    /// replaced by a fresh one. When the dashboards namespace is full and the
    /// key is new, the oldest entry (by insertion timestamp) is evicted
    /// first. Dashboard entries are written through to durable storage when
    /// persistence is enabled.
    pub fn set(&mut self, namespace: Namespace, key: &str, data: Value, ttl_ms: Option<i64>) {
        if key.is_empty() {
            warn!("cache set rejected: empty key");
            return;
        }
        if data.is_null() {
            debug!("ignoring null payload for key {key}");
            return;
        }

        let ttl = ttl_ms.unwrap_or(self.config.default_ttl_ms);
        let now = self.clock.now_ms();
        let evicted = self.store_mut(namespace).insert(key, data, ttl, now);

        if namespace == Namespace::Dashboards {
            if let Some(evicted_key) = evicted {
                self.evictions += 1;
                debug!("evicted oldest dashboard entry {evicted_key}");
                self.remove_persisted(&evicted_key);
            }
            self.persist_entry(key);
        }
    }

    /// Drop cached state.
    ///
    /// With a key: the key is removed from all four namespaces along with its
    /// hit/miss counters, loading flag, recorded error, and durable copy.
    /// Without a key: every namespace, every counter, and every persisted
    /// entry belonging to this cache is cleared.
    pub fn invalidate(&mut self, key: Option<&str>) {
        match key {
            Some(key) => {
                for namespace in Namespace::ALL {
                    self.store_mut(namespace).remove(key);
                }
                self.key_stats.remove(key);
                self.loading.remove(key);
                self.errors.remove(key);
                self.remove_persisted(key);
            }
            None => {
                self.dashboards.clear();
                self.metadata.clear();
                self.configuration.clear();
                self.cards.clear();
                self.key_stats.clear();
                self.loading.clear();
                self.errors.clear();
                self.evictions = 0;
                self.expired_cleaned = 0;
                self.wipe_persisted();
            }
        }
    }

    /// Evict every dashboards entry whose TTL has elapsed, along with its
    /// durable copy. Intended to run on a periodic timer (see
    /// [`DashboardCache::spawn_cleanup`]) so memory is reclaimed even for
    /// keys nobody is polling.
    pub fn cleanup_expired(&mut self) {
        let now = self.clock.now_ms();
        let swept = self.dashboards.sweep_expired(now);
        if swept.is_empty() {
            return;
        }
        self.expired_cleaned += swept.len() as u64;
        debug!("expired {} dashboard entries", swept.len());
        for key in &swept {
            self.remove_persisted(key);
        }
    }

    /// Drive [`DashboardCache::cleanup_expired`] on the configured interval
    /// for a shared cache. The returned handle aborts the loop when dropped
    /// via `JoinHandle::abort`.
    pub fn spawn_cleanup(cache: Arc<Mutex<DashboardCache>>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let every = cache.lock().await.config.cleanup_interval;
            let mut ticker = interval(every);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.lock().await.cleanup_expired();
            }
        })
    }

    /// Flag `key` as having a fetch in flight. Loading flags are auxiliary
    /// state, not subject to TTL, and cleared by [`DashboardCache::invalidate`].
    pub fn set_loading(&mut self, key: &str, loading: bool) {
        if loading {
            self.loading.insert(key.to_string());
        } else {
            self.loading.remove(key);
        }
    }

    /// Whether `key` has a fetch in flight.
    pub fn is_loading(&self, key: &str) -> bool {
        self.loading.contains(key)
    }

    /// Record (or with `None`, clear) a fetch error for `key`, so callers can
    /// distinguish "miss, please refetch" from "this key is errored".
    pub fn set_error(&mut self, key: &str, error: Option<String>) {
        match error {
            Some(error) => {
                self.errors.insert(key.to_string(), error);
            }
            None => {
                self.errors.remove(key);
            }
        }
    }

    /// The recorded fetch error for `key`, if any.
    pub fn get_error(&self, key: &str) -> Option<&str> {
        self.errors.get(key).map(String::as_str)
    }

    /// Hit/miss counters for one key.
    pub fn key_stats(&self, key: &str) -> Option<KeyStats> {
        self.key_stats.get(key).copied()
    }

    /// Aggregate cache statistics.
    pub fn stats(&self) -> CacheStats {
        let total_hits: u64 = self.key_stats.values().map(|stats| stats.hits).sum();
        let total_misses: u64 = self.key_stats.values().map(|stats| stats.misses).sum();
        let total = total_hits + total_misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            total_hits as f64 / total as f64
        };

        let mut top_keys: Vec<(String, u64)> = self
            .dashboards
            .iter()
            .map(|(key, entry)| (key.to_string(), entry.access_count))
            .collect();
        top_keys.sort_by(|a, b| b.1.cmp(&a.1));
        top_keys.truncate(10);

        CacheStats {
            size: self.dashboards.len(),
            hit_rate,
            total_hits,
            total_misses,
            oldest_entry: self.dashboards.oldest_timestamp(),
            newest_entry: self.dashboards.newest_timestamp(),
            evictions: self.evictions,
            expired_cleaned: self.expired_cleaned,
            top_keys,
        }
    }

    fn persist_entry(&mut self, key: &str) {
        let Some(storage) = self.storage.as_mut() else {
            return;
        };
        let Some(entry) = self.dashboards.entry(key) else {
            return;
        };
        match serde_json::to_string(entry) {
            Ok(json) => {
                if let Err(err) = storage.write(&storage_key(key), &json) {
                    warn!("failed to persist cache entry {key}: {err}");
                }
            }
            Err(err) => warn!("failed to serialize cache entry {key}: {err}"),
        }
    }

    fn remove_persisted(&mut self, key: &str) {
        let Some(storage) = self.storage.as_mut() else {
            return;
        };
        if let Err(err) = storage.remove(&storage_key(key)) {
            warn!("failed to remove persisted entry {key}: {err}");
        }
    }

    fn wipe_persisted(&mut self) {
        let Some(storage) = self.storage.as_mut() else {
            return;
        };
        let keys = match storage.keys() {
            Ok(keys) => keys,
            Err(err) => {
                warn!("failed to enumerate persisted entries: {err}");
                return;
            }
        };
        for storage_key in keys {
            if !storage_key.starts_with(STORAGE_KEY_PREFIX) {
                continue;
            }
            if let Err(err) = storage.remove(&storage_key) {
                warn!("failed to remove persisted entry {storage_key}: {err}");
            }
        }
    }

    /// Load persisted dashboard entries, revalidating each against its own
    /// TTL. Expired records are deleted durably rather than loaded.
    fn hydrate(&mut self) {
        let now = self.clock.now_ms();
        let Some(storage) = self.storage.as_mut() else {
            return;
        };
        let keys = match storage.keys() {
            Ok(keys) => keys,
            Err(err) => {
                warn!("cache hydration skipped: {err}");
                return;
            }
        };

        for full_key in keys {
            let Some(key) = full_key.strip_prefix(STORAGE_KEY_PREFIX) else {
                continue;
            };
            let key = key.to_string();

            let raw = match storage.read(&full_key) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(err) => {
                    warn!("failed to read persisted entry {key}: {err}");
                    continue;
                }
            };

            let entry: CacheEntry<Value> = match serde_json::from_str(&raw) {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("dropping undecodable persisted entry {key}: {err}");
                    if let Err(err) = storage.remove(&full_key) {
                        warn!("failed to remove persisted entry {key}: {err}");
                    }
                    continue;
                }
            };

            if entry.is_expired(now) {
                debug!("dropping expired persisted entry {key}");
                if let Err(err) = storage.remove(&full_key) {
                    warn!("failed to remove persisted entry {key}: {err}");
                }
                continue;
            }

            if let Some(evicted) = self.dashboards.insert_entry(&key, entry) {
                self.evictions += 1;
                if let Err(err) = storage.remove(&storage_key(&evicted)) {
                    warn!("failed to remove persisted entry {evicted}: {err}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::storage::MemoryStorage;
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;

    fn manual_cache(config: CacheConfig) -> (DashboardCache, ManualClock) {
        let clock = ManualClock::new(0);
        let cache = DashboardCache::with_parts(config, None, Arc::new(clock.clone()));
        (cache, clock)
    }

    #[test]
    fn basic_set_and_get() {
        let (mut cache, _clock) = manual_cache(CacheConfig::default());

        assert!(cache.get(Namespace::Dashboards, "sales").is_none());
        cache.set(Namespace::Dashboards, "sales", json!({"total": 100}), None);
        assert_eq!(
            cache.get(Namespace::Dashboards, "sales"),
            Some(json!({"total": 100}))
        );
    }

    #[test]
    fn namespaces_are_independent() {
        let (mut cache, _clock) = manual_cache(CacheConfig::default());

        cache.set(Namespace::Metadata, "sales", json!({"title": "Sales"}), None);
        assert!(cache.get(Namespace::Dashboards, "sales").is_none());
        assert_eq!(
            cache.get(Namespace::Metadata, "sales"),
            Some(json!({"title": "Sales"}))
        );
    }

    #[test]
    fn null_payload_is_ignored() {
        let (mut cache, _clock) = manual_cache(CacheConfig::default());

        cache.set(Namespace::Dashboards, "sales", Value::Null, None);
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn empty_key_is_rejected_without_accounting() {
        let (mut cache, _clock) = manual_cache(CacheConfig::default());

        cache.set(Namespace::Dashboards, "", json!(1), None);
        assert!(cache.get(Namespace::Dashboards, "").is_none());

        let stats = cache.stats();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.total_misses, 0);
    }

    #[test]
    fn loading_and_error_state_survive_ttl() {
        let (mut cache, clock) = manual_cache(CacheConfig::default());

        cache.set_loading("sales", true);
        cache.set_error("sales", Some("fetch failed".to_string()));
        clock.advance(60 * 60 * 1000);

        assert!(cache.is_loading("sales"));
        assert_eq!(cache.get_error("sales"), Some("fetch failed"));

        cache.set_loading("sales", false);
        cache.set_error("sales", None);
        assert!(!cache.is_loading("sales"));
        assert!(cache.get_error("sales").is_none());
    }

    #[test]
    fn invalidate_key_clears_auxiliary_state() {
        let (mut cache, _clock) = manual_cache(CacheConfig::default());

        cache.set(Namespace::Dashboards, "sales", json!(1), None);
        cache.set_error("sales", Some("boom".to_string()));
        cache.set_loading("sales", true);

        cache.invalidate(Some("sales"));

        assert!(cache.get_error("sales").is_none());
        assert!(!cache.is_loading("sales"));
        assert!(cache.key_stats("sales").is_none());
    }

    #[test]
    fn stats_reports_extremes_and_top_keys() {
        let (mut cache, clock) = manual_cache(CacheConfig::default());

        cache.set(Namespace::Dashboards, "a", json!(1), None);
        clock.advance(10);
        cache.set(Namespace::Dashboards, "b", json!(2), None);

        cache.get(Namespace::Dashboards, "b");
        cache.get(Namespace::Dashboards, "b");
        cache.get(Namespace::Dashboards, "a");

        let stats = cache.stats();
        assert_eq!(stats.size, 2);
        assert_eq!(stats.oldest_entry, Some(0));
        assert_eq!(stats.newest_entry, Some(10));
        assert_eq!(stats.top_keys[0], ("b".to_string(), 2));
    }

    #[test]
    fn persistence_failures_do_not_poison_memory() {
        struct BrokenStorage;

        impl CacheStorage for BrokenStorage {
            fn read(&self, _key: &str) -> crate::Result<Option<String>> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "disk on fire").into())
            }
            fn write(&mut self, _key: &str, _value: &str) -> crate::Result<()> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "disk on fire").into())
            }
            fn remove(&mut self, _key: &str) -> crate::Result<()> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "disk on fire").into())
            }
            fn keys(&self) -> crate::Result<Vec<String>> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "disk on fire").into())
            }
        }

        let clock = ManualClock::new(0);
        let mut cache = DashboardCache::with_parts(
            CacheConfig::default(),
            Some(Box::new(BrokenStorage)),
            Arc::new(clock),
        );

        cache.set(Namespace::Dashboards, "sales", json!({"total": 1}), None);
        assert_eq!(
            cache.get(Namespace::Dashboards, "sales"),
            Some(json!({"total": 1}))
        );
        cache.invalidate(None);
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn hydration_honors_capacity_bound() {
        let mut storage = MemoryStorage::new();
        let clock = ManualClock::new(1_000);

        // Seed three persisted entries by hand.
        for (i, key) in ["a", "b", "c"].iter().enumerate() {
            let entry = CacheEntry::new(json!(i), 60_000, i as i64);
            storage
                .write(&storage_key(key), &serde_json::to_string(&entry).unwrap())
                .unwrap();
        }

        let config = CacheConfig {
            max_dashboard_entries: 2,
            ..Default::default()
        };
        let cache =
            DashboardCache::with_parts(config, Some(Box::new(storage.clone())), Arc::new(clock));

        assert_eq!(cache.stats().size, 2);
        assert_eq!(storage.len(), 2);
    }
}
