//! TTL-keyed entry store underlying the dashboard cache
//!
//! A `TtlStore` is a plain string-keyed map of [`CacheEntry`] values with
//! expiry-on-read semantics and an optional capacity bound. Eviction order is
//! insertion-timestamp only: `access_count` and `last_accessed` are kept for
//! reporting and never influence which key gets evicted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A cached payload plus the bookkeeping needed for expiry and metrics.
///
/// The serialized form is the durable record format, so field names follow
/// the storage convention (`accessCount`, `lastAccessed`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    /// Cached payload.
    pub data: T,
    /// Creation/refresh time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Validity duration in milliseconds.
    pub ttl: i64,
    /// Reads served from this entry.
    pub access_count: u64,
    /// Last read time, milliseconds since the Unix epoch.
    pub last_accessed: i64,
}

impl<T> CacheEntry<T> {
    /// Create a fresh entry stamped at `now`.
    pub fn new(data: T, ttl: i64, now: i64) -> Self {
        Self {
            data,
            timestamp: now,
            ttl,
            access_count: 0,
            last_accessed: now,
        }
    }

    /// Whether the entry has outlived its TTL at `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        now - self.timestamp > self.ttl
    }

    fn mark_accessed(&mut self, now: i64) {
        self.access_count += 1;
        self.last_accessed = now;
    }
}

/// String-keyed TTL store with an optional capacity bound.
#[derive(Debug)]
pub struct TtlStore<T> {
    entries: HashMap<String, CacheEntry<T>>,
    max_entries: Option<usize>,
}

impl<T> Default for TtlStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TtlStore<T> {
    /// Unbounded store.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            max_entries: None,
        }
    }

    /// Store holding at most `max_entries` entries at a time.
    pub fn bounded(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries: Some(max_entries),
        }
    }

    /// Insert `data` under `key`, overwriting any existing entry with a fresh
    /// one (`timestamp = now`, zeroed access statistics).
    ///
    /// When the store is bounded, `key` is new, and the store is full, the
    /// entry with the smallest `timestamp` is evicted first; the evicted key
    /// is returned so the caller can drop any durable copy.
    pub fn insert(&mut self, key: &str, data: T, ttl: i64, now: i64) -> Option<String> {
        self.insert_entry(key, CacheEntry::new(data, ttl, now))
    }

    /// Insert a fully-formed entry, used when hydrating from durable storage.
    /// Same overwrite and eviction behavior as [`TtlStore::insert`].
    pub fn insert_entry(&mut self, key: &str, entry: CacheEntry<T>) -> Option<String> {
        let evicted = if self.entries.contains_key(key) {
            None
        } else {
            self.evict_for_capacity()
        };
        self.entries.insert(key.to_string(), entry);
        evicted
    }

    fn evict_for_capacity(&mut self) -> Option<String> {
        let max = self.max_entries?;
        if self.entries.len() < max {
            return None;
        }
        // Oldest insertion timestamp goes first; ties are broken arbitrarily.
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.timestamp)
            .map(|(key, _)| key.clone())?;
        self.entries.remove(&oldest);
        Some(oldest)
    }

    /// Look up `key` at `now`.
    ///
    /// Absent or expired entries yield `None`; an expired entry is removed as
    /// it is observed, so stale data is never returned. A hit bumps the
    /// entry's access statistics.
    pub fn get(&mut self, key: &str, now: i64) -> Option<&T> {
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            self.entries.remove(key);
            return None;
        }
        let entry = self.entries.get_mut(key)?;
        entry.mark_accessed(now);
        Some(&entry.data)
    }

    /// Peek at the raw entry without touching access statistics.
    pub fn entry(&self, key: &str) -> Option<&CacheEntry<T>> {
        self.entries.get(key)
    }

    /// Whether `key` is resident, expired or not.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove `key`, returning its entry if it was resident.
    pub fn remove(&mut self, key: &str) -> Option<CacheEntry<T>> {
        self.entries.remove(key)
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of resident entries, including any that have expired but not
    /// yet been observed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry whose TTL has elapsed at `now`, returning the
    /// removed keys.
    pub fn sweep_expired(&mut self, now: i64) -> Vec<String> {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.entries.remove(key);
        }
        expired
    }

    /// Insertion timestamp of the oldest resident entry.
    pub fn oldest_timestamp(&self) -> Option<i64> {
        self.entries.values().map(|entry| entry.timestamp).min()
    }

    /// Insertion timestamp of the newest resident entry.
    pub fn newest_timestamp(&self) -> Option<i64> {
        self.entries.values().map(|entry| entry.timestamp).max()
    }

    /// Iterate over resident entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CacheEntry<T>)> {
        self.entries.iter().map(|(key, entry)| (key.as_str(), entry))
    }
}
