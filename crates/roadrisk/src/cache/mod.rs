//! Time-bounded memoization for external lookups.
//!
//! Entries expire on read: there is no background sweep and no size bound, so
//! `purge_expired` has to be called explicitly to reclaim space. Callers must treat
//! the cache as a pure optimization; writes may be lost without notice.

mod clock;
mod file;
mod memory;

pub use clock::{Clock, ManualClock, SystemClock};
pub use file::FileCache;
pub use memory::MemoryCache;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Stored payload together with its absolute expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Value,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Key/value store with per-entry TTL.
pub trait CacheStore: Send + Sync {
    /// Returns the payload when present and not yet expired.
    fn get(&self, key: &str) -> Option<Value>;
    /// Inserts or replaces the entry. Failures are logged, never returned.
    fn set(&self, key: &str, value: Value, ttl: Duration);
    /// Removes every expired entry and reports how many were dropped.
    fn purge_expired(&self) -> usize;
    /// Number of stored entries, expired ones included.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reads a typed value. A payload that no longer matches `T` counts as a miss.
pub fn load<T: DeserializeOwned>(cache: &dyn CacheStore, key: &str) -> Option<T> {
    let value = cache.get(key)?;
    match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warn!(%key, error = %err, "discarding cache entry with unexpected shape");
            None
        }
    }
}

pub fn store<T: Serialize>(cache: &dyn CacheStore, key: &str, value: &T, ttl: Duration) {
    match serde_json::to_value(value) {
        Ok(payload) => cache.set(key, payload, ttl),
        Err(err) => warn!(%key, error = %err, "cache payload could not be serialized"),
    }
}
