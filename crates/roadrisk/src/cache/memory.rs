use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Duration;
use serde_json::Value;

use super::clock::{Clock, SystemClock};
use super::{CacheEntry, CacheStore};

/// Process-local cache. Concurrent misses on the same key may both fetch; the
/// later `set` wins.
#[derive(Clone)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let now = self.clock.now();
        let guard = self.entries.lock().expect("cache mutex poisoned");
        guard
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.payload.clone())
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) {
        let entry = CacheEntry {
            key: key.to_string(),
            payload: value,
            expires_at: self.clock.now() + ttl,
        };
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .insert(key.to_string(), entry);
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut guard = self.entries.lock().expect("cache mutex poisoned");
        let before = guard.len();
        guard.retain(|_, entry| entry.is_live(now));
        before - guard.len()
    }

    fn len(&self) -> usize {
        self.entries.lock().expect("cache mutex poisoned").len()
    }
}
