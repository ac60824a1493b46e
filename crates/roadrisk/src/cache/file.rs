use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Duration;
use serde_json::Value;
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::{CacheEntry, CacheStore};

/// One JSON document per key under `dir`. There is no locking across processes;
/// a torn or unreadable file is a miss.
#[derive(Clone)]
pub struct FileCache {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_clock(dir, Arc::new(SystemClock))
    }

    pub fn with_clock(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        let dir = dir.into();
        if let Err(err) = fs::create_dir_all(&dir) {
            warn!(dir = %dir.display(), error = %err, "could not create cache directory");
        }
        Self { dir, clock }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file_name}.json"))
    }

    fn read_entry(path: &Path) -> Option<CacheEntry> {
        let raw = fs::read(path).ok()?;
        match serde_json::from_slice(&raw) {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!(path = %path.display(), error = %err, "unreadable cache file");
                None
            }
        }
    }

    fn entry_paths(&self) -> Vec<PathBuf> {
        match fs::read_dir(&self.dir) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl std::fmt::Debug for FileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCache")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl CacheStore for FileCache {
    fn get(&self, key: &str) -> Option<Value> {
        let entry = Self::read_entry(&self.path_for(key))?;
        if entry.key != key || !entry.is_live(self.clock.now()) {
            return None;
        }
        Some(entry.payload)
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) {
        let entry = CacheEntry {
            key: key.to_string(),
            payload: value,
            expires_at: self.clock.now() + ttl,
        };
        let path = self.path_for(key);
        let result = serde_json::to_vec(&entry)
            .map_err(std::io::Error::from)
            .and_then(|bytes| fs::write(&path, bytes));
        if let Err(err) = result {
            warn!(path = %path.display(), error = %err, "cache save failed");
        }
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        for path in self.entry_paths() {
            let expired = Self::read_entry(&path).map_or(true, |entry| !entry.is_live(now));
            if expired && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        removed
    }

    fn len(&self) -> usize {
        self.entry_paths().len()
    }
}
