use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use drivefs_common::backend::CachePool;

struct CacheEntry {
    value: serde_json::Value,
    /// `None` when the TTL runs past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Process-local cache pool.
pub struct MemoryPool {
    entries: RwLock<HashMap<String, CacheEntry>>,
    deferred: Mutex<Vec<(String, serde_json::Value, Duration)>>,
}

impl MemoryPool {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            deferred: Mutex::new(Vec::new()),
        }
    }

    /// Evict expired entries.
    pub fn evict_expired(&self) {
        let now = Instant::now();
        self.entries.write().unwrap().retain(|_, e| e.is_live(now));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap()
            .get(key)
            .map(|e| e.is_live(Instant::now()))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, key: String, value: serde_json::Value, ttl: Duration) {
        self.entries.write().unwrap().insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now().checked_add(ttl),
            },
        );
    }
}

impl Default for MemoryPool {
    fn default() -> Self {
        Self::new()
    }
}

impl CachePool for MemoryPool {
    fn get(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        let entries = self.entries.read().unwrap();
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(Instant::now()))
            .map(|e| e.value.clone()))
    }

    fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> anyhow::Result<()> {
        self.insert(key.to_string(), value, ttl);
        Ok(())
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.entries.write().unwrap().remove(key);
        Ok(())
    }

    fn save_deferred(&self, key: &str, value: serde_json::Value, ttl: Duration) -> anyhow::Result<()> {
        self.deferred
            .lock()
            .unwrap()
            .push((key.to_string(), value, ttl));
        Ok(())
    }

    fn commit(&self) -> anyhow::Result<()> {
        let pending = std::mem::take(&mut *self.deferred.lock().unwrap());
        for (key, value, ttl) in pending {
            self.insert(key, value, ttl);
        }
        Ok(())
    }
}
