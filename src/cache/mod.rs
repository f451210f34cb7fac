pub mod coalesce;

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;

use crate::error::Result;
use coalesce::KeyedCoalescer;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_CAPACITY: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

struct CacheEntry {
    value: Value,
    stored_at: Instant,
    last_access: Instant,
}

/// Get-or-compute cache for serialized dashboard payloads.
///
/// Entries expire `ttl` after being stored, checked on read. Beyond
/// `capacity` the least recently used entry is evicted. Concurrent misses for
/// the same key share a single computation.
pub struct CacheAside {
    config: CacheConfig,
    entries: Mutex<HashMap<String, CacheEntry>>,
    inflight: KeyedCoalescer,
}

impl CacheAside {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
            inflight: KeyedCoalescer::new(),
        }
    }

    /// Live value for `key`, refreshing its recency. Expired entries are
    /// dropped.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let expired = match entries.get_mut(key) {
            None => return None,
            Some(entry) if now.duration_since(entry.stored_at) >= self.config.ttl => true,
            Some(entry) => {
                entry.last_access = now;
                return Some(entry.value.clone());
            }
        };
        if expired {
            entries.remove(key);
        }
        None
    }

    /// Store `value` under `key`, evicting the least recently used entry when
    /// the cache is full.
    pub fn insert(&self, key: String, value: Value) {
        let now = Instant::now();
        let capacity = self.config.capacity.max(1);
        let mut entries = self.entries.lock();

        if !entries.contains_key(&key) && entries.len() >= capacity {
            if let Some(victim) = entries
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone())
            {
                log::debug!("cache full, evicting {victim}");
                entries.remove(&victim);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: now,
                last_access: now,
            },
        );
    }

    /// Return the cached value for `key`, or run `compute`, cache its result
    /// and return it. Errors from `compute` are returned and not cached.
    pub async fn get_or_compute<T, F, Fut>(&self, key: &str, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.get(key) {
            log::debug!("cache hit: {key}");
            return Ok(serde_json::from_value(value)?);
        }

        let _inflight = self.inflight.acquire(key).await;
        if let Some(value) = self.get(key) {
            log::debug!("cache hit after waiting on in-flight computation: {key}");
            return Ok(serde_json::from_value(value)?);
        }

        log::debug!("cache miss: {key}");
        let result = compute().await?;
        self.insert(key.to_string(), serde_json::to_value(&result)?);
        Ok(result)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
