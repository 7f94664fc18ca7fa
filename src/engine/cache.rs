// =============================================================================
// Engine Cache — per-runtime TTL cache
// =============================================================================
//
// Entries are invalidated lazily: a read after `now - stored_at > ttl`
// removes the entry and reports a miss. Reads never refresh the TTL.
// Each runtime owns exactly one cache; caches are never shared across
// engines.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{trace, warn};

struct CacheEntry {
    data: Value,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) > self.ttl
    }
}

pub struct EngineCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

impl EngineCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Store `data` under `key`. `ttl` defaults to the configured cache TTL.
    pub fn set(&self, key: impl Into<String>, data: Value, ttl: Option<Duration>) {
        let key = key.into();
        let ttl = ttl.unwrap_or(self.default_ttl);
        trace!(key = %key, ttl_ms = ttl.as_millis() as u64, "cache set");
        self.entries.lock().insert(
            key,
            CacheEntry {
                data,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Fetch `key`, evicting it if it has outlived its TTL.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock();
        let expired = entries.get(key)?.is_expired(Instant::now());
        if expired {
            entries.remove(key);
            trace!(key, "cache entry expired");
            return None;
        }
        entries.get(key).map(|e| e.data.clone())
    }

    /// Typed variant of [`set`](Self::set).
    pub fn set_as<T: Serialize>(&self, key: impl Into<String>, data: &T, ttl: Option<Duration>) {
        match serde_json::to_value(data) {
            Ok(value) => self.set(key, value, ttl),
            Err(e) => warn!(error = %e, "cache value not serialisable, skipping"),
        }
    }

    /// Typed variant of [`get`](Self::get). A value that no longer decodes
    /// as `T` counts as a miss.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl std::fmt::Debug for EngineCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineCache")
            .field("entries", &self.len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}
