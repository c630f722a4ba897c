//! Short-lived response cache.
//!
//! Keys combine the endpoint, its parameters and a fingerprint of the
//! subscription snapshot, so any change to the input set misses the cache.

use crate::error::AppError;
use dashmap::DashMap;
use super::source::SourceSnapshot;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};

struct CacheEntry {
    stored_at: Instant,
    value: serde_json::Value,
}

pub struct ForecastCache {
    ttl: Duration,
    entries: DashMap<String, CacheEntry>,
}

impl ForecastCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the cached value for `key`, or compute, store and return it.
    pub fn get_or_compute<T, F>(&self, endpoint: &str, key: &str, compute: F) -> Result<T, AppError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, AppError>,
    {
        if !self.is_enabled() {
            return compute();
        }

        if let Some(value) = self.lookup(key) {
            match serde_json::from_value(value) {
                Ok(cached) => {
                    super::metrics::record_cache_lookup(endpoint, true);
                    return Ok(cached);
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Discarding unreadable cache entry");
                    self.entries.remove(key);
                }
            }
        }
        super::metrics::record_cache_lookup(endpoint, false);

        let fresh = compute()?;
        let value = serde_json::to_value(&fresh)
            .map_err(|e| AppError::InternalError(anyhow::Error::new(e)))?;
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                stored_at: Instant::now(),
                value,
            },
        );
        self.evict_expired();
        Ok(fresh)
    }

    fn lookup(&self, key: &str) -> Option<serde_json::Value> {
        let entry = self.entries.get(key)?;
        if entry.stored_at.elapsed() < self.ttl {
            return Some(entry.value.clone());
        }
        drop(entry);
        self.entries.remove(key);
        None
    }

    fn evict_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
    }
}

fn digest<T: Serialize>(value: &T) -> [u8; 32] {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    Sha256::digest(&bytes).into()
}

/// Order-independent SHA-256 digest of a subscription snapshot, malformed
/// records included.
pub fn fingerprint(snapshot: &SourceSnapshot) -> String {
    let mut digests: Vec<[u8; 32]> = snapshot
        .records
        .iter()
        .map(digest)
        .chain(snapshot.malformed.iter().map(digest))
        .collect();
    digests.sort_unstable();

    let mut hasher = Sha256::new();
    for digest in &digests {
        hasher.update(digest);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn records(json: &str) -> SourceSnapshot {
        crate::services::source::read_records(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_second_lookup_is_cached() {
        let cache = ForecastCache::new(Duration::from_secs(60));
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Ok::<_, AppError>(vec![1u32, 2, 3])
        };

        let first = cache.get_or_compute("test", "k", compute).unwrap();
        let second = cache.get_or_compute("test", "k", compute).unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_ttl_disables_cache() {
        let cache = ForecastCache::new(Duration::ZERO);
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Ok::<_, AppError>(calls.get())
        };

        assert_eq!(cache.get_or_compute("test", "k", compute).unwrap(), 1);
        assert_eq!(cache.get_or_compute("test", "k", compute).unwrap(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache = ForecastCache::new(Duration::from_secs(60));
        let failed: Result<u32, AppError> =
            cache.get_or_compute("test", "k", || Err(AppError::BadRequest(anyhow::anyhow!("x"))));
        assert!(failed.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_fingerprint_ignores_order_but_not_amounts() {
        let a = r#"{"customer_id": "a", "status": "active", "current_period_start": "2025-01-01",
                    "items": [{"amount": "10", "interval": "month"}]}"#;
        let b = r#"{"customer_id": "b", "status": "active", "current_period_start": "2025-02-01",
                    "items": [{"amount": "20", "interval": "year"}]}"#;
        let b_changed = r#"{"customer_id": "b", "status": "active", "current_period_start": "2025-02-01",
                    "items": [{"amount": "25", "interval": "year"}]}"#;

        let forward = fingerprint(&records(&format!("[{a}, {b}]")));
        let reverse = fingerprint(&records(&format!("[{b}, {a}]")));
        let changed = fingerprint(&records(&format!("[{a}, {b_changed}]")));

        assert_eq!(forward, reverse);
        assert_ne!(forward, changed);
        assert_eq!(forward.len(), 64);
    }

    #[test]
    fn test_fingerprint_sees_malformed_records() {
        let a = r#"{"customer_id": "a", "status": "active", "current_period_start": "2025-01-01",
                    "items": [{"amount": "10", "interval": "month"}]}"#;
        let bad = r#"{"customer_id": "b", "status": "active", "current_period_start": "2025-01-01",
                      "items": [{"amount": "abc", "interval": "month"}]}"#;

        let clean = fingerprint(&records(&format!("[{a}]")));
        let with_bad = fingerprint(&records(&format!("[{a}, {bad}]")));
        assert_ne!(clean, with_bad);
    }
}
