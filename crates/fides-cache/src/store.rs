//! Storage seam for cached predictions.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use fides_contracts::{
    cache::{CacheEntry, CacheKey},
    error::{FidesError, FidesResult},
};

/// Keyed storage for cache entries.
///
/// `put` is last-write-wins by generation time: a write carrying an
/// older `generated_at` than the stored entry is dropped, so a racing
/// stale prediction can never clobber a fresher one.
pub trait CacheStore: Send + Sync {
    /// The stored entry, expired or not.  Freshness is the cache
    /// layer's call, not the store's.
    fn get(&self, key: &CacheKey) -> FidesResult<Option<CacheEntry>>;

    /// Store `entry` unless the existing entry for the key is newer.
    fn put(&self, entry: &CacheEntry) -> FidesResult<()>;

    /// Drop the entry for `key`, if any.
    fn remove(&self, key: &CacheKey) -> FidesResult<()>;

    /// Physically drop every entry with `expires_at <= now`.  Returns
    /// how many were removed.
    fn purge_expired(&self, now: DateTime<Utc>) -> FidesResult<usize>;
}

/// Reference `CacheStore` backed by a `HashMap` behind a `Mutex`.
#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> FidesResult<std::sync::MutexGuard<'_, HashMap<CacheKey, CacheEntry>>> {
        self.entries.lock().map_err(|e| FidesError::StoreUnavailable {
            reason: format!("cache store lock poisoned: {}", e),
        })
    }
}

impl CacheStore for InMemoryCacheStore {
    fn get(&self, key: &CacheKey) -> FidesResult<Option<CacheEntry>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn put(&self, entry: &CacheEntry) -> FidesResult<()> {
        let mut entries = self.lock()?;
        if let Some(existing) = entries.get(&entry.key) {
            if existing.generated_at > entry.generated_at {
                return Ok(());
            }
        }
        entries.insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> FidesResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> FidesResult<usize> {
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        Ok(before - entries.len())
    }
}
