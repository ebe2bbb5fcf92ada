//! The prediction cache.
//!
//! `PredictionCache` keeps short-lived analytical outputs keyed by
//! subject and horizon.  Freshness is decided at read time from the
//! stored `expires_at`: an expired entry is simply absent, whether or
//! not a sweep has physically removed it yet.  The cache never
//! computes predictions; callers populate it read-through style.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use fides_contracts::{
    cache::{CacheEntry, CacheKey},
    error::FidesResult,
    record::RecordFields,
};
use fides_ledger::AuditLedger;

use crate::store::{CacheStore, InMemoryCacheStore};

/// Running hit/miss counters, as observed at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Short-TTL cache for opaque prediction values.
pub struct PredictionCache {
    store: Arc<dyn CacheStore>,
    ledger: Arc<AuditLedger>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PredictionCache {
    pub fn new(store: Arc<dyn CacheStore>, ledger: Arc<AuditLedger>) -> Self {
        Self {
            store,
            ledger,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Convenience constructor over a fresh [`InMemoryCacheStore`].
    pub fn in_memory(ledger: Arc<AuditLedger>) -> Self {
        Self::new(Arc::new(InMemoryCacheStore::new()), ledger)
    }

    /// The cached value for `key`, or `None` when the key is unknown
    /// or its entry has expired.
    ///
    /// A value is never returned at or past its `expires_at`, however
    /// recently it was written.  Expired entries are left in place for
    /// [`PredictionCache::purge_expired`]; removal here would race a
    /// concurrent fresh write to the same key.
    pub fn get(&self, key: &CacheKey) -> FidesResult<Option<Value>> {
        let now = Utc::now();
        match self.store.get(key)? {
            Some(entry) if !entry.is_expired_at(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "prediction cache hit");
                Ok(Some(entry.value))
            }
            Some(_) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "prediction cache entry expired");
                Ok(None)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "prediction cache miss");
                Ok(None)
            }
        }
    }

    /// Store a freshly generated prediction under `key` with the given
    /// time-to-live, replacing any previous entry.
    ///
    /// The write is audited as `cache.populated` carrying the key and
    /// freshness window only; the prediction value itself never
    /// reaches the ledger.
    pub fn put(&self, key: &CacheKey, value: Value, ttl: Duration) -> FidesResult<CacheEntry> {
        let now = Utc::now();
        let entry = CacheEntry {
            key: key.clone(),
            value,
            generated_at: now,
            expires_at: now + ttl,
        };
        self.store.put(&entry)?;

        self.ledger.append(RecordFields {
            action_type: "cache.populated".to_string(),
            resource_type: "prediction_cache".to_string(),
            resource_id: key.to_string(),
            actor_id: None,
            payload: json!({
                "subject": key.subject,
                "horizon": key.horizon,
                "generated_at": entry.generated_at,
                "expires_at": entry.expires_at,
            }),
        })?;

        debug!(
            key = %key,
            ttl_ms = ttl.num_milliseconds(),
            "prediction cached"
        );
        Ok(entry)
    }

    /// Physically drop expired entries.  An optimization only: expiry
    /// is already enforced at read time.
    pub fn purge_expired(&self) -> FidesResult<usize> {
        let removed = self.store.purge_expired(Utc::now())?;
        if removed > 0 {
            debug!(removed, "purged expired cache entries");
        }
        Ok(removed)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
