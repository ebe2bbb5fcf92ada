//! # fides-cache
//!
//! Short-TTL prediction cache for the fides trust core.
//!
//! ## Overview
//!
//! Dashboards ask for the same predictions over and over while the
//! underlying analytics are expensive, so fresh results are parked here
//! for seconds to minutes.  The cache stores opaque JSON values keyed by
//! subject and horizon, decides expiry at read time, prefers the newest
//! generation on conflicting writes, and audits every population so the
//! ledger shows when predictions were refreshed, without ever recording
//! the predictions themselves.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chrono::Duration;
//! use fides_cache::PredictionCache;
//! use fides_contracts::cache::CacheKey;
//!
//! let cache = PredictionCache::in_memory(ledger);
//! let key = CacheKey::new("tenant-7", "24h");
//!
//! if cache.get(&key)?.is_none() {
//!     let value = expensive_model_run();
//!     cache.put(&key, value, Duration::seconds(45))?;
//! }
//! ```

pub mod cache;
pub mod store;

pub use cache::{CacheStats, PredictionCache};
pub use store::{CacheStore, InMemoryCacheStore};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use serde_json::json;

    use fides_contracts::{
        cache::{CacheEntry, CacheKey},
        record::RecordFilter,
    };
    use fides_ledger::AuditLedger;

    use super::{CacheStore, InMemoryCacheStore, PredictionCache};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn make_cache() -> (PredictionCache, Arc<InMemoryCacheStore>, Arc<AuditLedger>) {
        let store = Arc::new(InMemoryCacheStore::new());
        let ledger = Arc::new(AuditLedger::in_memory());
        let cache = PredictionCache::new(store.clone(), Arc::clone(&ledger));
        (cache, store, ledger)
    }

    fn sleep_ms(ms: u64) {
        std::thread::sleep(std::time::Duration::from_millis(ms));
    }

    // ── Freshness ─────────────────────────────────────────────────────────────

    /// A value read back within its TTL is exactly the value written.
    #[test]
    fn test_fresh_entry_round_trips() {
        let (cache, _store, _ledger) = make_cache();
        let key = CacheKey::new("tenant-7", "24h");
        let value = json!({ "load": 0.82, "confidence": 0.9 });

        cache.put(&key, value.clone(), Duration::seconds(60)).unwrap();
        assert_eq!(cache.get(&key).unwrap(), Some(value));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
    }

    /// Once the TTL elapses the entry is absent, and reads never
    /// resurrect it.
    #[test]
    fn test_expired_entry_is_absent() {
        let (cache, _store, _ledger) = make_cache();
        let key = CacheKey::new("tenant-7", "24h");

        cache
            .put(&key, json!({ "load": 0.82 }), Duration::milliseconds(20))
            .unwrap();
        sleep_ms(50);

        assert_eq!(cache.get(&key).unwrap(), None);
        assert_eq!(cache.get(&key).unwrap(), None);
        assert_eq!(cache.stats().misses, 2);
    }

    /// A zero TTL means the entry was never alive to read.
    #[test]
    fn test_zero_ttl_never_readable() {
        let (cache, _store, _ledger) = make_cache();
        let key = CacheKey::new("tenant-7", "1h");

        cache.put(&key, json!({ "load": 0.5 }), Duration::zero()).unwrap();
        assert_eq!(cache.get(&key).unwrap(), None);
    }

    /// Expired reads do not remove the entry; only the sweep does.
    #[test]
    fn test_read_does_not_evict() {
        let (cache, store, _ledger) = make_cache();
        let key = CacheKey::new("tenant-7", "24h");

        cache
            .put(&key, json!({ "load": 0.82 }), Duration::milliseconds(20))
            .unwrap();
        sleep_ms(50);

        assert_eq!(cache.get(&key).unwrap(), None);
        assert!(
            store.get(&key).unwrap().is_some(),
            "expired entry stays in the store until purged"
        );

        assert_eq!(cache.purge_expired().unwrap(), 1);
        assert!(store.get(&key).unwrap().is_none());
    }

    // ── Overwrites ────────────────────────────────────────────────────────────

    /// A newer put replaces the previous value for the same key.
    #[test]
    fn test_put_overwrites_same_key() {
        let (cache, _store, _ledger) = make_cache();
        let key = CacheKey::new("tenant-7", "24h");

        cache.put(&key, json!({ "rev": 1 }), Duration::seconds(60)).unwrap();
        cache.put(&key, json!({ "rev": 2 }), Duration::seconds(60)).unwrap();

        assert_eq!(cache.get(&key).unwrap(), Some(json!({ "rev": 2 })));
    }

    /// A write carrying an older generation never clobbers a newer
    /// stored entry.
    #[test]
    fn test_stale_generation_loses_to_newer_entry() {
        let (cache, store, _ledger) = make_cache();
        let key = CacheKey::new("tenant-7", "24h");

        // Seed an entry generated ahead of the cache's clock, as if a
        // racing writer had just finished with fresher data.
        let now = Utc::now();
        store
            .put(&CacheEntry {
                key: key.clone(),
                value: json!({ "rev": "newer" }),
                generated_at: now + Duration::seconds(30),
                expires_at: now + Duration::seconds(90),
            })
            .unwrap();

        cache.put(&key, json!({ "rev": "older" }), Duration::seconds(60)).unwrap();

        assert_eq!(cache.get(&key).unwrap(), Some(json!({ "rev": "newer" })));
    }

    /// Different horizons for the same subject are independent entries.
    #[test]
    fn test_keys_are_subject_and_horizon() {
        let (cache, _store, _ledger) = make_cache();
        let day = CacheKey::new("tenant-7", "24h");
        let week = CacheKey::new("tenant-7", "7d");

        cache.put(&day, json!({ "h": "24h" }), Duration::seconds(60)).unwrap();
        cache.put(&week, json!({ "h": "7d" }), Duration::seconds(60)).unwrap();

        assert_eq!(cache.get(&day).unwrap(), Some(json!({ "h": "24h" })));
        assert_eq!(cache.get(&week).unwrap(), Some(json!({ "h": "7d" })));
    }

    // ── Sweeping ──────────────────────────────────────────────────────────────

    /// The sweep removes exactly the expired entries.
    #[test]
    fn test_purge_removes_only_expired() {
        let (cache, _store, _ledger) = make_cache();
        let stale = CacheKey::new("tenant-7", "24h");
        let live = CacheKey::new("tenant-8", "24h");

        cache
            .put(&stale, json!({ "load": 0.1 }), Duration::milliseconds(20))
            .unwrap();
        cache.put(&live, json!({ "load": 0.9 }), Duration::seconds(60)).unwrap();
        sleep_ms(50);

        assert_eq!(cache.purge_expired().unwrap(), 1);
        assert_eq!(cache.get(&live).unwrap(), Some(json!({ "load": 0.9 })));
        assert_eq!(cache.purge_expired().unwrap(), 0);
    }

    // ── Auditing ──────────────────────────────────────────────────────────────

    /// Every population is audited with the key and freshness window,
    /// never the cached value.
    #[test]
    fn test_put_audits_key_but_not_value() {
        let (cache, _store, ledger) = make_cache();
        let key = CacheKey::new("tenant-7", "24h");

        cache
            .put(&key, json!({ "secret_forecast": "SENTINEL-VALUE" }), Duration::seconds(60))
            .unwrap();

        let records = ledger
            .list(&RecordFilter {
                action_type: Some("cache.populated".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.resource_type, "prediction_cache");
        assert_eq!(record.resource_id, "tenant-7@24h");
        assert_eq!(record.payload["subject"], "tenant-7");
        assert_eq!(record.payload["horizon"], "24h");
        assert!(record.payload.get("generated_at").is_some());

        let serialized = serde_json::to_string(&record.payload).unwrap();
        assert!(
            !serialized.contains("SENTINEL-VALUE"),
            "cached values must never reach the ledger"
        );
        assert!(ledger.verify().unwrap().is_valid());
    }

    /// Hit and miss counters track reads, not writes.
    #[test]
    fn test_stats_track_reads() {
        let (cache, _store, _ledger) = make_cache();
        let key = CacheKey::new("tenant-7", "24h");

        assert_eq!(cache.get(&key).unwrap(), None);
        cache.put(&key, json!({ "load": 0.82 }), Duration::seconds(60)).unwrap();
        assert!(cache.get(&key).unwrap().is_some());
        assert!(cache.get(&key).unwrap().is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }
}
