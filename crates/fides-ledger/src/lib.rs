//! # fides-ledger
//!
//! Immutable, append-only, SHA-256 hash-chained audit ledger for the fides
//! trust core.
//!
//! ## Overview
//!
//! Every consequential action in the platform is recorded as an
//! `AuditRecord` whose digest commits to the previous record's digest.
//! Tampering with any stored record, even a single byte of its payload,
//! breaks the chain and is reported by `verify()` as `BrokenAt` naming the
//! first bad record.  Appends are safe under arbitrary concurrency: an
//! internal mutex serializes writers on one handle and the store's
//! conditional insert arbitrates between handles, so two appends can never
//! both chain to the same tip.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fides_ledger::AuditLedger;
//! use fides_contracts::record::{RecordFields, RecordFilter};
//!
//! let ledger = AuditLedger::in_memory();
//! let record = ledger.append(RecordFields {
//!     action_type: "workflow.started".to_string(),
//!     resource_type: "workflow_run".to_string(),
//!     resource_id: run_id.to_string(),
//!     actor_id: Some("svc-orchestrator".to_string()),
//!     payload: serde_json::json!({ "workflow_id": "daily-forecast" }),
//! })?;
//!
//! assert!(ledger.verify()?.is_valid());
//! let trail = ledger.list(&RecordFilter::default())?;
//! ```

pub mod chain;
pub mod ledger;
pub mod store;

pub use chain::{record_digest, recompute, verify_records, VerifyMode};
pub use ledger::{AuditLedger, LedgerExport, MAX_APPEND_RETRIES};
pub use store::{ChainTip, InMemoryLedgerStore, InsertOutcome, LedgerStore};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use serde_json::json;

    use fides_contracts::{
        error::{FidesError, FidesResult},
        record::{
            AuditRecord, Digest, RecordFields, RecordFilter, RecordId, VerificationOutcome,
        },
    };

    use super::{
        record_digest, verify_records, AuditLedger, ChainTip, InMemoryLedgerStore,
        InsertOutcome, LedgerStore, VerifyMode, MAX_APPEND_RETRIES,
    };

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// Build record fields with a distinguishable action and payload.
    fn make_fields(action_type: &str, resource_id: &str, note: &str) -> RecordFields {
        RecordFields {
            action_type: action_type.to_string(),
            resource_type: "workflow_run".to_string(),
            resource_id: resource_id.to_string(),
            actor_id: Some("svc-orchestrator".to_string()),
            payload: json!({ "note": note }),
        }
    }

    /// A store on which every insert loses the tip race.
    struct ContentiousStore;

    impl LedgerStore for ContentiousStore {
        fn tip(&self) -> FidesResult<ChainTip> {
            Ok(ChainTip::genesis())
        }

        fn insert_if_tip(
            &self,
            _expected: &Digest,
            _record: &AuditRecord,
        ) -> FidesResult<InsertOutcome> {
            Ok(InsertOutcome::TipMoved {
                current: ChainTip::genesis(),
            })
        }

        fn scan(&self) -> FidesResult<Vec<AuditRecord>> {
            Ok(Vec::new())
        }
    }

    /// A store whose first insert fails with an outage, then recovers.
    struct FailOnceStore {
        inner: InMemoryLedgerStore,
        failed: AtomicBool,
    }

    impl FailOnceStore {
        fn new() -> Self {
            Self {
                inner: InMemoryLedgerStore::new(),
                failed: AtomicBool::new(false),
            }
        }
    }

    impl LedgerStore for FailOnceStore {
        fn tip(&self) -> FidesResult<ChainTip> {
            self.inner.tip()
        }

        fn insert_if_tip(
            &self,
            expected: &Digest,
            record: &AuditRecord,
        ) -> FidesResult<InsertOutcome> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(FidesError::StoreUnavailable {
                    reason: "simulated outage".to_string(),
                });
            }
            self.inner.insert_if_tip(expected, record)
        }

        fn scan(&self) -> FidesResult<Vec<AuditRecord>> {
            self.inner.scan()
        }
    }

    /// A store whose first insert reports a lost race, then behaves.
    struct LoseRaceOnceStore {
        inner: InMemoryLedgerStore,
        raced: AtomicBool,
    }

    impl LoseRaceOnceStore {
        fn new() -> Self {
            Self {
                inner: InMemoryLedgerStore::new(),
                raced: AtomicBool::new(false),
            }
        }
    }

    impl LedgerStore for LoseRaceOnceStore {
        fn tip(&self) -> FidesResult<ChainTip> {
            self.inner.tip()
        }

        fn insert_if_tip(
            &self,
            expected: &Digest,
            record: &AuditRecord,
        ) -> FidesResult<InsertOutcome> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                return Ok(InsertOutcome::TipMoved {
                    current: self.inner.tip()?,
                });
            }
            self.inner.insert_if_tip(expected, record)
        }

        fn scan(&self) -> FidesResult<Vec<AuditRecord>> {
            self.inner.scan()
        }
    }

    // ── Chain integrity ───────────────────────────────────────────────────────

    /// Appending three records produces a chain that verifies valid.
    #[test]
    fn test_chain_integrity_after_appends() {
        let ledger = AuditLedger::in_memory();
        ledger.append(make_fields("workflow.started", "run-1", "a")).unwrap();
        ledger.append(make_fields("workflow.completed", "run-1", "b")).unwrap();
        ledger.append(make_fields("cache.populated", "tenant-7@24h", "c")).unwrap();

        assert!(
            ledger.verify().unwrap().is_valid(),
            "chain must be valid after sequential appends"
        );
        // Verification is read-only; a second pass agrees with the first.
        assert_eq!(ledger.verify().unwrap(), VerificationOutcome::Valid);
    }

    /// Each record's previous_digest equals its predecessor's digest,
    /// starting from the genesis sentinel.
    #[test]
    fn test_records_link_pairwise() {
        let ledger = AuditLedger::in_memory();
        for i in 0..4 {
            ledger
                .append(make_fields("workflow.started", "run-1", &format!("{}", i)))
                .unwrap();
        }

        let records = ledger.list(&RecordFilter::default()).unwrap();
        assert!(records[0].previous_digest.is_genesis());
        for pair in records.windows(2) {
            assert_eq!(
                pair[1].previous_digest, pair[0].digest,
                "each record must link to its predecessor"
            );
        }
    }

    /// Mutating a stored payload breaks full verification at exactly
    /// that record.
    #[test]
    fn test_tamper_detection_names_first_bad_record() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let ledger = AuditLedger::new(store.clone());
        ledger.append(make_fields("workflow.started", "run-1", "a")).unwrap();
        ledger.append(make_fields("workflow.completed", "run-1", "b")).unwrap();
        ledger.append(make_fields("cache.populated", "tenant-7@24h", "c")).unwrap();

        // Mutate the middle record's payload directly in the store.
        let tampered_id = {
            let mut records = store.records.lock().unwrap();
            records[1].payload = json!({ "note": "TAMPERED" });
            records[1].id
        };

        match ledger.verify().unwrap() {
            VerificationOutcome::BrokenAt { record_id } => {
                assert_eq!(record_id, tampered_id)
            }
            other => panic!("tampered chain verified as {:?}", other),
        }
        // Re-verifying reports the same break; nothing is auto-repaired.
        assert_eq!(
            ledger.verify().unwrap(),
            VerificationOutcome::BrokenAt { record_id: tampered_id }
        );
    }

    /// A broken chain converts into `ChainIntegrity` via `ensure_valid`.
    #[test]
    fn test_broken_chain_surfaces_as_chain_integrity_error() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let ledger = AuditLedger::new(store.clone());
        ledger.append(make_fields("workflow.started", "run-1", "a")).unwrap();

        {
            let mut records = store.records.lock().unwrap();
            records[0].payload = json!({ "note": "TAMPERED" });
        }

        let err = ledger.verify().unwrap().ensure_valid().unwrap_err();
        assert!(matches!(err, FidesError::ChainIntegrity { .. }));
    }

    /// Links mode only follows stored digests: it misses an in-place
    /// payload edit but catches a relinked digest.
    #[test]
    fn test_links_mode_checks_linkage_only() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let ledger = AuditLedger::new(store.clone());
        ledger.append(make_fields("workflow.started", "run-1", "a")).unwrap();
        ledger.append(make_fields("workflow.completed", "run-1", "b")).unwrap();
        ledger.append(make_fields("cache.populated", "tenant-7@24h", "c")).unwrap();

        // An in-place payload edit leaves every stored digest untouched.
        {
            let mut records = store.records.lock().unwrap();
            records[1].payload = json!({ "note": "TAMPERED" });
        }
        assert!(ledger.verify_range(0, 2, VerifyMode::Links).unwrap().is_valid());
        assert!(!ledger.verify().unwrap().is_valid(), "full mode must still catch it");

        // Rewriting a digest breaks linkage at the successor.
        let successor_id = {
            let mut records = store.records.lock().unwrap();
            records[1].digest = Digest("ff".repeat(32));
            records[2].id
        };
        match ledger.verify_range(0, 2, VerifyMode::Links).unwrap() {
            VerificationOutcome::BrokenAt { record_id } => {
                assert_eq!(record_id, successor_id)
            }
            other => panic!("relinked chain verified as {:?}", other),
        }
    }

    /// The first record links to the genesis sentinel.
    #[test]
    fn test_genesis_link() {
        let ledger = AuditLedger::in_memory();
        let record = ledger.append(make_fields("workflow.started", "run-1", "a")).unwrap();

        assert_eq!(record.sequence, 0);
        assert!(record.previous_digest.is_genesis());
        assert_eq!(record.digest.as_str().len(), 64);
    }

    /// Sequence numbers are 0, 1, 2, … with no gaps.
    #[test]
    fn test_sequence_monotonic() {
        let ledger = AuditLedger::in_memory();
        for i in 0..5 {
            ledger
                .append(make_fields("workflow.started", "run-1", &format!("{}", i)))
                .unwrap();
        }

        let records = ledger.list(&RecordFilter::default()).unwrap();
        for (idx, record) in records.iter().enumerate() {
            assert_eq!(record.sequence, idx as u64);
        }
        assert_eq!(ledger.len().unwrap(), 5);
    }

    /// An empty ledger is valid, empty, and reports the genesis tip.
    #[test]
    fn test_empty_ledger() {
        let ledger = AuditLedger::in_memory();

        assert!(ledger.verify().unwrap().is_valid());
        assert!(ledger.is_empty().unwrap());
        assert_eq!(ledger.len().unwrap(), 0);
        assert!(ledger.tip_digest().unwrap().is_genesis());
    }

    // ── Export and listing ────────────────────────────────────────────────────

    /// `export()` seals every record plus the terminal digest, and the
    /// exported slice passes standalone verification.
    #[test]
    fn test_export_is_verifiable_standalone() {
        let ledger = AuditLedger::in_memory();
        ledger.append(make_fields("workflow.started", "run-1", "a")).unwrap();
        ledger.append(make_fields("workflow.completed", "run-1", "b")).unwrap();

        let export = ledger.export().unwrap();
        assert_eq!(export.records.len(), 2);
        assert_eq!(export.terminal_digest, export.records.last().unwrap().digest);
        assert!(
            verify_records(&export.records, &Digest::genesis(), VerifyMode::Full).is_valid()
        );

        // Empty export falls back to the genesis sentinel.
        let empty = AuditLedger::in_memory().export().unwrap();
        assert!(empty.records.is_empty());
        assert!(empty.terminal_digest.is_genesis());
    }

    /// `list` applies the filter without disturbing insertion order.
    #[test]
    fn test_list_filters_by_action_and_actor() {
        let ledger = AuditLedger::in_memory();
        ledger.append(make_fields("workflow.started", "run-1", "a")).unwrap();
        ledger
            .append(RecordFields {
                actor_id: None,
                ..make_fields("cache.populated", "tenant-7@24h", "b")
            })
            .unwrap();
        ledger.append(make_fields("workflow.failed", "run-1", "c")).unwrap();

        let by_action = ledger
            .list(&RecordFilter {
                action_type: Some("cache.populated".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_action.len(), 1);
        assert_eq!(by_action[0].resource_id, "tenant-7@24h");

        let by_actor = ledger
            .list(&RecordFilter {
                actor_id: Some("svc-orchestrator".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_actor.len(), 2);
        assert!(by_actor[0].sequence < by_actor[1].sequence);
    }

    /// `verify_range` walks a middle slice against the stored digest
    /// just before it, and rejects out-of-bounds ranges.
    #[test]
    fn test_verify_range_bounds() {
        let ledger = AuditLedger::in_memory();
        for i in 0..4 {
            ledger
                .append(make_fields("workflow.started", "run-1", &format!("{}", i)))
                .unwrap();
        }

        assert!(ledger.verify_range(1, 2, VerifyMode::Full).unwrap().is_valid());
        assert!(ledger.verify_range(0, 3, VerifyMode::Links).unwrap().is_valid());

        let err = ledger.verify_range(2, 9, VerifyMode::Full).unwrap_err();
        assert!(matches!(err, FidesError::NotFound { .. }));
        let err = ledger.verify_range(3, 1, VerifyMode::Full).unwrap_err();
        assert!(matches!(err, FidesError::NotFound { .. }));
    }

    // ── Append under contention and failure ───────────────────────────────────

    /// When every attempt loses the tip race, append gives up with
    /// `AppendContention` after the retry budget.
    #[test]
    fn test_append_contention_exhausts_retries() {
        let ledger = AuditLedger::new(Arc::new(ContentiousStore));

        let err = ledger
            .append(make_fields("workflow.started", "run-1", "a"))
            .unwrap_err();
        match err {
            FidesError::AppendContention { attempts } => {
                assert_eq!(attempts, MAX_APPEND_RETRIES)
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    /// A single lost race is absorbed by the retry loop.
    #[test]
    fn test_append_retries_after_lost_race() {
        let store = Arc::new(LoseRaceOnceStore::new());
        let ledger = AuditLedger::new(store);

        let record = ledger
            .append(make_fields("workflow.started", "run-1", "a"))
            .unwrap();
        assert_eq!(record.sequence, 0);
        assert_eq!(ledger.len().unwrap(), 1);
        assert!(ledger.verify().unwrap().is_valid());
    }

    /// A store outage fails the append atomically: nothing is written,
    /// and the same append succeeds once the store recovers.
    #[test]
    fn test_failed_append_leaves_no_partial_record() {
        let store = Arc::new(FailOnceStore::new());
        let ledger = AuditLedger::new(store);

        let err = ledger
            .append(make_fields("workflow.started", "run-1", "a"))
            .unwrap_err();
        assert!(matches!(err, FidesError::StoreUnavailable { .. }));
        assert!(ledger.is_empty().unwrap(), "failed append must write nothing");

        let record = ledger
            .append(make_fields("workflow.started", "run-1", "a"))
            .unwrap();
        assert_eq!(record.sequence, 0);
        assert!(ledger.verify().unwrap().is_valid());
    }

    /// Two appends racing on an empty ledger both commit, one chained
    /// to the other.
    #[test]
    fn test_concurrent_pair_on_empty_ledger() {
        let ledger = Arc::new(AuditLedger::in_memory());

        let handles: Vec<_> = (0..2)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    ledger
                        .append(make_fields("workflow.started", &format!("run-{}", i), "x"))
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let records = ledger.list(&RecordFilter::default()).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].previous_digest.is_genesis());
        assert_eq!(records[1].previous_digest, records[0].digest);
        assert!(ledger.verify().unwrap().is_valid());
    }

    /// Heavier interleaving: many threads, one shared ledger, and the
    /// chain still verifies with every record accounted for.
    #[test]
    fn test_concurrent_appends_keep_chain_valid() {
        let ledger = Arc::new(AuditLedger::in_memory());
        let threads: u64 = 8;
        let per_thread: u64 = 5;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for i in 0..per_thread {
                        ledger
                            .append(make_fields(
                                "workflow.started",
                                &format!("run-{}-{}", t, i),
                                "x",
                            ))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.len().unwrap(), threads * per_thread);
        assert!(ledger.verify().unwrap().is_valid());

        let records = ledger.list(&RecordFilter::default()).unwrap();
        let genesis_links = records
            .iter()
            .filter(|r| r.previous_digest.is_genesis())
            .count();
        assert_eq!(genesis_links, 1, "exactly one record may claim the genesis link");
    }

    // ── Timestamps ────────────────────────────────────────────────────────────

    /// A wall-clock regression cannot produce a record stamped before
    /// its predecessor: the append clamps to the tail's timestamp.
    #[test]
    fn test_timestamp_clamped_to_tail_on_clock_regression() {
        let store = Arc::new(InMemoryLedgerStore::new());

        // Seed a record stamped in the future, as if the clock had
        // jumped back since it was written.
        let future = Utc::now() + Duration::seconds(120);
        let fields = make_fields("workflow.started", "run-1", "a");
        let digest = record_digest(&Digest::genesis(), &fields, future);
        let seeded = AuditRecord {
            id: RecordId::new(),
            sequence: 0,
            timestamp: future,
            action_type: fields.action_type.clone(),
            resource_type: fields.resource_type.clone(),
            resource_id: fields.resource_id.clone(),
            actor_id: fields.actor_id.clone(),
            payload: fields.payload.clone(),
            previous_digest: Digest::genesis(),
            digest,
        };
        store.insert_if_tip(&Digest::genesis(), &seeded).unwrap();

        let ledger = AuditLedger::new(store);
        let appended = ledger
            .append(make_fields("workflow.completed", "run-1", "b"))
            .unwrap();

        assert!(
            appended.timestamp >= future,
            "append must not stamp earlier than the tail"
        );
        assert!(ledger.verify().unwrap().is_valid());

        let records = ledger.list(&RecordFilter::default()).unwrap();
        assert!(records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }
}
