//! The append-only audit ledger.
//!
//! `AuditLedger` layers two defenses against interleaved appends: an
//! internal mutex that serializes appends going through one ledger
//! handle, and the store's conditional insert, which protects the
//! chain when several handles (or processes) share one backing store.
//! A lost tip race is retried against the fresh tip up to
//! [`MAX_APPEND_RETRIES`] times before surfacing as
//! `FidesError::AppendContention`.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use fides_contracts::{
    error::{FidesError, FidesResult},
    record::{AuditRecord, Digest, RecordFields, RecordFilter, RecordId, VerificationOutcome},
};

use crate::chain::{record_digest, verify_records, VerifyMode};
use crate::store::{InMemoryLedgerStore, InsertOutcome, LedgerStore};

/// How many times an append rebuilds against a moved tip before
/// giving up with `AppendContention`.
pub const MAX_APPEND_RETRIES: u32 = 8;

/// A sealed snapshot of the whole ledger, suitable for handing to an
/// external auditor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerExport {
    /// Every record, in insertion order.
    pub records: Vec<AuditRecord>,
    pub exported_at: DateTime<Utc>,
    /// Digest of the last record, or the genesis sentinel when the
    /// ledger is empty.
    pub terminal_digest: Digest,
}

/// Append-only, hash-chained audit ledger.
///
/// Records are never updated or deleted.  Every write goes through
/// [`AuditLedger::append`], which owns digest computation; reads
/// (`verify`, `list`, `export`) never take the append lock and run
/// freely in parallel.
pub struct AuditLedger {
    store: Arc<dyn LedgerStore>,
    append_lock: Mutex<()>,
}

impl AuditLedger {
    /// Build a ledger over an existing store.  Several ledger handles
    /// may share one store; the conditional insert keeps them honest.
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            append_lock: Mutex::new(()),
        }
    }

    /// Convenience constructor over a fresh [`InMemoryLedgerStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryLedgerStore::new()))
    }

    /// Append one record, assigning identity, timestamp, sequence, and
    /// digests.
    ///
    /// The append is atomic: either the returned record is committed
    /// as the new chain tip, or the store is unchanged and the error
    /// is safe to retry.  The timestamp is clamped to the tail's so a
    /// wall-clock regression can never make ledger order disagree with
    /// timestamp order.
    pub fn append(&self, fields: RecordFields) -> FidesResult<AuditRecord> {
        let _guard = self
            .append_lock
            .lock()
            .map_err(|e| FidesError::StoreUnavailable {
                reason: format!("append lock poisoned: {}", e),
            })?;

        let mut tip = self.store.tip()?;

        for attempt in 1..=MAX_APPEND_RETRIES {
            let now = Utc::now();
            let timestamp = match tip.timestamp {
                Some(tail) if now < tail => tail,
                _ => now,
            };

            let digest = record_digest(&tip.digest, &fields, timestamp);
            let record = AuditRecord {
                id: RecordId::new(),
                sequence: tip.next_sequence,
                timestamp,
                action_type: fields.action_type.clone(),
                resource_type: fields.resource_type.clone(),
                resource_id: fields.resource_id.clone(),
                actor_id: fields.actor_id.clone(),
                payload: fields.payload.clone(),
                previous_digest: tip.digest.clone(),
                digest,
            };

            match self.store.insert_if_tip(&tip.digest, &record)? {
                InsertOutcome::Committed => {
                    debug!(
                        record_id = %record.id,
                        sequence = record.sequence,
                        action_type = %record.action_type,
                        resource_id = %record.resource_id,
                        "audit record appended"
                    );
                    return Ok(record);
                }
                InsertOutcome::TipMoved { current } => {
                    debug!(
                        attempt,
                        action_type = %fields.action_type,
                        "append lost the tip race, rebuilding against new tip"
                    );
                    tip = current;
                }
            }
        }

        warn!(
            attempts = MAX_APPEND_RETRIES,
            action_type = %fields.action_type,
            "append contention persisted, giving up"
        );
        Err(FidesError::AppendContention {
            attempts: MAX_APPEND_RETRIES,
        })
    }

    /// Walk the whole chain, recomputing every digest.
    ///
    /// Idempotent on an unmodified ledger: a chain that verified
    /// `Valid` keeps verifying `Valid` until something is appended or
    /// the store is tampered with.
    pub fn verify(&self) -> FidesResult<VerificationOutcome> {
        let records = self.store.scan()?;
        Ok(verify_records(
            &records,
            &Digest::genesis(),
            VerifyMode::Full,
        ))
    }

    /// Walk records with sequence numbers in `from..=to`.
    ///
    /// A range that starts past the genesis checks linkage against the
    /// stored digest of the record just before it.  Bounds outside the
    /// ledger yield `FidesError::NotFound`.
    pub fn verify_range(
        &self,
        from: u64,
        to: u64,
        mode: VerifyMode,
    ) -> FidesResult<VerificationOutcome> {
        let records = self.store.scan()?;

        if from > to || to as usize >= records.len() {
            return Err(FidesError::NotFound {
                what: format!("ledger range {}..={}", from, to),
            });
        }

        let expected_prev = if from == 0 {
            Digest::genesis()
        } else {
            records[from as usize - 1].digest.clone()
        };

        Ok(verify_records(
            &records[from as usize..=to as usize],
            &expected_prev,
            mode,
        ))
    }

    /// Records matching `filter`, in insertion order.  Read-only.
    pub fn list(&self, filter: &RecordFilter) -> FidesResult<Vec<AuditRecord>> {
        let mut records = self.store.scan()?;
        records.retain(|record| filter.matches(record));
        Ok(records)
    }

    /// Export a sealed snapshot of the full ledger.
    pub fn export(&self) -> FidesResult<LedgerExport> {
        let records = self.store.scan()?;
        let terminal_digest = records
            .last()
            .map(|record| record.digest.clone())
            .unwrap_or_else(Digest::genesis);

        Ok(LedgerExport {
            records,
            exported_at: Utc::now(),
            terminal_digest,
        })
    }

    /// Digest of the most recent record, or the genesis sentinel when
    /// empty.
    pub fn tip_digest(&self) -> FidesResult<Digest> {
        Ok(self.store.tip()?.digest)
    }

    /// Number of records appended so far.
    pub fn len(&self) -> FidesResult<u64> {
        Ok(self.store.tip()?.next_sequence)
    }

    pub fn is_empty(&self) -> FidesResult<bool> {
        Ok(self.store.tip()?.next_sequence == 0)
    }
}
