//! Storage seam for the audit ledger.
//!
//! `LedgerStore` is the trait a persistent backend implements.  It is
//! deliberately narrow: an ordered scan, a tip read, and one atomic
//! conditional insert.  The conditional insert is what lets the ledger
//! keep its chain intact even when several ledger handles share one
//! store: an insert only lands if the chain tip is still the one the
//! caller hashed against.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

use fides_contracts::{
    error::{FidesError, FidesResult},
    record::{AuditRecord, Digest},
};

// ── Tip ─────────────────────────────────────────────────────────────────────

/// Snapshot of the chain's current end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTip {
    /// Digest of the most recent record, or the genesis sentinel when
    /// the ledger is empty.
    pub digest: Digest,
    /// Timestamp of the most recent record.  `None` when empty.
    pub timestamp: Option<DateTime<Utc>>,
    /// Sequence number the next record will receive.
    pub next_sequence: u64,
}

impl ChainTip {
    /// The tip of an empty ledger.
    pub fn genesis() -> Self {
        Self {
            digest: Digest::genesis(),
            timestamp: None,
            next_sequence: 0,
        }
    }
}

/// Result of a conditional insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record is now the chain tip.
    Committed,
    /// Another append landed first; nothing was written.  `current` is
    /// the tip the store holds now, so the caller can rebuild and
    /// retry without an extra read.
    TipMoved { current: ChainTip },
}

// ── Store trait ─────────────────────────────────────────────────────────────

/// Ordered, append-only record storage.
///
/// Implementations must make `insert_if_tip` atomic: the tip
/// comparison and the write happen as one step, with no window for a
/// second writer in between.  All errors surface as
/// `FidesError::StoreUnavailable` and must leave the store unchanged.
pub trait LedgerStore: Send + Sync {
    /// The current end of the chain.
    fn tip(&self) -> FidesResult<ChainTip>;

    /// Insert `record` only if the chain tip still matches `expected`.
    ///
    /// `record.previous_digest` and `record.sequence` must agree with
    /// the tip being replaced; a mismatch reports `TipMoved` rather
    /// than corrupting the chain.
    fn insert_if_tip(
        &self,
        expected: &Digest,
        record: &AuditRecord,
    ) -> FidesResult<InsertOutcome>;

    /// Every record in insertion order.
    fn scan(&self) -> FidesResult<Vec<AuditRecord>>;
}

// ── In-memory reference implementation ──────────────────────────────────────

/// Reference `LedgerStore` backed by a `Vec` behind a `Mutex`.
///
/// The mutex makes `insert_if_tip` trivially atomic.  A database
/// implementation would use a conditional write on the tip digest
/// instead.
#[derive(Default)]
pub struct InMemoryLedgerStore {
    pub(crate) records: Mutex<Vec<AuditRecord>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> FidesResult<std::sync::MutexGuard<'_, Vec<AuditRecord>>> {
        self.records.lock().map_err(|e| FidesError::StoreUnavailable {
            reason: format!("ledger store lock poisoned: {}", e),
        })
    }

    fn tip_of(records: &[AuditRecord]) -> ChainTip {
        match records.last() {
            Some(last) => ChainTip {
                digest: last.digest.clone(),
                timestamp: Some(last.timestamp),
                next_sequence: last.sequence + 1,
            },
            None => ChainTip::genesis(),
        }
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn tip(&self) -> FidesResult<ChainTip> {
        let records = self.lock()?;
        Ok(Self::tip_of(&records))
    }

    fn insert_if_tip(
        &self,
        expected: &Digest,
        record: &AuditRecord,
    ) -> FidesResult<InsertOutcome> {
        let mut records = self.lock()?;
        let current = Self::tip_of(&records);

        if &current.digest != expected || current.next_sequence != record.sequence {
            return Ok(InsertOutcome::TipMoved { current });
        }

        records.push(record.clone());
        Ok(InsertOutcome::Committed)
    }

    fn scan(&self) -> FidesResult<Vec<AuditRecord>> {
        let records = self.lock()?;
        Ok(records.clone())
    }
}
