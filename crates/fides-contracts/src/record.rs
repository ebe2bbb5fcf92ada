//! Audit record types.
//!
//! An [`AuditRecord`] is one immutable entry in the hash-chained audit
//! ledger. Records are never updated or deleted once written; the
//! chain of [`Digest`] values is what makes silent edits detectable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{FidesError, FidesResult};

// ── Digest ──────────────────────────────────────────────────────────────────

/// Lowercase hex encoding of a SHA-256 digest over a record's
/// canonical byte serialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest(pub String);

impl Digest {
    /// Sentinel `previous_digest` of the first record in a ledger:
    /// sixty-four hex zeros.
    pub const GENESIS_HEX: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";

    /// The genesis sentinel digest.
    pub fn genesis() -> Self {
        Self(Self::GENESIS_HEX.to_string())
    }

    /// Whether this digest is the genesis sentinel.
    pub fn is_genesis(&self) -> bool {
        self.0 == Self::GENESIS_HEX
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Record identity ─────────────────────────────────────────────────────────

/// Unique identifier of a single audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Records ─────────────────────────────────────────────────────────────────

/// Caller-supplied fields of a record, before the ledger assigns
/// identity, chain position, and digests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordFields {
    /// What happened, e.g. `workflow.started` or `cache.populated`.
    pub action_type: String,
    /// Kind of resource acted on, e.g. `workflow_run`.
    pub resource_type: String,
    /// Identifier of the concrete resource instance.
    pub resource_id: String,
    /// Who acted. `None` for system-initiated actions.
    pub actor_id: Option<String>,
    /// Structured action detail. Stored verbatim and hashed in
    /// canonical JSON form.
    pub payload: Value,
}

/// One immutable entry in the audit ledger.
///
/// `digest` commits to every caller-supplied field plus
/// `previous_digest` and `timestamp`; `sequence` is assigned by the
/// store for ordering and is deliberately not part of the hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: RecordId,
    /// Insertion position, starting at 0. Store-assigned.
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub action_type: String,
    pub resource_type: String,
    pub resource_id: String,
    pub actor_id: Option<String>,
    pub payload: Value,
    /// Digest of the preceding record, or the genesis sentinel for
    /// the first record.
    pub previous_digest: Digest,
    /// SHA-256 over this record's canonical serialization.
    pub digest: Digest,
}

impl AuditRecord {
    /// The caller-supplied portion of this record, as it would have
    /// been presented at append time. Used when recomputing digests
    /// during verification.
    pub fn fields(&self) -> RecordFields {
        RecordFields {
            action_type: self.action_type.clone(),
            resource_type: self.resource_type.clone(),
            resource_id: self.resource_id.clone(),
            actor_id: self.actor_id.clone(),
            payload: self.payload.clone(),
        }
    }
}

// ── Queries ─────────────────────────────────────────────────────────────────

/// Conjunctive filter for listing audit records. Empty fields match
/// everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordFilter {
    pub action_type: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub actor_id: Option<String>,
    /// Inclusive lower bound on `timestamp`.
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `timestamp`.
    pub until: Option<DateTime<Utc>>,
}

impl RecordFilter {
    /// Whether `record` satisfies every populated criterion.
    pub fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(action_type) = &self.action_type {
            if &record.action_type != action_type {
                return false;
            }
        }
        if let Some(resource_type) = &self.resource_type {
            if &record.resource_type != resource_type {
                return false;
            }
        }
        if let Some(resource_id) = &self.resource_id {
            if &record.resource_id != resource_id {
                return false;
            }
        }
        if let Some(actor_id) = &self.actor_id {
            if record.actor_id.as_deref() != Some(actor_id.as_str()) {
                return false;
            }
        }
        if let Some(since) = &self.since {
            if record.timestamp < *since {
                return false;
            }
        }
        if let Some(until) = &self.until {
            if record.timestamp > *until {
                return false;
            }
        }
        true
    }
}

// ── Verification ────────────────────────────────────────────────────────────

/// Result of walking a ledger's chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationOutcome {
    /// Every link checked out.
    Valid,
    /// The first record whose digest or back-link failed to check out.
    BrokenAt { record_id: RecordId },
}

impl VerificationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationOutcome::Valid)
    }

    /// Convert a break into a [`FidesError::ChainIntegrity`] so
    /// callers can `?` verification.
    pub fn ensure_valid(self) -> FidesResult<()> {
        match self {
            VerificationOutcome::Valid => Ok(()),
            VerificationOutcome::BrokenAt { record_id } => {
                Err(FidesError::ChainIntegrity { record_id })
            }
        }
    }
}
