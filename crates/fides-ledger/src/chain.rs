//! Hash-chain primitives: digest computation and chain verification.
//!
//! Every record's digest is SHA-256 over a deterministic byte serialization
//! of the fields it commits to.  Each variable-length field is prefixed with
//! its byte length as a 4-byte little-endian integer, so field boundaries
//! are unambiguous and independent implementations agree on the exact bytes.
//!
//! Digest input layout (bytes, in order):
//!   1. previous digest as UTF-8 (64 ASCII hex chars), length-prefixed
//!   2. action_type as UTF-8, length-prefixed
//!   3. resource_type as UTF-8, length-prefixed
//!   4. resource_id as UTF-8, length-prefixed
//!   5. actor presence byte (0x01 present, 0x00 absent), then the actor_id
//!      as UTF-8, length-prefixed, only when present
//!   6. payload as canonical JSON (serde_json, object keys sorted),
//!      length-prefixed
//!   7. timestamp as epoch milliseconds, 8-byte little-endian

use chrono::{DateTime, Utc};
use sha2::{Digest as _, Sha256};

use fides_contracts::record::{AuditRecord, Digest, RecordFields, VerificationOutcome};

/// How much work a chain walk does per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifyMode {
    /// Check prev-digest linkage and recompute every record's digest
    /// from its own fields.  Catches both relinking and in-place edits.
    #[default]
    Full,
    /// Check prev-digest linkage against stored digests only.  Cheap,
    /// but blind to an edit that rewrote a record and its digest in
    /// place without relinking the successors.
    Links,
}

fn update_len_prefixed(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u32).to_le_bytes());
    hasher.update(bytes);
}

/// Compute the SHA-256 digest for one record.
///
/// The digest commits to the record's link to its predecessor
/// (`previous`), every caller-supplied field, and the append timestamp.
/// The store-assigned sequence number is deliberately excluded: it is
/// an ordering aid, not part of the record's identity.
///
/// Returns a lowercase 64-character hex digest.
///
/// # Panics
///
/// Panics if the payload cannot be serialized to JSON, which cannot
/// happen for an in-memory `serde_json::Value`.
pub fn record_digest(
    previous: &Digest,
    fields: &RecordFields,
    timestamp: DateTime<Utc>,
) -> Digest {
    // serde_json::to_vec is deterministic for a given Value: no extra
    // whitespace, and map keys already sit in sorted order.
    let payload_json = serde_json::to_vec(&fields.payload)
        .expect("JSON value must always be serializable");

    let mut hasher = Sha256::new();
    update_len_prefixed(&mut hasher, previous.as_str().as_bytes());
    update_len_prefixed(&mut hasher, fields.action_type.as_bytes());
    update_len_prefixed(&mut hasher, fields.resource_type.as_bytes());
    update_len_prefixed(&mut hasher, fields.resource_id.as_bytes());
    match &fields.actor_id {
        Some(actor_id) => {
            hasher.update([1u8]);
            update_len_prefixed(&mut hasher, actor_id.as_bytes());
        }
        None => hasher.update([0u8]),
    }
    update_len_prefixed(&mut hasher, &payload_json);
    hasher.update(timestamp.timestamp_millis().to_le_bytes());

    Digest(hex::encode(hasher.finalize()))
}

/// Recompute a stored record's digest from its own fields.
pub fn recompute(record: &AuditRecord) -> Digest {
    record_digest(&record.previous_digest, &record.fields(), record.timestamp)
}

/// Verify a run of records against two rules:
///
/// 1. **Prev-digest linkage**: each record's `previous_digest` equals
///    the digest of the record before it, starting from
///    `expected_prev` (the genesis sentinel for a full chain).
/// 2. **Digest correctness** (`VerifyMode::Full` only): each record's
///    stored digest matches the value recomputed from its own fields.
///
/// Returns `BrokenAt` naming the first record that fails either rule;
/// later records are not inspected.  An empty run is valid.
pub fn verify_records(
    records: &[AuditRecord],
    expected_prev: &Digest,
    mode: VerifyMode,
) -> VerificationOutcome {
    let mut expected_prev = expected_prev.clone();

    for record in records {
        if record.previous_digest != expected_prev {
            return VerificationOutcome::BrokenAt { record_id: record.id };
        }

        if mode == VerifyMode::Full && recompute(record) != record.digest {
            return VerificationOutcome::BrokenAt { record_id: record.id };
        }

        expected_prev = record.digest.clone();
    }

    VerificationOutcome::Valid
}
