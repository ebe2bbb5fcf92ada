//! Scenario 2: Tamper Evidence
//!
//! Demonstrates the hash chain detecting an in-place edit of a stored
//! audit record.
//!
//! Pipeline walk-through for the demo run:
//!   1. A short session of dashboard activity is appended to a fresh ledger
//!   2. The chain verifies Valid; each record's digest commits to its
//!      predecessor
//!   3. The ledger is exported and one payload in the copy is edited
//!   4. Full verification of the copy reports BrokenAt, naming the
//!      edited record
//!   5. A linkage-only pass cannot see the edit: the stored digests
//!      still link
//!   6. The live ledger is untouched and still verifies Valid

use serde_json::json;

use fides_contracts::{
    error::FidesResult,
    record::{Digest, RecordFields, VerificationOutcome},
};
use fides_ledger::{verify_records, AuditLedger, VerifyMode};

// ── Scenario runner ───────────────────────────────────────────────────────────

/// Run Scenario 2: Tamper Evidence.
pub fn run_scenario() -> FidesResult<()> {
    println!("=== Scenario 2: Tamper Evidence ===");
    println!();

    let ledger = AuditLedger::in_memory();

    // ── A short session of ordinary dashboard activity ────────────────────────

    let session: [(&str, &str, &str, Option<&str>, serde_json::Value); 4] = [
        (
            "user.login",
            "session",
            "sess-4821",
            Some("analyst-jane"),
            json!({ "method": "sso" }),
        ),
        (
            "report.viewed",
            "report",
            "q3-revenue",
            Some("analyst-jane"),
            json!({ "format": "web" }),
        ),
        (
            "settings.changed",
            "tenant",
            "tenant-7",
            Some("admin-raj"),
            json!({ "field": "retention_days", "from": 30, "to": 90 }),
        ),
        (
            "report.exported",
            "report",
            "q3-revenue",
            Some("analyst-jane"),
            json!({ "format": "csv", "rows": 1284 }),
        ),
    ];

    for (action_type, resource_type, resource_id, actor, payload) in session {
        ledger.append(RecordFields {
            action_type: action_type.to_string(),
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            actor_id: actor.map(str::to_string),
            payload,
        })?;
    }

    println!("  Chain after {} appends:", ledger.len()?);
    let export = ledger.export()?;
    for record in &export.records {
        println!(
            "    [{}] {:<18} {}.. <- {}..",
            record.sequence,
            record.action_type,
            &record.digest.as_str()[..12],
            &record.previous_digest.as_str()[..12]
        );
    }
    println!(
        "  Live verification:     {}",
        outcome_label(&ledger.verify()?)
    );
    println!();

    // ── Tamper with an exported copy ──────────────────────────────────────────

    println!("  Editing record 2 in an exported copy (retention 90 -> 365)...");
    let mut copied = export.records.clone();
    copied[2].payload = json!({ "field": "retention_days", "from": 30, "to": 365 });

    match verify_records(&copied, &Digest::genesis(), VerifyMode::Full) {
        VerificationOutcome::BrokenAt { record_id } => {
            println!("  Full verification:     BROKEN at record {}", record_id);
        }
        VerificationOutcome::Valid => {
            println!("  Full verification:     unexpectedly valid");
        }
    }

    // The stored digests still reference each other, so a linkage-only
    // pass has nothing to object to.
    println!(
        "  Linkage-only pass:     {} (in-place edits are invisible to it)",
        outcome_label(&verify_records(&copied, &Digest::genesis(), VerifyMode::Links))
    );
    println!();

    // ── The live ledger is unaffected ─────────────────────────────────────────

    println!(
        "  Live verification:     {} (the store was never touched)",
        outcome_label(&ledger.verify()?)
    );
    println!(
        "  Terminal digest:       {}..",
        &ledger.tip_digest()?.as_str()[..12]
    );
    println!();
    println!("  Scenario 2 complete.");
    println!();

    Ok(())
}

fn outcome_label(outcome: &VerificationOutcome) -> &'static str {
    match outcome {
        VerificationOutcome::Valid => "VALID",
        VerificationOutcome::BrokenAt { .. } => "BROKEN",
    }
}
