//! Scenario 3: Prediction Cache Freshness
//!
//! Demonstrates the orchestrator's read-through prediction path and the
//! cache's TTL freshness rule.
//!
//! Pipeline walk-through for the demo run:
//!   1. Orchestrator wired over a mock analytical engine with a 300ms TTL
//!   2. First read computes; a repeat read inside the TTL is a cache hit
//!   3. A different horizon is a different key and computes again
//!   4. After the TTL passes, the next read recomputes
//!   5. Expired entries are swept; hit/miss counters are reported
//!   6. Every population was audited with the key and freshness window,
//!      never the predicted value

use std::sync::Arc;
use std::thread;
use std::time::Duration as StdDuration;

use chrono::Duration;
use serde_json::Value;

use fides_cache::PredictionCache;
use fides_contracts::{
    cache::CacheKey,
    error::FidesResult,
    record::RecordFilter,
};
use fides_ledger::AuditLedger;
use fides_orchestrator::{Orchestrator, PredictionSource};
use fides_workflow::{InMemoryRunStore, WorkflowRegistry, WorkflowRunner};

use crate::mock_engine::MockAnalyticalEngine;

// ── Workflow TOML ─────────────────────────────────────────────────────────────

/// Embedded workflow definitions shared by the demo scenarios.
const DEMO_WORKFLOWS: &str = include_str!("../../workflows.toml");

// ── Arc-wrapped engine helper ─────────────────────────────────────────────────

/// Thin newtype allowing an `Arc<MockAnalyticalEngine>` to be used as
/// `Box<dyn PredictionSource>`.  This lets us retain a handle on the
/// compute counter after the orchestrator takes ownership via the Box.
struct ArcEngine(Arc<MockAnalyticalEngine>);

impl PredictionSource for ArcEngine {
    fn compute(&self, key: &CacheKey) -> FidesResult<Value> {
        self.0.compute(key)
    }
}

// ── Scenario runner ───────────────────────────────────────────────────────────

/// Run Scenario 3: Prediction Cache Freshness.
pub fn run_scenario() -> FidesResult<()> {
    println!("=== Scenario 3: Prediction Cache Freshness ===");
    println!();

    // ── Wire up the orchestrator ──────────────────────────────────────────────

    let ledger = Arc::new(AuditLedger::in_memory());
    let cache = Arc::new(PredictionCache::in_memory(Arc::clone(&ledger)));
    let engine = Arc::new(MockAnalyticalEngine::new());

    // No runs start in this scenario, so no step handlers are registered.
    let runner = WorkflowRunner::new(
        WorkflowRegistry::from_toml_str(DEMO_WORKFLOWS)?,
        Arc::clone(&ledger),
        Arc::new(InMemoryRunStore::new()),
    );

    let orchestrator = Orchestrator::new(
        Arc::clone(&ledger),
        Arc::new(runner),
        Arc::clone(&cache),
        Box::new(ArcEngine(Arc::clone(&engine))),
        Duration::milliseconds(300),
    );

    println!("  Prediction TTL: 300ms");
    println!();

    // ── Read-through behaviour ────────────────────────────────────────────────

    let first = orchestrator.prediction("tenant-7", "24h")?;
    println!(
        "  Read 1 (tenant-7@24h):  computed   (engine computes: {})",
        engine.computes()
    );

    let second = orchestrator.prediction("tenant-7", "24h")?;
    println!(
        "  Read 2 (tenant-7@24h):  cache hit  (engine computes: {})",
        engine.computes()
    );
    println!("  Values identical:       {}", first == second);

    orchestrator.prediction("tenant-7", "7d")?;
    println!(
        "  Read 3 (tenant-7@7d):   computed   (engine computes: {})",
        engine.computes()
    );
    println!();

    // ── Expiry ────────────────────────────────────────────────────────────────

    println!("  Sleeping 400ms, past the TTL...");
    thread::sleep(StdDuration::from_millis(400));

    orchestrator.prediction("tenant-7", "24h")?;
    println!(
        "  Read 4 (tenant-7@24h):  recomputed (engine computes: {})",
        engine.computes()
    );

    let removed = cache.purge_expired()?;
    println!("  Swept expired entries:  {}", removed);

    let stats = orchestrator.cache_stats();
    println!("  Cache stats:            {} hits, {} misses", stats.hits, stats.misses);
    println!();

    // ── The audit side ────────────────────────────────────────────────────────

    // Populations are on the ledger with the key and freshness window;
    // the predicted values never leave the cache.
    let populated = orchestrator.audit_trail(&RecordFilter {
        action_type: Some("cache.populated".to_string()),
        ..Default::default()
    })?;
    println!("  cache.populated records: {}", populated.len());
    if let Some(record) = populated.first() {
        println!("  Sample payload:          {}", record.payload);
    }

    orchestrator.verify_audit_trail()?;
    println!("  Audit chain integrity:   VERIFIED");
    println!();
    println!("  Scenario 3 complete.");
    println!();

    Ok(())
}
