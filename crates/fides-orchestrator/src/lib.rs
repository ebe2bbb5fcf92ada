//! # fides-orchestrator
//!
//! The thin facade callers talk to: one `Orchestrator` wires the audit
//! ledger, the workflow runner, and the prediction cache together and
//! exposes the handful of operations a dashboard backend needs.
//!
//! ## Overview
//!
//! The orchestrator adds no semantics of its own.  Workflow calls pass
//! straight through to the runner.  Predictions follow read-through: a
//! cache hit returns the cached value, a miss asks the external
//! [`PredictionSource`] to compute and parks the result under the
//! configured TTL.  Audit queries are read-only projections of the
//! ledger, and `verify_audit_trail` turns a broken chain into
//! `FidesError::ChainIntegrity`, kept distinct from query failures.

use std::sync::Arc;

use chrono::Duration;
use serde_json::Value;
use tracing::debug;

use fides_cache::{CacheStats, PredictionCache};
use fides_contracts::{
    cache::CacheKey,
    error::FidesResult,
    record::{AuditRecord, RecordFilter},
    workflow::{RunId, WorkflowId, WorkflowRun},
};
use fides_ledger::AuditLedger;
use fides_workflow::WorkflowRunner;

/// The external analytical engine that actually computes predictions.
///
/// The orchestrator treats the output as opaque JSON; it is cached and
/// served without inspection.
pub trait PredictionSource: Send + Sync {
    fn compute(&self, key: &CacheKey) -> FidesResult<Value>;
}

/// Facade over the trust core's three components.
pub struct Orchestrator {
    ledger: Arc<AuditLedger>,
    runner: Arc<WorkflowRunner>,
    cache: Arc<PredictionCache>,
    source: Box<dyn PredictionSource>,
    prediction_ttl: Duration,
}

impl Orchestrator {
    pub fn new(
        ledger: Arc<AuditLedger>,
        runner: Arc<WorkflowRunner>,
        cache: Arc<PredictionCache>,
        source: Box<dyn PredictionSource>,
        prediction_ttl: Duration,
    ) -> Self {
        Self {
            ledger,
            runner,
            cache,
            source,
            prediction_ttl,
        }
    }

    // ── Workflows ────────────────────────────────────────────────────────────

    /// Start a run of `workflow_id` and drive it to its terminal state.
    pub fn run_workflow(
        &self,
        workflow_id: &WorkflowId,
        input: Value,
        actor: Option<&str>,
    ) -> FidesResult<WorkflowRun> {
        self.runner.start(workflow_id, input, actor)
    }

    /// The stored snapshot of a run.
    pub fn run(&self, run_id: RunId) -> FidesResult<WorkflowRun> {
        self.runner.get(run_id)
    }

    /// Request cooperative cancellation of a run.
    pub fn cancel_run(&self, run_id: RunId) -> FidesResult<()> {
        self.runner.cancel(run_id)
    }

    // ── Predictions ──────────────────────────────────────────────────────────

    /// The prediction for `subject` at `horizon`, read-through.
    ///
    /// A fresh cached value is returned as-is.  On a miss the source
    /// computes, the result is cached under the configured TTL, and the
    /// population is audited.  A source failure caches nothing, so the
    /// next call simply tries again.
    pub fn prediction(&self, subject: &str, horizon: &str) -> FidesResult<Value> {
        let key = CacheKey::new(subject, horizon);

        if let Some(value) = self.cache.get(&key)? {
            return Ok(value);
        }

        debug!(key = %key, "prediction not cached, computing");
        let value = self.source.compute(&key)?;
        self.cache.put(&key, value.clone(), self.prediction_ttl)?;
        Ok(value)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // ── Audit ────────────────────────────────────────────────────────────────

    /// Audit records matching `filter`, in insertion order.
    pub fn audit_trail(&self, filter: &RecordFilter) -> FidesResult<Vec<AuditRecord>> {
        self.ledger.list(filter)
    }

    /// Walk the full chain; a broken link surfaces as
    /// `FidesError::ChainIntegrity` naming the first bad record.
    pub fn verify_audit_trail(&self) -> FidesResult<()> {
        self.ledger.verify()?.ensure_valid()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
