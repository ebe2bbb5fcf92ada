//! Simulated analytical engine for the fides demo.
//!
//! Predictions are computed from a fixed formula over the subject and
//! horizon strings.  No external systems are contacted; this module is a
//! stand-in for the real analytical engine a production deployment would
//! call behind the orchestrator's `PredictionSource` seam.

use std::sync::atomic::{AtomicU32, Ordering};

use serde_json::{json, Value};

use fides_contracts::{cache::CacheKey, error::FidesResult};
use fides_orchestrator::PredictionSource;

// ── Mock analytical engine ────────────────────────────────────────────────────

/// Deterministic stand-in for the platform's analytical engine.
///
/// The same key always yields the same prediction, so cache hits and
/// fresh computes are indistinguishable by value.  The compute counter
/// is what lets the demo show which reads actually reached the engine.
#[derive(Default)]
pub struct MockAnalyticalEngine {
    computes: AtomicU32,
}

impl MockAnalyticalEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times the engine actually computed, across all keys.
    pub fn computes(&self) -> u32 {
        self.computes.load(Ordering::SeqCst)
    }
}

impl PredictionSource for MockAnalyticalEngine {
    fn compute(&self, key: &CacheKey) -> FidesResult<Value> {
        self.computes.fetch_add(1, Ordering::SeqCst);

        // Stable pseudo-scores derived from the key bytes alone.
        let seed: u32 = key
            .subject
            .bytes()
            .chain(key.horizon.bytes())
            .map(u32::from)
            .sum();
        let predicted_load = 0.35 + f64::from(seed % 50) / 100.0;
        let churn_risk = f64::from(seed % 17) / 20.0;

        Ok(json!({
            "subject": key.subject,
            "horizon": key.horizon,
            "predicted_load": predicted_load,
            "churn_risk": churn_risk,
            "model": "mock-linear-v1",
        }))
    }
}
