//! End-to-end demo scenarios for the fides trust core.
//!
//! Each scenario is a self-contained module that wires up real fides
//! components (audit ledger, workflow runner, prediction cache,
//! orchestrator) with mock handlers and data, and walks one trust
//! property from end to end.

pub mod cache_freshness;
pub mod forecast_run;
pub mod tamper_evidence;
