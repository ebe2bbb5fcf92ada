//! Error taxonomy for the fides trust core.
//!
//! Every fallible operation across the fides crates returns
//! [`FidesResult`]. Variants are kept specific so callers can tell a
//! permanent fault (a broken chain link) from a transient one (append
//! contention) without string matching.

use thiserror::Error;

use crate::record::RecordId;
use crate::workflow::RunId;

/// Unified error type for ledger, workflow, cache, and orchestrator
/// operations.
#[derive(Debug, Error)]
pub enum FidesError {
    /// Chain verification recomputed a digest that does not match the
    /// stored record, or a link does not reference its predecessor.
    /// This is a tamper signal and is never repaired automatically.
    #[error("audit chain broken at record {record_id}")]
    ChainIntegrity { record_id: RecordId },

    /// The optimistic append lost the tip race on every attempt.
    /// The record was not written; the caller may retry.
    #[error("audit append still contended after {attempts} attempts")]
    AppendContention { attempts: u32 },

    /// No workflow with this identifier exists in the registry.
    #[error("unknown workflow '{workflow_id}'")]
    UnknownWorkflow { workflow_id: String },

    /// The workflow exists but is switched off in configuration.
    #[error("workflow '{workflow_id}' is disabled")]
    WorkflowDisabled { workflow_id: String },

    /// A step handler reported failure. The run is marked failed and
    /// the remaining steps are skipped.
    #[error("step '{step}' failed: {reason}")]
    StepFailed { step: String, reason: String },

    /// A run or step exceeded its configured duration bound.
    #[error("timeout: {scope} exceeded its duration bound")]
    Timeout { scope: String },

    /// The run was cancelled cooperatively before it reached a
    /// terminal state on its own.
    #[error("run {run_id} was cancelled")]
    Cancelled { run_id: RunId },

    /// A lookup by identifier found nothing.
    #[error("{what} not found")]
    NotFound { what: String },

    /// The backing store rejected or could not serve an operation.
    #[error("store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    /// An attempted state change violates the run lifecycle, for
    /// example finishing a run that is already terminal.
    #[error("invalid run transition: {reason}")]
    InvalidTransition { reason: String },

    /// Configuration could not be read or failed validation.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

/// Convenience alias used across all fides crates.
pub type FidesResult<T> = Result<T, FidesError>;
