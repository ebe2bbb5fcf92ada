//! The step implementation seam.
//!
//! Workflow definitions name their steps; a `StepHandler` is the code
//! behind one of those names.  Handlers are registered on the runner
//! and invoked strictly in sequence, one at a time per run.

use serde_json::Value;

use fides_contracts::{
    error::FidesResult,
    workflow::{RunId, StepResult, WorkflowId},
};

/// Everything a step handler may look at while executing.
///
/// A handler is expected to behave as a pure function of the run input
/// and the prior step results; it gets its own snapshot of both, so
/// nothing it sees can be mutated behind its back mid-step.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub workflow_id: WorkflowId,
    pub run_id: RunId,
    /// Zero-based position of this step in the workflow definition.
    pub step_index: u32,
    pub step_name: String,
    /// The input the run was started with.
    pub input: Value,
    /// Results of the steps that already completed, in order.
    pub prior_results: Vec<StepResult>,
}

/// One step implementation, registered on the runner by name.
///
/// Returning `Ok` yields the step's success payload; returning `Err`
/// fails the run and skips the remaining steps.  Handlers are called
/// from the thread driving the run and must be safe to share across
/// runs.
pub trait StepHandler: Send + Sync {
    fn execute(&self, ctx: &StepContext) -> FidesResult<Value>;
}
