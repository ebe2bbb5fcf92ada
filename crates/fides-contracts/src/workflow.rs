//! Workflow run types.
//!
//! A [`WorkflowRun`] tracks one execution of a declared workflow from
//! `running` to exactly one terminal state. Transitions are guarded
//! here so no component can complete or fail a run twice, whatever
//! order timeouts, cancellation, and step failures land in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{FidesError, FidesResult};

// ── Identity ────────────────────────────────────────────────────────────────

/// Configured identifier of a workflow definition, e.g.
/// `daily-forecast`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier of a single workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Run state ───────────────────────────────────────────────────────────────

/// Lifecycle state of a run. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// What a single step produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum StepOutcome {
    Succeeded { payload: Value },
    Failed { error: String },
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Succeeded { .. })
    }
}

/// One entry in a run's ordered step log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Zero-based position of the step in the workflow definition.
    pub index: u32,
    pub name: String,
    pub outcome: StepOutcome,
    pub completed_at: DateTime<Utc>,
}

/// Why a run ended in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// A step handler reported an error.
    Step,
    /// The run or a step exceeded its duration bound.
    Timeout,
    /// The run was cancelled cooperatively.
    Cancelled,
}

/// Failure detail recorded on a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub kind: FailureKind,
    pub message: String,
}

// ── Workflow run ────────────────────────────────────────────────────────────

/// One tracked execution of a workflow.
///
/// Step results accumulate in execution order while the run is
/// `Running`; [`WorkflowRun::complete`] and [`WorkflowRun::fail`]
/// each refuse to fire on a run that is already terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: RunId,
    pub workflow_id: WorkflowId,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub step_results: Vec<StepResult>,
    pub failure: Option<RunFailure>,
}

impl WorkflowRun {
    /// Start a new run of `workflow_id`, `Running` as of `started_at`.
    pub fn new(workflow_id: WorkflowId, started_at: DateTime<Utc>) -> Self {
        Self {
            id: RunId::new(),
            workflow_id,
            status: RunStatus::Running,
            started_at,
            completed_at: None,
            step_results: Vec::new(),
            failure: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Append a step result. Rejected once the run is terminal.
    pub fn record_step(&mut self, step: StepResult) -> FidesResult<()> {
        if self.is_terminal() {
            return Err(FidesError::InvalidTransition {
                reason: format!(
                    "cannot record step '{}' on {} run {}",
                    step.name,
                    status_name(self.status),
                    self.id
                ),
            });
        }
        self.step_results.push(step);
        Ok(())
    }

    /// Transition `Running` to `Completed`. Errors if already terminal.
    pub fn complete(&mut self, at: DateTime<Utc>) -> FidesResult<()> {
        if self.is_terminal() {
            return Err(FidesError::InvalidTransition {
                reason: format!(
                    "run {} is already {}",
                    self.id,
                    status_name(self.status)
                ),
            });
        }
        self.status = RunStatus::Completed;
        self.completed_at = Some(at);
        Ok(())
    }

    /// Transition `Running` to `Failed` with `failure` attached.
    /// Errors if already terminal.
    pub fn fail(&mut self, failure: RunFailure, at: DateTime<Utc>) -> FidesResult<()> {
        if self.is_terminal() {
            return Err(FidesError::InvalidTransition {
                reason: format!(
                    "run {} is already {}",
                    self.id,
                    status_name(self.status)
                ),
            });
        }
        self.status = RunStatus::Failed;
        self.completed_at = Some(at);
        self.failure = Some(failure);
        Ok(())
    }

    /// Failure message, present only when the run failed.
    pub fn error_message(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.message.as_str())
    }

    /// Number of steps that succeeded so far.
    pub fn succeeded_steps(&self) -> u32 {
        self.step_results
            .iter()
            .filter(|s| s.outcome.is_success())
            .count() as u32
    }

    /// Wall-clock duration, available once the run is terminal.
    pub fn duration_ms(&self) -> Option<u64> {
        self.completed_at
            .map(|done| (done - self.started_at).num_milliseconds().max(0) as u64)
    }
}

fn status_name(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Running => "running",
        RunStatus::Completed => "completed",
        RunStatus::Failed => "failed",
    }
}
