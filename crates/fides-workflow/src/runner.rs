//! The workflow runner: a sequential, bounded-duration step interpreter.
//!
//! Every run moves through the same pipeline:
//!
//!   Resolve definition → Audit start → Persist run → [per step:
//!   deadline check → cancellation check → execute → record outcome]
//!   → Final deadline check → Terminal transition → Audit outcome
//!
//! The trust invariants are structural: a run is audited as started
//! before it exists anywhere else, a run reaches exactly one terminal
//! state, and the ledger's append lock is only ever held inside
//! `AuditLedger::append`, never across a step.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use fides_contracts::{
    error::{FidesError, FidesResult},
    record::RecordFields,
    workflow::{
        FailureKind, RunFailure, RunId, StepOutcome, StepResult, WorkflowId, WorkflowRun,
    },
};
use fides_ledger::AuditLedger;

use crate::handler::{StepContext, StepHandler};
use crate::registry::{WorkflowRegistry, WorkflowSpec};
use crate::store::RunStore;

/// Drives workflow runs from `Running` to exactly one terminal state.
///
/// Construct one runner per registry, register a handler for every
/// step name, then share it behind an `Arc`: `start()` takes `&self`,
/// so concurrent runs and cross-thread `cancel()` calls need no
/// external locking.
pub struct WorkflowRunner {
    registry: WorkflowRegistry,
    handlers: HashMap<String, Box<dyn StepHandler>>,
    runs: Arc<dyn RunStore>,
    ledger: Arc<AuditLedger>,
    pub(crate) cancel_flags: Mutex<HashMap<RunId, Arc<AtomicBool>>>,
}

impl WorkflowRunner {
    pub fn new(
        registry: WorkflowRegistry,
        ledger: Arc<AuditLedger>,
        runs: Arc<dyn RunStore>,
    ) -> Self {
        Self {
            registry,
            handlers: HashMap::new(),
            runs,
            ledger,
            cancel_flags: Mutex::new(HashMap::new()),
        }
    }

    /// Register the implementation behind a step name.
    ///
    /// Later registrations replace earlier ones, so tests can swap a
    /// single step out of a shared fixture.
    pub fn register_handler(&mut self, name: impl Into<String>, handler: Box<dyn StepHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    /// The loaded workflow definitions.
    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    /// Execute one run of `workflow_id` to its terminal state.
    ///
    /// # Pipeline
    ///
    /// 1. Resolve the definition: unknown → `UnknownWorkflow`,
    ///    switched off → `WorkflowDisabled`, a step with no registered
    ///    handler → `Config`.  Nothing is written for these.
    /// 2. Append the `workflow.started` audit record.  If this fails,
    ///    the run does not begin: a run that cannot be audited cannot
    ///    proceed.
    /// 3. Persist the `Running` run and register its cancellation flag.
    /// 4. Interpret the steps strictly in order.  Before each step the
    ///    whole-run deadline and the cancellation flag are checked;
    ///    after each step the per-step budget is checked, and the run
    ///    deadline once more after the final step.  Every outcome is
    ///    appended to the run's step results and the run is
    ///    re-persisted as it progresses.
    /// 5. Exactly one terminal transition, followed by the matching
    ///    `workflow.completed` / `workflow.failed` audit record.
    ///
    /// # Errors
    ///
    /// Step failure, timeout, and cancellation are NOT errors: they
    /// produce an `Ok` run whose status is `Failed` with the kind
    /// recorded in `failure`.  `Err` is reserved for runs that could
    /// not be driven at all: bad identifiers, configuration gaps, and
    /// store or ledger failures.
    pub fn start(
        &self,
        workflow_id: &WorkflowId,
        input: Value,
        actor: Option<&str>,
    ) -> FidesResult<WorkflowRun> {
        // ── Step 1: Resolve and validate the definition ──────────────────────
        let spec = self
            .registry
            .get(workflow_id.as_str())
            .ok_or_else(|| FidesError::UnknownWorkflow {
                workflow_id: workflow_id.as_str().to_string(),
            })?;

        if !spec.enabled {
            return Err(FidesError::WorkflowDisabled {
                workflow_id: spec.id.clone(),
            });
        }

        for step_name in &spec.steps {
            if !self.handlers.contains_key(step_name) {
                return Err(FidesError::Config {
                    reason: format!(
                        "no handler registered for step '{}' of workflow '{}'",
                        step_name, spec.id
                    ),
                });
            }
        }

        let run = WorkflowRun::new(WorkflowId::new(spec.id.clone()), Utc::now());

        debug!(
            run_id = %run.id,
            workflow_id = %run.workflow_id,
            steps = spec.steps.len(),
            "workflow run starting"
        );

        // ── Step 2: Audit the start before the run exists anywhere ──────────
        self.append_audit(
            "workflow.started",
            &run,
            actor,
            json!({
                "workflow_id": spec.id,
                "step_count": spec.steps.len(),
                "input": input,
            }),
        )?;

        // ── Step 3: Persist the running run and its cancellation flag ───────
        self.runs.put(&run)?;
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let run_id = run.id;
        self.flags()?.insert(run_id, Arc::clone(&cancel_flag));

        // The flag is removed on every interpreter exit, early error
        // returns included.
        let outcome = self.interpret(spec, run, input, actor, &cancel_flag);
        self.remove_flag(run_id);
        outcome
    }

    /// The interpreter loop: steps 4 and 5 of the pipeline.
    fn interpret(
        &self,
        spec: &WorkflowSpec,
        mut run: WorkflowRun,
        input: Value,
        actor: Option<&str>,
        cancel_flag: &AtomicBool,
    ) -> FidesResult<WorkflowRun> {
        let run_deadline: Option<DateTime<Utc>> = spec
            .run_timeout_ms
            .map(|ms| run.started_at + Duration::milliseconds(ms as i64));
        let step_budget: Option<Duration> =
            spec.step_timeout_ms.map(|ms| Duration::milliseconds(ms as i64));

        for (index, step_name) in spec.steps.iter().enumerate() {
            // ── Deadline check at the step boundary ──────────────────────────
            if let Some(deadline) = run_deadline {
                if Utc::now() >= deadline {
                    return self.finish_failed(
                        run,
                        FailureKind::Timeout,
                        format!(
                            "run exceeded its {}ms budget before step '{}'",
                            spec.run_timeout_ms.unwrap_or_default(),
                            step_name
                        ),
                        actor,
                    );
                }
            }

            // ── Cooperative cancellation check ───────────────────────────────
            if cancel_flag.load(Ordering::SeqCst) {
                let reason = FidesError::Cancelled { run_id: run.id };
                return self.finish_failed(
                    run,
                    FailureKind::Cancelled,
                    format!("{} before step '{}'", reason, step_name),
                    actor,
                );
            }

            let handler =
                self.handlers
                    .get(step_name)
                    .ok_or_else(|| FidesError::Config {
                        reason: format!("no handler registered for step '{}'", step_name),
                    })?;

            let ctx = StepContext {
                workflow_id: run.workflow_id.clone(),
                run_id: run.id,
                step_index: index as u32,
                step_name: step_name.clone(),
                input: input.clone(),
                prior_results: run.step_results.clone(),
            };

            debug!(
                run_id = %run.id,
                step = %step_name,
                index,
                "executing step"
            );

            // In-flight handlers are never interrupted: deadlines and
            // cancellation only take effect at the boundaries around
            // this call.
            let step_started = Utc::now();
            let outcome = handler.execute(&ctx);
            let completed_at = Utc::now();

            match outcome {
                Ok(payload) => {
                    run.record_step(StepResult {
                        index: index as u32,
                        name: step_name.clone(),
                        outcome: StepOutcome::Succeeded { payload },
                        completed_at,
                    })?;
                    self.runs.put(&run)?;

                    // ── Per-step budget check, after the handler returns ─────
                    if let Some(budget) = step_budget {
                        let elapsed = completed_at - step_started;
                        if elapsed > budget {
                            return self.finish_failed(
                                run,
                                FailureKind::Timeout,
                                format!(
                                    "step '{}' took {}ms, budget is {}ms",
                                    step_name,
                                    elapsed.num_milliseconds(),
                                    budget.num_milliseconds()
                                ),
                                actor,
                            );
                        }
                    }
                }
                Err(err) => {
                    let error = err.to_string();
                    run.record_step(StepResult {
                        index: index as u32,
                        name: step_name.clone(),
                        outcome: StepOutcome::Failed {
                            error: error.clone(),
                        },
                        completed_at,
                    })?;
                    self.runs.put(&run)?;

                    return self.finish_failed(
                        run,
                        FailureKind::Step,
                        format!("step '{}' failed: {}", step_name, error),
                        actor,
                    );
                }
            }
        }

        // ── Deadline check covering the final step ───────────────────────────
        if let Some(deadline) = run_deadline {
            if Utc::now() >= deadline {
                return self.finish_failed(
                    run,
                    FailureKind::Timeout,
                    format!(
                        "run exceeded its {}ms budget during its final step",
                        spec.run_timeout_ms.unwrap_or_default()
                    ),
                    actor,
                );
            }
        }

        // ── Step 5: The one successful terminal transition ───────────────────
        run.complete(Utc::now())?;
        self.runs.put(&run)?;

        self.append_audit(
            "workflow.completed",
            &run,
            actor,
            json!({
                "workflow_id": run.workflow_id.as_str(),
                "steps_completed": run.succeeded_steps(),
                "duration_ms": run.duration_ms(),
            }),
        )?;

        info!(
            run_id = %run.id,
            workflow_id = %run.workflow_id,
            steps = run.step_results.len(),
            duration_ms = run.duration_ms().unwrap_or_default(),
            "workflow run completed"
        );

        Ok(run)
    }

    /// The stored snapshot of a run.
    pub fn get(&self, run_id: RunId) -> FidesResult<WorkflowRun> {
        self.runs.get(run_id)?.ok_or_else(|| FidesError::NotFound {
            what: format!("workflow run {}", run_id),
        })
    }

    /// Request cooperative cancellation of a run.
    ///
    /// The flag is observed at the next step boundary; the step in
    /// flight, if any, finishes on its own schedule.  Cancelling a run
    /// that is already terminal is a no-op; cancelling an unknown run
    /// is `NotFound`.
    pub fn cancel(&self, run_id: RunId) -> FidesResult<()> {
        if let Some(flag) = self.flags()?.get(&run_id) {
            flag.store(true, Ordering::SeqCst);
            info!(run_id = %run_id, "cancellation requested");
            return Ok(());
        }

        // No live flag: either the run is already terminal or it never
        // existed.
        match self.runs.get(run_id)? {
            Some(_) => Ok(()),
            None => Err(FidesError::NotFound {
                what: format!("workflow run {}", run_id),
            }),
        }
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    /// Fail `run` with the given kind, persist it, then audit.  The
    /// run is terminal in the store before the audit append, so an
    /// append failure surfaces to the caller without reopening it.
    fn finish_failed(
        &self,
        mut run: WorkflowRun,
        kind: FailureKind,
        message: String,
        actor: Option<&str>,
    ) -> FidesResult<WorkflowRun> {
        run.fail(
            RunFailure {
                kind,
                message: message.clone(),
            },
            Utc::now(),
        )?;
        self.runs.put(&run)?;

        self.append_audit(
            "workflow.failed",
            &run,
            actor,
            json!({
                "workflow_id": run.workflow_id.as_str(),
                "failure_kind": kind,
                "error": message,
                "steps_completed": run.succeeded_steps(),
            }),
        )?;

        warn!(
            run_id = %run.id,
            workflow_id = %run.workflow_id,
            failure_kind = ?kind,
            error = %message,
            "workflow run failed"
        );

        Ok(run)
    }

    fn append_audit(
        &self,
        action_type: &str,
        run: &WorkflowRun,
        actor: Option<&str>,
        payload: Value,
    ) -> FidesResult<()> {
        self.ledger.append(RecordFields {
            action_type: action_type.to_string(),
            resource_type: "workflow_run".to_string(),
            resource_id: run.id.to_string(),
            actor_id: actor.map(str::to_string),
            payload,
        })?;
        Ok(())
    }

    fn flags(
        &self,
    ) -> FidesResult<std::sync::MutexGuard<'_, HashMap<RunId, Arc<AtomicBool>>>> {
        self.cancel_flags
            .lock()
            .map_err(|e| FidesError::StoreUnavailable {
                reason: format!("cancellation flag lock poisoned: {}", e),
            })
    }

    /// Drop a run's cancellation flag once the interpreter exits.
    /// Best effort: a poisoned lock here must not mask the run's
    /// outcome.
    fn remove_flag(&self, run_id: RunId) {
        if let Ok(mut flags) = self.cancel_flags.lock() {
            flags.remove(&run_id);
        }
    }
}
