//! Storage seam for workflow runs.

use std::collections::HashMap;
use std::sync::Mutex;

use fides_contracts::{
    error::{FidesError, FidesResult},
    workflow::{RunId, WorkflowRun},
};

/// Keyed persistence for workflow runs.
///
/// The runner writes through on every state change, so a crashed
/// process leaves behind the last persisted snapshot of each run.
pub trait RunStore: Send + Sync {
    /// Insert or replace the stored snapshot of `run`.
    fn put(&self, run: &WorkflowRun) -> FidesResult<()>;

    /// The stored snapshot, or `None` for an unknown id.
    fn get(&self, run_id: RunId) -> FidesResult<Option<WorkflowRun>>;
}

/// Reference `RunStore` backed by a `HashMap` behind a `Mutex`.
#[derive(Default)]
pub struct InMemoryRunStore {
    runs: Mutex<HashMap<RunId, WorkflowRun>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> FidesResult<std::sync::MutexGuard<'_, HashMap<RunId, WorkflowRun>>> {
        self.runs.lock().map_err(|e| FidesError::StoreUnavailable {
            reason: format!("run store lock poisoned: {}", e),
        })
    }
}

impl RunStore for InMemoryRunStore {
    fn put(&self, run: &WorkflowRun) -> FidesResult<()> {
        self.lock()?.insert(run.id, run.clone());
        Ok(())
    }

    fn get(&self, run_id: RunId) -> FidesResult<Option<WorkflowRun>> {
        Ok(self.lock()?.get(&run_id).cloned())
    }
}
