//! # fides-workflow
//!
//! Declarative workflow definitions and the bounded-duration run tracker
//! for the fides trust core.
//!
//! ## Overview
//!
//! Workflows are declared in TOML as an ordered list of step names with
//! optional duration bounds; step implementations are registered on the
//! [`WorkflowRunner`] by name.  The runner interprets steps strictly in
//! sequence, records every outcome on the run, enforces run and step
//! budgets at step boundaries, honors cooperative cancellation, and
//! drives each run to exactly one terminal state.  Run lifecycle events
//! are appended to the audit ledger: a run that cannot be audited as
//! started never begins.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fides_workflow::{WorkflowRegistry, WorkflowRunner, InMemoryRunStore};
//!
//! let registry = WorkflowRegistry::from_file(Path::new("workflows.toml"))?;
//! let mut runner = WorkflowRunner::new(registry, ledger, Arc::new(InMemoryRunStore::new()));
//! runner.register_handler("load-history", Box::new(LoadHistory));
//!
//! let run = runner.start(&WorkflowId::new("sales-forecast-refresh"), input, Some("analyst"))?;
//! assert!(run.is_terminal());
//! ```

pub mod handler;
pub mod registry;
pub mod runner;
pub mod store;

pub use handler::{StepContext, StepHandler};
pub use registry::{WorkflowConfig, WorkflowRegistry, WorkflowSpec};
pub use runner::WorkflowRunner;
pub use store::{InMemoryRunStore, RunStore};

// ── Tests ─────────────────────────────────────────────────────────────────────
