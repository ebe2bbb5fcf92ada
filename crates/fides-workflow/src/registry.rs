//! Workflow definitions and the TOML configuration schema.
//!
//! A `WorkflowConfig` is deserialized from TOML and holds the set of
//! workflows the platform may run.  Definitions are declarative: an
//! ordered list of step names plus optional duration bounds.  The
//! actual step implementations are registered on the runner by name.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use fides_contracts::error::{FidesError, FidesResult};

/// A single workflow definition loaded from TOML.
///
/// Example:
/// ```toml
/// [[workflows]]
/// id = "sales-forecast-refresh"
/// description = "Rebuild the sales forecast from fresh history"
/// steps = ["load-history", "compute-forecast", "publish-kpis"]
/// run_timeout_ms = 60000
/// step_timeout_ms = 10000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSpec {
    /// Stable identifier callers use to start runs.
    pub id: String,

    /// Human-readable explanation of what this workflow does.
    pub description: String,

    /// Disabled workflows stay visible in configuration but refuse to
    /// start.  Defaults to enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Step names in execution order.  Each name must have a handler
    /// registered on the runner before the workflow can start.
    pub steps: Vec<String>,

    /// Whole-run duration bound in milliseconds, checked at step
    /// boundaries.  Absent means unbounded.
    pub run_timeout_ms: Option<u64>,

    /// Per-step duration bound in milliseconds, checked after each
    /// step handler returns.  Absent means unbounded.
    pub step_timeout_ms: Option<u64>,
}

fn default_enabled() -> bool {
    true
}

/// The top-level structure deserialized from a TOML workflow file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub workflows: Vec<WorkflowSpec>,
}

/// Lookup table of workflow definitions, validated at load time.
#[derive(Debug)]
pub struct WorkflowRegistry {
    workflows: HashMap<String, WorkflowSpec>,
}

impl WorkflowRegistry {
    /// Parse `s` as TOML and build a registry.
    ///
    /// Returns `FidesError::Config` if the TOML is malformed, does not
    /// match the `WorkflowConfig` schema, or declares the same
    /// workflow id twice.
    pub fn from_toml_str(s: &str) -> FidesResult<Self> {
        let config: WorkflowConfig = toml::from_str(s).map_err(|e| FidesError::Config {
            reason: format!("failed to parse workflow TOML: {}", e),
        })?;
        Self::from_config(config)
    }

    /// Read the file at `path` and parse it as TOML workflow
    /// configuration.
    pub fn from_file(path: &Path) -> FidesResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| FidesError::Config {
            reason: format!("failed to read workflow file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Build a registry from an already-deserialized config.
    pub fn from_config(config: WorkflowConfig) -> FidesResult<Self> {
        let mut workflows = HashMap::with_capacity(config.workflows.len());
        for spec in config.workflows {
            if workflows.contains_key(&spec.id) {
                return Err(FidesError::Config {
                    reason: format!("duplicate workflow id '{}'", spec.id),
                });
            }
            workflows.insert(spec.id.clone(), spec);
        }
        Ok(Self { workflows })
    }

    /// Look up a workflow definition by id.
    pub fn get(&self, id: &str) -> Option<&WorkflowSpec> {
        self.workflows.get(id)
    }

    /// Declared workflow ids, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.workflows.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}
