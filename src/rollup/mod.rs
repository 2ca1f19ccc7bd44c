//! Roll-up collaborator interface
//!
//! Roll-up derives a parent node's assessment from its children. The
//! algorithm lives outside this crate; the session only needs to load a
//! scenario definition, ask which parents changed after an edit, and learn
//! the scenario name so it can find the published score.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::assessment::PerformanceTree;

/// Structural information about the running scenario
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScenarioInfo {
    /// Scenario name; matches the root name of the published score
    pub name: String,
}

impl ScenarioInfo {
    /// Creates scenario info for `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Failures while loading a scenario definition
#[derive(Debug, Error)]
pub enum RollupError {
    /// No scenario definition exists; typical of logs recorded before
    /// definitions were captured. Roll-up is disabled for the session.
    #[error("Scenario definition not found: {0}")]
    NotFound(PathBuf),

    /// The definition exists but could not be read or parsed
    #[error("Failed to load scenario definition {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl RollupError {
    /// Returns true for the non-fatal "definition missing" case
    pub fn is_not_found(&self) -> bool {
        matches!(self, RollupError::NotFound(_))
    }
}

/// Pluggable roll-up engine.
pub trait RollupEngine: Send {
    /// Loads the scenario definition.
    fn load(&mut self, scenario_definition: &Path) -> Result<(), RollupError>;

    /// Recomputes ancestors of `edited_node` in `tree` in place and returns
    /// the names of nodes whose computed level changed.
    fn apply_and_roll_up(&mut self, edited_node: &str, tree: &mut PerformanceTree) -> Vec<String>;

    /// Scenario information, once loaded
    fn scenario(&self) -> Option<&ScenarioInfo>;
}
