//! Workflow and per-entry pipeline domain models

use crate::core::{
    config::{TriggerConfig, WorkflowConfig},
    context::{EntryContext, RunContext},
    matrix::MatrixEntry,
    state::{EntryState, ExecutionStatus, StepState},
    step::Step,
};
use crate::profile::ProfileStore;
use anyhow::Result;
use std::collections::HashMap;
use std::path::PathBuf;

/// A loaded workflow: a step list applied to every matrix entry
#[derive(Debug, Clone)]
pub struct Workflow {
    /// Workflow name
    pub name: String,

    pub trigger: TriggerConfig,

    pub entries: Vec<MatrixEntry>,

    /// Global variables available to all steps
    pub variables: HashMap<String, String>,

    /// Step template shared by every entry
    pub steps: Vec<Step>,

    /// Directory of the local package feed, if configured
    pub registry_path: Option<PathBuf>,

    pub max_parallel: Option<usize>,
}

impl Workflow {
    /// Create a workflow from configuration
    pub fn from_config(config: &WorkflowConfig) -> Result<Self> {
        let steps = config
            .steps
            .iter()
            .map(Step::from_config)
            .collect::<Result<Vec<_>>>()?;

        Ok(Workflow {
            name: config.name.clone(),
            trigger: config.trigger.clone(),
            entries: config.matrix.iter().map(MatrixEntry::from_config).collect(),
            variables: config.variables_as_string_map(),
            steps,
            registry_path: config
                .registry
                .as_ref()
                .map(|r| crate::core::matrix::expand_home(&r.path)),
            max_parallel: config.max_parallel,
        })
    }

    /// Keep only the entries whose name or `os/arch` target matches
    pub fn retain_entries(&mut self, filters: &[String]) {
        if filters.is_empty() {
            return;
        }
        self.entries
            .retain(|e| filters.iter().any(|f| *f == e.name || *f == e.target()));
    }

    /// Build the pipelines of every matrix entry
    pub fn pipelines(&self) -> Vec<EntryPipeline> {
        self.entries
            .iter()
            .map(|entry| EntryPipeline::new(entry.clone(), self.steps.clone()))
            .collect()
    }

    /// Build the starting context of an entry
    ///
    /// Later sources override earlier ones: workflow variables, run variables,
    /// entry variables, profile variables, then run metadata.
    pub fn entry_context(
        &self,
        entry: &MatrixEntry,
        run: &RunContext,
        profiles: &ProfileStore,
    ) -> Result<EntryContext> {
        let mut vars = self.variables.clone();
        vars.extend(run.variables.clone());
        vars.extend(entry.variables());

        if let Some(profile_name) = &entry.profile {
            let profile = profiles.get(profile_name)?;
            vars.extend(profile.template_variables());
        }

        vars.insert("workflow".to_string(), self.name.clone());
        vars.insert("branch".to_string(), run.branch.clone());
        vars.insert("event".to_string(), run.event.to_string());

        Ok(EntryContext::new(vars, run.secrets.clone()))
    }
}

/// The steps of one matrix entry and their runtime state
#[derive(Debug, Clone)]
pub struct EntryPipeline {
    pub entry: MatrixEntry,

    /// Steps in declaration order
    pub steps: Vec<Step>,

    /// Execution state
    pub state: EntryState,
}

impl EntryPipeline {
    pub fn new(entry: MatrixEntry, steps: Vec<Step>) -> Self {
        Self {
            entry,
            steps,
            state: EntryState::new(),
        }
    }

    /// Get a step by ID
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Index of the next step to run
    pub fn next_pending(&self) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| matches!(s.state, StepState::Pending))
    }

    /// Mark every step that has not run yet as skipped
    pub fn skip_remaining(&mut self, reason: &str) {
        for step in self.steps.iter_mut().filter(|s| !s.state.is_terminal()) {
            step.state = StepState::Skipped {
                reason: reason.to_string(),
            };
        }
    }

    /// Check if every step reached a terminal state
    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|s| s.state.is_terminal())
    }

    /// Check if a fatal failure occurred
    pub fn has_failed(&self) -> bool {
        self.state.status == ExecutionStatus::Failed
            || self.steps.iter().any(|s| s.state.is_fatal_failure())
    }

    /// IDs of steps that actually ran, in order
    pub fn executed_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.state.was_executed())
            .map(|s| s.id.as_str())
            .collect()
    }

    pub fn update_counts(&mut self) {
        self.state.update_counts(self.steps.iter().map(|s| &s.state));
    }
}
