//! Run and entry contexts - the data conditions and templates see

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// What triggered the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
    Push,
    PullRequest,
    Manual,
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriggerEvent::Push => "push",
            TriggerEvent::PullRequest => "pull_request",
            TriggerEvent::Manual => "manual",
        };
        f.write_str(s)
    }
}

/// Metadata about a run, supplied explicitly by the caller
///
/// Secrets live here rather than being read from the process environment, so
/// the orchestrator only ever sees the values it was handed.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub branch: String,
    pub event: TriggerEvent,
    pub variables: HashMap<String, String>,
    pub secrets: HashMap<String, String>,
}

impl RunContext {
    pub fn new(branch: impl Into<String>, event: TriggerEvent) -> Self {
        Self {
            branch: branch.into(),
            event,
            variables: HashMap::new(),
            secrets: HashMap::new(),
        }
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn with_secret(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(key.into(), value.into());
        self
    }
}

/// Mutable context of one matrix entry while its steps run
#[derive(Debug, Clone)]
pub struct EntryContext {
    /// Workflow, entry, profile and run variables
    pub variables: HashMap<String, String>,

    /// Outputs from completed steps (step_id -> output)
    pub step_outputs: HashMap<String, String>,

    /// Secrets, only visible to templates as `secrets.<name>`
    secrets: HashMap<String, String>,

    /// Cache saves to perform once the entry finishes without a fatal failure
    pub pending_cache_saves: Vec<PendingCacheSave>,
}

/// A cache that missed on restore and should be populated after the job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCacheSave {
    pub key: String,
    pub path: String,
}

impl EntryContext {
    pub fn new(variables: HashMap<String, String>, secrets: HashMap<String, String>) -> Self {
        Self {
            variables,
            step_outputs: HashMap::new(),
            secrets,
            pending_cache_saves: Vec::new(),
        }
    }

    pub fn set_variable(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    pub fn get_variable(&self, key: &str) -> Option<&String> {
        self.variables.get(key)
    }

    pub fn set_step_output(&mut self, step_id: &str, output: String) {
        self.step_outputs.insert(step_id.to_string(), output);
    }

    /// Variables visible to `if:` conditions (no secrets)
    pub fn condition_variables(&self) -> &HashMap<String, String> {
        &self.variables
    }

    /// Get all variables available for template rendering
    pub fn get_rendering_variables(&self) -> HashMap<String, String> {
        let mut vars = self.variables.clone();

        for (step_id, output) in &self.step_outputs {
            vars.insert(format!("steps.{}.output", step_id), output.trim_end().to_string());
        }

        for (name, value) in &self.secrets {
            vars.insert(format!("secrets.{}", name), value.clone());
        }

        vars
    }

    /// Replace every secret value in `text` with `***`
    pub fn redact(&self, text: &str) -> String {
        let mut redacted = text.to_string();
        for value in self.secrets.values().filter(|v| !v.is_empty()) {
            redacted = redacted.replace(value.as_str(), "***");
        }
        redacted
    }
}
