//! Step domain model

use crate::core::{
    condition::Condition,
    config::StepConfig,
    state::StepState,
    template::{self, TemplateError},
};
use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// What a step does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// Run a shell command
    Run { command: String },
    /// Restore a keyed cache, or save it after the entry succeeds
    Cache { key: String, path: String },
    /// Render a template file into a new file
    Template { source: String, destination: String },
    /// Publish an artifact to the package registry
    Publish {
        package: String,
        version: String,
        artifact: String,
    },
    /// Delete all but the `keep` most recent versions of a package
    Prune { package: String, keep: usize },
}

impl StepAction {
    pub fn kind(&self) -> &'static str {
        match self {
            StepAction::Run { .. } => "run",
            StepAction::Cache { .. } => "cache",
            StepAction::Template { .. } => "template",
            StepAction::Publish { .. } => "publish",
            StepAction::Prune { .. } => "prune",
        }
    }

    /// Render every templated field of the action
    pub fn render(&self, vars: &HashMap<String, String>) -> Result<StepAction, TemplateError> {
        let r = |s: &str| template::render(s, vars);
        Ok(match self {
            StepAction::Run { command } => StepAction::Run { command: r(command)? },
            StepAction::Cache { key, path } => StepAction::Cache {
                key: r(key)?,
                path: r(path)?,
            },
            StepAction::Template { source, destination } => StepAction::Template {
                source: r(source)?,
                destination: r(destination)?,
            },
            StepAction::Publish {
                package,
                version,
                artifact,
            } => StepAction::Publish {
                package: r(package)?,
                version: r(version)?,
                artifact: r(artifact)?,
            },
            StepAction::Prune { package, keep } => StepAction::Prune {
                package: r(package)?,
                keep: *keep,
            },
        })
    }
}

/// A single step of an entry's pipeline
#[derive(Debug, Clone)]
pub struct Step {
    /// Unique step identifier
    pub id: String,

    /// Display name
    pub name: String,

    pub action: StepAction,

    /// Gate evaluated against the entry context before running
    pub condition: Option<Condition>,

    /// Failures are logged and ignored instead of stopping the entry
    pub continue_on_error: bool,

    pub env: BTreeMap<String, String>,

    pub working_directory: Option<String>,

    pub timeout_secs: Option<u64>,

    /// Runtime state
    pub state: StepState,
}

impl Step {
    /// Create a step from a step config
    pub fn from_config(config: &StepConfig) -> Result<Self> {
        let action = if let Some(command) = &config.run {
            StepAction::Run {
                command: command.clone(),
            }
        } else if let Some(cache) = &config.cache {
            StepAction::Cache {
                key: cache.key.clone(),
                path: cache.path.clone(),
            }
        } else if let Some(t) = &config.template {
            StepAction::Template {
                source: t.source.clone(),
                destination: t.destination.clone(),
            }
        } else if let Some(p) = &config.publish {
            StepAction::Publish {
                package: p.package.clone(),
                version: p.version.clone(),
                artifact: p.artifact.clone(),
            }
        } else if let Some(p) = &config.prune {
            StepAction::Prune {
                package: p.package.clone(),
                keep: p.keep,
            }
        } else {
            anyhow::bail!("Step '{}' has no action", config.id);
        };

        let condition = config
            .condition
            .as_deref()
            .map(Condition::parse)
            .transpose()?;

        Ok(Step {
            id: config.id.clone(),
            name: config.name.clone().unwrap_or_else(|| config.id.clone()),
            action,
            condition,
            continue_on_error: config.continue_on_error,
            env: config.env.clone(),
            working_directory: config.working_directory.clone(),
            timeout_secs: config.timeout_secs,
            state: StepState::Pending,
        })
    }

    /// Whether the step's condition allows it to run
    pub fn should_run(&self, vars: &HashMap<String, String>) -> bool {
        self.condition.as_ref().map_or(true, |c| c.evaluate(vars))
    }

    /// Whether the step still runs once its entry has failed (`if: always()`)
    pub fn runs_after_failure(&self, vars: &HashMap<String, String>) -> bool {
        self.condition
            .as_ref()
            .is_some_and(|c| c.evaluate_after_failure(vars))
    }

    /// Render env values with variable substitution
    pub fn render_env(
        &self,
        vars: &HashMap<String, String>,
    ) -> Result<BTreeMap<String, String>, TemplateError> {
        self.env
            .iter()
            .map(|(k, v)| Ok((k.clone(), template::render(v, vars)?)))
            .collect()
    }

    pub fn render_working_directory(
        &self,
        vars: &HashMap<String, String>,
    ) -> Result<Option<String>, TemplateError> {
        self.working_directory
            .as_deref()
            .map(|dir| template::render(dir, vars))
            .transpose()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.action.kind())
    }
}
