//! Workflow configuration from YAML

use crate::core::{condition::Condition, Workflow};
use crate::profile::ProfileStore;
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Default number of package versions kept by `prune` steps
pub const DEFAULT_RETENTION: usize = 5;

/// Top-level workflow configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow name
    pub name: String,

    /// Events that trigger the workflow
    #[serde(default, rename = "on")]
    pub trigger: TriggerConfig,

    /// Build matrix, one pipeline per entry
    pub matrix: Vec<MatrixEntryConfig>,

    /// Global variables available to all steps
    #[serde(default)]
    variables: HashMap<String, Value>,

    /// Package feed used by `publish` and `prune` steps
    #[serde(default)]
    pub registry: Option<RegistryConfig>,

    /// Maximum number of matrix entries running at once
    #[serde(default)]
    pub max_parallel: Option<usize>,

    /// Steps run, in order, for every matrix entry
    pub steps: Vec<StepConfig>,
}

/// Trigger surface: pushes to named branches and pull requests
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default, deserialize_with = "present_filter")]
    pub push: Option<BranchFilter>,

    #[serde(default, deserialize_with = "present_filter")]
    pub pull_request: Option<BranchFilter>,
}

/// A bare `pull_request:` key is present even though its value is null
fn present_filter<'de, D: Deserializer<'de>>(de: D) -> Result<Option<BranchFilter>, D::Error> {
    Ok(Some(Option::<BranchFilter>::deserialize(de)?.unwrap_or_default()))
}

/// Branch patterns; an empty list matches every branch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BranchFilter {
    #[serde(default)]
    pub branches: Vec<String>,
}

/// One (OS, architecture) entry of the build matrix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixEntryConfig {
    /// Human-readable name
    pub name: String,

    pub os: String,

    pub arch: String,

    pub build_dir: String,

    pub cache_dir: String,

    /// Cross-compile profile used by this entry
    #[serde(default)]
    pub profile: Option<String>,

    /// Entry-specific variables (override workflow variables)
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

/// Local package feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Directory holding the feed
    pub path: String,
}

/// Step configuration as defined in YAML
///
/// Exactly one of `run`, `cache`, `template`, `publish` or `prune` must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepConfig {
    /// Unique step identifier
    pub id: String,

    /// Human-readable step name
    #[serde(default)]
    pub name: Option<String>,

    /// Condition gating the step
    #[serde(default, rename = "if")]
    pub condition: Option<String>,

    /// Whether a failure of this step lets the entry continue
    #[serde(default)]
    pub continue_on_error: bool,

    /// Extra environment for `run` steps
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub working_directory: Option<String>,

    /// Optional timeout; none means wait for completion
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub run: Option<String>,

    #[serde(default)]
    pub cache: Option<CacheConfig>,

    #[serde(default)]
    pub template: Option<TemplateConfig>,

    #[serde(default)]
    pub publish: Option<PublishConfig>,

    #[serde(default)]
    pub prune: Option<PruneConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub key: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub source: String,
    pub destination: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    pub package: String,
    pub version: String,
    pub artifact: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruneConfig {
    pub package: String,

    #[serde(default = "default_keep")]
    pub keep: usize,
}

fn default_keep() -> usize {
    DEFAULT_RETENTION
}

impl StepConfig {
    /// Number of action keys set on the step
    fn action_count(&self) -> usize {
        [
            self.run.is_some(),
            self.cache.is_some(),
            self.template.is_some(),
            self.publish.is_some(),
            self.prune.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }
}

impl WorkflowConfig {
    /// Load workflow configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse workflow configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: WorkflowConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the workflow configuration
    pub fn validate(&self) -> Result<()> {
        if self.matrix.is_empty() {
            anyhow::bail!("Workflow '{}' has an empty build matrix", self.name);
        }

        let mut seen_targets = HashSet::new();
        let mut seen_names = HashSet::new();
        for entry in &self.matrix {
            if !seen_targets.insert((entry.os.as_str(), entry.arch.as_str())) {
                anyhow::bail!("Duplicate matrix entry for {}/{}", entry.os, entry.arch);
            }
            if !seen_names.insert(entry.name.as_str()) {
                anyhow::bail!("Duplicate matrix entry name: {}", entry.name);
            }
        }

        if self.max_parallel == Some(0) {
            anyhow::bail!("max_parallel must be at least 1");
        }

        let mut seen_ids = HashSet::new();
        for step in &self.steps {
            if !seen_ids.insert(&step.id) {
                anyhow::bail!("Duplicate step ID: {}", step.id);
            }

            match step.action_count() {
                1 => {}
                0 => anyhow::bail!(
                    "Step '{}' has no action (expected one of run, cache, template, publish, prune)",
                    step.id
                ),
                _ => anyhow::bail!("Step '{}' has more than one action", step.id),
            }

            if let Some(expr) = &step.condition {
                Condition::parse(expr)
                    .map_err(|e| anyhow::anyhow!("Step '{}': {}", step.id, e))?;
            }

            if let Some(prune) = &step.prune {
                if prune.keep == 0 {
                    anyhow::bail!("Step '{}' must keep at least one version", step.id);
                }
            }

            if step.timeout_secs == Some(0) {
                anyhow::bail!("Step '{}' has a zero timeout", step.id);
            }
        }

        Ok(())
    }

    /// Check that every profile referenced by the matrix exists in the store
    pub fn validate_profiles(&self, profiles: &ProfileStore) -> Result<()> {
        for entry in &self.matrix {
            if let Some(name) = &entry.profile {
                if !profiles.contains(name) {
                    anyhow::bail!(
                        "Matrix entry '{}' references unknown profile '{}'",
                        entry.name,
                        name
                    );
                }
            }
        }
        Ok(())
    }

    /// Workflow variables rendered as strings
    pub fn variables_as_string_map(&self) -> HashMap<String, String> {
        self.variables
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    Value::Bool(b) => b.to_string(),
                    Value::Number(n) => n.to_string(),
                    Value::Null => String::new(),
                    other => serde_yaml::to_string(other)
                        .unwrap_or_default()
                        .trim_end()
                        .to_string(),
                };
                (key.clone(), rendered)
            })
            .collect()
    }

    /// Number of workflow-level variables
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Convert config to a Workflow domain model
    pub fn to_workflow(&self) -> Result<Workflow> {
        Workflow::from_config(self)
    }
}

impl TriggerConfig {
    /// Whether an event on a branch triggers the workflow
    ///
    /// A workflow without any trigger section runs for every event.
    pub fn matches(&self, event: crate::core::TriggerEvent, branch: &str) -> bool {
        use crate::core::TriggerEvent;

        if self.push.is_none() && self.pull_request.is_none() {
            return true;
        }

        let filter = match event {
            TriggerEvent::Push => self.push.as_ref(),
            TriggerEvent::PullRequest => self.pull_request.as_ref(),
            TriggerEvent::Manual => return true,
        };

        filter.is_some_and(|f| f.matches(branch))
    }
}

impl BranchFilter {
    pub fn matches(&self, branch: &str) -> bool {
        self.branches.is_empty()
            || self.branches.iter().any(|pattern| match pattern.strip_suffix('*') {
                Some(prefix) => branch.starts_with(prefix),
                None => pattern == branch,
            })
    }
}
