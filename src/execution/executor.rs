//! Step executor - runs individual steps of an entry

use crate::{
    core::{EntryContext, PendingCacheSave, Step, StepAction},
    execution::{
        cache::CacheManager,
        runner::{CommandInvocation, CommandRunner},
    },
    registry::{prune_versions, PackageRegistry},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of executing a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Step completed successfully
    Success { output: String },
    /// Step failed; whether that stops the entry is the engine's call
    Failed { error: String },
}

/// Executes a single step
pub struct StepExecutor<R> {
    runner: R,
    cache: Option<Arc<CacheManager>>,
    registry: Option<Arc<dyn PackageRegistry>>,
}

impl<R: CommandRunner> StepExecutor<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            cache: None,
            registry: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<CacheManager>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_registry(mut self, registry: Arc<dyn PackageRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Execute a step and return the result
    ///
    /// The step's condition is not checked here. Placeholders are rendered
    /// against the context first; an undefined placeholder fails the step.
    pub async fn execute(&self, step: &Step, context: &mut EntryContext) -> ExecutionResult {
        info!("Executing step: {}", step);

        let vars = context.get_rendering_variables();
        let action = match step.action.render(&vars) {
            Ok(action) => action,
            Err(e) => return Self::fail(step, context, e.to_string()),
        };

        let result = match action {
            StepAction::Run { command } => self.run_command(step, &command, context).await,
            StepAction::Cache { key, path } => self.restore_cache(key, path, context).await,
            StepAction::Template {
                source,
                destination,
            } => render_file(&source, &destination, &vars).await,
            StepAction::Publish {
                package,
                version,
                artifact,
            } => self.publish(&package, &version, Path::new(&artifact)).await,
            StepAction::Prune { package, keep } => self.prune(&package, keep).await,
        };

        match result {
            Ok(output) => {
                info!("Step {} completed successfully", step.id);
                context.set_step_output(&step.id, output.clone());
                ExecutionResult::Success { output }
            }
            Err(e) => Self::fail(step, context, e),
        }
    }

    fn fail(step: &Step, context: &EntryContext, error: String) -> ExecutionResult {
        let error = context.redact(&error);
        error!("Step {} failed: {}", step.id, error);
        ExecutionResult::Failed { error }
    }

    async fn run_command(
        &self,
        step: &Step,
        command: &str,
        context: &EntryContext,
    ) -> Result<String, String> {
        let vars = context.get_rendering_variables();
        let env = step.render_env(&vars).map_err(|e| e.to_string())?;
        let working_directory = step
            .render_working_directory(&vars)
            .map_err(|e| e.to_string())?
            .map(PathBuf::from);

        let invocation = CommandInvocation {
            command: command.to_string(),
            env,
            working_directory,
            timeout_secs: step.timeout_secs,
        };
        info!("[{}] $ {}", step.id, context.redact(command));

        let output = self
            .runner
            .run(&invocation)
            .await
            .map_err(|e| e.to_string())?;
        debug!(
            "Command output for step {}: {}",
            step.id,
            context.redact(output.stdout.trim_end())
        );
        Ok(output.stdout)
    }

    async fn restore_cache(
        &self,
        key: String,
        path: String,
        context: &mut EntryContext,
    ) -> Result<String, String> {
        let hit = match &self.cache {
            Some(cache) => cache
                .restore(&key, Path::new(&path))
                .await
                .map_err(|e| format!("{:#}", e))?,
            None => {
                warn!("No cache store configured, treating {} as a miss", key);
                false
            }
        };

        context.set_variable("cache_hit", hit.to_string());
        if hit {
            Ok(format!("restored {}", key))
        } else {
            context.pending_cache_saves.push(PendingCacheSave { key: key.clone(), path });
            Ok(format!("miss {}", key))
        }
    }

    async fn publish(&self, package: &str, version: &str, artifact: &Path) -> Result<String, String> {
        let registry = self.registry()?;
        let published = registry
            .publish(package, version, artifact)
            .await
            .map_err(|e| e.to_string())?;
        Ok(format!("{} {}", published.package, published.version))
    }

    async fn prune(&self, package: &str, keep: usize) -> Result<String, String> {
        let registry = self.registry()?;
        let deleted = prune_versions(registry.as_ref(), package, keep)
            .await
            .map_err(|e| e.to_string())?;
        Ok(deleted
            .iter()
            .map(|v| v.version.as_str())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn registry(&self) -> Result<&Arc<dyn PackageRegistry>, String> {
        self.registry
            .as_ref()
            .ok_or_else(|| "no package registry configured".to_string())
    }

    /// Save caches that missed during the entry
    ///
    /// Failures are logged and do not change the entry's outcome.
    pub async fn save_pending_caches(&self, context: &mut EntryContext) {
        let pending = std::mem::take(&mut context.pending_cache_saves);
        let Some(cache) = &self.cache else {
            return;
        };
        for save in pending {
            if let Err(e) = cache.save(&save.key, Path::new(&save.path)).await {
                warn!("Failed to save cache {}: {:#}", save.key, e);
            }
        }
    }
}

/// Render a template file into `destination`
async fn render_file(
    source: &str,
    destination: &str,
    vars: &std::collections::HashMap<String, String>,
) -> Result<String, String> {
    let content = tokio::fs::read_to_string(source)
        .await
        .map_err(|e| format!("failed to read template {}: {}", source, e))?;
    let rendered = crate::core::template::render(&content, vars).map_err(|e| e.to_string())?;

    let destination = Path::new(destination);
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| format!("failed to create {}: {}", parent.display(), e))?;
    }
    tokio::fs::write(destination, rendered)
        .await
        .map_err(|e| format!("failed to write {}: {}", destination.display(), e))?;
    Ok(destination.display().to_string())
}
