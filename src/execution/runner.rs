//! Command runners - how `run` steps reach the operating system

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Error types for command execution
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command exited with code {code}: {stderr}")]
    Failed { code: i32, stderr: String },

    #[error("timeout after {0} seconds")]
    Timeout(u64),
}

/// A shell command with its environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub command: String,
    pub env: BTreeMap<String, String>,
    pub working_directory: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

impl CommandInvocation {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            env: BTreeMap::new(),
            working_directory: None,
            timeout_secs: None,
        }
    }
}

/// Captured result of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Trait for command execution - allows for different implementations
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion; a non-zero exit is an error
    async fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutput, RunnerError>;
}

/// Runs commands through the platform shell (`sh -c` or `cmd /C`)
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
    flag: String,
}

impl ShellRunner {
    pub fn new() -> Self {
        if cfg!(windows) {
            Self::with_shell("cmd", "/C")
        } else {
            Self::with_shell("sh", "-c")
        }
    }

    pub fn with_shell(shell: impl Into<String>, flag: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            flag: flag.into(),
        }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutput, RunnerError> {
        let mut command = Command::new(&self.shell);
        command
            .arg(&self.flag)
            .arg(&invocation.command)
            .envs(&invocation.env)
            .kill_on_drop(true);
        if let Some(dir) = &invocation.working_directory {
            command.current_dir(dir);
        }

        let spawn_err = |source| RunnerError::Spawn {
            program: self.shell.clone(),
            source,
        };

        let output = match invocation.timeout_secs {
            Some(secs) => timeout(Duration::from_secs(secs), command.output())
                .await
                .map_err(|_| RunnerError::Timeout(secs))?
                .map_err(spawn_err)?,
            None => command.output().await.map_err(spawn_err)?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            warn!("Command exited with code {}: {}", code, stderr.trim());
            return Err(RunnerError::Failed {
                code,
                stderr: stderr.trim().to_string(),
            });
        }

        debug!("Command returned {} bytes of output", stdout.len());
        Ok(CommandOutput { stdout, stderr })
    }
}

/// Records commands instead of running them
///
/// The executor logs each command, with secrets redacted, before it gets here.
#[derive(Debug, Clone, Default)]
pub struct DryRunRunner {
    commands: Arc<Mutex<Vec<CommandInvocation>>>,
}

impl DryRunRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands seen so far, in order
    pub async fn commands(&self) -> Vec<CommandInvocation> {
        self.commands.lock().await.clone()
    }
}

#[async_trait]
impl CommandRunner for DryRunRunner {
    async fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutput, RunnerError> {
        self.commands.lock().await.push(invocation.clone());
        Ok(CommandOutput::default())
    }
}
