//! Test utility functions for crossci
#![allow(dead_code)]

use async_trait::async_trait;
use crossci::core::config::WorkflowConfig;
use crossci::core::{EntryPipeline, ExecutionStatus, RunContext, StepState, TriggerEvent, Workflow};
use crossci::execution::{
    CommandInvocation, CommandOutput, CommandRunner, ExecutionEngine, RunnerError, StepExecutor,
    WorkflowRun,
};
use crossci::profile::ProfileStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock runner that records commands and fails the ones it is told to
///
/// Clones share their recordings, so a test can keep one handle while the
/// engine owns another.
#[derive(Clone, Default)]
pub struct MockRunner {
    commands: Arc<Mutex<Vec<String>>>,
    failures: Arc<HashMap<String, i32>>,
    outputs: Arc<HashMap<String, String>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every command containing `needle` with `code`
    pub fn failing_on(mut self, needle: &str, code: i32) -> Self {
        Arc::make_mut(&mut self.failures).insert(needle.to_string(), code);
        self
    }

    /// Print `stdout` for every command containing `needle`
    pub fn with_output(mut self, needle: &str, stdout: &str) -> Self {
        Arc::make_mut(&mut self.outputs).insert(needle.to_string(), stdout.to_string());
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Whether any recorded command contains `needle`
    pub fn ran(&self, needle: &str) -> bool {
        self.commands().iter().any(|c| c.contains(needle))
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutput, RunnerError> {
        self.commands
            .lock()
            .unwrap()
            .push(invocation.command.clone());

        if let Some((_, code)) = self
            .failures
            .iter()
            .find(|(needle, _)| invocation.command.contains(needle.as_str()))
        {
            return Err(RunnerError::Failed {
                code: *code,
                stderr: format!("`{}` failed", invocation.command),
            });
        }

        let stdout = self
            .outputs
            .iter()
            .find(|(needle, _)| invocation.command.contains(needle.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_default();
        Ok(CommandOutput {
            stdout,
            stderr: String::new(),
        })
    }
}

/// Result of a test run
pub struct WorkflowTestResult {
    pub run: WorkflowRun,
}

impl WorkflowTestResult {
    pub fn is_success(&self) -> bool {
        self.run.status == ExecutionStatus::Completed
    }

    pub fn entry(&self, name: &str) -> &EntryPipeline {
        self.run
            .entry(name)
            .unwrap_or_else(|| panic!("entry '{}' not in run", name))
    }

    pub fn step_state(&self, entry: &str, step_id: &str) -> &StepState {
        &self
            .entry(entry)
            .step(step_id)
            .unwrap_or_else(|| panic!("step '{}' not in entry '{}'", step_id, entry))
            .state
    }

    pub fn step_output(&self, entry: &str, step_id: &str) -> Option<String> {
        match self.step_state(entry, step_id) {
            StepState::Completed { output, .. } => Some(output.clone()),
            _ => None,
        }
    }

    pub fn executed(&self, entry: &str) -> Vec<String> {
        self.entry(entry)
            .executed_steps()
            .into_iter()
            .map(String::from)
            .collect()
    }

    pub fn summary(&self) -> String {
        self.run
            .entries
            .iter()
            .map(|p| format!("{}: {:?} {:?}", p.entry.name, p.state.status, p.executed_steps()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn workflow_from_yaml(yaml: &str) -> Workflow {
    WorkflowConfig::from_yaml(yaml)
        .expect("valid workflow yaml")
        .to_workflow()
        .expect("workflow builds")
}

/// Run a workflow with an executor on a branch/event
pub async fn run_with_executor<R: CommandRunner + 'static>(
    executor: StepExecutor<R>,
    workflow: &Workflow,
    run: &RunContext,
    profiles: &ProfileStore,
) -> WorkflowTestResult {
    let engine = ExecutionEngine::new(executor);
    let run = engine
        .execute(workflow, run, profiles)
        .await
        .expect("workflow executes");
    WorkflowTestResult { run }
}

/// Run a workflow with a mock runner as a push to `branch`
pub async fn run_workflow_with_mock(
    yaml: &str,
    runner: MockRunner,
    branch: &str,
) -> WorkflowTestResult {
    let workflow = workflow_from_yaml(yaml);
    run_with_executor(
        StepExecutor::new(runner),
        &workflow,
        &RunContext::new(branch, TriggerEvent::Push),
        &ProfileStore::new(),
    )
    .await
}

pub fn assert_entry_completed(result: &WorkflowTestResult, entry: &str) {
    assert_eq!(
        result.entry(entry).state.status,
        ExecutionStatus::Completed,
        "entry '{}' should have completed\n{}",
        entry,
        result.summary()
    );
}

pub fn assert_entry_failed(result: &WorkflowTestResult, entry: &str) {
    assert_eq!(
        result.entry(entry).state.status,
        ExecutionStatus::Failed,
        "entry '{}' should have failed\n{}",
        entry,
        result.summary()
    );
}

pub fn assert_step_skipped(result: &WorkflowTestResult, entry: &str, step_id: &str, reason: &str) {
    match result.step_state(entry, step_id) {
        StepState::Skipped { reason: actual } => assert_eq!(actual, reason),
        other => panic!(
            "step '{}' of '{}' should be skipped, was {:?}",
            step_id, entry, other
        ),
    }
}

pub fn assert_step_failed(result: &WorkflowTestResult, entry: &str, step_id: &str, tolerated: bool) {
    match result.step_state(entry, step_id) {
        StepState::Failed { tolerated: actual, .. } => assert_eq!(
            *actual, tolerated,
            "step '{}' of '{}' tolerated flag",
            step_id, entry
        ),
        other => panic!(
            "step '{}' of '{}' should have failed, was {:?}",
            step_id, entry, other
        ),
    }
}

pub fn assert_execution_order(result: &WorkflowTestResult, entry: &str, expected: &[&str]) {
    assert_eq!(
        result.executed(entry),
        expected.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        "execution order of '{}'",
        entry
    );
}
