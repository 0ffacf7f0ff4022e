//! Test: Matrix Isolation - entries run independently of each other

use crate::helpers::*;
use crossci::core::{ExecutionStatus, RunContext, TriggerEvent};
use crossci::execution::{ExecutionEngine, ExecutionEvent, SchedulingStrategy, StepExecutor};
use crossci::profile::ProfileStore;
use std::sync::{Arc, Mutex};

const YAML: &str = r#"
name: "Test: Matrix Isolation"
matrix:
  - { name: "macOS x64", os: macos, arch: x86_64, build_dir: /tmp/b1, cache_dir: /tmp/c1 }
  - { name: "macOS arm64", os: macos, arch: arm64, build_dir: /tmp/b2, cache_dir: /tmp/c2 }
  - { name: "Windows x64", os: windows, arch: x86_64, build_dir: /tmp/b3, cache_dir: /tmp/c3 }
steps:
  - id: deps
    run: "build.py install_deps -a {{ arch }} -o {{ os }}"
  - id: build
    run: "build.py build -a {{ arch }} -o {{ os }}"
  - id: package
    run: "build.py package -a {{ arch }} -o {{ os }}"
"#;

/// One failing entry does not stop or alter the others
#[tokio::test]
async fn test_failing_entry_is_isolated() {
    let runner = MockRunner::new().failing_on("build -a arm64", 1);
    let result = run_workflow_with_mock(YAML, runner.clone(), "main").await;

    assert!(!result.is_success());
    assert_eq!(result.run.status, ExecutionStatus::Failed);

    assert_entry_failed(&result, "macOS arm64");
    assert_step_skipped(&result, "macOS arm64", "package", "previous step failed");
    assert!(!runner.ran("package -a arm64"));

    for entry in ["macOS x64", "Windows x64"] {
        assert_entry_completed(&result, entry);
        assert_execution_order(&result, entry, &["deps", "build", "package"]);
    }
}

/// Entries come back in declaration order whatever order they finish in
#[tokio::test]
async fn test_results_keep_matrix_order() {
    let result = run_workflow_with_mock(YAML, MockRunner::new(), "main").await;
    let names: Vec<&str> = result
        .run
        .entries
        .iter()
        .map(|p| p.entry.name.as_str())
        .collect();
    assert_eq!(names, vec!["macOS x64", "macOS arm64", "Windows x64"]);
    assert!(result.is_success());
}

/// Sequential scheduling runs whole entries one after another
#[tokio::test]
async fn test_sequential_strategy_does_not_interleave() {
    let runner = MockRunner::new();
    let engine = ExecutionEngine::new(StepExecutor::new(runner.clone()))
        .with_strategy(SchedulingStrategy::Sequential);

    let run = engine
        .execute(
            &workflow_from_yaml(YAML),
            &RunContext::new("main", TriggerEvent::Push),
            &ProfileStore::new(),
        )
        .await
        .unwrap();
    assert!(run.is_success());

    let commands = runner.commands();
    assert_eq!(commands.len(), 9);
    let mut targets = Vec::new();
    for block in commands.chunks(3) {
        let target = block[0].split_once(" -a ").unwrap().1;
        assert!(block.iter().all(|c| c.ends_with(target)), "{:?}", commands);
        targets.push(target.to_string());
    }
    targets.sort();
    targets.dedup();
    assert_eq!(targets.len(), 3);
}

/// Events bracket the run and report each entry once
#[tokio::test]
async fn test_events_cover_every_entry() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let engine = ExecutionEngine::new(StepExecutor::new(MockRunner::new()));
    let sink = events.clone();
    engine
        .add_event_handler(move |event| sink.lock().unwrap().push(event))
        .await;

    engine
        .execute(
            &workflow_from_yaml(YAML),
            &RunContext::new("main", TriggerEvent::Push),
            &ProfileStore::new(),
        )
        .await
        .unwrap();

    let events = events.lock().unwrap();
    assert!(matches!(
        events.first(),
        Some(ExecutionEvent::WorkflowStarted { entries: 3, .. })
    ));
    assert!(matches!(
        events.last(),
        Some(ExecutionEvent::WorkflowFinished {
            status: ExecutionStatus::Completed,
            ..
        })
    ));
    let finished = events
        .iter()
        .filter(|e| matches!(e, ExecutionEvent::EntryFinished { .. }))
        .count();
    assert_eq!(finished, 3);
}

/// Entry filters narrow the matrix by name or target
#[tokio::test]
async fn test_entry_filter() {
    let mut workflow = workflow_from_yaml(YAML);
    workflow.retain_entries(&["windows/x86_64".to_string(), "macOS arm64".to_string()]);

    let result = run_with_executor(
        StepExecutor::new(MockRunner::new()),
        &workflow,
        &RunContext::new("main", TriggerEvent::Push),
        &ProfileStore::new(),
    )
    .await;
    assert_eq!(result.run.entries.len(), 2);
    assert!(result.run.entry("macOS x64").is_none());
}
