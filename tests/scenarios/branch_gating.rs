//! Test: Branch Gating - `if:` conditions and workflow triggers

use crate::helpers::*;
use crossci::core::{RunContext, TriggerEvent};
use crossci::execution::StepExecutor;
use crossci::profile::ProfileStore;
use crossci::registry::InMemoryRegistry;
use crossci::PackageRegistry;
use std::sync::Arc;

const YAML: &str = r#"
name: "Test: Branch Gating"
on:
  push:
    branches: ["main", "release/*"]
  pull_request:
matrix:
  - { name: "macOS x64", os: macos, arch: x86_64, build_dir: /tmp/b1, cache_dir: /tmp/c1 }
  - { name: "Windows x64", os: windows, arch: x86_64, build_dir: /tmp/b2, cache_dir: /tmp/c2 }
variables:
  version: "1.22.0"
steps:
  - id: build
    run: "build.py build -a {{ arch }}"
  - id: publish
    if: "branch == 'main'"
    publish:
      package: "gst-runtime-{{ os }}"
      version: "{{ version }}"
      artifact: "{{ build_dir }}/gst.nupkg"
  - id: notify
    if: "event == 'pull_request' && branch != 'main'"
    run: "notify.py --branch {{ branch }}"
"#;

async fn run_on(
    branch: &str,
    event: TriggerEvent,
) -> (WorkflowTestResult, MockRunner, Arc<InMemoryRegistry>) {
    let runner = MockRunner::new();
    let registry = Arc::new(InMemoryRegistry::new());
    let executor = StepExecutor::new(runner.clone()).with_registry(registry.clone());
    let result = run_with_executor(
        executor,
        &workflow_from_yaml(YAML),
        &RunContext::new(branch, event),
        &ProfileStore::new(),
    )
    .await;
    (result, runner, registry)
}

/// Publishing runs on main for every entry
#[tokio::test]
async fn test_publish_runs_on_main() {
    let (result, _, registry) = run_on("main", TriggerEvent::Push).await;

    assert!(result.is_success(), "{}", result.summary());
    for entry in ["macOS x64", "Windows x64"] {
        assert_execution_order(&result, entry, &["build", "publish"]);
        assert_step_skipped(&result, entry, "notify", "condition not met");
    }

    let mac = registry.list_versions("gst-runtime-macos").await.unwrap();
    assert_eq!(mac.len(), 1);
    assert_eq!(mac[0].version, "1.22.0");
    assert_eq!(registry.list_versions("gst-runtime-windows").await.unwrap().len(), 1);
}

/// Publishing is skipped on feature branches; the entry still completes
#[tokio::test]
async fn test_publish_skipped_on_feature_branch() {
    let (result, runner, registry) = run_on("feature/x", TriggerEvent::PullRequest).await;

    assert!(result.is_success(), "{}", result.summary());
    assert_entry_completed(&result, "macOS x64");
    assert_step_skipped(&result, "macOS x64", "publish", "condition not met");
    assert_execution_order(&result, "macOS x64", &["build", "notify"]);

    assert!(runner.ran("notify.py --branch feature/x"));
    assert!(registry.list_versions("gst-runtime-macos").await.unwrap().is_empty());
}

/// Push and pull request triggers filter on branch
#[test]
fn test_trigger_matching() {
    let workflow = workflow_from_yaml(YAML);
    let trigger = &workflow.trigger;

    assert!(trigger.matches(TriggerEvent::Push, "main"));
    assert!(trigger.matches(TriggerEvent::Push, "release/1.22"));
    assert!(!trigger.matches(TriggerEvent::Push, "feature/x"));
    assert!(trigger.matches(TriggerEvent::PullRequest, "feature/x"));
    assert!(trigger.matches(TriggerEvent::Manual, "anything"));
}
