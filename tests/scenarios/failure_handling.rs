//! Test: Failure Handling - fatal and tolerated step failures

use crate::helpers::*;

const YAML: &str = r#"
name: "Test: Failure Handling"
matrix:
  - { name: "macOS x64", os: macos, arch: x86_64, build_dir: /tmp/b, cache_dir: /tmp/c }
steps:
  - id: deps
    run: "build.py install_deps"
  - id: lint
    run: "build.py lint"
    continue_on_error: true
  - id: gst
    run: "build.py install_gst"
  - id: package
    run: "build.py create_runtime_nuget_package"
"#;

/// A fatal failure stops the entry; later steps never run
#[tokio::test]
async fn test_fatal_failure_skips_remaining_steps() {
    let runner = MockRunner::new().failing_on("install_gst", 2);
    let result = run_workflow_with_mock(YAML, runner.clone(), "main").await;

    assert!(!result.is_success());
    assert_entry_failed(&result, "macOS x64");
    assert_step_failed(&result, "macOS x64", "gst", false);
    assert_step_skipped(&result, "macOS x64", "package", "previous step failed");

    assert!(!runner.ran("create_runtime_nuget_package"));
    assert_execution_order(&result, "macOS x64", &["deps", "lint", "gst"]);
}

/// A `continue_on_error` step may fail without stopping the entry
#[tokio::test]
async fn test_tolerated_failure_continues() {
    let runner = MockRunner::new().failing_on("lint", 1);
    let result = run_workflow_with_mock(YAML, runner.clone(), "main").await;

    assert!(result.is_success(), "{}", result.summary());
    assert_entry_completed(&result, "macOS x64");
    assert_step_failed(&result, "macOS x64", "lint", true);
    assert_execution_order(&result, "macOS x64", &["deps", "lint", "gst", "package"]);
    assert_eq!(runner.commands().len(), 4);

    let entry = result.entry("macOS x64");
    assert_eq!(entry.state.failed_steps, 1);
    assert_eq!(entry.state.completed_steps, 3);
}

/// The failure message carries the exit code
#[tokio::test]
async fn test_failure_reports_exit_code() {
    let runner = MockRunner::new().failing_on("install_deps", 127);
    let result = run_workflow_with_mock(YAML, runner, "main").await;

    match result.step_state("macOS x64", "deps") {
        crossci::StepState::Failed { error, .. } => assert!(error.contains("127"), "{}", error),
        other => panic!("expected failure, got {:?}", other),
    }
    assert_step_skipped(&result, "macOS x64", "lint", "previous step failed");
}

/// Step output is exposed to later steps
#[tokio::test]
async fn test_step_output_feeds_later_steps() {
    let yaml = r#"
name: "Test: Step Outputs"
matrix:
  - { name: "macOS x64", os: macos, arch: x86_64, build_dir: /tmp/b, cache_dir: /tmp/c }
steps:
  - id: version
    run: "git describe"
  - id: tag
    run: "echo tagging {{ steps.version.output }}"
"#;
    let runner = MockRunner::new().with_output("git describe", "1.22.0");
    let result = run_workflow_with_mock(yaml, runner.clone(), "main").await;

    assert!(result.is_success(), "{}", result.summary());
    assert_eq!(result.step_output("macOS x64", "version").as_deref(), Some("1.22.0"));
    assert!(runner.ran("echo tagging 1.22.0"));
}

/// `always()` steps still run after a fatal failure; the entry stays failed
#[tokio::test]
async fn test_always_step_runs_after_failure() {
    let yaml = r#"
name: "Test: Cleanup"
matrix:
  - { name: "macOS x64", os: macos, arch: x86_64, build_dir: /tmp/b, cache_dir: /tmp/c }
steps:
  - id: gst
    run: "build.py install_gst"
  - id: package
    run: "build.py create_runtime_nuget_package"
  - id: publish
    if: "success() && branch == 'main'"
    run: "build.py push_runtime_nuget_packages"
  - id: cleanup
    if: "always()"
    run: "build.py cleanup"
"#;
    let runner = MockRunner::new().failing_on("install_gst", 1);
    let result = run_workflow_with_mock(yaml, runner.clone(), "main").await;

    assert_entry_failed(&result, "macOS x64");
    assert_step_skipped(&result, "macOS x64", "package", "previous step failed");
    assert_step_skipped(&result, "macOS x64", "publish", "previous step failed");
    assert_execution_order(&result, "macOS x64", &["gst", "cleanup"]);
    assert!(runner.ran("build.py cleanup"));
}
