//! Test: Packaging - manifest templates, publishing to a local feed, secrets

use crate::helpers::*;
use crossci::core::{RunContext, TriggerEvent};
use crossci::execution::StepExecutor;
use crossci::profile::ProfileStore;
use crossci::registry::LocalFeedRegistry;
use crossci::{PackageRegistry, StepState};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn manifest_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

fn workflow_yaml(build_dir: &Path) -> String {
    format!(
        r#"
name: "Test: Packaging"
matrix:
  - name: "macOS x64"
    os: macos
    arch: x86_64
    build_dir: "{build}"
    cache_dir: /tmp/cache
    profile: macos-x86_64
steps:
  - id: manifest
    template:
      source: "{templates}/runtime.json.in"
      destination: "{{{{ build_dir }}}}/runtime.json"
  - id: publish
    publish:
      package: "gstreamer-runtime-{{{{ os }}}}-{{{{ arch }}}}"
      version: "{{{{ version }}}}"
      artifact: "{{{{ build_dir }}}}/runtime.json"
  - id: push
    continue_on_error: true
    run: "nuget push --api-key {{{{ secrets.FEED_TOKEN }}}}"
"#,
        build = build_dir.display(),
        templates = manifest_dir().join("ci/templates").display(),
    )
}

/// The manifest is rendered, published, and the secret never leaks into errors
#[tokio::test]
async fn test_template_publish_and_redaction() {
    let workspace = tempfile::tempdir().unwrap();
    let build_dir = workspace.path().join("build");
    let feed = Arc::new(LocalFeedRegistry::new(workspace.path().join("feed")));
    let profiles = ProfileStore::load_dir(manifest_dir().join("ci/cross")).unwrap();

    let runner = MockRunner::new().failing_on("nuget push", 1);
    let run = RunContext::new("main", TriggerEvent::Push)
        .with_variable("version", "1.22.0")
        .with_secret("FEED_TOKEN", "s3cr3t-token");

    let result = run_with_executor(
        StepExecutor::new(runner.clone()).with_registry(feed.clone()),
        &workflow_from_yaml(&workflow_yaml(&build_dir)),
        &run,
        &profiles,
    )
    .await;

    assert!(result.is_success(), "{}", result.summary());

    let manifest = std::fs::read_to_string(build_dir.join("runtime.json")).unwrap();
    assert!(manifest.contains(r#""name": "gstreamer-runtime-macos-x86_64""#));
    assert!(manifest.contains(r#""version": "1.22.0""#));
    assert!(manifest.contains(r#""host": "darwin/x86_64""#));

    let versions = feed
        .list_versions("gstreamer-runtime-macos-x86_64")
        .await
        .unwrap();
    assert_eq!(versions.len(), 1);
    assert!(workspace
        .path()
        .join("feed/gstreamer-runtime-macos-x86_64/1.22.0/runtime.json")
        .exists());

    // the runner receives the real value; the recorded failure does not
    assert!(runner.ran("--api-key s3cr3t-token"));
    match result.step_state("macOS x64", "push") {
        StepState::Failed { error, tolerated, .. } => {
            assert!(*tolerated);
            assert!(!error.contains("s3cr3t-token"), "{}", error);
            assert!(error.contains("***"));
        }
        other => panic!("expected tolerated failure, got {:?}", other),
    }
}

/// Publishing the same version twice fails the second run
#[tokio::test]
async fn test_republish_same_version_fails() {
    let workspace = tempfile::tempdir().unwrap();
    let build_dir = workspace.path().join("build");
    let feed = Arc::new(LocalFeedRegistry::new(workspace.path().join("feed")));
    let profiles = ProfileStore::load_dir(manifest_dir().join("ci/cross")).unwrap();
    let workflow = workflow_from_yaml(&workflow_yaml(&build_dir));
    let run = RunContext::new("main", TriggerEvent::Push)
        .with_variable("version", "1.22.0")
        .with_secret("FEED_TOKEN", "token");

    let first = run_with_executor(
        StepExecutor::new(MockRunner::new()).with_registry(feed.clone()),
        &workflow,
        &run,
        &profiles,
    )
    .await;
    assert!(first.is_success(), "{}", first.summary());

    let second = run_with_executor(
        StepExecutor::new(MockRunner::new()).with_registry(feed),
        &workflow,
        &run,
        &profiles,
    )
    .await;
    assert_entry_failed(&second, "macOS x64");
    assert_step_failed(&second, "macOS x64", "publish", false);
    assert_step_skipped(&second, "macOS x64", "push", "previous step failed");
}

/// A missing secret fails the step instead of passing an empty argument
#[tokio::test]
async fn test_missing_secret_fails_step() {
    let workspace = tempfile::tempdir().unwrap();
    let runner = MockRunner::new();
    let result = run_with_executor(
        StepExecutor::new(runner.clone())
            .with_registry(Arc::new(LocalFeedRegistry::new(workspace.path().join("feed")))),
        &workflow_from_yaml(&workflow_yaml(&workspace.path().join("build"))),
        &RunContext::new("main", TriggerEvent::Push).with_variable("version", "1.0.0"),
        &ProfileStore::load_dir(manifest_dir().join("ci/cross")).unwrap(),
    )
    .await;

    assert_step_failed(&result, "macOS x64", "push", true);
    assert!(!runner.ran("nuget push"));
}
