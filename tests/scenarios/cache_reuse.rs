//! Test: Cache Reuse - keyed caches saved after a run and restored by the next

use crate::helpers::*;
use crossci::core::{RunContext, TriggerEvent};
use crossci::execution::{CacheManager, StepExecutor};
use crossci::persistence::{InMemoryPersistence, PersistenceBackend};
use crossci::profile::ProfileStore;
use std::path::Path;
use std::sync::Arc;

fn workflow_yaml(cache_dir: &Path) -> String {
    format!(
        r#"
name: "Test: Cache Reuse"
matrix:
  - name: "macOS x64"
    os: macos
    arch: x86_64
    build_dir: /tmp/build
    cache_dir: "{}"
steps:
  - id: restore
    cache:
      key: "gst-1.22.0-{{{{ os }}}}-{{{{ arch }}}}"
      path: "{{{{ cache_dir }}}}/gst"
  - id: install_gst
    if: "cache_hit != 'true'"
    run: "build.py install_gst -c {{{{ cache_dir }}}}"
  - id: build
    run: "build.py build"
"#,
        cache_dir.display()
    )
}

async fn run_once(
    yaml: &str,
    runner: MockRunner,
    cache: Arc<CacheManager>,
) -> WorkflowTestResult {
    run_with_executor(
        StepExecutor::new(runner).with_cache(cache),
        &workflow_from_yaml(yaml),
        &RunContext::new("main", TriggerEvent::Push),
        &ProfileStore::new(),
    )
    .await
}

/// First run misses and saves; second run restores and skips the install
#[tokio::test]
async fn test_second_run_restores_cache() {
    let workspace = tempfile::tempdir().unwrap();
    let cache_dir = workspace.path().join("cache");
    let installed = cache_dir.join("gst");
    std::fs::create_dir_all(installed.join("lib")).unwrap();
    std::fs::write(installed.join("lib/libgstreamer.a"), b"archive").unwrap();

    let backend = Arc::new(InMemoryPersistence::new());
    let cache = Arc::new(CacheManager::new(workspace.path().join("store"), backend.clone()));
    let yaml = workflow_yaml(&cache_dir);

    let first_runner = MockRunner::new();
    let first = run_once(&yaml, first_runner.clone(), cache.clone()).await;
    assert!(first.is_success(), "{}", first.summary());
    assert_execution_order(&first, "macOS x64", &["restore", "install_gst", "build"]);
    assert!(first_runner.ran("install_gst"));

    let record = backend
        .lookup_cache("gst-1.22.0-macos-x86_64")
        .await
        .unwrap()
        .expect("cache saved after the first run");
    assert!(record.size_bytes > 0);

    std::fs::remove_dir_all(&installed).unwrap();

    let second_runner = MockRunner::new();
    let second = run_once(&yaml, second_runner.clone(), cache).await;
    assert!(second.is_success(), "{}", second.summary());
    assert_step_skipped(&second, "macOS x64", "install_gst", "condition not met");
    assert!(!second_runner.ran("install_gst"));
    assert_eq!(
        std::fs::read(installed.join("lib/libgstreamer.a")).unwrap(),
        b"archive"
    );
}

/// A failed entry does not save its caches
#[tokio::test]
async fn test_failed_entry_does_not_save_cache() {
    let workspace = tempfile::tempdir().unwrap();
    let cache_dir = workspace.path().join("cache");
    std::fs::create_dir_all(cache_dir.join("gst")).unwrap();
    std::fs::write(cache_dir.join("gst/partial"), b"half").unwrap();

    let backend = Arc::new(InMemoryPersistence::new());
    let cache = Arc::new(CacheManager::new(workspace.path().join("store"), backend.clone()));

    let runner = MockRunner::new().failing_on("build.py build", 1);
    let result = run_once(&workflow_yaml(&cache_dir), runner, cache).await;

    assert_entry_failed(&result, "macOS x64");
    assert!(backend
        .lookup_cache("gst-1.22.0-macos-x86_64")
        .await
        .unwrap()
        .is_none());
}
