//! Test: Profiles - cross files loaded from disk and fed into entries

use crate::helpers::*;
use crossci::core::{RunContext, TriggerEvent};
use crossci::execution::StepExecutor;
use crossci::profile::{Language, ProfileStore, Stage};
use std::path::PathBuf;

fn cross_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("ci/cross")
}

/// Argument lists come back exactly as the cross files spell them
#[test]
fn test_load_bundled_profiles() {
    let store = ProfileStore::load_dir(cross_dir()).unwrap();
    assert_eq!(store.names().collect::<Vec<_>>(), vec!["macos-x86_64", "win-x64"]);

    assert_eq!(
        store.args("macos-x86_64", Language::ObjCpp, Stage::Link).unwrap(),
        &["-arch", "x86_64", "-mmacosx-version-min=10.13"]
    );
    assert_eq!(
        store.args("win-x64", Language::Cpp, Stage::Link).unwrap(),
        &["-static-libgcc", "-static-libstdc++"]
    );
    assert!(store.args("win-x64", Language::ObjC, Stage::Compile).unwrap().is_empty());
    assert_eq!(
        store.binary("win-x64", "c").unwrap(),
        Some(&["ccache".to_string(), "x86_64-w64-mingw32-gcc".to_string()][..])
    );
    assert!(store.get("linux-arm64").is_err());
}

/// Lookups on a store are stable; the profiles do not change between reads
#[test]
fn test_lookups_are_repeatable() {
    let store = ProfileStore::load_dir(cross_dir()).unwrap();
    let first = store.args("macos-x86_64", Language::C, Stage::Compile).unwrap().to_vec();
    let second = store.args("macos-x86_64", Language::C, Stage::Compile).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 5);
}

/// Entries see their profile's flags as `profile.*` variables
#[tokio::test]
async fn test_entry_uses_profile_flags() {
    let yaml = r#"
name: "Test: Profiles"
matrix:
  - { name: "macOS x64", os: macos, arch: x86_64, build_dir: /tmp/b1, cache_dir: /tmp/c1, profile: macos-x86_64 }
  - { name: "Windows x64", os: windows, arch: x86_64, build_dir: /tmp/b2, cache_dir: /tmp/c2, profile: win-x64 }
steps:
  - id: configure
    run: "meson setup {{ build_dir }} -Dc_link_args='{{ profile.c_link_args }}'"
  - id: wrapper
    if: "profile.needs_exe_wrapper == 'true'"
    run: "echo {{ profile.system }} needs a wrapper"
"#;
    let store = ProfileStore::load_dir(cross_dir()).unwrap();
    let runner = MockRunner::new();
    let result = run_with_executor(
        StepExecutor::new(runner.clone()),
        &workflow_from_yaml(yaml),
        &RunContext::new("main", TriggerEvent::Push),
        &store,
    )
    .await;

    assert!(result.is_success(), "{}", result.summary());
    assert!(runner.ran("-Dc_link_args='-arch x86_64 -mmacosx-version-min=10.13'"));
    assert!(runner.ran("-Dc_link_args='-static-libgcc'"));
    assert!(runner.ran("echo darwin needs a wrapper"));
    assert!(runner.ran("echo windows needs a wrapper"));
}

/// A matrix entry naming a missing profile fails the run before any step runs
#[tokio::test]
async fn test_unknown_profile_aborts_run() {
    let yaml = r#"
name: "Test: Missing Profile"
matrix:
  - { name: "Linux arm64", os: linux, arch: arm64, build_dir: /tmp/b, cache_dir: /tmp/c, profile: linux-arm64 }
steps:
  - id: build
    run: "make"
"#;
    let store = ProfileStore::load_dir(cross_dir()).unwrap();
    let runner = MockRunner::new();
    let engine = crossci::ExecutionEngine::new(StepExecutor::new(runner.clone()));

    let outcome = engine
        .execute(
            &workflow_from_yaml(yaml),
            &RunContext::new("main", TriggerEvent::Push),
            &store,
        )
        .await;
    assert!(outcome.is_err());
    assert!(runner.commands().is_empty());
}

/// The bundled workflow references only the bundled profiles
#[test]
fn test_bundled_workflow_validates() {
    let config = crossci::core::config::WorkflowConfig::from_file(
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("ci/workflow.yml"),
    )
    .unwrap();
    let store = ProfileStore::load_dir(cross_dir()).unwrap();
    config.validate_profiles(&store).unwrap();
    assert_eq!(config.matrix.len(), 2);
    assert!(config.trigger.matches(TriggerEvent::PullRequest, "feature/x"));

    let cleanup = config.steps.last().unwrap();
    assert_eq!(cleanup.id, "cleanup");
    assert_eq!(cleanup.condition.as_deref(), Some("always()"));
}
