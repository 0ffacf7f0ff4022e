//! Test: Retention - prune steps keep only the most recent versions

use crate::helpers::*;
use chrono::{Duration, Utc};
use crossci::core::{RunContext, TriggerEvent};
use crossci::execution::StepExecutor;
use crossci::profile::ProfileStore;
use crossci::registry::{InMemoryRegistry, PackageVersion};
use crossci::PackageRegistry;
use std::sync::Arc;

const PACKAGE: &str = "gstreamer-runtime-macos-x86_64";

fn workflow_yaml(prune: &str) -> String {
    format!(
        r#"
name: "Test: Retention"
matrix:
  - {{ name: "macOS x64", os: macos, arch: x86_64, build_dir: /tmp/b, cache_dir: /tmp/c }}
steps:
  - id: prune
    prune:
{}
"#,
        prune
    )
}

/// Registry holding `count` versions, `1.0.<n>` published `count - n` days ago
async fn seeded_registry(count: i64) -> Arc<InMemoryRegistry> {
    let registry = Arc::new(InMemoryRegistry::new());
    let now = Utc::now();
    for n in 0..count {
        registry
            .insert(PackageVersion {
                package: PACKAGE.to_string(),
                version: format!("1.0.{}", n),
                published_at: now - Duration::days(count - n),
            })
            .await;
    }
    registry
}

async fn remaining_versions(registry: &InMemoryRegistry) -> Vec<String> {
    let mut versions: Vec<String> = registry
        .list_versions(PACKAGE)
        .await
        .unwrap()
        .into_iter()
        .map(|v| v.version)
        .collect();
    versions.sort();
    versions
}

async fn run_prune(yaml: &str, registry: Arc<InMemoryRegistry>) -> WorkflowTestResult {
    run_with_executor(
        StepExecutor::new(MockRunner::new()).with_registry(registry),
        &workflow_from_yaml(yaml),
        &RunContext::new("main", TriggerEvent::Push),
        &ProfileStore::new(),
    )
    .await
}

/// Seven versions are pruned down to the five most recent by default
#[tokio::test]
async fn test_prune_keeps_five_by_default() {
    let registry = seeded_registry(7).await;
    let yaml = workflow_yaml(&format!("      package: \"{}\"", PACKAGE));

    let result = run_prune(&yaml, registry.clone()).await;
    assert!(result.is_success(), "{}", result.summary());

    assert_eq!(
        remaining_versions(&registry).await,
        vec!["1.0.2", "1.0.3", "1.0.4", "1.0.5", "1.0.6"]
    );

    let deleted = result.step_output("macOS x64", "prune").unwrap();
    let mut deleted: Vec<&str> = deleted.lines().collect();
    deleted.sort();
    assert_eq!(deleted, vec!["1.0.0", "1.0.1"]);
}

/// An explicit `keep` overrides the default
#[tokio::test]
async fn test_prune_with_explicit_keep() {
    let registry = seeded_registry(7).await;
    let yaml = workflow_yaml(&format!(
        "      package: \"{}\"\n      keep: 2",
        PACKAGE
    ));

    run_prune(&yaml, registry.clone()).await;
    assert_eq!(remaining_versions(&registry).await, vec!["1.0.5", "1.0.6"]);
}

/// Packages with no more than `keep` versions are left alone
#[tokio::test]
async fn test_prune_below_threshold_deletes_nothing() {
    let registry = seeded_registry(3).await;
    let yaml = workflow_yaml(&format!("      package: \"{}\"", PACKAGE));

    let result = run_prune(&yaml, registry.clone()).await;
    assert!(result.is_success());
    assert_eq!(remaining_versions(&registry).await.len(), 3);
    assert_eq!(result.step_output("macOS x64", "prune").as_deref(), Some(""));
}

/// A zero `keep` is rejected when the workflow is loaded
#[test]
fn test_zero_keep_is_invalid() {
    let yaml = workflow_yaml("      package: \"pkg\"\n      keep: 0");
    assert!(crossci::core::config::WorkflowConfig::from_yaml(&yaml).is_err());
}
