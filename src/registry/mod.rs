//! Package registry: publishing artifacts and pruning old versions

pub mod feed;
pub mod memory;
pub mod version;

pub use feed::LocalFeedRegistry;
pub use memory::InMemoryRegistry;
pub use version::{Version, VersionError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Error types for registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("version {version} of {package} already exists")]
    AlreadyExists { package: String, version: String },

    #[error("version {version} of {package} not found")]
    VersionNotFound { package: String, version: String },

    #[error("artifact not found: {0}")]
    ArtifactMissing(String),

    #[error("invalid {kind} name '{value}'")]
    InvalidName { kind: &'static str, value: String },

    #[error("registry I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("registry index is corrupt: {0}")]
    Index(#[from] serde_json::Error),
}

/// A published version of a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageVersion {
    pub package: String,
    pub version: String,
    pub published_at: DateTime<Utc>,
}

/// Check that a package or version name is usable as a single path component
///
/// Empty names, `.`, `..` and names containing a path separator are rejected.
pub fn check_name(kind: &'static str, value: &str) -> Result<(), RegistryError> {
    let invalid = value.trim().is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\']);
    if invalid {
        return Err(RegistryError::InvalidName {
            kind,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Trait for package registries - allows for different implementations
#[async_trait]
pub trait PackageRegistry: Send + Sync {
    /// Publish an artifact under a package identifier and version
    async fn publish(
        &self,
        package: &str,
        version: &str,
        artifact: &Path,
    ) -> Result<PackageVersion, RegistryError>;

    /// List the published versions of a package, in no particular order
    async fn list_versions(&self, package: &str) -> Result<Vec<PackageVersion>, RegistryError>;

    /// Delete one version of a package
    async fn delete_version(&self, package: &str, version: &str) -> Result<(), RegistryError>;
}

/// Split versions into those to keep (`keep` most recent) and those to delete
///
/// Ties on the publish time are broken by version number, newest first.
/// Versions that do not parse sort below those that do, then by string.
pub fn retention_plan(
    mut versions: Vec<PackageVersion>,
    keep: usize,
) -> (Vec<PackageVersion>, Vec<PackageVersion>) {
    versions.sort_by(|a, b| {
        b.published_at
            .cmp(&a.published_at)
            .then_with(|| {
                let parsed = |v: &PackageVersion| v.version.parse::<Version>().ok();
                parsed(b).cmp(&parsed(a))
            })
            .then_with(|| b.version.cmp(&a.version))
    });
    let expired = if versions.len() > keep {
        versions.split_off(keep)
    } else {
        Vec::new()
    };
    (versions, expired)
}

/// Delete all but the `keep` most recent versions of a package
///
/// Returns the deleted versions. A package with `keep` or fewer versions is
/// left untouched.
pub async fn prune_versions(
    registry: &dyn PackageRegistry,
    package: &str,
    keep: usize,
) -> Result<Vec<PackageVersion>, RegistryError> {
    let versions = registry.list_versions(package).await?;
    let total = versions.len();
    let (_, expired) = retention_plan(versions, keep);

    for version in &expired {
        registry.delete_version(package, &version.version).await?;
    }

    info!(
        "Pruned {} of {} version(s) of {} (keeping {})",
        expired.len(),
        total,
        package,
        keep
    );
    Ok(expired)
}
