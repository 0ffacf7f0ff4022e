//! Local directory feed
//!
//! Artifacts live at `<root>/<package>/<version>/<file>`; `<root>/index.json`
//! records every published version with its publish time.

use crate::registry::{check_name, PackageRegistry, PackageVersion, RegistryError};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct FeedIndex {
    packages: BTreeMap<String, Vec<PackageVersion>>,
}

pub struct LocalFeedRegistry {
    root: PathBuf,
    // serializes read-modify-write cycles of the index
    lock: Mutex<()>,
}

impl LocalFeedRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn version_dir(&self, package: &str, version: &str) -> PathBuf {
        self.root.join(package).join(version)
    }

    async fn load_index(&self) -> Result<FeedIndex, RegistryError> {
        let path = self.root.join(INDEX_FILE);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FeedIndex::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_index(&self, index: &FeedIndex) -> Result<(), RegistryError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let content = serde_json::to_string_pretty(index)?;
        // write then rename so a crash never leaves a truncated index
        let tmp = self.root.join(format!("{}.tmp", INDEX_FILE));
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, self.root.join(INDEX_FILE)).await?;
        Ok(())
    }
}

#[async_trait]
impl PackageRegistry for LocalFeedRegistry {
    async fn publish(
        &self,
        package: &str,
        version: &str,
        artifact: &Path,
    ) -> Result<PackageVersion, RegistryError> {
        check_name("package", package)?;
        check_name("version", version)?;
        let _guard = self.lock.lock().await;

        if !tokio::fs::try_exists(artifact).await.unwrap_or(false) {
            return Err(RegistryError::ArtifactMissing(artifact.display().to_string()));
        }

        let mut index = self.load_index().await?;
        let versions = index.packages.entry(package.to_string()).or_default();
        if versions.iter().any(|v| v.version == version) {
            return Err(RegistryError::AlreadyExists {
                package: package.to_string(),
                version: version.to_string(),
            });
        }

        let dir = self.version_dir(package, version);
        tokio::fs::create_dir_all(&dir).await?;
        let file_name = artifact
            .file_name()
            .ok_or_else(|| RegistryError::ArtifactMissing(artifact.display().to_string()))?;
        tokio::fs::copy(artifact, dir.join(file_name)).await?;

        let published = PackageVersion {
            package: package.to_string(),
            version: version.to_string(),
            published_at: Utc::now(),
        };
        versions.push(published.clone());
        self.save_index(&index).await?;

        info!("Published {} {} to {}", package, version, self.root.display());
        Ok(published)
    }

    async fn list_versions(&self, package: &str) -> Result<Vec<PackageVersion>, RegistryError> {
        let index = self.load_index().await?;
        Ok(index.packages.get(package).cloned().unwrap_or_default())
    }

    async fn delete_version(&self, package: &str, version: &str) -> Result<(), RegistryError> {
        check_name("package", package)?;
        check_name("version", version)?;
        let _guard = self.lock.lock().await;

        let mut index = self.load_index().await?;
        let versions = index.packages.get_mut(package);
        let position = versions
            .as_ref()
            .and_then(|vs| vs.iter().position(|v| v.version == version));

        match (versions, position) {
            (Some(versions), Some(idx)) => {
                versions.remove(idx);
            }
            _ => {
                return Err(RegistryError::VersionNotFound {
                    package: package.to_string(),
                    version: version.to_string(),
                })
            }
        }

        let dir = self.version_dir(package, version);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Artifact directory {} already gone", dir.display());
            }
            Err(e) => return Err(e.into()),
        }

        self.save_index(&index).await?;
        debug!("Deleted {} {}", package, version);
        Ok(())
    }
}
