//! In-memory registry (for testing or dry runs)

use crate::registry::{check_name, PackageRegistry, PackageVersion, RegistryError};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

pub struct InMemoryRegistry {
    packages: RwLock<HashMap<String, Vec<PackageVersion>>>,
}

impl InMemoryRegistry {
    /// Registry that does not look at artifacts on disk
    pub fn new() -> Self {
        Self {
            packages: RwLock::new(HashMap::new()),
        }
    }

    /// Seed a version directly, bypassing `publish`
    pub async fn insert(&self, version: PackageVersion) {
        self.packages
            .write()
            .await
            .entry(version.package.clone())
            .or_default()
            .push(version);
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PackageRegistry for InMemoryRegistry {
    async fn publish(
        &self,
        package: &str,
        version: &str,
        _artifact: &Path,
    ) -> Result<PackageVersion, RegistryError> {
        check_name("package", package)?;
        check_name("version", version)?;

        let mut packages = self.packages.write().await;
        let versions = packages.entry(package.to_string()).or_default();
        if versions.iter().any(|v| v.version == version) {
            return Err(RegistryError::AlreadyExists {
                package: package.to_string(),
                version: version.to_string(),
            });
        }

        let published = PackageVersion {
            package: package.to_string(),
            version: version.to_string(),
            published_at: Utc::now(),
        };
        versions.push(published.clone());
        Ok(published)
    }

    async fn list_versions(&self, package: &str) -> Result<Vec<PackageVersion>, RegistryError> {
        let packages = self.packages.read().await;
        Ok(packages.get(package).cloned().unwrap_or_default())
    }

    async fn delete_version(&self, package: &str, version: &str) -> Result<(), RegistryError> {
        let mut packages = self.packages.write().await;
        let not_found = || RegistryError::VersionNotFound {
            package: package.to_string(),
            version: version.to_string(),
        };
        let versions = packages.get_mut(package).ok_or_else(not_found)?;
        let idx = versions
            .iter()
            .position(|v| v.version == version)
            .ok_or_else(not_found)?;
        versions.remove(idx);
        Ok(())
    }
}
