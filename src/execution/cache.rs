//! Keyed directory cache
//!
//! Cached trees are copied into `<root>/<key>`; the persistence backend keeps
//! the key index so lookups survive across runs.

use crate::persistence::{CacheRecord, PersistenceBackend};
use anyhow::{Context, Result};
use chrono::Utc;
use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct CacheManager {
    root: PathBuf,
    backend: Arc<dyn PersistenceBackend>,
}

impl CacheManager {
    pub fn new(root: impl Into<PathBuf>, backend: Arc<dyn PersistenceBackend>) -> Self {
        Self {
            root: root.into(),
            backend,
        }
    }

    /// Default cache root under the user's local data directory
    pub fn default_root() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("crossci")
            .join("caches")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Restore the tree saved under `key` into `target`
    ///
    /// Returns `false` on a miss. Only exact key matches restore.
    pub async fn restore(&self, key: &str, target: &Path) -> Result<bool> {
        let record = match self.backend.lookup_cache(key).await? {
            Some(record) => record,
            None => {
                debug!("Cache miss for key {}", key);
                return Ok(false);
            }
        };

        let stored = PathBuf::from(&record.stored_path);
        if !stored.is_dir() {
            debug!("Cache {} indexed but {} is gone", key, stored.display());
            return Ok(false);
        }

        let target = target.to_path_buf();
        let copied = tokio::task::spawn_blocking(move || copy_tree(&stored, &target))
            .await
            .context("Cache restore task panicked")??;

        info!("Restored cache {} ({} bytes)", key, copied);
        Ok(true)
    }

    /// Save `source` under `key`, replacing any previous tree with that key
    ///
    /// The tree is staged next to its final location and swapped in only once
    /// the copy is complete. A failed save drops `key` from the index.
    pub async fn save(&self, key: &str, source: &Path) -> Result<CacheRecord> {
        if !source.is_dir() {
            anyhow::bail!("Cache path {} does not exist", source.display());
        }

        let stored = self.root.join(sanitize_key(key));
        let (from, to) = (source.to_path_buf(), stored.clone());
        let copied = tokio::task::spawn_blocking(move || replace_tree(&from, &to))
            .await
            .context("Cache save task panicked")?;

        let size_bytes = match copied {
            Ok(size) => size,
            Err(e) => {
                self.backend.forget_cache(key).await?;
                return Err(e.context(format!("Failed to save cache {}", key)));
            }
        };

        let record = CacheRecord {
            key: key.to_string(),
            stored_path: stored.display().to_string(),
            size_bytes,
            created_at: Utc::now(),
        };
        self.backend.record_cache(&record).await?;

        info!("Saved cache {} ({} bytes)", key, size_bytes);
        Ok(record)
    }
}

/// Map a cache key onto a single directory name
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Hidden sibling of `path`, unique per call
fn sibling(path: &Path, tag: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}-{}", name, tag, Uuid::new_v4().simple()))
}

/// Copy `from` into a staging directory, then swap it in at `to`
fn replace_tree(from: &Path, to: &Path) -> Result<u64> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let staging = sibling(to, "staging");
    let size = match copy_tree(from, &staging) {
        Ok(size) => size,
        Err(e) => {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }
    };

    if fs::symlink_metadata(to).is_err() {
        fs::rename(&staging, to)?;
        return Ok(size);
    }

    let retired = sibling(to, "retired");
    fs::rename(to, &retired)?;
    if let Err(e) = fs::rename(&staging, to) {
        let _ = fs::rename(&retired, to);
        let _ = fs::remove_dir_all(&staging);
        return Err(e.into());
    }
    if let Err(e) = fs::remove_dir_all(&retired) {
        warn!("Failed to remove old cache tree {}: {}", retired.display(), e);
    }
    Ok(size)
}

/// Copy the tree under `from` into `to`, returning the number of bytes copied
///
/// Hidden and ignored files are copied too. Symlinks are recreated, not
/// followed.
fn copy_tree(from: &Path, to: &Path) -> Result<u64> {
    fs::create_dir_all(to)?;
    let mut total = 0;
    for entry in WalkBuilder::new(from).standard_filters(false).build() {
        let entry = entry?;
        let relative = entry.path().strip_prefix(from)?;
        if relative.as_os_str().is_empty() {
            continue;
        }
        let dest = to.join(relative);

        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_symlink() {
            copy_link(entry.path(), &dest)
                .with_context(|| format!("Failed to copy link {}", entry.path().display()))?;
        } else if file_type.is_dir() {
            fs::create_dir_all(&dest)?;
        } else {
            total += fs::copy(entry.path(), &dest)
                .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
        }
    }
    Ok(total)
}

fn copy_link(src: &Path, dest: &Path) -> std::io::Result<()> {
    let target = fs::read_link(src)?;
    if let Ok(existing) = fs::symlink_metadata(dest) {
        if existing.is_dir() {
            fs::remove_dir_all(dest)?;
        } else {
            fs::remove_file(dest)?;
        }
    }
    make_link(src, &target, dest)
}

#[cfg(unix)]
fn make_link(_src: &Path, target: &Path, dest: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, dest)
}

#[cfg(windows)]
fn make_link(src: &Path, target: &Path, dest: &Path) -> std::io::Result<()> {
    if src.is_dir() {
        std::os::windows::fs::symlink_dir(target, dest)
    } else {
        std::os::windows::fs::symlink_file(target, dest)
    }
}
