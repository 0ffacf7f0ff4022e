//! Profile store - named, immutable toolchain profiles

use crate::profile::{Language, ProfileError, Stage, ToolchainProfile};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

const PROFILE_EXTENSIONS: [&str; 3] = ["txt", "ini", "cross"];

/// Collection of loaded profiles, keyed by name
#[derive(Debug, Clone, Default)]
pub struct ProfileStore {
    profiles: BTreeMap<String, ToolchainProfile>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every cross file in a directory; the file stem becomes the profile name
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self, ProfileError> {
        let dir = dir.as_ref();
        let io_err = |source| ProfileError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            let is_profile = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| PROFILE_EXTENSIONS.contains(&ext));
            if path.is_file() && is_profile {
                paths.push(path);
            }
        }
        paths.sort();

        let mut store = Self::new();
        for path in paths {
            store.load_file(&path)?;
        }

        info!("Loaded {} profile(s) from {}", store.len(), dir.display());
        Ok(store)
    }

    /// Load a single cross file
    pub fn load_file(&mut self, path: &Path) -> Result<&ToolchainProfile, ProfileError> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Parsing profile {} from {}", name, path.display());
        let profile = ToolchainProfile::parse(&name, &text)?;
        Ok(self.insert(profile))
    }

    /// Add a profile, replacing any previous one with the same name
    pub fn insert(&mut self, profile: ToolchainProfile) -> &ToolchainProfile {
        let name = profile.name.clone();
        self.profiles.insert(name.clone(), profile);
        &self.profiles[&name]
    }

    pub fn get(&self, name: &str) -> Result<&ToolchainProfile, ProfileError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ProfileError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// Argument list of a profile for the given language and stage
    pub fn args(&self, name: &str, lang: Language, stage: Stage) -> Result<&[String], ProfileError> {
        Ok(self.get(name)?.args(lang, stage))
    }

    pub fn binary(&self, name: &str, tool: &str) -> Result<Option<&[String]>, ProfileError> {
        Ok(self.get(name)?.binary(tool))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
