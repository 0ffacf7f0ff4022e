//! Build matrix entries

use crate::core::config::MatrixEntryConfig;
use std::collections::HashMap;
use std::path::PathBuf;

/// One (OS, architecture) combination of the build matrix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixEntry {
    pub name: String,
    pub os: String,
    pub arch: String,
    pub build_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub profile: Option<String>,
    pub variables: HashMap<String, String>,
}

impl MatrixEntry {
    pub fn from_config(config: &MatrixEntryConfig) -> Self {
        Self {
            name: config.name.clone(),
            os: config.os.clone(),
            arch: config.arch.clone(),
            build_dir: expand_home(&config.build_dir),
            cache_dir: expand_home(&config.cache_dir),
            profile: config.profile.clone(),
            variables: config.variables.clone(),
        }
    }

    /// `os/arch` identifier
    pub fn target(&self) -> String {
        format!("{}/{}", self.os, self.arch)
    }

    /// Variables contributed by the entry itself
    pub fn variables(&self) -> HashMap<String, String> {
        let mut vars = self.variables.clone();
        vars.insert("entry".to_string(), self.name.clone());
        vars.insert("os".to_string(), self.os.clone());
        vars.insert("arch".to_string(), self.arch.clone());
        vars.insert("build_dir".to_string(), self.build_dir.display().to_string());
        vars.insert("cache_dir".to_string(), self.cache_dir.display().to_string());
        if let Some(profile) = &self.profile {
            vars.insert("profile".to_string(), profile.clone());
        }
        vars
    }
}

/// Expand a leading `~/` to the user's home directory
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}
