//! Cross-compile profile store
//!
//! Profiles are meson cross files. Each one describes the host machine, the
//! toolchain binaries and the argument lists applied to every compilation unit
//! built for that target.

pub mod lexer;
pub mod parser;
pub mod store;

pub use parser::{CrossFile, Value};
pub use store::ProfileStore;

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or querying profiles
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("{profile}:{line}: {message}")]
    ConfigParse {
        profile: String,
        line: usize,
        message: String,
    },

    #[error("profile '{profile}' is missing required section [{section}]")]
    MissingSection {
        profile: String,
        section: &'static str,
    },

    #[error("profile '{profile}' is missing '{key}' in [{section}]")]
    MissingKey {
        profile: String,
        section: &'static str,
        key: String,
    },

    #[error("profile '{profile}': invalid value for '{key}': {message}")]
    InvalidValue {
        profile: String,
        key: String,
        message: String,
    },

    #[error("unknown profile '{0}'")]
    NotFound(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Source language of a compilation unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    Cpp,
    ObjC,
    ObjCpp,
}

impl Language {
    pub const ALL: [Language; 4] = [Language::C, Language::Cpp, Language::ObjC, Language::ObjCpp];

    /// Key prefix used by meson (`c_args`, `objcpp_link_args`, ...)
    pub fn key_prefix(self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::ObjC => "objc",
            Language::ObjCpp => "objcpp",
        }
    }
}

/// Stage an argument list is passed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Compile,
    Link,
}

impl Stage {
    pub const ALL: [Stage; 2] = [Stage::Compile, Stage::Link];

    pub fn key_suffix(self) -> &'static str {
        match self {
            Stage::Compile => "_args",
            Stage::Link => "_link_args",
        }
    }
}

/// Meson option key for a language/stage pair
pub fn args_key(lang: Language, stage: Stage) -> String {
    format!("{}{}", lang.key_prefix(), stage.key_suffix())
}

/// Description of the machine the binaries will run on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostMachine {
    pub system: String,
    pub cpu_family: String,
    pub cpu: String,
    pub endian: String,
}

/// A loaded cross-compile profile
#[derive(Debug, Clone, Serialize)]
pub struct ToolchainProfile {
    pub name: String,
    pub host: HostMachine,
    pub constants: BTreeMap<String, Value>,
    pub binaries: BTreeMap<String, Vec<String>>,
    args: BTreeMap<String, Vec<String>>,
    pub options: BTreeMap<String, Value>,
    pub properties: BTreeMap<String, Value>,
}

const ARG_SECTIONS: [&str; 2] = ["built-in options", "properties"];

impl ToolchainProfile {
    /// Parse a profile from cross-file text
    pub fn parse(name: &str, text: &str) -> Result<Self, ProfileError> {
        let file = CrossFile::parse(name, text)?;
        Self::from_cross_file(name, &file)
    }

    fn from_cross_file(name: &str, file: &CrossFile) -> Result<Self, ProfileError> {
        for section in ["host_machine", "binaries"] {
            if !file.has_section(section) {
                return Err(ProfileError::MissingSection {
                    profile: name.to_string(),
                    section,
                });
            }
        }

        let host_key = |key: &str| -> Result<String, ProfileError> {
            let value = file.get("host_machine", key).ok_or_else(|| ProfileError::MissingKey {
                profile: name.to_string(),
                section: "host_machine",
                key: key.to_string(),
            })?;
            value.as_str().map(str::to_string).ok_or_else(|| ProfileError::InvalidValue {
                profile: name.to_string(),
                key: key.to_string(),
                message: "expected a string".to_string(),
            })
        };

        let host = HostMachine {
            system: host_key("system")?,
            cpu_family: host_key("cpu_family")?,
            cpu: host_key("cpu")?,
            endian: host_key("endian")?,
        };

        let mut binaries = BTreeMap::new();
        for (tool, value) in file.section("binaries").unwrap_or_default() {
            let command = value.to_string_list().ok_or_else(|| ProfileError::InvalidValue {
                profile: name.to_string(),
                key: tool.clone(),
                message: "expected a string or an array of strings".to_string(),
            })?;
            binaries.insert(tool.clone(), command);
        }

        let arg_keys: Vec<String> = Language::ALL
            .into_iter()
            .flat_map(|lang| Stage::ALL.into_iter().map(move |stage| args_key(lang, stage)))
            .collect();

        // [built-in options] wins over the legacy [properties] location
        let mut args = BTreeMap::new();
        for key in &arg_keys {
            let found = ARG_SECTIONS.iter().find_map(|section| file.get(section, key));
            if let Some(value) = found {
                let list = value.to_string_list().ok_or_else(|| ProfileError::InvalidValue {
                    profile: name.to_string(),
                    key: key.clone(),
                    message: "expected an array of strings".to_string(),
                })?;
                args.insert(key.clone(), list);
            }
        }

        let collect_rest = |section: &str| -> BTreeMap<String, Value> {
            file.section(section)
                .unwrap_or_default()
                .iter()
                .filter(|(k, _)| !arg_keys.contains(k))
                .cloned()
                .collect()
        };

        for section in file.sections.keys() {
            if !matches!(
                section.as_str(),
                "host_machine" | "binaries" | "constants" | "built-in options" | "properties"
            ) {
                tracing::debug!("Profile {}: ignoring section [{}]", name, section);
            }
        }

        Ok(ToolchainProfile {
            name: name.to_string(),
            host,
            constants: file
                .section("constants")
                .unwrap_or_default()
                .iter()
                .cloned()
                .collect(),
            binaries,
            args,
            options: collect_rest("built-in options"),
            properties: collect_rest("properties"),
        })
    }

    /// Argument list for a language and stage, exactly as configured
    ///
    /// Languages without a configured list yield an empty slice.
    pub fn args(&self, lang: Language, stage: Stage) -> &[String] {
        self.args
            .get(&args_key(lang, stage))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Command for a tool from `[binaries]`
    pub fn binary(&self, tool: &str) -> Option<&[String]> {
        self.binaries.get(tool).map(Vec::as_slice)
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Whether built binaries need an execution wrapper to run on the build machine
    pub fn needs_exe_wrapper(&self) -> bool {
        self.property("needs_exe_wrapper")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Flatten the profile into template variables (`profile.*`)
    pub fn template_variables(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("profile.name".to_string(), self.name.clone());
        vars.insert("profile.system".to_string(), self.host.system.clone());
        vars.insert("profile.cpu_family".to_string(), self.host.cpu_family.clone());
        vars.insert("profile.cpu".to_string(), self.host.cpu.clone());
        vars.insert("profile.endian".to_string(), self.host.endian.clone());
        vars.insert(
            "profile.needs_exe_wrapper".to_string(),
            self.needs_exe_wrapper().to_string(),
        );

        for (tool, command) in &self.binaries {
            vars.insert(format!("profile.binaries.{}", tool), command.join(" "));
        }
        for (key, list) in &self.args {
            vars.insert(format!("profile.{}", key), list.join(" "));
        }

        vars
    }
}
