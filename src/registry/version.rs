//! Runtime package versions (`major.minor[.patch[.build]][-hash]`)

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("version '{0}' needs between two and four numeric parts")]
    PartCount(String),

    #[error("version '{version}' has a non-numeric part '{part}'")]
    NotNumeric { version: String, part: String },
}

/// A dotted package version, ordered numerically part by part
///
/// Missing parts are zero, so `1.22` equals `1.22.0.0`. The optional commit
/// hash is carried for display and ignored by comparisons.
#[derive(Debug, Clone)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub build: u64,
    pub hash: Option<String>,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64, build: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            build,
            hash: None,
        }
    }

    fn key(&self) -> (u64, u64, u64, u64) {
        (self.major, self.minor, self.patch, self.build)
    }

    /// `1.22.0.4-1a2b3c` form; plain version when there is no hash
    pub fn long(&self) -> String {
        match &self.hash {
            Some(hash) => format!("{}-{}", self, hash),
            None => self.to_string(),
        }
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (numbers, hash) = match s.split_once('-') {
            Some((numbers, hash)) if !hash.is_empty() => (numbers, Some(hash.to_string())),
            _ => (s, None),
        };

        let parts: Vec<&str> = numbers.split('.').collect();
        if !(2..=4).contains(&parts.len()) {
            return Err(VersionError::PartCount(s.to_string()));
        }

        let mut fields = [0u64; 4];
        for (field, part) in fields.iter_mut().zip(&parts) {
            *field = part.parse().map_err(|_| VersionError::NotNumeric {
                version: s.to_string(),
                part: part.to_string(),
            })?;
        }

        let [major, minor, patch, build] = fields;
        Ok(Self {
            major,
            minor,
            patch,
            build,
            hash,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.patch, self.build)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}
