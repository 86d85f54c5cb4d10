//! Shared core types used across the resolver, lockfile and environment layers.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Bin directory assumed when the store does not list any.
pub const DEFAULT_BIN_DIR: &str = "bin";

/// A symbolic package request, e.g. `go` or `nodejs@20`.
///
/// User input; nothing guarantees the package exists in any channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl PackageReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Parse `name` or `name@version`.
    ///
    /// The split happens at the last `@` with a non-empty left side, so
    /// scoped names such as `@scope/tool@1.0` keep their leading `@`.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let trimmed = input.trim();
        let invalid = |reason: &str| Error::InvalidReference {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let (name, version) = match trimmed.rfind('@') {
            Some(idx) if idx > 0 => {
                let version = &trimmed[idx + 1..];
                if version.is_empty() {
                    return Err(invalid("version after '@' is empty"));
                }
                (&trimmed[..idx], Some(version.to_string()))
            }
            _ => (trimmed, None),
        };

        let reference = Self {
            name: name.to_string(),
            version,
        };
        reference.validate().map_err(|_| invalid("package name is empty or contains whitespace"))?;
        Ok(reference)
    }

    /// Check the input constraints a resolver relies on.
    pub fn validate(&self) -> Result<(), Error> {
        if self.name.is_empty() || self.name.chars().any(char::is_whitespace) {
            return Err(Error::InvalidReference {
                input: self.to_string(),
                reason: "package name must be non-empty and contain no whitespace".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for PackageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{}", self.name, version),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for PackageReference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Pinned, hash-addressed pointer to a built artifact in the package store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    /// Store path of the artifact; empty for legacy coordinates.
    #[serde(default)]
    pub store_path: String,

    /// Commit of the channel snapshot the artifact was built from.
    pub source_commit_hash: String,

    /// Filesystem-style path used before coordinates existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_path: Option<String>,

    /// Directories (relative to `store_path`) the artifact adds to `PATH`.
    #[serde(default = "default_bin_dirs")]
    pub bin_dirs: Vec<String>,

    /// Variables the artifact contributes to the environment.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,
}

fn default_bin_dirs() -> Vec<String> {
    vec![DEFAULT_BIN_DIR.to_string()]
}

impl Coordinate {
    pub fn new(store_path: impl Into<String>, source_commit_hash: impl Into<String>) -> Self {
        Self {
            store_path: store_path.into(),
            source_commit_hash: source_commit_hash.into(),
            legacy_path: None,
            bin_dirs: default_bin_dirs(),
            env: IndexMap::new(),
        }
    }

    /// A coordinate recorded before store paths were tracked.
    pub fn legacy(legacy_path: impl Into<String>, source_commit_hash: impl Into<String>) -> Self {
        Self {
            store_path: String::new(),
            source_commit_hash: source_commit_hash.into(),
            legacy_path: Some(legacy_path.into()),
            bin_dirs: default_bin_dirs(),
            env: IndexMap::new(),
        }
    }

    pub fn with_bin_dirs(mut self, bin_dirs: Vec<String>) -> Self {
        self.bin_dirs = bin_dirs;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn is_legacy(&self) -> bool {
        self.store_path.is_empty() && self.legacy_path.is_some()
    }

    /// Absolute binary directories this artifact contributes, in order.
    pub fn binary_dirs(&self) -> Vec<String> {
        let root = if self.is_legacy() {
            self.legacy_path.as_deref().unwrap_or_default()
        } else {
            self.store_path.as_str()
        };
        if root.is_empty() {
            return Vec::new();
        }
        let root = root.trim_end_matches('/');
        self.bin_dirs
            .iter()
            .map(|dir| {
                let dir = dir.trim_matches('/');
                if dir.is_empty() {
                    root.to_string()
                } else {
                    format!("{root}/{dir}")
                }
            })
            .collect()
    }
}
