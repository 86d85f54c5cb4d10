//! Project configuration.
//!
//! The pipeline consumes projects only through [`ProjectConfig`]. The
//! bundled implementation, [`ProjectManifest`], reads `envbox.toml`:
//!
//! ```toml
//! packages = ["go@1.21", "ripgrep"]
//! channel = "nixpkgs-unstable"
//!
//! [env]
//! GOFLAGS = "-mod=mod"
//!
//! [shell]
//! init_hook = ["echo ready"]
//! ```

mod parser;

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::env::Env;
use crate::types::PackageReference;

pub use parser::parse_manifest_str;

/// File name of a project manifest.
pub const MANIFEST_NAME: &str = "envbox.toml";

/// What the resolution pipeline needs to know about a project.
pub trait ProjectConfig {
    /// Requested packages, in declared order.
    fn packages(&self) -> &[PackageReference];

    /// Hash of everything that influences the resolved lockfile.
    fn config_hash(&self) -> String;

    /// Directory holding the project's lockfile.
    fn project_dir(&self) -> &Path;

    /// Channel the project pins, if any.
    fn pinned_channel(&self) -> Option<&str> {
        None
    }

    /// Extra variables the project declares.
    fn env(&self) -> Env {
        Env::new()
    }

    /// Commands to run after activation.
    fn init_hook(&self) -> &[String] {
        &[]
    }
}

/// On-disk shape of `envbox.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestFile {
    #[serde(default)]
    pub packages: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    #[serde(default)]
    pub env: Env,

    #[serde(default)]
    pub shell: ShellSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShellSection {
    #[serde(default)]
    pub init_hook: Vec<String>,
}

/// A project loaded from its `envbox.toml`.
#[derive(Debug, Clone)]
pub struct ProjectManifest {
    project_dir: PathBuf,
    packages: Vec<PackageReference>,
    channel: Option<String>,
    env: Env,
    init_hook: Vec<String>,
}

impl ProjectManifest {
    /// Build a manifest from parsed file contents.
    pub fn from_file(project_dir: impl Into<PathBuf>, file: ManifestFile) -> anyhow::Result<Self> {
        let packages = file
            .packages
            .iter()
            .map(|raw| PackageReference::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            project_dir: project_dir.into(),
            packages,
            channel: file.channel.filter(|channel| !channel.trim().is_empty()),
            env: file.env,
            init_hook: file.shell.init_hook,
        })
    }

    /// Load `envbox.toml` from a project directory.
    pub fn load(project_dir: &Path) -> anyhow::Result<Self> {
        let path = project_dir.join(MANIFEST_NAME);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read project manifest: {}", path.display()))?;
        let file = parse_manifest_str(&content)
            .with_context(|| format!("Failed to parse project manifest: {}", path.display()))?;
        Self::from_file(project_dir, file)
    }

    /// Walk up from `start` to the nearest directory containing `envbox.toml`.
    pub fn discover(start: &Path) -> anyhow::Result<Self> {
        let dir = start
            .ancestors()
            .find(|dir| dir.join(MANIFEST_NAME).is_file())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No {} found in {} or any parent directory",
                    MANIFEST_NAME,
                    start.display()
                )
            })?;
        tracing::debug!(project = %dir.display(), "found project manifest");
        Self::load(dir)
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }
}

impl ProjectConfig for ProjectManifest {
    fn packages(&self) -> &[PackageReference] {
        &self.packages
    }

    fn config_hash(&self) -> String {
        let packages: Vec<String> = self.packages.iter().map(ToString::to_string).collect();
        let canonical = serde_json::json!({
            "packages": packages,
            "channel": self.channel,
            "env": self.env,
        });
        blake3::hash(canonical.to_string().as_bytes())
            .to_hex()
            .to_string()
    }

    fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    fn pinned_channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    fn env(&self) -> Env {
        self.env.clone()
    }

    fn init_hook(&self) -> &[String] {
        &self.init_hook
    }
}
