//! Tool-level settings.
//!
//! Loaded from `<config_dir>/envbox/config.toml`; every key is optional:
//!
//! ```toml
//! default_channel = "nixpkgs-unstable"
//! timeout_secs = 30
//! concurrency = 8
//! offline = false
//!
//! [store]
//! kind = "http"
//! url = "https://search.devbox.sh/"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::lockfile::DEFAULT_CONCURRENCY;
use crate::resolver::DEFAULT_CHANNEL;
use crate::store::{CatalogStore, HttpStore, StoreBackend};

pub const DEFAULT_STORE_URL: &str = "https://search.devbox.sh/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Channel commit legacy paths are pinned to.
pub const DEFAULT_LEGACY_COMMIT: &str = "f80ac848e3d6f0c12c52758c0f25c10c97ca3b62";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub store: StoreSettings,
    pub default_channel: String,
    pub timeout_secs: u64,
    pub concurrency: usize,
    pub offline: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy_root: Option<PathBuf>,
    pub legacy_commit: String,
}

/// Which package store backend to query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreSettings {
    Http { url: String },
    Catalog { path: PathBuf },
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings::Http {
            url: DEFAULT_STORE_URL.to_string(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store: StoreSettings::default(),
            default_channel: DEFAULT_CHANNEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            concurrency: DEFAULT_CONCURRENCY,
            offline: false,
            legacy_root: None,
            legacy_commit: DEFAULT_LEGACY_COMMIT.to_string(),
        }
    }
}

impl Settings {
    /// `<config_dir>/envbox/config.toml`
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(dir.join("envbox").join("config.toml"))
    }

    /// Load settings, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.default_channel.trim().is_empty() {
            anyhow::bail!("default_channel must not be empty");
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be greater than zero");
        }
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be greater than zero");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Root of legacy package paths, `<cache_dir>/envbox/nixpkgs` by default.
    pub fn legacy_root(&self) -> PathBuf {
        self.legacy_root.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("envbox")
                .join("nixpkgs")
        })
    }

    /// Construct the configured store backend.
    pub fn store_backend(&self) -> anyhow::Result<StoreBackend> {
        match &self.store {
            StoreSettings::Http { url } => {
                let mut base = Url::parse(url)
                    .with_context(|| format!("Invalid store URL: {url}"))?;
                // Url::join drops the last segment unless the base ends in '/'.
                if !base.path().ends_with('/') {
                    let path = format!("{}/", base.path());
                    base.set_path(&path);
                }
                Ok(StoreBackend::Http(HttpStore::new(base, self.timeout())?))
            }
            StoreSettings::Catalog { path } => Ok(StoreBackend::Catalog(CatalogStore::open(path)?)),
        }
    }
}
