//! Local channel-snapshot catalog.
//!
//! A catalog file pins every channel to a commit and lists the artifacts
//! available in it:
//!
//! ```json
//! {
//!   "channels": {
//!     "nixpkgs-unstable": {
//!       "commit": "8b5ab8341e33322e5b66fb46ce23d724050f6606",
//!       "packages": {
//!         "go": [{ "version": "1.21.5", "storePath": "/nix/store/qkx1...-go-1.21.5" }]
//!       }
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::version::{VersionConstraint, compare_versions};

use super::{PackageStore, StoreError, StoreRecord};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub channels: BTreeMap<String, CatalogChannel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogChannel {
    pub commit: String,
    #[serde(default)]
    pub packages: BTreeMap<String, Vec<CatalogPackage>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPackage {
    pub version: String,
    pub store_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin_dirs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,
}

/// Store backend answering lookups from an in-memory catalog snapshot.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    source: Option<PathBuf>,
    catalog: Arc<Catalog>,
}

impl CatalogStore {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            source: None,
            catalog: Arc::new(catalog),
        }
    }

    /// Load a catalog snapshot from a JSON file.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read catalog: {}", path.display()))?;
        let catalog: Catalog = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse catalog: {}", path.display()))?;
        Ok(Self {
            source: Some(path.to_path_buf()),
            catalog: Arc::new(catalog),
        })
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Pick the highest version of `name` in `channel` satisfying `version`.
    pub fn find(&self, name: &str, version: Option<&str>, channel: &str) -> Option<StoreRecord> {
        let channel = self.catalog.channels.get(channel)?;
        let candidates = channel.packages.get(name)?;
        let constraint = VersionConstraint::parse(version);

        candidates
            .iter()
            .filter(|pkg| constraint.satisfies(&pkg.version))
            .max_by(|a, b| {
                compare_versions(&a.version, &b.version)
                    .then_with(|| b.store_path.cmp(&a.store_path))
            })
            .map(|pkg| StoreRecord {
                store_path: pkg.store_path.clone(),
                commit_hash: channel.commit.clone(),
                bin_dirs: pkg.bin_dirs.clone(),
                env: pkg.env.clone(),
            })
    }
}

impl PackageStore for CatalogStore {
    async fn lookup(
        &self,
        name: &str,
        version: Option<&str>,
        channel: &str,
    ) -> Result<StoreRecord, StoreError> {
        self.find(name, version, channel).ok_or(StoreError::NotFound)
    }
}
