//! External package store interface.
//!
//! The store is the only network-shaped dependency of the pipeline. Two
//! backends are provided:
//! - [`HttpStore`]: queries a resolve endpoint over HTTP
//! - [`CatalogStore`]: reads a local channel snapshot file

pub mod catalog;
pub mod http;

use std::future::Future;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use catalog::CatalogStore;
pub use http::HttpStore;

/// What the store returns for a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreRecord {
    pub store_path: String,
    pub commit_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin_dirs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,
}

impl StoreRecord {
    pub fn new(store_path: impl Into<String>, commit_hash: impl Into<String>) -> Self {
        Self {
            store_path: store_path.into(),
            commit_hash: commit_hash.into(),
            bin_dirs: None,
            env: IndexMap::new(),
        }
    }
}

/// Lookup failures reported by a store backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("no match in store")]
    NotFound,
    #[error("{0}")]
    Unreachable(String),
}

/// Query interface of the external package store.
///
/// Implementations must be deterministic for a fixed channel snapshot and
/// must not mutate local state.
pub trait PackageStore: Send + Sync + 'static {
    fn lookup(
        &self,
        name: &str,
        version: Option<&str>,
        channel: &str,
    ) -> impl Future<Output = Result<StoreRecord, StoreError>> + Send;
}

/// Store backend selected from settings.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    Http(HttpStore),
    Catalog(CatalogStore),
}

impl PackageStore for StoreBackend {
    async fn lookup(
        &self,
        name: &str,
        version: Option<&str>,
        channel: &str,
    ) -> Result<StoreRecord, StoreError> {
        match self {
            StoreBackend::Http(store) => store.lookup(name, version, channel).await,
            StoreBackend::Catalog(store) => store.lookup(name, version, channel).await,
        }
    }
}
