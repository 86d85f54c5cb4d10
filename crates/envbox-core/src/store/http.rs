//! HTTP store backend.
//!
//! Resolves packages against a search service exposing
//! `GET <base>/v1/resolve?name=<name>&version=<version>&channel=<channel>`.

use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use url::Url;

use super::{PackageStore, StoreError, StoreRecord};

const USER_AGENT: &str = concat!("envbox/", env!("CARGO_PKG_VERSION"));

/// Store backend talking to a remote resolve endpoint.
#[derive(Debug, Clone)]
pub struct HttpStore {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpStore {
    /// Create a client for `base_url` with a per-request timeout.
    pub fn new(base_url: Url, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Construct the resolve URL for a lookup.
    pub fn resolve_url(
        &self,
        name: &str,
        version: Option<&str>,
        channel: &str,
    ) -> Result<Url, StoreError> {
        let mut url = self
            .base_url
            .join("v1/resolve")
            .map_err(|e| StoreError::Unreachable(format!("invalid store URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("name", name)
            .append_pair("version", version.unwrap_or("latest"))
            .append_pair("channel", channel);
        Ok(url)
    }
}

impl PackageStore for HttpStore {
    async fn lookup(
        &self,
        name: &str,
        version: Option<&str>,
        channel: &str,
    ) -> Result<StoreRecord, StoreError> {
        let url = self.resolve_url(name, version, channel)?;
        tracing::debug!(%url, "querying package store");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| StoreError::Unreachable(format!("request to {url} failed: {e}")))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(StoreError::NotFound),
            status if status.is_success() => response.json::<StoreRecord>().await.map_err(|e| {
                StoreError::Unreachable(format!("invalid response from {url}: {e}"))
            }),
            status => Err(StoreError::Unreachable(format!("HTTP {status} from {url}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(base: &str) -> HttpStore {
        HttpStore::new(Url::parse(base).unwrap(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_resolve_url_encodes_query() {
        let store = store("https://search.example.com/");
        let url = store
            .resolve_url("python3", Some("3.11"), "nixpkgs-unstable")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://search.example.com/v1/resolve?name=python3&version=3.11&channel=nixpkgs-unstable"
        );
    }

    #[test]
    fn test_resolve_url_defaults_to_latest() {
        let store = store("https://search.example.com/api/");
        let url = store.resolve_url("@scope/tool", None, "stable").unwrap();
        assert_eq!(
            url.as_str(),
            "https://search.example.com/api/v1/resolve?name=%40scope%2Ftool&version=latest&channel=stable"
        );
    }
}
