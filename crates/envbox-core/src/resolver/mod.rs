//! Coordinate resolution.
//!
//! Maps a [`PackageReference`] to a pinned [`Coordinate`] by querying a
//! [`PackageStore`] for a channel snapshot. Resolution is deterministic for
//! a fixed `(reference, channel)` pair, which is what lets the lockfile act
//! as a cache keyed on it.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::store::{PackageStore, StoreError, StoreRecord};
use crate::types::{Coordinate, PackageReference};

/// Channel used when neither the caller nor the project pins one.
pub const DEFAULT_CHANNEL: &str = "nixpkgs-unstable";

/// Default wait for a single store lookup.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolves package references into store coordinates.
#[derive(Debug)]
pub struct CoordinateResolver<S> {
    store: Arc<S>,
    default_channel: String,
    legacy_root: String,
    legacy_commit: String,
    timeout: Duration,
}

impl<S> Clone for CoordinateResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            default_channel: self.default_channel.clone(),
            legacy_root: self.legacy_root.clone(),
            legacy_commit: self.legacy_commit.clone(),
            timeout: self.timeout,
        }
    }
}

impl<S: PackageStore> CoordinateResolver<S> {
    pub fn new(store: S) -> Self {
        Self::from_shared(Arc::new(store))
    }

    pub fn from_shared(store: Arc<S>) -> Self {
        Self {
            store,
            default_channel: DEFAULT_CHANNEL.to_string(),
            legacy_root: String::new(),
            legacy_commit: String::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_default_channel(mut self, channel: impl Into<String>) -> Self {
        self.default_channel = channel.into();
        self
    }

    /// Configure the root and pinned commit of legacy paths.
    pub fn with_legacy(mut self, root: impl Into<String>, commit: impl Into<String>) -> Self {
        self.legacy_root = root.into();
        self.legacy_commit = commit.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn default_channel(&self) -> &str {
        &self.default_channel
    }

    /// Pick the channel for a lookup: explicit hint first, then the default.
    pub fn channel_for<'a>(&'a self, hint: Option<&'a str>) -> &'a str {
        match hint {
            Some(channel) if !channel.is_empty() => channel,
            _ => &self.default_channel,
        }
    }

    /// Resolve a reference against a channel.
    ///
    /// Fails with [`Error::NotFound`] when the channel has no match and with
    /// [`Error::StoreUnreachable`] when the store errors or the lookup times
    /// out. Never touches persisted state.
    pub async fn resolve(
        &self,
        reference: &PackageReference,
        channel_hint: Option<&str>,
    ) -> Result<Coordinate> {
        reference.validate()?;
        let channel = self.channel_for(channel_hint);
        tracing::debug!(reference = %reference, channel, "resolving package");

        let lookup = self
            .store
            .lookup(&reference.name, reference.version.as_deref(), channel);
        let record = match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(record)) => record,
            Ok(Err(StoreError::NotFound)) => {
                return Err(Error::NotFound {
                    reference: reference.to_string(),
                    channel: channel.to_string(),
                });
            }
            Ok(Err(StoreError::Unreachable(reason))) => {
                return Err(Error::StoreUnreachable {
                    reference: reference.to_string(),
                    reason,
                });
            }
            Err(_) => {
                return Err(Error::StoreUnreachable {
                    reference: reference.to_string(),
                    reason: format!("lookup timed out after {:?}", self.timeout),
                });
            }
        };

        Ok(coordinate_from_record(record))
    }

    /// Deterministic path of a reference resolved before coordinates existed.
    ///
    /// The layout is `<legacy root>/<legacy commit>/<name>` and must never
    /// change: already-locked projects depend on it.
    pub fn legacy_path(&self, reference: &PackageReference) -> String {
        let root = self.legacy_root.trim_end_matches('/');
        format!("{}/{}/{}", root, self.legacy_commit, reference.name)
    }
}

/// Key identifying a resolution: the same reference in the same channel
/// always maps to the same coordinate, so an entry with a matching key can
/// be reused without asking the store again.
pub fn resolution_key(reference: &PackageReference, channel: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(reference.name.as_bytes());
    hasher.update(&[0x00]);
    hasher.update(reference.version.as_deref().unwrap_or_default().as_bytes());
    hasher.update(&[0x00]);
    hasher.update(channel.as_bytes());
    hasher.finalize().to_hex().to_string()
}

fn coordinate_from_record(record: StoreRecord) -> Coordinate {
    let mut coordinate = Coordinate::new(record.store_path, record.commit_hash);
    if let Some(bin_dirs) = record.bin_dirs {
        coordinate = coordinate.with_bin_dirs(bin_dirs);
    }
    coordinate.env = record.env;
    coordinate
}
