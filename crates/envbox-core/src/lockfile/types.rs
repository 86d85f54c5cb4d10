//! Lockfile types for resolved project state.
//!
//! Tracks which coordinate every requested reference resolved to, keyed by
//! the configuration hash that produced them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Coordinate, PackageReference};

/// Current on-disk schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Lockfile for resolved package coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lockfile {
    /// Lockfile format version
    pub schema_version: u32,

    /// Hash of the project configuration that produced `entries`
    pub config_hash: String,

    /// One entry per distinct reference, in declared order
    #[serde(default)]
    pub entries: Vec<LockEntry>,

    /// Fields written by newer versions, kept across read-modify-write
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Lockfile {
    /// Create an empty lockfile for a configuration hash
    pub fn new(config_hash: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            config_hash: config_hash.into(),
            entries: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    /// Find the entry recorded under a resolution key
    pub fn entry_for_key(&self, key: &str) -> Option<&LockEntry> {
        self.entries
            .iter()
            .find(|entry| entry.last_resolved_hash == key)
    }

    /// Find the entry for a reference, regardless of channel
    pub fn entry_for(&self, reference: &PackageReference) -> Option<&LockEntry> {
        self.entries.iter().find(|entry| &entry.reference == reference)
    }

    /// Validate the lockfile
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version == 0 || self.schema_version > SCHEMA_VERSION {
            return Err(format!(
                "unsupported schema version {} (this build reads up to {})",
                self.schema_version, SCHEMA_VERSION
            ));
        }
        Ok(())
    }
}

/// A reference pinned to the coordinate it resolved to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockEntry {
    pub reference: PackageReference,

    pub coordinate: Coordinate,

    /// Resolution key of the request that produced `coordinate`
    pub last_resolved_hash: String,

    /// When the coordinate was resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl LockEntry {
    pub fn new(
        reference: PackageReference,
        coordinate: Coordinate,
        last_resolved_hash: impl Into<String>,
    ) -> Self {
        Self {
            reference,
            coordinate,
            last_resolved_hash: last_resolved_hash.into(),
            resolved_at: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_resolved_at(mut self, resolved_at: DateTime<Utc>) -> Self {
        self.resolved_at = Some(resolved_at);
        self
    }
}

/// Freshness of a project's lockfile relative to its live configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// No lockfile on disk
    Absent,
    /// Configuration hash changed or a requested reference has no entry
    Stale,
    /// Every requested reference has a reusable entry
    Valid,
}

impl std::fmt::Display for LockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LockState::Absent => "absent",
            LockState::Stale => "stale",
            LockState::Valid => "valid",
        };
        f.write_str(name)
    }
}
