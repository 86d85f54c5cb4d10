//! Lockfile state machine.
//!
//! Brings a project's lockfile in line with the packages it requests:
//! - `Absent`: resolve everything and write a new lockfile
//! - `Stale`: resolve only references without a reusable entry
//! - `Valid`: return the cached entries, no resolver calls and no write
//!
//! Writes are optimistic. The fingerprint of the file as read is compared
//! again under the guard lock right before the rename, and a mismatch
//! restarts the read-resolve-write cycle.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{Error, Result};
use crate::manifest::ProjectConfig;
use crate::resolver::{CoordinateResolver, resolution_key};
use crate::store::PackageStore;
use crate::types::{Coordinate, PackageReference};

use super::store::LockfileStore;
use super::types::{LockEntry, LockState, Lockfile, SCHEMA_VERSION};

/// Resolver calls allowed in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Read-resolve-write cycles attempted before a conflict is surfaced.
pub const MAX_WRITE_ATTEMPTS: usize = 3;

/// Owns reading, validating, updating and persisting project lockfiles.
#[derive(Debug, Clone)]
pub struct LockfileManager<S> {
    resolver: CoordinateResolver<S>,
    concurrency: usize,
    offline: bool,
    max_attempts: usize,
}

impl<S: PackageStore> LockfileManager<S> {
    pub fn new(resolver: CoordinateResolver<S>) -> Self {
        Self {
            resolver,
            concurrency: DEFAULT_CONCURRENCY,
            offline: false,
            max_attempts: MAX_WRITE_ATTEMPTS,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Refuse to contact the store; stale lockfiles become errors.
    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn resolver(&self) -> &CoordinateResolver<S> {
        &self.resolver
    }

    /// Read the project's lockfile without validating it against anything.
    pub fn load(&self, project_dir: &std::path::Path) -> Result<Option<Lockfile>> {
        LockfileStore::load(project_dir)
    }

    /// Atomically replace the project's lockfile.
    pub fn persist(&self, project_dir: &std::path::Path, lockfile: &Lockfile) -> Result<()> {
        LockfileStore::persist(project_dir, lockfile)
    }

    /// Path of a reference resolved before coordinates existed.
    pub fn legacy_nixpkgs_path(&self, reference: &PackageReference) -> String {
        self.resolver.legacy_path(reference)
    }

    /// Freshness of the lockfile for the given request.
    pub fn status<P>(&self, project: &P, references: &[PackageReference]) -> Result<LockState>
    where
        P: ProjectConfig + ?Sized,
    {
        let requested = dedup_references(references);
        let channel = self.resolver.channel_for(project.pinned_channel());
        let existing = LockfileStore::load(project.project_dir())?;
        let plan = Plan::new(existing.as_ref(), &requested, channel, &project.config_hash());
        Ok(plan.state)
    }

    /// Return one entry per distinct requested reference, in request order,
    /// resolving and persisting whatever the lockfile is missing.
    ///
    /// Fails with the error of the first failing reference in request
    /// order. Dropping the returned future aborts in-flight lookups before
    /// anything is written.
    pub async fn ensure_resolved<P>(
        &self,
        project: &P,
        references: &[PackageReference],
    ) -> Result<Vec<LockEntry>>
    where
        P: ProjectConfig + ?Sized,
    {
        let project_dir = project.project_dir();
        let requested = dedup_references(references);
        for reference in &requested {
            reference.validate()?;
        }
        let channel = self
            .resolver
            .channel_for(project.pinned_channel())
            .to_string();
        let config_hash = project.config_hash();

        let mut attempt = 0;
        loop {
            attempt += 1;
            let (existing, fingerprint) = LockfileStore::read(project_dir)?;
            let mut plan = Plan::new(existing.as_ref(), &requested, &channel, &config_hash);
            for entry in plan.slots.iter_mut().flatten() {
                self.fill_legacy_path(entry);
            }
            tracing::debug!(
                project = %project_dir.display(),
                state = %plan.state,
                attempt,
                "checked lockfile"
            );

            if plan.state == LockState::Valid {
                return Ok(plan.slots.into_iter().flatten().collect());
            }

            let missing = plan.missing(&requested);
            if self.offline && !missing.is_empty() {
                let names: Vec<String> = missing.iter().map(|(_, r)| r.to_string()).collect();
                return Err(Error::ConfigMismatch {
                    project: project_dir.to_path_buf(),
                    reason: format!("offline mode cannot resolve {}", names.join(", ")),
                });
            }

            if !missing.is_empty() {
                tracing::info!(
                    count = missing.len(),
                    total = requested.len(),
                    channel = %channel,
                    "resolving packages"
                );
            }
            let coordinates = self.resolve_all(&missing, &channel).await?;

            let lockfile = plan.complete(existing, &requested, &config_hash, missing, coordinates);
            match LockfileStore::persist_if_unchanged(project_dir, &lockfile, &fingerprint) {
                Ok(()) => {
                    tracing::info!(
                        project = %project_dir.display(),
                        entries = lockfile.entries.len(),
                        "lockfile updated"
                    );
                    return Ok(lockfile.entries);
                }
                Err(Error::WriteConflict { path, .. }) => {
                    if attempt >= self.max_attempts {
                        return Err(Error::WriteConflict {
                            path,
                            attempts: attempt,
                        });
                    }
                    tracing::warn!(
                        path = %path.display(),
                        attempt,
                        "lockfile changed while resolving, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Entries written before coordinates existed carry neither a store path
    /// nor a legacy path; point them at their legacy location.
    fn fill_legacy_path(&self, entry: &mut LockEntry) {
        let coordinate = &mut entry.coordinate;
        if coordinate.store_path.is_empty() && coordinate.legacy_path.is_none() {
            let path = self.resolver.legacy_path(&entry.reference);
            tracing::debug!(reference = %entry.reference, path = %path, "using legacy package path");
            coordinate.legacy_path = Some(path);
        }
    }

    /// Resolve references concurrently; results keep the input order.
    async fn resolve_all(
        &self,
        missing: &[(usize, PackageReference)],
        channel: &str,
    ) -> Result<Vec<Coordinate>> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (position, (_, reference)) in missing.iter().enumerate() {
            let resolver = self.resolver.clone();
            let semaphore = Arc::clone(&semaphore);
            let reference = reference.clone();
            let channel = channel.to_string();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = resolver.resolve(&reference, Some(channel.as_str())).await;
                (position, result)
            });
        }

        let mut results: Vec<Option<Result<Coordinate>>> =
            std::iter::repeat_with(|| None).take(missing.len()).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, result)) => results[position] = Some(result),
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => tracing::warn!(error = %e, "resolver task did not complete"),
            }
        }

        results
            .into_iter()
            .zip(missing)
            .map(|(result, (_, reference))| {
                result.unwrap_or_else(|| {
                    Err(Error::StoreUnreachable {
                        reference: reference.to_string(),
                        reason: "resolution was cancelled".to_string(),
                    })
                })
            })
            .collect()
    }
}

/// Per-request view of an existing lockfile.
struct Plan {
    state: LockState,
    keys: Vec<String>,
    /// Reusable entry for each requested reference, in request order.
    slots: Vec<Option<LockEntry>>,
}

impl Plan {
    fn new(
        existing: Option<&Lockfile>,
        requested: &[PackageReference],
        channel: &str,
        config_hash: &str,
    ) -> Self {
        let keys: Vec<String> = requested
            .iter()
            .map(|reference| resolution_key(reference, channel))
            .collect();

        let Some(lockfile) = existing else {
            return Self {
                state: LockState::Absent,
                slots: vec![None; keys.len()],
                keys,
            };
        };

        let slots: Vec<Option<LockEntry>> = keys
            .iter()
            .map(|key| lockfile.entry_for_key(key).cloned())
            .collect();
        let state = if lockfile.config_hash == config_hash && slots.iter().all(Option::is_some) {
            LockState::Valid
        } else {
            LockState::Stale
        };
        Self { state, keys, slots }
    }

    /// Requested references without a reusable entry, with their index.
    fn missing(&self, requested: &[PackageReference]) -> Vec<(usize, PackageReference)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(index, _)| (index, requested[index].clone()))
            .collect()
    }

    /// Merge reused and freshly resolved entries into the next lockfile.
    ///
    /// Entries for references that are no longer requested are dropped;
    /// unknown top-level fields of the previous lockfile are kept.
    fn complete(
        self,
        existing: Option<Lockfile>,
        requested: &[PackageReference],
        config_hash: &str,
        missing: Vec<(usize, PackageReference)>,
        coordinates: Vec<Coordinate>,
    ) -> Lockfile {
        let mut slots = self.slots;
        let now = Utc::now();
        for ((index, reference), coordinate) in missing.into_iter().zip(coordinates) {
            let entry = LockEntry::new(reference, coordinate, self.keys[index].clone())
                .with_resolved_at(now);
            slots[index] = Some(entry);
        }

        let mut lockfile = existing.unwrap_or_else(|| Lockfile::new(config_hash));
        lockfile.schema_version = SCHEMA_VERSION;
        lockfile.config_hash = config_hash.to_string();
        lockfile.entries = slots.into_iter().flatten().collect();
        debug_assert_eq!(lockfile.entries.len(), requested.len());
        lockfile
    }
}

/// Collapse duplicate references, keeping the first occurrence.
fn dedup_references(references: &[PackageReference]) -> Vec<PackageReference> {
    let mut seen = std::collections::HashSet::new();
    references
        .iter()
        .filter(|reference| seen.insert((*reference).clone()))
        .cloned()
        .collect()
}
