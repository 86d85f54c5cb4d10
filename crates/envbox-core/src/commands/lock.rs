//! Lock command implementation.

use crate::error::Result;
use crate::lockfile::{LockEntry, LockState, LockfileManager, LockfileStore};
use crate::manifest::ProjectConfig;
use crate::store::PackageStore;

/// Result of a lock run
#[derive(Debug, Clone)]
pub struct LockReport {
    /// Lockfile state before the run
    pub previous: LockState,
    /// Entries now recorded, in request order
    pub entries: Vec<LockEntry>,
}

impl LockReport {
    /// Whether the run rewrote the lockfile.
    pub fn changed(&self) -> bool {
        self.previous != LockState::Valid
    }
}

/// Lock command orchestrator
#[derive(Debug, Clone)]
pub struct LockCommand<S> {
    manager: LockfileManager<S>,
}

impl<S: PackageStore> LockCommand<S> {
    pub fn new(manager: LockfileManager<S>) -> Self {
        Self { manager }
    }

    /// Bring the project's lockfile up to date.
    pub async fn run<P>(&self, project: &P) -> Result<LockReport>
    where
        P: ProjectConfig + ?Sized,
    {
        let previous = self.manager.status(project, project.packages())?;
        let entries = self
            .manager
            .ensure_resolved(project, project.packages())
            .await?;
        tracing::info!(
            lockfile = %LockfileStore::lockfile_path(project.project_dir()).display(),
            previous = %previous,
            "lockfile is up to date"
        );
        Ok(LockReport { previous, entries })
    }
}
