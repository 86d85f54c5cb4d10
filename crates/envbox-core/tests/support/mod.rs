#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use envbox_core::env::Env;
use envbox_core::lockfile::{Lockfile, LockfileStore};
use envbox_core::manifest::ProjectConfig;
use envbox_core::store::{PackageStore, StoreError, StoreRecord};
use envbox_core::types::PackageReference;

/// In-memory store that counts lookups.
///
/// Packages are keyed by name; `interfere_with` makes every lookup rewrite
/// the lockfile of a project behind the manager's back, up to a limit.
#[derive(Clone, Default)]
pub struct FakeStore {
    records: Arc<HashMap<String, Result<StoreRecord, StoreError>>>,
    calls: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
    delay: Option<Duration>,
    interference: Option<Interference>,
}

#[derive(Clone)]
struct Interference {
    project_dir: PathBuf,
    remaining: Arc<AtomicUsize>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(self, name: &str, store_path: &str) -> Self {
        self.with_result(name, Ok(StoreRecord::new(store_path, "c0ffee")))
    }

    pub fn with_record(self, name: &str, record: StoreRecord) -> Self {
        self.with_result(name, Ok(record))
    }

    pub fn with_unreachable(self, name: &str, reason: &str) -> Self {
        self.with_result(name, Err(StoreError::Unreachable(reason.to_string())))
    }

    fn with_result(mut self, name: &str, result: Result<StoreRecord, StoreError>) -> Self {
        let mut records = (*self.records).clone();
        records.insert(name.to_string(), result);
        self.records = Arc::new(records);
        self
    }

    /// Rewrite the lockfile in `project_dir` during the next `times` lookups.
    pub fn interfere_with(mut self, project_dir: &Path, times: usize) -> Self {
        self.interference = Some(Interference {
            project_dir: project_dir.to_path_buf(),
            remaining: Arc::new(AtomicUsize::new(times)),
        });
        self
    }

    /// Make every lookup wait `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Lookups that ran to completion.
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Handle that keeps observing the count after the store is moved.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl PackageStore for FakeStore {
    async fn lookup(
        &self,
        name: &str,
        _version: Option<&str>,
        _channel: &str,
    ) -> Result<StoreRecord, StoreError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(interference) = &self.interference {
            let claimed = interference
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if claimed {
                let other = Lockfile::new(format!("written-by-someone-else-{call}"));
                LockfileStore::persist(&interference.project_dir, &other)
                    .expect("interfering write should succeed");
            }
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
        self.records
            .get(name)
            .cloned()
            .unwrap_or(Err(StoreError::NotFound))
    }
}

/// Project defined in code instead of an `envbox.toml`.
pub struct TestProject {
    pub dir: PathBuf,
    pub packages: Vec<PackageReference>,
    pub channel: Option<String>,
    pub env: Env,
    pub hash: String,
}

impl TestProject {
    pub fn new(dir: &Path, packages: &[&str]) -> Self {
        Self {
            dir: dir.to_path_buf(),
            packages: packages
                .iter()
                .map(|raw| PackageReference::parse(raw).expect("reference should parse"))
                .collect(),
            channel: None,
            env: Env::new(),
            hash: format!("hash-of-{}", packages.join(",")),
        }
    }

    pub fn with_hash(mut self, hash: &str) -> Self {
        self.hash = hash.to_string();
        self
    }
}

impl ProjectConfig for TestProject {
    fn packages(&self) -> &[PackageReference] {
        &self.packages
    }

    fn config_hash(&self) -> String {
        self.hash.clone()
    }

    fn project_dir(&self) -> &Path {
        &self.dir
    }

    fn pinned_channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    fn env(&self) -> Env {
        self.env.clone()
    }
}

pub fn env(pairs: &[(&str, &str)]) -> Env {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
