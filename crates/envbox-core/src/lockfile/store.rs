//! Lockfile persistence inside the project directory.
//!
//! The lockfile lives at `<project>/envbox.lock`. Writes go through a temp
//! file in the same directory followed by a rename, so readers only ever see
//! the old or the new file. Writers serialize on an advisory lock held on
//! `<project>/.envbox.lock.guard`.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs4::FileExt;

use crate::error::{Error, Result};

use super::types::Lockfile;

pub const LOCKFILE_NAME: &str = "envbox.lock";
pub const GUARD_NAME: &str = ".envbox.lock.guard";

/// Content identity of the lockfile as last read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fingerprint {
    Absent,
    Content(String),
}

impl Fingerprint {
    fn of(bytes: &[u8]) -> Self {
        Fingerprint::Content(blake3::hash(bytes).to_hex().to_string())
    }
}

/// Lockfile storage and persistence
pub struct LockfileStore;

impl LockfileStore {
    pub fn lockfile_path(project_dir: &Path) -> PathBuf {
        project_dir.join(LOCKFILE_NAME)
    }

    pub fn guard_path(project_dir: &Path) -> PathBuf {
        project_dir.join(GUARD_NAME)
    }

    /// Load the lockfile, `None` when the project has none yet.
    pub fn load(project_dir: &Path) -> Result<Option<Lockfile>> {
        Self::read(project_dir).map(|(lockfile, _)| lockfile)
    }

    /// Load the lockfile together with the fingerprint of the bytes read.
    ///
    /// Unreadable or unparseable content is reported as corrupt and left
    /// untouched on disk.
    pub fn read(project_dir: &Path) -> Result<(Option<Lockfile>, Fingerprint)> {
        let path = Self::lockfile_path(project_dir);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok((None, Fingerprint::Absent)),
            Err(e) => return Err(Error::corrupt(&path, format!("unreadable: {e}"))),
        };

        let lockfile: Lockfile = serde_json::from_slice(&bytes)
            .map_err(|e| Error::corrupt(&path, format!("invalid JSON: {e}")))?;
        lockfile
            .validate()
            .map_err(|reason| Error::corrupt(&path, reason))?;

        Ok((Some(lockfile), Fingerprint::of(&bytes)))
    }

    /// Fingerprint the lockfile as it is on disk right now.
    pub fn fingerprint(project_dir: &Path) -> Result<Fingerprint> {
        let path = Self::lockfile_path(project_dir);
        match fs::read(&path) {
            Ok(bytes) => Ok(Fingerprint::of(&bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Fingerprint::Absent),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    /// Replace the lockfile unconditionally (still atomic and serialized).
    pub fn persist(project_dir: &Path, lockfile: &Lockfile) -> Result<()> {
        let bytes = serialize(project_dir, lockfile)?;
        let _guard = GuardLock::acquire(project_dir)?;
        write_atomic(&Self::lockfile_path(project_dir), &bytes)
    }

    /// Replace the lockfile only if nobody changed it since `expected` was
    /// taken. Fails with [`Error::WriteConflict`] otherwise.
    pub fn persist_if_unchanged(
        project_dir: &Path,
        lockfile: &Lockfile,
        expected: &Fingerprint,
    ) -> Result<()> {
        let bytes = serialize(project_dir, lockfile)?;
        let _guard = GuardLock::acquire(project_dir)?;

        let path = Self::lockfile_path(project_dir);
        if Self::fingerprint(project_dir)? != *expected {
            return Err(Error::WriteConflict { path, attempts: 1 });
        }
        write_atomic(&path, &bytes)
    }
}

fn serialize(project_dir: &Path, lockfile: &Lockfile) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(lockfile).map_err(|e| {
        Error::corrupt(
            LockfileStore::lockfile_path(project_dir),
            format!("cannot serialize: {e}"),
        )
    })?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Write `bytes` to a sibling temp file, fsync it, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".envbox.lock.")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| Error::io(dir, e))?;

    tmp.write_all(bytes).map_err(|e| Error::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| Error::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;

    tracing::debug!(path = %path.display(), "lockfile written");
    Ok(())
}

/// Exclusive advisory lock on the project's guard file, released on drop.
#[derive(Debug)]
struct GuardLock {
    _file: File,
}

impl GuardLock {
    fn acquire(project_dir: &Path) -> Result<Self> {
        fs::create_dir_all(project_dir).map_err(|e| Error::io(project_dir, e))?;
        let path = LockfileStore::guard_path(project_dir);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::io(&path, e))?;
        file.lock_exclusive().map_err(|e| Error::io(&path, e))?;
        Ok(Self { _file: file })
    }
}
