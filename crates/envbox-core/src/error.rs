//! Error taxonomy for the resolution-and-export pipeline.
//!
//! Every variant carries an explicit classification tag (see [`ErrorKind`])
//! so frontends can decide how to report or retry without inspecting
//! message text.

use std::path::PathBuf;

/// Result alias for pipeline operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced while resolving, locking, building, or rendering.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("package '{reference}' was not found in channel '{channel}'")]
    NotFound { reference: String, channel: String },

    #[error("package store unreachable while resolving '{reference}': {reason}")]
    StoreUnreachable { reference: String, reason: String },

    #[error("lockfile {path} is corrupt: {reason} (repair or delete it to continue)")]
    CorruptLockfile { path: PathBuf, reason: String },

    #[error(
        "lockfile for {project} is out of date with the project configuration and resolution is disabled: {reason}"
    )]
    ConfigMismatch { project: PathBuf, reason: String },

    #[error("lockfile {path} was modified concurrently after {attempts} attempt(s)")]
    WriteConflict { path: PathBuf, attempts: usize },

    #[error("invalid package reference '{input}': {reason}")]
    InvalidReference { input: String, reason: String },

    #[error("cannot represent {what} in {shell}: {reason}")]
    Unrepresentable {
        shell: &'static str,
        what: String,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Classification tag attached to every [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    StoreUnreachable,
    CorruptLockfile,
    ConfigMismatch,
    WriteConflict,
    InvalidReference,
    Unrepresentable,
    Config,
    Io,
}

impl ErrorKind {
    /// Stable identifier suitable for logs and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::StoreUnreachable => "store_unreachable",
            ErrorKind::CorruptLockfile => "corrupt_lockfile",
            ErrorKind::ConfigMismatch => "config_mismatch",
            ErrorKind::WriteConflict => "write_conflict",
            ErrorKind::InvalidReference => "invalid_reference",
            ErrorKind::Unrepresentable => "unrepresentable",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::StoreUnreachable { .. } => ErrorKind::StoreUnreachable,
            Error::CorruptLockfile { .. } => ErrorKind::CorruptLockfile,
            Error::ConfigMismatch { .. } => ErrorKind::ConfigMismatch,
            Error::WriteConflict { .. } => ErrorKind::WriteConflict,
            Error::InvalidReference { .. } => ErrorKind::InvalidReference,
            Error::Unrepresentable { .. } => ErrorKind::Unrepresentable,
            Error::Config(_) => ErrorKind::Config,
            Error::Io { .. } => ErrorKind::Io,
        }
    }

    /// Whether a caller may retry the failed operation with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StoreUnreachable { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::CorruptLockfile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unrepresentable(
        shell: &'static str,
        what: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::Unrepresentable {
            shell,
            what: what.into(),
            reason: reason.into(),
        }
    }
}
