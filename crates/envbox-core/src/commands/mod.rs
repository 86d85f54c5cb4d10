//! High-level commands for envbox operations.
//!
//! These are the entry points frontends call; each one wires the lockfile
//! manager, environment builder and shell engine together for a project.

pub mod lock;
pub mod shellenv;

pub use lock::{LockCommand, LockReport};
pub use shellenv::{
    BIN_WRAPPERS_DIR, Rendering, ShellEnvCommand, ShellEnvOptions, ShellEnvReport,
    system_path_without_wrappers,
};
