//! envbox core library
//!
//! Resolves a project's package references into pinned store coordinates,
//! keeps them in a lockfile, composes the resulting environment and renders
//! it as activation text for a host shell.

pub mod commands;
pub mod context;
pub mod env;
pub mod error;
pub mod lockfile;
pub mod manifest;
pub mod resolver;
pub mod settings;
pub mod shell;
pub mod store;
pub mod types;
pub mod version;

pub use error::{Error, ErrorKind, Result};

/// Re-exports of commonly used types
pub mod prelude {
    pub use crate::commands::{
        LockCommand, LockReport, Rendering, ShellEnvCommand, ShellEnvOptions, ShellEnvReport,
    };
    pub use crate::context::AppContext;
    pub use crate::env::{Env, EnvBuilder, ExportValue, ShellExport, diff, strip_path_entries};
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::lockfile::{LockEntry, LockState, Lockfile, LockfileManager, LockfileStore};
    pub use crate::manifest::{ProjectConfig, ProjectManifest};
    pub use crate::resolver::{CoordinateResolver, resolution_key};
    pub use crate::settings::Settings;
    pub use crate::shell::ShellVariant;
    pub use crate::store::{
        CatalogStore, HttpStore, PackageStore, StoreBackend, StoreError, StoreRecord,
    };
    pub use crate::types::{Coordinate, PackageReference};
}
