//! Lockfile types, persistence and state management.
//!
//! The lockfile records what each requested package resolved to.
//! [`LockfileManager`] is its only writer.

pub mod manager;
pub mod store;
pub mod types;

pub use manager::{DEFAULT_CONCURRENCY, LockfileManager, MAX_WRITE_ATTEMPTS};
pub use store::{Fingerprint, LockfileStore};
pub use types::{LockEntry, LockState, Lockfile, SCHEMA_VERSION};
