//! Version constraints used when matching references against a channel catalog.

pub mod constraints;

pub use constraints::{VersionConstraint, compare_versions};
