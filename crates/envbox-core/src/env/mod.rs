//! Environment composition.
//!
//! Turns resolved lock entries plus project variables into the final process
//! environment, and computes the difference a shell must apply to reach it.
//! Everything here is pure: no I/O, no shared state.

use indexmap::{IndexMap, IndexSet};

use crate::error::Result;
use crate::lockfile::LockEntry;

/// A realized process environment, in insertion order.
pub type Env = IndexMap<String, String>;

/// Changes to apply in a shell, in emission order.
pub type ShellExport = IndexMap<String, ExportValue>;

pub const PATH_KEY: &str = "PATH";
pub const PATH_SEPARATOR: char = ':';

/// Variables kept from the inherited environment in pure mode.
pub const PURE_ALLOWLIST: &[&str] = &["HOME", "USER", "DISPLAY", "TERM", "TMPDIR"];

/// Value of a variable in a [`ShellExport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportValue {
    Set(String),
    Unset,
}

impl ExportValue {
    pub fn as_set(&self) -> Option<&str> {
        match self {
            ExportValue::Set(value) => Some(value),
            ExportValue::Unset => None,
        }
    }
}

/// Composes the environment of a project.
#[derive(Debug, Clone, Default)]
pub struct EnvBuilder {
    base: Env,
}

impl EnvBuilder {
    /// Start from the full inherited environment.
    pub fn new(inherited: Env) -> Self {
        Self { base: inherited }
    }

    /// Start from the inherited environment reduced to [`PURE_ALLOWLIST`].
    pub fn pure(inherited: Env) -> Self {
        let base = inherited
            .into_iter()
            .filter(|(key, _)| PURE_ALLOWLIST.contains(&key.as_str()))
            .collect();
        Self { base }
    }

    pub fn base(&self) -> &Env {
        &self.base
    }

    /// Compose the final environment.
    ///
    /// Later layers win: inherited base, then each entry's package variables
    /// in entry order, then `extra_vars`. `PATH` is rebuilt from the entries'
    /// binary directories, package-contributed `PATH` segments and
    /// `base_path`, deduplicated with first occurrence kept, unless
    /// `extra_vars` sets it explicitly.
    pub fn build(&self, entries: &[LockEntry], extra_vars: &Env, base_path: &[String]) -> Result<Env> {
        let mut env = self.base.clone();
        let mut segments: Vec<String> = Vec::new();

        for entry in entries {
            segments.extend(entry.coordinate.binary_dirs());
        }
        for entry in entries {
            for (key, value) in &entry.coordinate.env {
                if key == PATH_KEY {
                    segments.extend(split_path(value));
                } else {
                    env.insert(key.clone(), value.clone());
                }
            }
        }
        segments.extend(base_path.iter().cloned());

        env.insert(PATH_KEY.to_string(), join_path(dedup_segments(segments)));

        for (key, value) in extra_vars {
            env.insert(key.clone(), value.clone());
        }

        Ok(env)
    }
}

/// What a shell holding `before` must do to hold `after`.
///
/// Changed or new keys of `after` are set, in `after` order; keys missing
/// from `after` are unset, in `before` order.
pub fn diff(before: &Env, after: &Env) -> ShellExport {
    let mut export = ShellExport::new();
    for (key, value) in after {
        if before.get(key) != Some(value) {
            export.insert(key.clone(), ExportValue::Set(value.clone()));
        }
    }
    for key in before.keys() {
        if !after.contains_key(key) {
            export.insert(key.clone(), ExportValue::Unset);
        }
    }
    export
}

/// Every variable of `env` as a set instruction.
pub fn set_all(env: &Env) -> ShellExport {
    env.iter()
        .map(|(key, value)| (key.clone(), ExportValue::Set(value.clone())))
        .collect()
}

/// Drop every `PATH` segment containing `needle`.
pub fn strip_path_entries(path: &str, needle: &str) -> String {
    join_path(
        split_path(path)
            .into_iter()
            .filter(|segment| needle.is_empty() || !segment.contains(needle)),
    )
}

/// Split a `PATH` value, dropping empty segments.
pub fn split_path(path: &str) -> Vec<String> {
    path.split(PATH_SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

fn dedup_segments(segments: Vec<String>) -> IndexSet<String> {
    segments
        .into_iter()
        .filter(|segment| !segment.is_empty())
        .collect()
}

fn join_path(segments: impl IntoIterator<Item = String>) -> String {
    segments.into_iter().collect::<Vec<_>>().join(":")
}
