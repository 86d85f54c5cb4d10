//! Shellenv command implementation.
//!
//! Drives the full pipeline for one project: bring the lockfile up to date,
//! compose the environment, diff it against the calling shell and render
//! the result. Nothing is returned unless every step succeeded, so callers
//! can print the output in one write.

use indexmap::IndexMap;

use crate::env::{Env, EnvBuilder, ExportValue, PATH_KEY, ShellExport, diff, split_path, strip_path_entries};
use crate::error::{Error, Result};
use crate::lockfile::{LockEntry, LockfileManager};
use crate::manifest::ProjectConfig;
use crate::shell::ShellVariant;
use crate::store::PackageStore;

/// Marker of the per-project bin-wrapper directory inside `PATH`.
pub const BIN_WRAPPERS_DIR: &str = ".envbox/virtenv/.wrappers/bin";

/// How the composed environment is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rendering {
    /// Set/unset instructions relative to the calling shell
    #[default]
    Activation,
    /// Set instructions for the whole environment
    Dump,
    /// JSON object of the variables to set
    Json,
}

/// Options for the shellenv command
#[derive(Debug, Clone)]
pub struct ShellEnvOptions {
    /// Target shell
    pub shell: ShellVariant,
    /// Keep only an allow-list of inherited variables
    pub pure: bool,
    /// Append the project's init hook
    pub run_init_hook: bool,
    /// Append the shell's hash-refresh directive
    pub hash_refresh: bool,
    pub rendering: Rendering,
}

impl ShellEnvOptions {
    pub fn new(shell: ShellVariant) -> Self {
        Self {
            shell,
            pure: false,
            run_init_hook: false,
            hash_refresh: true,
            rendering: Rendering::Activation,
        }
    }

    pub fn with_pure(mut self, pure: bool) -> Self {
        self.pure = pure;
        self
    }

    pub fn with_init_hook(mut self, run_init_hook: bool) -> Self {
        self.run_init_hook = run_init_hook;
        self
    }

    pub fn with_hash_refresh(mut self, hash_refresh: bool) -> Self {
        self.hash_refresh = hash_refresh;
        self
    }

    pub fn with_rendering(mut self, rendering: Rendering) -> Self {
        self.rendering = rendering;
        self
    }
}

/// Result of a shellenv run
#[derive(Debug, Clone)]
pub struct ShellEnvReport {
    /// Lock entries the environment was built from
    pub entries: Vec<LockEntry>,
    /// Fully composed environment
    pub env: Env,
    /// Changes relative to the inherited environment
    pub export: ShellExport,
    /// Text to print
    pub output: String,
}

/// Shellenv command orchestrator
#[derive(Debug, Clone)]
pub struct ShellEnvCommand<S> {
    manager: LockfileManager<S>,
}

impl<S: PackageStore> ShellEnvCommand<S> {
    pub fn new(manager: LockfileManager<S>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &LockfileManager<S> {
        &self.manager
    }

    /// Resolve, build, diff and render the project's environment.
    pub async fn run<P>(
        &self,
        project: &P,
        inherited: &Env,
        options: &ShellEnvOptions,
    ) -> Result<ShellEnvReport>
    where
        P: ProjectConfig + ?Sized,
    {
        let entries = self
            .manager
            .ensure_resolved(project, project.packages())
            .await?;

        // Inherited names the shell cannot address are left alone; project
        // and package names still fail at render time.
        let inherited = options.shell.addressable(inherited);
        let (builder, base_path) = if options.pure {
            (EnvBuilder::pure(inherited.clone()), Vec::new())
        } else {
            let path = inherited.get(PATH_KEY).map(String::as_str).unwrap_or_default();
            (EnvBuilder::new(inherited.clone()), split_path(path))
        };
        let env = builder.build(&entries, &project.env(), &base_path)?;
        let export = diff(&inherited, &env);

        let output = match options.rendering {
            Rendering::Activation => {
                let mut out = options.shell.activation(&export, options.hash_refresh)?;
                if options.run_init_hook {
                    append_lines(&mut out, project.init_hook());
                }
                out
            }
            Rendering::Dump => options.shell.dump(&env)?,
            Rendering::Json => render_json(&export)?,
        };

        tracing::debug!(
            shell = %options.shell,
            entries = entries.len(),
            changed = export.len(),
            "rendered shell environment"
        );
        Ok(ShellEnvReport {
            entries,
            env,
            export,
            output,
        })
    }
}

/// Export the inherited `PATH` with the project's bin-wrapper directories
/// removed.
pub fn system_path_without_wrappers(shell: ShellVariant, inherited: &Env) -> Result<String> {
    let path = inherited.get(PATH_KEY).map(String::as_str).unwrap_or_default();
    let mut export = ShellExport::new();
    export.insert(
        PATH_KEY.to_string(),
        ExportValue::Set(strip_path_entries(path, BIN_WRAPPERS_DIR)),
    );
    shell.export(&export)
}

fn append_lines(out: &mut String, lines: &[String]) {
    for line in lines {
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(line);
        out.push('\n');
    }
}

/// JSON object of the variables to set; unsets are left out since the
/// consumer loads the object as-is.
fn render_json(export: &ShellExport) -> Result<String> {
    let values: IndexMap<&str, &str> = export
        .iter()
        .filter_map(|(key, value)| value.as_set().map(|value| (key.as_str(), value)))
        .collect();
    let mut out = serde_json::to_string(&values)
        .map_err(|e| Error::unrepresentable("json", "environment", e.to_string()))?;
    out.push('\n');
    Ok(out)
}
