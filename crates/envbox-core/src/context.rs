//! Application context for unified dependency injection.

use std::path::{Path, PathBuf};

use crate::commands::{LockCommand, ShellEnvCommand};
use crate::lockfile::LockfileManager;
use crate::manifest::ProjectManifest;
use crate::resolver::CoordinateResolver;
use crate::settings::Settings;
use crate::store::StoreBackend;

/// Unified application context for dependency injection.
///
/// Frontends create this once from settings and the working directory and
/// pass it to commands; nothing in the pipeline reads global state.
#[derive(Debug, Clone)]
pub struct AppContext {
    settings: Settings,
    working_dir: PathBuf,
}

impl AppContext {
    pub fn new(settings: Settings, working_dir: PathBuf) -> Self {
        Self {
            settings,
            working_dir,
        }
    }

    /// Load settings from their default location, relative to the current
    /// directory.
    pub fn from_defaults() -> anyhow::Result<Self> {
        let settings = Settings::load(&Settings::default_path()?)?;
        let working_dir = std::env::current_dir()?;
        Ok(Self::new(settings, working_dir))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Load the project at `config`, or the nearest one above the working
    /// directory.
    pub fn project(&self, config: Option<&Path>) -> anyhow::Result<ProjectManifest> {
        match config {
            Some(dir) => {
                let dir = self.working_dir.join(dir);
                ProjectManifest::load(&dir)
            }
            None => ProjectManifest::discover(&self.working_dir),
        }
    }

    /// Get a resolver over the configured store backend.
    pub fn resolver(&self) -> anyhow::Result<CoordinateResolver<StoreBackend>> {
        let store = self.settings.store_backend()?;
        let legacy_root = self.settings.legacy_root();
        Ok(CoordinateResolver::new(store)
            .with_default_channel(&self.settings.default_channel)
            .with_legacy(
                legacy_root.to_string_lossy().into_owned(),
                &self.settings.legacy_commit,
            )
            .with_timeout(self.settings.timeout()))
    }

    /// Get a LockfileManager honoring concurrency and offline settings.
    pub fn lockfile_manager(&self) -> anyhow::Result<LockfileManager<StoreBackend>> {
        Ok(LockfileManager::new(self.resolver()?)
            .with_concurrency(self.settings.concurrency)
            .with_offline(self.settings.offline))
    }

    pub fn shellenv_command(&self) -> anyhow::Result<ShellEnvCommand<StoreBackend>> {
        Ok(ShellEnvCommand::new(self.lockfile_manager()?))
    }

    pub fn lock_command(&self) -> anyhow::Result<LockCommand<StoreBackend>> {
        Ok(LockCommand::new(self.lockfile_manager()?))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::manifest::{MANIFEST_NAME, ProjectConfig};
    use crate::settings::StoreSettings;

    #[test]
    fn test_project_resolves_relative_config() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let project_dir = tmp.path().join("app");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(project_dir.join(MANIFEST_NAME), "packages = [\"go\"]\n").unwrap();

        let ctx = AppContext::new(Settings::default(), tmp.path().to_path_buf());
        let project = ctx.project(Some(Path::new("app"))).unwrap();
        assert_eq!(project.project_dir(), project_dir.as_path());
        assert!(ctx.project(None).is_err());
    }

    #[test]
    fn test_resolver_uses_settings() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let catalog = tmp.path().join("catalog.json");
        std::fs::write(&catalog, r#"{"channels": {}}"#).unwrap();

        let settings = Settings {
            store: StoreSettings::Catalog { path: catalog },
            default_channel: "stable".to_string(),
            legacy_root: Some(PathBuf::from("/legacy")),
            legacy_commit: "abc".to_string(),
            ..Settings::default()
        };
        let ctx = AppContext::new(settings, tmp.path().to_path_buf());
        let resolver = ctx.resolver().unwrap();
        assert_eq!(resolver.default_channel(), "stable");
        assert_eq!(
            resolver.legacy_path(&crate::types::PackageReference::new("go")),
            "/legacy/abc/go"
        );
    }
}
