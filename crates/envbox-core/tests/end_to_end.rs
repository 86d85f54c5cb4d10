//! Manifest to activation text, through a catalog-backed store.

use std::path::Path;

use envbox_core::commands::{LockCommand, Rendering, ShellEnvCommand, ShellEnvOptions};
use envbox_core::env::Env;
use envbox_core::lockfile::{LockState, LockfileManager, LockfileStore};
use envbox_core::manifest::{MANIFEST_NAME, ProjectConfig, ProjectManifest};
use envbox_core::resolver::CoordinateResolver;
use envbox_core::shell::ShellVariant;
use envbox_core::store::CatalogStore;
use tempfile::TempDir;

const CATALOG: &str = r#"{
  "channels": {
    "nixpkgs-unstable": {
      "commit": "8b5ab8341e33322e5b66fb46ce23d724050f6606",
      "packages": {
        "foo": [
          { "version": "0.9", "storePath": "/nix/store/aaa-foo-0.9" }
        ],
        "bar": [
          { "version": "1.2.7", "storePath": "/nix/store/bbb-bar-1.2.7" },
          { "version": "1.3.0", "storePath": "/nix/store/ccc-bar-1.3.0" }
        ],
        "jdk": [
          {
            "version": "21",
            "storePath": "/nix/store/ddd-jdk-21",
            "binDirs": ["bin", "lib/openjdk/bin"],
            "env": { "JAVA_HOME": "/nix/store/ddd-jdk-21/lib/openjdk" }
          }
        ]
      }
    }
  }
}"#;

fn setup(manifest: &str) -> (TempDir, ProjectManifest, CatalogStore) {
    let tmp = TempDir::new().expect("tempdir should succeed");
    let catalog = tmp.path().join("catalog.json");
    std::fs::write(&catalog, CATALOG).unwrap();
    let project_dir = tmp.path().join("project");
    std::fs::create_dir_all(&project_dir).unwrap();
    std::fs::write(project_dir.join(MANIFEST_NAME), manifest).unwrap();

    let project = ProjectManifest::load(&project_dir).unwrap();
    let store = CatalogStore::open(&catalog).unwrap();
    (tmp, project, store)
}

fn shellenv(store: CatalogStore) -> ShellEnvCommand<CatalogStore> {
    ShellEnvCommand::new(LockfileManager::new(CoordinateResolver::new(store)))
}

fn inherited() -> Env {
    [("PATH", "/usr/bin"), ("HOME", "/home/dev"), ("EDITOR", "vi")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn bash_activation_puts_packages_before_system_path() {
    let (_tmp, project, store) = setup("packages = [\"foo\", \"bar@1.2\"]\n");
    let options = ShellEnvOptions::new(ShellVariant::Bash);

    let report = shellenv(store)
        .run(&project, &inherited(), &options)
        .await
        .unwrap();

    assert_eq!(report.entries.len(), 2);
    assert_eq!(
        report.env.get("PATH").map(String::as_str),
        Some("/nix/store/aaa-foo-0.9/bin:/nix/store/bbb-bar-1.2.7/bin:/usr/bin")
    );
    assert_eq!(
        report.output,
        "export PATH='/nix/store/aaa-foo-0.9/bin:/nix/store/bbb-bar-1.2.7/bin:/usr/bin';\nhash -r\n"
    );
    assert!(LockfileStore::lockfile_path(project.project_dir()).is_file());
}

#[tokio::test]
async fn second_activation_reads_the_lockfile() {
    let (_tmp, project, store) = setup("packages = [\"foo\"]\n");
    let command = shellenv(store);
    let options = ShellEnvOptions::new(ShellVariant::Zsh);
    let first = command.run(&project, &inherited(), &options).await.unwrap();

    // Activation must not depend on the store once locked.
    let empty_store = CatalogStore::new(Default::default());
    let second = shellenv(empty_store)
        .run(&project, &inherited(), &options)
        .await
        .unwrap();

    assert_eq!(first.output, second.output);
    assert_eq!(first.entries, second.entries);
}

#[tokio::test]
async fn project_and_package_variables_are_layered() {
    let manifest = r#"
packages = ["jdk"]

[env]
EDITOR = "nvim"
JAVA_OPTS = "-Xmx1g"

[shell]
init_hook = ["echo ready"]
"#;
    let (_tmp, project, store) = setup(manifest);
    let options = ShellEnvOptions::new(ShellVariant::Fish)
        .with_init_hook(true)
        .with_hash_refresh(true);

    let report = shellenv(store)
        .run(&project, &inherited(), &options)
        .await
        .unwrap();

    assert_eq!(
        report.env.get("PATH").map(String::as_str),
        Some("/nix/store/ddd-jdk-21/bin:/nix/store/ddd-jdk-21/lib/openjdk/bin:/usr/bin")
    );
    assert_eq!(
        report.output,
        "set -x -g PATH '/nix/store/ddd-jdk-21/bin' '/nix/store/ddd-jdk-21/lib/openjdk/bin' '/usr/bin';\
set -x -g 'EDITOR' 'nvim';\
set -x -g 'JAVA_HOME' '/nix/store/ddd-jdk-21/lib/openjdk';\
set -x -g 'JAVA_OPTS' '-Xmx1g';\necho ready\n"
    );
}

#[tokio::test]
async fn pure_mode_unsets_everything_outside_the_allowlist() {
    let (_tmp, project, store) = setup("packages = [\"foo\"]\n");
    let options = ShellEnvOptions::new(ShellVariant::Bash)
        .with_pure(true)
        .with_hash_refresh(false);

    let report = shellenv(store)
        .run(&project, &inherited(), &options)
        .await
        .unwrap();

    assert_eq!(
        report.output,
        "export PATH='/nix/store/aaa-foo-0.9/bin';unset EDITOR;"
    );
}

#[tokio::test]
async fn nushell_hook_consumes_json() {
    let (_tmp, project, store) = setup("packages = [\"foo\"]\n");
    let options = ShellEnvOptions::new(ShellVariant::Nushell).with_rendering(Rendering::Json);

    let report = shellenv(store)
        .run(&project, &inherited(), &options)
        .await
        .unwrap();

    let value: serde_json::Value = serde_json::from_str(&report.output).unwrap();
    assert_eq!(value["PATH"], "/nix/store/aaa-foo-0.9/bin:/usr/bin");
    assert_eq!(value.as_object().unwrap().len(), 1);
}

#[tokio::test]
async fn missing_package_reports_not_found_and_writes_nothing() {
    let (_tmp, project, store) = setup("packages = [\"foo\", \"nope\"]\n");
    let options = ShellEnvOptions::new(ShellVariant::Bash);

    let err = shellenv(store)
        .run(&project, &inherited(), &options)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("nope"), "{err}");
    assert!(!LockfileStore::lockfile_path(project.project_dir()).exists());
}

#[tokio::test]
async fn lock_command_reports_previous_state() {
    let (_tmp, project, store) = setup("packages = [\"bar\"]\n");
    let command = LockCommand::new(LockfileManager::new(CoordinateResolver::new(store)));

    let first = command.run(&project).await.unwrap();
    assert_eq!(first.previous, LockState::Absent);
    assert!(first.changed());
    assert_eq!(
        first.entries[0].coordinate.store_path,
        "/nix/store/ccc-bar-1.3.0"
    );

    let second = command.run(&project).await.unwrap();
    assert_eq!(second.previous, LockState::Valid);
    assert!(!second.changed());
}

#[tokio::test]
async fn editing_project_env_marks_the_lockfile_stale() {
    let (_tmp, project, store) = setup("packages = [\"foo\"]\n");
    let command = LockCommand::new(LockfileManager::new(CoordinateResolver::new(store)));
    command.run(&project).await.unwrap();

    let dir: &Path = project.project_dir();
    std::fs::write(
        dir.join(MANIFEST_NAME),
        "packages = [\"foo\"]\n\n[env]\nRUST_LOG = \"debug\"\n",
    )
    .unwrap();
    let edited = ProjectManifest::load(dir).unwrap();

    let report = command.run(&edited).await.unwrap();
    assert_eq!(report.previous, LockState::Stale);
    assert_eq!(
        LockfileStore::load(dir).unwrap().unwrap().config_hash,
        edited.config_hash()
    );
}

fn inherited_with_shell_function() -> Env {
    let mut env = inherited();
    env.insert("BASH_FUNC_module%%".to_string(), "() {  eval $($LMOD_CMD bash \"$@\")\n}".to_string());
    env
}

#[tokio::test]
async fn inherited_names_the_shell_cannot_address_are_skipped() {
    let (_tmp, project, store) = setup("packages = [\"foo\"]\n");
    let command = shellenv(store);

    let pure = ShellEnvOptions::new(ShellVariant::Bash)
        .with_pure(true)
        .with_hash_refresh(false);
    let report = command
        .run(&project, &inherited_with_shell_function(), &pure)
        .await
        .unwrap();
    assert_eq!(
        report.output,
        "export PATH='/nix/store/aaa-foo-0.9/bin';unset EDITOR;"
    );

    let dump = ShellEnvOptions::new(ShellVariant::Bash).with_rendering(Rendering::Dump);
    let report = command
        .run(&project, &inherited_with_shell_function(), &dump)
        .await
        .unwrap();
    assert_eq!(
        report.output,
        "export PATH='/nix/store/aaa-foo-0.9/bin:/usr/bin';export HOME='/home/dev';export EDITOR='vi';"
    );
}

#[tokio::test]
async fn project_names_the_shell_cannot_address_still_fail() {
    let (_tmp, project, store) = setup("packages = [\"foo\"]\n\n[env]\n\"BAD-NAME\" = \"x\"\n");
    let options = ShellEnvOptions::new(ShellVariant::Bash);

    let err = shellenv(store)
        .run(&project, &inherited(), &options)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), envbox_core::error::ErrorKind::Unrepresentable);
}
