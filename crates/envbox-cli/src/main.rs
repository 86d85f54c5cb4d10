//! envbox - reproducible per-project shell environments
//!
//! Usage:
//!   eval "$(envbox shellenv)"        # Activate the project in the current shell
//!   eval "$(envbox hook --shell zsh)" # Re-activate on every prompt
//!   envbox print-env                  # Print the full project environment
//!   envbox lock                       # Resolve packages and update envbox.lock

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use envbox_core::commands::{Rendering, ShellEnvOptions, system_path_without_wrappers};
use envbox_core::context::AppContext;
use envbox_core::env::Env;
use envbox_core::lockfile::LockState;
use envbox_core::manifest::ProjectConfig;
use envbox_core::shell::ShellVariant;

#[derive(Parser)]
#[command(name = "envbox")]
#[command(about = "Reproducible per-project shell environments", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print shell commands that add the project's packages to your environment
    Shellenv(ShellenvArgs),

    /// Print a snippet that keeps the environment current on every prompt
    Hook {
        #[command(flatten)]
        shell: ShellArg,

        /// Bind the hook to this project directory
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Print the complete project environment
    PrintEnv {
        #[command(flatten)]
        shell: ShellArg,

        #[command(flatten)]
        project: ProjectArgs,

        /// Inherit almost nothing from the calling environment
        #[arg(long)]
        pure: bool,
    },

    /// Resolve packages and update envbox.lock
    Lock {
        #[command(flatten)]
        project: ProjectArgs,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Args)]
struct ShellenvArgs {
    #[command(subcommand)]
    command: Option<ShellenvSubcommand>,

    #[command(flatten)]
    shell: ShellArg,

    #[command(flatten)]
    project: ProjectArgs,

    /// Inherit almost nothing from the calling environment; HOME, USER,
    /// DISPLAY, TERM and TMPDIR are kept
    #[arg(long)]
    pure: bool,

    /// Run the project's init hook after exporting the environment
    #[arg(long)]
    init_hook: bool,

    /// Do not append the shell's hash-refresh command
    #[arg(long)]
    no_hash_refresh: bool,

    /// Print the variables to set as a JSON object
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum ShellenvSubcommand {
    /// [internal] Export the system PATH without the bin-wrapper directories
    #[command(hide = true)]
    OnlyPathWithoutWrappers {
        #[command(flatten)]
        shell: ShellArg,
    },
}

#[derive(Args)]
struct ShellArg {
    /// Target shell (bash, zsh, fish, tcsh, pwsh, nu); detected from $SHELL
    /// when omitted
    #[arg(long, short = 's', value_parser = parse_shell)]
    shell: Option<ShellVariant>,
}

#[derive(Args)]
struct ProjectArgs {
    /// Project directory containing envbox.toml
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Fail instead of contacting the package store
    #[arg(long)]
    offline: bool,
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

fn parse_shell(value: &str) -> Result<ShellVariant, String> {
    value.parse::<ShellVariant>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries shell code; logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "envbox=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut ctx = AppContext::from_defaults()?;
    run_cli(cli.command, &mut ctx).await
}

async fn run_cli(command: Commands, ctx: &mut AppContext) -> Result<()> {
    match command {
        Commands::Shellenv(args) => run_shellenv(args, ctx).await,
        Commands::Hook { shell, config } => run_hook(shell, config.as_deref(), ctx),
        Commands::PrintEnv {
            shell,
            project,
            pure,
        } => {
            let options = ShellEnvOptions::new(shell.resolve())
                .with_pure(pure)
                .with_hash_refresh(false)
                .with_rendering(Rendering::Dump);
            run_pipeline(&project, options, ctx).await
        }
        Commands::Lock { project, format } => run_lock(project, format, ctx).await,
    }
}

async fn run_shellenv(args: ShellenvArgs, ctx: &mut AppContext) -> Result<()> {
    if let Some(ShellenvSubcommand::OnlyPathWithoutWrappers { shell }) = args.command {
        let output = system_path_without_wrappers(shell.resolve(), &inherited_env())?;
        return emit(&output);
    }

    let rendering = if args.json {
        Rendering::Json
    } else {
        Rendering::Activation
    };
    let options = ShellEnvOptions::new(args.shell.resolve())
        .with_pure(args.pure)
        .with_init_hook(args.init_hook)
        .with_hash_refresh(!args.no_hash_refresh)
        .with_rendering(rendering);
    run_pipeline(&args.project, options, ctx).await
}

async fn run_pipeline(
    project_args: &ProjectArgs,
    options: ShellEnvOptions,
    ctx: &mut AppContext,
) -> Result<()> {
    if project_args.offline {
        ctx.settings_mut().offline = true;
    }
    let project = ctx.project(project_args.config.as_deref())?;
    let command = ctx.shellenv_command()?;

    let result = command.run(&project, &inherited_env(), &options).await;
    let report = in_project(result, "activate", project.project_dir())?;
    emit(&report.output)
}

fn run_hook(shell: ShellArg, config: Option<&Path>, ctx: &AppContext) -> Result<()> {
    let shell = shell.resolve();
    let hook = match config {
        Some(dir) => shell.hook_for_project(&ctx.working_dir().join(dir))?,
        None => shell.hook(),
    };
    emit(&hook)
}

async fn run_lock(project_args: ProjectArgs, format: OutputFormat, ctx: &mut AppContext) -> Result<()> {
    if project_args.offline {
        ctx.settings_mut().offline = true;
    }
    let project = ctx.project(project_args.config.as_deref())?;
    let result = ctx.lock_command()?.run(&project).await;
    let report = in_project(result, "lock", project.project_dir())?;

    match format {
        OutputFormat::Table => {
            let verb = match report.previous {
                LockState::Absent => "Created",
                LockState::Stale => "Updated",
                LockState::Valid => "Unchanged",
            };
            println!("{verb} envbox.lock ({} package(s))", report.entries.len());
            for entry in &report.entries {
                let location = entry
                    .coordinate
                    .legacy_path
                    .as_deref()
                    .filter(|_| entry.coordinate.is_legacy())
                    .unwrap_or(&entry.coordinate.store_path);
                println!("  {:<24} {}", entry.reference.to_string(), location);
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "previous": report.previous.to_string(),
                "changed": report.changed(),
                "entries": report.entries,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

impl ShellArg {
    fn resolve(&self) -> ShellVariant {
        self.shell
            .or_else(|| {
                std::env::var("SHELL")
                    .ok()
                    .and_then(|path| ShellVariant::detect(&path))
            })
            .unwrap_or(ShellVariant::Bash)
    }
}

/// Attach the project directory to a pipeline error.
fn in_project<T>(result: envbox_core::Result<T>, action: &str, project_dir: &Path) -> Result<T> {
    result.map_err(|e| {
        tracing::debug!(
            kind = e.kind().as_str(),
            retryable = e.is_retryable(),
            "{action} failed"
        );
        anyhow::Error::new(e).context(format!("Failed to {action} {}", project_dir.display()))
    })
}

/// The calling process environment; variables that are not valid UTF-8 are
/// left out.
fn inherited_env() -> Env {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

/// Write the fully rendered output in one go.
fn emit(output: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(output.as_bytes())
        .and_then(|()| stdout.flush())
        .context("Failed to write to stdout")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_name_the_project() {
        let failed: envbox_core::Result<()> = Err(envbox_core::Error::NotFound {
            reference: "bar@1.2".to_string(),
            channel: "nixpkgs-unstable".to_string(),
        });

        let err = in_project(failed, "lock", Path::new("/work/app")).unwrap_err();

        assert_eq!(err.to_string(), "Failed to lock /work/app");
        assert_eq!(
            err.root_cause().to_string(),
            "package 'bar@1.2' was not found in channel 'nixpkgs-unstable'"
        );
    }

    #[test]
    fn test_success_passes_through() {
        assert_eq!(in_project(Ok(3), "activate", Path::new("/work/app")).unwrap(), 3);
    }
}
