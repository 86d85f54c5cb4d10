//! Shell export engine.
//!
//! Renders environments as activation text for a host shell. Every variant
//! supports three operations:
//! - hook: a fixed snippet that re-runs activation on each prompt
//! - export: set/unset instructions for a [`ShellExport`], in order
//! - dump: set instructions for every variable of an [`Env`]
//!
//! Rendering either produces the complete text or fails with
//! [`Error::Unrepresentable`]; it never returns partial output.

mod fish;
mod nushell;
mod posix;
mod powershell;
mod tcsh;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::env::{Env, ExportValue, PATH_KEY, ShellExport, set_all};
use crate::error::{Error, Result};

/// Name of the binary the hooks call back into.
pub const PROGRAM: &str = "envbox";

/// Supported host shells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShellVariant {
    Bash,
    Zsh,
    Fish,
    Tcsh,
    PowerShell,
    Nushell,
}

impl ShellVariant {
    pub const ALL: [ShellVariant; 6] = [
        ShellVariant::Bash,
        ShellVariant::Zsh,
        ShellVariant::Fish,
        ShellVariant::Tcsh,
        ShellVariant::PowerShell,
        ShellVariant::Nushell,
    ];

    /// Canonical name, as accepted by `--shell`.
    pub fn name(self) -> &'static str {
        match self {
            ShellVariant::Bash => "bash",
            ShellVariant::Zsh => "zsh",
            ShellVariant::Fish => "fish",
            ShellVariant::Tcsh => "tcsh",
            ShellVariant::PowerShell => "pwsh",
            ShellVariant::Nushell => "nu",
        }
    }

    /// Parse a shell name; POSIX-compatible shells map to bash.
    pub fn parse(name: &str) -> Option<Self> {
        let variant = match name.trim().to_ascii_lowercase().as_str() {
            "bash" | "sh" | "dash" | "ksh" => ShellVariant::Bash,
            "zsh" => ShellVariant::Zsh,
            "fish" => ShellVariant::Fish,
            "tcsh" | "csh" => ShellVariant::Tcsh,
            "pwsh" | "powershell" => ShellVariant::PowerShell,
            "nu" | "nushell" => ShellVariant::Nushell,
            _ => return None,
        };
        Some(variant)
    }

    /// Detect the variant from a shell executable path such as `$SHELL`.
    pub fn detect(shell_path: &str) -> Option<Self> {
        let base = shell_path
            .trim()
            .rsplit(['/', '\\'])
            .next()?
            .trim_start_matches('-');
        let base = base.strip_suffix(".exe").unwrap_or(base);
        Self::parse(base)
    }

    /// Snippet that re-runs activation whenever the prompt is shown.
    pub fn hook(self) -> String {
        self.render_hook(&self.activation_command(None))
    }

    /// Like [`ShellVariant::hook`], bound to one project directory.
    pub fn hook_for_project(self, project_dir: &Path) -> Result<String> {
        let dir = project_dir.to_str().ok_or_else(|| {
            Error::unrepresentable(
                self.name(),
                format!("project directory {}", project_dir.display()),
                "path is not valid UTF-8",
            )
        })?;
        validate_value(self, "project directory", dir)?;
        let quoted = match self {
            ShellVariant::Tcsh => tcsh::quote_hook_arg(dir)?,
            _ => self.quote(dir),
        };
        Ok(self.render_hook(&self.activation_command(Some(&quoted))))
    }

    /// Render set/unset instructions for `export`, in insertion order.
    pub fn export(self, export: &ShellExport) -> Result<String> {
        let mut out = String::new();
        for (key, value) in export {
            validate_key(self, key)?;
            match value {
                ExportValue::Set(value) => {
                    validate_value(self, key, value)?;
                    out.push_str(&self.set(key, value));
                }
                ExportValue::Unset => out.push_str(&self.unset(key)),
            }
        }
        Ok(out)
    }

    /// Render every variable of `env` as a set instruction.
    pub fn dump(self, env: &Env) -> Result<String> {
        self.export(&set_all(env))
    }

    /// Whether `key` can be set or unset by this shell.
    pub fn can_address(self, key: &str) -> bool {
        is_valid_name(key)
    }

    /// Copy of `env` without the variables this shell cannot address, such
    /// as exported bash functions (`BASH_FUNC_name%%`).
    pub fn addressable(self, env: &Env) -> Env {
        env.iter()
            .filter(|(key, _)| {
                let keep = self.can_address(key);
                if !keep {
                    tracing::warn!(shell = %self, variable = %key, "ignoring variable the shell cannot address");
                }
                keep
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Command that makes the shell forget cached executable locations.
    pub fn hash_refresh(self) -> Option<&'static str> {
        match self {
            ShellVariant::Bash | ShellVariant::Zsh => Some("hash -r"),
            ShellVariant::Tcsh => Some("rehash"),
            ShellVariant::Fish | ShellVariant::PowerShell | ShellVariant::Nushell => None,
        }
    }

    /// Export text followed by the hash-refresh directive when requested.
    pub fn activation(self, export: &ShellExport, hash_refresh: bool) -> Result<String> {
        let mut out = self.export(export)?;
        if let Some(command) = self.hash_refresh().filter(|_| hash_refresh) {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(command);
            out.push('\n');
        }
        Ok(out)
    }

    fn set(self, key: &str, value: &str) -> String {
        match self {
            ShellVariant::Bash | ShellVariant::Zsh => posix::set(key, value),
            ShellVariant::Fish if key == PATH_KEY => fish::set_path(value),
            ShellVariant::Fish => fish::set(key, value),
            ShellVariant::Tcsh => tcsh::set(key, value),
            ShellVariant::PowerShell => powershell::set(key, value),
            ShellVariant::Nushell if key == PATH_KEY => nushell::set_path(value),
            ShellVariant::Nushell => nushell::set(key, value),
        }
    }

    fn unset(self, key: &str) -> String {
        match self {
            ShellVariant::Bash | ShellVariant::Zsh => posix::unset(key),
            ShellVariant::Fish => fish::unset(key),
            ShellVariant::Tcsh => tcsh::unset(key),
            ShellVariant::PowerShell => powershell::unset(key),
            ShellVariant::Nushell => nushell::unset(key),
        }
    }

    fn quote(self, value: &str) -> String {
        match self {
            ShellVariant::Bash | ShellVariant::Zsh => posix::quote(value),
            ShellVariant::Fish => fish::quote(value),
            ShellVariant::Tcsh => tcsh::quote(value),
            ShellVariant::PowerShell => powershell::quote(value),
            ShellVariant::Nushell => nushell::quote(value),
        }
    }

    fn activation_command(self, quoted_dir: Option<&str>) -> String {
        let mut command = format!("{PROGRAM} shellenv --shell {}", self.name());
        if self == ShellVariant::Nushell {
            command.push_str(" --json");
        }
        if let Some(dir) = quoted_dir {
            command.push_str(" --config ");
            command.push_str(dir);
        }
        command
    }

    fn render_hook(self, command: &str) -> String {
        match self {
            ShellVariant::Bash => posix::bash_hook(command),
            ShellVariant::Zsh => posix::zsh_hook(command),
            ShellVariant::Fish => fish::hook(command),
            ShellVariant::Tcsh => tcsh::hook(command),
            ShellVariant::PowerShell => powershell::hook(command),
            ShellVariant::Nushell => nushell::hook(command),
        }
    }
}

impl fmt::Display for ShellVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ShellVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| {
            Error::Config(format!(
                "unsupported shell '{s}' (expected one of: bash, zsh, fish, tcsh, pwsh, nu)"
            ))
        })
    }
}

/// Variable names every supported shell can address: `[A-Za-z_][A-Za-z0-9_]*`.
fn is_valid_name(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn validate_key(shell: ShellVariant, key: &str) -> Result<()> {
    if !shell.can_address(key) {
        return Err(Error::unrepresentable(
            shell.name(),
            format!("variable name {key:?}"),
            "names must match [A-Za-z_][A-Za-z0-9_]*",
        ));
    }
    Ok(())
}

fn validate_value(shell: ShellVariant, what: &str, value: &str) -> Result<()> {
    if value.contains('\0') {
        return Err(Error::unrepresentable(
            shell.name(),
            format!("value of {what}"),
            "contains a NUL byte",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn export(pairs: &[(&str, Option<&str>)]) -> ShellExport {
        pairs
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    Some(v) => ExportValue::Set(v.to_string()),
                    None => ExportValue::Unset,
                };
                (k.to_string(), value)
            })
            .collect()
    }

    #[test]
    fn test_parse_and_detect() {
        assert_eq!(ShellVariant::parse("sh"), Some(ShellVariant::Bash));
        assert_eq!(ShellVariant::parse("PowerShell"), Some(ShellVariant::PowerShell));
        assert_eq!(ShellVariant::parse("csh"), Some(ShellVariant::Tcsh));
        assert_eq!(ShellVariant::parse("cmd"), None);

        assert_eq!(ShellVariant::detect("/usr/bin/zsh"), Some(ShellVariant::Zsh));
        assert_eq!(ShellVariant::detect("-bash"), Some(ShellVariant::Bash));
        assert_eq!(
            ShellVariant::detect("C:\\Program Files\\PowerShell\\7\\pwsh.exe"),
            Some(ShellVariant::PowerShell)
        );
        assert_eq!(ShellVariant::detect("/opt/homebrew/bin/nu"), Some(ShellVariant::Nushell));
        assert_eq!(ShellVariant::detect(""), None);
    }

    #[test]
    fn test_names_round_trip() {
        for variant in ShellVariant::ALL {
            assert_eq!(variant.name().parse::<ShellVariant>().unwrap(), variant);
        }
        assert!("cmd".parse::<ShellVariant>().is_err());
    }

    #[test]
    fn test_unset_is_never_rendered_as_empty() {
        let input = export(&[("K", None), ("E", Some(""))]);
        assert_eq!(
            ShellVariant::Bash.export(&input).unwrap(),
            "unset K;export E='';"
        );
        assert_eq!(
            ShellVariant::Fish.export(&input).unwrap(),
            "set -e -g 'K';set -x -g 'E' '';"
        );
    }

    #[test]
    fn test_export_preserves_order() {
        let input = export(&[("B", Some("2")), ("A", Some("1")), ("C", None)]);
        assert_eq!(
            ShellVariant::Zsh.export(&input).unwrap(),
            "export B='2';export A='1';unset C;"
        );
    }

    #[test]
    fn test_dump_sets_everything() {
        let env: Env = [("A", "1"), ("B", "x y")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(
            ShellVariant::Tcsh.dump(&env).unwrap(),
            "setenv A '1';setenv B 'x y';"
        );
    }

    #[test]
    fn test_invalid_keys_and_nul_values_fail_for_every_shell() {
        for variant in ShellVariant::ALL {
            for key in ["", "1ABC", "A-B", "A B", "A=B", "A\0"] {
                let err = variant.export(&export(&[(key, Some("v"))])).unwrap_err();
                assert!(matches!(err, Error::Unrepresentable { .. }), "{variant} {key:?}");
            }
            let err = variant.export(&export(&[("K", Some("a\0b"))])).unwrap_err();
            assert!(matches!(err, Error::Unrepresentable { .. }));
        }
    }

    #[test]
    fn test_failure_emits_nothing() {
        let input = export(&[("GOOD", Some("1")), ("BAD-KEY", Some("2"))]);
        assert!(ShellVariant::Bash.export(&input).is_err());
    }

    #[test]
    fn test_hash_refresh_per_shell() {
        assert_eq!(ShellVariant::Bash.hash_refresh(), Some("hash -r"));
        assert_eq!(ShellVariant::Zsh.hash_refresh(), Some("hash -r"));
        assert_eq!(ShellVariant::Tcsh.hash_refresh(), Some("rehash"));
        assert_eq!(ShellVariant::Fish.hash_refresh(), None);

        let input = export(&[("A", Some("1"))]);
        assert_eq!(
            ShellVariant::Bash.activation(&input, true).unwrap(),
            "export A='1';\nhash -r\n"
        );
        assert_eq!(
            ShellVariant::Bash.activation(&input, false).unwrap(),
            "export A='1';"
        );
        assert_eq!(
            ShellVariant::Fish.activation(&input, true).unwrap(),
            "set -x -g 'A' '1';"
        );
    }

    #[test]
    fn test_hooks_call_back_into_shellenv() {
        for variant in ShellVariant::ALL {
            let hook = variant.hook();
            assert!(
                hook.contains(&format!("envbox shellenv --shell {}", variant.name())),
                "{variant}: {hook}"
            );
        }
    }

    #[test]
    fn test_hook_for_project_quotes_directory() {
        let dir = Path::new("/work/it's here");
        let bash = ShellVariant::Bash.hook_for_project(dir).unwrap();
        assert!(bash.contains("--config '/work/it'\\''s here'"), "{bash}");

        let fish = ShellVariant::Fish.hook_for_project(dir).unwrap();
        assert!(fish.contains("--config '/work/it\\'s here'"), "{fish}");

        let err = ShellVariant::Tcsh.hook_for_project(dir).unwrap_err();
        assert!(matches!(err, Error::Unrepresentable { .. }));
        let tcsh = ShellVariant::Tcsh
            .hook_for_project(Path::new("/work/plain dir"))
            .unwrap();
        assert!(tcsh.contains("--config \"/work/plain dir\""), "{tcsh}");
    }

    #[test]
    fn test_addressable_drops_exported_functions() {
        let env: Env = [
            ("PATH", "/usr/bin"),
            ("BASH_FUNC_module%%", "() {  :\n}"),
            ("HOME", "/home/dev"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let kept = ShellVariant::Bash.addressable(&env);
        assert_eq!(kept.keys().collect::<Vec<_>>(), vec!["PATH", "HOME"]);
        assert!(ShellVariant::Bash.dump(&kept).is_ok());
        assert!(ShellVariant::Bash.dump(&env).is_err());
        assert!(!ShellVariant::Fish.can_address("1X"));
    }
}
