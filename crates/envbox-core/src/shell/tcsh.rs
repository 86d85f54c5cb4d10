//! tcsh and csh.

use crate::error::{Error, Result};

pub(super) fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\'' => out.push_str(r"'\''"),
            '!' => out.push_str(r"\!"),
            '\n' => out.push_str("\\\n"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

pub(super) fn set(key: &str, value: &str) -> String {
    format!("setenv {key} {};", quote(value))
}

pub(super) fn unset(key: &str) -> String {
    format!("unsetenv {key};")
}

/// The hook lives inside a single-quoted alias, so its argument is
/// double-quoted and may not contain anything tcsh would still expand there.
pub(super) fn quote_hook_arg(value: &str) -> Result<String> {
    if let Some(c) = value
        .chars()
        .find(|c| matches!(c, '\'' | '"' | '!' | '`' | '$' | '\\' | '\n'))
    {
        return Err(Error::unrepresentable(
            "tcsh",
            format!("hook argument {value:?}"),
            format!("contains {c:?}"),
        ));
    }
    Ok(format!("\"{value}\""))
}

/// csh splits the unquoted backquote output into words and `eval` joins
/// them with single spaces, so on the hook path runs of blanks inside values
/// collapse and an escaped newline becomes a space. Direct `eval` of the
/// shellenv output keeps values intact.
pub(super) fn hook(command: &str) -> String {
    format!("alias precmd 'eval `{command}`';\n")
}
