//! nushell.
//!
//! Values are double-quoted; nushell has no eval, so the hook loads the
//! environment as JSON instead of sourcing this text.

use std::fmt::Write;

pub(super) fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_ascii_control() => {
                let _ = write!(out, "\\u{{{:02x}}}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

pub(super) fn set(key: &str, value: &str) -> String {
    format!("$env.{key} = {}\n", quote(value))
}

pub(super) fn set_path(value: &str) -> String {
    let segments: Vec<String> = value.split(':').map(quote).collect();
    format!("$env.PATH = [{}]\n", segments.join(", "))
}

pub(super) fn unset(key: &str) -> String {
    format!("hide-env --ignore-errors {key}\n")
}

pub(super) fn hook(command: &str) -> String {
    format!(
        r#"
$env.config = ($env.config | upsert hooks.pre_prompt (
  ($env.config.hooks.pre_prompt? | default []) | append {{||
    {command} | from json | load-env
  }}
))
"#
    )
}
