//! PowerShell.
//!
//! Single-quoted strings only treat quote characters specially, including
//! the typographic single quotes U+2018 through U+201B. Each is escaped by
//! doubling it.

fn is_single_quote(c: char) -> bool {
    matches!(c, '\'' | '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}')
}

pub(super) fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if is_single_quote(c) {
            out.push(c);
        }
        out.push(c);
    }
    out.push('\'');
    out
}

pub(super) fn set(key: &str, value: &str) -> String {
    format!("$Env:{key} = {};", quote(value))
}

pub(super) fn unset(key: &str) -> String {
    format!("Remove-Item -LiteralPath 'Env:{key}' -ErrorAction SilentlyContinue;")
}

pub(super) fn hook(command: &str) -> String {
    format!(
        r#"
if (-not $global:__envboxPrompt) {{
  $global:__envboxPrompt = $function:prompt
  function global:prompt {{
    {command} | Out-String | Invoke-Expression
    & $global:__envboxPrompt
  }}
}}
"#
    )
}
