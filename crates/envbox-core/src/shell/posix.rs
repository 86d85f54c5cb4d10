//! bash and zsh.

pub(super) fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

pub(super) fn set(key: &str, value: &str) -> String {
    format!("export {key}={};", quote(value))
}

pub(super) fn unset(key: &str) -> String {
    format!("unset {key};")
}

pub(super) fn bash_hook(command: &str) -> String {
    format!(
        r#"
_envbox_hook() {{
  local previous_exit_status=$?;
  trap -- '' SIGINT;
  eval "$({command})";
  trap - SIGINT;
  return $previous_exit_status;
}};
if [[ ";${{PROMPT_COMMAND[*]:-}};" != *";_envbox_hook;"* ]]; then
  PROMPT_COMMAND="_envbox_hook${{PROMPT_COMMAND:+;$PROMPT_COMMAND}}";
fi
"#
    )
}

pub(super) fn zsh_hook(command: &str) -> String {
    format!(
        r#"
_envbox_hook() {{
  trap -- '' SIGINT;
  eval "$({command})";
  trap - SIGINT;
}}
typeset -ag precmd_functions;
if (( ! ${{precmd_functions[(I)_envbox_hook]}} )); then
  precmd_functions=(_envbox_hook $precmd_functions);
fi
"#
    )
}
