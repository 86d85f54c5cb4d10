//! fish.
//!
//! Values are single-quoted byte by byte. Control and non-ASCII bytes leave
//! the quotes and use fish's `\X` escape, and `PATH` is assigned as a list.

const TAB: u8 = 0x09;
const LF: u8 = 0x0a;
const CR: u8 = 0x0d;
const SINGLE_QUOTE: u8 = b'\'';
const BACKSLASH: u8 = b'\\';
const TILDE: u8 = b'~';

pub(super) fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for &byte in value.as_bytes() {
        match byte {
            TAB => out.push_str(r"'\t'"),
            LF => out.push_str(r"'\n'"),
            CR => out.push_str(r"'\r'"),
            SINGLE_QUOTE | BACKSLASH => {
                out.push('\\');
                out.push(char::from(byte));
            }
            b' '..=TILDE => out.push(char::from(byte)),
            // remaining controls, DEL and non-ASCII bytes
            _ => out.push_str(&format!(r"'\X{byte:02x}'")),
        }
    }
    out.push('\'');
    out
}

pub(super) fn set(key: &str, value: &str) -> String {
    format!("set -x -g {} {};", quote(key), quote(value))
}

pub(super) fn set_path(value: &str) -> String {
    let mut command = String::from("set -x -g PATH");
    for segment in value.split(':') {
        command.push(' ');
        command.push_str(&quote(segment));
    }
    command.push(';');
    command
}

pub(super) fn unset(key: &str) -> String {
    format!("set -e -g {};", quote(key))
}

pub(super) fn hook(command: &str) -> String {
    format!(
        "
function __envbox_shellenv_eval --on-event fish_prompt;
  {command} | source;
end;
"
    )
}
