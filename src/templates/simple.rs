//! Shell-style `$NAME` substitution.
//!
//! `$NAME` and `${NAME}` are replaced by the named variable; `$$` yields
//! a literal dollar sign. Any reference to a missing variable, and any
//! malformed placeholder, fails the render.

use serde_json::{Map, Value};

use super::value_to_string;
use crate::error::{Error, Result};

pub fn render(template: &str, variables: &Map<String, Value>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some((_, '$')) => {
                chars.next();
                out.push('$');
            }
            Some((start, '{')) => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed {
                    return Err(Error::Template(format!(
                        "unterminated placeholder at byte {start}"
                    )));
                }
                out.push_str(&substitute(&name, variables)?);
            }
            Some((_, c)) if is_name_start(c) => {
                let mut name = String::new();
                while let Some((_, c)) = chars.peek().copied() {
                    if is_name_char(c) {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(&substitute(&name, variables)?);
            }
            _ => {
                return Err(Error::Template(
                    "lone '$' in template (use '$$' for a literal dollar)".to_string(),
                ));
            }
        }
    }
    Ok(out)
}

fn substitute(name: &str, variables: &Map<String, Value>) -> Result<String> {
    if name.is_empty() || !name.chars().all(is_name_char) {
        return Err(Error::Template(format!("malformed placeholder '{name}'")));
    }
    variables
        .get(name)
        .map(value_to_string)
        .ok_or_else(|| Error::Template(format!("unknown placeholder '{name}'")))
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
