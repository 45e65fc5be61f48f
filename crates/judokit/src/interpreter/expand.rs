//! Parameter expansion against the live variable table
//!
//! Word text arrives from the lexer with quotes removed and protected
//! characters kept behind a backslash. Expansion resolves `$` references,
//! then drops the protecting backslashes. Unknown names expand to nothing.
//! Raw `$(...)` text is copied verbatim; it only survives when a
//! substitution was deliberately left unresolved.

use super::state::State;
use crate::parser::matching_paren;

/// Expand a word to its final text.
///
/// ```
/// use judokit::{State, expand_word};
///
/// let mut state = State::new();
/// state.set_variable("name", "world");
/// assert_eq!(expand_word("hello-$name", &state), "hello-world");
/// assert_eq!(expand_word("\\$name", &state), "$name");
/// assert_eq!(expand_word("${#name}", &state), "5");
/// ```
pub fn expand_word(text: &str, state: &State) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                out.push(chars[i + 1]);
                i += 2;
            }
            '$' => {
                let (value, next) = expand_dollar(&chars, i, state);
                out.push_str(&value);
                i = next;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Substitute variable references in shell text, leaving quoting intact.
///
/// Used before text is handed to the host shell. Single-quoted regions and
/// escaped dollars are left alone.
pub fn substitute_variables(text: &str, state: &State) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_single = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_single {
            if c == '\'' {
                in_single = false;
            }
            out.push(c);
            i += 1;
            continue;
        }
        match c {
            '\'' => {
                in_single = true;
                out.push(c);
                i += 1;
            }
            '\\' if i + 1 < chars.len() => {
                out.push(c);
                out.push(chars[i + 1]);
                i += 2;
            }
            '$' => {
                let (value, next) = expand_dollar(&chars, i, state);
                out.push_str(&value);
                i = next;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Protect text so a later [`expand_word`] yields it unchanged.
pub fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Expand the `$` reference at `start`. Returns the value and the index
/// just past the reference.
fn expand_dollar(chars: &[char], start: usize, state: &State) -> (String, usize) {
    let next = start + 1;
    match chars.get(next) {
        Some('(') => {
            let end = matching_paren(chars, next).unwrap_or(chars.len() - 1);
            (chars[start..=end].iter().collect(), end + 1)
        }
        Some('{') => match chars[next..].iter().position(|&c| c == '}') {
            Some(offset) => {
                let close = next + offset;
                let inner: String = chars[next + 1..close].iter().collect();
                (expand_braced(&inner, state), close + 1)
            }
            None => ("$".to_string(), next),
        },
        Some(&c) if c.is_ascii_digit() || matches!(c, '@' | '*' | '#') => {
            (lookup(&c.to_string(), state), next + 1)
        }
        Some(&c) if c == '_' || c.is_ascii_alphabetic() => {
            let mut end = next;
            while end < chars.len() && (chars[end] == '_' || chars[end].is_ascii_alphanumeric()) {
                end += 1;
            }
            let name: String = chars[next..end].iter().collect();
            (lookup(&name, state), end)
        }
        _ => ("$".to_string(), next),
    }
}

/// Expand the inside of `${...}`.
fn expand_braced(inner: &str, state: &State) -> String {
    if let Some(name) = inner.strip_prefix('#') {
        if !name.is_empty() {
            return lookup(name, state).chars().count().to_string();
        }
    }

    match inner.split_once(':') {
        Some((name, range)) => {
            let value: Vec<char> = lookup(name, state).chars().collect();
            let (offset, length) = match range.split_once(':') {
                Some((offset, length)) => (offset, Some(length)),
                None => (range, None),
            };
            let Ok(offset) = offset.trim().parse::<i64>() else {
                return String::new();
            };
            let len = value.len() as i64;
            let start = if offset < 0 {
                len.saturating_add(offset).max(0)
            } else {
                offset.min(len)
            };
            let end = match length.map(|l| l.trim().parse::<i64>()) {
                None => len,
                Some(Ok(l)) if l < 0 => len.saturating_add(l).max(start),
                Some(Ok(l)) => start.saturating_add(l).min(len),
                Some(Err(_)) => return String::new(),
            };
            value[start as usize..end as usize].iter().collect()
        }
        None => lookup(inner, state),
    }
}

fn lookup(name: &str, state: &State) -> String {
    match name {
        "@" | "*" => state.positionals().join(" "),
        "#" => state.positionals().len().to_string(),
        _ => state.variable(name).unwrap_or_default().to_string(),
    }
}
