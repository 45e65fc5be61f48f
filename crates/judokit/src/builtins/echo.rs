//! echo builtin command

use super::{Builtin, Context};
use crate::error::Result;
use crate::interpreter::ExecResult;

/// The echo builtin command.
///
/// Writes its arguments joined by spaces. The trailing newline is added
/// when OUT is flushed to the screen, so `-n` only needs to be consumed.
pub struct Echo;

impl Builtin for Echo {
    fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let mut output = String::new();
        let mut interpret_escapes = false;
        let mut args_iter = ctx.args.iter().peekable();

        // Parse options
        while let Some(arg) = args_iter.peek() {
            match arg.as_str() {
                "-n" => {
                    args_iter.next();
                }
                "-e" => {
                    interpret_escapes = true;
                    args_iter.next();
                }
                "-E" => {
                    interpret_escapes = false;
                    args_iter.next();
                }
                _ => break,
            }
        }

        for (i, arg) in args_iter.enumerate() {
            if i > 0 {
                output.push(' ');
            }

            if interpret_escapes {
                output.push_str(&interpret_escape_sequences(arg));
            } else {
                output.push_str(arg);
            }
        }

        Ok(ExecResult::ok(output))
    }
}

fn interpret_escape_sequences(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('\\') => result.push('\\'),
                Some('a') => result.push('\x07'), // bell
                Some('b') => result.push('\x08'), // backspace
                Some('f') => result.push('\x0c'), // form feed
                Some('v') => result.push('\x0b'), // vertical tab
                Some('0') => {
                    // Octal escape \0nnn
                    let mut value = 0u8;
                    for _ in 0..3 {
                        match chars.peek() {
                            Some(&digit) if ('0'..='7').contains(&digit) => {
                                value = value.wrapping_mul(8).wrapping_add(digit as u8 - b'0');
                                chars.next();
                            }
                            _ => break,
                        }
                    }
                    result.push(value as char);
                }
                Some('x') => {
                    // Hex escape \xHH
                    let mut value = 0u32;
                    for _ in 0..2 {
                        match chars.peek().and_then(|d| d.to_digit(16)) {
                            Some(digit) => {
                                value = value * 16 + digit;
                                chars.next();
                            }
                            None => break,
                        }
                    }
                    result.extend(char::from_u32(value));
                }
                Some('c') => {
                    // Stop output
                    break;
                }
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(ch);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::testing::run_default;
    use crate::interpreter::State;

    #[test]
    fn test_joins_arguments() {
        let mut state = State::new();
        let result = run_default(&Echo, &["hello", "world"], &mut state);
        assert_eq!(result.stdout, "hello world");
    }

    #[test]
    fn test_no_arguments() {
        let mut state = State::new();
        assert_eq!(run_default(&Echo, &[], &mut state).stdout, "");
    }

    #[test]
    fn test_flags() {
        let mut state = State::new();
        assert_eq!(run_default(&Echo, &["-n", "x"], &mut state).stdout, "x");
        assert_eq!(
            run_default(&Echo, &["-e", "a\\tb\\x41\\c rest"], &mut state).stdout,
            "a\tbA"
        );
        assert_eq!(run_default(&Echo, &["a\\tb"], &mut state).stdout, "a\\tb");
    }
}
