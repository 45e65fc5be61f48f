//! cat builtin command

use super::{Builtin, Context};
use crate::error::Result;
use crate::interpreter::ExecResult;

/// The cat builtin command.
///
/// With no file arguments IN is passed through to OUT. Files are read from
/// the virtual filesystem. One trailing newline is dropped because the
/// screen flush adds it back.
pub struct Cat;

impl Builtin for Cat {
    fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let files: Vec<&String> = ctx
            .args
            .iter()
            .filter(|arg| !(arg.starts_with('-') && arg.len() > 1))
            .collect();

        let mut output = String::new();
        let mut errors = String::new();
        if files.is_empty() {
            output = ctx.state.io.read();
        }
        for file in files {
            if file == "-" {
                output.push_str(&ctx.state.io.read());
                continue;
            }
            let path = ctx.state.resolve(file);
            match ctx.state.fs.get(&path) {
                Some(found) => output.push_str(found.text()),
                None => {
                    errors.push_str(&format!("cat: {}: No such file or directory", file));
                }
            }
        }

        if let Some(stripped) = output.strip_suffix('\n') {
            output.truncate(stripped.len());
        }

        if errors.is_empty() {
            Ok(ExecResult::ok(output))
        } else {
            Ok(ExecResult {
                stdout: output,
                stderr: errors,
                exit_code: 1,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::testing::run_default;
    use crate::interpreter::State;

    #[test]
    fn test_passes_stdin_through() {
        let mut state = State::new();
        state.io.input = "hello".into();
        let result = run_default(&Cat, &[], &mut state);
        assert_eq!(result.stdout, "hello");
        assert_eq!(state.io.input, "");
    }

    #[test]
    fn test_reads_virtual_file() {
        let mut state = State::new();
        state.fs.write("~/notes", "line one\nline two\n");
        let result = run_default(&Cat, &["notes"], &mut state);
        assert_eq!(result.stdout, "line one\nline two");
    }

    #[test]
    fn test_missing_file() {
        let mut state = State::new();
        let result = run_default(&Cat, &["/etc/shadow"], &mut state);
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("No such file"));
    }
}
