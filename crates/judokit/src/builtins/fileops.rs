//! File operation builtins - rm, cp, mv, touch, chmod

use super::{Builtin, Context};
use crate::error::Result;
use crate::fs::File;
use crate::interpreter::ExecResult;

fn operands(args: &[String]) -> Vec<&String> {
    args.iter()
        .filter(|a| !(a.starts_with('-') && a.len() > 1))
        .collect()
}

/// The rm builtin - remove files.
///
/// Usage: rm [FLAGS] FILE...
///
/// Flags are accepted and ignored. `rm /` empties the whole filesystem.
pub struct Rm;

impl Builtin for Rm {
    fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let files = operands(ctx.args);
        if files.is_empty() {
            return Ok(ExecResult::err("rm: missing operand", 1));
        }

        let mut errors = Vec::new();
        for file in files {
            if file == "/" {
                ctx.state.fs.clear();
                continue;
            }
            let path = ctx.state.resolve(file);
            if ctx.state.fs.remove(&path).is_none() {
                errors.push(format!(
                    "rm: cannot remove '{}': No such file or directory",
                    file
                ));
            }
        }

        if errors.is_empty() {
            Ok(ExecResult::ok(String::new()))
        } else {
            Ok(ExecResult::err(errors.join("\n"), 1))
        }
    }
}

/// The cp builtin - copy files.
///
/// Usage: cp SOURCE DEST
///
/// A missing source copies as an empty file.
pub struct Cp;

impl Builtin for Cp {
    fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let files = operands(ctx.args);
        let [from, to] = files.as_slice() else {
            return Ok(ExecResult::err("cp: missing file operand", 1));
        };
        let from = ctx.state.resolve(from);
        let to = ctx.state.resolve(to);
        ctx.state.fs.copy(&from, &to);
        Ok(ExecResult::ok(String::new()))
    }
}

/// The mv builtin - move/rename files.
///
/// Usage: mv SOURCE DEST
pub struct Mv;

impl Builtin for Mv {
    fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let files = operands(ctx.args);
        let [from, to] = files.as_slice() else {
            return Ok(ExecResult::err("mv: missing file operand", 1));
        };
        let from = ctx.state.resolve(from);
        let to = ctx.state.resolve(to);
        ctx.state.fs.rename(&from, &to);
        Ok(ExecResult::ok(String::new()))
    }
}

/// The touch builtin - create empty files.
///
/// Existing files are left untouched.
pub struct Touch;

impl Builtin for Touch {
    fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let files = operands(ctx.args);
        if files.is_empty() {
            return Ok(ExecResult::err("touch: missing file operand", 1));
        }
        for file in files {
            let path = ctx.state.resolve(file);
            if !ctx.state.fs.contains(&path) {
                ctx.state.fs.write(&path, "");
            }
        }
        Ok(ExecResult::ok(String::new()))
    }
}

/// The chmod builtin - change file permissions.
///
/// Usage: chmod MODE FILE...
///
/// MODE is `+x` or a three digit octal mode. A missing file is created as
/// a placeholder with no contents, so the permission change is still
/// visible to later steps.
pub struct Chmod;

impl Builtin for Chmod {
    fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let Some((mode, files)) = ctx.args.split_first() else {
            return Ok(ExecResult::err("chmod: missing operand", 1));
        };
        if files.is_empty() {
            return Ok(ExecResult::err(
                format!("chmod: missing operand after '{}'", mode),
                1,
            ));
        }

        for file in files {
            let path = ctx.state.resolve(file);
            if !ctx.state.fs.contains(&path) {
                ctx.state.fs.insert(File::placeholder(path.clone()));
            }
            let Some(entry) = ctx.state.fs.get_mut(&path) else {
                continue;
            };
            if mode == "+x" {
                entry.add_execute();
            } else if !entry.set_octal_mode(mode) {
                return Ok(ExecResult::err(
                    format!("chmod: invalid mode: '{}'", mode),
                    1,
                ));
            }
        }
        Ok(ExecResult::ok(String::new()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::builtins::testing::run_default;
    use crate::interpreter::State;

    fn state_with(path: &str, contents: &str) -> State {
        let mut state = State::new();
        state.fs.write(path, contents);
        state
    }

    #[test]
    fn test_rm_ignores_flags() {
        let mut state = state_with("~/payload.sh", "x");
        let result = run_default(&Rm, &["-rf", "payload.sh"], &mut state);
        assert!(result.is_success());
        assert!(state.fs.is_empty());
    }

    #[test]
    fn test_rm_root_clears_everything() {
        let mut state = state_with("/etc/passwd", "root");
        state.fs.write("~/a", "b");
        run_default(&Rm, &["-rf", "/"], &mut state);
        assert!(state.fs.is_empty());
    }

    #[test]
    fn test_rm_missing_file() {
        let mut state = State::new();
        let result = run_default(&Rm, &["ghost"], &mut state);
        assert_eq!(
            result.stderr,
            "rm: cannot remove 'ghost': No such file or directory"
        );
    }

    #[test]
    fn test_cp_and_mv() {
        let mut state = state_with("~/a", "data");
        run_default(&Cp, &["a", "b"], &mut state);
        assert_eq!(state.fs.text("~/b"), Some("data"));
        assert!(state.fs.contains("~/a"));

        run_default(&Mv, &["b", "/tmp/c"], &mut state);
        assert!(!state.fs.contains("~/b"));
        assert_eq!(state.fs.get("/tmp/c").unwrap().name, "/tmp/c");
    }

    #[test]
    fn test_cp_missing_source_is_empty() {
        let mut state = State::new();
        run_default(&Cp, &["nothing", "copy"], &mut state);
        assert_eq!(state.fs.text("~/copy"), Some(""));
    }

    #[test]
    fn test_touch_keeps_existing() {
        let mut state = state_with("~/a", "keep");
        run_default(&Touch, &["a", "new"], &mut state);
        assert_eq!(state.fs.text("~/a"), Some("keep"));
        assert_eq!(state.fs.text("~/new"), Some(""));
    }

    #[test]
    fn test_chmod_plus_x_creates_placeholder() {
        let mut state = State::new();
        run_default(&Chmod, &["+x", "run.sh"], &mut state);
        let file = state.fs.get("~/run.sh").unwrap();
        assert_eq!(file.contents, None);
        assert_eq!(file.permissions, "rwxrwxrwx");
    }

    #[test]
    fn test_chmod_octal() {
        let mut state = state_with("~/a", "x");
        run_default(&Chmod, &["750", "a"], &mut state);
        assert_eq!(state.fs.get("~/a").unwrap().permissions, "rwxr-x---");

        let result = run_default(&Chmod, &["u+q", "a"], &mut state);
        assert_eq!(result.exit_code, 1);
    }
}
