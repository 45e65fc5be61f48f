//! Navigation builtins (cd, pwd)
//!
//! Directories are implied by file paths, so `cd` never checks that its
//! target exists.

use super::{Builtin, Context};
use crate::error::Result;
use crate::interpreter::ExecResult;

/// The cd builtin - change directory.
pub struct Cd;

impl Builtin for Cd {
    fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        match ctx.args {
            [] => {
                ctx.state.working_dir = "~".to_string();
                Ok(ExecResult::ok(String::new()))
            }
            [target] => {
                ctx.state.working_dir = ctx.state.resolve(target);
                Ok(ExecResult::ok(String::new()))
            }
            _ => Ok(ExecResult::err("bash: cd: too many arguments", 1)),
        }
    }
}

/// The pwd builtin - print working directory.
pub struct Pwd;

impl Builtin for Pwd {
    fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        Ok(ExecResult::ok(ctx.state.working_dir.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::testing::run_default;
    use crate::interpreter::State;

    #[test]
    fn test_cd_relative_and_absolute() {
        let mut state = State::new();
        run_default(&Cd, &["projects"], &mut state);
        assert_eq!(state.working_dir, "~/projects");
        run_default(&Cd, &[".."], &mut state);
        assert_eq!(state.working_dir, "~");
        run_default(&Cd, &["/tmp"], &mut state);
        assert_eq!(run_default(&Pwd, &[], &mut state).stdout, "/tmp");
    }

    #[test]
    fn test_cd_too_many_arguments() {
        let mut state = State::new();
        let result = run_default(&Cd, &["a", "b"], &mut state);
        assert_eq!(result.stderr, "bash: cd: too many arguments");
        assert_eq!(state.working_dir, "~");
    }
}
