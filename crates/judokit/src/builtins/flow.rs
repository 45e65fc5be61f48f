//! Flow control builtins (true, false, :)

use super::{Builtin, Context};
use crate::error::Result;
use crate::interpreter::ExecResult;

/// The true builtin - always returns 0.
pub struct True;

impl Builtin for True {
    fn execute(&self, _ctx: Context<'_>) -> Result<ExecResult> {
        Ok(ExecResult::ok(String::new()))
    }
}

/// The false builtin - always returns 1.
pub struct False;

impl Builtin for False {
    fn execute(&self, _ctx: Context<'_>) -> Result<ExecResult> {
        Ok(ExecResult {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 1,
        })
    }
}

/// The colon builtin - does nothing, successfully.
pub struct Colon;

impl Builtin for Colon {
    fn execute(&self, _ctx: Context<'_>) -> Result<ExecResult> {
        Ok(ExecResult::ok(String::new()))
    }
}
