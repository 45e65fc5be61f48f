//! Built-in shell commands
//!
//! This module provides the [`Builtin`] trait for implementing custom commands
//! and the [`Context`] struct for execution context.
//!
//! Builtins only ever touch the sandbox: they read and write the
//! [`State`] they are handed and ask the [`Oracle`] for anything from the
//! outside world. Output is appended to OUT by the interpreter.
//!
//! # Custom Builtins
//!
//! Implement the [`Builtin`] trait to create custom commands:
//!
//! ```rust
//! use judokit::{Builtin, BuiltinContext, ExecResult};
//!
//! struct Whoami;
//!
//! impl Builtin for Whoami {
//!     fn execute(&self, _ctx: BuiltinContext<'_>) -> judokit::Result<ExecResult> {
//!         Ok(ExecResult::ok("sandbox"))
//!     }
//! }
//! ```
//!
//! Register via [`InterpreterBuilder::builtin`](crate::InterpreterBuilder::builtin).

mod cat;
mod curl;
mod echo;
mod fileops;
mod flow;
mod navigation;
mod vars;

pub use cat::Cat;
pub use curl::{Curl, Wget};
pub use echo::Echo;
pub use fileops::{Chmod, Cp, Mv, Rm, Touch};
pub use flow::{Colon, False, True};
pub use navigation::{Cd, Pwd};
pub use vars::{Shift, Unset};

use std::collections::HashMap;

use crate::error::Result;
use crate::interpreter::{ExecResult, Oracle, State};

/// Execution context for builtin commands.
pub struct Context<'a> {
    /// Expanded arguments, not including the command name
    pub args: &'a [String],
    /// Live interpreter state
    pub state: &'a mut State,
    /// Decision source for data the sandbox does not have
    pub oracle: &'a mut dyn Oracle,
}

/// Trait for implementing builtin commands.
///
/// Builtins run synchronously inside a single action.
pub trait Builtin: Send + Sync {
    /// Execute the builtin command.
    fn execute(&self, ctx: Context<'_>) -> Result<ExecResult>;
}

/// The default command table, built once per interpreter.
pub fn registry() -> HashMap<String, Box<dyn Builtin>> {
    let mut builtins: HashMap<String, Box<dyn Builtin>> = HashMap::new();
    builtins.insert("echo".to_string(), Box::new(Echo));
    builtins.insert("cat".to_string(), Box::new(Cat));
    builtins.insert("cd".to_string(), Box::new(Cd));
    builtins.insert("pwd".to_string(), Box::new(Pwd));
    builtins.insert("chmod".to_string(), Box::new(Chmod));
    builtins.insert("rm".to_string(), Box::new(Rm));
    builtins.insert("mv".to_string(), Box::new(Mv));
    builtins.insert("cp".to_string(), Box::new(Cp));
    builtins.insert("touch".to_string(), Box::new(Touch));
    builtins.insert("unset".to_string(), Box::new(Unset));
    builtins.insert("shift".to_string(), Box::new(Shift));
    builtins.insert("true".to_string(), Box::new(True));
    builtins.insert("false".to_string(), Box::new(False));
    builtins.insert(":".to_string(), Box::new(Colon));
    builtins.insert("wget".to_string(), Box::new(Wget));
    builtins.insert("curl".to_string(), Box::new(Curl));
    builtins
}
