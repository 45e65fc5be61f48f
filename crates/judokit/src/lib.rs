//! Judokit - step-through sandbox interpreter for untrusted shell scripts
//!
//! Scripts are compiled into a queue of small actions that run against a
//! simulated environment: a virtual filesystem, variable and function
//! tables, an IN/OUT socket and a screen log. Execution can be paused after
//! any action, inspected and rolled back. Nothing touches the host unless
//! an [`Oracle`] explicitly chooses the escape hatch.
//!
//! # Example
//!
//! ```rust
//! use judokit::Interpreter;
//!
//! # fn main() -> judokit::Result<()> {
//! let mut interp = Interpreter::builder()
//!     .variable("name", "world")
//!     .build();
//! interp.run_script("for w in hello $name; do echo $w; done")?;
//! assert_eq!(interp.state().screen, "hello\nworld\n");
//! assert!(!interp.state().variables.contains_key("w"));
//! # Ok(())
//! # }
//! ```
//!
//! # Stepping
//!
//! ```rust
//! use judokit::{Interpreter, parse};
//!
//! # fn main() -> judokit::Result<()> {
//! let mut interp = Interpreter::new();
//! let node = &parse("echo $(echo hi)")?[0];
//! interp.build(node, false)?;
//! while interp.inch()? {
//!     // inspect interp.state() between actions
//! }
//! assert_eq!(interp.state().screen, "hi\n");
//! # Ok(())
//! # }
//! ```

mod builtins;
mod error;
mod fs;
mod history;
mod interpreter;
mod limits;
mod logging_impl;
mod parser;
mod session;

pub use builtins::{Builtin, Context as BuiltinContext};
pub use error::{Error, Result};
pub use fs::{DEFAULT_PERMISSIONS, File, IoSocket, VirtualFs, resolve_path};
pub use history::{History, Record};
pub use interpreter::{
    Action, CommandDecision, DefaultOracle, DisabledShell, ExecResult, HostShell, Interpreter,
    Operation, Oracle, ScriptedOracle, State, SystemShell, TruthAnswer, escape_literal,
    expand_word, substitute_variables,
};
pub use limits::{ExecutionCounters, ExecutionLimits, LimitExceeded};
pub use logging_impl::{LogConfig, format_script_for_log, sanitize_for_log};
pub use parser::{IfClause, Node, Pos, RedirectKind, parse, quote_word};
pub use session::{FileSpec, HistoryMode, LoadMode, NextFlags, Outcome, RunFlags, Session};

impl Interpreter {
    /// Create an [`InterpreterBuilder`] for customized configuration.
    pub fn builder() -> InterpreterBuilder {
        InterpreterBuilder::default()
    }
}

/// Builder for customized interpreter configuration.
#[derive(Default)]
pub struct InterpreterBuilder {
    working_dir: Option<String>,
    variables: Vec<(String, String)>,
    files: Vec<File>,
    truths: Vec<(String, bool)>,
    limits: ExecutionLimits,
    log_config: LogConfig,
    oracle: Option<Box<dyn Oracle>>,
    host: Option<Box<dyn HostShell>>,
    builtins: Vec<(String, Box<dyn Builtin>)>,
}

impl InterpreterBuilder {
    /// Set the working directory (and the directory subshells start in).
    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set an initial variable.
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.push((name.into(), value.into()));
        self
    }

    /// Add a file to the virtual filesystem. `name` is resolved against
    /// the working directory when the interpreter is built.
    pub fn file(
        mut self,
        name: impl Into<String>,
        contents: impl Into<String>,
        permissions: impl Into<String>,
    ) -> Self {
        self.files.push(File::new(name, contents, permissions));
        self
    }

    /// Memoize the truth of a condition.
    pub fn truth(mut self, condition: impl Into<String>, value: bool) -> Self {
        self.truths.push((condition.into(), value));
        self
    }

    /// Set execution limits.
    pub fn limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the logging configuration.
    pub fn log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// Set the decision source. Defaults to [`DefaultOracle`].
    pub fn oracle(mut self, oracle: Box<dyn Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Set the escape hatch. Defaults to [`SystemShell`].
    pub fn host_shell(mut self, host: Box<dyn HostShell>) -> Self {
        self.host = Some(host);
        self
    }

    /// Register a custom builtin, replacing any builtin of the same name.
    pub fn builtin(mut self, name: impl Into<String>, builtin: Box<dyn Builtin>) -> Self {
        self.builtins.push((name.into(), builtin));
        self
    }

    /// Build the interpreter.
    pub fn build(self) -> Interpreter {
        let mut state = match self.working_dir {
            Some(dir) => State::with_working_dir(dir),
            None => State::new(),
        };
        for (name, value) in self.variables {
            state.set_variable(name, value);
        }
        for file in self.files {
            let path = state.resolve(&file.name);
            state.fs.insert(File { name: path, ..file });
        }
        for (condition, value) in self.truths {
            state.set_truth(condition, value);
        }

        let mut interpreter = Interpreter::from_parts(
            state,
            self.oracle.unwrap_or_else(|| Box::new(DefaultOracle)),
            self.host.unwrap_or_else(|| Box::new(SystemShell)),
            self.limits,
            self.log_config,
        );
        for (name, builtin) in self.builtins {
            interpreter.register_builtin(name, builtin);
        }
        interpreter
    }
}
