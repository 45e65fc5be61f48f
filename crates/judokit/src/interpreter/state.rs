//! Interpreter state types
//!
//! [`State`] is the unit of snapshot and restore. Everything an action reads
//! or writes lives here, so pausing between actions and resuming later (or
//! from a JSON snapshot) needs nothing else.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::fs::{File, IoSocket, VirtualFs, resolve_path};
use crate::parser::Node;

/// Result of executing a builtin command.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Exit code
    pub exit_code: i32,
}

impl ExecResult {
    /// Create a successful result with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    /// Create a failed result with the given stderr.
    pub fn err(stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Check if the result indicates success.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Saved bundle pushed by [`State::lower_scope`].
#[derive(Debug, Clone, PartialEq)]
struct Scope {
    io: IoSocket,
    working_dir: String,
    variables: BTreeMap<String, Vec<String>>,
    functions: BTreeMap<String, Node>,
    screen: String,
}

fn default_working_dir() -> String {
    "~".to_string()
}

/// Sandboxed environment: variables, functions, filesystem, IO and screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    #[serde(rename = "STDIO", default)]
    pub io: IoSocket,
    #[serde(default = "default_working_dir")]
    pub working_dir: String,
    /// Value history per name; the last element is the active value
    #[serde(default)]
    pub variables: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub fs: VirtualFs,
    #[serde(default)]
    pub open_sockets: Vec<IoSocket>,
    /// Memoized answers for conditions the sandbox cannot evaluate
    #[serde(default)]
    pub truths: BTreeMap<String, bool>,
    #[serde(default)]
    pub functions: BTreeMap<String, Node>,
    /// Cumulative output, distinct from the transient OUT buffer
    #[serde(default)]
    pub screen: String,
    /// Directory a fresh subshell starts in
    #[serde(default = "default_working_dir")]
    pub starting_working_dir: String,
    #[serde(skip)]
    scopes: Vec<Scope>,
    #[serde(skip)]
    captures: Vec<String>,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    pub fn new() -> Self {
        Self::with_working_dir(default_working_dir())
    }

    pub fn with_working_dir(working_dir: impl Into<String>) -> Self {
        let working_dir = working_dir.into();
        Self {
            io: IoSocket::new(0),
            starting_working_dir: working_dir.clone(),
            working_dir,
            variables: BTreeMap::new(),
            fs: VirtualFs::new(),
            open_sockets: Vec::new(),
            truths: BTreeMap::new(),
            functions: BTreeMap::new(),
            screen: String::new(),
            scopes: Vec::new(),
            captures: Vec::new(),
        }
    }

    /// Active value of a variable.
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables
            .get(name)
            .and_then(|values| values.last())
            .map(String::as_str)
    }

    /// Replace a variable with a single value.
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), vec![value.into()]);
    }

    /// Replace a variable with a list of values.
    pub fn set_variable_list(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.variables.insert(name.into(), values);
    }

    /// Remove a variable from the current scope.
    pub fn unset_variable(&mut self, name: &str) -> bool {
        self.variables.remove(name).is_some()
    }

    /// Remove a function from the current scope.
    pub fn unset_function(&mut self, name: &str) -> bool {
        self.functions.remove(name).is_some()
    }

    /// Positional parameters `$1..$n` in order, stopping at the first gap.
    pub fn positionals(&self) -> Vec<String> {
        (1..)
            .map_while(|i| self.variable(&i.to_string()).map(str::to_string))
            .collect()
    }

    /// Shift positional parameters down by one, dropping `$1`.
    pub fn shift_positionals(&mut self) {
        if !self.variables.contains_key("1") {
            return;
        }
        let mut i = 1usize;
        while let Some(next) = self.variables.get(&(i + 1).to_string()).cloned() {
            self.variables.insert(i.to_string(), next);
            i += 1;
        }
        self.variables.remove(&i.to_string());
    }

    pub fn truth(&self, condition: &str) -> Option<bool> {
        self.truths.get(condition).copied()
    }

    pub fn set_truth(&mut self, condition: impl Into<String>, value: bool) {
        self.truths.insert(condition.into(), value);
    }

    /// Resolve a path against the working directory.
    pub fn resolve(&self, name: &str) -> String {
        resolve_path(&self.working_dir, name)
    }

    /// Create or replace a file, resolving `name` against the working
    /// directory.
    pub fn write_file(&mut self, name: &str, contents: impl Into<String>, permissions: &str) {
        let path = self.resolve(name);
        self.fs.insert(File::new(path, contents, permissions));
    }

    /// Move pending OUT onto the screen, followed by a newline.
    pub fn print_to_screen(&mut self) {
        if !self.io.output.is_empty() {
            let out = std::mem::take(&mut self.io.output);
            self.screen.push_str(&out);
            self.screen.push('\n');
        }
    }

    /// Number of scopes currently lowered.
    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    /// Save io, working dir, variables, functions and screen; the live
    /// copies become independent clones and the screen starts empty.
    pub fn lower_scope(&mut self) {
        let scope = Scope {
            io: self.io.clone(),
            working_dir: self.working_dir.clone(),
            variables: self.variables.clone(),
            functions: self.functions.clone(),
            screen: std::mem::take(&mut self.screen),
        };
        self.scopes.push(scope);
        tracing::debug!(depth = self.scopes.len(), "scope lowered");
    }

    /// Restore the most recently saved scope. Screen output produced in the
    /// child is kept after the parent's screen. No-op at top level.
    pub fn raise_scope(&mut self) {
        let Some(scope) = self.scopes.pop() else {
            tracing::warn!("raise_scope without a lowered scope");
            return;
        };
        self.io = scope.io;
        self.working_dir = scope.working_dir;
        self.variables = scope.variables;
        self.functions = scope.functions;
        let child = std::mem::take(&mut self.screen);
        self.screen = scope.screen + &child;
        tracing::debug!(depth = self.scopes.len(), "scope raised");
    }

    /// Lower a scope with a fresh IO socket, starting in the starting
    /// working directory.
    pub fn enter_subshell(&mut self) {
        self.lower_scope();
        self.io = IoSocket::new(0);
        self.working_dir = self.starting_working_dir.clone();
    }

    /// Divert the screen so redirected output can be collected on its own.
    pub fn begin_capture(&mut self) {
        let screen = std::mem::take(&mut self.screen);
        self.captures.push(screen);
    }

    /// Put back the screen saved by [`State::begin_capture`], dropping the
    /// captured output.
    pub fn end_capture(&mut self) {
        if let Some(screen) = self.captures.pop() {
            self.screen = screen;
        }
    }

    /// Human readable dump, as shown by the `state` command.
    pub fn text(&self, show_files: bool) -> String {
        let mut output = format!("Working directory: {}\n", repr(&self.working_dir));
        output.push_str(&self.variables_text());
        output.push('\n');
        output.push_str(&format!(
            "Number of open sockets: {}\n",
            self.open_sockets.len()
        ));
        output.push_str(&format!("Standard IN: {}\n", repr(&self.io.input)));
        output.push_str(&format!("Standard OUT: {}\n", repr(&self.io.output)));
        output.push_str(&self.functions_text());
        output.push('\n');
        output.push_str(&self.file_system_text(show_files));
        output
    }

    pub fn variables_text(&self) -> String {
        let mut output = String::from("Variables: \n");
        for (name, values) in &self.variables {
            // Names with an empty history are not listed
            if let Some(value) = values.last() {
                output.push_str(&format!("  {}: \"{}\"\n", name, value));
            }
        }
        if self.variables.is_empty() {
            output.push_str("  No variables in list\n");
        }
        output
    }

    pub fn functions_text(&self) -> String {
        let mut output = String::from("Functions: \n");
        for (name, body) in &self.functions {
            output.push_str(&format!("  {}:\n", name));
            let text = format!("     {}", body).replace('\n', "\n    ");
            output.push_str(&text);
            output.push('\n');
        }
        if self.functions.is_empty() {
            output.push_str("  No functions in list\n");
        }
        output
    }

    pub fn file_system_text(&self, show_files: bool) -> String {
        let mut output = String::from("File System: \n");
        for file in self.fs.iter() {
            output.push_str(&format!(
                "  {} permissions: {}\n",
                file.name, file.permissions
            ));
            if show_files {
                output.push_str(file.text());
                output.push('\n');
            }
        }
        if self.fs.is_empty() {
            output.push_str("No Files in the file system\n");
        }
        output
    }
}

fn repr(text: &str) -> String {
    format!("'{}'", text.escape_debug())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_exec_result() {
        assert!(ExecResult::ok("x").is_success());
        let failed = ExecResult::err("boom\n", 2);
        assert!(!failed.is_success());
        assert_eq!(failed.stderr, "boom\n");
    }

    #[test]
    fn test_variable_last_value_is_active() {
        let mut state = State::new();
        state.set_variable_list("ports", vec!["one".into(), "two".into()]);
        assert_eq!(state.variable("ports"), Some("two"));
        state.set_variable("ports", "three");
        assert_eq!(state.variables["ports"], vec!["three"]);
        assert_eq!(state.variable("missing"), None);
    }

    #[test]
    fn test_scope_round_trip_restores_tables() {
        let mut state = State::new();
        state.set_variable("a", "1");
        state.screen.push_str("before\n");
        let before = state.clone();

        state.lower_scope();
        assert_eq!(state.screen, "");
        state.set_variable("a", "2");
        state.set_variable("b", "3");
        state.working_dir = "/tmp".into();
        state.io.write("child");
        state.print_to_screen();
        state.raise_scope();

        assert_eq!(state.variables, before.variables);
        assert_eq!(state.working_dir, "~");
        assert_eq!(state.io, before.io);
        assert_eq!(state.screen, "before\nchild\n");
        assert_eq!(state.scope_depth(), 0);
    }

    #[test]
    fn test_raise_scope_at_top_level_is_noop() {
        let mut state = State::new();
        state.set_variable("a", "1");
        let before = state.clone();
        state.raise_scope();
        assert_eq!(state, before);
    }

    #[test]
    fn test_enter_subshell_uses_fresh_io() {
        let mut state = State::with_working_dir("/srv");
        state.working_dir = "/srv/app".into();
        state.io.input = "pending".into();
        state.enter_subshell();
        assert_eq!(state.io, IoSocket::new(0));
        assert_eq!(state.working_dir, "/srv");
        state.raise_scope();
        assert_eq!(state.io.input, "pending");
        assert_eq!(state.working_dir, "/srv/app");
    }

    #[test]
    fn test_capture_diverts_screen() {
        let mut state = State::new();
        state.screen = "kept\n".into();
        state.begin_capture();
        state.screen.push_str("captured\n");
        state.end_capture();
        assert_eq!(state.screen, "kept\n");
    }

    #[test]
    fn test_shift_positionals() {
        let mut state = State::new();
        state.set_variable("1", "a");
        state.set_variable("2", "b");
        state.set_variable("3", "c");
        state.shift_positionals();
        assert_eq!(state.positionals(), vec!["b", "c"]);
        assert!(!state.variables.contains_key("3"));

        let mut empty = State::new();
        empty.shift_positionals();
        assert!(empty.variables.is_empty());
    }

    #[test]
    fn test_print_to_screen_skips_empty_out() {
        let mut state = State::new();
        state.print_to_screen();
        assert_eq!(state.screen, "");
        state.io.write("hi");
        state.print_to_screen();
        assert_eq!(state.screen, "hi\n");
        assert_eq!(state.io.output, "");
    }

    #[test]
    fn test_write_file_resolves_against_working_dir() {
        let mut state = State::with_working_dir("/home/kali");
        state.write_file("./notes", "x", "rwxr--r--");
        let file = state.fs.get("/home/kali/notes").unwrap();
        assert_eq!(file.permissions, "rwxr--r--");
    }

    #[test]
    fn test_text_layout() {
        let mut state = State::new();
        state.set_variable("a", "x");
        state.fs.write("~/f", "body");
        let text = state.text(true);
        let expected = "Working directory: '~'\n\
                        Variables: \n  a: \"x\"\n\n\
                        Number of open sockets: 0\n\
                        Standard IN: ''\n\
                        Standard OUT: ''\n\
                        Functions: \n  No functions in list\n\n\
                        File System: \n  ~/f permissions: rw-rw-rw-\nbody\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_empty_text_placeholders() {
        let state = State::new();
        let text = state.text(false);
        assert!(text.contains("  No variables in list\n"));
        assert!(text.contains("No Files in the file system\n"));
    }

    #[test]
    fn test_snapshot_json_shape() {
        let mut state = State::new();
        state.set_variable("a", "x");
        state.set_truth("[ -f x ]", true);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["STDIO"]["id_num"], 0);
        assert_eq!(json["working_dir"], "~");
        assert_eq!(json["variables"]["a"][0], "x");
        assert_eq!(json["truths"]["[ -f x ]"], true);
        assert!(json["fs"].as_array().unwrap().is_empty());

        let minimal: State = serde_json::from_str(
            r#"{"STDIO": {"IN": "", "OUT": "", "id_num": 0}, "working_dir": "/"}"#,
        )
        .unwrap();
        assert!(minimal.variables.is_empty());
        assert_eq!(minimal.starting_working_dir, "~");
    }
}
