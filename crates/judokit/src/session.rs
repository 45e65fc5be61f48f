//! Driver surface
//!
//! A [`Session`] owns an interpreter, the loaded program, the undo history
//! and the alias table. Every operation returns an [`Outcome`]; a non-zero
//! status is a usage problem to report, not a failure of the engine.
//! Only structural errors and operator aborts come back as `Err`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fs::DEFAULT_PERMISSIONS;
use crate::history::History;
use crate::interpreter::Interpreter;
use crate::parser::{self, Node};

/// Result of one driver operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    pub message: String,
    /// 0 on success, non-zero for usage errors
    pub status: i32,
    /// Whether the driver should show `message`
    pub print_out: bool,
}

impl Outcome {
    /// Successful operation with a message to show.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: 0,
            print_out: true,
        }
    }

    /// Successful operation with nothing to show.
    pub fn quiet() -> Self {
        Self::default()
    }

    /// Usage error.
    pub fn usage(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: 1,
            print_out: true,
        }
    }
}

/// Where newly loaded nodes go relative to the current program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadMode {
    #[default]
    Replace,
    Append,
    Prepend,
}

/// Options for [`Session::next`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NextFlags {
    /// Only build the node; step it with `inch`
    pub inch: bool,
    /// Also run the node on the host
    pub execute: bool,
    /// Snapshot before the node even when history is off
    pub history: bool,
    /// Append the state dump to the message
    pub print: bool,
}

/// Options for [`Session::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunFlags {
    pub inch: bool,
    pub execute: bool,
    pub history: bool,
}

/// Whether snapshots are taken automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    On,
    Off,
    Toggle,
}

/// A file to create with [`Session::fs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSpec {
    pub name: String,
    pub contents: String,
    pub permissions: Option<String>,
}

impl FileSpec {
    /// Parse `name:contents[:permissions]`.
    pub fn parse(spec: &str) -> Option<Self> {
        let mut fields = spec.splitn(3, ':');
        let name = fields.next()?.to_string();
        let contents = fields.next()?.to_string();
        let permissions = fields.next().map(str::to_string);
        Some(Self {
            name,
            contents,
            permissions,
        })
    }
}

/// Session export: history, aliases and the history flag.
#[derive(Debug, Serialize, Deserialize)]
struct SessionExport {
    history: History,
    #[serde(default)]
    aliases: BTreeMap<String, String>,
    #[serde(with = "flag")]
    maintain_history: bool,
}

/// `"t"`/`"f"` booleans.
mod flag {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "t" } else { "f" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match String::deserialize(deserializer)?.as_str() {
            "t" => Ok(true),
            "f" => Ok(false),
            other => Err(D::Error::custom(format!(
                "expected \"t\" or \"f\", got {:?}",
                other
            ))),
        }
    }
}

/// Interactive stepping session over one interpreter.
pub struct Session {
    interpreter: Interpreter,
    history: History,
    program: Vec<Node>,
    cursor: usize,
    aliases: BTreeMap<String, String>,
    maintain_history: bool,
}

impl Session {
    pub fn new(interpreter: Interpreter) -> Self {
        let history = History::new(interpreter.state());
        Self {
            interpreter,
            history,
            program: Vec::new(),
            cursor: 0,
            aliases: BTreeMap::new(),
            maintain_history: true,
        }
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn program(&self) -> &[Node] {
        &self.program
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn maintain_history(&self) -> bool {
        self.maintain_history
    }

    /// Parse `text` into program nodes.
    pub fn load(&mut self, text: &str, mode: LoadMode) -> Outcome {
        let nodes = match parser::parse(text) {
            Ok(nodes) => nodes,
            Err(e) => return Outcome::usage(format!("Failed to load script: {}", e)),
        };
        if nodes.is_empty() {
            return Outcome::usage("Nothing to load");
        }
        tracing::info!(nodes = nodes.len(), mode = ?mode, "program loaded");
        match mode {
            LoadMode::Replace => self.program = nodes,
            LoadMode::Append => self.program.extend(nodes),
            LoadMode::Prepend => {
                let rest = std::mem::take(&mut self.program);
                self.program = nodes;
                self.program.extend(rest);
            }
        }
        self.cursor = 0;
        self.next_node_outcome(String::new())
    }

    /// Load a script from the host filesystem.
    pub fn load_file(&mut self, path: &Path, mode: LoadMode) -> Outcome {
        match std::fs::read_to_string(path) {
            Ok(text) => self.load(&text, mode),
            Err(_) => Outcome::usage(format!(
                "Cannot load file {} file not found",
                path.display()
            )),
        }
    }

    /// Execute the next `count` program nodes. A pending action stack is
    /// drained first and counts as one step.
    pub fn next(&mut self, count: usize, flags: NextFlags) -> Result<Outcome> {
        let mut message = String::new();
        for _ in 0..count {
            if self.interpreter.stack_len() > 0 {
                self.interpreter.drain()?;
                continue;
            }
            let Some(node) = self.program.get(self.cursor).cloned() else {
                return Ok(Outcome::ok("No nodes left. Please load more"));
            };
            let text = node.to_string();
            if self.maintain_history || flags.history {
                self.save_state(None, &text);
            }
            self.cursor += 1;

            if flags.execute {
                self.interpreter.shell(&text, true);
            }
            if flags.inch {
                self.interpreter.build(&node, false)?;
                message = self.front_action_text();
            } else {
                self.interpreter.run(&node)?;
            }
        }

        if flags.print {
            message.push_str(&self.state_text(false));
            message.push('\n');
        }
        Ok(self.next_node_outcome(message))
    }

    /// Restore the newest snapshot, or the initial state when none is left.
    pub fn undo(&mut self) -> Outcome {
        self.interpreter.clear_stack();
        match self.history.undo() {
            Some(record) => {
                self.interpreter.set_state(record.env);
                self.cursor = record.cursor;
                self.next_node_outcome(format!("Undid {}\n", record.name))
            }
            None => {
                self.interpreter.reset();
                self.history = History::new(self.interpreter.state());
                self.cursor = 0;
                Outcome::ok("History exhausted, state reset")
            }
        }
    }

    /// Move the cursor forward without executing.
    pub fn skip(&mut self, count: usize) -> Outcome {
        self.cursor = (self.cursor + count).min(self.program.len());
        self.next_node_outcome(String::new())
    }

    /// Explicit named save point.
    pub fn save(&mut self, name: &str) -> Outcome {
        if name.is_empty() {
            return Outcome::usage("Must specify a name for your save point. \nNothing was saved");
        }
        self.save_state(Some(name), "User Save");
        Outcome::quiet()
    }

    /// Execute `count` actions. With `execute` each action is removed and
    /// its source text run on the host instead.
    pub fn inch(&mut self, count: usize, execute: bool) -> Result<Outcome> {
        if self.interpreter.stack_len() == 0 {
            return Ok(Outcome::usage(
                "Action Stack is empty. Please run build or next/run -i to load the action stack",
            ));
        }
        for _ in 0..count {
            if execute {
                if let Some(action) = self.interpreter.pop_action() {
                    if let Some(source) = action.source {
                        self.interpreter.shell(&source, true);
                    }
                    self.interpreter.state_mut().io.input.clear();
                }
            } else {
                self.interpreter.inch()?;
            }
            if self.interpreter.stack_len() == 0 {
                break;
            }
        }
        Ok(Outcome::ok(self.front_action_text()))
    }

    /// Parse and run arbitrary text outside the loaded program.
    pub fn run(&mut self, text: &str, flags: RunFlags) -> Result<Outcome> {
        if self.maintain_history || flags.history {
            self.save_state(None, text);
        }
        if flags.execute {
            self.interpreter.shell(text, true);
        }
        if flags.inch {
            return self.build(text, false, false);
        }
        let nodes = match parser::parse(text) {
            Ok(nodes) => nodes,
            Err(e) => {
                return Ok(Outcome::usage(format!(
                    "could not build AST of code:\n{}\n{}",
                    text, e
                )));
            }
        };
        for node in &nodes {
            self.interpreter.run(node)?;
        }
        Ok(Outcome::quiet())
    }

    /// Compile text, or the node at the cursor, onto the action stack.
    pub fn build(&mut self, text: &str, append: bool, from_program: bool) -> Result<Outcome> {
        let nodes = if from_program {
            match self.program.get(self.cursor) {
                Some(node) => vec![node.clone()],
                None => return Ok(Outcome::usage("No nodes currently loaded")),
            }
        } else {
            if text.trim().is_empty() {
                return Ok(Outcome::quiet());
            }
            match parser::parse(text) {
                Ok(nodes) => nodes,
                Err(e) => {
                    return Ok(Outcome::usage(format!(
                        "could not build AST of code:\n{}\n{}",
                        text, e
                    )));
                }
            }
        };
        for (i, node) in nodes.iter().enumerate() {
            self.interpreter.build(node, append || i > 0)?;
        }
        Ok(Outcome::ok(self.front_action_text()))
    }

    /// Pending actions, one indented line each.
    pub fn stack(&self) -> Outcome {
        let mut message = String::from("Action Stack: \n");
        for line in self.interpreter.stack_text().lines() {
            message.push_str("  ");
            message.push_str(line);
            message.push('\n');
        }
        Outcome::ok(message)
    }

    /// Set and/or show the working directory.
    pub fn dir(&mut self, path: Option<&str>) -> Outcome {
        if let Some(path) = path {
            self.interpreter.state_mut().working_dir = path.to_string();
        }
        Outcome::ok(format!(
            "Working dir: {}",
            self.interpreter.state().working_dir
        ))
    }

    /// Set and/or show IN.
    pub fn stdin(&mut self, text: Option<&str>) -> Outcome {
        if let Some(text) = text {
            self.interpreter.state_mut().io.input = text.to_string();
        }
        Outcome::ok(format!("STD IN: {}", self.interpreter.state().io.input))
    }

    /// Set and/or show OUT.
    pub fn stdout(&mut self, text: Option<&str>) -> Outcome {
        if let Some(text) = text {
            self.interpreter.state_mut().io.output = text.to_string();
        }
        Outcome::ok(format!("STD OUT: {}", self.interpreter.state().io.output))
    }

    /// Set variables from `(name, value)` pairs.
    pub fn var(&mut self, pairs: &[(String, String)], print: bool) -> Outcome {
        for (name, value) in pairs {
            self.interpreter
                .state_mut()
                .set_variable(name.clone(), value.clone());
        }
        if print {
            Outcome::ok(self.interpreter.state().variables_text())
        } else {
            Outcome::quiet()
        }
    }

    /// Create files in the virtual filesystem.
    pub fn fs(&mut self, specs: &[FileSpec], print: bool) -> Outcome {
        for spec in specs {
            let permissions = spec.permissions.as_deref().unwrap_or(DEFAULT_PERMISSIONS);
            self.interpreter
                .state_mut()
                .write_file(&spec.name, spec.contents.clone(), permissions);
        }
        if print {
            Outcome::ok(self.interpreter.state().file_system_text(true))
        } else {
            Outcome::quiet()
        }
    }

    pub fn state(&self, show_files: bool) -> Outcome {
        Outcome::ok(self.state_text(show_files))
    }

    pub fn history_text(&self) -> Outcome {
        Outcome::ok(self.history.text())
    }

    /// Drop all history and go back to the initial state.
    pub fn history_reset(&mut self) -> Outcome {
        self.interpreter.reset();
        self.history = History::new(self.interpreter.state());
        Outcome::ok("History reset")
    }

    pub fn history_mode(&mut self, mode: HistoryMode) -> Outcome {
        self.maintain_history = match mode {
            HistoryMode::On => true,
            HistoryMode::Off => false,
            HistoryMode::Toggle => !self.maintain_history,
        };
        Outcome::ok(format!(
            "History is {}",
            if self.maintain_history { "on" } else { "off" }
        ))
    }

    /// Serialize history, aliases and the history flag.
    pub fn export_json(&self) -> Result<String> {
        let export = SessionExport {
            history: self.history.clone(),
            aliases: self.aliases.clone(),
            maintain_history: self.maintain_history,
        };
        Ok(serde_json::to_string_pretty(&export)?)
    }

    /// Replace history, aliases and the history flag from an export. The
    /// newest record becomes the live state.
    pub fn import_json(&mut self, json: &str) -> Result<Outcome> {
        let export: SessionExport = serde_json::from_str(json)?;
        let history = History::from_records(export.history.records().to_vec());
        if let Some(record) = history.records().last() {
            self.interpreter.set_state(record.env.clone());
        }
        self.interpreter.clear_stack();
        self.history = history;
        self.aliases = export.aliases;
        self.maintain_history = export.maintain_history;
        tracing::info!(records = self.history.len(), "session imported");
        Ok(Outcome::ok("Session imported"))
    }

    pub fn alias(&mut self, name: impl Into<String>, text: impl Into<String>) -> Outcome {
        self.aliases.insert(name.into(), text.into());
        Outcome::quiet()
    }

    pub fn resolve_alias(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    /// `name: text` for each requested alias that exists.
    pub fn alias_lookup(&self, names: &[&str]) -> Outcome {
        let message: String = names
            .iter()
            .filter_map(|name| {
                self.aliases
                    .get(*name)
                    .map(|text| format!("{}: {}\n", name, text))
            })
            .collect();
        Outcome::ok(message)
    }

    pub fn alias_table(&self) -> Outcome {
        let mut message = String::from("Alias Table:\n");
        for (name, text) in &self.aliases {
            message.push_str(&format!("  {}: {}\n", name, text));
        }
        Outcome::ok(message)
    }

    /// Run text on the host through the escape hatch.
    pub fn shell(&mut self, text: &str, forward_stdio: bool) -> Outcome {
        self.interpreter.shell(text, forward_stdio);
        Outcome::quiet()
    }

    /// Memoize a condition answer. `t`/`true` (any case) is true.
    pub fn set_truth(&mut self, condition: &str, value: &str) -> Outcome {
        let value = matches!(value.to_ascii_lowercase().as_str(), "t" | "true");
        self.interpreter.state_mut().set_truth(condition, value);
        Outcome::quiet()
    }

    pub fn truths_text(&self) -> Outcome {
        let truths = &self.interpreter.state().truths;
        if truths.is_empty() {
            return Outcome::ok("No truths yet");
        }
        let message: String = truths
            .iter()
            .map(|(condition, value)| format!("{}:{}\n", condition, capitalized(*value)))
            .collect();
        Outcome::ok(message)
    }

    /// Program listing around the cursor, `before` nodes back and `after`
    /// nodes ahead.
    pub fn list(&self, before: usize, after: usize) -> Outcome {
        if self.program.is_empty() {
            return Outcome::usage("No nodes currently loaded");
        }
        let start = self.cursor.saturating_sub(before);
        let end = (self.cursor + after + 1).min(self.program.len());
        let mut message = String::new();
        for (i, node) in self.program.iter().enumerate().take(end).skip(start) {
            if i == self.cursor {
                message.push_str(&format!("{} => \t{}\n", i, node));
            } else {
                message.push_str(&format!("{} \t{}\n", i, node));
            }
        }
        if self.cursor >= self.program.len() {
            message.push_str("=> \tFIN\n");
        }
        Outcome::ok(message)
    }

    /// Show the screen, optionally clearing it afterwards.
    pub fn screen(&mut self, clear: bool) -> Outcome {
        let screen = if clear {
            std::mem::take(&mut self.interpreter.state_mut().screen)
        } else {
            self.interpreter.state().screen.clone()
        };
        Outcome::ok(screen)
    }

    /// Forget the program, aliases and history and reset the state.
    pub fn reset(&mut self) -> Outcome {
        self.interpreter.reset();
        self.history = History::new(self.interpreter.state());
        self.program.clear();
        self.cursor = 0;
        self.aliases.clear();
        Outcome::quiet()
    }

    /// Driver commands that recreate the aliases, IO, working directory,
    /// variables, files and truths of this session.
    pub fn export_config(&self) -> String {
        let state = self.interpreter.state();
        let mut lines = Vec::new();
        for (name, text) in &self.aliases {
            lines.push(format!("alias {} {}", name, text));
        }
        if !state.io.input.is_empty() {
            lines.push(format!("stdin {}", state.io.input));
        }
        if !state.io.output.is_empty() {
            lines.push(format!("stdout {}", state.io.output));
        }
        lines.push(format!("dir {}", state.working_dir));
        for (name, values) in &state.variables {
            lines.push(format!("var {}:{}", name, config_quote(&values.join(" "))));
        }
        for file in state.fs.iter() {
            lines.push(format!(
                "fs {}:{}:{}",
                file.name,
                config_quote(file.text()),
                file.permissions
            ));
        }
        for (condition, value) in &state.truths {
            lines.push(format!("truth {}:{}", condition, capitalized(*value)));
        }
        lines.push(format!(
            "history {}",
            if self.maintain_history { "on" } else { "off" }
        ));
        lines.join("\n")
    }

    /// Tree dump of parsed text, or of the node at the cursor.
    pub fn parse_dump(&self, text: &str, from_program: bool) -> Outcome {
        if from_program {
            return match self.program.get(self.cursor) {
                Some(node) => Outcome::ok(node.dump()),
                None => Outcome::usage("No nodes currently loaded"),
            };
        }
        match parser::parse(text) {
            Ok(nodes) => Outcome::ok(nodes.iter().map(Node::dump).collect::<String>()),
            Err(e) => Outcome::usage(format!("could not build AST of code:\n{}\n{}", text, e)),
        }
    }

    fn save_state(&mut self, name: Option<&str>, action: &str) {
        self.history
            .save(name, action, self.interpreter.state(), self.cursor);
    }

    fn state_text(&self, show_files: bool) -> String {
        format!("\n{}", self.interpreter.text(show_files))
    }

    fn front_action_text(&self) -> String {
        match self.interpreter.next_action() {
            Some(action) => format!("=> {}", action),
            None => "=> Action stack empty".to_string(),
        }
    }

    fn next_node_outcome(&self, mut message: String) -> Outcome {
        match self.program.get(self.cursor) {
            Some(node) => message.push_str(&format!("=> {}", node)),
            None if !self.program.is_empty() => message.push_str("=> FIN"),
            None => {}
        }
        Outcome::ok(message)
    }
}

/// Single-quote a config value unless it is one plain word.
fn config_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '\'' | '"' | '\\' | '#'));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "'\\''"))
    }
}

fn capitalized(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}
