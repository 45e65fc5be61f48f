//! Step-through interpreter
//!
//! Nodes are compiled into an action stack instead of being executed
//! directly. [`Interpreter::inch`] executes one action, [`Interpreter::drain`]
//! runs until the stack is empty. Actions may push new actions onto the
//! front of the stack (function bodies, `if` branches, substitutions); those
//! run before anything that was already queued.

mod action;
mod command;
mod compile;
mod expand;
mod oracle;
mod state;
mod substitution;

pub use action::{Action, Operation};
pub use expand::{escape_literal, expand_word, substitute_variables};
pub use oracle::{
    CommandDecision, DefaultOracle, DisabledShell, HostShell, Oracle, ScriptedOracle,
    SystemShell, TruthAnswer,
};
pub use state::{ExecResult, State};

use std::collections::{HashMap, VecDeque};

use crate::builtins::{self, Builtin};
use crate::error::{Error, Result};
use crate::limits::{ExecutionCounters, ExecutionLimits};
use crate::logging_impl::{LogConfig, format_script_for_log, sanitize_for_log};
use crate::parser::{self, Node};

/// The step-through interpreter.
pub struct Interpreter {
    state: State,
    /// State restored by [`Interpreter::reset`]
    initial: State,
    stack: VecDeque<Action>,
    /// Command parts referenced by queued actions
    slots: Vec<Vec<Node>>,
    builtins: HashMap<String, Box<dyn Builtin>>,
    oracle: Box<dyn Oracle>,
    host: Box<dyn HostShell>,
    limits: ExecutionLimits,
    counters: ExecutionCounters,
    log_config: LogConfig,
    continue_execution: bool,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Create an interpreter with an empty state, the default oracle and
    /// the system shell as escape hatch.
    pub fn new() -> Self {
        Self::from_parts(
            State::new(),
            Box::new(DefaultOracle),
            Box::new(SystemShell),
            ExecutionLimits::default(),
            LogConfig::default(),
        )
    }

    pub(crate) fn from_parts(
        state: State,
        oracle: Box<dyn Oracle>,
        host: Box<dyn HostShell>,
        limits: ExecutionLimits,
        log_config: LogConfig,
    ) -> Self {
        Self {
            initial: state.clone(),
            state,
            stack: VecDeque::new(),
            slots: Vec::new(),
            builtins: builtins::registry(),
            oracle,
            host,
            limits,
            counters: ExecutionCounters::new(),
            log_config,
            continue_execution: true,
        }
    }

    /// Register or replace a builtin command.
    pub fn register_builtin(&mut self, name: impl Into<String>, builtin: Box<dyn Builtin>) {
        self.builtins.insert(name.into(), builtin);
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    /// Replace the live state. The action stack is left alone.
    pub fn set_state(&mut self, state: State) {
        self.state = state;
    }

    /// Swap the decision source, e.g. for an interactive prompt.
    pub fn set_oracle(&mut self, oracle: Box<dyn Oracle>) {
        self.oracle = oracle;
    }

    pub fn set_host_shell(&mut self, host: Box<dyn HostShell>) {
        self.host = host;
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    /// Result of the last list separator. Computed for `&&`, `||` and `;`
    /// but not consulted when later commands run.
    pub fn continue_execution(&self) -> bool {
        self.continue_execution
    }

    /// Go back to the state the interpreter was created with.
    pub fn reset(&mut self) {
        self.state = self.initial.clone();
        self.clear_stack();
        self.continue_execution = true;
    }

    /// Pending actions, front first.
    pub fn stack(&self) -> impl Iterator<Item = &Action> {
        self.stack.iter()
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// The action the next [`Interpreter::inch`] will execute.
    pub fn next_action(&self) -> Option<&Action> {
        self.stack.front()
    }

    pub fn clear_stack(&mut self) {
        self.stack.clear();
        self.slots.clear();
    }

    /// Remove the front action without executing it.
    pub fn pop_action(&mut self) -> Option<Action> {
        let action = self.stack.pop_front();
        if self.stack.is_empty() {
            self.slots.clear();
        }
        action
    }

    /// Compile `node` onto the action stack.
    ///
    /// The compiled actions are wrapped by a leading IO reset and a trailing
    /// cleanup. Without `append` the previous stack is replaced. Function
    /// definitions are registered while compiling. On error the stack and
    /// the function table are left exactly as they were.
    pub fn build(&mut self, node: &Node, append: bool) -> Result<()> {
        let saved_slots = if append {
            None
        } else {
            Some(std::mem::take(&mut self.slots))
        };
        let mark = self.slots.len();
        let saved_functions = self.state.functions.clone();

        let mut actions = vec![Action::new(
            Operation::ResetCommandIo,
            "Initialize state for command",
        )];
        if let Err(e) = self.compile(node, &mut actions) {
            self.state.functions = saved_functions;
            self.slots.truncate(mark);
            if let Some(slots) = saved_slots {
                self.slots = slots;
            }
            tracing::warn!(error = %e, "build failed");
            return Err(e);
        }
        actions.push(Action::new(Operation::ExitCleanup, "Exit Node Cleanup"));

        if !append {
            self.stack.clear();
            self.counters.reset();
        }
        tracing::debug!(
            kind = node.kind(),
            actions = actions.len(),
            append,
            "built action stack"
        );
        self.stack.extend(actions);
        Ok(())
    }

    /// Execute the front action. Returns false when the stack was empty.
    pub fn inch(&mut self) -> Result<bool> {
        let Some(action) = self.stack.pop_front() else {
            return Ok(false);
        };
        if let Err(e) = self.counters.tick_action(&self.limits) {
            self.stack.push_front(action);
            return Err(e.into());
        }

        tracing::trace!(action = %action, "inch");
        let result = self.execute(action.operation);
        if self.stack.is_empty() {
            self.slots.clear();
        }
        result.map(|()| true)
    }

    /// Execute actions until the stack is empty.
    pub fn drain(&mut self) -> Result<()> {
        self.counters.reset();
        while self.inch()? {}
        Ok(())
    }

    /// Build `node`, replacing the stack, and drain it.
    pub fn run(&mut self, node: &Node) -> Result<()> {
        self.build(node, false)?;
        self.drain()
    }

    /// Parse a script and run each top-level node in order.
    pub fn run_script(&mut self, script: &str) -> Result<()> {
        tracing::info!(
            script = %format_script_for_log(script, &self.log_config),
            "running script"
        );
        for node in parser::parse(script)? {
            self.run(&node)?;
        }
        Ok(())
    }

    /// Run text on the host through the escape hatch.
    ///
    /// Variables are substituted first. With `forward_stdio` IN is fed to
    /// the child. Output, including failures, is appended to OUT.
    pub fn shell(&mut self, text: &str, forward_stdio: bool) {
        let command = substitute_variables(text, &self.state);
        let stdin = forward_stdio.then(|| self.state.io.input.clone());
        tracing::warn!(command = %sanitize_for_log(&command), "running command on host");
        let output = self.host.run(&command, stdin.as_deref());
        self.state.io.write(&output);
    }

    /// Descriptions of the pending actions, one per line.
    pub fn stack_text(&self) -> String {
        if self.stack.is_empty() {
            return "Empty\n".to_string();
        }
        self.stack
            .iter()
            .map(|action| format!("{}\n", action))
            .collect()
    }

    /// State dump followed by the stack size.
    pub fn text(&self, show_files: bool) -> String {
        format!(
            "{}\nAction Queue Size: {}",
            self.state.text(show_files),
            self.stack.len()
        )
    }

    /// Queue actions ahead of everything already pending.
    fn push_front(&mut self, actions: Vec<Action>) {
        for action in actions.into_iter().rev() {
            self.stack.push_front(action);
        }
    }

    fn slot(&self, slot: usize) -> Result<&Vec<Node>> {
        self.slots
            .get(slot)
            .ok_or_else(|| Error::Execution(format!("stale command slot {}", slot)))
    }

    fn check_scope(&self) -> Result<()> {
        self.limits.check_scope(self.state.scope_depth())?;
        Ok(())
    }

    fn execute(&mut self, operation: Operation) -> Result<()> {
        match operation {
            Operation::ResetCommandIo => {
                self.state.io.output.clear();
                self.state.io.input.clear();
            }
            Operation::ExitCleanup => {
                self.state.print_to_screen();
                self.state.io.input.clear();
            }
            Operation::FlushScreen => self.state.print_to_screen(),
            Operation::PipeTransfer => self.state.io.transfer(),
            Operation::ListSeparator { op } => self.list_separator(&op)?,
            Operation::BeginCapture => self.state.begin_capture(),
            Operation::EndCapture => self.state.end_capture(),
            Operation::LoadRedirectInput { slot, index } => {
                let target = self.redirect_target(slot, index)?;
                self.load_redirect_input(&target)
            }
            Operation::WriteRedirectOutput {
                slot,
                index,
                append,
            } => {
                let target = self.redirect_target(slot, index)?;
                self.write_redirect_output(&target, append)
            }
            Operation::BindIterator { name, value } => self.state.set_variable(name, value),
            Operation::UnbindIterator { name } => {
                self.state.unset_variable(&name);
            }
            Operation::RunCommand { slot } => self.run_command(slot)?,
            Operation::AssignVariables { slot } => self.assign_variables(slot)?,
            Operation::EnterSubstitution { slot, word, part } => {
                self.enter_substitution(slot, word, part)?
            }
            Operation::ExitSubstitution { slot, word, part } => {
                self.exit_substitution(slot, word, part)?
            }
            Operation::DetermineTruth { condition, node } => {
                self.determine_truth(condition, &node)?
            }
            Operation::CheckConditionOutput { condition } => {
                let truth = !(self.state.screen.is_empty() && self.state.io.output.is_empty());
                tracing::debug!(condition = %condition, truth, "condition executed");
                self.state.set_truth(condition, truth);
                self.state.io.output.clear();
            }
            Operation::SelectBranch {
                condition,
                earlier,
                body,
            } => self.select_branch(condition.as_deref(), &earlier, &body)?,
            Operation::LowerScope => {
                self.check_scope()?;
                self.state.lower_scope();
            }
            Operation::RaiseScope => {
                self.state.print_to_screen();
                self.state.raise_scope();
            }
            Operation::EnterFunction { name, args } => {
                self.check_scope()?;
                tracing::debug!(function = %name, args = args.len(), "entering function");
                self.state.lower_scope();
                self.state
                    .variables
                    .retain(|key, _| !key.chars().all(|c| c.is_ascii_digit()));
                for (i, arg) in args.into_iter().enumerate() {
                    self.state.set_variable((i + 1).to_string(), arg);
                }
            }
            Operation::ExitFunction => {
                self.state.print_to_screen();
                self.state.raise_scope();
            }
            Operation::EnterSubshell => {
                self.check_scope()?;
                self.state.enter_subshell();
            }
            Operation::Noop => {}
        }
        Ok(())
    }

    fn list_separator(&mut self, op: &str) -> Result<()> {
        let previous = self.state.io.read();
        let status = previous.parse::<u64>().ok();
        match op {
            "||" => {
                if status == Some(0) {
                    self.continue_execution = false;
                }
            }
            "&&" => {
                if status.is_some_and(|s| s != 0) {
                    self.continue_execution = false;
                }
            }
            "&" => {}
            ";" | "\n" => self.continue_execution = true,
            other => {
                return Err(Error::Execution(format!(
                    "operator not implemented in interpreter: {:?}",
                    other
                )));
            }
        }
        Ok(())
    }

    /// Target word of a redirect, read after any substitutions in it have
    /// been spliced.
    fn redirect_target(&self, slot: usize, index: usize) -> Result<String> {
        match self.slot(slot)?.get(index) {
            Some(Node::Redirect { output, .. }) => match output.as_ref() {
                Node::Word { word, .. } => Ok(word.clone()),
                other => Err(Error::Structural(format!(
                    "redirect target is not a word: {}",
                    other
                ))),
            },
            _ => Err(Error::Execution(format!(
                "redirect missing at {}:{}",
                slot, index
            ))),
        }
    }

    fn load_redirect_input(&mut self, target: &str) {
        let path = self.state.resolve(&expand_word(target, &self.state));
        let contents = match self.state.fs.get(&path) {
            Some(file) => Some(file.text().to_string()),
            None => {
                tracing::info!(path = %path, "redirect input missing from filesystem");
                self.oracle.redirect_input(&path)
            }
        };
        self.state.io.input = contents.unwrap_or_default();
    }

    fn write_redirect_output(&mut self, target: &str, append: bool) {
        let path = self.state.resolve(&expand_word(target, &self.state));
        let mut output = self.state.screen.clone();
        output.push_str(&self.state.io.output);
        tracing::debug!(path = %path, bytes = output.len(), append, "redirect output");
        if append {
            self.state.fs.append(&path, &output);
        } else {
            self.state.fs.write(&path, output);
        }
    }

    fn determine_truth(&mut self, condition: String, node: &Node) -> Result<()> {
        if self.state.truth(&condition).is_some() {
            return Ok(());
        }
        let answer = self.oracle.truth(&condition);
        tracing::info!(condition = %condition, answer = ?answer, "truth oracle consulted");
        match answer {
            TruthAnswer::True => self.state.set_truth(condition, true),
            TruthAnswer::False => self.state.set_truth(condition, false),
            TruthAnswer::Execute => {
                let mut actions = vec![Action::new(
                    Operation::BeginCapture,
                    "Capture boolean execution output",
                )];
                self.compile(node, &mut actions)?;
                actions.push(Action::new(
                    Operation::CheckConditionOutput {
                        condition: condition.clone(),
                    },
                    "Determine if boolean execution is true",
                ));
                actions.push(Action::new(
                    Operation::EndCapture,
                    "Release boolean execution output",
                ));
                self.push_front(actions);
            }
        }
        Ok(())
    }

    fn select_branch(
        &mut self,
        condition: Option<&str>,
        earlier: &[String],
        body: &Node,
    ) -> Result<()> {
        if earlier
            .iter()
            .any(|c| self.state.truth(c) == Some(true))
        {
            return Ok(());
        }
        let eligible = match condition {
            None => true,
            Some(c) => self.state.truth(c) == Some(true),
        };
        if !eligible {
            return Ok(());
        }

        let mut actions = vec![Action::new(
            Operation::FlushScreen,
            "Enter If Statement Execution Block",
        )];
        self.compile(body, &mut actions)?;
        actions.push(Action::new(
            Operation::FlushScreen,
            "Exit If Statement Execution Block",
        ));
        self.push_front(actions);
        Ok(())
    }
}
