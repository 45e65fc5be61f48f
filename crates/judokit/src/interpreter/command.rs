//! Command resolution
//!
//! A command name is looked up as a function first, then as a nested
//! `bash`/`sh` invocation, then as a builtin. Anything else goes to the
//! oracle.

use super::Interpreter;
use super::action::{Action, Operation};
use super::expand::expand_word;
use super::oracle::CommandDecision;
use crate::builtins::Context;
use crate::error::{Error, Result};
use crate::parser::{self, Node};

impl Interpreter {
    pub(crate) fn run_command(&mut self, slot: usize) -> Result<()> {
        let parts = self.slot(slot)?.clone();
        let argv: Vec<String> = parts
            .iter()
            .filter_map(|part| match part {
                Node::Word { word, .. } => Some(expand_word(word, &self.state)),
                _ => None,
            })
            .collect();
        let Some((name, args)) = argv.split_first() else {
            return Ok(());
        };

        if let Some(body) = self.state.functions.get(name).cloned() {
            return self.call_function(name, args, &body);
        }
        if name == "bash" || name == "sh" {
            return self.run_nested_shell(name, args);
        }
        if let Some(builtin) = self.builtins.get(name) {
            let ctx = Context {
                args,
                state: &mut self.state,
                oracle: self.oracle.as_mut(),
            };
            let result = builtin.execute(ctx)?;
            tracing::debug!(command = %name, exit_code = result.exit_code, "builtin finished");
            self.state.io.write(&result.stdout);
            self.state.io.write(&result.stderr);
            return Ok(());
        }

        let text = host_text(&parts);
        match self.oracle.unknown_command(&text) {
            CommandDecision::Skip => {
                tracing::info!(command = %name, "unknown command skipped");
                Ok(())
            }
            CommandDecision::Execute => {
                self.shell(&text, true);
                Ok(())
            }
            CommandDecision::Abort => Err(Error::CommandNotFound(name.clone())),
        }
    }

    pub(crate) fn assign_variables(&mut self, slot: usize) -> Result<()> {
        let parts = self.slot(slot)?.clone();
        for part in &parts {
            let Node::Assignment { word, .. } = part else {
                continue;
            };
            let Some((name, value)) = word.split_once('=') else {
                return Err(Error::Execution(format!("malformed assignment: {}", word)));
            };
            let value = expand_word(value, &self.state);
            tracing::debug!(
                assignment = %self.log_config.format_assignment(name, &value),
                "variable assigned"
            );
            self.state.set_variable(name, value);
        }
        Ok(())
    }

    fn call_function(&mut self, name: &str, args: &[String], body: &Node) -> Result<()> {
        let mut actions = vec![Action::new(
            Operation::EnterFunction {
                name: name.to_string(),
                args: args.to_vec(),
            },
            "Enter the function scope",
        )];
        self.compile(body, &mut actions)?;
        actions.push(Action::new(Operation::ExitFunction, "Exit the function scope"));
        self.push_front(actions);
        Ok(())
    }

    /// `bash -c TEXT` or `bash FILE`: parse the text and run it in a
    /// subshell scope.
    fn run_nested_shell(&mut self, name: &str, args: &[String]) -> Result<()> {
        let script = match args {
            [flag, text, ..] if flag == "-c" => text.clone(),
            [flag] if flag == "-c" => {
                self.state
                    .io
                    .write(&format!("{}: -c: option requires an argument", name));
                return Ok(());
            }
            [path, ..] => {
                let resolved = self.state.resolve(path);
                match self.state.fs.text(&resolved) {
                    Some(text) => text.to_string(),
                    None => {
                        self.state
                            .io
                            .write(&format!("{}: {}: No such file or directory", name, path));
                        return Ok(());
                    }
                }
            }
            [] => {
                tracing::info!(shell = %name, "interactive nested shell skipped");
                return Ok(());
            }
        };

        let nodes = match parser::parse(&script) {
            Ok(nodes) => nodes,
            Err(e) => {
                self.state.io.write(&format!("{}: {}", name, e));
                return Ok(());
            }
        };

        let mut actions = vec![Action::new(Operation::EnterSubshell, "Entering sub-shell env")];
        for node in &nodes {
            actions.push(Action::new(
                Operation::FlushScreen,
                "Resetting for new command",
            ));
            self.compile(node, &mut actions)?;
        }
        actions.push(Action::new(Operation::RaiseScope, "Exiting sub-shell env"));
        self.push_front(actions);
        Ok(())
    }
}

/// Shell text of a command without its redirects, which the sandbox has
/// already applied.
fn host_text(parts: &[Node]) -> String {
    parts
        .iter()
        .filter(|part| matches!(part, Node::Word { .. } | Node::Assignment { .. }))
        .map(|part| part.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
