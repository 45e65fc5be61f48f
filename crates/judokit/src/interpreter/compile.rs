//! Node to action compilation
//!
//! Compilation appends to the caller's buffer and the slot table, and
//! registers function definitions. `build` rolls all three back when a
//! compile fails.

use super::Interpreter;
use super::action::{Action, Operation};
use super::expand::expand_word;
use crate::logging_impl::sanitize_for_log;
use crate::error::{Error, Result};
use crate::parser::{IfClause, Node, RedirectKind};

/// Positions of the effective redirects inside a slot. Targets are read
/// from the slot at step time, after their substitutions are spliced.
#[derive(Default)]
struct Redirects {
    input: Option<usize>,
    output: Option<(usize, bool)>,
}

impl Redirects {
    fn collect(nodes: &[Node]) -> Result<Self> {
        let mut redirects = Self::default();
        for (index, node) in nodes.iter().enumerate() {
            let Node::Redirect { kind, output, .. } = node else {
                continue;
            };
            if !matches!(output.as_ref(), Node::Word { .. }) {
                return Err(Error::Structural(format!(
                    "redirect target is not a word: {}",
                    output
                )));
            }
            match kind {
                RedirectKind::Input => redirects.input = Some(index),
                RedirectKind::Output => redirects.output = Some((index, false)),
                RedirectKind::Append => redirects.output = Some((index, true)),
            }
        }
        Ok(redirects)
    }

    /// Capture and input actions that run before the body.
    fn open(&self, slot: usize, node: &str, out: &mut Vec<Action>) {
        if self.output.is_some() {
            out.push(Action::new(
                Operation::BeginCapture,
                format!("Prepare {} node for redirects", node),
            ));
        }
        if let Some(index) = self.input {
            out.push(Action::new(
                Operation::LoadRedirectInput { slot, index },
                "Get information from redirects",
            ));
        }
    }

    /// Write and release actions that run after the body.
    fn close(&self, slot: usize, node: &str, out: &mut Vec<Action>) {
        if let Some((index, append)) = self.output {
            out.push(Action::new(
                Operation::FlushScreen,
                format!("Flush {} output", node),
            ));
            out.push(Action::new(
                Operation::WriteRedirectOutput {
                    slot,
                    index,
                    append,
                },
                "Move information out to redirects",
            ));
            out.push(Action::new(
                Operation::EndCapture,
                format!("Exit {} node redirects", node),
            ));
        }
    }
}

impl Interpreter {
    pub(crate) fn compile(&mut self, node: &Node, out: &mut Vec<Action>) -> Result<()> {
        match node {
            Node::List { parts, .. } => self.compile_list(parts, out),
            Node::Pipeline { parts, .. } => {
                for part in parts {
                    match part {
                        Node::Pipe { .. } => {
                            out.push(Action::new(Operation::PipeTransfer, "pipeline transfer"))
                        }
                        other => self.compile(other, out)?,
                    }
                }
                Ok(())
            }
            Node::Command { parts, .. } => self.compile_command(node, parts, out),
            Node::Compound {
                list, redirects, ..
            } => self.compile_compound(list, redirects, out),
            Node::For {
                name, items, body, ..
            } => self.compile_for(name, items, body, out),
            Node::If { clauses, .. } => {
                compile_if(clauses, out);
                Ok(())
            }
            Node::ReservedWord { word, .. } => match word.as_str() {
                "(" => {
                    out.push(Action::new(Operation::LowerScope, "Entering sub-shell env"));
                    Ok(())
                }
                ")" => {
                    out.push(Action::new(Operation::RaiseScope, "Exiting sub-shell env"));
                    Ok(())
                }
                "{" | "}" => Ok(()),
                other => Err(Error::Structural(format!(
                    "unsupported reserved word: {}",
                    other
                ))),
            },
            Node::Function { name, body, .. } => {
                tracing::debug!(function = %name, "function defined");
                self.state.functions.insert(name.clone(), (**body).clone());
                Ok(())
            }
            other => Err(Error::Structural(format!(
                "{} node cannot be compiled on its own: {}",
                other.kind(),
                other
            ))),
        }
    }

    fn compile_list(&mut self, parts: &[Node], out: &mut Vec<Action>) -> Result<()> {
        out.push(Action::new(Operation::FlushScreen, "list node entry"));
        for part in parts {
            match part {
                Node::Operator { op, .. } => out.push(Action::new(
                    Operation::ListSeparator { op: op.clone() },
                    format!("list node transfer character: {}", op.escape_debug()),
                )),
                other => {
                    out.push(Action::new(
                        Operation::FlushScreen,
                        "Resetting for new command",
                    ));
                    self.compile(other, out)?;
                }
            }
        }
        Ok(())
    }

    fn compile_command(&mut self, node: &Node, parts: &[Node], out: &mut Vec<Action>) -> Result<()> {
        let redirects = Redirects::collect(parts)?;
        let has_assignment = parts.iter().any(|p| matches!(p, Node::Assignment { .. }));
        let has_words = parts.iter().any(|p| matches!(p, Node::Word { .. }));
        let source = node.to_string();

        let slot = self.slots.len();
        self.slots.push(parts.to_vec());

        push_substitutions(slot, parts, Owner::Redirect, out);
        redirects.open(slot, "command", out);

        if has_assignment {
            out.push(Action::new(
                Operation::FlushScreen,
                format!("Entering Assignment Node: {}", source),
            ));
        }
        push_substitutions(slot, parts, Owner::Word, out);
        if has_assignment {
            out.push(
                Action::new(Operation::AssignVariables { slot }, "Variable Assignment")
                    .with_source(source.clone()),
            );
        }
        if has_words || !has_assignment {
            let name = parts
                .iter()
                .find_map(|p| match p {
                    Node::Word { word, .. } => Some(word.as_str()),
                    _ => None,
                })
                .unwrap_or("");
            out.push(
                Action::new(
                    Operation::RunCommand { slot },
                    format!("Command node: {}", name),
                )
                .with_source(source),
            );
        }

        redirects.close(slot, "command", out);
        Ok(())
    }

    fn compile_compound(
        &mut self,
        list: &[Node],
        nodes: &[Node],
        out: &mut Vec<Action>,
    ) -> Result<()> {
        let redirects = Redirects::collect(nodes)?;
        let slot = self.slots.len();
        if !nodes.is_empty() {
            self.slots.push(nodes.to_vec());
            push_substitutions(slot, nodes, Owner::Redirect, out);
        }
        redirects.open(slot, "compound", out);
        for part in list {
            self.compile(part, out)?;
        }
        redirects.close(slot, "compound", out);
        Ok(())
    }

    /// Loops are unrolled: the item list is expanded now and the body is
    /// compiled once per value.
    fn compile_for(
        &mut self,
        name: &str,
        items: &[Node],
        body: &Node,
        out: &mut Vec<Action>,
    ) -> Result<()> {
        let values = self.loop_values(items);
        self.limits.check_loop(values.len())?;

        out.push(Action::new(Operation::FlushScreen, "for loop entry"));
        for value in values {
            out.push(Action::new(
                Operation::BindIterator {
                    name: name.to_string(),
                    value,
                },
                "Set loop iterator value for next itr",
            ));
            self.compile(body, out)?;
            out.push(Action::new(Operation::FlushScreen, "iterate for loop"));
        }
        out.push(Action::new(
            Operation::UnbindIterator {
                name: name.to_string(),
            },
            "Remove loop iterator",
        ));
        out.push(Action::new(Operation::FlushScreen, "Exit for loop"));
        Ok(())
    }

    /// Items with a command substitution cannot be stepped through here,
    /// so their values come from the oracle; unanswered items are dropped.
    fn loop_values(&mut self, items: &[Node]) -> Vec<String> {
        let mut values = Vec::new();
        for item in items {
            let Node::Word {
                word,
                parts,
                quoted,
                ..
            } = item
            else {
                values.push(item.to_string());
                continue;
            };
            if parts
                .iter()
                .any(|p| matches!(p, Node::CommandSubstitution { .. }))
            {
                let item = item.to_string();
                match self.oracle.loop_items(&item) {
                    Some(answer) if *quoted => values.push(answer),
                    Some(answer) => {
                        values.extend(answer.split_whitespace().map(str::to_string))
                    }
                    None => {
                        tracing::warn!(item = %sanitize_for_log(&item), "loop item dropped");
                    }
                }
            } else if word == "$@" || word == "$*" {
                values.extend(self.state.positionals());
            } else {
                let expanded = expand_word(word, &self.state);
                if *quoted {
                    values.push(expanded);
                } else {
                    values.extend(expanded.split_whitespace().map(str::to_string));
                }
            }
        }
        values
    }
}

/// Which slot entries `push_substitutions` resolves.
#[derive(Clone, Copy, PartialEq)]
enum Owner {
    /// Command words and assignments
    Word,
    /// Redirect targets
    Redirect,
}

/// Enter/exit pairs for every command substitution in `parts`, last one in
/// each word first so splicing never shifts an unresolved marker.
fn push_substitutions(slot: usize, parts: &[Node], owner: Owner, out: &mut Vec<Action>) {
    for (index, part) in parts.iter().enumerate() {
        let inner = match (owner, part) {
            (Owner::Word, Node::Word { parts, .. } | Node::Assignment { parts, .. }) => parts,
            (Owner::Redirect, Node::Redirect { output, .. }) => match output.as_ref() {
                Node::Word { parts, .. } => parts,
                _ => continue,
            },
            _ => continue,
        };
        for sub in inner.iter().rev() {
            let Node::CommandSubstitution { command, pos } = sub else {
                continue;
            };
            out.push(Action::new(
                Operation::EnterSubstitution {
                    slot,
                    word: index,
                    part: *pos,
                },
                format!("Enter Command Substitution Env: {}", command),
            ));
            out.push(Action::new(
                Operation::ExitSubstitution {
                    slot,
                    word: index,
                    part: *pos,
                },
                format!("Exiting Command Substitution Env: {}", command),
            ));
        }
    }
}

/// Clauses are decided at step time; bodies are compiled only when chosen.
fn compile_if(clauses: &[IfClause], out: &mut Vec<Action>) {
    let mut earlier: Vec<String> = Vec::new();
    for clause in clauses {
        let condition = clause.condition.as_ref().map(|node| node.to_string());
        match (&clause.condition, &condition) {
            (Some(node), Some(text)) => out.push(
                Action::new(
                    Operation::DetermineTruth {
                        condition: text.clone(),
                        node: node.clone(),
                    },
                    "Determine boolean statement truth",
                )
                .with_source(text.clone()),
            ),
            _ => out.push(Action::new(
                Operation::Noop,
                "Determine if else should execute",
            )),
        }
        out.push(Action::new(
            Operation::SelectBranch {
                condition: condition.clone(),
                earlier: earlier.clone(),
                body: clause.body.clone(),
            },
            "Possibly append actions to stack",
        ));
        if let Some(text) = condition {
            earlier.push(text);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn compiled(script: &str) -> Vec<String> {
        let mut interp = Interpreter::new();
        let node = &parse(script).unwrap()[0];
        let mut out = Vec::new();
        interp.compile(node, &mut out).unwrap();
        out.into_iter().map(|a| a.description).collect()
    }

    #[test]
    fn test_command_with_substitution() {
        assert_eq!(
            compiled("echo $(whoami)"),
            vec![
                "Enter Command Substitution Env: whoami",
                "Exiting Command Substitution Env: whoami",
                "Command node: echo",
            ]
        );
    }

    #[test]
    fn test_assignment_only() {
        assert_eq!(
            compiled("a=$(echo x)"),
            vec![
                "Entering Assignment Node: a=\"$(echo x)\"",
                "Enter Command Substitution Env: echo x",
                "Exiting Command Substitution Env: echo x",
                "Variable Assignment",
            ]
        );
    }

    #[test]
    fn test_substitutions_back_to_front() {
        let mut interp = Interpreter::new();
        let node = &parse("echo $(a)$(b)").unwrap()[0];
        let mut out = Vec::new();
        interp.compile(node, &mut out).unwrap();
        let Operation::EnterSubstitution { part: first, .. } = out[0].operation else {
            panic!("expected substitution entry");
        };
        let Operation::EnterSubstitution { part: second, .. } = out[2].operation else {
            panic!("expected substitution entry");
        };
        assert!(first.0 > second.0);
    }

    #[test]
    fn test_redirect_target_resolved_before_capture() {
        assert_eq!(
            compiled("echo hi > $(echo f)"),
            vec![
                "Enter Command Substitution Env: echo f",
                "Exiting Command Substitution Env: echo f",
                "Prepare command node for redirects",
                "Command node: echo",
                "Flush command output",
                "Move information out to redirects",
                "Exit command node redirects",
            ]
        );
    }

    #[test]
    fn test_list_descriptions() {
        assert_eq!(
            compiled("true && false"),
            vec![
                "list node entry",
                "Resetting for new command",
                "Command node: true",
                "list node transfer character: &&",
                "Resetting for new command",
                "Command node: false",
            ]
        );
    }

    #[test]
    fn test_newline_separator_is_escaped() {
        let descriptions = compiled("{ true\nfalse; }");
        assert!(descriptions.contains(&"list node transfer character: \\n".to_string()));
    }

    #[test]
    fn test_subshell_reserved_words() {
        assert_eq!(
            compiled("( true )"),
            vec![
                "Entering sub-shell env",
                "Command node: true",
                "Exiting sub-shell env"
            ]
        );
    }

    #[test]
    fn test_for_unrolls_body() {
        let descriptions = compiled("for i in a b; do true; done");
        let binds = descriptions
            .iter()
            .filter(|d| *d == "Set loop iterator value for next itr")
            .count();
        assert_eq!(binds, 2);
        assert_eq!(descriptions.last().unwrap(), "Exit for loop");
    }

    #[test]
    fn test_for_expands_positionals_and_quotes() {
        let mut interp = Interpreter::new();
        interp.state_mut().set_variable("1", "x");
        interp.state_mut().set_variable("2", "y");
        interp.state_mut().set_variable("list", "p q");
        let Node::For { items, .. } = &parse("for i in \"$@\" $list \"$list\"; do true; done")
            .unwrap()[0]
        else {
            panic!("expected for node");
        };
        assert_eq!(interp.loop_values(items), vec!["x", "y", "p", "q", "p q"]);
    }

    #[test]
    fn test_if_is_gated() {
        assert_eq!(
            compiled("if a; then b; else c; fi"),
            vec![
                "Determine boolean statement truth",
                "Possibly append actions to stack",
                "Determine if else should execute",
                "Possibly append actions to stack",
            ]
        );
    }

    #[test]
    fn test_function_registers_at_compile_time() {
        let mut interp = Interpreter::new();
        let node = &parse("f() { true; }").unwrap()[0];
        let mut out = Vec::new();
        interp.compile(node, &mut out).unwrap();
        assert!(out.is_empty());
        assert!(interp.state().functions.contains_key("f"));
    }

    #[test]
    fn test_bare_nodes_are_structural_errors() {
        let mut interp = Interpreter::new();
        let mut out = Vec::new();
        for node in [
            Node::word("x", (0, 1)),
            Node::Operator {
                op: ";".into(),
                pos: (0, 1),
            },
            Node::ReservedWord {
                word: "done".into(),
                pos: (0, 4),
            },
        ] {
            let err = interp.compile(&node, &mut out).unwrap_err();
            assert!(matches!(err, Error::Structural(_)));
        }
        assert!(out.is_empty());
    }
}
