//! Deferred units of interpreter work
//!
//! Compiling a node produces a sequence of [`Action`]s. Each carries an
//! [`Operation`] tag and its arguments as plain data, so the pending stack
//! can be listed, serialized and stepped through one entry at a time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::parser::{Node, Pos};

/// What an action does when executed.
///
/// Command parts that command substitution rewrites in place live in the
/// interpreter's slot table; operations refer to them by `slot` index and
/// to a word by its index inside the slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Clear OUT and IN before a new top-level command
    ResetCommandIo,
    /// Flush OUT to the screen and clear IN
    ExitCleanup,
    /// Move pending OUT onto the screen
    FlushScreen,
    /// Move OUT into IN between pipeline stages
    PipeTransfer,
    /// Evaluate a list separator against the previous result in IN
    ListSeparator { op: String },
    /// Divert the screen so redirected output is collected separately
    BeginCapture,
    /// Restore the screen diverted by `BeginCapture`
    EndCapture,
    /// Fill IN from a file, or ask the oracle when it is missing. The
    /// target is the redirect at `index` in the slot.
    LoadRedirectInput { slot: usize, index: usize },
    /// Write captured screen and OUT to the file named by the redirect at
    /// `index` in the slot
    WriteRedirectOutput {
        slot: usize,
        index: usize,
        append: bool,
    },
    /// Bind the loop variable for the next iteration
    BindIterator { name: String, value: String },
    /// Drop the loop variable once the loop is done
    UnbindIterator { name: String },
    /// Resolve the command in a slot against functions, builtins and the
    /// unknown-command policy
    RunCommand { slot: usize },
    /// Perform the assignments in a slot
    AssignVariables { slot: usize },
    /// Lower a scope and queue the inner command of a substitution
    EnterSubstitution { slot: usize, word: usize, part: Pos },
    /// Splice captured output into the owning word and raise the scope
    ExitSubstitution { slot: usize, word: usize, part: Pos },
    /// Decide the truth of an `if` condition
    DetermineTruth { condition: String, node: Box<Node> },
    /// Turn captured condition output into a truth value
    CheckConditionOutput { condition: String },
    /// Queue a clause body when it is the first eligible clause
    SelectBranch {
        /// `None` for `else`
        condition: Option<String>,
        /// Conditions of the clauses before this one
        earlier: Vec<String>,
        body: Box<Node>,
    },
    LowerScope,
    /// Flush OUT and raise the scope
    RaiseScope,
    /// Lower a scope and bind positional parameters
    EnterFunction { name: String, args: Vec<String> },
    /// Flush pending OUT and raise the function scope
    ExitFunction,
    /// Lower a scope with a fresh IO socket
    EnterSubshell,
    Noop,
}

/// One queued action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub operation: Operation,
    pub description: String,
    /// Shell text of the node this action came from, used when the
    /// operator chooses to run the step on the host instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Action {
    pub fn new(operation: Operation, description: impl Into<String>) -> Self {
        Self {
            operation,
            description: description.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_description() {
        let action = Action::new(Operation::PipeTransfer, "pipeline transfer");
        assert_eq!(action.to_string(), "pipeline transfer");
    }

    #[test]
    fn test_serializes_with_tag() {
        let action = Action::new(
            Operation::ListSeparator { op: "&&".into() },
            "list node transfer character: &&",
        )
        .with_source("a && b");
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["operation"]["type"], "list_separator");
        assert_eq!(json["operation"]["op"], "&&");
        assert_eq!(json["source"], "a && b");

        let back: Action = serde_json::from_value(json).unwrap();
        assert_eq!(back, action);
    }
}
