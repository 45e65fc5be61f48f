//! Command substitution
//!
//! Entering a substitution lowers a scope and queues the inner command.
//! Exiting collects what the inner command printed, raises the scope and
//! splices the text into the owning word in place of the `$(...)` region.
//! The spliced text is escaped, so it is never expanded again.

use super::Interpreter;
use super::expand::escape_literal;
use crate::error::{Error, Result};
use crate::parser::{Node, Pos, matching_paren};

impl Interpreter {
    pub(crate) fn enter_substitution(&mut self, slot: usize, word: usize, part: Pos) -> Result<()> {
        let command = self.substitution_command(slot, word, part)?;
        let mut actions = Vec::new();
        self.compile(&command, &mut actions)?;

        self.check_scope()?;
        self.state.lower_scope();
        self.state.io.output.clear();
        tracing::debug!(command = %command, "entering command substitution");
        self.push_front(actions);
        Ok(())
    }

    pub(crate) fn exit_substitution(&mut self, slot: usize, word: usize, part: Pos) -> Result<()> {
        let mut captured = std::mem::take(&mut self.state.screen);
        captured.push_str(&std::mem::take(&mut self.state.io.output));
        let captured = captured.trim_end_matches('\n').replace('\n', " ");
        self.state.raise_scope();

        let target = self
            .slots
            .get_mut(slot)
            .and_then(|parts| parts.get_mut(word))
            .ok_or_else(|| Error::Execution(format!("stale substitution target {}:{}", slot, word)))?;
        splice(owning_word(target), part, &captured)
    }

    fn substitution_command(&self, slot: usize, word: usize, part: Pos) -> Result<Node> {
        let parts = match self.slot(slot)?.get(word).map(|node| match node {
            Node::Redirect { output, .. } => output.as_ref(),
            other => other,
        }) {
            Some(Node::Word { parts, .. } | Node::Assignment { parts, .. }) => parts,
            _ => {
                return Err(Error::Execution(format!(
                    "substitution owner missing at {}:{}",
                    slot, word
                )));
            }
        };
        parts
            .iter()
            .find_map(|p| match p {
                Node::CommandSubstitution { command, pos } if *pos == part => {
                    Some((**command).clone())
                }
                _ => None,
            })
            .ok_or_else(|| Error::Execution(format!("substitution at {:?} not found", part)))
    }
}

/// The word a substitution is spliced into: the node itself, or the target
/// of a redirect.
fn owning_word(node: &mut Node) -> &mut Node {
    match node {
        Node::Redirect { output, .. } => output.as_mut(),
        other => other,
    }
}

/// Replace the `$(...)` region of `part` in the word with `captured`.
fn splice(target: &mut Node, part: Pos, captured: &str) -> Result<()> {
    let kind = target.kind();
    let (Node::Word {
        word: text,
        parts,
        pos,
        ..
    }
    | Node::Assignment {
        word: text,
        parts,
        pos,
    }) = target
    else {
        return Err(Error::Execution(format!(
            "cannot splice into {} node",
            kind
        )));
    };

    let Some(index) = parts
        .iter()
        .position(|p| matches!(p, Node::CommandSubstitution { pos, .. } if *pos == part))
    else {
        return Err(Error::Execution(format!(
            "substitution at {:?} already resolved",
            part
        )));
    };

    let chars: Vec<char> = text.chars().collect();
    let hint = part.0.saturating_sub(pos.0);
    let Some(start) = find_marker(&chars, hint) else {
        return Err(Error::Execution(format!("no substitution marker in {:?}", text)));
    };
    let Some(end) = matching_paren(&chars, start + 1) else {
        return Err(Error::Execution(format!("unbalanced substitution in {:?}", text)));
    };

    let mut spliced: String = chars[..start].iter().collect();
    spliced.push_str(&escape_literal(captured));
    spliced.extend(&chars[end + 1..]);
    *text = spliced;
    parts.remove(index);
    Ok(())
}

/// Nearest unescaped `$(` to `hint`, searching outwards.
///
/// The hint comes from source offsets, which drift from the quote-stripped
/// word text; the nearest marker is the right one because later markers in
/// the word are resolved first.
fn find_marker(chars: &[char], hint: usize) -> Option<usize> {
    let is_marker = |i: usize| {
        chars.get(i) == Some(&'$')
            && chars.get(i + 1) == Some(&'(')
            && chars[..i].iter().rev().take_while(|c| **c == '\\').count() % 2 == 0
    };
    (0..=chars.len()).find_map(|distance| {
        if let Some(below) = hint.checked_sub(distance) {
            if is_marker(below) {
                return Some(below);
            }
        }
        let above = hint + distance;
        if distance > 0 && is_marker(above) {
            return Some(above);
        }
        None
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::{DisabledShell, ScriptedOracle};
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn run(script: &str) -> Interpreter {
        let mut interp = Interpreter::new();
        interp.set_oracle(Box::new(ScriptedOracle::new()));
        interp.set_host_shell(Box::new(DisabledShell));
        interp.run_script(script).unwrap();
        interp
    }

    #[test]
    fn test_find_marker() {
        let chars: Vec<char> = "a$(b)c$(d)".chars().collect();
        assert_eq!(find_marker(&chars, 6), Some(6));
        assert_eq!(find_marker(&chars, 5), Some(6));
        assert_eq!(find_marker(&chars, 0), Some(1));
        let escaped: Vec<char> = "\\$(x)".chars().collect();
        assert_eq!(find_marker(&escaped, 1), None);
    }

    #[test]
    fn test_splice_replaces_region() {
        let mut word = parse("echo pre$(whoami)post").unwrap().remove(0);
        let Node::Command { parts, .. } = &mut word else {
            panic!("expected command");
        };
        let target = &mut parts[1];
        let Node::Word { parts: inner, .. } = &*target else {
            panic!("expected word");
        };
        let part = inner
            .iter()
            .find_map(|p| match p {
                Node::CommandSubstitution { pos, .. } => Some(*pos),
                _ => None,
            })
            .unwrap();
        splice(target, part, "root $x").unwrap();
        let Node::Word { word, parts, .. } = target else {
            panic!("expected word");
        };
        assert_eq!(word, "preroot \\$xpost");
        assert!(parts.is_empty());
    }

    #[test]
    fn test_echo_substitution() {
        let interp = run("echo $(echo hi)");
        assert_eq!(interp.state().screen, "hi\n");
        assert_eq!(interp.state().scope_depth(), 0);
    }

    #[test]
    fn test_assignment_from_substitution() {
        let interp = run("a=$(echo x); echo $a");
        assert_eq!(interp.state().variables["a"], vec!["x".to_string()]);
        assert_eq!(interp.state().screen, "x\n");
    }

    #[test]
    fn test_nested_substitution() {
        let interp = run("echo $(echo $(echo deep))");
        assert_eq!(interp.state().screen, "deep\n");
    }

    #[test]
    fn test_two_substitutions_in_one_word() {
        let interp = run("echo $(echo a)-$(echo b)");
        assert_eq!(interp.state().screen, "a-b\n");
    }

    #[test]
    fn test_output_is_not_reexpanded() {
        let interp = run("x=bad\necho $(echo '$x')");
        assert_eq!(interp.state().screen, "$x\n");
    }

    #[test]
    fn test_multiline_output_is_joined() {
        let interp = run("printf_out=$(echo a; echo b)\necho $printf_out");
        assert_eq!(interp.state().screen, "a b\n");
    }

    #[test]
    fn test_substitution_state_is_scoped() {
        let interp = run("echo $(cd /tmp; v=1)\npwd");
        assert_eq!(interp.state().screen, "~\n");
        assert!(!interp.state().variables.contains_key("v"));
    }
}
