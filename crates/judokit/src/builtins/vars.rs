//! Variable manipulation builtins: unset, shift

use super::{Builtin, Context};
use crate::error::Result;
use crate::interpreter::ExecResult;

/// unset builtin - remove variables or functions
///
/// `-f` removes functions only. `-v` or no flag removes a variable, falling
/// back to a function of the same name. Only the current scope is touched.
pub struct Unset;

impl Builtin for Unset {
    fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        let (mode, names) = match ctx.args.split_first() {
            Some((flag, rest)) if flag == "-f" || flag == "-v" => (flag.as_str(), rest),
            Some((flag, _)) if flag == "-n" => {
                return Ok(ExecResult::err("unset: -n flag not implemented", 1));
            }
            _ => ("", ctx.args),
        };

        for name in names {
            match mode {
                "-f" => {
                    ctx.state.unset_function(name);
                }
                _ => {
                    if !ctx.state.unset_variable(name) && mode.is_empty() {
                        ctx.state.unset_function(name);
                    }
                }
            }
        }
        Ok(ExecResult::ok(String::new()))
    }
}

/// shift builtin - shift positional parameters
pub struct Shift;

impl Builtin for Shift {
    fn execute(&self, ctx: Context<'_>) -> Result<ExecResult> {
        // Number of positions to shift (default 1)
        let n: usize = ctx.args.first().and_then(|s| s.parse().ok()).unwrap_or(1);
        for _ in 0..n {
            ctx.state.shift_positionals();
        }
        Ok(ExecResult::ok(String::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::testing::run_default;
    use crate::interpreter::State;
    use crate::parser::Node;

    fn with_function(state: &mut State, name: &str) {
        state
            .functions
            .insert(name.to_string(), Node::word("body", (0, 4)));
    }

    #[test]
    fn test_unset_variable_then_function() {
        let mut state = State::new();
        state.set_variable("a", "1");
        with_function(&mut state, "f");
        run_default(&Unset, &["a", "f"], &mut state);
        assert!(state.variables.is_empty());
        assert!(state.functions.is_empty());
    }

    #[test]
    fn test_unset_modes() {
        let mut state = State::new();
        state.set_variable("f", "1");
        with_function(&mut state, "f");

        run_default(&Unset, &["-f", "f"], &mut state);
        assert!(state.functions.is_empty());
        assert_eq!(state.variable("f"), Some("1"));

        with_function(&mut state, "g");
        run_default(&Unset, &["-v", "g"], &mut state);
        assert!(state.functions.contains_key("g"));
    }

    #[test]
    fn test_shift() {
        let mut state = State::new();
        for (i, v) in ["a", "b", "c"].iter().enumerate() {
            state.set_variable((i + 1).to_string(), *v);
        }
        run_default(&Shift, &[], &mut state);
        assert_eq!(state.positionals(), vec!["b", "c"]);
        run_default(&Shift, &["2"], &mut state);
        assert!(state.positionals().is_empty());
        run_default(&Shift, &[], &mut state);
        assert!(state.variables.is_empty());
    }
}
